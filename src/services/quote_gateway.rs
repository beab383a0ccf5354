use anyhow::Result;
use async_trait::async_trait;
use rand::seq::SliceRandom;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::sync::OnceLock;

use crate::error::FetchError;
use crate::models::settings::{FetchStrategy, GatewayConfig};
use crate::models::stock::StockRecord;
use crate::services::normalizer::{normalize, RawPayload};
use crate::services::quote_source::QuoteSource;
use crate::utils::fallback::try_in_order;
use crate::utils::http::build_quote_client;

const QUOTE_SUMMARY_PATH: &str = "/v10/finance/quoteSummary";

/// 上游行情网关：对单个代码按策略列表依次尝试，首个合格响应即返回
///
/// 合格 = HTTP 成功 + 能解析为 quoteSummary 信封 + 信封无 error + 至少一条 result。
/// 每次 `fetch_one` 中每个策略最多尝试一次；无缓存、无本地状态。
pub struct QuoteGateway {
    client: reqwest::Client,
    strategies: Vec<FetchStrategy>,
    modules: String,
}

/// quoteSummary 响应信封
#[derive(Debug, Deserialize)]
struct QuoteSummaryEnvelope {
    #[serde(rename = "quoteSummary")]
    quote_summary: QuoteSummaryBody,
}

#[derive(Debug, Deserialize)]
struct QuoteSummaryBody {
    #[serde(default)]
    result: Option<Vec<Value>>,
    #[serde(default)]
    error: Option<Value>,
}

impl QuoteGateway {
    pub fn new(config: &GatewayConfig) -> Result<Self> {
        let client = build_quote_client(config.timeout_secs)?;
        Ok(Self::with_client(client, config))
    }

    pub fn with_client(client: reqwest::Client, config: &GatewayConfig) -> Self {
        Self {
            client,
            strategies: config.strategies.clone(),
            modules: config.modules.join(","),
        }
    }

    pub fn strategies(&self) -> &[FetchStrategy] {
        &self.strategies
    }

    /// 拉取单个代码的原始报文
    pub async fn fetch_one(&self, symbol: &str) -> Result<RawPayload, FetchError> {
        let symbol = validate_symbol(symbol)?;

        try_in_order(&self.strategies, |strategy| self.attempt(strategy, &symbol))
            .await
            .map_err(|failures| FetchError::AllStrategiesExhausted {
                symbol: symbol.clone(),
                failures,
            })
    }

    async fn attempt(&self, strategy: &FetchStrategy, symbol: &str) -> Result<RawPayload, FetchError> {
        let name = strategy.name();
        let url = self.request_url(strategy, symbol)?;
        log::debug!("[{}] GET {}", name, url);

        let resp = self.client.get(&url).send().await.map_err(|e| FetchError::Transport {
            strategy: name.to_string(),
            reason: e.to_string(),
        })?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| FetchError::Transport {
            strategy: name.to_string(),
            reason: e.to_string(),
        })?;

        if !status.is_success() {
            return Err(FetchError::UpstreamRejected {
                strategy: name.to_string(),
                reason: format!("HTTP {} - {}", status.as_u16(), error_hint(&body)),
            });
        }

        parse_envelope(name, &body)
    }

    /// 根据策略构造请求地址
    pub fn request_url(&self, strategy: &FetchStrategy, symbol: &str) -> Result<String, FetchError> {
        match strategy {
            FetchStrategy::LocalRelay { endpoint } => {
                Ok(append_query(endpoint, "symbol", symbol))
            }
            FetchStrategy::AlternateHost { hosts } => {
                let host = pick_host(strategy.name(), hosts)?;
                Ok(self.direct_url(host, symbol))
            }
            FetchStrategy::PublicRelay { endpoint, hosts } => {
                let host = pick_host(strategy.name(), hosts)?;
                Ok(append_query(endpoint, "url", &self.direct_url(host, symbol)))
            }
        }
    }

    fn direct_url(&self, host: &str, symbol: &str) -> String {
        format!(
            "{}{}/{}?modules={}",
            host.trim_end_matches('/'),
            QUOTE_SUMMARY_PATH,
            urlencoding::encode(symbol),
            self.modules
        )
    }
}

#[async_trait]
impl QuoteSource for QuoteGateway {
    fn name(&self) -> &str {
        "quote_gateway"
    }

    async fn fetch_record(&self, symbol: &str) -> Result<StockRecord, FetchError> {
        let raw = self.fetch_one(symbol).await?;
        Ok(normalize(symbol.trim(), &raw))
    }
}

/// 校验 envelope 并取出 result[0]
pub fn parse_envelope(strategy: &str, body: &str) -> Result<RawPayload, FetchError> {
    let envelope: QuoteSummaryEnvelope =
        serde_json::from_str(body).map_err(|e| FetchError::MalformedResponse {
            strategy: strategy.to_string(),
            reason: e.to_string(),
        })?;

    if let Some(err) = envelope.quote_summary.error.filter(|e| !e.is_null()) {
        let description = err
            .get("description")
            .or_else(|| err.get("code"))
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .unwrap_or_else(|| err.to_string());
        return Err(FetchError::UpstreamRejected {
            strategy: strategy.to_string(),
            reason: description,
        });
    }

    envelope
        .quote_summary
        .result
        .and_then(|entries| entries.into_iter().next())
        .filter(|entry| entry.is_object())
        .map(RawPayload)
        .ok_or_else(|| FetchError::MalformedResponse {
            strategy: strategy.to_string(),
            reason: "result array is empty".to_string(),
        })
}

fn symbol_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)^\^?[A-Z0-9][A-Z0-9.\-=]{0,19}$").expect("symbol pattern is valid")
    })
}

/// 代码格式校验（如 AAPL、SAP.DE、BRK-B、^GSPC），不合法时直接失败，不发请求
pub fn validate_symbol(symbol: &str) -> Result<String, FetchError> {
    let trimmed = symbol.trim();
    if symbol_pattern().is_match(trimmed) {
        Ok(trimmed.to_string())
    } else {
        Err(FetchError::InvalidSymbol(symbol.to_string()))
    }
}

fn pick_host<'a>(strategy: &str, hosts: &'a [String]) -> Result<&'a str, FetchError> {
    // 简单分流，不是故障转移（故障转移由策略列表负责）
    hosts
        .choose(&mut rand::thread_rng())
        .map(|h| h.as_str())
        .ok_or_else(|| FetchError::Transport {
            strategy: strategy.to_string(),
            reason: "no upstream hosts configured".to_string(),
        })
}

fn append_query(endpoint: &str, key: &str, value: &str) -> String {
    let sep = if endpoint.ends_with('?') || endpoint.ends_with('&') {
        ""
    } else if endpoint.contains('?') {
        "&"
    } else {
        "?"
    };
    format!("{}{}{}={}", endpoint, sep, key, urlencoding::encode(value))
}

/// 中转服务出错时返回 `{"error": "..."}`，优先取其中的信息
fn error_hint(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(|s| s.to_string()))
        .unwrap_or_else(|| body.chars().take(80).collect())
}
