use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use crate::error::FetchError;
use crate::models::ai::{AIConfig, ChatCompletionRequest, ChatCompletionResponse, ChatMessage};
use crate::models::stock::StockRecord;
use crate::services::normalizer::normalize_research_item;
use crate::services::quote_gateway::validate_symbol;
use crate::services::quote_source::QuoteSource;
use crate::utils::http::build_ai_client;

const SOURCE_NAME: &str = "ai_research";

/// 可选数据源：让 OpenAI 兼容模型检索并返回基本面数据
///
/// 与行情网关相比速度慢、数据可能过时，仅在上游不可用时作为替代。
pub struct AiResearchSource {
    config: AIConfig,
    client: reqwest::Client,
}

impl AiResearchSource {
    pub fn new(config: AIConfig) -> Result<Self> {
        let client = build_ai_client(config.timeout_secs)?;
        Ok(Self { config, client })
    }

    /// 一次请求研究多只股票，返回能解析出的记录（按请求顺序）
    pub async fn research(&self, tickers: &[String]) -> Result<Vec<StockRecord>, FetchError> {
        if tickers.is_empty() {
            return Ok(vec![]);
        }

        let req = ChatCompletionRequest {
            model: self.config.model_name.clone(),
            messages: vec![
                ChatMessage::system("You are a meticulous equity research assistant. Answer with raw JSON only."),
                ChatMessage::user(&build_prompt(tickers)),
            ],
            max_tokens: Some(self.config.max_tokens),
            temperature: Some(self.config.temperature),
            stream: Some(false),
        };

        let resp = self
            .client
            .post(self.config.completions_url())
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json")
            .json(&req)
            .send()
            .await
            .map_err(|e| transport(e.to_string()))?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| transport(e.to_string()))?;

        if !status.is_success() {
            return Err(FetchError::UpstreamRejected {
                strategy: SOURCE_NAME.to_string(),
                reason: format!("AI API error ({}): {}", status, body.chars().take(200).collect::<String>()),
            });
        }

        let response: ChatCompletionResponse = serde_json::from_str(&body)
            .map_err(|e| malformed(format!("AI response parse error: {}", e)))?;

        if let Some(usage) = &response.usage {
            log::debug!("AI 研究消耗 token: {}", usage.total_tokens);
        }

        let content = response
            .choices
            .first()
            .and_then(|c| c.message.as_ref())
            .and_then(|m| m.content.clone())
            .unwrap_or_default();

        parse_research_reply(tickers, &content)
    }
}

#[async_trait]
impl QuoteSource for AiResearchSource {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    async fn fetch_record(&self, symbol: &str) -> Result<StockRecord, FetchError> {
        let symbol = validate_symbol(symbol)?;
        self.research(std::slice::from_ref(&symbol))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| FetchError::UpstreamRejected {
                strategy: SOURCE_NAME.to_string(),
                reason: format!("no data for {} in AI response", symbol),
            })
    }
}

fn build_prompt(tickers: &[String]) -> String {
    format!(
        "Research the most recent fundamentals for these stocks: {}.\n\
        For each stock report: current price and currency, PEG ratio (5y forward preferred), \
        trailing P/E, forward P/E, year-over-year earnings growth, return on equity, \
        net profit margin, debt-to-equity, market cap, dividend yield, sector and industry.\n\
        \n\
        Return a JSON array, one object per stock, with the fields: symbol, shortName, \
        currentPrice, currency, pegRatio, trailingPE, forwardPE, earningsGrowth, returnOnEquity, \
        netProfitMargin, debtEquityRatio, marketCap, dividendYield, sector, industry.\n\
        Percentages must be decimals (12% = 0.12), debtEquityRatio a plain ratio (1.5 = 150%). \
        Use null for anything you cannot find. Output the JSON array only.",
        tickers.join(", ")
    )
}

/// 从模型回复中解析记录，只保留请求过的代码，顺序与请求一致
pub fn parse_research_reply(tickers: &[String], content: &str) -> Result<Vec<StockRecord>, FetchError> {
    let json_str = extract_json_array(content)
        .ok_or_else(|| malformed("cannot find JSON array in AI response".to_string()))?;
    let items: Vec<Value> = serde_json::from_str(json_str)
        .map_err(|e| malformed(format!("AI JSON parse error: {}", e)))?;

    let records = tickers
        .iter()
        .filter_map(|ticker| {
            items
                .iter()
                .find(|item| {
                    item.get("symbol")
                        .and_then(|s| s.as_str())
                        .map_or(false, |s| s.trim().eq_ignore_ascii_case(ticker))
                })
                .map(|item| normalize_research_item(ticker, item))
        })
        .collect();

    Ok(records)
}

fn extract_json_array(text: &str) -> Option<&str> {
    let text = text.trim();
    let start = text.find('[')?;
    let end = text.rfind(']')?;
    (end > start).then(|| &text[start..=end])
}

fn transport(reason: String) -> FetchError {
    FetchError::Transport { strategy: SOURCE_NAME.to_string(), reason }
}

fn malformed(reason: String) -> FetchError {
    FetchError::MalformedResponse { strategy: SOURCE_NAME.to_string(), reason }
}
