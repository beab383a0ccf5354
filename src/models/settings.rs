use serde::{Deserialize, Serialize};
use super::ai::AIConfig;
use super::scan::ScanConfig;
use super::strategy::FilterCriteria;
use super::universe::TickerUniverse;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppSettings {
    #[serde(default)]
    pub filters: FilterCriteria,
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub data_source: DataSource,
    #[serde(default)]
    pub ai: Option<AIConfig>,
    /// 额外的自定义股票池，同 id 覆盖内置指数
    #[serde(default)]
    pub universes: Vec<TickerUniverse>,
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,
}

fn default_refresh_interval() -> u64 { 60 }

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            filters: FilterCriteria::default(),
            scan: ScanConfig::default(),
            gateway: GatewayConfig::default(),
            data_source: DataSource::Gateway,
            ai: None,
            universes: vec![],
            refresh_interval_secs: default_refresh_interval(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum DataSource {
    #[default]
    #[serde(rename = "gateway")]
    Gateway,
    #[serde(rename = "ai_research")]
    AiResearch,
}

/// 上游行情网关配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// 按顺序尝试，首个成功即返回
    #[serde(default = "default_strategies")]
    pub strategies: Vec<FetchStrategy>,
    #[serde(default = "default_modules")]
    pub modules: Vec<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

pub const YAHOO_HOSTS: [&str; 2] = [
    "https://query1.finance.yahoo.com",
    "https://query2.finance.yahoo.com",
];

fn default_hosts() -> Vec<String> {
    YAHOO_HOSTS.iter().map(|h| h.to_string()).collect()
}

fn default_strategies() -> Vec<FetchStrategy> {
    vec![
        FetchStrategy::LocalRelay {
            endpoint: "http://localhost:3000/api/proxy".to_string(),
        },
        FetchStrategy::AlternateHost { hosts: default_hosts() },
        FetchStrategy::PublicRelay {
            endpoint: "https://corsproxy.io/".to_string(),
            hosts: default_hosts(),
        },
    ]
}

fn default_modules() -> Vec<String> {
    ["defaultKeyStatistics", "financialData", "price", "assetProfile", "summaryDetail"]
        .iter()
        .map(|m| m.to_string())
        .collect()
}

fn default_timeout_secs() -> u64 { 10 }

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            strategies: default_strategies(),
            modules: default_modules(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// 一种到达上游数据源的方式
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FetchStrategy {
    /// 本地中转：`{endpoint}?symbol=XXX`，原样返回上游 JSON
    LocalRelay { endpoint: String },
    /// 直连上游，在多个等价主机间随机选择
    AlternateHost { hosts: Vec<String> },
    /// 公共中转：`{endpoint}?url=<编码后的上游地址>`
    PublicRelay { endpoint: String, hosts: Vec<String> },
}

impl FetchStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            FetchStrategy::LocalRelay { .. } => "local_relay",
            FetchStrategy::AlternateHost { .. } => "alternate_host",
            FetchStrategy::PublicRelay { .. } => "public_relay",
        }
    }
}
