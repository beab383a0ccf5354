/// 单只股票拉取失败的分类。
///
/// `UpstreamRejected` / `MalformedResponse` / `Transport` 只会触发下一个拉取策略，
/// 全部策略失败后归结为 `AllStrategiesExhausted`，该股票从扫描结果中剔除。
#[derive(Debug, Clone, thiserror::Error)]
pub enum FetchError {
    #[error("invalid symbol: {0:?}")]
    InvalidSymbol(String),

    #[error("[{strategy}] upstream rejected request: {reason}")]
    UpstreamRejected { strategy: String, reason: String },

    #[error("[{strategy}] malformed response: {reason}")]
    MalformedResponse { strategy: String, reason: String },

    #[error("[{strategy}] transport error: {reason}")]
    Transport { strategy: String, reason: String },

    #[error("all fetch strategies exhausted for {symbol} ({} attempts)", .failures.len())]
    AllStrategiesExhausted {
        symbol: String,
        failures: Vec<FetchError>,
    },
}

impl FetchError {
    pub fn is_input_error(&self) -> bool {
        matches!(self, Self::InvalidSymbol(_))
    }
}

/// 扫描级错误：只在开始拉取之前产生
#[derive(Debug, Clone, thiserror::Error)]
pub enum ScanError {
    #[error("universe not found: {0}")]
    UniverseNotFound(String),

    #[error("invalid scan input: {0}")]
    InvalidInput(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read settings file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse settings file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid setting: {0}")]
    Invalid(String),
}
