use serde::{Deserialize, Serialize};

/// 单只股票的标准化基本面快照（由 Normalizer 生成，生成后不可变）
///
/// 可空字段表示"上游未提供"，绝不会被强制为 0；
/// 只有 `current_price` 缺失时取 0。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockRecord {
    pub symbol: String,
    pub display_name: String,
    pub current_price: f64,
    pub currency: String,
    pub peg_ratio: Option<f64>,
    pub trailing_pe: Option<f64>,
    pub forward_pe: Option<f64>,
    pub earnings_growth: Option<f64>,   // 小数形式，0.12 = 12%
    pub return_on_equity: Option<f64>,  // 小数形式
    pub dividend_yield: Option<f64>,
    pub net_profit_margin: Option<f64>,
    pub debt_equity_ratio: Option<f64>, // 真实比率（上游百分数已 /100）
    pub market_cap: Option<f64>,
    pub sector: String,
    pub industry: String,
}

pub const DEFAULT_CURRENCY: &str = "USD";
pub const UNKNOWN_CLASSIFICATION: &str = "Unknown";

impl StockRecord {
    /// 只有代码、其余字段全部为默认值/空值的记录
    pub fn empty(symbol: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            display_name: symbol.to_string(),
            current_price: 0.0,
            currency: DEFAULT_CURRENCY.to_string(),
            peg_ratio: None,
            trailing_pe: None,
            forward_pe: None,
            earnings_growth: None,
            return_on_equity: None,
            dividend_yield: None,
            net_profit_margin: None,
            debt_equity_ratio: None,
            market_cap: None,
            sector: UNKNOWN_CLASSIFICATION.to_string(),
            industry: UNKNOWN_CLASSIFICATION.to_string(),
        }
    }

    pub fn peg_tier(&self) -> PegTier {
        PegTier::from_peg(self.peg_ratio)
    }

    /// 市值（十亿），用于展示
    pub fn market_cap_billions(&self) -> Option<f64> {
        self.market_cap.map(|cap| cap / 1e9)
    }
}

/// PEG 估值档位
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PegTier {
    Bargain,    // < 1.0
    Attractive, // < 1.5
    Fair,       // < 2.5
    Expensive,
    Unknown,
}

impl PegTier {
    pub fn from_peg(peg: Option<f64>) -> Self {
        match peg {
            None => PegTier::Unknown,
            Some(p) if p < 1.0 => PegTier::Bargain,
            Some(p) if p < 1.5 => PegTier::Attractive,
            Some(p) if p < 2.5 => PegTier::Fair,
            Some(_) => PegTier::Expensive,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PegTier::Bargain => "bargain",
            PegTier::Attractive => "attractive",
            PegTier::Fair => "fair",
            PegTier::Expensive => "expensive",
            PegTier::Unknown => "n/a",
        }
    }
}

/// 结构化展示标签
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockLabel {
    pub text: String,
    pub color: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}
