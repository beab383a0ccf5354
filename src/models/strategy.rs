use serde::{Deserialize, Serialize};

/// GARP 过滤阈值
///
/// 四个字段互相独立，任何取值都合法（包括排除所有股票的组合）。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FilterCriteria {
    #[serde(default = "default_max_peg")]
    pub max_peg: f64,
    #[serde(default = "default_max_pe")]
    pub max_pe: f64,
    #[serde(default = "default_min_growth", alias = "min_growth")]
    pub min_growth_rate: f64, // 小数，0.10 = 10%
    #[serde(default = "default_min_roe")]
    pub min_roe: f64,         // 小数
}

fn default_max_peg() -> f64 { 2.0 }
fn default_max_pe() -> f64 { 40.0 }
fn default_min_growth() -> f64 { 0.10 }
fn default_min_roe() -> f64 { 0.12 }

impl Default for FilterCriteria {
    fn default() -> Self {
        Self {
            max_peg: default_max_peg(),
            max_pe: default_max_pe(),
            min_growth_rate: default_min_growth(),
            min_roe: default_min_roe(),
        }
    }
}
