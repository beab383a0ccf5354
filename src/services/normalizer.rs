//! 上游原始报文 → `StockRecord` 的标准化。
//!
//! 上游同一个数值字段可能是裸数字、`{ "raw": 1.23, "fmt": "1.23" }` 结构、
//! 数字字符串，或者干脆缺失；所有字段统一经过 [`raw_value`] 提取，
//! 缺失的分区/字段一律落到默认值或 `None`，任何形状的输入都不会 panic。

use serde_json::Value;

use crate::models::stock::{StockRecord, DEFAULT_CURRENCY, UNKNOWN_CLASSIFICATION};

/// quoteSummary `result[0]`：按模块名分区的原始 JSON
#[derive(Debug, Clone, PartialEq)]
pub struct RawPayload(pub Value);

impl RawPayload {
    /// 取某个模块分区；非对象视为缺失
    pub fn section(&self, name: &str) -> Option<&Value> {
        self.0.get(name).filter(|v| v.is_object())
    }
}

/// 统一的数值提取规则：优先 raw 数值，丢弃展示字符串
pub fn raw_value(value: Option<&Value>) -> Option<f64> {
    let n = match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Object(obj) => match obj.get("raw")? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        },
        _ => None,
    }?;
    n.is_finite().then_some(n)
}

fn text_value(value: Option<&Value>) -> Option<String> {
    value
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

fn field<'a>(section: Option<&'a Value>, key: &str) -> Option<&'a Value> {
    section.and_then(|s| s.get(key))
}

/// 依次尝试多个 (分区, 字段)，取第一个存在的数值
fn first_number(candidates: &[(Option<&Value>, &str)]) -> Option<f64> {
    candidates
        .iter()
        .find_map(|(section, key)| raw_value(field(*section, key)))
}

fn first_text(candidates: &[(Option<&Value>, &str)]) -> Option<String> {
    candidates
        .iter()
        .find_map(|(section, key)| text_value(field(*section, key)))
}

/// 上游 debtToEquity 按百分数口径报告（150 表示 1.5 倍），固定除以 100。
/// 上游口径本身不一致，这里不做启发式判断，结果是已知的近似值。
pub fn debt_equity_from_raw(raw: Option<f64>) -> Option<f64> {
    raw.map(|v| v / 100.0)
}

pub fn normalize(symbol: &str, raw: &RawPayload) -> StockRecord {
    let stats = raw.section("defaultKeyStatistics");
    let financial = raw.section("financialData");
    let price = raw.section("price");
    let profile = raw.section("assetProfile");
    let summary = raw.section("summaryDetail");

    // 价格为 0 视为缺失，继续向后取
    let current_price = [(financial, "currentPrice"), (price, "regularMarketPrice")]
        .iter()
        .filter_map(|(section, key)| raw_value(field(*section, key)))
        .find(|p| *p > 0.0)
        .unwrap_or(0.0);

    StockRecord {
        symbol: symbol.to_string(),
        display_name: first_text(&[(price, "shortName"), (price, "longName")])
            .unwrap_or_else(|| symbol.to_string()),
        current_price,
        currency: first_text(&[(price, "currency"), (financial, "financialCurrency")])
            .unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
        peg_ratio: first_number(&[(stats, "pegRatio"), (summary, "pegRatio")]),
        trailing_pe: first_number(&[
            (summary, "trailingPE"),
            (stats, "trailingPE"),
            (financial, "trailingPE"),
        ]),
        forward_pe: first_number(&[(stats, "forwardPE"), (summary, "forwardPE")]),
        earnings_growth: raw_value(field(financial, "earningsGrowth")),
        return_on_equity: raw_value(field(financial, "returnOnEquity")),
        dividend_yield: first_number(&[
            (summary, "dividendYield"),
            (stats, "dividendYield"),
            (financial, "dividendYield"),
        ]),
        net_profit_margin: raw_value(field(financial, "profitMargins")),
        debt_equity_ratio: debt_equity_from_raw(raw_value(field(financial, "debtToEquity"))),
        market_cap: first_number(&[(price, "marketCap"), (summary, "marketCap")]),
        sector: text_value(field(profile, "sector"))
            .unwrap_or_else(|| UNKNOWN_CLASSIFICATION.to_string()),
        industry: text_value(field(profile, "industry"))
            .unwrap_or_else(|| UNKNOWN_CLASSIFICATION.to_string()),
    }
}

/// AI 研究结果中的单条扁平记录 → `StockRecord`
/// 提示词直接要求比率口径，因此 debtEquityRatio 不做 /100
pub fn normalize_research_item(symbol: &str, item: &Value) -> StockRecord {
    let num = |key: &str| raw_value(item.get(key));
    let text = |key: &str| text_value(item.get(key));

    StockRecord {
        symbol: symbol.to_string(),
        display_name: text("shortName")
            .or_else(|| text("displayName"))
            .unwrap_or_else(|| symbol.to_string()),
        current_price: num("currentPrice").filter(|p| *p > 0.0).unwrap_or(0.0),
        currency: text("currency").unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
        peg_ratio: num("pegRatio"),
        trailing_pe: num("trailingPE"),
        forward_pe: num("forwardPE"),
        earnings_growth: num("earningsGrowth"),
        return_on_equity: num("returnOnEquity"),
        dividend_yield: num("dividendYield"),
        net_profit_margin: num("netProfitMargin"),
        debt_equity_ratio: num("debtEquityRatio"),
        market_cap: num("marketCap"),
        sector: text("sector").unwrap_or_else(|| UNKNOWN_CLASSIFICATION.to_string()),
        industry: text("industry").unwrap_or_else(|| UNKNOWN_CLASSIFICATION.to_string()),
    }
}
