use crate::models::stock::{PegTier, StockLabel, StockRecord};

pub struct LabelingEngine;

impl LabelingEngine {
    /// 基于基本面为股票生成结构化标签（展示用，不参与筛选）
    pub fn generate_labels(stock: &StockRecord) -> Vec<StockLabel> {
        let mut labels = Vec::new();

        // ===== 估值标签 =====
        match stock.peg_tier() {
            PegTier::Bargain => labels.push(label("PEG<1 低估成长", "#2ECC71", Some("gem"))),
            PegTier::Attractive => labels.push(label("PEG 合理偏低", "#7BED9F", None)),
            PegTier::Expensive => labels.push(label("PEG 偏高", "#FF4757", None)),
            PegTier::Fair | PegTier::Unknown => {}
        }

        // ===== 质量标签 =====
        if stock.return_on_equity.map_or(false, |roe| roe > 0.15) {
            labels.push(label("高ROE", "#1E90FF", Some("shield")));
        }
        if stock.net_profit_margin.map_or(false, |m| m >= 0.20) {
            labels.push(label("净利率20%+", "#3742FA", None));
        }
        if stock.debt_equity_ratio.map_or(false, |de| de < 0.5) {
            labels.push(label("低负债", "#2ED573", None));
        }

        // ===== 分红 =====
        if stock.dividend_yield.map_or(false, |y| y > 0.03) {
            labels.push(label("高股息", "#FFA502", Some("coins")));
        }

        labels
    }
}

fn label(text: &str, color: &str, icon: Option<&str>) -> StockLabel {
    StockLabel {
        text: text.to_string(),
        color: color.to_string(),
        icon: icon.map(|i| i.to_string()),
    }
}
