use crate::models::stock::StockRecord;
use crate::models::strategy::FilterCriteria;

/// 排名时缺失 PEG 的占位值（排最后）
const MISSING_PEG_SENTINEL: f64 = 999.0;

pub struct ScreeningEngine;

impl ScreeningEngine {
    /// 过滤 + 按 PEG 升序排名，返回新的序列，不修改输入
    ///
    /// 排序是稳定的：PEG 相同的记录保持累积顺序。
    pub fn screen(records: &[StockRecord], criteria: &FilterCriteria) -> Vec<StockRecord> {
        let mut qualified: Vec<StockRecord> = records
            .iter()
            .filter(|r| Self::qualifies(r, criteria))
            .cloned()
            .collect();

        Self::rank(&mut qualified);
        qualified
    }

    /// PEG 缺失直接淘汰（核心 GARP 信号）；其余字段缺失视为"证据不足"，不淘汰
    pub fn qualifies(record: &StockRecord, criteria: &FilterCriteria) -> bool {
        let peg = match record.peg_ratio {
            Some(p) => p,
            None => return false,
        };
        if peg > criteria.max_peg {
            return false;
        }

        if let Some(pe) = record.trailing_pe {
            if pe > criteria.max_pe {
                return false;
            }
        }

        if let Some(growth) = record.earnings_growth {
            if growth < criteria.min_growth_rate {
                return false;
            }
        }

        if let Some(roe) = record.return_on_equity {
            if roe < criteria.min_roe {
                return false;
            }
        }

        true
    }

    pub fn rank(records: &mut [StockRecord]) {
        // sort_by 是稳定排序
        records.sort_by(|a, b| {
            let pa = a.peg_ratio.unwrap_or(MISSING_PEG_SENTINEL);
            let pb = b.peg_ratio.unwrap_or(MISSING_PEG_SENTINEL);
            pa.total_cmp(&pb)
        });
    }
}
