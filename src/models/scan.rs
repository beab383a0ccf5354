use serde::{Deserialize, Serialize};

use super::stock::StockRecord;

/// 波次内的拉取方式：顺序（最稳）或并发（最快），二选一
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchMode {
    #[default]
    Parallel,
    Sequential,
}

/// 批量扫描节奏配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanConfig {
    #[serde(default = "default_wave_size")]
    pub wave_size: usize,
    #[serde(default)]
    pub fetch_mode: FetchMode,
    /// 波次之间的固定间隔（毫秒），用于规避上游限流
    #[serde(default = "default_pacing_ms")]
    pub pacing_ms: u64,
}

fn default_wave_size() -> usize { 5 }
fn default_pacing_ms() -> u64 { 500 }

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            wave_size: default_wave_size(),
            fetch_mode: FetchMode::default(),
            pacing_ms: default_pacing_ms(),
        }
    }
}

impl ScanConfig {
    pub fn effective_wave_size(&self) -> usize {
        self.wave_size.max(1)
    }
}

/// 一次扫描的累积结果，新扫描开始后即被丢弃
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanResult {
    pub generation: u64,
    pub scan_id: String,
    pub universe_id: String,
    pub records: Vec<StockRecord>,
    pub progress_percent: u8,
    pub completed: bool,
    /// 被更新的扫描取代，records 只包含取代之前已累积的部分
    pub superseded: bool,
}

impl ScanResult {
    pub fn new(generation: u64, universe_id: &str) -> Self {
        Self {
            generation,
            scan_id: uuid::Uuid::new_v4().to_string(),
            universe_id: universe_id.to_string(),
            records: Vec::new(),
            progress_percent: 0,
            completed: false,
            superseded: false,
        }
    }
}

/// 扫描结束时的统计
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanSummary {
    pub generation: u64,
    pub scan_id: String,
    pub universe_id: String,
    pub requested: usize,
    pub fetched: usize,
    pub failed: usize,
    pub duration_ms: u64,
    pub superseded: bool,
}

/// 扫描过程中发布的事件，全部带 generation 标记
#[derive(Debug, Clone, PartialEq)]
pub enum ScanEvent {
    Started { generation: u64, universe_id: String, total: usize },
    Progress { generation: u64, percent: u8 },
    Batch { generation: u64, records: Vec<StockRecord> },
    Finished(ScanSummary),
}

impl ScanEvent {
    pub fn generation(&self) -> u64 {
        match self {
            ScanEvent::Started { generation, .. }
            | ScanEvent::Progress { generation, .. }
            | ScanEvent::Batch { generation, .. } => *generation,
            ScanEvent::Finished(summary) => summary.generation,
        }
    }
}

/// progress = round(100 * processed / total)，限制在 [0, 100]；空股票池视为 100
pub fn progress_percent(processed: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    let pct = (100.0 * processed as f64 / total as f64).round();
    pct.clamp(0.0, 100.0) as u8
}
