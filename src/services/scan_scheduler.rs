//! 批量扫描调度器。
//!
//! 把股票池按固定大小切成波次，波次内顺序或并发拉取（并发时是 join 屏障，
//! 整个波次全部返回后才继续），波次之间固定休眠以规避上游限流。
//!
//! 取消机制只有一个：开始新扫描。每次扫描领取一个递增的 generation，
//! 旧扫描的在途请求允许跑完，但结果在累积这一步被丢弃，不会进入新扫描。

use futures::future::join_all;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

use crate::error::{FetchError, ScanError};
use crate::models::scan::{progress_percent, FetchMode, ScanConfig, ScanEvent, ScanResult, ScanSummary};
use crate::models::stock::StockRecord;
use crate::models::universe::{TickerUniverse, UniverseCatalog};
use crate::services::quote_source::QuoteSource;

/// 扫描事件的接收方（进度条、增量渲染、日志……）
pub trait ScanSink: Send + Sync {
    fn on_event(&self, event: ScanEvent);
}

impl<F> ScanSink for F
where
    F: Fn(ScanEvent) + Send + Sync,
{
    fn on_event(&self, event: ScanEvent) {
        self(event)
    }
}

/// 通过 tokio 无界通道发布事件，消费端配合 [`ScanAccumulator`] 使用
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<ScanEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ScanEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ScanSink for ChannelSink {
    fn on_event(&self, event: ScanEvent) {
        // 接收端已关闭时直接丢弃
        let _ = self.tx.send(event);
    }
}

#[derive(Clone)]
pub struct ScanScheduler {
    source: Arc<dyn QuoteSource>,
    config: ScanConfig,
    generation: Arc<AtomicU64>,
}

impl ScanScheduler {
    pub fn new(source: Arc<dyn QuoteSource>, config: ScanConfig) -> Self {
        Self {
            source,
            config,
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn current_generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    fn is_current(&self, generation: u64) -> bool {
        self.current_generation() == generation
    }

    /// 按 id 查找股票池后扫描；找不到时在任何拉取之前返回错误
    pub async fn scan_universe_id(
        &self,
        catalog: &UniverseCatalog,
        universe_id: &str,
        sink: &dyn ScanSink,
    ) -> Result<ScanResult, ScanError> {
        let universe = catalog.find(universe_id).map_err(|e| {
            log::error!("扫描未开始: {}", e);
            e
        })?;
        Ok(self.scan(universe, sink).await)
    }

    /// 扫描整个股票池。开始即令之前所有扫描失效。
    ///
    /// 单只股票失败只记日志、不重试、不中断；即使零成功也算正常完成。
    pub async fn scan(&self, universe: &TickerUniverse, sink: &dyn ScanSink) -> ScanResult {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let started_at = Instant::now();
        let total = universe.tickers.len();
        let wave_size = self.config.effective_wave_size();
        let pacing = Duration::from_millis(self.config.pacing_ms);

        let mut result = ScanResult::new(generation, &universe.id);
        let mut processed = 0usize;
        let mut failed = 0usize;
        let mut last_progress: Option<u8> = None;

        log::info!(
            "[SCAN #{}] 开始扫描 {} ({} 只, 每批 {}, {:?})",
            generation, universe.id, total, wave_size, self.config.fetch_mode
        );
        sink.on_event(ScanEvent::Started {
            generation,
            universe_id: universe.id.clone(),
            total,
        });

        for (idx, wave) in universe.tickers.chunks(wave_size).enumerate() {
            if idx > 0 && !pacing.is_zero() {
                tokio::time::sleep(pacing).await;
            }
            if !self.is_current(generation) {
                result.superseded = true;
                break;
            }

            log::info!("[BATCH] 拉取: {}", wave.join(", "));
            let outcomes = self.fetch_wave(wave).await;

            // 在途期间被新扫描取代：整批丢弃
            if !self.is_current(generation) {
                log::info!("[SCAN #{}] 已被新扫描取代，丢弃本批 {} 个结果", generation, outcomes.len());
                result.superseded = true;
                break;
            }

            processed += wave.len();
            let mut batch = Vec::with_capacity(wave.len());
            for (symbol, outcome) in wave.iter().zip(outcomes) {
                match outcome {
                    Ok(record) => batch.push(record),
                    Err(e) if e.is_input_error() => {
                        failed += 1;
                        log::warn!("[SKIP] {}: {}", symbol, e);
                    }
                    Err(e) => {
                        failed += 1;
                        log::warn!("[FAIL] {}: {}", symbol, e);
                        if let FetchError::AllStrategiesExhausted { failures, .. } = &e {
                            for f in failures {
                                log::debug!("  - {}", f);
                            }
                        }
                    }
                }
            }

            if batch.is_empty() {
                log::warn!("[WARN] 本批无数据");
            } else {
                let with_peg = batch.iter().filter(|r| r.peg_ratio.is_some()).count();
                log::info!("[OK] 收到 {} 条（{} 条含 PEG）", batch.len(), with_peg);
            }

            let percent = progress_percent(processed, total);
            result.records.extend(batch.iter().cloned());
            result.progress_percent = percent;
            sink.on_event(ScanEvent::Batch { generation, records: batch });
            sink.on_event(ScanEvent::Progress { generation, percent });
            last_progress = Some(percent);
        }

        if !result.superseded {
            result.completed = true;
            result.progress_percent = 100;
            if last_progress != Some(100) {
                sink.on_event(ScanEvent::Progress { generation, percent: 100 });
            }
            if result.records.is_empty() {
                log::warn!(
                    "[SCAN #{}] 扫描完成但零条有效数据: {} ({} 只全部失败)",
                    generation, universe.id, failed
                );
            } else {
                log::info!(
                    "[SCAN #{}] 扫描完成: {} 条有效 / {} 只 ({} 失败)",
                    generation, result.records.len(), total, failed
                );
            }
        }

        sink.on_event(ScanEvent::Finished(ScanSummary {
            generation,
            scan_id: result.scan_id.clone(),
            universe_id: universe.id.clone(),
            requested: total,
            fetched: result.records.len(),
            failed,
            duration_ms: started_at.elapsed().as_millis() as u64,
            superseded: result.superseded,
        }));

        result
    }

    async fn fetch_wave(&self, wave: &[String]) -> Vec<Result<StockRecord, FetchError>> {
        match self.config.fetch_mode {
            FetchMode::Parallel => {
                join_all(wave.iter().map(|symbol| self.source.fetch_record(symbol))).await
            }
            FetchMode::Sequential => {
                let mut outcomes = Vec::with_capacity(wave.len());
                for symbol in wave {
                    outcomes.push(self.source.fetch_record(symbol).await);
                }
                outcomes
            }
        }
    }
}

/// 消费端的累积器：只接受当前活跃 generation 的事件
#[derive(Debug, Default)]
pub struct ScanAccumulator {
    active: Option<u64>,
    records: Vec<StockRecord>,
    progress: u8,
    completed: bool,
    summary: Option<ScanSummary>,
    discarded: usize,
}

impl ScanAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// 应用一个事件，返回是否被接受
    pub fn apply(&mut self, event: ScanEvent) -> bool {
        if let ScanEvent::Started { generation, .. } = &event {
            if self.active.map_or(true, |active| *generation > active) {
                self.active = Some(*generation);
                self.records.clear();
                self.progress = 0;
                self.completed = false;
                self.summary = None;
                return true;
            }
        }

        if self.active != Some(event.generation()) {
            self.discarded += 1;
            return false;
        }

        match event {
            ScanEvent::Started { .. } => {}
            ScanEvent::Batch { records, .. } => self.records.extend(records),
            ScanEvent::Progress { percent, .. } => self.progress = self.progress.max(percent),
            ScanEvent::Finished(summary) => {
                self.completed = !summary.superseded;
                if self.completed {
                    self.progress = 100;
                }
                self.summary = Some(summary);
            }
        }
        true
    }

    pub fn active_generation(&self) -> Option<u64> {
        self.active
    }

    pub fn records(&self) -> &[StockRecord] {
        &self.records
    }

    pub fn progress(&self) -> u8 {
        self.progress
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    pub fn summary(&self) -> Option<&ScanSummary> {
        self.summary.as_ref()
    }

    pub fn discarded_events(&self) -> usize {
        self.discarded
    }
}
