use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

use garp_lib::error::{FetchError, ScanError};
use garp_lib::models::scan::{FetchMode, ScanConfig, ScanEvent};
use garp_lib::models::stock::StockRecord;
use garp_lib::models::strategy::FilterCriteria;
use garp_lib::models::universe::{TickerUniverse, UniverseCatalog};
use garp_lib::services::quote_source::QuoteSource;
use garp_lib::services::scan_scheduler::{ChannelSink, ScanAccumulator, ScanScheduler};
use garp_lib::services::screening::ScreeningEngine;

/// 内存数据源：`failing` 中的代码返回失败，其余返回 PEG=1.0 的记录
#[derive(Default)]
struct StubSource {
    failing: HashSet<String>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl StubSource {
    fn failing(symbols: &[&str]) -> Self {
        Self {
            failing: symbols.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    fn slow(delay: Duration) -> Self {
        Self { delay: Some(delay), ..Default::default() }
    }
}

#[async_trait]
impl QuoteSource for StubSource {
    fn name(&self) -> &str {
        "stub"
    }

    async fn fetch_record(&self, symbol: &str) -> Result<StockRecord, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing.contains(symbol) {
            return Err(FetchError::AllStrategiesExhausted { symbol: symbol.to_string(), failures: vec![] });
        }
        Ok(StockRecord { peg_ratio: Some(1.0), ..StockRecord::empty(symbol) })
    }
}

/// 遇到 SLOW 时挂起，直到测试放行
#[derive(Default)]
struct GatedSource {
    started: Notify,
    release: Notify,
}

#[async_trait]
impl QuoteSource for GatedSource {
    fn name(&self) -> &str {
        "gated"
    }

    async fn fetch_record(&self, symbol: &str) -> Result<StockRecord, FetchError> {
        if symbol == "SLOW" {
            self.started.notify_one();
            self.release.notified().await;
        }
        Ok(StockRecord { peg_ratio: Some(1.0), ..StockRecord::empty(symbol) })
    }
}

fn universe(n: usize) -> TickerUniverse {
    let symbols: Vec<String> = (0..n).map(|i| format!("T{}", i)).collect();
    TickerUniverse::custom(&symbols)
}

fn config(wave_size: usize, fetch_mode: FetchMode, pacing_ms: u64) -> ScanConfig {
    ScanConfig { wave_size, fetch_mode, pacing_ms }
}

fn progress_of(events: &[ScanEvent]) -> Vec<u8> {
    events
        .iter()
        .filter_map(|e| match e {
            ScanEvent::Progress { percent, .. } => Some(*percent),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn progress_is_monotonic_and_ends_at_100_in_both_modes() {
    for mode in [FetchMode::Parallel, FetchMode::Sequential] {
        let scheduler = ScanScheduler::new(Arc::new(StubSource::default()), config(3, mode, 0));
        let events = Mutex::new(Vec::new());
        let sink = |event: ScanEvent| events.lock().unwrap().push(event);

        let result = scheduler.scan(&universe(10), &sink).await;

        assert!(result.completed);
        assert_eq!(result.progress_percent, 100);
        assert_eq!(result.records.len(), 10);
        let events = events.into_inner().unwrap();
        assert_eq!(progress_of(&events), vec![30, 60, 90, 100], "{:?}", mode);
        assert!(matches!(events.first(), Some(ScanEvent::Started { total: 10, .. })));
        assert!(matches!(events.last(), Some(ScanEvent::Finished(s)) if s.fetched == 10 && !s.superseded));
    }
}

#[tokio::test]
async fn records_keep_wave_order_and_duplicates() {
    let scheduler = ScanScheduler::new(Arc::new(StubSource::default()), config(2, FetchMode::Parallel, 0));
    let u = TickerUniverse::custom(&["B".into(), "A".into(), "B".into()]);
    let result = scheduler.scan(&u, &|_: ScanEvent| {}).await;
    let symbols: Vec<&str> = result.records.iter().map(|r| r.symbol.as_str()).collect();
    assert_eq!(symbols, vec!["B", "A", "B"]);
}

#[tokio::test]
async fn failed_symbols_are_skipped_without_aborting() {
    let source = Arc::new(StubSource::failing(&["T1", "T4"]));
    let scheduler = ScanScheduler::new(source.clone(), config(2, FetchMode::Parallel, 0));
    let events = Mutex::new(Vec::new());
    let sink = |event: ScanEvent| events.lock().unwrap().push(event);

    let result = scheduler.scan(&universe(5), &sink).await;

    assert!(result.completed);
    assert_eq!(source.calls.load(Ordering::SeqCst), 5, "失败不重试");
    let symbols: Vec<&str> = result.records.iter().map(|r| r.symbol.as_str()).collect();
    assert_eq!(symbols, vec!["T0", "T2", "T3"]);
    let events = events.into_inner().unwrap();
    assert!(matches!(events.last(), Some(ScanEvent::Finished(s)) if s.failed == 2 && s.fetched == 3));
}

#[tokio::test]
async fn zero_successes_still_complete() {
    let scheduler = ScanScheduler::new(Arc::new(StubSource::failing(&["T0", "T1", "T2"])), ScanConfig::default());
    let result = scheduler.scan(&universe(3), &|_: ScanEvent| {}).await;
    assert!(result.completed);
    assert!(!result.superseded);
    assert_eq!(result.progress_percent, 100);
    assert!(result.records.is_empty());
}

#[tokio::test]
async fn empty_universe_completes_immediately() {
    let source = Arc::new(StubSource::default());
    let scheduler = ScanScheduler::new(source.clone(), ScanConfig::default());
    let events = Mutex::new(Vec::new());
    let sink = |event: ScanEvent| events.lock().unwrap().push(event);

    let result = scheduler.scan(&universe(0), &sink).await;

    assert!(result.completed);
    assert_eq!(result.progress_percent, 100);
    assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    assert_eq!(progress_of(&events.into_inner().unwrap()), vec![100]);
}

#[tokio::test(start_paused = true)]
async fn parallel_waves_fetch_concurrently_and_sequential_one_at_a_time() {
    let parallel = Arc::new(StubSource::slow(Duration::from_millis(100)));
    ScanScheduler::new(parallel.clone(), config(3, FetchMode::Parallel, 0))
        .scan(&universe(7), &|_: ScanEvent| {})
        .await;
    assert_eq!(parallel.max_in_flight.load(Ordering::SeqCst), 3);

    let sequential = Arc::new(StubSource::slow(Duration::from_millis(100)));
    ScanScheduler::new(sequential.clone(), config(3, FetchMode::Sequential, 0))
        .scan(&universe(7), &|_: ScanEvent| {})
        .await;
    assert_eq!(sequential.max_in_flight.load(Ordering::SeqCst), 1);
    assert_eq!(sequential.calls.load(Ordering::SeqCst), 7);
}

#[tokio::test(start_paused = true)]
async fn waves_are_paced() {
    let scheduler = ScanScheduler::new(Arc::new(StubSource::default()), config(2, FetchMode::Parallel, 500));
    let start = tokio::time::Instant::now();
    let result = scheduler.scan(&universe(6), &|_: ScanEvent| {}).await;
    let elapsed = start.elapsed();

    assert!(result.completed);
    // 3 个波次之间 2 次间隔，第一个波次前不等待
    assert!(elapsed >= Duration::from_millis(1000), "elapsed {:?}", elapsed);
    assert!(elapsed < Duration::from_millis(1500), "elapsed {:?}", elapsed);
}

#[tokio::test]
async fn new_scan_supersedes_in_flight_scan() {
    let source = Arc::new(GatedSource::default());
    let scheduler = ScanScheduler::new(source.clone(), config(5, FetchMode::Parallel, 0));
    let (sink, mut events) = ChannelSink::new();
    let sink = Arc::new(sink);

    let first = {
        let scheduler = scheduler.clone();
        let sink = sink.clone();
        tokio::spawn(async move {
            scheduler.scan(&TickerUniverse::custom(&["SLOW".to_string()]), sink.as_ref()).await
        })
    };
    source.started.notified().await;

    let second = scheduler
        .scan(&TickerUniverse::custom(&["FAST".to_string()]), sink.as_ref())
        .await;
    source.release.notify_one();
    let first = first.await.unwrap();

    assert!(second.completed);
    assert_eq!(second.records.len(), 1);
    assert!(first.superseded);
    assert!(!first.completed);
    assert!(first.records.is_empty(), "旧扫描的在途结果必须丢弃");
    assert!(first.generation < second.generation);
    assert_eq!(scheduler.current_generation(), second.generation);

    drop(sink);
    let mut acc = ScanAccumulator::new();
    while let Some(event) = events.recv().await {
        acc.apply(event);
    }
    assert_eq!(acc.active_generation(), Some(second.generation));
    assert!(acc.is_completed());
    assert_eq!(acc.progress(), 100);
    let symbols: Vec<&str> = acc.records().iter().map(|r| r.symbol.as_str()).collect();
    assert_eq!(symbols, vec!["FAST"]);
    assert!(acc.discarded_events() >= 1);
}

#[tokio::test]
async fn unknown_universe_fails_before_any_fetch() {
    let source = Arc::new(StubSource::default());
    let scheduler = ScanScheduler::new(source.clone(), ScanConfig::default());
    let events = Mutex::new(Vec::new());
    let sink = |event: ScanEvent| events.lock().unwrap().push(event);

    let err = scheduler
        .scan_universe_id(&UniverseCatalog::builtin(), "NIKKEI", &sink)
        .await
        .unwrap_err();

    assert!(matches!(err, ScanError::UniverseNotFound(id) if id == "NIKKEI"));
    assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    assert!(events.into_inner().unwrap().is_empty());
    assert_eq!(scheduler.current_generation(), 0);
}

/// AAA 成功（ROE 可调），BBB 所有策略失败
struct PairSource {
    aaa_roe: f64,
}

#[async_trait]
impl QuoteSource for PairSource {
    fn name(&self) -> &str {
        "pair"
    }

    async fn fetch_record(&self, symbol: &str) -> Result<StockRecord, FetchError> {
        if symbol != "AAA" {
            return Err(FetchError::AllStrategiesExhausted {
                symbol: symbol.to_string(),
                failures: vec![FetchError::Transport { strategy: "local_relay".into(), reason: "refused".into() }],
            });
        }
        Ok(StockRecord {
            peg_ratio: Some(0.8),
            trailing_pe: Some(20.0),
            earnings_growth: Some(0.15),
            return_on_equity: Some(self.aaa_roe),
            ..StockRecord::empty(symbol)
        })
    }
}

#[tokio::test]
async fn scan_then_screen_end_to_end() {
    let u = TickerUniverse::custom(&["AAA".to_string(), "BBB".to_string()]);

    for (roe, expected) in [(0.20, vec!["AAA"]), (0.05, vec![])] {
        let scheduler = ScanScheduler::new(Arc::new(PairSource { aaa_roe: roe }), ScanConfig::default());
        let result = scheduler.scan(&u, &|_: ScanEvent| {}).await;

        assert!(result.completed);
        assert_eq!(result.progress_percent, 100);
        assert_eq!(result.records.len(), 1);

        let qualified = ScreeningEngine::screen(&result.records, &FilterCriteria::default());
        let symbols: Vec<&str> = qualified.iter().map(|r| r.symbol.as_str()).collect();
        assert_eq!(symbols, expected);
    }
}
