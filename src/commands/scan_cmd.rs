use anyhow::{Context, Result};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use crate::error::ScanError;
use crate::models::scan::{ScanEvent, ScanResult};
use crate::models::settings::{AppSettings, DataSource};
use crate::models::stock::{StockLabel, StockRecord};
use crate::models::strategy::FilterCriteria;
use crate::models::universe::{TickerUniverse, UniverseCatalog};
use crate::services::ai_research::AiResearchSource;
use crate::services::labeling::LabelingEngine;
use crate::services::quote_gateway::QuoteGateway;
use crate::services::quote_source::QuoteSource;
use crate::services::scan_scheduler::{ChannelSink, ScanAccumulator, ScanScheduler};
use crate::services::screening::ScreeningEngine;

/// 要扫描的股票池：内置/配置中的指数，或命令行临时给出的代码
#[derive(Debug, Clone)]
pub enum UniverseSelector {
    Index(String),
    Symbols(Vec<String>),
}

/// 结果表中的一行
#[derive(Debug, Clone, Serialize)]
pub struct ScreenedRow {
    #[serde(flatten)]
    pub record: StockRecord,
    pub peg_tier: String,
    pub qualified: bool,
    pub labels: Vec<StockLabel>,
}

/// 一次扫描 + 筛选的输出
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub scan_id: String,
    pub universe_id: String,
    pub generated_at: String,
    pub fetched: usize,
    pub qualified: usize,
    pub criteria: FilterCriteria,
    pub rows: Vec<ScreenedRow>,
}

impl ScanReport {
    /// `show_all` 为 true 时保留未通过筛选的记录（同样按 PEG 排名）
    pub fn build(
        scan_id: &str,
        universe_id: &str,
        records: &[StockRecord],
        criteria: &FilterCriteria,
        show_all: bool,
    ) -> Self {
        let screened = ScreeningEngine::screen(records, criteria);
        let qualified = screened.len();

        let shown = if show_all {
            let mut all = records.to_vec();
            ScreeningEngine::rank(&mut all);
            all
        } else {
            screened
        };

        let rows = shown
            .into_iter()
            .map(|record| ScreenedRow {
                peg_tier: record.peg_tier().as_str().to_string(),
                qualified: ScreeningEngine::qualifies(&record, criteria),
                labels: LabelingEngine::generate_labels(&record),
                record,
            })
            .collect();

        Self {
            scan_id: scan_id.to_string(),
            universe_id: universe_id.to_string(),
            generated_at: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            fetched: records.len(),
            qualified,
            criteria: *criteria,
            rows,
        }
    }

    pub fn from_scan(result: &ScanResult, criteria: &FilterCriteria, show_all: bool) -> Self {
        Self::build(&result.scan_id, &result.universe_id, &result.records, criteria, show_all)
    }
}

/// 根据配置构造数据源
pub fn build_source(settings: &AppSettings) -> Result<Arc<dyn QuoteSource>> {
    match settings.data_source {
        DataSource::Gateway => {
            let gateway = QuoteGateway::new(&settings.gateway).context("构建行情网关失败")?;
            let names: Vec<&str> = gateway.strategies().iter().map(|s| s.name()).collect();
            log::debug!("数据源: 行情网关，策略顺序 {}", names.join(" -> "));
            Ok(Arc::new(gateway))
        }
        DataSource::AiResearch => {
            let config = settings
                .ai
                .clone()
                .filter(|c| !c.api_key.trim().is_empty())
                .context("AI 数据源需要 API key（配置文件 ai.api_key 或环境变量 GARP_AI_API_KEY）")?;
            log::debug!("数据源: AI 研究 ({})", config.model_name);
            Ok(Arc::new(AiResearchSource::new(config).context("构建 AI 客户端失败")?))
        }
    }
}

pub fn resolve_universe(catalog: &UniverseCatalog, selector: &UniverseSelector) -> Result<TickerUniverse, ScanError> {
    match selector {
        UniverseSelector::Index(id) => catalog.find(id).cloned(),
        UniverseSelector::Symbols(symbols) => {
            let universe = TickerUniverse::custom(symbols);
            if universe.is_empty() {
                return Err(ScanError::InvalidInput("no symbols given".to_string()));
            }
            Ok(universe)
        }
    }
}

fn log_progress(event: ScanEvent) {
    match event {
        ScanEvent::Progress { percent, .. } => log::info!("进度 {}%", percent),
        ScanEvent::Finished(summary) => log::info!(
            "扫描 {} 结束: 成功 {} / 失败 {}，耗时 {}ms",
            summary.universe_id, summary.fetched, summary.failed, summary.duration_ms
        ),
        _ => {}
    }
}

/// 单次扫描：拉取 → 筛选 → 排名 → 标签
pub async fn scan_market(settings: &AppSettings, selector: &UniverseSelector, show_all: bool) -> Result<ScanReport> {
    let source = build_source(settings)?;
    let scheduler = ScanScheduler::new(source, settings.scan.clone());
    let catalog = UniverseCatalog::with_overrides(&settings.universes);

    let result = match selector {
        UniverseSelector::Index(id) => scheduler.scan_universe_id(&catalog, id, &log_progress).await?,
        UniverseSelector::Symbols(_) => {
            let universe = resolve_universe(&catalog, selector)?;
            scheduler.scan(&universe, &log_progress).await
        }
    };

    Ok(ScanReport::from_scan(&result, &settings.filters, show_all))
}

/// 监控模式下处理一个事件；当前活跃扫描完成时返回报告
pub fn on_watch_event(
    acc: &mut ScanAccumulator,
    event: ScanEvent,
    criteria: &FilterCriteria,
    show_all: bool,
) -> Option<ScanReport> {
    let finished = matches!(event, ScanEvent::Finished(_));
    if !acc.apply(event) || !finished || !acc.is_completed() {
        return None;
    }
    let summary = acc.summary()?;
    Some(ScanReport::build(&summary.scan_id, &summary.universe_id, acc.records(), criteria, show_all))
}

/// 定时重扫。新扫描开始即令旧扫描失效，旧扫描的迟到结果由累积器丢弃。
pub async fn watch_market(
    settings: &AppSettings,
    selector: &UniverseSelector,
    show_all: bool,
    json: bool,
) -> Result<()> {
    let source = build_source(settings)?;
    let scheduler = ScanScheduler::new(source, settings.scan.clone());
    let catalog = UniverseCatalog::with_overrides(&settings.universes);
    let universe = Arc::new(resolve_universe(&catalog, selector)?);

    let (sink, mut events) = ChannelSink::new();
    let sink = Arc::new(sink);
    let mut acc = ScanAccumulator::new();
    let mut ticker = tokio::time::interval(Duration::from_secs(settings.refresh_interval_secs.max(1)));
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    log::info!(
        "监控 {} ({} 只)，每 {} 秒刷新，Ctrl+C 退出",
        universe.id, universe.len(), settings.refresh_interval_secs
    );

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let scheduler = scheduler.clone();
                let universe = universe.clone();
                let sink = sink.clone();
                tokio::spawn(async move {
                    scheduler.scan(&universe, sink.as_ref()).await;
                });
            }
            Some(event) = events.recv() => {
                if let ScanEvent::Progress { percent, generation } = &event {
                    log::debug!("[SCAN #{}] {}%", generation, percent);
                }
                if let Some(report) = on_watch_event(&mut acc, event, &settings.filters, show_all) {
                    println!("{}", render_report(&report, json)?);
                }
            }
            _ = &mut shutdown => {
                log::info!("收到退出信号，停止监控（已丢弃 {} 个过期事件）", acc.discarded_events());
                break;
            }
        }
    }
    Ok(())
}

pub fn list_indices(catalog: &UniverseCatalog) -> String {
    let mut out = String::new();
    for universe in catalog.all() {
        out.push_str(&format!("{:<8} {:<24} {:>4} tickers\n", universe.id, universe.name, universe.len()));
    }
    out
}

pub fn render_report(report: &ScanReport, json: bool) -> Result<String> {
    if json {
        return serde_json::to_string_pretty(report).context("序列化结果失败");
    }
    Ok(render_table(report))
}

pub fn render_table(report: &ScanReport) -> String {
    let mut out = format!(
        "{} [{}] scan {}\n{:<10} {:<24} {:>10} {:>6} {:>7} {:>7} {:>7} {:>6} {:>9}  {:<22} {}\n",
        report.universe_id,
        report.generated_at,
        report.scan_id,
        "Symbol", "Name", "Price", "PEG", "P/E", "Growth", "ROE", "D/E", "MCap(B)", "Sector", "Labels"
    );

    for row in &report.rows {
        let r = &row.record;
        let marker = if row.qualified { ' ' } else { '-' };
        let labels: Vec<&str> = row.labels.iter().map(|l| l.text.as_str()).collect();
        out.push_str(&format!(
            "{}{:<9} {:<24} {:>6.2} {:<3} {:>6} {:>7} {:>7} {:>7} {:>6} {:>9}  {:<22} {}\n",
            marker,
            r.symbol,
            truncate(&r.display_name, 24),
            r.current_price,
            r.currency,
            fmt_number(r.peg_ratio),
            fmt_number(r.trailing_pe),
            fmt_percent(r.earnings_growth),
            fmt_percent(r.return_on_equity),
            fmt_number(r.debt_equity_ratio),
            fmt_number(r.market_cap_billions()),
            truncate(&r.sector, 22),
            labels.join(" "),
        ));
    }

    out.push_str(&format!("Qualified: {} / {} fetched", report.qualified, report.fetched));
    out
}

fn fmt_number(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{:.2}", v))
}

fn fmt_percent(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{:.1}%", v * 100.0))
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let mut s: String = text.chars().take(max.saturating_sub(1)).collect();
        s.push('…');
        s
    }
}
