use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use garp_lib::commands::scan_cmd::{self, UniverseSelector};
use garp_lib::commands::settings_cmd::{self, SettingsOverrides};
use garp_lib::models::settings::{AppSettings, DataSource};
use garp_lib::models::universe::UniverseCatalog;

#[derive(Parser)]
#[command(name = "garp-screener", version, about = "GARP stock screener: PEG-first fundamentals scan over index universes")]
struct Cli {
    /// Settings file (JSON). Defaults are used when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging (RUST_LOG still takes precedence).
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the built-in and configured universes.
    Indices,
    /// Scan a universe once, screen and rank the results.
    Scan {
        #[command(flatten)]
        target: TargetArgs,
        #[command(flatten)]
        tuning: TuningArgs,
    },
    /// Rescan periodically; each rescan supersedes the previous one.
    Watch {
        #[command(flatten)]
        target: TargetArgs,
        #[command(flatten)]
        tuning: TuningArgs,
        /// Seconds between rescans.
        #[arg(long)]
        interval: Option<u64>,
    },
    /// Print the effective settings as JSON.
    Config {
        #[command(flatten)]
        tuning: TuningArgs,
    },
}

#[derive(Args)]
struct TargetArgs {
    /// Universe id (DAX, SP500, NASDAQ, DOW, CAC, UK100 or a configured one).
    #[arg(long, conflicts_with = "symbols")]
    index: Option<String>,

    /// Ad-hoc comma separated symbols, e.g. AAPL,MSFT,SAP.DE
    #[arg(long, value_delimiter = ',')]
    symbols: Vec<String>,

    /// Output JSON instead of a table.
    #[arg(long, default_value_t = false)]
    json: bool,

    /// Also show records that failed the screen.
    #[arg(long, default_value_t = false)]
    all: bool,
}

#[derive(Args)]
struct TuningArgs {
    #[arg(long)]
    max_peg: Option<f64>,
    #[arg(long)]
    max_pe: Option<f64>,
    /// Minimum earnings growth as a decimal (0.10 = 10%).
    #[arg(long)]
    min_growth: Option<f64>,
    /// Minimum ROE as a decimal.
    #[arg(long)]
    min_roe: Option<f64>,
    #[arg(long)]
    wave_size: Option<usize>,
    /// Fetch symbols one by one inside each wave.
    #[arg(long, default_value_t = false)]
    sequential: bool,
    /// Pause between waves in milliseconds.
    #[arg(long)]
    pacing_ms: Option<u64>,
    #[arg(long, value_enum)]
    source: Option<SourceArg>,
}

#[derive(Clone, Copy, ValueEnum)]
enum SourceArg {
    Gateway,
    Ai,
}

impl TuningArgs {
    fn overrides(&self, refresh_interval_secs: Option<u64>) -> SettingsOverrides {
        SettingsOverrides {
            max_peg: self.max_peg,
            max_pe: self.max_pe,
            min_growth: self.min_growth,
            min_roe: self.min_roe,
            wave_size: self.wave_size,
            sequential: self.sequential,
            pacing_ms: self.pacing_ms,
            source: self.source.map(|s| match s {
                SourceArg::Gateway => DataSource::Gateway,
                SourceArg::Ai => DataSource::AiResearch,
            }),
            refresh_interval_secs,
        }
    }
}

impl TargetArgs {
    fn selector(&self) -> Result<UniverseSelector> {
        match (&self.index, self.symbols.is_empty()) {
            (Some(id), _) => Ok(UniverseSelector::Index(id.clone())),
            (None, false) => Ok(UniverseSelector::Symbols(self.symbols.clone())),
            (None, true) => bail!("either --index or --symbols is required"),
        }
    }
}

fn settings_for(cli_config: Option<&PathBuf>, overrides: &SettingsOverrides) -> Result<AppSettings> {
    Ok(settings_cmd::effective_settings(cli_config.map(|p| p.as_path()), overrides)?)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    garp_lib::init_logger(cli.verbose);

    match &cli.command {
        Commands::Indices => {
            let settings = settings_for(cli.config.as_ref(), &SettingsOverrides::default())?;
            print!("{}", scan_cmd::list_indices(&UniverseCatalog::with_overrides(&settings.universes)));
        }
        Commands::Scan { target, tuning } => {
            let settings = settings_for(cli.config.as_ref(), &tuning.overrides(None))?;
            let report = scan_cmd::scan_market(&settings, &target.selector()?, target.all).await?;
            println!("{}", scan_cmd::render_report(&report, target.json)?);
        }
        Commands::Watch { target, tuning, interval } => {
            let settings = settings_for(cli.config.as_ref(), &tuning.overrides(*interval))?;
            scan_cmd::watch_market(&settings, &target.selector()?, target.all, target.json).await?;
        }
        Commands::Config { tuning } => {
            let settings = settings_for(cli.config.as_ref(), &tuning.overrides(None))?;
            println!("{}", settings_cmd::redacted_json(&settings)?);
        }
    }

    Ok(())
}
