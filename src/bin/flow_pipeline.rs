//! Flow Pipeline - fetch, compute and store monthly net flows
//!
//! Usage:
//!   cargo run --release --bin flow_pipeline                          # previous month
//!   cargo run --release --bin flow_pipeline -- --year 2025 --month 2
//!   cargo run --release --bin flow_pipeline -- --backfill 12         # 13 months, oldest first
//!   cargo run --release --bin flow_pipeline -- --mode industry
//!
//! Environment variables:
//!   MFFLOW_DB_PATH - SQLite database path (default depends on mode)
//!   MFFLOW_MODE - amc | industry (default: amc)
//!   MFFLOW_AMC_ID - upstream fund-house id in AMC mode (default: 17)
//!   MFFLOW_REQUEST_DELAY_MS / MFFLOW_MONTH_DELAY_MS - politeness delays
//!   MFFLOW_FALLBACK_DAYS - earlier trading days to try (default: 4)

use chrono::NaiveDate;
use clap::{Parser, ValueEnum};
use dotenv::dotenv;
use log::{error, info};
use mfflow::{
    AmfiClient, FlowPipeline, HolidayCalendar, PipelineConfig, PipelineMode, SqliteFlowStore,
    YearMonth,
};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    Amc,
    Industry,
}

/// Compute mutual fund net flows for one month or a backfill range
#[derive(Parser, Debug)]
#[command(name = "flow_pipeline", version)]
struct Args {
    /// Target year (defaults to the previous calendar month)
    #[arg(long, requires = "month")]
    year: Option<i32>,

    /// Target month, 1-12
    #[arg(long, requires = "year", value_parser = clap::value_parser!(u32).range(1..=12))]
    month: Option<u32>,

    /// Also process the N months before the target, oldest first
    #[arg(long, default_value_t = 0)]
    backfill: u32,

    /// Override MFFLOW_MODE
    #[arg(long, value_enum)]
    mode: Option<ModeArg>,

    /// Override MFFLOW_AMC_ID
    #[arg(long)]
    amc_id: Option<u32>,

    /// Override MFFLOW_DB_PATH
    #[arg(long)]
    db: Option<String>,

    /// Market holiday to skip when picking report dates (repeatable, YYYY-MM-DD)
    #[arg(long = "holiday")]
    holidays: Vec<NaiveDate>,
}

fn apply_overrides(config: &mut PipelineConfig, args: &Args) {
    let amc_id = match (args.amc_id, config.mode) {
        (Some(id), _) => id,
        (None, PipelineMode::Amc { id }) => id,
        (None, PipelineMode::Industry) => mfflow::config::DEFAULT_AMC_ID,
    };

    config.mode = match args.mode {
        Some(ModeArg::Industry) => PipelineMode::Industry,
        Some(ModeArg::Amc) => PipelineMode::Amc { id: amc_id },
        None => match config.mode {
            PipelineMode::Amc { .. } => PipelineMode::Amc { id: amc_id },
            PipelineMode::Industry => PipelineMode::Industry,
        },
    };

    if let Some(db) = &args.db {
        config.db_path = Some(db.clone());
    }
}

fn target_month(args: &Args) -> Result<YearMonth, Box<dyn std::error::Error>> {
    match (args.year, args.month) {
        (Some(year), Some(month)) => YearMonth::new(year, month)
            .ok_or_else(|| format!("invalid month {}-{:02}", year, month).into()),
        _ => YearMonth::of(chrono::Local::now().date_naive())
            .previous()
            .ok_or_else(|| "no previous month".into()),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    let args = Args::parse();
    let mut config = PipelineConfig::from_env();
    apply_overrides(&mut config, &args);
    let target = target_month(&args)?;

    info!("🚀 Flow Pipeline");
    info!("   ├─ Mode: {}", config.mode.as_str());
    if let PipelineMode::Amc { id } = config.mode {
        info!("   ├─ AMC id: {}", id);
    }
    info!("   ├─ Database: {}", config.db_path());
    info!("   ├─ Target: {}", target);
    info!("   ├─ Holidays: {}", args.holidays.len());
    info!("   └─ Backfill: {} months", args.backfill);

    if let Some(parent) = Path::new(config.db_path()).parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let store = SqliteFlowStore::open(config.db_path(), config.mode.flow_table())?;
    let client = AmfiClient::new(config.api_base.as_str(), config.http_timeout())?;
    let calendar = HolidayCalendar::new(args.holidays.iter().copied());
    let pipeline = FlowPipeline::new(client, store, calendar, config.acquisition_policy())
        .with_month_delay(config.month_delay());

    if args.backfill > 0 {
        let report = pipeline.backfill(target, args.backfill).await;
        if report.completed.is_empty() {
            error!("❌ Every month in the backfill failed");
            std::process::exit(1);
        }
        return Ok(());
    }

    if pipeline.run_month(target).await.is_err() {
        // already logged and recorded in pipeline_log
        std::process::exit(1);
    }

    Ok(())
}
