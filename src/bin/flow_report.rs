//! Flow Report - read stored flows and print period aggregates
//!
//! Usage:
//!   cargo run --bin flow_report -- --period quarterly --group-by sub-category
//!   cargo run --bin flow_report -- --period fy-ytd --category equity --format csv
//!   cargo run --bin flow_report -- --summary
//!   cargo run --bin flow_report -- --log

use chrono::NaiveDate;
use clap::{Parser, ValueEnum};
use dotenv::dotenv;
use log::warn;
use mfflow::calendar::{self, YearMonth};
use mfflow::export;
use mfflow::summary::{self, LatestSummary, Ranking};
use mfflow::{
    aggregate, Category, FlowRecord, FlowStore, GroupDimension, Granularity, PeriodAggregate,
    PipelineConfig, PipelineMode, RunLogEntry, SqliteFlowStore,
};
use serde_json::json;
use std::io;
use std::path::Path;
use tabled::builder::Builder;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PeriodArg {
    Monthly,
    Quarterly,
    Fy,
    FyYtd,
}

impl From<PeriodArg> for Granularity {
    fn from(p: PeriodArg) -> Self {
        match p {
            PeriodArg::Monthly => Granularity::Monthly,
            PeriodArg::Quarterly => Granularity::Quarterly,
            PeriodArg::Fy => Granularity::FinancialYear,
            PeriodArg::FyYtd => Granularity::FiscalYearToDate,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum GroupArg {
    Category,
    SubCategory,
    FundHouse,
}

impl From<GroupArg> for GroupDimension {
    fn from(g: GroupArg) -> Self {
        match g {
            GroupArg::Category => GroupDimension::Category,
            GroupArg::SubCategory => GroupDimension::SubCategory,
            GroupArg::FundHouse => GroupDimension::FundHouse,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CategoryArg {
    Equity,
    Hybrid,
}

impl From<CategoryArg> for Category {
    fn from(c: CategoryArg) -> Self {
        match c {
            CategoryArg::Equity => Category::Equity,
            CategoryArg::Hybrid => Category::Hybrid,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Json,
    Table,
    Csv,
}

/// Aggregate stored mutual fund flows by period
#[derive(Parser, Debug)]
#[command(name = "flow_report", version)]
struct Args {
    #[arg(long, value_enum, default_value = "monthly")]
    period: PeriodArg,

    /// Partition by a dimension (repeatable)
    #[arg(long = "group-by", value_enum)]
    group_by: Vec<GroupArg>,

    /// Months of history to read
    #[arg(long, default_value_t = 36)]
    months: u32,

    /// Keep only these categories (repeatable)
    #[arg(long, value_enum)]
    category: Vec<CategoryArg>,

    #[arg(long, value_enum, default_value = "table")]
    format: OutputFormat,

    /// Print latest-month KPIs instead of aggregates
    #[arg(long)]
    summary: bool,

    /// Rows in each top-N list of the summary
    #[arg(long, default_value_t = 5)]
    top: usize,

    /// Print recent pipeline runs instead of aggregates
    #[arg(long)]
    log: bool,

    /// Evaluation date for the read window and FY-YTD (default: today)
    #[arg(long)]
    as_of: Option<NaiveDate>,

    /// Read the industry-wide tables
    #[arg(long)]
    industry: bool,

    /// Override MFFLOW_DB_PATH
    #[arg(long)]
    db: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .target(env_logger::Target::Stderr)
        .init();

    let args = Args::parse();
    let mut config = PipelineConfig::from_env();
    if args.industry {
        config.mode = PipelineMode::Industry;
    }
    if let Some(db) = &args.db {
        config.db_path = Some(db.clone());
    }

    if !Path::new(config.db_path()).exists() {
        return Err(format!(
            "no database at {} (run flow_pipeline first)",
            config.db_path()
        )
        .into());
    }
    let store = SqliteFlowStore::open(config.db_path(), config.mode.flow_table())?;

    if args.log {
        let entries = store.recent_run_log(20).await?;
        print_run_log(&entries, args.format)?;
        return Ok(());
    }

    let as_of = args
        .as_of
        .unwrap_or_else(|| chrono::Local::now().date_naive());
    let since = calendar::months_before(as_of, args.months);

    let categories: Vec<Category> = args.category.iter().copied().map(Category::from).collect();
    let records: Vec<FlowRecord> = store
        .load_flows_since(since)
        .await?
        .into_iter()
        .filter(|r| categories.is_empty() || categories.contains(&r.category))
        .collect();

    if records.is_empty() {
        warn!("No flow records since {} in {}", since, config.db_path());
        return Ok(());
    }

    if args.summary {
        print_summary(&records, as_of, args.top, args.format)?;
        return Ok(());
    }

    let group_by: Vec<GroupDimension> = args.group_by.iter().copied().map(GroupDimension::from).collect();
    let aggregates = aggregate(&records, args.period.into(), &group_by, as_of);

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&aggregates)?),
        OutputFormat::Csv => export::write_aggregates_csv(io::stdout().lock(), &aggregates, &group_by)?,
        OutputFormat::Table => print_aggregate_table(&aggregates, &group_by),
    }

    Ok(())
}

fn print_aggregate_table(aggregates: &[PeriodAggregate], group_by: &[GroupDimension]) {
    let mut builder = Builder::default();

    let mut header = vec!["Period".to_string()];
    header.extend(group_by.iter().map(|g| g.as_str().to_string()));
    header.extend(["Net Flow (₹ Cr)", "AUM (₹ Cr)", "Flow %", "Months"].map(String::from));
    builder.push_record(header);

    for agg in aggregates {
        let mut row = vec![agg.period_label.clone()];
        row.extend(agg.group.iter().cloned());
        row.push(format!("{:.2}", agg.net_flow));
        row.push(format!("{:.2}", agg.aum));
        row.push(format!("{:.2}", agg.flow_pct));
        row.push(agg.months.to_string());
        builder.push_record(row);
    }

    println!("{}", builder.build());
}

fn print_summary(
    records: &[FlowRecord],
    as_of: NaiveDate,
    top: usize,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let Some(latest) = summary::latest_summary(records, as_of) else {
        return Ok(());
    };
    let month = YearMonth::of(latest.month_end);
    let inflows = summary::top_schemes(records, month, Ranking::Inflow, top);
    let outflows = summary::top_schemes(records, month, Ranking::Outflow, top);
    let largest = summary::top_schemes(records, month, Ranking::Aum, top);
    let fund_houses = summary::fund_house_totals_for(records, month);

    match format {
        OutputFormat::Json => {
            let report = json!({
                "summary": latest,
                "top_inflows": inflows,
                "top_outflows": outflows,
                "largest_schemes": largest,
                "fund_houses": fund_houses,
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Csv => {
            let mut wtr = csv::Writer::from_writer(io::stdout().lock());
            wtr.write_record(["field", "value"])?;
            for (field, value) in summary_fields(&latest) {
                wtr.write_record([field, value.as_str()])?;
            }
            wtr.flush()?;
        }
        OutputFormat::Table => {
            let mut builder = Builder::default();
            builder.push_record(["Field", "Value"]);
            for (field, value) in summary_fields(&latest) {
                builder.push_record([field.to_string(), value]);
            }
            println!("{}", builder.build());

            print_scheme_table("Top inflows", &inflows);
            print_scheme_table("Top outflows", &outflows);
            print_scheme_table("Largest schemes", &largest);

            if fund_houses.len() > 1 {
                let mut builder = Builder::default();
                builder.push_record(["Fund House", "Net Flow (₹ Cr)", "AUM (₹ Cr)", "Schemes"]);
                for t in &fund_houses {
                    builder.push_record([
                        t.fund_house.clone(),
                        format!("{:.2}", t.net_flow),
                        format!("{:.2}", t.aum),
                        t.schemes.to_string(),
                    ]);
                }
                println!("\nBy fund house\n{}", builder.build());
            }
        }
    }

    Ok(())
}

fn summary_fields(s: &LatestSummary) -> Vec<(&'static str, String)> {
    vec![
        ("Month", s.month_label.clone()),
        ("Month end", s.month_end.to_string()),
        ("Net flow (₹ Cr)", format!("{:.2}", s.total_net_flow)),
        ("AUM (₹ Cr)", format!("{:.2}", s.total_aum)),
        ("Flow % of AUM", format!("{:.2}", s.flow_pct)),
        ("Schemes", s.scheme_count.to_string()),
        ("Fund houses", s.fund_house_count.to_string()),
        ("Schemes with inflow", s.inflow_schemes.to_string()),
        ("Schemes with outflow", s.outflow_schemes.to_string()),
        ("Fund houses with inflow", s.fund_houses_with_inflow.to_string()),
        ("Fiscal year", s.fiscal_year.clone()),
        ("FY YTD net flow (₹ Cr)", format!("{:.2}", s.fy_ytd_net_flow)),
        ("FY YTD months", s.fy_ytd_months.to_string()),
    ]
}

fn print_scheme_table(title: &str, records: &[FlowRecord]) {
    if records.is_empty() {
        return;
    }
    let mut builder = Builder::default();
    builder.push_record(["Scheme", "Sub-category", "Net Flow (₹ Cr)", "AUM (₹ Cr)", "Flow %"]);
    for r in records {
        builder.push_record([
            r.scheme.name().to_string(),
            r.sub_category.clone(),
            format!("{:.2}", r.net_flow),
            format!("{:.2}", r.aum_cur),
            format!("{:.2}", r.flow_pct),
        ]);
    }
    println!("\n{}\n{}", title, builder.build());
}

fn print_run_log(entries: &[RunLogEntry], format: OutputFormat) -> Result<(), Box<dyn std::error::Error>> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(entries)?),
        OutputFormat::Csv => {
            let mut wtr = csv::Writer::from_writer(io::stdout().lock());
            wtr.write_record(["run_at", "month", "schemes", "status", "message"])?;
            for e in entries {
                wtr.write_record([
                    e.run_at.to_rfc3339(),
                    e.period.clone(),
                    e.record_count.to_string(),
                    e.status.as_str().to_string(),
                    e.message.clone(),
                ])?;
            }
            wtr.flush()?;
        }
        OutputFormat::Table => {
            let mut builder = Builder::default();
            builder.push_record(["Run at", "Month", "Schemes", "Status", "Message"]);
            for e in entries {
                builder.push_record([
                    e.run_at.format("%Y-%m-%d %H:%M").to_string(),
                    e.period.clone(),
                    e.record_count.to_string(),
                    e.status.as_str().to_string(),
                    e.message.clone(),
                ]);
            }
            println!("{}", builder.build());
        }
    }
    Ok(())
}
