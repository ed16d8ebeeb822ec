//! End-to-end pipeline tests
//!
//! Drives `FlowPipeline` with an in-memory snapshot source and a SQLite store
//! on a temp file. Covered:
//! - successful month run with run-log bookkeeping
//! - NoDataAvailable / NoMatchedSchemes mapped to FAILED entries
//! - fallback to an earlier trading day
//! - re-run replaces the month instead of accumulating
//! - backfill isolates failed months
//! - industry mode attribution and table

use async_trait::async_trait;
use chrono::NaiveDate;
use mfflow::acquisition::{AcquisitionPolicy, Attribution};
use mfflow::fetcher::{FundHouseFilter, RawSchemeRecord, SnapshotQuery};
use mfflow::types::RunStatus;
use mfflow::{
    Category, FetchError, FlowPipeline, FlowStore, FlowTable, PipelineError, SnapshotFetcher,
    SqliteFlowStore, WeekendCalendar, YearMonth,
};
use std::collections::HashMap;
use std::time::Duration;
use tempfile::NamedTempFile;

/// Flexi Cap sub-category; the mock only publishes rows there.
const FLEXI_CAP: u32 = 3;

#[derive(Default)]
struct MockFetcher {
    published: HashMap<NaiveDate, Vec<RawSchemeRecord>>,
}

impl MockFetcher {
    fn publish(mut self, date: NaiveDate, rows: &[(&str, f64, f64)]) -> Self {
        let rows = rows
            .iter()
            .map(|(name, nav, aum)| RawSchemeRecord {
                scheme_name: name.to_string(),
                scheme_code: None,
                nav_regular: Some(*nav),
                nav_direct: None,
                aum: Some(*aum),
            })
            .collect();
        self.published.insert(date, rows);
        self
    }
}

#[async_trait]
impl SnapshotFetcher for MockFetcher {
    async fn fetch(&self, query: &SnapshotQuery) -> Result<Vec<RawSchemeRecord>, FetchError> {
        if query.sub_category.id != FLEXI_CAP {
            return Ok(Vec::new());
        }
        Ok(self
            .published
            .get(&query.report_date)
            .cloned()
            .unwrap_or_default())
    }
}

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn ym(y: i32, m: u32) -> YearMonth {
    YearMonth::new(y, m).unwrap()
}

fn amc_policy() -> AcquisitionPolicy {
    AcquisitionPolicy {
        fund_house: FundHouseFilter::Only(17),
        attribution: Attribution::Fixed("ICICI Pru".to_string()),
        request_delay: Duration::ZERO,
        fallback_days: 4,
    }
}

fn amc_pipeline(
    fetcher: MockFetcher,
    db: &NamedTempFile,
) -> FlowPipeline<MockFetcher, SqliteFlowStore, WeekendCalendar> {
    let store = SqliteFlowStore::open(db.path().to_str().unwrap(), FlowTable::Amc).unwrap();
    FlowPipeline::new(fetcher, store, WeekendCalendar, amc_policy())
}

/// January and February 2025 month ends: two matched schemes plus a launch.
fn jan_feb_fetcher() -> MockFetcher {
    MockFetcher::default()
        .publish(
            d(2025, 1, 31),
            &[("ICICI Pru Fund A", 10.0, 100.0), ("ICICI Pru Fund B", 20.0, 200.0)],
        )
        .publish(
            d(2025, 2, 28),
            &[
                ("ICICI Pru Fund A", 11.0, 115.0),
                ("ICICI Pru Fund B", 19.0, 190.0),
                ("ICICI Pru New Fund", 10.0, 50.0),
            ],
        )
}

#[tokio::test]
async fn test_month_run_stores_flows_and_logs_success() {
    let db = NamedTempFile::new().unwrap();
    let pipeline = amc_pipeline(jan_feb_fetcher(), &db);

    let outcome = pipeline.run_month(ym(2025, 2)).await.unwrap();
    assert_eq!(outcome.report_date, d(2025, 2, 28));
    assert_eq!(outcome.prior_report_date, d(2025, 1, 31));
    assert_eq!(outcome.stored, 2);
    assert_eq!(outcome.unmatched, 1);
    assert!((outcome.total_net_flow - 5.0).abs() < 1e-9);
    assert!((outcome.total_aum - 305.0).abs() < 1e-9);

    let store = pipeline.store();
    let flows = store.load_flows_since(d(2025, 1, 1)).await.unwrap();
    assert_eq!(flows.len(), 2);
    let a = flows.iter().find(|r| r.scheme.name() == "ICICI Pru Fund A").unwrap();
    assert!((a.nav_return - 1.1).abs() < 1e-9);
    assert!((a.expected_aum - 110.0).abs() < 1e-9);
    assert!((a.net_flow - 5.0).abs() < 1e-9);
    assert!((a.flow_pct - 5.0).abs() < 1e-9);
    assert_eq!(a.fund_house, "ICICI Pru");
    assert_eq!(a.category, Category::Equity);
    assert_eq!(a.sub_category, "Flexi Cap");

    assert_eq!(store.load_snapshots(ym(2025, 2)).await.unwrap().len(), 3);
    assert_eq!(store.load_snapshots(ym(2025, 1)).await.unwrap().len(), 2);

    let log = store.recent_run_log(5).await.unwrap();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].period, "2025-02");
    assert_eq!(log[0].status, RunStatus::Success);
    assert_eq!(log[0].record_count, 2);
}

#[tokio::test]
async fn test_missing_month_is_no_data_available() {
    let db = NamedTempFile::new().unwrap();
    let pipeline = amc_pipeline(jan_feb_fetcher(), &db);

    let err = pipeline.run_month(ym(2025, 4)).await.unwrap_err();
    assert!(matches!(err, PipelineError::NoDataAvailable { .. }));

    let log = pipeline.store().recent_run_log(5).await.unwrap();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].status, RunStatus::Failed);
    assert_eq!(log[0].record_count, 0);
    assert!(log[0].message.contains("No data available"));
    assert!(pipeline
        .store()
        .load_flows_since(d(2000, 1, 1))
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_disjoint_snapshots_are_no_matched_schemes() {
    let db = NamedTempFile::new().unwrap();
    let fetcher = jan_feb_fetcher().publish(d(2025, 3, 31), &[("ICICI Pru Renamed Fund", 12.0, 120.0)]);
    let pipeline = amc_pipeline(fetcher, &db);

    let err = pipeline.run_month(ym(2025, 3)).await.unwrap_err();
    assert!(matches!(err, PipelineError::NoMatchedSchemes { .. }));

    let log = pipeline.store().recent_run_log(5).await.unwrap();
    assert_eq!(log[0].status, RunStatus::Failed);
    assert!(log[0].message.contains("No matching schemes"));
}

#[tokio::test]
async fn test_month_end_holiday_falls_back() {
    let db = NamedTempFile::new().unwrap();
    // Mon 31 Mar 2025 unpublished, Fri 28 Mar published
    let fetcher = jan_feb_fetcher().publish(
        d(2025, 3, 28),
        &[("ICICI Pru Fund A", 12.0, 130.0), ("ICICI Pru Fund B", 19.0, 185.0)],
    );
    let pipeline = amc_pipeline(fetcher, &db);

    let outcome = pipeline.run_month(ym(2025, 3)).await.unwrap();
    assert_eq!(outcome.report_date, d(2025, 3, 28));
    assert_eq!(outcome.prior_report_date, d(2025, 2, 28));

    let flows = pipeline.store().load_flows_since(d(2025, 3, 1)).await.unwrap();
    assert!(flows.iter().all(|r| r.month_end == d(2025, 3, 28)));
    assert!(flows.iter().all(|r| r.prev_month_end == d(2025, 2, 28)));
}

#[tokio::test]
async fn test_rerun_replaces_month() {
    let db = NamedTempFile::new().unwrap();

    let first = amc_pipeline(jan_feb_fetcher(), &db);
    first.run_month(ym(2025, 2)).await.unwrap();

    // Republished February: only Fund A, different AUM
    let revised = MockFetcher::default()
        .publish(d(2025, 1, 31), &[("ICICI Pru Fund A", 10.0, 100.0)])
        .publish(d(2025, 2, 28), &[("ICICI Pru Fund A", 11.0, 120.0)]);
    let second = amc_pipeline(revised, &db);
    second.run_month(ym(2025, 2)).await.unwrap();

    let flows = second.store().load_flows_since(d(2025, 2, 1)).await.unwrap();
    assert_eq!(flows.len(), 1);
    assert_eq!(flows[0].scheme.name(), "ICICI Pru Fund A");
    assert!((flows[0].net_flow - 10.0).abs() < 1e-9);

    assert_eq!(second.store().recent_run_log(10).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_backfill_isolates_failed_month() {
    let db = NamedTempFile::new().unwrap();
    // No December data, so January cannot be computed
    let fetcher = jan_feb_fetcher().publish(
        d(2025, 3, 31),
        &[("ICICI Pru Fund A", 12.0, 130.0), ("ICICI Pru Fund B", 19.0, 185.0)],
    );
    let pipeline = amc_pipeline(fetcher, &db);

    let report = pipeline.backfill(ym(2025, 3), 2).await;
    assert!(!report.is_clean());
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, ym(2025, 1));
    assert!(matches!(report.failed[0].1, PipelineError::NoDataAvailable { .. }));

    let done: Vec<YearMonth> = report.completed.iter().map(|o| o.month).collect();
    assert_eq!(done, vec![ym(2025, 2), ym(2025, 3)]);

    let log = pipeline.store().recent_run_log(10).await.unwrap();
    let statuses: Vec<(String, RunStatus)> =
        log.iter().rev().map(|e| (e.period.clone(), e.status)).collect();
    assert_eq!(
        statuses,
        vec![
            ("2025-01".to_string(), RunStatus::Failed),
            ("2025-02".to_string(), RunStatus::Success),
            ("2025-03".to_string(), RunStatus::Success),
        ]
    );
    assert_eq!(
        pipeline.store().available_periods().await.unwrap(),
        vec![d(2025, 3, 31), d(2025, 2, 28)]
    );
}

#[tokio::test]
async fn test_industry_mode_attributes_fund_houses() {
    let db = NamedTempFile::new().unwrap();
    let fetcher = MockFetcher::default()
        .publish(
            d(2025, 1, 31),
            &[
                ("HDFC Flexi Cap Fund", 1800.0, 66000.0),
                ("Parag Parikh Flexi Cap Fund", 80.0, 90000.0),
                ("HDFC Flexi Cap Fund", 1.0, 1.0),
            ],
        )
        .publish(
            d(2025, 2, 28),
            &[
                ("HDFC Flexi Cap Fund", 1710.0, 64000.0),
                ("Parag Parikh Flexi Cap Fund", 78.0, 89500.0),
            ],
        );

    let store = SqliteFlowStore::open(db.path().to_str().unwrap(), FlowTable::Industry).unwrap();
    let policy = AcquisitionPolicy {
        fund_house: FundHouseFilter::All,
        attribution: Attribution::ByPrefix,
        request_delay: Duration::ZERO,
        fallback_days: 4,
    };
    let pipeline = FlowPipeline::new(fetcher, store, WeekendCalendar, policy);

    let outcome = pipeline.run_month(ym(2025, 2)).await.unwrap();
    assert_eq!(outcome.stored, 2);

    let flows = pipeline.store().load_flows_since(d(2025, 2, 1)).await.unwrap();
    let houses: Vec<&str> = flows.iter().map(|r| r.fund_house.as_str()).collect();
    assert_eq!(houses, vec!["HDFC", "PPFAS"]);

    // duplicate prior row ignored: first occurrence (AUM 66000) is used
    let hdfc = &flows[0];
    assert!((hdfc.aum_prev - 66000.0).abs() < 1e-9);
    assert!((hdfc.expected_aum - 62700.0).abs() < 1e-6);
    assert!((hdfc.net_flow - 1300.0).abs() < 1e-6);
}
