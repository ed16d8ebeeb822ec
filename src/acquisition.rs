//! Snapshot acquisition
//!
//! Sweeps every sub-category for one report date, throttled, and walks back
//! over earlier trading days when a month-end date has nothing published.

use crate::calendar::{self, TradingCalendar, YearMonth};
use crate::fetcher::{self, FundHouseFilter, RawSchemeRecord, SnapshotFetcher, SnapshotQuery, SubCategory};
use crate::fund_house;
use crate::types::{SchemeId, SchemeSnapshot};
use chrono::NaiveDate;
use log::{debug, info, warn};
use std::collections::HashSet;
use std::time::Duration;

/// How snapshots are labelled with a fund house.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attribution {
    /// Industry mode: derive from the scheme-name prefix
    ByPrefix,
    /// AMC mode: every scheme belongs to this fund house
    Fixed(String),
}

impl Attribution {
    fn fund_house_for(&self, scheme_name: &str) -> String {
        match self {
            Attribution::ByPrefix => fund_house::attribute(scheme_name).to_string(),
            Attribution::Fixed(name) => name.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AcquisitionPolicy {
    pub fund_house: FundHouseFilter,
    pub attribution: Attribution,
    /// Pause between consecutive sub-category requests
    pub request_delay: Duration,
    /// Earlier trading days tried after the month-end date
    pub fallback_days: usize,
}

/// Result of acquiring one month.
#[derive(Debug, Clone, PartialEq)]
pub enum Acquisition {
    Found {
        report_date: NaiveDate,
        snapshots: Vec<SchemeSnapshot>,
    },
    Unavailable {
        last_tried: NaiveDate,
    },
}

/// Fetch every sub-category for `report_date` and merge the rows.
///
/// Failed sub-category requests are logged and contribute nothing. Rows are
/// de-duplicated on (fund house, scheme name), first occurrence kept.
pub async fn fetch_snapshot_set<F>(
    fetcher: &F,
    report_date: NaiveDate,
    policy: &AcquisitionPolicy,
) -> Vec<SchemeSnapshot>
where
    F: SnapshotFetcher + ?Sized,
{
    let mut snapshots = Vec::new();
    let mut seen: HashSet<(String, String)> = HashSet::new();

    for (i, sub_category) in fetcher::sub_categories().into_iter().enumerate() {
        if i > 0 && !policy.request_delay.is_zero() {
            tokio::time::sleep(policy.request_delay).await;
        }

        let query = SnapshotQuery {
            report_date,
            sub_category,
            fund_house: policy.fund_house,
        };

        let rows = match fetcher.fetch(&query).await {
            Ok(rows) => rows,
            Err(e) => {
                warn!(
                    "⚠️  Fetch failed for {} on {}: {}",
                    sub_category.name, report_date, e
                );
                continue;
            }
        };

        debug!("   ├─ {}: {} schemes", sub_category.name, rows.len());

        for row in rows {
            let snapshot = to_snapshot(row, sub_category, report_date, &policy.attribution);
            let key = (
                snapshot.fund_house.clone(),
                snapshot.scheme.name().to_string(),
            );
            if seen.insert(key) {
                snapshots.push(snapshot);
            }
        }
    }

    snapshots
}

fn to_snapshot(
    row: RawSchemeRecord,
    sub_category: SubCategory,
    report_date: NaiveDate,
    attribution: &Attribution,
) -> SchemeSnapshot {
    let fund_house = attribution.fund_house_for(&row.scheme_name);
    let scheme = match row.scheme_code {
        Some(code) => SchemeId::new(row.scheme_name).with_code(code),
        None => SchemeId::new(row.scheme_name),
    };

    SchemeSnapshot {
        scheme,
        fund_house,
        category: sub_category.category,
        sub_category: sub_category.name.to_string(),
        report_date,
        nav: row.nav_regular,
        nav_direct: row.nav_direct,
        aum: row.aum,
    }
}

/// Snapshots for `month`: its last business day first, then the trading day
/// behind each of the `fallback_days` preceding calendar days, stopping at the
/// first non-empty set.
pub async fn acquire_month<F, C>(
    fetcher: &F,
    calendar: &C,
    month: YearMonth,
    policy: &AcquisitionPolicy,
) -> Acquisition
where
    F: SnapshotFetcher + ?Sized,
    C: TradingCalendar + ?Sized,
{
    let target = calendar::last_business_day(month, calendar);
    let candidates = std::iter::once(target)
        .chain(calendar::fallback_dates(target, policy.fallback_days, calendar));

    let mut last_tried = target;
    for (attempt, report_date) in candidates.enumerate() {
        if attempt > 0 {
            info!("   ├─ No data, trying fallback date {}", report_date);
        }
        last_tried = report_date;

        let snapshots = fetch_snapshot_set(fetcher, report_date, policy).await;
        if !snapshots.is_empty() {
            info!(
                "   └─ {} schemes for {} (report date {})",
                snapshots.len(),
                month,
                report_date
            );
            return Acquisition::Found {
                report_date,
                snapshots,
            };
        }
    }

    warn!("⚠️  No data for {} (last tried {})", month, last_tried);
    Acquisition::Unavailable { last_tried }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::WeekendCalendar;
    use crate::error::FetchError;
    use crate::types::Category;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Answers only for `available` dates; records every query it sees.
    struct ScriptedFetcher {
        available: Vec<NaiveDate>,
        fail_sub_category: Option<u32>,
        queries: Mutex<Vec<SnapshotQuery>>,
    }

    impl ScriptedFetcher {
        fn new(available: Vec<NaiveDate>) -> Self {
            Self {
                available,
                fail_sub_category: None,
                queries: Mutex::new(Vec::new()),
            }
        }

        fn dates_queried(&self) -> Vec<NaiveDate> {
            let mut dates: Vec<NaiveDate> = self
                .queries
                .lock()
                .unwrap()
                .iter()
                .map(|q| q.report_date)
                .collect();
            dates.dedup();
            dates
        }
    }

    #[async_trait]
    impl SnapshotFetcher for ScriptedFetcher {
        async fn fetch(&self, query: &SnapshotQuery) -> Result<Vec<RawSchemeRecord>, FetchError> {
            self.queries.lock().unwrap().push(*query);
            if self.fail_sub_category == Some(query.sub_category.id) {
                return Err(FetchError::Status(503));
            }
            if !self.available.contains(&query.report_date) {
                return Ok(Vec::new());
            }
            Ok(vec![RawSchemeRecord {
                scheme_name: format!("HDFC {} Fund", query.sub_category.name),
                scheme_code: None,
                nav_regular: Some(10.0),
                nav_direct: Some(11.0),
                aum: Some(100.0),
            }])
        }
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn policy(attribution: Attribution) -> AcquisitionPolicy {
        AcquisitionPolicy {
            fund_house: FundHouseFilter::All,
            attribution,
            request_delay: Duration::ZERO,
            fallback_days: 4,
        }
    }

    #[tokio::test]
    async fn test_sweeps_every_sub_category() {
        let fetcher = ScriptedFetcher::new(vec![d(2025, 2, 28)]);
        let snaps = fetch_snapshot_set(&fetcher, d(2025, 2, 28), &policy(Attribution::ByPrefix)).await;

        assert_eq!(snaps.len(), fetcher::sub_categories().len());
        assert!(snaps.iter().all(|s| s.fund_house == "HDFC"));
        assert!(snaps
            .iter()
            .any(|s| s.category == Category::Hybrid && s.sub_category == "Arbitrage"));
    }

    #[tokio::test]
    async fn test_failed_sub_category_is_skipped() {
        let mut fetcher = ScriptedFetcher::new(vec![d(2025, 2, 28)]);
        fetcher.fail_sub_category = Some(1);

        let snaps = fetch_snapshot_set(
            &fetcher,
            d(2025, 2, 28),
            &policy(Attribution::Fixed("ICICI Pru".to_string())),
        )
        .await;

        assert_eq!(snaps.len(), fetcher::sub_categories().len() - 1);
        assert!(snaps.iter().all(|s| s.fund_house == "ICICI Pru"));
    }

    #[tokio::test]
    async fn test_month_end_used_when_available() {
        let fetcher = ScriptedFetcher::new(vec![d(2025, 5, 30)]);
        let result = acquire_month(
            &fetcher,
            &WeekendCalendar,
            YearMonth::new(2025, 5).unwrap(),
            &policy(Attribution::ByPrefix),
        )
        .await;

        match result {
            Acquisition::Found { report_date, .. } => assert_eq!(report_date, d(2025, 5, 30)),
            other => panic!("expected data, got {:?}", other),
        }
        assert_eq!(fetcher.dates_queried(), vec![d(2025, 5, 30)]);
    }

    #[tokio::test]
    async fn test_falls_back_over_weekend() {
        // Mon 31 Mar 2025 unpublished; Fri 28 Mar has data
        let fetcher = ScriptedFetcher::new(vec![d(2025, 3, 28)]);
        let result = acquire_month(
            &fetcher,
            &WeekendCalendar,
            YearMonth::new(2025, 3).unwrap(),
            &policy(Attribution::ByPrefix),
        )
        .await;

        match result {
            Acquisition::Found { report_date, snapshots } => {
                assert_eq!(report_date, d(2025, 3, 28));
                assert!(snapshots.iter().all(|s| s.report_date == d(2025, 3, 28)));
            }
            other => panic!("expected fallback data, got {:?}", other),
        }
        assert_eq!(fetcher.dates_queried(), vec![d(2025, 3, 31), d(2025, 3, 28)]);
    }

    #[tokio::test]
    async fn test_unavailable_after_all_fallbacks() {
        let fetcher = ScriptedFetcher::new(Vec::new());
        let result = acquire_month(
            &fetcher,
            &WeekendCalendar,
            YearMonth::new(2025, 3).unwrap(),
            &policy(Attribution::ByPrefix),
        )
        .await;

        assert_eq!(
            result,
            Acquisition::Unavailable {
                last_tried: d(2025, 3, 27)
            }
        );
        // weekend offsets collapse onto Fri 28; nothing older than Thu 27
        assert_eq!(
            fetcher.dates_queried(),
            vec![d(2025, 3, 31), d(2025, 3, 28), d(2025, 3, 27)]
        );
    }
}
