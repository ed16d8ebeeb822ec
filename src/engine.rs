//! Pipeline engine
//!
//! Runs one month end to end:
//!
//! ```text
//! acquire(month)  acquire(month - 1)
//!        \            /
//!       flow::compute
//!             ↓
//!   FlowStore::replace_month (snapshots + flows, one transaction)
//!             ↓
//!   FlowStore::append_run_log (SUCCESS | FAILED)
//! ```
//!
//! Failures never escape as panics. Every outcome of [`FlowPipeline::run_month`]
//! leaves a run-log entry, and [`FlowPipeline::backfill`] isolates failures
//! to the month they happened in.

use crate::acquisition::{self, Acquisition, AcquisitionPolicy};
use crate::calendar::{self, TradingCalendar, YearMonth};
use crate::db::FlowStore;
use crate::error::PipelineError;
use crate::fetcher::SnapshotFetcher;
use crate::flow::{self, FlowComputation};
use crate::types::{RunLogEntry, SchemeSnapshot};
use chrono::NaiveDate;
use log::{debug, error, info, warn};
use std::time::Duration;

/// What a successful month run produced.
#[derive(Debug, Clone, PartialEq)]
pub struct MonthOutcome {
    pub month: YearMonth,
    /// Date the current snapshot was actually published for
    pub report_date: NaiveDate,
    pub prior_report_date: NaiveDate,
    pub stored: usize,
    /// Matched schemes whose flow was undefined
    pub dropped: usize,
    /// Schemes present on one side only
    pub unmatched: usize,
    pub total_net_flow: f64,
    pub total_aum: f64,
}

#[derive(Debug, Default)]
pub struct BackfillReport {
    pub completed: Vec<MonthOutcome>,
    pub failed: Vec<(YearMonth, PipelineError)>,
}

impl BackfillReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Orchestrates acquisition, flow computation and persistence.
pub struct FlowPipeline<F, S, C> {
    fetcher: F,
    store: S,
    calendar: C,
    policy: AcquisitionPolicy,
    month_delay: Duration,
}

impl<F, S, C> FlowPipeline<F, S, C>
where
    F: SnapshotFetcher,
    S: FlowStore,
    C: TradingCalendar,
{
    pub fn new(fetcher: F, store: S, calendar: C, policy: AcquisitionPolicy) -> Self {
        Self {
            fetcher,
            store,
            calendar,
            policy,
            month_delay: Duration::ZERO,
        }
    }

    /// Pause between consecutive months of a backfill.
    pub fn with_month_delay(mut self, delay: Duration) -> Self {
        self.month_delay = delay;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Compute and store flows for `month` against the month before it.
    ///
    /// Writes exactly one run-log entry. A failure to write that entry after a
    /// failed run is logged, and the original error is returned.
    pub async fn run_month(&self, month: YearMonth) -> Result<MonthOutcome, PipelineError> {
        let period = month.to_string();
        info!("📅 Processing {}", period);

        match self.process_month(month).await {
            Ok(outcome) => {
                let message = format!(
                    "{} schemes stored (report date {}, prior {}); {} unmatched, {} dropped",
                    outcome.stored,
                    outcome.report_date,
                    outcome.prior_report_date,
                    outcome.unmatched,
                    outcome.dropped
                );
                self.store
                    .append_run_log(&RunLogEntry::success(&period, outcome.stored, message))
                    .await?;

                info!("✅ {} complete", period);
                info!("   ├─ Schemes: {}", outcome.stored);
                info!("   ├─ Net flow: ₹{:.2} Cr", outcome.total_net_flow);
                info!("   └─ AUM: ₹{:.2} Cr", outcome.total_aum);
                Ok(outcome)
            }
            Err(err) => {
                error!("❌ {} failed: {}", period, err);
                let entry = RunLogEntry::failed(&period, err.to_string());
                if let Err(log_err) = self.store.append_run_log(&entry).await {
                    warn!("⚠️  Could not record failure for {}: {}", period, log_err);
                }
                Err(err)
            }
        }
    }

    async fn process_month(&self, month: YearMonth) -> Result<MonthOutcome, PipelineError> {
        let prior_month = month
            .previous()
            .ok_or_else(|| PipelineError::NoDataAvailable {
                period: month.to_string(),
                report_date: "no prior month".to_string(),
            })?;

        info!("   ├─ Current month {}", month);
        let (report_date, current) = self.acquire(month).await?;

        info!("   ├─ Prior month {}", prior_month);
        let (prior_report_date, prior) = self.acquire(prior_month).await?;

        let computation = flow::compute(&current, &prior);
        log_unmatched(month, &computation);

        if computation.matched_count() == 0 {
            return Err(PipelineError::NoMatchedSchemes {
                period: month.to_string(),
            });
        }

        let stored = self
            .store
            .replace_month(
                month,
                &[(prior_month, &prior[..]), (month, &current[..])],
                &computation.records,
            )
            .await?;

        Ok(MonthOutcome {
            month,
            report_date,
            prior_report_date,
            stored,
            dropped: computation.dropped,
            unmatched: computation.unmatched_count(),
            total_net_flow: computation.records.iter().map(|r| r.net_flow).sum(),
            total_aum: computation.records.iter().map(|r| r.aum_cur).sum(),
        })
    }

    async fn acquire(
        &self,
        month: YearMonth,
    ) -> Result<(NaiveDate, Vec<SchemeSnapshot>), PipelineError> {
        match acquisition::acquire_month(&self.fetcher, &self.calendar, month, &self.policy).await
        {
            Acquisition::Found {
                report_date,
                snapshots,
            } => Ok((report_date, snapshots)),
            Acquisition::Unavailable { last_tried } => Err(PipelineError::NoDataAvailable {
                period: month.to_string(),
                report_date: last_tried.to_string(),
            }),
        }
    }

    /// Run `target` and the `count` months before it, oldest first.
    ///
    /// A failed month is recorded and skipped; later months still run.
    pub async fn backfill(&self, target: YearMonth, count: u32) -> BackfillReport {
        let months = calendar::backfill_months(target, count);
        if let (Some(first), Some(last)) = (months.first(), months.last()) {
            info!("🔁 Backfilling {} months: {} → {}", months.len(), first, last);
        }

        let mut report = BackfillReport::default();
        for (i, month) in months.iter().copied().enumerate() {
            if i > 0 && !self.month_delay.is_zero() {
                tokio::time::sleep(self.month_delay).await;
            }

            match self.run_month(month).await {
                Ok(outcome) => report.completed.push(outcome),
                Err(err) => report.failed.push((month, err)),
            }
        }

        info!(
            "🏁 Backfill done: {} succeeded, {} failed",
            report.completed.len(),
            report.failed.len()
        );
        for (month, err) in &report.failed {
            warn!("   ├─ {}: {}", month, err);
        }

        report
    }
}

/// Schemes on one side only are a data-quality signal (launch, closure or rename).
fn log_unmatched(month: YearMonth, computation: &FlowComputation) {
    if computation.unmatched_count() == 0 {
        return;
    }

    warn!(
        "⚠️  {}: {} schemes only in current month, {} only in prior month",
        month,
        computation.unmatched_current.len(),
        computation.unmatched_prior.len()
    );
    for scheme in &computation.unmatched_current {
        debug!("   ├─ new or renamed: {}", scheme);
    }
    for scheme in &computation.unmatched_prior {
        debug!("   ├─ closed or renamed: {}", scheme);
    }
}
