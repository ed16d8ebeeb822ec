//! Period aggregation of monthly flow records
//!
//! Two reduction rules that must never be mixed up:
//! - net flow is additive across time, so months in a period are summed
//! - AUM is a point-in-time stock, so a period takes its last month's value
//!
//! Aggregation runs in two phases. Phase 1 sums scheme rows into one total per
//! (group, month). Phase 2 folds those monthly totals into the requested
//! period buckets using the rules above, then recomputes flow % from the
//! reduced values.

use crate::calendar::{self, YearMonth};
use crate::types::FlowRecord;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Granularity {
    Monthly,
    Quarterly,
    FinancialYear,
    /// Current fiscal year only, bucketed by month
    FiscalYearToDate,
}

impl Granularity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Granularity::Monthly => "Monthly",
            Granularity::Quarterly => "Quarterly",
            Granularity::FinancialYear => "Financial Year",
            Granularity::FiscalYearToDate => "FY YTD",
        }
    }

    /// Label of the bucket a month-end date falls into.
    pub fn bucket_label(&self, month_end: NaiveDate) -> String {
        match self {
            Granularity::Monthly | Granularity::FiscalYearToDate => calendar::month_label(month_end),
            Granularity::Quarterly => calendar::fiscal_quarter_label(month_end),
            Granularity::FinancialYear => calendar::fiscal_year_label(month_end),
        }
    }
}

/// Optional partitioning dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GroupDimension {
    Category,
    SubCategory,
    FundHouse,
}

impl GroupDimension {
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupDimension::Category => "category",
            GroupDimension::SubCategory => "sub_category",
            GroupDimension::FundHouse => "fund_house",
        }
    }

    pub fn value_of(&self, record: &FlowRecord) -> String {
        match self {
            GroupDimension::Category => record.category.as_str().to_string(),
            GroupDimension::SubCategory => record.sub_category.clone(),
            GroupDimension::FundHouse => record.fund_house.clone(),
        }
    }
}

/// One period bucket (optionally within one group).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodAggregate {
    pub period_label: String,
    /// Latest month-end folded into this bucket; orders heterogeneous labels
    pub period_sort: NaiveDate,
    /// Group values, aligned with the `group_by` dimensions
    pub group: Vec<String>,
    pub net_flow: f64,
    /// AUM of the last month in the bucket
    pub aum: f64,
    pub flow_pct: f64,
    pub months: usize,
}

#[derive(Debug, Clone, Copy)]
struct MonthTotal {
    month_end: NaiveDate,
    net_flow: f64,
    aum: f64,
}

/// Roll monthly flow records up to `granularity`.
///
/// `as_of` fixes the "current" fiscal year for [`Granularity::FiscalYearToDate`];
/// it is ignored by the other granularities. Empty (or fully filtered) input
/// yields an empty vector.
pub fn aggregate(
    records: &[FlowRecord],
    granularity: Granularity,
    group_by: &[GroupDimension],
    as_of: NaiveDate,
) -> Vec<PeriodAggregate> {
    let current_fy = calendar::fiscal_year(as_of);

    // Phase 1: scheme rows -> (group, month) totals
    let mut monthly: BTreeMap<(Vec<String>, YearMonth), MonthTotal> = BTreeMap::new();
    for record in records {
        if granularity == Granularity::FiscalYearToDate
            && calendar::fiscal_year(record.month_end) != current_fy
        {
            continue;
        }

        let group: Vec<String> = group_by.iter().map(|dim| dim.value_of(record)).collect();
        let total = monthly
            .entry((group, YearMonth::of(record.month_end)))
            .or_insert(MonthTotal {
                month_end: record.month_end,
                net_flow: 0.0,
                aum: 0.0,
            });
        total.net_flow += record.net_flow;
        total.aum += record.aum_cur;
        total.month_end = total.month_end.max(record.month_end);
    }

    // Phase 2: monthly totals -> period buckets. BTreeMap order is group-major,
    // then chronological, so "last write wins" gives the period-end AUM.
    let mut buckets: BTreeMap<(Vec<String>, String), PeriodAggregate> = BTreeMap::new();
    for ((group, _month), total) in monthly {
        let label = granularity.bucket_label(total.month_end);
        let bucket = buckets
            .entry((group.clone(), label.clone()))
            .or_insert_with(|| PeriodAggregate {
                period_label: label,
                period_sort: total.month_end,
                group,
                net_flow: 0.0,
                aum: 0.0,
                flow_pct: 0.0,
                months: 0,
            });
        bucket.net_flow += total.net_flow;
        bucket.aum = total.aum;
        bucket.period_sort = bucket.period_sort.max(total.month_end);
        bucket.months += 1;
    }

    let mut out: Vec<PeriodAggregate> = buckets
        .into_values()
        .map(|mut agg| {
            agg.flow_pct = if agg.aum > 0.0 {
                agg.net_flow / agg.aum * 100.0
            } else {
                0.0
            };
            agg
        })
        .collect();

    out.sort_by(|a, b| {
        a.period_sort
            .cmp(&b.period_sort)
            .then_with(|| a.group.cmp(&b.group))
    });
    out
}
