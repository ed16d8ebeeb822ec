//! Headline figures for the latest stored month

use crate::calendar::{self, YearMonth};
use crate::types::FlowRecord;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// Latest-month KPIs plus fiscal-year-to-date totals.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LatestSummary {
    pub month_end: NaiveDate,
    pub month_label: String,
    pub total_net_flow: f64,
    pub total_aum: f64,
    pub scheme_count: usize,
    pub fund_house_count: usize,
    pub inflow_schemes: usize,
    pub outflow_schemes: usize,
    pub fund_houses_with_inflow: usize,
    /// Net flow as % of month-end AUM
    pub flow_pct: f64,
    pub fiscal_year: String,
    pub fy_ytd_net_flow: f64,
    pub fy_ytd_months: usize,
}

/// Summarise the most recent month present in `records`.
///
/// The fiscal-year-to-date figures belong to the fiscal year containing
/// `as_of`, counting months that end on or before it. Returns `None` for
/// empty input.
pub fn latest_summary(records: &[FlowRecord], as_of: NaiveDate) -> Option<LatestSummary> {
    let month_end = records.iter().map(|r| r.month_end).max()?;
    let latest = in_month(records, YearMonth::of(month_end));

    let total_net_flow: f64 = latest.iter().map(|r| r.net_flow).sum();
    let total_aum: f64 = latest.iter().map(|r| r.aum_cur).sum();

    let fund_houses: HashSet<&str> = latest.iter().map(|r| r.fund_house.as_str()).collect();
    let fund_houses_with_inflow = fund_house_totals(&latest)
        .iter()
        .filter(|t| t.net_flow > 0.0)
        .count();

    let fy = calendar::fiscal_year(as_of);
    let fy_records: Vec<&FlowRecord> = records
        .iter()
        .filter(|r| r.month_end <= as_of && calendar::fiscal_year(r.month_end) == fy)
        .collect();
    let fy_months: BTreeSet<YearMonth> = fy_records.iter().map(|r| YearMonth::of(r.month_end)).collect();

    Some(LatestSummary {
        month_end,
        month_label: calendar::month_label(month_end),
        total_net_flow,
        total_aum,
        scheme_count: latest.len(),
        fund_house_count: fund_houses.len(),
        inflow_schemes: latest.iter().filter(|r| r.net_flow > 0.0).count(),
        outflow_schemes: latest.iter().filter(|r| r.net_flow < 0.0).count(),
        fund_houses_with_inflow,
        flow_pct: if total_aum > 0.0 {
            total_net_flow / total_aum * 100.0
        } else {
            0.0
        },
        fiscal_year: calendar::fiscal_year_label(as_of),
        fy_ytd_net_flow: fy_records.iter().map(|r| r.net_flow).sum(),
        fy_ytd_months: fy_months.len(),
    })
}

fn in_month(records: &[FlowRecord], month: YearMonth) -> Vec<FlowRecord> {
    records
        .iter()
        .filter(|r| YearMonth::of(r.month_end) == month)
        .cloned()
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ranking {
    /// Largest positive net flow first
    Inflow,
    /// Most negative net flow first
    Outflow,
    /// Largest month-end AUM first
    Aum,
}

/// Top `n` schemes of `month` by `ranking`.
///
/// Inflow and outflow rankings only consider schemes with flow of that sign.
pub fn top_schemes(records: &[FlowRecord], month: YearMonth, ranking: Ranking, n: usize) -> Vec<FlowRecord> {
    let mut candidates: Vec<FlowRecord> = in_month(records, month)
        .into_iter()
        .filter(|r| match ranking {
            Ranking::Inflow => r.net_flow > 0.0,
            Ranking::Outflow => r.net_flow < 0.0,
            Ranking::Aum => true,
        })
        .collect();

    candidates.sort_by(|a, b| {
        let ord = match ranking {
            Ranking::Inflow => b.net_flow.total_cmp(&a.net_flow),
            Ranking::Outflow => a.net_flow.total_cmp(&b.net_flow),
            Ranking::Aum => b.aum_cur.total_cmp(&a.aum_cur),
        };
        ord.then_with(|| a.scheme.name().cmp(b.scheme.name()))
    });
    candidates.truncate(n);
    candidates
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FundHouseTotal {
    pub fund_house: String,
    pub net_flow: f64,
    pub aum: f64,
    pub schemes: usize,
}

/// Net flow and AUM per fund house, largest net flow first.
pub fn fund_house_totals(records: &[FlowRecord]) -> Vec<FundHouseTotal> {
    let mut totals: BTreeMap<&str, FundHouseTotal> = BTreeMap::new();
    for r in records {
        let total = totals.entry(r.fund_house.as_str()).or_insert_with(|| FundHouseTotal {
            fund_house: r.fund_house.clone(),
            net_flow: 0.0,
            aum: 0.0,
            schemes: 0,
        });
        total.net_flow += r.net_flow;
        total.aum += r.aum_cur;
        total.schemes += 1;
    }

    let mut out: Vec<FundHouseTotal> = totals.into_values().collect();
    out.sort_by(|a, b| b.net_flow.total_cmp(&a.net_flow));
    out
}

/// [`fund_house_totals`] restricted to one month.
pub fn fund_house_totals_for(records: &[FlowRecord], month: YearMonth) -> Vec<FundHouseTotal> {
    fund_house_totals(&in_month(records, month))
}
