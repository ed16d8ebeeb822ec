//! Flow calculator
//!
//! Given the snapshot sets for two consecutive period ends, estimates the
//! investor-driven flow of every scheme present in both:
//!
//! ```text
//! expected_aum = aum_prev × (nav_cur / nav_prev)
//! net_flow     = aum_cur − expected_aum
//! flow_pct     = net_flow / aum_prev × 100
//! ```
//!
//! Schemes present on only one side are reported back as unmatched and never
//! turned into flow records. This function is pure; logging of the unmatched
//! sets is left to the caller.

use crate::types::{FlowBasis, FlowRecord, MatchKey, SchemeId, SchemeSnapshot};
use std::collections::{HashMap, HashSet};

/// Output of one calculator run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlowComputation {
    pub records: Vec<FlowRecord>,
    /// In the current set only (launches, renames)
    pub unmatched_current: Vec<SchemeId>,
    /// In the prior set only (closures, renames)
    pub unmatched_prior: Vec<SchemeId>,
    /// Matched pairs whose net flow was undefined
    pub dropped: usize,
}

impl FlowComputation {
    pub fn unmatched_count(&self) -> usize {
        self.unmatched_current.len() + self.unmatched_prior.len()
    }

    pub fn matched_count(&self) -> usize {
        self.records.len() + self.dropped
    }
}

/// Index over the prior snapshot set. First occurrence of a key wins.
struct PriorIndex<'a> {
    snapshots: &'a [SchemeSnapshot],
    by_code: HashMap<MatchKey, usize>,
    by_name: HashMap<MatchKey, usize>,
}

impl<'a> PriorIndex<'a> {
    fn build(snapshots: &'a [SchemeSnapshot]) -> Self {
        let mut by_code = HashMap::new();
        let mut by_name = HashMap::new();
        for (idx, snap) in snapshots.iter().enumerate() {
            if let Some(key) = snap.scheme.code_key() {
                by_code.entry(key).or_insert(idx);
            }
            by_name.entry(snap.scheme.name_key()).or_insert(idx);
        }
        Self {
            snapshots,
            by_code,
            by_name,
        }
    }

    fn find(&self, scheme: &SchemeId) -> Option<usize> {
        scheme
            .code_key()
            .and_then(|key| self.by_code.get(&key))
            .or_else(|| self.by_name.get(&scheme.name_key()))
            .copied()
    }
}

/// Pair current and prior snapshots and compute per-scheme flows.
///
/// Either side empty yields an empty computation, not an error.
pub fn compute(current: &[SchemeSnapshot], prior: &[SchemeSnapshot]) -> FlowComputation {
    let mut result = FlowComputation::default();
    if current.is_empty() || prior.is_empty() {
        return result;
    }

    let index = PriorIndex::build(prior);
    let mut seen_current: HashSet<MatchKey> = HashSet::new();
    let mut matched_prior: HashSet<usize> = HashSet::new();

    for cur in current {
        let key = cur.scheme.code_key().unwrap_or_else(|| cur.scheme.name_key());
        if !seen_current.insert(key) {
            continue;
        }

        match index.find(&cur.scheme) {
            Some(idx) => {
                matched_prior.insert(idx);
                match flow_between(cur, &index.snapshots[idx]) {
                    Some(record) => result.records.push(record),
                    None => result.dropped += 1,
                }
            }
            None => result.unmatched_current.push(cur.scheme.clone()),
        }
    }

    let mut seen_prior: HashSet<MatchKey> = HashSet::new();
    for (idx, prev) in prior.iter().enumerate() {
        let key = prev.scheme.code_key().unwrap_or_else(|| prev.scheme.name_key());
        if !seen_prior.insert(key) {
            continue;
        }
        if !matched_prior.contains(&idx) {
            result.unmatched_prior.push(prev.scheme.clone());
        }
    }

    result
}

/// Flow record for a matched pair, or `None` when net flow is undefined.
pub fn flow_between(cur: &SchemeSnapshot, prev: &SchemeSnapshot) -> Option<FlowRecord> {
    let aum_cur = cur.aum.filter(|v| v.is_finite())?;
    let aum_prev = prev.aum.filter(|v| v.is_finite())?;

    let (nav_return, basis) = match (usable_nav(cur.nav), usable_nav(prev.nav)) {
        (Some(nav_cur), Some(nav_prev)) => (nav_cur / nav_prev, FlowBasis::NavAdjusted),
        _ => (1.0, FlowBasis::AumDelta),
    };

    let expected_aum = aum_prev * nav_return;
    let net_flow = aum_cur - expected_aum;
    if !net_flow.is_finite() {
        return None;
    }

    let flow_pct = if basis == FlowBasis::NavAdjusted && aum_prev != 0.0 {
        net_flow / aum_prev * 100.0
    } else {
        0.0
    };

    Some(FlowRecord {
        scheme: cur.scheme.clone(),
        fund_house: cur.fund_house.clone(),
        category: cur.category,
        sub_category: cur.sub_category.clone(),
        month_end: cur.report_date,
        prev_month_end: prev.report_date,
        nav_cur: cur.nav,
        nav_prev: prev.nav,
        nav_return,
        aum_cur,
        aum_prev,
        expected_aum,
        net_flow,
        flow_pct,
        basis,
    })
}

fn usable_nav(nav: Option<f64>) -> Option<f64> {
    nav.filter(|v| v.is_finite() && *v > 0.0)
}
