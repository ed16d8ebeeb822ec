//! Core data structures: snapshots, flow records and run-log entries

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    Equity,
    Hybrid,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Equity => "Equity",
            Category::Hybrid => "Hybrid",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Equity" => Some(Category::Equity),
            "Hybrid" => Some(Category::Hybrid),
            _ => None,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque scheme identity.
///
/// Upstream only guarantees the display name. When a stable code is present
/// on both sides of a comparison it takes precedence over the name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SchemeId {
    name: String,
    code: Option<String>,
}

/// The key a scheme is joined on across two report dates.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MatchKey {
    Code(String),
    Name(String),
}

impl SchemeId {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            code: None,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    pub fn name_key(&self) -> MatchKey {
        MatchKey::Name(self.name.clone())
    }

    pub fn code_key(&self) -> Option<MatchKey> {
        self.code.clone().map(MatchKey::Code)
    }
}

impl fmt::Display for SchemeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// One scheme as published for one report date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemeSnapshot {
    pub scheme: SchemeId,
    pub fund_house: String,
    pub category: Category,
    pub sub_category: String,
    pub report_date: NaiveDate,
    /// Regular plan growth NAV
    pub nav: Option<f64>,
    pub nav_direct: Option<f64>,
    /// ₹ Crore
    pub aum: Option<f64>,
}

/// How the expected AUM of a flow record was derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowBasis {
    /// prior AUM scaled by the NAV return
    NavAdjusted,
    /// NAV unusable; flow is the raw AUM change
    AumDelta,
}

impl FlowBasis {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlowBasis::NavAdjusted => "NAV_ADJUSTED",
            FlowBasis::AumDelta => "AUM_DELTA",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "NAV_ADJUSTED" => Some(FlowBasis::NavAdjusted),
            "AUM_DELTA" => Some(FlowBasis::AumDelta),
            _ => None,
        }
    }
}

/// Estimated net flow for one scheme between two period-end snapshots.
///
/// Invariants:
/// - `expected_aum = aum_prev * nav_return`
/// - `net_flow = aum_cur - expected_aum`
/// - `flow_pct = net_flow / aum_prev * 100`, or 0 when undefined
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowRecord {
    pub scheme: SchemeId,
    pub fund_house: String,
    pub category: Category,
    pub sub_category: String,
    pub month_end: NaiveDate,
    pub prev_month_end: NaiveDate,
    pub nav_cur: Option<f64>,
    pub nav_prev: Option<f64>,
    pub nav_return: f64,
    pub aum_cur: f64,
    pub aum_prev: f64,
    pub expected_aum: f64,
    pub net_flow: f64,
    pub flow_pct: f64,
    pub basis: FlowBasis,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    Success,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Success => "SUCCESS",
            RunStatus::Failed => "FAILED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "SUCCESS" => Some(RunStatus::Success),
            "FAILED" => Some(RunStatus::Failed),
            _ => None,
        }
    }
}

/// Append-only audit record of one pipeline execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunLogEntry {
    pub run_at: DateTime<Utc>,
    pub period: String,
    pub record_count: usize,
    pub status: RunStatus,
    pub message: String,
}

impl RunLogEntry {
    pub fn success(period: impl Into<String>, record_count: usize, message: impl Into<String>) -> Self {
        Self {
            run_at: Utc::now(),
            period: period.into(),
            record_count,
            status: RunStatus::Success,
            message: message.into(),
        }
    }

    pub fn failed(period: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            run_at: Utc::now(),
            period: period.into(),
            record_count: 0,
            status: RunStatus::Failed,
            message: message.into(),
        }
    }
}
