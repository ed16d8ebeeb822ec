//! Fiscal calendar and trading-day helpers
//!
//! Indian fiscal year: FY26 runs April 2025 through March 2026. All functions
//! here are pure; anything that depends on "today" takes the date as a parameter.

use chrono::{Datelike, Days, Months, NaiveDate, Weekday};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// First month of the fiscal year.
const FISCAL_START_MONTH: u32 = 4;

const MAX_CLOSED_RUN: usize = 14;

/// A calendar month, always backed by a valid first day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth {
    first: NaiveDate,
}

impl YearMonth {
    /// Years outside 1900..=9999 are rejected so month arithmetic never leaves chrono's range.
    pub fn new(year: i32, month: u32) -> Option<Self> {
        if !(1900..=9999).contains(&year) {
            return None;
        }
        NaiveDate::from_ymd_opt(year, month, 1).map(|first| Self { first })
    }

    pub fn of(date: NaiveDate) -> Self {
        Self {
            first: date.with_day(1).unwrap_or(date),
        }
    }

    pub fn year(&self) -> i32 {
        self.first.year()
    }

    pub fn month(&self) -> u32 {
        self.first.month()
    }

    pub fn first_day(&self) -> NaiveDate {
        self.first
    }

    pub fn last_day(&self) -> NaiveDate {
        self.first
            .checked_add_months(Months::new(1))
            .and_then(|next| next.pred_opt())
            .unwrap_or(self.first)
    }

    /// The month `n` months earlier.
    pub fn minus(&self, n: u32) -> Option<Self> {
        self.first
            .checked_sub_months(Months::new(n))
            .and_then(|d| Self::new(d.year(), d.month()))
    }

    pub fn previous(&self) -> Option<Self> {
        self.minus(1)
    }

    /// Short display label, e.g. `Apr '25`.
    pub fn label(&self) -> String {
        month_label(self.first)
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year(), self.month())
    }
}

impl FromStr for YearMonth {
    type Err = String;

    /// Parses `YYYY-MM`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (y, m) = s
            .split_once('-')
            .ok_or_else(|| format!("expected YYYY-MM, got {s}"))?;
        let year: i32 = y.parse().map_err(|_| format!("invalid year in {s}"))?;
        let month: u32 = m.parse().map_err(|_| format!("invalid month in {s}"))?;
        Self::new(year, month).ok_or_else(|| format!("month out of range: {s}"))
    }
}

/// Ending calendar year of the fiscal year containing `date`.
pub fn fiscal_year(date: NaiveDate) -> i32 {
    if date.month() >= FISCAL_START_MONTH {
        date.year() + 1
    } else {
        date.year()
    }
}

/// `FY25` for any date from 2024-04-01 to 2025-03-31.
pub fn fiscal_year_label(date: NaiveDate) -> String {
    format!("FY{:02}", fiscal_year(date).rem_euclid(100))
}

/// Q1 = Apr-Jun, Q2 = Jul-Sep, Q3 = Oct-Dec, Q4 = Jan-Mar.
pub fn fiscal_quarter(date: NaiveDate) -> u32 {
    match date.month() {
        4..=6 => 1,
        7..=9 => 2,
        10..=12 => 3,
        _ => 4,
    }
}

/// `Q1 FY26` for April 2025.
pub fn fiscal_quarter_label(date: NaiveDate) -> String {
    format!("Q{} {}", fiscal_quarter(date), fiscal_year_label(date))
}

pub fn month_label(date: NaiveDate) -> String {
    date.format("%b '%y").to_string()
}

/// Date `n` months before `date`, clamped to the end of shorter months.
pub fn months_before(date: NaiveDate, n: u32) -> NaiveDate {
    date.checked_sub_months(Months::new(n))
        .unwrap_or(NaiveDate::MIN)
}

/// Upstream wire format for report dates, e.g. `28-Feb-2025`.
pub fn format_report_date(date: NaiveDate) -> String {
    date.format("%d-%b-%Y").to_string()
}

/// Decides which dates are unlikely to have published NAV/AUM data.
pub trait TradingCalendar: Send + Sync {
    fn is_likely_non_trading(&self, date: NaiveDate) -> bool;
}

fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Saturdays and Sundays only; no holiday knowledge.
#[derive(Debug, Clone, Copy, Default)]
pub struct WeekendCalendar;

impl TradingCalendar for WeekendCalendar {
    fn is_likely_non_trading(&self, date: NaiveDate) -> bool {
        is_weekend(date)
    }
}

/// Weekends plus an explicit list of market holidays.
#[derive(Debug, Clone, Default)]
pub struct HolidayCalendar {
    holidays: BTreeSet<NaiveDate>,
}

impl HolidayCalendar {
    pub fn new(holidays: impl IntoIterator<Item = NaiveDate>) -> Self {
        Self {
            holidays: holidays.into_iter().collect(),
        }
    }
}

impl TradingCalendar for HolidayCalendar {
    fn is_likely_non_trading(&self, date: NaiveDate) -> bool {
        is_weekend(date) || self.holidays.contains(&date)
    }
}

/// Last day of `month` that the calendar considers a trading day.
///
/// Falls back to the last calendar day if every day of the month is flagged.
pub fn last_business_day<C: TradingCalendar + ?Sized>(month: YearMonth, calendar: &C) -> NaiveDate {
    let first = month.first_day();
    let mut day = month.last_day();
    while calendar.is_likely_non_trading(day) {
        match day.pred_opt() {
            Some(prev) if prev >= first => day = prev,
            _ => return month.last_day(),
        }
    }
    day
}

/// Retry dates for `from`: each of the `attempts` preceding calendar days,
/// moved back over non-trading days, nearest first and without repeats.
///
/// The window stays within `attempts` calendar days of `from` plus the
/// stretch of closed days before the earliest offset.
pub fn fallback_dates<C: TradingCalendar + ?Sized>(
    from: NaiveDate,
    attempts: usize,
    calendar: &C,
) -> Vec<NaiveDate> {
    let mut dates: Vec<NaiveDate> = Vec::with_capacity(attempts);

    for offset in 1..=attempts {
        let Some(day) = from.checked_sub_days(Days::new(offset as u64)) else {
            break;
        };
        let Some(day) = previous_trading_day(day, calendar) else {
            continue;
        };
        if !dates.contains(&day) {
            dates.push(day);
        }
    }

    dates
}

/// `day` itself, or the nearest earlier day the calendar does not flag.
///
/// Gives up after two weeks of flagged days.
fn previous_trading_day<C: TradingCalendar + ?Sized>(mut day: NaiveDate, calendar: &C) -> Option<NaiveDate> {
    for _ in 0..MAX_CLOSED_RUN {
        if !calendar.is_likely_non_trading(day) {
            return Some(day);
        }
        day = day.pred_opt()?;
    }
    None
}

/// `target` and the `count` months preceding it, oldest first.
pub fn backfill_months(target: YearMonth, count: u32) -> Vec<YearMonth> {
    (0..=count)
        .rev()
        .filter_map(|i| target.minus(i))
        .collect()
}
