//! Mutual fund net-flow pipeline
//!
//! Fetches month-end NAV and AUM snapshots for open-ended equity and hybrid
//! schemes, estimates per-scheme net investor flows, stores them in SQLite and
//! rolls them up into monthly, quarterly and fiscal-year views.

pub mod acquisition;
pub mod calendar;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod export;
pub mod fetcher;
pub mod flow;
pub mod fund_house;
pub mod period;
pub mod summary;
pub mod types;

pub use calendar::{HolidayCalendar, TradingCalendar, WeekendCalendar, YearMonth};
pub use config::{PipelineConfig, PipelineMode};
pub use db::{FlowStore, FlowTable, SqliteFlowStore};
pub use engine::{BackfillReport, FlowPipeline, MonthOutcome};
pub use error::{FetchError, PipelineError, StoreError};
pub use fetcher::{AmfiClient, SnapshotFetcher};
pub use period::{aggregate, GroupDimension, Granularity, PeriodAggregate};
pub use types::{Category, FlowRecord, RunLogEntry, SchemeId, SchemeSnapshot};
