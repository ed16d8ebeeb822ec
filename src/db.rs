//! Flow store
//!
//! Tables (see `/sql/` directory):
//! - `monthly_snapshots` - raw snapshots used for each computation
//! - `monthly_flows` / `industry_flows` - per-scheme flow records, replaced per month
//! - `pipeline_log` - append-only run log
//!
//! Every per-month replace is a single transaction: either the new rows are
//! all visible or the previous rows are left untouched.

use crate::calendar::YearMonth;
use crate::error::StoreError;
use crate::types::{
    Category, FlowBasis, FlowRecord, RunLogEntry, RunStatus, SchemeId, SchemeSnapshot,
};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex, MutexGuard};

/// Schema files, applied in order. All use `IF NOT EXISTS`.
const MIGRATIONS: &[(&str, &str)] = &[
    (
        "01_monthly_snapshots.sql",
        include_str!("../sql/01_monthly_snapshots.sql"),
    ),
    (
        "02_monthly_flows.sql",
        include_str!("../sql/02_monthly_flows.sql"),
    ),
    (
        "03_industry_flows.sql",
        include_str!("../sql/03_industry_flows.sql"),
    ),
    (
        "04_pipeline_log.sql",
        include_str!("../sql/04_pipeline_log.sql"),
    ),
];

/// Apply the bundled schema. Idempotent.
pub fn run_schema_migrations(conn: &Connection) -> Result<(), StoreError> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    log::debug!("📊 Enabled WAL mode for SQLite database");

    log::debug!("🔧 Running schema migrations");
    for (filename, sql) in MIGRATIONS {
        log::debug!("   ├─ Executing: {}", filename);
        conn.execute_batch(sql)?;
    }
    log::debug!("   └─ ✅ {} migrations applied", MIGRATIONS.len());

    Ok(())
}

/// Which flow table a store reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowTable {
    /// Single fund house, keyed by (scheme, month end)
    Amc,
    /// All fund houses, keyed by (fund house, scheme, month end)
    Industry,
}

impl FlowTable {
    pub fn name(&self) -> &'static str {
        match self {
            FlowTable::Amc => "monthly_flows",
            FlowTable::Industry => "industry_flows",
        }
    }
}

/// Durable storage for snapshots, flow records and the run log.
#[async_trait]
pub trait FlowStore: Send + Sync {
    /// Replace every flow record whose month end falls in `month`.
    ///
    /// Returns the number of rows written.
    async fn replace_flows(&self, month: YearMonth, records: &[FlowRecord]) -> Result<usize, StoreError>;

    /// Replace every snapshot whose report date falls in `month`.
    async fn replace_snapshots(
        &self,
        month: YearMonth,
        snapshots: &[SchemeSnapshot],
    ) -> Result<usize, StoreError>;

    /// Replace the snapshots of each listed month and the flows of `month`
    /// in one transaction. Nothing changes if any write fails.
    async fn replace_month(
        &self,
        month: YearMonth,
        snapshots: &[(YearMonth, &[SchemeSnapshot])],
        records: &[FlowRecord],
    ) -> Result<usize, StoreError>;

    async fn append_run_log(&self, entry: &RunLogEntry) -> Result<(), StoreError>;

    /// Flow records with `month_end >= since`, oldest first.
    async fn load_flows_since(&self, since: NaiveDate) -> Result<Vec<FlowRecord>, StoreError>;

    async fn load_snapshots(&self, month: YearMonth) -> Result<Vec<SchemeSnapshot>, StoreError>;

    /// Distinct stored month ends, newest first.
    async fn available_periods(&self) -> Result<Vec<NaiveDate>, StoreError>;

    /// Latest run-log entries, newest first.
    async fn recent_run_log(&self, limit: usize) -> Result<Vec<RunLogEntry>, StoreError>;
}

/// SQLite implementation of [`FlowStore`]
pub struct SqliteFlowStore {
    conn: Arc<Mutex<Connection>>,
    table: FlowTable,
}

impl SqliteFlowStore {
    /// Open (or create) the database at `db_path` and apply the schema.
    pub fn open(db_path: &str, table: FlowTable) -> Result<Self, StoreError> {
        let conn = Connection::open(db_path)?;
        run_schema_migrations(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            table,
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }
}

/// Raw flow row before the text columns are validated.
struct FlowRow {
    record: FlowRecord,
    category: String,
    basis: String,
}

fn parse_category(value: String) -> Result<Category, StoreError> {
    Category::parse(&value).ok_or(StoreError::Corrupt {
        column: "category",
        value,
    })
}

/// Delete `month` from `table` and insert `records`. Runs inside the caller's transaction.
fn write_flows(
    conn: &Connection,
    table: FlowTable,
    month: YearMonth,
    records: &[FlowRecord],
) -> Result<usize, StoreError> {
    let table = table.name();
    let deleted = conn.execute(
        &format!("DELETE FROM {table} WHERE month_end BETWEEN ?1 AND ?2"),
        params![month.first_day(), month.last_day()],
    )?;

    let mut stmt = conn.prepare(&format!(
        "INSERT OR REPLACE INTO {table} (
            fund_house, scheme_name, scheme_code, category, sub_category,
            month_end, prev_month_end, nav_cur, nav_prev, nav_return,
            aum_cur_cr, aum_prev_cr, expected_aum_cr, net_flow_cr, flow_pct, basis
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)"
    ))?;

    for r in records {
        stmt.execute(params![
            r.fund_house,
            r.scheme.name(),
            r.scheme.code(),
            r.category.as_str(),
            r.sub_category,
            r.month_end,
            r.prev_month_end,
            r.nav_cur,
            r.nav_prev,
            r.nav_return,
            r.aum_cur,
            r.aum_prev,
            r.expected_aum,
            r.net_flow,
            r.flow_pct,
            r.basis.as_str(),
        ])?;
    }

    log::debug!(
        "💾 {}: replaced {} rows with {} for {}",
        table,
        deleted,
        records.len(),
        month
    );
    Ok(records.len())
}

fn write_snapshots(
    conn: &Connection,
    month: YearMonth,
    snapshots: &[SchemeSnapshot],
) -> Result<usize, StoreError> {
    conn.execute(
        "DELETE FROM monthly_snapshots WHERE month_end BETWEEN ?1 AND ?2",
        params![month.first_day(), month.last_day()],
    )?;

    let mut stmt = conn.prepare(
        "INSERT OR REPLACE INTO monthly_snapshots (
            fund_house, scheme_name, scheme_code, category, sub_category,
            month_end, nav_regular, nav_direct, aum_cr
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
    )?;

    for s in snapshots {
        stmt.execute(params![
            s.fund_house,
            s.scheme.name(),
            s.scheme.code(),
            s.category.as_str(),
            s.sub_category,
            s.report_date,
            s.nav,
            s.nav_direct,
            s.aum,
        ])?;
    }

    Ok(snapshots.len())
}

#[async_trait]
impl FlowStore for SqliteFlowStore {
    async fn replace_flows(&self, month: YearMonth, records: &[FlowRecord]) -> Result<usize, StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let written = write_flows(&tx, self.table, month, records)?;
        tx.commit()?;
        Ok(written)
    }

    async fn replace_snapshots(
        &self,
        month: YearMonth,
        snapshots: &[SchemeSnapshot],
    ) -> Result<usize, StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let written = write_snapshots(&tx, month, snapshots)?;
        tx.commit()?;
        Ok(written)
    }

    async fn replace_month(
        &self,
        month: YearMonth,
        snapshots: &[(YearMonth, &[SchemeSnapshot])],
        records: &[FlowRecord],
    ) -> Result<usize, StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        for (snapshot_month, rows) in snapshots {
            write_snapshots(&tx, *snapshot_month, rows)?;
        }
        let written = write_flows(&tx, self.table, month, records)?;
        tx.commit()?;
        Ok(written)
    }

    async fn append_run_log(&self, entry: &RunLogEntry) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO pipeline_log (run_at, month_processed, schemes_updated, status, message)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                entry.run_at,
                entry.period,
                entry.record_count as i64,
                entry.status.as_str(),
                entry.message,
            ],
        )?;
        Ok(())
    }

    async fn load_flows_since(&self, since: NaiveDate) -> Result<Vec<FlowRecord>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT fund_house, scheme_name, scheme_code, category, sub_category,
                    month_end, prev_month_end, nav_cur, nav_prev, nav_return,
                    aum_cur_cr, aum_prev_cr, expected_aum_cr, net_flow_cr, flow_pct, basis
             FROM {}
             WHERE month_end >= ?1
             ORDER BY month_end, fund_house, scheme_name",
            self.table.name()
        ))?;

        let rows = stmt
            .query_map(params![since], |row| {
                let name: String = row.get(1)?;
                let code: Option<String> = row.get(2)?;
                let scheme = match code {
                    Some(code) => SchemeId::new(name).with_code(code),
                    None => SchemeId::new(name),
                };
                Ok(FlowRow {
                    category: row.get(3)?,
                    basis: row.get(15)?,
                    record: FlowRecord {
                        scheme,
                        fund_house: row.get(0)?,
                        // overwritten once the text column is validated
                        category: Category::Equity,
                        sub_category: row.get(4)?,
                        month_end: row.get(5)?,
                        prev_month_end: row.get(6)?,
                        nav_cur: row.get(7)?,
                        nav_prev: row.get(8)?,
                        nav_return: row.get(9)?,
                        aum_cur: row.get(10)?,
                        aum_prev: row.get(11)?,
                        expected_aum: row.get(12)?,
                        net_flow: row.get(13)?,
                        flow_pct: row.get(14)?,
                        basis: FlowBasis::NavAdjusted,
                    },
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|row| {
                let mut record = row.record;
                record.category = parse_category(row.category)?;
                record.basis = FlowBasis::parse(&row.basis).ok_or(StoreError::Corrupt {
                    column: "basis",
                    value: row.basis,
                })?;
                Ok(record)
            })
            .collect()
    }

    async fn load_snapshots(&self, month: YearMonth) -> Result<Vec<SchemeSnapshot>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT fund_house, scheme_name, scheme_code, category, sub_category,
                    month_end, nav_regular, nav_direct, aum_cr
             FROM monthly_snapshots
             WHERE month_end BETWEEN ?1 AND ?2
             ORDER BY fund_house, scheme_name",
        )?;

        let rows = stmt
            .query_map(params![month.first_day(), month.last_day()], |row| {
                let name: String = row.get(1)?;
                let code: Option<String> = row.get(2)?;
                let category: String = row.get(3)?;
                let snapshot = SchemeSnapshot {
                    scheme: match code {
                        Some(code) => SchemeId::new(name).with_code(code),
                        None => SchemeId::new(name),
                    },
                    fund_house: row.get(0)?,
                    category: Category::Equity,
                    sub_category: row.get(4)?,
                    report_date: row.get(5)?,
                    nav: row.get(6)?,
                    nav_direct: row.get(7)?,
                    aum: row.get(8)?,
                };
                Ok((category, snapshot))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(category, mut snapshot)| {
                snapshot.category = parse_category(category)?;
                Ok(snapshot)
            })
            .collect()
    }

    async fn available_periods(&self) -> Result<Vec<NaiveDate>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT DISTINCT month_end FROM {} ORDER BY month_end DESC",
            self.table.name()
        ))?;
        let periods = stmt
            .query_map([], |row| row.get::<_, NaiveDate>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(periods)
    }

    async fn recent_run_log(&self, limit: usize) -> Result<Vec<RunLogEntry>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT run_at, month_processed, schemes_updated, status, COALESCE(message, '')
             FROM pipeline_log
             ORDER BY id DESC
             LIMIT ?1",
        )?;

        let rows = stmt
            .query_map(params![limit as i64], |row| {
                Ok((
                    row.get::<_, DateTime<Utc>>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(run_at, period, count, status, message)| {
                let status = RunStatus::parse(&status).ok_or(StoreError::Corrupt {
                    column: "status",
                    value: status,
                })?;
                Ok(RunLogEntry {
                    run_at,
                    period,
                    record_count: usize::try_from(count).unwrap_or(0),
                    status,
                    message,
                })
            })
            .collect()
    }
}
