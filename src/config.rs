//! Pipeline configuration from environment variables

use crate::acquisition::{AcquisitionPolicy, Attribution};
use crate::db::FlowTable;
use crate::fetcher::{FundHouseFilter, DEFAULT_API_BASE};
use crate::fund_house;
use std::env;
use std::time::Duration;

/// ICICI Prudential
pub const DEFAULT_AMC_ID: u32 = 17;

/// Which slice of the market a pipeline run covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineMode {
    /// One fund house, by upstream id
    Amc { id: u32 },
    /// Every fund house
    Industry,
}

impl PipelineMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineMode::Amc { .. } => "amc",
            PipelineMode::Industry => "industry",
        }
    }

    /// `amc` or `industry`, case-insensitive.
    pub fn parse(s: &str, amc_id: u32) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "amc" => Some(PipelineMode::Amc { id: amc_id }),
            "industry" => Some(PipelineMode::Industry),
            _ => None,
        }
    }

    pub fn fund_house_filter(&self) -> FundHouseFilter {
        match self {
            PipelineMode::Amc { id } => FundHouseFilter::Only(*id),
            PipelineMode::Industry => FundHouseFilter::All,
        }
    }

    pub fn flow_table(&self) -> FlowTable {
        match self {
            PipelineMode::Amc { .. } => FlowTable::Amc,
            PipelineMode::Industry => FlowTable::Industry,
        }
    }

    pub fn attribution(&self) -> Attribution {
        match self {
            PipelineMode::Amc { id } => Attribution::Fixed(amc_display_name(*id)),
            PipelineMode::Industry => Attribution::ByPrefix,
        }
    }

    pub fn default_db_path(&self) -> &'static str {
        match self {
            PipelineMode::Amc { .. } => "data/mf_flows.db",
            PipelineMode::Industry => "data/mf_flows_industry.db",
        }
    }
}

fn amc_display_name(id: u32) -> String {
    fund_house::amc_name(id)
        .map(fund_house::short_name)
        .unwrap_or_else(|| format!("AMC {}", id))
}

/// Configuration for pipeline runs
///
/// Loaded from environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Explicit SQLite path; `None` means the mode's default
    pub db_path: Option<String>,

    pub mode: PipelineMode,

    /// Upstream API base URL
    pub api_base: String,

    pub http_timeout_secs: u64,

    /// Pause between sub-category requests in milliseconds
    pub request_delay_ms: u64,

    /// Pause between months of a backfill in milliseconds
    pub month_delay_ms: u64,

    /// Earlier trading days tried when month end has no data
    pub fallback_days: usize,
}

impl PipelineConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `MFFLOW_DB_PATH` (default: per mode, see [`PipelineMode::default_db_path`])
    /// - `MFFLOW_MODE` (default: amc)
    /// - `MFFLOW_AMC_ID` (default: 17)
    /// - `MFFLOW_API_BASE` (default: AMFI gateway)
    /// - `MFFLOW_HTTP_TIMEOUT_SECS` (default: 60)
    /// - `MFFLOW_REQUEST_DELAY_MS` (default: 300)
    /// - `MFFLOW_MONTH_DELAY_MS` (default: 1000)
    /// - `MFFLOW_FALLBACK_DAYS` (default: 4)
    pub fn from_env() -> Self {
        Self::from_vars(|key| env::var(key).ok())
    }

    fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        let amc_id = var("MFFLOW_AMC_ID")
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_AMC_ID);

        let mode = var("MFFLOW_MODE")
            .and_then(|s| PipelineMode::parse(&s, amc_id))
            .unwrap_or(PipelineMode::Amc { id: amc_id });

        Self {
            db_path: var("MFFLOW_DB_PATH").filter(|s| !s.trim().is_empty()),

            mode,

            api_base: var("MFFLOW_API_BASE").unwrap_or_else(|| DEFAULT_API_BASE.to_string()),

            http_timeout_secs: var("MFFLOW_HTTP_TIMEOUT_SECS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(60),

            request_delay_ms: var("MFFLOW_REQUEST_DELAY_MS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(300),

            month_delay_ms: var("MFFLOW_MONTH_DELAY_MS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(1_000),

            fallback_days: var("MFFLOW_FALLBACK_DAYS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(4),
        }
    }

    pub fn db_path(&self) -> &str {
        self.db_path
            .as_deref()
            .unwrap_or_else(|| self.mode.default_db_path())
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn month_delay(&self) -> Duration {
        Duration::from_millis(self.month_delay_ms)
    }

    pub fn acquisition_policy(&self) -> AcquisitionPolicy {
        AcquisitionPolicy {
            fund_house: self.mode.fund_house_filter(),
            attribution: self.mode.attribution(),
            request_delay: Duration::from_millis(self.request_delay_ms),
            fallback_days: self.fallback_days,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> PipelineConfig {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        PipelineConfig::from_vars(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_default_config() {
        let config = config_from(&[]);

        assert_eq!(config.mode, PipelineMode::Amc { id: 17 });
        assert_eq!(config.db_path(), "data/mf_flows.db");
        assert_eq!(config.api_base, DEFAULT_API_BASE);
        assert_eq!(config.http_timeout(), Duration::from_secs(60));
        assert_eq!(config.request_delay_ms, 300);
        assert_eq!(config.month_delay(), Duration::from_millis(1_000));
        assert_eq!(config.fallback_days, 4);

        let policy = config.acquisition_policy();
        assert_eq!(policy.fund_house, FundHouseFilter::Only(17));
        assert_eq!(policy.attribution, Attribution::Fixed("ICICI Pru".to_string()));
    }

    #[test]
    fn test_industry_mode_defaults() {
        let config = config_from(&[("MFFLOW_MODE", "Industry")]);

        assert_eq!(config.mode, PipelineMode::Industry);
        assert_eq!(config.db_path(), "data/mf_flows_industry.db");
        assert_eq!(config.mode.flow_table(), FlowTable::Industry);

        let policy = config.acquisition_policy();
        assert_eq!(policy.fund_house, FundHouseFilter::All);
        assert_eq!(policy.attribution, Attribution::ByPrefix);
    }

    #[test]
    fn test_custom_config() {
        let config = config_from(&[
            ("MFFLOW_DB_PATH", "/tmp/flows.db"),
            ("MFFLOW_AMC_ID", "36"),
            ("MFFLOW_REQUEST_DELAY_MS", "0"),
            ("MFFLOW_FALLBACK_DAYS", "6"),
        ]);

        assert_eq!(config.mode, PipelineMode::Amc { id: 36 });
        assert_eq!(config.db_path(), "/tmp/flows.db");
        assert_eq!(config.request_delay_ms, 0);
        assert_eq!(config.fallback_days, 6);
        assert_eq!(
            config.acquisition_policy().attribution,
            Attribution::Fixed("SBI".to_string())
        );
    }

    #[test]
    fn test_invalid_values_fall_back_to_defaults() {
        let config = config_from(&[
            ("MFFLOW_MODE", "everything"),
            ("MFFLOW_FALLBACK_DAYS", "four"),
            ("MFFLOW_DB_PATH", "  "),
        ]);

        assert_eq!(config.mode, PipelineMode::Amc { id: DEFAULT_AMC_ID });
        assert_eq!(config.fallback_days, 4);
        assert_eq!(config.db_path(), "data/mf_flows.db");
    }

    #[test]
    fn test_unknown_amc_id_display_name() {
        assert_eq!(
            PipelineMode::Amc { id: 999 }.attribution(),
            Attribution::Fixed("AMC 999".to_string())
        );
    }

    #[test]
    fn test_from_env_reads_process_environment() {
        env::set_var("MFFLOW_MONTH_DELAY_MS", "25");
        let config = PipelineConfig::from_env();
        assert_eq!(config.month_delay_ms, 25);
        env::remove_var("MFFLOW_MONTH_DELAY_MS");
    }
}
