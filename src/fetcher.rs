//! Upstream snapshot source
//!
//! Provides scheme-level NAV and AUM for one report date, one sub-category and
//! one fund-house filter per call.
//!
//! ## API Reference
//!
//! Endpoint: `POST {base}/fundperformance`
//!
//! ```json
//! {"maturityType": 1, "category": 1, "subCategory": 3, "mfid": 17, "reportDate": "28-Feb-2025"}
//! ```
//!
//! `mfid = 0` returns every fund house. A response is only usable when
//! `validationMsg == "SUCCESS"`.

use crate::error::FetchError;
use crate::types::Category;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use std::time::Duration;

pub const DEFAULT_API_BASE: &str = "https://www.amfiindia.com/gateway/pollingsebi/api/amfi/";

/// Open-ended schemes only
const MATURITY_TYPE_OPEN: u32 = 1;

const EQUITY_SUBCATEGORIES: &[(u32, &str)] = &[
    (1, "Large Cap"),
    (2, "Large & Mid Cap"),
    (3, "Flexi Cap"),
    (4, "Multi Cap"),
    (5, "Mid Cap"),
    (6, "Small Cap"),
    (7, "Value"),
    (8, "ELSS"),
    (9, "Contra"),
    (10, "Dividend Yield"),
    (11, "Focused"),
    (12, "Sectoral / Thematic"),
];

const HYBRID_SUBCATEGORIES: &[(u32, &str)] = &[
    (30, "Aggressive Hybrid"),
    (31, "Conservative Hybrid"),
    (32, "Equity Savings"),
    (33, "Arbitrage"),
    (34, "Multi Asset Allocation"),
    (35, "Dynamic Asset Allocation / Balanced Advantage"),
    (40, "Balanced Hybrid"),
];

/// Upstream category id.
pub fn category_id(category: Category) -> u32 {
    match category {
        Category::Equity => 1,
        Category::Hybrid => 3,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubCategory {
    pub id: u32,
    pub name: &'static str,
    pub category: Category,
}

/// Every equity then hybrid sub-category, in upstream order.
pub fn sub_categories() -> Vec<SubCategory> {
    let equity = EQUITY_SUBCATEGORIES.iter().map(|(id, name)| SubCategory {
        id: *id,
        name: *name,
        category: Category::Equity,
    });
    let hybrid = HYBRID_SUBCATEGORIES.iter().map(|(id, name)| SubCategory {
        id: *id,
        name: *name,
        category: Category::Hybrid,
    });
    equity.chain(hybrid).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FundHouseFilter {
    /// Industry mode
    All,
    /// One upstream fund-house id
    Only(u32),
}

impl FundHouseFilter {
    /// Wire value; 0 is the upstream sentinel for "all fund houses".
    pub fn mfid(&self) -> u32 {
        match self {
            FundHouseFilter::All => 0,
            FundHouseFilter::Only(id) => *id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotQuery {
    pub report_date: NaiveDate,
    pub sub_category: SubCategory,
    pub fund_house: FundHouseFilter,
}

/// One scheme row as returned upstream.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSchemeRecord {
    pub scheme_name: String,
    pub scheme_code: Option<String>,
    pub nav_regular: Option<f64>,
    pub nav_direct: Option<f64>,
    pub aum: Option<f64>,
}

/// Source of scheme snapshots.
///
/// An empty vector means "nothing published for this date"; callers try the
/// next fallback date. Errors are treated the same way.
#[async_trait]
pub trait SnapshotFetcher: Send + Sync {
    async fn fetch(&self, query: &SnapshotQuery) -> Result<Vec<RawSchemeRecord>, FetchError>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FundPerformanceRequest {
    maturity_type: u32,
    category: u32,
    sub_category: u32,
    mfid: u32,
    report_date: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FundPerformanceResponse {
    validation_msg: Option<String>,
    #[serde(default)]
    error_msgs: Option<serde_json::Value>,
    #[serde(default)]
    data: Option<Vec<FundPerformanceRow>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FundPerformanceRow {
    #[serde(default)]
    scheme_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    nav_regular: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    nav_direct: Option<f64>,
    #[serde(default, rename = "dailyAUM", deserialize_with = "lenient_f64")]
    daily_aum: Option<f64>,
}

/// Accepts numbers, numeric strings, `null` and empty strings.
fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n.as_f64(),
        Some(serde_json::Value::String(s)) => s.trim().replace(',', "").parse().ok(),
        _ => None,
    })
}

/// Decode a `fundperformance` response body.
pub fn parse_fund_performance(body: &str) -> Result<Vec<RawSchemeRecord>, FetchError> {
    let response: FundPerformanceResponse =
        serde_json::from_str(body).map_err(|e| FetchError::Decode(e.to_string()))?;

    if response.validation_msg.as_deref() != Some("SUCCESS") {
        let detail = response
            .error_msgs
            .map(|v| v.to_string())
            .or(response.validation_msg)
            .unwrap_or_else(|| "missing validationMsg".to_string());
        return Err(FetchError::Rejected(detail));
    }

    Ok(response
        .data
        .unwrap_or_default()
        .into_iter()
        .filter_map(|row| {
            let scheme_name = row.scheme_name?.trim().to_string();
            if scheme_name.is_empty() {
                return None;
            }
            Some(RawSchemeRecord {
                scheme_name,
                scheme_code: None,
                nav_regular: row.nav_regular,
                nav_direct: row.nav_direct,
                aum: row.daily_aum,
            })
        })
        .collect())
}

/// HTTP client for the AMFI fund performance API.
pub struct AmfiClient {
    client: reqwest::Client,
    base_url: String,
}

impl AmfiClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
            )
            .build()?;

        let mut base_url = base_url.into();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }

        Ok(Self { client, base_url })
    }
}

#[async_trait]
impl SnapshotFetcher for AmfiClient {
    async fn fetch(&self, query: &SnapshotQuery) -> Result<Vec<RawSchemeRecord>, FetchError> {
        let url = format!("{}fundperformance", self.base_url);
        let payload = FundPerformanceRequest {
            maturity_type: MATURITY_TYPE_OPEN,
            category: category_id(query.sub_category.category),
            sub_category: query.sub_category.id,
            mfid: query.fund_house.mfid(),
            report_date: crate::calendar::format_report_date(query.report_date),
        };

        let response = self
            .client
            .post(&url)
            .header("Accept", "application/json, text/plain, */*")
            .header("Origin", "https://www.amfiindia.com")
            .header("Referer", "https://www.amfiindia.com/polling/amfi/")
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(FetchError::Status(response.status().as_u16()));
        }

        let body = response.text().await?;
        parse_fund_performance(&body)
    }
}
