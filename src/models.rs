use crate::dates::shift_month;
use crate::error::AppError;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Organization id + API key. Lives in memory for the session only.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub organization_id: String,
    pub api_key: String,
}

impl Credentials {
    pub fn new(organization_id: &str, api_key: &str) -> Result<Self, AppError> {
        let organization_id = organization_id.trim();
        let api_key = api_key.trim();
        if organization_id.is_empty() || api_key.is_empty() {
            return Err(AppError::missing_credentials());
        }
        Ok(Self {
            organization_id: organization_id.to_string(),
            api_key: api_key.to_string(),
        })
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("organization_id", &self.organization_id)
            .field("api_key", &"***")
            .finish()
    }
}

/// `YYYY-MM-DD` or `YYYY-MM`. Zero-padded, so string order is chronological.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DateKey(String);

impl DateKey {
    pub fn day(date: NaiveDate) -> Self {
        Self(date.format("%Y-%m-%d").to_string())
    }

    pub fn month(year: i32, month: u32) -> Self {
        Self(format!("{year:04}-{month:02}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DateKey {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DateUnit {
    Day,
    Month,
}

/// A range selection: the last `count` days, or the month `count - 1` months back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Query {
    pub unit: DateUnit,
    pub count: u32,
}

impl Query {
    pub const PRESETS: [Query; 6] = [
        Query::days(1),
        Query::days(3),
        Query::days(7),
        Query::months(1),
        Query::months(2),
        Query::months(3),
    ];

    pub const fn days(count: u32) -> Self {
        Self {
            unit: DateUnit::Day,
            count,
        }
    }

    pub const fn months(count: u32) -> Self {
        Self {
            unit: DateUnit::Month,
            count,
        }
    }

    pub fn as_label(self) -> String {
        match self.unit {
            DateUnit::Day => format!("{}d", self.count),
            DateUnit::Month => format!("{}m", self.count),
        }
    }

    /// Human label: `Today`, `Last N days` or the `YYYY/MM` of the selected month.
    pub fn display_label(self, today: NaiveDate) -> String {
        match self.unit {
            DateUnit::Day if self.count == 1 => "Today".into(),
            DateUnit::Day => format!("Last {} days", self.count),
            DateUnit::Month => {
                let back = i64::from(self.count.max(1)) - 1;
                let (year, month) = shift_month(today.year(), today.month(), -back);
                format!("{year:04}/{month:02}")
            }
        }
    }
}

impl FromStr for Query {
    type Err = AppError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let raw = raw.trim().to_ascii_lowercase();
        let invalid = || {
            AppError::Validation(
                "Unsupported window. Use Nd for days or Nm for months, e.g. 7d or 1m.".into(),
            )
        };
        let Some(suffix) = raw.chars().last() else {
            return Err(invalid());
        };
        let digits = &raw[..raw.len() - suffix.len_utf8()];
        let count: u32 = digits.parse().map_err(|_| invalid())?;
        if count == 0 {
            return Err(invalid());
        }
        match suffix {
            'd' => Ok(Query::days(count)),
            'm' => Ok(Query::months(count)),
            _ => Err(invalid()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrgUser {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TextUsage {
    pub n_requests: u64,
    pub n_context_tokens_total: u64,
    pub n_generated_tokens_total: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WhisperUsage {
    pub num_requests: u64,
    pub num_seconds: f64,
}

/// Raw `/v1/usage` payload for one user on one day.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UsagePayload {
    pub data: Vec<TextUsage>,
    pub ft_data: Vec<Value>,
    pub dalle_api_data: Vec<Value>,
    pub whisper_api_data: Vec<WhisperUsage>,
    pub current_usage_usd: f64,
}

impl UsagePayload {
    pub fn has_activity(&self) -> bool {
        !self.data.is_empty()
            || !self.ft_data.is_empty()
            || !self.dalle_api_data.is_empty()
            || !self.whisper_api_data.is_empty()
            || self.current_usage_usd > 0.0
    }
}

#[derive(Debug, Clone)]
pub struct UserUsage {
    pub user_id: String,
    pub user_name: String,
    pub usage: UsagePayload,
}

/// Raw per-user results grouped by day, before summarizing.
pub type UsageByDate = BTreeMap<DateKey, Vec<UserUsage>>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SummaryEntry {
    pub n_requests: u64,
    pub total_tokens: u64,
    pub average_tokens: f64,
    pub whisper_total_requests: u64,
    pub whisper_total_seconds: f64,
    pub whisper_average_seconds: f64,
}

/// user name -> date -> summary, dates ascending.
pub type SummaryTable = BTreeMap<String, BTreeMap<DateKey, SummaryEntry>>;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LineItem {
    pub name: String,
    pub cost: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DailyCost {
    pub timestamp: f64,
    pub line_items: Vec<LineItem>,
}

/// Raw `/dashboard/billing/usage` payload. Costs are in cents.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BillingUsage {
    pub daily_costs: Vec<DailyCost>,
}

/// Category label -> one cost per day in `days`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LineItemSeries {
    pub days: Vec<DateKey>,
    pub series: BTreeMap<String, Vec<f64>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn credentials_require_both_values() {
        assert!(Credentials::new("org-1", "sk-1").is_ok());
        let err = Credentials::new("org-1", "  ").expect_err("blank key rejected");
        assert!(matches!(err, AppError::Validation(_)));
        assert!(Credentials::new("", "sk-1").is_err());
    }

    #[test]
    fn credentials_debug_hides_api_key() {
        let creds = Credentials::new("org-1", "sk-secret").expect("valid credentials");
        let rendered = format!("{creds:?}");
        assert!(rendered.contains("org-1"));
        assert!(!rendered.contains("sk-secret"));
    }

    #[test]
    fn query_parses_days_and_months() {
        assert_eq!("7d".parse::<Query>().expect("7d"), Query::days(7));
        assert_eq!(" 2M ".parse::<Query>().expect("2m"), Query::months(2));
        assert!("0d".parse::<Query>().is_err());
        assert!("7w".parse::<Query>().is_err());
        assert!("d".parse::<Query>().is_err());
        assert!("".parse::<Query>().is_err());
        assert!("7é".parse::<Query>().is_err());
        assert!("é".parse::<Query>().is_err());
    }

    #[test]
    fn query_display_labels_follow_selection() {
        let today = date(2024, 1, 15);
        assert_eq!(Query::days(1).display_label(today), "Today");
        assert_eq!(Query::days(3).display_label(today), "Last 3 days");
        assert_eq!(Query::months(1).display_label(today), "2024/01");
        assert_eq!(Query::months(2).display_label(today), "2023/12");
    }

    #[test]
    fn payload_activity_checks_every_section() {
        assert!(!UsagePayload::default().has_activity());
        let billed = UsagePayload {
            current_usage_usd: 0.02,
            ..UsagePayload::default()
        };
        assert!(billed.has_activity());
        let images = UsagePayload {
            dalle_api_data: vec![serde_json::json!({ "num_images": 1 })],
            ..UsagePayload::default()
        };
        assert!(images.has_activity());
    }

    #[test]
    fn date_keys_order_chronologically() {
        assert!(DateKey::day(date(2023, 12, 31)) < DateKey::day(date(2024, 1, 1)));
        assert_eq!(DateKey::month(2024, 3).as_str(), "2024-03");
    }
}
