use chrono::{DateTime, Datelike, Month, Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::AdminError;

/// A member of an organization, identified only by email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationMember {
    pub email: String,
}

/// Lightweight reference to an organization, as embedded in chatbot payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationRef {
    pub id: i64,
    pub name: String,
}

/// A tenant account owning zero or more chatbots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Organization {
    pub id: i64,
    pub name: String,
    /// Server-provided token count for the period. May be absent on older payloads.
    #[serde(default)]
    pub organization_token_count: Option<i64>,
    #[serde(default)]
    pub organization_members: Vec<OrganizationMember>,
    #[serde(default)]
    pub chatbots: Vec<Chatbot>,
}

impl Organization {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            organization_token_count: None,
            organization_members: Vec::new(),
            chatbots: Vec::new(),
        }
    }

    pub fn to_ref(&self) -> OrganizationRef {
        OrganizationRef {
            id: self.id,
            name: self.name.clone(),
        }
    }
}

/// A deployed chatbot belonging to an organization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chatbot {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub chatbot_token_count: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization: Option<OrganizationRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quota: Option<Quota>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Chatbot {
    pub fn new(id: i64, name: impl Into<String>, tokens: i64) -> Self {
        Self {
            id,
            name: name.into(),
            chatbot_token_count: tokens,
            organization: None,
            quota: None,
            domain_name: None,
            created_at: None,
        }
    }
}

/// Message quota governing how many messages a chatbot may send.
///
/// Every field defaults when missing so that partial payloads still parse;
/// absent dates mean "not applicable".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Quota {
    pub messages_used: i64,
    pub message_limit: i64,
    pub temporary_message_boost: i64,
    pub is_trial: bool,
    pub is_paid: bool,
    pub is_lifetime: bool,
    pub is_sending_enabled: bool,
    pub is_trial_valid: bool,
    pub is_subscription_valid: bool,
    pub can_send_message: bool,
    pub grace_period_days: i64,
    pub subscription_plan: Option<i64>,
    pub trial_start_date: Option<DateTime<Utc>>,
    pub trial_end_date: Option<DateTime<Utc>>,
    pub subscription_end_date: Option<DateTime<Utc>>,
    pub last_reset: Option<DateTime<Utc>>,
    pub last_payment_date: Option<DateTime<Utc>>,
}

/// Response of the organization overview endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrganizationOverview {
    #[serde(default)]
    pub organization_count: Option<i64>,
    #[serde(default)]
    pub organizations: Vec<Organization>,
}

/// Token usage summary for one month (platform-wide or per chatbot).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenUsagePeriod {
    pub status: Option<String>,
    pub month: Option<MonthField>,
    pub year: Option<i32>,
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub total_tokens: i64,
    pub chatbot_id: Option<i64>,
    pub chatbot_name: Option<String>,
}

impl TokenUsagePeriod {
    pub fn new(input_tokens: i64, output_tokens: i64) -> Self {
        Self {
            input_tokens,
            output_tokens,
            total_tokens: input_tokens + output_tokens,
            ..Default::default()
        }
    }

    /// The month this payload covers, when it carries both `year` and `month`.
    pub fn month_key(&self) -> Option<MonthKey> {
        let year = self.year?;
        let month = self.month.as_ref()?.number()?;
        MonthKey::new(year, month).ok()
    }
}

/// Month of a usage payload. Platform usage sends a name or `YYYY-MM`,
/// per-chatbot usage sends a number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MonthField {
    Number(u32),
    Text(String),
}

impl MonthField {
    /// Month number 1..=12, if recognizable.
    pub fn number(&self) -> Option<u32> {
        match self {
            MonthField::Number(n) => Some(*n).filter(|n| (1..=12).contains(n)),
            MonthField::Text(text) => {
                let text = text.trim();
                if let Ok(key) = text.parse::<MonthKey>() {
                    return Some(key.month());
                }
                if let Ok(n) = text.parse::<u32>() {
                    return Some(n).filter(|n| (1..=12).contains(n));
                }
                text.parse::<Month>().ok().map(|m| m.number_from_month())
            }
        }
    }
}

/// A purchasable subscription plan.
///
/// The three flags combine freely; no exclusivity is enforced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionPlan {
    #[serde(default)]
    pub id: Option<i64>,
    pub name: String,
    /// Decimal string as sent by the API (e.g. "5000.00").
    pub price: String,
    pub message_limit: i64,
    #[serde(default)]
    pub trial_days: i64,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub is_lifetime: bool,
    #[serde(default)]
    pub auto_reset_quota: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubscriptionPlansResponse {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub plans: Vec<SubscriptionPlan>,
}

/// A discount coupon.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouponCode {
    #[serde(default)]
    pub id: Option<i64>,
    pub code: String,
    /// Decimal string as sent by the API (e.g. "15.00").
    pub discount_percent: String,
    #[serde(default)]
    pub max_usage: i64,
    #[serde(default)]
    pub times_used: i64,
    #[serde(default)]
    pub is_active: bool,
}

/// Kind tag for activity log entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogKind {
    Login,
    PlanActivation,
    PlanUpdate,
    StaffCreated,
    BoostAdded,
    SettingChanged,
    #[default]
    Other,
}

impl LogKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogKind::Login => "login",
            LogKind::PlanActivation => "plan_activation",
            LogKind::PlanUpdate => "plan_update",
            LogKind::StaffCreated => "staff_created",
            LogKind::BoostAdded => "boost_added",
            LogKind::SettingChanged => "setting_changed",
            LogKind::Other => "other",
        }
    }
}

impl fmt::Display for LogKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogKind {
    type Err = AdminError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "login" => Ok(LogKind::Login),
            "plan_activation" => Ok(LogKind::PlanActivation),
            "plan_update" => Ok(LogKind::PlanUpdate),
            "staff_created" => Ok(LogKind::StaffCreated),
            "boost_added" => Ok(LogKind::BoostAdded),
            "setting_changed" => Ok(LogKind::SettingChanged),
            "other" => Ok(LogKind::Other),
            other => Err(AdminError::ActivityLog(format!("unknown log kind: {}", other))),
        }
    }
}

/// One append-only entry in the activity log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityLogEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub user: String,
    #[serde(rename = "type")]
    pub kind: LogKind,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

/// Activity log record as returned by the server's activity endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiActivityLog {
    pub id: i64,
    pub activity: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActivityLogsResponse {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub logs: Vec<ApiActivityLog>,
}

impl From<ApiActivityLog> for ActivityLogEntry {
    fn from(log: ApiActivityLog) -> Self {
        Self {
            id: log.id.to_string(),
            timestamp: log.timestamp,
            user: "server".into(),
            kind: LogKind::Other,
            description: log.activity,
            metadata: None,
        }
    }
}

/// A calendar month, used as the period key for token usage queries (`YYYY-MM`).
///
/// Always holds the first day of the month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MonthKey {
    first_day: NaiveDate,
}

impl MonthKey {
    pub fn new(year: i32, month: u32) -> Result<Self, AdminError> {
        NaiveDate::from_ymd_opt(year, month, 1)
            .map(|first_day| Self { first_day })
            .ok_or_else(|| AdminError::InvalidMonth(format!("{}-{}", year, month)))
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            first_day: date.with_day(1).unwrap_or(date),
        }
    }

    pub fn year(&self) -> i32 {
        self.first_day.year()
    }

    /// 1..=12
    pub fn month(&self) -> u32 {
        self.first_day.month()
    }

    pub fn first_day(&self) -> NaiveDate {
        self.first_day
    }

    /// The month immediately before this one, `None` at the edge of the calendar.
    pub fn pred(self) -> Option<Self> {
        self.first_day
            .checked_sub_months(Months::new(1))
            .map(|first_day| Self { first_day })
    }

    /// Three-letter English month name ("Apr").
    pub fn short_label(&self) -> String {
        self.first_day.format("%b").to_string()
    }

    /// Full label with year ("April 2025").
    pub fn long_label(&self) -> String {
        self.first_day.format("%B %Y").to_string()
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.first_day.format("%Y-%m"))
    }
}

impl FromStr for MonthKey {
    type Err = AdminError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (year, month) = s
            .trim()
            .split_once('-')
            .ok_or_else(|| AdminError::InvalidMonth(s.to_string()))?;
        let year: i32 = year
            .parse()
            .map_err(|_| AdminError::InvalidMonth(s.to_string()))?;
        let month: u32 = month
            .parse()
            .map_err(|_| AdminError::InvalidMonth(s.to_string()))?;
        Self::new(year, month)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_organization_overview_parses_partial_payload() {
        let json = r#"{
            "organization_count": 2,
            "organizations": [
                {"id": 1, "name": "Acme", "organization_token_count": 150,
                 "organization_members": [{"email": "a@acme.test"}],
                 "chatbots": [{"id": 10, "name": "Helper", "chatbot_token_count": 150}]},
                {"id": 2, "name": "Empty"}
            ]
        }"#;
        let overview: OrganizationOverview = serde_json::from_str(json).unwrap();
        assert_eq!(overview.organizations.len(), 2);
        assert_eq!(overview.organizations[0].organization_token_count, Some(150));
        assert!(overview.organizations[1].chatbots.is_empty());
        assert!(overview.organizations[1].organization_members.is_empty());
        assert_eq!(overview.organizations[1].organization_token_count, None);
    }

    #[test]
    fn test_quota_defaults_missing_fields() {
        let json = r#"{"messages_used": 5, "message_limit": 100, "is_paid": true,
                       "subscription_end_date": null}"#;
        let quota: Quota = serde_json::from_str(json).unwrap();
        assert_eq!(quota.messages_used, 5);
        assert!(quota.is_paid);
        assert!(!quota.is_lifetime);
        assert!(quota.subscription_end_date.is_none());
        assert!(quota.trial_end_date.is_none());
    }

    #[test]
    fn test_log_kind_serde_and_parse() {
        let json = serde_json::to_string(&LogKind::BoostAdded).unwrap();
        assert_eq!(json, "\"boost_added\"");
        assert_eq!("plan_update".parse::<LogKind>().unwrap(), LogKind::PlanUpdate);
        assert!("nonsense".parse::<LogKind>().is_err());
    }

    #[test]
    fn test_api_activity_log_converts() {
        let json = r#"{"id": 7, "activity": "Plan created", "timestamp": "2025-04-01T10:00:00Z"}"#;
        let log: ApiActivityLog = serde_json::from_str(json).unwrap();
        let entry: ActivityLogEntry = log.into();
        assert_eq!(entry.id, "7");
        assert_eq!(entry.description, "Plan created");
        assert_eq!(entry.kind, LogKind::Other);
    }

    #[test]
    fn test_month_key_parse_and_display() {
        let key: MonthKey = "2025-04".parse().unwrap();
        assert_eq!(key, MonthKey::new(2025, 4).unwrap());
        assert_eq!((key.year(), key.month()), (2025, 4));
        assert_eq!(key.to_string(), "2025-04");
        assert_eq!(key.short_label(), "Apr");
        assert_eq!(key.long_label(), "April 2025");

        assert!("2025-13".parse::<MonthKey>().is_err());
        assert!("2025".parse::<MonthKey>().is_err());
        assert!("abcd-01".parse::<MonthKey>().is_err());
        assert!("2025-00".parse::<MonthKey>().is_err());
        assert!(MonthKey::new(2025, 0).is_err());
    }

    #[test]
    fn test_month_key_from_date_uses_first_day() {
        let date = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        let key = MonthKey::from_date(date);
        assert_eq!(key.first_day(), NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
        assert_eq!(key.short_label(), "Feb");
        assert_eq!(key.long_label(), "February 2024");
    }

    #[test]
    fn test_month_key_pred_wraps_year() {
        let jan = MonthKey::new(2025, 1).unwrap();
        assert_eq!(jan.pred(), Some(MonthKey::new(2024, 12).unwrap()));
        let may = MonthKey::new(2025, 5).unwrap();
        assert_eq!(may.pred(), Some(MonthKey::new(2025, 4).unwrap()));
        let earliest = MonthKey::from_date(NaiveDate::MIN);
        assert_eq!(earliest.pred(), None);
    }

    #[test]
    fn test_token_usage_month_accepts_number_or_text() {
        let per_chatbot: TokenUsagePeriod = serde_json::from_str(
            r#"{"chatbot_id": 4, "chatbot_name": "Helper", "year": 2025, "month": 4,
                "input_tokens": 30, "output_tokens": 10, "total_tokens": 40}"#,
        )
        .unwrap();
        assert_eq!(per_chatbot.month, Some(MonthField::Number(4)));
        assert_eq!(per_chatbot.month_key(), Some(MonthKey::new(2025, 4).unwrap()));

        let named: TokenUsagePeriod =
            serde_json::from_str(r#"{"year": 2025, "month": "March", "total_tokens": 5}"#).unwrap();
        assert_eq!(named.month_key(), Some(MonthKey::new(2025, 3).unwrap()));

        let keyed: TokenUsagePeriod =
            serde_json::from_str(r#"{"year": 2025, "month": "2025-02"}"#).unwrap();
        assert_eq!(keyed.month_key(), Some(MonthKey::new(2025, 2).unwrap()));

        let padded: TokenUsagePeriod =
            serde_json::from_str(r#"{"year": 2025, "month": "07"}"#).unwrap();
        assert_eq!(padded.month_key(), Some(MonthKey::new(2025, 7).unwrap()));

        let no_year: TokenUsagePeriod = serde_json::from_str(r#"{"month": 4}"#).unwrap();
        assert_eq!(no_year.month_key(), None);

        let bogus: TokenUsagePeriod =
            serde_json::from_str(r#"{"year": 2025, "month": 13}"#).unwrap();
        assert_eq!(bogus.month_key(), None);
    }
}
