//! Analytics, aggregation, and reporting over wishchat platform snapshots.
//!
//! Turns organization, chatbot, and token usage payloads into ranked lists,
//! grouped chart series, percentage breakdowns, status badges, and markdown
//! reports. Nothing here performs I/O or keeps state between calls.

pub mod aggregations;
pub mod reports;
pub mod views;

pub use aggregations::{
    build_month_series, classify_status, flatten_chatbots, group_top_with_others, is_quota_low,
    organization_summary, percentage_of, plan_validity, rank_by_metric, usage_percent, usage_ratio,
    LabeledValue, OrganizationSummary, OverviewStats, PlanValidity, SubscriptionStatus,
    TaggedChatbot,
};
pub use reports::{DashboardData, ReportGenerator};
