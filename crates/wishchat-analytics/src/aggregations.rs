//! Derived analytics over organization, chatbot, and token usage snapshots.
//!
//! Every function here is pure and total: inputs are borrowed, nothing is
//! cached between calls, and empty collections or zero denominators produce
//! a default instead of an error.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::cmp::Reverse;
use std::collections::BTreeMap;
use wishchat_core::types::{
    Chatbot, MonthKey, Organization, OrganizationOverview, Quota, TokenUsagePeriod,
};

/// Usage ratio above which a quota is flagged as running low.
pub const LOW_QUOTA_THRESHOLD: f64 = 0.8;

/// Default label of the overflow bucket.
pub const OTHERS_LABEL: &str = "Others";

/// A `{label, value}` pair handed to chart and table renderers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabeledValue {
    pub label: String,
    pub value: i64,
}

impl LabeledValue {
    pub fn new(label: impl Into<String>, value: i64) -> Self {
        Self {
            label: label.into(),
            value,
        }
    }
}

/// Sort descending by `metric` and keep the first `n`.
///
/// The sort is stable, so equal metrics keep their input order.
pub fn rank_by_metric<T, F>(items: &[T], metric: F, n: usize) -> Vec<T>
where
    T: Clone,
    F: Fn(&T) -> i64,
{
    let mut keyed: Vec<(i64, &T)> = items.iter().map(|item| (metric(item), item)).collect();
    keyed.sort_by_key(|(value, _)| Reverse(*value));
    keyed
        .into_iter()
        .take(n)
        .map(|(_, item)| item.clone())
        .collect()
}

/// Top `top_count` items by metric plus one overflow bucket summing the rest.
///
/// The overflow bucket is omitted when nothing remains, so the returned
/// values always sum to the input total.
pub fn group_top_with_others<T, L, M>(
    items: &[T],
    label: L,
    metric: M,
    top_count: usize,
    others_label: &str,
) -> Vec<LabeledValue>
where
    L: Fn(&T) -> String,
    M: Fn(&T) -> i64,
{
    let mut keyed: Vec<(i64, &T)> = items.iter().map(|item| (metric(item), item)).collect();
    keyed.sort_by_key(|(value, _)| Reverse(*value));

    let split = top_count.min(keyed.len());
    let (top, rest) = keyed.split_at(split);

    let mut grouped: Vec<LabeledValue> = top
        .iter()
        .map(|(value, item)| LabeledValue::new(label(item), *value))
        .collect();

    if !rest.is_empty() {
        let others: i64 = rest.iter().map(|(value, _)| *value).sum();
        grouped.push(LabeledValue::new(others_label, others));
    }
    grouped
}

/// `round(part / total * 100)`, or 0 when `total` is 0.
pub fn percentage_of(part: i64, total: i64) -> i64 {
    if total == 0 {
        return 0;
    }
    (part as f64 / total as f64 * 100.0).round() as i64
}

/// Percentage to one decimal place, or 0.0 when `total` is 0.
pub fn share_of(part: i64, total: i64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (part as f64 / total as f64 * 1000.0).round() / 10.0
}

/// A chatbot tagged with its owning organization.
#[derive(Debug, Clone, Copy)]
pub struct TaggedChatbot<'a> {
    pub organization_id: i64,
    pub organization_name: &'a str,
    pub chatbot: &'a Chatbot,
}

impl TaggedChatbot<'_> {
    pub fn tokens(&self) -> i64 {
        self.chatbot.chatbot_token_count
    }
}

/// Every chatbot across `organizations`, in organization order then chatbot order.
pub fn flatten_chatbots(organizations: &[Organization]) -> Vec<TaggedChatbot<'_>> {
    organizations
        .iter()
        .flat_map(|org| {
            org.chatbots.iter().map(move |chatbot| TaggedChatbot {
                organization_id: org.id,
                organization_name: org.name.as_str(),
                chatbot,
            })
        })
        .collect()
}

/// `messages_used / message_limit` clamped to `[0, 1]`, or 0 when the limit is 0.
pub fn usage_ratio(quota: &Quota) -> f64 {
    if quota.message_limit == 0 {
        return 0.0;
    }
    (quota.messages_used as f64 / quota.message_limit as f64).clamp(0.0, 1.0)
}

/// Whole-percent form of [`usage_ratio`], so it never exceeds 100.
pub fn usage_percent(quota: &Quota) -> i64 {
    (usage_ratio(quota) * 100.0).round() as i64
}

/// True when usage is strictly above [`LOW_QUOTA_THRESHOLD`].
pub fn is_quota_low(quota: &Quota) -> bool {
    usage_ratio(quota) > LOW_QUOTA_THRESHOLD
}

/// Messages left including any temporary boost, never negative.
pub fn remaining_messages(quota: &Quota) -> i64 {
    quota
        .message_limit
        .saturating_add(quota.temporary_message_boost)
        .saturating_sub(quota.messages_used)
        .max(0)
}

/// Whole days from `today` until the trial ends, floored at 0.
/// `None` when the quota has no trial end date.
pub fn trial_days_remaining(quota: &Quota, today: NaiveDate) -> Option<i64> {
    quota
        .trial_end_date
        .map(|end| (end.date_naive() - today).num_days().max(0))
}

/// When the current plan of a quota ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PlanValidity {
    ValidUntil(DateTime<Utc>),
    ExpiredOn(DateTime<Utc>),
    /// Lifetime plans, or no end date in the payload.
    NotApplicable,
}

/// End of the paid subscription or trial, following the same precedence as
/// [`classify_status`]. Absent dates mean "not applicable".
pub fn plan_validity(quota: &Quota) -> PlanValidity {
    let (end, valid) = if quota.is_lifetime {
        return PlanValidity::NotApplicable;
    } else if quota.is_paid {
        (quota.subscription_end_date, quota.is_subscription_valid)
    } else if quota.is_trial {
        (quota.trial_end_date, quota.is_trial_valid)
    } else {
        return PlanValidity::NotApplicable;
    };
    match end {
        Some(date) if valid => PlanValidity::ValidUntil(date),
        Some(date) => PlanValidity::ExpiredOn(date),
        None => PlanValidity::NotApplicable,
    }
}

/// The single subscription badge shown for a quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum SubscriptionStatus {
    Lifetime,
    Paid,
    TrialActive,
    TrialExpired,
    NoSubscription,
}

impl SubscriptionStatus {
    pub const ALL: [SubscriptionStatus; 5] = [
        SubscriptionStatus::Lifetime,
        SubscriptionStatus::Paid,
        SubscriptionStatus::TrialActive,
        SubscriptionStatus::TrialExpired,
        SubscriptionStatus::NoSubscription,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            SubscriptionStatus::Lifetime => "Lifetime",
            SubscriptionStatus::Paid => "Paid",
            SubscriptionStatus::TrialActive => "Trial Active",
            SubscriptionStatus::TrialExpired => "Trial Expired",
            SubscriptionStatus::NoSubscription => "No Subscription",
        }
    }
}

/// Lifetime wins over paid, paid over trial.
pub fn classify_status(quota: &Quota) -> SubscriptionStatus {
    if quota.is_lifetime {
        SubscriptionStatus::Lifetime
    } else if quota.is_paid {
        SubscriptionStatus::Paid
    } else if quota.is_trial {
        if quota.is_trial_valid {
            SubscriptionStatus::TrialActive
        } else {
            SubscriptionStatus::TrialExpired
        }
    } else {
        SubscriptionStatus::NoSubscription
    }
}

/// `month_count` consecutive months ending at the month of `reference`, oldest first.
pub fn month_keys(reference: NaiveDate, month_count: usize) -> Vec<MonthKey> {
    let mut keys = Vec::with_capacity(month_count);
    let mut current = Some(MonthKey::from_date(reference));
    for _ in 0..month_count {
        let Some(key) = current else {
            break;
        };
        keys.push(key);
        current = key.pred();
    }
    keys.reverse();
    keys
}

/// Short month labels for a chart x-axis, oldest first ("Dec", "Jan", ...).
pub fn build_month_series(reference: NaiveDate, month_count: usize) -> Vec<String> {
    month_keys(reference, month_count)
        .iter()
        .map(|key| key.short_label().to_string())
        .collect()
}

/// A month picker option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthOption {
    /// `YYYY-MM`
    pub value: String,
    /// "April 2025"
    pub label: String,
}

/// Picker options for the last `count` months, newest first.
pub fn month_options(reference: NaiveDate, count: usize) -> Vec<MonthOption> {
    month_keys(reference, count)
        .into_iter()
        .rev()
        .map(|key| MonthOption {
            value: key.to_string(),
            label: key.long_label(),
        })
        .collect()
}

/// Token count for an organization.
///
/// The server-provided count is authoritative; the sum of chatbot counts is
/// used only when the field is absent.
pub fn organization_tokens(organization: &Organization) -> i64 {
    organization.organization_token_count.unwrap_or_else(|| {
        organization
            .chatbots
            .iter()
            .map(|c| c.chatbot_token_count)
            .sum()
    })
}

/// Headline numbers for the dashboard cards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OverviewStats {
    pub organization_count: i64,
    /// Organizations with at least one chatbot.
    pub active_organizations: usize,
    pub total_chatbots: usize,
    pub total_members: usize,
    pub total_tokens: i64,
    /// Rounded mean tokens per organization (0 when there are none).
    pub average_tokens_per_organization: i64,
    pub max_organization_tokens: i64,
    /// Rounded percent of `organization_count` that used any tokens.
    pub active_ratio: i64,
}

impl OverviewStats {
    pub fn from_overview(overview: &OrganizationOverview) -> Self {
        let organizations = &overview.organizations;
        let organization_count = overview
            .organization_count
            .unwrap_or(organizations.len() as i64);
        let total_tokens: i64 = organizations.iter().map(organization_tokens).sum();
        let average_tokens_per_organization = if organization_count > 0 {
            (total_tokens as f64 / organization_count as f64).round() as i64
        } else {
            0
        };

        let with_tokens = organizations
            .iter()
            .filter(|org| organization_tokens(org) > 0)
            .count() as i64;

        Self {
            organization_count,
            active_organizations: organizations
                .iter()
                .filter(|org| !org.chatbots.is_empty())
                .count(),
            total_chatbots: organizations.iter().map(|org| org.chatbots.len()).sum(),
            total_members: organizations
                .iter()
                .map(|org| org.organization_members.len())
                .sum(),
            total_tokens,
            average_tokens_per_organization,
            max_organization_tokens: organizations
                .iter()
                .map(organization_tokens)
                .max()
                .unwrap_or(0),
            active_ratio: percentage_of(with_tokens, organization_count),
        }
    }
}

/// Input/output share of a period's total, in percent to one decimal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TokenSplit {
    pub input_share: f64,
    pub output_share: f64,
}

pub fn token_split(period: &TokenUsagePeriod) -> TokenSplit {
    TokenSplit {
        input_share: share_of(period.input_tokens, period.total_tokens),
        output_share: share_of(period.output_tokens, period.total_tokens),
    }
}

/// Two-slice pie data for input vs output tokens.
pub fn token_split_slices(period: &TokenUsagePeriod) -> Vec<LabeledValue> {
    vec![
        LabeledValue::new("Input Tokens", period.input_tokens),
        LabeledValue::new("Output Tokens", period.output_tokens),
    ]
}

/// Organizations with tokens, ranked, with the tail folded into one bucket.
pub fn organization_distribution(
    organizations: &[Organization],
    slices: usize,
    others_label: &str,
) -> Vec<LabeledValue> {
    let with_tokens: Vec<&Organization> = organizations
        .iter()
        .filter(|org| organization_tokens(org) > 0)
        .collect();
    tracing::debug!(
        "Distribution over {} of {} organizations, {} named slices",
        with_tokens.len(),
        organizations.len(),
        slices.min(with_tokens.len())
    );
    group_top_with_others(
        &with_tokens,
        |org| org.name.clone(),
        |org| organization_tokens(org),
        slices,
        others_label,
    )
}

/// Highest-token organizations, skipping those with no usage.
pub fn top_organizations(organizations: &[Organization], n: usize) -> Vec<&Organization> {
    let with_tokens: Vec<&Organization> = organizations
        .iter()
        .filter(|org| organization_tokens(org) > 0)
        .collect();
    rank_by_metric(&with_tokens, |org| organization_tokens(org), n)
}

/// Highest-token chatbots across all organizations, skipping those with no usage.
pub fn top_chatbots(organizations: &[Organization], n: usize) -> Vec<TaggedChatbot<'_>> {
    let with_tokens: Vec<TaggedChatbot<'_>> = flatten_chatbots(organizations)
        .into_iter()
        .filter(|c| c.tokens() > 0)
        .collect();
    rank_by_metric(&with_tokens, TaggedChatbot::tokens, n)
}

/// Chatbots whose quota is running low, in flatten order.
pub fn low_quota_chatbots(organizations: &[Organization]) -> Vec<TaggedChatbot<'_>> {
    flatten_chatbots(organizations)
        .into_iter()
        .filter(|c| c.chatbot.quota.as_ref().is_some_and(is_quota_low))
        .collect()
}

/// Chatbot count per subscription status, in [`SubscriptionStatus::ALL`] order.
/// Chatbots without a quota count as having no subscription.
pub fn status_breakdown(organizations: &[Organization]) -> Vec<(SubscriptionStatus, usize)> {
    status_counts(organizations.iter().flat_map(|org| org.chatbots.iter()))
}

/// Chatbot count per subscription status for any set of chatbots.
pub fn status_counts<'a>(
    chatbots: impl IntoIterator<Item = &'a Chatbot>,
) -> Vec<(SubscriptionStatus, usize)> {
    let mut counts: BTreeMap<SubscriptionStatus, usize> = BTreeMap::new();
    for chatbot in chatbots {
        let status = chatbot
            .quota
            .as_ref()
            .map(classify_status)
            .unwrap_or(SubscriptionStatus::NoSubscription);
        *counts.entry(status).or_insert(0) += 1;
    }
    SubscriptionStatus::ALL
        .iter()
        .map(|status| (*status, counts.get(status).copied().unwrap_or(0)))
        .collect()
}

/// Detail numbers for one organization.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrganizationSummary {
    pub id: i64,
    pub name: String,
    pub tokens: i64,
    pub chatbots: usize,
    pub members: usize,
    /// Chatbots whose quota currently allows sending.
    pub can_send: usize,
    pub statuses: Vec<(SubscriptionStatus, usize)>,
}

pub fn organization_summary(organization: &Organization) -> OrganizationSummary {
    OrganizationSummary {
        id: organization.id,
        name: organization.name.clone(),
        tokens: organization_tokens(organization),
        chatbots: organization.chatbots.len(),
        members: organization.organization_members.len(),
        can_send: organization
            .chatbots
            .iter()
            .filter(|c| c.quota.as_ref().is_some_and(|q| q.can_send_message))
            .count(),
        statuses: status_counts(&organization.chatbots),
    }
}

/// Input/output/total for one month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TokenTotals {
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub total_tokens: i64,
}

impl From<&TokenUsagePeriod> for TokenTotals {
    fn from(period: &TokenUsagePeriod) -> Self {
        Self {
            input_tokens: period.input_tokens,
            output_tokens: period.output_tokens,
            total_tokens: period.total_tokens,
        }
    }
}

/// One x-axis point of the monthly token trend.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
    pub month: String,
    pub label: String,
    /// `None` when no usage was fetched for that month.
    pub usage: Option<TokenTotals>,
}

/// Monthly token trend ending at `reference`, oldest first.
///
/// Months are filled from `history`; the reference month falls back to
/// `current` when history lacks it. Anything else stays `None`.
pub fn token_trend(
    reference: NaiveDate,
    month_count: usize,
    history: &BTreeMap<MonthKey, TokenUsagePeriod>,
    current: Option<&TokenUsagePeriod>,
) -> Vec<TrendPoint> {
    let reference_key = MonthKey::from_date(reference);
    month_keys(reference, month_count)
        .into_iter()
        .map(|key| {
            let usage = history
                .get(&key)
                .or(if key == reference_key { current } else { None })
                .map(TokenTotals::from);
            TrendPoint {
                month: key.to_string(),
                label: key.short_label().to_string(),
                usage,
            }
        })
        .collect()
}
