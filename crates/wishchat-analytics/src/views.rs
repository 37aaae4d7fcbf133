//! Searchable, sortable table views over snapshot data.

use crate::aggregations::{
    classify_status, flatten_chatbots, organization_tokens, usage_percent, SubscriptionStatus,
};
use chrono::NaiveDate;
use serde::Serialize;
use std::cmp::Ordering;
use std::str::FromStr;
use wishchat_core::types::{ActivityLogEntry, CouponCode, Organization, SubscriptionPlan};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrganizationSort {
    Name,
    Members,
    Chatbots,
    #[default]
    Tokens,
}

impl FromStr for OrganizationSort {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "name" => Ok(OrganizationSort::Name),
            "members" => Ok(OrganizationSort::Members),
            "chatbots" => Ok(OrganizationSort::Chatbots),
            "tokens" => Ok(OrganizationSort::Tokens),
            other => Err(format!(
                "unknown sort field '{}' (expected name, members, chatbots, tokens)",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChatbotSort {
    Name,
    Organization,
    #[default]
    Tokens,
}

impl FromStr for ChatbotSort {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "name" => Ok(ChatbotSort::Name),
            "organization" | "org" => Ok(ChatbotSort::Organization),
            "tokens" => Ok(ChatbotSort::Tokens),
            other => Err(format!(
                "unknown sort field '{}' (expected name, organization, tokens)",
                other
            )),
        }
    }
}

/// Case-insensitive substring match. An empty needle matches everything.
pub fn matches_search(haystack: &str, needle: &str) -> bool {
    let needle = needle.trim();
    needle.is_empty() || haystack.to_lowercase().contains(&needle.to_lowercase())
}

fn compare_names(a: &str, b: &str) -> Ordering {
    a.to_lowercase().cmp(&b.to_lowercase())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrganizationRow {
    pub id: i64,
    pub name: String,
    pub members: usize,
    pub chatbots: usize,
    pub tokens: i64,
}

/// Organizations matching `search` by name, stably sorted.
pub fn organization_table(
    organizations: &[Organization],
    search: &str,
    sort: OrganizationSort,
    order: SortOrder,
) -> Vec<OrganizationRow> {
    let mut rows: Vec<OrganizationRow> = organizations
        .iter()
        .filter(|org| matches_search(&org.name, search))
        .map(|org| OrganizationRow {
            id: org.id,
            name: org.name.clone(),
            members: org.organization_members.len(),
            chatbots: org.chatbots.len(),
            tokens: organization_tokens(org),
        })
        .collect();

    rows.sort_by(|a, b| {
        let ordering = match sort {
            OrganizationSort::Name => compare_names(&a.name, &b.name),
            OrganizationSort::Members => a.members.cmp(&b.members),
            OrganizationSort::Chatbots => a.chatbots.cmp(&b.chatbots),
            OrganizationSort::Tokens => a.tokens.cmp(&b.tokens),
        };
        order.apply(ordering)
    });
    rows
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatbotRow {
    pub id: i64,
    pub name: String,
    pub organization_id: i64,
    pub organization: String,
    pub tokens: i64,
    /// `None` when the payload carried no quota.
    pub status: Option<SubscriptionStatus>,
    /// Rounded percentage of the message limit used, capped at 100.
    pub usage_percent: Option<i64>,
}

/// Chatbots across organizations matching `search` by chatbot or organization name.
pub fn chatbot_table(
    organizations: &[Organization],
    search: &str,
    sort: ChatbotSort,
    order: SortOrder,
) -> Vec<ChatbotRow> {
    let mut rows: Vec<ChatbotRow> = flatten_chatbots(organizations)
        .into_iter()
        .filter(|c| {
            matches_search(&c.chatbot.name, search) || matches_search(c.organization_name, search)
        })
        .map(|c| ChatbotRow {
            id: c.chatbot.id,
            name: c.chatbot.name.clone(),
            organization_id: c.organization_id,
            organization: c.organization_name.to_string(),
            tokens: c.tokens(),
            status: c.chatbot.quota.as_ref().map(classify_status),
            usage_percent: c.chatbot.quota.as_ref().map(usage_percent),
        })
        .collect();

    rows.sort_by(|a, b| {
        let ordering = match sort {
            ChatbotSort::Name => compare_names(&a.name, &b.name),
            ChatbotSort::Organization => compare_names(&a.organization, &b.organization),
            ChatbotSort::Tokens => a.tokens.cmp(&b.tokens),
        };
        order.apply(ordering)
    });
    rows
}

/// `times_used / max_usage` clamped to `[0, 1]`, or 0 when unlimited.
pub fn coupon_usage_ratio(coupon: &CouponCode) -> f64 {
    if coupon.max_usage == 0 {
        return 0.0;
    }
    (coupon.times_used as f64 / coupon.max_usage as f64).clamp(0.0, 1.0)
}

pub fn is_coupon_exhausted(coupon: &CouponCode) -> bool {
    coupon.max_usage > 0 && coupon.times_used >= coupon.max_usage
}

pub fn filter_coupons<'a>(coupons: &'a [CouponCode], search: &str) -> Vec<&'a CouponCode> {
    coupons
        .iter()
        .filter(|c| matches_search(&c.code, search))
        .collect()
}

pub fn active_plans(plans: &[SubscriptionPlan]) -> Vec<&SubscriptionPlan> {
    plans.iter().filter(|p| p.is_active).collect()
}

/// Activity entries sharing one calendar day (UTC).
#[derive(Debug, Clone)]
pub struct DayGroup<'a> {
    pub date: NaiveDate,
    pub entries: Vec<&'a ActivityLogEntry>,
}

/// Group entries by day, newest day first and newest entry first within a day.
/// Days with no entry matching `search` are dropped.
pub fn group_logs_by_day<'a>(entries: &'a [ActivityLogEntry], search: &str) -> Vec<DayGroup<'a>> {
    let mut matching: Vec<&ActivityLogEntry> = entries
        .iter()
        .filter(|e| matches_search(&e.description, search))
        .collect();
    matching.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

    let mut groups: Vec<DayGroup<'a>> = Vec::new();
    for entry in matching {
        let date = entry.timestamp.date_naive();
        match groups.last_mut() {
            Some(group) if group.date == date => group.entries.push(entry),
            _ => groups.push(DayGroup {
                date,
                entries: vec![entry],
            }),
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use wishchat_core::types::{Chatbot, LogKind, OrganizationMember, Quota};

    fn organizations() -> Vec<Organization> {
        let mut acme = Organization::new(1, "Acme");
        acme.organization_token_count = Some(500);
        acme.organization_members = vec![OrganizationMember {
            email: "a@acme.test".into(),
        }];
        acme.chatbots = vec![Chatbot::new(10, "Support", 300), Chatbot::new(11, "Sales", 200)];
        acme.chatbots[0].quota = Some(Quota {
            messages_used: 250,
            message_limit: 1000,
            is_paid: true,
            ..Default::default()
        });

        let mut beta = Organization::new(2, "beta labs");
        beta.organization_token_count = Some(500);
        beta.chatbots = vec![Chatbot::new(20, "Helper", 500)];

        let zeta = Organization::new(3, "Zeta");
        vec![acme, beta, zeta]
    }

    #[test]
    fn test_matches_search_case_insensitive() {
        assert!(matches_search("Acme Corp", "acme"));
        assert!(matches_search("Acme Corp", "  "));
        assert!(!matches_search("Acme Corp", "beta"));
    }

    #[test]
    fn test_organization_table_sort_by_tokens_stable() {
        let rows = organization_table(&organizations(), "", OrganizationSort::Tokens, SortOrder::Desc);
        let names: Vec<&str> = rows.iter().map(|r| r.name.as_str()).collect();
        // Acme and beta tie on tokens and keep input order.
        assert_eq!(names, vec!["Acme", "beta labs", "Zeta"]);
    }

    #[test]
    fn test_organization_table_sort_by_name_and_search() {
        let rows = organization_table(&organizations(), "", OrganizationSort::Name, SortOrder::Asc);
        let names: Vec<&str> = rows.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Acme", "beta labs", "Zeta"]);

        let rows = organization_table(&organizations(), "LAB", OrganizationSort::Name, SortOrder::Asc);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].chatbots, 1);
    }

    #[test]
    fn test_organization_table_sort_by_chatbots() {
        let rows =
            organization_table(&organizations(), "", OrganizationSort::Chatbots, SortOrder::Asc);
        let counts: Vec<usize> = rows.iter().map(|r| r.chatbots).collect();
        assert_eq!(counts, vec![0, 1, 2]);
    }

    #[test]
    fn test_chatbot_table_search_matches_organization() {
        let rows = chatbot_table(&organizations(), "acme", ChatbotSort::Tokens, SortOrder::Desc);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].name, "Support");
        assert_eq!(rows[0].status, Some(SubscriptionStatus::Paid));
        assert_eq!(rows[0].usage_percent, Some(25));
        assert_eq!(rows[1].status, None);
    }

    #[test]
    fn test_chatbot_table_usage_capped_at_limit() {
        let mut orgs = organizations();
        orgs[0].chatbots[0].quota = Some(Quota {
            messages_used: 1500,
            message_limit: 1000,
            ..Default::default()
        });
        let rows = chatbot_table(&orgs, "Support", ChatbotSort::Name, SortOrder::Asc);
        assert_eq!(rows[0].usage_percent, Some(100));
    }

    #[test]
    fn test_chatbot_table_sort_by_organization() {
        let rows = chatbot_table(&organizations(), "", ChatbotSort::Organization, SortOrder::Desc);
        let orgs: Vec<&str> = rows.iter().map(|r| r.organization.as_str()).collect();
        assert_eq!(orgs, vec!["beta labs", "Acme", "Acme"]);
    }

    #[test]
    fn test_sort_field_parsing() {
        assert_eq!("Tokens".parse::<OrganizationSort>().unwrap(), OrganizationSort::Tokens);
        assert_eq!("org".parse::<ChatbotSort>().unwrap(), ChatbotSort::Organization);
        assert!("size".parse::<ChatbotSort>().is_err());
    }

    fn coupon(code: &str, used: i64, max: i64) -> CouponCode {
        CouponCode {
            id: None,
            code: code.into(),
            discount_percent: "10.00".into(),
            max_usage: max,
            times_used: used,
            is_active: true,
        }
    }

    #[test]
    fn test_coupon_helpers() {
        assert_eq!(coupon_usage_ratio(&coupon("A", 5, 10)), 0.5);
        assert_eq!(coupon_usage_ratio(&coupon("A", 5, 0)), 0.0);
        assert!(is_coupon_exhausted(&coupon("A", 10, 10)));
        assert!(!is_coupon_exhausted(&coupon("A", 10, 0)));

        let coupons = vec![coupon("SPRING10", 0, 5), coupon("WINTER", 0, 5)];
        assert_eq!(filter_coupons(&coupons, "spring").len(), 1);
    }

    #[test]
    fn test_active_plans() {
        let plan = |name: &str, active: bool| SubscriptionPlan {
            id: None,
            name: name.into(),
            price: "100.00".into(),
            message_limit: 100,
            trial_days: 0,
            is_active: active,
            is_lifetime: false,
            auto_reset_quota: false,
        };
        let plans = vec![plan("Basic", true), plan("Legacy", false)];
        let active = active_plans(&plans);
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].name, "Basic");
    }

    #[test]
    fn test_group_logs_by_day() {
        let entry = |id: &str, day: u32, hour: u32, text: &str| ActivityLogEntry {
            id: id.into(),
            timestamp: Utc.with_ymd_and_hms(2025, 4, day, hour, 0, 0).unwrap(),
            user: "admin".into(),
            kind: LogKind::Other,
            description: text.into(),
            metadata: None,
        };
        let entries = vec![
            entry("1", 1, 9, "Created plan Basic"),
            entry("2", 2, 8, "Boosted chatbot"),
            entry("3", 2, 17, "Created coupon"),
            entry("4", 1, 12, "Boosted chatbot"),
        ];

        let groups = group_logs_by_day(&entries, "");
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].date, NaiveDate::from_ymd_opt(2025, 4, 2).unwrap());
        assert_eq!(groups[0].entries[0].id, "3");
        assert_eq!(groups[1].entries.len(), 2);

        let groups = group_logs_by_day(&entries, "created");
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].entries.len(), 1);

        assert!(group_logs_by_day(&entries, "nothing").is_empty());
    }
}
