//! Markdown and plain-text report generation from snapshot data.

use crate::aggregations::{
    low_quota_chatbots, organization_distribution, organization_tokens, percentage_of,
    status_breakdown, token_split, token_trend, top_chatbots, top_organizations, usage_percent,
    OverviewStats,
};
use chrono::NaiveDate;
use std::collections::BTreeMap;
use wishchat_core::config::DashboardConfig;
use wishchat_core::types::{MonthKey, OrganizationOverview, TokenUsagePeriod};

/// Inputs for one dashboard report.
pub struct DashboardData<'a> {
    pub overview: &'a OrganizationOverview,
    /// Platform usage for the reference month, if fetched.
    pub usage: Option<&'a TokenUsagePeriod>,
    pub history: &'a BTreeMap<MonthKey, TokenUsagePeriod>,
    /// Any day in the reporting month.
    pub reference: NaiveDate,
}

/// Report generator for creating markdown summaries.
pub struct ReportGenerator;

impl ReportGenerator {
    /// Generate the full dashboard report.
    pub fn dashboard_report(data: &DashboardData<'_>, config: &DashboardConfig) -> String {
        let organizations = &data.overview.organizations;
        let stats = OverviewStats::from_overview(data.overview);
        let month = MonthKey::from_date(data.reference);

        let mut report = String::new();
        report.push_str(&format!(
            "# Dashboard Report\n\n**{}**\n\n",
            month.long_label()
        ));

        // Overview.
        report.push_str("## Overview\n\n");
        report.push_str(&format!(
            "- **Organizations:** {} ({} active)\n",
            format_number(stats.organization_count),
            stats.active_organizations
        ));
        report.push_str(&format!("- **Active Ratio:** {}%\n", stats.active_ratio));
        report.push_str(&format!("- **Chatbots:** {}\n", stats.total_chatbots));
        report.push_str(&format!("- **Members:** {}\n", stats.total_members));
        match data.usage {
            Some(usage) => {
                let split = token_split(usage);
                report.push_str(&format!(
                    "- **Total Tokens:** {}\n",
                    format_number(usage.total_tokens)
                ));
                report.push_str(&format!(
                    "- **Input Tokens:** {} ({:.1}%)\n",
                    format_number(usage.input_tokens),
                    split.input_share
                ));
                report.push_str(&format!(
                    "- **Output Tokens:** {} ({:.1}%)\n",
                    format_number(usage.output_tokens),
                    split.output_share
                ));
            }
            None => report.push_str("- **Total Tokens:** -\n"),
        }
        report.push_str(&format!(
            "- **Avg Tokens per Organization:** {}\n",
            format_number(stats.average_tokens_per_organization)
        ));
        report.push_str(&format!(
            "- **Max Organization Tokens:** {}\n\n",
            format_number(stats.max_organization_tokens)
        ));

        // Top organizations.
        let top_orgs = top_organizations(organizations, config.top_organizations);
        if !top_orgs.is_empty() {
            report.push_str("## Top Organizations\n\n");
            report.push_str("| # | Organization | Chatbots | Tokens |\n");
            report.push_str("|---|--------------|----------|--------|\n");
            for (i, org) in top_orgs.iter().enumerate() {
                report.push_str(&format!(
                    "| {} | {} | {} | {} |\n",
                    i + 1,
                    org.name,
                    org.chatbots.len(),
                    format_number(organization_tokens(org))
                ));
            }
            report.push('\n');
        }

        // Top chatbots.
        let top_bots = top_chatbots(organizations, config.top_chatbots);
        if !top_bots.is_empty() {
            report.push_str("## Top Chatbots\n\n");
            report.push_str("| # | Chatbot | Organization | Tokens |\n");
            report.push_str("|---|---------|--------------|--------|\n");
            for (i, bot) in top_bots.iter().enumerate() {
                report.push_str(&format!(
                    "| {} | {} | {} | {} |\n",
                    i + 1,
                    bot.chatbot.name,
                    bot.organization_name,
                    format_number(bot.tokens())
                ));
            }
            report.push('\n');
        }

        // Distribution.
        let distribution =
            organization_distribution(organizations, config.pie_slices, &config.others_label);
        if !distribution.is_empty() {
            let total: i64 = distribution.iter().map(|d| d.value).sum();
            report.push_str("## Token Distribution\n\n");
            report.push_str("| Organization | Tokens | Share |\n");
            report.push_str("|--------------|--------|-------|\n");
            for slice in &distribution {
                report.push_str(&format!(
                    "| {} | {} | {}% |\n",
                    slice.label,
                    format_number(slice.value),
                    percentage_of(slice.value, total)
                ));
            }
            report.push('\n');
        }

        // Trend.
        let trend = token_trend(data.reference, config.trend_months, data.history, data.usage);
        if !trend.is_empty() {
            report.push_str("## Token Trend\n\n");
            report.push_str("| Month | Input | Output | Total |\n");
            report.push_str("|-------|-------|--------|-------|\n");
            for point in &trend {
                match point.usage {
                    Some(usage) => report.push_str(&format!(
                        "| {} | {} | {} | {} |\n",
                        point.label,
                        format_number(usage.input_tokens),
                        format_number(usage.output_tokens),
                        format_number(usage.total_tokens)
                    )),
                    None => report.push_str(&format!("| {} | - | - | - |\n", point.label)),
                }
            }
            report.push('\n');
        }

        // Subscription status.
        if stats.total_chatbots > 0 {
            report.push_str("## Subscription Status\n\n");
            report.push_str("| Status | Chatbots |\n");
            report.push_str("|--------|----------|\n");
            for (status, count) in status_breakdown(organizations) {
                report.push_str(&format!("| {} | {} |\n", status.label(), count));
            }
            report.push('\n');
        }

        // Low quota.
        let low = low_quota_chatbots(organizations);
        if !low.is_empty() {
            report.push_str("## Low Quota\n\n");
            for bot in &low {
                if let Some(quota) = &bot.chatbot.quota {
                    report.push_str(&format!(
                        "- `{}` ({}): {} / {} messages ({}%)\n",
                        bot.chatbot.name,
                        bot.organization_name,
                        format_number(quota.messages_used),
                        format_number(quota.message_limit),
                        usage_percent(quota)
                    ));
                }
            }
            report.push('\n');
        }

        report
    }

    /// Generate a compact summary suitable for a terminal.
    pub fn text_summary(data: &DashboardData<'_>, config: &DashboardConfig) -> String {
        let organizations = &data.overview.organizations;
        let stats = OverviewStats::from_overview(data.overview);
        let month = MonthKey::from_date(data.reference);

        let mut output = String::new();
        output.push_str(&format!("  {}:\n", month.long_label()));
        output.push_str(&format!(
            "    Organizations: {} ({} active)  Chatbots: {}  Members: {}\n",
            stats.organization_count,
            stats.active_organizations,
            stats.total_chatbots,
            stats.total_members
        ));

        match data.usage {
            Some(usage) => {
                let split = token_split(usage);
                output.push_str(&format!(
                    "    Tokens: {} (input {:.1}%, output {:.1}%)\n",
                    format_number(usage.total_tokens),
                    split.input_share,
                    split.output_share
                ));
            }
            None => output.push_str("    Tokens: no usage data\n"),
        }

        let top = top_organizations(organizations, config.top_organizations.min(5));
        if !top.is_empty() {
            output.push_str("  Top organizations:");
            for org in &top {
                output.push_str(&format!(
                    " {}({})",
                    org.name,
                    format_number(organization_tokens(org))
                ));
            }
            output.push('\n');
        }

        let low = low_quota_chatbots(organizations);
        if !low.is_empty() {
            output.push_str(&format!("  Chatbots low on quota: {}\n", low.len()));
        }

        output
    }
}

/// Format an integer with comma thousands separators.
pub fn format_number(value: i64) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if value < 0 {
        format!("-{}", grouped)
    } else {
        grouped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wishchat_core::types::{Chatbot, Organization, Quota};

    fn overview() -> OrganizationOverview {
        let mut acme = Organization::new(1, "Acme");
        acme.organization_token_count = Some(1500);
        acme.chatbots = vec![Chatbot::new(10, "Support", 1000), Chatbot::new(11, "Sales", 500)];
        acme.chatbots[0].quota = Some(Quota {
            messages_used: 950,
            message_limit: 1000,
            is_lifetime: true,
            ..Default::default()
        });

        let mut beta = Organization::new(2, "Beta");
        beta.organization_token_count = Some(500);
        beta.chatbots = vec![Chatbot::new(20, "Helper", 500)];

        OrganizationOverview {
            organization_count: Some(2),
            organizations: vec![acme, beta],
        }
    }

    fn reference() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 4, 15).unwrap()
    }

    #[test]
    fn test_dashboard_report_structure() {
        let overview = overview();
        let usage = TokenUsagePeriod::new(1500, 500);
        let history = BTreeMap::new();
        let data = DashboardData {
            overview: &overview,
            usage: Some(&usage),
            history: &history,
            reference: reference(),
        };

        let report = ReportGenerator::dashboard_report(&data, &DashboardConfig::default());
        assert!(report.contains("# Dashboard Report"));
        assert!(report.contains("**April 2025**"));
        assert!(report.contains("- **Total Tokens:** 2,000"));
        assert!(report.contains("- **Active Ratio:** 100%"));
        assert!(report.contains("(75.0%)"));
        assert!(report.contains("## Top Organizations"));
        assert!(report.contains("| 1 | Acme | 2 | 1,500 |"));
        assert!(report.contains("| 1 | Support | Acme | 1,000 |"));
        assert!(report.contains("| Acme | 1,500 | 75% |"));
        assert!(report.contains("| Mar | - | - | - |"));
        assert!(report.contains("| Apr | 1,500 | 500 | 2,000 |"));
        assert!(report.contains("| Lifetime | 1 |"));
        assert!(report.contains("`Support` (Acme): 950 / 1,000 messages (95%)"));
    }

    #[test]
    fn test_dashboard_report_groups_others() {
        let overview = overview();
        let history = BTreeMap::new();
        let data = DashboardData {
            overview: &overview,
            usage: None,
            history: &history,
            reference: reference(),
        };
        let config = DashboardConfig {
            pie_slices: 1,
            ..Default::default()
        };

        let report = ReportGenerator::dashboard_report(&data, &config);
        assert!(report.contains("| Others | 500 | 25% |"));
        assert!(report.contains("- **Total Tokens:** -"));
    }

    #[test]
    fn test_empty_dashboard_report() {
        let overview = OrganizationOverview::default();
        let history = BTreeMap::new();
        let data = DashboardData {
            overview: &overview,
            usage: None,
            history: &history,
            reference: reference(),
        };

        let report = ReportGenerator::dashboard_report(&data, &DashboardConfig::default());
        assert!(report.contains("## Overview"));
        assert!(report.contains("- **Organizations:** 0 (0 active)"));
        assert!(!report.contains("## Top Organizations"));
        assert!(!report.contains("## Subscription Status"));
        assert!(report.contains("## Token Trend"));
    }

    #[test]
    fn test_text_summary() {
        let overview = overview();
        let history = BTreeMap::new();
        let data = DashboardData {
            overview: &overview,
            usage: None,
            history: &history,
            reference: reference(),
        };

        let summary = ReportGenerator::text_summary(&data, &DashboardConfig::default());
        assert!(summary.contains("April 2025:"));
        assert!(summary.contains("Organizations: 2 (2 active)"));
        assert!(summary.contains("no usage data"));
        assert!(summary.contains("Acme(1,500)"));
        assert!(summary.contains("Chatbots low on quota: 1"));
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1234567), "1,234,567");
        assert_eq!(format_number(-45000), "-45,000");
    }
}
