//! Subcommand handlers. Rendering is split from I/O so output can be tested.

use crate::LogsAction;
use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use std::collections::HashSet;
use wishchat_analytics::aggregations::{
    classify_status, flatten_chatbots, low_quota_chatbots, month_options, organization_summary,
    plan_validity, remaining_messages, token_split, trial_days_remaining, usage_percent,
    PlanValidity,
};
use wishchat_analytics::reports::format_number;
use wishchat_analytics::views::{
    chatbot_table, coupon_usage_ratio, filter_coupons, group_logs_by_day, is_coupon_exhausted,
    organization_table, ChatbotSort, DayGroup, OrganizationSort, SortOrder,
};
use wishchat_analytics::{DashboardData, ReportGenerator};
use wishchat_core::activity_log::{format_entry, ActivityLogSink};
use wishchat_core::config::{AppConfig, DashboardConfig};
use wishchat_core::types::{
    ActivityLogEntry, ApiActivityLog, LogKind, MonthKey, OrganizationOverview,
};
use wishchat_core::{ActivityLog, AdminCommand, JsonlLogSink, Snapshot};

fn load_snapshot(config: &AppConfig) -> Result<Snapshot> {
    let dir = config.snapshot_dir();
    Snapshot::load(&dir, &config.snapshot)
        .with_context(|| format!("Failed to load snapshot from {}", dir.display()))
}

fn overview_or_empty(snapshot: &Snapshot) -> OrganizationOverview {
    match &snapshot.overview {
        Some(overview) => overview.clone(),
        None => {
            tracing::warn!("No organization overview in snapshot; reporting empty data");
            OrganizationOverview::default()
        }
    }
}

fn open_activity_log(config: &AppConfig) -> ActivityLog<JsonlLogSink> {
    ActivityLog::new(JsonlLogSink::new(config.activity_log_path()))
}

fn sort_order(ascending: bool) -> SortOrder {
    if ascending {
        SortOrder::Asc
    } else {
        SortOrder::Desc
    }
}

// ---- report ----

pub fn report(config: &AppConfig, month: Option<MonthKey>, text: bool) -> Result<()> {
    let snapshot = load_snapshot(config)?;
    let today = Local::now().date_naive();
    print!(
        "{}",
        render_report(&snapshot, &config.dashboard, month, text, today)?
    );
    Ok(())
}

/// Dashboard for `month`, or for the month containing `today` when none is given.
pub fn render_report(
    snapshot: &Snapshot,
    dashboard: &DashboardConfig,
    month: Option<MonthKey>,
    text: bool,
    today: NaiveDate,
) -> Result<String> {
    dashboard.validate()?;
    let reference = match month {
        Some(key) => key.first_day(),
        None => today,
    };
    let key = MonthKey::from_date(reference);
    let usage = snapshot.usage_for(key);
    if usage.is_none() {
        tracing::warn!("No token usage for {}", key.long_label());
    }

    let overview = overview_or_empty(snapshot);
    let history = snapshot.usage_by_month(key);
    let data = DashboardData {
        overview: &overview,
        usage,
        history: &history,
        reference,
    };
    Ok(if text {
        ReportGenerator::text_summary(&data, dashboard)
    } else {
        ReportGenerator::dashboard_report(&data, dashboard)
    })
}

pub fn months(config: &AppConfig, count: usize) -> Result<()> {
    let snapshot = load_snapshot(config)?;
    print!(
        "{}",
        render_months(&snapshot, count, Local::now().date_naive())
    );
    Ok(())
}

/// Selectable months, newest first, marking those with saved usage.
pub fn render_months(snapshot: &Snapshot, count: usize, today: NaiveDate) -> String {
    let saved = snapshot.usage_by_month(MonthKey::from_date(today));
    let mut output = String::new();
    for option in month_options(today, count) {
        let has_data = option
            .value
            .parse::<MonthKey>()
            .map(|key| saved.contains_key(&key))
            .unwrap_or(false);
        output.push_str(&format!(
            "  {}  {:<16}{}\n",
            option.value,
            option.label,
            if has_data { " *" } else { "" }
        ));
    }
    output
}

// ---- organizations / chatbots ----

pub fn organizations(
    config: &AppConfig,
    search: &str,
    sort: OrganizationSort,
    ascending: bool,
) -> Result<()> {
    let snapshot = load_snapshot(config)?;
    let overview = overview_or_empty(&snapshot);
    print!(
        "{}",
        render_organizations(&overview, search, sort, sort_order(ascending))
    );
    Ok(())
}

pub fn render_organizations(
    overview: &OrganizationOverview,
    search: &str,
    sort: OrganizationSort,
    order: SortOrder,
) -> String {
    let rows = organization_table(&overview.organizations, search, sort, order);
    if rows.is_empty() {
        return "No organizations found.\n".into();
    }

    let mut output = String::new();
    output.push_str(&format!(
        "{:<6} {:<30} {:>8} {:>9} {:>14}\n",
        "ID", "Organization", "Members", "Chatbots", "Tokens"
    ));
    for row in &rows {
        output.push_str(&format!(
            "{:<6} {:<30} {:>8} {:>9} {:>14}\n",
            row.id,
            row.name,
            row.members,
            row.chatbots,
            format_number(row.tokens)
        ));
    }
    output.push_str(&format!("\n{} organization(s)\n", rows.len()));
    output
}

pub fn organization_detail(config: &AppConfig, id: i64) -> Result<()> {
    let snapshot = load_snapshot(config)?;
    let overview = overview_or_empty(&snapshot);
    let detail = render_organization_detail(&overview, &snapshot, id)
        .with_context(|| format!("Organization #{} not found in snapshot", id))?;
    print!("{}", detail);
    Ok(())
}

/// One organization's chatbots, sending count, status mix, and token split.
pub fn render_organization_detail(
    overview: &OrganizationOverview,
    snapshot: &Snapshot,
    id: i64,
) -> Option<String> {
    let organization = overview.organizations.iter().find(|org| org.id == id)?;
    let summary = organization_summary(organization);

    let mut output = String::new();
    output.push_str(&format!("{} (#{})\n", summary.name, summary.id));
    output.push_str(&format!(
        "  Chatbots: {}  Able to send: {}  Members: {}\n",
        summary.chatbots, summary.can_send, summary.members
    ));
    output.push_str(&format!("  Tokens: {}\n", format_number(summary.tokens)));
    match snapshot.organization_usage.get(&id) {
        Some(usage) => {
            let split = token_split(usage);
            output.push_str(&format!(
                "  Input: {} ({:.1}%)  Output: {} ({:.1}%)\n",
                format_number(usage.input_tokens),
                split.input_share,
                format_number(usage.output_tokens),
                split.output_share
            ));
        }
        None => output.push_str("  Input/output split: not available\n"),
    }

    let statuses: Vec<String> = summary
        .statuses
        .iter()
        .filter(|(_, count)| *count > 0)
        .map(|(status, count)| format!("{} {}", status.label(), count))
        .collect();
    if !statuses.is_empty() {
        output.push_str(&format!("  Subscriptions: {}\n", statuses.join(", ")));
    }

    if !organization.chatbots.is_empty() {
        output.push_str("\n");
        let rows = chatbot_table(
            std::slice::from_ref(organization),
            "",
            ChatbotSort::Tokens,
            SortOrder::Desc,
        );
        for row in rows {
            output.push_str(&format!(
                "  {:<6} {:<24} {:>14}  {}\n",
                row.id,
                row.name,
                format_number(row.tokens),
                row.status.map(|s| s.label()).unwrap_or("-")
            ));
        }
    }
    Some(output)
}

pub fn chatbots(
    config: &AppConfig,
    search: &str,
    sort: ChatbotSort,
    ascending: bool,
    low_quota: bool,
) -> Result<()> {
    let snapshot = load_snapshot(config)?;
    let overview = overview_or_empty(&snapshot);
    print!(
        "{}",
        render_chatbots(&overview, search, sort, sort_order(ascending), low_quota)
    );
    Ok(())
}

pub fn render_chatbots(
    overview: &OrganizationOverview,
    search: &str,
    sort: ChatbotSort,
    order: SortOrder,
    low_quota: bool,
) -> String {
    let mut rows = chatbot_table(&overview.organizations, search, sort, order);
    if low_quota {
        let low: HashSet<(i64, i64)> = low_quota_chatbots(&overview.organizations)
            .iter()
            .map(|c| (c.organization_id, c.chatbot.id))
            .collect();
        rows.retain(|row| low.contains(&(row.organization_id, row.id)));
    }
    if rows.is_empty() {
        return "No chatbots found.\n".into();
    }

    let mut output = String::new();
    output.push_str(&format!(
        "{:<6} {:<24} {:<24} {:>14} {:<16} {:>6}\n",
        "ID", "Chatbot", "Organization", "Tokens", "Status", "Used"
    ));
    for row in &rows {
        let used = row
            .usage_percent
            .map(|p| format!("{}%", p))
            .unwrap_or_else(|| "-".into());
        output.push_str(&format!(
            "{:<6} {:<24} {:<24} {:>14} {:<16} {:>6}\n",
            row.id,
            row.name,
            row.organization,
            format_number(row.tokens),
            row.status.map(|s| s.label()).unwrap_or("-"),
            used
        ));
    }
    output.push_str(&format!("\n{} chatbot(s)\n", rows.len()));
    output
}

pub fn chatbot_detail(config: &AppConfig, id: i64) -> Result<()> {
    let snapshot = load_snapshot(config)?;
    let overview = overview_or_empty(&snapshot);
    let detail = render_chatbot_detail(&overview, id, Local::now().date_naive())
        .with_context(|| format!("Chatbot #{} not found in snapshot", id))?;
    print!("{}", detail);
    Ok(())
}

/// Quota details for one chatbot, or `None` if no organization owns it.
pub fn render_chatbot_detail(
    overview: &OrganizationOverview,
    id: i64,
    today: NaiveDate,
) -> Option<String> {
    let tagged = flatten_chatbots(&overview.organizations)
        .into_iter()
        .find(|c| c.chatbot.id == id)?;
    let bot = tagged.chatbot;

    let mut output = String::new();
    output.push_str(&format!("{} (#{})\n", bot.name, bot.id));
    output.push_str(&format!("  Organization: {}\n", tagged.organization_name));
    if let Some(domain) = &bot.domain_name {
        output.push_str(&format!("  Domain: {}\n", domain));
    }
    output.push_str(&format!("  Tokens: {}\n", format_number(tagged.tokens())));

    match &bot.quota {
        Some(quota) => {
            output.push_str(&format!("  Status: {}\n", classify_status(quota).label()));
            output.push_str(&format!(
                "  Messages: {} / {} ({}%)\n",
                format_number(quota.messages_used),
                format_number(quota.message_limit),
                usage_percent(quota)
            ));
            match plan_validity(quota) {
                PlanValidity::ValidUntil(date) => output.push_str(&format!(
                    "  Valid until: {}\n",
                    date.format("%Y-%m-%d")
                )),
                PlanValidity::ExpiredOn(date) => output.push_str(&format!(
                    "  Expired on: {}\n",
                    date.format("%Y-%m-%d")
                )),
                PlanValidity::NotApplicable => {}
            }
            if quota.temporary_message_boost > 0 {
                output.push_str(&format!(
                    "  Temporary boost: {}\n",
                    format_number(quota.temporary_message_boost)
                ));
            }
            output.push_str(&format!(
                "  Remaining: {}\n",
                format_number(remaining_messages(quota))
            ));
            if let Some(days) = trial_days_remaining(quota, today) {
                output.push_str(&format!("  Trial days left: {}\n", days));
            }
            if let Some(reset) = quota.last_reset {
                output.push_str(&format!("  Last reset: {}\n", reset.format("%Y-%m-%d")));
            }
            output.push_str(&format!("  Grace period: {} day(s)\n", quota.grace_period_days));
            output.push_str(&format!(
                "  Sending: {}\n",
                match (quota.is_sending_enabled, quota.can_send_message) {
                    (true, true) => "enabled",
                    (true, false) => "enabled, blocked by quota",
                    (false, _) => "disabled",
                }
            ));
        }
        None => output.push_str("  Quota: not available\n"),
    }
    Some(output)
}

// ---- billing ----

pub fn billing(config: &AppConfig, search: &str) -> Result<()> {
    let snapshot = load_snapshot(config)?;
    print!("{}", render_billing(&snapshot, search));
    Ok(())
}

pub fn render_billing(snapshot: &Snapshot, search: &str) -> String {
    let mut output = String::new();

    output.push_str("Subscription plans:\n");
    if snapshot.plans.is_empty() {
        output.push_str("  (none)\n");
    }
    for plan in &snapshot.plans {
        let mut flags = Vec::new();
        if !plan.is_active {
            flags.push("inactive");
        }
        if plan.is_lifetime {
            flags.push("lifetime");
        }
        if plan.auto_reset_quota {
            flags.push("auto-reset");
        }
        output.push_str(&format!(
            "  {:<24} ${:>8}  {:>10} msgs  {:>3} trial days  {}\n",
            plan.name,
            plan.price,
            format_number(plan.message_limit),
            plan.trial_days,
            flags.join(", ")
        ));
    }

    output.push_str("\nCoupons:\n");
    let coupons = filter_coupons(&snapshot.coupons, search);
    if coupons.is_empty() {
        output.push_str("  (none)\n");
    }
    for coupon in coupons {
        let state = if !coupon.is_active {
            "inactive"
        } else if is_coupon_exhausted(coupon) {
            "exhausted"
        } else {
            "active"
        };
        output.push_str(&format!(
            "  {:<16} {:>6}%  {:>5} / {:<5} ({:.0}%)  {}\n",
            coupon.code,
            coupon.discount_percent,
            coupon.times_used,
            coupon.max_usage,
            coupon_usage_ratio(coupon) * 100.0,
            state
        ));
    }
    output
}

// ---- activity log ----

pub fn logs(config: &AppConfig, action: Option<LogsAction>) -> Result<()> {
    let log = open_activity_log(config);
    let action = action.unwrap_or(LogsAction::List {
        kind: None,
        user: None,
        search: String::new(),
        server: false,
    });
    match action {
        LogsAction::List {
            kind,
            user,
            search,
            server,
        } => {
            let server_activity = if server {
                load_snapshot(config)?.activity
            } else {
                Vec::new()
            };
            let entries = collect_entries(&log, &server_activity, kind, user.as_deref())?;
            print!("{}", render_log_groups(&group_logs_by_day(&entries, &search)));
        }
        LogsAction::Export => {
            let text = log.export_text()?;
            if !text.is_empty() {
                println!("{}", text);
            }
        }
    }
    Ok(())
}

/// Local and server entries merged, narrowed by kind and acting user,
/// newest first.
pub fn collect_entries<S: ActivityLogSink>(
    log: &ActivityLog<S>,
    server_activity: &[ApiActivityLog],
    kind: Option<LogKind>,
    user: Option<&str>,
) -> Result<Vec<ActivityLogEntry>> {
    let mut entries = log.all()?;
    entries.extend(server_activity.iter().cloned().map(ActivityLogEntry::from));
    entries.retain(|e| kind.map_or(true, |k| e.kind == k) && user.map_or(true, |u| e.user == u));
    entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    Ok(entries)
}

pub fn render_log_groups(groups: &[DayGroup<'_>]) -> String {
    if groups.is_empty() {
        return "No activity recorded.\n".into();
    }

    let mut output = String::new();
    for group in groups {
        output.push_str(&format!("{}\n", group.date.format("%A, %B %-d, %Y")));
        for entry in &group.entries {
            output.push_str(&format!(
                "  {} {:<16} {:<12} {}\n",
                entry.timestamp.format("%H:%M:%S"),
                entry.kind.as_str(),
                entry.user,
                entry.description
            ));
        }
    }
    output
}

// ---- mutations ----

pub fn admin_command(config: &AppConfig, command: AdminCommand) -> Result<()> {
    let mut log = open_activity_log(config);
    let output = prepare_command(&mut log, &config.activity_log.operator, &command)?;
    print!("{}", output);
    Ok(())
}

/// Validate `command`, record it, and describe the request it maps to.
pub fn prepare_command<S: ActivityLogSink>(
    log: &mut ActivityLog<S>,
    operator: &str,
    command: &AdminCommand,
) -> Result<String> {
    command.validate()?;

    let mut output = format!("{} {}\n", command.method().as_str(), command.endpoint());
    if let Some(body) = command.body() {
        output.push_str(&serde_json::to_string_pretty(&body)?);
        output.push('\n');
    }

    let entry = log.record(
        operator,
        command.log_kind(),
        command.description(),
        Some(command.metadata()),
    )?;
    output.push_str(&format!("\nRecorded: {}\n", format_entry(&entry)));
    Ok(output)
}
