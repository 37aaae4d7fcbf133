//! Loading saved API payloads from a snapshot directory.
//!
//! A snapshot is the set of JSON responses fetched from the platform API at
//! one point in time. Missing files are treated as "not fetched" rather than
//! as errors; malformed files are errors.

use crate::config::SnapshotConfig;
use crate::error::{AdminError, Result};
use crate::types::{
    ActivityLogsResponse, ApiActivityLog, CouponCode, MonthKey, OrganizationOverview,
    SubscriptionPlan, SubscriptionPlansResponse, TokenUsagePeriod,
};
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// One materialized set of API responses.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub overview: Option<OrganizationOverview>,
    pub token_usage: Option<TokenUsagePeriod>,
    /// Per-month token usage keyed by month.
    pub history: BTreeMap<MonthKey, TokenUsagePeriod>,
    /// Token usage keyed by organization id.
    pub organization_usage: BTreeMap<i64, TokenUsagePeriod>,
    pub plans: Vec<SubscriptionPlan>,
    pub coupons: Vec<CouponCode>,
    pub activity: Vec<ApiActivityLog>,
}

impl Snapshot {
    /// Load every known payload from `dir`.
    pub fn load(dir: &Path, config: &SnapshotConfig) -> Result<Self> {
        if !dir.is_dir() {
            return Err(AdminError::Snapshot {
                path: dir.display().to_string(),
                message: "snapshot directory does not exist".into(),
            });
        }

        let overview = load_json::<OrganizationOverview>(&dir.join(&config.overview_file))?;
        let token_usage = load_json::<TokenUsagePeriod>(&dir.join(&config.token_usage_file))?;
        let plans = load_json::<SubscriptionPlansResponse>(&dir.join(&config.plans_file))?
            .map(|r| r.plans)
            .unwrap_or_default();
        let coupons = load_json::<Vec<CouponCode>>(&dir.join(&config.coupons_file))?
            .unwrap_or_default();
        let activity = load_json::<ActivityLogsResponse>(&dir.join(&config.activity_file))?
            .map(|r| r.logs)
            .unwrap_or_default();
        let history = load_history(&dir.join(&config.history_dir))?;
        let organization_usage =
            load_organization_usage(&dir.join(&config.organization_usage_dir))?;

        tracing::debug!(
            "Loaded snapshot from {}: overview={}, usage={}, history={} months, plans={}, coupons={}, activity={}",
            dir.display(),
            overview.is_some(),
            token_usage.is_some(),
            history.len(),
            plans.len(),
            coupons.len(),
            activity.len(),
        );

        Ok(Self {
            overview,
            token_usage,
            history,
            organization_usage,
            plans,
            coupons,
            activity,
        })
    }

    /// Token usage for `key`: the history entry when present, else the
    /// current usage file if it covers `key`.
    ///
    /// The current file covers the month named by its own `year`/`month`
    /// fields. Without them it is taken to cover `key`.
    pub fn usage_for(&self, key: MonthKey) -> Option<&TokenUsagePeriod> {
        self.history.get(&key).or_else(|| {
            self.token_usage
                .as_ref()
                .filter(|usage| usage.month_key().unwrap_or(key) == key)
        })
    }

    /// History with the current usage file filed under its month
    /// (`fallback` when the payload does not name one).
    pub fn usage_by_month(&self, fallback: MonthKey) -> BTreeMap<MonthKey, TokenUsagePeriod> {
        let mut months = self.history.clone();
        if let Some(usage) = &self.token_usage {
            months
                .entry(usage.month_key().unwrap_or(fallback))
                .or_insert_with(|| usage.clone());
        }
        months
    }
}

/// Parse a JSON file, returning `None` when it does not exist.
pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        tracing::debug!("Snapshot file {} not present", path.display());
        return Ok(None);
    }
    let contents = std::fs::read_to_string(path)?;
    serde_json::from_str(&contents)
        .map(Some)
        .map_err(|e| AdminError::Snapshot {
            path: path.display().to_string(),
            message: e.to_string(),
        })
}

/// Read `YYYY-MM.json` files from a history directory.
fn load_history(dir: &Path) -> Result<BTreeMap<MonthKey, TokenUsagePeriod>> {
    let mut history = BTreeMap::new();
    if !dir.is_dir() {
        return Ok(history);
    }
    for entry in std::fs::read_dir(dir)? {
        let path: PathBuf = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        let key = match stem.parse::<MonthKey>() {
            Ok(key) => key,
            Err(_) => {
                tracing::warn!("Ignoring history file with non-month name: {:?}", path);
                continue;
            }
        };
        if let Some(usage) = load_json::<TokenUsagePeriod>(&path)? {
            history.insert(key, usage);
        }
    }
    Ok(history)
}

/// Read `<organization id>.json` files from a directory.
fn load_organization_usage(dir: &Path) -> Result<BTreeMap<i64, TokenUsagePeriod>> {
    let mut usage = BTreeMap::new();
    if !dir.is_dir() {
        return Ok(usage);
    }
    for entry in std::fs::read_dir(dir)? {
        let path: PathBuf = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let Some(id) = path
            .file_stem()
            .and_then(|s| s.to_str())
            .and_then(|s| s.parse::<i64>().ok())
        else {
            tracing::warn!("Ignoring organization usage file with non-numeric name: {:?}", path);
            continue;
        };
        if let Some(period) = load_json::<TokenUsagePeriod>(&path)? {
            usage.insert(id, period);
        }
    }
    Ok(usage)
}
