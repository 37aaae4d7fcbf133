use crate::error::{AdminError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level application configuration, loaded from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub snapshot: SnapshotConfig,
    pub dashboard: DashboardConfig,
    pub activity_log: ActivityLogConfig,
}

impl AppConfig {
    /// Load configuration from default path (~/.config/wishchat-admin/config.toml),
    /// falling back to defaults if the file doesn't exist.
    pub fn load() -> anyhow::Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            tracing::debug!("No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Write current configuration to the default path.
    pub fn save(&self) -> anyhow::Result<()> {
        self.save_to(&Self::default_path())
    }

    /// Write current configuration to a specific path.
    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Default config file path.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("wishchat-admin")
            .join("config.toml")
    }

    /// Data directory for snapshots and the activity log.
    pub fn data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("wishchat-admin")
    }

    /// Resolved snapshot directory.
    pub fn snapshot_dir(&self) -> PathBuf {
        self.snapshot
            .dir
            .clone()
            .unwrap_or_else(|| Self::data_dir().join("snapshots"))
    }

    /// Resolved activity log file.
    pub fn activity_log_path(&self) -> PathBuf {
        self.activity_log
            .path
            .clone()
            .unwrap_or_else(|| Self::data_dir().join("activity.jsonl"))
    }
}

/// Where saved API payloads live.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotConfig {
    /// Snapshot directory (None = data_dir/snapshots).
    pub dir: Option<PathBuf>,
    /// Organization overview payload.
    pub overview_file: String,
    /// Platform token usage payload for the selected month.
    pub token_usage_file: String,
    pub plans_file: String,
    pub coupons_file: String,
    pub activity_file: String,
    /// Subdirectory of per-month token usage payloads named `YYYY-MM.json`.
    pub history_dir: String,
    /// Subdirectory of per-organization token usage payloads named `<id>.json`.
    pub organization_usage_dir: String,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            dir: None,
            overview_file: "organization-overview.json".into(),
            token_usage_file: "token-usage.json".into(),
            plans_file: "subscription-plans.json".into(),
            coupons_file: "coupons.json".into(),
            activity_file: "activity-logs.json".into(),
            history_dir: "token-usage".into(),
            organization_usage_dir: "organization-usage".into(),
        }
    }
}

/// Sizes and labels for derived dashboard views.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// Rows in the top organizations ranking.
    pub top_organizations: usize,
    /// Rows in the top chatbots ranking.
    pub top_chatbots: usize,
    /// Named slices in the organization distribution before the overflow bucket.
    pub pie_slices: usize,
    /// Months shown in the token trend.
    pub trend_months: usize,
    /// Label of the overflow bucket.
    pub others_label: String,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            top_organizations: 10,
            top_chatbots: 10,
            pie_slices: 7,
            trend_months: 5,
            others_label: "Others".into(),
        }
    }
}

impl DashboardConfig {
    /// Reject sizes that would produce empty charts.
    pub fn validate(&self) -> Result<()> {
        if self.trend_months == 0 {
            return Err(AdminError::Config(
                "dashboard.trend_months must be at least 1".into(),
            ));
        }
        if self.others_label.trim().is_empty() {
            return Err(AdminError::Config(
                "dashboard.others_label must not be empty".into(),
            ));
        }
        Ok(())
    }
}

/// Local activity log settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ActivityLogConfig {
    /// JSON Lines file (None = data_dir/activity.jsonl).
    pub path: Option<PathBuf>,
    /// Name recorded as the acting user.
    pub operator: String,
}

impl Default for ActivityLogConfig {
    fn default() -> Self {
        Self {
            path: None,
            operator: "admin".into(),
        }
    }
}
