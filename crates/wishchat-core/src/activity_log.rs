//! Append-only activity log for administrative actions.
//!
//! Entries are written through an injected [`ActivityLogSink`] so callers
//! decide where they persist: in memory for tests, or a JSON Lines file for
//! the command-line tool. Entries are never rewritten or deleted.

use crate::error::{AdminError, Result};
use crate::types::{ActivityLogEntry, LogKind};
use chrono::{DateTime, Utc};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Destination for activity log entries.
pub trait ActivityLogSink {
    /// Append one entry. Existing entries are never touched.
    fn append(&mut self, entry: &ActivityLogEntry) -> Result<()>;

    /// All entries in insertion order.
    fn entries(&self) -> Result<Vec<ActivityLogEntry>>;
}

/// Sink that keeps entries in memory.
#[derive(Debug, Default, Clone)]
pub struct MemoryLogSink {
    entries: Vec<ActivityLogEntry>,
}

impl MemoryLogSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ActivityLogSink for MemoryLogSink {
    fn append(&mut self, entry: &ActivityLogEntry) -> Result<()> {
        self.entries.push(entry.clone());
        Ok(())
    }

    fn entries(&self) -> Result<Vec<ActivityLogEntry>> {
        Ok(self.entries.clone())
    }
}

/// Sink backed by a JSON Lines file, one entry per line.
#[derive(Debug, Clone)]
pub struct JsonlLogSink {
    path: PathBuf,
}

impl JsonlLogSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ActivityLogSink for JsonlLogSink {
    fn append(&mut self, entry: &ActivityLogEntry) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let line = serde_json::to_string(entry)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", line)?;
        Ok(())
    }

    fn entries(&self) -> Result<Vec<ActivityLogEntry>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let contents = std::fs::read_to_string(&self.path)?;
        let mut entries = Vec::new();
        for (lineno, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<ActivityLogEntry>(line) {
                Ok(entry) => entries.push(entry),
                Err(e) => {
                    tracing::warn!(
                        "Skipping malformed activity log line {} in {:?}: {}",
                        lineno + 1,
                        self.path,
                        e
                    );
                }
            }
        }
        Ok(entries)
    }
}

/// Query and recording facade over an [`ActivityLogSink`].
pub struct ActivityLog<S: ActivityLogSink> {
    sink: S,
}

impl<S: ActivityLogSink> ActivityLog<S> {
    pub fn new(sink: S) -> Self {
        Self { sink }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Record an action performed now.
    pub fn record(
        &mut self,
        user: &str,
        kind: LogKind,
        description: impl Into<String>,
        metadata: Option<serde_json::Value>,
    ) -> Result<ActivityLogEntry> {
        self.record_at(Utc::now(), user, kind, description, metadata)
    }

    /// Record an action with an explicit timestamp.
    pub fn record_at(
        &mut self,
        timestamp: DateTime<Utc>,
        user: &str,
        kind: LogKind,
        description: impl Into<String>,
        metadata: Option<serde_json::Value>,
    ) -> Result<ActivityLogEntry> {
        let user = user.trim();
        if user.is_empty() {
            return Err(AdminError::ActivityLog("acting user is required".into()));
        }
        let entry = ActivityLogEntry {
            id: Uuid::new_v4().to_string(),
            timestamp,
            user: user.to_string(),
            kind,
            description: description.into(),
            metadata,
        };
        self.sink.append(&entry)?;
        tracing::info!("[{}] {}", entry.kind.as_str().to_uppercase(), entry.description);
        Ok(entry)
    }

    /// All entries, newest first.
    pub fn all(&self) -> Result<Vec<ActivityLogEntry>> {
        let mut entries = self.sink.entries()?;
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(entries)
    }

    pub fn by_kind(&self, kind: LogKind) -> Result<Vec<ActivityLogEntry>> {
        Ok(self.all()?.into_iter().filter(|e| e.kind == kind).collect())
    }

    pub fn by_user(&self, user: &str) -> Result<Vec<ActivityLogEntry>> {
        Ok(self.all()?.into_iter().filter(|e| e.user == user).collect())
    }

    /// Entries with `start <= timestamp <= end`, newest first.
    pub fn by_date_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ActivityLogEntry>> {
        Ok(self
            .all()?
            .into_iter()
            .filter(|e| e.timestamp >= start && e.timestamp <= end)
            .collect())
    }

    /// Plain-text export, one line per entry in insertion order.
    pub fn export_text(&self) -> Result<String> {
        let lines: Vec<String> = self.sink.entries()?.iter().map(format_entry).collect();
        Ok(lines.join("\n"))
    }
}

/// Render one entry as `[timestamp] [kind] [user] description metadata`.
pub fn format_entry(entry: &ActivityLogEntry) -> String {
    let metadata = entry
        .metadata
        .as_ref()
        .map(|m| m.to_string())
        .unwrap_or_default();
    format!(
        "[{}] [{}] [{}] {} {}",
        entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
        entry.kind,
        entry.user,
        entry.description,
        metadata
    )
    .trim_end()
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 4, day, hour, 0, 0).unwrap()
    }

    #[test]
    fn test_record_and_query_memory() {
        let mut log = ActivityLog::new(MemoryLogSink::new());
        log.record_at(at(1, 9), "alice", LogKind::Login, "Logged in", None)
            .unwrap();
        log.record_at(
            at(2, 9),
            "bob",
            LogKind::BoostAdded,
            "Added 500 messages to chatbot #4",
            Some(serde_json::json!({"chatbot_id": 4})),
        )
        .unwrap();
        log.record_at(at(3, 9), "alice", LogKind::PlanUpdate, "Updated plan", None)
            .unwrap();

        let all = log.all().unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].description, "Updated plan");
        assert_eq!(all[2].description, "Logged in");

        assert_eq!(log.by_user("alice").unwrap().len(), 2);
        assert_eq!(log.by_kind(LogKind::BoostAdded).unwrap().len(), 1);
        assert_eq!(log.by_date_range(at(2, 0), at(3, 23)).unwrap().len(), 2);
    }

    #[test]
    fn test_record_requires_user() {
        let mut log = ActivityLog::new(MemoryLogSink::new());
        let result = log.record("  ", LogKind::Other, "nothing", None);
        assert!(matches!(result, Err(AdminError::ActivityLog(_))));
        assert!(log.all().unwrap().is_empty());
    }

    #[test]
    fn test_export_text_format() {
        let mut log = ActivityLog::new(MemoryLogSink::new());
        log.record_at(
            at(5, 14),
            "alice",
            LogKind::SettingChanged,
            "Disabled sending for chatbot #9",
            Some(serde_json::json!({"enabled": false})),
        )
        .unwrap();
        log.record_at(at(6, 8), "bob", LogKind::Login, "Logged in", None)
            .unwrap();

        let text = log.export_text().unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines[0],
            "[2025-04-05 14:00:00] [setting_changed] [alice] Disabled sending for chatbot #9 {\"enabled\":false}"
        );
        assert_eq!(lines[1], "[2025-04-06 08:00:00] [login] [bob] Logged in");
    }

    #[test]
    fn test_jsonl_sink_persists_and_appends() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("logs").join("activity.jsonl");

        {
            let mut log = ActivityLog::new(JsonlLogSink::new(&path));
            log.record_at(at(1, 10), "alice", LogKind::Login, "Logged in", None)
                .unwrap();
        }
        {
            let mut log = ActivityLog::new(JsonlLogSink::new(&path));
            log.record_at(at(2, 10), "alice", LogKind::StaffCreated, "Created staff", None)
                .unwrap();
            let all = log.all().unwrap();
            assert_eq!(all.len(), 2);
            assert_eq!(all[0].kind, LogKind::StaffCreated);
        }
    }

    #[test]
    fn test_jsonl_sink_skips_malformed_lines() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("activity.jsonl");

        let mut sink = JsonlLogSink::new(&path);
        let mut log = ActivityLog::new(sink.clone());
        log.record_at(at(1, 10), "alice", LogKind::Login, "Logged in", None)
            .unwrap();

        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(file, "{{not json").unwrap();
        drop(file);

        let entry = log.all().unwrap().remove(0);
        sink.append(&entry).unwrap();

        let entries = sink.entries().unwrap();
        assert_eq!(entries.len(), 2);
    }

    #[test]
    fn test_jsonl_sink_missing_file_is_empty() {
        let tmp = tempfile::TempDir::new().unwrap();
        let sink = JsonlLogSink::new(tmp.path().join("absent.jsonl"));
        assert!(sink.entries().unwrap().is_empty());
    }
}
