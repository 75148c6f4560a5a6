// Data models for the task list

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// A single to-do item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: u64,
    pub text: String,
    pub completed: bool,
    /// ISO-8601 creation time, never changed after `add`
    pub created_at: String,
}

impl Task {
    pub(crate) fn new(id: u64, text: String) -> Self {
        Self {
            id,
            text,
            completed: false,
            created_at: now_iso(),
        }
    }
}

/// Counts derived from the full task list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Stats {
    pub total: usize,
    pub completed: usize,
    pub pending: usize,
}

impl Stats {
    pub fn from_tasks(tasks: &[Task]) -> Self {
        let total = tasks.len();
        let completed = tasks.iter().filter(|t| t.completed).count();
        Self {
            total,
            completed,
            pending: total - completed,
        }
    }
}

/// Current UTC time as an ISO-8601 string with millisecond precision
/// (e.g. `2026-10-18T09:30:00.123Z`)
pub fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
