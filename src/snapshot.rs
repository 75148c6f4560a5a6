// Encoding of the task list into the key-value store
//
// Two entries: `tasks` holds a JSON array of tasks, `counter` holds the next id
// as a decimal string. An optional namespace prefixes both keys.

use crate::kv::{KvStore, validate_key};
use crate::models::Task;
use eyre::{Context, Result};
use serde_json::Value;
use std::collections::HashSet;
use tracing::{info, warn};

pub const TASKS_KEY: &str = "tasks";
pub const COUNTER_KEY: &str = "counter";

/// Largest id a stored task may carry (2^53 - 1, exact in a JSON number)
pub const MAX_ID: u64 = 9_007_199_254_740_991;

/// Persisted state of a task store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub tasks: Vec<Task>,
    pub next_id: u64,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            tasks: Vec::new(),
            next_id: 1,
        }
    }
}

fn key(namespace: Option<&str>, name: &str) -> String {
    match namespace {
        Some(ns) => format!("{}_{}", ns, name),
        None => name.to_string(),
    }
}

/// Check that both keys derived from `namespace` are accepted by the backends
pub fn validate_namespace(namespace: &str) -> Result<()> {
    for name in [TASKS_KEY, COUNTER_KEY] {
        validate_key(&key(Some(namespace), name)).with_context(|| format!("Invalid namespace: {}", namespace))?;
    }
    Ok(())
}

/// Write both entries
pub fn save<K: KvStore + ?Sized>(kv: &mut K, namespace: Option<&str>, tasks: &[Task], next_id: u64) -> Result<()> {
    let json = serde_json::to_string(tasks).context("Failed to serialize tasks")?;
    kv.set(&key(namespace, TASKS_KEY), &json)?;
    kv.set(&key(namespace, COUNTER_KEY), &next_id.to_string())?;
    Ok(())
}

/// Read both entries, falling back to the empty state for anything unusable
pub fn load<K: KvStore + ?Sized>(kv: &K, namespace: Option<&str>) -> Snapshot {
    let tasks = match kv.get(&key(namespace, TASKS_KEY)) {
        Ok(Some(json)) => decode_tasks(&json),
        Ok(None) => Vec::new(),
        Err(e) => {
            warn!(error = ?e, "Failed to read tasks, starting empty");
            Vec::new()
        }
    };

    let stored_counter = match kv.get(&key(namespace, COUNTER_KEY)) {
        Ok(Some(raw)) => match raw.trim().parse::<u64>() {
            Ok(n) if n > 0 && n <= MAX_ID + 1 => Some(n),
            _ => {
                warn!(value = %raw, "Invalid id counter, ignoring");
                None
            }
        },
        Ok(None) => None,
        Err(e) => {
            warn!(error = ?e, "Failed to read id counter, ignoring");
            None
        }
    };

    // Ids must never be reused, even when the counter entry is stale or missing
    let min_next = tasks.iter().map(|t| t.id).max().map_or(1, |max| max + 1);
    let next_id = match stored_counter {
        Some(n) if n >= min_next => n,
        Some(n) => {
            warn!(stored = n, repaired = min_next, "Id counter behind stored tasks, repairing");
            min_next
        }
        None => min_next,
    };

    info!(count = tasks.len(), next_id, "Loaded tasks");

    Snapshot { tasks, next_id }
}

/// Decode the tasks array one element at a time, skipping bad entries
fn decode_tasks(json: &str) -> Vec<Task> {
    let items = match serde_json::from_str::<Value>(json) {
        Ok(Value::Array(items)) => items,
        Ok(_) => {
            warn!("Stored tasks are not a JSON array, starting empty");
            return Vec::new();
        }
        Err(e) => {
            warn!(error = ?e, "Failed to parse stored tasks, starting empty");
            return Vec::new();
        }
    };

    let mut seen = HashSet::new();
    let mut tasks = Vec::with_capacity(items.len());

    for (index, item) in items.into_iter().enumerate() {
        let task: Task = match serde_json::from_value(item) {
            Ok(t) => t,
            Err(e) => {
                warn!(index, error = ?e, "Failed to decode task, skipping");
                continue;
            }
        };

        if task.id == 0 || task.id > MAX_ID {
            warn!(index, id = task.id, "Task id out of range, skipping");
            continue;
        }

        if task.text.trim().is_empty() {
            warn!(index, id = task.id, "Task has empty text, skipping");
            continue;
        }

        if !seen.insert(task.id) {
            warn!(index, id = task.id, "Duplicate task id, skipping");
            continue;
        }

        tasks.push(task);
    }

    tasks
}
