// Task list owner: tasks, active filter and id counter

use crate::error::ValidationError;
use crate::filter::TaskFilter;
use crate::kv::KvStore;
use crate::models::{Stats, Task};
use crate::snapshot::{self, MAX_ID};
use tracing::{debug, warn};

/// In-memory task list persisted to a key-value store after every mutation
pub struct TaskStore<K: KvStore> {
    kv: K,
    namespace: Option<String>,
    tasks: Vec<Task>,
    filter: TaskFilter,
    next_id: u64,
}

impl<K: KvStore> TaskStore<K> {
    /// Hydrate a store from `kv`
    ///
    /// Never fails: unreadable or corrupt state yields an empty list.
    pub fn open(kv: K) -> Self {
        Self::hydrate(kv, None)
    }

    /// Hydrate a store whose keys are prefixed with `namespace`
    ///
    /// Fails only when the namespace produces keys no backend accepts.
    pub fn open_namespaced(kv: K, namespace: Option<String>) -> eyre::Result<Self> {
        if let Some(ns) = namespace.as_deref() {
            snapshot::validate_namespace(ns)?;
        }
        Ok(Self::hydrate(kv, namespace))
    }

    fn hydrate(kv: K, namespace: Option<String>) -> Self {
        let snapshot = snapshot::load(&kv, namespace.as_deref());

        Self {
            kv,
            namespace,
            tasks: snapshot.tasks,
            filter: TaskFilter::default(),
            next_id: snapshot.next_id,
        }
    }

    /// Append a new pending task
    pub fn add(&mut self, text: &str) -> Result<Task, ValidationError> {
        let text = validate_text(text)?;

        if self.next_id > MAX_ID {
            return Err(ValidationError::IdsExhausted);
        }
        let next_id = self.next_id.checked_add(1).ok_or(ValidationError::IdsExhausted)?;

        let task = Task::new(self.next_id, text);
        self.next_id = next_id;
        self.tasks.push(task.clone());

        debug!(id = task.id, "Added task");
        self.persist();

        Ok(task)
    }

    /// Flip completion of the task with `id`
    ///
    /// Returns the new completion state, or `None` if no task has that id.
    pub fn toggle(&mut self, id: u64) -> Option<bool> {
        let task = self.tasks.iter_mut().find(|t| t.id == id)?;
        task.completed = !task.completed;
        let completed = task.completed;

        debug!(id, completed, "Toggled task");
        self.persist();

        Some(completed)
    }

    /// Delete the task with `id`, keeping the order of the rest
    ///
    /// Confirmation is the caller's job. Returns the removed task, or `None`
    /// if no task has that id.
    pub fn remove(&mut self, id: u64) -> Option<Task> {
        let index = self.tasks.iter().position(|t| t.id == id)?;
        let task = self.tasks.remove(index);

        debug!(id, "Removed task");
        self.persist();

        Some(task)
    }

    /// Replace the text of the task with `id`
    ///
    /// Empty text is rejected even when `id` does not exist. Returns the
    /// updated task, or `None` if no task has that id.
    pub fn edit(&mut self, id: u64, text: &str) -> Result<Option<Task>, ValidationError> {
        let text = validate_text(text)?;

        let Some(task) = self.tasks.iter_mut().find(|t| t.id == id) else {
            return Ok(None);
        };
        task.text = text;
        let task = task.clone();

        debug!(id, "Edited task");
        self.persist();

        Ok(Some(task))
    }

    /// Change the active filter. Session-local, not persisted.
    pub fn set_filter(&mut self, filter: TaskFilter) {
        self.filter = filter;
    }

    /// Task with `id`, if any
    pub fn get(&self, id: u64) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn filter(&self) -> TaskFilter {
        self.filter
    }

    /// Tasks matching the active filter, in insertion order
    pub fn list_filtered(&self) -> Vec<&Task> {
        self.tasks.iter().filter(|t| self.filter.matches(t)).collect()
    }

    pub fn stats(&self) -> Stats {
        Stats::from_tasks(&self.tasks)
    }

    /// Id the next `add` will assign
    pub fn next_id(&self) -> u64 {
        self.next_id
    }

    /// Save failures are not fatal: the in-memory list stays authoritative
    fn persist(&mut self) {
        if let Err(e) = snapshot::save(&mut self.kv, self.namespace.as_deref(), &self.tasks, self.next_id) {
            warn!(error = ?e, "Failed to save tasks, keeping changes in memory");
        }
    }
}

fn validate_text(text: &str) -> Result<String, ValidationError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyText);
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file_kv::FileKv;
    use crate::kv::MemoryKv;
    use crate::sqlite_kv::SqliteKv;
    use eyre::{Result, eyre};
    use std::collections::HashSet;
    use tempfile::TempDir;

    /// Backend whose writes always fail
    struct BrokenKv;

    impl KvStore for BrokenKv {
        fn get(&self, _key: &str) -> Result<Option<String>> {
            Err(eyre!("storage unavailable"))
        }

        fn set(&mut self, _key: &str, _value: &str) -> Result<()> {
            Err(eyre!("quota exceeded"))
        }
    }

    fn ids(tasks: &[&Task]) -> Vec<u64> {
        tasks.iter().map(|t| t.id).collect()
    }

    #[test]
    fn test_add_first_task() {
        let mut store = TaskStore::open(MemoryKv::new());

        let task = store.add("Buy milk").unwrap();
        assert_eq!(task.id, 1);
        assert_eq!(task.text, "Buy milk");
        assert!(!task.completed);

        let listed = store.list_filtered();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0], &task);
        assert_eq!(
            store.stats(),
            Stats {
                total: 1,
                completed: 0,
                pending: 1
            }
        );
    }

    #[test]
    fn test_add_trims_text() {
        let mut store = TaskStore::open(MemoryKv::new());
        let task = store.add("  Walk the dog \n").unwrap();
        assert_eq!(task.text, "Walk the dog");
    }

    #[test]
    fn test_add_ids_strictly_increasing() {
        let mut store = TaskStore::open(MemoryKv::new());

        let ids: Vec<u64> = (0..20).map(|i| store.add(&format!("task {}", i)).unwrap().id).collect();
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(ids.iter().collect::<HashSet<_>>().len(), ids.len());
        assert_eq!(store.next_id(), 21);
    }

    #[test]
    fn test_add_empty_text_rejected() {
        let mut store = TaskStore::open(MemoryKv::new());
        store.add("Keep").unwrap();

        assert_eq!(store.add(""), Err(ValidationError::EmptyText));
        assert_eq!(store.add("   "), Err(ValidationError::EmptyText));
        assert_eq!(store.list_filtered().len(), 1);
        assert_eq!(store.next_id(), 2);
    }

    #[test]
    fn test_toggle_is_its_own_inverse() {
        let mut store = TaskStore::open(MemoryKv::new());
        let task = store.add("X").unwrap();

        assert_eq!(store.toggle(task.id), Some(true));
        assert_eq!(store.toggle(task.id), Some(false));
        assert!(!store.list_filtered()[0].completed);
    }

    #[test]
    fn test_toggle_missing_is_noop() {
        let mut store = TaskStore::open(MemoryKv::new());
        store.add("X").unwrap();

        assert_eq!(store.toggle(42), None);
        assert_eq!(store.stats().completed, 0);
    }

    #[test]
    fn test_toggle_then_filter() {
        let mut store = TaskStore::open(MemoryKv::new());
        store.add("X").unwrap();
        store.toggle(1);

        store.set_filter(TaskFilter::Completed);
        assert_eq!(ids(&store.list_filtered()), vec![1]);

        store.set_filter(TaskFilter::Active);
        assert!(store.list_filtered().is_empty());
    }

    #[test]
    fn test_remove_preserves_order() {
        let mut store = TaskStore::open(MemoryKv::new());
        for text in ["A", "B", "C", "D"] {
            store.add(text).unwrap();
        }

        let removed = store.remove(2).unwrap();
        assert_eq!(removed.text, "B");
        assert_eq!(ids(&store.list_filtered()), vec![1, 3, 4]);
    }

    #[test]
    fn test_remove_twice_is_noop() {
        let mut store = TaskStore::open(MemoryKv::new());
        store.add("A").unwrap();
        store.add("B").unwrap();

        assert!(store.remove(1).is_some());
        assert!(store.remove(1).is_none());
        assert_eq!(store.stats().total, 1);
    }

    #[test]
    fn test_ids_not_reused_after_remove() {
        let mut store = TaskStore::open(MemoryKv::new());
        store.add("A").unwrap();
        store.add("B").unwrap();
        store.remove(2);

        assert_eq!(store.add("C").unwrap().id, 3);
    }

    #[test]
    fn test_edit_replaces_text() {
        let mut store = TaskStore::open(MemoryKv::new());
        let original = store.add("Draft").unwrap();

        let edited = store.edit(original.id, "  Final ").unwrap().unwrap();
        assert_eq!(edited.text, "Final");
        assert_eq!(edited.created_at, original.created_at);
        assert_eq!(store.list_filtered()[0].text, "Final");
    }

    #[test]
    fn test_edit_empty_text_rejected() {
        let mut store = TaskStore::open(MemoryKv::new());
        store.add("Draft").unwrap();

        assert_eq!(store.edit(1, " \t "), Err(ValidationError::EmptyText));
        assert_eq!(store.edit(99, ""), Err(ValidationError::EmptyText));
        assert_eq!(store.list_filtered()[0].text, "Draft");
    }

    #[test]
    fn test_edit_missing_is_noop() {
        let mut store = TaskStore::open(MemoryKv::new());
        store.add("Draft").unwrap();

        assert_eq!(store.edit(99, "Other"), Ok(None));
        assert_eq!(store.list_filtered()[0].text, "Draft");
    }

    #[test]
    fn test_filters_partition_all() {
        let mut store = TaskStore::open(MemoryKv::new());
        for i in 1..=6 {
            store.add(&format!("task {}", i)).unwrap();
        }
        store.toggle(2);
        store.toggle(3);
        store.toggle(6);

        store.set_filter(TaskFilter::All);
        let all: HashSet<u64> = ids(&store.list_filtered()).into_iter().collect();
        store.set_filter(TaskFilter::Active);
        let active: HashSet<u64> = ids(&store.list_filtered()).into_iter().collect();
        store.set_filter(TaskFilter::Completed);
        let completed: HashSet<u64> = ids(&store.list_filtered()).into_iter().collect();

        assert!(active.is_disjoint(&completed));
        assert_eq!(&active | &completed, all);
        assert_eq!(completed, HashSet::from([2, 3, 6]));
    }

    #[test]
    fn test_filter_defaults_to_all() {
        let mut store = TaskStore::open(MemoryKv::new());
        assert_eq!(store.filter(), TaskFilter::All);

        store.set_filter("completed".parse().unwrap());
        assert_eq!(store.filter(), TaskFilter::Completed);
    }

    #[test]
    fn test_stats_invariant() {
        let mut store = TaskStore::open(MemoryKv::new());
        for i in 0..5 {
            store.add(&format!("task {}", i)).unwrap();
            store.toggle(i + 1);
            store.toggle(1);
            let stats = store.stats();
            assert_eq!(stats.total, stats.completed + stats.pending);
        }
        store.remove(3);
        let stats = store.stats();
        assert_eq!(stats.total, 4);
        assert_eq!(stats.total, stats.completed + stats.pending);
    }

    #[test]
    fn test_round_trip_into_fresh_store() {
        let mut store = TaskStore::open(MemoryKv::new());
        store.add("A").unwrap();
        store.add("B").unwrap();
        store.toggle(2);
        let before: Vec<Task> = store.list_filtered().into_iter().cloned().collect();

        let reloaded = TaskStore::open(store.kv.clone());
        let after: Vec<Task> = reloaded.list_filtered().into_iter().cloned().collect();

        assert_eq!(after, before);
        assert_eq!(after[0].text, "A");
        assert!(!after[0].completed);
        assert_eq!(after[1].text, "B");
        assert!(after[1].completed);
        assert!(reloaded.next_id() > 2);
    }

    #[test]
    fn test_filter_is_not_persisted() {
        let mut store = TaskStore::open(MemoryKv::new());
        store.add("A").unwrap();
        store.set_filter(TaskFilter::Completed);

        let reloaded = TaskStore::open(store.kv.clone());
        assert_eq!(reloaded.filter(), TaskFilter::All);
    }

    #[test]
    fn test_save_failure_keeps_memory_state() {
        let mut store = TaskStore::open(BrokenKv);
        assert_eq!(store.next_id(), 1);

        let task = store.add("Still here").unwrap();
        assert_eq!(store.toggle(task.id), Some(true));
        assert!(store.edit(task.id, "Renamed").unwrap().is_some());
        assert_eq!(store.list_filtered()[0].text, "Renamed");
        assert_eq!(store.stats().completed, 1);
    }

    #[test]
    fn test_namespaced_stores_are_independent() {
        let mut kv = MemoryKv::new();
        {
            let mut work = TaskStore::open_namespaced(&mut kv, Some("work".to_string())).unwrap();
            work.add("Report").unwrap();
        }

        {
            let home = TaskStore::open_namespaced(&mut kv, Some("home".to_string())).unwrap();
            assert!(home.list_filtered().is_empty());
        }

        let work = TaskStore::open_namespaced(&mut kv, Some("work".to_string())).unwrap();
        assert_eq!(work.list_filtered()[0].text, "Report");
    }

    #[test]
    fn test_invalid_namespace_rejected() {
        assert!(TaskStore::open_namespaced(SqliteKv::in_memory().unwrap(), Some("my list".to_string())).is_err());
        assert!(TaskStore::open_namespaced(MemoryKv::new(), Some("n".repeat(59))).is_err());
        assert!(TaskStore::open_namespaced(MemoryKv::new(), Some("todoApp".to_string())).is_ok());
    }

    #[test]
    fn test_namespaced_add_is_persisted() {
        let mut store = TaskStore::open_namespaced(SqliteKv::in_memory().unwrap(), Some("todoApp".to_string())).unwrap();
        store.add("Buy milk").unwrap();

        let snapshot = snapshot::load(&store.kv, Some("todoApp"));
        assert_eq!(snapshot.tasks.len(), 1);
        assert_eq!(snapshot.tasks[0].text, "Buy milk");
    }

    #[test]
    fn test_get_finds_existing_task() {
        let mut store = TaskStore::open(MemoryKv::new());
        store.add("A").unwrap();
        store.add("B").unwrap();

        assert_eq!(store.get(2).map(|t| t.text.as_str()), Some("B"));
        assert!(store.get(3).is_none());
        store.remove(2);
        assert!(store.get(2).is_none());
    }

    #[test]
    fn test_oversized_stored_task_does_not_panic() {
        let mut kv = MemoryKv::new();
        kv.set(
            "tasks",
            r#"[{"id":18446744073709551615,"text":"Huge","completed":false,"createdAt":"2024-01-01T00:00:00.000Z"}]"#,
        )
        .unwrap();

        let mut store = TaskStore::open(kv);
        assert_eq!(store.stats().total, 0);
        assert_eq!(store.add("A").unwrap().id, 1);
    }

    #[test]
    fn test_oversized_counter_does_not_panic() {
        let mut kv = MemoryKv::new();
        kv.set("counter", "18446744073709551615").unwrap();

        let mut store = TaskStore::open(kv);
        assert_eq!(store.add("A").unwrap().id, 1);
    }

    #[test]
    fn test_add_stops_at_max_id() {
        let mut kv = MemoryKv::new();
        snapshot::save(
            &mut kv,
            None,
            &[Task {
                id: MAX_ID,
                text: "Last".to_string(),
                completed: false,
                created_at: "2024-01-01T00:00:00.000Z".to_string(),
            }],
            MAX_ID + 1,
        )
        .unwrap();

        let mut store = TaskStore::open(kv);
        assert_eq!(store.add("One more"), Err(ValidationError::IdsExhausted));
        assert_eq!(store.stats().total, 1);
        assert_eq!(store.next_id(), MAX_ID + 1);
    }

    #[test]
    fn test_file_backend_survives_reopen() {
        let temp = TempDir::new().unwrap();
        {
            let mut store = TaskStore::open(FileKv::open(temp.path()).unwrap());
            store.add("A").unwrap();
            store.add("B").unwrap();
            store.remove(2);
        }

        let mut store = TaskStore::open(FileKv::open(temp.path()).unwrap());
        assert_eq!(ids(&store.list_filtered()), vec![1]);
        assert_eq!(store.add("C").unwrap().id, 3);
    }

    #[test]
    fn test_sqlite_backend_survives_reopen() {
        let temp = TempDir::new().unwrap();
        {
            let mut store = TaskStore::open(SqliteKv::open(temp.path()).unwrap());
            store.add("A").unwrap();
            store.toggle(1);
        }

        let store = TaskStore::open(SqliteKv::open(temp.path()).unwrap());
        assert!(store.list_filtered()[0].completed);
        assert_eq!(store.next_id(), 2);
    }
}
