use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicI64, Ordering};

pub type TaskId = String;

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const FUTURE_LABEL: &str = "Future";

/// Date buckets older than this many days are dropped on load.
pub const PRUNE_AFTER_DAYS: i64 = 5;

static LAST_ID: AtomicI64 = AtomicI64::new(0);

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
}

/// Key of a bucket: a calendar day, or the unscheduled `Future` list.
///
/// Ordering puts every date before `Future`, so a sorted map lists days
/// chronologically with the unscheduled bucket last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum BucketKey {
    Date(NaiveDate),
    Future,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskStore {
    buckets: BTreeMap<BucketKey, Vec<Task>>,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid bucket key {0:?}: expected YYYY-MM-DD or Future")]
pub struct BucketKeyError(String);

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DateInputError {
    #[error("date is required in YYYY-MM-DD or MM-DD format")]
    Empty,
    #[error("invalid date {0:?}; use YYYY-MM-DD or MM-DD")]
    Invalid(String),
}

impl Task {
    pub fn new(title: impl Into<String>) -> Self {
        Task {
            id: next_task_id(),
            title: title.into(),
            completed: false,
            created_at: Utc::now(),
            due_date: None,
        }
    }
}

impl BucketKey {
    pub fn is_future(&self) -> bool {
        matches!(self, BucketKey::Future)
    }

    pub fn date(&self) -> Option<NaiveDate> {
        match self {
            BucketKey::Date(date) => Some(*date),
            BucketKey::Future => None,
        }
    }
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BucketKey::Date(date) => write!(f, "{}", date.format(DATE_FORMAT)),
            BucketKey::Future => f.write_str(FUTURE_LABEL),
        }
    }
}

impl FromStr for BucketKey {
    type Err = BucketKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == FUTURE_LABEL {
            return Ok(BucketKey::Future);
        }
        NaiveDate::parse_from_str(s, DATE_FORMAT)
            .map(BucketKey::Date)
            .map_err(|_| BucketKeyError(s.to_string()))
    }
}

impl TryFrom<String> for BucketKey {
    type Error = BucketKeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<BucketKey> for String {
    fn from(key: BucketKey) -> Self {
        key.to_string()
    }
}

impl TaskStore {
    pub fn new() -> Self {
        TaskStore::default()
    }

    pub fn tasks(&self, key: BucketKey) -> &[Task] {
        self.buckets.get(&key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn task(&self, key: BucketKey, idx: usize) -> Option<&Task> {
        self.tasks(key).get(idx)
    }

    pub fn len(&self, key: BucketKey) -> usize {
        self.tasks(key).len()
    }

    #[cfg(test)]
    pub fn contains_bucket(&self, key: BucketKey) -> bool {
        self.buckets.contains_key(&key)
    }

    pub fn task_count(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    /// Inserts `task` right before the first completed task of the bucket and
    /// returns the index it landed on.
    pub fn insert_active(&mut self, key: BucketKey, task: Task) -> usize {
        let tasks = self.buckets.entry(key).or_default();
        let idx = first_completed(tasks);
        tasks.insert(idx, task);
        idx
    }

    /// Inserts at `idx`, clamped to the bucket length.
    pub fn insert_at(&mut self, key: BucketKey, idx: usize, task: Task) -> usize {
        let tasks = self.buckets.entry(key).or_default();
        let idx = idx.min(tasks.len());
        tasks.insert(idx, task);
        idx
    }

    pub fn push(&mut self, key: BucketKey, task: Task) -> usize {
        let tasks = self.buckets.entry(key).or_default();
        tasks.push(task);
        tasks.len() - 1
    }

    pub fn remove(&mut self, key: BucketKey, idx: usize) -> Option<Task> {
        let tasks = self.buckets.get_mut(&key)?;
        if idx >= tasks.len() {
            return None;
        }
        Some(tasks.remove(idx))
    }

    pub fn swap(&mut self, key: BucketKey, a: usize, b: usize) -> bool {
        match self.buckets.get_mut(&key) {
            Some(tasks) if a < tasks.len() && b < tasks.len() => {
                tasks.swap(a, b);
                true
            }
            _ => false,
        }
    }

    pub fn update_task<F>(&mut self, key: BucketKey, idx: usize, f: F) -> bool
    where
        F: FnOnce(&mut Task),
    {
        match self.buckets.get_mut(&key).and_then(|tasks| tasks.get_mut(idx)) {
            Some(task) => {
                f(task);
                true
            }
            None => false,
        }
    }

    /// Flips completion of the task at `idx` and repositions it so that
    /// incomplete tasks stay ahead of completed ones. Returns the task's new
    /// index.
    pub fn toggle(&mut self, key: BucketKey, idx: usize) -> Option<usize> {
        let tasks = self.buckets.get_mut(&key)?;
        let task = tasks.get_mut(idx)?;
        task.completed = !task.completed;
        if task.completed {
            if idx + 1 < tasks.len() {
                let task = tasks.remove(idx);
                tasks.push(task);
                return Some(tasks.len() - 1);
            }
            Some(idx)
        } else {
            let task = tasks.remove(idx);
            let pos = first_completed(tasks);
            tasks.insert(pos, task);
            Some(pos)
        }
    }

    /// Looks for `id` in the given keys and returns `(key position, row)`.
    pub fn find_in(&self, keys: &[BucketKey], id: &str) -> Option<(usize, usize)> {
        keys.iter().enumerate().find_map(|(col, key)| {
            self.tasks(*key)
                .iter()
                .position(|t| t.id == id)
                .map(|row| (col, row))
        })
    }

    /// Appends one unscheduled task per title to the Future bucket.
    pub fn import_titles<I, S>(&mut self, titles: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut count = 0;
        for title in titles {
            self.push(BucketKey::Future, Task::new(title));
            count += 1;
        }
        count
    }

    /// Moves every incomplete task of a past day into today, stamping its due
    /// date. Completed tasks stay where they were.
    pub fn roll_over(&mut self, today: NaiveDate) -> bool {
        let mut rolled = Vec::new();
        let mut emptied = Vec::new();
        for (key, tasks) in self.buckets.iter_mut() {
            let date = match key {
                BucketKey::Date(date) if *date < today => *date,
                _ => continue,
            };
            let (done, pending): (Vec<Task>, Vec<Task>) =
                std::mem::take(tasks).into_iter().partition(|t| t.completed);
            rolled.extend(pending.into_iter().map(|mut task| {
                task.due_date = Some(today);
                task
            }));
            if done.is_empty() {
                emptied.push(date);
            }
            *tasks = done;
        }

        let mut changed = !emptied.is_empty();
        for date in emptied {
            self.buckets.remove(&BucketKey::Date(date));
        }
        if !rolled.is_empty() {
            log::info!("rolled {} task(s) over to {}", rolled.len(), today);
            self.buckets
                .entry(BucketKey::Date(today))
                .or_default()
                .extend(rolled);
            changed = true;
        }
        let today_key = BucketKey::Date(today);
        if self.buckets.get(&today_key).is_some_and(Vec::is_empty) {
            self.buckets.remove(&today_key);
            changed = true;
        }
        changed
    }

    /// Deletes day buckets older than the retention window and strips
    /// completed tasks from Future.
    pub fn prune(&mut self, today: NaiveDate) -> bool {
        let cutoff = today - Duration::days(PRUNE_AFTER_DAYS);
        let before = self.buckets.len();
        self.buckets
            .retain(|key, _| key.date().map_or(true, |date| date >= cutoff));
        let mut changed = self.buckets.len() != before;

        if let Some(future) = self.buckets.get_mut(&BucketKey::Future) {
            let count = future.len();
            future.retain(|t| !t.completed);
            changed |= future.len() != count;
        }
        if changed {
            log::debug!("pruned store against cutoff {}", cutoff);
        }
        changed
    }

    /// Pulls Future tasks whose due date falls inside the visible window into
    /// their day bucket. Overdue dates land on today.
    pub fn distribute_future(&mut self, today: NaiveDate, visible_days: usize) -> bool {
        let last_visible = last_visible_day(today, visible_days);
        let future = match self.buckets.get_mut(&BucketKey::Future) {
            Some(future) if !future.is_empty() => future,
            _ => return false,
        };
        let (due, remaining): (Vec<Task>, Vec<Task>) = std::mem::take(future)
            .into_iter()
            .partition(|t| t.due_date.is_some_and(|d| d <= last_visible));
        *future = remaining;
        if due.is_empty() {
            return false;
        }

        log::info!("distributing {} task(s) out of Future", due.len());
        for task in due {
            let target = task.due_date.map_or(today, |d| d.max(today));
            self.buckets
                .entry(BucketKey::Date(target))
                .or_default()
                .push(task);
        }
        true
    }

    /// Rollover, prune and distribute in load order. Every step runs even
    /// when an earlier one already changed the store.
    pub fn normalize(&mut self, today: NaiveDate, visible_days: usize) -> bool {
        let rolled = self.roll_over(today);
        let pruned = self.prune(today);
        let distributed = self.distribute_future(today, visible_days);
        rolled || pruned || distributed
    }
}

pub fn visible_keys(today: NaiveDate, visible_days: usize) -> Vec<BucketKey> {
    (0..visible_days)
        .map(|offset| BucketKey::Date(today + Duration::days(offset as i64)))
        .collect()
}

fn last_visible_day(today: NaiveDate, visible_days: usize) -> NaiveDate {
    today + Duration::days(visible_days.saturating_sub(1) as i64)
}

fn first_completed(tasks: &[Task]) -> usize {
    tasks
        .iter()
        .position(|t| t.completed)
        .unwrap_or(tasks.len())
}

/// Returns a fresh id derived from the wall clock in nanoseconds. Ids are
/// strictly increasing within a process even when the clock stalls.
pub fn next_task_id() -> TaskId {
    let now = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    let prev = LAST_ID
        .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |last| {
            Some(now.max(last + 1))
        })
        .unwrap_or_else(|last| last);
    now.max(prev + 1).to_string()
}

/// Normalizes user-entered due dates. Exactly five characters are read as
/// `MM-DD` in the current year, anything else must be a full `YYYY-MM-DD`.
pub fn parse_due_input(input: &str, today: NaiveDate) -> Result<NaiveDate, DateInputError> {
    let raw = input.trim();
    if raw.is_empty() {
        return Err(DateInputError::Empty);
    }
    let candidate = if raw.len() == 5 {
        format!("{}-{}", today.year(), raw)
    } else {
        raw.to_string()
    };
    let parsed = NaiveDate::parse_from_str(&candidate, DATE_FORMAT)
        .map_err(|_| DateInputError::Invalid(raw.to_string()))?;
    // chrono accepts unpadded fields; the stored form is always zero-padded
    if parsed.format(DATE_FORMAT).to_string() != candidate {
        return Err(DateInputError::Invalid(raw.to_string()));
    }
    Ok(parsed)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashSet;

    pub(crate) fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    pub(crate) fn task(id: &str, completed: bool) -> Task {
        Task {
            id: id.into(),
            title: format!("task {}", id),
            completed,
            created_at: DateTime::<Utc>::default(),
            due_date: None,
        }
    }

    fn ids(store: &TaskStore, key: BucketKey) -> Vec<&str> {
        store.tasks(key).iter().map(|t| t.id.as_str()).collect()
    }

    fn is_partitioned(tasks: &[Task]) -> bool {
        let first_done = first_completed(tasks);
        tasks[first_done..].iter().all(|t| t.completed)
    }

    const TODAY: (i32, u32, u32) = (2026, 10, 18);

    fn today() -> NaiveDate {
        day(TODAY.0, TODAY.1, TODAY.2)
    }

    fn ago(days: i64) -> BucketKey {
        BucketKey::Date(today() - Duration::days(days))
    }

    #[test]
    fn bucket_keys_parse_and_display() {
        assert_eq!("Future".parse::<BucketKey>(), Ok(BucketKey::Future));
        assert_eq!(
            "2026-10-18".parse::<BucketKey>(),
            Ok(BucketKey::Date(today()))
        );
        assert!("tomorrow".parse::<BucketKey>().is_err());
        assert_eq!(BucketKey::Date(day(2026, 1, 5)).to_string(), "2026-01-05");
        assert!(BucketKey::Date(day(9999, 12, 31)) < BucketKey::Future);
    }

    #[test]
    fn insert_active_lands_before_first_completed() {
        let mut store = TaskStore::new();
        let key = BucketKey::Date(today());
        store.push(key, task("a", false));
        store.push(key, task("b", true));
        store.push(key, task("c", true));

        let idx = store.insert_active(key, task("new", false));

        assert_eq!(idx, 1);
        assert_eq!(ids(&store, key), vec!["a", "new", "b", "c"]);
    }

    #[test]
    fn insert_active_appends_when_nothing_completed() {
        let mut store = TaskStore::new();
        let key = BucketKey::Future;
        store.push(key, task("a", false));
        assert_eq!(store.insert_active(key, task("b", false)), 1);
        assert_eq!(store.insert_active(BucketKey::Date(today()), task("c", false)), 0);
    }

    #[test]
    fn toggle_keeps_bucket_partitioned() {
        let key = BucketKey::Date(today());
        for idx in 0..5 {
            let mut store = TaskStore::new();
            store.push(key, task("a", false));
            store.push(key, task("b", false));
            store.push(key, task("c", false));
            store.push(key, task("d", true));
            store.push(key, task("e", true));

            store.toggle(key, idx).unwrap();

            assert!(is_partitioned(store.tasks(key)), "toggling row {}", idx);
            assert_eq!(store.len(key), 5);
        }
    }

    #[test]
    fn toggle_moves_completed_to_end_and_reopened_above_completed() {
        let key = BucketKey::Date(today());
        let mut store = TaskStore::new();
        store.push(key, task("a", false));
        store.push(key, task("b", false));
        store.push(key, task("c", true));

        assert_eq!(store.toggle(key, 0), Some(2));
        assert_eq!(ids(&store, key), vec!["b", "c", "a"]);

        assert_eq!(store.toggle(key, 2), Some(1));
        assert_eq!(ids(&store, key), vec!["b", "a", "c"]);
        assert!(!store.tasks(key)[1].completed);
    }

    #[test]
    fn toggle_out_of_range_is_noop() {
        let key = BucketKey::Date(today());
        let mut store = TaskStore::new();
        assert_eq!(store.toggle(key, 0), None);
        store.push(key, task("a", false));
        assert_eq!(store.toggle(key, 3), None);
        assert!(!store.tasks(key)[0].completed);
    }

    #[test]
    fn roll_over_moves_incomplete_tasks_to_today() {
        let mut store = TaskStore::new();
        store.push(ago(2), task("X", false));
        store.push(ago(2), task("Y", true));
        store.push(BucketKey::Date(today()), task("T", false));

        assert!(store.roll_over(today()));

        assert_eq!(ids(&store, BucketKey::Date(today())), vec!["T", "X"]);
        assert_eq!(store.tasks(BucketKey::Date(today()))[1].due_date, Some(today()));
        assert_eq!(ids(&store, ago(2)), vec!["Y"]);
    }

    #[test]
    fn roll_over_drops_emptied_days_and_skips_future() {
        let mut store = TaskStore::new();
        store.push(ago(1), task("a", false));
        store.push(BucketKey::Future, task("f", false));

        assert!(store.roll_over(today()));

        assert!(!store.contains_bucket(ago(1)));
        assert_eq!(ids(&store, BucketKey::Future), vec!["f"]);
        assert_eq!(ids(&store, BucketKey::Date(today())), vec!["a"]);
    }

    #[test]
    fn roll_over_removes_empty_today_bucket() {
        let mut store = TaskStore::new();
        store.buckets.insert(BucketKey::Date(today()), Vec::new());
        assert!(store.roll_over(today()));
        assert!(!store.contains_bucket(BucketKey::Date(today())));
        assert!(!store.roll_over(today()));
    }

    #[test]
    fn prune_drops_stale_days_and_completed_future() {
        let mut store = TaskStore::new();
        store.push(ago(6), task("old", true));
        store.push(ago(6), task("old2", false));
        store.push(ago(5), task("edge", true));
        store.push(ago(4), task("recent", true));
        store.push(BucketKey::Future, task("done", true));
        store.push(BucketKey::Future, task("open", false));

        assert!(store.prune(today()));

        assert!(!store.contains_bucket(ago(6)));
        assert!(store.contains_bucket(ago(5)));
        assert!(store.contains_bucket(ago(4)));
        assert_eq!(ids(&store, BucketKey::Future), vec!["open"]);
        assert!(!store.prune(today()));
    }

    #[test]
    fn prune_keeps_empty_future_bucket() {
        let mut store = TaskStore::new();
        store.push(BucketKey::Future, task("done", true));
        assert!(store.prune(today()));
        assert!(store.contains_bucket(BucketKey::Future));
        assert_eq!(store.len(BucketKey::Future), 0);
    }

    #[test]
    fn distribute_moves_tasks_due_inside_window() {
        let tomorrow = today() + Duration::days(1);
        let mut store = TaskStore::new();
        let mut soon = task("soon", false);
        soon.due_date = Some(tomorrow);
        let mut later = task("later", false);
        later.due_date = Some(today() + Duration::days(10));
        let mut overdue = task("overdue", false);
        overdue.due_date = Some(today() - Duration::days(3));
        store.push(BucketKey::Future, soon);
        store.push(BucketKey::Future, later);
        store.push(BucketKey::Future, overdue);
        store.push(BucketKey::Future, task("someday", false));

        assert!(store.distribute_future(today(), 3));

        assert_eq!(ids(&store, BucketKey::Date(tomorrow)), vec!["soon"]);
        assert_eq!(ids(&store, BucketKey::Date(today())), vec!["overdue"]);
        assert_eq!(ids(&store, BucketKey::Future), vec!["later", "someday"]);
        assert!(!store.distribute_future(today(), 3));
    }

    #[test]
    fn distribute_respects_last_visible_day() {
        let mut store = TaskStore::new();
        let mut edge = task("edge", false);
        edge.due_date = Some(today() + Duration::days(2));
        store.push(BucketKey::Future, edge);

        assert!(!store.distribute_future(today(), 2));
        assert!(store.distribute_future(today(), 3));
        assert_eq!(store.len(BucketKey::Future), 0);
    }

    #[test]
    fn find_in_reports_column_and_row() {
        let keys = visible_keys(today(), 3);
        let mut store = TaskStore::new();
        store.push(keys[2], task("a", false));
        store.push(keys[2], task("b", false));
        store.push(BucketKey::Future, task("c", false));

        assert_eq!(store.find_in(&keys, "b"), Some((2, 1)));
        assert_eq!(store.find_in(&keys, "c"), None);
    }

    #[test]
    fn visible_keys_start_today() {
        let keys = visible_keys(day(2026, 12, 31), 3);
        assert_eq!(
            keys,
            vec![
                BucketKey::Date(day(2026, 12, 31)),
                BucketKey::Date(day(2027, 1, 1)),
                BucketKey::Date(day(2027, 1, 2)),
            ]
        );
    }

    #[test]
    fn import_appends_in_order() {
        let mut store = TaskStore::new();
        store.push(BucketKey::Future, task("existing", false));
        assert_eq!(store.import_titles(["one", "two"]), 2);
        let titles: Vec<&str> = store
            .tasks(BucketKey::Future)
            .iter()
            .map(|t| t.title.as_str())
            .collect();
        assert_eq!(titles, vec!["task existing", "one", "two"]);
    }

    #[test]
    fn task_ids_do_not_collide() {
        let ids: HashSet<TaskId> = (0..10_000).map(|_| next_task_id()).collect();
        assert_eq!(ids.len(), 10_000);
    }

    #[test]
    fn due_input_accepts_short_and_full_forms() {
        assert_eq!(parse_due_input("12-31", today()), Ok(day(2026, 12, 31)));
        assert_eq!(parse_due_input(" 2027-02-03 ", today()), Ok(day(2027, 2, 3)));
    }

    #[test]
    fn due_input_rejects_bad_values() {
        assert_eq!(parse_due_input("   ", today()), Err(DateInputError::Empty));
        assert_eq!(
            parse_due_input("24-11", today()),
            Err(DateInputError::Invalid("24-11".into()))
        );
        assert!(parse_due_input("2026-2-3", today()).is_err());
        assert!(parse_due_input("2-3", today()).is_err());
        assert!(parse_due_input("02-30", today()).is_err());
        assert!(parse_due_input("next friday", today()).is_err());
    }

    #[test]
    fn store_serializes_as_keyed_mapping() {
        let mut store = TaskStore::new();
        let mut t = task("1", false);
        t.due_date = Some(day(2026, 11, 1));
        store.push(BucketKey::Future, t);
        store.push(BucketKey::Date(today()), task("2", true));

        let yaml = serde_yaml::to_string(&store).unwrap();
        let day_pos = yaml.find("2026-10-18").unwrap();
        let future_pos = yaml.find("Future").unwrap();
        assert!(day_pos < future_pos);
        assert!(yaml.contains("2026-11-01"));

        let back: TaskStore = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back, store);
    }

    #[test]
    fn store_rejects_unknown_keys() {
        let result: Result<TaskStore, _> = serde_yaml::from_str("someday: []\n");
        assert!(result.is_err());
    }
}
