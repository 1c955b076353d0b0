use crate::input::TextInput;
use crate::model::{parse_due_input, visible_keys, BucketKey, Task, TaskStore};
use crate::storage::save_store;
use chrono::NaiveDate;
use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use std::path::PathBuf;

pub const ADD_PLACEHOLDER: &str = "new task";
pub const DATE_PLACEHOLDER: &str = "YYYY-MM-DD or MM-DD";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Browsing,
    Adding,
    Moving,
    SettingDate,
}

/// Everything the renderer needs besides the store: mode, cursor, the
/// visible day keys and the transient input/error slots.
#[derive(Debug, Clone, Default)]
pub struct ViewState {
    pub mode: Mode,
    pub col: usize,
    pub row: usize,
    pub show_future: bool,
    pub input: TextInput,
    pub error: Option<String>,
    pub width: u16,
    pub height: u16,
    today: NaiveDate,
    visible_days: usize,
    date_keys: Vec<BucketKey>,
}

/// What the caller must do after a transition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Effects {
    pub persist: bool,
    pub quit: bool,
}

impl Effects {
    fn persist() -> Self {
        Effects {
            persist: true,
            quit: false,
        }
    }

    fn quit() -> Self {
        Effects {
            persist: false,
            quit: true,
        }
    }

    fn merge(self, other: Effects) -> Self {
        Effects {
            persist: self.persist || other.persist,
            quit: self.quit || other.quit,
        }
    }
}

impl Mode {
    pub fn label(&self) -> &'static str {
        match self {
            Mode::Browsing => "browse",
            Mode::Adding => "add",
            Mode::Moving => "move",
            Mode::SettingDate => "set date",
        }
    }
}

impl ViewState {
    pub fn new(today: NaiveDate, visible_days: usize) -> Self {
        let mut view = ViewState {
            visible_days: visible_days.max(1),
            ..ViewState::default()
        };
        view.refresh_date_keys(today);
        view
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    pub fn visible_days(&self) -> usize {
        self.visible_days
    }

    pub fn date_keys(&self) -> &[BucketKey] {
        &self.date_keys
    }

    /// Bucket under the cursor: Future while that view is shown, otherwise
    /// the focused day column.
    pub fn current_key(&self) -> BucketKey {
        if self.show_future {
            return BucketKey::Future;
        }
        self.date_keys
            .get(self.col)
            .copied()
            .unwrap_or(BucketKey::Date(self.today))
    }

    fn refresh_date_keys(&mut self, today: NaiveDate) {
        self.today = today;
        self.date_keys = visible_keys(today, self.visible_days);
        self.col = self.col.min(self.visible_days.saturating_sub(1));
    }

    fn clamp_row(&mut self, store: &TaskStore) {
        let len = store.len(self.current_key());
        if self.row >= len {
            self.row = len.saturating_sub(1);
        }
    }
}

/// Applies one input event. The view and store go in by value and come back
/// out together with the side effects the caller has to carry out.
pub fn update(
    mut view: ViewState,
    mut store: TaskStore,
    event: &Event,
    today: NaiveDate,
) -> (ViewState, TaskStore, Effects) {
    let mut effects = Effects::default();
    if today != view.today {
        effects.persist = roll_day(&mut view, &mut store, today);
    }

    match event {
        Event::Resize(width, height) => {
            view.width = *width;
            view.height = *height;
        }
        Event::Key(key) if key.kind == KeyEventKind::Press => {
            let handled = match view.mode {
                Mode::Browsing => handle_browsing(&mut view, &mut store, *key, today),
                Mode::Adding => handle_adding(&mut view, &mut store, *key),
                Mode::Moving => handle_moving(&mut view, &mut store, *key),
                Mode::SettingDate => handle_setting_date(&mut view, &mut store, *key, today),
            };
            effects = effects.merge(handled);
        }
        Event::Paste(text) if matches!(view.mode, Mode::Adding | Mode::SettingDate) => {
            view.input.insert_str(text.trim_end_matches(['\r', '\n']));
        }
        _ => {}
    }
    (view, store, effects)
}

/// Re-normalizes the store when the calendar day changed under a running
/// session.
fn roll_day(view: &mut ViewState, store: &mut TaskStore, today: NaiveDate) -> bool {
    log::info!("day changed from {} to {}", view.today, today);
    let changed = store.normalize(today, view.visible_days);
    view.refresh_date_keys(today);
    view.clamp_row(store);
    changed
}

fn handle_browsing(
    view: &mut ViewState,
    store: &mut TaskStore,
    key: KeyEvent,
    today: NaiveDate,
) -> Effects {
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return match key.code {
            KeyCode::Char('c') => Effects::quit(),
            _ => Effects::default(),
        };
    }
    match key.code {
        KeyCode::Char('q') => return Effects::quit(),
        KeyCode::Right | KeyCode::Char('l') => {
            if !view.show_future && view.col + 1 < view.visible_days {
                view.col += 1;
                view.clamp_row(store);
            }
        }
        KeyCode::Left | KeyCode::Char('h') => {
            if !view.show_future && view.col > 0 {
                view.col -= 1;
                view.clamp_row(store);
            }
        }
        KeyCode::Up | KeyCode::Char('k') => view.row = view.row.saturating_sub(1),
        KeyCode::Down | KeyCode::Char('j') => {
            if view.row + 1 < store.len(view.current_key()) {
                view.row += 1;
            }
        }
        KeyCode::Char('a') => {
            view.mode = Mode::Adding;
            view.input.reset(ADD_PLACEHOLDER);
        }
        KeyCode::Char('d') => return delete_task(view, store),
        KeyCode::Enter | KeyCode::Char(' ') => return toggle_task(view, store),
        KeyCode::Char('m') => view.mode = Mode::Moving,
        KeyCode::Char('f') => {
            view.show_future = !view.show_future;
            view.row = 0;
            view.clamp_row(store);
        }
        KeyCode::Char('t') if view.show_future => {
            view.mode = Mode::SettingDate;
            view.input.reset(DATE_PLACEHOLDER);
        }
        KeyCode::Char('T') if view.show_future => return schedule_today(view, store, today),
        _ => {}
    }
    Effects::default()
}

fn handle_adding(view: &mut ViewState, store: &mut TaskStore, key: KeyEvent) -> Effects {
    match key.code {
        KeyCode::Enter => {
            let title = view.input.value().trim();
            if title.is_empty() {
                return Effects::default();
            }
            let task = Task::new(title);
            let key = view.current_key();
            log::debug!("adding task {} to {}", task.id, key);
            store.insert_active(key, task);
            view.input.clear();
            view.mode = Mode::Browsing;
            view.clamp_row(store);
            Effects::persist()
        }
        KeyCode::Esc => {
            view.input.clear();
            view.mode = Mode::Browsing;
            Effects::default()
        }
        _ => {
            view.input.handle_key(key);
            Effects::default()
        }
    }
}

fn handle_moving(view: &mut ViewState, store: &mut TaskStore, key: KeyEvent) -> Effects {
    let moved = match key.code {
        KeyCode::Esc | KeyCode::Char('m') => {
            view.mode = Mode::Browsing;
            false
        }
        KeyCode::Right | KeyCode::Char('l') => move_across(view, store, 1),
        KeyCode::Left | KeyCode::Char('h') => move_across(view, store, -1),
        KeyCode::Up | KeyCode::Char('k') => reorder(view, store, -1),
        KeyCode::Down | KeyCode::Char('j') => reorder(view, store, 1),
        KeyCode::Char('f') => send_to_future(view, store),
        _ => false,
    };
    if moved {
        Effects::persist()
    } else {
        Effects::default()
    }
}

fn handle_setting_date(
    view: &mut ViewState,
    store: &mut TaskStore,
    key: KeyEvent,
    today: NaiveDate,
) -> Effects {
    match key.code {
        KeyCode::Enter => confirm_date(view, store, today),
        KeyCode::Esc => {
            view.input.clear();
            view.mode = Mode::Browsing;
            Effects::default()
        }
        _ => {
            view.input.handle_key(key);
            Effects::default()
        }
    }
}

fn delete_task(view: &mut ViewState, store: &mut TaskStore) -> Effects {
    match store.remove(view.current_key(), view.row) {
        Some(task) => {
            log::debug!("deleted task {}", task.id);
            view.clamp_row(store);
            Effects::persist()
        }
        None => Effects::default(),
    }
}

fn toggle_task(view: &mut ViewState, store: &mut TaskStore) -> Effects {
    match store.toggle(view.current_key(), view.row) {
        Some(_) => {
            view.clamp_row(store);
            Effects::persist()
        }
        None => Effects::default(),
    }
}

/// Carries the focused task to the neighbouring day at the same row and
/// keeps the cursor on it.
fn move_across(view: &mut ViewState, store: &mut TaskStore, delta: isize) -> bool {
    if view.show_future {
        return false;
    }
    let target_col = match view.col.checked_add_signed(delta) {
        Some(col) if col < view.date_keys.len() => col,
        _ => return false,
    };
    let source = view.current_key();
    let task = match store.remove(source, view.row) {
        Some(task) => task,
        None => return false,
    };
    let row = store.insert_at(view.date_keys[target_col], view.row, task);
    view.col = target_col;
    view.row = row;
    true
}

fn reorder(view: &mut ViewState, store: &mut TaskStore, delta: isize) -> bool {
    let key = view.current_key();
    let target = match view.row.checked_add_signed(delta) {
        Some(row) if row < store.len(key) => row,
        _ => return false,
    };
    if !store.swap(key, view.row, target) {
        return false;
    }
    view.row = target;
    true
}

fn send_to_future(view: &mut ViewState, store: &mut TaskStore) -> bool {
    if view.show_future {
        return false;
    }
    let mut task = match store.remove(view.current_key(), view.row) {
        Some(task) => task,
        None => return false,
    };
    task.due_date = None;
    store.push(BucketKey::Future, task);
    view.clamp_row(store);
    view.mode = Mode::Browsing;
    true
}

fn schedule_today(view: &mut ViewState, store: &mut TaskStore, today: NaiveDate) -> Effects {
    let mut task = match store.remove(BucketKey::Future, view.row) {
        Some(task) => task,
        None => return Effects::default(),
    };
    task.due_date = Some(today);
    let row = store.insert_active(BucketKey::Date(today), task);
    view.show_future = false;
    view.col = 0;
    view.row = row;
    Effects::persist()
}

fn confirm_date(view: &mut ViewState, store: &mut TaskStore, today: NaiveDate) -> Effects {
    let key = view.current_key();
    let id = match store.task(key, view.row) {
        Some(task) => task.id.clone(),
        None => {
            view.input.clear();
            view.mode = Mode::Browsing;
            return Effects::default();
        }
    };
    let date = match parse_due_input(view.input.value(), today) {
        Ok(date) => date,
        Err(err) => {
            view.error = Some(err.to_string());
            return Effects::default();
        }
    };

    store.update_task(key, view.row, |task| task.due_date = Some(date));
    store.distribute_future(today, view.visible_days);
    view.refresh_date_keys(today);

    match store.find_in(&view.date_keys, &id) {
        Some((col, row)) if view.show_future => {
            view.show_future = false;
            view.col = col;
            view.row = row;
        }
        _ => view.clamp_row(store),
    }
    view.error = None;
    view.input.clear();
    view.mode = Mode::Browsing;
    Effects::persist()
}

/// Owns the live view and store for a run and writes the store to disk after
/// every mutating event.
pub struct Session {
    pub view: ViewState,
    pub store: TaskStore,
    path: PathBuf,
}

impl Session {
    pub fn new(store: TaskStore, path: PathBuf, today: NaiveDate, visible_days: usize) -> Self {
        let mut view = ViewState::new(today, visible_days);
        view.clamp_row(&store);
        Session { view, store, path }
    }

    /// Feeds one event through `update`. Returns true once the user quits.
    pub fn handle(&mut self, event: &Event, today: NaiveDate) -> bool {
        let view = std::mem::take(&mut self.view);
        let store = std::mem::take(&mut self.store);
        let (view, store, effects) = update(view, store, event, today);
        self.view = view;
        self.store = store;
        if effects.persist {
            self.persist();
        }
        effects.quit
    }

    fn persist(&mut self) {
        match save_store(&self.path, &self.store) {
            Ok(()) => self.view.error = None,
            Err(err) => {
                log::warn!("save failed: {:#}", err);
                self.view.error = Some(format!("save failed: {:#}", err));
            }
        }
    }
}
