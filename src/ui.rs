use crate::app::{Mode, Session, ViewState};
use crate::model::{BucketKey, Task, TaskStore};
use crate::storage::StoreLocation;
use anyhow::Result;
use chrono::Local;
use crossterm::event::{self, DisableBracketedPaste, EnableBracketedPaste};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::prelude::{Alignment, Color, Modifier, Rect, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap};
use ratatui::Terminal;
use std::io::{stdout, Stdout};
use std::time::Duration;

pub fn run(store: TaskStore, location: StoreLocation, visible_days: usize) -> Result<()> {
    let mut terminal = setup_terminal()?;
    let today = Local::now().date_naive();
    let mut session = Session::new(store, location.path.clone(), today, visible_days);
    let size = terminal.size()?;
    session.view.width = size.width;
    session.view.height = size.height;
    let result = event_loop(&mut terminal, &mut session, &location);
    teardown_terminal(&mut terminal)?;
    result
}

fn event_loop(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    session: &mut Session,
    location: &StoreLocation,
) -> Result<()> {
    loop {
        terminal.draw(|f| draw(f, &session.view, &session.store, location))?;
        if event::poll(Duration::from_millis(500))? {
            let ev = event::read()?;
            if session.handle(&ev, Local::now().date_naive()) {
                break;
            }
        }
    }
    Ok(())
}

fn draw(
    f: &mut ratatui::Frame<'_>,
    view: &ViewState,
    store: &TaskStore,
    location: &StoreLocation,
) {
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2),
            Constraint::Min(6),
            Constraint::Length(3),
        ])
        .split(f.size());

    draw_header(f, layout[0], view, location);
    if view.show_future {
        draw_column(f, layout[1], view, store, BucketKey::Future, true);
    } else {
        let keys = view.date_keys();
        let constraints = keys
            .iter()
            .map(|_| Constraint::Ratio(1, keys.len() as u32))
            .collect::<Vec<_>>();
        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints(constraints)
            .split(layout[1]);
        for (idx, key) in keys.iter().enumerate() {
            draw_column(f, chunks[idx], view, store, *key, idx == view.col);
        }
    }
    draw_footer(f, layout[2], view);
}

fn draw_header(
    f: &mut ratatui::Frame<'_>,
    area: Rect,
    view: &ViewState,
    location: &StoreLocation,
) {
    let title = Line::from(vec![
        Span::styled(
            "dayboard ",
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!("{}", location.path.display()),
            Style::default().fg(Color::DarkGray),
        ),
        Span::raw("  •  "),
        Span::styled(location.scope.label(), Style::default().fg(Color::Green)),
        Span::raw("  •  "),
        Span::styled(
            format!("{} days", view.visible_days()),
            Style::default().fg(Color::Gray),
        ),
        Span::raw("  •  "),
        Span::styled(
            format!("mode {}", view.mode.label()),
            Style::default().fg(Color::Magenta),
        ),
    ]);
    let block = Block::default()
        .borders(Borders::BOTTOM)
        .border_style(Style::default().fg(Color::DarkGray));
    let paragraph = Paragraph::new(title)
        .alignment(Alignment::Center)
        .block(block);
    f.render_widget(paragraph, area);
}

fn draw_column(
    f: &mut ratatui::Frame<'_>,
    area: Rect,
    view: &ViewState,
    store: &TaskStore,
    key: BucketKey,
    focused: bool,
) {
    let tasks = store.tasks(key);
    let width = area.width.saturating_sub(4) as usize;
    let moving = view.mode == Mode::Moving;
    let mut items = tasks
        .iter()
        .enumerate()
        .map(|(idx, task)| {
            let selected = focused && idx == view.row;
            task_item(task, key.is_future(), selected, moving, width)
        })
        .collect::<Vec<_>>();
    if focused && matches!(view.mode, Mode::Adding | Mode::SettingDate) {
        items.push(input_item(view));
    }

    let mut state = ListState::default();
    if focused && !tasks.is_empty() {
        state.select(Some(view.row.min(tasks.len() - 1)));
    }

    let accent = if focused { Color::Cyan } else { Color::DarkGray };
    let block = Block::default()
        .title(Span::styled(
            column_title(key, view),
            Style::default().fg(accent).add_modifier(if focused {
                Modifier::BOLD | Modifier::UNDERLINED
            } else {
                Modifier::BOLD
            }),
        ))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(accent));
    let list = List::new(items).block(block);
    f.render_stateful_widget(list, area, &mut state);
}

fn column_title(key: BucketKey, view: &ViewState) -> String {
    match key {
        BucketKey::Future => "Future".to_string(),
        BucketKey::Date(date) if date == view.today() => "Today".to_string(),
        BucketKey::Date(date) => date.format("%a, %b %d").to_string(),
    }
}

fn task_item(
    task: &Task,
    show_due: bool,
    selected: bool,
    moving: bool,
    width: usize,
) -> ListItem<'static> {
    let marker = if task.completed { "[x] " } else { "[ ] " };
    let mut title = task.title.clone();
    if show_due {
        if let Some(due) = task.due_date {
            title.push_str(&format!(" ({})", due));
        }
    }
    let text = truncate_text(&format!("{}{}", marker, title), width);

    let mut style = if task.completed {
        Style::default()
            .fg(Color::DarkGray)
            .add_modifier(Modifier::CROSSED_OUT)
    } else {
        Style::default().fg(Color::Gray)
    };
    if selected {
        style = if moving {
            Style::default()
                .bg(Color::Rgb(252, 214, 112))
                .fg(Color::Black)
                .add_modifier(Modifier::BOLD)
        } else {
            style.fg(Color::LightYellow).add_modifier(Modifier::BOLD)
        };
    }
    ListItem::new(Line::from(Span::styled(text, style)))
}

fn input_item(view: &ViewState) -> ListItem<'static> {
    let prefix = if view.mode == Mode::SettingDate {
        "due: "
    } else {
        "+ "
    };
    let body = if view.input.is_empty() {
        Span::styled(
            format!("▌{}", view.input.placeholder()),
            Style::default().fg(Color::LightMagenta),
        )
    } else {
        Span::styled(view.input.with_caret(), Style::default().fg(Color::White))
    };
    ListItem::new(Line::from(vec![
        Span::styled(prefix, Style::default().fg(Color::Cyan)),
        body,
    ]))
}

fn draw_footer(f: &mut ratatui::Frame<'_>, area: Rect, view: &ViewState) {
    let mut lines = vec![help_line(view)];
    if let Some(err) = &view.error {
        lines.push(Line::from(Span::styled(
            format!("Error: {}", err),
            Style::default().fg(Color::LightRed),
        )));
    }
    let footer = Paragraph::new(lines)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .block(
            Block::default()
                .borders(Borders::TOP)
                .border_style(Style::default().fg(Color::DarkGray)),
        );
    f.render_widget(footer, area);
}

fn help_line(view: &ViewState) -> Line<'static> {
    let keys: &[(&str, &str)] = match view.mode {
        Mode::Browsing if view.show_future => &[
            ("↑↓", "select"),
            ("a", "add"),
            ("t", "set date"),
            ("T", "today"),
            ("enter", "toggle"),
            ("d", "delete"),
            ("f", "days"),
            ("q", "quit"),
        ],
        Mode::Browsing => &[
            ("←↑↓→", "navigate"),
            ("a", "add"),
            ("enter", "toggle"),
            ("m", "move"),
            ("d", "delete"),
            ("f", "future"),
            ("q", "quit"),
        ],
        Mode::Moving => &[
            ("←→", "other day"),
            ("↑↓", "reorder"),
            ("f", "to future"),
            ("esc/m", "done"),
        ],
        Mode::Adding | Mode::SettingDate => &[("enter", "save"), ("esc", "cancel")],
    };
    let mut spans = Vec::new();
    for (key, action) in keys {
        spans.push(Span::styled(
            key.to_string(),
            Style::default().fg(Color::LightCyan),
        ));
        spans.push(Span::raw(format!(" {}  ", action)));
    }
    Line::from(spans)
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen, EnableBracketedPaste)?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend)?;
    Ok(terminal)
}

fn teardown_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        DisableBracketedPaste,
        LeaveAlternateScreen
    )?;
    terminal.show_cursor()?;
    Ok(())
}

fn truncate_text(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    if max <= 3 {
        return text.chars().take(max).collect();
    }
    let mut out: String = text.chars().take(max - 3).collect();
    out.push_str("...");
    out
}
