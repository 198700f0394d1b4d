use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossbeam_channel::Receiver;
use crossterm::event::{self, DisableMouseCapture, EnableMouseCapture};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Alignment, Constraint, Direction, Layout};
use ratatui::prelude::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, ListState, Paragraph, Wrap};
use tracing::info;

mod reader;

use crate::base_system::context::Config;
use crate::base_system::environment::Endpoint;
use crate::base_system::logging::take_broadcast_rx;
use crate::navigation::{NavigatorHandle, Phase, Snapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Focus {
    Books,
    Chapters,
}

const SPINNER_FRAMES: &[char] = &['|', '/', '-', '\\'];

const LOG_HEIGHT: u16 = 7;

const MAX_LOG_LINES: usize = 200;

pub(super) struct App {
    nav: NavigatorHandle,
    snapshot: Arc<Snapshot>,
    focus: Focus,
    book_state: ListState,
    chapter_cursor: usize,
    status: String,
    endpoint_label: String,
    logs: Vec<String>,
    log_rx: Option<Receiver<String>>,
    show_log_pane: bool,
    open_command: Option<String>,
    spinner_idx: usize,
    spinner_last: Instant,
    should_quit: bool,
    last_layout: Option<reader::ReaderLayout>,
}

impl App {
    fn new(config: &Config, endpoint: &Endpoint, nav: NavigatorHandle) -> Self {
        let snapshot = nav.snapshot();
        Self {
            nav,
            snapshot,
            focus: Focus::Books,
            book_state: ListState::default(),
            chapter_cursor: 0,
            status: "←/→ 翻页，Tab 切换书籍/章节，Enter 打开，o 打开图片，q 退出".to_string(),
            endpoint_label: format!("{} | {}", endpoint.environment, endpoint.base_url),
            logs: Vec::new(),
            log_rx: take_broadcast_rx(),
            show_log_pane: config.show_log_pane,
            open_command: config.custom_open_command().map(str::to_string),
            spinner_idx: 0,
            spinner_last: Instant::now(),
            should_quit: false,
            last_layout: None,
        }
    }

    fn push_log(&mut self, msg: impl Into<String>) {
        let msg = msg.into();
        let trimmed = msg.trim_end_matches(['\r', '\n']);
        if trimmed.is_empty() {
            return;
        }
        self.logs.push(trimmed.to_string());
        if self.logs.len() > MAX_LOG_LINES {
            let overflow = self.logs.len() - MAX_LOG_LINES;
            self.logs.drain(0..overflow);
        }
    }

    /// 收到新快照后把光标对齐到当前书籍/章节。加载中保持用户光标不动。
    fn apply_snapshot(&mut self, snapshot: Arc<Snapshot>) {
        self.snapshot = snapshot;
        if self.snapshot.phase != Phase::Ready {
            return;
        }
        let snap = &self.snapshot;
        let book_idx = snap
            .selected_book
            .as_ref()
            .and_then(|b| snap.books.iter().position(|x| x.id == b.id));
        let chapter_idx = match (&snap.selected_book, &snap.current_chapter) {
            (Some(book), Some(chapter)) => book.chapter_position(chapter.id),
            _ => None,
        };
        self.book_state
            .select(book_idx.or(if snap.books.is_empty() { None } else { Some(0) }));
        self.chapter_cursor = chapter_idx.unwrap_or(0);
    }
}

/// 运行阅读器 TUI；退出时交还导航句柄以便调用方收尾。
pub fn run(config: &Config, endpoint: &Endpoint, nav: NavigatorHandle) -> Result<NavigatorHandle> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = std::io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)
        .context("enter alternate screen")?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("init terminal")?;

    let mut app = App::new(config, endpoint, nav);
    let result = run_loop(&mut terminal, &mut app);

    disable_raw_mode().ok();
    execute!(terminal.backend_mut(), DisableMouseCapture, LeaveAlternateScreen).ok();
    terminal.show_cursor().ok();

    result.map(|()| app.nav)
}

fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    app: &mut App,
) -> Result<()> {
    info!(target: "ui", "TUI 已启动: {}", app.endpoint_label);
    loop {
        tick_spinner(app);
        poll_navigator(app);
        drain_log_channel(app);

        terminal.draw(|f| reader::draw_reader(f, app))?;

        if !handle_event(app)? {
            break;
        }
    }
    info!(target: "ui", "TUI 退出");
    Ok(())
}

fn handle_event(app: &mut App) -> Result<bool> {
    if !event::poll(Duration::from_millis(100)).context("poll event")? {
        return Ok(true);
    }
    let evt = event::read().context("read event")?;
    reader::handle_event_reader(app, evt)?;
    Ok(!app.should_quit)
}

fn poll_navigator(app: &mut App) {
    if let Some(snapshot) = app.nav.take_changed() {
        app.apply_snapshot(snapshot);
    }
}

fn tick_spinner(app: &mut App) {
    if !app.snapshot.is_loading() {
        return;
    }
    if app.spinner_last.elapsed() < Duration::from_millis(140) {
        return;
    }
    app.spinner_idx = (app.spinner_idx + 1) % SPINNER_FRAMES.len();
    app.spinner_last = Instant::now();
}

fn drain_log_channel(app: &mut App) {
    if let Some(rx) = app.log_rx.clone() {
        for line in rx.try_iter() {
            app.push_log(line);
        }
    }
}

fn split_with_log(area: Rect, show_log: bool) -> (Rect, Option<Rect>) {
    if !show_log || area.height < LOG_HEIGHT * 2 {
        return (area, None);
    }
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(LOG_HEIGHT), Constraint::Length(LOG_HEIGHT)])
        .split(area);
    (layout[0], Some(layout[1]))
}

fn render_log_box(frame: &mut ratatui::Frame, area: Rect, app: &App) {
    let mut lines = Vec::new();
    if app.logs.is_empty() {
        lines.push(Line::from("日志: 暂无"));
    } else {
        // 只取可见行数，始终停在最新一条
        let visible = area.height.saturating_sub(2).max(1) as usize;
        lines.extend(
            app.logs
                .iter()
                .rev()
                .take(visible)
                .rev()
                .map(|m| style_log_line(m)),
        );
    }

    let log = Paragraph::new(lines)
        .wrap(Wrap { trim: true })
        .block(Block::default().borders(Borders::ALL).title("日志"));
    frame.render_widget(log, area);
}

fn render_loading_overlay(frame: &mut ratatui::Frame, area: Rect, app: &App) {
    let width = area.width.min(24);
    let height = area.height.min(3);
    let popup = Rect {
        x: area.x + (area.width.saturating_sub(width)) / 2,
        y: area.y + (area.height.saturating_sub(height)) / 2,
        width,
        height,
    };
    let text = format!("加载中 {}", SPINNER_FRAMES[app.spinner_idx]);
    let widget = Paragraph::new(text)
        .alignment(Alignment::Center)
        .style(Style::default().fg(Color::Yellow))
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(Clear, popup);
    frame.render_widget(widget, popup);
}

/// 广播层输出形如 `LEVEL message`（无时间戳、无 target）。
fn style_log_line(line: &str) -> Line<'static> {
    let trimmed = line.trim_start();
    let (level, message) = trimmed.split_once(' ').unwrap_or((trimmed, ""));
    let color = match level {
        "ERROR" => Color::Red,
        "WARN" => Color::Yellow,
        "INFO" => Color::Cyan,
        "DEBUG" | "TRACE" => Color::Gray,
        _ => return Line::from(trimmed.to_string()),
    };
    Line::from(vec![
        Span::styled(
            level.to_string(),
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        ),
        Span::raw(" "),
        Span::raw(message.trim_start().to_string()),
    ])
}

fn pos_in(area: Rect, col: u16, row: u16) -> bool {
    col >= area.x
        && col < area.x.saturating_add(area.width)
        && row >= area.y
        && row < area.y.saturating_add(area.height)
}
