//! 阅读视图：书籍列表、章节栏、页面面板。

use super::*;

use crossterm::event::{Event, KeyCode, KeyEventKind, KeyModifiers, MouseButton, MouseEventKind};
use ratatui::widgets::{List, ListItem, Tabs};
use tracing::{debug, warn};

use crate::catalog::Image;
use crate::navigation::Intent;

const BOOK_LIST_WIDTH: u16 = 30;

/// 图片区域高度 = 面板可用高度减去固定留白（标题、尺寸、页码各占一行）。
const IMAGE_MARGIN_ROWS: u16 = 4;

/// 终端字符格大约是 1:2（宽:高），按比例换算时横向放大一倍。
const CELL_ASPECT: f32 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct ReaderLayout {
    books: Rect,
    chapters: Rect,
    page: Rect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Nav(Intent),
    Cursor(isize),
    ToggleFocus,
    Confirm,
    Retry,
    OpenImage,
    Quit,
}

fn key_action(code: KeyCode, modifiers: KeyModifiers) -> Option<Action> {
    let action = match code {
        KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => Action::Quit,
        KeyCode::Right | KeyCode::Char('l') | KeyCode::Char(' ') => Action::Nav(Intent::NextPage),
        KeyCode::Left | KeyCode::Char('h') => Action::Nav(Intent::PrevPage),
        KeyCode::Tab | KeyCode::BackTab => Action::ToggleFocus,
        KeyCode::Up => Action::Cursor(-1),
        KeyCode::Down => Action::Cursor(1),
        KeyCode::Enter => Action::Confirm,
        KeyCode::Char('r') => Action::Retry,
        KeyCode::Char('o') => Action::OpenImage,
        KeyCode::Char('q') | KeyCode::Esc => Action::Quit,
        _ => return None,
    };
    Some(action)
}

pub(super) fn handle_event_reader(app: &mut App, event: Event) -> Result<()> {
    match event {
        Event::Key(key) if key.kind == KeyEventKind::Press => {
            if let Some(action) = key_action(key.code, key.modifiers) {
                apply_action(app, action);
            }
        }
        Event::Mouse(me) => handle_mouse_reader(app, me),
        _ => {}
    }
    Ok(())
}

fn apply_action(app: &mut App, action: Action) {
    match action {
        Action::Nav(intent) => send(app, intent),
        Action::Cursor(delta) => move_cursor(app, delta),
        Action::ToggleFocus => {
            app.focus = match app.focus {
                Focus::Books => Focus::Chapters,
                Focus::Chapters => Focus::Books,
            };
        }
        Action::Confirm => confirm_selection(app),
        Action::Retry => {
            if app.snapshot.phase == Phase::Failed {
                send(app, Intent::RetryInitialize);
            } else {
                app.status = "当前没有需要重试的加载".to_string();
            }
        }
        Action::OpenImage => open_current_image(app),
        Action::Quit => app.should_quit = true,
    }
}

fn send(app: &mut App, intent: Intent) {
    if !app.nav.send(intent) {
        app.status = "导航任务繁忙，请稍后再试".to_string();
    }
}

fn move_cursor(app: &mut App, delta: isize) {
    match app.focus {
        Focus::Books => {
            let len = app.snapshot.books.len();
            let current = app.book_state.selected().unwrap_or(0);
            app.book_state.select(step_cursor(current, len, delta));
        }
        Focus::Chapters => {
            let len = app
                .snapshot
                .selected_book
                .as_ref()
                .map_or(0, |b| b.chapter_ids.len());
            app.chapter_cursor = step_cursor(app.chapter_cursor, len, delta).unwrap_or(0);
        }
    }
}

/// 循环移动光标；列表为空时为 None。
fn step_cursor(current: usize, len: usize, delta: isize) -> Option<usize> {
    if len == 0 {
        return None;
    }
    let len = len as isize;
    let next = (current as isize + delta).rem_euclid(len);
    Some(next as usize)
}

fn confirm_selection(app: &mut App) {
    let intent = match app.focus {
        Focus::Books => app
            .book_state
            .selected()
            .and_then(|idx| app.snapshot.books.get(idx))
            .map(|b| Intent::SelectBook(b.id)),
        Focus::Chapters => app
            .snapshot
            .selected_book
            .as_ref()
            .and_then(|b| b.chapter_ids.get(app.chapter_cursor).copied())
            .map(Intent::SelectChapter),
    };
    if let Some(intent) = intent {
        send(app, intent);
    }
}

fn open_current_image(app: &mut App) {
    let Some(page) = app.snapshot.current_page() else {
        app.status = "当前没有可打开的图片".to_string();
        return;
    };
    let file = page.image.file.clone();
    match crate::ui::open_external(&file, app.open_command.as_deref()) {
        Ok(()) => {
            debug!(target: "ui", "打开图片: {file}");
            app.status = format!("已尝试打开: {file}");
        }
        Err(err) => {
            warn!(target: "ui", "打开图片失败: {err}");
            app.status = format!("打开图片失败: {err}");
        }
    }

    // 部分打开程序会改动控制台模式，重新开启
    let _ = enable_raw_mode();
    let _ = execute!(std::io::stdout(), EnableMouseCapture);
}

fn handle_mouse_reader(app: &mut App, me: event::MouseEvent) {
    let Some(layout) = app.last_layout else {
        return;
    };
    match me.kind {
        MouseEventKind::Down(MouseButton::Left) => {
            if pos_in(layout.page, me.column, me.row) {
                send(app, page_click(layout.page, me.column));
                return;
            }
            if pos_in(layout.books, me.column, me.row) {
                app.focus = Focus::Books;
                let row = me.row.saturating_sub(layout.books.y + 1) as usize;
                let idx = app.book_state.offset() + row;
                if let Some(book) = app.snapshot.books.get(idx) {
                    let id = book.id;
                    app.book_state.select(Some(idx));
                    send(app, Intent::SelectBook(id));
                }
                return;
            }
            if pos_in(layout.chapters, me.column, me.row) {
                app.focus = Focus::Chapters;
                let Some(book) = app.snapshot.selected_book.clone() else {
                    return;
                };
                let labels = chapter_labels(book.chapter_ids.len());
                if let Some(idx) = chapter_tab_at(&labels, layout.chapters.x + 1, me.column)
                    && let Some(&chapter_id) = book.chapter_ids.get(idx)
                {
                    app.chapter_cursor = idx;
                    send(app, Intent::SelectChapter(chapter_id));
                }
            }
        }
        MouseEventKind::ScrollDown if pos_in(layout.page, me.column, me.row) => {
            send(app, Intent::NextPage);
        }
        MouseEventKind::ScrollUp if pos_in(layout.page, me.column, me.row) => {
            send(app, Intent::PrevPage);
        }
        _ => {}
    }
}

/// 点击页面左半边前进、右半边后退（右开本的翻页习惯）。
fn page_click(area: Rect, col: u16) -> Intent {
    let mid = area.x + area.width / 2;
    if col < mid {
        Intent::NextPage
    } else {
        Intent::PrevPage
    }
}

fn chapter_labels(count: usize) -> Vec<String> {
    (1..=count).map(|n| n.to_string()).collect()
}

/// `Tabs` 的默认排版：每个标签左右各一格留白，标签之间一格分隔符。
/// 越过点击列后即停止，标签再多也不会累加溢出。
fn chapter_tab_at(labels: &[String], inner_x: u16, col: u16) -> Option<usize> {
    let col = u32::from(col);
    let mut x = u32::from(inner_x);
    for (idx, label) in labels.iter().enumerate() {
        if x > col {
            break;
        }
        let width = label.chars().count() as u32 + 2;
        if col < x + width {
            return Some(idx);
        }
        x += width + 1;
    }
    None
}

/// 按图片宽高比在可用区域内居中放置占位框。
fn image_box(area: Rect, image: &Image) -> Rect {
    if area.width == 0 || area.height == 0 {
        return area;
    }
    let height = area.height.saturating_sub(IMAGE_MARGIN_ROWS).max(1);
    let width = match image.aspect_ratio() {
        Some(ratio) => ((height as f32 * ratio * CELL_ASPECT).round() as u16).clamp(1, area.width),
        None => area.width,
    };
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y,
        width,
        height,
    }
}

pub(super) fn draw_reader(frame: &mut ratatui::Frame, app: &mut App) {
    let (main, log_area) = split_with_log(frame.size(), app.show_log_pane);
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(6)])
        .split(main);
    draw_header(frame, rows[0], app);

    let snapshot = Arc::clone(&app.snapshot);
    match snapshot.phase {
        Phase::Failed => {
            app.last_layout = None;
            draw_blocking_error(frame, rows[1], snapshot.error_message().unwrap_or_default());
        }
        Phase::Idle => {
            app.last_layout = None;
            let waiting = Paragraph::new("正在连接目录服务…")
                .alignment(Alignment::Center)
                .block(Block::default().borders(Borders::ALL));
            frame.render_widget(waiting, rows[1]);
        }
        Phase::Loading | Phase::Ready => {
            let body = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Length(BOOK_LIST_WIDTH), Constraint::Min(20)])
                .split(rows[1]);
            let right = Layout::default()
                .direction(Direction::Vertical)
                .constraints([Constraint::Length(3), Constraint::Min(3)])
                .split(body[1]);
            app.last_layout = Some(ReaderLayout {
                books: body[0],
                chapters: right[0],
                page: right[1],
            });
            draw_books(frame, body[0], app, &snapshot);
            draw_chapters(frame, right[0], app, &snapshot);
            draw_page(frame, right[1], &snapshot);
        }
    }

    if snapshot.is_loading() {
        render_loading_overlay(frame, rows[1], app);
    }
    if let Some(log_area) = log_area {
        render_log_box(frame, log_area, app);
    }
}

fn draw_header(frame: &mut ratatui::Frame, area: Rect, app: &App) {
    let line = Line::from(vec![
        Span::styled(
            "Mantra Reader",
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw("  |  "),
        Span::styled(app.endpoint_label.clone(), Style::default().fg(Color::Green)),
        Span::raw("  |  "),
        Span::raw(app.status.clone()),
    ]);
    let header = Paragraph::new(line).block(Block::default().borders(Borders::ALL));
    frame.render_widget(header, area);
}

fn focus_style(active: bool) -> Style {
    if active {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default()
    }
}

fn draw_books(frame: &mut ratatui::Frame, area: Rect, app: &mut App, snapshot: &Snapshot) {
    let selected_id = snapshot.selected_book.as_ref().map(|b| b.id);
    let items: Vec<ListItem> = snapshot
        .books
        .iter()
        .map(|b| {
            let style = if Some(b.id) == selected_id {
                Style::default().fg(Color::LightCyan).add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            ListItem::new(b.title.clone()).style(style)
        })
        .collect();
    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(focus_style(app.focus == Focus::Books))
                .title("书籍"),
        )
        .highlight_symbol(">> ")
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED));
    frame.render_stateful_widget(list, area, &mut app.book_state);
}

fn draw_chapters(frame: &mut ratatui::Frame, area: Rect, app: &App, snapshot: &Snapshot) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(focus_style(app.focus == Focus::Chapters))
        .title("章节");
    let Some(book) = snapshot.selected_book.as_ref() else {
        frame.render_widget(block, area);
        return;
    };
    if book.chapter_ids.is_empty() {
        frame.render_widget(Paragraph::new("本书暂无章节").block(block), area);
        return;
    }

    let current = snapshot
        .current_chapter
        .as_ref()
        .and_then(|c| book.chapter_position(c.id));
    let titles: Vec<Line> = chapter_labels(book.chapter_ids.len())
        .into_iter()
        .enumerate()
        .map(|(idx, label)| {
            let mut style = Style::default();
            if Some(idx) == current {
                style = style.fg(Color::LightCyan).add_modifier(Modifier::BOLD);
            }
            if app.focus == Focus::Chapters && idx == app.chapter_cursor {
                style = style.add_modifier(Modifier::UNDERLINED);
            }
            Line::styled(label, style)
        })
        .collect();
    let tabs = Tabs::new(titles)
        .block(block)
        .select(current.unwrap_or(usize::MAX))
        .highlight_style(Style::default().fg(Color::LightCyan).add_modifier(Modifier::BOLD));
    frame.render_widget(tabs, area);
}

fn draw_page(frame: &mut ratatui::Frame, area: Rect, snapshot: &Snapshot) {
    let title = snapshot
        .current_chapter
        .as_ref()
        .map_or_else(|| "页面".to_string(), |c| c.title.clone());
    let footer = snapshot.page_label().unwrap_or_default();
    let block = Block::default()
        .borders(Borders::ALL)
        .title(title)
        .title_bottom(Line::from(footer).alignment(Alignment::Right));
    let mut inner = block.inner(area);
    frame.render_widget(block, area);

    if let Some(notice) = snapshot.notice.as_ref().filter(|n| !n.blocking) {
        let banner = Paragraph::new(notice.message.clone())
            .style(Style::default().fg(Color::White).bg(Color::Red))
            .alignment(Alignment::Center);
        frame.render_widget(banner, Rect { height: inner.height.min(1), ..inner });
        inner.y = inner.y.saturating_add(1);
        inner.height = inner.height.saturating_sub(1);
    }

    let Some(chapter) = snapshot.current_chapter.as_ref() else {
        let text = if snapshot.selected_book.is_some() {
            "本书暂无章节"
        } else {
            "请选择一本书"
        };
        frame.render_widget(Paragraph::new(text).alignment(Alignment::Center), inner);
        return;
    };
    let Some(page) = snapshot.current_page() else {
        let text = format!("{} 没有页面，←/→ 跳到相邻章节", chapter.title);
        frame.render_widget(Paragraph::new(text).alignment(Alignment::Center), inner);
        return;
    };

    let image = &page.image;
    let placeholder = image_box(inner, image);
    let ratio = image
        .aspect_ratio()
        .map_or_else(|| "未知".to_string(), |r| format!("{r:.2}"));
    let lines = vec![
        Line::from(Span::styled(
            format!("#{}", page.page_index + 1),
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(format!("{} x {}  宽高比 {ratio}", image.width, image.height)),
    ];
    let boxed = Paragraph::new(lines)
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(Color::DarkGray)));
    frame.render_widget(boxed, placeholder);

    let info_area = Rect {
        y: placeholder.y.saturating_add(placeholder.height),
        height: inner.height.saturating_sub(placeholder.height),
        ..inner
    };
    let info = Paragraph::new(vec![
        Line::from(Span::styled(image.file.clone(), Style::default().fg(Color::LightBlue))),
        Line::from("点击左半边下一页，右半边上一页；o 用系统程序打开"),
    ])
    .alignment(Alignment::Center)
    .wrap(Wrap { trim: true });
    frame.render_widget(info, info_area);
}

fn draw_blocking_error(frame: &mut ratatui::Frame, area: Rect, message: &str) {
    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            message.to_string(),
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from("Retry (r)    退出 (q)"),
    ];
    let widget = Paragraph::new(lines)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .block(Block::default().borders(Borders::ALL).title("加载失败"));
    frame.render_widget(widget, area);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_map_to_reader_actions() {
        let none = KeyModifiers::NONE;
        assert_eq!(key_action(KeyCode::Right, none), Some(Action::Nav(Intent::NextPage)));
        assert_eq!(key_action(KeyCode::Char(' '), none), Some(Action::Nav(Intent::NextPage)));
        assert_eq!(key_action(KeyCode::Char('h'), none), Some(Action::Nav(Intent::PrevPage)));
        assert_eq!(key_action(KeyCode::Char('r'), none), Some(Action::Retry));
        assert_eq!(key_action(KeyCode::Char('c'), KeyModifiers::CONTROL), Some(Action::Quit));
        assert_eq!(key_action(KeyCode::Char('x'), none), None);
    }

    #[test]
    fn clicking_left_half_advances() {
        let area = Rect::new(10, 0, 40, 20);
        assert_eq!(page_click(area, 10), Intent::NextPage);
        assert_eq!(page_click(area, 29), Intent::NextPage);
        assert_eq!(page_click(area, 30), Intent::PrevPage);
        assert_eq!(page_click(area, 49), Intent::PrevPage);
    }

    #[test]
    fn chapter_tabs_hit_test() {
        // " 1 │ 2 │ ... │ 10 "
        let labels = chapter_labels(10);
        assert_eq!(chapter_tab_at(&labels, 0, 0), Some(0));
        assert_eq!(chapter_tab_at(&labels, 0, 2), Some(0));
        assert_eq!(chapter_tab_at(&labels, 0, 3), None);
        assert_eq!(chapter_tab_at(&labels, 0, 4), Some(1));
        assert_eq!(chapter_tab_at(&labels, 0, 36), Some(9));
        assert_eq!(chapter_tab_at(&labels, 0, 40), None);
        assert_eq!(chapter_tab_at(&labels, 10, 3), None);
    }

    #[test]
    fn chapter_tabs_hit_test_survives_huge_books() {
        let labels = chapter_labels(20_000);
        // 四位数标签宽 6、步长 7，从第 5886 列开始
        assert_eq!(chapter_tab_at(&labels, 0, u16::MAX), Some(9520));
        assert_eq!(chapter_tab_at(&labels, 0, 65_532), None);
        assert_eq!(chapter_tab_at(&labels, 0, 4), Some(1));
    }

    #[test]
    fn cursor_wraps_both_ways() {
        assert_eq!(step_cursor(0, 3, -1), Some(2));
        assert_eq!(step_cursor(2, 3, 1), Some(0));
        assert_eq!(step_cursor(1, 3, 1), Some(2));
        assert_eq!(step_cursor(0, 0, 1), None);
    }

    #[test]
    fn image_box_keeps_margin_and_aspect() {
        let area = Rect::new(0, 0, 100, 24);
        let portrait = Image {
            id: 1,
            file: String::new(),
            width: 800,
            height: 1200,
        };
        let rect = image_box(area, &portrait);
        assert_eq!(rect.height, 20);
        assert_eq!(rect.width, 27);
        assert_eq!(rect.x, (100 - 27) / 2);

        let unknown = Image {
            width: 0,
            ..portrait.clone()
        };
        assert_eq!(image_box(area, &unknown).width, 100);

        let wide = Image {
            width: 4000,
            height: 100,
            ..portrait
        };
        assert_eq!(image_box(area, &wide).width, 100);
    }
}
