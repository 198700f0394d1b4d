//! 无 UI（旧 CLI）交互入口。
//!
//! 使用标准输入输出进行交互，并在进入前尽量恢复终端模式。

use std::fmt::Write as _;
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::event::DisableMouseCapture;
use crossterm::execute;
use crossterm::terminal::{LeaveAlternateScreen, disable_raw_mode};
use tokio::runtime::Handle;
use tokio::sync::watch;

use crate::base_system::environment::Endpoint;
use crate::navigation::{Intent, NavigatorHandle, Phase, Snapshot};

/// 无操作意图不会发布快照，等这么久没有变化就认为已完成。
const CHANGE_GRACE: Duration = Duration::from_millis(250);

const HELP: &str = "命令：n 下一页 | p 上一页 | b <id> 选书 | c <id> 选章 | r 重试 | l 列表 | q 退出";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Nav(Intent),
    Retry,
    List,
    Help,
    Quit,
}

fn parse_command(input: &str) -> Result<Command, String> {
    let mut parts = input.split_whitespace();
    let Some(head) = parts.next() else {
        return Err("请输入命令".to_string());
    };
    let id = |arg: Option<&str>| -> Result<u64, String> {
        let raw = arg.ok_or_else(|| format!("`{head}` 需要一个数字 id"))?;
        raw.parse::<u64>().map_err(|_| format!("无效的 id: {raw}"))
    };

    let command = match head.to_ascii_lowercase().as_str() {
        "n" | "next" => Command::Nav(Intent::NextPage),
        "p" | "prev" => Command::Nav(Intent::PrevPage),
        "b" | "book" => Command::Nav(Intent::SelectBook(id(parts.next())?)),
        "c" | "chapter" => Command::Nav(Intent::SelectChapter(id(parts.next())?)),
        "r" | "retry" => Command::Retry,
        "l" | "list" => Command::List,
        "h" | "help" | "?" => Command::Help,
        "q" | "quit" | "exit" => Command::Quit,
        other => return Err(format!("未知命令: {other}")),
    };
    Ok(command)
}

/// 运行行模式界面；退出时交还导航句柄。
pub fn run(endpoint: &Endpoint, runtime: &Handle, nav: NavigatorHandle) -> Result<NavigatorHandle> {
    // 上次可能停在 TUI 的 raw mode（例如 Ctrl+C），尽量恢复
    let _ = disable_raw_mode();
    let _ = execute!(io::stdout(), DisableMouseCapture, LeaveAlternateScreen);

    println!(
        "Mantra Reader v{}（{} | {}）\n{HELP}\n",
        env!("CARGO_PKG_VERSION"),
        endpoint.environment,
        endpoint.base_url
    );

    // 初始化会依次请求列表、书籍、章节
    let settle_limit = endpoint.timeout * 3 + Duration::from_secs(1);
    let mut rx = nav.receiver();
    let mut snapshot = runtime.block_on(async {
        let _ = tokio::time::timeout(
            settle_limit,
            rx.wait_for(|s| matches!(s.phase, Phase::Ready | Phase::Failed)),
        )
        .await;
        Arc::clone(&rx.borrow_and_update())
    });
    println!("{}", describe(&snapshot));

    loop {
        let input = read_line("> ")?;
        let text = input.trim();
        if text.is_empty() {
            continue;
        }
        let command = match parse_command(text) {
            Ok(command) => command,
            Err(msg) => {
                println!("{msg}\n{HELP}");
                continue;
            }
        };

        let intent = match command {
            Command::Quit => {
                println!("已退出。");
                break;
            }
            Command::Help => {
                println!("{HELP}");
                continue;
            }
            Command::List => {
                println!("{}", list_catalog(&snapshot));
                continue;
            }
            Command::Retry if snapshot.phase != Phase::Failed => {
                println!("当前没有需要重试的加载");
                continue;
            }
            Command::Retry => Intent::RetryInitialize,
            Command::Nav(intent) => intent,
        };

        if !nav.send_blocking(intent) {
            println!("导航任务已停止");
            break;
        }
        snapshot = wait_settled(runtime, &mut rx, settle_limit);
        println!("{}", describe(&snapshot));
    }

    Ok(nav)
}

fn wait_settled(
    runtime: &Handle,
    rx: &mut watch::Receiver<Arc<Snapshot>>,
    limit: Duration,
) -> Arc<Snapshot> {
    runtime.block_on(async {
        let _ = tokio::time::timeout(CHANGE_GRACE, rx.changed()).await;
        let _ = tokio::time::timeout(limit, rx.wait_for(|s| !s.is_loading())).await;
        Arc::clone(&rx.borrow_and_update())
    })
}

fn describe(snapshot: &Snapshot) -> String {
    let mut out = String::new();
    match snapshot.phase {
        Phase::Failed => {
            let msg = snapshot.error_message().unwrap_or_default();
            let _ = write!(out, "[错误] {msg}\n输入 r 重试");
            return out;
        }
        Phase::Idle | Phase::Loading => {
            out.push_str("加载中…");
            return out;
        }
        Phase::Ready => {}
    }

    if let Some(msg) = snapshot.error_message() {
        let _ = writeln!(out, "[提示] {msg}");
    }
    match (&snapshot.selected_book, &snapshot.current_chapter) {
        (None, _) => out.push_str("尚未选择书籍"),
        (Some(book), None) => {
            let _ = write!(out, "《{}》(#{}) 暂无章节", book.title, book.id);
        }
        (Some(book), Some(chapter)) => {
            let position = book
                .chapter_position(chapter.id)
                .map_or_else(|| "?".to_string(), |p| (p + 1).to_string());
            let _ = writeln!(
                out,
                "《{}》 第 {position}/{} 章 {} (#{})",
                book.title,
                book.chapter_ids.len(),
                chapter.title,
                chapter.id
            );
            let label = snapshot.page_label().unwrap_or_default();
            match snapshot.current_page() {
                Some(page) => {
                    let _ = write!(
                        out,
                        "页 {label}  {} ({}x{})",
                        page.image.file, page.image.width, page.image.height
                    );
                }
                None => {
                    let _ = write!(out, "页 {label}  本章没有页面");
                }
            }
        }
    }
    out
}

fn list_catalog(snapshot: &Snapshot) -> String {
    if snapshot.books.is_empty() {
        return "书籍列表为空".to_string();
    }
    let selected = snapshot.selected_book.as_ref().map(|b| b.id);
    let mut out = String::from("书籍：");
    for book in snapshot.books.iter() {
        let marker = if Some(book.id) == selected { "*" } else { " " };
        let _ = write!(out, "\n {marker} {:>4}  {}", book.id, book.title);
    }
    if let Some(book) = &snapshot.selected_book {
        let current = snapshot.current_chapter.as_ref().map(|c| c.id);
        let ids: Vec<String> = book
            .chapter_ids
            .iter()
            .map(|id| {
                if Some(*id) == current {
                    format!("[{id}]")
                } else {
                    id.to_string()
                }
            })
            .collect();
        let _ = write!(out, "\n章节：{}", ids.join(" "));
    }
    out
}

fn read_line(prompt: &str) -> Result<String> {
    print!("{}", prompt);
    io::stdout().flush().ok();
    let mut line = String::new();
    let read = io::stdin()
        .lock()
        .read_line(&mut line)
        .context("read stdin")?;
    if read == 0 {
        // EOF 视为退出
        return Ok("q".to_string());
    }
    Ok(line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Book, Chapter, Image, Page};
    use crate::navigation::Notice;

    fn ready_snapshot(pages: usize) -> Snapshot {
        let book = Book {
            id: 1,
            title: "A".into(),
            chapter_ids: vec![10, 11],
        };
        let chapter = Chapter {
            id: 11,
            title: "Second".into(),
            book: None,
            chapter_index: 1,
            pages: (0..pages)
                .map(|i| Page {
                    id: i as u64,
                    page_index: i as u32,
                    image: Image {
                        id: i as u64,
                        file: format!("http://img/{i}.jpg"),
                        width: 800,
                        height: 1200,
                    },
                })
                .collect(),
        };
        Snapshot {
            phase: Phase::Ready,
            books: vec![book.clone(), Book { id: 2, title: "B".into(), chapter_ids: vec![] }].into(),
            selected_book: Some(Arc::new(book)),
            current_chapter: Some(Arc::new(chapter)),
            current_page_index: 0,
            notice: None,
        }
    }

    #[test]
    fn parses_commands() {
        assert_eq!(parse_command("n"), Ok(Command::Nav(Intent::NextPage)));
        assert_eq!(parse_command("P"), Ok(Command::Nav(Intent::PrevPage)));
        assert_eq!(parse_command("b 7"), Ok(Command::Nav(Intent::SelectBook(7))));
        assert_eq!(parse_command("chapter 12"), Ok(Command::Nav(Intent::SelectChapter(12))));
        assert_eq!(parse_command("r"), Ok(Command::Retry));
        assert_eq!(parse_command("q"), Ok(Command::Quit));
        assert!(parse_command("b").is_err());
        assert!(parse_command("c x").is_err());
        assert!(parse_command("zzz").is_err());
    }

    #[test]
    fn describes_ready_page() {
        let text = describe(&ready_snapshot(2));
        assert!(text.contains("第 2/2 章"));
        assert!(text.contains("页 1 / 2"));
        assert!(text.contains("http://img/0.jpg"));
    }

    #[test]
    fn describes_empty_chapter_and_advisory() {
        let mut snap = ready_snapshot(0);
        snap.notice = Some(Notice::advisory("Failed to load next chapter. Please try again."));
        let text = describe(&snap);
        assert!(text.starts_with("[提示] Failed to load next chapter."));
        assert!(text.contains("页 0 / 0  本章没有页面"));
    }

    #[test]
    fn describes_blocking_failure() {
        let snap = Snapshot {
            phase: Phase::Failed,
            notice: Some(Notice::blocking("No books available")),
            ..Snapshot::default()
        };
        assert_eq!(describe(&snap), "[错误] No books available\n输入 r 重试");
    }

    #[test]
    fn list_marks_current_book_and_chapter() {
        let text = list_catalog(&ready_snapshot(1));
        assert!(text.contains(" *    1  A"));
        assert!(text.contains("\n      2  B"));
        assert!(text.ends_with("章节：10 [11]"));
        assert_eq!(list_catalog(&Snapshot::default()), "书籍列表为空");
    }
}
