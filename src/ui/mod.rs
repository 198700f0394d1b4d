//! 交互层入口。
//!
//! 包含 TUI 与无 UI（旧 CLI）两套交互实现，二者都只通过 `NavigatorHandle`
//! 发送意图、读取快照。

use std::io;
use std::process::Command;

pub mod noui;
pub mod tui;

/// 用系统默认程序（或配置中的 `open_command`）打开图片地址。
pub fn open_external(target: &str, custom: Option<&str>) -> io::Result<()> {
    if let Some(program) = custom {
        return Command::new(program).arg(target).spawn().map(|_| ());
    }

    let spawned = if cfg!(target_os = "windows") {
        // explorer.exe 不会改动控制台模式，鼠标事件保持可用
        Command::new("explorer")
            .arg(target)
            .spawn()
            .or_else(|_| Command::new("cmd").args(["/C", "start", target]).spawn())
    } else if cfg!(target_os = "macos") {
        Command::new("open").arg(target).spawn()
    } else {
        Command::new("xdg-open").arg(target).spawn()
    };
    spawned.map(|_| ())
}
