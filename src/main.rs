//! Mantra Reader：分页图片目录（书籍 / 章节 / 页面）的终端阅读客户端。
//!
//! 代码结构（读代码入口）：
//! - `base_system`：配置 / 日志 / 环境选择等基础设施
//! - `catalog`：目录 HTTP 客户端与数据模型
//! - `navigation`：翻页与跨章导航的状态机
//! - `ui`：TUI 与无 UI（old cli）两套交互

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use tracing::{info, warn};

mod base_system;
mod catalog;
mod navigation;
mod ui;

use base_system::config::load_or_create_with_base;
use base_system::context::Config;
use base_system::environment::{self, Overrides};
use base_system::logging::{LogOptions, LogSystem};
use catalog::CatalogClient;
use navigation::Navigator;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// 退出时等待导航任务收尾的上限；进行中的请求会被直接丢弃。
const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

#[derive(Debug, Parser)]
#[command(name = "mantra-reader")]
#[command(about = "Mantra Reader (paged image catalog TUI)")]
struct Cli {
    /// 启用调试日志输出
    #[arg(long, default_value_t = false)]
    debug: bool,

    /// 显示版本信息后退出
    #[arg(long, default_value_t = false)]
    version: bool,

    /// 数据目录路径（用于存放 config.yml 和 logs）
    #[arg(long)]
    data_dir: Option<String>,

    /// 部署环境：development / staging / production
    #[arg(long = "env")]
    environment: Option<String>,

    /// API 地址覆盖（仅 staging / production 生效）
    #[arg(long)]
    api_url: Option<String>,

    /// 请求超时（毫秒），覆盖配置文件
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// 强制使用逐行命令界面
    #[arg(long, default_value_t = false)]
    plain: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.version {
        println!("Mantra Reader v{}", VERSION);
        return Ok(());
    }

    let data_dir = cli.data_dir.as_deref().map(Path::new);
    let config =
        load_or_create_with_base::<Config>(None, data_dir).context("load config")?;
    let plain = cli.plain || config.old_cli;
    let _log = init_logging(cli.debug, plain, data_dir)?;

    let overrides = Overrides {
        environment: cli.environment.clone(),
        api_url: cli.api_url.clone(),
        timeout_ms: cli.timeout_ms,
    }
    .with_process_env();
    let endpoint = environment::resolve(&config, &overrides).context("resolve endpoint")?;
    info!(
        target: "startup",
        "v{VERSION} 环境: {} 地址: {} 超时: {}ms",
        endpoint.environment,
        endpoint.base_url,
        endpoint.timeout.as_millis()
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .thread_name("catalog")
        .enable_all()
        .build()
        .context("build tokio runtime")?;

    let client = {
        let _guard = runtime.enter();
        CatalogClient::from_endpoint(&endpoint)?
    };
    info!(
        target: "startup",
        base_url = client.base_url(),
        timeout_ms = client.timeout().as_millis() as u64,
        "目录客户端已就绪"
    );
    let nav = Navigator::new(client).spawn(runtime.handle());

    let result = if plain {
        ui::noui::run(&endpoint, runtime.handle(), nav)
    } else {
        ui::tui::run(&config, &endpoint, nav)
    };

    match result {
        Ok(nav) => {
            if runtime
                .block_on(tokio::time::timeout(SHUTDOWN_GRACE, nav.shutdown()))
                .is_err()
            {
                warn!(target: "startup", "导航任务未在 {SHUTDOWN_GRACE:?} 内结束，放弃进行中的请求");
            }
            runtime.shutdown_timeout(SHUTDOWN_GRACE);
            Ok(())
        }
        Err(err) => {
            runtime.shutdown_background();
            Err(err)
        }
    }
}

fn init_logging(debug: bool, plain: bool, base_dir: Option<&Path>) -> Result<LogSystem> {
    let opts = LogOptions {
        debug,
        use_color: true,
        archive_on_exit: true,
        // TUI 占用终端，日志经广播显示；行模式只在 --debug 时回显
        console: plain && debug,
        broadcast_to_ui: !plain,
    };
    LogSystem::init_with_base(opts, base_dir).map_err(|e| anyhow!(e))
}
