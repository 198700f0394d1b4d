//! 全局配置结构（Config）与默认值。
//!
//! 该模块同时提供生成 `config.yml` 的字段元信息。

use serde::{Deserialize, Serialize};

use super::config::{ConfigSpec, FieldMeta};
use super::environment::Environment;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // 程序配置
    #[serde(default = "default_false")]
    pub old_cli: bool,
    #[serde(default = "default_true")]
    pub show_log_pane: bool,

    // 网络配置
    #[serde(default = "default_environment")]
    pub environment: String,
    #[serde(default)]
    pub api_url: String,
    /// 未设置时使用所选环境的默认超时。
    #[serde(default)]
    pub request_timeout_ms: Option<u64>,

    // 外部查看
    #[serde(default)]
    pub open_command: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            old_cli: default_false(),
            show_log_pane: default_true(),
            environment: default_environment(),
            api_url: String::new(),
            request_timeout_ms: None,
            open_command: String::new(),
        }
    }
}

impl ConfigSpec for Config {
    const FILE_NAME: &'static str = "config.yml";

    fn fields() -> &'static [FieldMeta] {
        static FIELDS: [FieldMeta; 6] = [
            FieldMeta {
                name: "old_cli",
                description: "是否使用命令行（逐行输入）界面代替 TUI",
            },
            FieldMeta {
                name: "show_log_pane",
                description: "TUI 底部是否显示日志窗口",
            },
            FieldMeta {
                name: "environment",
                description: "部署环境, 可选: [development, staging, production]",
            },
            FieldMeta {
                name: "api_url",
                description: "API 地址覆盖（仅 staging/production 生效，留空使用内置地址）",
            },
            FieldMeta {
                name: "request_timeout_ms",
                description: "请求超时时间（毫秒，必须大于 0；留空使用所选环境的默认值）",
            },
            FieldMeta {
                name: "open_command",
                description: "打开当前页图片的程序（留空使用系统默认程序）",
            },
        ];
        &FIELDS
    }
}

impl Config {
    /// 自定义的外部打开程序；未配置时返回 None，由调用方使用系统默认。
    pub fn custom_open_command(&self) -> Option<&str> {
        let cmd = self.open_command.trim();
        if cmd.is_empty() { None } else { Some(cmd) }
    }
}

fn default_false() -> bool {
    false
}

fn default_true() -> bool {
    true
}

fn default_environment() -> String {
    Environment::default().as_str().to_string()
}
