//! 基础设施：配置文件、部署环境选择、日志。

pub mod config;
pub mod context;
pub mod environment;
pub mod logging;
