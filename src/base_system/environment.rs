//! 部署环境选择：development / staging / production 各自对应一组 API 地址与超时。
//!
//! 启动时解析一次，得到 [`Endpoint`]，之后交给目录客户端使用。

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use super::config::ConfigError;
use super::context::Config;

pub const ENV_VAR_ENVIRONMENT: &str = "MANTRA_ENV";
pub const ENV_VAR_API_URL: &str = "MANTRA_API_URL";

const DEVELOPMENT_TIMEOUT_MS: u64 = 10_000;
const STAGING_TIMEOUT_MS: u64 = 10_000;
const PRODUCTION_TIMEOUT_MS: u64 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Staging => "staging",
            Self::Production => "production",
        }
    }

    pub fn default_base_url(self) -> &'static str {
        match self {
            Self::Development => "http://52.195.171.228:8080",
            Self::Staging => "https://staging-api.mantra.com",
            Self::Production => "https://prod-api.mantra.com",
        }
    }

    pub fn default_timeout(self) -> Duration {
        let ms = match self {
            Self::Development => DEVELOPMENT_TIMEOUT_MS,
            Self::Staging => STAGING_TIMEOUT_MS,
            Self::Production => PRODUCTION_TIMEOUT_MS,
        };
        Duration::from_millis(ms)
    }

    /// 开发环境固定使用内置地址，不接受外部覆盖。
    pub fn accepts_url_override(self) -> bool {
        !matches!(self, Self::Development)
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "staging" | "stage" => Ok(Self::Staging),
            "production" | "prod" => Ok(Self::Production),
            other => Err(ConfigError::Validation(format!(
                "unknown environment '{other}', expected development/staging/production"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub environment: Environment,
    pub base_url: String,
    pub timeout: Duration,
}

/// 来自命令行与进程环境变量的覆盖项；优先级高于配置文件。
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub environment: Option<String>,
    pub api_url: Option<String>,
    pub timeout_ms: Option<u64>,
}

impl Overrides {
    /// 读取 `MANTRA_ENV` / `MANTRA_API_URL`，命令行参数仍然优先。
    pub fn with_process_env(mut self) -> Self {
        if self.environment.is_none() {
            self.environment = non_empty(std::env::var(ENV_VAR_ENVIRONMENT).ok());
        }
        if self.api_url.is_none() {
            self.api_url = non_empty(std::env::var(ENV_VAR_API_URL).ok());
        }
        self
    }
}

pub fn resolve(config: &Config, overrides: &Overrides) -> Result<Endpoint, ConfigError> {
    let environment = match overrides
        .environment
        .clone()
        .or_else(|| non_empty(Some(config.environment.clone())))
    {
        Some(raw) => raw.parse::<Environment>()?,
        None => Environment::default(),
    };

    let override_url = overrides
        .api_url
        .clone()
        .or_else(|| non_empty(Some(config.api_url.clone())));
    let base_url = match override_url {
        Some(url) if environment.accepts_url_override() => url.trim().to_string(),
        _ => environment.default_base_url().to_string(),
    };

    let timeout = match overrides.timeout_ms.or(config.request_timeout_ms) {
        Some(0) => {
            return Err(ConfigError::Validation(
                "request_timeout_ms must be greater than 0".to_string(),
            ));
        }
        Some(ms) => Duration::from_millis(ms),
        None => environment.default_timeout(),
    };

    Ok(Endpoint {
        environment,
        base_url,
        timeout,
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}
