//! 配置管理系统
//!
//! 进程启动时构建一次、之后不可变的服务器配置，支持 TOML 文件与环境变量覆盖。

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// 配置错误类型
#[derive(Error, Debug)]
pub enum ConfigError {
    /// IO 错误
    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    /// 解析错误
    #[error("解析配置文件失败: {0}")]
    Parse(String),

    /// 验证错误
    #[error("配置验证失败: {0}")]
    Validation(String),

    /// 环境变量错误
    #[error("环境变量解析失败: {0}")]
    EnvVar(String),
}

/// 配置 Result 类型
pub type Result<T> = std::result::Result<T, ConfigError>;

/// 工作线程数上限
pub const MAX_WORKER_THREADS: usize = 512;

/// 服务器配置
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// 绑定地址
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// 监听端口
    #[serde(default = "default_port")]
    pub port: u16,

    /// 网络工作线程数量（None 表示使用 CPU 核心数）
    #[serde(default = "default_worker_threads")]
    pub worker_threads: Option<usize>,
}

/// Reactor 配置
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactorConfig {
    /// 监听队列长度
    #[serde(default = "default_backlog")]
    pub backlog: u32,

    /// 会话读缓冲区初始容量
    #[serde(default = "default_read_buffer_size")]
    pub read_buffer_size: usize,

    /// 请求头（请求行 + 头部）最大字节数
    #[serde(default = "default_max_head_size")]
    pub max_head_size: usize,

    /// 请求体最大字节数
    #[serde(default = "default_max_body_size")]
    pub max_body_size: usize,

    /// 关闭时等待在途会话的时间（毫秒），0 表示直接放弃
    #[serde(default)]
    pub drain_timeout_ms: u64,
}

/// 配置文件的顶层结构
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GreetingConfig {
    /// 服务器配置
    #[serde(default)]
    pub server: ServerConfig,

    /// Reactor 配置
    #[serde(default)]
    pub reactor: ReactorConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            worker_threads: default_worker_threads(),
        }
    }
}

impl Default for ReactorConfig {
    fn default() -> Self {
        Self {
            backlog: default_backlog(),
            read_buffer_size: default_read_buffer_size(),
            max_head_size: default_max_head_size(),
            max_body_size: default_max_body_size(),
            drain_timeout_ms: 0,
        }
    }
}

impl GreetingConfig {
    /// 从 TOML 文件加载配置
    ///
    /// 文件中缺省的字段使用默认值：
    ///
    /// ```toml
    /// [server]
    /// port = 3000
    /// worker_threads = 8
    ///
    /// [reactor]
    /// drain_timeout_ms = 500
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// 从 TOML 字符串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// 从文件加载并应用环境变量覆盖
    pub fn from_file_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::from_file(path)?;
        config.server = config.server.load_with_env_override()?;
        Ok(config)
    }

    /// 验证全部配置
    pub fn validate(&self) -> Result<()> {
        self.server.validate()?;
        self.reactor.validate()
    }
}

impl ServerConfig {
    /// 从环境变量加载配置并覆盖
    ///
    /// 支持的环境变量：
    /// - GREETING_BIND_ADDRESS: 绑定地址
    /// - GREETING_PORT: 端口
    /// - GREETING_WORKER_THREADS: 工作线程数（数字或 `auto`）
    pub fn load_with_env_override(mut self) -> Result<Self> {
        if let Ok(addr) = std::env::var("GREETING_BIND_ADDRESS") {
            self.bind_address = addr;
        }

        if let Ok(port_str) = std::env::var("GREETING_PORT") {
            self.port = port_str.parse().map_err(|_| {
                ConfigError::EnvVar("GREETING_PORT 必须是有效的 u16 数字".to_string())
            })?;
        }

        if let Ok(threads) = std::env::var("GREETING_WORKER_THREADS") {
            self.worker_threads = parse_worker_threads(&threads).ok_or_else(|| {
                ConfigError::EnvVar(
                    "GREETING_WORKER_THREADS 必须是有效的 usize 数字或 auto".to_string(),
                )
            })?;
        }

        Ok(self)
    }

    /// 验证配置是否有效
    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            return Err(ConfigError::Validation("端口不能为 0".to_string()));
        }

        if self.bind_address.is_empty() {
            return Err(ConfigError::Validation("绑定地址不能为空".to_string()));
        }

        if let Some(threads) = self.worker_threads {
            if threads == 0 {
                return Err(ConfigError::Validation("工作线程数不能为 0".to_string()));
            }
            if threads > MAX_WORKER_THREADS {
                return Err(ConfigError::Validation(format!(
                    "工作线程数过大 (建议 <= {})",
                    MAX_WORKER_THREADS
                )));
            }
        }

        Ok(())
    }

    /// 获取完整的绑定地址字符串
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }

    /// 获取配置摘要信息
    pub fn summary(&self) -> String {
        let workers = match self.worker_threads {
            Some(n) => n.to_string(),
            None => "auto".to_string(),
        };
        format!(
            "Greeting 服务器配置:\n  地址: {}\n  工作线程: {}",
            self.bind_addr(),
            workers
        )
    }
}

impl ReactorConfig {
    /// 验证配置是否有效
    pub fn validate(&self) -> Result<()> {
        if self.backlog == 0 {
            return Err(ConfigError::Validation("监听队列长度不能为 0".to_string()));
        }

        if self.read_buffer_size == 0 {
            return Err(ConfigError::Validation("读缓冲区大小不能为 0".to_string()));
        }

        if self.max_head_size < self.read_buffer_size {
            return Err(ConfigError::Validation(
                "请求头上限不能小于读缓冲区大小".to_string(),
            ));
        }

        Ok(())
    }

    /// 关闭时的排空等待时间
    pub fn drain_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.drain_timeout_ms)
    }
}

/// 解析工作线程数，`auto` 表示使用 CPU 核心数
pub fn parse_worker_threads(value: &str) -> Option<Option<usize>> {
    let value = value.trim();
    if value.eq_ignore_ascii_case("auto") {
        return Some(None);
    }
    value.parse().ok().map(Some)
}

// 默认值函数
fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_worker_threads() -> Option<usize> {
    Some(8)
}

fn default_backlog() -> u32 {
    1024
}

fn default_read_buffer_size() -> usize {
    8192
}

fn default_max_head_size() -> usize {
    64 * 1024
}

fn default_max_body_size() -> usize {
    1024 * 1024
}
