use std::path::PathBuf;

use thiserror::Error;

use crate::infrastructure::driver::EngineKind;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 自动化驱动错误
    #[error("驱动错误: {0}")]
    Driver(#[from] DriverError),
    /// 应用程序句柄创建失败
    #[error("句柄错误: {0}")]
    Handle(#[from] HandleCreationError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// 批处理致命错误
    #[error("处理错误: {0}")]
    Transfer(#[from] TransferError),
    /// 文件操作错误
    #[error("文件错误: {0}")]
    Io(#[from] std::io::Error),
}

/// 自动化驱动错误
///
/// 所有与外部应用程序（表格引擎 / 文档引擎）交互时产生的错误
#[derive(Debug, Error)]
pub enum DriverError {
    /// 自动化调用失败
    #[error("自动化调用失败 ({operation}): {message}")]
    Call { operation: String, message: String },
    /// 句柄类型与请求不符
    #[error("句柄类型不匹配: 期望 {expected}, 实际 {actual}")]
    KindMismatch {
        expected: EngineKind,
        actual: EngineKind,
    },
    /// 与桥接服务通信失败
    #[error("桥接服务通信失败: {0}")]
    Transport(#[from] reqwest::Error),
    /// 桥接服务返回数据无法解析
    #[error("桥接服务返回数据无法解析: {0}")]
    Decode(#[from] serde_json::Error),
}

impl DriverError {
    /// 创建自动化调用失败错误
    pub fn call(operation: impl Into<String>, message: impl Into<String>) -> Self {
        DriverError::Call {
            operation: operation.into(),
            message: message.into(),
        }
    }
}

/// 驱动调用结果类型
pub type DriverResult<T> = Result<T, DriverError>;

/// 应用程序句柄创建失败（重试次数用尽）
#[derive(Debug, Error)]
#[error("{kind} 应用程序创建失败 (已尝试 {attempts} 次): {last_error}")]
pub struct HandleCreationError {
    pub kind: EngineKind,
    pub attempts: usize,
    #[source]
    pub last_error: DriverError,
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 读取配置文件失败
    #[error("读取配置文件失败 ({path}): {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// 写入配置文件失败
    #[error("写入配置文件失败 ({path}): {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// TOML 解析失败
    #[error("TOML解析失败 ({path}): {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    /// TOML 序列化失败
    #[error("TOML序列化失败: {0}")]
    Serialize(#[from] toml::ser::Error),
    /// 输入文件不存在
    #[error("以下{kind}不存在: {}", display_paths(.paths))]
    MissingInputs { kind: String, paths: Vec<PathBuf> },
    /// 未提供输入文件
    #[error("未指定{0}")]
    NoInputs(String),
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// 终止整个批处理的错误
#[derive(Debug, Error)]
pub enum TransferError {
    /// 所有模板副本都创建失败
    #[error("模板副本创建失败，没有可处理的模板")]
    NoWorkingCopies,
}

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
