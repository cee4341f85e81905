use std::path::PathBuf;
use std::time::Duration;

use tracing::warn;

use crate::error::ConfigError;

/// 程序配置文件
#[derive(Clone, Debug)]
pub struct Config {
    /// 数据文件（表格）列表
    pub data_files: Vec<PathBuf>,
    /// 模板文件（文档）列表
    pub template_files: Vec<PathBuf>,
    /// 按后缀分组的区域配置文件
    pub range_config_file: PathBuf,
    /// 后备映射文件（配置中缺少某个后缀时使用）
    pub fallback_mappings_file: Option<PathBuf>,
    /// 自动化桥接服务地址
    pub bridge_url: String,
    /// 结果报告文件
    pub report_file: PathBuf,
    /// 输出日志文件
    pub output_log_file: PathBuf,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    /// 固定等待时间
    pub timings: Timings,
    /// 重试次数
    pub retry: RetryBudget,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_files: Vec::new(),
            template_files: Vec::new(),
            range_config_file: PathBuf::from("range_config.toml"),
            fallback_mappings_file: None,
            bridge_url: "http://127.0.0.1:8765".to_string(),
            report_file: PathBuf::from("transfer_report.json"),
            output_log_file: PathBuf::from("output.txt"),
            verbose_logging: false,
            timings: Timings::default(),
            retry: RetryBudget::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            data_files: std::env::var("DATA_FILES").map(|v| split_paths(&v)).unwrap_or(default.data_files),
            template_files: std::env::var("TEMPLATE_FILES").map(|v| split_paths(&v)).unwrap_or(default.template_files),
            range_config_file: std::env::var("RANGE_CONFIG_FILE").map(PathBuf::from).unwrap_or(default.range_config_file),
            fallback_mappings_file: std::env::var("FALLBACK_MAPPINGS_FILE").ok().map(PathBuf::from).or(default.fallback_mappings_file),
            bridge_url: std::env::var("BRIDGE_URL").unwrap_or(default.bridge_url),
            report_file: std::env::var("REPORT_FILE").map(PathBuf::from).unwrap_or(default.report_file),
            output_log_file: std::env::var("OUTPUT_LOG_FILE").map(PathBuf::from).unwrap_or(default.output_log_file),
            verbose_logging: std::env::var("VERBOSE_LOGGING").ok().and_then(|v| v.parse().ok()).unwrap_or(default.verbose_logging),
            timings: Timings::from_env(),
            retry: default.retry,
        }
    }
}

impl Config {
    /// 开始处理前检查输入文件：必须至少各有一个，且全部存在
    pub fn validate_inputs(&self) -> Result<(), ConfigError> {
        if self.data_files.is_empty() {
            return Err(ConfigError::NoInputs("表格文件".to_string()));
        }
        if self.template_files.is_empty() {
            return Err(ConfigError::NoInputs("文档文件".to_string()));
        }

        for (kind, files) in [("表格文件", &self.data_files), ("文档文件", &self.template_files)] {
            let missing: Vec<PathBuf> = files.iter().filter(|p| !p.exists()).cloned().collect();
            if !missing.is_empty() {
                return Err(ConfigError::MissingInputs {
                    kind: kind.to_string(),
                    paths: missing,
                });
            }
        }
        Ok(())
    }
}

/// 解析以分号分隔的路径列表
fn split_paths(value: &str) -> Vec<PathBuf> {
    value
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
        .collect()
}

/// 固定等待时间
///
/// 外部应用程序没有可靠的"操作完成"信号，这些等待只是可调的折中值
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Timings {
    /// 区域复制到传输缓冲区后的稳定时间
    pub capture_settle: Duration,
    /// 图片插入成功后的节流时间
    pub placement_throttle: Duration,
    /// 标记查找重试前的等待
    pub locate_retry_pause: Duration,
    /// 数据文件之间的等待
    pub between_data_files: Duration,
    /// 保存文档前的等待
    pub before_save: Duration,
    /// 模板之间的等待
    pub between_templates: Duration,
    /// 句柄创建失败后的退避时间
    pub handle_backoff: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            capture_settle: Duration::from_millis(150),
            placement_throttle: Duration::from_millis(50),
            locate_retry_pause: Duration::from_millis(50),
            between_data_files: Duration::from_millis(300),
            before_save: Duration::from_millis(500),
            between_templates: Duration::from_secs(1),
            handle_backoff: Duration::from_secs(1),
        }
    }
}

impl Timings {
    /// 所有等待为零（测试和模拟驱动使用）
    pub fn immediate() -> Self {
        Self {
            capture_settle: Duration::ZERO,
            placement_throttle: Duration::ZERO,
            locate_retry_pause: Duration::ZERO,
            between_data_files: Duration::ZERO,
            before_save: Duration::ZERO,
            between_templates: Duration::ZERO,
            handle_backoff: Duration::ZERO,
        }
    }

    /// `TIMING_SCALE` 按比例缩放所有等待时间（例如 0.5 表示减半）
    pub fn from_env() -> Self {
        let scale = std::env::var("TIMING_SCALE")
            .ok()
            .and_then(|v| v.parse::<f64>().ok())
            .filter(|s| s.is_finite() && *s >= 0.0);
        match scale {
            Some(scale) => Self::default().scaled(scale),
            None => Self::default(),
        }
    }

    /// 缩放结果超出 `Duration` 范围的项保持原值
    pub fn scaled(&self, factor: f64) -> Self {
        let scale = |d: Duration| {
            Duration::try_from_secs_f64(d.as_secs_f64() * factor).unwrap_or_else(|e| {
                warn!("⚠️ 等待时间缩放无效 (倍数 {}): {}，保持 {:?}", factor, e, d);
                d
            })
        };
        Self {
            capture_settle: scale(self.capture_settle),
            placement_throttle: scale(self.placement_throttle),
            locate_retry_pause: scale(self.locate_retry_pause),
            between_data_files: scale(self.between_data_files),
            before_save: scale(self.before_save),
            between_templates: scale(self.between_templates),
            handle_backoff: scale(self.handle_backoff),
        }
    }
}

/// 重试次数上限
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryBudget {
    /// 应用程序句柄创建
    pub handle_attempts: usize,
    /// 标记查找
    pub locate_attempts: usize,
}

impl Default for RetryBudget {
    fn default() -> Self {
        Self {
            handle_attempts: 3,
            locate_attempts: 2,
        }
    }
}
