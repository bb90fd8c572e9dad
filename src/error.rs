use std::fmt;

use crate::models::{FieldKey, PageState};

/// 应用程序错误类型
///
/// 工作流内部的大多数失败都会在本地降级为 bool / 跳过，
/// 这里的类型主要用于日志和协作方（数据源、验证码、审计）的返回值。
#[derive(Debug)]
pub enum AppError {
    /// 页面分类失败（ERROR，或 UNKNOWN 且没有处理器）
    Classification(ClassificationError),
    /// 无法通过任何策略到达目标页面
    Navigation(NavigationError),
    /// 字段或选项没有可接受的匹配
    Resolution(ResolutionError),
    /// 交互策略全部耗尽
    Action(ActionError),
    /// 外部服务（验证码 / 审计）错误
    ExternalService(ExternalServiceError),
    /// 数据源错误
    DataSource(DataSourceError),
    /// 配置错误
    Config(ConfigError),
    /// UI 驱动错误
    Driver(DriverError),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Classification(e) => write!(f, "分类错误: {}", e),
            AppError::Navigation(e) => write!(f, "导航错误: {}", e),
            AppError::Resolution(e) => write!(f, "匹配错误: {}", e),
            AppError::Action(e) => write!(f, "操作错误: {}", e),
            AppError::ExternalService(e) => write!(f, "外部服务错误: {}", e),
            AppError::DataSource(e) => write!(f, "数据源错误: {}", e),
            AppError::Config(e) => write!(f, "配置错误: {}", e),
            AppError::Driver(e) => write!(f, "驱动错误: {}", e),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Classification(e) => Some(e),
            AppError::Navigation(e) => Some(e),
            AppError::Resolution(e) => Some(e),
            AppError::Action(e) => Some(e),
            AppError::ExternalService(e) => Some(e),
            AppError::DataSource(e) => Some(e),
            AppError::Config(e) => Some(e),
            AppError::Driver(e) => Some(e),
        }
    }
}

/// UI 驱动错误
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("CDP 调用失败: {0}")]
    Cdp(#[from] chromiumoxide::error::CdpError),
    #[error("脚本执行失败: {0}")]
    Script(String),
    #[error("控件已失效: {0}")]
    StaleHandle(String),
    #[error("结果解析失败: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("驱动不支持该操作: {0}")]
    Unsupported(&'static str),
}

pub type DriverResult<T> = Result<T, DriverError>;

/// 分类错误
#[derive(Debug)]
pub enum ClassificationError {
    /// 检查本身失败
    InspectionFailed { reason: String },
    /// 识别成 UNKNOWN，没有对应处理器
    NoHandler { state: PageState },
}

impl fmt::Display for ClassificationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClassificationError::InspectionFailed { reason } => {
                write!(f, "页面检查失败: {}", reason)
            }
            ClassificationError::NoHandler { state } => {
                write!(f, "页面 {} 没有可用的处理器", state)
            }
        }
    }
}

impl std::error::Error for ClassificationError {}

/// 导航错误
#[derive(Debug)]
pub struct NavigationError {
    pub from: PageState,
    pub target: PageState,
}

impl fmt::Display for NavigationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "无法从 {} 导航到 {}", self.from, self.target)
    }
}

impl std::error::Error for NavigationError {}

/// 匹配错误
#[derive(Debug)]
pub enum ResolutionError {
    /// 控件没有对应字段
    NoFieldRule { control: String },
    /// 选项得分低于阈值
    BelowThreshold {
        field: FieldKey,
        target: String,
        best_score: f64,
    },
    /// 候选为空
    NoCandidates { field: FieldKey },
}

impl fmt::Display for ResolutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolutionError::NoFieldRule { control } => {
                write!(f, "控件 '{}' 没有匹配的字段规则", control)
            }
            ResolutionError::BelowThreshold {
                field,
                target,
                best_score,
            } => write!(
                f,
                "字段 {} 的值 '{}' 没有足够的匹配 (最高分: {:.3})",
                field, target, best_score
            ),
            ResolutionError::NoCandidates { field } => {
                write!(f, "字段 {} 没有可选项", field)
            }
        }
    }
}

impl std::error::Error for ResolutionError {}

/// 交互错误
#[derive(Debug)]
pub struct ActionError {
    pub action: String,
    pub control: String,
    pub attempts: usize,
}

impl fmt::Display for ActionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} 在控件 '{}' 上失败，已尝试 {} 种策略",
            self.action, self.control, self.attempts
        )
    }
}

impl std::error::Error for ActionError {}

/// 外部服务错误
#[derive(Debug)]
pub enum ExternalServiceError {
    /// 请求失败
    RequestFailed {
        service: &'static str,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 服务返回错误
    BadResponse {
        service: &'static str,
        message: String,
    },
    /// 轮询次数耗尽
    Exhausted { service: &'static str, attempts: usize },
}

impl fmt::Display for ExternalServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExternalServiceError::RequestFailed { service, source } => {
                write!(f, "{} 请求失败: {}", service, source)
            }
            ExternalServiceError::BadResponse { service, message } => {
                write!(f, "{} 返回错误: {}", service, message)
            }
            ExternalServiceError::Exhausted { service, attempts } => {
                write!(f, "{} 轮询 {} 次后仍未完成", service, attempts)
            }
        }
    }
}

impl std::error::Error for ExternalServiceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ExternalServiceError::RequestFailed { source, .. } => {
                Some(source.as_ref() as &(dyn std::error::Error + 'static))
            }
            _ => None,
        }
    }
}

/// 数据源错误
#[derive(Debug)]
pub enum DataSourceError {
    /// 文件不存在
    NotFound { path: String },
    /// 读取失败
    ReadFailed {
        path: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 解析失败
    ParseFailed {
        path: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 数据为空
    Empty { path: String },
    /// 缺少必需列
    MissingColumns { columns: Vec<String> },
}

impl fmt::Display for DataSourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSourceError::NotFound { path } => write!(f, "文件不存在: {}", path),
            DataSourceError::ReadFailed { path, source } => {
                write!(f, "读取文件失败 ({}): {}", path, source)
            }
            DataSourceError::ParseFailed { path, source } => {
                write!(f, "TOML解析失败 ({}): {}", path, source)
            }
            DataSourceError::Empty { path } => write!(f, "数据文件为空: {}", path),
            DataSourceError::MissingColumns { columns } => {
                write!(f, "缺少必需列: {}", columns.join(", "))
            }
        }
    }
}

impl std::error::Error for DataSourceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DataSourceError::ReadFailed { source, .. }
            | DataSourceError::ParseFailed { source, .. } => {
                Some(source.as_ref() as &(dyn std::error::Error + 'static))
            }
            _ => None,
        }
    }
}

/// 配置错误
#[derive(Debug)]
pub enum ConfigError {
    /// 缺少数据文件
    MissingDataFile,
    /// 附件不存在
    AttachmentNotFound { path: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::MissingDataFile => {
                write!(f, "未指定数据文件 (命令行第一个参数或 DATA_FILE)")
            }
            ConfigError::AttachmentNotFound { path } => write!(f, "附件不存在: {}", path),
        }
    }
}

impl std::error::Error for ConfigError {}

// ========== 从常见错误类型转换 ==========

impl From<DriverError> for AppError {
    fn from(err: DriverError) -> Self {
        AppError::Driver(err)
    }
}

impl From<DataSourceError> for AppError {
    fn from(err: DataSourceError) -> Self {
        AppError::DataSource(err)
    }
}

impl From<ExternalServiceError> for AppError {
    fn from(err: ExternalServiceError) -> Self {
        AppError::ExternalService(err)
    }
}

impl From<ConfigError> for AppError {
    fn from(err: ConfigError) -> Self {
        AppError::Config(err)
    }
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建导航错误
    pub fn navigation(from: PageState, target: PageState) -> Self {
        AppError::Navigation(NavigationError { from, target })
    }

    /// 创建交互错误
    pub fn action(action: impl Into<String>, control: impl Into<String>, attempts: usize) -> Self {
        AppError::Action(ActionError {
            action: action.into(),
            control: control.into(),
            attempts,
        })
    }

    /// 创建外部请求错误
    pub fn service_request_failed(
        service: &'static str,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::ExternalService(ExternalServiceError::RequestFailed {
            service,
            source: Box::new(source),
        })
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
