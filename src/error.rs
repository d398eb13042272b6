//! 错误处理模块

use thiserror::Error;

/// NanoStream 的统一错误类型
///
/// 变体可以通过 [`NanoError::kind`] 归入三类：本地校验、配置缺失、流式请求失败
#[derive(Debug, Error)]
pub enum NanoError {
    /// 提交前的本地校验失败（例如空提示词）
    #[error("{0}")]
    Validation(String),

    /// 配置相关错误
    #[error("配置错误: {0}")]
    Config(String),

    /// 上一次提交仍在生成中
    #[error("上一个请求仍在生成中，请稍候再提交")]
    Busy,

    /// HTTP 请求相关错误
    #[error("HTTP请求失败: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON 序列化/反序列化错误
    #[error("JSON处理错误: {0}")]
    Json(String),

    /// API 服务端错误
    #[error("API错误: {0}")]
    Api(String),

    /// 流处理相关错误
    #[error("流处理错误: {0}")]
    StreamError(String),

    /// API 请求频率限制
    #[error("请求频率超限: {0}")]
    RateLimit(String),

    /// 身份验证失败
    #[error("身份验证失败: {0}")]
    Auth(String),

    /// UTF8转换错误
    #[error("UTF8转换错误: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    /// IO 错误
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// 错误分类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// 本地校验失败，未发起任何网络请求
    Validation,
    /// 缺少或非法的 API 密钥
    Configuration,
    /// 单飞行策略拒绝了重叠提交
    Busy,
    /// 建立连接或流式传输过程中的任何失败
    Stream,
}

impl NanoError {
    /// 返回错误所属的分类
    pub fn kind(&self) -> ErrorKind {
        match self {
            NanoError::Validation(_) => ErrorKind::Validation,
            NanoError::Config(_) => ErrorKind::Configuration,
            NanoError::Busy => ErrorKind::Busy,
            _ => ErrorKind::Stream,
        }
    }
}

/// NanoStream 的 Result 类型别名
pub type Result<T> = std::result::Result<T, NanoError>;

impl From<serde_json::Error> for NanoError {
    fn from(e: serde_json::Error) -> Self {
        NanoError::Json(e.to_string())
    }
}

impl From<std::string::FromUtf8Error> for NanoError {
    fn from(e: std::string::FromUtf8Error) -> Self {
        NanoError::Utf8(e.utf8_error())
    }
}
