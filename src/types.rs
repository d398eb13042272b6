//! API 数据结构模块

use serde::{Deserialize, Serialize};

// ================================================================================================
// API 请求结构
// ================================================================================================

/// 对话消息
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct Message {
    /// 角色
    pub role: Role,
    /// 内容
    pub content: String,
}

/// 角色枚举
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// 用户
    #[default]
    User,
    /// 机器人
    Assistant,
}

/// 流式消息请求体
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct MessagesRequest<'a> {
    pub model: &'a str,
    pub max_tokens: u32,
    pub temperature: f32,
    pub messages: Vec<Message>,
    pub stream: bool,
}

// ================================================================================================
// API 错误响应
// ================================================================================================

/// 错误详情
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct ApiErrorDetail {
    /// 错误类型，例如 `authentication_error`
    #[serde(rename = "type", default)]
    pub kind: String,
    /// 可读的错误信息
    #[serde(default)]
    pub message: String,
}

/// 非 2xx 响应体以及流中 `error` 事件的负载
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub error: ApiErrorDetail,
}

// ================================================================================================
// 流式 API 响应结构
// ================================================================================================

/// 流式事件，按 `type` 字段区分
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    MessageStart {
        #[serde(default)]
        message: serde_json::Value,
    },
    ContentBlockStart {
        #[serde(default)]
        index: usize,
    },
    ContentBlockDelta {
        #[serde(default)]
        index: usize,
        delta: ContentDelta,
    },
    ContentBlockStop {
        #[serde(default)]
        index: usize,
    },
    MessageDelta {
        #[serde(default)]
        delta: serde_json::Value,
    },
    MessageStop,
    Ping,
    Error {
        #[serde(default)]
        error: ApiErrorDetail,
    },
    /// 未识别的事件类型，直接忽略
    #[serde(other)]
    Unknown,
}

/// 内容块增量
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentDelta {
    /// 文本增量
    TextDelta { text: String },
    /// 其他增量（工具参数、思考过程等）不进入文本输出
    #[serde(other)]
    Other,
}
