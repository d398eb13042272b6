//! 流式补全客户端模块
use crate::{
    config::Config,
    error::{NanoError, Result},
    form::Submission,
    stream::{FragmentStream, StreamWrapper},
    types::{ApiErrorBody, MessagesRequest, Role},
    utils::{endpoint, message},
};
use log::{debug, error, info};
use reqwest::{
    Client, Response, StatusCode,
    header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderValue},
};
use std::sync::Arc;

// ================================================================================================
// 核心客户端模块
// ================================================================================================

const MESSAGES_PATH: &str = "/v1/messages";

/// 流式补全客户端
///
/// 每次调用 [`CompletionClient::stream`] 打开一个请求，不做任何重试
#[derive(Debug, Clone)]
pub struct CompletionClient {
    client: Arc<Client>,
    config: Arc<Config>,
    stream_handler: StreamWrapper,
}

impl CompletionClient {
    /// 创建一个新的 `CompletionClient` 实例
    pub fn new(config: Config) -> Self {
        let client = Client::builder()
            .pool_idle_timeout(config.pool_idle_timeout)
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .tcp_keepalive(config.tcp_keepalive)
            .tcp_nodelay(config.tcp_nodelay)
            .connect_timeout(config.connect_timeout)
            .build()
            .unwrap_or_else(|e| {
                error!("Failed to build reqwest client: {}", e);
                Client::new()
            });

        Self {
            client: Arc::new(client),
            config: Arc::new(config),
            stream_handler: StreamWrapper::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// 构建 API 请求所需的 HTTP 标头
    ///
    /// 缺少 API 密钥时立即失败，此时尚未建立任何连接
    fn build_headers(&self) -> Result<HeaderMap> {
        if !self.config.has_api_key() {
            return Err(NanoError::Config(
                "未找到 API 密钥，请先设置 ANTHROPIC_API_KEY".to_string(),
            ));
        }

        let mut headers = HeaderMap::new();
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(self.config.api_key.trim())
                .map_err(|e| NanoError::Config(format!("Invalid API key: {}", e)))?,
        );
        headers.insert(
            "anthropic-version",
            HeaderValue::from_str(&self.config.api_version)
                .map_err(|e| NanoError::Config(format!("Invalid API version: {}", e)))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("text/event-stream"));
        Ok(headers)
    }

    /// 为一次提交打开流式响应
    ///
    /// 返回的片段流按到达顺序产出文本；连接在流被丢弃时释放
    pub async fn stream(&self, submission: &Submission) -> Result<FragmentStream> {
        let headers = self.build_headers()?;
        let url = endpoint(&self.config.api_base, MESSAGES_PATH);

        let params = MessagesRequest {
            model: submission.model(),
            max_tokens: submission.max_output_tokens(),
            temperature: submission.temperature(),
            messages: vec![message(Role::User, submission.prompt())],
            stream: true,
        };

        info!(
            "Opening stream: model={}, max_tokens={}",
            submission.model(),
            submission.max_output_tokens()
        );
        let response = self.client.post(&url).headers(headers).json(&params).send().await?;
        let response = check_status(response).await?;
        debug!("Stream opened with status {}", response.status());

        let fragments = self.stream_handler.stream(response.bytes_stream());
        Ok(FragmentStream::new(fragments))
    }
}

/// 把非 2xx 响应转换为带有服务端说明的错误
async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<ApiErrorBody>(&body)
        .ok()
        .map(|b| b.error.message)
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| format!("Request failed with status: {}", status));
    error!("Completion request rejected ({}): {}", status, detail);

    Err(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => NanoError::Auth(detail),
        StatusCode::TOO_MANY_REQUESTS => NanoError::RateLimit(detail),
        _ => NanoError::Api(detail),
    })
}
