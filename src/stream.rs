//! 流式响应处理模块
use crate::{
    error::{NanoError, Result},
    types::{ContentDelta, StreamEvent},
};
use async_stream::try_stream;
use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt, stream::FusedStream};
use log::debug;
use std::{
    pin::Pin,
    task::{Context, Poll},
};

// ================================================================================================
// SSE 解码器
// ================================================================================================

const EVENT_SEPARATOR: &[u8] = b"\n\n";
/// 单个未结束事件允许缓冲的最大字节数
pub const MAX_EVENT_BYTES: usize = 1024 * 1024;

/// 单个 SSE 事件解码后的结果
#[derive(Debug, PartialEq)]
enum Decoded {
    /// 一段生成的文本
    Text(String),
    /// `message_stop`，流正常结束
    Stop,
    /// 与文本输出无关的事件
    Skip,
}

/// 一个无状态的流处理器，用于把 SSE (Server-Sent Events) 字节流解码为文本片段
#[derive(Debug, Clone, Default)]
pub struct StreamWrapper;

impl StreamWrapper {
    /// 创建一个新的 `StreamWrapper` 实例
    ///
    /// 这是一个无状态的结构体，所以 `new` 只是 `default` 的别名
    pub fn new() -> Self {
        StreamWrapper
    }

    /// 将字节流转换为文本片段流
    ///
    /// 片段按到达顺序产出；任何错误都会终止流，且在 `message_stop` 之前结束的响应视为错误
    pub fn stream<S, E>(&self, bytes_stream: S) -> impl Stream<Item = Result<String>> + Send + 'static + use<S, E>
    where
        S: Stream<Item = std::result::Result<Bytes, E>> + Send + 'static,
        E: Send + 'static,
        NanoError: From<E>,
    {
        try_stream! {
            let mut bytes_stream = Box::pin(bytes_stream);
            let mut buffer = BytesMut::new();
            // 已确认不含分隔符的前缀长度
            let mut scanned: usize = 0;
            let mut stopped = false;

            'read: while let Some(bytes_res) = bytes_stream.next().await {
                let bytes = bytes_res.map_err(NanoError::from)?;
                buffer.extend(bytes.iter().copied().filter(|b| *b != b'\r'));

                // 分隔符可能跨越两个数据块，回退一个字节再继续查找
                while let Some(pos) = find_separator(&buffer, scanned.saturating_sub(EVENT_SEPARATOR.len() - 1)) {
                    scanned = 0;
                    let block = buffer.split_to(pos + EVENT_SEPARATOR.len());
                    match decode_block(&block)? {
                        Decoded::Text(text) => {
                            yield text;
                        }
                        Decoded::Stop => {
                            stopped = true;
                            break 'read;
                        }
                        Decoded::Skip => {}
                    }
                }
                scanned = buffer.len();

                if buffer.len() > MAX_EVENT_BYTES {
                    Err(NanoError::StreamError(format!(
                        "单个事件超过 {} 字节上限",
                        MAX_EVENT_BYTES
                    )))?;
                }
            }

            // 最后一个事件可能缺少结尾的空行
            if !stopped && !buffer.is_empty() {
                debug!("Leftover buffer: {:?}", String::from_utf8_lossy(&buffer));
                match decode_block(&buffer)? {
                    Decoded::Text(text) => {
                        yield text;
                    }
                    Decoded::Stop => stopped = true,
                    Decoded::Skip => {}
                }
            }

            if !stopped {
                Err(NanoError::StreamError("响应流在 message_stop 之前中断".to_string()))?;
            }
        }
    }
}

/// 从 `from` 开始查找事件分隔符，返回其在 `buffer` 中的位置
fn find_separator(buffer: &[u8], from: usize) -> Option<usize> {
    buffer
        .get(from..)?
        .windows(EVENT_SEPARATOR.len())
        .position(|w| w == EVENT_SEPARATOR)
        .map(|pos| from + pos)
}

/// 取出 `name: value` 形式字段的值，冒号后的单个空格不计入值
fn field<'a>(line: &'a str, name: &str) -> Option<&'a str> {
    let value = line.strip_prefix(name)?.strip_prefix(':')?;
    Some(value.strip_prefix(' ').unwrap_or(value))
}

fn decode_block(block: &[u8]) -> Result<Decoded> {
    let text = std::str::from_utf8(block)?;

    let mut event_name = None;
    let mut data = String::new();
    for line in text.lines() {
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        if let Some(name) = field(line, "event") {
            event_name = Some(name);
        } else if let Some(content) = field(line, "data") {
            if !data.is_empty() {
                data.push('\n');
            }
            data.push_str(content);
        }
    }

    if data.is_empty() {
        return Ok(Decoded::Skip);
    }

    let event: StreamEvent = serde_json::from_str(&data).map_err(|e| {
        NanoError::Json(format!(
            "Failed to parse event {:?}: '{}', error: {}",
            event_name.unwrap_or("message"),
            data,
            e
        ))
    })?;

    match event {
        StreamEvent::ContentBlockDelta {
            delta: ContentDelta::TextDelta { text },
            ..
        } => Ok(if text.is_empty() { Decoded::Skip } else { Decoded::Text(text) }),
        StreamEvent::MessageStop => Ok(Decoded::Stop),
        StreamEvent::Error { error } => {
            let message = if error.message.is_empty() { error.kind } else { error.message };
            Err(NanoError::Api(message))
        }
        other => {
            debug!("Skipping event: {:?}", other);
            Ok(Decoded::Skip)
        }
    }
}

// ================================================================================================
// 片段流
// ================================================================================================

/// 文本片段流
///
/// 产出一次错误后即终止，之后永远返回 `None`。丢弃该值会同时丢弃底层响应体并释放连接。
pub struct FragmentStream {
    inner: Pin<Box<dyn Stream<Item = Result<String>> + Send>>,
    terminated: bool,
}

impl FragmentStream {
    /// 创建一个新的 `FragmentStream`
    pub fn new(stream: impl Stream<Item = Result<String>> + Send + 'static) -> Self {
        Self {
            inner: Box::pin(stream),
            terminated: false,
        }
    }
}

impl Stream for FragmentStream {
    type Item = Result<String>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.terminated {
            return Poll::Ready(None);
        }
        let polled = self.inner.as_mut().poll_next(cx);
        if matches!(polled, Poll::Ready(None) | Poll::Ready(Some(Err(_)))) {
            self.terminated = true;
        }
        polled
    }
}

impl FusedStream for FragmentStream {
    fn is_terminated(&self) -> bool {
        self.terminated
    }
}

impl std::fmt::Debug for FragmentStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FragmentStream")
            .field("terminated", &self.terminated)
            .finish_non_exhaustive()
    }
}
