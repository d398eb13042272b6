//! # NanoStream - 轻量级流式提示词控制台
//!
//! NanoStream 把用户输入的提示词转发给托管的大语言模型（Anthropic Messages API），
//! 并在响应到达时逐段渲染。
//!
//! ## 主要特性
//!
//! - 🚀 **异步支持**：基于 `tokio` 的完全异步实现。
//! - 🔄 **流式响应**：片段按到达顺序立即显示，不等待完整响应。
//! - 🛡️ **错误处理**：校验、配置、流式三类错误，均原样展示给用户，不做自动重试。
//! - 🔧 **灵活配置**：支持环境变量、`.env` 文件和 Builder 模式。
//!
//! ## 快速开始
//!
//! ```rust,no_run
//! use nanostream::{CompletionClient, Config, PromptForm};
//! use nanostream::error::Result;
//! use futures::StreamExt;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     // 从环境变量加载配置 (需要设置 ANTHROPIC_API_KEY)
//!     let config = Config::from_env()?;
//!     let client = CompletionClient::new(config);
//!
//!     let submission = PromptForm::new("你好，世界！").submit()?;
//!     let mut stream = client.stream(&submission).await?;
//!     while let Some(fragment) = stream.next().await {
//!         print!("{}", fragment?);
//!     }
//!     println!();
//!
//!     Ok(())
//! }
//! ```

// 模块定义
pub mod client;
pub mod config;
pub mod error;
pub mod form;
pub mod render;
pub mod session;
pub mod stream;
pub mod types;
pub mod utils;

pub use client::CompletionClient;
pub use config::Config;
pub use error::{ErrorKind, NanoError};
pub use form::{PromptForm, Submission};
pub use render::{RenderOutcome, Status, View};
pub use session::Session;
pub use types::{Message, Role};
pub use utils::message;
