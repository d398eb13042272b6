//! 会话模块：把表单、客户端和渲染器串成一次完整的提交
use crate::{
    client::CompletionClient,
    error::{NanoError, Result},
    form::PromptForm,
    render::{RENDER_BUFFER, RenderEvent, RenderOutcome, Renderer, Status, View, forward},
};
use log::{error, info};
use std::sync::Arc;
use tokio::sync::{Semaphore, mpsc};

/// 提交会话
///
/// 同一时间只允许一次提交处于进行中，重叠的提交会被拒绝（[`NanoError::Busy`]）
#[derive(Debug, Clone)]
pub struct Session {
    client: CompletionClient,
    gate: Arc<Semaphore>,
}

impl Session {
    pub fn new(client: CompletionClient) -> Self {
        Self {
            client,
            gate: Arc::new(Semaphore::new(1)),
        }
    }

    pub fn client(&self) -> &CompletionClient {
        &self.client
    }

    /// 是否有提交正在进行
    pub fn is_busy(&self) -> bool {
        self.gate.available_permits() == 0
    }

    /// 执行一次提交
    ///
    /// 校验失败时在视图上显示错误并返回 [`NanoError::Validation`]；
    /// 流式错误由渲染器显示，结果中的 `status` 为 [`Status::Error`]
    pub async fn submit<V: View>(&self, form: &PromptForm, view: &mut V) -> Result<RenderOutcome> {
        let _permit = self.gate.try_acquire().map_err(|_| NanoError::Busy)?;

        view.show_status(Status::Validating);
        let submission = match form.submit() {
            Ok(submission) => submission,
            Err(e) => {
                view.show_error(&e.to_string());
                view.show_status(Status::Idle);
                return Err(e);
            }
        };

        let (tx, rx) = mpsc::channel(RENDER_BUFFER);
        let producer = async move {
            let _ = tx.send(RenderEvent::Started).await;
            match self.client.stream(&submission).await {
                Ok(fragments) => forward(fragments, &tx).await,
                Err(e) => {
                    error!("Failed to open stream: {}", e);
                    let _ = tx.send(RenderEvent::failed(&e)).await;
                }
            }
        };

        let (_, outcome) = tokio::join!(producer, Renderer::new(view).run(rx));
        info!(
            "Submission finished: status={:?}, {} bytes",
            outcome.status,
            outcome.transcript.len()
        );
        Ok(outcome)
    }
}
