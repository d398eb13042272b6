//! 增量渲染模块
//!
//! 生产端通过 [`forward`] 把片段流转换为 [`RenderEvent`]，经 `mpsc` 通道送到
//! [`Renderer::run`]，后者累积文本并在每批片段之后刷新视图。
use crate::error::{ErrorKind, NanoError, Result};
use futures::{Stream, StreamExt};
use log::{debug, warn};
use tokio::sync::mpsc::{self, error::TryRecvError};

/// 通道容量
pub const RENDER_BUFFER: usize = 64;

const INTERRUPTED: &str = "响应流意外中断";

// ================================================================================================
// 状态机
// ================================================================================================

/// 单次提交的状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Status {
    #[default]
    Idle,
    Validating,
    Streaming,
    Done,
    Error,
}

impl Status {
    /// 是否允许从当前状态转移到 `next`
    pub fn can_advance(self, next: Status) -> bool {
        use Status::*;
        matches!(
            (self, next),
            (Idle, Validating)
                | (Validating, Idle)
                | (Validating, Streaming)
                | (Streaming, Done)
                | (Streaming, Error)
                | (Done, Idle)
                | (Error, Idle)
        )
    }

    /// 是否为终止状态
    pub fn is_terminal(self) -> bool {
        matches!(self, Status::Done | Status::Error)
    }
}

// ================================================================================================
// 视图与事件
// ================================================================================================

/// 渲染目标
pub trait View {
    /// 状态变化，`Streaming` 表示应立即显示进度提示
    fn show_status(&mut self, status: Status);
    /// 当前完整的文本
    fn show_transcript(&mut self, transcript: &str);
    /// 与文本分开显示的错误信息
    fn show_error(&mut self, message: &str);
}

/// 从生产端发往渲染循环的事件
#[derive(Debug, Clone, PartialEq)]
pub enum RenderEvent {
    Started,
    Fragment(String),
    Done,
    Failed { kind: ErrorKind, message: String },
}

impl RenderEvent {
    /// 由错误构造终止事件，保留错误分类
    pub fn failed(error: &NanoError) -> Self {
        RenderEvent::Failed {
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}

/// 一次提交结束时冻结的结果
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RenderOutcome {
    pub status: Status,
    pub transcript: String,
    pub error: Option<String>,
    /// 失败时的错误分类
    pub error_kind: Option<ErrorKind>,
}

/// 把片段流逐个转发到渲染通道，以 `Done` 或一次 `Failed` 结束
///
/// 接收端关闭时提前返回，片段流随之被丢弃
pub async fn forward<S>(fragments: S, tx: &mpsc::Sender<RenderEvent>)
where
    S: Stream<Item = Result<String>>,
{
    let mut fragments = Box::pin(fragments);
    while let Some(item) = fragments.next().await {
        let event = match item {
            Ok(text) => RenderEvent::Fragment(text),
            Err(e) => {
                let _ = tx.send(RenderEvent::failed(&e)).await;
                return;
            }
        };
        if tx.send(event).await.is_err() {
            debug!("Render channel closed, dropping stream");
            return;
        }
    }
    let _ = tx.send(RenderEvent::Done).await;
}

// ================================================================================================
// 渲染器
// ================================================================================================

/// 增量渲染器，持有单次提交的文本累积器
pub struct Renderer<'v, V: View> {
    view: &'v mut V,
    status: Status,
    transcript: String,
    error: Option<(ErrorKind, String)>,
}

impl<'v, V: View> Renderer<'v, V> {
    pub fn new(view: &'v mut V) -> Self {
        Self {
            view,
            status: Status::Validating,
            transcript: String::new(),
            error: None,
        }
    }

    /// 驱动渲染循环直到通道关闭
    ///
    /// 已在通道中排队的连续片段合并为一次刷新
    pub async fn run(mut self, mut rx: mpsc::Receiver<RenderEvent>) -> RenderOutcome {
        let mut pending = None;
        loop {
            let event = match pending.take() {
                Some(event) => event,
                None => match rx.recv().await {
                    Some(event) => event,
                    None => break,
                },
            };

            match event {
                RenderEvent::Started => self.start(),
                RenderEvent::Fragment(text) => {
                    self.append(&text);
                    loop {
                        match rx.try_recv() {
                            Ok(RenderEvent::Fragment(text)) => self.append(&text),
                            Ok(other) => {
                                pending = Some(other);
                                break;
                            }
                            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
                        }
                    }
                    if self.status == Status::Streaming {
                        self.view.show_transcript(&self.transcript);
                    }
                }
                RenderEvent::Done => self.finish(),
                RenderEvent::Failed { kind, message } => self.fail(kind, message),
            }
        }

        if !self.status.is_terminal() {
            self.fail(ErrorKind::Stream, INTERRUPTED.to_string());
        }

        let (error_kind, error) = match self.error {
            Some((kind, message)) => (Some(kind), Some(message)),
            None => (None, None),
        };
        RenderOutcome {
            status: self.status,
            transcript: self.transcript,
            error,
            error_kind,
        }
    }

    fn append(&mut self, text: &str) {
        if self.status == Status::Streaming {
            self.transcript.push_str(text);
        } else {
            debug!("Ignoring fragment in state {:?}", self.status);
        }
    }

    fn advance(&mut self, next: Status) -> bool {
        if !self.status.can_advance(next) {
            warn!("Ignoring transition {:?} -> {:?}", self.status, next);
            return false;
        }
        self.status = next;
        true
    }

    fn start(&mut self) {
        if self.advance(Status::Streaming) {
            self.view.show_status(Status::Streaming);
        }
    }

    fn finish(&mut self) {
        if self.advance(Status::Done) {
            self.view.show_status(Status::Done);
        }
    }

    fn fail(&mut self, kind: ErrorKind, message: String) {
        // 尚未开始流式传输时也要进入 Error，以便显示错误
        if self.status == Status::Validating {
            self.advance(Status::Streaming);
        }
        if self.advance(Status::Error) {
            self.view.show_error(&message);
            self.view.show_status(Status::Error);
            self.error = Some((kind, message));
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::NanoError;
    use futures::stream;

    /// Records every call a renderer makes, in order.
    #[derive(Debug, Default)]
    pub(crate) struct RecordingView {
        pub calls: Vec<Call>,
    }

    #[derive(Debug, Clone, PartialEq)]
    pub(crate) enum Call {
        Status(Status),
        Transcript(String),
        Error(String),
    }

    impl RecordingView {
        pub fn last_transcript(&self) -> Option<&str> {
            self.calls.iter().rev().find_map(|c| match c {
                Call::Transcript(t) => Some(t.as_str()),
                _ => None,
            })
        }

        pub fn errors(&self) -> Vec<&str> {
            self.calls
                .iter()
                .filter_map(|c| match c {
                    Call::Error(e) => Some(e.as_str()),
                    _ => None,
                })
                .collect()
        }
    }

    impl View for RecordingView {
        fn show_status(&mut self, status: Status) {
            self.calls.push(Call::Status(status));
        }
        fn show_transcript(&mut self, transcript: &str) {
            self.calls.push(Call::Transcript(transcript.to_string()));
        }
        fn show_error(&mut self, message: &str) {
            self.calls.push(Call::Error(message.to_string()));
        }
    }

    async fn render(items: Vec<Result<String>>, view: &mut RecordingView) -> RenderOutcome {
        let (tx, rx) = mpsc::channel(RENDER_BUFFER);
        let producer = async move {
            let _ = tx.send(RenderEvent::Started).await;
            forward(stream::iter(items), &tx).await;
        };
        let (_, outcome) = tokio::join!(producer, Renderer::new(view).run(rx));
        outcome
    }

    #[tokio::test]
    async fn test_successful_stream_shows_full_transcript() {
        let mut view = RecordingView::default();
        let items = vec![Ok("Hel".to_string()), Ok("lo, ".to_string()), Ok("world!".to_string())];
        let outcome = render(items, &mut view).await;

        assert_eq!(outcome.status, Status::Done);
        assert_eq!(outcome.transcript, "Hello, world!");
        assert_eq!(outcome.error, None);
        assert_eq!(outcome.error_kind, None);
        assert_eq!(view.calls.first(), Some(&Call::Status(Status::Streaming)));
        assert_eq!(view.calls.last(), Some(&Call::Status(Status::Done)));
        assert_eq!(view.last_transcript(), Some("Hello, world!"));
        assert!(view.errors().is_empty());
    }

    #[tokio::test]
    async fn test_progress_is_shown_before_first_fragment() {
        let mut view = RecordingView::default();
        let (tx, rx) = mpsc::channel(RENDER_BUFFER);
        let producer = async move {
            tx.send(RenderEvent::Started).await.unwrap();
            tokio::task::yield_now().await;
            tx.send(RenderEvent::Fragment("x".into())).await.unwrap();
            tx.send(RenderEvent::Done).await.unwrap();
        };
        let (_, outcome) = tokio::join!(producer, Renderer::new(&mut view).run(rx));
        assert_eq!(outcome.status, Status::Done);
        assert_eq!(view.calls[0], Call::Status(Status::Streaming));
        assert!(matches!(view.calls[1], Call::Transcript(_)));
    }

    #[tokio::test]
    async fn test_error_keeps_partial_transcript() {
        let mut view = RecordingView::default();
        let items = vec![
            Ok("The ".to_string()),
            Err(NanoError::StreamError("connection reset".into())),
        ];
        let outcome = render(items, &mut view).await;

        assert_eq!(outcome.status, Status::Error);
        assert_eq!(outcome.transcript, "The ");
        assert_eq!(outcome.error_kind, Some(ErrorKind::Stream));
        let error = outcome.error.unwrap();
        assert!(error.contains("connection reset"));
        assert_eq!(view.errors(), vec![error.as_str()]);
        assert_eq!(view.last_transcript(), Some("The "));
        assert_ne!(view.last_transcript(), Some(error.as_str()));
    }

    #[tokio::test]
    async fn test_error_before_any_fragment() {
        let mut view = RecordingView::default();
        let outcome = render(vec![Err(NanoError::Api("overloaded".into()))], &mut view).await;
        assert_eq!(outcome.status, Status::Error);
        assert_eq!(outcome.transcript, "");
        assert_eq!(view.last_transcript(), None);
    }

    #[tokio::test]
    async fn test_replay_is_idempotent() {
        let items = || vec![Ok("a".to_string()), Ok("b".to_string()), Ok("c".to_string())];
        let first = render(items(), &mut RecordingView::default()).await;
        let second = render(items(), &mut RecordingView::default()).await;
        assert_eq!(first, second);
        assert_eq!(first.transcript, "abc");
    }

    #[tokio::test]
    async fn test_queued_fragments_are_coalesced() {
        let mut view = RecordingView::default();
        let (tx, rx) = mpsc::channel(RENDER_BUFFER);
        for event in [
            RenderEvent::Started,
            RenderEvent::Fragment("a".into()),
            RenderEvent::Fragment("b".into()),
            RenderEvent::Fragment("c".into()),
            RenderEvent::Done,
        ] {
            tx.send(event).await.unwrap();
        }
        drop(tx);

        let outcome = Renderer::new(&mut view).run(rx).await;
        assert_eq!(outcome.transcript, "abc");
        assert_eq!(
            view.calls,
            vec![
                Call::Status(Status::Streaming),
                Call::Transcript("abc".into()),
                Call::Status(Status::Done),
            ]
        );
    }

    #[tokio::test]
    async fn test_events_after_terminal_are_ignored() {
        let mut view = RecordingView::default();
        let (tx, rx) = mpsc::channel(RENDER_BUFFER);
        for event in [
            RenderEvent::Started,
            RenderEvent::Fragment("a".into()),
            RenderEvent::Failed {
                kind: ErrorKind::Stream,
                message: "boom".into(),
            },
            RenderEvent::Fragment("late".into()),
            RenderEvent::Done,
        ] {
            tx.send(event).await.unwrap();
        }
        drop(tx);

        let outcome = Renderer::new(&mut view).run(rx).await;
        assert_eq!(outcome.status, Status::Error);
        assert_eq!(outcome.transcript, "a");
        assert_eq!(outcome.error.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn test_closed_channel_without_terminal_event_is_an_error() {
        let mut view = RecordingView::default();
        let (tx, rx) = mpsc::channel(RENDER_BUFFER);
        tx.send(RenderEvent::Started).await.unwrap();
        tx.send(RenderEvent::Fragment("half".into())).await.unwrap();
        drop(tx);

        let outcome = Renderer::new(&mut view).run(rx).await;
        assert_eq!(outcome.status, Status::Error);
        assert_eq!(outcome.transcript, "half");
        assert!(outcome.error.is_some());
        assert_eq!(outcome.error_kind, Some(ErrorKind::Stream));
    }

    #[test]
    fn test_state_machine_transitions() {
        use Status::*;
        assert!(Idle.can_advance(Validating));
        assert!(Validating.can_advance(Idle));
        assert!(Validating.can_advance(Streaming));
        assert!(Streaming.can_advance(Done));
        assert!(Streaming.can_advance(Error));
        assert!(Done.can_advance(Idle));
        assert!(Error.can_advance(Idle));

        assert!(!Idle.can_advance(Streaming));
        assert!(!Done.can_advance(Streaming));
        assert!(!Error.can_advance(Streaming));
        assert!(!Validating.can_advance(Done));
    }
}
