//! In-memory transport for driving sessions line by line in tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::{CoreResult, SummaryError};
use crate::http_client::{RequestCtx, SseLine, SseStream};
use crate::model::SummaryRequest;
use crate::transport::SummaryTransport;

type LineItem = CoreResult<SseLine>;

/// What the next `open` call does.
pub enum Script {
    Fail(SummaryError),
    Lines(mpsc::UnboundedReceiver<LineItem>),
    /// Never connects; only cancellation ends the session.
    Hang,
}

/// Test-side handle pushing lines into an open stream.
pub struct LineFeed {
    tx: mpsc::UnboundedSender<LineItem>,
}

impl LineFeed {
    pub fn line(&self, line: &str) {
        let _ = self.tx.send(Ok(SseLine {
            line: line.to_string(),
        }));
    }

    pub fn data(&self, payload: &str) {
        self.line(&format!("data: {payload}"));
        self.line("");
    }

    pub fn event(&self, channel: &str, payload: &str) {
        self.line(&format!("event: {channel}"));
        self.data(payload);
    }

    pub fn json(&self, channel: &str, text: &str) {
        let payload = serde_json::json!({ "event": channel, "data": text });
        self.data(&payload.to_string());
    }

    pub fn done(&self) {
        self.data("[DONE]");
    }

    pub fn fail(&self, msg: &str) {
        let _ = self.tx.send(Err(SummaryError::StreamRead(msg.to_string())));
    }

    /// Resolves once the client dropped its end of the stream.
    pub async fn closed(&self) {
        self.tx.closed().await
    }
}

pub fn feed() -> (LineFeed, Script) {
    let (tx, rx) = mpsc::unbounded_channel();
    (LineFeed { tx }, Script::Lines(rx))
}

/// Serves queued scripts, one per `open` call, and remembers what was requested.
#[derive(Default)]
pub struct ScriptedTransport {
    scripts: Mutex<VecDeque<Script>>,
    pub opened: Mutex<Vec<SummaryRequest>>,
}

impl ScriptedTransport {
    pub fn new(scripts: impl IntoIterator<Item = Script>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into_iter().collect()),
            opened: Mutex::default(),
        }
    }

    pub fn opened(&self) -> Vec<SummaryRequest> {
        self.opened.lock().unwrap().clone()
    }
}

#[async_trait]
impl SummaryTransport for ScriptedTransport {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn open(&self, req: &SummaryRequest, _ctx: &RequestCtx<'_>) -> CoreResult<SseStream> {
        self.opened.lock().unwrap().push(req.clone());
        let script = self.scripts.lock().unwrap().pop_front();
        match script {
            Some(Script::Fail(e)) => Err(e),
            Some(Script::Lines(mut rx)) => Ok(Box::pin(futures::stream::poll_fn(move |cx| {
                rx.poll_recv(cx)
            }))),
            Some(Script::Hang) => std::future::pending().await,
            None => Err(SummaryError::Transport {
                status: None,
                message: "no scripted response left".into(),
            }),
        }
    }
}
