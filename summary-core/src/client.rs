//! Session state machine for streamed summaries.
//!
//! ```text
//! Idle --start()--> Streaming
//! Streaming --[DONE] | end of stream--> Completed
//! Streaming --transport/read failure--> Errored
//! Streaming --cancel() | superseded by start()--> Cancelled
//! ```
//!
//! Each session owns its own watch channel. Every mutation is applied only
//! while the session is still `Streaming`, so a chunk racing a cancel, or
//! arriving after `[DONE]`, is dropped instead of applied.

use std::sync::Arc;

use chrono::Utc;
use futures::StreamExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn};
use tracing_futures::Instrument;

use crate::error::{CoreResult, SummaryError};
use crate::http_client::RequestCtx;
use crate::model::{Channel, Phase, SummaryRequest, SummarySession};
use crate::normalizer::normalize_request;
use crate::sse::RecordStream;
use crate::stream::{StreamEvent, decode_record};
use crate::telemetry::{SessionTrace, TelemetrySink};
use crate::transport::SummaryTransport;

type SessionState = Arc<watch::Sender<SummarySession>>;

struct ActiveSession {
    state: SessionState,
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

/// Read-only view of one session's live state.
#[derive(Clone)]
pub struct SessionWatch {
    rx: watch::Receiver<SummarySession>,
}

impl SessionWatch {
    pub fn id(&self) -> u64 {
        self.rx.borrow().id
    }

    pub fn snapshot(&self) -> SummarySession {
        self.rx.borrow().clone()
    }

    /// Waits for the next state change. Returns `false` if the session state was dropped.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }

    /// Waits until `pred` holds for the current state and returns that state.
    pub async fn wait_for(
        &mut self,
        pred: impl FnMut(&SummarySession) -> bool,
    ) -> SummarySession {
        if let Ok(s) = self.rx.wait_for(pred).await {
            return s.clone();
        }
        self.rx.borrow().clone()
    }

    /// Waits for `Completed`, `Errored` or `Cancelled`.
    pub async fn finished(&mut self) -> SummarySession {
        self.wait_for(|s| s.phase.is_terminal()).await
    }
}

/// Streams AI summaries, one session at a time.
///
/// `start` supersedes any session still streaming. Dropping the client
/// cancels its active session.
pub struct SummaryClient {
    transport: Arc<dyn SummaryTransport>,
    telemetry: Option<Arc<dyn TelemetrySink>>,
    next_id: u64,
    active: Option<ActiveSession>,
}

impl SummaryClient {
    pub fn new(transport: Arc<dyn SummaryTransport>) -> Self {
        Self {
            transport,
            telemetry: None,
            next_id: 0,
            active: None,
        }
    }

    pub fn with_telemetry(mut self, sink: Arc<dyn TelemetrySink>) -> Self {
        self.telemetry = Some(sink);
        self
    }

    /// Begin streaming a summary. Returns as soon as the read task is spawned.
    ///
    /// Fails without touching the current session if the request is invalid
    /// or no tokio runtime is running.
    pub fn start(&mut self, req: SummaryRequest) -> CoreResult<SessionWatch> {
        let req = normalize_request(req)?;
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| SummaryError::Other(anyhow::anyhow!("no tokio runtime: {e}")))?;

        self.cancel();

        self.next_id += 1;
        let id = self.next_id;
        let (tx, rx) = watch::channel(SummarySession::streaming(id));
        let state: SessionState = Arc::new(tx);
        let token = CancellationToken::new();

        let span = info_span!(
            "summary.session",
            session.id = id,
            transport = self.transport.name(),
            summary.subject = %req.subject_id,
            summary.period = req.period,
            summary.lang = %req.language,
        );
        let task = ReadTask {
            transport: self.transport.clone(),
            telemetry: self.telemetry.clone(),
            req,
            state: state.clone(),
            token: token.clone(),
        };
        let task = runtime.spawn(task.run().instrument(span));

        self.active = Some(ActiveSession {
            state,
            token,
            task: Some(task),
        });
        Ok(SessionWatch { rx })
    }

    /// Cancel the streaming session, if any. No-op in every other phase.
    pub fn cancel(&mut self) {
        let Some(active) = &self.active else {
            return;
        };
        let now = Utc::now();
        // Flip first: the read task reports whatever phase it finds after waking.
        let flipped = active.state.send_if_modified(|s| {
            if !s.is_streaming() {
                return false;
            }
            s.finish(Phase::Cancelled, now);
            true
        });
        if flipped {
            active.token.cancel();
            debug!(session.id = active.state.borrow().id, "summary session cancelled");
        }
    }

    /// Wait for the current session's read task to exit, telemetry included.
    /// Returns immediately if there is none or it was already joined.
    pub async fn join(&mut self) {
        let Some(task) = self.active.as_mut().and_then(|a| a.task.take()) else {
            return;
        };
        if let Err(e) = task.await {
            warn!(error = %e, "summary read task did not exit cleanly");
        }
    }

    /// Snapshot of the current or most recent session.
    pub fn session(&self) -> Option<SummarySession> {
        self.active.as_ref().map(|a| a.state.borrow().clone())
    }

    /// Watch handle for the current or most recent session.
    pub fn subscribe(&self) -> Option<SessionWatch> {
        self.active.as_ref().map(|a| SessionWatch {
            rx: a.state.subscribe(),
        })
    }

    pub fn is_streaming(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|a| a.state.borrow().is_streaming())
    }

    pub fn phase(&self) -> Phase {
        self.active
            .as_ref()
            .map(|a| a.state.borrow().phase)
            .unwrap_or_default()
    }
}

impl Drop for SummaryClient {
    fn drop(&mut self) {
        self.cancel();
    }
}

struct ReadTask {
    transport: Arc<dyn SummaryTransport>,
    telemetry: Option<Arc<dyn TelemetrySink>>,
    req: SummaryRequest,
    state: SessionState,
    token: CancellationToken,
}

impl ReadTask {
    async fn run(self) {
        let error_kind = self.read().await;

        let snapshot = self.state.borrow().clone();
        match snapshot.phase {
            Phase::Errored => warn!(
                error = snapshot.error_message.as_deref().unwrap_or_default(),
                content_len = snapshot.content.len(),
                "summary session failed"
            ),
            phase => info!(
                ?phase,
                content_fragments = snapshot.content_fragments,
                reasoning_fragments = snapshot.reasoning_fragments,
                "summary session finished"
            ),
        }
        if let Some(sink) = &self.telemetry {
            sink.record(
                SessionTrace::new(snapshot.id)
                    .request(&self.req)
                    .session(&snapshot)
                    .error_kind_opt(error_kind),
            );
        }
    }

    /// Drive the session to a terminal phase. Returns the error kind if it failed.
    async fn read(&self) -> Option<&'static str> {
        let rid = self.state.borrow().id.to_string();
        let ctx = RequestCtx {
            request_id: Some(&rid),
        };
        let opened = tokio::select! {
            biased;
            _ = self.token.cancelled() => return None,
            res = self.transport.open(&self.req, &ctx) => res,
        };
        let lines = match opened {
            Ok(lines) => lines,
            Err(e) => return self.fail(&e),
        };

        let mut records = RecordStream::new(lines);
        loop {
            let next = tokio::select! {
                biased;
                _ = self.token.cancelled() => return None,
                next = records.next() => next,
            };
            let record = match next {
                Some(Ok(record)) => record,
                Some(Err(e)) => return self.fail(&e),
                None => {
                    self.complete();
                    return None;
                }
            };
            match decode_record(&record) {
                None => {}
                Some(StreamEvent::Done) => {
                    self.complete();
                    return None;
                }
                Some(StreamEvent::Fragment { channel, text }) => {
                    if !self.apply(channel, &text) {
                        // cancelled between the select and the update
                        return None;
                    }
                }
            }
        }
    }

    /// Append a fragment. Returns `false` when the session already left `Streaming`.
    fn apply(&self, channel: Channel, text: &str) -> bool {
        if let Channel::Other(name) = &channel {
            debug!(channel = %name, len = text.len(), "ignoring fragment on unknown channel");
            return self.state.borrow().is_streaming();
        }
        let now = Utc::now();
        let mut streaming = true;
        self.state.send_if_modified(|s| {
            if !s.is_streaming() {
                streaming = false;
                return false;
            }
            match channel {
                Channel::Reasoning => s.push_reasoning(text, now),
                _ => s.push_content(text),
            }
            true
        });
        streaming
    }

    fn complete(&self) {
        let now = Utc::now();
        self.state.send_if_modified(|s| {
            if !s.is_streaming() {
                return false;
            }
            s.finish(Phase::Completed, now);
            true
        });
    }

    fn fail(&self, err: &SummaryError) -> Option<&'static str> {
        let now = Utc::now();
        let applied = self.state.send_if_modified(|s| {
            if !s.is_streaming() {
                return false;
            }
            s.fail(err, now);
            true
        });
        applied.then(|| err.kind())
    }
}
