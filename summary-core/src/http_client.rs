use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use futures_util::stream::Stream;
use reqwest::header::{CONTENT_TYPE, HeaderMap};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::HttpCfg;
use crate::error::{CoreResult, SummaryError};

/// Request context carries tracing IDs.
#[derive(Clone, Copy, Default)]
pub struct RequestCtx<'a> {
    pub request_id: Option<&'a str>,
}

/// Represents a single Server-Sent-Event line (already split on `\n`).
#[derive(Debug, Clone)]
pub struct SseLine {
    pub line: String,
}

/// A boxed stream of `SseLine` results.
pub type SseStream = Pin<Box<dyn Stream<Item = CoreResult<SseLine>> + Send>>;

type ByteStream = Pin<Box<dyn Stream<Item = Result<bytes::Bytes, reqwest::Error>> + Send>>;

/// Thin wrapper around reqwest::Client with defaults and helpers.
#[derive(Debug, Clone)]
pub struct HttpClient {
    inner: Client,
    user_agent: String,
}

impl HttpClient {
    pub fn new_default() -> CoreResult<Self> {
        Self::from_cfg(&HttpCfg::default())
    }

    pub fn from_cfg(cfg: &HttpCfg) -> CoreResult<Self> {
        let mut builder =
            Client::builder().connect_timeout(Duration::from_millis(cfg.connect_timeout_ms));
        // Streams stay open for as long as the model writes; only bound them when asked to.
        if let Some(ms) = cfg.request_timeout_ms {
            builder = builder.timeout(Duration::from_millis(ms));
        }
        if let Some(n) = cfg.pool_max_idle_per_host {
            builder = builder.pool_max_idle_per_host(n);
        }
        let inner = builder
            .build()
            .map_err(|e| SummaryError::Other(anyhow::anyhow!("http client build failed: {e}")))?;
        Ok(Self {
            inner,
            user_agent: concat!("summary-core/", env!("CARGO_PKG_VERSION")).to_string(),
        })
    }

    /// POST JSON and return an SSE (Server-Sent Events) line stream.
    /// Each yielded item is one raw line (terminator stripped, no trimming) from the body.
    pub async fn post_sse_lines<T: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &T,
        headers: &[(&str, &str)],
        ctx: &RequestCtx<'_>,
    ) -> CoreResult<SseStream> {
        let mut req = self
            .inner
            .post(url)
            .json(body)
            .header("User-Agent", &self.user_agent)
            .header("Accept", "text/event-stream");

        for (k, v) in headers {
            req = req.header(*k, *v);
        }
        if let Some(rid) = ctx.request_id {
            req = req.header("X-Request-Id", rid);
        }

        let resp = req.send().await.map_err(|e| {
            warn!(error = %e, "summary request failed to connect");
            SummaryError::unavailable(None)
        })?;

        let status = resp.status();
        if !status.is_success() {
            let headers = resp.headers().clone();
            let ra = parse_retry_after(&headers);
            let body = resp.text().await.unwrap_or_default();
            return Err(map_http_error(status, ra, &body));
        }
        if status == StatusCode::NO_CONTENT || resp.content_length() == Some(0) {
            return Err(SummaryError::Transport {
                status: Some(status.as_u16()),
                message: "summary service returned an empty response".into(),
            });
        }
        if let Some(ct) = resp.headers().get(CONTENT_TYPE).and_then(|v| v.to_str().ok())
            && !ct.starts_with("text/event-stream")
        {
            warn!(content_type = ct, "summary response is not an event stream; reading anyway");
        }

        let line_stream = LineStream::new(Box::pin(resp.bytes_stream()));
        Ok(Box::pin(line_stream))
    }
}

fn parse_retry_after(headers: &HeaderMap) -> Option<u64> {
    if let Some(v) = headers.get("retry-after")
        && let Ok(s) = v.to_str()
        && let Ok(secs) = s.trim().parse::<u64>()
    {
        return Some(secs);
    }
    // HTTP-date forms are ignored.
    None
}

/// Error body shapes the platform API answers with.
#[derive(Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    message: Option<serde_json::Value>,
    #[serde(default)]
    msg: Option<String>,
}

fn envelope_message(body: &str) -> Option<String> {
    let env: ErrorEnvelope = serde_json::from_str(body).ok()?;
    let from_message = match env.message {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Array(items)) => {
            let parts: Vec<&str> = items.iter().filter_map(|v| v.as_str()).collect();
            (!parts.is_empty()).then(|| parts.join("; "))
        }
        _ => None,
    };
    from_message.or(env.msg).filter(|m| !m.trim().is_empty())
}

fn map_http_error(status: StatusCode, retry_after: Option<u64>, body: &str) -> SummaryError {
    match status {
        StatusCode::TOO_MANY_REQUESTS => SummaryError::RateLimited { retry_after },
        s if s.is_server_error() => SummaryError::unavailable(Some(s.as_u16())),
        s => {
            let detail = envelope_message(body).unwrap_or_else(|| truncate(body, 300));
            let message = if detail.is_empty() {
                format!("summary request rejected with status {}", s.as_u16())
            } else {
                format!("summary request rejected with status {}: {detail}", s.as_u16())
            };
            SummaryError::Transport {
                status: Some(s.as_u16()),
                message,
            }
        }
    }
}

fn truncate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => {
            let mut t = s[..idx].to_string();
            t.push_str("...");
            t
        }
        None => s.to_string(),
    }
}

/// Internal line splitter over a bytes stream; yields `SseLine`s separated by '\n'.
///
/// Bytes are buffered until a full line is present so multi-byte characters split
/// across network chunks decode intact.
struct LineStream {
    inner: ByteStream,
    buf: Vec<u8>,
    // bytes of `buf` already known to hold no '\n'
    scanned: usize,
    flushed_tail: bool,
}

impl LineStream {
    fn new(inner: ByteStream) -> Self {
        Self {
            inner,
            buf: Vec::new(),
            scanned: 0,
            flushed_tail: false,
        }
    }
}

fn decode_line(mut raw: Vec<u8>) -> SseLine {
    if raw.last() == Some(&b'\n') {
        raw.pop();
    }
    if raw.last() == Some(&b'\r') {
        raw.pop();
    }
    SseLine {
        line: String::from_utf8_lossy(&raw).into_owned(),
    }
}

impl Stream for LineStream {
    type Item = CoreResult<SseLine>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            // If we already have a newline in the buffer, split and yield immediately.
            let from = self.scanned;
            if let Some(pos) = self.buf[from..].iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = self.buf.drain(..=from + pos).collect();
                self.scanned = 0;
                return Poll::Ready(Some(Ok(decode_line(line))));
            }
            self.scanned = self.buf.len();

            // Otherwise, poll the inner stream for more bytes
            match self.inner.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(chunk))) => {
                    self.buf.extend_from_slice(&chunk);
                    continue;
                }
                Poll::Ready(Some(Err(e))) => {
                    return Poll::Ready(Some(Err(SummaryError::StreamRead(e.to_string()))));
                }
                Poll::Ready(None) => {
                    if !self.flushed_tail && !self.buf.is_empty() {
                        self.flushed_tail = true;
                        let line = std::mem::take(&mut self.buf);
                        return Poll::Ready(Some(Ok(decode_line(line))));
                    } else {
                        return Poll::Ready(None);
                    }
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
