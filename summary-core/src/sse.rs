//! Groups SSE lines into records separated by a blank line.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures_util::stream::Stream;

use crate::error::CoreResult;
use crate::http_client::SseLine;

/// One blank-line-delimited SSE record. Only the fields the summary protocol uses.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseRecord {
    pub event: Option<String>,
    pub data: Option<String>,
}

impl SseRecord {
    fn is_empty(&self) -> bool {
        self.event.is_none() && self.data.is_none()
    }
}

fn field<'a>(line: &'a str, name: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(name)?.strip_prefix(':')?;
    Some(rest.strip_prefix(' ').unwrap_or(rest))
}

/// Incremental line-to-record assembler.
#[derive(Debug, Default)]
pub struct RecordAssembler {
    pending: SseRecord,
}

impl RecordAssembler {
    /// Feed one line (without its terminator). Returns a record when `line` closes one.
    pub fn push_line(&mut self, line: &str) -> Option<SseRecord> {
        if line.is_empty() {
            return self.take();
        }
        if let Some(v) = field(line, "event") {
            self.pending.event = Some(v.to_string());
        } else if let Some(v) = field(line, "data") {
            self.pending.data = Some(v.to_string());
        }
        // comments, id:, retry: and anything else are ignored
        None
    }

    /// Flush a trailing record that was not closed by a blank line.
    pub fn finish(&mut self) -> Option<SseRecord> {
        self.take()
    }

    fn take(&mut self) -> Option<SseRecord> {
        if self.pending.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.pending))
        }
    }
}

/// Adapts a stream of `SseLine`s into a stream of `SseRecord`s.
/// A line error is passed through and ends the stream.
pub struct RecordStream<S> {
    lines: S,
    assembler: RecordAssembler,
    done: bool,
}

impl<S> RecordStream<S> {
    pub fn new(lines: S) -> Self {
        Self {
            lines,
            assembler: RecordAssembler::default(),
            done: false,
        }
    }
}

impl<S> Stream for RecordStream<S>
where
    S: Stream<Item = CoreResult<SseLine>> + Unpin,
{
    type Item = CoreResult<SseRecord>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.done {
            return Poll::Ready(None);
        }
        loop {
            match Pin::new(&mut self.lines).poll_next(cx) {
                Poll::Ready(Some(Ok(SseLine { line }))) => {
                    if let Some(record) = self.assembler.push_line(&line) {
                        return Poll::Ready(Some(Ok(record)));
                    }
                }
                Poll::Ready(Some(Err(e))) => {
                    self.done = true;
                    return Poll::Ready(Some(Err(e)));
                }
                Poll::Ready(None) => {
                    self.done = true;
                    return Poll::Ready(self.assembler.finish().map(Ok));
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
