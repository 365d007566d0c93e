//! Telemetry primitives for summary sessions.
//! Nothing is emitted unless a sink is attached to the client with
//! `SummaryClient::with_telemetry`.

pub mod keys;
pub mod types;

pub use keys::*;
pub use types::*;

/// Implement this to receive one `SessionTrace` per finished session.
///
/// Requirements:
/// - Implementations must be thread-safe (`Send + Sync`) and `'static`;
///   `record` is called from the session's read task.
/// - `record` should not panic or block.
pub trait TelemetrySink: Send + Sync + 'static {
    fn record(&self, trace: SessionTrace);
}

#[cfg(test)]
pub(crate) mod capture {
    use std::sync::Arc;

    use tokio::sync::{Mutex, mpsc};

    use super::{SessionTrace, TelemetrySink};

    /// Hands recorded traces to the test, in order.
    #[derive(Clone)]
    pub struct CaptureSink {
        tx: mpsc::UnboundedSender<SessionTrace>,
        rx: Arc<Mutex<mpsc::UnboundedReceiver<SessionTrace>>>,
    }

    impl Default for CaptureSink {
        fn default() -> Self {
            let (tx, rx) = mpsc::unbounded_channel();
            Self {
                tx,
                rx: Arc::new(Mutex::new(rx)),
            }
        }
    }

    impl CaptureSink {
        pub async fn next(&self) -> SessionTrace {
            self.rx.lock().await.recv().await.expect("sink kept alive by self")
        }
    }

    impl TelemetrySink for CaptureSink {
        fn record(&self, trace: SessionTrace) {
            let _ = self.tx.send(trace);
        }
    }
}
