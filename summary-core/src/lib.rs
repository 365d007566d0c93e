pub mod client;
pub mod config;
pub mod error;
pub mod http_client;
pub mod model;
pub mod normalizer;
pub mod sse;
pub mod stream;
pub mod telemetry;
pub mod transport;
#[cfg(test)]
pub mod test_util;

pub use client::{SessionWatch, SummaryClient};
pub use error::{CoreResult, SummaryError};
pub use model::{Channel, Language, Phase, SummaryRequest, SummarySession};
