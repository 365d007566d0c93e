use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use crate::config::{Config, EndpointCfg};
use crate::error::CoreResult;
use crate::http_client::{HttpClient, RequestCtx, SseStream};
use crate::model::SummaryRequest;

/// Opens the incremental response for one summary request.
///
/// The returned stream yields raw SSE lines. Dropping it must release the
/// underlying connection; that is how sessions are cancelled.
#[async_trait]
pub trait SummaryTransport: Send + Sync {
    fn name(&self) -> &str;
    async fn open(&self, req: &SummaryRequest, ctx: &RequestCtx<'_>) -> CoreResult<SseStream>;
}

/// POSTs the request to the platform API and reads its event stream.
#[derive(Debug, Clone)]
pub struct HttpSummaryTransport {
    http: HttpClient,
    url: String,
    token: Option<SecretString>,
    send_request_id: bool,
}

impl HttpSummaryTransport {
    pub fn new(http: HttpClient, endpoint: &EndpointCfg, token: Option<SecretString>) -> Self {
        Self {
            http,
            url: endpoint.url(),
            token,
            send_request_id: endpoint.request_id_header,
        }
    }

    /// Build from config, reading the bearer credential from the environment.
    pub fn from_config(cfg: &Config) -> CoreResult<Self> {
        let http = HttpClient::from_cfg(&cfg.http)?;
        Ok(Self::new(http, &cfg.endpoint, cfg.endpoint.token()))
    }

    #[cfg(test)]
    pub fn new_for_tests(server_base: &str, token: Option<&str>) -> Self {
        Self::new(
            HttpClient::new_default().unwrap(),
            &EndpointCfg::new(server_base),
            token.map(SecretString::from),
        )
    }

    fn headers(&self) -> Vec<(String, String)> {
        let mut h = Vec::new();
        if let Some(token) = &self.token {
            h.push((
                "Authorization".to_string(),
                format!("Bearer {}", token.expose_secret()),
            ));
        }
        h
    }
}

#[async_trait]
impl SummaryTransport for HttpSummaryTransport {
    fn name(&self) -> &str {
        "http"
    }

    async fn open(&self, req: &SummaryRequest, ctx: &RequestCtx<'_>) -> CoreResult<SseStream> {
        let owned_headers = self.headers();
        let hdrs: Vec<(&str, &str)> = owned_headers
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        let ctx = if self.send_request_id {
            *ctx
        } else {
            RequestCtx::default()
        };
        self.http.post_sse_lines(&self.url, req, &hdrs, &ctx).await
    }
}
