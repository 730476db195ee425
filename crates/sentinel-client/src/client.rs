//! `Sentinel` client implementation.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::auth::TokenSource;
use crate::backend::InferenceBackend;
use crate::error::SentinelError;
use crate::transport::Transport;
use crate::types::{HealthBody, HealthStatus, InferenceRequest, InferenceResult, SecretMapping};
use crate::{DEFAULT_BASE_URL, DEFAULT_USER_AGENT, Sentinel, SentinelConfig};

impl Sentinel {
    /// Create a client for `base_url` with a fixed token source.
    ///
    /// # Errors
    ///
    /// Returns `SentinelError::Config` if `base_url` is not a valid URL.
    pub fn new(
        base_url: impl Into<String>,
        tokens: impl TokenSource + 'static,
    ) -> Result<Self, SentinelError> {
        Self::with_config(
            SentinelConfig {
                base_url: base_url.into(),
                ..Default::default()
            },
            tokens,
        )
    }

    /// Create a client with full configuration.
    ///
    /// `tokens` is consulted on every request; pass a
    /// [`crate::TokenHolder`] clone to change credentials later.
    ///
    /// # Errors
    ///
    /// Returns `SentinelError::Config` if the base URL does not parse, or
    /// `SentinelError::Network` if the HTTP client cannot be built.
    #[allow(clippy::needless_pass_by_value)]
    pub fn with_config(
        cfg: SentinelConfig,
        tokens: impl TokenSource + 'static,
    ) -> Result<Self, SentinelError> {
        let base_url = first_non_empty(&[
            &cfg.base_url,
            &std::env::var("SENTINEL_API_URL").unwrap_or_default(),
            DEFAULT_BASE_URL,
        ])
        .trim_end_matches('/')
        .to_owned();

        let parsed = reqwest::Url::parse(&base_url)
            .map_err(|e| SentinelError::Config(format!("invalid base URL \"{base_url}\": {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(SentinelError::Config(format!(
                "unsupported URL scheme \"{}\", expected http or https",
                parsed.scheme()
            )));
        }

        let user_agent = first_non_empty(&[&cfg.user_agent, DEFAULT_USER_AGENT]);

        let mut builder = reqwest::Client::builder().user_agent(user_agent);
        if let Some(timeout) = cfg.timeout.filter(|t| !t.is_zero()) {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(SentinelError::Network)?;

        debug!(%base_url, timeout = ?cfg.timeout, "sentinel client configured");

        Ok(Self {
            transport: Transport::new(http, base_url, Arc::new(tokens)),
        })
    }

    /// API root this client talks to.
    pub fn base_url(&self) -> &str {
        self.transport.base_url()
    }

    /// Submit a prompt for guarded inference.
    ///
    /// The caller is responsible for rejecting empty prompts; the request is
    /// forwarded as-is and never retried.
    ///
    /// # Errors
    ///
    /// Returns any transport or HTTP error unchanged.
    pub async fn run_inference(
        &self,
        request: &InferenceRequest,
    ) -> Result<InferenceResult, SentinelError> {
        let body = serde_json::to_value(request)?;
        let result: InferenceResult = self
            .transport
            .post("/v1/inference", body, "inference")
            .await?;

        info!(
            session_id = %request.session_id,
            policy = %request.policy,
            leak_detected = result.leak_detected,
            secret_id = result.secret_id.as_deref().unwrap_or("-"),
            "inference completed"
        );
        Ok(result)
    }

    /// Fetch the token mapping stored under `secret_id`.
    ///
    /// # Errors
    ///
    /// Returns `SentinelError::NotFound` if the id is unknown to the vault,
    /// `SentinelError::Auth` if the token lacks the view scope.
    pub async fn fetch_secret(&self, secret_id: &str) -> Result<SecretMapping, SentinelError> {
        let path = format!("/v1/secret/{}", urlencoding::encode(secret_id));
        let mapping: SecretMapping = self.transport.get(&path, secret_id).await?;
        debug!(secret_id, tokens = mapping.mapping.len(), "secret mapping fetched");
        Ok(mapping)
    }

    /// Check whether the API is reachable.
    pub async fn health(&self) -> HealthStatus {
        let start = Instant::now();
        let outcome = self.transport.get::<HealthBody>("/healthz", "healthz").await;
        let latency_ms = start.elapsed().as_millis();

        match outcome {
            Ok(body) => HealthStatus {
                ok: true,
                latency_ms,
                detail: body.status.unwrap_or_else(|| "ok".to_owned()),
            },
            Err(e) => HealthStatus {
                ok: false,
                latency_ms,
                detail: e.to_string(),
            },
        }
    }
}

#[async_trait]
impl InferenceBackend for Sentinel {
    async fn run_inference(
        &self,
        request: &InferenceRequest,
    ) -> Result<InferenceResult, SentinelError> {
        Sentinel::run_inference(self, request).await
    }

    async fn fetch_secret(&self, secret_id: &str) -> Result<SecretMapping, SentinelError> {
        Sentinel::fetch_secret(self, secret_id).await
    }
}

fn first_non_empty(vals: &[&str]) -> String {
    vals.iter()
        .find(|v| !v.is_empty())
        .map(|v| (*v).to_owned())
        .unwrap_or_default()
}
