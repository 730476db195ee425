//! Typed client for the Sentinel LLM Guard API.
//!
//! Submits prompts to the guarded inference endpoint and reads back token
//! vault entries. Credentials are resolved per request from an injected
//! [`TokenSource`], so a shared [`TokenHolder`] can be updated at any time
//! without rebuilding the client.
//!
//! # Example
//!
//! ```rust,no_run
//! use sentinel_client::{InferenceRequest, Policy, Sentinel, SentinelConfig, TokenHolder};
//!
//! # async fn example() -> Result<(), sentinel_client::SentinelError> {
//! let tokens = TokenHolder::new();
//! let client = Sentinel::with_config(SentinelConfig::default(), tokens.clone())?;
//! tokens.set(std::env::var("SENTINEL_TOKEN").unwrap_or_default());
//!
//! let result = client
//!     .run_inference(&InferenceRequest {
//!         session_id: "session-1".to_owned(),
//!         input_text: "My SSN is 123-45-6789".to_owned(),
//!         policy: Policy::Default,
//!     })
//!     .await?;
//! if let Some(secret_id) = &result.secret_id {
//!     let mapping = client.fetch_secret(secret_id).await?;
//!     println!("{} tokens replaced", mapping.mapping.len());
//! }
//! # Ok(())
//! # }
//! ```

mod auth;
mod backend;
mod client;
mod error;
mod transport;
mod types;

pub use auth::{TokenHolder, TokenSource};
pub use backend::InferenceBackend;
pub use error::SentinelError;
pub use transport::Transport;
pub use types::{
    HealthStatus, InferenceRequest, InferenceResult, Policy, SecretMapping, TokenEntry,
    UnknownPolicy,
};

use std::time::Duration;

/// Default API root when neither config nor `SENTINEL_API_URL` sets one.
///
/// This is the backend itself. Behind the web front-end's reverse proxy the
/// root is `<origin>/api` instead.
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";
const DEFAULT_USER_AGENT: &str = concat!("sentinel-client/", env!("CARGO_PKG_VERSION"));

/// Configuration for the [`Sentinel`] client.
#[derive(Debug, Clone, Default)]
pub struct SentinelConfig {
    /// API root, e.g. `https://guard.example.com/api`. Empty falls back to
    /// `SENTINEL_API_URL`, then [`DEFAULT_BASE_URL`].
    pub base_url: String,
    /// Per-request timeout. `None` applies no timeout.
    pub timeout: Option<Duration>,
    /// `User-Agent` header. Empty uses the crate default.
    pub user_agent: String,
}

/// Sentinel API client.
#[derive(Debug, Clone)]
pub struct Sentinel {
    transport: Transport,
}
