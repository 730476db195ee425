//! The seam between the console and the network.

use async_trait::async_trait;

use crate::error::SentinelError;
use crate::types::{InferenceRequest, InferenceResult, SecretMapping};

/// The two calls a console issues against the guard.
///
/// Implemented by [`crate::Sentinel`]; tests substitute an in-memory fake.
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    /// Submit a prompt and return the sanitized result.
    async fn run_inference(
        &self,
        request: &InferenceRequest,
    ) -> Result<InferenceResult, SentinelError>;

    /// Fetch the vault entry for `secret_id`.
    async fn fetch_secret(&self, secret_id: &str) -> Result<SecretMapping, SentinelError>;
}
