//! HTTP transport: base URL joining, bearer decoration, and response mapping.
//!
//! Every request is sent exactly once. There is no retry and no backoff;
//! failures are mapped to [`SentinelError`] and handed back to the caller.

use std::sync::Arc;

use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::auth::TokenSource;
use crate::error::SentinelError;
use crate::types::ApiErrorBody;

/// Authenticated JSON transport bound to one API base URL.
#[derive(Clone)]
pub struct Transport {
    http: reqwest::Client,
    base_url: String,
    tokens: Arc<dyn TokenSource>,
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl Transport {
    /// Wrap a prepared `reqwest` client. `base_url` must not end with `/`.
    pub fn new(http: reqwest::Client, base_url: String, tokens: Arc<dyn TokenSource>) -> Self {
        Self {
            http,
            base_url,
            tokens,
        }
    }

    /// API base URL, without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `GET {base}{path}` and decode the JSON body.
    ///
    /// `resource` names the thing being fetched and is reported in
    /// [`SentinelError::NotFound`].
    ///
    /// # Errors
    ///
    /// See [`Transport::send`].
    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        resource: &str,
    ) -> Result<T, SentinelError> {
        self.send(Method::GET, path, None, resource).await
    }

    /// `POST {base}{path}` with a JSON body and decode the JSON response.
    ///
    /// # Errors
    ///
    /// See [`Transport::send`].
    pub async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        body: serde_json::Value,
        resource: &str,
    ) -> Result<T, SentinelError> {
        self.send(Method::POST, path, Some(body), resource).await
    }

    /// Send one request and map the response.
    ///
    /// # Errors
    ///
    /// - [`SentinelError::Auth`] on 401/403
    /// - [`SentinelError::NotFound`] on 404
    /// - [`SentinelError::Api`] on any other non-success status
    /// - [`SentinelError::Timeout`] / [`SentinelError::Network`] on transport failure
    /// - [`SentinelError::Json`] if the success body does not decode
    pub async fn send<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
        resource: &str,
    ) -> Result<T, SentinelError> {
        let url = format!("{}{path}", self.base_url);
        let mut req = self.http.request(method.clone(), &url);

        // Resolved per request so that token changes apply to the next send.
        let authenticated = match self.tokens.current_token() {
            Some(token) => {
                req = req.bearer_auth(token);
                true
            }
            None => false,
        };

        if let Some(body) = body {
            req = req.json(&body);
        }

        debug!(%method, %url, authenticated, "sending request");

        let resp = req.send().await.map_err(|e| {
            if e.is_timeout() {
                SentinelError::Timeout
            } else {
                SentinelError::Network(e)
            }
        })?;

        let status = resp.status();
        debug!(%method, %url, status = status.as_u16(), "response received");

        if status.is_success() {
            let text = resp.text().await.map_err(SentinelError::Network)?;
            return serde_json::from_str(&text).map_err(SentinelError::Json);
        }

        let error_text = resp.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiErrorBody>(&error_text)
            .ok()
            .and_then(|b| b.message())
            .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));

        Err(match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => SentinelError::Auth {
                status_code: status.as_u16(),
                message,
            },
            StatusCode::NOT_FOUND => SentinelError::NotFound {
                resource: resource.to_owned(),
                message,
            },
            _ => SentinelError::Api {
                status_code: status.as_u16(),
                message,
            },
        })
    }
}
