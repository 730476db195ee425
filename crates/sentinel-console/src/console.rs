//! Console view-model.
//!
//! [`ConsoleState`] holds the editable form (prompt, session, policy) and a
//! projection of the two remote calls. Every transition is an explicit
//! method; [`Console`] drives those transitions against an
//! [`InferenceBackend`].
//!
//! Each call carries a generation ticket. Starting a new inference or
//! secret fetch bumps the generation, and a completion holding an older
//! ticket is dropped, so the latest request always wins.

use std::sync::Arc;

use chrono::Utc;
use sentinel_client::{
    InferenceBackend, InferenceRequest, InferenceResult, Policy, SecretMapping, TokenHolder,
};
use tracing::{debug, warn};

/// Lifecycle of one remote call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Status {
    /// Never started, or invalidated.
    #[default]
    Idle,
    /// Request in flight.
    Loading,
    /// Last request succeeded.
    Succeeded,
    /// Last request failed; terminal until the next trigger.
    Failed,
}

/// Cached data, loading flag and error of one remote call.
#[derive(Debug, Clone)]
pub struct Projection<T> {
    status: Status,
    data: Option<T>,
    error: Option<String>,
    generation: u64,
}

impl<T> Default for Projection<T> {
    fn default() -> Self {
        Self {
            status: Status::Idle,
            data: None,
            error: None,
            generation: 0,
        }
    }
}

impl<T> Projection<T> {
    pub fn status(&self) -> Status {
        self.status
    }

    pub fn data(&self) -> Option<&T> {
        self.data.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_loading(&self) -> bool {
        self.status == Status::Loading
    }

    fn start(&mut self) -> u64 {
        self.generation += 1;
        self.status = Status::Loading;
        self.error = None;
        self.generation
    }

    /// Drop cached data and orphan any in-flight request.
    fn invalidate(&mut self) {
        self.generation += 1;
        self.status = Status::Idle;
        self.data = None;
        self.error = None;
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation == generation
    }
}

/// Severity of a [`Notice`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// A transient message for the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub title: String,
    pub description: Option<String>,
}

impl Notice {
    fn new(level: NoticeLevel, title: &str, description: Option<String>) -> Self {
        Self {
            level,
            title: title.to_owned(),
            description,
        }
    }

    pub fn prompt_required() -> Self {
        Self::new(NoticeLevel::Info, "Prompt required", None)
    }

    pub fn leak_detected() -> Self {
        Self::new(
            NoticeLevel::Warning,
            "Leak detected",
            Some("Response sanitized. Review audit log.".to_owned()),
        )
    }

    pub fn request_failed(error: &str) -> Self {
        Self::new(NoticeLevel::Error, "Request failed", Some(error.to_owned()))
    }
}

/// Proof that an inference was started; hand it back on completion.
#[derive(Debug, Clone)]
pub struct InferenceTicket {
    generation: u64,
    pub request: InferenceRequest,
}

/// Proof that a secret fetch was started for `secret_id`.
#[derive(Debug, Clone)]
pub struct SecretTicket {
    generation: u64,
    pub secret_id: String,
}

/// Effects of completing an inference.
#[derive(Debug, Default)]
pub struct InferenceOutcome {
    pub notices: Vec<Notice>,
    /// Set when the result carried a secret id; fetch exactly this once.
    pub fetch: Option<SecretTicket>,
    /// True when the completion belonged to a superseded request.
    pub stale: bool,
}

/// New session id of the form `session-<unix millis>`.
pub fn new_session_id() -> String {
    format!("session-{}", Utc::now().timestamp_millis())
}

/// Form fields plus projections of the inference and secret calls.
#[derive(Debug, Clone)]
pub struct ConsoleState {
    prompt: String,
    session_id: String,
    policy: Policy,
    latest_secret_id: Option<String>,
    inference: Projection<InferenceResult>,
    secret: Projection<SecretMapping>,
}

impl Default for ConsoleState {
    fn default() -> Self {
        Self::new(new_session_id(), Policy::Default)
    }
}

impl ConsoleState {
    pub fn new(session_id: String, policy: Policy) -> Self {
        Self {
            prompt: String::new(),
            session_id,
            policy,
            latest_secret_id: None,
            inference: Projection::default(),
            secret: Projection::default(),
        }
    }

    // ── Form fields ──────────────────────────────────────────────────

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn set_prompt(&mut self, prompt: impl Into<String>) {
        self.prompt = prompt.into();
    }

    /// Append a line to the prompt buffer.
    pub fn push_prompt_line(&mut self, line: &str) {
        if !self.prompt.is_empty() {
            self.prompt.push('\n');
        }
        self.prompt.push_str(line);
    }

    pub fn clear_prompt(&mut self) {
        self.prompt.clear();
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn set_session_id(&mut self, session_id: impl Into<String>) {
        self.session_id = session_id.into();
    }

    /// Replace the session id with a freshly seeded one.
    pub fn new_session(&mut self) -> &str {
        self.session_id = new_session_id();
        &self.session_id
    }

    pub fn policy(&self) -> Policy {
        self.policy
    }

    pub fn set_policy(&mut self, policy: Policy) {
        self.policy = policy;
    }

    // ── Projections ──────────────────────────────────────────────────

    pub fn inference(&self) -> &Projection<InferenceResult> {
        &self.inference
    }

    pub fn secret(&self) -> &Projection<SecretMapping> {
        &self.secret
    }

    pub fn latest_secret_id(&self) -> Option<&str> {
        self.latest_secret_id.as_deref()
    }

    // ── Transitions ──────────────────────────────────────────────────

    /// Start an inference from the current form.
    ///
    /// # Errors
    ///
    /// Returns the "Prompt required" notice, without touching any state,
    /// when the prompt is empty or whitespace-only.
    pub fn begin_inference(&mut self) -> Result<InferenceTicket, Notice> {
        if self.prompt.trim().is_empty() {
            return Err(Notice::prompt_required());
        }
        let request = InferenceRequest {
            session_id: self.session_id.clone(),
            input_text: self.prompt.clone(),
            policy: self.policy,
        };
        let generation = self.inference.start();
        Ok(InferenceTicket {
            generation,
            request,
        })
    }

    /// Apply the result of the inference started with `ticket`.
    ///
    /// On success the cached secret mapping is discarded and, when the
    /// result carries a secret id, a fetch is started for it.
    pub fn complete_inference(
        &mut self,
        ticket: InferenceTicket,
        outcome: Result<InferenceResult, String>,
    ) -> InferenceOutcome {
        if !self.inference.is_current(ticket.generation) {
            debug!(generation = ticket.generation, "dropping stale inference completion");
            return InferenceOutcome {
                stale: true,
                ..Default::default()
            };
        }

        match outcome {
            Ok(result) => {
                let mut notices = Vec::new();
                if result.leak_detected {
                    notices.push(Notice::leak_detected());
                }

                self.secret.invalidate();
                self.latest_secret_id = result.secret_id.clone().filter(|id| !id.is_empty());
                let fetch = self.latest_secret_id.clone().map(|secret_id| SecretTicket {
                    generation: self.secret.start(),
                    secret_id,
                });

                self.inference.status = Status::Succeeded;
                self.inference.data = Some(result);
                InferenceOutcome {
                    notices,
                    fetch,
                    stale: false,
                }
            }
            Err(error) => {
                self.inference.status = Status::Failed;
                let notice = Notice::request_failed(&error);
                self.inference.error = Some(error);
                InferenceOutcome {
                    notices: vec![notice],
                    fetch: None,
                    stale: false,
                }
            }
        }
    }

    /// Apply the result of the secret fetch started with `ticket`.
    ///
    /// Returns `false` if the ticket was superseded and nothing changed.
    pub fn complete_secret(
        &mut self,
        ticket: SecretTicket,
        outcome: Result<SecretMapping, String>,
    ) -> bool {
        if !self.secret.is_current(ticket.generation) {
            debug!(secret_id = %ticket.secret_id, "dropping stale secret completion");
            return false;
        }
        match outcome {
            Ok(mapping) => {
                self.secret.status = Status::Succeeded;
                self.secret.data = Some(mapping);
            }
            Err(error) => {
                warn!(secret_id = %ticket.secret_id, %error, "secret fetch failed");
                self.secret.status = Status::Failed;
                self.secret.data = None;
                self.secret.error = Some(error);
            }
        }
        true
    }
}

/// A console bound to a backend and a token holder.
pub struct Console {
    backend: Arc<dyn InferenceBackend>,
    tokens: TokenHolder,
    state: ConsoleState,
}

impl Console {
    pub fn new(
        backend: Arc<dyn InferenceBackend>,
        tokens: TokenHolder,
        state: ConsoleState,
    ) -> Self {
        Self {
            backend,
            tokens,
            state,
        }
    }

    pub fn state(&self) -> &ConsoleState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut ConsoleState {
        &mut self.state
    }

    pub fn tokens(&self) -> &TokenHolder {
        &self.tokens
    }

    /// Submit the current prompt and, if a secret id comes back, fetch its
    /// mapping once. Returns the notices to show.
    pub async fn submit(&mut self) -> Vec<Notice> {
        let ticket = match self.state.begin_inference() {
            Ok(ticket) => ticket,
            Err(notice) => return vec![notice],
        };

        let result = self
            .backend
            .run_inference(&ticket.request)
            .await
            .map_err(|e| e.to_string());
        let outcome = self.state.complete_inference(ticket, result);
        if outcome.stale {
            return Vec::new();
        }

        if let Some(fetch) = outcome.fetch {
            let mapping = self
                .backend
                .fetch_secret(&fetch.secret_id)
                .await
                .map_err(|e| e.to_string());
            self.state.complete_secret(fetch, mapping);
        }
        outcome.notices
    }
}
