//! Terminal rendering of console state.
//!
//! Everything here returns a `String`; callers decide where it goes.

use std::fmt::Write as _;

use chrono::Local;
use sentinel_client::{HealthStatus, Policy, SecretMapping};

use crate::console::{ConsoleState, Notice, NoticeLevel, Status};

/// ANSI escape sequences, or empty strings when colour is off.
#[derive(Debug, Clone, Copy)]
pub struct Theme {
    reset: &'static str,
    bold: &'static str,
    dim: &'static str,
    red: &'static str,
    green: &'static str,
    yellow: &'static str,
    cyan: &'static str,
    white: &'static str,
}

impl Theme {
    pub const fn ansi() -> Self {
        Self {
            reset: "\x1b[0m",
            bold: "\x1b[1m",
            dim: "\x1b[2m",
            red: "\x1b[31m",
            green: "\x1b[32m",
            yellow: "\x1b[33m",
            cyan: "\x1b[36m",
            white: "\x1b[37m",
        }
    }

    pub const fn plain() -> Self {
        Self {
            reset: "",
            bold: "",
            dim: "",
            red: "",
            green: "",
            yellow: "",
            cyan: "",
            white: "",
        }
    }

    pub const fn new(color: bool) -> Self {
        if color { Self::ansi() } else { Self::plain() }
    }
}

const RULE: &str = "─────────────────────────────────────────";
const SHORT_RULE: &str = "────────────────────";

pub const NO_RESULT: &str = "Run an inference to view sanitized output.";
pub const NO_MAPPING: &str = "No token mapping retrieved for this session.";
pub const LEAK_ALERT: &str = "Sensitive content detected in model output. Disclosure prevented.";

fn header(out: &mut String, t: &Theme, icon: &str, title: &str) {
    let _ = writeln!(out, "{}{}{icon} {title}{}", t.bold, t.cyan, t.reset);
    let _ = writeln!(out, "{}{RULE}{}", t.dim, t.reset);
}

fn kv_line(out: &mut String, t: &Theme, key: &str, value: &str) {
    let _ = writeln!(out, "  {}{key:<16}{} {}{value}{}", t.dim, t.reset, t.white, t.reset);
}

/// A fatal error line for stderr.
pub fn error_line(t: &Theme, message: &str) -> String {
    format!("{}{}✗ Error:{} {message}", t.red, t.bold, t.reset)
}

/// One notice, toast-style.
pub fn notice(t: &Theme, notice: &Notice) -> String {
    let (color, icon) = match notice.level {
        NoticeLevel::Info => (t.cyan, "ℹ"),
        NoticeLevel::Warning => (t.yellow, "⚠"),
        NoticeLevel::Error => (t.red, "✗"),
    };
    let mut out = format!("{color}{}{icon} {}{}", t.bold, notice.title, t.reset);
    if let Some(desc) = &notice.description {
        let _ = write!(out, " {color}{desc}{}", t.reset);
    }
    out.push('\n');
    out
}

/// Session, policy and token summary.
pub fn form(t: &Theme, state: &ConsoleState, token_set: bool) -> String {
    let mut out = String::new();
    header(&mut out, t, "⟐", "Secure Prompt Console");
    kv_line(&mut out, t, "Session ID", state.session_id());
    let policy = state.policy();
    kv_line(
        &mut out,
        t,
        "Policy",
        &format!("{} ({})", policy.as_str(), policy.label()),
    );
    kv_line(&mut out, t, "Token", if token_set { "set" } else { "none" });
    kv_line(&mut out, t, "Last secret", state.latest_secret_id().unwrap_or("-"));
    let lines = state.prompt().lines().count();
    kv_line(
        &mut out,
        t,
        "Prompt",
        &format!("{lines} line(s), {} chars", state.prompt().chars().count()),
    );
    out
}

/// The sanitized response panel.
pub fn response_panel(t: &Theme, state: &ConsoleState) -> String {
    let mut out = String::new();
    header(&mut out, t, "◆", "Sanitized response");
    let projection = state.inference();

    if projection.is_loading() {
        let _ = writeln!(out, "  {}Submitting...{}", t.dim, t.reset);
    }
    if projection.status() == Status::Failed {
        if let Some(error) = projection.error() {
            let _ = writeln!(out, "  {}Last request failed: {error}{}", t.red, t.reset);
        }
    }

    match projection.data() {
        Some(result) => {
            if result.leak_detected {
                let _ = writeln!(out, "  {}{}⚠ {LEAK_ALERT}{}", t.yellow, t.bold, t.reset);
            }
            for line in result.response.lines() {
                let _ = writeln!(out, "  {line}");
            }
            let _ = writeln!(out, "  {}{}{}", t.dim, SHORT_RULE, t.reset);
            let secret = result.secret_id.as_deref().unwrap_or("None");
            let _ = writeln!(out, "  {}Secret ID: {secret}{}", t.dim, t.reset);
        }
        None if !projection.is_loading() => {
            let _ = writeln!(out, "  {}{NO_RESULT}{}", t.dim, t.reset);
        }
        None => {}
    }
    out
}

/// `token → synthetic`, one per line, in token order.
pub fn mapping_preview(mapping: &SecretMapping) -> String {
    mapping
        .mapping
        .iter()
        .map(|(token, entry)| format!("{token} → {}", entry.synthetic))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Details of one vault entry.
pub fn mapping_details(t: &Theme, mapping: &SecretMapping) -> String {
    let mut out = String::new();
    let created = mapping
        .created_at
        .with_timezone(&Local)
        .format("%Y-%m-%d %H:%M:%S %Z")
        .to_string();
    kv_line(&mut out, t, "Secret ID", &mapping.secret_id);
    kv_line(&mut out, t, "Session ID", &mapping.session_id);
    kv_line(&mut out, t, "Owner", &mapping.owner_id);
    kv_line(&mut out, t, "Created", &created);
    let labels = mapping.labels();
    let labels = if labels.is_empty() {
        "-".to_owned()
    } else {
        labels.join(", ")
    };
    kv_line(&mut out, t, "Detected labels", &labels);
    let _ = writeln!(out);
    for line in mapping_preview(mapping).lines() {
        let _ = writeln!(out, "  {}{line}{}", t.green, t.reset);
    }
    out
}

/// The token vault panel.
pub fn vault_panel(t: &Theme, state: &ConsoleState) -> String {
    let mut out = String::new();
    header(&mut out, t, "🔑", "Token vault snapshot");
    let projection = state.secret();

    if projection.is_loading() {
        let _ = writeln!(out, "  {}Fetching token mapping...{}", t.dim, t.reset);
        return out;
    }
    match projection.data() {
        Some(mapping) => out.push_str(&mapping_details(t, mapping)),
        None => {
            let _ = writeln!(out, "  {}{NO_MAPPING}{}", t.dim, t.reset);
            if let Some(error) = projection.error() {
                let _ = writeln!(out, "  {}({error}){}", t.dim, t.reset);
            }
        }
    }
    out
}

/// Result of a health probe.
pub fn health(t: &Theme, base_url: &str, status: &HealthStatus) -> String {
    let mut out = String::new();
    header(&mut out, t, "♥", "Backend health");
    kv_line(&mut out, t, "API", base_url);
    let verdict = if status.ok {
        format!("{}{}✓ reachable{}", t.green, t.bold, t.reset)
    } else {
        format!("{}{}✗ unreachable{}", t.red, t.bold, t.reset)
    };
    kv_line(&mut out, t, "Status", &verdict);
    kv_line(&mut out, t, "Detail", &status.detail);
    kv_line(&mut out, t, "Latency", &format!("{}ms", status.latency_ms));
    out
}

/// Interactive help text.
pub fn help(t: &Theme) -> String {
    let mut out = String::new();
    header(&mut out, t, "?", "Commands");
    let rows = [
        (":send [text]", "submit the prompt buffer (or text)"),
        (":token [value]", "set the bearer token; no value clears it"),
        (":session [id]", "show or set the session id"),
        (":new-session", "start a fresh session id"),
        (":policy <name>", "choose a leak policy"),
        (":clear", "empty the prompt buffer"),
        (":show", "show form, response and vault panels"),
        (":help", "this help"),
        (":quit", "leave the console"),
    ];
    for (cmd, what) in rows {
        kv_line(&mut out, t, cmd, what);
    }
    let _ = writeln!(out, "  {}Policies:{}", t.dim, t.reset);
    for policy in Policy::ALL {
        let _ = writeln!(out, "    {:<16} {}", policy.as_str(), policy.label());
    }
    let _ = writeln!(
        out,
        "  {}Any other line is appended to the prompt buffer.{}",
        t.dim, t.reset
    );
    out
}
