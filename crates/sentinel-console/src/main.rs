//! Sentinel console: command-line client for the Sentinel LLM Guard API.
//!
//! Submits sensitive prompts to the guarded inference endpoint, shows the
//! sanitized response, and displays the token vault mapping that records
//! which substrings were replaced by synthetic placeholders.

#![allow(clippy::print_stdout, clippy::print_stderr)]

mod console;
mod render;
mod repl;

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use sentinel_client::{
    DEFAULT_BASE_URL, InferenceBackend, Policy, Sentinel, SentinelConfig, TokenHolder,
};
use tracing::debug;

use crate::console::{Console, ConsoleState, NoticeLevel, new_session_id};
use crate::render::Theme;

// ── CLI structure ────────────────────────────────────────────────────

/// Sentinel: send sensitive prompts through the LLM guard.
#[derive(Parser)]
#[command(
    name = "sentinel",
    version,
    about = "Submit sensitive prompts, read sanitized responses, inspect the token vault",
    long_about = None,
    after_help = "Environment variables:\n  \
         SENTINEL_API_URL       API root (default: http://127.0.0.1:8000)\n  \
         SENTINEL_TOKEN         Bearer token (JWT)\n  \
         SENTINEL_LOG_LEVEL     Log filter when RUST_LOG is unset (default: warn)\n\n\
         Examples:\n  \
         sentinel infer \"My SSN is 123-45-6789\"\n  \
         sentinel infer --policy block-on-leak --session session-1 \"card 4111 1111 1111 1111\"\n  \
         sentinel secret 3f2a9c\n  \
         sentinel console"
)]
struct Cli {
    /// API root URL.
    #[arg(long, env = "SENTINEL_API_URL", default_value = DEFAULT_BASE_URL)]
    api_url: String,

    /// Bearer token sent as `Authorization: Bearer <token>`.
    #[arg(long, env = "SENTINEL_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Per-request timeout in seconds (none by default).
    #[arg(long, env = "SENTINEL_TIMEOUT_SECS")]
    timeout_secs: Option<u64>,

    /// Log filter used when `RUST_LOG` is not set.
    #[arg(long, env = "SENTINEL_LOG_LEVEL", default_value = "warn")]
    log_level: String,

    /// Emit logs as JSON.
    #[arg(long, default_value = "false")]
    log_json: bool,

    /// Disable colored output.
    #[arg(long, default_value = "false")]
    no_color: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit one prompt and print the sanitized response and vault mapping.
    Infer {
        /// The prompt text.
        prompt: String,
        /// Session id (default: a fresh `session-<millis>`).
        #[arg(long)]
        session: Option<String>,
        /// Leak policy: `default` or `block-on-leak`.
        #[arg(long, default_value = "default")]
        policy: Policy,
        /// Print raw JSON instead of panels.
        #[arg(long, default_value = "false")]
        json: bool,
    },
    /// Fetch and print one token vault entry.
    Secret {
        /// Secret id returned by a previous inference.
        id: String,
        /// Print raw JSON instead of panels.
        #[arg(long, default_value = "false")]
        json: bool,
    },
    /// Check whether the API is reachable.
    Health,
    /// Interactive console (default).
    Console {
        /// Initial session id.
        #[arg(long)]
        session: Option<String>,
        /// Initial leak policy.
        #[arg(long, default_value = "default")]
        policy: Policy,
    },
}

// ── Entry point ──────────────────────────────────────────────────────

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli.log_level, cli.log_json);

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("✗ Error: failed to start async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    let theme = Theme::new(!cli.no_color);
    let outcome = runtime.block_on(run(cli, theme));
    // The stdin reader thread may still be blocked on a read.
    runtime.shutdown_background();

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!();
            eprintln!("  {}", render::error_line(&theme, &format!("{e:#}")));
            eprintln!();
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(level: &str, json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn run(cli: Cli, theme: Theme) -> Result<()> {
    let tokens = TokenHolder::with_token(cli.token);
    let client = Sentinel::with_config(
        SentinelConfig {
            base_url: cli.api_url,
            timeout: cli.timeout_secs.map(Duration::from_secs),
            ..Default::default()
        },
        tokens.clone(),
    )
    .context("failed to configure API client")?;
    debug!(api = client.base_url(), token = tokens.is_set(), "client ready");

    match cli.command.unwrap_or(Commands::Console {
        session: None,
        policy: Policy::Default,
    }) {
        Commands::Infer {
            prompt,
            session,
            policy,
            json,
        } => cmd_infer(client, tokens, prompt, session, policy, json, &theme).await,
        Commands::Secret { id, json } => cmd_secret(&client, &id, json, &theme).await,
        Commands::Health => cmd_health(&client, &theme).await,
        Commands::Console { session, policy } => {
            let state = ConsoleState::new(session.unwrap_or_else(new_session_id), policy);
            let backend: Arc<dyn InferenceBackend> = Arc::new(client);
            repl::run(Console::new(backend, tokens, state), theme).await
        }
    }
}

// ── Commands ─────────────────────────────────────────────────────────

async fn cmd_infer(
    client: Sentinel,
    tokens: TokenHolder,
    prompt: String,
    session: Option<String>,
    policy: Policy,
    json: bool,
    theme: &Theme,
) -> Result<()> {
    let mut state = ConsoleState::new(session.unwrap_or_else(new_session_id), policy);
    state.set_prompt(prompt);
    let mut console = Console::new(Arc::new(client), tokens, state);

    let notices = console.submit().await;
    let state = console.state();

    if !json {
        for notice in notices.iter().filter(|n| n.level != NoticeLevel::Error) {
            print!("{}", render::notice(theme, notice));
        }
    }
    if let Some(error) = state.inference().error() {
        bail!("inference failed: {error}");
    }
    if state.inference().data().is_none() {
        bail!("prompt required: pass a non-empty prompt");
    }

    if json {
        let out = serde_json::json!({
            "session_id": state.session_id(),
            "result": state.inference().data(),
            "mapping": state.secret().data(),
            "mapping_error": state.secret().error(),
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&out).context("failed to serialize output")?
        );
        return Ok(());
    }

    println!();
    print!("{}", render::response_panel(theme, state));
    println!();
    print!("{}", render::vault_panel(theme, state));
    Ok(())
}

async fn cmd_secret(client: &Sentinel, id: &str, json: bool, theme: &Theme) -> Result<()> {
    let mapping = client
        .fetch_secret(id)
        .await
        .with_context(|| format!("failed to fetch secret {id}"))?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&mapping).context("failed to serialize output")?
        );
    } else {
        print!("{}", render::mapping_details(theme, &mapping));
    }
    Ok(())
}

async fn cmd_health(client: &Sentinel, theme: &Theme) -> Result<()> {
    let status = client.health().await;
    print!("{}", render::health(theme, client.base_url(), &status));
    if !status.ok {
        bail!("API at {} is not healthy", client.base_url());
    }
    Ok(())
}
