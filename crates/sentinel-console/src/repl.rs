//! Interactive line-oriented console.
//!
//! Plain lines accumulate in the prompt buffer; lines starting with `:` are
//! commands. Stdin is read on a blocking thread so the async backend calls
//! can proceed on the runtime.

use std::io::{self, BufRead, Write};

use anyhow::{Context, Result};
use sentinel_client::{Policy, UnknownPolicy};
use tracing::info;

use crate::console::{Console, Status};
use crate::render::{self, Theme};

/// One parsed input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Submit the buffer, or replace it with the given text first.
    Send(Option<String>),
    /// Set (`Some`) or clear (`None`) the bearer token.
    Token(Option<String>),
    /// Show (`None`) or set the session id.
    Session(Option<String>),
    NewSession,
    Policy(Policy),
    Clear,
    Show,
    Help,
    Quit,
    /// Text to append to the prompt buffer.
    Text(String),
}

/// Why a line could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    UnknownCommand(String),
    MissingArgument(&'static str),
    Policy(UnknownPolicy),
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownCommand(cmd) => write!(f, "unknown command \"{cmd}\", try :help"),
            Self::MissingArgument(cmd) => write!(f, "{cmd} needs an argument"),
            Self::Policy(e) => write!(f, "{e}"),
        }
    }
}

fn arg(rest: &str) -> Option<String> {
    let rest = rest.trim();
    (!rest.is_empty()).then(|| rest.to_owned())
}

/// Parse one line of console input.
///
/// # Errors
///
/// Returns a [`ParseError`] for unknown commands or bad arguments.
pub fn parse(line: &str) -> Result<Command, ParseError> {
    let Some(cmd) = line.trim_end().strip_prefix(':') else {
        return Ok(Command::Text(line.to_owned()));
    };
    // `::text` escapes a literal leading colon.
    if cmd.starts_with(':') {
        return Ok(Command::Text(cmd.to_owned()));
    }

    let (name, rest) = cmd.split_once(char::is_whitespace).unwrap_or((cmd, ""));
    match name {
        "send" | "s" => Ok(Command::Send(arg(rest))),
        "token" => Ok(Command::Token(arg(rest))),
        "session" => Ok(Command::Session(arg(rest))),
        "new-session" => Ok(Command::NewSession),
        "policy" => {
            let value = arg(rest).ok_or(ParseError::MissingArgument(":policy"))?;
            value.parse().map(Command::Policy).map_err(ParseError::Policy)
        }
        "clear" => Ok(Command::Clear),
        "show" => Ok(Command::Show),
        "help" | "h" | "?" => Ok(Command::Help),
        "quit" | "q" | "exit" => Ok(Command::Quit),
        other => Err(ParseError::UnknownCommand(other.to_owned())),
    }
}

/// Output of one handled line.
#[derive(Debug, Default)]
pub struct Step {
    pub output: String,
    pub quit: bool,
}

fn panels(console: &Console, theme: &Theme) -> String {
    let mut out = render::response_panel(theme, console.state());
    out.push('\n');
    out.push_str(&render::vault_panel(theme, console.state()));
    out
}

/// Apply one input line to the console.
pub async fn handle_line(console: &mut Console, line: &str, theme: &Theme) -> Step {
    let command = match parse(line) {
        Ok(command) => command,
        Err(e) => {
            return Step {
                output: format!("{e}\n"),
                quit: false,
            };
        }
    };

    let output = match command {
        Command::Text(text) => {
            console.state_mut().push_prompt_line(&text);
            String::new()
        }
        Command::Send(text) => {
            if let Some(text) = text {
                console.state_mut().set_prompt(text);
            }
            let notices = console.submit().await;
            let mut out: String = notices.iter().map(|n| render::notice(theme, n)).collect();
            let inference = console.state().inference();
            if inference.data().is_some() || inference.error().is_some() {
                out.push_str(&panels(console, theme));
            }
            // A failed send keeps the buffer so it can be retried as is.
            if console.state().inference().status() == Status::Succeeded {
                console.state_mut().clear_prompt();
            }
            out
        }
        Command::Token(token) => match token {
            Some(token) => {
                console.tokens().set(token);
                info!("bearer token updated");
                "Token set.\n".to_owned()
            }
            None => {
                console.tokens().clear();
                info!("bearer token cleared");
                "Token cleared.\n".to_owned()
            }
        },
        Command::Session(Some(id)) => {
            console.state_mut().set_session_id(id);
            format!("Session ID: {}\n", console.state().session_id())
        }
        Command::Session(None) => format!("Session ID: {}\n", console.state().session_id()),
        Command::NewSession => {
            let id = console.state_mut().new_session().to_owned();
            format!("Session ID: {id}\n")
        }
        Command::Policy(policy) => {
            console.state_mut().set_policy(policy);
            format!("Policy: {} ({})\n", policy.as_str(), policy.label())
        }
        Command::Clear => {
            console.state_mut().clear_prompt();
            "Prompt cleared.\n".to_owned()
        }
        Command::Show => {
            let mut out = render::form(theme, console.state(), console.tokens().is_set());
            out.push('\n');
            out.push_str(&panels(console, theme));
            out
        }
        Command::Help => render::help(theme),
        Command::Quit => {
            return Step {
                output: String::new(),
                quit: true,
            };
        }
    };
    Step {
        output,
        quit: false,
    }
}

/// Run the console on stdin/stdout until `:quit` or end of input.
///
/// # Errors
///
/// Returns `Err` if reading stdin or writing to stdout fails.
pub async fn run(mut console: Console, theme: Theme) -> Result<()> {
    let (tx, mut rx) = tokio::sync::mpsc::channel::<io::Result<String>>(32);

    tokio::task::spawn_blocking(move || {
        let mut stdin = io::stdin().lock();
        loop {
            match read_line_lossy(&mut stdin) {
                Ok(Some(line)) => {
                    if tx.blocking_send(Ok(line)).is_err() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    let _ = tx.blocking_send(Err(e));
                    break;
                }
            }
        }
    });

    let mut stdout = io::stdout();
    let intro = render::form(&theme, console.state(), console.tokens().is_set());
    write!(stdout, "{intro}\nType a prompt, then :send. :help lists commands.\n")
        .context("failed to write to stdout")?;
    stdout.flush().context("failed to flush stdout")?;

    while let Some(line) = rx.recv().await {
        let line = line.context("failed to read from stdin")?;
        let step = handle_line(&mut console, &line, &theme).await;
        if !step.output.is_empty() {
            write!(stdout, "{}", step.output).context("failed to write to stdout")?;
            stdout.flush().context("failed to flush stdout")?;
        }
        if step.quit {
            break;
        }
    }
    Ok(())
}

/// Read one line, replacing invalid UTF-8 instead of failing on it.
///
/// Returns `Ok(None)` at end of input. The trailing newline (and a `\r`
/// before it) is stripped.
fn read_line_lossy(reader: &mut impl BufRead) -> io::Result<Option<String>> {
    let mut buf = Vec::new();
    if reader.read_until(b'\n', &mut buf)? == 0 {
        return Ok(None);
    }
    if buf.last() == Some(&b'\n') {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
    }
    Ok(Some(String::from_utf8_lossy(&buf).into_owned()))
}
