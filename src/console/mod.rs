//! Operator console — a line-based control channel running beside the listener.
//!
//! The console shares nothing with request handling except the
//! [`CacheStore`]. Commands are matched exactly (after trimming), either bare
//! or prefixed with the binary name:
//!
//! | Command                 | Effect                       |
//! |-------------------------|------------------------------|
//! | `-h`, `--help`          | print the command list       |
//! | `--clear-cache`         | drop every cached entry      |
//! | `--stats`               | print the number of entries  |
//! | `exit`, `quit`          | stop the console             |

use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::info;

use crate::cache::CacheStore;

const PROMPT: &str = "> ";

const BIN_PREFIX: &str = "cache-proxy ";

const HELP: &str = "
=== Available Commands ===
  -h, --help              Show this help message
  --clear-cache           Clear all cached entries
  --stats                 Show the number of cached entries
  exit, quit              Exit the application
==========================
";

/// A parsed console line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    ClearCache,
    Stats,
    Exit,
    /// Blank line; nothing to do.
    Empty,
    Unknown(String),
}

impl Command {
    /// Parses one input line. Matching is case-sensitive.
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        let command = line.strip_prefix(BIN_PREFIX).map_or(line, str::trim_start);

        match command {
            "" => Self::Empty,
            "-h" | "--help" => Self::Help,
            "--clear-cache" => Self::ClearCache,
            "--stats" => Self::Stats,
            "exit" | "quit" => Self::Exit,
            _ => Self::Unknown(line.to_owned()),
        }
    }
}

/// What the loop should do after a command ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Print the text (possibly empty) and read the next line.
    Continue(String),
    Exit,
}

/// The console, bound to the store it controls.
pub struct Console {
    store: Arc<CacheStore>,
}

impl Console {
    pub fn new(store: Arc<CacheStore>) -> Self {
        Self { store }
    }

    /// Runs a single command against the store.
    pub fn execute(&self, command: &Command) -> Outcome {
        match command {
            Command::Help => Outcome::Continue(HELP.to_owned()),
            Command::ClearCache => {
                self.store.clear();
                info!("cache cleared from console");
                Outcome::Continue("Cleared cached entries\n".to_owned())
            }
            Command::Stats => Outcome::Continue(format!("Cached entries: {}\n", self.store.len())),
            Command::Exit => Outcome::Exit,
            Command::Empty => Outcome::Continue(String::new()),
            Command::Unknown(input) => Outcome::Continue(format!(
                "Unknown command: {input}\nType -h or --help for available commands\n"
            )),
        }
    }

    /// Reads commands from `input` until `exit`/`quit` or end of input,
    /// writing a prompt before each line and every reply to `output`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error only if reading input or writing output fails.
    pub async fn run<R, W>(&self, input: R, mut output: W) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = input.lines();

        loop {
            output.write_all(PROMPT.as_bytes()).await?;
            output.flush().await?;

            let Some(line) = lines.next_line().await? else {
                return Ok(());
            };

            match self.execute(&Command::parse(&line)) {
                Outcome::Continue(reply) => output.write_all(reply.as_bytes()).await?,
                Outcome::Exit => return Ok(()),
            }
        }
    }
}
