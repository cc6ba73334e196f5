//! Startup configuration — command-line arguments and the key secret.
//!
//! `--origin` and `--port` are required, but are declared optional to clap so
//! that a missing one is reported by [`Config::from_cli`] with the proxy's own
//! usage line instead of clap's error output. The secret is carried through
//! unchecked; the cache reports it missing on first use.

use clap::Parser;
use thiserror::Error;

use crate::proxy::denylist::DEFAULT_DENYLIST;

/// Host the listener binds to when `--host` is not given.
pub const DEFAULT_HOST: &str = "localhost";

/// Line printed when a required argument is missing.
pub const USAGE_HINT: &str = "please use --origin and --port to run server";

/// Errors found while validating the command line.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required argument --{0}")]
    MissingArgument(&'static str),

    #[error("origin must be an http:// or https:// URL, got {0:?}")]
    InvalidOrigin(String),
}

/// Command-line arguments.
#[derive(Debug, Parser)]
#[command(name = "cache-proxy")]
#[command(about = "Caching reverse proxy for JSON APIs", version)]
pub struct Cli {
    /// Base URL of the upstream server, e.g. http://dummyjson.com
    #[arg(long)]
    pub origin: Option<String>,

    /// Port to listen on
    #[arg(long)]
    pub port: Option<u16>,

    /// Host or address to bind
    #[arg(long, default_value = DEFAULT_HOST)]
    pub host: String,

    /// Request target answered with 400 instead of proxied (repeatable;
    /// replaces the default of /favicon.ico)
    #[arg(long = "deny", value_name = "TARGET")]
    pub deny: Vec<String>,

    /// Secret used to derive cache keys
    #[arg(long, env = "SECRET", hide_env_values = true)]
    pub secret: Option<String>,
}

/// Validated configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Origin base URL without a trailing slash.
    pub origin: String,
    pub host: String,
    pub port: u16,
    pub denylist: Vec<String>,
    pub secret: Option<String>,
}

impl Config {
    /// Validates parsed arguments.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::MissingArgument`] if `--origin` or `--port` is absent.
    /// - [`ConfigError::InvalidOrigin`] if the origin is not an http(s) URL.
    pub fn from_cli(cli: Cli) -> Result<Self, ConfigError> {
        let origin = cli
            .origin
            .filter(|o| !o.trim().is_empty())
            .ok_or(ConfigError::MissingArgument("origin"))?;
        let port = cli.port.ok_or(ConfigError::MissingArgument("port"))?;

        let origin = origin.trim().trim_end_matches('/').to_owned();
        if !(origin.starts_with("http://") || origin.starts_with("https://")) {
            return Err(ConfigError::InvalidOrigin(origin));
        }

        let denylist = if cli.deny.is_empty() {
            DEFAULT_DENYLIST.iter().map(|s| (*s).to_owned()).collect()
        } else {
            cli.deny
        };

        Ok(Self {
            origin,
            host: cli.host,
            port,
            denylist,
            secret: cli.secret,
        })
    }

    /// Address string for [`Server::bind`](crate::server::Server::bind).
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
