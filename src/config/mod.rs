//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{net::SocketAddr, path::PathBuf, str::FromStr, time::Duration};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::application::pagination::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE, QueryLimits};
use crate::infra::ledger::DEFAULT_EVENT_CAPACITY;

mod cli;
#[cfg(test)]
mod tests;

pub use cli::{
    CliArgs, Command, HistoryArgs, InvokeArgs, LedgerOverrides, ServeArgs, ServeOverrides,
};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "marquee";
const ENV_PREFIX: &str = "MARQUEE";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 7050;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 10;

#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub ledger: LedgerSettings,
    pub query: QueryLimits,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub graceful_shutdown: Duration,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct LedgerSettings {
    /// Append-only block journal. `None` keeps the ledger in memory only.
    pub journal_path: Option<PathBuf>,
    pub event_capacity: usize,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Invoke(args)) => raw.apply_ledger_overrides(&args.ledger),
        Some(Command::History(args)) => raw.apply_ledger_overrides(&args.ledger),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    ledger: RawLedgerSettings,
    query: RawQuerySettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(seconds) = overrides.server_graceful_shutdown_seconds {
            self.server.graceful_shutdown_seconds = Some(seconds);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(size) = overrides.query_default_page_size {
            self.query.default_page_size = Some(size);
        }
        if let Some(size) = overrides.query_max_page_size {
            self.query.max_page_size = Some(size);
        }

        self.apply_ledger_overrides(&overrides.ledger);
    }

    fn apply_ledger_overrides(&mut self, overrides: &LedgerOverrides) {
        if let Some(path) = overrides.journal_path.as_ref() {
            self.ledger.journal_path = Some(path.clone());
        }
        if let Some(capacity) = overrides.event_capacity {
            self.ledger.event_capacity = Some(capacity);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            ledger,
            query,
        } = raw;

        Ok(Self {
            server: build_server_settings(server)?,
            logging: build_logging_settings(logging)?,
            ledger: build_ledger_settings(ledger)?,
            query: build_query_limits(query)?,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());
    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }
    let addr =
        parse_socket_addr(&host, port).map_err(|reason| LoadError::invalid("server.addr", reason))?;

    let graceful_secs = server
        .graceful_shutdown_seconds
        .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_SECS);
    if graceful_secs == 0 {
        return Err(LoadError::invalid(
            "server.graceful_shutdown_seconds",
            "must be greater than zero",
        ));
    }

    Ok(ServerSettings {
        addr,
        graceful_shutdown: Duration::from_secs(graceful_secs),
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_ledger_settings(ledger: RawLedgerSettings) -> Result<LedgerSettings, LoadError> {
    let journal_path = ledger
        .journal_path
        .filter(|path| !path.as_os_str().is_empty());

    let event_capacity = ledger.event_capacity.unwrap_or(DEFAULT_EVENT_CAPACITY);
    if event_capacity == 0 {
        return Err(LoadError::invalid(
            "ledger.event_capacity",
            "must be greater than zero",
        ));
    }

    Ok(LedgerSettings {
        journal_path,
        event_capacity,
    })
}

fn build_query_limits(query: RawQuerySettings) -> Result<QueryLimits, LoadError> {
    let max_page_size = query.max_page_size.unwrap_or(MAX_PAGE_SIZE);
    if max_page_size == 0 {
        return Err(LoadError::invalid(
            "query.max_page_size",
            "must be greater than zero",
        ));
    }

    let default_page_size = query
        .default_page_size
        .unwrap_or(DEFAULT_PAGE_SIZE.min(max_page_size));
    if default_page_size == 0 || default_page_size > max_page_size {
        return Err(LoadError::invalid(
            "query.default_page_size",
            format!("must be between 1 and {max_page_size}"),
        ));
    }

    Ok(QueryLimits {
        default_page_size,
        max_page_size,
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLedgerSettings {
    journal_path: Option<PathBuf>,
    event_capacity: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawQuerySettings {
    default_page_size: Option<usize>,
    max_page_size: Option<usize>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}
