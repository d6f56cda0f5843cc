use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};

/// Command-line arguments for the marquee binary.
#[derive(Debug, Parser)]
#[command(
    name = "marquee",
    version,
    about = "Ledger-backed content review workflow"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "MARQUEE_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the HTTP gateway.
    Serve(Box<ServeArgs>),
    /// Run one contract operation and print the result as JSON.
    Invoke(InvokeArgs),
    /// Print the committed revisions of one record as JSON lines.
    History(HistoryArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct LedgerOverrides {
    /// Override the journal file; without one the ledger lives in memory.
    #[arg(long = "ledger-journal", value_name = "PATH", value_hint = ValueHint::FilePath)]
    pub journal_path: Option<PathBuf>,

    /// Override the number of undrained events kept before the oldest are dropped.
    #[arg(long = "ledger-event-capacity", value_name = "COUNT")]
    pub event_capacity: Option<usize>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    #[command(flatten)]
    pub ledger: LedgerOverrides,

    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the graceful shutdown timeout.
    #[arg(long = "server-graceful-shutdown-seconds", value_name = "SECONDS")]
    pub server_graceful_shutdown_seconds: Option<u64>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Override the page size used when a query names none.
    #[arg(long = "query-default-page-size", value_name = "COUNT")]
    pub query_default_page_size: Option<usize>,

    /// Override the largest page a query may request.
    #[arg(long = "query-max-page-size", value_name = "COUNT")]
    pub query_max_page_size: Option<usize>,
}

#[derive(Debug, Args, Clone)]
pub struct InvokeArgs {
    #[command(flatten)]
    pub ledger: LedgerOverrides,

    /// Contract name: content, entries, comments or ratings.
    #[arg(value_name = "CONTRACT")]
    pub contract: String,

    /// Operation name, e.g. SubmitContentRequest.
    #[arg(value_name = "OPERATION")]
    pub operation: String,

    /// Positional string arguments passed to the operation.
    #[arg(value_name = "ARGS", trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

#[derive(Debug, Args, Clone)]
pub struct HistoryArgs {
    #[command(flatten)]
    pub ledger: LedgerOverrides,

    /// Record tag, e.g. `request` or `entry`.
    #[arg(value_name = "TAG")]
    pub tag: String,

    /// Key components after the tag.
    #[arg(value_name = "COMPONENTS", required = true)]
    pub components: Vec<String>,

    /// Stop after this many revisions.
    #[arg(long, value_name = "COUNT")]
    pub limit: Option<usize>,
}
