//! Command-line argument parsing for stackql-exec.

use clap::{Parser, Subcommand};
use stackql_exec::config::{AuthOverride, ConfigFile, ConfigOverrides, ServerSettings};
use stackql_exec::error::{ExecError, Result};
use std::io::Read;
use std::path::PathBuf;

/// Run StackQL queries through a local engine binary or a StackQL server.
#[derive(Parser, Debug)]
#[command(name = "stackql-exec")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Output format: dict, csv, table, markdownkv or pandas
    #[arg(short = 'o', long, global = true, value_name = "FORMAT")]
    pub output: Option<String>,

    /// Use a running StackQL server instead of the local binary
    #[arg(long, global = true, overrides_with = "local")]
    pub server: bool,

    /// Use the local binary even if the config file selects a server
    #[arg(long, global = true, overrides_with = "server")]
    pub local: bool,

    /// Server host
    #[arg(short = 'H', long, global = true, value_name = "HOST")]
    pub host: Option<String>,

    /// Server port
    #[arg(short = 'p', long, global = true, value_name = "PORT")]
    pub port: Option<u16>,

    /// Path to the stackql binary
    #[arg(long = "bin", global = true, value_name = "PATH", env = "STACKQL_BIN")]
    pub binary: Option<PathBuf>,

    /// Per-query timeout in seconds
    #[arg(long, global = true, value_name = "SECS")]
    pub timeout: Option<f64>,

    /// Maximum queries in flight for `batch`
    #[arg(long, global = true, value_name = "N")]
    pub concurrency: Option<i64>,

    /// Provider authentication as a JSON object
    #[arg(long, global = true, value_name = "JSON")]
    pub auth: Option<String>,

    /// Custom provider registry URL
    #[arg(long, global = true, value_name = "URL")]
    pub registry: Option<String>,

    /// CSV field separator
    #[arg(long, global = true, value_name = "CHAR")]
    pub sep: Option<String>,

    /// Include a header row in CSV output
    #[arg(long, global = true, overrides_with = "no_header")]
    pub header: bool,

    /// Omit the CSV header row
    #[arg(long, global = true, overrides_with = "header")]
    pub no_header: bool,

    /// Report failures as error results instead of exiting
    #[arg(long, global = true, overrides_with = "no_suppress_errors")]
    pub suppress_errors: bool,

    /// Exit on failures even if the config file suppresses them
    #[arg(long, global = true, overrides_with = "suppress_errors")]
    pub no_suppress_errors: bool,

    /// Enable engine HTTP request logging
    #[arg(long, global = true, overrides_with = "no_http_debug")]
    pub http_debug: bool,

    /// Disable engine HTTP request logging
    #[arg(long, global = true, overrides_with = "http_debug")]
    pub no_http_debug: bool,

    /// Error pattern document (TOML)
    #[arg(long, global = true, value_name = "PATH")]
    pub patterns: Option<PathBuf>,

    /// Config file path
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Write debug logs to a file (default location if PATH is omitted)
    #[arg(long, global = true, value_name = "PATH", num_args = 0..=1)]
    pub debug_log: Option<Option<PathBuf>>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Run a query and print its rows
    Query {
        /// Query text
        sql: String,
    },
    /// Run a statement and print its summary
    Stmt {
        /// Statement text
        sql: String,
    },
    /// Run one query per line of FILE concurrently ("-" reads stdin)
    Batch {
        #[arg(value_name = "FILE")]
        source: String,
    },
}

impl Cli {
    /// Parses command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Returns the config file path to use.
    pub fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(ConfigFile::default_path)
    }

    /// Per-run overrides from the command line.
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            mode: switch(self.server, self.local)
                .map(|server| if server { "server" } else { "local" }.to_string()),
            binary_path: self.binary.clone(),
            output: self.output.clone(),
            sep: self.sep.clone(),
            header: switch(self.header, self.no_header),
            auth: self.auth.clone().map(AuthOverride::Json),
            custom_registry: self.registry.clone(),
            timeout_secs: self.timeout,
            concurrency_limit: self.concurrency,
            http_debug: switch(self.http_debug, self.no_http_debug),
            suppress_errors: switch(self.suppress_errors, self.no_suppress_errors),
            ..ConfigOverrides::none()
        }
    }

    /// Server settings from the config file with command-line host/port
    /// applied on top.
    pub fn server_settings(&self, file: &ServerSettings) -> ServerSettings {
        let mut settings = file.clone();
        if let Some(host) = &self.host {
            settings.host = host.clone();
        }
        if let Some(port) = self.port {
            settings.port = port;
        }
        settings.apply_env_defaults();
        settings
    }
}

/// Maps a `--flag` / `--no-flag` pair onto an optional override.
fn switch(on: bool, off: bool) -> Option<bool> {
    if on {
        Some(true)
    } else if off {
        Some(false)
    } else {
        None
    }
}

/// Reads batch queries from a file, or stdin for `-`.
pub fn read_batch(source: &str) -> Result<Vec<String>> {
    let text = if source == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .map_err(|e| ExecError::config(format!("Failed to read stdin: {e}")))?;
        buf
    } else {
        std::fs::read_to_string(source)
            .map_err(|e| ExecError::config(format!("Failed to read {source}: {e}")))?
    };
    Ok(parse_batch(&text))
}

/// One query per non-blank line; `--` comment lines are skipped.
pub fn parse_batch(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with("--"))
        .map(String::from)
        .collect()
}
