//! stackql-exec - run StackQL queries from the command line.

mod cli;

use cli::{read_batch, Cli, Command};
use stackql_exec::backend::ServerBackend;
use stackql_exec::config::{resolve, BackendMode, ConfigFile};
use stackql_exec::detector::{init_patterns, PatternSet};
use stackql_exec::error::Result;
use stackql_exec::logging::{default_log_path, init_file_logging, init_stderr_logging};
use stackql_exec::query::QueryExecutor;
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let cli = Cli::parse_args();

    match &cli.debug_log {
        Some(path) => {
            let path = path.clone().unwrap_or_else(default_log_path);
            init_file_logging(&path);
        }
        None => init_stderr_logging(),
    }

    if let Err(e) = run(cli).await {
        error!("{}: {}", e.category(), e.message());
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config_path();
    info!("Loading config from: {}", config_path.display());
    let file = ConfigFile::load_from_file(&config_path)?;

    if let Some(path) = cli.patterns.as_ref().or(file.patterns.as_ref()) {
        info!("Loading error patterns from: {}", path.display());
        init_patterns(PatternSet::load_from_file(path)?)?;
    }

    let overrides = cli.overrides();
    let base = file.execution_config()?;
    let effective = resolve(&base, &overrides)?;
    let mut executor = QueryExecutor::new(base);

    let server = if effective.mode == BackendMode::Server {
        let settings = cli.server_settings(&file.server);
        let backend = Arc::new(ServerBackend::connect(&settings).await?);
        executor = executor.with_server_backend(backend.clone());
        Some(backend)
    } else {
        None
    };

    let rendered = match &cli.command {
        Command::Query { sql } => executor.execute(sql, &overrides).await,
        Command::Stmt { sql } => executor.execute_statement(sql, &overrides).await,
        Command::Batch { source } => {
            let queries = read_batch(source)?;
            executor.execute_batch(&queries, &overrides).await
        }
    };

    if let Some(server) = server {
        server.close().await;
    }

    print!("{}", rendered?);
    Ok(())
}
