use std::{process::ExitCode, sync::Arc};

use colored::Colorize;
use config::{Config, ConfigError};
use log::{error, info, warn};
use quickdraw_collab::{Collab, DatabaseError, MemoryDatabase, PgDatabase};
use thiserror::Error;
use tokio::runtime::{self, Runtime};

mod config;
mod logging;

pub struct QuickDraw {
    collab: Arc<Collab>,
    config: Config,
    runtime: Runtime,
}

#[derive(Debug, Error)]
enum QuickDrawError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Could not initialize database: {0}")]
    Database(#[from] DatabaseError),

    #[error("Server stopped: {0}")]
    Server(std::io::Error),

    #[error("Fatal error: {0}")]
    Fatal(String),
}

impl QuickDraw {
    fn new() -> Result<Self, QuickDrawError> {
        let config = Config::from_env()?;

        info!("Building async runtime...");
        let runtime = runtime::Builder::new_multi_thread()
            .enable_all()
            .thread_name("quickdraw-async")
            .build()
            .map_err(|e| QuickDrawError::Fatal(e.to_string()))?;

        let collab = match &config.database_url {
            Some(url) => {
                info!("Connecting to database...");

                let database = runtime.block_on(async {
                    let database = PgDatabase::new(url, config.max_connections).await?;
                    database.migrate().await?;

                    Ok::<_, DatabaseError>(database)
                })?;

                Collab::new(database)
            }
            None => {
                warn!("No database configured, rooms will only be kept in memory.");
                Collab::new(MemoryDatabase::new())
            }
        };

        Ok(Self {
            collab: Arc::new(collab),
            config,
            runtime,
        })
    }

    fn run(&self) -> Result<(), QuickDrawError> {
        let collab = self.collab.clone();
        let server_config = self.config.server.clone();

        self.runtime
            .block_on(quickdraw_server::run_server(collab, server_config))
            .map_err(QuickDrawError::Server)
    }
}

impl QuickDrawError {
    fn hint(&self) -> String {
        match self {
            QuickDrawError::Config(_) => "Check the QUICKDRAW_* environment variables, then try again.".to_string(),
            QuickDrawError::Database(_) => "This is a database error. Make sure QUICKDRAW_DATABASE_URL points to a running PostgreSQL instance, then try again.".to_string(),
            QuickDrawError::Server(_) => "The server could not keep listening. Make sure QUICKDRAW_SERVER_PORT is not used by another process.".to_string(),
            QuickDrawError::Fatal(_) => "This error is fatal, and should not happen.".to_string(),
        }
    }
}

fn report(error: QuickDrawError) -> ExitCode {
    error!("{} Read the error below to troubleshoot the issue. If you think this might be a bug, please report it by making a GitHub issue.", "QuickDraw failed!".bold().red());
    error!("{}", error);
    error!("{}", format!("Hint: {}", error.hint()).dimmed().italic());

    ExitCode::FAILURE
}

fn main() -> ExitCode {
    if let Err(e) = logging::init_logger() {
        eprintln!("Could not initialize logging: {e}");
    }

    let quickdraw = match QuickDraw::new() {
        Ok(quickdraw) => quickdraw,
        Err(error) => return report(error),
    };

    info!("Initialized successfully.");

    match quickdraw.run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => report(error),
    }
}
