use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use directories::ProjectDirs;
use log::info;

use crate::config::{Config, CONFIG};
use crate::db::Database;
use crate::error::SubtrackError;
use crate::importer::Importer;
use crate::transactions::Transactions;

#[derive(Parser)]
#[command(
    name = "subtrack",
    version,
    about = "subtrack: Import transactions and track recurring subscriptions"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the server (default if no command specified)
    Serve,

    /// Import a CSV export of transactions and detect subscriptions
    Import {
        /// Path to the CSV file
        file: PathBuf,
    },
}

impl Cli {
    pub fn handle_command_line(project_dirs: &ProjectDirs) -> Result<(), SubtrackError> {
        let args = Cli::parse();
        let config = Self::loaded_config()?;

        let db_path = config.database.resolve_path(project_dirs.data_local_dir());
        let db = Database::open(&db_path, config.database.pool_size)?;

        // Default to Serve if no command specified
        match args.command.unwrap_or(Command::Serve) {
            Command::Serve => Self::start_server(config, db),
            Command::Import { file } => Self::import(&db, &file),
        }
    }

    fn loaded_config() -> Result<&'static Config, SubtrackError> {
        CONFIG
            .get()
            .ok_or_else(|| SubtrackError::Error("Configuration not loaded".to_string()))
    }

    fn start_server(config: &Config, db: Database) -> Result<(), SubtrackError> {
        info!(
            "Starting server on {}:{} with database {}",
            config.server.host,
            config.server.port,
            db.path().display()
        );

        let rt = tokio::runtime::Runtime::new()
            .map_err(|e| SubtrackError::Error(format!("Failed to create runtime: {}", e)))?;

        rt.block_on(async {
            let web_server = crate::server::WebServer::new(&config.server);
            web_server.start(db).await
        })
    }

    fn import(db: &Database, file: &Path) -> Result<(), SubtrackError> {
        info!("Importing {}", file.display());

        let summary = Importer::import_file(db, file)?;

        println!(
            "Imported {} transactions from {}",
            summary.transactions_imported,
            file.display()
        );
        println!(
            "Detected {} new subscriptions",
            summary.subscriptions_detected
        );
        println!("Ledger now holds {} transactions", Transactions::count(db)?);

        Ok(())
    }
}
