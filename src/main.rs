mod api;
mod cli;
mod config;
mod db;
mod error;
mod importer;
mod server;
mod subscriptions;
mod transactions;

use cli::Cli;
use config::{Config, CONFIG};
use directories::ProjectDirs;
use flexi_logger::{
    detailed_format, Cleanup, Criterion, Duplicate, FileSpec, FlexiLoggerError, Logger,
    LoggerHandle, Naming,
};
use log::{debug, error, info};

const LOG_ROTATE_BYTES: u64 = 10 * 1024 * 1024;
const LOG_FILES_KEPT: usize = 7;

/// Logs go to rotating files in the data directory; warnings and errors are
/// also echoed to stderr. `RUST_LOG` overrides the configured levels.
fn setup_logging(project_dirs: &ProjectDirs, config: &Config) -> Result<LoggerHandle, FlexiLoggerError> {
    let log_dir = project_dirs.data_local_dir().join("logs");

    Logger::try_with_env_or_str(config.logging.log_spec())?
        .log_to_file(FileSpec::default().directory(log_dir).basename("subtrack"))
        .rotate(
            Criterion::Size(LOG_ROTATE_BYTES),
            Naming::Timestamps,
            Cleanup::KeepLogFiles(LOG_FILES_KEPT),
        )
        .duplicate_to_stderr(Duplicate::Warn)
        .format_for_files(detailed_format)
        .start()
}

fn main() {
    let Some(project_dirs) = ProjectDirs::from("", "", "subtrack") else {
        eprintln!("Could not determine a data directory for subtrack");
        std::process::exit(1);
    };

    let config = CONFIG.get_or_init(|| Config::load_config(&project_dirs));

    let logger = match setup_logging(&project_dirs, config) {
        Ok(handle) => handle,
        Err(err) => {
            eprintln!("Failed to initialize logging: {}", err);
            std::process::exit(1);
        }
    };

    info!("subtrack {} starting", env!("CARGO_PKG_VERSION"));
    debug!("Command-line args: {:?}", std::env::args_os().collect::<Vec<_>>());
    debug!("Configuration: {:?}", config);

    if let Err(err) = Cli::handle_command_line(&project_dirs) {
        error!("{:?}", err);
        eprintln!("{}", err);
        logger.flush();
        std::process::exit(1);
    }
}
