use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

pub static CONFIG: OnceCell<Config> = OnceCell::new();

const LOG_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

/// Environment variable prefix for overrides, e.g. `SUBTRACK_SERVER__PORT=8080`.
pub const ENV_PREFIX: &str = "SUBTRACK_";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct LoggingConfig {
    pub subtrack: String,
    pub default: String,
}

impl LoggingConfig {
    const SUBTRACK_LEVEL: &str = "info";
    const DEFAULT_LEVEL: &str = "warn";

    fn default() -> Self {
        LoggingConfig {
            subtrack: Self::SUBTRACK_LEVEL.to_string(),
            default: Self::DEFAULT_LEVEL.to_string(),
        }
    }

    /// Log specification in flexi_logger syntax: dependencies at the default
    /// level, this crate at its own level.
    pub fn log_spec(&self) -> String {
        format!("{}, subtrack={}", self.default, self.subtrack)
    }

    fn ensure_valid(&mut self) {
        self.subtrack = validated_level("subtrack", &self.subtrack, Self::SUBTRACK_LEVEL);
        self.default = validated_level("default", &self.default, Self::DEFAULT_LEVEL);
    }
}

fn validated_level(name: &str, value: &str, fallback: &str) -> String {
    let level = value.trim().to_ascii_lowercase();
    if LOG_LEVELS.contains(&level.as_str()) {
        level
    } else {
        eprintln!(
            "Config error: {} log level of '{}' is invalid - using default of '{}'",
            name, value, fallback
        );
        fallback.to_owned()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub static_dir: String,
    pub max_upload_mb: usize,
}

impl ServerConfig {
    const HOST: &str = "127.0.0.1";
    const PORT: u16 = 3000;
    const STATIC_DIR: &str = "frontend/dist";
    const MAX_UPLOAD_MB: usize = 10;

    fn default() -> Self {
        ServerConfig {
            host: Self::HOST.to_owned(),
            port: Self::PORT,
            static_dir: Self::STATIC_DIR.to_owned(),
            max_upload_mb: Self::MAX_UPLOAD_MB,
        }
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb.saturating_mul(1024 * 1024)
    }

    fn ensure_valid(&mut self) {
        self.host = self.host.trim().to_owned();
        if self.host.is_empty() {
            eprintln!(
                "Config error: server host is empty - using default of '{}'",
                Self::HOST
            );
            self.host = Self::HOST.to_owned();
        }

        if self.max_upload_mb == 0 {
            eprintln!(
                "Config error: max_upload_mb must be at least 1 - using default of {}",
                Self::MAX_UPLOAD_MB
            );
            self.max_upload_mb = Self::MAX_UPLOAD_MB;
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DatabaseConfig {
    /// Explicit database file. When absent the database lives in the data directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    pub pool_size: u32,
}

impl DatabaseConfig {
    const DB_FILENAME: &str = "subtrack.db";
    const POOL_SIZE: u32 = 8;

    fn default() -> Self {
        DatabaseConfig {
            path: None,
            pool_size: Self::POOL_SIZE,
        }
    }

    pub fn resolve_path(&self, data_dir: &Path) -> PathBuf {
        match self.path.as_deref().map(str::trim) {
            Some(path) if !path.is_empty() => PathBuf::from(path),
            _ => data_dir.join(Self::DB_FILENAME),
        }
    }

    fn ensure_valid(&mut self) {
        if self.pool_size == 0 {
            eprintln!(
                "Config error: database pool_size must be at least 1 - using default of {}",
                Self::POOL_SIZE
            );
            self.pool_size = Self::POOL_SIZE;
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
}

impl Config {
    pub fn default() -> Self {
        Config {
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    pub fn config_path(project_dirs: &ProjectDirs) -> PathBuf {
        project_dirs.data_local_dir().join("config.toml")
    }

    /// Layers, lowest precedence first: built-in defaults, the TOML file, a bare
    /// `PORT` variable, then `SUBTRACK_`-prefixed variables.
    pub fn figment(config_path: &Path) -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(config_path))
            .merge(Env::raw().only(&["PORT"]).map(|_| "server.port".into()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    pub fn from_figment(figment: Figment) -> Result<Self, figment::Error> {
        let mut config: Config = figment.extract()?;
        config.ensure_valid();
        Ok(config)
    }

    /// Loads the configuration from a TOML file located in the app's data directory.
    /// If the file is missing or fails to parse, defaults are used.
    /// Additionally, writes the default config to disk if no file exists.
    pub fn load_config(project_dirs: &ProjectDirs) -> Self {
        let config_path = Self::config_path(project_dirs);

        if !config_path.exists() {
            Self::write_default(&config_path);
        }

        Self::from_figment(Self::figment(&config_path)).unwrap_or_else(|err| {
            eprintln!(
                "Could not load config file {}: {}. Using default configuration.",
                config_path.display(),
                err
            );
            Config::default()
        })
    }

    fn write_default(config_path: &Path) {
        if let Some(parent) = config_path.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                eprintln!(
                    "Failed to create configuration directory {}: {}",
                    parent.display(),
                    e
                );
                return;
            }
        }

        match toml::to_string_pretty(&Config::default()) {
            Ok(toml_string) => {
                if let Err(e) = fs::write(config_path, toml_string) {
                    eprintln!(
                        "Failed to write default config to {}: {}",
                        config_path.display(),
                        e
                    );
                }
            }
            Err(e) => eprintln!("Failed to serialize default config: {}", e),
        }
    }

    fn ensure_valid(&mut self) {
        self.server.ensure_valid();
        self.database.ensure_valid();
        self.logging.ensure_valid();
    }
}
