//! Service settings from CLI flags with environment fallbacks

use std::net::{SocketAddr, ToSocketAddrs};
use std::path::PathBuf;

use clap::{ArgAction, Parser};
use fuzzgroup_core::grouping::EngineConfig;
use thiserror::Error;

/// DSN used when neither `--db-dsn` nor `DB_DSN` is given
pub const DEFAULT_DSN: &str = "sqlite+pysqlite:///database.sqlite";

/// Default cap on request bodies (256 MiB)
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 256 * 1024 * 1024;

/// Errors raised while validating settings at startup
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unsupported database DSN '{0}': only sqlite is available")]
    UnsupportedDsn(String),

    #[error("table name must not be empty")]
    EmptyTable,

    #[error("available cores must be at least 1")]
    NoCores,

    #[error("invalid listen address '{0}'")]
    InvalidAddress(String),

    #[error("invalid log level '{0}'")]
    InvalidLogLevel(String),
}

/// Where the SQLite database lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Database {
    Memory,
    File(PathBuf),
}

/// fuzzgroup-server settings
#[derive(Parser, Debug, Clone)]
#[command(name = "fuzzgroup-server")]
#[command(about = "Fuzzy duplicate grouping over uploaded CSV files")]
#[command(version)]
pub struct Settings {
    /// Database DSN (sqlite:///path, a plain path, or :memory:)
    #[arg(long, env = "DB_DSN", default_value = DEFAULT_DSN)]
    pub db_dsn: String,

    /// Route prefix; endpoints are served under /{app_name}
    #[arg(long, env = "APP_NAME", default_value = "")]
    pub app_name: String,

    /// Table holding the ingested rows
    #[arg(long, env = "FUZZ_TABLE", default_value = "fuzzy")]
    pub table: String,

    /// Worker threads for matching (defaults to half the available cores)
    #[arg(long, env = "AVAILABLE_CORES")]
    pub available_cores: Option<usize>,

    /// Listen address
    #[arg(short, long, env = "HOST", default_value = "0.0.0.0")]
    pub address: String,

    /// Listen port
    #[arg(short, long, env = "PORT", default_value_t = 8000)]
    pub port: u16,

    /// Allowed CORS origins, comma separated
    #[arg(long, env = "CORS_ALLOW_ORIGINS", default_value = "*")]
    pub cors_allow_origins: String,

    /// Allowed CORS methods, comma separated
    #[arg(long, env = "CORS_ALLOW_METHODS", default_value = "*")]
    pub cors_allow_methods: String,

    /// Allowed CORS request headers, comma separated
    #[arg(long, env = "CORS_ALLOW_HEADERS", default_value = "*")]
    pub cors_allow_headers: String,

    /// Whether CORS responses allow credentials
    #[arg(long, env = "CORS_ALLOW_CREDENTIALS", default_value_t = true, action = ArgAction::Set)]
    pub cors_allow_credentials: bool,

    /// Maximum request body size in bytes
    #[arg(long, env = "MAX_UPLOAD_BYTES", default_value_t = DEFAULT_MAX_UPLOAD_BYTES)]
    pub max_upload_bytes: usize,

    /// Log filter (error, warn, info, debug, trace, or an EnvFilter directive)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Directory for the daily and error log files
    #[arg(long, env = "LOG_DIR", default_value = "logs")]
    pub log_dir: PathBuf,
}

impl Settings {
    /// Check everything that can be checked before binding or opening files.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.database()?;
        if self.table.trim().is_empty() {
            return Err(ConfigError::EmptyTable);
        }
        if self.available_cores == Some(0) {
            return Err(ConfigError::NoCores);
        }
        if tracing_subscriber::EnvFilter::try_new(&self.log_level).is_err() {
            return Err(ConfigError::InvalidLogLevel(self.log_level.clone()));
        }
        Ok(())
    }

    /// Resolve the DSN to a database location.
    ///
    /// `sqlite:///rel.db` and `sqlite+driver:///rel.db` are relative paths,
    /// `sqlite:////abs.db` is absolute. A DSN without a scheme is a path.
    pub fn database(&self) -> Result<Database, ConfigError> {
        let dsn = self.db_dsn.trim();
        let path = match dsn.split_once("://") {
            Some((scheme, rest)) => {
                if scheme != "sqlite" && !scheme.starts_with("sqlite+") {
                    return Err(ConfigError::UnsupportedDsn(dsn.to_string()));
                }
                rest.strip_prefix('/').unwrap_or(rest)
            }
            None => dsn,
        };

        if path.is_empty() || path == ":memory:" {
            Ok(Database::Memory)
        } else {
            Ok(Database::File(PathBuf::from(path)))
        }
    }

    /// Route prefix with a leading slash, or empty when no app name is set.
    pub fn root_path(&self) -> String {
        let name = self.app_name.trim().trim_matches('/');
        if name.is_empty() {
            String::new()
        } else {
            format!("/{}", name)
        }
    }

    /// Matching workers: the configured count, else half the cores.
    pub fn workers(&self) -> usize {
        self.available_cores
            .unwrap_or_else(|| {
                std::thread::available_parallelism()
                    .map(|n| n.get() / 2)
                    .unwrap_or(1)
            })
            .max(1)
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            workers: self.workers(),
            ..Default::default()
        }
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        (self.address.as_str(), self.port)
            .to_socket_addrs()
            .ok()
            .and_then(|mut addrs| addrs.next())
            .ok_or_else(|| ConfigError::InvalidAddress(format!("{}:{}", self.address, self.port)))
    }

    pub fn cors(&self) -> CorsPolicy {
        CorsPolicy {
            allow_origins: split_list(&self.cors_allow_origins),
            allow_methods: split_list(&self.cors_allow_methods),
            allow_headers: split_list(&self.cors_allow_headers),
            allow_credentials: self.cors_allow_credentials,
        }
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Cross-origin rules applied to every response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorsPolicy {
    pub allow_origins: Vec<String>,
    pub allow_methods: Vec<String>,
    pub allow_headers: Vec<String>,
    pub allow_credentials: bool,
}

impl Default for CorsPolicy {
    fn default() -> Self {
        Self {
            allow_origins: vec!["*".into()],
            allow_methods: vec!["*".into()],
            allow_headers: vec!["*".into()],
            allow_credentials: true,
        }
    }
}
