//! Configuration management.

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Default table name for the document rows.
pub const DEFAULT_TABLE: &str = "documents";

/// Default `SQLite` database path.
pub const DEFAULT_SQLITE_PATH: &str = "./dotstore.db";

/// Which backend a store is built over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendKind {
    /// Embedded `SQLite` database file.
    Sqlite {
        /// Path to the database file.
        path: PathBuf,
    },
    /// Networked PostgreSQL server (requires the `postgres` feature).
    Postgres {
        /// Connection URL, e.g. `postgresql://localhost/dotstore`.
        url: String,
    },
}

/// Main configuration for dotstore.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Backend selection.
    pub backend: BackendKind,
    /// Table holding the `(key, value)` rows.
    pub table: String,
    /// Maximum PostgreSQL pool connections (None for the backend default).
    pub pool_max_size: Option<usize>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Sqlite {
                path: PathBuf::from(DEFAULT_SQLITE_PATH),
            },
            table: DEFAULT_TABLE.to_string(),
            pool_max_size: None,
        }
    }
}

/// Configuration file structure (for TOML parsing).
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    /// Backend name: "sqlite" or "postgres".
    pub backend: Option<String>,
    /// `SQLite` database path.
    pub sqlite_path: Option<String>,
    /// PostgreSQL connection URL.
    pub postgres_url: Option<String>,
    /// Table name.
    pub table: Option<String>,
    /// Maximum PostgreSQL pool connections.
    pub pool_max_size: Option<usize>,
}

impl StoreConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(path: &Path) -> crate::Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| crate::Error::QueryFailed {
            operation: "read_config_file".to_string(),
            cause: e.to_string(),
        })?;

        let file: ConfigFile = toml::from_str(&contents).map_err(|e| crate::Error::QueryFailed {
            operation: "parse_config_file".to_string(),
            cause: e.to_string(),
        })?;

        Ok(Self::from_config_file(&file))
    }

    /// Loads configuration from the default location.
    ///
    /// Checks the following paths in order:
    /// 1. Platform-specific config dir (`~/Library/Application Support/dotstore/` on macOS)
    /// 2. XDG config dir (`~/.config/dotstore/` for Unix compatibility)
    ///
    /// Returns default configuration if no config file is found.
    #[must_use]
    pub fn load_default() -> Self {
        let Some(base_dirs) = directories::BaseDirs::new() else {
            return Self::default();
        };

        let platform_config = base_dirs.config_dir().join("dotstore").join("config.toml");
        if platform_config.exists() {
            if let Ok(config) = Self::load_from_file(&platform_config) {
                return config;
            }
        }

        let xdg_config = base_dirs
            .home_dir()
            .join(".config")
            .join("dotstore")
            .join("config.toml");
        if xdg_config.exists() {
            if let Ok(config) = Self::load_from_file(&xdg_config) {
                return config;
            }
        }

        Self::default()
    }

    /// Converts a `ConfigFile` to `StoreConfig`.
    fn from_config_file(file: &ConfigFile) -> Self {
        let mut config = Self::default();

        let wants_postgres = file.backend.as_deref() == Some("postgres");
        if wants_postgres {
            let url = file
                .postgres_url
                .clone()
                .unwrap_or_else(|| "postgresql://localhost/dotstore".to_string());
            config.backend = BackendKind::Postgres { url };
        } else if let Some(path) = &file.sqlite_path {
            config.backend = BackendKind::Sqlite {
                path: PathBuf::from(path),
            };
        }

        if let Some(table) = &file.table {
            config.table = table.clone();
        }
        config.pool_max_size = file.pool_max_size;

        config
    }

    /// Sets the `SQLite` backend with a database path.
    #[must_use]
    pub fn with_sqlite(mut self, path: impl Into<PathBuf>) -> Self {
        self.backend = BackendKind::Sqlite { path: path.into() };
        self
    }

    /// Sets the PostgreSQL backend with a connection URL.
    #[must_use]
    pub fn with_postgres(mut self, url: impl Into<String>) -> Self {
        self.backend = BackendKind::Postgres { url: url.into() };
        self
    }

    /// Sets the table name.
    #[must_use]
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }
}
