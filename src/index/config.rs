//! Configuration for the process-backed indexing engine
//!
//! Provides ProcessEngineConfig with a builder that validates the indexer
//! script and database directory before the first request is made.

use std::path::{Path, PathBuf};

// ============================================================================
// Configuration Constants
// ============================================================================

/// Interpreter used when none is configured
pub const DEFAULT_PHP_BINARY: &str = "php";

/// Memory limit handed to the indexer process, in megabytes
///
/// Full project passes over large vendor trees need considerably more than
/// PHP's default of 128M.
pub const DEFAULT_MEMORY_LIMIT_MB: u32 = 1024;

/// Extension of index database files
pub const DATABASE_EXTENSION: &str = "sqlite";

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum EngineConfigError {
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Indexer script not found: {path}")]
    ScriptNotFound { path: PathBuf },

    #[error("Database directory is not a directory: {path}")]
    InvalidDatabaseDirectory { path: PathBuf },

    #[error("Memory limit must be positive")]
    InvalidMemoryLimit,
}

impl EngineConfigError {
    pub fn missing_field(field: impl Into<String>) -> Self {
        EngineConfigError::MissingField {
            field: field.into(),
        }
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// Settings of [`ProcessIndexEngine`](crate::index::ProcessIndexEngine)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessEngineConfig {
    /// PHP interpreter to run the indexer with
    pub php_binary: String,

    /// Entry script of the indexer
    pub core_script: PathBuf,

    /// Directory holding one database per project
    pub database_dir: PathBuf,

    pub memory_limit_mb: u32,
}

impl ProcessEngineConfig {
    /// Database file used for index namespace `name`
    pub fn database_path(&self, name: &str) -> PathBuf {
        self.database_dir
            .join(format!("{}.{}", name, DATABASE_EXTENSION))
    }
}

/// Builder for ProcessEngineConfig with validation and defaults
#[derive(Debug, Default)]
pub struct ProcessEngineConfigBuilder {
    php_binary: Option<String>,
    core_script: Option<PathBuf>,
    database_dir: Option<PathBuf>,
    memory_limit_mb: Option<u32>,
}

impl ProcessEngineConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the PHP interpreter
    pub fn php_binary(mut self, binary: impl Into<String>) -> Self {
        self.php_binary = Some(binary.into());
        self
    }

    /// Set the indexer entry script
    pub fn core_script(mut self, path: impl Into<PathBuf>) -> Self {
        self.core_script = Some(path.into());
        self
    }

    /// Set the directory index databases are stored in
    pub fn database_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.database_dir = Some(path.into());
        self
    }

    pub fn memory_limit_mb(mut self, limit: u32) -> Self {
        self.memory_limit_mb = Some(limit);
        self
    }

    /// Build the configuration with validation
    pub fn build(self) -> Result<ProcessEngineConfig, EngineConfigError> {
        let core_script = self
            .core_script
            .ok_or_else(|| EngineConfigError::missing_field("core_script"))?;
        let database_dir = self
            .database_dir
            .ok_or_else(|| EngineConfigError::missing_field("database_dir"))?;
        let memory_limit_mb = self.memory_limit_mb.unwrap_or(DEFAULT_MEMORY_LIMIT_MB);
        let php_binary = self
            .php_binary
            .unwrap_or_else(|| DEFAULT_PHP_BINARY.to_string());

        Self::validate_core_script(&core_script)?;
        Self::validate_database_dir(&database_dir)?;
        if memory_limit_mb == 0 {
            return Err(EngineConfigError::InvalidMemoryLimit);
        }

        Ok(ProcessEngineConfig {
            php_binary,
            core_script,
            database_dir,
            memory_limit_mb,
        })
    }

    fn validate_core_script(path: &Path) -> Result<(), EngineConfigError> {
        if !path.is_file() {
            return Err(EngineConfigError::ScriptNotFound {
                path: path.to_path_buf(),
            });
        }
        Ok(())
    }

    /// The directory may not exist yet; it must not be something else
    fn validate_database_dir(path: &Path) -> Result<(), EngineConfigError> {
        if path.exists() && !path.is_dir() {
            return Err(EngineConfigError::InvalidDatabaseDirectory {
                path: path.to_path_buf(),
            });
        }
        Ok(())
    }
}
