//! Indexing engine backed by an external indexer process
//!
//! Each engine call runs the indexer once:
//!
//! ```text
//! php -d memory_limit=1024M <core_script> --database=<dir>/<name>.sqlite <operation args>
//! ```
//!
//! In-memory sources are streamed through stdin. The exit status decides
//! success; stderr is carried in the error on failure.

use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Mutex, PoisonError};
use std::time::Instant;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{Level, debug, info, trace};

use crate::index::config::ProcessEngineConfig;
use crate::index::engine::{IndexEngine, IndexEngineError, ReindexRequest};

pub struct ProcessIndexEngine {
    config: ProcessEngineConfig,
    database_name: Mutex<Option<String>>,
}

impl ProcessIndexEngine {
    pub fn new(config: ProcessEngineConfig) -> Self {
        Self {
            config,
            database_name: Mutex::new(None),
        }
    }

    /// Database file of the currently selected index, if one was selected
    pub fn database_path(&self) -> Option<PathBuf> {
        self.database_name
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_deref()
            .map(|name| self.config.database_path(name))
    }

    /// Operation arguments of a reindex request
    pub fn reindex_args(request: &ReindexRequest) -> Vec<String> {
        let mut args = vec!["--reindex".to_string()];
        args.extend(
            request
                .paths
                .iter()
                .map(|path| format!("--source={}", path.display())),
        );
        if request.source.is_some() {
            args.push("--stdin".to_string());
        }
        args.extend(
            request
                .excluded_paths
                .iter()
                .map(|path| format!("--exclude={}", path.display())),
        );
        args.extend(
            request
                .file_extensions
                .iter()
                .map(|extension| format!("--extension={}", extension)),
        );
        args
    }

    /// Full argument list passed to the PHP interpreter
    fn command_args(&self, database: &Path, operation: Vec<String>) -> Vec<String> {
        let mut args = vec![
            "-d".to_string(),
            format!("memory_limit={}M", self.config.memory_limit_mb),
            self.config.core_script.display().to_string(),
            format!("--database={}", database.display()),
        ];
        args.extend(operation);
        args
    }

    async fn run(
        &self,
        operation: Vec<String>,
        stdin: Option<String>,
    ) -> Result<(), IndexEngineError> {
        let database = self.database_path().ok_or(IndexEngineError::NoDatabase)?;
        tokio::fs::create_dir_all(&self.config.database_dir).await?;

        let args = self.command_args(&database, operation);
        debug!("Running indexer: {} {:?}", self.config.php_binary, args);

        let started = Instant::now();
        let mut child = Command::new(&self.config.php_binary)
            .args(&args)
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let pipe = child.stdin.take();
        let write_source = async move {
            match (pipe, stdin) {
                (Some(mut pipe), Some(source)) => {
                    pipe.write_all(source.as_bytes()).await?;
                    pipe.shutdown().await
                }
                _ => Ok(()),
            }
        };

        let (written, output) = tokio::join!(write_source, child.wait_with_output());
        let output = output?;
        crate::log_timing!(Level::DEBUG, "indexer_process", started.elapsed());

        if !output.status.success() {
            return Err(IndexEngineError::Failed {
                status: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        match written {
            // The indexer may exit successfully without draining stdin
            Err(error) if error.kind() != io::ErrorKind::BrokenPipe => return Err(error.into()),
            _ => {}
        }

        trace!(
            "Indexer output: {}",
            String::from_utf8_lossy(&output.stdout).trim()
        );
        Ok(())
    }
}

#[async_trait]
impl IndexEngine for ProcessIndexEngine {
    async fn initialize(&self) -> Result<(), IndexEngineError> {
        self.run(vec!["--initialize".to_string()], None).await
    }

    async fn vacuum(&self) -> Result<(), IndexEngineError> {
        self.run(vec!["--vacuum".to_string()], None).await
    }

    async fn reindex(&self, request: ReindexRequest) -> Result<(), IndexEngineError> {
        let args = Self::reindex_args(&request);
        self.run(args, request.source).await
    }

    fn set_index_database_name(&self, name: &str) {
        info!("Using index database '{}'", name);
        *self
            .database_name
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(name.to_string());
    }
}
