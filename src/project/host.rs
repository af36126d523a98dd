//! Host implementations that live inside this crate

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::trace;

use crate::project::model::{ProjectHost, RepositoryStatusChanged};

#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("No repository found for {path}")]
    NoRepository { path: PathBuf },
}

/// Host without version-control integration
///
/// Every repository subscription fails with [`HostError::NoRepository`], so a
/// project loaded through it is only ever reindexed on explicit request. Used
/// by the command-line driver.
#[derive(Debug, Clone, Copy, Default)]
pub struct DetachedHost;

#[async_trait]
impl ProjectHost for DetachedHost {
    async fn watch_repository_status(
        &self,
        root_path: &Path,
    ) -> Result<mpsc::Receiver<RepositoryStatusChanged>, HostError> {
        trace!("Detached host has no repository for {}", root_path.display());
        Err(HostError::NoRepository {
            path: root_path.to_path_buf(),
        })
    }
}
