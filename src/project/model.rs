//! Host-side project model
//!
//! A [`Project`] is owned by the host environment; this crate only ever reads it.
//! The [`ProjectHost`] trait is the narrow slice of the host that the coordinator
//! needs beyond the project itself: path containment and repository status
//! notifications.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;

use crate::project::host::HostError;

/// Raw, namespaced settings payload attached to a project by the host
pub type SettingsPayload = Map<String, Value>;

/// Project as reported by the host environment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    /// Human readable title, also used as the index database name
    title: String,

    /// Ordered absolute root directories of the project
    root_paths: Vec<PathBuf>,

    /// Namespaced settings payload (e.g. `{"php": {...}}`)
    #[serde(default)]
    settings: SettingsPayload,
}

impl Project {
    pub fn new(
        title: impl Into<String>,
        root_paths: Vec<PathBuf>,
        settings: SettingsPayload,
    ) -> Self {
        Self {
            title: title.into(),
            root_paths,
            settings,
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn root_paths(&self) -> &[PathBuf] {
        &self.root_paths
    }

    pub fn settings_payload(&self) -> &SettingsPayload {
        &self.settings
    }

    /// Replace the settings payload, e.g. with the result of
    /// [`SettingsResolver::set_up`](crate::project::SettingsResolver::set_up)
    pub fn with_settings(mut self, settings: SettingsPayload) -> Self {
        self.settings = settings;
        self
    }
}

/// Notification that the version-control status under a root path changed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryStatusChanged {
    pub root_path: PathBuf,
}

/// Host environment services used by the project manager
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProjectHost: Send + Sync {
    /// Subscribe to repository status changes for the repository containing `root_path`
    ///
    /// Fails with [`HostError::NoRepository`] when no repository exists there,
    /// which callers treat as an expected outcome.
    async fn watch_repository_status(
        &self,
        root_path: &Path,
    ) -> Result<mpsc::Receiver<RepositoryStatusChanged>, HostError>;

    /// Whether `path` lies inside `directory`
    fn directory_contains(&self, directory: &Path, path: &Path) -> bool {
        path.starts_with(directory)
    }
}
