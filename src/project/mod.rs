//! Project model and settings
//!
//! This module covers everything the coordinator needs to know about a project:
//! the host-owned [`Project`] itself, its typed indexing settings, and the
//! resolution of exclusion rules into concrete paths.

pub mod error;
pub mod excluded_paths;
pub mod host;
pub mod model;
pub mod settings;

pub use error::ProjectError;
pub use excluded_paths::ExcludedPathResolver;
pub use host::{DetachedHost, HostError};
pub use model::{Project, ProjectHost, RepositoryStatusChanged, SettingsPayload};
pub use settings::{PhpVersion, ProjectSettings, SettingsResolver};
