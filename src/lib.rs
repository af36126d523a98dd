//! Indexing coordination for PHP projects
//!
//! - [`project`]: project model, settings resolution and exclusion rules
//! - [`index`]: the engine contract and the coordinator that gates calls to it
//! - [`manager`]: the active-project façade used by the surrounding package

pub mod index;
pub mod logging;
pub mod manager;
pub mod project;

#[cfg(test)]
mod test_utils;

pub use index::{IndexCoordinator, IndexEngine, IndexOutcome, ProcessIndexEngine};
pub use manager::ProjectManager;
pub use project::{Project, ProjectError, ProjectSettings, SettingsResolver};

