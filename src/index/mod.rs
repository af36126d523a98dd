//! Indexing coordination
//!
//! - `engine`: the contract of the external indexing engine
//! - `coordinator`: single-flight gating and per-file request coalescing
//! - `config` / `process`: an engine that runs an external indexer per request

pub mod config;
pub mod coordinator;
pub mod engine;
pub mod process;

#[cfg(test)]
pub mod testing;

pub use config::{EngineConfigError, ProcessEngineConfig, ProcessEngineConfigBuilder};
pub use coordinator::{IndexCoordinator, IndexOutcome, ProjectIndexStatus};
pub use engine::{IndexEngine, IndexEngineError, ReindexRequest};
pub use process::ProcessIndexEngine;
