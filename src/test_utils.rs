//! Test utilities and global setup
//!
//! Provides centralized test logging configuration and project fixtures.

/// Test logging utilities
#[cfg(all(test, feature = "test-logging"))]
pub mod logging {
    use std::sync::Once;
    use tracing_subscriber::{EnvFilter, fmt};

    static INIT: Once = Once::new();

    /// Initialize test logging globally - safe to call multiple times
    ///
    /// Respects `RUST_LOG`, defaulting to debug output for this crate:
    ///
    /// ```bash
    /// RUST_LOG=php_index_coordinator::index=trace cargo test --features test-logging
    /// ```
    pub fn init() {
        INIT.call_once(|| {
            let env_filter = EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("debug,tokio=info"));

            fmt()
                .with_env_filter(env_filter)
                .with_test_writer()
                .with_target(true)
                .with_thread_ids(true)
                .compact()
                .try_init()
                .ok();
        });
    }
}

/// Projects in the shapes tests need
#[cfg(test)]
pub mod fixtures {
    use serde_json::{Map, Value, json};
    use std::path::PathBuf;

    use crate::project::Project;

    fn project(roots: &[&str], settings: Value) -> Project {
        let payload = match settings {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Project::new(
            "demo",
            roots.iter().map(PathBuf::from).collect(),
            payload,
        )
    }

    /// Enabled project with default settings and the given exclusion rules
    pub fn indexed_project(roots: &[&str], excluded_paths: &[&str]) -> Project {
        project(
            roots,
            json!({
                "php": {
                    "enabled": true,
                    "php_integrator": {
                        "phpVersion": 7.1,
                        "excludedPaths": excluded_paths,
                        "fileExtensions": ["php"]
                    }
                }
            }),
        )
    }

    /// Enabled project with the given (possibly invalid) PHP version
    pub fn project_with_version(roots: &[&str], version: &str) -> Project {
        project(
            roots,
            json!({
                "php": {
                    "enabled": true,
                    "php_integrator": { "phpVersion": version }
                }
            }),
        )
    }

    /// Enabled project lacking the indexing settings subtree
    pub fn unconfigured_project(roots: &[&str]) -> Project {
        project(roots, json!({ "php": { "enabled": true } }))
    }

    pub fn disabled_project(roots: &[&str]) -> Project {
        project(
            roots,
            json!({
                "php": {
                    "enabled": false,
                    "php_integrator": { "phpVersion": 7.1 }
                }
            }),
        )
    }
}
