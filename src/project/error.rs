use thiserror::Error;

/// Configuration errors raised while setting up, validating or resolving a project
///
/// These are fatal to the operation that raised them and are never retried.
#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("Project '{title}' is already initialized for PHP indexing")]
    AlreadyInitialized { title: String },

    #[error("Project '{title}' has no PHP indexing settings")]
    MissingSettings { title: String },

    #[error("Invalid PHP version '{value}' in settings of project '{title}'")]
    InvalidVersion { title: String, value: String },

    #[error("Excluded path '{rule}' references root path {index}, but the project only has {root_count}")]
    InvalidPathIndex {
        rule: String,
        index: String,
        root_count: usize,
    },

    #[error("Malformed PHP indexing settings in project '{title}': {source}")]
    InvalidSettings {
        title: String,
        #[source]
        source: serde_json::Error,
    },
}
