//! Project settings resolution
//!
//! The host hands us an untyped, namespaced payload. Everything below the
//! `php.php_integrator` key is deserialized into [`ProjectSettings`] at exactly
//! one place ([`SettingsResolver::resolve`]); the rest of the crate only ever
//! sees the typed structure.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use tracing::{debug, trace};

use crate::project::error::ProjectError;
use crate::project::model::{Project, SettingsPayload};

/// Key of the settings namespace owned by PHP tooling in the project payload
pub const SETTINGS_NAMESPACE: &str = "php";

/// Key of the enable switch inside [`SETTINGS_NAMESPACE`]
pub const ENABLED_KEY: &str = "enabled";

/// Key of the indexing settings subtree inside [`SETTINGS_NAMESPACE`]
pub const CORE_SETTINGS_KEY: &str = "php_integrator";

/// PHP version assumed for freshly set up projects
pub const DEFAULT_PHP_VERSION: f64 = 7.1;

/// Extension indexed by default
pub const DEFAULT_FILE_EXTENSION: &str = "php";

/// PHP version as written in the settings payload
///
/// Hosts write either a number (`7.4`) or a string (`"7.4"`); both are accepted
/// at deserialization time and checked by [`SettingsResolver::validate`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PhpVersion {
    Number(f64),
    Text(String),
}

impl PhpVersion {
    /// Numeric value of the version, if it parses as a finite number
    pub fn as_f64(&self) -> Option<f64> {
        let value = match self {
            PhpVersion::Number(number) => *number,
            PhpVersion::Text(text) => text.trim().parse::<f64>().ok()?,
        };
        value.is_finite().then_some(value)
    }
}

impl fmt::Display for PhpVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PhpVersion::Number(number) => write!(f, "{number}"),
            PhpVersion::Text(text) => f.write_str(text),
        }
    }
}

/// Indexing settings of a single project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSettings {
    /// Target PHP version
    pub php_version: PhpVersion,

    /// Exclusion rules, see [`ExcludedPathResolver`](crate::project::ExcludedPathResolver)
    #[serde(default)]
    pub excluded_paths: Vec<String>,

    /// Extensions (without dot) of files to index
    #[serde(default)]
    pub file_extensions: Vec<String>,
}

impl Default for ProjectSettings {
    fn default() -> Self {
        Self {
            php_version: PhpVersion::Number(DEFAULT_PHP_VERSION),
            excluded_paths: Vec::new(),
            file_extensions: vec![DEFAULT_FILE_EXTENSION.to_string()],
        }
    }
}

/// Reads, validates and initializes the indexing settings of projects
#[derive(Debug, Clone, Copy, Default)]
pub struct SettingsResolver;

impl SettingsResolver {
    /// Settings a project receives when it is set up
    ///
    /// A fresh value is built on every call, so callers may mutate it freely.
    pub fn default_settings() -> ProjectSettings {
        ProjectSettings::default()
    }

    /// Build the payload that enables indexing for `project` with default settings
    ///
    /// The project itself is left untouched; persisting the returned payload is
    /// up to the caller. Other keys of the PHP namespace are kept. Fails if the
    /// namespace already holds indexing settings.
    pub fn set_up(project: &Project) -> Result<SettingsPayload, ProjectError> {
        let payload = project.settings_payload();
        let existing = payload.get(SETTINGS_NAMESPACE);
        if existing
            .and_then(|namespace| namespace.get(CORE_SETTINGS_KEY))
            .is_some()
        {
            return Err(ProjectError::AlreadyInitialized {
                title: project.title().to_string(),
            });
        }

        let core = serde_json::to_value(Self::default_settings()).map_err(|source| {
            ProjectError::InvalidSettings {
                title: project.title().to_string(),
                source,
            }
        })?;

        let mut namespace = match existing {
            Some(Value::Object(namespace)) => namespace.clone(),
            _ => Map::new(),
        };
        namespace.insert(ENABLED_KEY.to_string(), Value::Bool(true));
        namespace.insert(CORE_SETTINGS_KEY.to_string(), core);

        let mut merged = payload.clone();
        merged.insert(SETTINGS_NAMESPACE.to_string(), Value::Object(namespace));

        debug!("Prepared default PHP settings for project '{}'", project.title());
        Ok(merged)
    }

    /// Typed indexing settings of `project`, or `None` when it has none
    pub fn resolve(project: &Project) -> Result<Option<ProjectSettings>, ProjectError> {
        let core = project
            .settings_payload()
            .get(SETTINGS_NAMESPACE)
            .and_then(|namespace| namespace.get(CORE_SETTINGS_KEY));

        let core = match core {
            Some(Value::Null) | None => {
                trace!("Project '{}' has no indexing settings", project.title());
                return Ok(None);
            }
            Some(core) => core,
        };

        ProjectSettings::deserialize(core)
            .map(Some)
            .map_err(|source| ProjectError::InvalidSettings {
                title: project.title().to_string(),
                source,
            })
    }

    /// Check that `project` has usable indexing settings and return them
    pub fn validate(project: &Project) -> Result<ProjectSettings, ProjectError> {
        let settings = Self::resolve(project)?.ok_or_else(|| ProjectError::MissingSettings {
            title: project.title().to_string(),
        })?;

        if settings.php_version.as_f64().is_none() {
            return Err(ProjectError::InvalidVersion {
                title: project.title().to_string(),
                value: settings.php_version.to_string(),
            });
        }

        Ok(settings)
    }

    /// Whether PHP tooling is switched on for `project`
    pub fn is_enabled(project: &Project) -> bool {
        project
            .settings_payload()
            .get(SETTINGS_NAMESPACE)
            .and_then(|namespace| namespace.get(ENABLED_KEY))
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}
