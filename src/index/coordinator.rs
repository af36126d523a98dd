//! Single-flight coordination of project and file indexing
//!
//! The coordinator owns the only mutable indexing state in the crate:
//! - per project, whether a full (project-wide) index is in flight
//! - per file, whether a file index is in flight and the latest source that
//!   arrived while it was
//!
//! State is kept behind a synchronous mutex that is never held across an
//! `.await`; in-flight flags are released by scoped guards, so they return to
//! idle whether the engine call succeeds, fails, or the calling future is
//! dropped midway.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tracing::{Level, debug, info, instrument, trace, warn};

use crate::index::engine::{IndexEngine, IndexEngineError, ReindexRequest};
use crate::project::{ExcludedPathResolver, Project, ProjectError, SettingsResolver};

/// Result of an indexing attempt
#[derive(Debug, Clone)]
pub enum IndexOutcome {
    /// Dropped because a project-wide index was already in flight
    Skipped,
    /// Absorbed into the in-flight index of the same file
    Coalesced,
    /// The engine settled successfully
    Indexed,
    /// The engine settled with a failure; in-flight state was released regardless
    Failed(IndexEngineError),
}

impl IndexOutcome {
    /// Whether this attempt ended up calling the engine
    pub fn reached_engine(&self) -> bool {
        matches!(self, IndexOutcome::Indexed | IndexOutcome::Failed(_))
    }
}

impl From<Result<(), IndexEngineError>> for IndexOutcome {
    fn from(result: Result<(), IndexEngineError>) -> Self {
        match result {
            Ok(()) => IndexOutcome::Indexed,
            Err(error) => IndexOutcome::Failed(error),
        }
    }
}

/// Snapshot of project-wide indexing state
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectIndexStatus {
    /// A full index is currently in flight
    pub indexing: bool,
    pub last_started_at: Option<DateTime<Utc>>,
    pub last_settled_at: Option<DateTime<Utc>>,
    /// Failure of the last settled full index, if it failed
    pub last_error: Option<String>,
}

/// A file index request that arrived while the same file was being indexed
#[derive(Debug)]
struct PendingRequest {
    source: Option<String>,
}

#[derive(Debug, Default)]
struct FileIndexEntry {
    in_flight: bool,
    // Only ever Some while in_flight; newer requests overwrite older ones
    pending: Option<PendingRequest>,
}

#[derive(Debug, Default)]
struct CoordinatorState {
    projects: HashMap<String, ProjectIndexStatus>,
    // Entries live for the lifetime of the coordinator
    files: HashMap<PathBuf, FileIndexEntry>,
}

impl CoordinatorState {
    fn is_project_indexing(&self, project: &str) -> bool {
        self.projects
            .get(project)
            .is_some_and(|status| status.indexing)
    }
}

fn lock(state: &Mutex<CoordinatorState>) -> MutexGuard<'_, CoordinatorState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Engine arguments derived from a project's current settings
struct IndexParameters {
    excluded_paths: Vec<PathBuf>,
    file_extensions: Vec<String>,
}

/// Holds the project-wide in-flight flag for the duration of a full index
struct ProjectFlight<'a> {
    state: &'a Mutex<CoordinatorState>,
    project: String,
    error: Option<String>,
}

impl<'a> ProjectFlight<'a> {
    fn acquire(state: &'a Mutex<CoordinatorState>, project: &str) -> Option<Self> {
        let mut guard = lock(state);
        let status = guard.projects.entry(project.to_string()).or_default();
        if status.indexing {
            return None;
        }
        status.indexing = true;
        status.last_started_at = Some(Utc::now());

        Some(Self {
            state,
            project: project.to_string(),
            error: None,
        })
    }

    fn record_error(&mut self, error: impl ToString) {
        self.error = Some(error.to_string());
    }
}

impl Drop for ProjectFlight<'_> {
    fn drop(&mut self) {
        let mut state = lock(self.state);
        if let Some(status) = state.projects.get_mut(&self.project) {
            status.indexing = false;
            status.last_settled_at = Some(Utc::now());
            status.last_error = self.error.take();
        }
    }
}

/// What a file flight does once its engine call settled
enum Settlement {
    /// Flag released, nothing left to do
    Idle,
    /// A coalesced request is waiting; the flag stays held for it
    FollowUp(Option<String>),
}

/// Holds a file's in-flight flag across the drain loop
struct FileFlight<'a> {
    state: &'a Mutex<CoordinatorState>,
    project: &'a str,
    file: &'a Path,
    armed: bool,
}

impl FileFlight<'_> {
    fn settle(&mut self) -> Settlement {
        let mut state = lock(self.state);
        let project_indexing = state.is_project_indexing(self.project);

        let Some(entry) = state.files.get_mut(self.file) else {
            self.armed = false;
            return Settlement::Idle;
        };

        match entry.pending.take() {
            Some(pending) if !project_indexing => Settlement::FollowUp(pending.source),
            pending => {
                if pending.is_some() {
                    debug!(
                        "Dropping coalesced request for {}: project index in flight",
                        self.file.display()
                    );
                }
                entry.in_flight = false;
                self.armed = false;
                Settlement::Idle
            }
        }
    }
}

impl Drop for FileFlight<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut state = lock(self.state);
        if let Some(entry) = state.files.get_mut(self.file) {
            entry.in_flight = false;
            entry.pending = None;
        }
    }
}

/// Decides whether indexing requests start, coalesce, or are dropped
pub struct IndexCoordinator {
    engine: Arc<dyn IndexEngine>,
    excluded_paths: ExcludedPathResolver,
    state: Mutex<CoordinatorState>,
}

impl IndexCoordinator {
    pub fn new(engine: Arc<dyn IndexEngine>) -> Self {
        Self {
            engine,
            excluded_paths: ExcludedPathResolver::default(),
            state: Mutex::new(CoordinatorState::default()),
        }
    }

    /// Run a full index of `project` unless one is already in flight
    ///
    /// The engine is asked to vacuum first and reindex all root paths after;
    /// a vacuum failure ends the attempt without reindexing.
    #[instrument(name = "attempt_project_index", skip_all, fields(project = project.title()))]
    pub async fn attempt_project_index(
        &self,
        project: &Project,
    ) -> Result<IndexOutcome, ProjectError> {
        self.run_full_index(project, false).await
    }

    /// Create the index database of `project`, then run a full index
    ///
    /// Shares the single-flight guard with [`Self::attempt_project_index`].
    #[instrument(name = "initialize_project", skip_all, fields(project = project.title()))]
    pub async fn initialize_project(
        &self,
        project: &Project,
    ) -> Result<IndexOutcome, ProjectError> {
        self.run_full_index(project, true).await
    }

    /// Index a single file, coalescing with an in-flight index of the same file
    ///
    /// Returns [`IndexOutcome::Skipped`] while a project-wide index is running,
    /// and [`IndexOutcome::Coalesced`] when the request was folded into the
    /// running one (which will pick up `source` once it settles). Otherwise the
    /// outcome of the last engine call made for the file is returned.
    #[instrument(
        name = "attempt_file_index",
        skip_all,
        fields(project = project.title(), file = %file.display())
    )]
    pub async fn attempt_file_index(
        &self,
        project: &Project,
        file: &Path,
        source: Option<String>,
    ) -> Result<IndexOutcome, ProjectError> {
        let mut source = {
            let mut state = lock(&self.state);
            if state.is_project_indexing(project.title()) {
                debug!("Project index in flight, skipping file index");
                return Ok(IndexOutcome::Skipped);
            }

            let entry = state.files.entry(file.to_path_buf()).or_default();
            if entry.in_flight {
                trace!("File index in flight, coalescing request");
                entry.pending = Some(PendingRequest { source });
                return Ok(IndexOutcome::Coalesced);
            }
            entry.in_flight = true;
            source
        };

        let mut flight = FileFlight {
            state: &self.state,
            project: project.title(),
            file,
            armed: true,
        };

        loop {
            let parameters = self.parameters(project)?;
            let request = ReindexRequest {
                paths: vec![file.to_path_buf()],
                source,
                excluded_paths: parameters.excluded_paths,
                file_extensions: parameters.file_extensions,
            };

            let result = self.engine.reindex(request).await;
            if let Err(error) = &result {
                warn!("File index failed for {}: {}", file.display(), error);
            }

            match flight.settle() {
                Settlement::FollowUp(next) => {
                    debug!("Indexing coalesced follow-up for {}", file.display());
                    source = next;
                }
                Settlement::Idle => return Ok(result.into()),
            }
        }
    }

    /// Snapshot of the project-wide indexing state of `project`
    pub fn project_status(&self, project: &Project) -> ProjectIndexStatus {
        lock(&self.state)
            .projects
            .get(project.title())
            .cloned()
            .unwrap_or_default()
    }

    pub fn is_project_indexing(&self, project: &Project) -> bool {
        lock(&self.state).is_project_indexing(project.title())
    }

    pub fn is_file_in_flight(&self, file: &Path) -> bool {
        lock(&self.state)
            .files
            .get(file)
            .is_some_and(|entry| entry.in_flight)
    }

    async fn run_full_index(
        &self,
        project: &Project,
        initialize: bool,
    ) -> Result<IndexOutcome, ProjectError> {
        let Some(mut flight) = ProjectFlight::acquire(&self.state, project.title()) else {
            debug!("Project index already in flight, skipping");
            return Ok(IndexOutcome::Skipped);
        };

        let parameters = match self.parameters(project) {
            Ok(parameters) => parameters,
            Err(error) => {
                flight.record_error(&error);
                return Err(error);
            }
        };

        info!(
            "Indexing project '{}' ({} root paths)",
            project.title(),
            project.root_paths().len()
        );
        let started = Instant::now();
        let result = self.full_index(project, parameters, initialize).await;
        crate::log_timing!(Level::INFO, "project_index", started.elapsed());

        match &result {
            Ok(()) => info!("Project '{}' indexed", project.title()),
            Err(error) => {
                warn!("Project '{}' index failed: {}", project.title(), error);
                flight.record_error(error);
            }
        }

        Ok(result.into())
    }

    async fn full_index(
        &self,
        project: &Project,
        parameters: IndexParameters,
        initialize: bool,
    ) -> Result<(), IndexEngineError> {
        if initialize {
            self.engine.initialize().await?;
        }
        self.engine.vacuum().await?;
        self.engine
            .reindex(ReindexRequest {
                paths: project.root_paths().to_vec(),
                source: None,
                excluded_paths: parameters.excluded_paths,
                file_extensions: parameters.file_extensions,
            })
            .await
    }

    fn parameters(&self, project: &Project) -> Result<IndexParameters, ProjectError> {
        let settings =
            SettingsResolver::resolve(project)?.ok_or_else(|| ProjectError::MissingSettings {
                title: project.title().to_string(),
            })?;

        let excluded_paths = self
            .excluded_paths
            .resolve(project.root_paths(), &settings.excluded_paths)?;

        Ok(IndexParameters {
            excluded_paths,
            file_extensions: settings.file_extensions,
        })
    }
}
