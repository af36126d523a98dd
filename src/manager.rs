//! Active project management
//!
//! [`ProjectManager`] is the entry point used by the surrounding package. It
//! tracks the active project (weakly; the host owns it), wires repository
//! status notifications to full reindexing, and forwards everything else to
//! the [`IndexCoordinator`] and [`SettingsResolver`] bound to the active
//! project.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, trace, warn};

use crate::index::{IndexCoordinator, IndexEngine, IndexOutcome, ProjectIndexStatus};
use crate::project::{
    Project, ProjectError, ProjectHost, ProjectSettings, SettingsPayload, SettingsResolver,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct ProjectManager {
    engine: Arc<dyn IndexEngine>,
    host: Arc<dyn ProjectHost>,
    coordinator: Arc<IndexCoordinator>,
    active_project: Mutex<Option<Weak<Project>>>,
    /// Repository status listeners of the active project
    subscriptions: Mutex<Vec<JoinHandle<()>>>,
}

impl ProjectManager {
    pub fn new(engine: Arc<dyn IndexEngine>, host: Arc<dyn ProjectHost>) -> Self {
        let coordinator = Arc::new(IndexCoordinator::new(Arc::clone(&engine)));
        Self {
            engine,
            host,
            coordinator,
            active_project: Mutex::new(None),
            subscriptions: Mutex::new(Vec::new()),
        }
    }

    pub fn coordinator(&self) -> &Arc<IndexCoordinator> {
        &self.coordinator
    }

    /// Make `project` the active project
    ///
    /// The previous project is deactivated first. A project with PHP tooling
    /// disabled stays inactive without error; one whose settings fail
    /// validation stays inactive and the validation error is returned.
    ///
    /// Repository subscriptions are made on tasks of the current Tokio
    /// runtime; outside a runtime the project is activated unwatched.
    #[instrument(name = "load_project", skip_all, fields(project = project.title()))]
    pub fn load(&self, project: &Arc<Project>) -> Result<(), ProjectError> {
        self.deactivate();

        if !SettingsResolver::is_enabled(project) {
            info!("PHP indexing is disabled for project '{}'", project.title());
            return Ok(());
        }
        SettingsResolver::validate(project)?;

        *lock(&self.active_project) = Some(Arc::downgrade(project));
        self.engine.set_index_database_name(project.title());

        match Handle::try_current() {
            Ok(runtime) => {
                for root_path in project.root_paths() {
                    self.watch_repository(&runtime, project, root_path.clone());
                }
            }
            Err(_) => warn!(
                "No Tokio runtime, not watching repositories of '{}'",
                project.title()
            ),
        }

        info!(
            "Activated project '{}' with {} root paths",
            project.title(),
            project.root_paths().len()
        );
        Ok(())
    }

    pub fn active_project(&self) -> Option<Arc<Project>> {
        lock(&self.active_project)
            .as_ref()
            .and_then(Weak::upgrade)
    }

    pub fn has_active_project(&self) -> bool {
        self.active_project().is_some()
    }

    /// Payload enabling PHP indexing for `project`, to be persisted by the host
    pub fn set_up_project(&self, project: &Project) -> Result<SettingsPayload, ProjectError> {
        SettingsResolver::set_up(project)
    }

    pub fn default_project_settings(&self) -> ProjectSettings {
        SettingsResolver::default_settings()
    }

    /// Settings of the active project; `None` without an active project
    pub fn current_project_settings(&self) -> Result<Option<ProjectSettings>, ProjectError> {
        match self.active_project() {
            Some(project) => SettingsResolver::resolve(&project),
            None => Ok(None),
        }
    }

    pub fn current_project_status(&self) -> Option<ProjectIndexStatus> {
        self.active_project()
            .map(|project| self.coordinator.project_status(&project))
    }

    /// Whether `file` lies under one of the root paths of `project`
    pub fn is_file_part_of(&self, project: &Project, file: &Path) -> bool {
        project
            .root_paths()
            .iter()
            .any(|root| self.host.directory_contains(root, file))
    }

    pub fn is_file_part_of_current_project(&self, file: &Path) -> Option<bool> {
        self.active_project()
            .map(|project| self.is_file_part_of(&project, file))
    }

    pub async fn initialize_current_project(
        &self,
    ) -> Option<Result<IndexOutcome, ProjectError>> {
        let project = self.active_project()?;
        Some(self.coordinator.initialize_project(&project).await)
    }

    pub async fn attempt_current_project_index(
        &self,
    ) -> Option<Result<IndexOutcome, ProjectError>> {
        let project = self.active_project()?;
        Some(self.coordinator.attempt_project_index(&project).await)
    }

    pub async fn attempt_current_file_index(
        &self,
        file: &Path,
        source: Option<String>,
    ) -> Option<Result<IndexOutcome, ProjectError>> {
        let project = self.active_project()?;
        Some(
            self.coordinator
                .attempt_file_index(&project, file, source)
                .await,
        )
    }

    fn deactivate(&self) {
        *lock(&self.active_project) = None;
        for subscription in lock(&self.subscriptions).drain(..) {
            subscription.abort();
        }
    }

    /// Reindex `project` whenever the repository under `root_path` reports a
    /// status change. A root without a repository is silently left unwatched.
    fn watch_repository(&self, runtime: &Handle, project: &Arc<Project>, root_path: PathBuf) {
        let host = Arc::clone(&self.host);
        let coordinator = Arc::clone(&self.coordinator);
        let project = Arc::downgrade(project);

        let listener = runtime.spawn(async move {
            let mut statuses = match host.watch_repository_status(&root_path).await {
                Ok(statuses) => statuses,
                Err(error) => {
                    trace!("Not watching {}: {}", root_path.display(), error);
                    return;
                }
            };
            debug!("Watching repository status under {}", root_path.display());

            while let Some(change) = statuses.recv().await {
                let Some(project) = project.upgrade() else {
                    break;
                };
                debug!(
                    "Repository status changed under {}",
                    change.root_path.display()
                );

                // Fire and continue: a change during a running index is skipped
                let coordinator = Arc::clone(&coordinator);
                tokio::spawn(async move {
                    match coordinator.attempt_project_index(&project).await {
                        Ok(outcome) => trace!("Repository triggered index: {:?}", outcome),
                        Err(error) => warn!(
                            "Repository triggered index of '{}' failed: {}",
                            project.title(),
                            error
                        ),
                    }
                });
            }
        });

        lock(&self.subscriptions).push(listener);
    }
}

impl Drop for ProjectManager {
    fn drop(&mut self) {
        for subscription in lock(&self.subscriptions).drain(..) {
            subscription.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::ReindexRequest;
    use crate::index::testing::{ControlledEngine, EngineCall};
    use crate::project::model::{MockProjectHost, RepositoryStatusChanged};
    use crate::project::{DetachedHost, HostError};
    use crate::test_utils::fixtures::{
        disabled_project, indexed_project, project_with_version, unconfigured_project,
    };
    use std::time::Duration;
    use tokio::sync::mpsc;

    #[cfg(feature = "test-logging")]
    #[ctor::ctor]
    fn init_test_logging() {
        crate::test_utils::logging::init();
    }

    type Senders = Arc<Mutex<Vec<mpsc::Sender<RepositoryStatusChanged>>>>;

    /// Host with a repository under every root path listed in `with_repository`
    fn repository_host(with_repository: &[&str]) -> (MockProjectHost, Senders) {
        let senders: Senders = Arc::new(Mutex::new(Vec::new()));
        let roots: Vec<PathBuf> = with_repository.iter().map(PathBuf::from).collect();

        let mut host = MockProjectHost::new();
        let captured = Arc::clone(&senders);
        host.expect_watch_repository_status()
            .returning(move |root_path| {
                if roots.iter().any(|root| root == root_path) {
                    let (sender, receiver) = mpsc::channel(8);
                    captured.lock().unwrap().push(sender);
                    Ok(receiver)
                } else {
                    Err(HostError::NoRepository {
                        path: root_path.to_path_buf(),
                    })
                }
            });
        host.expect_directory_contains()
            .returning(|directory, path| path.starts_with(directory));

        (host, senders)
    }

    async fn wait_for_subscriptions(senders: &Senders, count: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while senders.lock().unwrap().len() < count {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("repository subscriptions were not made");
    }

    fn manager(
        engine: &Arc<ControlledEngine>,
        host: impl ProjectHost + 'static,
    ) -> Arc<ProjectManager> {
        Arc::new(ProjectManager::new(
            Arc::clone(engine) as Arc<dyn IndexEngine>,
            Arc::new(host),
        ))
    }

    #[tokio::test]
    async fn test_load_activates_valid_project() {
        let engine = Arc::new(ControlledEngine::immediate());
        let manager = manager(&engine, DetachedHost);
        let project = Arc::new(indexed_project(&["/proj"], &[]));

        manager.load(&project).unwrap();

        assert!(manager.has_active_project());
        assert!(Arc::ptr_eq(&manager.active_project().unwrap(), &project));
        assert_eq!(engine.calls(), vec![EngineCall::SetDatabase("demo".to_string())]);
    }

    #[tokio::test]
    async fn test_load_disabled_project_stays_inactive() {
        let engine = Arc::new(ControlledEngine::immediate());
        let manager = manager(&engine, DetachedHost);

        let first = Arc::new(indexed_project(&["/proj"], &[]));
        manager.load(&first).unwrap();
        assert!(manager.has_active_project());

        let disabled = Arc::new(disabled_project(&["/other"]));
        manager.load(&disabled).unwrap();

        assert!(!manager.has_active_project());
        assert!(manager.attempt_current_project_index().await.is_none());
        assert_eq!(engine.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_load_invalid_project_returns_error() {
        let engine = Arc::new(ControlledEngine::immediate());
        let manager = manager(&engine, DetachedHost);

        let result = manager.load(&Arc::new(project_with_version(&["/proj"], "abc")));

        assert!(matches!(result, Err(ProjectError::InvalidVersion { .. })));
        assert!(!manager.has_active_project());
        assert!(engine.calls().is_empty());
    }

    #[tokio::test]
    async fn test_active_project_is_weak() {
        let engine = Arc::new(ControlledEngine::immediate());
        let manager = manager(&engine, DetachedHost);
        let project = Arc::new(indexed_project(&["/proj"], &[]));

        manager.load(&project).unwrap();
        drop(project);

        assert!(manager.active_project().is_none());
        assert!(
            manager
                .attempt_current_file_index(Path::new("/proj/a.php"), None)
                .await
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_repository_status_change_triggers_full_index() {
        let engine = Arc::new(ControlledEngine::immediate());
        let (host, senders) = repository_host(&["/proj"]);
        let manager = manager(&engine, host);
        let project = Arc::new(indexed_project(&["/proj", "/libs"], &["{1}/cache"]));

        manager.load(&project).unwrap();
        wait_for_subscriptions(&senders, 1).await;

        let sender = senders.lock().unwrap()[0].clone();
        sender
            .send(RepositoryStatusChanged {
                root_path: PathBuf::from("/proj"),
            })
            .await
            .unwrap();
        engine.wait_for_calls(3).await;

        assert_eq!(
            engine.calls(),
            vec![
                EngineCall::SetDatabase("demo".to_string()),
                EngineCall::Vacuum,
                EngineCall::Reindex(ReindexRequest {
                    paths: vec![PathBuf::from("/proj"), PathBuf::from("/libs")],
                    source: None,
                    excluded_paths: vec![PathBuf::from("/libs/cache")],
                    file_extensions: vec!["php".to_string()],
                }),
            ]
        );
    }

    #[tokio::test]
    async fn test_reload_stops_previous_listeners() {
        let engine = Arc::new(ControlledEngine::immediate());
        let (host, senders) = repository_host(&["/proj"]);
        let manager = manager(&engine, host);

        let first = Arc::new(indexed_project(&["/proj"], &[]));
        manager.load(&first).unwrap();
        wait_for_subscriptions(&senders, 1).await;
        let previous = senders.lock().unwrap()[0].clone();

        let second = Arc::new(indexed_project(&["/elsewhere"], &[]));
        manager.load(&second).unwrap();
        assert!(Arc::ptr_eq(&manager.active_project().unwrap(), &second));

        tokio::time::timeout(Duration::from_secs(5), previous.closed())
            .await
            .expect("previous listener still running");
    }

    #[tokio::test]
    async fn test_overlapping_file_edits_after_load() {
        let engine = Arc::new(ControlledEngine::gated());
        let manager = manager(&engine, DetachedHost);
        let project = Arc::new(indexed_project(&["/proj", "/libs"], &[]));
        manager.load(&project).unwrap();

        let first = {
            let manager = Arc::clone(&manager);
            tokio::spawn(async move {
                manager
                    .attempt_current_file_index(Path::new("main.php"), Some("v1".to_string()))
                    .await
            })
        };
        // SetDatabase + the first reindex
        engine.wait_for_calls(2).await;

        let second = manager
            .attempt_current_file_index(Path::new("main.php"), Some("v2".to_string()))
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(second, IndexOutcome::Coalesced));

        engine.release(2);
        let first = first.await.unwrap().unwrap().unwrap();
        assert!(matches!(first, IndexOutcome::Indexed));

        let sources: Vec<_> = engine
            .reindex_calls()
            .into_iter()
            .map(|request| request.source)
            .collect();
        assert_eq!(sources, vec![Some("v1".to_string()), Some("v2".to_string())]);
    }

    #[tokio::test]
    async fn test_current_project_forwarding() {
        let engine = Arc::new(ControlledEngine::immediate());
        let (host, _senders) = repository_host(&[]);
        let manager = manager(&engine, host);

        assert!(manager.current_project_settings().unwrap().is_none());
        assert!(manager.current_project_status().is_none());
        assert!(manager.is_file_part_of_current_project(Path::new("/proj/a.php")).is_none());
        assert!(manager.initialize_current_project().await.is_none());

        let project = Arc::new(indexed_project(&["/proj", "/libs"], &[]));
        manager.load(&project).unwrap();

        assert_eq!(
            manager.current_project_settings().unwrap(),
            Some(ProjectSettings::default())
        );
        assert_eq!(
            manager.is_file_part_of_current_project(Path::new("/libs/src/a.php")),
            Some(true)
        );
        assert_eq!(
            manager.is_file_part_of_current_project(Path::new("/tmp/a.php")),
            Some(false)
        );

        let outcome = manager.initialize_current_project().await.unwrap().unwrap();
        assert!(matches!(outcome, IndexOutcome::Indexed));
        assert_eq!(engine.calls()[1], EngineCall::Initialize);

        let status = manager.current_project_status().unwrap();
        assert!(!status.indexing);
        assert!(status.last_settled_at.is_some());
    }

    #[tokio::test]
    async fn test_set_up_project() {
        let engine = Arc::new(ControlledEngine::immediate());
        let manager = manager(&engine, DetachedHost);
        let bare = Project::new("fresh", vec![PathBuf::from("/fresh")], SettingsPayload::new());

        let payload = manager.set_up_project(&bare).unwrap();
        let configured = Arc::new(bare.with_settings(payload));

        manager.load(&configured).unwrap();
        assert!(manager.has_active_project());
        assert_eq!(
            manager.current_project_settings().unwrap(),
            Some(manager.default_project_settings())
        );

        assert!(matches!(
            manager.set_up_project(&configured),
            Err(ProjectError::AlreadyInitialized { .. })
        ));
    }

    #[test]
    fn test_load_outside_runtime_skips_repository_watch() {
        let engine = Arc::new(ControlledEngine::immediate());
        let mut host = MockProjectHost::new();
        host.expect_watch_repository_status().times(0);
        let manager = manager(&engine, host);
        let project = Arc::new(indexed_project(&["/proj"], &[]));

        manager.load(&project).unwrap();

        assert!(manager.has_active_project());
        assert_eq!(engine.calls(), vec![EngineCall::SetDatabase("demo".to_string())]);
    }

    #[tokio::test]
    async fn test_set_up_recovers_unconfigured_project() {
        let engine = Arc::new(ControlledEngine::immediate());
        let manager = manager(&engine, DetachedHost);
        let unconfigured = unconfigured_project(&["/proj"]);

        let result = manager.load(&Arc::new(unconfigured.clone()));
        assert!(matches!(result, Err(ProjectError::MissingSettings { .. })));

        let payload = manager.set_up_project(&unconfigured).unwrap();
        let configured = Arc::new(unconfigured.with_settings(payload));
        manager.load(&configured).unwrap();

        assert!(manager.has_active_project());
        let outcome = manager.attempt_current_project_index().await.unwrap().unwrap();
        assert!(matches!(outcome, IndexOutcome::Indexed));
    }
}
