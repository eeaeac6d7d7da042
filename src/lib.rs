//! Local-first activity tracking: timers whose time is folded into durable
//! per-day buckets and copied, best effort, to a remote session log.

pub mod auth;
pub mod clock;
pub mod config;
pub mod database;
pub mod driver;
pub mod engine;
pub mod error;
pub mod format;
pub mod models;
pub mod store;
pub mod sync;


use crate::auth::{ApiUser, AuthManager};
use crate::clock::{minus_millis, Clock, SystemClock};
use crate::config::{resolve_api_base, TrackerConfig};
use crate::engine::{ActivityTimer, FlushSink, TimerSession};
use crate::models::{ActivityType, NewSession, Project, SessionPayload, SessionRecord};
use crate::store::ProjectRepository;
use crate::sync::{mirror_channel, MirrorHandle, MirrorJob, MirrorWorker, RemoteClient, SyncError};
use std::sync::Arc;
use tracing::{debug, info};

pub use crate::database::Database;
pub use crate::error::{TrackerError, TrackerResult};

/// Installs the global `tracing` subscriber: `info` unless `RUST_LOG` says
/// otherwise. Calling it twice is harmless.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init();
}

/// Entry point tying the repository, the principal and the mirror queue
/// together. Clones share all state.
#[derive(Clone)]
pub struct Tracker {
    repo: ProjectRepository,
    auth: AuthManager,
    mirror: MirrorHandle,
    client: RemoteClient,
    clock: Arc<dyn Clock>,
    config: TrackerConfig,
}

impl Tracker {
    /// Builds a tracker and the mirror worker that must be spawned for
    /// remote copies to be sent. The worker exits once every clone of the
    /// tracker (and every session created from it) is dropped.
    pub fn new(
        mut config: TrackerConfig,
        db: Option<Arc<Database>>,
        clock: Arc<dyn Clock>,
    ) -> TrackerResult<(Self, MirrorWorker)> {
        let explicit = (config.sync.api_base_url != sync::DEFAULT_API_BASE_URL)
            .then(|| config.sync.api_base_url.clone());
        config.sync.api_base_url = resolve_api_base(explicit.as_deref(), db.as_deref());
        info!("[MIRROR] Using API base {}", config.sync.api_base_url);

        let auth = AuthManager::new(db.clone())?;
        auth.restore();
        let repo = ProjectRepository::new(db.clone(), clock.clone(), config.reference_time_zone);
        let client = RemoteClient::new(&config.sync);
        let (mirror, worker) = mirror_channel(client.clone(), repo.clone(), db);

        Ok((
            Self {
                repo,
                auth,
                mirror,
                client,
                clock,
                config,
            },
            worker,
        ))
    }

    /// Opens (or recovers) the database at `config.db_path` and uses the
    /// system clock.
    pub fn open(config: TrackerConfig) -> TrackerResult<(Self, MirrorWorker)> {
        let db = Arc::new(Database::open_or_recover(&config.db_path)?);
        Self::new(config, Some(db), Arc::new(SystemClock))
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn repository(&self) -> &ProjectRepository {
        &self.repo
    }

    pub fn auth(&self) -> &AuthManager {
        &self.auth
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        self.clock.clone()
    }

    pub fn mirror_in_flight(&self) -> usize {
        self.mirror.in_flight()
    }

    pub fn set_principal(&self, user: Option<ApiUser>) {
        self.auth.set_principal(user);
    }

    pub fn list_projects(&self) -> Vec<Project> {
        self.repo.list_projects()
    }

    pub fn get_project_by_id(&self, id: &str) -> Option<Project> {
        self.repo.get_project_by_id(id)
    }

    pub fn add_project(&self, name: &str, description: &str) -> Project {
        self.repo.add_project(name, description)
    }

    pub fn update_project(&self, project: &Project) -> bool {
        self.repo.update_project(project)
    }

    pub fn delete_project(&self, id: &str) -> bool {
        self.repo.delete_project(id)
    }

    /// Binds a timer to a project. `None` if the project does not exist.
    pub fn start_session(
        &self,
        project_id: &str,
        timer: impl Into<ActivityTimer>,
    ) -> Option<TimerSession> {
        let project = self.repo.get_project_by_id(project_id)?;
        Some(TimerSession::new(
            project.id,
            timer,
            self.config.flush_threshold_ms,
            Arc::new(self.clone()),
            self.clock.clone(),
        ))
    }

    /// Logs one finished run as its own session and mirrors it. Separate
    /// from the timer path, which only ever writes day buckets.
    pub fn add_session_to_project(
        &self,
        project_id: &str,
        session: NewSession,
    ) -> Option<SessionRecord> {
        let record = self.repo.add_session_to_project(project_id, session)?;
        self.enqueue_mirror(
            project_id,
            SessionPayload {
                activity: record.activity,
                start: record.start,
                end: record.end,
                duration_ms: record.duration_ms,
            },
        );
        Some(record)
    }

    /// Creates the remote record for a local project and stores its id.
    /// Already linked projects are returned unchanged.
    pub async fn link_project(&self, project_id: &str) -> TrackerResult<Project> {
        let project = self
            .repo
            .get_project_by_id(project_id)
            .ok_or_else(|| TrackerError::ProjectNotFound(project_id.to_string()))?;
        if project.remote_id.is_some() {
            return Ok(project);
        }
        let user = self
            .auth
            .principal()
            .ok_or_else(|| SyncError::Auth("No signed-in user".into()))?;
        let remote = self
            .client
            .create_project(&project.name, &project.description, &user.token)
            .await?;
        if remote.id.is_empty() {
            return Err(SyncError::Decode("Created project has no id".into()).into());
        }
        self.repo.set_remote_id(&project.id, &remote.id);
        self.repo
            .get_project_by_id(&project.id)
            .ok_or_else(|| TrackerError::ProjectNotFound(project.id.clone()))
    }

    /// Queues a remote copy if the project is linked and someone is
    /// signed in. Silently does nothing otherwise.
    fn enqueue_mirror(&self, project_id: &str, payload: SessionPayload) -> bool {
        if payload.duration_ms == 0 {
            return false;
        }
        let Some(project) = self.repo.get_project_by_id(project_id) else {
            debug!("[MIRROR] Project {} gone, mirror skipped", project_id);
            return false;
        };
        let Some(remote_id) = project.remote_id else {
            debug!("[MIRROR] Project {} not linked, mirror skipped", project_id);
            return false;
        };
        let Some(user) = self.auth.principal() else {
            debug!("[MIRROR] No signed-in user, mirror skipped");
            return false;
        };
        self.mirror.send(MirrorJob {
            project_id: project.id,
            remote_id,
            token: user.token,
            payload,
        })
    }
}

impl FlushSink for Tracker {
    fn bump_daily_session(&self, project_id: &str, activity: ActivityType, amount_ms: u64) -> bool {
        self.repo.bump_daily_session(project_id, activity, amount_ms)
    }

    fn mirror_aggregate_to_server(&self, project_id: &str, activity: ActivityType, amount_ms: u64) {
        let end = self.clock.now();
        let queued = self.enqueue_mirror(
            project_id,
            SessionPayload {
                activity,
                start: minus_millis(end, amount_ms),
                end,
                duration_ms: amount_ms,
            },
        );
        if queued {
            debug!("[MIRROR] Queued {}ms {} for {}", amount_ms, activity, project_id);
        }
    }
}
