//! Best-effort remote mirror.
//!
//! Flushes enqueue a [`MirrorJob`] on an unbounded channel and return
//! immediately. A single [`MirrorWorker`] drains the channel and runs every
//! request as its own task, so slow calls never hold up later ones. Results
//! only ever touch the remote shadow of a project; failures are logged and
//! dropped. There is no retry.

mod client;

pub use client::RemoteClient;

use crate::database::Database;
use crate::models::{RemoteProject, SessionPayload};
use crate::store::ProjectRepository;
use chrono::Utc;
use scopeguard::guard;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// app_meta key updated after each successful mirror.
pub const LAST_MIRROR_META_KEY: &str = "last_mirror_at";

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Network: {0}")]
    Network(String),
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },
    #[error("Decode: {0}")]
    Decode(String),
    #[error("Auth: {0}")]
    Auth(String),
}

/// Remote endpoint settings.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SyncConfig {
    pub api_base_url: String,
    pub http_timeout_secs: u64,
    /// Sent in X-App-Version for debugging version skew
    pub app_version: String,
}

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:5174";

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            http_timeout_secs: 10,
            app_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// One aggregate to copy to the remote session log.
#[derive(Debug, Clone)]
pub struct MirrorJob {
    pub project_id: String,
    pub remote_id: String,
    pub token: String,
    pub payload: SessionPayload,
}

/// Sending side of the mirror queue. Cheap to clone; never blocks.
#[derive(Clone)]
pub struct MirrorHandle {
    tx: mpsc::UnboundedSender<MirrorJob>,
    in_flight: Arc<AtomicUsize>,
}

impl MirrorHandle {
    /// Queues `job`. Returns `false` only if the worker is gone. The job
    /// counts as in flight from here until its request finishes.
    pub fn send(&self, job: MirrorJob) -> bool {
        self.in_flight.fetch_add(1, Ordering::AcqRel);
        match self.tx.send(job) {
            Ok(()) => true,
            Err(e) => {
                self.in_flight.fetch_sub(1, Ordering::AcqRel);
                debug!(
                    "[MIRROR] Worker stopped, dropping mirror for {}",
                    e.0.project_id
                );
                false
            }
        }
    }

    /// Jobs queued or waiting on the network.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }
}

/// Outcome counts, returned when the worker shuts down.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MirrorReport {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
}

pub struct MirrorWorker {
    rx: mpsc::UnboundedReceiver<MirrorJob>,
    client: RemoteClient,
    repo: ProjectRepository,
    db: Option<Arc<Database>>,
    in_flight: Arc<AtomicUsize>,
}

/// Creates a connected handle/worker pair.
pub fn mirror_channel(
    client: RemoteClient,
    repo: ProjectRepository,
    db: Option<Arc<Database>>,
) -> (MirrorHandle, MirrorWorker) {
    let (tx, rx) = mpsc::unbounded_channel();
    let in_flight = Arc::new(AtomicUsize::new(0));
    let handle = MirrorHandle {
        tx,
        in_flight: in_flight.clone(),
    };
    let worker = MirrorWorker {
        rx,
        client,
        repo,
        db,
        in_flight,
    };
    (handle, worker)
}

impl MirrorWorker {
    /// Runs until every [`MirrorHandle`] is dropped and all started
    /// requests have finished.
    pub async fn run(mut self) -> MirrorReport {
        let mut report = MirrorReport::default();
        let mut tasks = JoinSet::new();
        loop {
            tokio::select! {
                job = self.rx.recv() => match job {
                    Some(job) => {
                        report.attempted += 1;
                        tasks.spawn(mirror_one(
                            job,
                            self.client.clone(),
                            self.repo.clone(),
                            self.db.clone(),
                            self.in_flight.clone(),
                        ));
                    }
                    None => break,
                },
                Some(done) = tasks.join_next() => tally(&mut report, done),
            }
        }
        while let Some(done) = tasks.join_next().await {
            tally(&mut report, done);
        }
        info!(
            "[MIRROR] Worker stopped: {} attempted, {} succeeded, {} failed",
            report.attempted, report.succeeded, report.failed
        );
        report
    }
}

fn tally(report: &mut MirrorReport, done: Result<bool, tokio::task::JoinError>) {
    match done {
        Ok(true) => report.succeeded += 1,
        Ok(false) => report.failed += 1,
        Err(e) => {
            warn!("[MIRROR] Mirror task aborted: {}", e);
            report.failed += 1;
        }
    }
}

async fn mirror_one(
    job: MirrorJob,
    client: RemoteClient,
    repo: ProjectRepository,
    db: Option<Arc<Database>>,
    in_flight: Arc<AtomicUsize>,
) -> bool {
    let _guard = guard((), |_| {
        in_flight.fetch_sub(1, Ordering::AcqRel);
    });

    match client
        .post_session(&job.remote_id, &job.payload, &job.token)
        .await
    {
        Ok(snapshot) => {
            debug!(
                "[MIRROR] {}ms {} mirrored for project {}",
                job.payload.duration_ms, job.payload.activity, job.project_id
            );
            apply_snapshot(&repo, &job.project_id, &snapshot);
            if let Some(db) = &db {
                if let Err(e) = db.set_app_meta(LAST_MIRROR_META_KEY, &Utc::now().to_rfc3339()) {
                    debug!("[MIRROR] Failed to record last mirror time: {}", e);
                }
            }
            true
        }
        Err(e) => {
            warn!(
                "[MIRROR] Mirror of {}ms for project {} failed (dropped): {}",
                job.payload.duration_ms, job.project_id, e
            );
            false
        }
    }
}

fn apply_snapshot(repo: &ProjectRepository, project_id: &str, snapshot: &RemoteProject) {
    if !repo.apply_remote_snapshot(project_id, snapshot) {
        debug!(
            "[MIRROR] Remote snapshot for {} not applied (stale or project gone)",
            project_id
        );
    }
}
