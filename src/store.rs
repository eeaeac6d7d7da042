//! Local project repository: the authoritative copy of every project, its
//! day-buckets and its discrete session logs.
//!
//! The whole list lives in memory behind one mutex and is written back as a
//! single JSON document after each mutation. Writes that fail are logged and
//! the in-memory list stays the source of truth until the next reload.

use crate::clock::Clock;
use crate::database::Database;
use crate::models::{ActivityType, NewSession, Project, RemoteProject, RemoteShadow, SessionRecord};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Storage key of the serialized project list.
pub const PROJECTS_STORAGE_KEY: &str = "tt_projects_v1";

/// Discrete runs shorter than this are not logged.
pub const MIN_DISCRETE_SESSION_MS: u64 = 1000;

#[derive(Clone)]
pub struct ProjectRepository {
    projects: Arc<Mutex<Vec<Project>>>,
    db: Option<Arc<Database>>,
    clock: Arc<dyn Clock>,
    time_zone: Tz,
}

impl ProjectRepository {
    /// Loads the stored list from `db`. Without a database the repository
    /// runs with storage disabled and keeps everything in memory.
    pub fn new(db: Option<Arc<Database>>, clock: Arc<dyn Clock>, time_zone: Tz) -> Self {
        let projects = db.as_deref().map(load_projects).unwrap_or_default();
        info!(
            "[STORE] Loaded {} project(s){}",
            projects.len(),
            if db.is_none() { " (storage disabled)" } else { "" }
        );
        Self {
            projects: Arc::new(Mutex::new(projects)),
            db,
            clock,
            time_zone,
        }
    }

    pub fn in_memory(clock: Arc<dyn Clock>, time_zone: Tz) -> Self {
        Self::new(None, clock, time_zone)
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Project>> {
        // The list is only ever replaced wholesale or mutated in place by
        // short closures, so a poisoned guard still holds a usable list.
        self.projects.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Runs `f` under the lock and writes the list back when it reports a
    /// change. The lock is held across the write so snapshots land in order.
    fn mutate<R>(&self, f: impl FnOnce(&mut Vec<Project>) -> (R, bool)) -> R {
        let mut projects = self.lock();
        let (result, changed) = f(&mut projects);
        if changed {
            self.persist(&projects);
        }
        result
    }

    fn persist(&self, projects: &[Project]) {
        let Some(db) = &self.db else {
            return;
        };
        let json = match serde_json::to_string(projects) {
            Ok(json) => json,
            Err(e) => {
                error!("[STORE] Failed to serialize projects: {}", e);
                return;
            }
        };
        if let Err(e) = db.set_storage_item(PROJECTS_STORAGE_KEY, &json) {
            warn!(
                "[STORE] Failed to persist projects, keeping in-memory copy: {}",
                e
            );
        }
    }

    /// Calendar day of `at` in the reference time zone, as `YYYY-MM-DD`.
    pub fn day_key(&self, at: DateTime<Utc>) -> String {
        at.with_timezone(&self.time_zone)
            .format("%Y-%m-%d")
            .to_string()
    }

    pub fn list_projects(&self) -> Vec<Project> {
        self.lock().clone()
    }

    /// Matches the local id or the remote id.
    pub fn get_project_by_id(&self, id: &str) -> Option<Project> {
        self.lock().iter().find(|p| p.matches_id(id)).cloned()
    }

    pub fn add_project(&self, name: &str, description: &str) -> Project {
        let project = Project {
            id: Uuid::new_v4().to_string(),
            remote_id: None,
            name: name.trim().to_string(),
            description: description.trim().to_string(),
            created_at: self.clock.now(),
            total_ms: 0,
            sessions: Vec::new(),
            remote_shadow: None,
        };
        self.mutate(|projects| {
            projects.insert(0, project.clone());
            ((), true)
        });
        info!("[STORE] Project {} created ({})", project.id, project.name);
        project
    }

    /// Copies name, description and remote id onto the stored record.
    /// Durations and sessions are never taken from the argument.
    pub fn update_project(&self, updated: &Project) -> bool {
        self.mutate(|projects| {
            let Some(p) = projects.iter_mut().find(|p| p.matches_id(&updated.id)) else {
                return (false, false);
            };
            p.name = updated.name.clone();
            p.description = updated.description.clone();
            if updated.remote_id.is_some() {
                p.remote_id = updated.remote_id.clone();
            }
            (true, true)
        })
    }

    pub fn set_remote_id(&self, project_id: &str, remote_id: &str) -> bool {
        let linked = self.mutate(|projects| {
            match projects.iter_mut().find(|p| p.matches_id(project_id)) {
                Some(p) => {
                    p.remote_id = Some(remote_id.to_string());
                    (true, true)
                }
                None => (false, false),
            }
        });
        if linked {
            info!("[STORE] Project {} linked to remote {}", project_id, remote_id);
        }
        linked
    }

    /// Removes the project with all of its sessions.
    pub fn delete_project(&self, id: &str) -> bool {
        let removed = self.mutate(|projects| {
            let before = projects.len();
            projects.retain(|p| !p.matches_id(id));
            let removed = projects.len() != before;
            (removed, removed)
        });
        if removed {
            info!("[STORE] Project {} deleted", id);
        }
        removed
    }

    /// Drops every project and removes the stored list.
    pub fn clear_all(&self) {
        let mut projects = self.lock();
        projects.clear();
        if let Some(db) = &self.db {
            if let Err(e) = db.remove_storage_item(PROJECTS_STORAGE_KEY) {
                warn!("[STORE] Failed to remove stored projects: {}", e);
            }
        }
        info!("[STORE] All projects cleared");
    }

    /// Adds `amount_ms` to today's bucket for `activity`, creating the bucket
    /// on first use, and the same amount to the project total.
    ///
    /// Returns `false` for a zero amount or an unknown project.
    pub fn bump_daily_session(
        &self,
        project_id: &str,
        activity: ActivityType,
        amount_ms: u64,
    ) -> bool {
        if amount_ms == 0 {
            return false;
        }
        let now = self.clock.now();
        let today = self.day_key(now);
        self.mutate(|projects| {
            let Some(p) = projects.iter_mut().find(|p| p.matches_id(project_id)) else {
                debug!("[STORE] bump for unknown project {}", project_id);
                return (false, false);
            };
            let bucket = p
                .sessions
                .iter_mut()
                .find(|s| s.activity == activity && s.date.as_deref() == Some(today.as_str()));
            match bucket {
                Some(s) => {
                    s.duration_ms = s.duration_ms.saturating_add(amount_ms);
                    s.end = now;
                }
                None => p.sessions.insert(
                    0,
                    SessionRecord {
                        id: Uuid::new_v4().to_string(),
                        activity,
                        date: Some(today.clone()),
                        start: now,
                        end: now,
                        duration_ms: amount_ms,
                        notes: None,
                    },
                ),
            }
            p.total_ms = p.total_ms.saturating_add(amount_ms);
            (true, true)
        })
    }

    /// Logs one completed run as its own record. Runs under a second are
    /// dropped and `None` is returned, as for an unknown project.
    pub fn add_session_to_project(
        &self,
        project_id: &str,
        session: NewSession,
    ) -> Option<SessionRecord> {
        if session.duration_ms < MIN_DISCRETE_SESSION_MS {
            debug!(
                "[STORE] Discrete session of {}ms below minimum, not logged",
                session.duration_ms
            );
            return None;
        }
        self.mutate(|projects| {
            let Some(p) = projects.iter_mut().find(|p| p.matches_id(project_id)) else {
                return (None, false);
            };
            let record = SessionRecord {
                id: Uuid::new_v4().to_string(),
                activity: session.activity,
                date: None,
                start: session.start,
                end: session.end,
                duration_ms: session.duration_ms,
                notes: session.notes,
            };
            p.sessions.insert(0, record.clone());
            p.total_ms = p.total_ms.saturating_add(record.duration_ms);
            (Some(record), true)
        })
    }

    /// Records what the remote store reported for a project. Only ever moves
    /// the shadow forward; local totals and sessions are left untouched.
    pub fn apply_remote_snapshot(&self, project_id: &str, snapshot: &RemoteProject) -> bool {
        let synced_at = self.clock.now();
        self.mutate(|projects| {
            let Some(p) = projects.iter_mut().find(|p| p.matches_id(project_id)) else {
                return (false, false);
            };
            if let Some(shadow) = &p.remote_shadow {
                if snapshot.total_ms < shadow.total_ms {
                    debug!(
                        "[STORE] Stale remote snapshot for {} ({} < {}), ignored",
                        p.id, snapshot.total_ms, shadow.total_ms
                    );
                    return (false, false);
                }
            }
            p.remote_shadow = Some(RemoteShadow {
                total_ms: snapshot.total_ms,
                session_count: snapshot.sessions.len(),
                synced_at,
            });
            (true, true)
        })
    }
}

/// Reads the stored list. Unreadable data yields an empty list, and totals
/// that drifted from their sessions are recomputed.
fn load_projects(db: &Database) -> Vec<Project> {
    let raw = match db.get_storage_item(PROJECTS_STORAGE_KEY) {
        Ok(Some(raw)) => raw,
        Ok(None) => return Vec::new(),
        Err(e) => {
            error!("[STORE] Failed to read projects: {}", e);
            return Vec::new();
        }
    };
    let mut projects: Vec<Project> = match serde_json::from_str(&raw) {
        Ok(list) => list,
        Err(e) => {
            warn!("[STORE] Stored project list unreadable, starting empty: {}", e);
            return Vec::new();
        }
    };
    for p in &mut projects {
        let sum = p.sessions_total_ms();
        if p.total_ms != sum {
            warn!(
                "[STORE] Project {} total {}ms did not match sessions ({}ms), repaired",
                p.id, p.total_ms, sum
            );
            p.total_ms = sum;
        }
    }
    projects
}
