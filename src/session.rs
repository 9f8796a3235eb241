//! Session manager
//!
//! Holds at most one live session per id. Each session sits behind its own
//! lock so transitions on different sessions never contend beyond the short
//! map lookup.
//!
//! Sessions live in memory only. A persistent backing store would have to
//! keep the same contract: `create` fails on a live id, `get`/`remove`/
//! `sweep_expired` behave as here.

use crate::error::{WorkflowError, WorkflowResult};
use crate::state_machine::{Fields, WorkflowContext, WorkflowDefinition, WorkflowState};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// A context plus liveness bookkeeping
#[derive(Debug)]
pub(crate) struct Session {
    pub(crate) context: WorkflowContext,
    pub(crate) last_touched: DateTime<Utc>,
    pub(crate) expires_at: DateTime<Utc>,
    /// Cleared on removal so a transition holding a stale handle backs off
    live: bool,
}

impl Session {
    pub(crate) fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.live && now < self.expires_at
    }

    pub(crate) fn touch(&mut self, now: DateTime<Utc>, ttl: Duration) {
        self.last_touched = now;
        self.expires_at = deadline(now, ttl);
    }
}

pub(crate) type SessionHandle = Arc<Mutex<Session>>;

/// Lock a session, recovering the data if a previous holder panicked
pub(crate) fn lock(handle: &SessionHandle) -> MutexGuard<'_, Session> {
    handle.lock().unwrap_or_else(PoisonError::into_inner)
}

fn deadline(from: DateTime<Utc>, ttl: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(ttl)
        .ok()
        .and_then(|ttl| from.checked_add_signed(ttl))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Creates, looks up, expires and removes sessions
pub struct SessionManager {
    definition: Arc<WorkflowDefinition>,
    sessions: Mutex<HashMap<String, SessionHandle>>,
    /// Replaces per-state timeouts for expiry when set
    ttl_override: Option<Duration>,
}

impl SessionManager {
    pub fn new(definition: Arc<WorkflowDefinition>) -> Self {
        Self {
            definition,
            sessions: Mutex::new(HashMap::new()),
            ttl_override: None,
        }
    }

    /// A zero TTL would expire sessions on creation, so it is ignored
    #[must_use]
    pub fn with_ttl_override(mut self, ttl: Option<Duration>) -> Self {
        self.ttl_override = ttl.filter(|ttl| !ttl.is_zero());
        self
    }

    fn map(&self) -> MutexGuard<'_, HashMap<String, SessionHandle>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Expiry window for a session sitting in `state`
    pub fn ttl_for(&self, state: WorkflowState) -> WorkflowResult<Duration> {
        match self.ttl_override {
            Some(ttl) => Ok(ttl),
            None => Ok(self.definition.states().get(state)?.timeout),
        }
    }

    /// Start a session in the initial state.
    ///
    /// An expired session that has not been swept yet is replaced.
    pub fn create(
        &self,
        session_id: &str,
        patient_id: Option<String>,
        initial_fields: Fields,
    ) -> WorkflowResult<WorkflowContext> {
        self.create_at(session_id, patient_id, initial_fields, Utc::now())
    }

    pub(crate) fn create_at(
        &self,
        session_id: &str,
        patient_id: Option<String>,
        initial_fields: Fields,
        now: DateTime<Utc>,
    ) -> WorkflowResult<WorkflowContext> {
        let initial = self.definition.initial();
        let ttl = self.ttl_for(initial)?;

        let mut sessions = self.map();
        if let Some(existing) = sessions.get(session_id) {
            if lock(existing).is_live(now) {
                return Err(WorkflowError::SessionAlreadyExists(session_id.to_string()));
            }
        }

        let context = WorkflowContext::new(session_id, patient_id, initial, initial_fields, now);
        let session = Session {
            context: context.clone(),
            last_touched: now,
            expires_at: deadline(now, ttl),
            live: true,
        };
        if let Some(stale) = sessions.insert(session_id.to_string(), Arc::new(Mutex::new(session))) {
            lock(&stale).live = false;
        }

        tracing::info!(session_id = %session_id, state = %initial, "Session created");
        Ok(context)
    }

    /// Handle for a live session
    pub(crate) fn handle(&self, session_id: &str) -> WorkflowResult<SessionHandle> {
        self.map()
            .get(session_id)
            .cloned()
            .ok_or_else(|| WorkflowError::SessionNotFound(session_id.to_string()))
    }

    /// Snapshot of a live session's context
    pub fn get(&self, session_id: &str) -> WorkflowResult<WorkflowContext> {
        let handle = self.handle(session_id)?;
        let session = lock(&handle);
        if session.is_live(Utc::now()) {
            Ok(session.context.clone())
        } else {
            Err(WorkflowError::SessionNotFound(session_id.to_string()))
        }
    }

    /// Deadline after which the session is considered gone
    pub fn expires_at(&self, session_id: &str) -> WorkflowResult<DateTime<Utc>> {
        let handle = self.handle(session_id)?;
        let session = lock(&handle);
        Ok(session.expires_at)
    }

    /// Idempotent; reports whether a session was present
    pub fn remove(&self, session_id: &str) -> bool {
        let removed = self.map().remove(session_id);
        match removed {
            Some(handle) => {
                lock(&handle).live = false;
                tracing::info!(session_id = %session_id, "Session removed");
                true
            }
            None => false,
        }
    }

    /// Drop every session whose deadline has passed at `now`.
    ///
    /// Sessions locked by an in-flight transition are skipped; that call
    /// refreshes them anyway. Poisoned sessions are recovered and judged
    /// like any other.
    pub fn sweep_expired(&self, now: DateTime<Utc>) -> Vec<String> {
        let mut sessions = self.map();
        let mut removed = Vec::new();

        sessions.retain(|id, handle| {
            let mut session = match handle.try_lock() {
                Ok(session) => session,
                Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
                Err(TryLockError::WouldBlock) => return true,
            };
            if now >= session.expires_at || !session.live {
                session.live = false;
                removed.push(id.clone());
                false
            } else {
                true
            }
        });

        if !removed.is_empty() {
            tracing::info!(count = removed.len(), sessions = ?removed, "Expired sessions swept");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.map().len()
    }

    pub fn is_empty(&self) -> bool {
        self.map().is_empty()
    }

    pub fn session_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.map().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Run `sweep_expired` every `interval` until `shutdown` is cancelled
    pub fn spawn_sweeper(
        self: &Arc<Self>,
        interval: Duration,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    () = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        manager.sweep_expired(Utc::now());
                    }
                }
            }
            tracing::info!("Session sweeper stopped");
        })
    }
}
