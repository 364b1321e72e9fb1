//! Session-scoped record of content already shown to a user.
//!
//! Each session lives behind its own async mutex. The outer map is only
//! touched long enough to clone a session handle, so work on one session
//! never waits on another. A handle removed from the map is marked retired
//! under its own lock; anyone who raced the removal sees the flag and goes
//! back to the map.

use crate::SessionStore;
use crate::config::EngineConfig;
use crate::constants::{LOG_TARGET_SESSION, SESSION_TTL_SECS};
use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;

/// Session store misuse or failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("session {id} already exists")]
    AlreadyExists { id: String },
    #[error("session {id} not found")]
    NotFound { id: String },
    #[error("session {id} storage failure: {reason}")]
    Storage { id: String, reason: String },
}

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone)]
pub struct ManualClock {
    millis: Arc<AtomicI64>,
}

impl ManualClock {
    #[must_use]
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            millis: Arc::new(AtomicI64::new(start.timestamp_millis())),
        }
    }

    #[must_use]
    pub fn starting_now() -> Self {
        Self::new(Utc::now())
    }

    pub fn advance(&self, by: Duration) {
        let delta = i64::try_from(by.as_millis()).unwrap_or(i64::MAX);
        self.millis.fetch_add(delta, Ordering::SeqCst);
    }

    pub fn set(&self, to: DateTime<Utc>) {
        self.millis.store(to.timestamp_millis(), Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.millis.load(Ordering::SeqCst)).unwrap_or_default()
    }
}

/// Content shown within one session window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub shown_content_ids: BTreeSet<String>,
    pub created_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
}

impl Session {
    #[must_use]
    pub fn new(id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            shown_content_ids: BTreeSet::new(),
            created_at: now,
            last_accessed_at: now,
        }
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.last_accessed_at = now;
    }

    /// Whether more than `ttl` has passed since the last access.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>, ttl: TimeDelta) -> bool {
        now - self.last_accessed_at > ttl
    }
}

#[derive(Debug)]
struct SessionSlot {
    session: Session,
    retired: bool,
}

type SlotHandle = Arc<Mutex<SessionSlot>>;

fn ttl_delta(ttl: Duration) -> TimeDelta {
    TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX)
}

/// In-memory session dedup store.
#[derive(Debug)]
pub struct SessionGuard<C = SystemClock> {
    sessions: DashMap<String, SlotHandle>,
    ttl: TimeDelta,
    clock: C,
}

impl SessionGuard<SystemClock> {
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }

    #[must_use]
    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new().with_ttl(config.session_ttl())
    }
}

impl Default for SessionGuard<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> SessionGuard<C> {
    #[must_use]
    pub fn with_clock(clock: C) -> Self {
        Self {
            sessions: DashMap::new(),
            ttl: ttl_delta(Duration::from_secs(SESSION_TTL_SECS)),
            clock,
        }
    }

    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl_delta(ttl);
        self
    }

    #[must_use]
    pub const fn ttl(&self) -> TimeDelta {
        self.ttl
    }

    pub const fn clock(&self) -> &C {
        &self.clock
    }

    /// Number of sessions held, expired or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    fn slot(&self, id: &str) -> Option<SlotHandle> {
        self.sessions.get(id).map(|entry| Arc::clone(entry.value()))
    }

    fn slot_or_insert(&self, id: &str) -> (SlotHandle, bool) {
        let mut inserted = false;
        let entry = self.sessions.entry(id.to_owned()).or_insert_with(|| {
            inserted = true;
            Arc::new(Mutex::new(SessionSlot {
                session: Session::new(id, self.clock.now()),
                retired: false,
            }))
        });
        let slot = Arc::clone(entry.value());
        drop(entry);
        (slot, inserted)
    }

    /// Remove `slot` from the map if it is still the live handle for `id`.
    /// Callers hold the slot's lock.
    fn retire(&self, id: &str, slot: &SlotHandle, guard: &mut SessionSlot) {
        guard.retired = true;
        self.sessions
            .remove_if(id, |_, current| Arc::ptr_eq(current, slot));
    }

    /// Start a new session.
    ///
    /// An expired session under the same id is replaced.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::AlreadyExists`] if an active session holds `id`.
    pub async fn create(&self, id: &str) -> Result<(), SessionError> {
        loop {
            let (slot, inserted) = self.slot_or_insert(id);
            if inserted {
                log::debug!(target: LOG_TARGET_SESSION, "session {id} created");
                return Ok(());
            }
            let mut guard = slot.lock().await;
            if guard.retired {
                continue;
            }
            let now = self.clock.now();
            if guard.session.is_expired_at(now, self.ttl) {
                guard.session = Session::new(id, now);
                log::debug!(target: LOG_TARGET_SESSION, "expired session {id} recreated");
                return Ok(());
            }
            return Err(SessionError::AlreadyExists { id: id.to_owned() });
        }
    }

    /// Merge `content_ids` into the session's shown set, creating it if absent.
    ///
    /// # Errors
    ///
    /// The in-memory store does not fail; the signature matches other stores.
    pub async fn record_content(
        &self,
        id: &str,
        content_ids: &[String],
    ) -> Result<(), SessionError> {
        loop {
            let (slot, _) = self.slot_or_insert(id);
            let mut guard = slot.lock().await;
            if guard.retired {
                continue;
            }
            let now = self.clock.now();
            if guard.session.is_expired_at(now, self.ttl) {
                guard.session = Session::new(id, now);
            }
            guard
                .session
                .shown_content_ids
                .extend(content_ids.iter().cloned());
            guard.session.touch(now);
            log::trace!(
                target: LOG_TARGET_SESSION,
                "session {id} recorded {} ids ({} total)",
                content_ids.len(),
                guard.session.shown_content_ids.len()
            );
            return Ok(());
        }
    }

    /// Ids shown so far in the session; refreshes its access time.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NotFound`] if the session is absent or expired.
    pub async fn get_shown_content(&self, id: &str) -> Result<BTreeSet<String>, SessionError> {
        loop {
            let Some(slot) = self.slot(id) else {
                return Err(SessionError::NotFound { id: id.to_owned() });
            };
            let mut guard = slot.lock().await;
            if guard.retired {
                continue;
            }
            let now = self.clock.now();
            if guard.session.is_expired_at(now, self.ttl) {
                self.retire(id, &slot, &mut guard);
                log::debug!(target: LOG_TARGET_SESSION, "session {id} expired on read");
                return Err(SessionError::NotFound { id: id.to_owned() });
            }
            guard.session.touch(now);
            return Ok(guard.session.shown_content_ids.clone());
        }
    }

    /// Whether the session has outlived its TTL.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NotFound`] if the session is absent.
    pub async fn is_expired(&self, id: &str) -> Result<bool, SessionError> {
        loop {
            let Some(slot) = self.slot(id) else {
                return Err(SessionError::NotFound { id: id.to_owned() });
            };
            let guard = slot.lock().await;
            if guard.retired {
                continue;
            }
            return Ok(guard.session.is_expired_at(self.clock.now(), self.ttl));
        }
    }

    /// Remove the session. Removing an absent session is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Storage`] if the backing store rejects the
    /// removal. The in-memory guard never does.
    pub async fn delete(&self, id: &str) -> Result<(), SessionError> {
        while let Some(slot) = self.slot(id) {
            let mut guard = slot.lock().await;
            if guard.retired {
                continue;
            }
            self.retire(id, &slot, &mut guard);
            log::debug!(target: LOG_TARGET_SESSION, "session {id} deleted");
            break;
        }
        Ok(())
    }

    /// Delete every expired session, returning the removed ids in sorted order.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Storage`] if the backing store cannot be
    /// swept. The in-memory guard never does.
    pub async fn collect_garbage(&self) -> Result<Vec<String>, SessionError> {
        let handles: Vec<(String, SlotHandle)> = self
            .sessions
            .iter()
            .map(|entry| (entry.key().clone(), Arc::clone(entry.value())))
            .collect();

        let mut removed = Vec::new();
        for (id, slot) in handles {
            let mut guard = slot.lock().await;
            if guard.retired || !guard.session.is_expired_at(self.clock.now(), self.ttl) {
                continue;
            }
            self.retire(&id, &slot, &mut guard);
            removed.push(id);
        }
        removed.sort();
        log::debug!(
            target: LOG_TARGET_SESSION,
            "garbage collection removed {} sessions ({} remain)",
            removed.len(),
            self.sessions.len()
        );
        Ok(removed)
    }

    /// Copy of the session without refreshing its access time.
    pub async fn snapshot(&self, id: &str) -> Option<Session> {
        loop {
            let slot = self.slot(id)?;
            let guard = slot.lock().await;
            if guard.retired {
                continue;
            }
            return Some(guard.session.clone());
        }
    }
}

#[async_trait]
impl<C: Clock> SessionStore for SessionGuard<C> {
    async fn shown_content(&self, session_id: &str) -> Result<BTreeSet<String>, SessionError> {
        match self.get_shown_content(session_id).await {
            Err(SessionError::NotFound { .. }) => Ok(BTreeSet::new()),
            other => other,
        }
    }

    async fn record_content(
        &self,
        session_id: &str,
        content_ids: &[String],
    ) -> Result<(), SessionError> {
        Self::record_content(self, session_id, content_ids).await
    }
}
