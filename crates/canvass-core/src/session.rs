//! In-memory session registry.
//!
//! The store is the only mutable shared resource in the core. It maps
//! session ids to shared entries; the state type `S` brings its own
//! interior mutability, so the interview layer can guard its
//! progression state behind one async mutex per session (at most one
//! `submit_answer` transition in flight) while serving read-only
//! status from a lock the oracle never holds. Clock and id generation
//! are injected so tests control both.

use crate::error::{CanvassError, Result};
use crate::interview::InterviewKind;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

/// Time source seam.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Session id seam.
pub trait IdGenerator: Send + Sync {
    fn generate(&self) -> String;
}

/// Random v4 UUIDs.
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn generate(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

/// One registered session: immutable metadata plus the owner-defined
/// state.
#[derive(Debug)]
pub struct SessionEntry<S> {
    pub id: String,
    pub kind: InterviewKind,
    pub created_at: DateTime<Utc>,
    updated_at: std::sync::RwLock<DateTime<Utc>>,
    pub state: S,
}

impl<S> SessionEntry<S> {
    /// Marks the session as active at `now`.
    pub fn touch(&self, now: DateTime<Utc>) {
        *self.updated_at.write().expect("updated_at lock poisoned") = now;
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        *self.updated_at.read().expect("updated_at lock poisoned")
    }
}

/// Process-wide keyed registry of interview sessions.
pub struct SessionStore<S> {
    sessions: RwLock<HashMap<String, Arc<SessionEntry<S>>>>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
}

impl<S: Send + Sync + 'static> SessionStore<S> {
    pub fn new(clock: Arc<dyn Clock>, ids: Arc<dyn IdGenerator>) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            clock,
            ids,
        }
    }

    /// Store with wall-clock time and UUID ids.
    pub fn with_defaults() -> Self {
        Self::new(Arc::new(SystemClock), Arc::new(UuidGenerator))
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        self.clock.clone()
    }

    /// Registers a new session around the given initial state.
    pub async fn create(&self, kind: InterviewKind, state: S) -> Arc<SessionEntry<S>> {
        let now = self.clock.now();
        let entry = Arc::new(SessionEntry {
            id: self.ids.generate(),
            kind,
            created_at: now,
            updated_at: std::sync::RwLock::new(now),
            state,
        });
        let mut sessions = self.sessions.write().await;
        sessions.insert(entry.id.clone(), entry.clone());
        info!(session_id = %entry.id, %kind, "session created");
        entry
    }

    /// Looks up a session by id.
    ///
    /// # Errors
    ///
    /// `SessionNotFound` for unknown ids.
    pub async fn get(&self, id: &str) -> Result<Arc<SessionEntry<S>>> {
        let sessions = self.sessions.read().await;
        sessions
            .get(id)
            .cloned()
            .ok_or_else(|| CanvassError::session_not_found(id))
    }

    /// Deletes a session.
    ///
    /// # Errors
    ///
    /// `SessionNotFound` for unknown ids.
    pub async fn remove(&self, id: &str) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        sessions
            .remove(id)
            .map(|_| info!(session_id = %id, "session deleted"))
            .ok_or_else(|| CanvassError::session_not_found(id))
    }

    /// Evicts every session idle for longer than `max_idle`, returning
    /// how many were removed. The store owns no background task; the
    /// host decides when to sweep.
    pub async fn evict_idle(&self, max_idle: Duration) -> usize {
        let cutoff = self.clock.now() - max_idle;
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, entry| entry.updated_at() > cutoff);
        let evicted = before - sessions.len();
        if evicted > 0 {
            info!(evicted, "idle sessions evicted");
        }
        evicted
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::sync::Mutex;

    /// Clock that tests move by hand.
    struct ManualClock {
        now: std::sync::RwLock<DateTime<Utc>>,
    }

    impl ManualClock {
        fn new() -> Self {
            Self {
                now: std::sync::RwLock::new(
                    DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z")
                        .unwrap()
                        .with_timezone(&Utc),
                ),
            }
        }

        fn advance(&self, minutes: i64) {
            let mut now = self.now.write().unwrap();
            *now += Duration::minutes(minutes);
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.now.read().unwrap()
        }
    }

    /// Sequential ids for deterministic assertions.
    struct SeqIds(AtomicU32);

    impl IdGenerator for SeqIds {
        fn generate(&self) -> String {
            format!("session-{}", self.0.fetch_add(1, Ordering::SeqCst) + 1)
        }
    }

    fn store<S: Send + Sync + 'static>() -> (Arc<ManualClock>, SessionStore<S>) {
        let clock = Arc::new(ManualClock::new());
        let store = SessionStore::new(clock.clone(), Arc::new(SeqIds(AtomicU32::new(0))));
        (clock, store)
    }

    #[tokio::test]
    async fn create_get_remove_roundtrip() {
        let (_, store) = store::<u32>();
        let entry = store.create(InterviewKind::General, 7).await;
        assert_eq!(entry.id, "session-1");

        let fetched = store.get("session-1").await.unwrap();
        assert_eq!(fetched.state, 7);

        store.remove("session-1").await.unwrap();
        let err = store.get("session-1").await.unwrap_err();
        assert!(err.is_session_not_found());
        let err = store.remove("session-1").await.unwrap_err();
        assert!(err.is_session_not_found());
    }

    #[tokio::test]
    async fn idle_sessions_are_evicted_active_ones_kept() {
        let (clock, store) = store::<u32>();
        store.create(InterviewKind::General, 1).await;
        store.create(InterviewKind::SkillDepth, 2).await;

        clock.advance(90);
        let active = store.get("session-2").await.unwrap();
        active.touch(clock.now());

        let evicted = store.evict_idle(Duration::minutes(60)).await;
        assert_eq!(evicted, 1);
        assert!(store.get("session-1").await.is_err());
        assert!(store.get("session-2").await.is_ok());
    }

    #[tokio::test]
    async fn per_session_mutex_serializes_writers() {
        let (_, store) = store::<Mutex<u32>>();
        let entry = store.create(InterviewKind::General, Mutex::new(0)).await;

        let mut handles = Vec::new();
        for _ in 0..10 {
            let entry = entry.clone();
            handles.push(tokio::spawn(async move {
                let mut state = entry.state.lock().await;
                let read = *state;
                tokio::task::yield_now().await;
                *state = read + 1;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(*entry.state.lock().await, 10);
    }
}
