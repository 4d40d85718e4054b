//! Session store — process-wide map from user identity to in-progress session.
//!
//! Each user gets their own async mutex slot. Holding the slot guard for the
//! whole transition (including transport I/O) serializes one user's events,
//! while different users never contend beyond the brief map lookup.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::{debug, info};

use super::state::{ConversationPhase, Session};

/// Exclusive access to one user's session. `None` means the user is idle.
pub type SessionSlot = OwnedMutexGuard<Option<Session>>;

/// How often the expiry task sweeps for idle sessions.
const EXPIRY_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Concurrency-safe session map shared by all conversation handlers.
#[derive(Default)]
pub struct SessionStore {
    slots: RwLock<HashMap<String, Arc<Mutex<Option<Session>>>>>,
}

impl SessionStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Lock a user's slot, creating it on first use.
    ///
    /// The guard must be held until the transition is complete.
    pub async fn lock(&self, user_id: &str) -> SessionSlot {
        let existing = self.slots.read().await.get(user_id).cloned();
        let slot = match existing {
            Some(slot) => slot,
            None => {
                let mut slots = self.slots.write().await;
                Arc::clone(slots.entry(user_id.to_string()).or_default())
            }
        };
        slot.lock_owned().await
    }

    /// Current phase for a user (waits for any in-flight transition).
    pub async fn phase(&self, user_id: &str) -> ConversationPhase {
        let Some(slot) = self.slots.read().await.get(user_id).cloned() else {
            return ConversationPhase::Idle;
        };
        let guard = slot.lock().await;
        guard.as_ref().map_or(ConversationPhase::Idle, Session::phase)
    }

    /// Clone of a user's session, if one is in progress.
    pub async fn snapshot(&self, user_id: &str) -> Option<Session> {
        let slot = self.slots.read().await.get(user_id).cloned()?;
        let guard = slot.lock().await;
        guard.clone()
    }

    /// Number of users with a session in progress.
    pub async fn active_sessions(&self) -> usize {
        let slots: Vec<_> = self.slots.read().await.values().cloned().collect();
        let mut count = 0;
        for slot in slots {
            if slot.lock().await.is_some() {
                count += 1;
            }
        }
        count
    }

    /// Drop sessions idle for at least `max_idle` and forget empty slots.
    ///
    /// Slots that are currently locked are skipped. Returns the number of
    /// sessions discarded.
    pub async fn prune_idle(&self, max_idle: chrono::Duration) -> usize {
        let now = Utc::now();
        let mut slots = self.slots.write().await;
        let mut expired = 0;

        slots.retain(|user_id, slot| {
            let Ok(mut guard) = slot.try_lock() else {
                return true;
            };
            if guard.as_ref().is_some_and(|s| s.is_idle_for(max_idle, now)) {
                if let Some(session) = guard.take() {
                    debug!(
                        user_id = %user_id,
                        session_id = %session.id,
                        phase = %session.phase(),
                        "Session expired"
                    );
                }
                expired += 1;
            }
            // Keep the slot while someone else holds a handle to it.
            guard.is_some() || Arc::strong_count(slot) > 1
        });

        if expired > 0 {
            info!(count = expired, "Expired idle sessions");
        }
        expired
    }
}

/// Spawn a background task that periodically discards idle sessions.
pub fn spawn_expiry_task(
    store: Arc<SessionStore>,
    max_idle: Duration,
) -> tokio::task::JoinHandle<()> {
    let max_idle = chrono::Duration::from_std(max_idle).unwrap_or(chrono::Duration::MAX);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(EXPIRY_SWEEP_INTERVAL);
        loop {
            interval.tick().await;
            store.prune_idle(max_idle).await;
        }
    })
}
