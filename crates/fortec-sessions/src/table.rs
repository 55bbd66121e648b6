use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, instrument};

use fortec_core::{Transcript, Turn, UserId};

use crate::error::{Result, SessionError};
use crate::history;

/// In-memory map from user to conversation transcript.
///
/// The map itself is sharded (`DashMap`), so users on different shards never
/// contend. Each transcript sits behind its own async mutex: holding a
/// [`SessionGuard`] gives exclusive access to one user's conversation while
/// other users proceed in parallel. Nothing is persisted; state lives for the
/// lifetime of the process.
pub struct SessionTable {
    sessions: DashMap<UserId, Arc<Mutex<Transcript>>>,
    system_prompt: String,
}

impl SessionTable {
    /// Create an empty table. New transcripts start with `system_prompt`.
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            sessions: DashMap::new(),
            system_prompt: system_prompt.into(),
        }
    }

    /// Return a snapshot of the user's transcript, creating it on first contact.
    #[instrument(skip(self), fields(user = %user))]
    pub async fn get_or_create(&self, user: &UserId) -> Transcript {
        let slot = self.slot(user);
        let transcript = slot.lock().await;
        transcript.clone()
    }

    /// Replace the user's transcript with a fresh system-only one and return it.
    #[instrument(skip(self), fields(user = %user))]
    pub async fn reset(&self, user: &UserId) -> Transcript {
        let slot = self.slot(user);
        let mut transcript = slot.lock().await;
        *transcript = self.fresh();
        debug!("session reset");
        transcript.clone()
    }

    /// Append a turn to an existing transcript.
    ///
    /// Fails with [`SessionError::NotFound`] if the user has no transcript yet;
    /// callers create one with [`get_or_create`](Self::get_or_create) or
    /// [`lock`](Self::lock) first.
    #[instrument(skip(self, turn), fields(user = %user, role = %turn.role))]
    pub async fn append(&self, user: &UserId, turn: Turn) -> Result<()> {
        let slot = self
            .sessions
            .get(user)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| SessionError::NotFound {
                user: user.to_string(),
            })?;
        slot.lock().await.push(turn);
        Ok(())
    }

    /// Take exclusive access to the user's transcript, creating it if absent.
    ///
    /// Concurrent events for the same user queue here and are processed one
    /// at a time, in lock acquisition order.
    pub async fn lock(&self, user: &UserId) -> SessionGuard {
        let slot = self.slot(user);
        SessionGuard {
            user: user.clone(),
            transcript: slot.lock_owned().await,
        }
    }

    pub fn contains(&self, user: &UserId) -> bool {
        self.sessions.contains_key(user)
    }

    /// Number of users with a transcript.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    fn fresh(&self) -> Transcript {
        Transcript::new(self.system_prompt.clone())
    }

    /// Clone the per-user slot out of the map so no shard lock is held
    /// across an `.await`.
    fn slot(&self, user: &UserId) -> Arc<Mutex<Transcript>> {
        let entry = self
            .sessions
            .entry(user.clone())
            .or_insert_with(|| Arc::new(Mutex::new(self.fresh())));
        Arc::clone(entry.value())
    }
}

/// Exclusive handle on one user's transcript. Released on drop.
pub struct SessionGuard {
    user: UserId,
    transcript: OwnedMutexGuard<Transcript>,
}

impl SessionGuard {
    pub fn user(&self) -> &UserId {
        &self.user
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Owned copy for handing to an upstream request.
    pub fn snapshot(&self) -> Transcript {
        self.transcript.clone()
    }

    pub fn append(&mut self, turn: Turn) {
        self.transcript.push(turn);
    }

    /// Bound the transcript to the system turn plus `max_turns` recent turns.
    pub fn trim(&mut self, max_turns: usize) {
        let trimmed = history::trim(&self.transcript, max_turns);
        *self.transcript = trimmed;
    }
}
