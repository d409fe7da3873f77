//! One agent's exclusive session over one conversation.
//!
//! [`ChatSessionLock`] ties the claim lifecycle to its own lifetime:
//!
//! - `acquire` takes the claim (or reports the holder),
//! - while held, a heartbeat refreshes `last_activity`,
//! - while blocked, a watcher re-attempts `acquire` once per external
//!   release,
//! - `release` (or dropping the session) stops both tasks and deletes the
//!   claim.
//!
//! Every release starts a new generation. An acquire that was still waiting
//! on the store when the generation moved on discards its result, deleting
//! a claim it inserted, so a released session never comes back to life.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use agentdesk_core::chat_lock::{validate_claim_ref, ClaimEvent, LockStatus};
use agentdesk_core::types::{ChatId, UserId};
use agentdesk_events::ChatSubscription;
use tokio::sync::watch;
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::claim::{self, AcquireOutcome};
use crate::config::SessionConfig;
use crate::error::{LockError, StoreError};
use crate::heartbeat;
use crate::store::ClaimStore;

// ---------------------------------------------------------------------------
// SessionPhase
// ---------------------------------------------------------------------------

/// Observable state of a session, suitable for driving the agent UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionPhase {
    /// Not holding and not waiting (initial state, and after release).
    Idle,
    /// This session holds the claim; the heartbeat is running. If the
    /// heartbeat finds the claim gone, the session re-reads the store and
    /// moves on to `Held` again or `Waiting`.
    Held,
    /// Another agent holds the claim; the session re-acquires on release.
    Waiting { holder: Option<UserId> },
    /// The last store round trip failed. Ownership is unknown and must not
    /// be assumed; the UI should offer a retry.
    Failed { reason: String },
}

impl SessionPhase {
    pub fn holds_claim(&self) -> bool {
        matches!(self, SessionPhase::Held)
    }

    /// The `(is_locked, locked_by_user)` view of this phase.
    pub fn status(&self) -> LockStatus {
        match self {
            SessionPhase::Waiting { holder } => LockStatus::locked_by(holder.clone()),
            _ => LockStatus::unlocked(),
        }
    }
}


// ---------------------------------------------------------------------------
// ChatSessionLock
// ---------------------------------------------------------------------------

/// Background tasks of a session. Dropping a guard cancels its task, so the
/// tasks never outlive the session.
#[derive(Default)]
struct Tasks {
    heartbeat: Option<DropGuard>,
    watcher: Option<DropGuard>,
}

struct Inner<S: ?Sized> {
    chat_id: ChatId,
    user_id: UserId,
    config: SessionConfig,
    phase: watch::Sender<SessionPhase>,
    tasks: Mutex<Tasks>,
    /// Bumped under the `tasks` lock by every release.
    generation: AtomicU64,
    reacquiring: AtomicBool,
    reacquire_attempts: AtomicUsize,
    store: Arc<S>,
}

/// An agent's claim session over one conversation.
///
/// Dropping the session stops its background tasks and, if it may hold the
/// claim, deletes the claim on the current tokio runtime. Prefer
/// [`release`](Self::release) or [`close`](Self::close) where the outcome
/// matters.
pub struct ChatSessionLock<S: ClaimStore + ?Sized> {
    inner: Arc<Inner<S>>,
}

impl<S: ClaimStore + ?Sized> std::fmt::Debug for ChatSessionLock<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatSessionLock")
            .field("chat_id", &self.inner.chat_id)
            .field("user_id", &self.inner.user_id)
            .finish_non_exhaustive()
    }
}

impl<S: ClaimStore + ?Sized> ChatSessionLock<S> {
    /// Create an idle session for `user_id` over `chat_id`.
    ///
    /// Fails with [`LockError::Validation`] if either id is empty or too
    /// long, or if `config` is out of range; no store round trip is made.
    pub fn new(
        store: Arc<S>,
        chat_id: impl Into<ChatId>,
        user_id: impl Into<UserId>,
        config: SessionConfig,
    ) -> Result<Self, LockError> {
        let chat_id = chat_id.into();
        let user_id = user_id.into();
        validate_claim_ref(&chat_id, &user_id).map_err(LockError::Validation)?;
        config.validate()?;

        let (phase, _) = watch::channel(SessionPhase::Idle);
        Ok(Self {
            inner: Arc::new(Inner {
                chat_id,
                user_id,
                config,
                phase,
                tasks: Mutex::new(Tasks::default()),
                generation: AtomicU64::new(0),
                reacquiring: AtomicBool::new(false),
                reacquire_attempts: AtomicUsize::new(0),
                store,
            }),
        })
    }

    pub fn chat_id(&self) -> &str {
        &self.inner.chat_id
    }

    pub fn user_id(&self) -> &str {
        &self.inner.user_id
    }

    pub fn phase(&self) -> SessionPhase {
        self.inner.phase()
    }

    pub fn status(&self) -> LockStatus {
        self.inner.phase().status()
    }

    pub fn holds_claim(&self) -> bool {
        self.inner.phase().holds_claim()
    }

    /// Subscribe to phase changes.
    pub fn watch_phase(&self) -> watch::Receiver<SessionPhase> {
        self.inner.phase.subscribe()
    }

    /// Number of re-acquire attempts triggered by external releases.
    pub fn reacquire_attempts(&self) -> usize {
        self.inner.reacquire_attempts.load(Ordering::Acquire)
    }

    /// Attempt to become the exclusive holder.
    ///
    /// Returns `is_locked == true` with the holder when another agent owns
    /// the conversation; the session then waits for that claim's release.
    /// Re-acquiring a claim this agent already holds is a no-op. A store
    /// failure is returned as [`LockError::Store`] and leaves the session in
    /// [`SessionPhase::Failed`] without assuming ownership.
    pub async fn acquire(&self) -> Result<LockStatus, LockError> {
        self.inner.acquire().await
    }

    /// Stop the heartbeat and the watcher and delete the claim.
    ///
    /// A re-acquire still in flight is discarded. Returns `Ok(false)` if no
    /// claim matched; that is not an error.
    pub async fn release(&self) -> Result<bool, LockError> {
        self.inner.release().await
    }

    /// Release and consume the session.
    pub async fn close(self) -> Result<bool, LockError> {
        self.release().await
    }

    /// React to a change of the claim store.
    ///
    /// When this session is waiting and `event` releases its conversation,
    /// exactly one re-acquire attempt is made and its result returned.
    /// Events for other conversations, acquisitions, and releases that
    /// arrive while an attempt is already in flight return `None`.
    pub async fn on_external_change(
        &self,
        event: &ClaimEvent,
    ) -> Option<Result<LockStatus, LockError>> {
        self.inner.on_external_change(event).await
    }
}

impl<S: ClaimStore + ?Sized> Drop for ChatSessionLock<S> {
    fn drop(&mut self) {
        let inner = &self.inner;
        inner.retire();

        let phase = inner.phase.send_replace(SessionPhase::Idle);
        if !matches!(phase, SessionPhase::Held | SessionPhase::Failed { .. }) {
            return;
        }

        let store = Arc::clone(&inner.store);
        let chat_id = inner.chat_id.clone();
        let user_id = inner.user_id.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    match store.delete_claim(&chat_id, &user_id).await {
                        Ok(deleted) => {
                            tracing::debug!(%chat_id, %user_id, deleted, "Claim released on drop");
                        }
                        Err(e) => {
                            tracing::warn!(%chat_id, %user_id, error = %e, "Claim release on drop failed");
                        }
                    }
                });
            }
            Err(_) => {
                tracing::warn!(
                    %chat_id,
                    %user_id,
                    "Session dropped outside a runtime, claim left for the sweeper"
                );
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Inner
// ---------------------------------------------------------------------------

impl<S: ClaimStore + ?Sized> Inner<S> {
    fn tasks(&self) -> MutexGuard<'_, Tasks> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn phase(&self) -> SessionPhase {
        self.phase.borrow().clone()
    }

    fn set_phase(&self, phase: SessionPhase) {
        self.phase.send_replace(phase);
    }

    fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Stop both tasks and start a new generation, invalidating any acquire
    /// still waiting on the store.
    fn retire(&self) {
        let mut tasks = self.tasks();
        self.generation.fetch_add(1, Ordering::AcqRel);
        tasks.heartbeat = None;
        tasks.watcher = None;
    }

    async fn acquire(self: &Arc<Self>) -> Result<LockStatus, LockError> {
        let generation = self.generation();

        // Subscribe before reading so a release landing between the read and
        // the watcher start is still delivered.
        let subscription = if self.tasks().watcher.is_none() {
            Some(self.store.subscribe(&self.chat_id))
        } else {
            None
        };

        let outcome = claim::try_acquire(&*self.store, &self.chat_id, &self.user_id).await;

        // Commit under the tasks lock so a concurrent `retire` either sees
        // the new tasks and stops them, or moves the generation first.
        let committed = {
            let mut tasks = self.tasks();
            let current = self.generation() == generation;
            if current {
                match &outcome {
                    Ok(AcquireOutcome::LockedBy(holder)) => {
                        tasks.heartbeat = None;
                        self.set_phase(SessionPhase::Waiting {
                            holder: holder.clone(),
                        });
                        if let Some(subscription) = subscription {
                            if tasks.watcher.is_none() {
                                tasks.watcher = Some(self.spawn_watcher(subscription));
                            }
                        }
                    }
                    Ok(_) => {
                        tasks.watcher = None;
                        if tasks.heartbeat.is_none() {
                            tasks.heartbeat = Some(self.spawn_heartbeat(generation));
                        }
                        self.set_phase(SessionPhase::Held);
                    }
                    Err(e) => {
                        tasks.heartbeat = None;
                        tasks.watcher = None;
                        self.set_phase(SessionPhase::Failed {
                            reason: e.to_string(),
                        });
                    }
                }
            }
            current
        };

        if !committed {
            return self.discard(outcome).await;
        }

        match outcome {
            Ok(AcquireOutcome::LockedBy(holder)) => {
                tracing::info!(
                    chat_id = %self.chat_id,
                    user_id = %self.user_id,
                    holder = holder.as_deref().unwrap_or("unknown"),
                    "Conversation locked by another agent"
                );
                Ok(LockStatus::locked_by(holder))
            }
            Ok(outcome) => {
                tracing::info!(
                    chat_id = %self.chat_id,
                    user_id = %self.user_id,
                    reentered = outcome == AcquireOutcome::Reentered,
                    "Conversation claimed"
                );
                Ok(outcome.status())
            }
            Err(e) => {
                tracing::error!(
                    chat_id = %self.chat_id,
                    user_id = %self.user_id,
                    error = %e,
                    "Claim acquire failed"
                );
                Err(LockError::Store(e))
            }
        }
    }

    /// Drop the result of an acquire that was overtaken by a release. A
    /// claim this attempt inserted is deleted again.
    async fn discard(
        &self,
        outcome: Result<AcquireOutcome, StoreError>,
    ) -> Result<LockStatus, LockError> {
        tracing::debug!(
            chat_id = %self.chat_id,
            user_id = %self.user_id,
            "Session released during acquire, discarding the result"
        );
        match outcome {
            Ok(AcquireOutcome::Acquired) => {
                match self.store.delete_claim(&self.chat_id, &self.user_id).await {
                    Ok(deleted) => {
                        tracing::info!(
                            chat_id = %self.chat_id,
                            user_id = %self.user_id,
                            deleted,
                            "Late claim released"
                        );
                    }
                    Err(e) => {
                        tracing::warn!(
                            chat_id = %self.chat_id,
                            user_id = %self.user_id,
                            error = %e,
                            "Late claim release failed, claim left for the sweeper"
                        );
                    }
                }
                Ok(LockStatus::unlocked())
            }
            Ok(AcquireOutcome::Reentered) => Ok(LockStatus::unlocked()),
            Ok(AcquireOutcome::LockedBy(holder)) => Ok(LockStatus::locked_by(holder)),
            Err(e) => Err(LockError::Store(e)),
        }
    }

    async fn release(&self) -> Result<bool, LockError> {
        self.retire();

        match self.store.delete_claim(&self.chat_id, &self.user_id).await {
            Ok(deleted) => {
                self.set_phase(SessionPhase::Idle);
                tracing::info!(
                    chat_id = %self.chat_id,
                    user_id = %self.user_id,
                    deleted,
                    "Conversation released"
                );
                Ok(deleted)
            }
            Err(e) => {
                tracing::error!(
                    chat_id = %self.chat_id,
                    user_id = %self.user_id,
                    error = %e,
                    "Claim release failed"
                );
                self.set_phase(SessionPhase::Failed {
                    reason: e.to_string(),
                });
                Err(LockError::Store(e))
            }
        }
    }

    async fn on_external_change(
        self: &Arc<Self>,
        event: &ClaimEvent,
    ) -> Option<Result<LockStatus, LockError>> {
        if event.chat_id() != self.chat_id || !event.is_release() {
            return None;
        }
        if !matches!(self.phase(), SessionPhase::Waiting { .. }) {
            return None;
        }
        if self.reacquiring.swap(true, Ordering::AcqRel) {
            tracing::debug!(chat_id = %self.chat_id, "Re-acquire already in flight");
            return None;
        }

        self.reacquire_attempts.fetch_add(1, Ordering::AcqRel);
        tracing::debug!(
            chat_id = %self.chat_id,
            user_id = %self.user_id,
            released_by = event.user_id(),
            "Claim released elsewhere, re-acquiring"
        );
        let result = self.acquire().await;
        self.reacquiring.store(false, Ordering::Release);
        Some(result)
    }

    /// The heartbeat found no claim to refresh: the row was deleted under a
    /// held session. Re-read the store to learn who holds it now.
    async fn on_claim_lost(self: &Arc<Self>, generation: u64) {
        {
            let mut tasks = self.tasks();
            if self.generation() != generation || !self.phase().holds_claim() {
                return;
            }
            tasks.heartbeat = None;
        }

        tracing::warn!(
            chat_id = %self.chat_id,
            user_id = %self.user_id,
            "Claim lost while held, re-acquiring"
        );
        // The outcome is published through the phase.
        let _ = self.acquire().await;
    }

    fn spawn_heartbeat(self: &Arc<Self>, generation: u64) -> DropGuard {
        let token = CancellationToken::new();
        let session = Arc::downgrade(self);
        heartbeat::spawn(
            Arc::clone(&self.store),
            self.chat_id.clone(),
            self.user_id.clone(),
            self.config.heartbeat_interval,
            token.clone(),
            move || {
                if let Some(inner) = session.upgrade() {
                    tokio::spawn(async move { inner.on_claim_lost(generation).await });
                }
            },
        );
        token.drop_guard()
    }

    /// Run `on_external_change` for every release on `subscription` until
    /// the watcher is stopped or the session is gone.
    fn spawn_watcher(self: &Arc<Self>, mut subscription: ChatSubscription) -> DropGuard {
        let token = CancellationToken::new();
        let cancel = token.clone();
        let session = Arc::downgrade(self);
        tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    _ = cancel.cancelled() => break,
                    event = subscription.next_release() => match event {
                        Some(event) => event,
                        None => break,
                    },
                };
                let Some(inner) = session.upgrade() else {
                    break;
                };
                inner.on_external_change(&event).await;
            }

            // The change feed closed under us; forget this watcher so the
            // next acquire can start a fresh one.
            if !cancel.is_cancelled() {
                if let Some(inner) = session.upgrade() {
                    tracing::warn!(chat_id = %inner.chat_id, "Claim change feed closed");
                    inner.tasks().watcher = None;
                }
            }
        });
        token.drop_guard()
    }
}
