// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process coordination ensemble
//!
//! Implements the distributed mutex recipe over a shared node tree:
//! every contender adds an ephemeral sequential child (`lock-0000000007`)
//! under the lock path, the lowest child owns the lock, and each other child
//! watches only its immediate predecessor, so admission is first come first
//! served and a release wakes exactly one waiter. Nodes belong to the
//! session that created them and disappear when it expires or closes.
//! A lock path is pruned once its last child goes, and a session is
//! forgotten once its last clone and handle are dropped, so the tree only
//! grows with the locks and sessions currently in use.
//!
//! Besides backing single-process deployments, the ensemble exposes the
//! node tree and fault injection hooks for tests.

use async_trait::async_trait;
use lockguard_core::{CoordinationError, DistributedMutex, HolderId, MutexFactory};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

/// Identifier of a client session with the ensemble
pub type SessionId = u64;

struct Node {
    session: SessionId,
    holder: HolderId,
    /// Outstanding acquisitions across every handle of this holder
    holds: u32,
    /// Closed when the node is removed, waking whoever watches it
    watch: watch::Sender<()>,
}

#[derive(Default)]
struct LockPath {
    children: BTreeMap<u64, Node>,
}

#[derive(Default)]
struct EnsembleState {
    next_session: SessionId,
    /// Shared by every path so a pruned and recreated path never reuses a number
    next_seq: u64,
    live: HashSet<SessionId>,
    locks: HashMap<String, LockPath>,
    // Configurable failure modes
    unavailable: bool,
    acquire_faults: VecDeque<CoordinationError>,
    release_faults: VecDeque<CoordinationError>,
}

impl EnsembleState {
    fn check_reachable(&self, session: SessionId) -> Result<(), CoordinationError> {
        if self.unavailable {
            return Err(CoordinationError::ConnectionLoss(
                "ensemble unavailable".to_string(),
            ));
        }
        if !self.live.contains(&session) {
            return Err(CoordinationError::SessionExpired(format!("session {session}")));
        }
        Ok(())
    }

    fn is_expired(&self, session: SessionId) -> bool {
        !self.live.contains(&session)
    }

    fn node_mut(&mut self, path: &str, seq: u64) -> Option<&mut Node> {
        self.locks.get_mut(path)?.children.get_mut(&seq)
    }

    fn remove_node(&mut self, path: &str, seq: u64) {
        let Some(lock) = self.locks.get_mut(path) else {
            return;
        };
        if lock.children.remove(&seq).is_some() {
            tracing::trace!(path, seq, "node removed");
        }
        if lock.children.is_empty() {
            self.locks.remove(path);
        }
    }

    /// Drop every node owned by `session` and prune the paths left empty
    fn remove_session_nodes(&mut self, session: SessionId) {
        self.locks.retain(|path, lock| {
            let before = lock.children.len();
            lock.children.retain(|_, node| node.session != session);
            let removed = before - lock.children.len();
            if removed > 0 {
                tracing::debug!(path = %path, session, removed, "session nodes removed");
            }
            !lock.children.is_empty()
        });
    }
}

fn node_name(seq: u64) -> String {
    format!("lock-{seq:010}")
}

/// Shared node tree standing in for a coordination ensemble
#[derive(Clone, Default)]
pub struct InMemoryEnsemble {
    state: Arc<Mutex<EnsembleState>>,
    namespace: Option<String>,
}

impl InMemoryEnsemble {
    pub fn new() -> Self {
        Self::default()
    }

    /// Root every lock path under `/<namespace>`
    pub fn with_namespace(namespace: impl Into<String>) -> Self {
        let namespace = namespace.into().trim_matches('/').to_string();
        Self {
            state: Arc::default(),
            namespace: (!namespace.is_empty()).then_some(namespace),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, EnsembleState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn full_path(&self, path: &str) -> String {
        match &self.namespace {
            Some(ns) => format!("/{ns}{path}"),
            None => path.to_string(),
        }
    }

    /// Open a new client session
    pub fn connect(&self) -> EnsembleSession {
        let mut state = self.lock_state();
        let id = state.next_session;
        state.next_session += 1;
        state.live.insert(id);
        EnsembleSession {
            inner: Arc::new(SessionInner {
                ensemble: self.clone(),
                id,
            }),
        }
    }

    /// End a session as if its client vanished: all of its nodes are removed
    pub fn expire_session(&self, session: SessionId) {
        let mut state = self.lock_state();
        if state.live.remove(&session) {
            tracing::debug!(session, "session expired");
        }
        state.remove_session_nodes(session);
    }

    /// While unavailable every call fails with a connection loss
    pub fn set_unavailable(&self, unavailable: bool) {
        self.lock_state().unavailable = unavailable;
    }

    pub fn fail_next_acquire(&self, err: CoordinationError) {
        self.lock_state().acquire_faults.push_back(err);
    }

    pub fn fail_next_release(&self, err: CoordinationError) {
        self.lock_state().release_faults.push_back(err);
    }

    /// Live children under a lock path, lowest first
    pub fn children(&self, path: &str) -> Vec<String> {
        let full = self.full_path(path);
        self.lock_state()
            .locks
            .get(&full)
            .map(|lock| lock.children.keys().map(|seq| node_name(*seq)).collect())
            .unwrap_or_default()
    }

    /// Current owner of a lock path
    pub fn holder(&self, path: &str) -> Option<HolderId> {
        let full = self.full_path(path);
        let state = self.lock_state();
        let (_, first) = state.locks.get(&full)?.children.iter().next()?;
        (first.holds > 0).then(|| first.holder.clone())
    }

    pub fn is_free(&self, path: &str) -> bool {
        self.holder(path).is_none()
    }

    /// Live nodes across all lock paths
    pub fn node_count(&self) -> usize {
        self.lock_state()
            .locks
            .values()
            .map(|lock| lock.children.len())
            .sum()
    }

    /// Lock paths that currently have at least one child
    pub fn path_count(&self) -> usize {
        self.lock_state().locks.len()
    }

    /// Sessions that are neither expired nor closed
    pub fn session_count(&self) -> usize {
        self.lock_state().live.len()
    }
}

struct SessionInner {
    ensemble: InMemoryEnsemble,
    id: SessionId,
}

impl Drop for SessionInner {
    fn drop(&mut self) {
        let mut state = self.ensemble.lock_state();
        state.live.remove(&self.id);
        state.remove_session_nodes(self.id);
        tracing::trace!(session = self.id, "session closed");
    }
}

/// A client session; creates mutex handles whose nodes belong to it
///
/// The session closes once every clone and every handle created from it
/// has been dropped.
#[derive(Clone)]
pub struct EnsembleSession {
    inner: Arc<SessionInner>,
}

impl EnsembleSession {
    pub fn id(&self) -> SessionId {
        self.inner.id
    }

    pub fn ensemble(&self) -> &InMemoryEnsemble {
        &self.inner.ensemble
    }
}

impl MutexFactory for EnsembleSession {
    type Mutex = InMemoryMutex;

    fn create(&self, path: &str, holder: &HolderId) -> Result<InMemoryMutex, CoordinationError> {
        let ensemble = &self.inner.ensemble;
        ensemble.lock_state().check_reachable(self.inner.id)?;
        Ok(InMemoryMutex {
            ensemble: ensemble.clone(),
            session: self.inner.id,
            _owner: Arc::clone(&self.inner),
            path: ensemble.full_path(path),
            holder: holder.clone(),
            state: HandleState::Idle,
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum HandleState {
    Idle,
    Waiting(u64),
    Holding { seq: u64, count: u32 },
}

/// Handle on one lock path for one holder
///
/// Dropping the handle retires any node it still waits on or holds.
pub struct InMemoryMutex {
    ensemble: InMemoryEnsemble,
    session: SessionId,
    /// Keeps the session open while this handle lives
    _owner: Arc<SessionInner>,
    path: String,
    holder: HolderId,
    state: HandleState,
}

enum Enqueued {
    Acquired,
    Queued(u64),
}

impl InMemoryMutex {
    /// Take a place in the queue, or re-enter a hold this holder already has
    fn enqueue(&mut self) -> Result<Enqueued, CoordinationError> {
        let mut state = self.ensemble.lock_state();
        state.check_reachable(self.session)?;
        if let Some(err) = state.acquire_faults.pop_front() {
            return Err(err);
        }

        match self.state {
            HandleState::Holding { seq, count } => match state.node_mut(&self.path, seq) {
                Some(node) => {
                    node.holds += 1;
                    self.state = HandleState::Holding {
                        seq,
                        count: count + 1,
                    };
                    Ok(Enqueued::Acquired)
                }
                None => {
                    self.state = HandleState::Idle;
                    Err(CoordinationError::NoNode(self.path.clone()))
                }
            },
            HandleState::Waiting(seq) => Ok(Enqueued::Queued(seq)),
            HandleState::Idle => {
                let seq = state.next_seq;
                let lock = state.locks.entry(self.path.clone()).or_default();

                if let Some((&owner_seq, owner)) = lock.children.iter_mut().next() {
                    if owner.session == self.session && owner.holder == self.holder {
                        owner.holds += 1;
                        self.state = HandleState::Holding {
                            seq: owner_seq,
                            count: 1,
                        };
                        tracing::trace!(path = %self.path, seq = owner_seq, "re-entered");
                        return Ok(Enqueued::Acquired);
                    }
                }

                let (watch, _) = watch::channel(());
                lock.children.insert(
                    seq,
                    Node {
                        session: self.session,
                        holder: self.holder.clone(),
                        holds: 0,
                        watch,
                    },
                );
                state.next_seq = seq + 1;
                self.state = HandleState::Waiting(seq);
                tracing::trace!(path = %self.path, seq, "node created");
                Ok(Enqueued::Queued(seq))
            }
        }
    }

    /// Take the lock if `seq` is the lowest child, otherwise return watchers
    /// on the immediate predecessor and on our own node
    fn check_turn(
        &mut self,
        seq: u64,
    ) -> Result<Option<(watch::Receiver<()>, watch::Receiver<()>)>, CoordinationError> {
        let mut state = self.ensemble.lock_state();
        let expired = state.is_expired(self.session);

        let Some(lock) = state
            .locks
            .get_mut(&self.path)
            .filter(|lock| lock.children.contains_key(&seq))
        else {
            self.state = HandleState::Idle;
            return Err(if expired {
                CoordinationError::SessionExpired(format!("session {}", self.session))
            } else {
                CoordinationError::NoNode(format!("{}/{}", self.path, node_name(seq)))
            });
        };
        let predecessor = lock
            .children
            .range(..seq)
            .next_back()
            .map(|(_, node)| node.watch.subscribe());
        let Some(own) = lock.children.get_mut(&seq) else {
            self.state = HandleState::Idle;
            return Err(CoordinationError::NoNode(self.path.clone()));
        };

        match predecessor {
            None => {
                own.holds += 1;
                self.state = HandleState::Holding { seq, count: 1 };
                Ok(None)
            }
            Some(pred) => Ok(Some((pred, own.watch.subscribe()))),
        }
    }

    fn abandon(&mut self, seq: u64) {
        self.ensemble.lock_state().remove_node(&self.path, seq);
        self.state = HandleState::Idle;
    }
}

#[async_trait]
impl DistributedMutex for InMemoryMutex {
    async fn try_acquire(&mut self, timeout: Duration) -> Result<bool, CoordinationError> {
        let deadline = Instant::now().checked_add(timeout);
        let seq = match self.enqueue()? {
            Enqueued::Acquired => return Ok(true),
            Enqueued::Queued(seq) => seq,
        };

        loop {
            let Some((mut predecessor, mut own)) = self.check_turn(seq)? else {
                tracing::trace!(path = %self.path, seq, "acquired");
                return Ok(true);
            };

            let woken = async {
                tokio::select! {
                    _ = predecessor.changed() => {}
                    _ = own.changed() => {}
                }
            };
            let in_time = match deadline {
                Some(deadline) => tokio::time::timeout_at(deadline, woken).await.is_ok(),
                None => {
                    woken.await;
                    true
                }
            };

            if !in_time {
                self.abandon(seq);
                tracing::trace!(path = %self.path, seq, "wait elapsed");
                return Ok(false);
            }
        }
    }

    async fn release(&mut self) -> Result<(), CoordinationError> {
        let mut state = self.ensemble.lock_state();
        if let Some(err) = state.release_faults.pop_front() {
            return Err(err);
        }
        let HandleState::Holding { seq, count } = self.state else {
            return Err(CoordinationError::NotHeld(self.path.clone()));
        };
        state.check_reachable(self.session)?;

        let Some(node) = state.node_mut(&self.path, seq) else {
            self.state = HandleState::Idle;
            return Err(CoordinationError::NoNode(self.path.clone()));
        };
        node.holds = node.holds.saturating_sub(1);
        if node.holds == 0 {
            state.remove_node(&self.path, seq);
        }

        self.state = if count > 1 {
            HandleState::Holding {
                seq,
                count: count - 1,
            }
        } else {
            HandleState::Idle
        };
        Ok(())
    }
}

impl Drop for InMemoryMutex {
    fn drop(&mut self) {
        let mut state = self.ensemble.lock_state();
        match self.state {
            HandleState::Idle => {}
            HandleState::Waiting(seq) => state.remove_node(&self.path, seq),
            HandleState::Holding { seq, count } => {
                if let Some(node) = state.node_mut(&self.path, seq) {
                    node.holds = node.holds.saturating_sub(count);
                    if node.holds == 0 {
                        state.remove_node(&self.path, seq);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
