//! Binding leases
//!
//! A [`Binding`] marks a surface (widget, media controls, CLI) that wants
//! the session engine kept alive. The live set and the teardown epoch sit
//! behind one mutex: every bind and every drop to zero bumps the epoch, so
//! a teardown armed for an older epoch is simply ignored.
//!
//! The engine task watches [`LeaseState`] instead of being called from
//! `bind`/`unbind`, which keeps backend work off the caller's thread.

use crate::error::{Error, Result};
use crate::session::handle::SessionHandle;
use std::collections::HashSet;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tracing::debug;

/// Identifier of one lease
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BindingId(u64);

impl fmt::Display for BindingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Live binding count plus the epoch it was observed at
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LeaseState {
    pub live: usize,
    pub epoch: u64,
}

#[derive(Debug, Default)]
struct Leases {
    live: HashSet<BindingId>,
    next_id: u64,
    epoch: u64,
}

impl Leases {
    fn state(&self) -> LeaseState {
        LeaseState {
            live: self.live.len(),
            epoch: self.epoch,
        }
    }
}

#[derive(Debug)]
pub struct BindingRegistry {
    leases: Mutex<Leases>,
    state_tx: watch::Sender<LeaseState>,
}

impl Default for BindingRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl BindingRegistry {
    pub fn new() -> Self {
        let (state_tx, _) = watch::channel(LeaseState::default());
        Self {
            leases: Mutex::new(Leases::default()),
            state_tx,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Leases> {
        self.leases.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a new lease
    pub(crate) fn acquire(&self) -> BindingId {
        let mut leases = self.lock();
        let id = BindingId(leases.next_id);
        leases.next_id += 1;
        leases.live.insert(id);
        leases.epoch += 1;
        let state = leases.state();
        self.state_tx.send_replace(state);
        debug!("Bound {} (live: {})", id, state.live);
        id
    }

    /// Drop a lease; fails if it was already released
    pub(crate) fn release(&self, id: BindingId) -> Result<()> {
        let mut leases = self.lock();
        if !leases.live.remove(&id) {
            return Err(Error::StaleBinding(id));
        }
        if leases.live.is_empty() {
            leases.epoch += 1;
        }
        let state = leases.state();
        self.state_tx.send_replace(state);
        debug!("Unbound {} (live: {})", id, state.live);
        Ok(())
    }

    pub fn is_live(&self, id: BindingId) -> bool {
        self.lock().live.contains(&id)
    }

    pub fn live_count(&self) -> usize {
        self.lock().live.len()
    }

    pub fn state(&self) -> LeaseState {
        self.lock().state()
    }

    pub fn subscribe(&self) -> watch::Receiver<LeaseState> {
        self.state_tx.subscribe()
    }
}

/// Lease on the session engine
///
/// Dropping the binding unbinds it. Commands issued through
/// [`Binding::session`] fail with `StaleBinding` once the lease is gone.
pub struct Binding {
    id: BindingId,
    session: SessionHandle,
    released: bool,
}

impl Binding {
    pub(crate) fn new(id: BindingId, session: SessionHandle) -> Self {
        Self {
            id,
            session,
            released: false,
        }
    }

    pub fn id(&self) -> BindingId {
        self.id
    }

    pub fn is_live(&self) -> bool {
        !self.released && self.session.bindings().is_live(self.id)
    }

    /// Session handle, as long as this lease is still live
    pub fn session(&self) -> Result<&SessionHandle> {
        if self.is_live() {
            Ok(&self.session)
        } else {
            Err(Error::StaleBinding(self.id))
        }
    }

    /// Unbind explicitly, reporting a lease that was already released
    pub fn release(mut self) -> Result<()> {
        self.released = true;
        self.session.bindings().release(self.id)
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("id", &self.id)
            .field("released", &self.released)
            .finish()
    }
}

impl Drop for Binding {
    fn drop(&mut self) {
        if !self.released {
            // Already unbound by id through the handle: nothing left to do
            let _ = self.session.bindings().release(self.id);
        }
    }
}
