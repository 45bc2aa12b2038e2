//! In-process table of active quote wizard sessions.
//!
//! Each user owns a slot guarded by its own mutex, so two transitions for the same
//! user never interleave while different users proceed independently. Nothing
//! survives a restart.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::domain::session::{QuoteSession, UserId};

type Slot = Arc<Mutex<Option<QuoteSession>>>;

#[derive(Default)]
pub struct SessionStore {
    slots: Mutex<HashMap<UserId, Slot>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a fresh session, replacing any existing one for the user.
    pub fn start(&self, user_id: UserId) -> QuoteSession {
        let session = QuoteSession::new(user_id);
        let slot = self.slot(user_id);
        *lock(&slot) = Some(session.clone());
        session
    }

    /// Runs `f` with exclusive access to the user's slot. Setting the slot to
    /// `None` ends the session.
    pub fn with_session<R>(
        &self,
        user_id: UserId,
        f: impl FnOnce(&mut Option<QuoteSession>) -> R,
    ) -> R {
        let slot = self.slot(user_id);
        let (result, ended) = {
            let mut guard = lock(&slot);
            let result = f(&mut *guard);
            (result, guard.is_none())
        };
        drop(slot);
        if ended {
            self.prune_idle();
        }
        result
    }

    pub fn get(&self, user_id: UserId) -> Option<QuoteSession> {
        let slots = lock(&self.slots);
        let slot = slots.get(&user_id)?.clone();
        drop(slots);
        let guard = lock(&slot);
        guard.clone()
    }

    /// Returns `true` when a session existed.
    pub fn remove(&self, user_id: UserId) -> bool {
        self.with_session(user_id, |session| session.take().is_some())
    }

    pub fn is_active(&self, user_id: UserId) -> bool {
        self.get(user_id).is_some()
    }

    pub fn active_count(&self) -> usize {
        let slots: Vec<Slot> = lock(&self.slots).values().cloned().collect();
        slots.iter().filter(|slot| lock(slot).is_some()).count()
    }

    fn slot(&self, user_id: UserId) -> Slot {
        lock(&self.slots).entry(user_id).or_default().clone()
    }

    /// Drops empty slots nobody else is holding.
    fn prune_idle(&self) {
        let mut slots = lock(&self.slots);
        slots.retain(|_, slot| {
            if Arc::strong_count(slot) > 1 {
                return true;
            }
            match slot.try_lock() {
                Ok(session) => session.is_some(),
                Err(_) => true,
            }
        });
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
