//! Single-slot wake-up signal between the HTTP handler and the IR transmit
//! thread. At most one request is remembered; signals that arrive while one
//! is pending collapse into it.

use std::{
    sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

#[derive(Debug, Default)]
struct GateInner {
    signaled: Mutex<bool>,
    wake: Condvar,
}

#[derive(Debug, Clone, Default)]
pub struct TriggerGate {
    inner: Arc<GateInner>,
}

impl TriggerGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the gate signaled and wakes the waiting consumer, if any.
    /// Returns `false` when a signal was already pending and this one was
    /// coalesced into it. Never waits on the consumer.
    pub fn signal(&self) -> bool {
        let mut signaled = self.lock();
        if *signaled {
            return false;
        }
        *signaled = true;
        drop(signaled);

        self.inner.wake.notify_one();
        true
    }

    /// Blocks until signaled, then clears the gate.
    pub fn wait(&self) {
        let mut signaled = self.lock();
        while !*signaled {
            signaled = self
                .inner
                .wake
                .wait(signaled)
                .unwrap_or_else(PoisonError::into_inner);
        }
        *signaled = false;
    }

    /// Like [`wait`](Self::wait) but gives up after `timeout`. Returns whether
    /// a signal was taken.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let guard = self.lock();
        let (mut signaled, _) = self
            .inner
            .wake
            .wait_timeout_while(guard, timeout, |signaled| !*signaled)
            .unwrap_or_else(PoisonError::into_inner);

        let taken = *signaled;
        *signaled = false;
        taken
    }

    pub fn is_signaled(&self) -> bool {
        *self.lock()
    }

    // The cell is a plain bool, so a poisoned lock still holds a valid value.
    fn lock(&self) -> MutexGuard<'_, bool> {
        self.inner
            .signaled
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
