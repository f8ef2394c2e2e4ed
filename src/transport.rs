//! Shared transport flags coordinating the control surface and the playback engine.
//!
//! All three flags live behind one mutex and every write notifies the paired
//! condition variable, so the engine can block while stopped and can be woken
//! out of a per-event wait the moment playback is stopped.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use log::trace;
use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TransportFlags {
    pub playing: bool,
    /// Never reset once set
    pub exiting: bool,
    pub auto_exit: bool,
}

impl TransportFlags {
    /// True while a play pass should keep going
    pub fn is_active(&self) -> bool {
        self.playing && !self.exiting
    }
}

#[derive(Debug, Default)]
pub struct TransportState {
    flags: Mutex<TransportFlags>,
    changed: Condvar,
}

impl TransportState {
    pub fn new(auto_exit: bool) -> Self {
        TransportState {
            flags: Mutex::new(TransportFlags {
                playing: false,
                exiting: false,
                auto_exit,
            }),
            changed: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, TransportFlags> {
        self.flags.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn update<F: FnOnce(&mut TransportFlags)>(&self, f: F) {
        let mut flags = self.lock();
        f(&mut flags);
        trace!("transport -> {:?}", *flags);
        drop(flags);
        self.changed.notify_all();
    }

    /// Request playback. Ignored once the process is exiting.
    pub fn play(&self) -> bool {
        let mut accepted = false;
        self.update(|f| {
            if !f.exiting {
                f.playing = true;
                accepted = true;
            }
        });
        accepted
    }

    pub fn stop(&self) {
        self.update(|f| f.playing = false);
    }

    pub fn exit(&self) {
        self.update(|f| {
            f.playing = false;
            f.exiting = true;
        });
    }

    pub fn snapshot(&self) -> TransportFlags {
        *self.lock()
    }

    pub fn is_playing(&self) -> bool {
        self.lock().playing
    }

    pub fn is_exiting(&self) -> bool {
        self.lock().exiting
    }

    pub fn auto_exit(&self) -> bool {
        self.lock().auto_exit
    }

    /// Block until playback is requested or the process starts exiting.
    pub fn wait_for_play(&self) -> TransportFlags {
        let guard = self.lock();
        let guard = self
            .changed
            .wait_while(guard, |f| !f.playing && !f.exiting)
            .unwrap_or_else(PoisonError::into_inner);
        *guard
    }

    /// Sleep until `deadline` unless playback is stopped first.
    ///
    /// Returns true when the deadline was reached with playback still active,
    /// false as soon as `playing` drops or `exiting` is raised.
    pub fn wait_until(&self, deadline: Instant) -> bool {
        let guard = self.lock();
        let timeout = deadline.saturating_duration_since(Instant::now());
        let (guard, _) = self
            .changed
            .wait_timeout_while(guard, timeout, |f| f.is_active())
            .unwrap_or_else(PoisonError::into_inner);
        guard.is_active()
    }
}
