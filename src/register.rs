//! The surface shared by every register kind.

use crate::error::RegisterError;
use crate::history::{CursorCode, HistoryEvent, HistoryLog};
use crate::notify::{Notifier, Wake};

/// Lifecycle of a register's storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum State {
    /// Constructed, `init()` not called yet.
    Uninit,
    /// Storage allocated.
    Ready,
    /// `init()` failed; every operation is a no-op.
    Inert,
}

impl State {
    /// Log and reject access unless the register is ready.
    pub(crate) fn check(self) -> Result<(), RegisterError> {
        match self {
            State::Ready => Ok(()),
            State::Uninit | State::Inert => {
                #[cfg(feature = "defmt")]
                defmt::error!("register used before successful init");
                Err(RegisterError::NotInitialized)
            }
        }
    }
}

/// A shared, observable unit of mutable state.
///
/// Implementors own a [`HistoryLog`] and a [`Notifier`]; the provided
/// methods give consumers a uniform way to follow changes regardless of
/// whether the register is dense or sparse.
pub trait Register {
    /// The register's change log.
    fn history(&self) -> &HistoryLog;

    /// The register's consumer binding.
    fn notifier(&self) -> &Notifier;

    /// Mutable access to the consumer binding.
    fn notifier_mut(&mut self) -> &mut Notifier;

    /// CRC-32 of the register contents, continuing from `seed`.
    fn crc32(&self, seed: u32) -> u32;

    /// Current write cursor ("start listening from now").
    fn history_code(&self) -> CursorCode {
        self.history().write_cursor()
    }

    /// Next change after `cursor`, advancing it. See [`HistoryLog::poll`].
    fn poll_history(&self, cursor: &mut CursorCode) -> Option<HistoryEvent> {
        self.history().poll(cursor)
    }

    /// `true` if anything was committed since `cursor`.
    fn changed_since(&self, cursor: CursorCode) -> bool {
        self.history_code() != cursor
    }

    /// Drain up to `N` events into a fixed-capacity vector.
    ///
    /// Events that do not fit stay in the log for the next call.
    fn drain_history<const N: usize>(
        &self,
        cursor: &mut CursorCode,
    ) -> heapless::Vec<HistoryEvent, N> {
        let mut events = heapless::Vec::new();
        while !events.is_full() {
            match self.poll_history(cursor) {
                Some(event) => {
                    // Cannot fail: checked `is_full()` above.
                    let _ = events.push(event);
                }
                None => break,
            }
        }
        events
    }

    /// Bind the consumer woken on every committed change. Only the first
    /// call succeeds.
    fn set_notify(&mut self, target: &'static dyn Wake) -> Result<(), RegisterError> {
        self.notifier_mut().bind(target)
    }
}
