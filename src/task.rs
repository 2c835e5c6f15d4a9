//! Async helpers for tasks that consume registers.
//!
//! These are regular `async fn`s, **not** Embassy `#[task]`s. Embassy
//! tasks cannot be generic, so wrap them in a concrete task:
//!
//! ```ignore
//! static FILES: SharedRegister<FileCommand> = SharedRegister::new(FileCommand::new(8));
//! static FILES_WAKE: WakeSignal = WakeSignal::new();
//!
//! #[embassy_executor::task]
//! async fn storage_task() {
//!     let mut cursor = FILES.history_code();
//!     follow_history(&FILES, &FILES_WAKE, &mut cursor, &PollConfig::default(), |event| {
//!         if let HistoryEvent::Record(record) = event {
//!             if let Some((kind, request)) = FileCommand::decode(&record) {
//!                 // ... perform the request ...
//!                 FILES.clear(kind);
//!             }
//!         }
//!     })
//!     .await
//! }
//! ```

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::signal::Signal;
use embassy_time::{with_timeout, Duration, Timer};

use crate::history::{CursorCode, HistoryEvent};
use crate::register::Register;
use crate::shared::SharedRegister;

// ── Configuration ────────────────────────────────────────────────────────

/// Polling periods for consumer loops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PollConfig {
    /// Delay between predicate checks in [`wait_until`].
    pub busy_period_ms: u64,
    /// Longest a [`follow_history`] loop sleeps without a wake before it
    /// re-polls anyway.
    pub idle_period_ms: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            busy_period_ms: 1,
            idle_period_ms: 8,
        }
    }
}

// ── Waiting ──────────────────────────────────────────────────────────────

/// Wait until `pred` holds for the shared register, checking every
/// `config.busy_period_ms`.
///
/// The predicate runs inside the register's critical section and must be
/// short.
pub async fn wait_until<R>(
    shared: &SharedRegister<R>,
    config: &PollConfig,
    mut pred: impl FnMut(&R) -> bool,
) {
    let period = Duration::from_millis(config.busy_period_ms);
    while !shared.lock(|r| pred(r)) {
        Timer::after(period).await;
    }
}

/// Wait for a wake on `signal`, giving up after `timeout_ms`.
///
/// Returns `true` if woken, `false` on timeout.
pub async fn wait_for_wake<M: RawMutex>(signal: &Signal<M, ()>, timeout_ms: u64) -> bool {
    with_timeout(Duration::from_millis(timeout_ms), signal.wait())
        .await
        .is_ok()
}

/// Drain-then-wait consumer loop.
///
/// Every event after `cursor` is handed to `handler`; then the task
/// sleeps until the register wakes it or `config.idle_period_ms` passes.
/// Wakes collapse, so each wake drains until the log is empty.
///
/// `handler` runs outside the register's lock and may write to it.
pub async fn follow_history<R, M>(
    shared: &SharedRegister<R>,
    signal: &Signal<M, ()>,
    cursor: &mut CursorCode,
    config: &PollConfig,
    mut handler: impl FnMut(HistoryEvent),
) -> !
where
    R: Register,
    M: RawMutex,
{
    loop {
        while let Some(event) = shared.poll_history(cursor) {
            handler(event);
        }
        let _woken = wait_for_wake(signal, config.idle_period_ms).await;
        #[cfg(feature = "defmt")]
        if !_woken {
            defmt::trace!("follow_history: idle re-poll");
        }
    }
}

// ── Unit Tests ───────────────────────────────────────────────────────────
