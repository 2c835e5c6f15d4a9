//! One-shot binding from a register to a consumer task's wake primitive.
//!
//! The wake is *collapsing*: signalling several times before the consumer
//! runs produces a single wake-up. Consumers must therefore drain the
//! register's history in a loop after every wake rather than infer how many
//! changes happened from how often they were woken.

use embassy_sync::blocking_mutex::raw::{CriticalSectionRawMutex, RawMutex};
use embassy_sync::signal::Signal;

use crate::error::RegisterError;

/// A primitive that can wake a waiting consumer.
///
/// Repeated calls before the consumer wakes must merge into one wake-up.
pub trait Wake: Sync {
    /// Wake the consumer (or leave it marked to wake on its next wait).
    fn wake(&self);
}

impl<M> Wake for Signal<M, ()>
where
    M: RawMutex + Sync,
{
    fn wake(&self) {
        self.signal(());
    }
}

/// The wake primitive consumer tasks normally bind: a single-slot embassy
/// [`Signal`] whose pending value is overwritten, never queued.
pub type WakeSignal = Signal<CriticalSectionRawMutex, ()>;

/// Optional consumer binding held by every register.
///
/// Binding happens once at boot. There is no rebinding or unbinding.
#[derive(Default)]
pub struct Notifier {
    target: Option<&'static dyn Wake>,
}

impl Notifier {
    /// Create an unbound notifier.
    pub const fn new() -> Self {
        Self { target: None }
    }

    /// Bind the consumer to wake on every committed change.
    ///
    /// A second call is rejected with [`RegisterError::AlreadyBound`]; the
    /// first binding stays in place.
    pub fn bind(&mut self, target: &'static dyn Wake) -> Result<(), RegisterError> {
        if self.target.is_some() {
            #[cfg(feature = "defmt")]
            defmt::error!("notify target already set");
            return Err(RegisterError::AlreadyBound);
        }
        self.target = Some(target);
        Ok(())
    }

    /// `true` if a consumer is bound.
    pub fn is_bound(&self) -> bool {
        self.target.is_some()
    }

    /// Wake the bound consumer, if any.
    pub fn notify(&self) {
        if let Some(target) = self.target {
            target.wake();
        }
    }
}

impl core::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Notifier")
            .field("bound", &self.is_bound())
            .finish()
    }
}

// ── Unit Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use core::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    struct CountingWake(AtomicU32);

    impl Wake for CountingWake {
        fn wake(&self) {
            self.0.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[test]
    fn unbound_notify_is_noop() {
        let notifier = Notifier::new();
        assert!(!notifier.is_bound());
        notifier.notify();
    }

    #[test]
    fn bound_notify_wakes_target() {
        static COUNT: CountingWake = CountingWake(AtomicU32::new(0));
        let mut notifier = Notifier::new();
        notifier.bind(&COUNT).unwrap();
        notifier.notify();
        notifier.notify();
        assert_eq!(COUNT.0.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn second_bind_is_rejected() {
        static FIRST: CountingWake = CountingWake(AtomicU32::new(0));
        static SECOND: CountingWake = CountingWake(AtomicU32::new(0));
        let mut notifier = Notifier::new();
        notifier.bind(&FIRST).unwrap();
        assert_eq!(notifier.bind(&SECOND), Err(RegisterError::AlreadyBound));

        notifier.notify();
        assert_eq!(FIRST.0.load(Ordering::Relaxed), 1);
        assert_eq!(SECOND.0.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn signal_wakes_collapse() {
        static SIGNAL: WakeSignal = WakeSignal::new();
        let mut notifier = Notifier::new();
        notifier.bind(&SIGNAL).unwrap();

        notifier.notify();
        notifier.notify();
        notifier.notify();
        assert!(SIGNAL.signaled());
        assert_eq!(SIGNAL.try_take(), Some(()));
        // Three signals, one wake.
        assert_eq!(SIGNAL.try_take(), None);
    }
}
