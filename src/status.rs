//! Task-busy bitmask.
//!
//! Each task owns one bit and sets it while it has work in hand. The
//! system is idle when the mask is zero, which is what the power manager
//! watches to drop the clock.

use crate::dense::DenseRegister;
use crate::error::RegisterError;
use crate::history::{HistoryLog, Width};
use crate::notify::Notifier;
use crate::register::Register;
use crate::shared::SharedRegister;

/// Number of task bits available.
pub const MAX_TASKS: u8 = 32;

/// One 32-bit word of "task `n` is working" flags.
#[derive(Debug)]
pub struct TaskStatus {
    reg: DenseRegister,
}

impl TaskStatus {
    /// Declare the status word, keeping `history_count` change records.
    pub const fn new(history_count: u16) -> Self {
        Self {
            reg: DenseRegister::new(4, history_count, Width::W32),
        }
    }

    /// Allocate storage. See [`DenseRegister::init`].
    pub fn init(&mut self, prefer_large: bool) -> Result<(), RegisterError> {
        self.reg.init(prefer_large)
    }

    /// Raw busy mask.
    pub fn mask(&self) -> u32 {
        self.reg.get32(0)
    }

    /// Mark task `bit` as working.
    ///
    /// Returns `true` if this took the system out of idle.
    pub fn set_working(&mut self, bit: u8) -> bool {
        let Some(flag) = task_flag(bit) else {
            return false;
        };
        let before = self.mask();
        self.reg.set32(0, before | flag, false);
        before == 0 && self.mask() != 0
    }

    /// Mark task `bit` as suspended.
    ///
    /// Returns `true` if this left the system idle.
    pub fn set_suspend(&mut self, bit: u8) -> bool {
        let Some(flag) = task_flag(bit) else {
            return false;
        };
        let before = self.mask();
        self.reg.set32(0, before & !flag, false);
        before != 0 && self.mask() == 0
    }

    /// `true` while any task is working.
    pub fn is_working(&self) -> bool {
        self.mask() != 0
    }

    /// `true` while task `bit` is working. Out-of-range bits read as idle.
    pub fn is_task_working(&self, bit: u8) -> bool {
        task_flag(bit).is_some_and(|flag| self.mask() & flag != 0)
    }
}

fn task_flag(bit: u8) -> Option<u32> {
    if bit >= MAX_TASKS {
        #[cfg(feature = "defmt")]
        defmt::error!("task bit {} out of range", bit);
        return None;
    }
    Some(1 << bit)
}

impl Register for TaskStatus {
    fn history(&self) -> &HistoryLog {
        self.reg.history()
    }

    fn notifier(&self) -> &Notifier {
        self.reg.notifier()
    }

    fn notifier_mut(&mut self) -> &mut Notifier {
        self.reg.notifier_mut()
    }

    fn crc32(&self, seed: u32) -> u32 {
        self.reg.crc32(seed)
    }
}

impl SharedRegister<TaskStatus> {
    /// See [`TaskStatus::init`].
    pub fn init(&self, prefer_large: bool) -> Result<(), RegisterError> {
        self.lock(|s| s.init(prefer_large))
    }

    /// See [`TaskStatus::set_working`].
    pub fn set_working(&self, bit: u8) -> bool {
        self.lock(|s| s.set_working(bit))
    }

    /// See [`TaskStatus::set_suspend`].
    pub fn set_suspend(&self, bit: u8) -> bool {
        self.lock(|s| s.set_suspend(bit))
    }

    /// See [`TaskStatus::is_working`].
    pub fn is_working(&self) -> bool {
        self.lock(|s| s.is_working())
    }

    /// See [`TaskStatus::is_task_working`].
    pub fn is_task_working(&self, bit: u8) -> bool {
        self.lock(|s| s.is_task_working(bit))
    }
}

// ── Unit Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::HistoryEvent;

    const TASK_I2C: u8 = 3;
    const TASK_SPI: u8 = 5;

    fn status() -> TaskStatus {
        let mut s = TaskStatus::new(8);
        s.init(false).unwrap();
        s
    }

    #[test]
    fn starts_idle() {
        let s = status();
        assert!(!s.is_working());
        assert_eq!(s.mask(), 0);
    }

    #[test]
    fn idle_transitions_reported_once() {
        let mut s = status();
        assert!(s.set_working(TASK_I2C));
        assert!(!s.set_working(TASK_SPI));
        assert!(!s.set_working(TASK_SPI));
        assert_eq!(s.mask(), (1 << TASK_I2C) | (1 << TASK_SPI));

        assert!(!s.set_suspend(TASK_I2C));
        assert!(s.is_working());
        assert!(s.set_suspend(TASK_SPI));
        assert!(!s.is_working());
        // Already idle.
        assert!(!s.set_suspend(TASK_SPI));
    }

    #[test]
    fn per_task_query() {
        let mut s = status();
        s.set_working(31);
        assert!(s.is_task_working(31));
        assert!(!s.is_task_working(0));
        assert!(!s.is_task_working(32));
    }

    #[test]
    fn out_of_range_bit_rejected() {
        let mut s = status();
        assert!(!s.set_working(32));
        assert!(!s.set_working(u8::MAX));
        assert_eq!(s.mask(), 0);
        assert!(!s.set_suspend(40));
    }

    #[test]
    fn changes_are_logged_as_whole_word() {
        let mut s = status();
        let mut cursor = s.history_code();
        s.set_working(1);
        s.set_working(1);
        s.set_working(2);

        let events = s.drain_history::<8>(&mut cursor);
        assert_eq!(events.len(), 2);
        match events[1] {
            HistoryEvent::Record(r) => {
                assert_eq!(r.index, 0);
                assert_eq!(r.width, Width::W32);
                assert_eq!(r.value, 0b110);
            }
            HistoryEvent::Reload => panic!("unexpected reload"),
        }
    }

    #[test]
    fn shared_status_across_tasks() {
        static STATUS: SharedRegister<TaskStatus> = SharedRegister::new(TaskStatus::new(0));
        STATUS.init(false).unwrap();
        assert!(STATUS.set_working(0));
        assert!(STATUS.is_task_working(0));
        assert!(STATUS.set_suspend(0));
        assert!(!STATUS.is_working());
    }
}
