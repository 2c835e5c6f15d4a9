//! Registers shared between tasks behind a blocking mutex.
//!
//! A plain [`DenseRegister`] or [`SparseRegister`] takes `&mut self` to
//! write, so the borrow checker already guarantees a single writer while
//! the register is owned by one task. Registers that several tasks write
//! (e.g. the set of in-flight commands, touched by the input task and by
//! the playback engine) live in a [`SharedRegister`]: every access runs
//! inside a short critical section, so concurrent writers serialise instead
//! of racing.
//!
//! ```text
//! static WORKING: WorkingCommandSet = WorkingCommandSet::new(SparseRegister::new(0, false));
//!
//!  input task ──► WORKING.insert(cmd) ──┐
//!                                       ├── critical section ──► SparseRegister<bool>
//!  playback   ──► WORKING.remove(cmd) ──┘
//! ```

use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;

use crate::dense::DenseRegister;
use crate::error::RegisterError;
use crate::history::{CursorCode, HistoryEvent};
use crate::notify::Wake;
use crate::register::Register;
use crate::sparse::{SparseRegister, SparseValue};

/// A register that may be accessed from several tasks.
///
/// Closures passed to [`lock`](Self::lock) must not lock the same register
/// again.
pub struct SharedRegister<R> {
    inner: Mutex<CriticalSectionRawMutex, RefCell<R>>,
}

/// The set of commands currently being executed, keyed by command id.
///
/// Written by the input task when a command starts and by the playback
/// engine when it ends; read by the UI to highlight active buttons.
pub type WorkingCommandSet = SharedRegister<SparseRegister<bool>>;

impl<R> SharedRegister<R> {
    /// Wrap `register`. Usable in a `static` initialiser.
    pub const fn new(register: R) -> Self {
        Self {
            inner: Mutex::new(RefCell::new(register)),
        }
    }

    /// Run `f` with exclusive access to the register.
    pub fn lock<U>(&self, f: impl FnOnce(&mut R) -> U) -> U {
        self.inner.lock(|cell| f(&mut *cell.borrow_mut()))
    }
}

impl<R: Register> SharedRegister<R> {
    /// See [`Register::history_code`].
    pub fn history_code(&self) -> CursorCode {
        self.lock(|r| r.history_code())
    }

    /// See [`Register::poll_history`].
    pub fn poll_history(&self, cursor: &mut CursorCode) -> Option<HistoryEvent> {
        self.lock(|r| r.poll_history(cursor))
    }

    /// See [`Register::changed_since`].
    pub fn changed_since(&self, cursor: CursorCode) -> bool {
        self.lock(|r| r.changed_since(cursor))
    }

    /// See [`Register::drain_history`]. The whole batch is read under one
    /// lock.
    pub fn drain_history<const N: usize>(
        &self,
        cursor: &mut CursorCode,
    ) -> heapless::Vec<HistoryEvent, N> {
        self.lock(|r| r.drain_history(cursor))
    }

    /// See [`Register::crc32`].
    pub fn crc32(&self, seed: u32) -> u32 {
        self.lock(|r| r.crc32(seed))
    }

    /// See [`Register::set_notify`].
    pub fn set_notify(&self, target: &'static dyn Wake) -> Result<(), RegisterError> {
        self.lock(|r| r.set_notify(target))
    }
}

// ── Dense ────────────────────────────────────────────────────────────────

impl SharedRegister<DenseRegister> {
    /// See [`DenseRegister::init`].
    pub fn init(&self, prefer_large: bool) -> Result<(), RegisterError> {
        self.lock(|r| r.init(prefer_large))
    }

    /// See [`DenseRegister::set8`].
    pub fn set8(&self, index: u16, value: u8, force: bool) -> bool {
        self.lock(|r| r.set8(index, value, force))
    }

    /// See [`DenseRegister::set16`].
    pub fn set16(&self, index: u16, value: u16, force: bool) -> bool {
        self.lock(|r| r.set16(index, value, force))
    }

    /// See [`DenseRegister::set32`].
    pub fn set32(&self, index: u16, value: u32, force: bool) -> bool {
        self.lock(|r| r.set32(index, value, force))
    }

    /// See [`DenseRegister::get8`].
    pub fn get8(&self, index: u16) -> u8 {
        self.lock(|r| r.get8(index))
    }

    /// See [`DenseRegister::get16`].
    pub fn get16(&self, index: u16) -> u16 {
        self.lock(|r| r.get16(index))
    }

    /// See [`DenseRegister::get32`].
    pub fn get32(&self, index: u16) -> u32 {
        self.lock(|r| r.get32(index))
    }

    /// Copy `src` into the shared register. See [`DenseRegister::assign`].
    pub fn assign(&self, src: &DenseRegister) -> Result<(), RegisterError> {
        self.lock(|r| r.assign(src))
    }

    /// Copy the shared register into `dst`, e.g. to take a backup before
    /// an edit.
    pub fn snapshot_into(&self, dst: &mut DenseRegister) -> Result<(), RegisterError> {
        self.lock(|r| dst.assign(r))
    }
}

// ── Sparse ───────────────────────────────────────────────────────────────

impl<T: SparseValue> SharedRegister<SparseRegister<T>> {
    /// See [`SparseRegister::init`].
    pub fn init(&self, prefer_large: bool) -> Result<(), RegisterError> {
        self.lock(|r| r.init(prefer_large))
    }

    /// See [`SparseRegister::set`].
    pub fn set(&self, key: u16, value: T, force: bool) -> bool {
        self.lock(|r| r.set(key, value, force))
    }

    /// See [`SparseRegister::get`].
    pub fn get(&self, key: u16) -> T {
        self.lock(|r| r.get(key))
    }

    /// Number of keys holding a non-default value.
    pub fn len(&self) -> usize {
        self.lock(|r| r.len())
    }

    /// `true` if every key reads as the default.
    pub fn is_empty(&self) -> bool {
        self.lock(|r| r.is_empty())
    }

    /// See [`SparseRegister::clear`].
    pub fn clear(&self) {
        self.lock(|r| r.clear())
    }
}

impl WorkingCommandSet {
    /// Mark `command` as working. Returns `true` if it was not already.
    pub fn insert(&self, command: u16) -> bool {
        self.set(command, true, false)
    }

    /// Mark `command` as finished. Returns `true` if it was working.
    pub fn remove(&self, command: u16) -> bool {
        self.set(command, false, false)
    }

    /// `true` while `command` is working.
    pub fn contains(&self, command: u16) -> bool {
        self.get(command)
    }
}

// ── Unit Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    extern crate std;

    use std::thread;

    use super::*;
    use crate::history::Width;
    use crate::notify::WakeSignal;

    #[test]
    fn dense_forwarding() {
        let shared = SharedRegister::new(DenseRegister::new(8, 4, Width::W16));
        shared.init(false).unwrap();

        let mut cursor = shared.history_code();
        assert!(shared.set16(2, 0x1234, false));
        assert!(!shared.set16(2, 0x1234, false));
        assert!(shared.set8(4, 7, false));
        assert_eq!(shared.get16(2), 0x1234);
        assert_eq!(shared.get8(4), 7);
        assert_eq!(shared.get32(0), 0x1234_0000);

        let events = shared.drain_history::<4>(&mut cursor);
        assert_eq!(events.len(), 2);
        assert!(!shared.changed_since(cursor));
    }

    #[test]
    fn dense_snapshot_and_restore() {
        let shared = SharedRegister::new(DenseRegister::new(4, 0, Width::W8));
        shared.init(false).unwrap();
        shared.set32(0, 0xAABB_CCDD, false);

        let mut backup = DenseRegister::new(4, 0, Width::W8);
        backup.init(false).unwrap();
        shared.snapshot_into(&mut backup).unwrap();
        assert_eq!(backup.get32(0), 0xAABB_CCDD);
        assert_eq!(backup.crc32(0), shared.crc32(0));

        shared.set32(0, 0, false);
        shared.assign(&backup).unwrap();
        assert_eq!(shared.get32(0), 0xAABB_CCDD);
    }

    #[test]
    fn sparse_forwarding() {
        let shared = SharedRegister::new(SparseRegister::new(4, 0u8));
        shared.init(true).unwrap();
        assert!(shared.set(10, 3, false));
        assert_eq!(shared.get(10), 3);
        assert_eq!(shared.len(), 1);
        shared.clear();
        assert!(shared.is_empty());
    }

    #[test]
    fn working_command_set_semantics() {
        static WAKE: WakeSignal = WakeSignal::new();
        static WORKING: WorkingCommandSet = WorkingCommandSet::new(SparseRegister::new(8, false));
        WORKING.init(false).unwrap();
        WORKING.set_notify(&WAKE).unwrap();
        assert_eq!(WORKING.set_notify(&WAKE), Err(RegisterError::AlreadyBound));

        let mut cursor = WORKING.history_code();
        assert!(WORKING.insert(0x0203));
        assert!(!WORKING.insert(0x0203));
        assert!(WORKING.contains(0x0203));
        assert!(WAKE.signaled());

        assert!(WORKING.remove(0x0203));
        assert!(!WORKING.remove(0x0203));
        assert!(!WORKING.contains(0x0203));

        match WORKING.poll_history(&mut cursor) {
            Some(HistoryEvent::Record(r)) => assert_eq!((r.index, r.value), (0x0203, 1)),
            other => panic!("unexpected {:?}", other),
        }
        match WORKING.poll_history(&mut cursor) {
            Some(HistoryEvent::Record(r)) => assert_eq!((r.index, r.value), (0x0203, 0)),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(WORKING.poll_history(&mut cursor), None);
    }

    #[test]
    fn concurrent_writers_serialise() {
        static WORKING: WorkingCommandSet = WorkingCommandSet::new(SparseRegister::new(0, false));
        WORKING.init(false).unwrap();

        let handles: [thread::JoinHandle<()>; 4] = core::array::from_fn(|t| {
            thread::spawn(move || {
                for i in 0..100u16 {
                    WORKING.insert(t as u16 * 1000 + i);
                }
            })
        });
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(WORKING.len(), 400);
        assert!(WORKING.contains(3099));
    }
}
