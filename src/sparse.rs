//! Ordered key → value register that never stores its default value.
//!
//! Used where most indices are "unset": per-note MIDI mappings, the set of
//! in-flight command identifiers, sparse per-slot overrides. A key whose
//! value equals the register's default is simply absent from the map, so
//! reading it returns the default and writing the default erases it.

use alloc::collections::BTreeMap;

use crate::crc::Checksum;
use crate::error::RegisterError;
use crate::history::{HistoryLog, Width};
use crate::notify::Notifier;
use crate::pool::Pools;
use crate::register::{Register, State};

/// A value type a [`SparseRegister`] can hold.
///
/// `WIDTH` and [`history_value`](Self::history_value) decide what ends up
/// in the history record for a change. Values wider than 32 bits (small
/// structs) keep the defaults: the record then only names the key, and the
/// consumer reads the new value with [`SparseRegister::get`].
pub trait SparseValue: Copy + PartialEq + Checksum {
    /// Width reported in history records.
    const WIDTH: Width = Width::W8;

    /// Value stored in history records.
    fn history_value(&self) -> u32 {
        0
    }
}

macro_rules! impl_sparse_value {
    ($($ty:ty => $width:expr),* $(,)?) => {
        $(
            impl SparseValue for $ty {
                const WIDTH: Width = $width;

                fn history_value(&self) -> u32 {
                    (*self as u32) & Self::WIDTH.mask()
                }
            }
        )*
    };
}

impl_sparse_value!(
    u8 => Width::W8,
    u16 => Width::W16,
    u32 => Width::W32,
    i8 => Width::W8,
    i16 => Width::W16,
    i32 => Width::W32,
    bool => Width::W8,
);

/// Sparse register of bytes.
pub type SparseRegister8 = SparseRegister<u8>;
/// Sparse register of 16-bit values.
pub type SparseRegister16 = SparseRegister<u16>;
/// Sparse register of 32-bit values.
pub type SparseRegister32 = SparseRegister<u32>;

/// Ordered `u16 → T` register with default elision.
///
/// # Examples
///
/// ```
/// use spirant_registry::SparseRegister8;
///
/// let mut reg = SparseRegister8::new(8, 0);
/// reg.init(false).unwrap();
///
/// assert!(!reg.set(60, 0, false)); // default on an absent key: no-op
/// assert!(reg.set(60, 100, false));
/// assert_eq!(reg.get(60), 100);
/// assert!(reg.set(60, 0, false)); // back to default: entry erased
/// assert!(reg.is_empty());
/// ```
#[derive(Debug)]
pub struct SparseRegister<T> {
    data: BTreeMap<u16, T>,
    default_value: T,
    state: State,
    history: HistoryLog,
    notifier: Notifier,
}

impl<T: SparseValue> SparseRegister<T> {
    /// Declare a register keeping `history_count` records, whose absent
    /// keys read as `default_value`.
    pub const fn new(history_count: u16, default_value: T) -> Self {
        Self {
            data: BTreeMap::new(),
            default_value,
            state: State::Uninit,
            history: HistoryLog::new(history_count),
            notifier: Notifier::new(),
        }
    }

    /// Allocate the history ring from the default pools.
    pub fn init(&mut self, prefer_large: bool) -> Result<(), RegisterError> {
        self.init_with(&Pools::DEFAULT, prefer_large)
    }

    /// Allocate the history ring. On failure the register becomes inert.
    pub fn init_with(&mut self, pools: &Pools<'_>, prefer_large: bool) -> Result<(), RegisterError> {
        if self.state != State::Uninit {
            #[cfg(feature = "defmt")]
            defmt::error!("SparseRegister::init: already initialized");
            return Err(RegisterError::AlreadyInitialized);
        }
        let result = self.history.init(pools, prefer_large);
        self.state = if result.is_ok() { State::Ready } else { State::Inert };
        result
    }

    /// `true` once [`init`](Self::init) has succeeded.
    pub fn is_ready(&self) -> bool {
        self.state == State::Ready
    }

    /// The value absent keys read as.
    pub fn default_value(&self) -> T {
        self.default_value
    }

    /// Set `key` to `value`.
    ///
    /// | stored        | `value`         | effect                     |
    /// |---------------|-----------------|----------------------------|
    /// | absent        | default         | none                       |
    /// | absent        | non-default     | insert, log, notify        |
    /// | equal         | —               | none (unless `force`)      |
    /// | different     | default         | erase, log, notify         |
    /// | different     | non-default     | update, log, notify        |
    ///
    /// Returns `true` if a change was committed.
    pub fn set(&mut self, key: u16, value: T, force: bool) -> bool {
        if self.state.check().is_err() {
            return false;
        }

        let changed = match self.data.get(&key).copied() {
            Some(stored) if stored == value => false,
            None if value == self.default_value => false,
            Some(_) if value == self.default_value => {
                self.data.remove(&key);
                true
            }
            _ => {
                self.data.insert(key, value);
                true
            }
        };

        if !changed && !force {
            return false;
        }
        self.history.record(key, value.history_value(), T::WIDTH);
        self.notifier.notify();
        true
    }

    /// Value stored at `key`, or the default if absent (or not initialised).
    pub fn get(&self, key: u16) -> T {
        self.data.get(&key).copied().unwrap_or(self.default_value)
    }

    /// `true` if `key` holds a non-default value.
    pub fn contains_key(&self, key: u16) -> bool {
        self.data.contains_key(&key)
    }

    /// Number of keys holding a non-default value.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// `true` if every key reads as the default.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Non-default entries in ascending key order.
    ///
    /// This is what the storage task persists; restoring goes through
    /// [`set`](Self::set).
    pub fn iter(&self) -> impl Iterator<Item = (u16, T)> + '_ {
        self.data.iter().map(|(&k, &v)| (k, v))
    }

    /// Reset every key to the default, logging one record per erased key.
    pub fn clear(&mut self) {
        if self.state.check().is_err() {
            return;
        }
        let data = core::mem::take(&mut self.data);
        if data.is_empty() {
            return;
        }
        for &key in data.keys() {
            self.history
                .record(key, self.default_value.history_value(), T::WIDTH);
        }
        self.notifier.notify();
    }

    /// Replace the whole map with a copy of `src`'s.
    ///
    /// As with [`DenseRegister::assign`](crate::DenseRegister::assign), no
    /// per-key records are synthesized; with history disabled the write
    /// cursor's generation is bumped instead.
    pub fn assign(&mut self, src: &SparseRegister<T>) -> Result<(), RegisterError> {
        self.state.check()?;
        self.data = src.data.clone();
        if !self.history.is_enabled() {
            self.history.bump_generation();
        }
        self.notifier.notify();
        Ok(())
    }
}

impl<T: SparseValue> Register for SparseRegister<T> {
    fn history(&self) -> &HistoryLog {
        &self.history
    }

    fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    fn notifier_mut(&mut self) -> &mut Notifier {
        &mut self.notifier
    }

    /// Folds every `(key, value)` pair in ascending key order: the key's
    /// little-endian bytes, then the value's checksum.
    fn crc32(&self, seed: u32) -> u32 {
        self.data
            .iter()
            .fold(seed, |crc, (key, value)| value.checksum(key.checksum(crc)))
    }
}

/// Structural equality of the stored entries.
impl<T: PartialEq> PartialEq for SparseRegister<T> {
    fn eq(&self, other: &Self) -> bool {
        self.data == other.data
    }
}

// ── Unit Tests ───────────────────────────────────────────────────────────
