//! Circular change log shared by every register kind.
//!
//! Each committed change appends a [`HistoryRecord`] to a fixed-capacity
//! ring. The register keeps a *write cursor*; every consumer keeps its own
//! [`CursorCode`] and drains the ring at its own pace with
//! [`HistoryLog::poll`]. Consumers never modify the log, so any number of
//! them can follow the same register independently.
//!
//! # Cursor layout
//!
//! ```text
//!  31      24 23      16 15                    0
//! ┌──────────┬──────────┬───────────────────────┐
//! │ (unused) │generation│      slot index       │
//! └──────────┴──────────┴───────────────────────┘
//! ```
//!
//! The generation increments each time the write index wraps past the
//! capacity. A record remembers the generation it was written in, which is
//! what lets [`poll`](HistoryLog::poll) tell a live slot from one that has
//! already been overwritten.

use alloc::vec::Vec;

use crate::error::RegisterError;
use crate::pool::{PoolKind, Pools};

/// Width of a register field, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Width {
    /// 8-bit field.
    W8 = 1,
    /// 16-bit field.
    W16 = 2,
    /// 32-bit field.
    W32 = 4,
}

impl Width {
    /// Number of bytes covered by a field of this width.
    pub const fn bytes(self) -> usize {
        self as usize
    }

    /// Bit mask selecting the low `8 * bytes()` bits.
    pub const fn mask(self) -> u32 {
        match self {
            Width::W8 => 0xFF,
            Width::W16 => 0xFFFF,
            Width::W32 => 0xFFFF_FFFF,
        }
    }
}

/// One committed change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HistoryRecord {
    /// New value of the field, zero-extended to 32 bits.
    pub value: u32,
    /// Byte offset (dense registers) or key (sparse registers).
    pub index: u16,
    /// Width of the logged field.
    pub width: Width,
    /// Generation of the write cursor when the record was committed.
    pub generation: u8,
}

impl HistoryRecord {
    /// Pattern every slot holds until it is first written.
    pub const SENTINEL: HistoryRecord = HistoryRecord {
        value: u32::MAX,
        index: u16::MAX,
        width: Width::W32,
        generation: u8::MAX,
    };
}

/// What a consumer sees when it polls a register's history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HistoryEvent {
    /// A single committed change, in commit order.
    Record(HistoryRecord),
    /// The register changed but no per-field records exist (history is
    /// disabled). The consumer must re-read the whole register.
    Reload,
}

/// A consumer's bookmark into a [`HistoryLog`]: slot index plus generation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CursorCode(u32);

impl CursorCode {
    /// Cursor at slot `index` in generation `generation`.
    pub const fn new(index: u16, generation: u8) -> Self {
        Self(index as u32 | (generation as u32) << 16)
    }

    /// Rebuild a cursor from its packed form. Bits above 24 are dropped.
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw & 0x00FF_FFFF)
    }

    /// Packed form, suitable for storing in a register field.
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Slot index.
    pub const fn index(self) -> u16 {
        self.0 as u16
    }

    /// Wraparound generation.
    pub const fn generation(self) -> u8 {
        (self.0 >> 16) as u8
    }

    /// The cursor one slot further on in a ring of `capacity` slots.
    pub const fn next(self, capacity: u16) -> Self {
        let index = self.index() as u32 + 1;
        if index >= capacity as u32 {
            Self::new(0, self.generation().wrapping_add(1))
        } else {
            Self::new(index as u16, self.generation())
        }
    }
}

/// Fixed-capacity circular log of [`HistoryRecord`]s.
///
/// A capacity of 0 disables record storage: the write cursor still moves on
/// every change (its generation increments), so a consumer can tell that
/// *something* changed and re-read the register, but there is nothing to
/// replay.
#[derive(Debug)]
pub struct HistoryLog {
    records: Vec<HistoryRecord>,
    source: Option<PoolKind>,
    capacity: u16,
    write: CursorCode,
    wrapped: bool,
}

impl HistoryLog {
    /// Create an unallocated log. Call [`init`](Self::init) before use.
    pub const fn new(capacity: u16) -> Self {
        Self {
            records: Vec::new(),
            source: None,
            capacity,
            write: CursorCode::new(0, 0),
            wrapped: false,
        }
    }

    /// Allocate the ring and fill it with [`HistoryRecord::SENTINEL`].
    pub fn init(&mut self, pools: &Pools<'_>, prefer_large: bool) -> Result<(), RegisterError> {
        if self.capacity == 0 {
            return Ok(());
        }
        let (records, source) = pools.allocate(
            prefer_large,
            self.capacity as usize,
            HistoryRecord::SENTINEL,
        )?;
        self.records = records;
        self.source = Some(source);
        Ok(())
    }

    /// Free the ring and return its bytes to the pool it was claimed from.
    ///
    /// `pools` must be the pair the log was initialised with. The log is
    /// left unallocated; the write cursor is kept.
    pub fn release(&mut self, pools: &Pools<'_>) {
        if let Some(source) = self.source.take() {
            pools.release(source, core::mem::take(&mut self.records));
        }
    }

    /// Configured number of slots.
    pub fn capacity(&self) -> u16 {
        self.capacity
    }

    /// `true` if records are stored (capacity > 0).
    pub fn is_enabled(&self) -> bool {
        self.capacity > 0
    }

    /// Current write cursor. A consumer that starts from this value sees
    /// only changes committed afterwards.
    pub fn write_cursor(&self) -> CursorCode {
        self.write
    }

    /// Append a record and advance the write cursor.
    pub fn record(&mut self, index: u16, value: u32, width: Width) {
        if let Some(slot) = self.records.get_mut(self.write.index() as usize) {
            *slot = HistoryRecord {
                value,
                index,
                width,
                generation: self.write.generation(),
            };
        }
        self.advance();
    }

    /// Move the write cursor to the next generation without storing a
    /// record. Used for bulk replacement of a register without history.
    pub fn bump_generation(&mut self) {
        self.write = CursorCode::new(self.write.index(), self.write.generation().wrapping_add(1));
    }

    fn advance(&mut self) {
        let next = self.write.next(self.capacity);
        if next.generation() != self.write.generation() {
            self.wrapped = true;
        }
        self.write = next;
    }

    /// Oldest record still present in the ring.
    fn oldest(&self) -> CursorCode {
        if self.wrapped {
            CursorCode::new(self.write.index(), self.write.generation().wrapping_sub(1))
        } else {
            CursorCode::new(0, self.write.generation())
        }
    }

    /// Number of records between `cursor` and the write cursor, or `None`
    /// if `cursor` does not point inside the live window.
    fn pending(&self, cursor: CursorCode) -> Option<u32> {
        let capacity = self.capacity as u32;
        if cursor.index() as u32 >= capacity {
            return None;
        }
        let lap = capacity * 256;
        let position = |c: CursorCode| c.generation() as u32 * capacity + c.index() as u32;
        let behind = (position(self.write) + lap - position(cursor)) % lap;
        let available = if self.wrapped {
            capacity
        } else {
            self.write.index() as u32
        };
        (behind <= available).then_some(behind)
    }

    /// Read the next event after `cursor` and advance it.
    ///
    /// Returns `None` when the consumer is up to date. A cursor that has
    /// been lapped by the writer (or is otherwise outside the ring) is moved
    /// to the oldest record still present and a warning is logged; the
    /// skipped records are lost but the caller never sees an error.
    ///
    /// # Examples
    ///
    /// ```
    /// use spirant_registry::{HistoryEvent, HistoryLog, Pools, Width};
    ///
    /// let mut log = HistoryLog::new(4);
    /// log.init(&Pools::DEFAULT, false).unwrap();
    /// let mut cursor = log.write_cursor();
    ///
    /// log.record(3, 42, Width::W8);
    /// assert!(matches!(
    ///     log.poll(&mut cursor),
    ///     Some(HistoryEvent::Record(r)) if r.index == 3 && r.value == 42
    /// ));
    /// assert_eq!(log.poll(&mut cursor), None);
    /// ```
    pub fn poll(&self, cursor: &mut CursorCode) -> Option<HistoryEvent> {
        if *cursor == self.write {
            return None;
        }
        if self.records.is_empty() {
            // Nothing stored: report the change once, then catch up.
            *cursor = self.write;
            return if self.capacity == 0 {
                Some(HistoryEvent::Reload)
            } else {
                None
            };
        }

        if self.pending(*cursor).is_none() {
            #[cfg(feature = "defmt")]
            defmt::warn!(
                "history cursor lapped: request={:08x} write={:08x}, resyncing",
                cursor.raw(),
                self.write.raw()
            );
            *cursor = self.oldest();
            if *cursor == self.write {
                return None;
            }
        }

        let record = self.records[cursor.index() as usize];
        debug_assert_eq!(record.generation, cursor.generation());
        *cursor = cursor.next(self.capacity);
        Some(HistoryEvent::Record(record))
    }
}

// ── Unit Tests ───────────────────────────────────────────────────────────
