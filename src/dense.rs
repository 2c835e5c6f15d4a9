//! Fixed-size byte register with 8/16/32-bit field views.
//!
//! A [`DenseRegister`] owns one contiguous byte buffer. Fields are read and
//! written through bounds- and alignment-checked little-endian accessors;
//! nothing hands out the raw buffer, bulk access goes through
//! [`read_block`](DenseRegister::read_block) /
//! [`write_block`](DenseRegister::write_block) copies.
//!
//! # Native granularity
//!
//! Each register declares the width its fields are made of. The history
//! always logs complete native fields, whatever width the write used:
//!
//! ```text
//!  native W32, set8(1, 0x7F)         native W8, set16(2, 0xBBAA)
//!  ┌────┬────┬────┬────┐             ┌────┬────┬────┬────┐
//!  │ 00 │ 7F │ 00 │ 00 │             │ .. │ .. │ AA │ BB │
//!  └────┴────┴────┴────┘             └────┴────┴────┴────┘
//!  logged: (0, 0x00007F00, W32)      logged: (2, 0xAA, W8), (3, 0xBB, W8)
//!          promotion                         split
//! ```

use alloc::vec::Vec;

use crate::crc::crc32;
use crate::error::RegisterError;
use crate::history::{HistoryLog, Width};
use crate::notify::Notifier;
use crate::pool::Pools;
use crate::register::{Register, State};

/// Fixed-size register addressed by byte offset.
///
/// Construct once at boot with [`new`](Self::new), then call
/// [`init`](Self::init). All accessors are safe no-ops on a register whose
/// initialisation failed.
#[derive(Debug)]
pub struct DenseRegister {
    data: Vec<u8>,
    size: u16,
    granularity: Width,
    state: State,
    history: HistoryLog,
    notifier: Notifier,
}

impl DenseRegister {
    /// Declare a register of `size` bytes whose history keeps
    /// `history_count` records of native width `granularity`.
    pub const fn new(size: u16, history_count: u16, granularity: Width) -> Self {
        Self {
            data: Vec::new(),
            size,
            granularity,
            state: State::Uninit,
            history: HistoryLog::new(history_count),
            notifier: Notifier::new(),
        }
    }

    /// Allocate storage from the default pools. See [`init_with`](Self::init_with).
    pub fn init(&mut self, prefer_large: bool) -> Result<(), RegisterError> {
        self.init_with(&Pools::DEFAULT, prefer_large)
    }

    /// Allocate the zero-filled buffer and the history ring.
    ///
    /// On failure the register becomes inert: setters return `false`,
    /// getters return `0`.
    pub fn init_with(&mut self, pools: &Pools<'_>, prefer_large: bool) -> Result<(), RegisterError> {
        if self.state != State::Uninit {
            #[cfg(feature = "defmt")]
            defmt::error!("DenseRegister::init: already initialized");
            return Err(RegisterError::AlreadyInitialized);
        }
        let result = self.allocate(pools, prefer_large);
        self.state = if result.is_ok() { State::Ready } else { State::Inert };
        result
    }

    fn allocate(&mut self, pools: &Pools<'_>, prefer_large: bool) -> Result<(), RegisterError> {
        if self.size as usize % self.granularity.bytes() != 0 {
            #[cfg(feature = "defmt")]
            defmt::error!(
                "DenseRegister: size {} is not a multiple of {}",
                self.size,
                self.granularity
            );
            return Err(RegisterError::InvalidShape);
        }
        self.history.init(pools, prefer_large)?;
        match pools.allocate(prefer_large, self.size as usize, 0u8) {
            Ok((data, _)) => self.data = data,
            Err(e) => {
                // An inert register holds no storage.
                self.history.release(pools);
                return Err(e);
            }
        }

        #[cfg(feature = "defmt")]
        defmt::debug!(
            "DenseRegister: {} bytes, {} history slots",
            self.size,
            self.history.capacity()
        );
        Ok(())
    }

    /// Size in bytes.
    pub fn size(&self) -> u16 {
        self.size
    }

    /// Declared native field width.
    pub fn granularity(&self) -> Width {
        self.granularity
    }

    /// `true` once [`init`](Self::init) has succeeded.
    pub fn is_ready(&self) -> bool {
        self.state == State::Ready
    }

    // ── Field access ─────────────────────────────────────────────────

    /// Set the byte at `index`.
    ///
    /// Returns `true` if a change was committed (logged and notified):
    /// when the value differs, or when `force` is set.
    pub fn set8(&mut self, index: u16, value: u8, force: bool) -> bool {
        self.store(index, Width::W8, value as u32, force)
    }

    /// Set the 16-bit field at `index` (must be 2-byte aligned).
    pub fn set16(&mut self, index: u16, value: u16, force: bool) -> bool {
        self.store(index, Width::W16, value as u32, force)
    }

    /// Set the 32-bit field at `index` (must be 4-byte aligned).
    pub fn set32(&mut self, index: u16, value: u32, force: bool) -> bool {
        self.store(index, Width::W32, value, force)
    }

    /// Read the byte at `index`. Returns `0` on an invalid access.
    pub fn get8(&self, index: u16) -> u8 {
        self.load(index, Width::W8) as u8
    }

    /// Read the 16-bit field at `index`. Returns `0` on an invalid access.
    pub fn get16(&self, index: u16) -> u16 {
        self.load(index, Width::W16) as u16
    }

    /// Read the 32-bit field at `index`. Returns `0` on an invalid access.
    pub fn get32(&self, index: u16) -> u32 {
        self.load(index, Width::W32)
    }

    fn store(&mut self, index: u16, width: Width, value: u32, force: bool) -> bool {
        let offset = match self.checked_offset(index, width) {
            Ok(offset) => offset,
            Err(_) => return false,
        };

        if read_le(&self.data, offset, width) == value && !force {
            return false;
        }
        write_le(&mut self.data, offset, width, value);
        self.log_write(offset, width);
        self.notifier.notify();
        true
    }

    fn load(&self, index: u16, width: Width) -> u32 {
        match self.checked_offset(index, width) {
            Ok(offset) => read_le(&self.data, offset, width),
            Err(_) => 0,
        }
    }

    /// Log a write of `width` bytes at `offset` as native-width records.
    fn log_write(&mut self, offset: usize, width: Width) {
        let native = self.granularity.bytes();
        // Promotion: the native element containing the write. Split: every
        // native element the write covers.
        let start = offset - offset % native;
        let end = offset + width.bytes();
        for base in (start..end).step_by(native) {
            let value = read_le(&self.data, base, self.granularity);
            self.history.record(base as u16, value, self.granularity);
        }
    }

    /// Validate an access and return its byte offset.
    fn checked_offset(&self, index: u16, width: Width) -> Result<usize, RegisterError> {
        self.state.check()?;
        let offset = index as usize;
        if offset + width.bytes() > self.data.len() {
            #[cfg(feature = "defmt")]
            defmt::error!("{} access: index out of range : {}", width, index);
            return Err(RegisterError::OutOfBounds);
        }
        if offset % width.bytes() != 0 {
            #[cfg(feature = "defmt")]
            defmt::error!("{} access: alignment error : {}", width, index);
            return Err(RegisterError::Misaligned);
        }
        Ok(offset)
    }

    // ── Bulk access ──────────────────────────────────────────────────

    /// Copy `out.len()` bytes starting at `offset` into `out`.
    ///
    /// Used by the storage task to persist the register as an opaque block.
    pub fn read_block(&self, offset: u16, out: &mut [u8]) -> Result<(), RegisterError> {
        let range = self.block_range(offset, out.len())?;
        out.copy_from_slice(&self.data[range]);
        Ok(())
    }

    /// Overwrite bytes starting at `offset` with `bytes`.
    ///
    /// Like [`assign`](Self::assign), a block write produces no per-field
    /// history records; consumers following the history must re-read the
    /// register. Notifies only if the contents actually changed.
    pub fn write_block(&mut self, offset: u16, bytes: &[u8]) -> Result<(), RegisterError> {
        let range = self.block_range(offset, bytes.len())?;
        if self.data[range.clone()] == *bytes {
            return Ok(());
        }
        self.data[range].copy_from_slice(bytes);
        self.bulk_changed();
        Ok(())
    }

    fn block_range(&self, offset: u16, len: usize) -> Result<core::ops::Range<usize>, RegisterError> {
        self.state.check()?;
        let start = offset as usize;
        let end = start + len;
        if end > self.data.len() {
            #[cfg(feature = "defmt")]
            defmt::error!("block access out of range : {}..{}", start, end);
            return Err(RegisterError::OutOfBounds);
        }
        Ok(start..end)
    }

    /// Replace the whole contents with a copy of `src`.
    ///
    /// Used for slot copy/paste, backup-before-edit and undo. No per-field
    /// records are synthesized: with history disabled the write cursor's
    /// generation is bumped so pollers see a [`Reload`](crate::HistoryEvent::Reload);
    /// with history enabled consumers must re-read the full register after
    /// an assign.
    pub fn assign(&mut self, src: &DenseRegister) -> Result<(), RegisterError> {
        self.state.check()?;
        src.state.check()?;
        if self.size != src.size {
            #[cfg(feature = "defmt")]
            defmt::error!("assign: size mismatch {} != {}", self.size, src.size);
            return Err(RegisterError::ShapeMismatch);
        }
        self.data.copy_from_slice(&src.data);
        self.bulk_changed();
        Ok(())
    }

    fn bulk_changed(&mut self) {
        if !self.history.is_enabled() {
            self.history.bump_generation();
        }
        self.notifier.notify();
    }
}

impl Register for DenseRegister {
    fn history(&self) -> &HistoryLog {
        &self.history
    }

    fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    fn notifier_mut(&mut self) -> &mut Notifier {
        &mut self.notifier
    }

    /// CRC-32 over the whole buffer.
    fn crc32(&self, seed: u32) -> u32 {
        crc32(&self.data, seed)
    }
}

/// Byte-wise equality of the live buffers.
impl PartialEq for DenseRegister {
    fn eq(&self, other: &Self) -> bool {
        self.data == other.data
    }
}

impl Eq for DenseRegister {}

fn read_le(data: &[u8], offset: usize, width: Width) -> u32 {
    data[offset..offset + width.bytes()]
        .iter()
        .rev()
        .fold(0u32, |acc, &b| (acc << 8) | b as u32)
}

fn write_le(data: &mut [u8], offset: usize, width: Width, value: u32) {
    let bytes = value.to_le_bytes();
    data[offset..offset + width.bytes()].copy_from_slice(&bytes[..width.bytes()]);
}

// ── Unit Tests ───────────────────────────────────────────────────────────
