//! Memory pools used by register initialisation.
//!
//! Registers allocate their storage exactly once, in `init()`. The target
//! has two heaps of very different character: a large external pool
//! (PSRAM) and a small internal one (DMA-capable SRAM). A register states
//! which it prefers; when that pool cannot satisfy the request the other
//! one is tried, and when both fail the register is left inert instead of
//! halting the device.
//!
//! The allocation itself always goes through the global allocator with
//! [`Vec::try_reserve_exact`], so an exhausted heap is reported instead of
//! aborting. A [`MemoryPool`] only decides whether the bytes may be taken
//! from the region it represents.

use alloc::vec::Vec;
use core::cell::Cell;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;

use crate::error::RegisterError;

/// A region that register storage can be claimed from.
pub trait MemoryPool: Sync {
    /// Reserve `bytes` from this pool. Returns `false` if the pool cannot
    /// provide them.
    fn claim(&self, bytes: usize) -> bool;

    /// Give back `bytes` previously obtained with [`claim`](Self::claim).
    fn release(&self, bytes: usize);
}

/// Pool backed directly by the global allocator, without accounting.
#[derive(Debug, Clone, Copy, Default)]
pub struct GlobalHeap;

impl MemoryPool for GlobalHeap {
    fn claim(&self, _bytes: usize) -> bool {
        true
    }

    fn release(&self, _bytes: usize) {}
}

/// Pool with a fixed byte budget.
///
/// Models a bounded region such as PSRAM or the DMA-capable SRAM: claims
/// succeed until the budget is spent. Registers are boot-time objects that
/// live for the whole program, so released bytes are only returned when a
/// claim has to be rolled back.
pub struct BudgetPool {
    remaining: Mutex<CriticalSectionRawMutex, Cell<usize>>,
}

impl BudgetPool {
    /// Create a pool holding `bytes` bytes.
    pub const fn new(bytes: usize) -> Self {
        Self {
            remaining: Mutex::new(Cell::new(bytes)),
        }
    }

    /// Bytes still available.
    pub fn remaining(&self) -> usize {
        self.remaining.lock(|r| r.get())
    }
}

impl MemoryPool for BudgetPool {
    fn claim(&self, bytes: usize) -> bool {
        self.remaining.lock(|r| {
            let left = r.get();
            if bytes > left {
                return false;
            }
            r.set(left - bytes);
            true
        })
    }

    fn release(&self, bytes: usize) {
        self.remaining.lock(|r| r.set(r.get().saturating_add(bytes)));
    }
}

/// The pair of pools a register may allocate from.
#[derive(Clone, Copy)]
pub struct Pools<'a> {
    /// Large, slower pool (external PSRAM on the target).
    pub large: &'a dyn MemoryPool,
    /// Small internal pool (DMA-capable SRAM on the target).
    pub internal: &'a dyn MemoryPool,
}

impl Pools<'static> {
    /// Both pools backed by the global allocator.
    pub const DEFAULT: Pools<'static> = Pools {
        large: &GlobalHeap,
        internal: &GlobalHeap,
    };
}

impl Default for Pools<'static> {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Which of the two pools granted an allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PoolKind {
    Large,
    Internal,
}

impl<'a> Pools<'a> {
    fn pool(&self, kind: PoolKind) -> &'a dyn MemoryPool {
        match kind {
            PoolKind::Large => self.large,
            PoolKind::Internal => self.internal,
        }
    }

    /// Allocate `len` copies of `fill`, trying the preferred pool first and
    /// falling back to the other one.
    ///
    /// Returns the storage together with the pool it was claimed from, or
    /// [`RegisterError::AllocationFailed`] if neither pool can provide it.
    pub(crate) fn allocate<T: Clone>(
        &self,
        prefer_large: bool,
        len: usize,
        fill: T,
    ) -> Result<(Vec<T>, PoolKind), RegisterError> {
        let order = if prefer_large {
            [PoolKind::Large, PoolKind::Internal]
        } else {
            [PoolKind::Internal, PoolKind::Large]
        };
        let bytes = len.saturating_mul(core::mem::size_of::<T>());

        for (attempt, kind) in order.into_iter().enumerate() {
            if let Some(storage) = try_allocate(self.pool(kind), bytes, len, &fill) {
                if attempt > 0 {
                    #[cfg(feature = "defmt")]
                    defmt::warn!("allocated {} bytes from fallback pool", bytes);
                }
                return Ok((storage, kind));
            }
        }

        #[cfg(feature = "defmt")]
        defmt::error!("allocation of {} bytes failed in every pool", bytes);
        Err(RegisterError::AllocationFailed)
    }

    /// Free `storage` and return its bytes to the pool that granted it.
    pub(crate) fn release<T>(&self, kind: PoolKind, storage: Vec<T>) {
        let bytes = storage.len().saturating_mul(core::mem::size_of::<T>());
        drop(storage);
        self.pool(kind).release(bytes);
    }
}

fn try_allocate<T: Clone>(
    pool: &dyn MemoryPool,
    bytes: usize,
    len: usize,
    fill: &T,
) -> Option<Vec<T>> {
    if !pool.claim(bytes) {
        return None;
    }
    let mut storage = Vec::new();
    if storage.try_reserve_exact(len).is_err() {
        pool.release(bytes);
        return None;
    }
    storage.resize(len, fill.clone());
    Some(storage)
}

// ── Unit Tests ───────────────────────────────────────────────────────────
