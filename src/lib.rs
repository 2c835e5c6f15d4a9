//! Observable shared registers with an ordered change history.
//!
//! A *register* is a unit of mutable state that several firmware tasks share:
//! user settings, song data, menu cursor, MIDI mapping tables, task-busy
//! flags. Writers call a setter; readers either read the current value or
//! drain the register's [`HistoryLog`] with a private [`CursorCode`] to see
//! every committed change exactly once, oldest first.
//!
//! # Architecture
//!
//! ```text
//!  writer task                      register                     consumer task(s)
//!  ───────────                      ────────                     ────────────────
//!  set8/16/32, set ──► compare ──► HistoryLog ◄── poll_history(&mut cursor)
//!                          │            (ring of HistoryRecord)
//!                          └──► Notifier ──► Wake (collapsing) ──► wake & drain
//! ```
//!
//! - [`DenseRegister`] — fixed-size byte buffer with checked 8/16/32-bit
//!   little-endian views and a declared native granularity. Narrow writes are
//!   *promoted* so the history always carries complete native fields.
//! - [`SparseRegister`] — ordered `u16 → T` map whose default value is never
//!   stored (*default elision*).
//! - [`SharedRegister`] — either kind behind an embassy-sync blocking mutex,
//!   for registers written from more than one task.
//! - [`TaskStatus`] and [`FileCommand`] — thin per-field accessors built on
//!   the index-based API.
//!
//! Unchanged writes are silent: no record, no wake. A `force` flag commits
//! (and wakes) regardless.
//!
//! # Quick Start
//!
//! ```
//! use spirant_registry::{DenseRegister, HistoryEvent, Register, Width};
//!
//! let mut reg = DenseRegister::new(16, 8, Width::W8);
//! reg.init(false).unwrap();
//!
//! let mut cursor = reg.history_code();
//! assert!(reg.set8(0, 5, false));
//! assert!(!reg.set8(0, 5, false)); // unchanged, nothing logged
//!
//! match reg.poll_history(&mut cursor) {
//!     Some(HistoryEvent::Record(rec)) => assert_eq!((rec.index, rec.value), (0, 5)),
//!     other => panic!("unexpected {:?}", other),
//! }
//! assert!(reg.poll_history(&mut cursor).is_none());
//! ```
//!
//! # Crate Features
//!
//! - **`defmt`** — structured logging via [`defmt`] and `defmt::Format` on
//!   the public types.
//! - **`task`** — async polling helpers built on `embassy-time`.

#![no_std]

extern crate alloc;

pub mod crc;
pub mod dense;
pub mod error;
pub mod file_command;
pub mod history;
pub mod notify;
pub mod pool;
pub mod register;
pub mod shared;
pub mod sparse;
pub mod status;
#[cfg(feature = "task")]
pub mod task;

// ── Re-exports for convenience ───────────────────────────────────────────

pub use crc::{crc32, Checksum};
pub use dense::DenseRegister;
pub use error::RegisterError;
pub use file_command::{FileCommand, FileCommandKind, FileRequest};
pub use history::{CursorCode, HistoryEvent, HistoryLog, HistoryRecord, Width};
pub use notify::{Notifier, Wake, WakeSignal};
pub use pool::{BudgetPool, GlobalHeap, MemoryPool, Pools};
pub use register::Register;
pub use shared::{SharedRegister, WorkingCommandSet};
pub use sparse::{SparseRegister, SparseRegister16, SparseRegister32, SparseRegister8, SparseValue};
pub use status::TaskStatus;
#[cfg(feature = "task")]
pub use task::{follow_history, wait_for_wake, wait_until, PollConfig};
