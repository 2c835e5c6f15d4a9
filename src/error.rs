//! Error types for register operations.

use core::fmt;

/// Errors that can occur when initialising or accessing a register.
///
/// Setters (`set8`, `set`, ...) never return this type; they log and
/// return `false` instead. It is surfaced by the operations that callers
/// are expected to check: `init`, `assign`, block copies and notification
/// binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RegisterError {
    /// Access extends past the end of the register.
    OutOfBounds,
    /// A 16/32-bit access is not aligned to its own width.
    Misaligned,
    /// The register has not been initialised, or its allocation failed.
    NotInitialized,
    /// `init()` was called on a register that is already initialised.
    AlreadyInitialized,
    /// Neither memory pool could satisfy the allocation.
    AllocationFailed,
    /// Register size is not a multiple of its native granularity.
    InvalidShape,
    /// Source and destination of a bulk copy differ in size.
    ShapeMismatch,
    /// A wake target is already bound to this register.
    AlreadyBound,
}

impl fmt::Display for RegisterError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RegisterError::OutOfBounds => write!(f, "index out of range"),
            RegisterError::Misaligned => write!(f, "alignment error"),
            RegisterError::NotInitialized => write!(f, "register not initialized"),
            RegisterError::AlreadyInitialized => write!(f, "register already initialized"),
            RegisterError::AllocationFailed => write!(f, "allocation failed in every pool"),
            RegisterError::InvalidShape => {
                write!(f, "size is not a multiple of the native granularity")
            }
            RegisterError::ShapeMismatch => write!(f, "register sizes differ"),
            RegisterError::AlreadyBound => write!(f, "notify target already set"),
        }
    }
}
