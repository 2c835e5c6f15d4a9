//! CRC-32 (IEEE 802.3, reflected polynomial `0xEDB88320`) via `crc32fast`.
//!
//! Registers use the CRC as a cheap content fingerprint: two copies of a
//! register that were edited independently can be compared without holding
//! both at once (e.g. "is the song different from what was last saved?").
//!
//! The running value is pre- and post-inverted, so a checksum can be chained
//! across several buffers by passing the previous result as the seed:
//! `crc32(b, crc32(a, 0)) == crc32(a ++ b, 0)`.

use crc32fast::Hasher;

/// Compute the CRC-32 of `data`, continuing from `seed`.
///
/// Pass `0` to start a new checksum.
///
/// # Examples
///
/// ```
/// use spirant_registry::crc32;
///
/// assert_eq!(crc32(b"123456789", 0), 0xCBF4_3926);
/// assert_eq!(crc32(b"6789", crc32(b"12345", 0)), 0xCBF4_3926);
/// ```
pub fn crc32(data: &[u8], seed: u32) -> u32 {
    let mut hasher = Hasher::new_with_initial(seed);
    hasher.update(data);
    hasher.finalize()
}

/// Values that can be folded into a running CRC-32.
///
/// Implemented for the integer types and `bool` using their little-endian
/// byte representation. Richer sparse-register values (small structs)
/// implement it by folding their fields in a fixed order.
pub trait Checksum {
    /// Fold `self` into the running checksum `seed` and return the result.
    fn checksum(&self, seed: u32) -> u32;
}

macro_rules! impl_checksum_le {
    ($($ty:ty),*) => {
        $(
            impl Checksum for $ty {
                fn checksum(&self, seed: u32) -> u32 {
                    crc32(&self.to_le_bytes(), seed)
                }
            }
        )*
    };
}

impl_checksum_le!(u8, u16, u32, i8, i16, i32);

impl Checksum for bool {
    fn checksum(&self, seed: u32) -> u32 {
        crc32(&[*self as u8], seed)
    }
}

// ── Unit Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_value_matches_ieee() {
        // Standard CRC-32 check value.
        assert_eq!(crc32(b"123456789", 0), 0xCBF4_3926);
    }

    #[test]
    fn empty_input_returns_seed() {
        assert_eq!(crc32(&[], 0), 0);
        assert_eq!(crc32(&[], 0x1234_5678), 0x1234_5678);
    }

    #[test]
    fn single_byte_reference_values() {
        assert_eq!(crc32(&[0x00], 0), 0xD202_EF8D);
        assert_eq!(crc32(&[0xFF], 0), 0xFF00_0000);
    }

    #[test]
    fn seeded_chaining_over_many_splits() {
        let data = b"\x00\x01\xFEregister contents\xFF";
        let whole = crc32(data, 0xDEAD_BEEF);
        for split in 0..=data.len() {
            let (a, b) = data.split_at(split);
            assert_eq!(crc32(b, crc32(a, 0xDEAD_BEEF)), whole);
        }
    }

    #[test]
    fn chaining_equals_single_pass() {
        let whole = crc32(b"hello, registry", 0);
        let first = crc32(b"hello, ", 0);
        assert_eq!(crc32(b"registry", first), whole);
    }

    #[test]
    fn integer_checksum_uses_little_endian_bytes() {
        assert_eq!(0x0403_0201u32.checksum(0), crc32(&[1, 2, 3, 4], 0));
        assert_eq!(0x0201u16.checksum(7), crc32(&[1, 2], 7));
        assert_eq!((-1i8).checksum(0), crc32(&[0xFF], 0));
    }

    #[test]
    fn bool_checksum_distinguishes_values() {
        assert_ne!(true.checksum(0), false.checksum(0));
    }
}
