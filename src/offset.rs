//! Conversion of sector addresses into stream offsets.
//!
//! Every seek performed by the table codec goes through [`byte_offset`], so a corrupted or hostile
//! LBA never wraps around into a valid-looking position.

use log::debug;

use crate::GptError;

/// Multiplies two signed 64-bit integers, reporting whether the true product was representable.
///
/// Returns `(product, overflowed)`. When `overflowed` is `true`, `product` is the wrapped result
/// and must not be used.
///
/// # Examples
///
/// ```
/// use efipart::checked_multiply;
///
/// assert_eq!(checked_multiply(512, 2), (1024, false));
/// assert!(checked_multiply(i64::MAX, 2).1);
/// ```
#[must_use]
pub const fn checked_multiply(a: i64, b: i64) -> (i64, bool) {
    if a == 0 || b == 0 || a == 1 || b == 1 {
        return (a * b, false);
    }

    if a == i64::MIN || b == i64::MIN {
        return (a.wrapping_mul(b), true);
    }

    let product = a.wrapping_mul(b);

    // `b` is neither 0 nor `i64::MIN`, and `product` can only be `i64::MIN` with `b == -1` if
    // `a == i64::MIN`, so this division cannot fault.
    (product, product / b != a)
}

/// Returns the byte offset of `lba` on a device with `sector_size`-byte sectors.
///
/// Fails with [`GptError::SeekOverflow`] if the offset is not representable as a signed 64-bit
/// stream position.
pub fn byte_offset(lba: u64, sector_size: u32) -> Result<u64, GptError> {
    let overflow = GptError::SeekOverflow { lba, sector_size };

    let lba_signed = i64::try_from(lba).map_err(|_| overflow)?;
    let (offset, overflowed) = checked_multiply(lba_signed, i64::from(sector_size));

    if overflowed {
        debug!("offset of LBA {lba} overflows with {sector_size}-byte sectors");
        return Err(overflow);
    }

    u64::try_from(offset).map_err(|_| overflow)
}
