//! Bit-level packing for command fields.
//!
//! Bits are numbered from the most significant end: bit 0 is `0x80`, bit 7 is `0x01`.

use core::fmt;

use crate::Error;

/// Places `flags` into an otherwise zero byte, the first flag at bit `offset`.
///
/// # Errors
/// Returns `Error::BitRangeOverflow` if the flags would run past bit 7.
pub fn fill_bool(flags: &[bool], offset: usize) -> Result<u8, Error> {
    if offset + flags.len() > 8 {
        return Err(Error::BitRangeOverflow);
    }
    Ok(flags
        .iter()
        .enumerate()
        .filter(|&(_, &flag)| flag)
        .fold(0u8, |byte, (i, _)| byte | (0x80 >> (offset + i))))
}

/// Packs `value` into exactly `N * 8` bits, most significant byte first.
///
/// # Errors
/// Returns `Error::ValueTooWide` if `value` needs more than `N * 8` bits.
pub fn pack_uint<const N: usize>(value: u32) -> Result<[u8; N], Error> {
    let all = value.to_be_bytes();
    if N > all.len() {
        let mut out = [0u8; N];
        out[N - all.len()..].copy_from_slice(&all);
        return Ok(out);
    }
    let (overflow, field) = all.split_at(all.len() - N);
    if overflow.iter().any(|&b| b != 0) {
        return Err(Error::ValueTooWide);
    }
    let mut out = [0u8; N];
    out.copy_from_slice(field);
    Ok(out)
}

/// Splits a byte into its bits, bit 0 first.
#[must_use]
pub fn unpack_bits(byte: u8) -> [bool; 8] {
    let mut bits = [false; 8];
    for (i, bit) in bits.iter_mut().enumerate() {
        *bit = byte & (0x80 >> i) != 0;
    }
    bits
}

/// Reads bit `index` of `byte`.
#[must_use]
pub const fn get_bit(byte: u8, index: u8) -> bool {
    byte & (0x80 >> index) != 0
}

/// Formats bytes as space separated bit strings, e.g. `10000101 00011110`.
#[derive(Debug, Copy, Clone)]
pub struct Bits<'a>(pub &'a [u8]);

impl fmt::Display for Bits<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, byte) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{byte:08b}")?;
        }
        Ok(())
    }
}
