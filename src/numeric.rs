//! Encoding of the fixed-width numeric header fields.
//!
//! Values are written as zero-padded octal ASCII as long as they fit in
//! `length - 1` digits. Larger values fall back to the GNU base-256 form: a
//! `0x80` marker byte followed by the big-endian value.

use std::fmt::Display;

use num::ToPrimitive;
use num::Zero;

use crate::constants::PERMISSION_MASK;
use crate::utils::parse_octal;
use crate::Result;
use crate::TarError;

/// Marker byte of a base-256 encoded field.
const BASE256_MARKER: u8 = 0x80;

/// Encode `value` into a field of `length` bytes.
///
/// Absent values stay absent so the caller can leave the field as nulls.
/// The octal form is one byte short of `length`; the field padding supplies
/// the terminator.
pub fn encode_number<T>(value: Option<T>, length: usize) -> Result<Option<Vec<u8>>>
    where T: ToPrimitive + Zero + PartialOrd + Display {
    let value = match value {
        Some(value) => value,
        None => return Ok(None),
    };

    if value < T::zero() {
        return Err(TarError::UnsupportedValue(value.to_string()));
    }

    let value = value.to_u128().ok_or_else(|| TarError::ValueTooLarge {
        value: value.to_string(),
        length,
    })?;

    let octal_length = length.saturating_sub(1);
    if value <= max_octal(octal_length) {
        Ok(Some(to_octal(value, octal_length)))
    } else {
        to_base256(value, length).map(Some)
    }
}

/// Encode a file mode, dropping the file type bits.
pub fn encode_permissions(mode: Option<u32>, length: usize) -> Result<Option<Vec<u8>>> {
    encode_number(mode.map(|mode| mode & PERMISSION_MASK), length)
}

/// Encode a header checksum as octal digits followed by a null and a space.
///
/// Without a sum the field is all spaces, which is how it counts towards
/// its own checksum.
pub fn encode_checksum(sum: Option<u32>, length: usize) -> Result<Vec<u8>> {
    match sum {
        None => Ok(vec![b' '; length]),
        Some(sum) => {
            let mut field = encode_number(Some(sum), length.saturating_sub(1))?.unwrap_or_default();
            field.push(0);
            field.push(b' ');
            Ok(field)
        }
    }
}

/// Decode a numeric field written by either encoding.
///
/// An empty field reads as zero.
pub fn decode_number(field: &[u8]) -> Result<u64> {
    match field.first() {
        Some(&first) if first & BASE256_MARKER != 0 => {
            if first != BASE256_MARKER {
                // Negative or with payload bits in the marker byte.
                return Err(TarError::EncodingError);
            }
            field[1..].iter().try_fold(0u64, |acc, &byte| {
                acc.checked_mul(256)
                    .map(|acc| acc + u64::from(byte))
                    .ok_or(TarError::EncodingError)
            })
        }
        _ => match parse_octal::<u64>(field) {
            Some(parsed) => Ok(parsed?),
            None => Ok(0),
        },
    }
}

fn max_octal(digits: usize) -> u128 {
    // 8^digits - 1, saturating for fields wider than a u128.
    (digits as u32)
        .checked_mul(3)
        .filter(|&bits| bits < 128)
        .map_or(u128::MAX, |bits| (1u128 << bits) - 1)
}

fn to_octal(value: u128, digits: usize) -> Vec<u8> {
    if digits == 0 {
        return Vec::new();
    }
    format!("{:0width$o}", value, width = digits).into_bytes()
}

fn to_base256(value: u128, length: usize) -> Result<Vec<u8>> {
    let too_large = || TarError::ValueTooLarge {
        value: value.to_string(),
        length,
    };

    if length == 0 {
        return Err(too_large());
    }

    let mut encoded = vec![0u8; length];
    encoded[0] = BASE256_MARKER;

    let mut remaining = value;
    for slot in encoded[1..].iter_mut().rev() {
        if remaining == 0 {
            break;
        }
        *slot = (remaining % 256) as u8;
        remaining /= 256;
    }

    if remaining > 0 {
        return Err(too_large());
    }

    Ok(encoded)
}
