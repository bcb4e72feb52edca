use std::io;
use std::io::Read;
use std::io::Write;
use std::str;

use itertools::Itertools;
use num::Num;

use crate::constants::BLOCK_SIZE;

/// Create an &str from a null- or space-terminated field.
///
/// Leading spaces are skipped, as some writers right-align their
/// numbers. Any failures will result in None being returned.
pub fn trimmed_str(contents: &[u8]) -> Option<&str> {
    let contents = match contents.iter().find_position(|&&x| x != b' ') {
        Some((pos, _)) => &contents[pos..],
        None => return None,
    };

    match contents.iter().find_position(|&&x| x == 0u8 || x == b' ') {
        Some((0, _)) => None,
        Some((pos, _)) => str::from_utf8(&contents[..pos]).ok(),
        None => str::from_utf8(contents).ok(),
    }
}

pub fn parse_octal<T>(field: &[u8]) -> Option<Result<T, T::FromStrRadixErr>>
    where T: Num {
    trimmed_str(field).map(|digits| T::from_str_radix(digits, 8))
}

/// Number of null bytes needed after `position` to reach a block boundary.
pub fn padding_len(position: u64) -> u64 {
    let block = BLOCK_SIZE as u64;
    (block - position % block) % block
}

/// Write `count` null bytes.
pub fn write_zeros<W: Write + ?Sized>(sink: &mut W, count: u64) -> io::Result<()> {
    let written = io::copy(&mut io::repeat(0).take(count), sink)?;
    debug_assert_eq!(written, count);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trimmed_str() {
        assert_eq!("foo", trimmed_str(b"foo\0bar\0").unwrap());
        assert_eq!("0644", trimmed_str(b"  0644 \0").unwrap());
        assert_eq!("17", trimmed_str(b"17").unwrap());
        assert_eq!(None, trimmed_str(b"\0\0\0"));
        assert_eq!(None, trimmed_str(b""));
    }

    #[test]
    fn test_parse_octal() {
        assert_eq!(Some(Ok(0o644u32)), parse_octal::<u32>(b"0000644\0"));
        assert_eq!(None, parse_octal::<u32>(b"\0\0\0\0"));
        assert!(parse_octal::<u32>(b"0009\0").unwrap().is_err());
    }

    #[test]
    fn test_padding_len() {
        assert_eq!(0, padding_len(0));
        assert_eq!(511, padding_len(1));
        assert_eq!(0, padding_len(1024));
        assert_eq!(493, padding_len(1555));
    }

    #[test]
    fn test_write_zeros() {
        let mut out = vec![1u8];
        write_zeros(&mut out, 5).unwrap();
        assert_eq!(vec![1u8, 0, 0, 0, 0, 0], out);
    }
}
