//! Control-message blocks.
//!
//! A control buffer is a sequence of `nn_cmsghdr` records, each a
//! native-endian `size_t` length followed by `int` level and `int` type,
//! padded to `size_t` alignment, then the record's data. The only record
//! this layer produces or consumes is `(PROTO_SP, SP_HDR)`, whose data is the
//! message header region.

use crate::consts::{PROTO_SP, SP_HDR};
use crate::errno::Result;
use spmq_core::error::Error;

const WORD: usize = std::mem::size_of::<usize>();
const INT: usize = std::mem::size_of::<i32>();

/// Round `len` up to `size_t` alignment.
#[must_use]
pub const fn align(len: usize) -> usize {
    (len + WORD - 1) & !(WORD - 1)
}

/// Offset of the data within a record.
pub const DATA_OFFSET: usize = align(WORD + 2 * INT);

/// Value of `cmsg_len` for `data_len` bytes of data.
#[must_use]
pub const fn record_len(data_len: usize) -> usize {
    DATA_OFFSET + data_len
}

/// Buffer space taken by one record holding `data_len` bytes.
#[must_use]
pub const fn space(data_len: usize) -> usize {
    DATA_OFFSET + align(data_len)
}

/// Write a single `SP_HDR` record holding `header` into `out`.
///
/// The record header area is zeroed first. Returns `false`, with nothing
/// but that zeroing done, if `out` is too small for the record.
pub fn encode_sp_header(header: &[u8], out: &mut [u8]) -> bool {
    let zeroed = out.len().min(DATA_OFFSET);
    out[..zeroed].fill(0);
    if out.len() < space(header.len()) {
        return false;
    }
    out[..WORD].copy_from_slice(&record_len(header.len()).to_ne_bytes());
    out[WORD..WORD + INT].copy_from_slice(&PROTO_SP.to_ne_bytes());
    out[WORD + INT..WORD + 2 * INT].copy_from_slice(&SP_HDR.to_ne_bytes());
    out[DATA_OFFSET..DATA_OFFSET + header.len()].copy_from_slice(header);
    true
}

fn read_word(bytes: &[u8]) -> usize {
    let mut word = [0u8; WORD];
    word.copy_from_slice(&bytes[..WORD]);
    usize::from_ne_bytes(word)
}

fn read_int(bytes: &[u8]) -> i32 {
    let mut int = [0u8; INT];
    int.copy_from_slice(&bytes[..INT]);
    i32::from_ne_bytes(int)
}

/// Concatenated data of every `SP_HDR` record in `control`.
///
/// Records of other levels or types are skipped. Trailing bytes too short
/// to hold a record header are ignored.
///
/// # Errors
///
/// `EINVAL` if a record's length is shorter than its own header or runs
/// past the end of the buffer.
pub fn sp_header(control: &[u8]) -> Result<Vec<u8>> {
    let mut header = Vec::new();
    let mut offset = 0;
    while control.len() - offset >= DATA_OFFSET {
        let record = &control[offset..];
        let len = read_word(record);
        if len < DATA_OFFSET || len > record.len() {
            return Err(Error::InvalidArgument.into());
        }
        let level = read_int(&record[WORD..]);
        let kind = read_int(&record[WORD + INT..]);
        if level == PROTO_SP && kind == SP_HDR {
            header.extend_from_slice(&record[DATA_OFFSET..len]);
        }
        offset += align(len).min(record.len());
    }
    Ok(header)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_constants() {
        assert_eq!(DATA_OFFSET % WORD, 0);
        assert_eq!(space(0), DATA_OFFSET);
        assert_eq!(space(1), DATA_OFFSET + WORD);
        assert_eq!(record_len(5), DATA_OFFSET + 5);
    }

    #[test]
    fn test_encode_then_parse() {
        let header = [0, 0, 0, 7, 0x80, 0, 0, 1];
        let mut buf = vec![0xAAu8; space(header.len())];
        assert!(encode_sp_header(&header, &mut buf));
        assert_eq!(sp_header(&buf).unwrap(), header);
    }

    #[test]
    fn test_encode_too_small() {
        let mut buf = vec![0xAAu8; DATA_OFFSET + 2];
        assert!(!encode_sp_header(&[1, 2, 3, 4], &mut buf));
        assert!(buf[..DATA_OFFSET].iter().all(|b| *b == 0));
        assert_eq!(&buf[DATA_OFFSET..], &[0xAA, 0xAA]);
    }

    #[test]
    fn test_foreign_records_skipped() {
        let mut buf = vec![0u8; space(3) + space(2)];
        buf[..WORD].copy_from_slice(&record_len(3).to_ne_bytes());
        buf[WORD..WORD + INT].copy_from_slice(&99i32.to_ne_bytes());
        assert!(encode_sp_header(&[5, 6], &mut buf[space(3)..]));
        assert_eq!(sp_header(&buf).unwrap(), vec![5, 6]);
    }

    #[test]
    fn test_bad_record_length() {
        let mut buf = vec![0u8; DATA_OFFSET];
        buf[..WORD].copy_from_slice(&(DATA_OFFSET + 1).to_ne_bytes());
        assert_eq!(sp_header(&buf).unwrap_err().errno(), libc::EINVAL);
    }
}
