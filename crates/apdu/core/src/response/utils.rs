//! Helpers for decoding response payloads

use crate::Error;
use crate::response::status::StatusWord;

/// Split a raw response into its status word and payload
pub fn split_status(raw: &[u8]) -> Result<(StatusWord, &[u8]), Error> {
    match raw.split_last_chunk::<2>() {
        Some((payload, [sw1, sw2])) => Ok((StatusWord::new(*sw1, *sw2), payload)),
        None => Err(Error::IncompleteResponse(raw.len())),
    }
}

/// Read a big-endian unsigned integer of up to 8 bytes
pub fn read_be_uint(bytes: &[u8]) -> u64 {
    bytes
        .iter()
        .take(8)
        .fold(0u64, |acc, byte| (acc << 8) | u64::from(*byte))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_status() {
        let (status, payload) = split_status(&[0x4D, 0xBD, 0xC9, 0x60, 0x90, 0x00]).unwrap();
        assert!(status.is_success());
        assert_eq!(payload, &[0x4D, 0xBD, 0xC9, 0x60]);

        let (status, payload) = split_status(&[0x69, 0x88]).unwrap();
        assert_eq!(status.to_u16(), 0x6988);
        assert!(payload.is_empty());

        assert_eq!(split_status(&[0x90]), Err(Error::IncompleteResponse(1)));
    }

    #[test]
    fn test_read_be_uint() {
        assert_eq!(read_be_uint(&[0x00, 0x12, 0x34]), 0x1234);
        assert_eq!(read_be_uint(&[0xFF, 0xFF, 0xFF]), 0x00FF_FFFF);
        assert_eq!(read_be_uint(&[]), 0);
    }
}
