//! Fixed-size two-byte string fields used by the job details payload.
//!
//! Each character occupies two bytes: a zero byte followed by the ASCII
//! byte. Fields are zero padded, and the last character slot is always
//! left zero so the field stays terminated.

use bytes::{BufMut, BytesMut};

/// Substitute for characters that have no single-byte ASCII form.
const REPLACEMENT: u8 = b'?';

/// Number of characters a field of `field_len` bytes can hold.
pub fn wide_capacity(field_len: usize) -> usize {
    (field_len / 2).saturating_sub(1)
}

/// Append `s` as a `field_len`-byte wide string field, truncating on overflow.
pub fn put_wide_str(dst: &mut BytesMut, s: &str, field_len: usize) {
    let mut written = 0usize;
    for ch in s.chars().take(wide_capacity(field_len)) {
        let byte = if ch.is_ascii() && ch != '\0' {
            ch as u8
        } else {
            REPLACEMENT
        };
        dst.put_u8(0);
        dst.put_u8(byte);
        written += 2;
    }
    dst.put_bytes(0, field_len - written);
}

/// Read a wide string field back, stopping at the first empty slot.
pub fn decode_wide_str(field: &[u8]) -> String {
    field
        .chunks_exact(2)
        .map(|pair| pair[1])
        .take_while(|b| *b != 0)
        .map(char::from)
        .collect()
}
