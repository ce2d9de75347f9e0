//! The two variable-length integer encodings found in pack data.
//!
//! Both read 7 payload bits per byte and use the top bit as a "more" flag, but they differ in
//! byte order, and the big-endian form adds one to the accumulator before each shift so that
//! every value has exactly one encoding.

use crate::error::{GitError, Result};

/// Decodes a big-endian modified base-128 number (delta base offsets, v4 index name strips).
///
/// Returns the value and the number of bytes consumed. At most `max_bytes` bytes are read.
pub fn read_offset(data: &[u8], max_bytes: usize) -> Result<(u64, usize)> {
    let mut bytes = data.iter();
    let mut b = *bytes.next().ok_or(GitError::Truncated("variable-length offset"))?;
    let mut value = u64::from(b & 0x7f);
    let mut read = 1;
    while b & 0x80 != 0 {
        if read >= max_bytes {
            return Err(GitError::Truncated("over-long variable-length offset"));
        }
        b = *bytes.next().ok_or(GitError::Truncated("variable-length offset"))?;
        read += 1;
        value = ((value + 1) << 7) | u64::from(b & 0x7f);
    }
    Ok((value, read))
}

/// Decodes a little-endian base-128 number (delta base and result lengths).
pub fn read_size(data: &[u8]) -> Result<(u64, usize)> {
    let mut value = 0u64;
    let mut shift = 0u32;
    for (i, &b) in data.iter().enumerate() {
        if shift > 63 {
            break;
        }
        value |= u64::from(b & 0x7f) << shift;
        if b & 0x80 == 0 {
            return Ok((value, i + 1));
        }
        shift += 7;
    }
    Err(GitError::Truncated("variable-length size"))
}
