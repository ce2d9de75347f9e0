use std::io::Read;

use flate2::read::ZlibDecoder;

use crate::error::Result;

/// Inflates a zlib stream, reading through a scratch buffer of `buffer_size` bytes.
///
/// Decoding stops at the end of the zlib stream; bytes following it are ignored, which lets
/// callers pass a slice that over-approximates a pack entry.
pub fn inflate(data: &[u8], buffer_size: usize) -> Result<Vec<u8>> {
    read_all(ZlibDecoder::new(data), data.len(), buffer_size)
}

/// Like [`inflate`], but stops after `limit` bytes of output.
///
/// Pack entries declare their inflated size up front; reading one byte past it is enough to
/// tell that the entry lies, without inflating the rest of it.
pub fn inflate_at_most(data: &[u8], buffer_size: usize, limit: u64) -> Result<Vec<u8>> {
    read_all(ZlibDecoder::new(data).take(limit), data.len(), buffer_size)
}

fn read_all(mut decoder: impl Read, capacity: usize, buffer_size: usize) -> Result<Vec<u8>> {
    let mut inflated = Vec::with_capacity(capacity);
    let mut buf = vec![0u8; buffer_size.max(1)];
    loop {
        let n = decoder.read(&mut buf)?;
        if n == 0 {
            break;
        }
        inflated.extend_from_slice(&buf[..n]);
    }
    Ok(inflated)
}
