use crate::error::{GitError, Result};

/// Length of the SHA-1 checksum closing every pack file.
pub const TRAILER_LEN: usize = 20;

/// The type and size header opening each pack entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryHeader {
    pub type_code: u8,
    /// Inflated size of the object, or of the delta data for deltified entries.
    pub size: u64,
    /// Bytes taken by the header itself.
    pub len: usize,
}

/// Number of bytes the entry at `offset` occupies, derived from the next larger offset.
///
/// The last entry runs up to the pack checksum.
pub fn entry_length(pack_len: usize, offset: u32, sorted_offsets: &[u32]) -> Result<usize> {
    let invalid = |offset: u64| GitError::InvalidOffset {
        offset,
        len: pack_len,
    };
    let trailer_start = pack_len
        .checked_sub(TRAILER_LEN)
        .ok_or_else(|| invalid(u64::from(offset)))?;

    let after = sorted_offsets.partition_point(|&o| o <= offset);
    let next = sorted_offsets
        .get(after)
        .map_or(trailer_start, |&o| o as usize);
    if next >= pack_len {
        return Err(invalid(next as u64));
    }
    let offset = offset as usize;
    if offset >= next {
        return Err(invalid(offset as u64));
    }
    Ok(next - offset)
}

/// Decodes the header: bits 6-4 of the first byte are the type, bits 3-0 start the size, and
/// each byte with the top bit set is followed by 7 more size bits.
pub fn parse_entry_header(entry: &[u8]) -> Result<EntryHeader> {
    let mut bytes = entry.iter();
    let mut b = *bytes.next().ok_or(GitError::Truncated("pack entry header"))?;
    let type_code = (b >> 4) & 0x07;
    let mut size = u64::from(b & 0x0f);
    let mut len = 1;
    while b & 0x80 != 0 {
        if len > 4 {
            return Err(GitError::CorruptSizeEncoding);
        }
        b = *bytes.next().ok_or(GitError::Truncated("pack entry size"))?;
        size |= u64::from(b & 0x7f) << (4 + 7 * (len - 1));
        len += 1;
    }
    Ok(EntryHeader {
        type_code,
        size,
        len,
    })
}
