//! The working tree index (`.git/index`), versions 2 to 4.
//!
//! Only the path to object-id mapping is kept. Each entry is 40 bytes of stat data, the object
//! id, a 16-bit flags word (12 bits of name length, bit 14 "extended"), 16 more flag bits when
//! extended (version 3 and up), then the name. Up to version 3 the name is stored whole and
//! NUL-padded to a multiple of 8 bytes; version 4 stores it as "strip N bytes off the previous
//! name, then append this NUL-terminated suffix" with no padding.

use std::collections::BTreeMap;

use tracing::debug;

use crate::error::{GitError, Result};
use crate::hash::ObjectId;
use crate::varint::read_offset;
use crate::wire::{get_object_id, get_u16, get_u32, get_u8, take};

const STAT_LEN: usize = 40;
const NAME_MASK: u16 = 0x0fff;
const EXTENDED_FLAG: u16 = 0x4000;

/// Maps every path recorded in the index to its object id. A repeated path keeps the last id.
pub fn parse_index(data: &[u8]) -> Result<BTreeMap<String, ObjectId>> {
    let mut buf = data;
    if take(&mut buf, 4, "index signature")? != b"DIRC" {
        return Err(GitError::InvalidIndexFileSignature);
    }
    let version = get_u32(&mut buf, "index version")?;
    if !(2..=4).contains(&version) {
        return Err(GitError::UnsupportedIndexVersion(version));
    }
    let count = get_u32(&mut buf, "index entry count")?;
    debug!(version, count, "index file");

    let mut entries = BTreeMap::new();
    let mut previous: Vec<u8> = Vec::new();
    for entry in 0..count {
        let start = buf.len();
        take(&mut buf, STAT_LEN, "index entry stat data")?;
        let id = get_object_id(&mut buf, "index entry object id")?;
        let flags = get_u16(&mut buf, "index entry flags")?;
        let name_len = usize::from(flags & NAME_MASK);

        if flags & EXTENDED_FLAG != 0 {
            if version == 2 {
                return Err(GitError::InvalidExtendedFlag { entry, version });
            }
            get_u16(&mut buf, "index entry extended flags")?;
        }

        let name = if version >= 4 {
            read_prefixed_name(&mut buf, &previous, name_len)?
        } else {
            read_name(&mut buf, name_len)?
        };

        if version < 4 {
            let read = start - buf.len();
            let padding = (8 - read % 8) % 8;
            take(&mut buf, padding, "index entry padding")?;
        }

        if !name.is_empty() {
            let path = String::from_utf8_lossy(&name).into_owned();
            debug!(entry, %path, %id, "index entry");
            entries.insert(path, id);
        }
        previous = name;
    }
    Ok(entries)
}

/// A whole name and its NUL. Names of 0xfff bytes or more are only found by their NUL.
fn read_name(buf: &mut &[u8], name_len: usize) -> Result<Vec<u8>> {
    if usize::from(NAME_MASK) == name_len {
        return read_until_nul(buf);
    }
    let name = take(buf, name_len, "index entry name")?.to_vec();
    expect_nul(buf)?;
    Ok(name)
}

fn read_prefixed_name(buf: &mut &[u8], previous: &[u8], name_len: usize) -> Result<Vec<u8>> {
    let (strip, n) = read_offset(*buf, 4)
        .map_err(|_| GitError::CorruptIndex("bad name prefix length".into()))?;
    take(buf, n, "index entry name prefix")?;

    let keep = usize::try_from(strip)
        .ok()
        .and_then(|strip| previous.len().checked_sub(strip))
        .ok_or_else(|| {
            GitError::CorruptIndex(format!(
                "cannot strip {strip} bytes from a {} byte name",
                previous.len()
            ))
        })?;

    let mut name = previous[..keep].to_vec();
    if usize::from(NAME_MASK) == name_len {
        name.extend(read_until_nul(buf)?);
        return Ok(name);
    }
    let suffix_len = name_len.checked_sub(keep).ok_or_else(|| {
        GitError::CorruptIndex(format!(
            "name of {name_len} bytes is shorter than its {keep} byte shared prefix"
        ))
    })?;
    name.extend_from_slice(take(buf, suffix_len, "index entry name")?);
    expect_nul(buf)?;
    Ok(name)
}

fn read_until_nul(buf: &mut &[u8]) -> Result<Vec<u8>> {
    let nul = buf
        .iter()
        .position(|&b| b == 0)
        .ok_or(GitError::Truncated("index entry name"))?;
    let name = take(buf, nul, "index entry name")?.to_vec();
    expect_nul(buf)?;
    Ok(name)
}

fn expect_nul(buf: &mut &[u8]) -> Result<()> {
    if get_u8(buf, "index entry name terminator")? != 0 {
        return Err(GitError::CorruptIndex("entry name is not NUL terminated".into()));
    }
    Ok(())
}
