//! Pack index (`.idx`) parsing.
//!
//! Version 1 has no header: a 256-entry fan-out table followed by `(offset, hash)` pairs.
//! Versions 2 and 3 start with `\xfftOc` and a version word; version 2 keeps the hash table,
//! version 3 leaves it to the version 4 pack file. In every version the offsets come in hash
//! order, so a copy sorted by offset is kept to find where an entry ends.

use tracing::debug;

use crate::error::{GitError, Result};
use crate::hash::ObjectId;
use crate::pack::header::PackHeader;
use crate::wire::{ensure_table, get_fanout, get_object_id, get_u32, take};

const FANOUT_LEN: usize = 256 * 4;

#[derive(Debug, Clone)]
pub struct PackIndex {
    version: u32,
    fanout: [u32; 256],
    /// Empty for version 3, where the hashes live in the pack.
    hashes: Vec<ObjectId>,
    offsets: Vec<u32>,
    sorted_offsets: Vec<u32>,
}

impl PackIndex {
    /// Parses `data`, checking it against the header of the pack it indexes.
    pub fn parse(data: &[u8], pack: &PackHeader) -> Result<Self> {
        if data.len() < FANOUT_LEN {
            return Err(GitError::Truncated("pack index fan-out table"));
        }
        // byte 0 would be 0xff for version 2+, it is deliberately not checked
        if &data[1..4] == b"tOc" {
            debug!("pack index is version 2 or later");
            Self::parse_v2(data, pack)
        } else {
            Self::parse_v1(data, pack)
        }
    }

    fn parse_v1(data: &[u8], pack: &PackHeader) -> Result<Self> {
        let mut buf = data;
        let fanout = get_fanout(&mut buf)?;
        let count = fanout[255];
        if count != pack.entry_count {
            return Err(GitError::IndexPackMismatch {
                index: count,
                pack: pack.entry_count,
            });
        }
        debug!(count, "version 1 pack index");
        ensure_table(buf, count, 4 + ObjectId::LEN, "pack index entries")?;

        let mut hashes = Vec::with_capacity(count as usize);
        let mut offsets = Vec::with_capacity(count as usize);
        for _ in 0..count {
            offsets.push(get_u32(&mut buf, "pack index offset")?);
            hashes.push(get_object_id(&mut buf, "pack index hash")?);
        }
        Ok(Self::build(1, fanout, hashes, offsets))
    }

    fn parse_v2(data: &[u8], pack: &PackHeader) -> Result<Self> {
        let mut buf = data;
        let signature = take(&mut buf, 4, "pack index signature")?;
        if &signature[1..] != b"tOc" {
            return Err(GitError::InvalidIndexSignature);
        }
        let version = get_u32(&mut buf, "pack index version")?;
        if version != 2 && version != 3 {
            return Err(GitError::UnsupportedIndexVersion(version));
        }
        check_compatible(version, pack.version)?;

        let fanout = get_fanout(&mut buf)?;
        let count = fanout[255];
        if count != pack.entry_count {
            return Err(GitError::IndexPackMismatch {
                index: count,
                pack: pack.entry_count,
            });
        }
        debug!(version, count, "pack index");
        let hash_len = if version < 3 { ObjectId::LEN } else { 0 };
        // hashes, CRCs and offsets
        ensure_table(buf, count, hash_len + 4 + 4, "pack index tables")?;

        let mut hashes = Vec::new();
        if version < 3 {
            hashes.reserve(count as usize);
            for _ in 0..count {
                hashes.push(get_object_id(&mut buf, "pack index hash")?);
            }
        }
        take(&mut buf, count as usize * 4, "pack index CRC table")?;

        let mut offsets = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let offset = get_u32(&mut buf, "pack index offset")?;
            if offset & 0x8000_0000 != 0 {
                // points into the 64-bit offset table, only used by packs over 2GiB
                return Err(GitError::InvalidOffset {
                    offset: u64::from(offset),
                    len: data.len(),
                });
            }
            offsets.push(offset);
        }
        Ok(Self::build(version, fanout, hashes, offsets))
    }

    fn build(version: u32, fanout: [u32; 256], hashes: Vec<ObjectId>, offsets: Vec<u32>) -> Self {
        let mut sorted_offsets = offsets.clone();
        sorted_offsets.sort_unstable();
        PackIndex {
            version,
            fanout,
            hashes,
            offsets,
            sorted_offsets,
        }
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn entry_count(&self) -> usize {
        self.offsets.len()
    }

    /// False for version 3, whose hashes have to be looked up in the pack instead.
    pub fn has_hashes(&self) -> bool {
        self.version != 3
    }

    /// Position of `id` in the index's hash table, narrowed by the fan-out table.
    pub fn position(&self, id: &ObjectId) -> Option<usize> {
        let first = usize::from(id.first_byte());
        let start = if first == 0 { 0 } else { self.fanout[first - 1] as usize };
        let end = self.fanout[first] as usize;
        let candidates = self.hashes.get(start..end)?;
        candidates.binary_search(id).ok().map(|i| start + i)
    }

    pub fn offset_at(&self, position: usize) -> Option<u32> {
        self.offsets.get(position).copied()
    }

    /// Every entry offset, ascending.
    pub fn sorted_offsets(&self) -> &[u32] {
        &self.sorted_offsets
    }
}

/// Pack 2 and 3 go with index 2, pack 4 with index 3. Index 1 is accepted with any pack.
fn check_compatible(index: u32, pack: u32) -> Result<()> {
    let compatible = match pack {
        2 | 3 => index == 2,
        4 => index == 3,
        _ => false,
    };
    if !compatible {
        return Err(GitError::IncompatibleIndexVersion { index, pack });
    }
    Ok(())
}
