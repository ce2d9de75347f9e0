//! Reading objects out of a fetched pack file and its index.

pub mod delta;
pub mod entry;
pub mod header;
pub mod index;

use tracing::debug;

use crate::error::{GitError, Result};
use crate::hash::ObjectId;
use crate::inflate::inflate_at_most;
use crate::objects::Kind;
use crate::varint::read_offset;

use self::delta::Delta;
use self::entry::{entry_length, parse_entry_header};
pub use self::header::{index_name, parse_pack_info, PackHeader};
pub use self::index::PackIndex;

/// Pack entries are small enough individually that a modest inflate buffer does.
const ENTRY_INFLATE_BUFFER: usize = 1024;

/// Delta base offsets fit in 64 bits, so never take more than 9 bytes.
const MAX_OFFSET_BYTES: usize = 9;

const OBJ_OFS_DELTA: u8 = 6;
const OBJ_REF_DELTA: u8 = 7;

pub struct PackFile<'a> {
    data: &'a [u8],
    header: PackHeader,
    max_delta_depth: usize,
}

impl<'a> PackFile<'a> {
    pub fn parse(data: &'a [u8], max_delta_depth: usize) -> Result<Self> {
        let header = PackHeader::parse(data)?;
        debug!(
            version = header.version,
            entries = header.entry_count,
            "pack file header"
        );
        Ok(PackFile {
            data,
            header,
            max_delta_depth,
        })
    }

    pub fn header(&self) -> &PackHeader {
        &self.header
    }

    /// Position of `id` in the hash table that version 4 packs carry after their header.
    fn v4_position(&self, id: &ObjectId) -> Option<usize> {
        let table_len = (self.header.entry_count as usize).checked_mul(ObjectId::LEN)?;
        let table = self.data.get(PackHeader::LEN..PackHeader::LEN.checked_add(table_len)?)?;
        table
            .chunks_exact(ObjectId::LEN)
            .position(|hash| hash == id.as_bytes())
    }

    /// The pack offset of `id`, as recorded in `index`.
    pub fn locate(&self, index: &PackIndex, id: &ObjectId) -> Result<u32> {
        let position = if index.has_hashes() {
            index.position(id)
        } else {
            self.v4_position(id)
        };
        let offset = position
            .and_then(|p| index.offset_at(p))
            .ok_or_else(|| GitError::ObjectNotInPack(id.to_hex()))?;
        debug!(%id, ?position, offset, "found object in pack index");
        Ok(offset)
    }

    /// Reads and fully resolves the object named `id`.
    pub fn read_object(&self, index: &PackIndex, id: &ObjectId) -> Result<Vec<u8>> {
        let offset = self.locate(index, id)?;
        let len = entry_length(self.data.len(), offset, index.sorted_offsets())?;
        debug!(offset, len, "deflated entry length, from offset differences");
        self.object_at(u64::from(offset), len, 0)
    }

    /// Resolves the entry at `offset`, spanning at most `len` bytes, following delta bases.
    pub fn object_at(&self, offset: u64, len: usize, depth: usize) -> Result<Vec<u8>> {
        let invalid = || GitError::InvalidOffset {
            offset,
            len: self.data.len(),
        };
        let start = usize::try_from(offset).map_err(|_| invalid())?;
        if start >= self.data.len() || start + len > self.data.len() {
            return Err(invalid());
        }
        let entry = &self.data[start..start + len];

        let header = parse_entry_header(entry)?;
        debug!(offset, type_code = header.type_code, size = header.size, "pack entry");
        let body = &entry[header.len..];

        match header.type_code {
            OBJ_OFS_DELTA => self.resolve_ofs_delta(offset, header.size, body, depth),
            OBJ_REF_DELTA => Err(GitError::UnsupportedDeltaEncoding),
            code => {
                let Some(kind) = Kind::from_pack_type(code) else {
                    return Err(GitError::ReservedObjectType(code));
                };
                debug!(%kind, "whole object");
                let inflated =
                    inflate_at_most(body, ENTRY_INFLATE_BUFFER, header.size.saturating_add(1))?;
                if inflated.len() as u64 != header.size {
                    return Err(GitError::InflatedSizeMismatch {
                        expected: header.size,
                        actual: inflated.len(),
                    });
                }
                Ok(inflated)
            }
        }
    }

    fn resolve_ofs_delta(
        &self,
        offset: u64,
        delta_size: u64,
        body: &[u8],
        depth: usize,
    ) -> Result<Vec<u8>> {
        if depth >= self.max_delta_depth {
            return Err(GitError::DeltaChainTooDeep {
                max: self.max_delta_depth,
            });
        }

        let (distance, n) = read_offset(body, MAX_OFFSET_BYTES)?;
        let base_offset = offset
            .checked_sub(distance)
            .filter(|_| distance > 0)
            .ok_or(GitError::InvalidOffset {
                offset: distance,
                len: self.data.len(),
            })?;
        debug!(offset, distance, base_offset, "delta with offset to base");

        let delta_data =
            inflate_at_most(&body[n..], ENTRY_INFLATE_BUFFER, delta_size.saturating_add(1))?;
        if delta_data.len() as u64 != delta_size {
            return Err(GitError::InflatedSizeMismatch {
                expected: delta_size,
                actual: delta_data.len(),
            });
        }
        let delta = Delta::parse(&delta_data, self.header.version)?;

        // the base entry ends at or before this one, so the distance bounds its length
        let base = self.object_at(base_offset, distance as usize, depth + 1)?;
        delta.apply(&base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn deflate(data: &[u8]) -> Vec<u8> {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    fn entry_header(type_code: u8, mut size: usize) -> Vec<u8> {
        let mut out = vec![(type_code << 4) | (size & 0x0f) as u8];
        size >>= 4;
        while size > 0 {
            *out.last_mut().unwrap() |= 0x80;
            out.push((size & 0x7f) as u8);
            size >>= 7;
        }
        out
    }

    fn pack_with(version: u32, entries: &[Vec<u8>]) -> Vec<u8> {
        let mut out = b"PACK".to_vec();
        out.extend_from_slice(&version.to_be_bytes());
        out.extend_from_slice(&(entries.len() as u32).to_be_bytes());
        for entry in entries {
            out.extend_from_slice(entry);
        }
        out.extend_from_slice(&[0u8; 20]);
        out
    }

    fn blob_entry(data: &[u8]) -> Vec<u8> {
        let mut entry = entry_header(3, data.len());
        entry.extend(deflate(data));
        entry
    }

    fn ofs_delta_entry(distance: u8, delta: &[u8]) -> Vec<u8> {
        let mut entry = entry_header(6, delta.len());
        entry.push(distance);
        entry.extend(deflate(delta));
        entry
    }

    #[test]
    fn plain_blob() {
        let blob = blob_entry(b"HELLOWORLD");
        let len = blob.len();
        let data = pack_with(2, &[blob]);
        let pack = PackFile::parse(&data, 8).unwrap();
        assert_eq!(pack.object_at(12, len, 0).unwrap(), b"HELLOWORLD");
    }

    #[test]
    fn delta_against_earlier_entry() {
        let base = blob_entry(b"HELLOWORLD");
        let distance = base.len() as u8;
        let delta = ofs_delta_entry(distance, &[10, 7, 0x90, 0x05, 0x02, b'!', b'?']);
        let delta_len = delta.len();
        let data = pack_with(2, &[base, delta]);
        let pack = PackFile::parse(&data, 8).unwrap();
        let offset = 12 + u64::from(distance);
        assert_eq!(pack.object_at(offset, delta_len, 0).unwrap(), b"HELLO!?");
    }

    #[test]
    fn delta_chains_respect_the_depth_budget() {
        let base = blob_entry(b"HELLOWORLD");
        let first = ofs_delta_entry(base.len() as u8, &[10, 5, 0x90, 0x05]);
        let second = ofs_delta_entry(first.len() as u8, &[5, 3, 0x90, 0x03]);
        let second_offset = 12 + (base.len() + first.len()) as u64;
        let second_len = second.len();
        let data = pack_with(2, &[base, first, second]);

        let pack = PackFile::parse(&data, 8).unwrap();
        assert_eq!(pack.object_at(second_offset, second_len, 0).unwrap(), b"HEL");

        let shallow = PackFile::parse(&data, 1).unwrap();
        assert!(matches!(
            shallow.object_at(second_offset, second_len, 0),
            Err(GitError::DeltaChainTooDeep { max: 1 })
        ));
    }

    #[test]
    fn reserved_and_ref_delta_types() {
        for (type_code, reserved) in [(0u8, true), (5, true), (7, false)] {
            let mut entry = entry_header(type_code, 1);
            entry.extend(deflate(b"x"));
            let len = entry.len();
            let data = pack_with(2, &[entry]);
            let pack = PackFile::parse(&data, 8).unwrap();
            let err = pack.object_at(12, len, 0).unwrap_err();
            if reserved {
                assert!(matches!(err, GitError::ReservedObjectType(t) if t == type_code));
            } else {
                assert!(matches!(err, GitError::UnsupportedDeltaEncoding));
            }
        }
    }

    #[test]
    fn declared_size_is_checked() {
        let mut entry = entry_header(3, 4);
        entry.extend(deflate(b"abc"));
        let len = entry.len();
        let data = pack_with(2, &[entry]);
        let pack = PackFile::parse(&data, 8).unwrap();
        assert!(matches!(
            pack.object_at(12, len, 0),
            Err(GitError::InflatedSizeMismatch { expected: 4, actual: 3 })
        ));
    }

    #[test]
    fn oversized_entries_stop_at_the_declared_size() {
        let mut entry = entry_header(3, 4);
        entry.extend(deflate(&[b'a'; 1 << 20]));
        let len = entry.len();
        let data = pack_with(2, &[entry]);
        let pack = PackFile::parse(&data, 8).unwrap();
        assert!(matches!(
            pack.object_at(12, len, 0),
            Err(GitError::InflatedSizeMismatch { expected: 4, actual: 5 })
        ));
    }

    #[test]
    fn delta_data_size_is_checked() {
        let base = blob_entry(b"HELLOWORLD");
        let distance = base.len() as u8;
        let mut delta = entry_header(6, 3);
        delta.push(distance);
        delta.extend(deflate(&[10, 5, 0x90, 0x05]));
        let delta_len = delta.len();
        let data = pack_with(2, &[base, delta]);
        let pack = PackFile::parse(&data, 8).unwrap();
        assert!(matches!(
            pack.object_at(12 + u64::from(distance), delta_len, 0),
            Err(GitError::InflatedSizeMismatch { expected: 3, actual: 4 })
        ));
    }

    #[test]
    fn entry_must_fit_in_the_pack() {
        let data = pack_with(2, &[blob_entry(b"abc")]);
        let pack = PackFile::parse(&data, 8).unwrap();
        assert!(matches!(pack.object_at(12, data.len(), 0), Err(GitError::InvalidOffset { .. })));
        assert!(matches!(
            pack.object_at(data.len() as u64, 1, 0),
            Err(GitError::InvalidOffset { .. })
        ));
    }

    #[test]
    fn delta_base_before_the_pack_start() {
        let delta = ofs_delta_entry(100, &[1, 1, 0x01, b'a']);
        let len = delta.len();
        let data = pack_with(2, &[delta]);
        let pack = PackFile::parse(&data, 8).unwrap();
        assert!(matches!(pack.object_at(12, len, 0), Err(GitError::InvalidOffset { .. })));
    }

    #[test]
    fn v4_hash_table_lookup() {
        let id = ObjectId::from_bytes([0x42; 20]);
        let mut data = b"PACK".to_vec();
        data.extend_from_slice(&4u32.to_be_bytes());
        data.extend_from_slice(&2u32.to_be_bytes());
        data.extend_from_slice(&[0x11; 20]);
        data.extend_from_slice(id.as_bytes());
        let pack = PackFile::parse(&data, 8).unwrap();
        assert_eq!(pack.v4_position(&id), Some(1));
        assert_eq!(pack.v4_position(&ObjectId::from_bytes([0x43; 20])), None);
    }
}
