//! Delta data: two little-endian sizes followed by insert and copy instructions.
//!
//! An instruction byte with the top bit clear inserts the next `byte` literal bytes. With the
//! top bit set, bits 0-3 say which of four little-endian offset bytes follow and the next bits
//! which length bytes follow (two for pack version 2, three otherwise); a copy takes
//! `[offset, offset + length)` from the base object. An absent length means 0x10000.

use crate::error::{GitError, Result};
use crate::varint::read_size;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeltaInstruction<'a> {
    Insert(&'a [u8]),
    Copy { offset: u64, length: u64 },
}

/// A parsed delta header with its instruction stream still to be decoded.
#[derive(Debug, Clone)]
pub struct Delta<'a> {
    pub base_len: u64,
    pub result_len: u64,
    pub instructions: Instructions<'a>,
}

impl<'a> Delta<'a> {
    pub fn parse(data: &'a [u8], pack_version: u32) -> Result<Self> {
        let (base_len, n) = read_size(data)?;
        let (result_len, m) = read_size(&data[n..])?;
        Ok(Delta {
            base_len,
            result_len,
            instructions: Instructions::new(&data[n + m..], pack_version),
        })
    }

    /// Rebuilds the target object from `base`.
    pub fn apply(self, base: &[u8]) -> Result<Vec<u8>> {
        if base.len() as u64 != self.base_len {
            return Err(GitError::DeltaBaseLengthMismatch {
                expected: self.base_len,
                actual: base.len(),
            });
        }

        let result_len = self.result_len;
        let mut result = Vec::new();
        for instruction in self.instructions {
            match instruction? {
                DeltaInstruction::Insert(data) => {
                    if data.len() as u64 > result_len {
                        return Err(GitError::CorruptDelta(format!(
                            "insert of {} bytes is bigger than the {result_len} byte result",
                            data.len()
                        )));
                    }
                    result.extend_from_slice(data);
                }
                DeltaInstruction::Copy { offset, length } => {
                    if length > result_len {
                        return Err(GitError::CorruptDelta(format!(
                            "copy of {length} bytes is bigger than the {result_len} byte result"
                        )));
                    }
                    let end = offset + length;
                    if end > base.len() as u64 {
                        return Err(GitError::CorruptDelta(format!(
                            "copy of [{offset}, {end}) is outside the {} byte base",
                            base.len()
                        )));
                    }
                    result.extend_from_slice(&base[offset as usize..end as usize]);
                }
            }
        }

        if result.len() as u64 != result_len {
            return Err(GitError::DeltaResultLengthMismatch {
                expected: result_len,
                actual: result.len(),
            });
        }
        Ok(result)
    }
}

/// Lazily decoded delta instructions. Decoding stops after the first error.
#[derive(Debug, Clone)]
pub struct Instructions<'a> {
    data: &'a [u8],
    pack_version: u32,
}

impl<'a> Instructions<'a> {
    pub fn new(data: &'a [u8], pack_version: u32) -> Self {
        Instructions { data, pack_version }
    }

    fn next_byte(&mut self) -> Result<u8> {
        let (&b, rest) = self
            .data
            .split_first()
            .ok_or_else(|| GitError::CorruptDelta("copy instruction is truncated".into()))?;
        self.data = rest;
        Ok(b)
    }

    /// Reads up to `count` little-endian bytes, one per set bit of `opcode`, lowest bit first.
    /// A clear bit leaves a zero byte in place.
    fn read_sparse(&mut self, opcode: &mut u8, count: usize) -> Result<u64> {
        let mut value = 0u64;
        for i in 0..count {
            if *opcode & 0x01 != 0 {
                value |= u64::from(self.next_byte()?) << (8 * i);
            }
            *opcode >>= 1;
        }
        Ok(value)
    }

    fn decode(&mut self, op: u8) -> Result<DeltaInstruction<'a>> {
        if op & 0x80 == 0 {
            let len = usize::from(op);
            if len == 0 {
                return Err(GitError::CorruptDelta("zero length insert".into()));
            }
            if len > self.data.len() {
                return Err(GitError::CorruptDelta(format!(
                    "insert requests {len} bytes, but only {} are available",
                    self.data.len()
                )));
            }
            let (literal, rest) = self.data.split_at(len);
            self.data = rest;
            return Ok(DeltaInstruction::Insert(literal));
        }

        let mut opcode = op & 0x7f;
        let offset = self.read_sparse(&mut opcode, 4)?;
        let length_bytes = if self.pack_version == 2 { 2 } else { 3 };
        let mut length = self.read_sparse(&mut opcode, length_bytes)?;
        if length == 0 {
            length = 0x10000;
        }
        if self.pack_version == 2 && opcode & 0x01 != 0 {
            return Err(GitError::UnsupportedCopyDirection);
        }
        Ok(DeltaInstruction::Copy { offset, length })
    }
}

impl<'a> Iterator for Instructions<'a> {
    type Item = Result<DeltaInstruction<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        let (&op, rest) = self.data.split_first()?;
        self.data = rest;
        let decoded = self.decode(op);
        if decoded.is_err() {
            self.data = &[];
        }
        Some(decoded)
    }
}
