//! Bounds-checked big-endian reads over byte slices.
//!
//! `bytes::Buf` panics on underflow; these check `remaining()` first and turn a short read into
//! [`GitError::Truncated`] naming the field being read.

use bytes::Buf;

use crate::error::{GitError, Result};
use crate::hash::ObjectId;

fn ensure(buf: &[u8], n: usize, what: &'static str) -> Result<()> {
    if buf.remaining() < n {
        return Err(GitError::Truncated(what));
    }
    Ok(())
}

/// Checks that `count` records of `record_len` bytes are still available, before anything is
/// sized from a count the data itself claims.
pub(crate) fn ensure_table(buf: &[u8], count: u32, record_len: usize, what: &'static str) -> Result<()> {
    let needed = (count as usize)
        .checked_mul(record_len)
        .ok_or(GitError::Truncated(what))?;
    ensure(buf, needed, what)
}

pub(crate) fn get_u8(buf: &mut &[u8], what: &'static str) -> Result<u8> {
    ensure(*buf, 1, what)?;
    Ok(buf.get_u8())
}

pub(crate) fn get_u16(buf: &mut &[u8], what: &'static str) -> Result<u16> {
    ensure(*buf, 2, what)?;
    Ok(buf.get_u16())
}

pub(crate) fn get_u32(buf: &mut &[u8], what: &'static str) -> Result<u32> {
    ensure(*buf, 4, what)?;
    Ok(buf.get_u32())
}

pub(crate) fn take<'a>(buf: &mut &'a [u8], n: usize, what: &'static str) -> Result<&'a [u8]> {
    ensure(*buf, n, what)?;
    let (head, tail) = (*buf).split_at(n);
    *buf = tail;
    Ok(head)
}

pub(crate) fn get_object_id(buf: &mut &[u8], what: &'static str) -> Result<ObjectId> {
    let raw = take(buf, ObjectId::LEN, what)?;
    ObjectId::from_slice(raw).ok_or(GitError::Truncated(what))
}

pub(crate) fn get_fanout(buf: &mut &[u8]) -> Result<[u32; 256]> {
    let mut fanout = [0u32; 256];
    for slot in fanout.iter_mut() {
        *slot = get_u32(buf, "fan-out table")?;
    }
    Ok(fanout)
}
