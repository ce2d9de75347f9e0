use std::fmt;

use reqwest::Url;
use tracing::debug;

use crate::error::{GitError, Result};
use crate::fetch::ObjectFetcher;
use crate::hash::ObjectId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Commit,
    Tree,
    Blob,
    Tag,
}

impl Kind {
    /// Non-delta object types as numbered in pack entry headers.
    pub fn from_pack_type(code: u8) -> Option<Kind> {
        match code {
            1 => Some(Kind::Commit),
            2 => Some(Kind::Tree),
            3 => Some(Kind::Blob),
            4 => Some(Kind::Tag),
            _ => None,
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Kind::Commit => write!(f, "commit"),
            Kind::Tree => write!(f, "tree"),
            Kind::Blob => write!(f, "blob"),
            Kind::Tag => write!(f, "tag"),
        }
    }
}

/// Fetches the loose object `id` below `git_dir` and returns its blob content.
pub fn read_loose(fetcher: &mut ObjectFetcher<'_>, git_dir: &Url, id: &ObjectId) -> Result<Vec<u8>> {
    let url = join(git_dir, &format!("objects/{}", id.loose_path()))?;
    debug!(%url, "loose object location");
    let data = fetcher.fetch(&url, true)?;
    parse_loose_blob(&data)
}

/// Splits an inflated `<type> <size>\0<data>` object, accepting blobs only.
///
/// Exactly `size` bytes are returned; anything after them is ignored.
pub fn parse_loose_blob(data: &[u8]) -> Result<Vec<u8>> {
    let space = data
        .iter()
        .position(|&b| b == b' ')
        .ok_or_else(|| GitError::MalformedObject("no space after the object type".into()))?;
    let kind = &data[..space];
    if kind != b"blob" {
        return Err(GitError::UnexpectedType {
            expected: Kind::Blob,
            found: String::from_utf8_lossy(kind).into_owned(),
        });
    }

    let rest = &data[space + 1..];
    let nul = rest
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(|| GitError::MalformedObject("no NUL after the object size".into()))?;
    let size = std::str::from_utf8(&rest[..nul])
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .ok_or_else(|| {
            GitError::MalformedObject(format!(
                "invalid size '{}'",
                String::from_utf8_lossy(&rest[..nul])
            ))
        })?;

    let body = &rest[nul + 1..];
    if body.len() < size {
        return Err(GitError::MalformedObject(format!(
            "header declares {size} bytes, but only {} follow",
            body.len()
        )));
    }
    Ok(body[..size].to_vec())
}

/// Resolves `path` against a `.git/` directory URL.
pub(crate) fn join(git_dir: &Url, path: &str) -> Result<Url> {
    git_dir
        .join(path)
        .map_err(|e| GitError::InvalidUrl(format!("{git_dir}{path}: {e}")))
}
