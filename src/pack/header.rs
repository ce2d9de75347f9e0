use std::sync::LazyLock;

use regex::Regex;

use crate::error::{GitError, Result};
use crate::wire::{get_u32, take};

static PACK_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^pack-[0-9a-f]{40}\.pack$").expect("static regex"));

/// The fixed 12 bytes at the start of a pack file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackHeader {
    pub version: u32,
    pub entry_count: u32,
}

impl PackHeader {
    pub const LEN: usize = 12;

    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut buf = data;
        let signature = take(&mut buf, 4, "pack signature")?;
        if signature != b"PACK" {
            return Err(GitError::InvalidPackSignature);
        }
        let version = get_u32(&mut buf, "pack version")?;
        if !(2..=4).contains(&version) {
            return Err(GitError::UnsupportedPackVersion(version));
        }
        let entry_count = get_u32(&mut buf, "pack entry count")?;
        Ok(PackHeader {
            version,
            entry_count,
        })
    }
}

/// Extracts the pack file name from `objects/info/packs`.
///
/// The file reads `P <name>` followed by two bytes of line endings. Only the first pack named is
/// used.
pub fn parse_pack_info(data: &[u8]) -> Result<String> {
    if data.len() < 4 || !data.starts_with(b"P ") {
        return Err(GitError::InvalidPackInfo(format!(
            "expected 'P <pack name>', found '{}'",
            String::from_utf8_lossy(data).trim_end()
        )));
    }
    let name = String::from_utf8_lossy(&data[2..data.len() - 2]).into_owned();
    if !PACK_NAME.is_match(&name) {
        return Err(GitError::InvalidPackInfo(format!(
            "the pack file name '{name}' does not match the expected pattern"
        )));
    }
    Ok(name)
}

/// `pack-<hash>.pack` becomes `pack-<hash>.idx`.
pub fn index_name(pack_name: &str) -> String {
    let stem = pack_name.strip_suffix(".pack").unwrap_or(pack_name);
    format!("{stem}.idx")
}
