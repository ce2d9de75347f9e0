use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use sha1::{Digest, Sha1};

use crate::error::{GitError, Result};

static BASE_FOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.*/\.git/)[^/]*$").expect("static regex"));

/// A 20-byte SHA-1 object name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectId([u8; 20]);

impl ObjectId {
    pub const LEN: usize = 20;

    pub fn from_bytes(bytes: [u8; 20]) -> Self {
        ObjectId(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        bytes.try_into().ok().map(ObjectId)
    }

    /// Parses 40 lowercase hex characters. Anything else is rejected, uppercase included.
    pub fn from_hex(hash: &str) -> Result<Self> {
        if !is_valid_hex(hash) {
            return Err(GitError::InvalidHash(hash.to_string()));
        }
        let mut bytes = [0u8; 20];
        hex::decode_to_slice(hash, &mut bytes).map_err(|_| GitError::InvalidHash(hash.to_string()))?;
        Ok(ObjectId(bytes))
    }

    /// The name Git would give `data` stored as a blob.
    pub fn for_blob(data: &[u8]) -> Self {
        let mut hasher = Sha1::new();
        hasher.update(format!("blob {}\0", data.len()));
        hasher.update(data);
        ObjectId(hasher.finalize().into())
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    pub fn first_byte(&self) -> u8 {
        self.0[0]
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// `objects/`-relative path of the loose object: `ab/cdef...`.
    pub fn loose_path(&self) -> String {
        let hex = self.to_hex();
        format!("{}/{}", &hex[..2], &hex[2..])
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

pub fn is_valid_hex(hash: &str) -> bool {
    hash.len() == 40 && hash.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

/// The `.git/` folder owning `git_file`, e.g. `/app/.git/index` gives `/app/.git/`.
pub fn base_folder(git_file: &str) -> Option<&str> {
    BASE_FOLDER
        .captures(git_file)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_validation() {
        assert!(is_valid_hex(&"0".repeat(40)));
        assert!(is_valid_hex("49a7eca74dfebcaba00ea5eee60dcff7918f930c"));
        assert!(!is_valid_hex("49A7ECA74DFEBCABA00EA5EEE60DCFF7918F930C"));
        assert!(!is_valid_hex("49a7eca74dfebcaba00ea5eee60dcff7918f930"));
        assert!(!is_valid_hex("49a7eca74dfebcaba00ea5eee60dcff7918f930c0"));
        assert!(!is_valid_hex("g9a7eca74dfebcaba00ea5eee60dcff7918f930c"));
        assert!(!is_valid_hex(""));
    }

    #[test]
    fn from_hex_rejects_rather_than_truncates() {
        assert!(ObjectId::from_hex("49a7eca74dfebcaba00ea5eee60dcff7918f930c00").is_err());
        let id = ObjectId::from_hex("49a7eca74dfebcaba00ea5eee60dcff7918f930c").unwrap();
        assert_eq!(id.first_byte(), 0x49);
        assert_eq!(id.loose_path(), "49/a7eca74dfebcaba00ea5eee60dcff7918f930c");
        assert_eq!(id.to_string(), "49a7eca74dfebcaba00ea5eee60dcff7918f930c");
    }

    #[test]
    fn blob_hash_matches_git() {
        // `printf 'hello\n' | git hash-object --stdin`
        assert_eq!(
            ObjectId::for_blob(b"hello\n").to_hex(),
            "ce013625030ba8dba906f756967f9e9ca394464a"
        );
        // the empty blob
        assert_eq!(
            ObjectId::for_blob(b"").to_hex(),
            "e69de29bb2d1d6434b8b29ae775ad8c2e48c5391"
        );
    }

    #[test]
    fn base_folder_of_git_files() {
        assert_eq!(base_folder("/app/.git/index"), Some("/app/.git/"));
        assert_eq!(base_folder("/.git/index"), Some("/.git/"));
        assert_eq!(base_folder("/a/b/.git/HEAD"), Some("/a/b/.git/"));
        assert_eq!(base_folder("/app/.git/objects/info/packs"), None);
        assert_eq!(base_folder("/app/index"), None);
        assert_eq!(base_folder(".git/index"), None);
    }
}
