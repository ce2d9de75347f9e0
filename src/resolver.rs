use reqwest::Url;
use tracing::{debug, error};

use crate::config::ScanConfig;
use crate::error::{GitError, Result};
use crate::fetch::{Fetch, ObjectFetcher};
use crate::hash::ObjectId;
use crate::objects::{join, read_loose};
use crate::pack::{index_name, parse_pack_info, PackFile, PackIndex};

/// The `.git/` directory URL for `base_path` (e.g. `/app/.git/`) on the host of `origin`.
pub fn git_dir_url(origin: &Url, base_path: &str) -> Result<Url> {
    let mut url = origin.clone();
    url.set_path(base_path);
    url.set_query(None);
    url.set_fragment(None);
    if !url.path().ends_with('/') {
        return Err(GitError::InvalidUrl(format!(
            "'{base_path}' is not a .git/ directory path"
        )));
    }
    Ok(url)
}

/// Recovers object contents from a remote `.git/` directory, loose objects first.
pub struct Resolver<'a> {
    fetcher: ObjectFetcher<'a>,
    max_delta_depth: usize,
}

impl<'a> Resolver<'a> {
    pub fn new(client: &'a dyn Fetch, config: &ScanConfig) -> Self {
        Resolver {
            fetcher: ObjectFetcher::new(client, config.inflate_buffer_size, config.max_requests),
            max_delta_depth: config.max_delta_depth,
        }
    }

    /// Returns the content of blob `id`. A missing loose object falls back to the pack; any
    /// other failure is final.
    pub fn resolve(&mut self, git_dir: &Url, id: &ObjectId) -> Result<Vec<u8>> {
        self.fetcher.reset();
        let resolved = match read_loose(&mut self.fetcher, git_dir, id) {
            Err(e) if e.is_not_found() => {
                debug!(%id, "no loose object, trying for a packed one instead");
                self.fetcher.reset();
                self.read_packed(git_dir, id)
            }
            other => other,
        };
        resolved.inspect_err(|e| {
            if e.is_not_found() {
                debug!(%id, "object is not exposed: {e}");
            } else {
                error!(%id, "could not recover object: {e}");
            }
        })
    }

    fn read_packed(&mut self, git_dir: &Url, id: &ObjectId) -> Result<Vec<u8>> {
        let info_url = join(git_dir, "objects/info/packs")?;
        let info = self.fetcher.fetch(&info_url, false)?;
        let pack_name = parse_pack_info(&info)?;

        let pack_url = join(git_dir, &format!("objects/pack/{pack_name}"))?;
        let index_url = join(git_dir, &format!("objects/pack/{}", index_name(&pack_name)))?;
        debug!(%pack_url, %index_url, "pack file location");

        let index_data = self.fetcher.fetch(&index_url, false)?;
        let pack_data = self.fetcher.fetch(&pack_url, false)?;

        let pack = PackFile::parse(&pack_data, self.max_delta_depth)?;
        let index = PackIndex::parse(&index_data, pack.header())?;
        pack.read_object(&index, id)
    }

    /// URLs that answered 200 during the last resolution, comma separated.
    pub fn fetched_uris(&self) -> String {
        self.fetcher.fetched_uris()
    }

    pub fn fetched(&self) -> &[Url] {
        self.fetcher.fetched()
    }
}
