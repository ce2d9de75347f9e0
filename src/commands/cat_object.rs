use std::io::Write;

use anyhow::{Context, Result};
use reqwest::Url;

use git_disclosure::{ObjectId, Resolver, ScanConfig};

pub(crate) fn invoke(git_url: &str, hash: &str, uris: bool, config: &ScanConfig) -> Result<()> {
    let mut git_dir = Url::parse(git_url).with_context(|| format!("'{git_url}' is not a valid URL"))?;
    if !git_dir.path().ends_with('/') {
        let path = format!("{}/", git_dir.path());
        git_dir.set_path(&path);
    }
    let id = ObjectId::from_hex(hash)?;

    let client = super::http_client(config)?;
    let mut resolver = Resolver::new(&client, config);
    let content = resolver
        .resolve(&git_dir, &id)
        .with_context(|| format!("could not recover {id} from {git_dir}"))?;

    if uris {
        eprintln!("{}", resolver.fetched_uris());
    }
    std::io::stdout().write_all(&content)?;
    Ok(())
}
