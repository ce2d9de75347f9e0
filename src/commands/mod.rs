pub(crate) mod cat_object;
pub(crate) mod ls_index;
pub(crate) mod scan;

use anyhow::{Context, Result};
use git_disclosure::{HttpFetcher, ScanConfig};

pub(crate) fn http_client(config: &ScanConfig) -> Result<HttpFetcher> {
    HttpFetcher::new(&config.user_agent, config.timeout).context("could not build the HTTP client")
}
