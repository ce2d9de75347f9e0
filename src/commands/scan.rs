use anyhow::{Context, Result};
use reqwest::Url;

use git_disclosure::{Fetch, Finding, ScanConfig, ScanTarget, SourceDisclosureScanner};

pub(crate) fn invoke(url: &str, config: ScanConfig) -> Result<()> {
    let url = Url::parse(url).with_context(|| format!("'{url}' is not a valid URL"))?;
    let client = super::http_client(&config)?;

    let response = client.fetch(&url)?;
    let target = ScanTarget {
        url,
        status: response.status,
        body: response.body,
    };

    let mut findings: Vec<Finding> = Vec::new();
    let mut scanner = SourceDisclosureScanner::new(&client, config);
    if !scanner.scan(&target, &mut findings) {
        println!("no source code disclosure found for {}", target.url);
        return Ok(());
    }
    for finding in &findings {
        println!("{finding}");
        println!();
        println!("{}", finding.other_info);
    }
    Ok(())
}
