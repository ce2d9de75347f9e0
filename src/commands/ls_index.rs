use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use reqwest::Url;

use git_disclosure::{parse_index, Fetch, ScanConfig};

pub(crate) fn invoke(source: &str, config: &ScanConfig) -> Result<()> {
    let data = read_source(source, config)?;
    print!("{}", list(&data)?);
    Ok(())
}

/// Index bytes from an http(s) URL or a local file.
fn read_source(source: &str, config: &ScanConfig) -> Result<Vec<u8>> {
    match Url::parse(source) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {
            let response = super::http_client(config)?.fetch(&url)?;
            if response.status != 200 {
                bail!("{url} answered {}", response.status);
            }
            Ok(response.body.to_vec())
        }
        _ => fs::read(Path::new(source)).with_context(|| format!("could not read {source}")),
    }
}

/// One `<hash> <path>` line per entry, sorted by path.
fn list(data: &[u8]) -> Result<String> {
    let entries = parse_index(data).context("not a usable index file")?;
    Ok(entries
        .iter()
        .map(|(path, id)| format!("{id} {path}\n"))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn entry(out: &mut Vec<u8>, id: u8, name: &str) {
        let start = out.len();
        out.extend_from_slice(&[0u8; 40]);
        out.extend_from_slice(&[id; 20]);
        out.extend_from_slice(&(name.len() as u16).to_be_bytes());
        out.extend_from_slice(name.as_bytes());
        out.push(0);
        while (out.len() - start) % 8 != 0 {
            out.push(0);
        }
    }

    #[test]
    fn lists_a_local_index() {
        let mut data = b"DIRC\0\0\0\x02\0\0\0\x02".to_vec();
        entry(&mut data, 0xbb, "b.php");
        entry(&mut data, 0xaa, "a.php");

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&data).unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let read = read_source(&path, &ScanConfig::default()).unwrap();
        let listing = list(&read).unwrap();
        assert_eq!(
            listing,
            format!("{} a.php\n{} b.php\n", "aa".repeat(20), "bb".repeat(20))
        );
    }

    #[test]
    fn missing_file() {
        assert!(read_source("/nonexistent/dir/index", &ScanConfig::default()).is_err());
    }

    #[test]
    fn garbage_is_not_an_index() {
        assert!(list(b"not an index at all").is_err());
    }
}
