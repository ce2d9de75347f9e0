//! Source code disclosure through an exposed `.git/` folder.
//!
//! For a page such as `/app/admin/login.php`, the scanner looks for a working tree index at
//! `/app/admin/.git/index`, `/app/.git/index` and `/.git/index`. Once an index lists the
//! page, the blob it names is recovered from the same `.git/` folder and, if it differs from
//! what the server rendered and looks like source for that file type, a finding is raised.

use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

use bytes::Bytes;
use regex::Regex;
use reqwest::Url;
use tracing::{debug, info, warn};

use crate::config::{AttackStrength, ScanConfig};
use crate::error::{GitError, Result};
use crate::fetch::Fetch;
use crate::hash::{base_folder, ObjectId};
use crate::index::parse_index;
use crate::resolver::{git_dir_url, Resolver};

pub const CWE_ID: u32 = 541;
pub const WASC_ID: u32 = 34;

static JSP: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<%.*%>").expect("static regex"));
static PHP: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<\?php").expect("static regex"));
static JAVA: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"class").expect("static regex"));
static HTML: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<html").expect("static regex"));

/// Risk on the alert sink's full scale. Git disclosures are always [`Risk::High`]; the other
/// levels exist so sinks shared with other rules can use the same type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Risk {
    Informational,
    Low,
    Medium,
    High,
}

impl fmt::Display for Risk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Risk::Informational => write!(f, "Informational"),
            Risk::Low => write!(f, "Low"),
            Risk::Medium => write!(f, "Medium"),
            Risk::High => write!(f, "High"),
        }
    }
}

/// Confidence on the alert sink's full scale. Git disclosures are reported at
/// [`Confidence::Medium`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Confidence::Low => write!(f, "Low"),
            Confidence::Medium => write!(f, "Medium"),
            Confidence::High => write!(f, "High"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    pub risk: Risk,
    pub confidence: Confidence,
    pub cwe_id: u32,
    pub wasc_id: u32,
    /// The page whose source leaked.
    pub uri: Url,
    /// The `.git/` folder it leaked from.
    pub attack: Url,
    pub evidence: String,
    /// The recovered source.
    pub other_info: String,
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Source Code Disclosure - Git")?;
        writeln!(f, "  risk:       {}", self.risk)?;
        writeln!(f, "  confidence: {}", self.confidence)?;
        writeln!(f, "  cwe/wasc:   {}/{}", self.cwe_id, self.wasc_id)?;
        writeln!(f, "  uri:        {}", self.uri)?;
        writeln!(f, "  attack:     {}", self.attack)?;
        write!(f, "  evidence:   {}", self.evidence)
    }
}

/// Where findings go.
pub trait AlertSink {
    fn raise(&mut self, finding: Finding);
}

impl AlertSink for Vec<Finding> {
    fn raise(&mut self, finding: Finding) {
        self.push(finding);
    }
}

/// A page that has already been requested, with what the server sent back.
#[derive(Debug, Clone)]
pub struct ScanTarget {
    pub url: Url,
    pub status: u16,
    pub body: Bytes,
}

/// Parsed indexes by index URL. Each maps the page URL of every entry to its blob id.
///
/// An index that could not be fetched or parsed is remembered as empty so it is asked for
/// once per scanner.
#[derive(Debug, Default)]
pub struct IndexEntryCache {
    indexes: HashMap<Url, HashMap<Url, ObjectId>>,
}

impl IndexEntryCache {
    pub fn entries(&mut self, client: &dyn Fetch, index_url: &Url) -> &HashMap<Url, ObjectId> {
        self.indexes.entry(index_url.clone()).or_insert_with(|| {
            load_index(client, index_url).unwrap_or_else(|e| {
                debug!(%index_url, "no usable index: {e}");
                HashMap::new()
            })
        })
    }

    pub fn len(&self) -> usize {
        self.indexes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indexes.is_empty()
    }
}

fn load_index(client: &dyn Fetch, index_url: &Url) -> Result<HashMap<Url, ObjectId>> {
    let response = client.fetch(index_url)?;
    if response.status != 200 {
        return Err(GitError::NotFound(index_url.to_string()));
    }
    let entries = parse_index(&response.body)?;

    let git_dir = base_folder(index_url.path())
        .ok_or_else(|| GitError::InvalidUrl(index_url.to_string()))?;
    let work_tree = &git_dir[..git_dir.len() - ".git/".len()];

    let mut pages = HashMap::with_capacity(entries.len());
    for (path, id) in entries {
        let mut page = index_url.clone();
        page.set_path(&format!("{work_tree}{path}"));
        pages.insert(page, id);
    }
    debug!(%index_url, entries = pages.len(), "index parsed");
    Ok(pages)
}

pub struct SourceDisclosureScanner<'a> {
    client: &'a dyn Fetch,
    config: ScanConfig,
    cache: IndexEntryCache,
}

impl<'a> SourceDisclosureScanner<'a> {
    pub fn new(client: &'a dyn Fetch, config: ScanConfig) -> Self {
        SourceDisclosureScanner {
            client,
            config,
            cache: IndexEntryCache::default(),
        }
    }

    pub fn cache(&self) -> &IndexEntryCache {
        &self.cache
    }

    /// Checks one page, raising at most one finding. Returns whether it did.
    pub fn scan(&mut self, target: &ScanTarget, sink: &mut dyn AlertSink) -> bool {
        if target.status == 404
            && matches!(
                self.config.attack_strength,
                AttackStrength::Low | AttackStrength::Medium
            )
        {
            debug!(url = %target.url, "skipping, the page itself is not found");
            return false;
        }
        let Some(file_name) = file_name(&target.url) else {
            debug!(url = %target.url, "skipping, no file name");
            return false;
        };

        let mut page = target.url.clone();
        page.set_query(None);
        page.set_fragment(None);

        let Some((index_url, id)) = self.find_in_indexes(&page) else {
            debug!(%page, "not listed in any reachable index");
            return false;
        };
        let Some(git_dir) = base_folder(index_url.path()) else {
            return false;
        };
        let git_dir = match git_dir_url(&index_url, git_dir) {
            Ok(url) => url,
            Err(e) => {
                debug!(%index_url, "{e}");
                return false;
            }
        };

        let mut resolver = Resolver::new(self.client, &self.config);
        let source = match resolver.resolve(&git_dir, &id) {
            Ok(source) => source,
            Err(_) => return false,
        };

        let actual = ObjectId::for_blob(&source);
        if actual != id {
            warn!(%page, expected = %id, %actual, "recovered content does not match its index entry");
        }
        if source == target.body {
            debug!(%page, "recovered content is what the server serves, not a disclosure");
            return false;
        }
        let text = String::from_utf8_lossy(&source);
        if !looks_like_source(&file_name, &text) {
            debug!(%page, "recovered content does not look like source for its type");
            return false;
        }

        let finding = Finding {
            risk: Risk::High,
            confidence: Confidence::Medium,
            cwe_id: CWE_ID,
            wasc_id: WASC_ID,
            uri: target.url.clone(),
            attack: git_dir,
            evidence: format!(
                "The source code for '{file_name}' was disclosed using Git metadata from {}",
                resolver.fetched_uris()
            ),
            other_info: text.into_owned(),
        };
        info!(uri = %finding.uri, "source code disclosed through Git metadata");
        sink.raise(finding);
        true
    }

    /// Walks from the page's directory to the root, returning the first index listing `page`.
    fn find_in_indexes(&mut self, page: &Url) -> Option<(Url, ObjectId)> {
        let path = page.path();
        let mut dir = &path[..path.rfind('/')? + 1];
        loop {
            let mut index_url = page.clone();
            index_url.set_path(&format!("{dir}.git/index"));
            debug!(%index_url, "looking for an index");

            if let Some(id) = self.cache.entries(self.client, &index_url).get(page) {
                debug!(%index_url, %id, "page is listed");
                return Some((index_url, *id));
            }
            dir = parent_dir(dir)?;
        }
    }
}

/// `/a/b/` gives `/a/`; `/` has none.
fn parent_dir(dir: &str) -> Option<&str> {
    let trimmed = dir.strip_suffix('/')?;
    let slash = trimmed.rfind('/')?;
    Some(&dir[..slash + 1])
}

fn file_name(url: &Url) -> Option<String> {
    url.path_segments()?
        .next_back()
        .filter(|name| !name.is_empty())
        .map(str::to_string)
}

/// Whether `content` plausibly is the source of `file_name`. Unknown types always pass.
fn looks_like_source(file_name: &str, content: &str) -> bool {
    let extension = match file_name.rsplit_once('.') {
        Some((_, extension)) => extension.to_ascii_uppercase(),
        None => return true,
    };
    match extension.as_str() {
        "JSP" => JSP.is_match(content),
        "PHP" => PHP.is_match(content),
        "JAVA" => JAVA.is_match(content),
        "HTML" => HTML.is_match(content),
        _ => true,
    }
}
