//! Recovers source code from web servers that expose their `.git/` folder.
//!
//! The pieces, from the bottom up: loose objects and pack files are fetched through a
//! request-capped [`fetch::ObjectFetcher`], packs are located through their index and
//! delta chains are replayed, and [`resolver::Resolver`] ties it together for one object id.
//! [`scan::SourceDisclosureScanner`] uses the working tree index to decide which object to
//! ask for.

pub mod config;
pub mod error;
pub mod fetch;
pub mod hash;
pub mod index;
pub mod inflate;
pub mod objects;
pub mod pack;
pub mod resolver;
pub mod scan;
pub mod varint;
mod wire;

pub use config::{AttackStrength, ScanConfig};
pub use error::{GitError, Result};
pub use fetch::{Fetch, HttpFetcher, HttpResponse, ObjectFetcher};
pub use hash::ObjectId;
pub use index::parse_index;
pub use resolver::{git_dir_url, Resolver};
pub use scan::{AlertSink, Finding, ScanTarget, SourceDisclosureScanner};
