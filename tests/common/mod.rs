#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashMap;
use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;
use reqwest::Url;

use git_disclosure::{Fetch, HttpResponse, ObjectId, Result};

pub const PACK_NAME: &str = "pack-0123456789abcdef0123456789abcdef01234567.pack";
pub const INDEX_NAME: &str = "pack-0123456789abcdef0123456789abcdef01234567.idx";

/// An in-memory web server that remembers every URL asked for.
#[derive(Default)]
pub struct MockServer {
    pages: HashMap<String, HttpResponse>,
    requests: RefCell<Vec<String>>,
}

impl MockServer {
    pub fn new() -> Self {
        MockServer::default()
    }

    pub fn serve(&mut self, url: &str, body: impl Into<Vec<u8>>) -> &mut Self {
        self.pages.insert(url.to_string(), HttpResponse::ok(body.into()));
        self
    }

    pub fn respond(&mut self, url: &str, status: u16) -> &mut Self {
        self.pages.insert(url.to_string(), HttpResponse::status(status));
        self
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.borrow().clone()
    }

    pub fn requests_for(&self, url: &str) -> usize {
        self.requests.borrow().iter().filter(|r| *r == url).count()
    }
}

impl Fetch for MockServer {
    fn fetch(&self, url: &Url) -> Result<HttpResponse> {
        self.requests.borrow_mut().push(url.to_string());
        Ok(self
            .pages
            .get(url.as_str())
            .cloned()
            .unwrap_or_else(|| HttpResponse::status(404)))
    }
}

pub fn url(s: &str) -> Url {
    Url::parse(s).unwrap()
}

pub fn deflate(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// A deflated loose object file.
pub fn loose(kind: &str, data: &[u8]) -> Vec<u8> {
    let mut raw = format!("{kind} {}\0", data.len()).into_bytes();
    raw.extend_from_slice(data);
    deflate(&raw)
}

pub fn loose_url(git_dir: &str, id: &ObjectId) -> String {
    format!("{git_dir}objects/{}", id.loose_path())
}

fn write_size(out: &mut Vec<u8>, mut size: usize) {
    loop {
        let byte = (size & 0x7f) as u8;
        size >>= 7;
        if size == 0 {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

/// Delta data: the two sizes followed by raw instructions.
pub fn delta(base_len: usize, result_len: usize, instructions: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    write_size(&mut out, base_len);
    write_size(&mut out, result_len);
    out.extend_from_slice(instructions);
    out
}

fn entry_header(type_code: u8, mut size: usize) -> Vec<u8> {
    let mut out = vec![(type_code << 4) | (size & 0x0f) as u8];
    size >>= 4;
    while size > 0 {
        *out.last_mut().unwrap() |= 0x80;
        out.push((size & 0x7f) as u8);
        size >>= 7;
    }
    out
}

fn encode_offset(mut distance: u64) -> Vec<u8> {
    let mut out = vec![(distance & 0x7f) as u8];
    distance >>= 7;
    while distance > 0 {
        distance -= 1;
        out.push(0x80 | (distance & 0x7f) as u8);
        distance >>= 7;
    }
    out.reverse();
    out
}

/// Builds pack files entry by entry, remembering where each object landed.
///
/// Version 4 packs carry a hash table between the header and the first entry, so their
/// entries are placed once the final count is known.
pub struct PackBuilder {
    version: u32,
    body: Vec<u8>,
    entries: Vec<(ObjectId, u32)>,
}

impl PackBuilder {
    pub fn new(version: u32) -> Self {
        PackBuilder {
            version,
            body: Vec::new(),
            entries: Vec::new(),
        }
    }

    fn next_offset(&self) -> u32 {
        (12 + self.body.len()) as u32
    }

    /// Adds a whole object of `type_code` (1 to 4); returns its offset. For version 4 that
    /// offset is only good as a delta base, the hash table shifts it in the final pack.
    pub fn object(&mut self, type_code: u8, id: ObjectId, data: &[u8]) -> u32 {
        let offset = self.next_offset();
        self.body.extend(entry_header(type_code, data.len()));
        self.body.extend(deflate(data));
        self.entries.push((id, offset));
        offset
    }

    pub fn blob(&mut self, data: &[u8]) -> (ObjectId, u32) {
        let id = ObjectId::for_blob(data);
        (id, self.object(3, id, data))
    }

    /// Adds an offset delta against the entry at `base_offset`, with `result` being what it
    /// rebuilds to.
    pub fn ofs_delta(&mut self, base_offset: u32, delta: &[u8], result: &[u8]) -> (ObjectId, u32) {
        let id = ObjectId::for_blob(result);
        let offset = self.next_offset();
        self.body.extend(entry_header(6, delta.len()));
        self.body.extend(encode_offset(u64::from(offset - base_offset)));
        self.body.extend(deflate(delta));
        self.entries.push((id, offset));
        (id, offset)
    }

    pub fn ref_delta(&mut self, base: ObjectId, delta: &[u8], result: &[u8]) -> (ObjectId, u32) {
        let id = ObjectId::for_blob(result);
        let offset = self.next_offset();
        self.body.extend(entry_header(7, delta.len()));
        self.body.extend_from_slice(base.as_bytes());
        self.body.extend(deflate(delta));
        self.entries.push((id, offset));
        (id, offset)
    }

    fn hash_table_len(&self) -> u32 {
        if self.version == 4 {
            (self.entries.len() * 20) as u32
        } else {
            0
        }
    }

    pub fn pack(&self) -> Vec<u8> {
        let mut out = b"PACK".to_vec();
        out.extend_from_slice(&self.version.to_be_bytes());
        out.extend_from_slice(&(self.entries.len() as u32).to_be_bytes());
        if self.version == 4 {
            for (id, _) in self.sorted() {
                out.extend_from_slice(id.as_bytes());
            }
        }
        out.extend_from_slice(&self.body);
        out.extend_from_slice(&[0u8; 20]);
        out
    }

    /// Entries in hash order, at their final offsets.
    fn sorted(&self) -> Vec<(ObjectId, u32)> {
        let shift = self.hash_table_len();
        let mut sorted: Vec<_> = self
            .entries
            .iter()
            .map(|&(id, offset)| (id, offset + shift))
            .collect();
        sorted.sort();
        sorted
    }

    fn fanout(sorted: &[(ObjectId, u32)]) -> Vec<u8> {
        let mut out = Vec::with_capacity(1024);
        for b in 0..=255u8 {
            let count = sorted.iter().filter(|(id, _)| id.first_byte() <= b).count() as u32;
            out.extend_from_slice(&count.to_be_bytes());
        }
        out
    }

    pub fn index_v1(&self) -> Vec<u8> {
        let sorted = self.sorted();
        let mut out = Self::fanout(&sorted);
        for (id, offset) in &sorted {
            out.extend_from_slice(&offset.to_be_bytes());
            out.extend_from_slice(id.as_bytes());
        }
        out.extend_from_slice(&[0u8; 40]);
        out
    }

    pub fn index_v2(&self) -> Vec<u8> {
        self.signed_index(2)
    }

    /// Hash-less index for version 4 packs.
    pub fn index_v3(&self) -> Vec<u8> {
        self.signed_index(3)
    }

    fn signed_index(&self, version: u32) -> Vec<u8> {
        let sorted = self.sorted();
        let mut out = b"\xfftOc".to_vec();
        out.extend_from_slice(&version.to_be_bytes());
        out.extend(Self::fanout(&sorted));
        if version < 3 {
            for (id, _) in &sorted {
                out.extend_from_slice(id.as_bytes());
            }
        }
        out.extend(std::iter::repeat(0u8).take(sorted.len() * 4));
        for (_, offset) in &sorted {
            out.extend_from_slice(&offset.to_be_bytes());
        }
        out.extend_from_slice(&[0u8; 40]);
        out
    }
}

pub fn pack_info() -> Vec<u8> {
    format!("P {PACK_NAME}\n\n").into_bytes()
}

/// Serves `builder` as the only pack of the `.git/` folder at `git_dir`.
pub fn serve_pack(server: &mut MockServer, git_dir: &str, pack: Vec<u8>, index: Vec<u8>) {
    server
        .serve(&format!("{git_dir}objects/info/packs"), pack_info())
        .serve(&format!("{git_dir}objects/pack/{PACK_NAME}"), pack)
        .serve(&format!("{git_dir}objects/pack/{INDEX_NAME}"), index);
}

/// A version 2 working tree index.
pub fn work_tree_index(entries: &[(&str, ObjectId)]) -> Vec<u8> {
    let mut out = b"DIRC".to_vec();
    out.extend_from_slice(&2u32.to_be_bytes());
    out.extend_from_slice(&(entries.len() as u32).to_be_bytes());
    for (name, id) in entries {
        let start = out.len();
        out.extend_from_slice(&[0u8; 40]);
        out.extend_from_slice(id.as_bytes());
        out.extend_from_slice(&(name.len() as u16).to_be_bytes());
        out.extend_from_slice(name.as_bytes());
        out.push(0);
        while (out.len() - start) % 8 != 0 {
            out.push(0);
        }
    }
    out
}
