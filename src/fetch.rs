//! Fetching Git metadata from the target server.
//!
//! [`Fetch`] is the seam to the network: anything that maps a URL to a status and a body.
//! [`ObjectFetcher`] sits on top of it for one resolution attempt, capping the number of
//! requests and remembering which URLs answered 200 so they can be quoted as evidence.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use bytes::Bytes;
use reqwest::blocking::Client;
use reqwest::redirect::Policy;
use reqwest::Url;
use tracing::debug;

use crate::error::{GitError, Result};
use crate::inflate::inflate;

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn ok(body: impl Into<Bytes>) -> Self {
        HttpResponse {
            status: 200,
            body: body.into(),
        }
    }

    pub fn status(status: u16) -> Self {
        HttpResponse {
            status,
            body: Bytes::new(),
        }
    }
}

pub trait Fetch {
    fn fetch(&self, url: &Url) -> Result<HttpResponse>;
}

impl<F: Fetch + ?Sized> Fetch for &F {
    fn fetch(&self, url: &Url) -> Result<HttpResponse> {
        (**self).fetch(url)
    }
}

/// Blocking HTTP client that never follows redirects and caches responses by URL.
pub struct HttpFetcher {
    client: Client,
    cache: Mutex<HashMap<Url, HttpResponse>>,
}

impl HttpFetcher {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .redirect(Policy::none())
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;
        Ok(HttpFetcher {
            client,
            cache: Mutex::new(HashMap::new()),
        })
    }
}

impl Fetch for HttpFetcher {
    fn fetch(&self, url: &Url) -> Result<HttpResponse> {
        if let Some(cached) = self.cache.lock().unwrap_or_else(|e| e.into_inner()).get(url) {
            debug!(%url, "response served from cache");
            return Ok(cached.clone());
        }

        let transport = |source| GitError::Transport {
            url: url.to_string(),
            source,
        };
        let response = self.client.get(url.clone()).send().map_err(transport)?;
        let status = response.status().as_u16();
        let body = response.bytes().map_err(transport)?;
        let response = HttpResponse { status, body };

        self.cache
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(url.clone(), response.clone());
        Ok(response)
    }
}

/// Request governor and evidence recorder for a single resolution attempt.
pub struct ObjectFetcher<'a> {
    client: &'a dyn Fetch,
    inflate_buffer_size: usize,
    max_requests: usize,
    requests: usize,
    fetched: Vec<Url>,
}

impl<'a> ObjectFetcher<'a> {
    pub fn new(client: &'a dyn Fetch, inflate_buffer_size: usize, max_requests: usize) -> Self {
        ObjectFetcher {
            client,
            inflate_buffer_size,
            max_requests,
            requests: 0,
            fetched: Vec::new(),
        }
    }

    /// Fetches `url`, inflating the body when asked. Non-200 answers are [`GitError::NotFound`].
    pub fn fetch(&mut self, url: &Url, inflate_body: bool) -> Result<Vec<u8>> {
        debug!(%url, "requesting");
        self.requests += 1;
        if self.requests > self.max_requests {
            return Err(GitError::TooManyRequests {
                count: self.requests,
            });
        }

        let response = self.client.fetch(url)?;
        if response.status != 200 {
            return Err(GitError::NotFound(url.to_string()));
        }
        self.fetched.push(url.clone());

        if inflate_body {
            inflate(&response.body, self.inflate_buffer_size)
        } else {
            Ok(response.body.to_vec())
        }
    }

    /// Starts a fresh budget, forgetting the URLs recorded so far.
    pub fn reset(&mut self) {
        self.requests = 0;
        self.fetched.clear();
    }

    pub fn requests(&self) -> usize {
        self.requests
    }

    pub fn fetched(&self) -> &[Url] {
        &self.fetched
    }

    /// The fetched URLs, comma separated, for alert evidence.
    pub fn fetched_uris(&self) -> String {
        self.fetched
            .iter()
            .map(Url::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }
}
