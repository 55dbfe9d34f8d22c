use reqwest::StatusCode;
use reqwest::blocking::{Client, Response};
use std::io::{self, Read};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

use super::ArchiveSource;
use crate::error::{Result, RipError};
use crate::metadata::ArchiveDescriptor;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Remote archives fetched as one streaming GET per archive from
/// `{base_url}/{remote_folder}/{archive_name}`.
///
/// The response body is handed to the decoder as it arrives, so an archive is
/// never stored locally and reading can stop as soon as the last target has
/// been found.
pub struct HttpArchiveSource {
    client: Client,
    base_url: String,
    token: String,
    transferred_bytes: Arc<AtomicU64>,
    max_retry: u32,
}

impl HttpArchiveSource {
    /// Create a source authenticating with a bearer token.
    ///
    /// A missing or blank token is rejected up front, since every request
    /// would fail with it.
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Result<Self> {
        let token = token
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| RipError::Unauthorized("no access token provided".to_string()))?;

        // No overall timeout: archive bodies can take hours to stream.
        let client = Client::builder()
            .user_agent(concat!("tarpick/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(Option::<Duration>::None)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
            transferred_bytes: Arc::new(AtomicU64::new(0)),
            max_retry: 10,
        })
    }

    /// Give up establishing a request after this many connection failures.
    pub fn with_max_retry(mut self, max_retry: u32) -> Self {
        self.max_retry = max_retry.max(1);
        self
    }

    pub fn url_for(&self, archive: &ArchiveDescriptor) -> String {
        format!("{}/{}", self.base_url, archive.relative_path())
    }

    /// Get total bytes transferred from network
    pub fn transferred_bytes(&self) -> u64 {
        self.transferred_bytes.load(Ordering::Relaxed)
    }

    fn send(&self, url: &str) -> Result<Response> {
        let mut retry_count = 0;
        loop {
            match self.client.get(url).bearer_auth(&self.token).send() {
                Ok(resp) => return Ok(resp),
                Err(e) if e.is_timeout() || e.is_connect() => {
                    retry_count += 1;
                    if retry_count >= self.max_retry {
                        return Err(e.into());
                    }
                    warn!(
                        "Connection error, retry {}/{}: {}",
                        retry_count, self.max_retry, e
                    );
                    std::thread::sleep(Duration::from_millis(500 * retry_count as u64));
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

impl ArchiveSource for HttpArchiveSource {
    fn locate(&self, archive: &ArchiveDescriptor) -> String {
        self.url_for(archive)
    }

    fn open(&self, archive: &ArchiveDescriptor) -> Result<Box<dyn Read + Send>> {
        let url = self.url_for(archive);
        debug!("GET {}", url);
        let resp = self.send(&url)?;

        match resp.status() {
            status if status.is_success() => Ok(Box::new(CountingReader {
                inner: resp,
                counter: self.transferred_bytes.clone(),
            })),
            status @ (StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) => Err(
                RipError::Unauthorized(format!("{url} rejected the token with status {status}")),
            ),
            status => Err(RipError::ArchiveUnavailable {
                archive: url,
                reason: format!("HTTP request failed with status: {status}"),
            }),
        }
    }
}

/// Adds every byte read from the body to a shared counter.
struct CountingReader<R> {
    inner: R,
    counter: Arc<AtomicU64>,
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.counter.fetch_add(n as u64, Ordering::Relaxed);
        Ok(n)
    }
}
