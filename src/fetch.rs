use std::collections::HashMap;
use std::io::Read;
use std::time::Duration;

use base64::Engine as _;

use crate::error::{FolioError, FolioResult};

/// Cap on fetched asset size; a runaway response should fail, not OOM.
const MAX_ASSET_BYTES: u64 = 64 * 1024 * 1024;

/// Resolves a source locator into raw bytes.
///
/// A locator is a remote URL, an inline base64 data-URI, or (for local
/// workflows) a filesystem path. Fetch calls may block the compiling task
/// but never reorder paint operations relative to document order.
pub trait AssetFetcher {
    fn fetch_bytes(&self, locator: &str) -> FolioResult<Vec<u8>>;

    fn fetch_text(&self, locator: &str) -> FolioResult<String> {
        let bytes = self.fetch_bytes(locator)?;
        String::from_utf8(bytes)
            .map_err(|e| FolioError::fetch_failed(locator, format!("not valid utf-8: {e}")))
    }
}

/// Production fetcher: data-URIs decode locally, `http(s)` goes through a
/// blocking agent with a per-request timeout, anything else is read from
/// the filesystem.
pub struct HttpFetcher {
    agent: ureq::Agent,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(timeout)
            .build();
        Self { agent }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

impl AssetFetcher for HttpFetcher {
    fn fetch_bytes(&self, locator: &str) -> FolioResult<Vec<u8>> {
        if locator.starts_with("data:") {
            return decode_data_uri(locator);
        }

        if locator.starts_with("http://") || locator.starts_with("https://") {
            tracing::debug!(locator, "fetching remote asset");
            let response = self
                .agent
                .get(locator)
                .call()
                .map_err(|e| FolioError::fetch_failed(locator, e.to_string()))?;
            let mut bytes = Vec::new();
            response
                .into_reader()
                .take(MAX_ASSET_BYTES)
                .read_to_end(&mut bytes)
                .map_err(|e| FolioError::fetch_failed(locator, format!("read body: {e}")))?;
            return Ok(bytes);
        }

        std::fs::read(locator).map_err(|e| FolioError::fetch_failed(locator, e.to_string()))
    }
}

/// In-memory fetcher for tests and pre-supplied asset sets. Data-URIs are
/// still decoded locally so scenes mixing both forms work offline.
#[derive(Default)]
pub struct StaticFetcher {
    assets: HashMap<String, Vec<u8>>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, locator: impl Into<String>, bytes: impl Into<Vec<u8>>) -> &mut Self {
        self.assets.insert(locator.into(), bytes.into());
        self
    }
}

impl AssetFetcher for StaticFetcher {
    fn fetch_bytes(&self, locator: &str) -> FolioResult<Vec<u8>> {
        if let Some(bytes) = self.assets.get(locator) {
            return Ok(bytes.clone());
        }
        if locator.starts_with("data:") {
            return decode_data_uri(locator);
        }
        Err(FolioError::fetch_failed(locator, "no such asset"))
    }
}

/// Decode the payload of a base64 data-URI without any network access.
fn decode_data_uri(locator: &str) -> FolioResult<Vec<u8>> {
    let payload = locator
        .split_once("base64,")
        .map(|(_, rest)| rest)
        .ok_or_else(|| FolioError::fetch_failed(locator, "data uri without base64 payload"))?;
    base64::engine::general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|e| FolioError::fetch_failed(locator, format!("base64 decode: {e}")))
}
