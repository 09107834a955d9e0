use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::config::RetryPolicies;
use crate::ports::fetcher::{AudioFetcher, FetchError};
use crate::retry::RetryPolicy;
use crate::services::retrieve::RetrievalSettings;

type ContentFn = Box<dyn Fn(&str) -> Option<Vec<u8>> + Send + Sync>;

/// Audio fetcher that writes `<output_base>.mp3` with content derived from
/// the query, or fails when the content function returns `None`.
pub struct FakeAudioFetcher {
    content: ContentFn,
    queries: Arc<Mutex<Vec<String>>>,
}

impl FakeAudioFetcher {
    /// Every query produces a file with distinct content.
    pub fn unique() -> Self {
        Self::with(|query| Some(query.as_bytes().to_vec()))
    }

    pub fn with(content: impl Fn(&str) -> Option<Vec<u8>> + Send + Sync + 'static) -> Self {
        Self {
            content: Box::new(content),
            queries: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Handle to the queries received, usable after the fetcher moved.
    pub fn queries(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.queries)
    }
}

#[async_trait::async_trait]
impl AudioFetcher for FakeAudioFetcher {
    async fn fetch(&self, query: &str, output_base: &Path) -> Result<(), FetchError> {
        self.queries.lock().unwrap().push(query.to_string());

        let Some(bytes) = (self.content)(query) else {
            return Err(FetchError::Spawn {
                program: "fake".to_string(),
                source: std::io::Error::other("no search result"),
            });
        };
        let mut path = output_base.as_os_str().to_owned();
        path.push(".mp3");
        std::fs::write(&path, bytes).map_err(|source| FetchError::Write {
            path: path.to_string_lossy().into_owned(),
            source,
        })
    }
}

/// Single attempt, no delay.
pub fn no_retry() -> RetryPolicies {
    let policy = RetryPolicy::new(1, Duration::ZERO);
    RetryPolicies {
        catalog: policy,
        image: policy,
        download: policy,
    }
}

pub fn settings() -> RetrievalSettings {
    RetrievalSettings {
        instrumental_keywords: vec!["instrumental".to_string(), "karaoke".to_string()],
        placeholder_image: None,
        retry: no_retry(),
    }
}

pub fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}
