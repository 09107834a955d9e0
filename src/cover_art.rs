use std::path::Path;
use std::time::Duration;

use crate::ports::fetcher::{FetchError, ImageFetcher};

/// Downloads cover images over HTTP.
pub struct HttpImageFetcher {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpImageFetcher {
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            timeout,
        }
    }
}

#[async_trait::async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch_image(&self, url: &str, destination: &Path) -> Result<(), FetchError> {
        tracing::debug!(url, destination = %destination.display(), "Downloading image");

        let response = self.client.get(url).timeout(self.timeout).send().await?;
        if response.status() != reqwest::StatusCode::OK {
            return Err(FetchError::Status {
                status: response.status(),
                url: url.to_string(),
            });
        }

        let bytes = response.bytes().await?;
        tokio::fs::write(destination, &bytes)
            .await
            .map_err(|source| FetchError::Write {
                path: destination.display().to_string(),
                source,
            })?;
        Ok(())
    }
}
