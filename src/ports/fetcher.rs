use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("{program} exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: std::process::ExitStatus,
        stderr: String,
    },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected HTTP status {status} for {url}")]
    Status {
        status: reqwest::StatusCode,
        url: String,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: String,
        source: std::io::Error,
    },
}

/// Port for the external audio source.
///
/// `fetch` resolves `query` to at most one audio file written to
/// `<output_base>.<ext>` where `ext` is one of the download extensions.
/// A successful return does not guarantee a file was produced.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait AudioFetcher: Send + Sync {
    async fn fetch(&self, query: &str, output_base: &Path) -> Result<(), FetchError>;
}

/// Port for downloading cover images.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch_image(&self, url: &str, destination: &Path) -> Result<(), FetchError>;
}
