use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use color_eyre::Result;
use color_eyre::eyre::eyre;
use tokio::process::Command;

use crate::config::DownloadConfig;
use crate::ports::fetcher::{AudioFetcher, FetchError};

/// Audio fetcher backed by the `yt-dlp` command line tool.
pub struct YtDlpFetcher {
    program: PathBuf,
    settings: DownloadConfig,
    retry_sleep: Duration,
    match_filter: Option<String>,
}

impl YtDlpFetcher {
    /// Locate the binary on PATH. A missing binary is a configuration error.
    pub fn new(
        settings: DownloadConfig,
        retry_sleep: Duration,
        instrumental_keywords: &[String],
    ) -> Result<Self> {
        let program = which::which(&settings.binary).map_err(|_| {
            eyre!(
                "{} not found in PATH. Please install yt-dlp (and ffmpeg) and ensure it's available.",
                settings.binary
            )
        })?;
        tracing::debug!(program = %program.display(), "Using audio downloader");

        Ok(Self {
            program,
            settings,
            retry_sleep,
            match_filter: match_filter(instrumental_keywords),
        })
    }

    fn args(&self, query: &str, output_base: &Path) -> Vec<OsString> {
        let mut output_template = output_base.as_os_str().to_os_string();
        output_template.push(".%(ext)s");

        let mut args: Vec<OsString> = [
            "--format",
            "bestaudio/best",
            "--no-playlist",
            "--default-search",
            "ytsearch1",
            "--retries",
            "5",
            "--fragment-retries",
            "5",
            "--file-access-retries",
            "3",
            "--no-progress",
        ]
        .into_iter()
        .map(OsString::from)
        .collect();

        args.push("--socket-timeout".into());
        args.push(self.settings.socket_timeout.as_secs().max(1).to_string().into());
        args.push("--retry-sleep".into());
        args.push(self.retry_sleep.as_secs().to_string().into());
        if let Some(filter) = &self.match_filter {
            args.push("--match-filters".into());
            args.push(filter.into());
        }
        args.push("--extract-audio".into());
        args.push("--audio-format".into());
        args.push((&self.settings.audio_format).into());
        args.push("--audio-quality".into());
        args.push((&self.settings.audio_quality).into());
        args.push("--embed-metadata".into());
        args.push("--output".into());
        args.push(output_template);
        args.push("--".into());
        args.push(format!("ytsearch1:{}", query).into());
        args
    }
}

/// yt-dlp filter rejecting titles that contain any keyword, case-insensitively.
fn match_filter(keywords: &[String]) -> Option<String> {
    let alternatives: Vec<String> = keywords
        .iter()
        .map(|keyword| keyword.trim())
        .filter(|keyword| !keyword.is_empty())
        .map(|keyword| regex::escape(keyword).replace('\'', "\\'"))
        .collect();
    if alternatives.is_empty() {
        return None;
    }
    Some(format!("title !~= '(?i)({})'", alternatives.join("|")))
}

#[async_trait::async_trait]
impl AudioFetcher for YtDlpFetcher {
    async fn fetch(&self, query: &str, output_base: &Path) -> Result<(), FetchError> {
        let program = self.settings.binary.clone();
        tracing::debug!(query, output = %output_base.display(), "Running {}", program);

        let output = Command::new(&self.program)
            .args(self.args(query, output_base))
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| FetchError::Spawn {
                program: program.clone(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(FetchError::Failed {
                program,
                status: output.status,
                stderr: stderr.lines().last().unwrap_or_default().to_string(),
            });
        }
        Ok(())
    }
}
