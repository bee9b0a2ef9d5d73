use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

use super::MediaFetcher;
use crate::error::PipelineError;

/// Recognized YouTube URL shapes, tried in order: query parameter,
/// short link, shorts, embed.
static ID_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"[?&]v=([A-Za-z0-9_-]{6,})",
        r"youtu\.be/([A-Za-z0-9_-]{6,})",
        r"shorts/([A-Za-z0-9_-]{6,})",
        r"embed/([A-Za-z0-9_-]{6,})",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("static pattern"))
    .collect()
});

/// Extract a video identifier from an arbitrary URL string.
///
/// Falls back to the last path segment when no shape matches, provided
/// it is at least 6 characters — some valid identifiers are shorter than
/// the canonical 11, and the fallback exists to be permissive.
pub fn extract_video_id(url: &str) -> Option<String> {
    for pattern in ID_PATTERNS.iter() {
        if let Some(captures) = pattern.captures(url) {
            return Some(captures[1].to_string());
        }
    }

    let last = url.trim_end_matches('/').rsplit('/').next()?;
    (last.len() >= 6).then(|| last.to_string())
}

/// YouTube audio fetcher using yt-dlp.
pub struct YoutubeFetcher {
    yt_dlp_path: String,
}

impl YoutubeFetcher {
    pub fn new(yt_dlp_path: impl Into<String>) -> Self {
        Self {
            yt_dlp_path: yt_dlp_path.into(),
        }
    }
}

#[async_trait]
impl MediaFetcher for YoutubeFetcher {
    async fn fetch_audio(&self, url: &str, dest: &Path) -> Result<(), PipelineError> {
        tracing::debug!(%url, dest = %dest.display(), "fetching audio with yt-dlp");

        let dest_str = dest.to_string_lossy();
        let output = Command::new(&self.yt_dlp_path)
            .args([
                "--output",
                dest_str.as_ref(),
                "--extract-audio",
                "--audio-format",
                "mp3",
                "--format",
                "bestaudio/best",
                "--no-playlist",
                url,
            ])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| PipelineError::FetchFailed(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PipelineError::FetchFailed(stderr.trim().to_string()));
        }

        if dest.is_file() {
            return Ok(());
        }

        // yt-dlp's audio post-processor may append its own extension.
        let doubled = dest.with_extension("mp3.mp3");
        if doubled.is_file() {
            fs_err::rename(&doubled, dest).map_err(|e| PipelineError::FetchFailed(e.to_string()))?;
            return Ok(());
        }

        Err(PipelineError::FetchFailed(
            "yt-dlp reported success but produced no audio file".into(),
        ))
    }
}
