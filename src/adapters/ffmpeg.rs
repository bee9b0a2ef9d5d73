use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

use super::AudioTranscoder;
use crate::error::PipelineError;

/// ffmpeg-backed audio transforms.
pub struct FfmpegTranscoder {
    ffmpeg_path: String,
}

impl FfmpegTranscoder {
    pub fn new(ffmpeg_path: impl Into<String>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
        }
    }

    async fn run(&self, args: &[&str]) -> Result<(), PipelineError> {
        tracing::debug!(ffmpeg = %self.ffmpeg_path, ?args, "running ffmpeg");

        let output = Command::new(&self.ffmpeg_path)
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| PipelineError::transform("ffmpeg", e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PipelineError::transform(
                "ffmpeg",
                last_lines(&stderr, 4),
            ));
        }

        Ok(())
    }
}

#[async_trait]
impl AudioTranscoder for FfmpegTranscoder {
    async fn extract_audio(&self, input: &Path, output: &Path) -> Result<(), PipelineError> {
        let input = input.to_string_lossy();
        let output = output.to_string_lossy();
        self.run(&["-y", "-i", input.as_ref(), "-vn", output.as_ref()])
            .await
    }

    async fn change_tempo(
        &self,
        input: &Path,
        output: &Path,
        factor: f64,
    ) -> Result<(), PipelineError> {
        let filter = format!("atempo={}", factor);
        let input = input.to_string_lossy();
        let output = output.to_string_lossy();
        self.run(&[
            "-y",
            "-i",
            input.as_ref(),
            "-filter:a",
            &filter,
            output.as_ref(),
        ])
        .await
    }
}

/// ffmpeg is chatty; keep only the tail of stderr for the error detail.
fn last_lines(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(n);
    lines[start..].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_lines_keeps_the_tail() {
        let text = "one\ntwo\n\nthree\nfour\nfive\n";
        assert_eq!(last_lines(text, 2), "four\nfive");
        assert_eq!(last_lines("only", 4), "only");
        assert_eq!(last_lines("", 4), "");
    }

    #[tokio::test]
    async fn missing_binary_reports_transform_failure() {
        let transcoder = FfmpegTranscoder::new("definitely-not-ffmpeg-binary");
        let err = transcoder
            .extract_audio(Path::new("in.mp4"), Path::new("out.mp3"))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::TransformFailed { .. }));
    }
}
