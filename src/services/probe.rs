//! FFprobe video duration.

use async_trait::async_trait;
use serde::Deserialize;
use std::{path::Path, process::Stdio};
use thiserror::Error;
use tokio::process::Command;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("ffprobe not found on PATH")]
    FfprobeNotFound,
    #[error("ffprobe failed: {0}")]
    FfprobeFailed(String),
    #[error("no duration reported")]
    MissingDuration,
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Reads media facts the catalog records about a video.
#[async_trait]
pub trait MediaProbe: Send + Sync {
    /// Whole seconds of playback.
    async fn duration_seconds(&self, path: &Path) -> Result<i64, ProbeError>;
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: FfprobeFormat,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

/// Probe backed by the `ffprobe` binary.
pub struct FfprobeProbe;

#[async_trait]
impl MediaProbe for FfprobeProbe {
    async fn duration_seconds(&self, path: &Path) -> Result<i64, ProbeError> {
        which::which("ffprobe").map_err(|_| ProbeError::FfprobeNotFound)?;

        let output = Command::new("ffprobe")
            .args(["-v", "quiet", "-print_format", "json", "-show_format"])
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !output.status.success() {
            return Err(ProbeError::FfprobeFailed(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        parse_duration(&output.stdout)
    }
}

fn parse_duration(stdout: &[u8]) -> Result<i64, ProbeError> {
    let probe: FfprobeOutput = serde_json::from_slice(stdout)?;
    probe
        .format
        .duration
        .and_then(|d| d.parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d >= 0.0)
        .map(|d| d as i64)
        .ok_or(ProbeError::MissingDuration)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ffprobe_format_duration() {
        let json = br#"{"format": {"filename": "a.mp4", "duration": "125.873000"}}"#;
        assert_eq!(parse_duration(json).unwrap(), 125);
    }

    #[test]
    fn missing_duration_is_an_error() {
        let json = br#"{"format": {"filename": "a.png"}}"#;
        assert!(matches!(parse_duration(json), Err(ProbeError::MissingDuration)));
        assert!(matches!(parse_duration(b"not json"), Err(ProbeError::Json(_))));
    }
}
