//! `yt-dlp` as the external media extraction tool

use std::io;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, warn};

use super::traits::{ExtractError, FetchRequest, MediaTool, ProbeInfo};
use super::types::DownloadProgress;

/// Longest stderr excerpt carried into an error message
const MAX_ERROR_CHARS: usize = 500;

static PROGRESS_LINE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r"^\[download\]\s+(\d+(?:\.\d+)?)%\s+of\s+~?\s*(\d+(?:\.\d+)?)([KMGT]?i?B)(?:\s+at\s+(\d+(?:\.\d+)?)([KMGT]?i?B)/s)?(?:\s+ETA\s+(\d+(?::\d+){1,2}))?",
    )
    .ok()
});

#[derive(Debug, Deserialize)]
struct DumpJson {
    id: String,
    title: Option<String>,
    description: Option<String>,
    uploader: Option<String>,
    channel: Option<String>,
    upload_date: Option<String>,
    duration: Option<f64>,
    thumbnail: Option<String>,
}

impl From<DumpJson> for ProbeInfo {
    fn from(json: DumpJson) -> Self {
        Self {
            id: json.id,
            title: json.title,
            description: json.description,
            uploader: json.uploader.or(json.channel),
            upload_date: json.upload_date,
            duration_seconds: json.duration,
            thumbnail: json.thumbnail,
        }
    }
}

/// Runs the `yt-dlp` binary as a child process
#[derive(Debug, Clone)]
pub struct YtDlp {
    program: PathBuf,
}

impl YtDlp {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.kill_on_drop(true).stdin(Stdio::null());
        command
    }

    fn spawn_error(&self, err: io::Error) -> ExtractError {
        if err.kind() == io::ErrorKind::NotFound {
            ExtractError::ToolNotFound(self.program.display().to_string())
        } else {
            ExtractError::Tool(format!("failed to start {}: {}", self.program.display(), err))
        }
    }
}

impl Default for YtDlp {
    fn default() -> Self {
        Self::new("yt-dlp")
    }
}

/// Arguments for a metadata lookup
pub fn probe_args(url: &str) -> Vec<String> {
    vec![
        "--dump-json".to_string(),
        "--no-playlist".to_string(),
        "--no-warnings".to_string(),
        url.to_string(),
    ]
}

/// Arguments for a media download. A Shorts URL must never expand into a
/// channel's whole upload list, hence `--no-playlist`.
pub fn fetch_args(request: &FetchRequest<'_>) -> Vec<String> {
    let mut args = vec![
        "--format".to_string(),
        request.format_selector.to_string(),
        "--merge-output-format".to_string(),
        request.merge_format.container().to_string(),
        "--output".to_string(),
        request.output.display().to_string(),
        "--no-playlist".to_string(),
        "--no-warnings".to_string(),
    ];

    if request.progress.is_some() {
        args.push("--newline".to_string());
        args.push("--progress".to_string());
    }

    args.push(request.url.to_string());
    args
}

fn stderr_excerpt(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return "no output on stderr".to_string();
    }
    trimmed.chars().take(MAX_ERROR_CHARS).collect()
}

fn unit_multiplier(unit: &str) -> f64 {
    match unit {
        "KiB" => 1024.0,
        "MiB" => 1024.0 * 1024.0,
        "GiB" => 1024.0 * 1024.0 * 1024.0,
        "TiB" => 1024.0 * 1024.0 * 1024.0 * 1024.0,
        "KB" => 1e3,
        "MB" => 1e6,
        "GB" => 1e9,
        "TB" => 1e12,
        _ => 1.0,
    }
}

fn parse_eta(eta: &str) -> u64 {
    eta.split(':')
        .filter_map(|part| part.parse::<u64>().ok())
        .fold(0, |acc, part| acc * 60 + part)
}

/// Parse one `--newline` progress line, e.g.
/// `[download]  42.0% of 10.00MiB at 1.00MiB/s ETA 00:05`
pub fn parse_progress_line(line: &str) -> Option<DownloadProgress> {
    let caps = PROGRESS_LINE.as_ref()?.captures(line.trim())?;

    let percent: f64 = caps.get(1)?.as_str().parse().ok()?;
    let total: f64 = caps.get(2)?.as_str().parse().ok()?;
    let total_bytes = (total * unit_multiplier(caps.get(3)?.as_str())) as u64;

    let bytes_per_second = match (caps.get(4), caps.get(5)) {
        (Some(speed), Some(unit)) => speed
            .as_str()
            .parse::<f64>()
            .map(|s| (s * unit_multiplier(unit.as_str())) as u64)
            .unwrap_or(0),
        _ => 0,
    };

    let eta_seconds = caps.get(6).map(|eta| parse_eta(eta.as_str())).unwrap_or(0);

    Some(DownloadProgress {
        percent,
        downloaded_bytes: (total_bytes as f64 * percent / 100.0) as u64,
        total_bytes,
        bytes_per_second,
        eta_seconds,
    })
}

#[async_trait]
impl MediaTool for YtDlp {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    async fn probe(&self, url: &str) -> Result<ProbeInfo, ExtractError> {
        debug!(url, program = %self.program.display(), "Probing metadata");

        let output = self
            .command()
            .args(probe_args(url))
            .output()
            .await
            .map_err(|e| self.spawn_error(e))?;

        if !output.status.success() {
            return Err(ExtractError::MetadataExtraction(stderr_excerpt(&output.stderr)));
        }

        let json: DumpJson = serde_json::from_slice(&output.stdout)
            .map_err(|e| ExtractError::MetadataExtraction(format!("invalid JSON from yt-dlp: {}", e)))?;

        Ok(json.into())
    }

    async fn fetch(&self, request: FetchRequest<'_>) -> Result<(), ExtractError> {
        let args = fetch_args(&request);
        debug!(url = request.url, args = ?args, "Running yt-dlp download");

        let Some(progress) = request.progress else {
            let output = self
                .command()
                .args(&args)
                .output()
                .await
                .map_err(|e| self.spawn_error(e))?;

            if !output.status.success() {
                return Err(ExtractError::Tool(stderr_excerpt(&output.stderr)));
            }
            return Ok(());
        };

        let mut child = self
            .command()
            .args(&args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| self.spawn_error(e))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ExtractError::Tool("failed to capture yt-dlp stdout".to_string()))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| ExtractError::Tool("failed to capture yt-dlp stderr".to_string()))?;

        let stderr_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            let _ = stderr.read_to_end(&mut buf).await;
            buf
        });

        let mut lines = BufReader::new(stdout).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if let Some(update) = parse_progress_line(&line) {
                        progress(update);
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, "Stopped reading yt-dlp progress");
                    break;
                }
            }
        }

        let status = child
            .wait()
            .await
            .map_err(|e| ExtractError::Tool(format!("failed to wait for yt-dlp: {}", e)))?;
        let stderr = stderr_task.await.unwrap_or_default();

        if !status.success() {
            return Err(ExtractError::Tool(stderr_excerpt(&stderr)));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::downloader::types::Format;
    use std::path::Path;
    use std::sync::Arc;

    #[test]
    fn test_probe_args_disable_playlists() {
        let args = probe_args("https://youtu.be/dQw4w9WgXcQ");
        assert!(args.contains(&"--dump-json".to_string()));
        assert!(args.contains(&"--no-playlist".to_string()));
        assert_eq!(args.last().unwrap(), "https://youtu.be/dQw4w9WgXcQ");
    }

    #[test]
    fn test_fetch_args() {
        let output = Path::new("/tmp/staging/clip.mp4");
        let request = FetchRequest {
            url: "https://www.youtube.com/shorts/dQw4w9WgXcQ",
            format_selector: "best[ext=mp4]/best",
            merge_format: Format::Mp4,
            output,
            progress: None,
        };

        let args = fetch_args(&request);
        assert_eq!(
            args,
            vec![
                "--format",
                "best[ext=mp4]/best",
                "--merge-output-format",
                "mp4",
                "--output",
                "/tmp/staging/clip.mp4",
                "--no-playlist",
                "--no-warnings",
                "https://www.youtube.com/shorts/dQw4w9WgXcQ",
            ]
        );
    }

    #[test]
    fn test_fetch_args_with_progress() {
        let callback: crate::downloader::ProgressCallback = Arc::new(|_| {});
        let request = FetchRequest {
            url: "https://youtu.be/dQw4w9WgXcQ",
            format_selector: "best",
            merge_format: Format::Best,
            output: Path::new("clip.mkv"),
            progress: Some(&callback),
        };

        let args = fetch_args(&request);
        assert!(args.contains(&"--newline".to_string()));
        assert!(args.contains(&"mkv".to_string()));
    }

    #[test]
    fn test_parse_progress_line() {
        let progress =
            parse_progress_line("[download]  50.0% of 10.00MiB at  1.00MiB/s ETA 00:05").unwrap();
        assert_eq!(progress.percent, 50.0);
        assert_eq!(progress.total_bytes, 10 * 1024 * 1024);
        assert_eq!(progress.downloaded_bytes, 5 * 1024 * 1024);
        assert_eq!(progress.bytes_per_second, 1024 * 1024);
        assert_eq!(progress.eta_seconds, 5);
    }

    #[test]
    fn test_parse_progress_line_without_speed() {
        let progress = parse_progress_line("[download] 100% of ~ 2.50KiB").unwrap();
        assert_eq!(progress.percent, 100.0);
        assert_eq!(progress.total_bytes, 2560);
        assert_eq!(progress.bytes_per_second, 0);
        assert_eq!(progress.eta_seconds, 0);
    }

    #[test]
    fn test_parse_progress_ignores_other_lines() {
        assert!(parse_progress_line("[youtube] dQw4w9WgXcQ: Downloading webpage").is_none());
        assert!(parse_progress_line("[download] Destination: clip.mp4").is_none());
    }

    #[test]
    fn test_parse_eta_with_hours() {
        assert_eq!(parse_eta("01:02:03"), 3723);
    }

    #[test]
    fn test_dump_json_prefers_uploader_over_channel() {
        let json = r#"{"id":"dQw4w9WgXcQ","title":"Clip","channel":"Chan","duration":12.7}"#;
        let info: ProbeInfo = serde_json::from_str::<DumpJson>(json).unwrap().into();
        assert_eq!(info.uploader.as_deref(), Some("Chan"));
        assert_eq!(info.duration_seconds, Some(12.7));
    }

    #[tokio::test]
    async fn test_missing_binary_is_reported() {
        let tool = YtDlp::new("/nonexistent/yt-dlp-binary");
        let err = tool.probe("https://youtu.be/dQw4w9WgXcQ").await.unwrap_err();
        assert!(matches!(err, ExtractError::ToolNotFound(_)));
    }
}
