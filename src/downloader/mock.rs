//! In-process stand-in for the external media tool

use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;

use super::traits::{ExtractError, FetchRequest, MediaTool, ProbeInfo};
use super::types::DownloadProgress;

/// Media tool double that serves canned metadata and writes a fixed payload.
///
/// Failed fetches leave a `.part` file behind the way a real interrupted
/// download would.
///
/// Exported so the integration tests in `tests/` can drive the HTTP API
/// without `yt-dlp` on the machine. Not meant for production wiring: the
/// server and CLI only ever build [`YtDlp`](super::YtDlp).
pub struct MockTool {
    info: ProbeInfo,
    payload: Vec<u8>,
    failing_fetches: u32,
    failing_probe: bool,
    write_output: bool,
    probes: AtomicU32,
    fetches: AtomicU32,
}

impl MockTool {
    pub fn new(info: ProbeInfo) -> Self {
        Self {
            info,
            payload: b"mock video bytes".to_vec(),
            failing_fetches: 0,
            failing_probe: false,
            write_output: true,
            probes: AtomicU32::new(0),
            fetches: AtomicU32::new(0),
        }
    }

    pub fn with_payload(mut self, payload: Vec<u8>) -> Self {
        self.payload = payload;
        self
    }

    /// Fail the first `count` fetches
    pub fn failing_fetches(mut self, count: u32) -> Self {
        self.failing_fetches = count;
        self
    }

    pub fn failing_probe(mut self) -> Self {
        self.failing_probe = true;
        self
    }

    /// Exit cleanly without producing a file
    pub fn without_output(mut self) -> Self {
        self.write_output = false;
        self
    }

    pub fn probe_count(&self) -> u32 {
        self.probes.load(Ordering::SeqCst)
    }

    pub fn fetch_count(&self) -> u32 {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaTool for MockTool {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn probe(&self, url: &str) -> Result<ProbeInfo, ExtractError> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        if self.failing_probe {
            return Err(ExtractError::MetadataExtraction(format!(
                "mock probe failure for {}",
                url
            )));
        }
        Ok(self.info.clone())
    }

    async fn fetch(&self, request: FetchRequest<'_>) -> Result<(), ExtractError> {
        let call = self.fetches.fetch_add(1, Ordering::SeqCst);

        if call < self.failing_fetches {
            let mut partial = request.output.as_os_str().to_owned();
            partial.push(".part");
            let _ = tokio::fs::write(&partial, &self.payload[..self.payload.len() / 2]).await;
            return Err(ExtractError::Tool(format!("mock fetch failure #{}", call + 1)));
        }

        if !self.write_output {
            return Ok(());
        }

        tokio::fs::write(request.output, &self.payload)
            .await
            .map_err(|e| ExtractError::Tool(format!("mock write failed: {}", e)))?;

        if let Some(progress) = request.progress {
            let total = self.payload.len() as u64;
            progress(DownloadProgress {
                percent: 100.0,
                downloaded_bytes: total,
                total_bytes: total,
                bytes_per_second: 0,
                eta_seconds: 0,
            });
        }

        Ok(())
    }
}
