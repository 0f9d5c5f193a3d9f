use std::io::{self, Write};

use serde::Serialize;

use crate::coordinate::ArtifactLocation;
use crate::orchestrator::{FetchOutcome, FetchReport, ProgressEvent, ProgressSink};

#[derive(Debug, Clone, Serialize)]
pub struct ResolvedArtifact {
    pub module: String,
    pub classifier: String,
    #[serde(flatten)]
    pub location: ArtifactLocation,
    pub path: String,
    pub cached: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResolveResult {
    pub artifacts: Vec<ResolvedArtifact>,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_fetch(result: &FetchReport) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_resolve(result: &ResolveResult) -> io::Result<()> {
        Self::print_json(result)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

/// Reports progress through `tracing`: chunk updates at trace level,
/// dispatch and completion at info.
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn event(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::Dispatched { artifact, url } => {
                tracing::info!(%artifact, %url, "downloading");
            }
            ProgressEvent::Transfer { artifact, progress } => match progress.fraction() {
                Some(fraction) => tracing::trace!(
                    %artifact,
                    transferred = progress.transferred,
                    percent = format_args!("{:.1}", fraction * 100.0),
                    "progress"
                ),
                None => tracing::trace!(%artifact, transferred = progress.transferred, "progress"),
            },
            ProgressEvent::Settled { artifact, outcome } => match outcome {
                FetchOutcome::CacheHit => tracing::info!(%artifact, "cached"),
                FetchOutcome::Downloaded { bytes } => tracing::info!(%artifact, bytes, "downloaded"),
                FetchOutcome::Failed { error } => tracing::warn!(%artifact, %error, "failed"),
            },
        }
    }
}
