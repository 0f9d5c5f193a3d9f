use std::collections::HashMap;
use std::sync::Arc;
use std::sync::mpsc;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Serialize, Serializer};
use tempfile::NamedTempFile;
use url::Url;

use crate::coordinate::subproject;
use crate::domain::{ArchiveFormat, Classifier};
use crate::error::FetchError;
use crate::fs_util;
use crate::loader::ArtifactLoader;
use crate::pool::Scheduler;
use crate::request::FetchRequest;
use crate::transfer::{self, Progress, Transport};

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum FetchOutcome {
    CacheHit,
    Downloaded {
        bytes: u64,
    },
    Failed {
        #[serde(serialize_with = "serialize_error")]
        error: FetchError,
    },
}

impl FetchOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, FetchOutcome::Failed { .. })
    }
}

fn serialize_error<S: Serializer>(error: &FetchError, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(error)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Completed,
    CompletedWithFailures,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct ArtifactReport {
    pub module: String,
    pub classifier: String,
    pub url: String,
    pub path: Utf8PathBuf,
    /// Set when a cached copy was rejected and fetched again.
    pub refetched: bool,
    #[serde(flatten)]
    pub outcome: FetchOutcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct FetchReport {
    pub status: BatchStatus,
    pub items: Vec<ArtifactReport>,
    pub finished_at: String,
}

impl FetchReport {
    fn new(mut items: Vec<ArtifactReport>) -> Self {
        items.sort_by(|a, b| (&a.module, &a.classifier).cmp(&(&b.module, &b.classifier)));
        let failed = items.iter().filter(|item| item.outcome.is_failed()).count();
        let status = if failed == 0 {
            BatchStatus::Completed
        } else if failed == items.len() {
            BatchStatus::Failed
        } else {
            BatchStatus::CompletedWithFailures
        };
        Self {
            status,
            items,
            finished_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn failures(&self) -> impl Iterator<Item = &ArtifactReport> {
        self.items.iter().filter(|item| item.outcome.is_failed())
    }

    /// Paths of every artifact that is ready to use.
    pub fn ready_paths(&self) -> impl Iterator<Item = &Utf8Path> {
        self.items
            .iter()
            .filter(|item| !item.outcome.is_failed())
            .map(|item| item.path.as_path())
    }
}

#[derive(Debug, Clone)]
pub enum ProgressEvent {
    Dispatched { artifact: String, url: Url },
    Transfer { artifact: String, progress: Progress },
    Settled { artifact: String, outcome: FetchOutcome },
}

pub trait ProgressSink: Send + Sync {
    fn event(&self, event: ProgressEvent);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SilentProgress;

impl ProgressSink for SilentProgress {
    fn event(&self, _event: ProgressEvent) {}
}

/// Per-artifact bookkeeping kept on the calling thread.
struct Planned {
    module: String,
    classifier: String,
    artifact: String,
    url: Url,
    path: Utf8PathBuf,
    refetched: bool,
}

impl Planned {
    fn settle(self, outcome: FetchOutcome) -> ArtifactReport {
        ArtifactReport {
            module: self.module,
            classifier: self.classifier,
            url: self.url.to_string(),
            path: self.path,
            refetched: self.refetched,
            outcome,
        }
    }
}

/// Fetches every artifact of a request, reusing valid cached copies.
///
/// Transfers run on the caller's scheduler; everything else happens on the
/// thread that calls [`Orchestrator::call`], which blocks until all
/// transfers have settled.
pub struct Orchestrator<S: Scheduler, T: Transport + 'static, L: ArtifactLoader + 'static> {
    scheduler: S,
    transport: Arc<T>,
    loader: Arc<L>,
}

impl<S: Scheduler, T: Transport + 'static, L: ArtifactLoader + 'static> Orchestrator<S, T, L> {
    pub fn new(scheduler: S, transport: T, loader: L) -> Self {
        Self::with_shared(scheduler, Arc::new(transport), Arc::new(loader))
    }

    pub fn with_shared(scheduler: S, transport: Arc<T>, loader: Arc<L>) -> Self {
        Self {
            scheduler,
            transport,
            loader,
        }
    }

    pub fn loader(&self) -> &L {
        &self.loader
    }

    pub fn call(&self, request: FetchRequest) -> Result<FetchReport, FetchError> {
        self.call_with_progress(request, Arc::new(SilentProgress))
    }

    pub fn call_with_progress(
        &self,
        request: FetchRequest,
        sink: Arc<dyn ProgressSink>,
    ) -> Result<FetchReport, FetchError> {
        fs_util::ensure_dir(request.output().as_std_path())?;

        let (tx, rx) = mpsc::channel::<(usize, FetchOutcome)>();
        let mut settled = Vec::new();
        let mut in_flight: Vec<Option<Planned>> = Vec::new();

        let plans = request
            .pairs()
            .into_iter()
            .map(|(module, classifier)| self.plan(&request, module, classifier))
            .collect::<Result<Vec<_>, _>>()?;

        let mut claimed: HashMap<Utf8PathBuf, String> = HashMap::new();
        for planned in plans {
            if let Some(owner) = claimed.get(&planned.path) {
                tracing::warn!(artifact = %planned.artifact, path = %planned.path, %owner, "cache path collision");
                let outcome = FetchOutcome::Failed {
                    error: FetchError::CacheCollision {
                        path: planned.path.clone().into_std_path_buf(),
                        owner: owner.clone(),
                    },
                };
                sink.event(ProgressEvent::Settled {
                    artifact: planned.artifact.clone(),
                    outcome: outcome.clone(),
                });
                settled.push(planned.settle(outcome));
                continue;
            }
            claimed.insert(planned.path.clone(), planned.artifact.clone());

            let Some(planned) = self.try_cache(planned, request.format(), sink.as_ref(), &mut settled)
            else {
                continue;
            };

            let prefix = format!(".{}.", planned.path.file_name().unwrap_or("artifact"));
            let temp = match tempfile::Builder::new()
                .prefix(&prefix)
                .suffix(".part")
                .tempfile_in(request.output().as_std_path())
            {
                Ok(temp) => temp,
                Err(err) => {
                    let outcome = FetchOutcome::Failed {
                        error: FetchError::sink(&planned.path, err),
                    };
                    sink.event(ProgressEvent::Settled {
                        artifact: planned.artifact.clone(),
                        outcome: outcome.clone(),
                    });
                    settled.push(planned.settle(outcome));
                    continue;
                }
            };

            sink.event(ProgressEvent::Dispatched {
                artifact: planned.artifact.clone(),
                url: planned.url.clone(),
            });
            tracing::debug!(artifact = %planned.artifact, url = %planned.url, "dispatching fetch");

            let index = in_flight.len();
            let job = FetchJob {
                transport: Arc::clone(&self.transport),
                loader: Arc::clone(&self.loader),
                sink: Arc::clone(&sink),
                artifact: planned.artifact.clone(),
                url: planned.url.clone(),
                path: planned.path.clone(),
                temp,
            };
            in_flight.push(Some(planned));

            let tx = tx.clone();
            self.scheduler.execute(Box::new(move || {
                let outcome = job.run();
                let _ = tx.send((index, outcome));
            }));
        }

        drop(tx);
        for (index, outcome) in rx.iter() {
            if let Some(planned) = in_flight.get_mut(index).and_then(Option::take) {
                settled.push(planned.settle(outcome));
            }
        }
        for planned in in_flight.into_iter().flatten() {
            tracing::error!(artifact = %planned.artifact, "fetch worker stopped without a result");
            let error = FetchError::Abandoned(planned.artifact.clone());
            settled.push(planned.settle(FetchOutcome::Failed { error }));
        }

        let report = FetchReport::new(settled);
        for failure in report.failures() {
            if let FetchOutcome::Failed { error } = &failure.outcome {
                tracing::warn!(url = %failure.url, error = %error, "artifact unavailable");
            }
        }
        tracing::info!(
            status = ?report.status,
            artifacts = report.items.len(),
            failed = report.failures().count(),
            "fetch settled"
        );

        if let Some(callback) = request.callback {
            callback(&report).map_err(|err| FetchError::Callback(err.to_string()))?;
        }
        Ok(report)
    }

    fn plan(
        &self,
        request: &FetchRequest,
        module: &str,
        classifier: &Classifier,
    ) -> Result<Planned, FetchError> {
        let location = request.locate(module, classifier)?;
        let path = location.cache_path(request.output())?;
        Ok(Planned {
            module: module.to_string(),
            classifier: classifier.to_string(),
            artifact: format!("{}:{}", subproject(request.project(), module), classifier),
            url: location.artifact,
            path,
            refetched: false,
        })
    }

    /// Settles `planned` from the cache when possible; otherwise hands it
    /// back for download.
    fn try_cache(
        &self,
        mut planned: Planned,
        format: ArchiveFormat,
        sink: &dyn ProgressSink,
        settled: &mut Vec<ArtifactReport>,
    ) -> Option<Planned> {
        let path = planned.path.as_std_path();
        if !path.exists() {
            return Some(planned);
        }

        if !fs_util::is_reusable(path, format) {
            tracing::warn!(path = %planned.path, "cached artifact is corrupt, fetching again");
            planned.refetched = true;
            return Some(planned);
        }

        match self.loader.artifact_ready(path) {
            Ok(()) => {
                tracing::debug!(path = %planned.path, "using cached artifact");
                sink.event(ProgressEvent::Settled {
                    artifact: planned.artifact.clone(),
                    outcome: FetchOutcome::CacheHit,
                });
                settled.push(planned.settle(FetchOutcome::CacheHit));
                None
            }
            Err(err) => {
                tracing::warn!(path = %planned.path, error = %err, "loader rejected cached artifact, fetching again");
                planned.refetched = true;
                Some(planned)
            }
        }
    }
}

/// One transfer, moved onto a worker.
struct FetchJob<T: Transport + 'static, L: ArtifactLoader + 'static> {
    transport: Arc<T>,
    loader: Arc<L>,
    sink: Arc<dyn ProgressSink>,
    artifact: String,
    url: Url,
    path: Utf8PathBuf,
    temp: NamedTempFile,
}

impl<T: Transport + 'static, L: ArtifactLoader + 'static> FetchJob<T, L> {
    fn run(self) -> FetchOutcome {
        let artifact = self.artifact.clone();
        let sink = Arc::clone(&self.sink);
        let outcome = match self.download() {
            Ok(bytes) => FetchOutcome::Downloaded { bytes },
            Err(error) => FetchOutcome::Failed { error },
        };
        sink.event(ProgressEvent::Settled {
            artifact,
            outcome: outcome.clone(),
        });
        outcome
    }

    fn download(self) -> Result<u64, FetchError> {
        let FetchJob {
            transport,
            loader,
            sink,
            artifact,
            url,
            path,
            mut temp,
        } = self;

        // On any error below `temp` is dropped, which deletes the partial file.
        let bytes = transfer::fetch(transport.as_ref(), &url, temp.as_file_mut(), &mut |progress| {
            sink.event(ProgressEvent::Transfer {
                artifact: artifact.clone(),
                progress,
            })
        })?;
        temp.as_file()
            .sync_all()
            .map_err(|err| FetchError::sink(&path, err))?;
        let file = temp
            .persist(path.as_std_path())
            .map_err(|err| FetchError::sink(&path, err.error))?;
        drop(file);

        tracing::debug!(artifact = %artifact, bytes, path = %path, "artifact downloaded");
        loader.artifact_ready(path.as_std_path())?;
        Ok(bytes)
    }
}
