//! Export driver: renders every planned segment to its own file.
//!
//! Segments are independent once planned, so they run on a bounded pool
//! of blocking workers. A failure on one segment is recorded and the
//! batch continues. Each part is encoded to a temporary file and renamed
//! into place only on success.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::{Id, JoinSet};

use reelsplit_common::error::{ReelsError, ReelsResult};
use reelsplit_project_model::run::{part_path, part_temp_path, OutputSettings};
use reelsplit_project_model::window::PlannedSegment;

use crate::compositor::SegmentCompositor;
use crate::media::{MediaIo, SourceVideo};

/// Run-level cancellation flag.
///
/// Once set, segments that have not started are skipped; segments
/// already encoding finish normally.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Lifecycle stage of one segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentStage {
    Started,
    Finished,
    Failed,
    Skipped,
}

/// Progress event for one segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentProgress {
    pub ordinal: usize,
    pub total: usize,
    pub stage: SegmentStage,
}

/// Progress callback for segment exports.
pub type ProgressCallback = Arc<dyn Fn(SegmentProgress) + Send + Sync>;

/// A part written to its final path.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportedPart {
    pub ordinal: usize,
    pub path: PathBuf,
    pub duration_secs: f64,
}

/// A part that could not be produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedPart {
    pub ordinal: usize,
    pub message: String,
}

/// Outcome of a batch, every list sorted by ordinal.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExportSummary {
    pub succeeded: Vec<ExportedPart>,
    pub failed: Vec<FailedPart>,
    pub skipped: Vec<usize>,
}

impl ExportSummary {
    /// True when every planned part was written.
    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && self.skipped.is_empty()
    }

    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len() + self.skipped.len()
    }

    pub fn succeeded_ordinals(&self) -> Vec<usize> {
        self.succeeded.iter().map(|p| p.ordinal).collect()
    }

    pub fn failed_ordinals(&self) -> Vec<usize> {
        self.failed.iter().map(|p| p.ordinal).collect()
    }

    fn sort(&mut self) {
        self.succeeded.sort_by_key(|p| p.ordinal);
        self.failed.sort_by_key(|p| p.ordinal);
        self.skipped.sort_unstable();
    }
}

/// Renders compositions to files in a run directory.
pub struct ExportDriver {
    media: Arc<dyn MediaIo>,
    compositor: Arc<SegmentCompositor>,
    settings: OutputSettings,
    run_dir: PathBuf,
    workers: usize,
    cancel: CancelFlag,
    progress: Option<ProgressCallback>,
}

impl ExportDriver {
    pub fn new(
        media: Arc<dyn MediaIo>,
        compositor: Arc<SegmentCompositor>,
        settings: OutputSettings,
        run_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            media,
            compositor,
            settings,
            run_dir: run_dir.into(),
            workers: 1,
            cancel: CancelFlag::new(),
            progress: None,
        }
    }

    /// Number of segments encoded concurrently (minimum 1).
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_progress(mut self, progress: Option<ProgressCallback>) -> Self {
        self.progress = progress;
        self
    }

    fn report(&self, segment: &PlannedSegment, stage: SegmentStage) {
        emit(&self.progress, segment, stage);
    }

    /// Export every segment, best effort.
    pub async fn run(
        &self,
        source: Arc<SourceVideo>,
        segments: Vec<PlannedSegment>,
    ) -> ExportSummary {
        tracing::info!(
            segments = segments.len(),
            workers = self.workers,
            backend = self.media.name(),
            run_dir = %self.run_dir.display(),
            "Starting export"
        );

        let mut summary = ExportSummary::default();
        let permits = Arc::new(Semaphore::new(self.workers));
        let mut tasks: JoinSet<(PlannedSegment, ReelsResult<ExportedPart>)> = JoinSet::new();
        let mut ordinals: HashMap<Id, usize> = HashMap::new();

        for segment in segments {
            // Waiting for a free worker first means cancellation is seen
            // by every segment that has not started yet.
            let permit = match Arc::clone(&permits).acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    summary.skipped.push(segment.ordinal);
                    self.report(&segment, SegmentStage::Skipped);
                    continue;
                }
            };
            if self.cancel.is_cancelled() {
                tracing::info!(ordinal = segment.ordinal, "Skipping segment after cancellation");
                summary.skipped.push(segment.ordinal);
                self.report(&segment, SegmentStage::Skipped);
                continue;
            }

            self.report(&segment, SegmentStage::Started);
            let media = Arc::clone(&self.media);
            let compositor = Arc::clone(&self.compositor);
            let settings = self.settings.clone();
            let run_dir = self.run_dir.clone();
            let source = Arc::clone(&source);
            let progress = self.progress.clone();
            let cancel = self.cancel.clone();
            let ordinal = segment.ordinal;

            let handle = tasks.spawn(async move {
                let result = tokio::task::spawn_blocking(move || {
                    export_segment(
                        media.as_ref(),
                        &compositor,
                        &settings,
                        &source,
                        segment,
                        &run_dir,
                    )
                })
                .await
                .unwrap_or_else(|e| {
                    Err(ReelsError::encode(
                        segment.ordinal,
                        format!("export worker panicked: {e}"),
                    ))
                });
                let stage = match &result {
                    Ok(_) => SegmentStage::Finished,
                    Err(err) if err.is_fatal() => {
                        // Every later segment would hit the same error.
                        tracing::error!(
                            ordinal = segment.ordinal,
                            error = %err,
                            "Fatal error, cancelling remaining segments"
                        );
                        cancel.cancel();
                        SegmentStage::Failed
                    }
                    Err(_) => SegmentStage::Failed,
                };
                emit(&progress, &segment, stage);
                drop(permit);
                (segment, result)
            });
            ordinals.insert(handle.id(), ordinal);
        }

        while let Some(joined) = tasks.join_next().await {
            Self::record(&mut summary, &ordinals, joined);
        }

        summary.sort();
        tracing::info!(
            succeeded = summary.succeeded.len(),
            failed = summary.failed.len(),
            skipped = summary.skipped.len(),
            "Export finished"
        );
        summary
    }

    fn record(
        summary: &mut ExportSummary,
        ordinals: &HashMap<Id, usize>,
        joined: Result<(PlannedSegment, ReelsResult<ExportedPart>), tokio::task::JoinError>,
    ) {
        match joined {
            Ok((_, Ok(part))) => {
                tracing::info!(
                    ordinal = part.ordinal,
                    output = %part.path.display(),
                    duration_secs = part.duration_secs,
                    "Exported part"
                );
                summary.succeeded.push(part);
            }
            Ok((segment, Err(err))) => {
                tracing::error!(ordinal = segment.ordinal, error = %err, "Part failed");
                summary.failed.push(FailedPart {
                    ordinal: segment.ordinal,
                    message: err.to_string(),
                });
            }
            Err(err) => match ordinals.get(&err.id()) {
                Some(&ordinal) => {
                    tracing::error!(ordinal, error = %err, "Export task aborted");
                    summary.failed.push(FailedPart {
                        ordinal,
                        message: format!("export task aborted: {err}"),
                    });
                }
                None => tracing::error!(error = %err, "Export task aborted"),
            },
        }
    }
}

fn emit(progress: &Option<ProgressCallback>, segment: &PlannedSegment, stage: SegmentStage) {
    if let Some(cb) = progress {
        cb(SegmentProgress {
            ordinal: segment.ordinal,
            total: segment.total,
            stage,
        });
    }
}

/// Compose and encode one segment, moving the result into place.
pub fn export_segment(
    media: &dyn MediaIo,
    compositor: &SegmentCompositor,
    settings: &OutputSettings,
    source: &Arc<SourceVideo>,
    segment: PlannedSegment,
    run_dir: &Path,
) -> ReelsResult<ExportedPart> {
    let composition = compositor.compose(media, source, segment)?;
    let temp = part_temp_path(run_dir, segment.ordinal);
    let output = part_path(run_dir, segment.ordinal);

    if let Err(err) = media.encode(&composition, settings, &temp) {
        remove_if_exists(&temp);
        return Err(err);
    }
    if !temp.is_file() {
        return Err(ReelsError::encode(
            segment.ordinal,
            "encoder reported success but produced no file",
        ));
    }
    if let Err(err) = std::fs::rename(&temp, &output) {
        remove_if_exists(&temp);
        return Err(ReelsError::encode(
            segment.ordinal,
            format!("failed to move part into place: {err}"),
        ));
    }

    Ok(ExportedPart {
        ordinal: segment.ordinal,
        path: output,
        duration_secs: composition.duration(),
    })
}

fn remove_if_exists(path: &Path) {
    if let Err(err) = std::fs::remove_file(path) {
        if err.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(path = %path.display(), error = %err, "Failed to remove temporary part");
        }
    }
}
