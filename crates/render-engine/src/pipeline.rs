//! Run orchestration: configuration in, part files out.
//!
//! Everything that can fail identically for every segment (configuration,
//! probing, planning, glyph preflight, static layout) runs before the run
//! directory is created, so an aborted run leaves nothing behind.

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;

use reelsplit_common::error::{ReelsError, ReelsResult};
use reelsplit_processing_core::layout::LayoutEngine;
use reelsplit_processing_core::segmentation::plan_segments;
use reelsplit_project_model::run::{OutputSettings, RunConfig, RunIdentity};

use crate::compositor::SegmentCompositor;
use crate::export::{CancelFlag, ExportDriver, ExportSummary, ProgressCallback};
use crate::glyph::GlyphRenderer;
use crate::media::MediaIo;
use crate::overlay::OverlayRenderer;

/// Manifest written into every run directory.
pub const MANIFEST_FILE: &str = "summary.json";

/// Caller-controlled knobs that are not part of the run configuration.
#[derive(Clone, Default)]
pub struct PipelineOptions {
    pub settings: OutputSettings,
    pub cancel: CancelFlag,
    pub progress: Option<ProgressCallback>,
    /// Fixed identity instead of a freshly generated one.
    pub identity: Option<RunIdentity>,
}

/// What a finished run produced.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub identity: RunIdentity,
    pub run_dir: PathBuf,
    pub input: PathBuf,
    pub source_duration_secs: f64,
    pub part_duration_secs: f64,
    pub planned: usize,
    pub summary: ExportSummary,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.summary.is_success()
    }
}

/// Split `config.input_video` into decorated vertical parts.
///
/// Returns `Err` only when the run aborts before any segment is
/// attempted. Per-segment failures are reported in the summary.
pub async fn generate_parts(
    config: &RunConfig,
    media: Arc<dyn MediaIo>,
    glyphs: Arc<dyn GlyphRenderer>,
    options: PipelineOptions,
) -> ReelsResult<RunReport> {
    let run = config.validate()?;

    if !media.is_available() {
        return Err(ReelsError::media(format!(
            "Media backend `{}` is not available (expected ffmpeg and ffprobe in PATH)",
            media.name()
        )));
    }

    let source = Arc::new(media.probe(&config.input_video)?);
    let plan = plan_segments(
        source.duration_secs,
        config.part_duration_secs,
        config.trailing,
    )?;

    let scratch = tempfile::Builder::new().prefix("reelsplit-").tempdir()?;
    let renderer = Arc::new(OverlayRenderer::new(glyphs, scratch.path()));
    renderer.preflight(&run.text_styles())?;

    let layout = LayoutEngine::new(run.canvas, source.frame_size());
    let static_elements = layout.place(&run.static_overlays(), renderer.as_ref())?;

    let identity = options
        .identity
        .clone()
        .unwrap_or_else(|| RunIdentity::new(&config.video_title));
    let run_dir = identity.allocate(&config.output_base)?;
    tracing::info!(
        run_id = %identity.run_id,
        run_dir = %run_dir.display(),
        parts = plan.len(),
        part_duration_secs = config.part_duration_secs,
        "Starting run"
    );

    let compositor = Arc::new(SegmentCompositor::new(
        layout,
        static_elements,
        run.part_style.clone(),
        Arc::clone(&renderer),
    ));
    let driver = ExportDriver::new(
        Arc::clone(&media),
        compositor,
        options.settings.clone(),
        &run_dir,
    )
    .with_workers(config.workers)
    .with_cancel(options.cancel.clone())
    .with_progress(options.progress.clone());

    let summary = driver.run(Arc::clone(&source), plan.segments()).await;
    tracing::debug!(
        assets = renderer.cache().len(),
        renders = renderer.cache().computed(),
        "Overlay cache usage"
    );

    let report = RunReport {
        identity,
        run_dir,
        input: config.input_video.clone(),
        source_duration_secs: source.duration_secs,
        part_duration_secs: config.part_duration_secs,
        planned: plan.len(),
        summary,
    };
    write_manifest(&report);

    if let Err(err) = scratch.close() {
        tracing::warn!(error = %err, "Failed to remove scratch directory");
    }
    Ok(report)
}

fn write_manifest(report: &RunReport) {
    let path = report.run_dir.join(MANIFEST_FILE);
    let written = serde_json::to_string_pretty(report)
        .map_err(ReelsError::from)
        .and_then(|json| std::fs::write(&path, json).map_err(ReelsError::from));
    match written {
        Ok(()) => tracing::info!(path = %path.display(), "Wrote run summary"),
        Err(err) => tracing::warn!(path = %path.display(), error = %err, "Failed to write run summary"),
    }
}
