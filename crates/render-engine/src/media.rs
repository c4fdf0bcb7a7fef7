//! Media source adapter and encoder.
//!
//! [`MediaIo`] is the narrow capability the pipeline needs from a media
//! toolkit: probe a source, bound a sub-clip, and encode one composed
//! segment. [`FfmpegMedia`] implements it by shelling out to `ffprobe`
//! and `ffmpeg`; each segment is a single ffmpeg invocation that seeks
//! the input and stacks every layer in one `-filter_complex` graph.

use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Deserialize;

use reelsplit_common::error::{ReelsError, ReelsResult};
use reelsplit_project_model::geometry::Size;
use reelsplit_project_model::run::OutputSettings;
use reelsplit_project_model::window::TimeWindow;

use crate::compositor::{LayerContent, SegmentComposition};

/// Slack allowed when a window ends past the probed duration.
const DURATION_TOLERANCE_SECS: f64 = 1e-3;

/// Immutable description of the input video, shared by every segment.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceVideo {
    pub path: PathBuf,
    pub duration_secs: f64,
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub has_audio: bool,
}

impl SourceVideo {
    pub fn frame_size(&self) -> Size {
        Size::new(self.width, self.height)
    }
}

/// A time-bounded view of the source video.
#[derive(Debug, Clone)]
pub struct SubClip {
    pub source: Arc<SourceVideo>,
    pub window: TimeWindow,
}

impl SubClip {
    pub fn duration(&self) -> f64 {
        self.window.duration()
    }
}

/// Capability interface over the media toolkit.
pub trait MediaIo: Send + Sync {
    /// Open `path` and read its duration, frame size and rate.
    fn probe(&self, path: &Path) -> ReelsResult<SourceVideo>;

    /// Bound a sub-clip of `source` to `window`.
    fn extract(&self, source: &Arc<SourceVideo>, window: TimeWindow) -> ReelsResult<SubClip>;

    /// Render `composition` to `output` with the given settings.
    fn encode(
        &self,
        composition: &SegmentComposition,
        settings: &OutputSettings,
        output: &Path,
    ) -> ReelsResult<()>;

    /// Whether the backing toolkit is usable on this system.
    fn is_available(&self) -> bool;

    /// Backend name.
    fn name(&self) -> &str;
}

/// Check a window against the source bounds.
pub fn check_window(source: &SourceVideo, window: TimeWindow) -> ReelsResult<()> {
    if !(window.start >= 0.0 && window.end > window.start) {
        return Err(ReelsError::media(format!(
            "invalid window [{:.3}, {:.3})",
            window.start, window.end
        )));
    }
    if window.end > source.duration_secs + DURATION_TOLERANCE_SECS {
        return Err(ReelsError::media(format!(
            "window [{:.3}, {:.3}) exceeds source duration {:.3}s",
            window.start, window.end, source.duration_secs
        )));
    }
    Ok(())
}

/// `ffmpeg`/`ffprobe` backed media service.
#[derive(Debug, Clone, Default)]
pub struct FfmpegMedia {
    timeout: Option<Duration>,
}

impl FfmpegMedia {
    pub fn new() -> Self {
        Self::default()
    }

    /// Kill any single encode that runs longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    fn run_ffmpeg(&self, args: &[String], ordinal: usize, duration_secs: f64) -> ReelsResult<()> {
        tracing::debug!(ordinal, args = ?args, "Running ffmpeg");
        let mut child = Command::new("ffmpeg")
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| ReelsError::encode(ordinal, format!("Failed to start ffmpeg: {e}")))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ReelsError::encode(ordinal, "Failed to capture ffmpeg stdout"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| ReelsError::encode(ordinal, "Failed to capture ffmpeg stderr"))?;

        // Both pipes are drained on their own threads so ffmpeg never
        // blocks on a full pipe while we poll for exit.
        let stderr_task = std::thread::spawn(move || -> String {
            let mut output = String::new();
            match BufReader::new(stderr).read_to_string(&mut output) {
                Ok(_) => output,
                Err(err) => format!("<failed to read ffmpeg stderr: {err}>"),
            }
        });
        let progress_task = std::thread::spawn(move || {
            let mut state = ProgressState::default();
            for line in BufReader::new(stdout).lines().map_while(Result::ok) {
                if let Some((key, value)) = line.trim().split_once('=') {
                    state.update(key, value);
                    if key == "progress" {
                        tracing::trace!(
                            ordinal,
                            out_time_secs = state.out_time_secs,
                            fraction = state.fraction(duration_secs),
                            "ffmpeg progress"
                        );
                    }
                }
            }
            state
        });

        let status = self.wait_with_timeout(&mut child, ordinal)?;

        let stderr_output = stderr_task
            .join()
            .unwrap_or_else(|_| "<failed to join stderr reader>".to_string());
        let progress = progress_task.join().unwrap_or_default();

        if !status.success() {
            return Err(ReelsError::encode(
                ordinal,
                format!("ffmpeg exited with {status}: {}", stderr_output.trim()),
            ));
        }
        tracing::debug!(
            ordinal,
            out_time_secs = progress.out_time_secs,
            "ffmpeg finished"
        );
        Ok(())
    }

    fn wait_with_timeout(
        &self,
        child: &mut std::process::Child,
        ordinal: usize,
    ) -> ReelsResult<ExitStatus> {
        let Some(timeout) = self.timeout else {
            return child
                .wait()
                .map_err(|e| ReelsError::encode(ordinal, format!("Failed to wait on ffmpeg: {e}")));
        };

        let started = Instant::now();
        loop {
            match child.try_wait() {
                Ok(Some(status)) => return Ok(status),
                Ok(None) if started.elapsed() >= timeout => {
                    tracing::warn!(ordinal, timeout_secs = timeout.as_secs(), "Killing stuck ffmpeg");
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(ReelsError::encode(
                        ordinal,
                        format!("ffmpeg timed out after {}s", timeout.as_secs()),
                    ));
                }
                Ok(None) => std::thread::sleep(Duration::from_millis(50)),
                Err(e) => {
                    return Err(ReelsError::encode(
                        ordinal,
                        format!("Failed to wait on ffmpeg: {e}"),
                    ))
                }
            }
        }
    }
}

impl MediaIo for FfmpegMedia {
    fn probe(&self, path: &Path) -> ReelsResult<SourceVideo> {
        if !path.is_file() {
            return Err(ReelsError::asset_not_found("input_video", path));
        }
        which::which("ffprobe").map_err(|_| ReelsError::media("ffprobe not found in PATH"))?;

        let output = Command::new("ffprobe")
            .args([
                "-v",
                "quiet",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
            ])
            .arg(path)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| ReelsError::media(format!("Failed to run ffprobe: {e}")))?;

        if !output.status.success() {
            return Err(ReelsError::media(format!(
                "ffprobe failed on {}: {}",
                path.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let source = parse_probe_output(path, &output.stdout)?;
        tracing::info!(
            input = %path.display(),
            duration_secs = source.duration_secs,
            width = source.width,
            height = source.height,
            fps = source.fps,
            has_audio = source.has_audio,
            "Probed source video"
        );
        Ok(source)
    }

    fn extract(&self, source: &Arc<SourceVideo>, window: TimeWindow) -> ReelsResult<SubClip> {
        check_window(source, window)?;
        // Seeking happens at encode time with input-side `-ss/-t`.
        Ok(SubClip {
            source: Arc::clone(source),
            window,
        })
    }

    fn encode(
        &self,
        composition: &SegmentComposition,
        settings: &OutputSettings,
        output: &Path,
    ) -> ReelsResult<()> {
        let args = build_ffmpeg_args(composition, settings, output);
        self.run_ffmpeg(&args, composition.segment.ordinal, composition.duration())
    }

    fn is_available(&self) -> bool {
        which::which("ffmpeg").is_ok() && which::which("ffprobe").is_ok()
    }

    fn name(&self) -> &str {
        "ffmpeg"
    }
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    format: Option<FfprobeFormat>,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    avg_frame_rate: Option<String>,
    r_frame_rate: Option<String>,
    duration: Option<String>,
    #[serde(default)]
    side_data_list: Vec<FfprobeSideData>,
    #[serde(default)]
    tags: Option<FfprobeTags>,
}

#[derive(Debug, Deserialize)]
struct FfprobeSideData {
    rotation: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct FfprobeTags {
    rotate: Option<String>,
}

impl FfprobeStream {
    /// Display rotation in degrees; the display matrix wins over the legacy tag.
    fn rotation(&self) -> f64 {
        self.side_data_list
            .iter()
            .find_map(|d| d.rotation)
            .or_else(|| {
                self.tags
                    .as_ref()
                    .and_then(|t| t.rotate.as_deref())
                    .and_then(|r| r.trim().parse().ok())
            })
            .unwrap_or(0.0)
    }

    /// Frame size after ffmpeg applies the display rotation.
    fn display_size(&self) -> (u32, u32) {
        let (w, h) = (self.width.unwrap_or(0), self.height.unwrap_or(0));
        let quarter_turns = (self.rotation() / 90.0).round() as i64;
        if quarter_turns.rem_euclid(2) == 1 {
            (h, w)
        } else {
            (w, h)
        }
    }
}

/// Parse `ffprobe -print_format json -show_format -show_streams` output.
pub fn parse_probe_output(path: &Path, json: &[u8]) -> ReelsResult<SourceVideo> {
    let probe: FfprobeOutput = serde_json::from_slice(json)?;

    let video = probe
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| ReelsError::media(format!("No video stream in {}", path.display())))?;
    let has_audio = probe
        .streams
        .iter()
        .any(|s| s.codec_type.as_deref() == Some("audio"));

    let duration_secs = probe
        .format
        .as_ref()
        .and_then(|f| f.duration.as_deref())
        .or(video.duration.as_deref())
        .and_then(|d| d.parse::<f64>().ok())
        .ok_or_else(|| ReelsError::media(format!("Unknown duration for {}", path.display())))?;

    let fps = video
        .avg_frame_rate
        .as_deref()
        .and_then(parse_frame_rate)
        .or_else(|| video.r_frame_rate.as_deref().and_then(parse_frame_rate))
        .unwrap_or(30.0);

    let (width, height) = video.display_size();
    Ok(SourceVideo {
        path: path.to_path_buf(),
        duration_secs,
        width,
        height,
        fps,
        has_audio,
    })
}

/// Parse `"30000/1001"` or `"25"` into frames per second.
fn parse_frame_rate(rate: &str) -> Option<f64> {
    let fps = match rate.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().ok()?;
            let den: f64 = den.trim().parse().ok()?;
            if den == 0.0 {
                return None;
            }
            num / den
        }
        None => rate.trim().parse().ok()?,
    };
    (fps.is_finite() && fps > 0.0).then_some(fps)
}

/// Full ffmpeg argument list for one composed segment.
///
/// Input 0 is the source, seeked to the window. Each still layer is an
/// additional looped image input, in layer order.
pub fn build_ffmpeg_args(
    composition: &SegmentComposition,
    settings: &OutputSettings,
    output: &Path,
) -> Vec<String> {
    let duration = format_secs(composition.duration());
    let mut args: Vec<String> = vec![
        "-y".into(),
        "-hide_banner".into(),
        "-nostats".into(),
        "-progress".into(),
        "pipe:1".into(),
        "-ss".into(),
        format_secs(composition.clip.window.start),
        "-t".into(),
        duration.clone(),
        "-i".into(),
        composition.clip.source.path.display().to_string(),
    ];

    for layer in &composition.layers {
        if let LayerContent::Still { png } = &layer.content {
            args.extend([
                "-loop".into(),
                "1".into(),
                "-t".into(),
                duration.clone(),
                "-i".into(),
                png.display().to_string(),
            ]);
        }
    }

    args.push("-filter_complex".into());
    args.push(build_filter_graph(composition, settings));
    args.extend(["-map".into(), "[vout]".into(), "-map".into(), "0:a?".into()]);
    args.extend(["-r".into(), settings.fps.to_string(), "-t".into(), duration]);
    args.extend(codec_args(settings));
    args.push(output.display().to_string());
    args
}

/// The `-filter_complex` graph stacking every layer in z-order onto a
/// black canvas.
pub fn build_filter_graph(composition: &SegmentComposition, settings: &OutputSettings) -> String {
    let (w, h) = (settings.width, settings.height);
    let duration = format_secs(composition.duration());
    let mut chains: Vec<String> = Vec::new();

    chains.push(format!(
        "color=c=black:s={w}x{h}:r={fps}:d={duration}[base0]",
        fps = settings.fps
    ));

    // The source stream feeds every video layer; split it when shared.
    let video_layers = composition
        .layers
        .iter()
        .filter(|l| !matches!(l.content, LayerContent::Still { .. }))
        .count();
    let mut video_labels: Vec<String> = if video_layers > 1 {
        let labels: Vec<String> = (0..video_layers).map(|i| format!("src{i}")).collect();
        chains.push(format!(
            "[0:v]split={video_layers}{}",
            labels.iter().map(|l| format!("[{l}]")).collect::<String>()
        ));
        labels
    } else {
        vec!["0:v".to_string()]
    };
    video_labels.reverse();

    let mut still_input = 1usize;
    let mut current = "base0".to_string();

    for (i, layer) in composition.layers.iter().enumerate() {
        let layer_label = format!("l{i}");
        let rect = layer.rect;
        match &layer.content {
            LayerContent::Still { .. } => {
                chains.push(format!("[{still_input}:v]format=rgba[{layer_label}]"));
                still_input += 1;
            }
            LayerContent::Video => {
                let src = video_labels.pop().unwrap_or_else(|| "0:v".to_string());
                chains.push(format!(
                    "[{src}]scale={}:{},setsar=1[{layer_label}]",
                    rect.w, rect.h
                ));
            }
            LayerContent::BlurredVideo { radius } => {
                let src = video_labels.pop().unwrap_or_else(|| "0:v".to_string());
                chains.push(format!(
                    "[{src}]scale={}:{}:force_original_aspect_ratio=increase,crop={}:{},boxblur={radius}:1,setsar=1[{layer_label}]",
                    rect.w, rect.h, rect.w, rect.h
                ));
            }
        }

        let next = format!("base{}", i + 1);
        chains.push(format!(
            "[{current}][{layer_label}]overlay=x={x}:y={y}:enable='between(t,{start},{end})'[{next}]",
            x = rect.x,
            y = rect.y,
            start = format_secs(layer.start),
            end = format_secs(layer.end),
        ));
        current = next;
    }

    chains.push(format!("[{current}]format={}[vout]", settings.pixel_format));
    chains.join(";")
}

fn codec_args(settings: &OutputSettings) -> Vec<String> {
    vec![
        "-c:v".to_string(),
        settings.video_codec.clone(),
        "-preset".to_string(),
        settings.preset.clone(),
        "-pix_fmt".to_string(),
        settings.pixel_format.clone(),
        "-c:a".to_string(),
        settings.audio_codec.clone(),
        "-movflags".to_string(),
        "+faststart".to_string(),
    ]
}

fn format_secs(secs: f64) -> String {
    format!("{secs:.6}")
}

#[derive(Debug, Default)]
struct ProgressState {
    out_time_secs: f64,
    complete: bool,
}

impl ProgressState {
    fn update(&mut self, key: &str, value: &str) {
        match key {
            "out_time_us" | "out_time_ms" => {
                // ffmpeg reports microseconds under both keys.
                if let Ok(us) = value.parse::<f64>() {
                    self.out_time_secs = us / 1_000_000.0;
                }
            }
            "progress" => self.complete = value == "end",
            _ => {}
        }
    }

    fn fraction(&self, expected_secs: f64) -> f64 {
        if self.complete {
            return 1.0;
        }
        if expected_secs <= 0.0 {
            return 0.0;
        }
        (self.out_time_secs / expected_secs).clamp(0.0, 1.0)
    }
}
