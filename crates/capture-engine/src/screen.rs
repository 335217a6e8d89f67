//! The screen capture loop.

use std::path::{Path, PathBuf};
use std::time::Duration;

use screenrec_common::clock::{RateController, RecordingClock};
use screenrec_common::config::FramePacing;
use screenrec_common::error::{RecorderError, RecorderResult};

use crate::backend::{BgrFrame, CapturedImage, FrameWriterFactory, ScreenSourceFactory, VideoSpec};
use crate::format::VideoFormat;
use crate::signal::RecordingFlag;

/// Parameters of one screen capture run.
#[derive(Debug, Clone)]
pub struct ScreenJob {
    pub output_path: PathBuf,
    pub format: VideoFormat,
    pub fps: u32,
    pub pacing: FramePacing,
}

/// How a screen capture run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScreenOutcome {
    /// The container at `path` was finalized with `frames` frames.
    Completed { path: PathBuf, frames: u64 },
    /// The display or the writer could not be opened, or finalizing failed.
    Failed { message: String },
}

/// Capture frames into `job.output_path` while `flag` is set.
pub fn record_screen(
    screens: &dyn ScreenSourceFactory,
    writers: &dyn FrameWriterFactory,
    flag: &RecordingFlag,
    job: &ScreenJob,
) -> ScreenOutcome {
    match run(screens, writers, flag, job) {
        Ok(frames) => {
            tracing::info!(path = %job.output_path.display(), frames, "Screen recording ended");
            ScreenOutcome::Completed {
                path: job.output_path.clone(),
                frames,
            }
        }
        Err(e) => {
            tracing::error!(error = %e, path = %job.output_path.display(), "Screen recording failed");
            ScreenOutcome::Failed {
                message: e.to_string(),
            }
        }
    }
}

fn run(
    screens: &dyn ScreenSourceFactory,
    writers: &dyn FrameWriterFactory,
    flag: &RecordingFlag,
    job: &ScreenJob,
) -> RecorderResult<u64> {
    let mut source = screens.open()?;
    // The first grab fixes the native resolution of the stream.
    let first = rgba_to_bgr(source.grab()?)?;
    let spec = VideoSpec {
        format: job.format,
        width: first.width,
        height: first.height,
        fps: job.fps,
        pacing: job.pacing,
    };
    let mut writer = writers.open(&job.output_path, &spec)?;
    tracing::info!(
        path = %job.output_path.display(),
        width = spec.width,
        height = spec.height,
        fps = spec.fps,
        pacing = ?spec.pacing,
        "Screen recording started"
    );

    let clock = RecordingClock::start();
    let mut rate = RateController::new(job.fps);
    let frame_interval = Duration::from_nanos(rate.interval_ns());
    let mut pending = Some(first);
    let mut frames = 0u64;

    while flag.is_set() {
        if job.pacing == FramePacing::WallClock {
            std::thread::sleep(rate.until_next_tick(clock.elapsed_ns()));
            rate.should_tick(clock.elapsed_ns());
        }

        let frame = match pending.take() {
            Some(frame) => frame,
            None => match source.grab().and_then(rgba_to_bgr) {
                Ok(frame) => frame,
                Err(e) => {
                    tracing::error!(error = %e, "Error during screen recording");
                    break;
                }
            },
        };
        if (frame.width, frame.height) != (spec.width, spec.height) {
            tracing::error!(
                width = frame.width,
                height = frame.height,
                "Display resolution changed during recording"
            );
            break;
        }

        let timestamp = match job.pacing {
            FramePacing::WallClock => Duration::from_nanos(clock.elapsed_ns()),
            FramePacing::Nominal => frame_interval * frames as u32,
        };
        if let Err(e) = writer.write_frame(frame, timestamp) {
            tracing::error!(error = %e, "Error during screen recording");
            break;
        }
        frames += 1;
    }

    writer.finish()?;
    Ok(writer.frames_written())
}

/// Reorder RGBA pixels into packed BGR.
pub fn rgba_to_bgr(image: CapturedImage) -> RecorderResult<BgrFrame> {
    let expected = image.width as usize * image.height as usize * 4;
    if image.rgba.len() != expected {
        return Err(RecorderError::capture(format!(
            "Screenshot has {} bytes, expected {expected} for {}x{}",
            image.rgba.len(),
            image.width,
            image.height
        )));
    }

    let data = image
        .rgba
        .chunks_exact(4)
        .flat_map(|px| [px[2], px[1], px[0]])
        .collect();
    Ok(BgrFrame {
        width: image.width,
        height: image.height,
        data,
    })
}
