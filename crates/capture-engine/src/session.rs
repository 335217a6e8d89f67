//! Recording session management.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use screenrec_common::clock::RecordingClock;
use screenrec_common::config::{FramePacing, RecordingDefaults};
use screenrec_common::error::{RecorderError, RecorderResult};

use crate::audio::{record_audio, AudioOutcome};
use crate::backend::{AudioSpec, CaptureBackends};
use crate::format::{TempFiles, VideoFormat};
use crate::screen::{record_screen, ScreenJob, ScreenOutcome};
use crate::signal::{RecordingFlag, StopSignal};

/// Configuration shared by every session of a recorder.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Directory holding the temporary files.
    pub work_dir: PathBuf,

    /// Nominal video frame rate.
    pub fps: u32,

    /// Pause between launching audio and launching screen capture.
    pub warmup: Duration,

    /// Frame pacing strategy.
    pub pacing: FramePacing,

    /// Microphone format.
    pub audio: AudioSpec,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::from(&RecordingDefaults::default())
    }
}

impl From<&RecordingDefaults> for SessionConfig {
    fn from(defaults: &RecordingDefaults) -> Self {
        Self {
            work_dir: defaults.work_dir.clone(),
            fps: defaults.fps,
            warmup: defaults.warmup(),
            pacing: defaults.frame_pacing,
            audio: AudioSpec {
                sample_rate: defaults.sample_rate,
                channels: 1,
                chunk_frames: defaults.chunk_frames,
            },
        }
    }
}

/// State of a recording session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No capture running.
    Idle,
    /// Both capture loops are running.
    Recording,
    /// Waiting for the capture loops to drain.
    Stopping,
}

/// What a finished session left behind.
#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub format: VideoFormat,
    pub temp_files: TempFiles,
    pub screen: ScreenOutcome,
    pub audio: AudioOutcome,
    /// Seconds between screen capture launch and stop.
    pub duration_secs: f64,
}

impl SessionSummary {
    pub fn has_audio(&self) -> bool {
        self.audio.has_audio()
    }

    /// One-line report shown to the user after stopping.
    pub fn describe(&self) -> String {
        let sound = if self.has_audio() {
            "with sound"
        } else {
            "without sound"
        };
        format!("Recording lasted {:.2} seconds ({sound})", self.duration_secs)
    }
}

/// Coordinates the audio and screen capture loops of one recording at a
/// time.
pub struct CaptureSession {
    config: SessionConfig,
    backends: CaptureBackends,
    state: SessionState,
    format: Option<VideoFormat>,
    recording_flag: RecordingFlag,
    stop_signal: Option<StopSignal>,
    clock: Option<RecordingClock>,
    screen_task: Option<tokio::task::JoinHandle<ScreenOutcome>>,
    audio_task: Option<tokio::task::JoinHandle<AudioOutcome>>,
}

impl CaptureSession {
    /// Create a session recording with the platform's devices.
    pub fn new(config: SessionConfig) -> Self {
        Self::with_backends(config, CaptureBackends::platform_default())
    }

    pub fn with_backends(config: SessionConfig, backends: CaptureBackends) -> Self {
        Self {
            config,
            backends,
            state: SessionState::Idle,
            format: None,
            recording_flag: RecordingFlag::new(),
            stop_signal: None,
            clock: None,
            screen_task: None,
            audio_task: None,
        }
    }

    /// Current session state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_recording(&self) -> bool {
        self.recording_flag.is_set()
    }

    /// Format of the running session.
    pub fn format(&self) -> Option<VideoFormat> {
        self.format
    }

    /// Seconds since screen capture launched; zero when idle.
    pub fn elapsed_secs(&self) -> f64 {
        self.clock.as_ref().map(|c| c.elapsed_secs()).unwrap_or(0.0)
    }

    /// The clock anchored at screen capture launch.
    pub fn clock(&self) -> Option<&RecordingClock> {
        self.clock.as_ref()
    }

    /// Start recording.
    ///
    /// Audio capture launches first; screen capture follows after the
    /// warm-up delay so the audio track has no leading gap.
    pub async fn start(&mut self, format: VideoFormat) -> RecorderResult<()> {
        if self.state != SessionState::Idle || self.recording_flag.is_set() {
            tracing::warn!("Recording is already in progress");
            return Err(RecorderError::AlreadyRecording);
        }

        if let Some(stale) = self.audio_task.take() {
            // A cancelled start may still be flushing its audio file.
            let _ = stale.await;
        }

        std::fs::create_dir_all(&self.config.work_dir)?;
        let temp_files = TempFiles::new(&self.config.work_dir, format);
        // A stale audio file from an earlier session would otherwise be
        // muxed into this one when no microphone is available.
        temp_files.remove_all()?;

        tracing::info!(%format, work_dir = %self.config.work_dir.display(), "Starting capture session");
        self.recording_flag.set();

        let stop = StopSignal::new();
        let microphone = self.backends.microphone.clone();
        let audio_stop = stop.clone();
        let audio_path = temp_files.audio.clone();
        let audio_spec = self.config.audio;
        self.audio_task = Some(tokio::task::spawn_blocking(move || {
            record_audio(microphone.as_ref(), &audio_stop, &audio_path, &audio_spec)
        }));
        self.stop_signal = Some(stop.clone());

        let mut launch = LaunchGuard {
            flag: self.recording_flag.clone(),
            stop,
            armed: true,
        };
        tokio::time::sleep(self.config.warmup).await;
        launch.armed = false;

        let screens = Arc::clone(&self.backends.screen);
        let writers = Arc::clone(&self.backends.writer);
        let flag = self.recording_flag.clone();
        let job = ScreenJob {
            output_path: temp_files.video.clone(),
            format,
            fps: self.config.fps,
            pacing: self.config.pacing,
        };
        self.screen_task = Some(tokio::task::spawn_blocking(move || {
            record_screen(screens.as_ref(), writers.as_ref(), &flag, &job)
        }));

        let clock = RecordingClock::start();
        tracing::info!(epoch_wall = %clock.epoch_wall(), "Screen capture launched");
        self.clock = Some(clock);
        self.format = Some(format);
        self.state = SessionState::Recording;
        Ok(())
    }

    /// Stop recording and wait for both loops to finish their files.
    ///
    /// Screen capture is joined before audio is told to stop, so the audio
    /// track may run slightly longer than the video.
    pub async fn stop(&mut self) -> RecorderResult<SessionSummary> {
        if self.state != SessionState::Recording {
            return Err(RecorderError::NotRecording);
        }
        let format = self.format.ok_or(RecorderError::NotRecording)?;

        tracing::info!("Stopping capture session");
        self.state = SessionState::Stopping;
        let duration_secs = self.elapsed_secs();
        self.recording_flag.clear();

        let screen = match self.screen_task.take() {
            Some(handle) => handle.await.unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Screen capture join failed");
                ScreenOutcome::Failed {
                    message: e.to_string(),
                }
            }),
            None => ScreenOutcome::Failed {
                message: "Screen capture was not running".to_string(),
            },
        };

        if let Some(stop) = self.stop_signal.take() {
            stop.raise();
        }

        let audio = match self.audio_task.take() {
            Some(handle) => handle.await.unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Audio capture join failed");
                AudioOutcome::Failed {
                    message: e.to_string(),
                }
            }),
            None => AudioOutcome::NoMicrophone,
        };

        self.clock = None;
        self.format = None;
        self.state = SessionState::Idle;

        tracing::info!(
            duration_secs,
            ?screen,
            ?audio,
            "Recording stopped"
        );

        Ok(SessionSummary {
            format,
            temp_files: TempFiles::new(&self.config.work_dir, format),
            screen,
            audio,
            duration_secs,
        })
    }
}

/// Winds down a half-launched session when `start` is dropped during the
/// warm-up.
struct LaunchGuard {
    flag: RecordingFlag,
    stop: StopSignal,
    armed: bool,
}

impl Drop for LaunchGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        tracing::warn!("Start cancelled during warm-up; stopping audio capture");
        self.flag.clear();
        self.stop.raise();
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        // Let detached workers wind down if the owner goes away mid-session.
        self.recording_flag.clear();
        if let Some(stop) = self.stop_signal.take() {
            stop.raise();
        }
    }
}
