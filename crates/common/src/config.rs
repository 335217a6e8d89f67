//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Global application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Recording parameters.
    pub recording: RecordingDefaults,

    /// External encoder used for muxing.
    pub encoder: EncoderConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// How the screen loop timestamps and paces frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FramePacing {
    /// Throttle grabs to the nominal rate and stamp frames with their
    /// wall-clock offset so playback speed matches real time.
    #[default]
    WallClock,
    /// Write frames as fast as the loop runs, stamped `index / fps`.
    /// Playback runs fast when grabbing is slower than the nominal rate.
    Nominal,
}

/// Default recording parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingDefaults {
    /// Nominal video frame rate.
    pub fps: u32,

    /// Pause between starting audio and starting screen capture.
    pub warmup_ms: u64,

    /// Countdown shown before capture starts.
    pub countdown_secs: u32,

    /// Microphone sample rate.
    pub sample_rate: u32,

    /// Frames per microphone read.
    pub chunk_frames: usize,

    /// Frame pacing strategy.
    pub frame_pacing: FramePacing,

    /// Directory holding the temporary `recording.<ext>` / `audio.wav` files.
    pub work_dir: PathBuf,
}

/// External encoder settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    /// Encoder binary name or path.
    pub binary: String,

    /// Audio codec used when combining.
    pub audio_codec: String,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "screenrec=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for RecordingDefaults {
    fn default() -> Self {
        Self {
            fps: 20,
            warmup_ms: 500,
            countdown_secs: 3,
            sample_rate: 44_100,
            chunk_frames: 1024,
            frame_pacing: FramePacing::default(),
            work_dir: PathBuf::from("."),
        }
    }
}

impl RecordingDefaults {
    pub fn warmup(&self) -> Duration {
        Duration::from_millis(self.warmup_ms)
    }
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            binary: "ffmpeg".to_string(),
            audio_codec: "aac".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        Self::load_from(&config_file_path())
    }

    /// Load config from an explicit path, falling back to defaults.
    pub fn load_from(config_path: &std::path::Path) -> Self {
        if config_path.exists() {
            match std::fs::read_to_string(config_path) {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        tracing::warn!("Failed to parse config at {:?}: {}", config_path, e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read config at {:?}: {}", config_path, e);
                }
            }
        }
        Self::default()
    }

    /// Save config to the standard location.
    pub fn save(&self) -> Result<(), std::io::Error> {
        self.save_to(&config_file_path())
    }

    pub fn save_to(&self, config_path: &std::path::Path) -> Result<(), std::io::Error> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(config_path, json)
    }
}

/// Standard config file location.
pub fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("screenrec").join("config.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_capture_format() {
        let config = AppConfig::default();
        assert_eq!(config.recording.fps, 20);
        assert_eq!(config.recording.sample_rate, 44_100);
        assert_eq!(config.recording.chunk_frames, 1024);
        assert_eq!(config.recording.warmup(), Duration::from_millis(500));
        assert_eq!(config.encoder.binary, "ffmpeg");
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let parsed: AppConfig =
            serde_json::from_str(r#"{"recording":{"frame_pacing":"nominal"}}"#).unwrap();
        assert_eq!(parsed.recording.frame_pacing, FramePacing::Nominal);
        assert_eq!(parsed.recording.fps, 20);
        assert_eq!(parsed.logging.level, "info");
    }

    #[test]
    fn test_save_and_load_roundtrip_through_file() {
        let dir = std::env::temp_dir().join("screenrec_test_config");
        let _ = std::fs::remove_dir_all(&dir);
        let path = dir.join("config.json");

        let mut config = AppConfig::default();
        config.encoder.binary = "/opt/ffmpeg/bin/ffmpeg".to_string();
        config.save_to(&path).unwrap();

        let loaded = AppConfig::load_from(&path);
        assert_eq!(loaded.encoder.binary, "/opt/ffmpeg/bin/ffmpeg");

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_unparsable_config_falls_back_to_defaults() {
        let dir = std::env::temp_dir().join("screenrec_test_bad_config");
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.json");
        std::fs::write(&path, "{ not json").unwrap();

        let loaded = AppConfig::load_from(&path);
        assert_eq!(loaded.recording.fps, 20);

        std::fs::remove_dir_all(&dir).ok();
    }
}
