//! Video container formats and the temporary files a session produces.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use screenrec_common::error::RecorderError;
use serde::{Deserialize, Serialize};

/// Temporary audio file name.
pub const TEMP_AUDIO_NAME: &str = "audio.wav";

/// Size of a canonical PCM WAV header. An audio file no larger than this
/// holds no samples.
pub const WAV_HEADER_LEN: u64 = 44;

/// Container/codec selection for one recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoFormat {
    Avi,
    Mp4,
    Mkv,
}

impl VideoFormat {
    pub const ALL: [VideoFormat; 3] = [VideoFormat::Avi, VideoFormat::Mp4, VideoFormat::Mkv];

    /// File extension without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            VideoFormat::Avi => "avi",
            VideoFormat::Mp4 => "mp4",
            VideoFormat::Mkv => "mkv",
        }
    }

    /// Name of the temporary video file for this format.
    pub fn temp_video_name(self) -> String {
        format!("recording.{}", self.extension())
    }

    /// GStreamer encoder and muxer chain for this format.
    pub(crate) fn gst_encoder_chain(self, fps: u32) -> String {
        let keyint = fps.saturating_mul(2).max(2);
        match self {
            // MPEG-4 Part 2 is the XVID/mp4v bitstream.
            VideoFormat::Avi => {
                "avenc_mpeg4 bitrate=4000000 ! queue max-size-buffers=8 ! avimux".to_string()
            }
            VideoFormat::Mp4 => {
                "avenc_mpeg4 bitrate=4000000 ! queue max-size-buffers=8 ! mp4mux".to_string()
            }
            VideoFormat::Mkv => format!(
                "x264enc tune=zerolatency speed-preset=veryfast key-int-max={keyint} ! h264parse ! queue max-size-buffers=8 ! matroskamux"
            ),
        }
    }
}

impl fmt::Display for VideoFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for VideoFormat {
    type Err = RecorderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().trim_start_matches('.').to_ascii_lowercase().as_str() {
            "avi" => Ok(VideoFormat::Avi),
            "mp4" => Ok(VideoFormat::Mp4),
            "mkv" => Ok(VideoFormat::Mkv),
            other => Err(RecorderError::config(format!(
                "Unsupported video format '{other}' (expected avi, mp4 or mkv)"
            ))),
        }
    }
}

/// The fixed-name temporary files of one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TempFiles {
    pub video: PathBuf,
    pub audio: PathBuf,
}

impl TempFiles {
    pub fn new(work_dir: &Path, format: VideoFormat) -> Self {
        Self {
            video: work_dir.join(format.temp_video_name()),
            audio: work_dir.join(TEMP_AUDIO_NAME),
        }
    }

    pub fn video_exists(&self) -> bool {
        self.video.is_file()
    }

    /// Whether the audio file exists and holds at least one sample.
    pub fn audio_usable(&self) -> bool {
        std::fs::metadata(&self.audio)
            .map(|m| m.is_file() && m.len() > WAV_HEADER_LEN)
            .unwrap_or(false)
    }

    /// Remove both files, ignoring ones that do not exist.
    pub fn remove_all(&self) -> std::io::Result<()> {
        for path in [&self.video, &self.audio] {
            match std::fs::remove_file(path) {
                Ok(()) => tracing::debug!(path = %path.display(), "Removed temporary file"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_formats() {
        assert_eq!("avi".parse::<VideoFormat>().unwrap(), VideoFormat::Avi);
        assert_eq!(".MP4".parse::<VideoFormat>().unwrap(), VideoFormat::Mp4);
        assert_eq!(" mkv ".parse::<VideoFormat>().unwrap(), VideoFormat::Mkv);
        assert!("webm".parse::<VideoFormat>().is_err());
        assert!("".parse::<VideoFormat>().is_err());
    }

    #[test]
    fn test_codec_mapping() {
        assert!(VideoFormat::Avi.gst_encoder_chain(20).ends_with("avimux"));
        assert!(VideoFormat::Mp4.gst_encoder_chain(20).ends_with("mp4mux"));
        assert!(VideoFormat::Mkv
            .gst_encoder_chain(20)
            .contains("key-int-max=40"));
    }

    #[test]
    fn test_temp_file_names() {
        let files = TempFiles::new(Path::new("/work"), VideoFormat::Mkv);
        assert_eq!(files.video, PathBuf::from("/work/recording.mkv"));
        assert_eq!(files.audio, PathBuf::from("/work/audio.wav"));
    }

    #[test]
    fn test_header_only_audio_is_not_usable() {
        let dir = std::env::temp_dir().join("screenrec_test_temp_files");
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        let files = TempFiles::new(&dir, VideoFormat::Mp4);

        assert!(!files.audio_usable());
        std::fs::write(&files.audio, [0u8; 44]).unwrap();
        assert!(!files.audio_usable());
        std::fs::write(&files.audio, [0u8; 46]).unwrap();
        assert!(files.audio_usable());

        files.remove_all().unwrap();
        assert!(!files.audio.exists());
        // Removing again is a no-op.
        files.remove_all().unwrap();

        std::fs::remove_dir_all(&dir).ok();
    }
}
