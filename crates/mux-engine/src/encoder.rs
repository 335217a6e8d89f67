//! External encoder invocation.

use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use screenrec_common::config::EncoderConfig;
use screenrec_common::error::{RecorderError, RecorderResult};

/// Something that can combine a video file and an audio file into one
/// container.
pub trait Muxer: Send + Sync {
    /// Copy the video stream of `video`, encode `audio` and write both to
    /// `output`, overwriting it.
    fn mux(&self, video: &Path, audio: &Path, output: &Path) -> RecorderResult<()>;

    /// Check if the encoder can be run on this system.
    fn is_available(&self) -> bool;

    /// Encoder name.
    fn name(&self) -> &str;
}

/// Runs the `ffmpeg` executable.
#[derive(Debug, Clone)]
pub struct FfmpegMuxer {
    /// Configured binary name, kept for error messages.
    binary: String,

    /// Resolved executable, if one was found.
    program: Option<PathBuf>,

    /// Audio codec passed to `-c:a`.
    audio_codec: String,
}

impl FfmpegMuxer {
    /// Locate the encoder described by `config`.
    pub fn from_config(config: &EncoderConfig) -> Self {
        let program = locate_encoder(&config.binary);
        match &program {
            Some(path) => tracing::debug!(encoder = %path.display(), "Encoder located"),
            None => tracing::warn!(binary = %config.binary, "Encoder not found on PATH or next to the executable"),
        }
        Self {
            binary: config.binary.clone(),
            program,
            audio_codec: config.audio_codec.clone(),
        }
    }

    /// Use `program` as-is without any lookup.
    pub fn with_program(program: impl Into<PathBuf>, audio_codec: impl Into<String>) -> Self {
        let program = program.into();
        Self {
            binary: program.to_string_lossy().into_owned(),
            program: Some(program),
            audio_codec: audio_codec.into(),
        }
    }

    /// The executable that will be run.
    pub fn program(&self) -> Option<&Path> {
        self.program.as_deref()
    }

    fn run(&self, program: &Path, args: &[String]) -> RecorderResult<()> {
        tracing::debug!(program = %program.display(), ?args, "Running encoder");
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| RecorderError::mux(format!("Failed to start {}: {e}", self.binary)))?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| RecorderError::mux("Failed to capture encoder stderr"))?;

        // ffmpeg blocks once the stderr pipe fills up.
        let stderr_task = std::thread::spawn(move || -> String {
            let mut reader = BufReader::new(stderr);
            let mut output = String::new();
            match reader.read_to_string(&mut output) {
                Ok(_) => output,
                Err(err) => format!("<failed to read encoder stderr: {err}>"),
            }
        });

        let status = child
            .wait()
            .map_err(|e| RecorderError::mux(format!("Failed to wait on {}: {e}", self.binary)))?;

        let stderr_output = stderr_task
            .join()
            .unwrap_or_else(|_| "<failed to join stderr reader>".to_string());

        if !status.success() {
            return Err(RecorderError::mux(format!(
                "{} failed (status {}): {}",
                self.binary,
                status,
                last_lines(&stderr_output, 8)
            )));
        }
        Ok(())
    }
}

impl Default for FfmpegMuxer {
    fn default() -> Self {
        Self::from_config(&EncoderConfig::default())
    }
}

impl Muxer for FfmpegMuxer {
    fn mux(&self, video: &Path, audio: &Path, output: &Path) -> RecorderResult<()> {
        let program = self
            .program
            .as_deref()
            .ok_or_else(|| RecorderError::EncoderUnavailable {
                binary: self.binary.clone(),
            })?;

        let args = mux_args(video, audio, output, &self.audio_codec);
        let start = std::time::Instant::now();
        self.run(program, &args)?;
        tracing::info!(
            output = %output.display(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Video and audio combined"
        );
        Ok(())
    }

    fn is_available(&self) -> bool {
        self.program.is_some()
    }

    fn name(&self) -> &str {
        "ffmpeg"
    }
}

/// Arguments for `-y -i <video> -i <audio> -c:v copy -c:a <codec> <output>`.
pub fn mux_args(video: &Path, audio: &Path, output: &Path, audio_codec: &str) -> Vec<String> {
    vec![
        "-y".to_string(),
        "-i".to_string(),
        video.to_string_lossy().into_owned(),
        "-i".to_string(),
        audio.to_string_lossy().into_owned(),
        "-c:v".to_string(),
        "copy".to_string(),
        "-c:a".to_string(),
        audio_codec.to_string(),
        output.to_string_lossy().into_owned(),
    ]
}

/// Resolve `binary` to something runnable: an explicit path, a name on
/// `PATH`, or a copy bundled under `ffmpeg/bin/` next to the executable.
pub fn locate_encoder(binary: &str) -> Option<PathBuf> {
    let as_path = Path::new(binary);
    if as_path.components().count() > 1 {
        return as_path.is_file().then(|| as_path.to_path_buf());
    }
    if command_exists(binary) {
        return Some(PathBuf::from(binary));
    }

    let exe_dir = std::env::current_exe().ok()?.parent()?.to_path_buf();
    let bundled = bundled_encoder_path(&exe_dir, binary);
    bundled.is_file().then_some(bundled)
}

/// Where a bundled encoder is expected relative to `exe_dir`.
pub fn bundled_encoder_path(exe_dir: &Path, binary: &str) -> PathBuf {
    let file_name = if cfg!(windows) && !binary.ends_with(".exe") {
        format!("{binary}.exe")
    } else {
        binary.to_string()
    };
    exe_dir.join("ffmpeg").join("bin").join(file_name)
}

/// Whether `binary` resolves on `PATH`.
pub fn command_exists(binary: &str) -> bool {
    if cfg!(windows) {
        return Command::new("where")
            .arg(binary)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|status| status.success())
            .unwrap_or(false);
    }
    Command::new("sh")
        .arg("-c")
        .arg("command -v \"$1\" >/dev/null 2>&1")
        .arg("sh")
        .arg(binary)
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

fn last_lines(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text.trim().lines().collect();
    lines[lines.len().saturating_sub(n)..].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mux_args_copy_video_and_encode_audio() {
        let args = mux_args(
            Path::new("recording.mkv"),
            Path::new("audio.wav"),
            Path::new("/out/final.mkv"),
            "aac",
        );
        assert_eq!(
            args,
            vec![
                "-y",
                "-i",
                "recording.mkv",
                "-i",
                "audio.wav",
                "-c:v",
                "copy",
                "-c:a",
                "aac",
                "/out/final.mkv"
            ]
        );
    }

    #[test]
    fn test_bundled_path_layout() {
        let path = bundled_encoder_path(Path::new("/opt/screenrec"), "ffmpeg");
        let expected = if cfg!(windows) {
            "ffmpeg.exe"
        } else {
            "ffmpeg"
        };
        assert_eq!(
            path,
            Path::new("/opt/screenrec").join("ffmpeg").join("bin").join(expected)
        );
    }

    #[test]
    fn test_missing_encoder_reports_unavailable() {
        let muxer = FfmpegMuxer::from_config(&EncoderConfig {
            binary: "screenrec-no-such-encoder".to_string(),
            audio_codec: "aac".to_string(),
        });
        assert!(!muxer.is_available());

        let err = muxer
            .mux(Path::new("a.avi"), Path::new("a.wav"), Path::new("out.avi"))
            .unwrap_err();
        assert!(matches!(
            err,
            RecorderError::EncoderUnavailable { ref binary } if binary == "screenrec-no-such-encoder"
        ));
    }

    #[test]
    fn test_explicit_missing_path_is_not_located() {
        assert!(locate_encoder("/definitely/not/here/ffmpeg").is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_command_exists_finds_shell() {
        assert!(command_exists("sh"));
        assert!(!command_exists("screenrec-no-such-encoder"));
    }

    #[cfg(unix)]
    #[test]
    fn test_failing_encoder_is_a_mux_error() {
        let muxer = FfmpegMuxer::with_program("false", "aac");
        let err = muxer
            .mux(Path::new("v.avi"), Path::new("a.wav"), Path::new("out.avi"))
            .unwrap_err();
        assert!(matches!(err, RecorderError::Mux { .. }));
        assert!(err.to_string().contains("false failed"));
    }

    #[test]
    fn test_last_lines_keeps_tail() {
        assert_eq!(last_lines("a\nb\nc\n", 2), "b\nc");
        assert_eq!(last_lines("only", 5), "only");
        assert_eq!(last_lines("", 3), "");
    }
}
