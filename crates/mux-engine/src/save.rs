//! Routing a finished recording to the user's chosen location.

use std::path::{Path, PathBuf};

use screenrec_capture_engine::format::{TempFiles, VideoFormat};
use screenrec_common::error::{RecorderError, RecorderResult};

use crate::encoder::Muxer;

/// Where and how to save the temporaries of the last session.
#[derive(Debug, Clone)]
pub struct SaveRequest {
    /// Destination chosen by the user.
    pub save_path: PathBuf,

    /// Format the session was recorded in.
    pub format: VideoFormat,

    /// Combine video and audio into one file instead of two.
    pub combine: bool,

    /// Directory holding the temporaries.
    pub work_dir: PathBuf,
}

impl SaveRequest {
    pub fn temp_files(&self) -> TempFiles {
        TempFiles::new(&self.work_dir, self.format)
    }
}

/// What a save produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Video and audio muxed into one file.
    Combined { path: PathBuf },
    /// No usable audio; the video was saved alone.
    VideoOnly { path: PathBuf },
    /// Video and audio saved next to each other.
    Separate {
        video: PathBuf,
        audio: Option<PathBuf>,
    },
}

impl SaveOutcome {
    /// Every file the save created.
    pub fn paths(&self) -> Vec<&Path> {
        match self {
            SaveOutcome::Combined { path } | SaveOutcome::VideoOnly { path } => vec![path],
            SaveOutcome::Separate { video, audio } => {
                let mut paths = vec![video.as_path()];
                paths.extend(audio.as_deref());
                paths
            }
        }
    }
}

/// Save the temporaries described by `request`.
///
/// The temporaries are removed only after the chosen branch succeeded; on
/// error they stay in place so the save can be retried.
pub fn save_recording(request: &SaveRequest, muxer: &dyn Muxer) -> RecorderResult<SaveOutcome> {
    let temps = request.temp_files();
    if !temps.video_exists() {
        tracing::error!(path = %temps.video.display(), "Recording missing");
        return Err(RecorderError::RecordingMissing { path: temps.video });
    }
    let has_audio = temps.audio_usable();
    let (video_path, audio_path) = separate_output_paths(&request.save_path, request.format);
    let targets: Vec<&Path> = if request.combine {
        vec![request.save_path.as_path()]
    } else {
        vec![video_path.as_path(), audio_path.as_path()]
    };
    for target in targets {
        if is_temporary(target, &temps) {
            tracing::error!(path = %target.display(), "Save target is a temporary file");
            return Err(RecorderError::SaveTargetIsTemporary {
                path: target.to_path_buf(),
            });
        }
    }

    let outcome = if request.combine {
        if has_audio {
            muxer
                .mux(&temps.video, &temps.audio, &request.save_path)
                .map_err(|e| {
                    tracing::error!(error = %e, encoder = muxer.name(), "Failed to combine video and audio");
                    e
                })?;
            SaveOutcome::Combined {
                path: request.save_path.clone(),
            }
        } else {
            tracing::warn!("No audio was recorded; saving video only");
            move_file(&temps.video, &request.save_path)?;
            SaveOutcome::VideoOnly {
                path: request.save_path.clone(),
            }
        }
    } else {
        let audio = if has_audio {
            move_file(&temps.audio, &audio_path)?;
            Some(audio_path)
        } else {
            tracing::warn!("No audio was recorded; saving video only");
            None
        };
        if let Err(e) = move_file(&temps.video, &video_path) {
            // Put the audio back so the whole save can be retried.
            if let Some(moved) = &audio {
                if let Err(restore_err) = move_file(moved, &temps.audio) {
                    tracing::warn!(error = %restore_err, path = %moved.display(), "Failed to restore audio temporary");
                }
            }
            return Err(e);
        }
        SaveOutcome::Separate {
            video: video_path,
            audio,
        }
    };

    temps.remove_all()?;
    tracing::info!(outcome = ?outcome, "Recording saved");
    Ok(outcome)
}

/// `<dir>/<stem>_video.<ext>` and `<dir>/<stem>_audio.wav` for a save path.
pub fn separate_output_paths(save_path: &Path, format: VideoFormat) -> (PathBuf, PathBuf) {
    let stem = save_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "recording".to_string());
    let dir = save_path.parent().unwrap_or_else(|| Path::new(""));
    (
        dir.join(format!("{stem}_video.{}", format.extension())),
        dir.join(format!("{stem}_audio.wav")),
    )
}

/// Force `path` to carry the extension of `format`.
pub fn with_format_extension(path: &Path, format: VideoFormat) -> PathBuf {
    let matches = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case(format.extension()))
        .unwrap_or(false);
    if matches {
        path.to_path_buf()
    } else {
        path.with_extension(format.extension())
    }
}

/// Whether `target` names one of the temporaries, after resolving
/// symlinks and relative components of its directory.
fn is_temporary(target: &Path, temps: &TempFiles) -> bool {
    let Some(target) = resolve(target) else {
        return false;
    };
    [&temps.video, &temps.audio]
        .into_iter()
        .filter_map(|temp| resolve(temp))
        .any(|temp| temp == target)
}

/// Canonical directory joined with the file name; the file itself need not
/// exist.
fn resolve(path: &Path) -> Option<PathBuf> {
    let name = path.file_name()?;
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    Some(dir.canonicalize().ok()?.join(name))
}

/// Rename, falling back to copy and remove when the rename crosses
/// filesystems.
pub fn move_file(from: &Path, to: &Path) -> RecorderResult<()> {
    if let Err(rename_err) = std::fs::rename(from, to) {
        tracing::debug!(
            from = %from.display(),
            to = %to.display(),
            error = %rename_err,
            "Rename failed; copying instead"
        );
        std::fs::copy(from, to)?;
        std::fs::remove_file(from)?;
    }
    tracing::debug!(from = %from.display(), to = %to.display(), "Moved file");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::Mutex;

    /// Concatenates both inputs into the output.
    #[derive(Default)]
    struct ConcatMuxer {
        calls: Mutex<Vec<(PathBuf, PathBuf, PathBuf)>>,
        fail: bool,
    }

    impl Muxer for ConcatMuxer {
        fn mux(&self, video: &Path, audio: &Path, output: &Path) -> RecorderResult<()> {
            self.calls.lock().unwrap().push((
                video.to_path_buf(),
                audio.to_path_buf(),
                output.to_path_buf(),
            ));
            if self.fail {
                return Err(RecorderError::mux("encoder crashed"));
            }
            let mut data = std::fs::read(video)?;
            data.extend(std::fs::read(audio)?);
            std::fs::write(output, data)?;
            Ok(())
        }

        fn is_available(&self) -> bool {
            true
        }

        fn name(&self) -> &str {
            "concat"
        }
    }

    struct Fixture {
        dir: PathBuf,
        request: SaveRequest,
    }

    impl Fixture {
        fn new(name: &str, format: VideoFormat, combine: bool) -> Self {
            let dir = std::env::temp_dir().join(name);
            let _ = std::fs::remove_dir_all(&dir);
            std::fs::create_dir_all(dir.join("out")).unwrap();
            let request = SaveRequest {
                save_path: dir.join("out").join(format!("clip.{}", format.extension())),
                format,
                combine,
                work_dir: dir.clone(),
            };
            Self { dir, request }
        }

        fn write_video(&self, bytes: &[u8]) {
            std::fs::write(&self.request.temp_files().video, bytes).unwrap();
        }

        fn write_audio(&self, len: usize) {
            std::fs::write(&self.request.temp_files().audio, vec![7u8; len]).unwrap();
        }
    }

    impl Drop for Fixture {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.dir);
        }
    }

    #[test]
    fn test_missing_video_is_reported_and_nothing_changes() {
        let fx = Fixture::new("screenrec_save_missing", VideoFormat::Mp4, true);
        fx.write_audio(100);
        let muxer = ConcatMuxer::default();

        let err = save_recording(&fx.request, &muxer).unwrap_err();
        assert!(matches!(err, RecorderError::RecordingMissing { .. }));
        assert!(fx.request.temp_files().audio.exists());
        assert!(!fx.request.save_path.exists());
        assert!(muxer.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_combine_with_audio_invokes_muxer_and_cleans_up() {
        let fx = Fixture::new("screenrec_save_combine", VideoFormat::Mkv, true);
        fx.write_video(b"video");
        fx.write_audio(64);
        let muxer = ConcatMuxer::default();

        let outcome = save_recording(&fx.request, &muxer).unwrap();
        assert_eq!(
            outcome,
            SaveOutcome::Combined {
                path: fx.request.save_path.clone()
            }
        );

        let calls = muxer.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        let temps = fx.request.temp_files();
        assert_eq!(calls[0], (temps.video.clone(), temps.audio.clone(), fx.request.save_path.clone()));

        assert_eq!(std::fs::read(&fx.request.save_path).unwrap().len(), 5 + 64);
        assert!(!temps.video.exists());
        assert!(!temps.audio.exists());
    }

    #[test]
    fn test_combine_without_audio_moves_video_unchanged() {
        let fx = Fixture::new("screenrec_save_video_only", VideoFormat::Avi, true);
        fx.write_video(b"exact video bytes");
        let muxer = ConcatMuxer::default();

        let outcome = save_recording(&fx.request, &muxer).unwrap();
        assert_eq!(
            outcome,
            SaveOutcome::VideoOnly {
                path: fx.request.save_path.clone()
            }
        );
        assert!(muxer.calls.lock().unwrap().is_empty());
        assert_eq!(
            std::fs::read(&fx.request.save_path).unwrap(),
            b"exact video bytes"
        );
        assert!(!fx.request.temp_files().video.exists());
    }

    #[test]
    fn test_header_only_audio_counts_as_no_audio() {
        let fx = Fixture::new("screenrec_save_header_only", VideoFormat::Mp4, true);
        fx.write_video(b"v");
        fx.write_audio(44);
        let muxer = ConcatMuxer::default();

        let outcome = save_recording(&fx.request, &muxer).unwrap();
        assert!(matches!(outcome, SaveOutcome::VideoOnly { .. }));
        assert!(muxer.calls.lock().unwrap().is_empty());
        let temps = fx.request.temp_files();
        assert!(!temps.video.exists());
        assert!(!temps.audio.exists());
    }

    #[test]
    fn test_separate_writes_video_and_audio_side_by_side() {
        let fx = Fixture::new("screenrec_save_separate", VideoFormat::Mkv, false);
        fx.write_video(b"video");
        fx.write_audio(100);
        let muxer = ConcatMuxer::default();

        let outcome = save_recording(&fx.request, &muxer).unwrap();
        let out = fx.dir.join("out");
        assert_eq!(
            outcome,
            SaveOutcome::Separate {
                video: out.join("clip_video.mkv"),
                audio: Some(out.join("clip_audio.wav")),
            }
        );
        assert_eq!(std::fs::read(out.join("clip_video.mkv")).unwrap(), b"video");
        assert_eq!(std::fs::read(out.join("clip_audio.wav")).unwrap().len(), 100);
        assert!(!fx.request.save_path.exists());
        assert!(muxer.calls.lock().unwrap().is_empty());
        assert_eq!(outcome.paths().len(), 2);
    }

    #[test]
    fn test_separate_without_audio_saves_video_only() {
        let fx = Fixture::new("screenrec_save_separate_silent", VideoFormat::Avi, false);
        fx.write_video(b"video");
        let muxer = ConcatMuxer::default();

        let outcome = save_recording(&fx.request, &muxer).unwrap();
        let out = fx.dir.join("out");
        assert_eq!(
            outcome,
            SaveOutcome::Separate {
                video: out.join("clip_video.avi"),
                audio: None,
            }
        );
        assert!(!out.join("clip_audio.wav").exists());
    }

    #[test]
    fn test_failed_mux_keeps_temporaries_for_retry() {
        let fx = Fixture::new("screenrec_save_retry", VideoFormat::Mp4, true);
        fx.write_video(b"video");
        fx.write_audio(80);

        let failing = ConcatMuxer {
            fail: true,
            ..Default::default()
        };
        assert!(save_recording(&fx.request, &failing).is_err());
        let temps = fx.request.temp_files();
        assert!(temps.video.exists());
        assert!(temps.audio_usable());

        let outcome = save_recording(&fx.request, &ConcatMuxer::default()).unwrap();
        assert!(matches!(outcome, SaveOutcome::Combined { .. }));
        assert!(!temps.video.exists());
        assert!(!temps.audio.exists());
    }

    #[test]
    fn test_saving_onto_temporary_video_is_refused() {
        let fx = Fixture::new("screenrec_save_onto_temp", VideoFormat::Mkv, true);
        fx.write_video(b"only copy");
        let temps = fx.request.temp_files();
        let request = SaveRequest {
            // Same file through a relative detour.
            save_path: fx.dir.join("out").join("..").join("recording.mkv"),
            ..fx.request.clone()
        };
        let muxer = ConcatMuxer::default();

        let err = save_recording(&request, &muxer).unwrap_err();
        assert!(matches!(err, RecorderError::SaveTargetIsTemporary { .. }));
        assert_eq!(std::fs::read(&temps.video).unwrap(), b"only copy");

        // With audio the encoder must not be asked to overwrite its input.
        fx.write_audio(100);
        let err = save_recording(&request, &muxer).unwrap_err();
        assert!(matches!(err, RecorderError::SaveTargetIsTemporary { .. }));
        assert!(muxer.calls.lock().unwrap().is_empty());
        assert!(temps.video.exists());
        assert!(temps.audio.exists());
    }

    #[test]
    fn test_failed_video_move_restores_audio() {
        let fx = Fixture::new("screenrec_save_separate_rollback", VideoFormat::Mp4, false);
        fx.write_video(b"video");
        fx.write_audio(100);
        let out = fx.dir.join("out");
        // A non-empty directory where the video should go.
        std::fs::create_dir_all(out.join("clip_video.mp4").join("blocker")).unwrap();

        assert!(save_recording(&fx.request, &ConcatMuxer::default()).is_err());
        let temps = fx.request.temp_files();
        assert!(temps.video.exists());
        assert!(temps.audio_usable());
        assert!(!out.join("clip_audio.wav").exists());

        std::fs::remove_dir_all(out.join("clip_video.mp4")).unwrap();
        let outcome = save_recording(&fx.request, &ConcatMuxer::default()).unwrap();
        assert_eq!(outcome.paths().len(), 2);
    }

    #[test]
    fn test_with_format_extension() {
        assert_eq!(
            with_format_extension(Path::new("/tmp/clip"), VideoFormat::Mp4),
            PathBuf::from("/tmp/clip.mp4")
        );
        assert_eq!(
            with_format_extension(Path::new("/tmp/clip.MKV"), VideoFormat::Mkv),
            PathBuf::from("/tmp/clip.MKV")
        );
        assert_eq!(
            with_format_extension(Path::new("/tmp/clip.mp4"), VideoFormat::Avi),
            PathBuf::from("/tmp/clip.avi")
        );
    }

    proptest! {
        #[test]
        fn separate_paths_share_directory_and_stem(
            stem in "[a-zA-Z0-9_-]{1,16}",
            idx in 0usize..3,
        ) {
            let format = VideoFormat::ALL[idx];
            let save_path = Path::new("/recordings").join(format!("{stem}.{}", format.extension()));
            let (video, audio) = separate_output_paths(&save_path, format);

            prop_assert_eq!(video.parent(), Some(Path::new("/recordings")));
            prop_assert_eq!(audio.parent(), Some(Path::new("/recordings")));
            prop_assert_eq!(
                video.file_name().unwrap().to_string_lossy().into_owned(),
                format!("{stem}_video.{}", format.extension())
            );
            prop_assert_eq!(
                audio.file_name().unwrap().to_string_lossy().into_owned(),
                format!("{stem}_audio.wav")
            );
        }
    }
}
