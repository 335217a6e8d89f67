//! Save the temporaries of a finished session.

use std::path::PathBuf;

use screenrec_capture_engine::VideoFormat;
use screenrec_common::config::AppConfig;
use screenrec_mux_engine::{
    save_recording, with_format_extension, FfmpegMuxer, SaveOutcome, SaveRequest,
};

pub async fn run(
    config: &AppConfig,
    format: VideoFormat,
    output: PathBuf,
    combine: bool,
) -> anyhow::Result<()> {
    let outcome = save(config, format, output, combine).await?;
    print_outcome(&outcome);
    Ok(())
}

/// Route the temporaries in the configured work directory to `output`.
pub async fn save(
    config: &AppConfig,
    format: VideoFormat,
    output: PathBuf,
    combine: bool,
) -> anyhow::Result<SaveOutcome> {
    let request = SaveRequest {
        save_path: with_format_extension(&output, format),
        format,
        combine,
        work_dir: config.recording.work_dir.clone(),
    };
    let encoder = config.encoder.clone();

    // Moving large files and running the encoder both block.
    let outcome = tokio::task::spawn_blocking(move || {
        let muxer = FfmpegMuxer::from_config(&encoder);
        save_recording(&request, &muxer)
    })
    .await??;
    Ok(outcome)
}

pub fn print_outcome(outcome: &SaveOutcome) {
    match outcome {
        SaveOutcome::Combined { path } => println!("Recording saved to: {}", path.display()),
        SaveOutcome::VideoOnly { path } => {
            println!("No audio was recorded; video saved to: {}", path.display())
        }
        SaveOutcome::Separate { video, audio } => {
            println!("Video saved to: {}", video.display());
            match audio {
                Some(audio) => println!("Audio saved to: {}", audio.display()),
                None => println!("No audio was recorded"),
            }
        }
    }
}
