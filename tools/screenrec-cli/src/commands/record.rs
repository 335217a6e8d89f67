//! Record until Ctrl+C, then save.

use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use screenrec_capture_engine::{CaptureSession, ScreenOutcome, SessionConfig, VideoFormat};
use screenrec_common::clock::format_elapsed;
use screenrec_common::config::AppConfig;

pub async fn run(
    config: &AppConfig,
    format: VideoFormat,
    output: PathBuf,
    combine: bool,
    countdown: bool,
) -> anyhow::Result<()> {
    println!("Format: {format}");
    println!("Output: {}", output.display());
    println!(
        "Mode:   {}",
        if combine {
            "combined"
        } else {
            "separate video and audio"
        }
    );
    println!();

    if countdown {
        for n in (1..=config.recording.countdown_secs).rev() {
            println!("{n}...");
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
    }

    let mut session = CaptureSession::new(SessionConfig::from(&config.recording));
    session.start(format).await?;

    println!("Recording. Press Ctrl+C to stop...");
    let mut ticker = tokio::time::interval(Duration::from_millis(500));
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    loop {
        tokio::select! {
            res = &mut ctrl_c => {
                res?;
                break;
            }
            _ = ticker.tick() => {
                print!("\r  {}", format_elapsed(session.elapsed_secs() as u64));
                std::io::stdout().flush().ok();
            }
        }
    }
    println!();

    let summary = session.stop().await?;
    println!("{}", summary.describe());
    if let ScreenOutcome::Failed { message } = &summary.screen {
        tracing::warn!(%message, "Screen capture failed");
    }

    let outcome = super::save::save(config, format, output, combine).await?;
    super::save::print_outcome(&outcome);
    Ok(())
}
