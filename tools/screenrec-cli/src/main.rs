//! screenrec CLI: record the screen and microphone from a terminal.
//!
//! Usage:
//!   screenrec record --format <FMT> --output <PATH>   Record until Ctrl+C, then save
//!   screenrec save --format <FMT> --output <PATH>     Save temporaries left by an earlier session
//!   screenrec mics                                    List functional microphones
//!   screenrec check                                   Check system capabilities

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use screenrec_capture_engine::VideoFormat;
use screenrec_common::config::AppConfig;

mod commands;

#[derive(Parser)]
#[command(
    name = "screenrec",
    about = "Record the screen and microphone into avi, mp4 or mkv",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Directory for temporary files (overrides the config file)
    #[arg(long, global = true)]
    work_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record until Ctrl+C, then save
    Record {
        /// Container format: avi, mp4 or mkv
        #[arg(short, long, value_parser = parse_format)]
        format: VideoFormat,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// Save video and audio as two files
        #[arg(long)]
        separate: bool,

        /// Skip the countdown
        #[arg(long)]
        no_countdown: bool,
    },

    /// Save the temporaries of an earlier session
    Save {
        /// Format the session was recorded in
        #[arg(short, long, value_parser = parse_format)]
        format: VideoFormat,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// Save video and audio as two files
        #[arg(long)]
        separate: bool,
    },

    /// List microphones that can be opened
    Mics,

    /// Check system capabilities
    Check,
}

fn parse_format(value: &str) -> Result<VideoFormat, String> {
    value.parse::<VideoFormat>().map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load();
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    if let Some(work_dir) = cli.work_dir {
        config.recording.work_dir = work_dir;
    }
    screenrec_common::logging::init_logging(&config.logging);

    match cli.command {
        Commands::Record {
            format,
            output,
            separate,
            no_countdown,
        } => commands::record::run(&config, format, output, !separate, !no_countdown).await,
        Commands::Save {
            format,
            output,
            separate,
        } => commands::save::run(&config, format, output, !separate).await,
        Commands::Mics => commands::mics::run(&config),
        Commands::Check => commands::check::run(&config),
    }
}
