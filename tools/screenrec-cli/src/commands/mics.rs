//! List functional microphones.

use screenrec_capture_engine::backend::CpalMicrophoneBackend;
use screenrec_capture_engine::{list_active_microphones, SessionConfig};
use screenrec_common::config::AppConfig;

pub fn run(config: &AppConfig) -> anyhow::Result<()> {
    let spec = SessionConfig::from(&config.recording).audio;
    let microphones = list_active_microphones(&CpalMicrophoneBackend::new(), &spec);

    if microphones.is_empty() {
        println!("No available microphones found");
        return Ok(());
    }
    for (i, mic) in microphones.iter().enumerate() {
        let marker = if i == 0 { " (used for recording)" } else { "" };
        println!("{:>3}  {}{marker}", mic.index, mic.name);
    }
    Ok(())
}
