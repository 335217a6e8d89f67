//! Check system capabilities.

use screenrec_capture_engine::backend::display::detect_monitors;
use screenrec_capture_engine::backend::CpalMicrophoneBackend;
use screenrec_capture_engine::pipeline::missing_gstreamer_elements;
use screenrec_capture_engine::{list_active_microphones, SessionConfig};
use screenrec_common::config::{config_file_path, AppConfig};
use screenrec_mux_engine::FfmpegMuxer;
use screenrec_platform_core::{detect_display_server, select_capture_monitor, DisplayServer};

pub fn run(config: &AppConfig) -> anyhow::Result<()> {
    println!("screenrec System Check");
    println!("{}", "=".repeat(50));
    println!("Config: {}", config_file_path().display());
    println!("Work dir: {}", config.recording.work_dir.display());
    println!();

    let mut ready = true;

    match detect_display_server() {
        DisplayServer::Unknown => println!("[WARN] Display server: Unknown"),
        ds => println!("[OK] Display server: {ds:?}"),
    }

    match detect_monitors() {
        Ok(monitors) => {
            println!("[OK] Monitors detected: {}", monitors.len());
            let recorded = select_capture_monitor(&monitors).map(|m| m.name.clone());
            for m in &monitors {
                println!(
                    "     {} {}x{} (scale: {}x) {}{}",
                    m.name,
                    m.width,
                    m.height,
                    m.scale_factor,
                    if m.primary { "(primary)" } else { "" },
                    if recorded.as_deref() == Some(m.name.as_str()) {
                        " <- recorded"
                    } else {
                        ""
                    }
                );
            }
            if monitors.is_empty() {
                ready = false;
            }
        }
        Err(e) => {
            println!("[FAIL] Monitors: {e}");
            ready = false;
        }
    }

    match missing_gstreamer_elements() {
        Ok(missing) if missing.is_empty() => println!("[OK] GStreamer elements"),
        Ok(missing) => {
            println!("[FAIL] GStreamer elements missing: {}", missing.join(", "));
            ready = false;
        }
        Err(e) => {
            println!("[FAIL] GStreamer: {e}");
            ready = false;
        }
    }

    let muxer = FfmpegMuxer::from_config(&config.encoder);
    match muxer.program() {
        Some(program) => println!("[OK] Encoder: {}", program.display()),
        None => println!(
            "[WARN] Encoder '{}' not found; recordings can only be saved as separate files",
            config.encoder.binary
        ),
    }

    let spec = SessionConfig::from(&config.recording).audio;
    let microphones = list_active_microphones(&CpalMicrophoneBackend::new(), &spec);
    match microphones.first() {
        Some(mic) => println!(
            "[OK] Microphones: {} (recording from {})",
            microphones.len(),
            mic.name
        ),
        None => println!("[WARN] No microphone; recordings will have no sound"),
    }

    println!();
    if ready {
        println!("screenrec is ready.");
    } else {
        println!("Some required capabilities are missing. See above.");
    }
    Ok(())
}
