//! screenrec platform core contracts.
//!
//! Display data structures shared by the capture engine and the front ends
//! without coupling them to a concrete screenshot backend.

use serde::{Deserialize, Serialize};

/// Information about a connected monitor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MonitorInfo {
    /// Monitor name/identifier.
    pub name: String,
    /// Resolution in physical pixels.
    pub width: u32,
    pub height: u32,
    /// Position in the virtual desktop (pixels).
    pub x: i32,
    pub y: i32,
    /// Scale factor (for example 1.0, 1.25, 2.0).
    pub scale_factor: f64,
    /// Whether this monitor is primary.
    pub primary: bool,
}

/// Display server / platform family used for capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DisplayServer {
    Wayland,
    X11,
    Windows,
    MacOS,
    #[default]
    Unknown,
}

/// Detect the current display server.
pub fn detect_display_server() -> DisplayServer {
    if cfg!(target_os = "windows") {
        DisplayServer::Windows
    } else if cfg!(target_os = "macos") {
        DisplayServer::MacOS
    } else if std::env::var_os("WAYLAND_DISPLAY").is_some() {
        DisplayServer::Wayland
    } else if std::env::var_os("DISPLAY").is_some() {
        DisplayServer::X11
    } else {
        DisplayServer::Unknown
    }
}

/// The monitor full-screen capture records: the primary one, else the first.
pub fn select_capture_monitor(monitors: &[MonitorInfo]) -> Option<&MonitorInfo> {
    monitors
        .iter()
        .find(|m| m.primary)
        .or_else(|| monitors.first())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monitor(name: &str, width: u32, primary: bool) -> MonitorInfo {
        MonitorInfo {
            name: name.to_string(),
            width,
            height: 1080,
            x: 0,
            y: 0,
            scale_factor: 1.0,
            primary,
        }
    }

    #[test]
    fn selects_primary_monitor() {
        let monitors = vec![monitor("left", 1280, false), monitor("main", 2560, true)];
        let selected = select_capture_monitor(&monitors).unwrap();
        assert_eq!(selected.name, "main");
        assert_eq!((selected.width, selected.height), (2560, 1080));
    }

    #[test]
    fn falls_back_to_first_monitor() {
        let monitors = vec![monitor("a", 1920, false), monitor("b", 1280, false)];
        assert_eq!(select_capture_monitor(&monitors).unwrap().name, "a");
        assert!(select_capture_monitor(&[]).is_none());
    }
}
