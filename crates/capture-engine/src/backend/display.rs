use screenrec_common::error::{RecorderError, RecorderResult};
use screenrec_platform_core::{select_capture_monitor, MonitorInfo};
use xcap::Monitor;

use super::{CapturedImage, ScreenSource, ScreenSourceFactory};

/// Detect connected monitors.
pub fn detect_monitors() -> RecorderResult<Vec<MonitorInfo>> {
    let monitors = Monitor::all()
        .map_err(|e| RecorderError::platform(format!("Failed to enumerate monitors: {e}")))?;
    Ok(monitors.iter().map(monitor_info).collect())
}

fn monitor_info(monitor: &Monitor) -> MonitorInfo {
    MonitorInfo {
        name: monitor.name().to_string(),
        width: monitor.width(),
        height: monitor.height(),
        x: monitor.x(),
        y: monitor.y(),
        scale_factor: monitor.scale_factor() as f64,
        primary: monitor.is_primary(),
    }
}

/// Opens the primary display through xcap.
#[derive(Debug, Default, Clone, Copy)]
pub struct XcapScreenFactory;

impl ScreenSourceFactory for XcapScreenFactory {
    fn open(&self) -> RecorderResult<Box<dyn ScreenSource>> {
        let monitors = Monitor::all()
            .map_err(|e| RecorderError::platform(format!("Failed to enumerate monitors: {e}")))?;
        let infos: Vec<MonitorInfo> = monitors.iter().map(monitor_info).collect();
        let selected = select_capture_monitor(&infos)
            .ok_or_else(|| RecorderError::capture("No display available for screen capture"))?;
        let index = infos
            .iter()
            .position(|m| m == selected)
            .unwrap_or_default();

        tracing::info!(
            monitor = %selected.name,
            width = selected.width,
            height = selected.height,
            "Selected display for screen capture"
        );

        let monitor = monitors
            .into_iter()
            .nth(index)
            .ok_or_else(|| RecorderError::capture("Selected display disappeared"))?;

        Ok(Box::new(XcapScreenSource { monitor }))
    }
}

struct XcapScreenSource {
    monitor: Monitor,
}

impl ScreenSource for XcapScreenSource {
    fn grab(&mut self) -> RecorderResult<CapturedImage> {
        let image = self
            .monitor
            .capture_image()
            .map_err(|e| RecorderError::capture(format!("Screenshot failed: {e}")))?;
        let (width, height) = (image.width(), image.height());
        Ok(CapturedImage {
            width,
            height,
            rgba: image.into_raw(),
        })
    }
}
