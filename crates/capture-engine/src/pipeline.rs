//! GStreamer container writer for screen frames.
//!
//! Frames enter the pipeline through an `appsrc`, are converted and
//! rate-normalized, then encoded and muxed into the file selected by the
//! [`VideoFormat`](crate::format::VideoFormat).

use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;

use gst::prelude::*;
use gstreamer as gst;
use screenrec_common::error::{RecorderError, RecorderResult};

use crate::backend::{BgrFrame, FrameWriter, FrameWriterFactory, VideoSpec};

/// Opens [`GstFrameWriter`]s.
#[derive(Debug, Default, Clone, Copy)]
pub struct GstWriterFactory;

impl FrameWriterFactory for GstWriterFactory {
    fn open(&self, output_path: &Path, spec: &VideoSpec) -> RecorderResult<Box<dyn FrameWriter>> {
        Ok(Box::new(GstFrameWriter::open(output_path, spec)?))
    }
}

pub struct GstFrameWriter {
    name: String,
    pipeline: gst::Pipeline,
    appsrc: gst::Element,
    frame_duration: gst::ClockTime,
    frames_written: u64,
    finished: bool,
}

impl GstFrameWriter {
    pub fn open(output_path: &Path, spec: &VideoSpec) -> RecorderResult<Self> {
        init_gstreamer()?;

        let name = format!("screen-{}", spec.format);
        let launch = writer_launch(output_path, spec);
        tracing::debug!(pipeline = %name, %launch, "Building writer pipeline");

        let element = gst::parse::launch(&launch)
            .map_err(|e| RecorderError::capture(format!("Failed to build pipeline: {e}")))?;
        let pipeline = element
            .dynamic_cast::<gst::Pipeline>()
            .map_err(|_| RecorderError::capture("Launch string did not produce a pipeline"))?;
        let appsrc = pipeline
            .by_name("frames")
            .ok_or_else(|| RecorderError::capture("Writer pipeline has no frame source"))?;

        // The sink opens the output file on this transition, so a bad path
        // or a missing encoder fails here instead of inside the loop.
        pipeline.set_state(gst::State::Playing).map_err(|e| {
            let _ = pipeline.set_state(gst::State::Null);
            RecorderError::capture(format!(
                "Failed to open video writer for {}: {e:?}",
                output_path.display()
            ))
        })?;

        Ok(Self {
            name,
            pipeline,
            appsrc,
            frame_duration: gst::ClockTime::from_nseconds(1_000_000_000 / spec.fps.max(1) as u64),
            frames_written: 0,
            finished: false,
        })
    }

    fn drain_until_eos(&self) {
        let Some(bus) = self.pipeline.bus() else {
            return;
        };
        let deadline = Duration::from_secs(10);
        let start = std::time::Instant::now();
        loop {
            let elapsed = start.elapsed();
            if elapsed >= deadline {
                tracing::warn!(pipeline = %self.name, "EOS drain timed out after 10s");
                break;
            }
            let remaining = gst::ClockTime::from_nseconds((deadline - elapsed).as_nanos() as u64);
            match bus.timed_pop(remaining) {
                Some(msg) => match msg.view() {
                    gst::MessageView::Eos(_) => {
                        tracing::debug!(pipeline = %self.name, "EOS received; container finalized");
                        break;
                    }
                    gst::MessageView::Error(e) => {
                        tracing::warn!(
                            pipeline = %self.name,
                            error = %e.error(),
                            "Pipeline error during EOS drain"
                        );
                        break;
                    }
                    _ => {}
                },
                None => {
                    tracing::warn!(pipeline = %self.name, "EOS drain timed out after 10s");
                    break;
                }
            }
        }
    }

    fn pipeline_error(&self) -> Option<String> {
        let bus = self.pipeline.bus()?;
        while let Some(msg) = bus.pop_filtered(&[gst::MessageType::Error]) {
            if let gst::MessageView::Error(e) = msg.view() {
                return Some(e.error().to_string());
            }
        }
        None
    }
}

impl FrameWriter for GstFrameWriter {
    fn write_frame(&mut self, frame: BgrFrame, timestamp: Duration) -> RecorderResult<()> {
        let mut buffer = gst::Buffer::from_mut_slice(frame.data);
        {
            let buffer = buffer
                .get_mut()
                .ok_or_else(|| RecorderError::capture("Frame buffer is not writable"))?;
            buffer.set_pts(gst::ClockTime::from_nseconds(timestamp.as_nanos() as u64));
            buffer.set_duration(self.frame_duration);
        }

        let flow = self
            .appsrc
            .emit_by_name::<gst::FlowReturn>("push-buffer", &[&buffer]);
        if flow != gst::FlowReturn::Ok {
            let detail = self
                .pipeline_error()
                .unwrap_or_else(|| format!("{flow:?}"));
            return Err(RecorderError::capture(format!(
                "{} pipeline rejected frame {}: {detail}",
                self.name, self.frames_written
            )));
        }

        self.frames_written += 1;
        Ok(())
    }

    fn finish(&mut self) -> RecorderResult<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;

        // EOS lets the encoder flush and the muxer write its index; without
        // it mp4 output is unreadable.
        let flow = self
            .appsrc
            .emit_by_name::<gst::FlowReturn>("end-of-stream", &[]);
        if flow == gst::FlowReturn::Ok {
            self.drain_until_eos();
        } else {
            tracing::warn!(pipeline = %self.name, ?flow, "Failed to send EOS; output may be truncated");
        }

        self.pipeline.set_state(gst::State::Null).map_err(|e| {
            RecorderError::capture(format!("Failed to stop {} pipeline: {e:?}", self.name))
        })?;
        tracing::debug!(pipeline = %self.name, frames = self.frames_written, "Writer released");
        Ok(())
    }

    fn frames_written(&self) -> u64 {
        self.frames_written
    }
}

impl Drop for GstFrameWriter {
    fn drop(&mut self) {
        if !self.finished {
            let _ = self.pipeline.set_state(gst::State::Null);
        }
    }
}

fn writer_launch(output_path: &Path, spec: &VideoSpec) -> String {
    let path = escape_path(output_path);
    let VideoSpec {
        width, height, fps, ..
    } = *spec;
    // `block=true` applies backpressure to the capture loop when the
    // encoder falls behind. `videorate` turns wall-clock stamped frames
    // into a constant-rate stream.
    format!(
        "appsrc name=frames is-live=false block=true format=time caps=video/x-raw,format=BGR,width={width},height={height},framerate={fps}/1 ! queue max-size-buffers=8 ! videoconvert ! videorate ! video/x-raw,framerate={fps}/1 ! {} ! filesink location=\"{path}\"",
        spec.format.gst_encoder_chain(fps)
    )
}

fn init_gstreamer() -> RecorderResult<()> {
    static GST_INIT: OnceLock<Result<(), String>> = OnceLock::new();
    let init_res = GST_INIT.get_or_init(|| gst::init().map_err(|e| e.to_string()));
    match init_res {
        Ok(()) => Ok(()),
        Err(e) => Err(RecorderError::capture(format!(
            "Failed to initialize GStreamer: {e}"
        ))),
    }
}

/// Whether GStreamer and the elements every format needs are installed.
pub fn missing_gstreamer_elements() -> RecorderResult<Vec<&'static str>> {
    init_gstreamer()?;
    Ok([
        "appsrc",
        "videoconvert",
        "videorate",
        "avenc_mpeg4",
        "avimux",
        "mp4mux",
        "x264enc",
        "h264parse",
        "matroskamux",
        "filesink",
    ]
    .into_iter()
    .filter(|name| gst::ElementFactory::find(name).is_none())
    .collect())
}

fn escape_path(path: &Path) -> String {
    path.to_string_lossy()
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::VideoFormat;
    use screenrec_common::config::FramePacing;

    #[test]
    fn test_launch_string_carries_frame_geometry() {
        let spec = VideoSpec {
            format: VideoFormat::Mkv,
            width: 2560,
            height: 1440,
            fps: 20,
            pacing: FramePacing::WallClock,
        };
        let launch = writer_launch(Path::new("/tmp/recording.mkv"), &spec);
        assert!(launch.contains("format=BGR,width=2560,height=1440,framerate=20/1"));
        assert!(launch.contains("x264enc"));
        assert!(launch.ends_with("filesink location=\"/tmp/recording.mkv\""));
    }

    #[test]
    fn test_escape_path_quotes() {
        assert_eq!(
            escape_path(Path::new("/tmp/my \"clip\".avi")),
            "/tmp/my \\\"clip\\\".avi"
        );
    }
}
