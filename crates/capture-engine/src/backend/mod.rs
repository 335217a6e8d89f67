//! Device seams used by the capture loops.
//!
//! Each loop opens its device from inside its own worker thread, so the
//! handles returned by the factories need not be `Send`. The factories
//! themselves are shared between the session and the workers.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use screenrec_common::config::FramePacing;
use screenrec_common::error::RecorderResult;

use crate::format::VideoFormat;

pub mod display;
pub mod microphone;

pub use display::XcapScreenFactory;
pub use microphone::CpalMicrophoneBackend;

/// A full-screen grab in RGBA byte order.
#[derive(Debug, Clone)]
pub struct CapturedImage {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

/// A frame in the BGR byte order expected by the container writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BgrFrame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

/// Something that can take full-screen screenshots.
pub trait ScreenSource {
    /// Take one screenshot. Blocks until the image is available.
    fn grab(&mut self) -> RecorderResult<CapturedImage>;
}

/// Opens a [`ScreenSource`] on the calling thread.
pub trait ScreenSourceFactory: Send + Sync {
    fn open(&self) -> RecorderResult<Box<dyn ScreenSource>>;
}

/// Parameters of the video container being written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoSpec {
    pub format: VideoFormat,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub pacing: FramePacing,
}

/// Incrementally assembles frames into a playable video file.
pub trait FrameWriter {
    /// Append one frame stamped `timestamp` from the start of the stream.
    fn write_frame(&mut self, frame: BgrFrame, timestamp: Duration) -> RecorderResult<()>;

    /// Flush and finalize the container so the file is readable.
    fn finish(&mut self) -> RecorderResult<()>;

    /// Frames accepted so far.
    fn frames_written(&self) -> u64;
}

/// Opens a [`FrameWriter`] for a target file.
pub trait FrameWriterFactory: Send + Sync {
    fn open(&self, output_path: &Path, spec: &VideoSpec) -> RecorderResult<Box<dyn FrameWriter>>;
}

/// Fixed microphone capture format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioSpec {
    pub sample_rate: u32,
    pub channels: u16,
    pub chunk_frames: usize,
}

impl Default for AudioSpec {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            channels: 1,
            chunk_frames: 1024,
        }
    }
}

/// An input-capable audio device as reported by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputDevice {
    pub index: usize,
    pub name: String,
}

/// Blocking reads of fixed-size mono i16 chunks from an open input stream.
/// Dropping the reader closes the stream.
pub trait SampleReader {
    fn read_chunk(&mut self) -> RecorderResult<Vec<i16>>;
}

/// Host audio API.
pub trait MicrophoneBackend: Send + Sync {
    /// Devices with at least one input channel.
    fn input_devices(&self) -> Vec<InputDevice>;

    /// Open and immediately close the device at `spec`.
    fn probe(&self, index: usize, spec: &AudioSpec) -> RecorderResult<()>;

    /// Open the device at `spec` and start streaming.
    fn open(&self, index: usize, spec: &AudioSpec) -> RecorderResult<Box<dyn SampleReader>>;
}

/// The device implementations a session records with.
#[derive(Clone)]
pub struct CaptureBackends {
    pub screen: Arc<dyn ScreenSourceFactory>,
    pub writer: Arc<dyn FrameWriterFactory>,
    pub microphone: Arc<dyn MicrophoneBackend>,
}

impl CaptureBackends {
    /// xcap screenshots, GStreamer container writer, cpal microphone.
    pub fn platform_default() -> Self {
        Self {
            screen: Arc::new(XcapScreenFactory),
            writer: Arc::new(crate::pipeline::GstWriterFactory),
            microphone: Arc::new(CpalMicrophoneBackend::new()),
        }
    }
}
