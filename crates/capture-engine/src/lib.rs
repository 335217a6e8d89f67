//! screenrec capture engine
//!
//! Runs the two capture loops of a recording session and coordinates
//! their lifecycle. Each loop runs on its own blocking worker and owns its
//! device and output exclusively until it has finalized its file.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │              CaptureSession              │
//! │   ┌──────────────┐   ┌───────────────┐   │
//! │   │ Audio loop   │   │ Screen loop   │   │
//! │   │ (cpal)       │   │ (xcap + gst)  │   │
//! │   └──────┬───────┘   └───────┬───────┘   │
//! │          ▼                   ▼           │
//! │      audio.wav        recording.<ext>    │
//! └──────────────────────────────────────────┘
//! ```
//!
//! Start order is audio, warm-up delay, screen. Stop order is clear the
//! recording flag, join screen, raise the stop signal, join audio.

pub mod audio;
pub mod backend;
pub mod format;
pub mod pipeline;
pub mod screen;
pub mod session;
pub mod signal;

pub use audio::{list_active_microphones, AudioOutcome, MicrophoneInfo};
pub use backend::{AudioSpec, CaptureBackends};
pub use format::{TempFiles, VideoFormat};
pub use screen::ScreenOutcome;
pub use session::*;
pub use signal::{RecordingFlag, StopSignal};
