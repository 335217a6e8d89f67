//! screenrec mux engine
//!
//! Turns the temporaries of a finished session into the user's output:
//!
//! ```text
//! recording.<ext> ──┐
//!                   ├── combine ── ffmpeg -c:v copy -c:a aac ──▶ <save>.<ext>
//! audio.wav ────────┘     │
//!                         └── no audio ── move ──▶ <save>.<ext>
//!
//! separate ──▶ <stem>_video.<ext> + <stem>_audio.wav
//! ```

pub mod encoder;
pub mod save;

pub use encoder::{command_exists, FfmpegMuxer, Muxer};
pub use save::*;
