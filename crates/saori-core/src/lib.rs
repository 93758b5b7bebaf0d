//! saori-core — Pure types, text chunking and audio math.
//!
//! No async runtime, no filesystem I/O. Everything here operates on strings
//! and in-memory sample buffers.

pub mod audio;
pub mod error;
pub mod language;
pub mod resample;
pub mod stitch;
pub mod text_prep;
pub mod types;
pub mod wav;
