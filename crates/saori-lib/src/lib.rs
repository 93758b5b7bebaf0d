//! saori-lib — Voice synthesis service engine.
//!
//! Model client, chunked synthesis pipeline, audio cache, speaker reference
//! store and HTTP API. Depends on saori-core for pure types, text chunking
//! and audio processing.

pub mod cache;
pub mod model;
pub mod server;
pub mod synth;
pub mod voices;

// Re-export saori-core for convenience
pub use saori_core;
