//! Shared types for the saori voice service.
//!
//! Configuration records and the JSON payloads of the HTTP API. Keeping them
//! in saori-core lets clients depend on the wire types without pulling in
//! tokio or axum.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::audio::DEFAULT_TARGET_DB;
use crate::language::ALL_LANGUAGES;
use crate::stitch::StitchOptions;

// ─── Configuration ─────────────────────────────────────────────────────────

/// Synthesis pipeline configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisConfig {
    /// Silence inserted between chunk segments.
    pub silence_ms: u32,
    /// Loudness target of stitched output, dBFS RMS.
    pub target_db: f32,
    /// Longest request text accepted at the API boundary, in characters.
    pub max_text_chars: usize,
    /// Model calls allowed in flight per request. 1 = strictly sequential.
    pub chunk_concurrency: usize,
    /// Language codes the service accepts.
    pub supported_languages: Vec<String>,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            silence_ms: 100,
            target_db: DEFAULT_TARGET_DB,
            max_text_chars: 2000,
            chunk_concurrency: 1,
            supported_languages: ALL_LANGUAGES.iter().map(|l| l.to_string()).collect(),
        }
    }
}

impl SynthesisConfig {
    pub fn stitch_options(&self) -> StitchOptions {
        StitchOptions {
            silence_ms: self.silence_ms,
            target_db: self.target_db,
        }
    }

    pub fn supports(&self, language: &str) -> bool {
        self.supported_languages.iter().any(|l| l == language)
    }
}

/// Audio cache budget and sweep cadence.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfig {
    pub max_bytes: u64,
    pub sweep_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_bytes: 10 * 1024 * 1024 * 1024,
            sweep_interval: Duration::from_secs(24 * 3600),
        }
    }
}

impl CacheConfig {
    /// Build from the operator-facing units (gigabytes, hours).
    pub fn from_gb_hours(max_gb: f64, hours: u64) -> Self {
        Self {
            max_bytes: (max_gb.max(0.0) * 1024.0 * 1024.0 * 1024.0) as u64,
            sweep_interval: Duration::from_secs(hours.max(1) * 3600),
        }
    }
}

// ─── API payloads ──────────────────────────────────────────────────────────

/// Body of `POST /synthesize`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesizeRequest {
    pub text: String,
    pub user_id: String,
    #[serde(default)]
    pub voice_name: Option<String>,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_speed")]
    pub speed: f32,
}

fn default_language() -> String {
    "en".to_string()
}

fn default_speed() -> f32 {
    1.0
}

/// Body of `POST /chunks`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkRequest {
    pub text: String,
    #[serde(default = "default_language")]
    pub language: String,
}

/// How a text would be chunked for synthesis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkPreview {
    pub language: String,
    pub limit: usize,
    pub chunks: Vec<String>,
}

/// Liveness payload of `GET /`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub status: String,
    pub service: String,
}

/// `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub model_loaded: bool,
    pub supported_languages: Vec<String>,
}

/// `GET /languages`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LanguagesResponse {
    pub supported: Vec<String>,
    pub all_available: Vec<String>,
}

/// A registered speaker reference.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VoiceInfo {
    pub name: String,
    /// Reference length in seconds.
    pub duration: f32,
    pub file_path: String,
}

/// `GET /voices/{user_id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceList {
    pub voices: Vec<VoiceInfo>,
}

/// `POST /register-voice`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterVoiceResponse {
    pub status: String,
    pub user_id: String,
    pub voice_name: String,
    pub duration: f32,
    pub file_path: String,
}

/// Generic `{status, message}` acknowledgement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusMessage {
    pub status: String,
    pub message: String,
}

/// Error body: `{ "detail": "..." }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub detail: String,
}
