//! Speech model collaborator: the opaque text + reference voice → audio step.
//!
//! The service never looks inside the model. It sees a [`SpeechModel`] with a
//! fixed set of methods; [`HttpSpeechModel`] talks to a model server over
//! HTTP, and tests plug in their own implementations.

use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, error, info};

use saori_core::language::ALL_LANGUAGES;

/// Boxed future returned by [`SpeechModel`] methods.
pub type ModelFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// One synthesis call: a chunk of text in a cloned voice.
#[derive(Debug, Clone, Copy)]
pub struct SynthesisJob<'a> {
    pub text: &'a str,
    /// Speaker reference WAV the model clones the timbre from.
    pub speaker_wav: &'a Path,
    pub language: &'a str,
    pub speed: f32,
}

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("model request failed: {0}")]
    Request(String),
    #[error("model returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("model not loaded")]
    NotLoaded,
}

/// A text-to-speech model that clones a voice from a reference recording.
pub trait SpeechModel: Send + Sync {
    /// Identifier reported in logs and health output.
    fn name(&self) -> &str;

    /// Whether the model is ready to synthesize.
    fn is_loaded(&self) -> bool;

    /// Language codes the model accepts.
    fn supported_languages(&self) -> Vec<String>;

    /// Render `job` and return the raw audio file (WAV) bytes.
    fn synthesize<'a>(&'a self, job: SynthesisJob<'a>) -> ModelFuture<'a, Result<Vec<u8>, ModelError>>;
}

/// Client for an external model server.
///
/// ```text
/// POST {base_url}/tts   {"text", "speaker_wav", "language", "speed"} → audio/wav
/// GET  {base_url}/health                                             → 2xx when ready
/// ```
pub struct HttpSpeechModel {
    client: reqwest::Client,
    base_url: String,
    loaded: AtomicBool,
}

impl HttpSpeechModel {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ModelError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ModelError::Request(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            loaded: AtomicBool::new(false),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Probe the health endpoint and record the result for [`SpeechModel::is_loaded`].
    pub async fn probe(&self) -> bool {
        let ok = match self.client.get(format!("{}/health", self.base_url)).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                debug!("model: health probe failed: {e}");
                false
            }
        };
        self.loaded.store(ok, Ordering::SeqCst);
        ok
    }

    /// Poll [`probe`](Self::probe) until the server answers or `timeout` passes.
    pub async fn wait_until_ready(&self, timeout: Duration) -> Result<(), ModelError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.probe().await {
                info!("model server at {} is ready", self.base_url);
                return Ok(());
            }
            if tokio::time::Instant::now() > deadline {
                return Err(ModelError::Request(format!(
                    "model server at {} did not become ready within {}s",
                    self.base_url,
                    timeout.as_secs()
                )));
            }
            tokio::time::sleep(Duration::from_millis(500)).await;
        }
    }
}

impl SpeechModel for HttpSpeechModel {
    fn name(&self) -> &str {
        "xtts-v2"
    }

    fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::SeqCst)
    }

    fn supported_languages(&self) -> Vec<String> {
        ALL_LANGUAGES.iter().map(|l| l.to_string()).collect()
    }

    fn synthesize<'a>(&'a self, job: SynthesisJob<'a>) -> ModelFuture<'a, Result<Vec<u8>, ModelError>> {
        Box::pin(async move {
            let body = serde_json::json!({
                "text": job.text,
                "speaker_wav": job.speaker_wav.to_string_lossy(),
                "language": job.language,
                "speed": job.speed,
            });

            debug!("model: POST {} chars ({})", job.text.chars().count(), job.language);

            let resp = self
                .client
                .post(format!("{}/tts", self.base_url))
                .json(&body)
                .send()
                .await
                .map_err(|e| ModelError::Request(e.to_string()))?;

            let status = resp.status();
            if status == reqwest::StatusCode::SERVICE_UNAVAILABLE {
                self.loaded.store(false, Ordering::SeqCst);
                return Err(ModelError::NotLoaded);
            }
            if !status.is_success() {
                let text = resp.text().await.unwrap_or_default();
                error!("model: error {status}: {text}");
                return Err(ModelError::Status {
                    status: status.as_u16(),
                    body: text,
                });
            }

            self.loaded.store(true, Ordering::SeqCst);
            let bytes = resp
                .bytes()
                .await
                .map_err(|e| ModelError::Request(e.to_string()))?;
            Ok(bytes.to_vec())
        })
    }
}
