//! Long-text synthesis: chunk, render each chunk through the model, stitch.
//!
//! ```text
//! text ─ split_text ─▶ [chunk 0, chunk 1, …]
//!                          │ model (≤ chunk_concurrency in flight, order kept)
//!                          ▼
//!                      scratch WAVs ─ decode ─ stitch ─ encode ─▶ one WAV
//! ```
//!
//! Every scratch file is owned by a [`ScopedFile`], so it is removed on every
//! exit path: success, a failed chunk, or the request future being dropped.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::{StreamExt, TryStreamExt, stream};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use saori_core::error::AudioError;
use saori_core::stitch::stitch;
use saori_core::text_prep::split_text;
use saori_core::types::SynthesisConfig;
use saori_core::wav::{decode_wav, encode_wav};

use crate::model::{ModelError, SpeechModel, SynthesisJob};

#[derive(Debug, Error)]
pub enum SynthError {
    #[error("chunk {chunk} failed: {source}")]
    Model {
        chunk: usize,
        #[source]
        source: ModelError,
    },
    #[error(transparent)]
    Audio(#[from] AudioError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("stitching task failed: {0}")]
    Join(String),
}

/// A file deleted when this handle is dropped.
#[derive(Debug)]
pub struct ScopedFile {
    path: PathBuf,
}

impl ScopedFile {
    /// Take ownership of `path`. The file does not need to exist yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScopedFile {
    // Synchronous so the file is gone by the time the owner's scope ends.
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("synth: failed to remove {}: {e}", self.path.display());
            }
        }
    }
}

/// One request to [`Synthesizer::synthesize`].
#[derive(Debug, Clone, Copy)]
pub struct SynthesisRequest<'a> {
    pub text: &'a str,
    pub speaker_wav: &'a Path,
    pub language: &'a str,
    pub speed: f32,
    /// Prefix for scratch file names, usually the cache key.
    pub tag: &'a str,
}

#[derive(Debug, Clone)]
pub struct SynthesisOutput {
    /// Complete WAV file.
    pub wav: Vec<u8>,
    pub chunk_count: usize,
}

pub struct Synthesizer {
    model: Arc<dyn SpeechModel>,
    config: SynthesisConfig,
    scratch_dir: PathBuf,
    seq: AtomicU64,
}

impl Synthesizer {
    pub fn new(model: Arc<dyn SpeechModel>, config: SynthesisConfig, scratch_dir: impl Into<PathBuf>) -> Self {
        Self {
            model,
            config,
            scratch_dir: scratch_dir.into(),
            seq: AtomicU64::new(0),
        }
    }

    pub fn model(&self) -> &Arc<dyn SpeechModel> {
        &self.model
    }

    pub fn config(&self) -> &SynthesisConfig {
        &self.config
    }

    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    /// Render `req.text` as a single WAV file.
    ///
    /// Text that fits one chunk is returned exactly as the model produced it.
    /// Longer text is rendered chunk by chunk and stitched with
    /// [`saori_core::stitch::stitch`]. Any failed chunk fails the whole request.
    pub async fn synthesize(&self, req: SynthesisRequest<'_>) -> Result<SynthesisOutput, SynthError> {
        let chunks = split_text(req.text, req.language);
        let total = chunks.len();
        info!(
            "synth: {} chars → {total} chunk(s) ({})",
            req.text.chars().count(),
            req.language
        );

        if total == 1 {
            let wav = self.render_chunk(0, total, &chunks[0], &req).await?;
            return Ok(SynthesisOutput { wav, chunk_count: 1 });
        }

        tokio::fs::create_dir_all(&self.scratch_dir).await?;
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let concurrency = self.config.chunk_concurrency.max(1);
        let req = &req;

        let files: Vec<ScopedFile> = stream::iter(chunks.into_iter().enumerate())
            .map(move |(i, chunk)| async move {
                let bytes = self.render_chunk(i, total, &chunk, req).await?;
                let file = ScopedFile::new(
                    self.scratch_dir
                        .join(format!("{}_{seq}_chunk_{i}_temp.wav", req.tag)),
                );
                tokio::fs::write(file.path(), &bytes).await?;
                Ok::<_, SynthError>(file)
            })
            .buffered(concurrency)
            .try_collect()
            .await?;

        let mut segments = Vec::with_capacity(files.len());
        for file in &files {
            let bytes = tokio::fs::read(file.path()).await?;
            segments.push(decode_wav(&bytes)?);
        }
        drop(files);

        let opts = self.config.stitch_options();
        let wav = tokio::task::spawn_blocking(move || -> Result<Vec<u8>, AudioError> {
            let joined = stitch(segments, opts)?;
            debug!(
                "synth: stitched {:.2}s at {} Hz",
                joined.duration_secs(),
                joined.sample_rate
            );
            encode_wav(&joined)
        })
        .await
        .map_err(|e| SynthError::Join(e.to_string()))??;

        Ok(SynthesisOutput {
            wav,
            chunk_count: total,
        })
    }

    async fn render_chunk(
        &self,
        index: usize,
        total: usize,
        text: &str,
        req: &SynthesisRequest<'_>,
    ) -> Result<Vec<u8>, SynthError> {
        debug!(
            "synth: chunk {}/{total} ({} chars)",
            index + 1,
            text.chars().count()
        );
        let job = SynthesisJob {
            text,
            speaker_wav: req.speaker_wav,
            language: req.language,
            speed: req.speed,
        };
        self.model.synthesize(job).await.map_err(|source| {
            error!("synth: chunk {}/{total} failed: {source}", index + 1);
            SynthError::Model {
                chunk: index,
                source,
            }
        })
    }
}
