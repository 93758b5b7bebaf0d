//! Speaker reference store. One directory per user, one WAV per voice.
//!
//! ```text
//! <root>/<user_id>/<voice_name>.wav            processed reference fed to the model
//! <root>/<user_id>/<voice_name>_original.wav   upload as received
//! ```

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;
use tracing::{debug, info, warn};

use saori_core::audio::{AudioSegment, DEFAULT_TARGET_DB, normalize, trim_silence};
use saori_core::error::AudioError;
use saori_core::resample::Resampler;
use saori_core::types::VoiceInfo;
use saori_core::wav::{decode_wav, encode_wav};

/// Voice used when a request names none.
pub const DEFAULT_VOICE: &str = "default";

/// Sample rate references are stored at.
pub const REFERENCE_SAMPLE_RATE: u32 = 22_050;

/// Accepted reference length, in seconds.
pub const MIN_REFERENCE_SECS: f32 = 6.0;
pub const MAX_REFERENCE_SECS: f32 = 12.0;

/// Frames this far below the loudest one count as silence when trimming.
const TRIM_TOP_DB: f32 = 30.0;

const ORIGINAL_SUFFIX: &str = "_original";

static RE_ID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]{1,64}$").unwrap());

#[derive(Debug, Error)]
pub enum VoiceError {
    #[error("invalid identifier '{0}'")]
    InvalidId(String),
    #[error("Invalid audio format '{0}'. Supported: wav")]
    UnsupportedFormat(String),
    #[error("Audio duration must be between 6-12 seconds (got {0:.1}s)")]
    DurationOutOfRange(f32),
    #[error("Voice '{voice}' not found for user {user}")]
    NotFound { user: String, voice: String },
    #[error(transparent)]
    Audio(#[from] AudioError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("processing task failed: {0}")]
    Task(String),
}

/// Reject ids that could escape the store directory.
pub fn validate_id(id: &str) -> Result<(), VoiceError> {
    if RE_ID.is_match(id) {
        Ok(())
    } else {
        Err(VoiceError::InvalidId(id.to_string()))
    }
}

/// Turn an uploaded recording into a model-ready reference: mono, 22.05 kHz,
/// loudness-normalized, edges trimmed.
pub fn process_reference(bytes: &[u8]) -> Result<AudioSegment, AudioError> {
    let decoded = decode_wav(bytes)?;
    let resampled = Resampler::default().resample(&decoded, REFERENCE_SAMPLE_RATE)?;
    let normalized = normalize(&resampled.samples, DEFAULT_TARGET_DB);
    Ok(AudioSegment::new(trim_silence(&normalized, TRIM_TOP_DB), REFERENCE_SAMPLE_RATE))
}

#[derive(Debug, Clone)]
pub struct VoiceStore {
    root: PathBuf,
}

impl VoiceStore {
    /// Open (and create if needed) a store rooted at `root`.
    pub async fn open(root: impl Into<PathBuf>) -> std::io::Result<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where `voice_name`'s processed reference lives. Does not check existence.
    pub fn voice_path(&self, user_id: &str, voice_name: &str) -> Result<PathBuf, VoiceError> {
        validate_id(user_id)?;
        validate_id(voice_name)?;
        Ok(self.root.join(user_id).join(format!("{voice_name}.wav")))
    }

    fn original_path(&self, user_id: &str, voice_name: &str) -> PathBuf {
        self.root
            .join(user_id)
            .join(format!("{voice_name}{ORIGINAL_SUFFIX}.wav"))
    }

    /// Path of an existing reference, or [`VoiceError::NotFound`].
    pub async fn resolve(&self, user_id: &str, voice_name: &str) -> Result<PathBuf, VoiceError> {
        let path = self.voice_path(user_id, voice_name)?;
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            Ok(path)
        } else {
            Err(VoiceError::NotFound {
                user: user_id.to_string(),
                voice: voice_name.to_string(),
            })
        }
    }

    /// Store and process an uploaded reference recording.
    pub async fn register(
        &self,
        user_id: &str,
        voice_name: &str,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<VoiceInfo, VoiceError> {
        let voice_path = self.voice_path(user_id, voice_name)?;

        let ext = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        if ext.as_deref() != Some("wav") {
            return Err(VoiceError::UnsupportedFormat(filename.to_string()));
        }

        tokio::fs::create_dir_all(self.root.join(user_id)).await?;
        let original_path = self.original_path(user_id, voice_name);
        tokio::fs::write(&original_path, &bytes).await?;

        let processed = tokio::task::spawn_blocking(move || process_reference(&bytes))
            .await
            .map_err(|e| VoiceError::Task(e.to_string()))?;

        let reference = match processed {
            Ok(reference) => reference,
            Err(e) => {
                remove_if_exists(&original_path).await;
                return Err(e.into());
            }
        };

        let duration = reference.duration_secs();
        if !(MIN_REFERENCE_SECS..=MAX_REFERENCE_SECS).contains(&duration) {
            remove_if_exists(&original_path).await;
            return Err(VoiceError::DurationOutOfRange(duration));
        }

        tokio::fs::write(&voice_path, encode_wav(&reference)?).await?;
        info!("voice registered: user_id={user_id}, voice_name={voice_name} ({duration:.1}s)");

        Ok(VoiceInfo {
            name: voice_name.to_string(),
            duration,
            file_path: voice_path.to_string_lossy().into_owned(),
        })
    }

    /// All processed references of `user_id`, sorted by name.
    pub async fn list(&self, user_id: &str) -> Result<Vec<VoiceInfo>, VoiceError> {
        validate_id(user_id)?;
        let user_dir = self.root.join(user_id);

        let mut dir = match tokio::fs::read_dir(&user_dir).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut voices = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("wav") {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if name.ends_with(ORIGINAL_SUFFIX) {
                continue;
            }

            let duration = match tokio::fs::read(&path).await.map(|b| decode_wav(&b)) {
                Ok(Ok(audio)) => audio.duration_secs(),
                _ => {
                    debug!("voices: unreadable reference {}", path.display());
                    0.0
                }
            };

            voices.push(VoiceInfo {
                name: name.to_string(),
                duration,
                file_path: path.to_string_lossy().into_owned(),
            });
        }

        voices.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(voices)
    }

    /// Remove a voice and its original upload. Missing files are not an error.
    pub async fn delete(&self, user_id: &str, voice_name: &str) -> Result<(), VoiceError> {
        let voice_path = self.voice_path(user_id, voice_name)?;
        remove_if_exists(&voice_path).await;
        remove_if_exists(&self.original_path(user_id, voice_name)).await;
        info!("voice deleted: user_id={user_id}, voice_name={voice_name}");
        Ok(())
    }
}

async fn remove_if_exists(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!("voices: failed to remove {}: {e}", path.display());
        }
    }
}
