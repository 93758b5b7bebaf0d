//! HTTP API for the saori voice service.
//!
//! ```text
//! GET    /                              liveness
//! GET    /health                        model + language status
//! GET    /languages                     configured vs. all languages
//! POST   /synthesize                    JSON → audio/wav
//! POST   /register-voice                multipart upload of a reference WAV
//! GET    /voices/{user_id}              list references
//! DELETE /voices/{user_id}/{voice_name} delete a reference
//! POST   /chunks                        preview how text would be chunked
//! ```
//!
//! Errors are returned as `{"detail": "..."}` with a 4xx/5xx status.

use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::{HeaderValue, Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use saori_core::language::{ALL_LANGUAGES, char_limit};
use saori_core::text_prep::split_text;
use saori_core::types::{
    ChunkPreview, ChunkRequest, ErrorBody, HealthResponse, LanguagesResponse, RegisterVoiceResponse,
    ServiceInfo, StatusMessage, SynthesizeRequest, VoiceList,
};

use crate::cache::{AudioCache, cache_key};
use crate::synth::{SynthError, SynthesisRequest, Synthesizer};
use crate::voices::{DEFAULT_VOICE, VoiceError, VoiceStore};

/// Largest request body accepted, sized for reference uploads.
const MAX_BODY_BYTES: usize = 25 * 1024 * 1024;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub synthesizer: Arc<Synthesizer>,
    pub cache: AudioCache,
    pub voices: VoiceStore,
}

/// Build the axum router. An empty `cors_origins` allows any origin.
pub fn router(state: AppState, cors_origins: &[String]) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/languages", get(languages))
        .route("/synthesize", post(synthesize))
        .route("/register-voice", post(register_voice))
        .route("/voices/{user_id}", get(list_voices))
        .route("/voices/{user_id}/{voice_name}", delete(delete_voice))
        .route("/chunks", post(chunks))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(cors_layer(cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::permissive();
    }
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse() {
            Ok(v) => Some(v),
            Err(_) => {
                warn!("ignoring invalid CORS origin '{o}'");
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers(Any)
}

// ─── Errors ────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    pub fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }

    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, detail)
    }

    pub fn internal(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, detail)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorBody { detail: self.detail })).into_response()
    }
}

impl From<VoiceError> for ApiError {
    fn from(e: VoiceError) -> Self {
        match e {
            VoiceError::InvalidId(_)
            | VoiceError::UnsupportedFormat(_)
            | VoiceError::DurationOutOfRange(_)
            | VoiceError::Audio(_) => Self::bad_request(e.to_string()),
            VoiceError::NotFound { .. } => Self::new(StatusCode::NOT_FOUND, e.to_string()),
            VoiceError::Io(_) | VoiceError::Task(_) => {
                error!("voice store error: {e}");
                Self::internal(e.to_string())
            }
        }
    }
}

impl From<SynthError> for ApiError {
    fn from(e: SynthError) -> Self {
        error!("synthesis failed: {e}");
        Self::internal(format!("TTS synthesis failed: {e}"))
    }
}

// ─── Handlers ──────────────────────────────────────────────────────────────

async fn root() -> Json<ServiceInfo> {
    Json(ServiceInfo {
        status: "ok".into(),
        service: "Saori TTS API".into(),
    })
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let model = state.synthesizer.model();
    Json(HealthResponse {
        status: "healthy".into(),
        model_loaded: model.is_loaded(),
        supported_languages: state.synthesizer.config().supported_languages.clone(),
    })
}

async fn languages(State(state): State<AppState>) -> Json<LanguagesResponse> {
    Json(LanguagesResponse {
        supported: state.synthesizer.config().supported_languages.clone(),
        all_available: ALL_LANGUAGES.iter().map(|l| l.to_string()).collect(),
    })
}

async fn synthesize(
    State(state): State<AppState>,
    Json(req): Json<SynthesizeRequest>,
) -> Result<Response, ApiError> {
    let config = state.synthesizer.config();

    if req.text.chars().count() > config.max_text_chars {
        return Err(ApiError::bad_request(format!(
            "Text too long (max {} characters)",
            config.max_text_chars
        )));
    }
    if req.text.trim().is_empty() {
        return Err(ApiError::bad_request("Text cannot be empty"));
    }
    if !config.supports(&req.language) {
        return Err(ApiError::bad_request(format!(
            "Language '{}' is not supported. Supported languages: {}",
            req.language,
            config.supported_languages.join(", ")
        )));
    }

    let voice_name = req.voice_name.as_deref().unwrap_or(DEFAULT_VOICE);
    let speaker_wav = state.voices.resolve(&req.user_id, voice_name).await?;

    let key = cache_key(&req.user_id, voice_name, &req.text, req.speed);
    if let Some(bytes) = state.cache.get(&key).await {
        info!("returning cached audio {key}");
        return Ok(wav_response(bytes));
    }

    info!(
        "synthesizing for user_id={}, voice={voice_name}, language={}, {} chars",
        req.user_id,
        req.language,
        req.text.chars().count()
    );
    let output = state
        .synthesizer
        .synthesize(SynthesisRequest {
            text: &req.text,
            speaker_wav: &speaker_wav,
            language: &req.language,
            speed: req.speed,
            tag: &key,
        })
        .await?;

    if let Err(e) = state.cache.put(&key, &output.wav).await {
        warn!("failed to cache {key}: {e}");
    }
    info!("synthesized {} chunk(s), {} bytes", output.chunk_count, output.wav.len());

    Ok(wav_response(output.wav))
}

fn wav_response(bytes: Vec<u8>) -> Response {
    (
        [
            (header::CONTENT_TYPE, "audio/wav"),
            (header::CONTENT_DISPOSITION, "attachment; filename=\"tts_output.wav\""),
        ],
        bytes,
    )
        .into_response()
}

async fn register_voice(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<RegisterVoiceResponse>, ApiError> {
    let mut user_id = None;
    let mut voice_name = None;
    let mut upload: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("invalid multipart body: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "user_id" | "voice_name" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("invalid field '{name}': {e}")))?;
                if name == "user_id" {
                    user_id = Some(value);
                } else {
                    voice_name = Some(value);
                }
            }
            "audio_file" => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("invalid audio upload: {e}")))?;
                upload = Some((filename, bytes.to_vec()));
            }
            _ => {}
        }
    }

    let user_id = user_id.ok_or_else(|| ApiError::bad_request("missing field 'user_id'"))?;
    let voice_name = voice_name.unwrap_or_else(|| DEFAULT_VOICE.to_string());
    let (filename, bytes) = upload.ok_or_else(|| ApiError::bad_request("missing field 'audio_file'"))?;

    let info = state.voices.register(&user_id, &voice_name, &filename, bytes).await?;

    Ok(Json(RegisterVoiceResponse {
        status: "success".into(),
        user_id,
        voice_name,
        duration: info.duration,
        file_path: info.file_path,
    }))
}

async fn list_voices(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<VoiceList>, ApiError> {
    let voices = state.voices.list(&user_id).await?;
    Ok(Json(VoiceList { voices }))
}

async fn delete_voice(
    State(state): State<AppState>,
    Path((user_id, voice_name)): Path<(String, String)>,
) -> Result<Json<StatusMessage>, ApiError> {
    state.voices.delete(&user_id, &voice_name).await?;
    Ok(Json(StatusMessage {
        status: "success".into(),
        message: format!("Voice '{voice_name}' deleted"),
    }))
}

async fn chunks(Json(req): Json<ChunkRequest>) -> Json<ChunkPreview> {
    Json(ChunkPreview {
        limit: char_limit(&req.language),
        chunks: split_text(&req.text, &req.language),
        language: req.language,
    })
}
