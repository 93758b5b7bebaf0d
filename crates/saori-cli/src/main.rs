//! saori CLI — voice synthesis server and client.
//!
//! ```text
//! saori serve [--port 8000] [--host 0.0.0.0] [--model-url http://localhost:8020]
//! saori chunk "long text…" [--language en]
//! saori synthesize "hello world" --user-id 42 [--voice default] [-o out.wav]
//! saori voices 42 [--server http://localhost:8000]
//! saori health [--server ...]
//! ```

use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use saori_core::language::{ALL_LANGUAGES, char_limit, parse_language_list};
use saori_core::text_prep::split_text;
use saori_core::types::{CacheConfig, SynthesisConfig};
use saori_lib::cache::{AudioCache, spawn_sweeper};
use saori_lib::model::HttpSpeechModel;
use saori_lib::server::{AppState, router};
use saori_lib::synth::Synthesizer;
use saori_lib::voices::VoiceStore;

type CliResult = Result<(), Box<dyn Error>>;

/// saori — multilingual voice-cloning TTS service
#[derive(Parser)]
#[command(name = "saori", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the HTTP API
    Serve(ServeArgs),
    /// Show how text would be chunked for synthesis
    Chunk {
        /// Text to chunk
        text: String,
        /// Language code
        #[arg(long, default_value = "en")]
        language: String,
    },
    /// Synthesize text on a running server and save the WAV
    Synthesize {
        /// Text to speak
        text: String,
        #[arg(long)]
        user_id: String,
        /// Registered voice name
        #[arg(long)]
        voice: Option<String>,
        #[arg(long, default_value = "en")]
        language: String,
        #[arg(long, default_value = "1.0")]
        speed: f32,
        /// Output file
        #[arg(short, long, default_value = "tts_output.wav")]
        output: PathBuf,
        /// Server URL
        #[arg(long, default_value = "http://localhost:8000")]
        server: String,
    },
    /// List a user's registered voices
    Voices {
        user_id: String,
        #[arg(long, default_value = "http://localhost:8000")]
        server: String,
    },
    /// Get server health
    Health {
        #[arg(long, default_value = "http://localhost:8000")]
        server: String,
    },
}

#[derive(clap::Args)]
struct ServeArgs {
    /// Listen port
    #[arg(long, env = "PORT", default_value = "8000")]
    port: u16,
    /// Listen host
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    host: String,
    /// Speech model server URL
    #[arg(long, env = "SAORI_MODEL_URL", default_value = "http://localhost:8020")]
    model_url: String,
    /// Per-call model timeout in seconds
    #[arg(long, default_value = "120")]
    model_timeout: u64,
    /// How long to wait for the model server at startup, in seconds
    #[arg(long, default_value = "0")]
    model_wait: u64,
    /// Root for voices/ and cache/
    #[arg(long, env = "SAORI_DATA_DIR", default_value = "data")]
    data_dir: PathBuf,
    /// Comma-separated language codes to accept (default: all)
    #[arg(long, env = "TTS_SUPPORTED_LANGUAGES")]
    languages: Option<String>,
    /// Cache budget in gigabytes
    #[arg(long, env = "MAX_CACHE_SIZE_GB", default_value = "10")]
    max_cache_gb: f64,
    /// Hours between cache sweeps
    #[arg(long, env = "CACHE_CLEANUP_HOURS", default_value = "24")]
    cache_cleanup_hours: u64,
    /// Silence between stitched chunks, in milliseconds
    #[arg(long, default_value = "100")]
    silence_ms: u32,
    /// Model calls in flight per request
    #[arg(long, env = "SAORI_CHUNK_CONCURRENCY", default_value = "1")]
    chunk_concurrency: usize,
    /// Longest accepted request text, in characters
    #[arg(long, default_value = "2000")]
    max_text_chars: usize,
    /// Allowed CORS origins (default: any)
    #[arg(long, env = "CORS_ORIGINS", value_delimiter = ',')]
    cors_origins: Vec<String>,
}

#[tokio::main]
async fn main() -> CliResult {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("saori=info,saori_lib=info,tower_http=info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve(args) => serve(args).await,

        Command::Chunk { text, language } => {
            let chunks = split_text(&text, &language);
            println!("{} chunk(s), limit {} chars ({language})", chunks.len(), char_limit(&language));
            for (i, chunk) in chunks.iter().enumerate() {
                println!("[{}] ({} chars) {chunk}", i + 1, chunk.chars().count());
            }
            Ok(())
        }

        Command::Synthesize {
            text,
            user_id,
            voice,
            language,
            speed,
            output,
            server,
        } => {
            let resp = reqwest::Client::new()
                .post(format!("{server}/synthesize"))
                .json(&serde_json::json!({
                    "text": text,
                    "user_id": user_id,
                    "voice_name": voice,
                    "language": language,
                    "speed": speed,
                }))
                .send()
                .await?;
            if !resp.status().is_success() {
                let status = resp.status();
                return Err(format!("{status}: {}", resp.text().await.unwrap_or_default()).into());
            }
            let bytes = resp.bytes().await?;
            tokio::fs::write(&output, &bytes).await?;
            println!("wrote {} bytes to {}", bytes.len(), output.display());
            Ok(())
        }

        Command::Voices { user_id, server } => get_and_print(&format!("{server}/voices/{user_id}")).await,
        Command::Health { server } => get_and_print(&format!("{server}/health")).await,
    }
}

async fn serve(args: ServeArgs) -> CliResult {
    let supported_languages = match &args.languages {
        Some(csv) => parse_language_list(csv),
        None => ALL_LANGUAGES.iter().map(|l| l.to_string()).collect(),
    };
    let synth_config = SynthesisConfig {
        silence_ms: args.silence_ms,
        max_text_chars: args.max_text_chars,
        chunk_concurrency: args.chunk_concurrency,
        supported_languages,
        ..Default::default()
    };
    let cache_config = CacheConfig::from_gb_hours(args.max_cache_gb, args.cache_cleanup_hours);

    let model = HttpSpeechModel::new(&args.model_url, Duration::from_secs(args.model_timeout))?;
    if args.model_wait > 0 {
        if let Err(e) = model.wait_until_ready(Duration::from_secs(args.model_wait)).await {
            warn!("{e}; continuing without a ready model");
        }
    } else if !model.probe().await {
        warn!("model server at {} is not reachable yet", args.model_url);
    }

    let cache = AudioCache::open(args.data_dir.join("cache")).await?;
    let voices = VoiceStore::open(args.data_dir.join("voices")).await?;
    let synthesizer = Synthesizer::new(Arc::new(model), synth_config, cache.dir().join("chunks"));

    info!(
        "supported languages: {}",
        synthesizer.config().supported_languages.join(", ")
    );
    info!(
        "cache: {} (max {:.1} GB, sweep every {}h)",
        cache.dir().display(),
        args.max_cache_gb,
        args.cache_cleanup_hours
    );
    let sweeper = spawn_sweeper(cache.clone(), cache_config);

    let state = AppState {
        synthesizer: Arc::new(synthesizer),
        cache,
        voices,
    };
    let app = router(state, &args.cors_origins);

    let addr = format!("{}:{}", args.host, args.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("saori listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutting down");
        })
        .await?;

    sweeper.abort();
    Ok(())
}

async fn get_and_print(url: &str) -> CliResult {
    let resp = reqwest::Client::new().get(url).send().await?;
    println!("{}", resp.text().await.unwrap_or_default());
    Ok(())
}
