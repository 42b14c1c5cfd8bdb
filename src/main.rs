use anyhow::Result;
use callcapture::backends::{FsCallRecordStore, FsObjectStore};
use callcapture::{
    create_router, AppState, Config, FileCaptureSource, FileStorage, RecordingManager,
    RecoveryStore, TranscriptionClient,
};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "callcapture", about = "Chunked call-recording service")]
struct Args {
    /// Path to the config file (without extension)
    #[arg(long, default_value = "config/callcapture")]
    config: String,

    /// WAV file standing in for the live audio input
    #[arg(long, default_value = "fixtures/sample-call.wav")]
    capture_file: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let cfg = Config::load(&args.config)?;

    info!("{} v0.1.0", cfg.service.name);
    info!(
        "Chunks: {}s, upload retries: {}",
        cfg.recording.chunk_duration_secs, cfg.upload.max_retries
    );

    let records = Arc::new(FsCallRecordStore::new(&cfg.storage.data_dir)?);
    let objects = Arc::new(FsObjectStore::new(&cfg.storage.data_dir)?);
    let storage = FileStorage::new(&cfg.recovery.storage_path)?;
    let recovery = RecoveryStore::new(
        Box::new(storage),
        Duration::from_secs(cfg.recovery.staleness_hours * 3600),
    );
    let capture = Box::new(FileCaptureSource::new(&args.capture_file).realtime(true));

    let manager = Arc::new(RecordingManager::new(
        cfg.recorder_config(),
        records,
        objects,
        recovery,
        capture,
    ));

    let mut state = AppState::new(manager);
    match TranscriptionClient::connect(&cfg.nats.url).await {
        Ok(client) => state = state.with_transcription(Arc::new(client)),
        Err(e) => warn!("NATS unavailable, transcription requests disabled: {}", e),
    }

    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("HTTP server listening on {}", addr);

    axum::serve(listener, create_router(state)).await?;

    Ok(())
}
