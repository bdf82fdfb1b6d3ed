use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::info;
use voicenote::db::{ensure_schema, PersistenceGateway, PgNoteStore, PgSlotStore};
use voicenote::identity::SequenceAllocator;
use voicenote::transcribe::{GcsBlobStore, GoogleSpeechClient, TranscriptionDispatcher};
use voicenote::{create_router, AppState, Config};

#[derive(Parser)]
#[command(name = "voicenote", about = "Voice note recording-to-note pipeline service")]
struct Cli {
    /// Config file path (without extension, per the config crate).
    #[arg(long, default_value = "config/voicenote")]
    config: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP service (default).
    Serve,
    /// Create the schema and populate the sequence-slot pool.
    Seed {
        /// Highest slot number to populate.
        #[arg(long, default_value_t = 9999)]
        slots: u32,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "voicenote=info,tower_http=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let cfg = Config::load(&cli.config)
        .with_context(|| format!("failed to load config from {}", cli.config))?;

    info!(service = %cfg.service.name, "configuration loaded");

    let gateway = Arc::new(PersistenceGateway::new(cfg.database.clone()));

    match cli.command.unwrap_or(Command::Serve) {
        Command::Seed { slots } => {
            ensure_schema(&gateway).await?;
            let inserted = PgSlotStore::new(Arc::clone(&gateway)).seed(slots).await?;
            info!(inserted, "seeding complete");
            gateway.close().await;
        }
        Command::Serve => {
            let provider = Arc::new(GoogleSpeechClient::new(cfg.speech.clone()));
            let storage = Arc::new(GcsBlobStore::new(cfg.storage.clone()));
            let dispatcher = Arc::new(TranscriptionDispatcher::new(
                cfg.recording.mode,
                &cfg.speech,
                provider,
                storage,
            ));

            let notes = Arc::new(PgNoteStore::new(Arc::clone(&gateway)));
            let allocator = Arc::new(SequenceAllocator::new(Arc::new(PgSlotStore::new(
                Arc::clone(&gateway),
            ))));

            let state = AppState::new(dispatcher, notes, allocator);
            let router = create_router(state);

            let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
            let listener = tokio::net::TcpListener::bind(&addr)
                .await
                .with_context(|| format!("failed to bind {}", addr))?;

            info!(%addr, mode = ?cfg.recording.mode, "HTTP server listening");
            axum::serve(listener, router).await?;
        }
    }

    Ok(())
}
