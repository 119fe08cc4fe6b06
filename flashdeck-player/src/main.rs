//! Flashdeck Player (flashdeck-player) - Main entry point
//!
//! Terminal front-end: loads the catalog, opens a folder and drives the playback
//! engine from line commands on stdin.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{bail, Context, Result};
use clap::Parser;
use flashdeck_common::config::{resolve_root_folder, ROOT_FOLDER_ENV};
use flashdeck_common::db::init_database;
use flashdeck_common::events::FlashdeckEvent;
use flashdeck_common::models::{FolderId, DEFAULT_LANGUAGE};
use flashdeck_player::audio::{AudioAdapter, ClipSink, CpalOutput, ResourceLocator, UnavailableSink};
use flashdeck_player::catalog::{Catalog, CatalogLoader, CatalogSource};
use flashdeck_player::config::{LoggingConfig, TomlConfig};
use flashdeck_player::db::{folders, settings};
use flashdeck_player::playback::{Engine, EngineConfig, EngineHandle, TransportCommand};
use flashdeck_player::speech::{CommandSpeechDevice, SpeechAdapter};
use flashdeck_player::SharedState;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Command-line arguments for flashdeck-player
#[derive(Parser, Debug)]
#[command(name = "flashdeck-player")]
#[command(about = "Flashcard pronunciation player")]
#[command(version)]
struct Args {
    /// Root folder holding the database, clips and local catalog files
    #[arg(short, long, env = "FLASHDECK_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    /// Configuration file (defaults to the platform config location)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Folder to open (defaults to the first non-empty folder)
    #[arg(short, long)]
    folder: Option<FolderId>,

    /// Start playing as soon as the folder opens
    #[arg(short, long)]
    autoplay: bool,

    /// Print the available folders and exit
    #[arg(long)]
    list: bool,

    /// Import personal folders from a JSON export before starting
    #[arg(long, value_name = "FILE")]
    import: Option<PathBuf>,

    /// Export personal folders as JSON and exit
    #[arg(long, value_name = "FILE")]
    export: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = TomlConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    init_tracing(&config.logging)?;

    info!(
        "Starting flashdeck-player v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("FLASHDECK_GIT_HASH"),
        env!("FLASHDECK_BUILD_TIMESTAMP"),
        env!("FLASHDECK_BUILD_PROFILE"),
    );

    let root_folder = resolve_root_folder(args.root_folder.as_deref(), ROOT_FOLDER_ENV, args.config.as_deref());
    std::fs::create_dir_all(&root_folder)
        .with_context(|| format!("Failed to create root folder {}", root_folder.display()))?;
    info!("Root folder: {}", root_folder.display());

    let db_path = config.database_path(&root_folder);
    let db = init_database(&db_path)
        .await
        .with_context(|| format!("Failed to open database {}", db_path.display()))?;

    if let Some(path) = &args.import {
        let json = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let ids = folders::import_personal_json(&db, &json)
            .await
            .context("Import rejected")?;
        println!("Imported {} personal folder(s)", ids.len());
    }

    if let Some(path) = &args.export {
        let json = folders::export_personal_json(&db).await.context("Export failed")?;
        tokio::fs::write(path, json)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("Exported personal folders to {}", path.display());
        return Ok(());
    }

    let prefs = settings::load_preferences(&db)
        .await
        .context("Failed to load preferences")?;

    let sources: Vec<CatalogSource> = config
        .catalog
        .sources
        .iter()
        .map(|source| CatalogSource::from_config(source, &root_folder))
        .collect();
    let catalog = CatalogLoader::new(db.clone(), DEFAULT_LANGUAGE)?
        .load(&sources)
        .await
        .context("Failed to load catalog")?;

    if args.list {
        print_folders(&catalog);
        return Ok(());
    }

    let folder = match args.folder {
        Some(id) => catalog.find(id).cloned(),
        None => catalog.first_playable().cloned(),
    };
    let Some(folder) = folder else {
        bail!("No playable folder found");
    };

    let sink: Arc<dyn ClipSink> = match CpalOutput::open(config.output_device.as_deref()) {
        Ok(output) => Arc::new(output),
        Err(e) => {
            warn!("Audio output unavailable, using speech only: {}", e);
            Arc::new(UnavailableSink)
        }
    };
    let audio = Arc::new(AudioAdapter::new(
        ResourceLocator::new(config.audio_root(&root_folder)),
        sink,
    ));

    let device = CommandSpeechDevice::new(&config.speech.program, config.speech.words_per_minute);
    let device = match device.discover_voices().await {
        Ok(voices) => {
            info!("Speech voices available: {}", voices.len());
            device.with_voices(voices)
        }
        Err(e) => {
            warn!("Could not list speech voices: {}", e);
            device
        }
    };
    let speech = SpeechAdapter::new(Arc::new(device), config.description_language.clone());

    let state = Arc::new(SharedState::new());
    let (engine, handle) = Engine::new(
        prefs,
        audio,
        speech,
        Arc::clone(&state),
        EngineConfig {
            stall_timeout: config.stall_timeout(),
        },
        Some(db.clone()),
    );
    let engine_task = tokio::spawn(engine.run());
    let printer_task = tokio::spawn(print_events(Arc::clone(&state)));

    // Launching with --autoplay counts as the gesture that unlocks output
    if args.autoplay {
        handle.unlock()?;
    }
    handle.open_folder(folder, args.autoplay)?;
    println!("Type 'help' for commands.");

    tokio::select! {
        result = command_loop(&handle, &catalog) => result?,
        _ = shutdown_signal() => {}
    }

    drop(handle);
    if let Err(e) = engine_task.await {
        warn!("Playback engine task failed: {}", e);
    }
    printer_task.abort();
    db.close().await;

    info!("Shutdown complete");
    Ok(())
}

fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "flashdeck_player={level},flashdeck_common={level}",
            level = logging.level
        ))
    });

    let file_layer = match &logging.file {
        Some(path) => {
            let file = open_log_file(path)?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };
    let stderr_layer = logging
        .file
        .is_none()
        .then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();
    Ok(())
}

fn open_log_file(path: &Path) -> Result<std::fs::File> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file {}", path.display()))
}

/// Read stdin commands until `quit` or end of input
async fn command_loop(handle: &EngineHandle, catalog: &Catalog) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut unlocked = false;

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        // The first command typed is the user gesture that permits output
        if !unlocked {
            handle.unlock()?;
            unlocked = true;
        }

        match line {
            "quit" | "q" | "exit" => break,
            "help" | "?" => print_help(),
            "list" => print_folders(catalog),
            "status" => {
                let snapshot = handle.snapshot().await;
                println!(
                    "{} | card {}/{} | repeats left {} | {:?}",
                    snapshot.state,
                    snapshot.position + 1,
                    snapshot.deck_len,
                    snapshot.remaining_repeats,
                    snapshot.preferences
                );
            }
            _ => {
                if let Some(rest) = line.strip_prefix("open ") {
                    match rest.trim().parse::<FolderId>().ok().and_then(|id| catalog.find(id)) {
                        Some(folder) => handle.open_folder(folder.clone(), true)?,
                        None => println!("No folder {}", rest.trim()),
                    }
                    continue;
                }

                match TransportCommand::parse(line) {
                    Ok(command) => handle.send(command)?,
                    Err(msg) => println!("{}", msg),
                }
            }
        }
    }

    Ok(())
}

async fn print_events(state: Arc<SharedState>) {
    let mut events = state.subscribe_events();
    loop {
        match events.recv().await {
            Ok(FlashdeckEvent::DeckLoaded {
                folder_name,
                card_count,
                ..
            }) => println!("== {} ({} cards) ==", folder_name, card_count),
            Ok(FlashdeckEvent::CurrentCardChanged {
                position,
                term,
                term_visible,
                ..
            }) => {
                let shown = if term_visible { term.as_str() } else { "••••" };
                println!("[{}] {}", position + 1, shown);
            }
            Ok(FlashdeckEvent::PlaybackStateChanged { new_state, .. }) => {
                println!("  ({})", new_state);
            }
            Ok(FlashdeckEvent::PreferencesChanged { preferences, .. }) => {
                println!(
                    "  rate {:.2} | repeat {} | shuffle {} | hide {} | audio {} | desc {}",
                    preferences.rate,
                    preferences.repeat_count,
                    on_off(preferences.shuffle),
                    on_off(preferences.hide_term),
                    on_off(preferences.prefer_audio),
                    on_off(preferences.read_description),
                );
            }
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => {
                warn!("Event printer lagged, skipped {} event(s)", skipped);
            }
            Err(RecvError::Closed) => break,
        }
    }
}

fn on_off(value: bool) -> &'static str {
    if value {
        "on"
    } else {
        "off"
    }
}

fn print_folders(catalog: &Catalog) {
    for folder in catalog.folders() {
        let origin = if folder.is_read_only() { "" } else { " (personal)" };
        println!("{:>8}  {} [{} cards, {}]{}", folder.id, folder.name, folder.len(), folder.language, origin);
    }
}

fn print_help() {
    println!(
        "play | pause | toggle (p) | next (n) | prev (b) | replay (r) | reveal | jump N\n\
         shuffle on|off | hide on|off | audio on|off | desc on|off | rate X | repeat N\n\
         open ID | list | status | unlock | leave | quit"
    );
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
