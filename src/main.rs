//! notesync - two-way note/task sync
//!
//! Main entry point for the notesync CLI.

use clap::{Parser, Subcommand};
use notesync::config::SyncConfig;
use notesync::node::ID_ROOT_FOLDER;
use notesync::remote::{CredentialSource, EnvCredentials, GTaskClient, HttpTransport};
use notesync::retry::{with_retry, RetryConfig};
use notesync::store::SqliteNoteStore;
use notesync::{NoteSyncError, SyncEngine, SyncEvent, SyncReport, SyncStatus};
use std::path::PathBuf;
use std::process;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

/// notesync - keep local notes and remote tasks in step
#[derive(Parser, Debug)]
#[command(name = "notesync")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to config file (default: ~/.config/notesync/config.yaml)
    #[arg(short, long, env = "NOTESYNC_CONFIG")]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a configuration file
    Init {
        /// Account to sync (e.g., someone@gmail.com)
        #[arg(short, long)]
        account: String,

        /// Environment variable holding the auth token
        #[arg(long)]
        token_env: Option<String>,

        /// Path of the local note database
        #[arg(long)]
        store: Option<String>,
    },

    /// Run one sync
    Sync {
        /// Retries after a network failure (default: from config)
        #[arg(short, long)]
        retries: Option<u32>,
    },

    /// Show the local store and what the next sync will push
    Status,

    /// Manage notes
    #[command(subcommand)]
    Note(NoteCommands),

    /// Manage folders
    #[command(subcommand)]
    Folder(FolderCommands),
}

#[derive(Subcommand, Debug)]
enum NoteCommands {
    /// Add a note
    Add {
        /// Note text
        body: String,

        /// Folder id (default: root)
        #[arg(short, long)]
        folder: Option<i64>,
    },

    /// Replace a note's text
    Edit {
        /// Note id
        id: i64,

        /// New text
        body: String,
    },

    /// Move a note (or folder) to the trash
    Trash {
        /// Note id
        id: i64,
    },

    /// Move a note to another folder
    Move {
        /// Note id
        id: i64,

        /// Destination folder id
        folder: i64,
    },

    /// List notes outside the trash
    List {
        /// Only notes in this folder
        #[arg(short, long)]
        folder: Option<i64>,
    },
}

#[derive(Subcommand, Debug)]
enum FolderCommands {
    /// Add a folder
    Add {
        /// Folder name
        name: String,
    },

    /// Rename a folder
    Rename {
        /// Folder id
        id: i64,

        /// New name
        name: String,
    },
}

fn main() {
    // Initialize logging
    if let Err(e) = notesync::logging::init() {
        eprintln!("Failed to initialize logging: {}", e);
    }

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run(cli: Cli) -> notesync::Result<()> {
    // Init creates the config, everything else needs it
    if let Commands::Init {
        ref account,
        ref token_env,
        ref store,
    } = cli.command
    {
        return handle_init_command(&cli.config, account, token_env.as_deref(), store.as_deref());
    }

    let config = load_config(&cli.config)?;
    tracing::info!(account = %config.account.name, "Configuration loaded");

    match cli.command {
        Commands::Init { .. } => Ok(()),
        Commands::Sync { retries } => handle_sync_command(&config, retries),
        Commands::Status => handle_status_command(&config),
        Commands::Note(cmd) => handle_note_command(&config, cmd),
        Commands::Folder(cmd) => handle_folder_command(&config, cmd),
    }
}

fn config_path(config_path: &Option<String>) -> PathBuf {
    match config_path {
        Some(path) => PathBuf::from(path),
        None => SyncConfig::default_path(),
    }
}

fn load_config(config_path_arg: &Option<String>) -> notesync::Result<SyncConfig> {
    let path = config_path(config_path_arg);
    match SyncConfig::load(&path) {
        Ok(config) => Ok(config),
        Err(NoteSyncError::Config(msg)) if msg.contains("Config file not found") => {
            Err(NoteSyncError::Config(format!(
                "No configuration found at {}. Run 'notesync init --account <email>' first.",
                path.display()
            )))
        }
        Err(e) => Err(e),
    }
}

fn handle_init_command(
    config_path_arg: &Option<String>,
    account: &str,
    token_env: Option<&str>,
    store: Option<&str>,
) -> notesync::Result<()> {
    let config_file = config_path(config_path_arg);

    if config_file.exists() {
        println!("Configuration already exists at {}", config_file.display());
        return Ok(());
    }

    let mut config = SyncConfig::new(account);
    if let Some(var) = token_env {
        config.account.token_env = var.to_string();
    }
    if let Some(path) = store {
        config.store.path = PathBuf::from(path);
    }
    config.validate()?;
    config.save(&config_file)?;

    println!("✓ Created configuration at {}", config_file.display());
    println!();
    println!("Next steps:");
    println!("  1. Export your auth token:");
    println!("     export {}=<token>", config.account.token_env);
    println!();
    println!("  2. Add a note and sync:");
    println!("     notesync note add \"buy milk\"");
    println!("     notesync sync");

    Ok(())
}

fn open_store(config: &SyncConfig) -> notesync::Result<SqliteNoteStore> {
    SqliteNoteStore::open(&config.store.path)
}

fn handle_sync_command(config: &SyncConfig, retries: Option<u32>) -> notesync::Result<()> {
    config.validate()?;

    let mut retry = RetryConfig::from_settings(&config.retry);
    if let Some(n) = retries {
        retry.max_retries = n;
    }

    let runtime = tokio::runtime::Runtime::new()?;
    let result: notesync::Result<SyncReport> = runtime.block_on(async {
        let store = open_store(config)?;
        let transport = HttpTransport::new(&config.remote)?;
        let client = GTaskClient::from_config(transport, &config.remote);
        let credentials: Arc<dyn CredentialSource> =
            Arc::new(EnvCredentials::from_config(&config.account));
        let engine = Arc::new(SyncEngine::new(client, store, credentials));

        let mut events = engine.subscribe();
        let printer = tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => print_event(&event),
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Progress output fell behind");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });

        let cancel = engine.cancel_flag();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("Cancelling sync...");
                cancel.store(true, Ordering::SeqCst);
            }
        });

        let worker_engine = Arc::clone(&engine);
        let worker = tokio::spawn(async move {
            with_retry(&retry, "sync", || worker_engine.run()).await
        });

        let result = worker
            .await
            .map_err(|e| NoteSyncError::Other(format!("sync task failed: {}", e)))?;

        // Closing the event channel lets the printer finish
        drop(engine);
        let _ = printer.await;
        result
    });

    match SyncStatus::from_result(&result) {
        SyncStatus::Success => {
            if let Ok(report) = result {
                let stats = &report.stats;
                println!();
                println!("✓ Sync complete");
                for (label, count) in [
                    ("Unchanged", stats.unchanged),
                    ("Added locally", stats.added_local),
                    ("Added remotely", stats.added_remote),
                    ("Updated locally", stats.updated_local),
                    ("Updated remotely", stats.updated_remote),
                    ("Conflicts (kept local)", stats.conflicts),
                    ("Deleted locally", stats.deleted_local),
                    ("Deleted remotely", stats.deleted_remote),
                ] {
                    println!("  {:<24}{}", format!("{}:", label), count);
                }
            }
            Ok(())
        }
        SyncStatus::Cancelled => Err(NoteSyncError::Other("sync cancelled".to_string())),
        status => match result {
            Err(e) => Err(NoteSyncError::Other(format!("sync ended with {}: {}", status, e))),
            Ok(_) => Err(NoteSyncError::Other(format!("sync ended with {}", status))),
        },
    }
}

fn print_event(event: &SyncEvent) {
    match event {
        SyncEvent::Started => println!("Starting sync"),
        SyncEvent::Phase(phase) => println!("  {}...", phase),
        SyncEvent::Applied { action, name } => {
            println!("    {:<16} {}", action.to_string(), first_line(name))
        }
        SyncEvent::Finished(status) => println!("Sync finished: {}", status),
    }
}

fn first_line(text: &str) -> String {
    let line = text.lines().next().unwrap_or_default();
    if line.chars().count() > 60 {
        let cut: String = line.chars().take(57).collect();
        format!("{}...", cut)
    } else {
        line.to_string()
    }
}

fn handle_status_command(config: &SyncConfig) -> notesync::Result<()> {
    let store = open_store(config)?;
    let summary = store.summary()?;

    println!("Account: {}", config.account.name);
    println!("Store:   {}", config.store.path.display());
    println!("Remote:  {}", config.remote.base_url);
    println!();
    println!("Folders:         {}", summary.folders);
    println!("Notes:           {}", summary.notes);
    println!("In trash:        {}", summary.trashed);
    println!("Never synced:    {}", summary.unsynced);
    println!("Modified:        {}", summary.modified);

    if std::env::var(&config.account.token_env).is_err() {
        println!();
        println!("⚠ {} is not set; sync will fail to log in", config.account.token_env);
    }

    Ok(())
}

fn handle_note_command(config: &SyncConfig, cmd: NoteCommands) -> notesync::Result<()> {
    let mut store = open_store(config)?;

    match cmd {
        NoteCommands::Add { body, folder } => {
            let id = store.create_note(folder.unwrap_or(ID_ROOT_FOLDER), &body)?;
            println!("✓ Added note {}", id);
        }
        NoteCommands::Edit { id, body } => {
            store.edit_note(id, &body)?;
            println!("✓ Updated note {}", id);
        }
        NoteCommands::Trash { id } => {
            store.trash_note(id)?;
            println!("✓ Moved {} to the trash", id);
        }
        NoteCommands::Move { id, folder } => {
            store.move_note(id, folder)?;
            println!("✓ Moved note {} to folder {}", id, folder);
        }
        NoteCommands::List { folder } => {
            let notes = store.list_notes(folder)?;
            println!("{} notes:", notes.len());
            for note in notes {
                let marker = if note.local_modified { "*" } else { " " };
                println!(
                    "{} {:>5}  [{}]  {}",
                    marker,
                    note.id,
                    note.parent_id,
                    first_line(&note.snippet)
                );
            }
        }
    }

    Ok(())
}

fn handle_folder_command(config: &SyncConfig, cmd: FolderCommands) -> notesync::Result<()> {
    let mut store = open_store(config)?;

    match cmd {
        FolderCommands::Add { name } => {
            let id = store.create_folder(&name)?;
            println!("✓ Added folder {} ({})", name, id);
        }
        FolderCommands::Rename { id, name } => {
            store.rename_folder(id, &name)?;
            println!("✓ Renamed folder {} to {}", id, name);
        }
    }

    Ok(())
}
