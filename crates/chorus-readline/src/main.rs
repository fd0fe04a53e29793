mod command;
mod helper;
mod terminal;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context as _, Result, anyhow};
use clap::Parser;
use colored::Colorize;
use rustyline::Editor;
use tokio::sync::mpsc;

use chorus_application::{ImportMode, TurnOrchestrator};
use chorus_core::selection::{ChatMode, RoundTextScanner};
use chorus_core::session::{ChatData, MessageContent};
use chorus_execution::{LogFormat, LoggingOptions, RoundEvent, init_tracing};
use chorus_infrastructure::storage::{BlobStore, FileBlobStore, MemoryBlobStore};
use chorus_infrastructure::{BlobMuteListRepository, BlobSessionRepository, ChorusPaths, ConfigLoader};
use chorus_interaction::CompletionClient;
use chorus_interaction::attachment::image_data_url;

use crate::command::{Command, HELP_TEXT};
use crate::helper::CliHelper;
use crate::terminal::TerminalRenderer;

#[derive(Parser)]
#[command(name = "chorus")]
#[command(about = "Chorus - one group chat, several AI personas", long_about = None)]
struct Args {
    /// Path to chorus.toml (defaults to $CHORUS_CONFIG, then the config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override chat.mode (sequential, shuffled, random_subset, button_invite, natural_random)
    #[arg(short, long)]
    mode: Option<ChatMode>,

    /// Keep chat data in memory only
    #[arg(long)]
    ephemeral: bool,

    /// Directory for log files (defaults to the data directory)
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Write logs as JSON lines
    #[arg(long)]
    json_logs: bool,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,
}

/// Entry point of the Chorus REPL.
///
/// 1. Installs file logging and a round-event channel
/// 2. Loads `chorus.toml` and opens the chat store
/// 3. Reads lines: slash commands are executed, anything else is sent to
///    the group and awaited until the round completes
#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // ===== Logging =====
    let log_dir = match args.log_dir.clone() {
        Some(dir) => dir,
        None => ChorusPaths::log_dir()?,
    };
    let (round_tx, mut round_rx) = mpsc::unbounded_channel();
    let _log_guard = init_tracing(LoggingOptions {
        format: if args.json_logs {
            LogFormat::Json
        } else {
            LogFormat::Pretty
        },
        log_dir: Some(log_dir),
        default_directive: args.log_level.clone(),
        round_events: Some(round_tx),
    })?;

    // ===== Backend Initialization =====
    let (mut config, config_path) = ConfigLoader::load(args.config.as_deref())?;
    if let Some(mode) = args.mode {
        config.chat.mode = mode;
    }
    let registry = config.registry()?;
    let scanner = RoundTextScanner::new(registry.active());

    let blob_store: Arc<dyn BlobStore> = if args.ephemeral {
        Arc::new(MemoryBlobStore::new())
    } else {
        Arc::new(FileBlobStore::default_location()?)
    };
    let orchestrator = TurnOrchestrator::open(
        &config,
        Arc::new(BlobSessionRepository::new(blob_store.clone())),
        Arc::new(BlobMuteListRepository::new(blob_store)),
        Arc::new(CompletionClient::from_config(&config)),
        Arc::new(TerminalRenderer::stdout(scanner.clone())),
    )
    .await?;

    // ===== REPL Setup =====
    let persona_names: Vec<String> = registry.active().iter().map(|p| p.name.clone()).collect();
    let mut rl = Editor::new()?;
    rl.set_helper(Some(CliHelper::new(persona_names.clone(), scanner)));

    println!("{}", "=== Chorus ===".bright_magenta().bold());
    println!(
        "{}",
        format!("Config: {}", config_path.display()).bright_black()
    );
    println!(
        "{}",
        format!("Mode: {}  Personas: {}", config.chat.mode, persona_names.join(", ")).bright_black()
    );
    println!("{}", "Type /help for commands or 'quit' to exit.".bright_black());
    println!();
    print_history(&orchestrator).await;

    // ===== Main REPL Loop =====
    loop {
        let readline = rl.readline(">> ");

        match readline {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(trimmed);

                let command = match command::parse(trimmed) {
                    Ok(Command::Quit) => {
                        println!("{}", "Goodbye!".bright_green());
                        break;
                    }
                    Ok(command) => command,
                    Err(e) => {
                        eprintln!("{}", e.to_string().red());
                        continue;
                    }
                };

                if let Err(e) = execute(&orchestrator, command).await {
                    eprintln!("{}", format!("Error: {:#}", e).red());
                }
                drain_round_events(&mut round_rx);
            }
            Err(rustyline::error::ReadlineError::Interrupted) => {
                println!("{}", "CTRL-C detected. Type 'quit' to exit.".yellow());
            }
            Err(rustyline::error::ReadlineError::Eof) => {
                println!("{}", "CTRL-D detected. Exiting...".bright_green());
                break;
            }
            Err(err) => {
                eprintln!("{}", format!("Error: {:?}", err).red());
                break;
            }
        }
    }

    Ok(())
}

async fn execute(orchestrator: &TurnOrchestrator, command: Command) -> Result<()> {
    match command {
        Command::Help => println!("{}", HELP_TEXT.bright_black()),
        Command::Quit => {}
        Command::Message(text) => {
            orchestrator
                .send_user_message(MessageContent::text(text))
                .await?;
        }
        Command::Image { path, text } => {
            let image = image_data_url(&path)
                .await
                .with_context(|| format!("cannot attach {}", path.display()))?;
            orchestrator
                .send_user_message(MessageContent::with_image(text, Some(image)))
                .await?;
        }
        Command::Invite(name) => {
            let outcome = orchestrator.invite(&name).await?;
            if outcome.is_empty() {
                println!("{}", format!("{} is muted or excluded.", name).yellow());
            }
        }
        Command::Mute(name) => {
            let muted = orchestrator.toggle_mute(&name).await?;
            let state = if muted { "muted" } else { "unmuted" };
            println!("{}", format!("{} {}.", name, state).yellow());
        }
        Command::Exclude(name) => {
            let excluded = orchestrator.toggle_exclude(&name).await?;
            let state = if excluded {
                "will skip the next round"
            } else {
                "is back in the next round"
            };
            println!("{}", format!("{} {}.", name, state).yellow());
        }
        Command::Status => {
            let eligibility = orchestrator.eligibility().await;
            let registry = orchestrator.registry();
            for persona in registry.all() {
                if registry.find_active(&persona.name).is_none() {
                    println!("  {} {}", persona.name.bright_black(), "inactive".bright_black());
                    continue;
                }
                let mut flags = Vec::new();
                if eligibility.is_muted(&persona.name) {
                    flags.push("muted");
                }
                if eligibility.is_excluded(&persona.name) {
                    flags.push("excluded next round");
                }
                if eligibility.is_opted_out(&persona.name) {
                    flags.push("sitting out next round");
                }
                let flags = if flags.is_empty() {
                    "ready".to_string()
                } else {
                    flags.join(", ")
                };
                println!("  {} {}", persona.name.bright_magenta(), flags.bright_black());
            }
        }
        Command::Sessions => {
            for session in orchestrator.sessions().await {
                let marker = if session.is_active { "*" } else { " " };
                println!(
                    "{} {}  {} {}",
                    marker.bright_green(),
                    session.id,
                    session.name,
                    format!("({} messages)", session.message_count).bright_black()
                );
            }
        }
        Command::New => {
            let id = orchestrator.create_session(true).await?;
            println!("{}", format!("Started session {}", id).bright_green());
        }
        Command::Switch(id) => {
            let active = orchestrator.switch_session(&id).await?;
            if active != id {
                println!("{}", format!("No session '{}'.", id).yellow());
            }
            print_history(orchestrator).await;
        }
        Command::Delete(id) => {
            let active = orchestrator.delete_session(&id).await?;
            println!("{}", format!("Deleted {}; active session is {}", id, active).yellow());
        }
        Command::Export { all, path } => {
            let data = if all {
                orchestrator.export_all().await
            } else {
                orchestrator
                    .export_current()
                    .await
                    .ok_or_else(|| anyhow!("there is no active session to export"))?
            };
            write_export(&path, &data).await?;
            println!(
                "{}",
                format!("Exported {} session(s) to {}", data.sessions.len(), path.display()).bright_green()
            );
        }
        Command::Import { mode, paths } => {
            let mut payloads = Vec::with_capacity(paths.len());
            for path in &paths {
                payloads.push(read_import(path).await?);
            }
            orchestrator.import(mode, payloads).await?;
            let verb = match mode {
                ImportMode::Replace => "Replaced store with",
                ImportMode::Merge => "Merged",
            };
            println!(
                "{}",
                format!("{} {} file(s)", verb, paths.len()).bright_green()
            );
            print_history(orchestrator).await;
        }
    }
    Ok(())
}

async fn write_export(path: &Path, data: &ChatData) -> Result<()> {
    let json = serde_json::to_string_pretty(data)?;
    tokio::fs::write(path, json)
        .await
        .with_context(|| format!("cannot write {}", path.display()))
}

async fn read_import(path: &Path) -> Result<ChatData> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("cannot read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("{} is not a chat export", path.display()))
}

async fn print_history(orchestrator: &TurnOrchestrator) {
    let history = orchestrator.active_history().await;
    if history.is_empty() {
        return;
    }
    for message in &history {
        let header = format!("[{}]", message.name);
        if message.is_user() {
            println!("{}", header.green().bold());
        } else {
            println!("{}", header.bright_magenta().bold());
        }
        if message.content.non_empty_image().is_some() {
            println!("{}", chorus_interaction::request::IMAGE_PLACEHOLDER.bright_black());
        }
        println!("{}", message.text());
        println!();
    }
}

/// Prints the round notes a user would otherwise miss.
fn drain_round_events(receiver: &mut mpsc::UnboundedReceiver<RoundEvent>) {
    while let Ok(event) = receiver.try_recv() {
        match event.kind() {
            Some("round_empty") => {
                println!("{}", "Nobody is eligible to speak this round.".bright_black());
            }
            Some("save_failed") => {
                let persona = event.field_str("persona").unwrap_or("A persona");
                println!(
                    "{}",
                    format!("Could not save {}'s reply; it will be saved with the next message.", persona)
                        .yellow()
                );
            }
            Some("speaker_finished") if event.fields.get("opted_out") == Some(&serde_json::Value::Bool(true)) => {
                let persona = event.field_str("persona").unwrap_or("A persona");
                println!(
                    "{}",
                    format!("{} will sit out the next round.", persona).bright_black()
                );
            }
            _ => {}
        }
    }
}
