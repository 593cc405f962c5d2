//! CLI entry point for Josephine

mod simulate;

use anyhow::Result;
use clap::{Parser, Subcommand};
use console::style;
use dialoguer::{Confirm, Input};
use josephine_channels::ChannelManager;
use josephine_core::bus::{InboundMessage, MessageBus};
use josephine_core::config::{Config, ConfigLoader};
use josephine_core::logging;
use josephine_core::session::{CorrespondentId, SessionStore};
use josephine_core::utils::{ensure_dir, expand_tilde, preview};
use josephine_dialogue::script::Choice;
use josephine_dialogue::{
    Content, DialogueLoop, EngineSettings, Outcome, Script, ScriptEntry, SessionEngine, Vocabulary,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "josephine")]
#[command(about = "Scripted WhatsApp assistant with human takeover")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration directory
    #[arg(short, long, global = true)]
    config_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize Josephine configuration
    Onboard,
    /// Run the WhatsApp gateway
    Gateway,
    /// Chat with the dialogue engine from the terminal
    Simulate {
        /// Correspondent id to chat as
        #[arg(long = "as", default_value = "simulator@s.whatsapp.net")]
        as_id: String,
    },
    /// Check the dialogue script and print it
    Script,
    /// Show status information
    Status,
    /// Manage channels
    Channels {
        #[command(subcommand)]
        command: ChannelCommands,
    },
}

#[derive(Subcommand)]
enum ChannelCommands {
    /// Show channel status
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // The gateway installs its own subscriber with file output.
    if !matches!(cli.command, Commands::Gateway) {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
            )
            .init();
    }

    let config_loader = if let Some(dir) = cli.config_dir {
        ConfigLoader::with_dir(dir)
    } else {
        ConfigLoader::new()
    };

    match cli.command {
        Commands::Onboard => {
            info!("Running onboard command");
            run_onboard(&config_loader).await?;
        }
        Commands::Gateway => run_gateway(&config_loader).await?,
        Commands::Simulate { as_id } => {
            info!("Starting simulator as {}", as_id);
            run_simulate(&config_loader, as_id).await?;
        }
        Commands::Script => run_script()?,
        Commands::Status => {
            info!("Showing status");
            run_status(&config_loader).await?;
        }
        Commands::Channels { command } => match command {
            ChannelCommands::Status => {
                info!("Showing channel status");
                run_channel_status(&config_loader).await?;
            }
        },
    }

    Ok(())
}

/// Interactive first-run setup
async fn run_onboard(loader: &ConfigLoader) -> Result<()> {
    println!("{}", style("Welcome to Josephine!").bold().cyan());
    println!("Let's set up your configuration.\n");

    let config_path = loader.config_dir().join("config.json");
    if config_path.exists() {
        let overwrite = Confirm::new()
            .with_prompt("Configuration already exists. Overwrite?")
            .default(false)
            .interact()?;
        if !overwrite {
            println!("Onboard cancelled.");
            return Ok(());
        }
    }

    let mut config = Config::default();

    let owner: String = Input::new()
        .with_prompt("Your WhatsApp number (the account Josephine runs on)")
        .validate_with(|input: &String| -> std::result::Result<(), &str> {
            let digits = input.trim().trim_start_matches('+');
            if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
                Ok(())
            } else {
                Err("enter digits only, with country code")
            }
        })
        .interact_text()?;
    config.operator.id = format!(
        "{}@s.whatsapp.net",
        owner.trim().trim_start_matches('+')
    );

    config.channels.whatsapp.enabled = Confirm::new()
        .with_prompt("Enable the WhatsApp channel now?")
        .default(true)
        .interact()?;
    config.channels.whatsapp.bridge_url = Input::new()
        .with_prompt("WhatsApp bridge URL")
        .default(config.channels.whatsapp.bridge_url.clone())
        .interact_text()?;

    let cooldown_hours: u64 = Input::new()
        .with_prompt("Hours of silence after a finished conversation")
        .default(config.dialogue.cooldown_secs / 3600)
        .interact_text()?;
    config.dialogue.cooldown_secs = cooldown_hours.max(1) * 3600;

    josephine_core::config::validate::validate_config(&config)?;
    loader.save(&config)?;

    println!(
        "\n{}",
        style("Configuration saved successfully!").green().bold()
    );
    println!("Config location: {}", config_path.display());
    println!("\nYou can now run:");
    println!("  {} - Start the gateway", style("josephine gateway").cyan());
    println!(
        "  {} - Try the dialogue in the terminal",
        style("josephine simulate").cyan()
    );

    Ok(())
}

/// Run the WhatsApp gateway
async fn run_gateway(loader: &ConfigLoader) -> Result<()> {
    let config = loader.load()?;

    let mut logging_config = config.logging.clone();
    let log_dir = ensure_dir(expand_tilde(&config.logging.dir))?;
    logging_config.dir = log_dir.to_string_lossy().to_string();
    let _log_guard = logging::init_logging(&logging_config);

    println!("{}", style("Starting Josephine Gateway...").bold().cyan());
    match config.operator.user_part() {
        Some(owner) => println!("Operator: {}", owner),
        None => println!("Operator: {}", style("not configured").yellow()),
    }
    if !config.channels.whatsapp.enabled {
        warn!("WhatsApp channel is disabled");
        println!(
            "{}",
            style("WhatsApp is disabled, set channels.whatsapp.enabled to receive messages.")
                .yellow()
        );
    }

    let bus = MessageBus::new();

    let engine = Arc::new(SessionEngine::new(
        SessionStore::new(),
        EngineSettings::from_config(&config),
    )?);
    let mut dialogue = DialogueLoop::new(bus.clone(), engine)
        .with_operator(config.operator.user_part().map(String::from));
    let dialogue_shutdown = dialogue.shutdown_handle();

    let mut channel_manager = ChannelManager::new(config.clone());

    // Bridge channel inbound queue -> message bus inbound queue
    let (inbound_tx, mut inbound_rx) = mpsc::channel::<InboundMessage>(1024);
    channel_manager.set_inbound_sender(inbound_tx);
    let bus_for_inbound_bridge = bus.clone();
    let inbound_bridge_handle = tokio::spawn(async move {
        while let Some(msg) = inbound_rx.recv().await {
            if let Err(e) = bus_for_inbound_bridge.publish_inbound(msg) {
                error!("Failed to publish inbound message to bus: {}", e);
            }
        }
    });

    if let Err(e) = channel_manager.initialize().await {
        error!("Failed to initialize channels: {}", e);
    }

    let channel_manager = Arc::new(channel_manager);
    for channel_name in channel_manager.list_channels().await {
        let manager = channel_manager.clone();
        let channel_key = channel_name.clone();
        bus.subscribe_outbound(channel_name, move |msg| {
            let manager = manager.clone();
            let channel_key = channel_key.clone();
            async move {
                let target = msg.chat_id.clone();
                let text = preview(&msg.content);
                match manager.send(&channel_key, msg).await {
                    Ok(()) => info!("Sent to {} via {}: {}", target, channel_key, text),
                    Err(e) => error!(
                        "Failed to send outbound message to {} via {}: {}",
                        target, channel_key, e
                    ),
                }
            }
        })
        .await;
    }

    let bus_for_outbound_dispatch = bus.clone();
    let outbound_dispatch_handle = tokio::spawn(async move {
        bus_for_outbound_dispatch.dispatch_outbound_loop().await;
    });

    if let Err(e) = channel_manager.start_all().await {
        error!("Channel manager error: {}", e);
    }

    let dialogue_handle = tokio::spawn(async move {
        if let Err(e) = dialogue.run().await {
            error!("Dialogue loop error: {}", e);
        }
    });

    println!(
        "\n{}",
        style("Gateway is running. Press Ctrl+C to stop.").green()
    );

    tokio::signal::ctrl_c().await?;
    println!("\n{}", style("Shutting down...").yellow());

    dialogue_shutdown.notify_one();
    let _ = dialogue_handle.await;

    bus.stop();
    if let Err(e) = channel_manager.stop_all().await {
        error!("Failed to stop channels: {}", e);
    }

    inbound_bridge_handle.abort();
    let _ = inbound_bridge_handle.await;
    outbound_dispatch_handle.abort();
    let _ = outbound_dispatch_handle.await;

    println!("{}", style("Gateway stopped.").green());
    Ok(())
}

/// Drive the engine from the terminal
async fn run_simulate(loader: &ConfigLoader, as_id: String) -> Result<()> {
    let config = loader.load()?;
    let correspondent = CorrespondentId::new(as_id);
    if !correspondent.is_one_to_one() {
        anyhow::bail!(
            "{} is a group or broadcast id, Josephine would ignore it",
            correspondent
        );
    }
    simulate::run(EngineSettings::from_config(&config), correspondent).await
}

/// Check the dialogue script and print its transition table
fn run_script() -> Result<()> {
    let script = Script::josephine();
    let vocabulary = Vocabulary::josephine();
    script.validate(&vocabulary)?;

    println!("{}", style("Josephine dialogue script").bold().cyan());
    println!("{}\n", style("All reachable steps have content.").green());

    for (step, content) in script.steps() {
        let accepts = match vocabulary.tokens(step) {
            Some(tokens) => tokens.join(" / "),
            None => "any reply".to_string(),
        };
        println!("{} {}", style(step).bold(), style(format!("[{}]", accepts)).dim());

        match content {
            Content::Fixed(entry) => print_entry("", entry),
            Content::ByBranch { business, fun } => {
                print_entry("business: ", business);
                print_entry("fun: ", fun);
            }
            Content::ByReply(choices) => {
                for Choice { replies, entry } in choices {
                    print_entry(&format!("{}: ", replies.join(" / ")), entry);
                }
            }
        }
        println!();
    }

    Ok(())
}

fn print_entry(label: &str, entry: &ScriptEntry) {
    let outcome = match entry.outcome {
        Outcome::Advance(next) => format!("-> {}", next),
        Outcome::Defer => "defer, cooldown".to_string(),
        Outcome::Finish => "finish, reset and cooldown".to_string(),
    };
    let selects = entry
        .selects
        .map(|branch| format!(" (selects {})", branch))
        .unwrap_or_default();
    let first = entry.messages.first().copied().unwrap_or_default();

    println!("  {}{}{}", label, style(outcome).cyan(), selects);
    println!(
        "    {} ({} message{})",
        preview(first),
        entry.messages.len(),
        if entry.messages.len() == 1 { "" } else { "s" }
    );
}

async fn run_status(loader: &ConfigLoader) -> Result<()> {
    let config = loader.load()?;

    println!("{}", style("Josephine Status").bold().cyan());
    println!("Version: {}\n", env!("CARGO_PKG_VERSION"));

    println!("{}", style("Configuration:").bold());
    println!("  Config directory: {}", loader.config_dir().display());
    match config.operator.user_part() {
        Some(owner) => println!("  Operator: {}", owner),
        None => println!("  Operator: {}", style("not configured").red()),
    }
    println!("  Resume keyword: {}", config.operator.resume_keyword);
    println!("  Cooldown: {} minutes", config.dialogue.cooldown_secs / 60);
    println!(
        "  Invalid replies before restart: {}",
        config.dialogue.max_invalid_replies
    );
    println!("  Log directory: {}", config.logging.dir);
    println!();

    println!("{}", style("Channels:").bold());
    let status = if config.channels.whatsapp.enabled {
        style("enabled").green()
    } else {
        style("disabled").dim()
    };
    println!("  WhatsApp: {}", status);

    Ok(())
}

/// Show channel status
async fn run_channel_status(loader: &ConfigLoader) -> Result<()> {
    let config = loader.load()?;
    let whatsapp = &config.channels.whatsapp;

    println!("{}", style("Channel Status").bold().cyan());
    println!();

    if whatsapp.enabled {
        println!("  WhatsApp: {}", style("enabled").green());
    } else {
        println!("  WhatsApp: {}", style("disabled").dim());
    }
    println!("    Bridge: {}", whatsapp.bridge_url);
    println!(
        "    Auth directory: {}",
        expand_tilde(&whatsapp.auth_dir).display()
    );
    if whatsapp.allow_from.is_empty() {
        println!("    Allowed senders: everyone");
    } else {
        println!("    Allowed senders: {}", whatsapp.allow_from.join(", "));
    }

    Ok(())
}
