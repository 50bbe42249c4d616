use anyhow::Result;
use clap::{CommandFactory, Parser};
use owo_colors::OwoColorize;
use std::path::Path;
use std::sync::Arc;
use vocmd::app::{Overrides, build_registry, run_listen_command};
use vocmd::audio::capture::list_devices;
use vocmd::cli::{Cli, Commands, ConfigAction};
use vocmd::config::Config;
use vocmd::dispatch::executor::SystemCommandExecutor;
use vocmd::intent::vocabulary::VOCABULARY;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        None => {
            let mut config = load_config(cli.config.as_deref())?;
            Overrides {
                device: cli.device,
                workspace: cli.workspace,
                stt_timeout: cli.stt_timeout,
                intent_timeout: cli.intent_timeout,
                confidence: cli.confidence,
            }
            .apply(&mut config);

            let code = run_listen_command(config, cli.quiet, cli.verbose, cli.once).await?;
            if code != 0 {
                std::process::exit(code);
            }
        }
        Some(Commands::Devices) => {
            list_audio_devices()?;
        }
        Some(Commands::Intents) => {
            list_intents(cli.config.as_deref())?;
        }
        Some(Commands::Config { action }) => {
            handle_config_command(action, cli.config.as_deref())?;
        }
        Some(Commands::Completions { shell }) => {
            clap_complete::generate(shell, &mut Cli::command(), "vocmd", &mut std::io::stdout());
        }
    }

    Ok(())
}

/// Loads config from the given path or the default location, then applies
/// environment overrides.
fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = match path {
        Some(path) => Config::load(path)?,
        None => Config::load_or_default(&Config::default_path()?)?,
    };
    Ok(config.with_env_overrides())
}

fn list_audio_devices() -> Result<()> {
    let devices = list_devices()?;
    if devices.is_empty() {
        println!("No audio input devices found.");
        return Ok(());
    }

    println!("Audio input devices:");
    for device in devices {
        let rates = device
            .sample_rates
            .iter()
            .map(|r| r.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        if device.recommended {
            println!(
                "  [{}] {} ({} Hz) {}",
                device.index,
                device.name,
                rates,
                "(recommended)".green()
            );
        } else {
            println!("  [{}] {} ({} Hz)", device.index, device.name, rates);
        }
    }
    Ok(())
}

/// Prints the closed intent vocabulary with trigger phrases and whether a
/// handler is registered for each entry.
fn list_intents(config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    let workspace = std::env::current_dir()?;
    let registry = build_registry(&config, &workspace, Arc::new(SystemCommandExecutor::new()));

    println!("Intent vocabulary:");
    for spec in VOCABULARY {
        let marker = if registry.is_registered(spec.intent) {
            "registered".green().to_string()
        } else {
            "unregistered".red().to_string()
        };
        println!("  {} [{}]", spec.label.bold(), marker);
        println!("    phrases: {}", spec.phrases.join(", "));
        if !spec.params.is_empty() {
            println!("    params:  {}", spec.params.join(", "));
        }
    }
    Ok(())
}

fn handle_config_command(action: ConfigAction, config_path: Option<&Path>) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = load_config(config_path)?;
            print!("{}", toml::to_string_pretty(&config)?);
        }
        ConfigAction::Path => {
            let path = match config_path {
                Some(path) => path.to_path_buf(),
                None => Config::default_path()?,
            };
            println!("{}", path.display());
        }
    }
    Ok(())
}
