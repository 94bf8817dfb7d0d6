//! hidbridge CLI
//!
//! Configuration checking and device discovery for the hidbridge daemon.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use evdev::{Device, EventType, Key, RelativeAxisType};
use hidbridge_config::Config;
use miette::IntoDiagnostic;

#[derive(Parser, Debug)]
#[command(name = "hidbridge")]
#[command(about = "Inspect hidbridge configuration and input devices")]
#[command(version)]
struct Cli {
    /// Path to configuration file [default: /etc/hidbridge/config.kdl]
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Validate the configuration file and print the resulting tables
    Validate,

    /// List input devices the daemon would grab
    Devices,
}

fn main() -> miette::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    // Expand tilde in config path
    let config_path: Option<PathBuf> = cli
        .config
        .map(|path| shellexpand::tilde(&path).into_owned().into());

    match cli.command {
        Commands::Validate => cmd_validate(config_path.as_deref()),
        Commands::Devices => cmd_devices(config_path.as_deref()),
    }
}

fn cmd_validate(config_path: Option<&Path>) -> miette::Result<()> {
    let shown = config_path.unwrap_or(Path::new(hidbridge_config::DEFAULT_CONFIG_PATH));
    println!("Validating configuration: {}", shown.display());

    let config = hidbridge_config::load_config(config_path)?;

    println!("Configuration is valid!");
    println!("  Keyboard gadget: {}", config.gadget.keyboard.display());
    println!("  Mouse gadget:    {}", config.gadget.mouse.display());
    println!("  Input directory: {}", config.input.watch_dir.display());

    println!("  Remaps: {}", config.remap.len());
    for (from, to) in sorted(&config.remap) {
        println!("    {} -> {}", from, to);
    }

    println!(
        "  Chord layer ({} held): {}",
        config.chord.trigger,
        config.chord.keys.len()
    );
    for (from, to) in sorted(&config.chord.keys) {
        println!("    {} -> {}", from, to);
    }

    Ok(())
}

fn sorted(table: &std::collections::HashMap<String, String>) -> Vec<(&String, &String)> {
    let mut entries: Vec<_> = table.iter().collect();
    entries.sort();
    entries
}

/// Rough device class, used for display only
fn classify(device: &Device) -> &'static str {
    let events = device.supported_events();

    let is_keyboard = events.contains(EventType::KEY)
        && device
            .supported_keys()
            .map(|keys| keys.contains(Key::KEY_A))
            .unwrap_or(false);
    if is_keyboard {
        return "keyboard";
    }

    let is_mouse = events.contains(EventType::RELATIVE)
        && device
            .supported_relative_axes()
            .map(|axes| axes.contains(RelativeAxisType::REL_X))
            .unwrap_or(false);
    if is_mouse {
        return "mouse";
    }

    "other"
}

fn cmd_devices(config_path: Option<&Path>) -> miette::Result<()> {
    let config = match config_path {
        Some(_) => hidbridge_config::load_config(config_path)?,
        None => hidbridge_config::load_config(None).unwrap_or_else(|e| {
            tracing::warn!("Ignoring configuration: {}", e);
            Config::default()
        }),
    };
    let dir = &config.input.watch_dir;

    println!("Input devices in {}:\n", dir.display());

    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir).into_diagnostic()? {
        let path = entry.into_diagnostic()?.path();

        if path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.starts_with("event"))
            .unwrap_or(false)
        {
            paths.push(path);
        }
    }
    paths.sort();

    for path in paths {
        match Device::open(&path) {
            Ok(device) => {
                let name = device.name().unwrap_or("Unknown");
                let id = device.input_id();
                let vendor_product = format!("{:04x}:{:04x}", id.vendor(), id.product());

                println!("  {} [{}]", name, classify(&device));
                println!("    Path: {}", path.display());
                println!("    ID: {}", vendor_product);
                println!();
            }
            Err(e) => {
                tracing::debug!("Skipping {}: {}", path.display(), e);
            }
        }
    }

    Ok(())
}
