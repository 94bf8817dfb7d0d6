//! hidbridge daemon
//!
//! Grabs local input devices and re-emits their events as USB HID gadget
//! reports, with key remapping applied on the way.

mod device;
mod device_manager;
mod error;
mod event_loop;
mod hid;
mod hotplug;
mod keymap;
mod remapper;
mod translate;

#[cfg(test)]
mod testing;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use nix::sys::signal::{SigSet, Signal};
use nix::sys::signalfd::{SfdFlags, SignalFd};
use tracing_subscriber::EnvFilter;

use crate::device::{enumerate_devices, EvdevOpener};
use crate::device_manager::DeviceManager;
use crate::event_loop::Dispatcher;
use crate::hid::{GadgetSink, Keyboard, Mouse};
use crate::hotplug::HotplugWatch;
use crate::keymap::KeyTables;
use crate::remapper::Remapper;
use crate::translate::Translator;

#[derive(Parser, Debug)]
#[command(name = "hidbridged")]
#[command(about = "Forward local input devices to a USB HID gadget")]
#[command(version)]
struct Args {
    /// Path to configuration file [default: /etc/hidbridge/config.kdl]
    #[arg(short, long)]
    config: Option<String>,
}

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    // Expand tilde in config path
    let config_path: Option<PathBuf> = args
        .config
        .map(|path| shellexpand::tilde(&path).into_owned().into());

    let config = hidbridge_config::load_config(config_path.as_deref())
        .context("failed to load configuration")?;

    // Block the shutdown signals before anything is grabbed so they are
    // queued on the signalfd instead of killing the process mid-setup
    let mut mask = SigSet::empty();
    mask.add(Signal::SIGINT);
    mask.add(Signal::SIGTERM);
    mask.thread_block().context("failed to block signals")?;
    let mut signals = SignalFd::with_flags(&mask, SfdFlags::SFD_NONBLOCK | SfdFlags::SFD_CLOEXEC)
        .context("failed to create signalfd")?;

    let remapper = Remapper::from_config(&config).context("invalid remap tables")?;

    let keyboard = GadgetSink::open(&config.gadget.keyboard).with_context(|| {
        format!(
            "failed to open keyboard gadget {}",
            config.gadget.keyboard.display()
        )
    })?;
    let mouse = GadgetSink::open(&config.gadget.mouse)
        .with_context(|| format!("failed to open mouse gadget {}", config.gadget.mouse.display()))?;
    tracing::info!(
        "Writing reports to {} and {}",
        keyboard.path().display(),
        mouse.path().display()
    );

    // Watch first so nodes created during enumeration are not missed
    let watch_dir = &config.input.watch_dir;
    let watch = HotplugWatch::new(watch_dir)
        .with_context(|| format!("failed to watch {}", watch_dir.display()))?;
    let paths = enumerate_devices(watch_dir)
        .with_context(|| format!("failed to enumerate {}", watch_dir.display()))?;

    let mut devices = DeviceManager::new(EvdevOpener);
    devices
        .grab_all(&paths)
        .context("could not take exclusive control of all input devices")?;

    let translator = Translator::new(
        KeyTables::boot_keyboard(),
        remapper,
        Keyboard::new(keyboard),
        Mouse::new(mouse),
    );
    let mut dispatcher = Dispatcher::new(devices, translator);

    dispatcher
        .reset_reports()
        .context("failed to write initial reports")?;

    let result = event_loop::run(&mut dispatcher, &watch, &mut signals);
    dispatcher.shutdown();

    tracing::info!("hidbridge daemon stopped");
    result
}
