//! Trainer Monitor
//!
//! Watches a game client's screen, reads the character's level and zen,
//! sends Discord notifications at milestones and keeps a scripted input
//! routine going. Diagnostic subcommands exercise each piece against
//! fixture screenshots.

mod diagnostics;
mod error;
mod monitor;
mod ocr;
mod paths;
mod platform;
mod vision;

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{error, info, warn};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, reload, Registry};

use crate::diagnostics::Diagnostics;
use crate::monitor::MonitorConfig;
use crate::ocr::{NumericKind, TesseractEngine};
use crate::platform::discord::DiscordWebhook;
use crate::vision::GameState;

#[derive(Parser, Debug)]
#[command(name = "trainer-monitor", version, about = "Game screen monitor with milestone notifications")]
struct Cli {
    /// Config file (default: config.json next to the executable)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Overrides the configured log level
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the monitoring loop (default)
    Run,
    /// Send a test notification
    Notify {
        #[arg(long)]
        with_image: bool,
        /// Image to attach instead of the configured fixture
        #[arg(long)]
        image: Option<PathBuf>,
    },
    /// OCR the level region of a fixture screenshot
    Level {
        #[arg(long)]
        image: Option<PathBuf>,
    },
    /// OCR the zen region of a fixture screenshot
    Zen {
        #[arg(long)]
        image: Option<PathBuf>,
    },
    /// Check one state's template against a fixture screenshot
    State {
        state: StateArg,
        #[arg(long)]
        image: Option<PathBuf>,
    },
    /// Classify a fixture screenshot
    Classify {
        #[arg(long)]
        image: Option<PathBuf>,
    },
    /// Search a screenshot for an arbitrary template
    Find {
        #[arg(long)]
        needle: PathBuf,
        #[arg(long)]
        screenshot: PathBuf,
        #[arg(long, default_value_t = 0.8)]
        threshold: f32,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum StateArg {
    Dialog,
    Ingame,
    Inventory,
    CharacterMenu,
}

impl From<StateArg> for GameState {
    fn from(arg: StateArg) -> Self {
        match arg {
            StateArg::Dialog => GameState::Dialog,
            StateArg::Ingame => GameState::InGame,
            StateArg::Inventory => GameState::Inventory,
            StateArg::CharacterMenu => GameState::CharacterMenu,
        }
    }
}

type LevelHandle = reload::Handle<LevelFilter, Registry>;

/// Stdout plus `logs/trainer_monitor.log`. The level can be changed once
/// the config is known.
fn init_logging(level: LevelFilter) -> LevelHandle {
    let (filter, handle) = reload::Layer::new(level);

    let file = match paths::ensure_directories().and_then(|_| {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(paths::get_log_file())
    }) {
        Ok(file) => Some(file),
        Err(e) => {
            eprintln!("Warning: could not open log file: {}", e);
            None
        }
    };
    let file_layer = file.map(|f| {
        fmt::layer()
            .with_ansi(false)
            .with_target(false)
            .with_writer(Mutex::new(f))
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .with(file_layer)
        .init();
    handle
}

fn parse_level(name: &str) -> Result<LevelFilter> {
    LevelFilter::from_str(name).map_err(|_| anyhow!("Unknown log level \"{}\"", name))
}

fn install_panic_hook() {
    std::panic::set_hook(Box::new(|panic_info| {
        let msg = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };
        let location = if let Some(loc) = panic_info.location() {
            format!(" at {}:{}:{}", loc.file(), loc.line(), loc.column())
        } else {
            String::new()
        };
        error!("[PANIC]{} {}", location, msg);
        eprintln!("[PANIC]{} {}", location, msg);
    }));
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match try_main(cli) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::from(1)
        }
    }
}

fn try_main(cli: Cli) -> Result<u8> {
    let initial = match &cli.log_level {
        Some(name) => parse_level(name)?,
        None => LevelFilter::INFO,
    };
    let level_handle = init_logging(initial);
    install_panic_hook();

    let config_path = cli.config.unwrap_or_else(paths::get_default_config_path);
    let config = MonitorConfig::load(&config_path)?;
    let level = parse_level(cli.log_level.as_deref().unwrap_or(&config.log_level))?;
    if let Err(e) = level_handle.modify(|filter| *filter = level) {
        warn!("Could not apply log level: {}", e);
    }
    config.validate()?;

    let diag = Diagnostics::new(&config, paths::get_debug_dir());
    let outcome = match cli.command.unwrap_or(Command::Run) {
        Command::Run => return run(&config).map(|_| 0),
        Command::Notify { with_image, image } => {
            let timeout = Duration::from_millis(config.notification.timeout_ms);
            let sink = DiscordWebhook::new(config.notification.webhook_url.clone(), timeout)?;
            diag.notify(&sink, with_image, image.as_deref())?
        }
        Command::Level { image } => diag.read_value(NumericKind::Level, &ocr_engine(&config)?, image.as_deref())?,
        Command::Zen { image } => diag.read_value(NumericKind::Zen, &ocr_engine(&config)?, image.as_deref())?,
        Command::State { state, image } => diag.state(state.into(), image.as_deref())?,
        Command::Classify { image } => diag.classify(image.as_deref())?,
        Command::Find {
            needle,
            screenshot,
            threshold,
        } => diag.find(&needle, &screenshot, threshold)?,
    };
    Ok(outcome.exit_code() as u8)
}

fn ocr_engine(config: &MonitorConfig) -> Result<TesseractEngine> {
    let tesseract = ocr::locate_tesseract(config.ocr.tesseract_path.as_deref())?;
    info!("Using Tesseract at {}", tesseract.executable.display());
    Ok(TesseractEngine::new(tesseract, Duration::from_millis(config.ocr.timeout_ms)))
}

#[cfg(windows)]
fn run(config: &MonitorConfig) -> Result<()> {
    use crate::error::NotifyError;
    use crate::monitor::{Collaborators, MonitorLoop, StopSignal};
    use crate::platform::discord::LogOnlySink;
    use crate::platform::windows::{
        spawn_stop_hotkey, GdiCapture, RodioPlayer, SendInputInjector, Win32Windows,
    };
    use crate::platform::{AudioPlayer, NotificationSink, SilentAudio};

    config.validate_assets()?;
    let classifier = config.load_classifier()?;
    let reward = config.load_reward_probe()?;
    let engine = ocr_engine(config)?;

    let timeout = Duration::from_millis(config.notification.timeout_ms);
    let notifier: Box<dyn NotificationSink> =
        match DiscordWebhook::new(config.notification.webhook_url.clone(), timeout) {
            Ok(webhook) => Box::new(webhook),
            Err(NotifyError::NotConfigured) => {
                warn!("No webhook configured; notifications are only logged");
                Box::new(LogOnlySink)
            }
            Err(e) => return Err(e.into()),
        };
    let audio: Box<dyn AudioPlayer> = match RodioPlayer::spawn() {
        Ok(player) => Box::new(player),
        Err(e) => {
            warn!("{}; sounds disabled", e);
            Box::new(SilentAudio)
        }
    };

    let stop = StopSignal::new();
    spawn_stop_hotkey(stop.clone())?;

    let io = Collaborators {
        windows: Box::new(Win32Windows),
        screen: Box::new(GdiCapture::new(Duration::from_millis(
            config.retry.capture_timeout_ms,
        ))),
        input: Box::new(SendInputInjector),
        ocr: Box::new(engine),
        audio,
        notifier,
    };
    MonitorLoop::new(config, classifier, reward, io, stop).run();
    Ok(())
}

#[cfg(not(windows))]
fn run(_config: &MonitorConfig) -> Result<()> {
    Err(anyhow!(
        "The run command needs Windows for input injection and screen capture; diagnostic modes work everywhere"
    ))
}
