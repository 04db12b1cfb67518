//! Pocketview entrypoint.
use anyhow::{Context, Result};
use clap::Parser;
use core_config::{Config, load_from};
use core_content::{
    AssetProvider, ContentProvider, MemoryAssets, MemoryContent, ROOT_ID, RawAssetDir, TomlContent,
};
use core_input::{CrosstermKeyQueue, InputLayer, KeyQueue, NullKeyQueue};
use core_nav::Navigator;
use core_render::RenderContext;
use core_views::{Library, ListScreen};
use embedded_graphics::geometry::Size;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;
use std::sync::Once;
use std::sync::atomic::AtomicBool;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;

mod display;
mod driver;

use display::{Display, FramebufferDisplay, HeadlessDisplay};
use driver::FrameDriver;

/// CLI arguments.
#[derive(Parser, Debug)]
#[command(name = "pocketview", version, about = "Button-driven dataset browser")]
struct Args {
    /// Configuration file path (overrides discovery of `pocketview.toml`).
    #[arg(long = "config")]
    config: Option<PathBuf>,
    /// Dataset TOML file (overrides `[content] dataset`).
    #[arg(long = "dataset")]
    dataset: Option<PathBuf>,
    /// Stop after this many ticks.
    #[arg(long = "ticks")]
    ticks: Option<u64>,
    /// Never open the framebuffer.
    #[arg(long = "headless")]
    headless: bool,
}

fn configure_logging() -> Option<WorkerGuard> {
    let log_dir = Path::new(".");
    let log_path = log_dir.join("pocketview.log");
    if log_path.exists() {
        let _ = std::fs::remove_file(&log_path);
    }

    let file_appender = tracing_appender::rolling::never(log_dir, "pocketview.log");
    let (nb_writer, guard) = tracing_appender::non_blocking(file_appender);
    match tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(nb_writer)
        .with_ansi(false)
        .try_init()
    {
        Ok(_) => Some(guard),
        // Global subscriber already installed; dropping the guard shuts the writer down.
        Err(_) => None,
    }
}

fn install_panic_hook() {
    static HOOK: Once = Once::new();
    HOOK.call_once(|| {
        let default_panic = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            tracing::error!(target: "runtime.panic", ?info, "panic");
            default_panic(info);
        }));
    });
}

fn load_content(args: &Args, config: &Config) -> Result<Rc<dyn ContentProvider>> {
    let path = args.dataset.clone().or_else(|| config.file.content.dataset.clone());
    let Some(path) = path else {
        info!(target: "runtime.startup", "dataset_builtin_sample");
        return Ok(Rc::new(MemoryContent::sample()));
    };
    let content = TomlContent::load(&path)
        .with_context(|| format!("loading dataset {}", path.display()))?;
    Ok(Rc::new(content.into_memory()))
}

fn load_assets(config: &Config) -> Rc<dyn AssetProvider> {
    let Some(root) = config.file.content.assets.as_deref() else {
        return Rc::new(MemoryAssets::new());
    };
    match RawAssetDir::open(root) {
        Ok(dir) => Rc::new(dir),
        Err(e) => {
            warn!(target: "runtime.startup", root = %root.display(), error = %e, "assets_unavailable");
            Rc::new(MemoryAssets::new())
        }
    }
}

fn open_display(args: &Args, config: &Config, size: Size) -> Box<dyn Display> {
    let device = config.file.display.framebuffer.as_deref().filter(|_| !args.headless);
    let Some(device) = device else {
        return Box::new(HeadlessDisplay::new(size));
    };
    match FramebufferDisplay::open(device, size) {
        Ok(fb) => Box::new(fb),
        Err(e) => {
            warn!(target: "runtime.startup", error = %format!("{e:#}"), "framebuffer_unavailable_running_headless");
            Box::new(HeadlessDisplay::new(size))
        }
    }
}

fn open_keys(args: &Args, shutdown: &Arc<AtomicBool>) -> Box<dyn KeyQueue> {
    if args.headless && args.ticks.is_some() {
        return Box::new(NullKeyQueue);
    }
    match CrosstermKeyQueue::open(Arc::clone(shutdown)) {
        Ok(queue) => Box::new(queue),
        Err(e) => {
            warn!(target: "runtime.startup", error = %e, "keyboard_unavailable");
            Box::new(NullKeyQueue)
        }
    }
}

fn run(args: Args) -> Result<()> {
    let config = load_from(args.config.clone())?;
    let display_cfg = &config.file.display;
    let size = Size::new(display_cfg.width.max(1), display_cfg.height.max(1));

    let lib = Library::new(load_content(&args, &config)?, load_assets(&config), size);
    let root = ListScreen::new(lib, ROOT_ID).context("building the root screen")?;
    let nav = Navigator::new(Box::new(root), size, config.file.navigation.pop_last.into());
    let ctx = RenderContext::from_config(&config.file.cache);

    let shutdown = Arc::new(AtomicBool::new(false));
    let mut input = InputLayer::from_config(&config.file.input, open_keys(&args, &shutdown));
    let display = open_display(&args, &config, size);

    info!(
        target: "runtime.startup",
        width = size.width,
        height = size.height,
        tick_hz = config.file.frame.tick_hz,
        source = %input.active(),
        config_file = config.raw.is_some(),
        "bootstrap_complete"
    );

    let mut driver = FrameDriver::new(nav, ctx, display, config.tick_interval())
        .with_shutdown(shutdown)
        .with_budget(args.ticks);
    let reason = driver.run(&mut input)?;
    driver.log_summary(reason);
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    let _log_guard = configure_logging();
    install_panic_hook();
    info!(target: "runtime", "startup");

    let result = run(args);
    if let Err(e) = &result {
        tracing::error!(target: "runtime", error = %format!("{e:#}"), "fatal");
    }
    result
}
