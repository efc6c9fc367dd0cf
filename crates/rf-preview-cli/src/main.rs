//! Reel-grid preview driver
//!
//! Usage:
//!   rf-preview run [--config grid.json] [--spins 3] [--png out.png]
//!   rf-preview layout --reels 5 --rows 3 --width 1280 --height 720
//!   rf-preview template > grid.json

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};

use rf_preview::{
    AnimationPhase, AnimationTiming, ContainerSize, DeviceLayoutProfile, DeviceProfile,
    EngineConfig, FileTextureSource, GridConfiguration, PreviewEngine, PreviewEvent,
    SymbolCategory, SymbolDescriptor, TimingProfile, Viewport, render,
};

#[derive(Parser)]
#[command(name = "rf-preview", about = "Headless reel-grid preview")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the engine at a fixed frame rate and print its events
    Run {
        /// Engine configuration (JSON); a 5x3 demo grid if omitted
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Override the number of reels
        #[arg(long)]
        reels: Option<u8>,
        /// Override the number of rows
        #[arg(long)]
        rows: Option<u8>,
        /// Directory symbol image refs are resolved against
        #[arg(short, long)]
        assets: Option<PathBuf>,
        /// Spins to play
        #[arg(short, long, default_value_t = 1)]
        spins: u32,
        /// Issue spins this far apart instead of waiting for each to finish
        #[arg(long)]
        spin_gap_ms: Option<f64>,
        /// Timing profile
        #[arg(short, long, value_enum)]
        timing: Option<TimingArg>,
        /// Frames per second
        #[arg(long, default_value_t = 60)]
        fps: u32,
        /// Give up after this much simulated time
        #[arg(long, default_value_t = 30_000.0)]
        max_ms: f64,
        /// Write the last frame as PNG
        #[arg(long)]
        png: Option<PathBuf>,
        /// Prefer the GPU backend (needs the `gpu` feature)
        #[arg(long)]
        gpu: bool,
    },
    /// Print the layout computed for a grid and container
    Layout {
        #[arg(long, default_value_t = 5)]
        reels: u8,
        #[arg(long, default_value_t = 3)]
        rows: u8,
        #[arg(long, default_value_t = 1280.0)]
        width: f32,
        #[arg(long, default_value_t = 720.0)]
        height: f32,
        #[arg(short, long, value_enum, default_value = "desktop")]
        profile: ProfileArg,
    },
    /// Print a demo configuration as JSON
    Template,
}

#[derive(Clone, Copy, ValueEnum)]
enum TimingArg {
    Normal,
    Turbo,
    Mobile,
    Studio,
    Instant,
}

impl From<TimingArg> for TimingProfile {
    fn from(arg: TimingArg) -> Self {
        match arg {
            TimingArg::Normal => TimingProfile::Normal,
            TimingArg::Turbo => TimingProfile::Turbo,
            TimingArg::Mobile => TimingProfile::Mobile,
            TimingArg::Studio => TimingProfile::Studio,
            TimingArg::Instant => TimingProfile::Instant,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum ProfileArg {
    Desktop,
    MobileLandscape,
    MobilePortrait,
}

impl From<ProfileArg> for DeviceProfile {
    fn from(arg: ProfileArg) -> Self {
        match arg {
            ProfileArg::Desktop => DeviceProfile::Desktop,
            ProfileArg::MobileLandscape => DeviceProfile::MobileLandscape,
            ProfileArg::MobilePortrait => DeviceProfile::MobilePortrait,
        }
    }
}

/// Options of the `run` command
struct RunOptions {
    config: Option<PathBuf>,
    reels: Option<u8>,
    rows: Option<u8>,
    assets: Option<PathBuf>,
    spins: u32,
    spin_gap_ms: Option<f64>,
    timing: Option<TimingArg>,
    fps: u32,
    max_ms: f64,
    png: Option<PathBuf>,
    gpu: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            reels,
            rows,
            assets,
            spins,
            spin_gap_ms,
            timing,
            fps,
            max_ms,
            png,
            gpu,
        } => run(RunOptions {
            config,
            reels,
            rows,
            assets,
            spins,
            spin_gap_ms,
            timing,
            fps,
            max_ms,
            png,
            gpu,
        }),
        Commands::Layout {
            reels,
            rows,
            width,
            height,
            profile,
        } => print_layout(reels, rows, width, height, profile.into()),
        Commands::Template => {
            println!("{}", demo_config().to_json()?);
            Ok(())
        }
    }
}

fn demo_symbols() -> Vec<SymbolDescriptor> {
    [
        ("wild", SymbolCategory::Wild),
        ("scatter", SymbolCategory::Scatter),
        ("hp1", SymbolCategory::High),
        ("hp2", SymbolCategory::High),
        ("mp1", SymbolCategory::Medium),
        ("mp2", SymbolCategory::Medium),
        ("lp1", SymbolCategory::Low),
        ("lp2", SymbolCategory::Low),
        ("lp3", SymbolCategory::Low),
    ]
    .into_iter()
    .map(|(id, category)| SymbolDescriptor::new(id, None, category))
    .collect()
}

fn demo_config() -> EngineConfig {
    EngineConfig::new(GridConfiguration::standard_5x3(), demo_symbols())
        .with_viewport(Viewport::new(1280.0, 720.0, 1.0))
}

fn load_config(options: &RunOptions) -> Result<EngineConfig> {
    let mut config = match &options.config {
        Some(path) => EngineConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => demo_config(),
    };
    if options.reels.is_some() || options.rows.is_some() {
        config.grid = config.grid.with_shape(
            options.reels.unwrap_or(config.grid.reels),
            options.rows.unwrap_or(config.grid.rows),
        );
    }
    if let Some(timing) = options.timing {
        config.timing = AnimationTiming::from_profile(timing.into());
    }
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn run(options: RunOptions) -> Result<()> {
    if options.fps == 0 {
        bail!("--fps must be at least 1");
    }
    let config = load_config(&options)?;

    let source = match &options.assets {
        Some(root) => FileTextureSource::with_root(root),
        None => FileTextureSource::new(),
    };
    let factories = if options.gpu {
        render::default_factories()
    } else {
        vec![Box::new(render::SoftwareFactory) as Box<dyn render::BackendFactory>]
    };
    let mut engine = PreviewEngine::new(config, factories, Arc::new(source))
        .context("Failed to start preview engine")?;

    if let Some(surface) = engine.surface() {
        println!(
            "{:?} surface {}x{} @ {}x",
            surface.kind, surface.width, surface.height, surface.device_pixel_ratio
        );
    }

    let frame_ms = 1000.0 / f64::from(options.fps);
    let mut now = 0.0;
    let mut issued = 0u32;
    let mut completed = 0u32;
    let mut next_spin_at = 0.0;

    while now <= options.max_ms {
        if issued < options.spins && now >= next_spin_at {
            let ready = options.spin_gap_ms.is_some() || engine.animation_state().phase == AnimationPhase::Idle;
            if ready {
                engine.spin();
                issued += 1;
                next_spin_at = now + options.spin_gap_ms.unwrap_or(0.0);
            }
        }

        engine.frame(now);
        for event in engine.drain_events() {
            print_event(now, &event);
            if matches!(event, PreviewEvent::SpinCompleted { .. }) {
                completed += 1;
            }
        }

        let state = engine.animation_state();
        let idle = state.phase == AnimationPhase::Idle && !state.queued_spin;
        if issued == options.spins && completed >= issued && idle && engine.is_grid_settled() {
            break;
        }
        now += frame_ms;
    }

    if completed < issued {
        log::warn!("{} of {} spins finished within {}ms", completed, issued, options.max_ms);
    }

    let stats = engine.pool_stats();
    println!(
        "{} sprites in use, {} allocated, {} acquisitions, {} rebinds, {} texture failures",
        engine.sprite_count(),
        engine.allocated_sprites(),
        stats.acquisitions,
        stats.rebinds,
        stats.texture_failures
    );

    if let Some(path) = &options.png {
        engine.wait_for_textures(Duration::from_secs(5));
        engine.frame(now);
        write_png(&mut engine, path)?;
        println!("Wrote {}", path.display());
    }

    engine.shutdown();
    Ok(())
}

fn print_event(now: f64, event: &PreviewEvent) {
    let detail = match event {
        PreviewEvent::GridUpdated { reels, rows } => format!("{}x{}", reels, rows),
        PreviewEvent::SpinStarted { spin_id } | PreviewEvent::SpinCompleted { spin_id } => {
            format!("#{}", spin_id)
        }
        PreviewEvent::ReelStopped { index } => format!("reel {}", index),
        PreviewEvent::WinDetected { positions } => positions
            .iter()
            .map(|p| format!("({},{})", p.col, p.row))
            .collect::<Vec<_>>()
            .join(" "),
        PreviewEvent::RenderUnavailable { reason } => reason.clone(),
    };
    println!("{:>9.1}ms  {:<18} {}", now, event.name(), detail);
}

fn write_png(engine: &mut PreviewEngine, path: &Path) -> Result<()> {
    let surface = engine
        .surface()
        .context("Rendering is unavailable, no frame to write")?;
    let pixels = engine.read_pixels().context("Failed to read back the frame")?;
    let image = image::RgbaImage::from_raw(surface.width, surface.height, pixels)
        .context("Frame size does not match the surface")?;
    image
        .save(path)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

fn print_layout(reels: u8, rows: u8, width: f32, height: f32, profile: DeviceProfile) -> Result<()> {
    let grid = GridConfiguration::new(reels, rows).with_device_profile(profile);
    grid.validate().context("Invalid grid")?;
    let container = ContainerSize::new(width, height);
    if !container.is_valid() {
        bail!("Container {}x{} outside (0, 10000]", width, height);
    }
    let layout = rf_preview::layout::compute_layout(
        &grid,
        container,
        &DeviceLayoutProfile::for_profile(profile),
    );
    println!("{}", serde_json::to_string_pretty(&layout)?);
    Ok(())
}
