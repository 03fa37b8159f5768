use std::{path::PathBuf, thread, time::Duration};

use ambient_painter_core::{
    config::{presets, DEFAULT_PRESET_ID},
    random, AmbientEngine, AnalysisDriver, Clock, Scheduler, Settings, SettingsProvider,
    SharedSettings, SnapshotHandle, SystemClock, Transport,
};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod sink;
mod source;

use sink::LogBackend;
use source::SyntheticCamera;

/// Virtual-time step for offline runs.
const STEP_SECONDS: f64 = 0.01;

fn main() -> ambient_painter_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Perform(args) => run_perform(&args),
        Commands::Presets => {
            for preset in presets() {
                println!("{:<18} {:<28} {}", preset.id, preset.name, preset.description);
            }
            Ok(())
        }
        Commands::Config { settings } => {
            println!("{}", settings.load()?.to_json_pretty()?);
            Ok(())
        }
    }
}

fn run_perform(args: &PerformArgs) -> ambient_painter_core::Result<()> {
    let settings = args.settings.load()?;
    tracing::info!(
        preset = %settings.preset_id,
        mode = ?settings.harmony.mode,
        seconds = args.seconds,
        realtime = args.realtime,
        "starting performance"
    );

    let shared = SharedSettings::new(settings);
    let snapshots = SnapshotHandle::new();
    let fps = f64::from(shared.current().analysis.rate());
    let camera = SyntheticCamera::new(args.width, args.height, fps);
    let mut driver = AnalysisDriver::new(camera, shared.clone(), snapshots.clone());
    let mut analysis = Transport::new();
    analysis.schedule_at(0.0, AnalysisDriver::<SyntheticCamera>::task());

    let rng = match args.seed {
        Some(seed) => random::seeded(seed),
        None => random::from_entropy(),
    };
    let mut engine = AmbientEngine::new(LogBackend::new(args.json), shared, snapshots, rng);
    engine.start()?;

    if args.realtime {
        let clock = SystemClock::start();
        while clock.now() < args.seconds {
            let now = clock.now();
            analysis.advance_to(&mut driver, now);
            engine.advance_to(now);
            thread::sleep(Duration::from_millis(10));
        }
    } else {
        let mut now = 0.0;
        while now < args.seconds {
            now = (now + STEP_SECONDS).min(args.seconds);
            analysis.advance_to(&mut driver, now);
            engine.advance_to(now);
        }
    }
    engine.stop();

    let backend = engine.backend();
    tracing::info!(
        chords = backend.chords,
        particle_notes = backend.particle_notes,
        air_notes = backend.air_notes,
        "performance finished"
    );
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Generative ambient music from video", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the generator against a synthetic camera and log every event.
    Perform(PerformArgs),
    /// List the built-in presets.
    Presets,
    /// Print the effective settings as JSON.
    Config {
        #[command(flatten)]
        settings: SettingsArgs,
    },
}

#[derive(Args, Debug)]
struct SettingsArgs {
    /// Built-in preset to start from.
    #[arg(short, long, default_value = DEFAULT_PRESET_ID)]
    preset: String,
    /// JSON settings file; replaces the preset when given.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

impl SettingsArgs {
    fn load(&self) -> ambient_painter_core::Result<Settings> {
        match &self.config {
            Some(path) => Settings::load(path),
            None => Settings::from_preset(&self.preset),
        }
    }
}

#[derive(Args, Debug)]
struct PerformArgs {
    #[command(flatten)]
    settings: SettingsArgs,
    /// Length of the performance in seconds.
    #[arg(short, long, default_value_t = 30.0)]
    seconds: f64,
    /// Seed for reproducible output.
    #[arg(long)]
    seed: Option<u64>,
    /// Follow the wall clock instead of rendering as fast as possible.
    #[arg(long)]
    realtime: bool,
    /// Write every backend call to stdout as a JSON line.
    #[arg(long)]
    json: bool,
    #[arg(long, default_value_t = 160)]
    width: usize,
    #[arg(long, default_value_t = 120)]
    height: usize,
}
