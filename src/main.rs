//! chipstep CLI: live playback and WAV export of a project file.
//!
//! Usage:
//!   chipstep render song.json -o song.wav
//!   chipstep play song.json --seconds 8

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{fs, thread};

use clap::{Parser, Subcommand};
use cs_formats::load_project_json;
use cs_master::{Engine, EngineConfig, ProjectSnapshot};
use tracing::info;

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(name = "chipstep")]
#[command(about = "8-bit step sequencer: live playback and WAV export")]
#[command(version)]
struct Cli {
    /// Engine config (JSON); unspecified fields keep their defaults
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render one pass of the loop region to a WAV file
    Render {
        /// Project snapshot (JSON)
        project: PathBuf,

        /// Output WAV file
        #[arg(short, long, default_value = "out.wav")]
        output: PathBuf,

        /// Render sample rate in Hz
        #[arg(long)]
        sample_rate: Option<u32>,

        /// Noise generator seed
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Play the project on the default audio device
    Play {
        /// Project snapshot (JSON)
        project: PathBuf,

        /// Stop after this many seconds
        #[arg(long, default_value_t = 8.0)]
        seconds: f64,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> CliResult<()> {
    let mut config = match &cli.config {
        Some(path) => EngineConfig::from_json(&fs::read_to_string(path)?)?,
        None => EngineConfig::default(),
    };

    match cli.command {
        Commands::Render { project, output, sample_rate, seed } => {
            if let Some(rate) = sample_rate {
                config.render_sample_rate = rate;
            }
            if let Some(seed) = seed {
                config.noise_seed = seed;
            }
            render(config, &project, &output)
        }
        Commands::Play { project, seconds } => play(config, &project, seconds),
    }
}

fn load(path: &Path) -> CliResult<ProjectSnapshot> {
    let text = fs::read_to_string(path).map_err(|e| format!("failed to read {}: {e}", path.display()))?;
    Ok(load_project_json(&text)?)
}

fn render(config: EngineConfig, project: &Path, output: &Path) -> CliResult<()> {
    let snapshot = load(project)?;
    let engine = Engine::new(config);
    println!(
        "Rendering beats {}..{} at {} BPM to {}",
        snapshot.loop_region.start(),
        snapshot.loop_region.end(),
        snapshot.clamped_tempo(),
        output.display()
    );

    let mut last = -1.0f32;
    let wav = engine.render_snapshot(&snapshot, &mut |p| {
        if p - last >= 0.1 || p >= 1.0 {
            print!("\r{:3.0}%", p * 100.0);
            let _ = std::io::stdout().flush();
            last = p;
        }
    })?;
    println!();

    fs::write(output, &wav).map_err(|e| format!("failed to write {}: {e}", output.display()))?;
    println!("Wrote {} bytes", wav.len());
    Ok(())
}

fn play(config: EngineConfig, project: &Path, seconds: f64) -> CliResult<()> {
    let snapshot = load(project)?;
    let tempo = snapshot.clamped_tempo();
    let start = snapshot.loop_region.start();
    let steps = snapshot.loop_region.len();

    let mut engine = Engine::new(config);
    engine.set_snapshot(snapshot);
    engine.initialize()?;
    engine.on_beat(move |beat| {
        print!("\rBeat: {:3} | Bar: {:2} | Step: {:2}", beat, beat / 16 + 1, beat % 16 + 1);
        let _ = std::io::stdout().flush();
    });

    info!(tempo, start, steps, "playing");
    engine.play(tempo, start)?;
    let seconds = if seconds.is_finite() { seconds.max(0.0) } else { 0.0 };
    thread::sleep(Duration::from_secs_f64(seconds));
    engine.stop()?;
    println!("\rDone.                                ");
    Ok(())
}
