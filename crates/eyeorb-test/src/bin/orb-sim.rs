//! Headless orb simulator.
//!
//! Mounts an orb on a simulated frame host, plays a phase script and logs
//! every tier decision. Filter directives come from `EYEORB_LOG`.
//!
//! # Examples
//!
//! ```sh
//! # Mid-range phone with a basic graphics API
//! orb-sim --fps 38 --jitter-us 2000 --basic-only
//!
//! # Custom thresholds and a longer script, JSON logs
//! orb-sim --settings orb.json --phases idle:500,thinking:3000,error:400 --log-format json
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use eyeorb_probe::EnvironmentSnapshot;
use eyeorb_runtime::{init_tracing, LogFormat, MountOptions, OrbSettings};
use eyeorb_test::{FrameTiming, PhaseScript, ScenarioReport, ScriptedEnvironment, ScriptedSensor, Simulation, MAX_EVENTS};

/// Headless orb simulator.
#[derive(Parser)]
#[command(name = "orb-sim")]
struct Cli {
    /// JSON settings document.
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Simulated frame rate.
    #[arg(long, default_value_t = 60.0)]
    fps: f64,

    /// Frame interval jitter in microseconds (either sign).
    #[arg(long, default_value_t = 0)]
    jitter_us: u32,

    /// Seed for the jitter generator.
    #[arg(long, default_value_t = 1)]
    seed: u64,

    /// Phases to play after the FPS probe, as `phase:millis` pairs.
    #[arg(long, default_value = "idle:500,thinking:1500,streaming:2000,error:300,idle:1000")]
    phases: PhaseScript,

    /// Only the basic graphics API is available.
    #[arg(long)]
    basic_only: bool,

    /// The user prefers reduced motion.
    #[arg(long)]
    reduced_motion: bool,

    /// Device memory hint in GB.
    #[arg(long)]
    memory_gb: Option<f32>,

    /// Log output format (`compact` or `json`).
    #[arg(long, default_value = "compact")]
    log_format: LogFormat,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(err) = init_tracing(cli.log_format) {
        eprintln!("orb-sim: {err}");
        return ExitCode::FAILURE;
    }

    let settings = match &cli.settings {
        Some(path) => match OrbSettings::from_json_file(path) {
            Ok(settings) => settings,
            Err(err) => {
                tracing::error!(error = %err, "invalid settings");
                return ExitCode::FAILURE;
            }
        },
        None => OrbSettings::default(),
    };

    let env = ScriptedEnvironment::new(EnvironmentSnapshot {
        graphics_supported: true,
        advanced: !cli.basic_only,
        reduced_motion: cli.reduced_motion,
        memory_gb: cli.memory_gb,
    });
    let options = MountOptions {
        settings,
        ..Default::default()
    };

    let timing = FrameTiming::jittery(cli.fps, cli.jitter_us);
    let mut sim = Simulation::mount(&env, timing, cli.seed, ScriptedSensor::open(), options);

    if !sim.finish_probe(MAX_EVENTS) {
        tracing::warn!("fps probe did not finish");
    }
    tracing::info!(tier = %sim.controller().tier(), surface = %sim.controller().surface(), "probe done");

    sim.play(&cli.phases);
    let settled = sim.run_until_idle(MAX_EVENTS);
    sim.controller_mut().unmount();

    let report = ScenarioReport::capture(&sim);
    for change in &report.history {
        tracing::info!(from = %change.from, to = %change.to, reason = %change.reason, "downgrade");
    }
    tracing::info!(
        tier = %report.tier,
        script = %cli.phases,
        rendered = report.run.rendered,
        probed = report.run.probed,
        stale = report.run.stale,
        timers = report.run.timers,
        peak_outstanding = report.host.peak_outstanding,
        live_contexts = report.live_contexts,
        settled,
        "simulation finished"
    );

    ExitCode::SUCCESS
}
