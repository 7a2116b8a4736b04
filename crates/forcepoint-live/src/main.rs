use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use anyhow::{bail, ensure, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use log::LevelFilter;
use nalgebra::Vector3;

use forcepoint_core::gate::{ForceGate, GateOutcome, GateSense};
use forcepoint_core::{PoaConfig, PoaEstimator, Wrench};
use forcepoint_live::{
    install_stop_handler, AppConfig, ConsoleSink, LiveLoop, RemoveOnDrop, RunOptions, RunSummary,
    SyntheticFeed, TailStart,
};

#[derive(Parser, Debug)]
#[command(
    name = "forcepoint",
    version,
    about = "Locate where a force is applied from 6-axis force/torque readings"
)]
struct Cli {
    /// Log with Debug log level (twice for Trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Follow a sensor log and show the contact marker
    Run(RunArgs),
    /// Estimate the contact point of a single wrench
    Solve(SolveArgs),
    /// Write a synthetic sensor log for a known contact point
    Simulate(SimulateArgs),
}

#[derive(Args, Debug)]
struct EstimatorArgs {
    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Display rotation, 3x3 .npy
    #[arg(long, requires = "translation")]
    rotation: Option<PathBuf>,

    /// Display translation, 3-element .npy
    #[arg(long, requires = "rotation")]
    translation: Option<PathBuf>,

    /// Contact requires F_z above or below the threshold
    #[arg(long)]
    gate_sense: Option<GateSense>,

    /// Force gate threshold [N] (default 1 for above, -1 for below)
    #[arg(long, allow_negative_numbers = true)]
    gate_threshold: Option<f64>,

    /// Gate on the display range only
    #[arg(long, conflicts_with_all = ["gate_sense", "gate_threshold"])]
    no_force_gate: bool,
}

impl EstimatorArgs {
    /// Config file (or defaults) with command-line overrides applied
    ///
    /// With `require_sense`, an enabled gate must end up with an explicit
    /// force direction: it depends on how the sensor is mounted.
    fn load(&self, require_sense: bool) -> Result<AppConfig> {
        let mut app = match &self.config {
            Some(path) => AppConfig::from_file(path)
                .with_context(|| format!("failed to load config {}", path.display()))?,
            None => AppConfig::default(),
        };

        if let (Some(rotation), Some(translation)) = (&self.rotation, &self.translation) {
            app.poa.calibration.rotation_npy = Some(rotation.clone());
            app.poa.calibration.translation_npy = Some(translation.clone());
        }

        self.apply_gate(&mut app.poa)?;
        if require_sense && app.poa.gate.enabled && app.poa.gate.force.is_none() {
            bail!(
                "force gate direction not set: pass --gate-sense above|below \
                 (or --no-force-gate), or set gate.force in the config file"
            );
        }
        Ok(app)
    }

    fn apply_gate(&self, config: &mut PoaConfig) -> Result<()> {
        if self.no_force_gate {
            config.gate.force = None;
            return Ok(());
        }

        match (self.gate_sense, self.gate_threshold) {
            (Some(sense), threshold) => {
                let threshold = threshold.unwrap_or(match sense {
                    GateSense::Above => 1.0,
                    GateSense::Below => -1.0,
                });
                config.gate.force = Some(ForceGate { sense, threshold });
            }
            (None, Some(threshold)) => match config.gate.force.as_mut() {
                Some(gate) => gate.threshold = threshold,
                None => bail!("--gate-threshold needs --gate-sense"),
            },
            (None, None) => {}
        }
        Ok(())
    }
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Sensor log to follow
    #[arg(long)]
    log: Option<PathBuf>,

    #[command(flatten)]
    estimator: EstimatorArgs,

    /// Tick interval [ms]
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Stop after this many seconds
    #[arg(long)]
    duration: Option<f64>,

    /// Ignore existing records, follow new ones only
    #[arg(long)]
    from_end: bool,

    /// Leave the sensor log in place on exit
    #[arg(long)]
    keep_log: bool,

    /// Open the 3D marker window
    #[arg(long)]
    viewer: bool,
}

#[derive(Args, Debug)]
struct SolveArgs {
    /// Force [N] and moment [N·m]
    #[arg(
        num_args = 6,
        required = true,
        allow_negative_numbers = true,
        value_names = ["FX", "FY", "FZ", "MX", "MY", "MZ"]
    )]
    wrench: Vec<f64>,

    #[command(flatten)]
    estimator: EstimatorArgs,
}

#[derive(Args, Debug)]
struct SimulateArgs {
    /// Output log
    #[arg(long)]
    out: PathBuf,

    /// Contact point x,y,z [m]
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true, required = true)]
    contact: Vec<f64>,

    /// Applied force fx,fy,fz [N]
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true, required = true)]
    force: Vec<f64>,

    /// Sensor origin x,y,z [m]
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true, default_value = "0,0,0.05")]
    origin: Vec<f64>,

    #[arg(long, default_value_t = 1000)]
    samples: usize,

    #[arg(long, default_value_t = 100.0)]
    rate_hz: f64,

    /// Force noise std dev [N]
    #[arg(long, default_value_t = 0.0)]
    force_noise: f64,

    /// Moment noise std dev [N·m]
    #[arg(long, default_value_t = 0.0)]
    moment_noise: f64,

    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Write everything at once instead of pacing at the rate
    #[arg(long)]
    instant: bool,
}

fn vec3(values: &[f64], name: &str) -> Result<Vector3<f64>> {
    ensure!(
        values.len() == 3,
        "--{name} takes three comma-separated values, got {}",
        values.len()
    );
    Ok(Vector3::new(values[0], values[1], values[2]))
}

fn run(args: RunArgs) -> Result<()> {
    let mut app = args.estimator.load(true)?;
    if let Some(log) = args.log {
        app.live.log_path = Some(log);
    }
    if let Some(ms) = args.interval_ms {
        app.live.interval_ms = ms;
    }
    if args.from_end {
        app.live.start = TailStart::End;
    }
    if args.keep_log {
        app.live.cleanup_on_exit = false;
    }

    let _cleanup = RemoveOnDrop::for_config(&app.live);

    let mut options = RunOptions::from_config(&app.live);
    if let Some(secs) = args.duration {
        let duration = Duration::try_from_secs_f64(secs)
            .context("--duration must be a non-negative number of seconds")?;
        options.duration = Some(duration);
    }

    let mut live = LiveLoop::from_config(&app).context("failed to set up the live loop")?;
    let stop = install_stop_handler()?;

    log::info!(
        "following {} every {:?} (Ctrl-C to stop)",
        live.tail().path().display(),
        options.interval
    );
    let summary = if args.viewer {
        run_viewer(&mut live, &options, &stop)?
    } else {
        live.run(&mut ConsoleSink::new(), &options, &stop)
    };

    if let Some(est) = live.last_estimate() {
        log::info!(
            "last estimate: display {:?}, {:?}",
            est.display.as_slice(),
            est.outcome
        );
    }
    if let Some(p) = live.smoothed_display() {
        log::info!("smoothed display point {:?}", p.as_slice());
    }
    log::debug!("{summary:?}");
    Ok(())
}

#[cfg(feature = "viewer")]
fn run_viewer(
    live: &mut LiveLoop,
    options: &RunOptions,
    stop: &AtomicBool,
) -> Result<RunSummary> {
    let mut sink = forcepoint_live::ViewerSink::new("forcepoint");
    Ok(live.run(&mut sink, options, stop))
}

#[cfg(not(feature = "viewer"))]
fn run_viewer(_: &mut LiveLoop, _: &RunOptions, _: &AtomicBool) -> Result<RunSummary> {
    bail!("built without the marker window; rebuild with `--features viewer`")
}

fn solve(args: SolveArgs) -> Result<()> {
    let app = args.estimator.load(false)?;
    let estimator = PoaEstimator::from_config(&app.poa).context("failed to set up the estimator")?;

    let w = &args.wrench;
    let wrench = Wrench::new(Vector3::new(w[0], w[1], w[2]), Vector3::new(w[3], w[4], w[5]));
    let est = estimator.estimate(&wrench)?;

    println!("r        = {:?}", est.local.as_slice());
    println!("display  = {:?}", est.display.as_slice());
    match est.outcome {
        GateOutcome::Contact(m) => println!("marker   = ({:.1}, {:.1})", m.x, m.y),
        GateOutcome::NoContact(reason) => {
            println!("marker   = (0.0, 0.0)  no contact: {reason:?}")
        }
    }
    println!(
        "residual = {:.3e} N·m  ({} iterations, {})",
        est.solution.residual,
        est.solution.iterations,
        if est.solution.converged { "converged" } else { "not converged" }
    );
    Ok(())
}

fn simulate(args: SimulateArgs) -> Result<()> {
    let contact = vec3(&args.contact, "contact")?;
    let force = vec3(&args.force, "force")?;
    let origin = vec3(&args.origin, "origin")?;
    ensure!(args.rate_hz > 0.0, "--rate-hz must be positive");

    let mut feed = SyntheticFeed::new(
        contact,
        origin,
        force,
        args.force_noise,
        args.moment_noise,
        args.seed,
    )?;
    log::info!(
        "clean wrench for contact {:?} m: {}",
        contact.as_slice(),
        feed.clean()
    );

    if args.instant {
        let file = File::create(&args.out)
            .with_context(|| format!("failed to create {}", args.out.display()))?;
        feed.write_records(&mut BufWriter::new(file), args.samples, args.rate_hz)
            .with_context(|| format!("failed to write {}", args.out.display()))?;
        log::info!("wrote {} records to {}", args.samples, args.out.display());
    } else {
        let stop = install_stop_handler()?;
        let written = feed.stream_to(&args.out, args.samples, args.rate_hz, &stop)?;
        log::info!("streamed {written} records to {}", args.out.display());
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    env_logger::builder()
        .filter(
            None,
            match cli.verbose {
                0 => LevelFilter::Info,
                1 => LevelFilter::Debug,
                _ => LevelFilter::Trace,
            },
        )
        .parse_default_env()
        .init();

    match cli.command {
        Command::Run(args) => run(args),
        Command::Solve(args) => solve(args),
        Command::Simulate(args) => simulate(args),
    }
}
