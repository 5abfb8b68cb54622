//! # BMM Optics CLI
//!
//! Evaluates the optics transforms from the command line against a
//! simulated actuator bus.
//!
//! # Usage
//!
//! ```bash
//! # Declared limits of every instance
//! bmm_optics limits
//!
//! # Jack positions for a mirror pose
//! bmm_optics mirror m2 forward --vertical 1.5 --pitch 3.0
//!
//! # Logical pose from jack readbacks
//! bmm_optics mirror m3 inverse --yu -1.2 --ydo 0.4 --ydi 0.4
//!
//! # Monochromator at the Cu K edge, Si(311), JSON output
//! bmm_optics --output json mono --crystal 311 forward 8979
//!
//! # Plan an edge change
//! bmm_optics edge 8979 --focus
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use bmm_common::consts::{DEFAULT_CONFIG_PATH, EDGE_TARGET_DEFAULT};
use bmm_common::prelude::*;
use bmm_optics::config::OpticsConfig;
use bmm_optics::edge::{EdgeRequest, plan_edge_change};
use bmm_optics::mirror::{self, LogicalMirrorPose, Mirror, PhysicalMirrorPose};
use bmm_optics::mono::{self, Crystal, Dcm, MonoMode, PhysicalMonoPose};
use bmm_optics::motion::{self, ActuatorBus};
use bmm_optics::simulation::SimulatedBus;
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::{Level, debug, error, info};
use tracing_subscriber::filter::Directive;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Registry, reload};

/// BMM Optics - mirror and monochromator pseudo-positioner transforms
#[derive(Parser, Debug)]
#[command(name = "bmm_optics")]
#[command(author = "RTS007")]
#[command(version)]
#[command(about = "Pseudo-positioner transforms for beamline mirrors and the DCM")]
#[command(long_about = None)]
struct Args {
    /// Path to optics configuration file (optics.toml).
    /// Falls back to the built-in deployment if the default path is missing.
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long)]
    json: bool,

    /// Result format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    output: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the declared limits of every configured instance
    Limits,

    /// Mirror or table transforms
    Mirror {
        /// Instance name (m1, m2, m3, xafs_table, ...)
        name: String,
        #[command(subcommand)]
        op: MirrorOp,
    },

    /// Monochromator transforms
    Mono {
        /// Crystal to put in the beam first (111 or 311)
        #[arg(long)]
        crystal: Option<Crystal>,
        /// Mode to switch to first (fixed or channelcut)
        #[arg(long)]
        mode: Option<MonoMode>,
        /// Force fixed-exit behaviour in channel-cut mode (true or false)
        #[arg(long, value_name = "BOOL", action = clap::ArgAction::Set)]
        suppress_channel_cut: Option<bool>,
        #[command(subcommand)]
        op: MonoOp,
    },

    /// Plan an edge change
    Edge {
        /// Edge energy [eV]
        energy: f64,
        /// Edge label (K, L1, L2, L3)
        #[arg(long, default_value = "K")]
        edge: String,
        /// Focused beam
        #[arg(long)]
        focus: bool,
        /// Rocking-curve target above the edge [eV]
        #[arg(long, default_value_t = EDGE_TARGET_DEFAULT)]
        target: f64,
        /// L3 energy used when the edge is out of reach [eV]
        #[arg(long)]
        l3: Option<f64>,
        /// Crystal to plan for (111 or 311)
        #[arg(long)]
        crystal: Option<Crystal>,
    },
}

#[derive(Subcommand, Debug)]
enum MirrorOp {
    /// Logical pose → jack positions
    Forward {
        /// Vertical translation [mm]
        #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
        vertical: f64,
        /// Lateral translation [mm]
        #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
        lateral: f64,
        /// Pitch [mrad]
        #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
        pitch: f64,
        /// Roll [mrad]
        #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
        roll: f64,
        /// Yaw [mrad]
        #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
        yaw: f64,
    },
    /// Jack positions → logical pose
    Inverse {
        /// Upstream vertical jack [mm]
        #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
        yu: f64,
        /// Downstream outboard vertical jack [mm]
        #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
        ydo: f64,
        /// Downstream inboard vertical jack [mm]
        #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
        ydi: f64,
        /// Upstream horizontal jack [mm]
        #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
        xu: f64,
        /// Downstream horizontal jack [mm]
        #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
        xd: f64,
    },
}

#[derive(Subcommand, Debug)]
enum MonoOp {
    /// Energy → bragg, para, perp
    Forward {
        /// Photon energy [eV]
        energy: f64,
        /// Current para readback, held in channel-cut mode [mm]
        #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
        para: f64,
        /// Current perp readback, held in channel-cut mode [mm]
        #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
        perp: f64,
    },
    /// Bragg angle → energy
    Inverse {
        /// Bragg angle [deg]
        #[arg(allow_negative_numbers = true)]
        bragg: f64,
    },
}

#[derive(Serialize)]
struct LimitsRow {
    instance: String,
    axis: &'static str,
    limits: AxisLimits,
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("bmm_optics failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Default level until the configuration is read.
    let filter = setup_tracing(&args)?;
    let config = load_config(&args)?;
    filter.reload(build_filter(args.verbose, config.shared.log_level)?)?;
    info!(
        "{} v{} ({} mirrors configured)",
        config.shared.service_name,
        env!("CARGO_PKG_VERSION"),
        config.mirrors.len()
    );

    match &args.command {
        Command::Limits => print_limits(&config, args.output),
        Command::Mirror { name, op } => {
            let mirror = config
                .mirror(name)?
                .ok_or_else(|| format!("no mirror named '{name}' in configuration"))?;
            run_mirror(&mirror, op, args.output)
        }
        Command::Mono {
            crystal,
            mode,
            suppress_channel_cut,
            op,
        } => {
            let dcm = config.build_dcm()?;
            let mut bus = SimulatedBus::new().with_dcm(&dcm);
            if let Some(crystal) = crystal {
                motion::select_crystal(&mut bus, &dcm, *crystal)?;
            }
            if let Some(mode) = mode {
                dcm.set_mode(*mode);
            }
            if let Some(suppress) = suppress_channel_cut {
                dcm.set_suppress_channel_cut(*suppress);
            }
            if crystal.is_some() || mode.is_some() || suppress_channel_cut.is_some() {
                if let Some(store) = config.dcm.persistence() {
                    store.save_dcm(&dcm)?;
                }
            }
            run_mono(&dcm, &mut bus, op, args.output)
        }
        Command::Edge {
            energy,
            edge,
            focus,
            target,
            l3,
            crystal,
        } => {
            let dcm = config.build_dcm()?;
            let mut request = EdgeRequest::new(*energy)
                .with_edge(edge.parse()?)
                .with_focus(*focus)
                .with_target(*target);
            if let Some(l3) = l3 {
                request = request.with_l3_fallback(*l3);
            }

            let mut state = dcm.snapshot();
            if let Some(crystal) = crystal {
                state.select_crystal(*crystal);
            }
            let plan = plan_edge_change(
                &request,
                &state,
                &PhysicalMonoPose::default(),
                &dcm.energy_limits(),
            )?;

            match args.output {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&plan)?),
                OutputFormat::Text => {
                    println!(
                        "{} edge at {:.1} eV, mono to {:.1} eV with {}",
                        plan.edge, plan.edge_energy, plan.mono_energy, plan.crystal
                    );
                    println!("photon delivery mode {}", plan.photon_mode);
                    println!(
                        "bragg = {:.5} deg   para = {:.4} mm   perp = {:.4} mm",
                        plan.mono.bragg, plan.mono.para, plan.mono.perp
                    );
                    match plan.pitch {
                        Some(pitch) => println!("approximate pitch = {pitch:.4}"),
                        None => println!("pitch: keep current readback"),
                    }
                }
            }
            Ok(())
        }
    }
}

/// Explicit `--config` must load; the default path is optional.
fn load_config(args: &Args) -> Result<OpticsConfig, ConfigError> {
    match &args.config {
        Some(path) => OpticsConfig::load_validated(path),
        None => match OpticsConfig::load_validated(std::path::Path::new(DEFAULT_CONFIG_PATH)) {
            Err(ConfigError::FileNotFound) => {
                debug!("{} not found, using built-in deployment", DEFAULT_CONFIG_PATH);
                Ok(OpticsConfig::default())
            }
            other => other,
        },
    }
}

fn print_limits(config: &OpticsConfig, output: OutputFormat) -> Result<(), Box<dyn std::error::Error>> {
    let dcm = config.build_dcm()?;
    let mut rows = Vec::new();
    for mirror in config.build_mirrors()? {
        rows.extend(mirror.limits().into_iter().map(|(axis, limits)| LimitsRow {
            instance: mirror.name().to_string(),
            axis,
            limits,
        }));
    }
    rows.extend(dcm.limits().into_iter().map(|(axis, limits)| LimitsRow {
        instance: dcm.name().to_string(),
        axis,
        limits,
    }));

    match output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&rows)?),
        OutputFormat::Text => {
            for row in &rows {
                println!(
                    "{:<12} {:<10} [{:>9.3}, {:>9.3}]",
                    row.instance,
                    row.axis,
                    row.limits.min(),
                    row.limits.max()
                );
            }
        }
    }
    Ok(())
}

fn run_mirror(mirror: &Mirror, op: &MirrorOp, output: OutputFormat) -> Result<(), Box<dyn std::error::Error>> {
    match *op {
        MirrorOp::Forward {
            vertical,
            lateral,
            pitch,
            roll,
            yaw,
        } => {
            let target = LogicalMirrorPose {
                vertical,
                lateral,
                pitch,
                roll,
                yaw,
            };
            let mut bus = SimulatedBus::new().with_mirror(mirror);
            let physical = motion::move_mirror(&mut bus, mirror, &target)?;
            emit_record(output, &PhysicalMirrorPose::AXES, &physical.values(), &physical)
        }
        MirrorOp::Inverse { yu, ydo, ydi, xu, xd } => {
            let physical = PhysicalMirrorPose { yu, ydo, ydi, xu, xd };
            let pose = mirror::inverse(&physical, mirror.geometry());
            emit_record(output, &LogicalMirrorPose::AXES, &pose.values(), &pose)
        }
    }
}

fn run_mono(
    dcm: &Dcm,
    bus: &mut SimulatedBus,
    op: &MonoOp,
    output: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    match *op {
        MonoOp::Forward { energy, para, perp } => {
            bus.command(&dcm.actuator("para"), para)?;
            bus.command(&dcm.actuator("perp"), perp)?;
            let physical = motion::move_dcm(bus, dcm, energy)?;
            match output {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&physical)?),
                OutputFormat::Text => println!("{}", motion::report_dcm(&*bus, dcm)?),
            }
        }
        MonoOp::Inverse { bragg } => {
            let physical = PhysicalMonoPose {
                bragg,
                ..Default::default()
            };
            let pose = mono::inverse(&physical, &dcm.snapshot())?;
            emit_record(output, &["energy"], &[pose.energy], &pose)?;
        }
    }
    Ok(())
}

fn emit_record<T: Serialize>(
    output: OutputFormat,
    axes: &[&str],
    values: &[f64],
    record: &T,
) -> Result<(), Box<dyn std::error::Error>> {
    match output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(record)?),
        OutputFormat::Text => {
            for (axis, value) in axes.iter().zip(values) {
                println!("{axis:<10} {value:>12.6}");
            }
        }
    }
    Ok(())
}

type FilterHandle = reload::Handle<EnvFilter, Registry>;

/// Log filter: `RUST_LOG`, then `--verbose` or the configured level.
fn build_filter(
    verbose: bool,
    configured: LogLevel,
) -> Result<EnvFilter, Box<dyn std::error::Error>> {
    let directive: Directive = if verbose {
        Level::DEBUG.into()
    } else {
        configured.as_directive().parse()?
    };
    Ok(EnvFilter::from_default_env().add_directive(directive))
}

/// Setup tracing subscriber based on CLI arguments.
///
/// Returns a handle for swapping in the configured level later.
fn setup_tracing(args: &Args) -> Result<FilterHandle, Box<dyn std::error::Error>> {
    let (filter, handle) = reload::Layer::new(build_filter(args.verbose, LogLevel::default())?);
    let registry = tracing_subscriber::registry().with(filter);

    if args.json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
    Ok(handle)
}
