//! CLI argument definitions and shared statics.

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use rover_core::MotorSelect;
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "rover", version, about = "Two-wheel rover motion control")]
pub struct Cli {
    /// Path to config TOML; built-in defaults when omitted
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Tuning TOML that overrides the [tuning] table of the config
    #[arg(long, value_name = "FILE")]
    pub tuning: Option<PathBuf>,

    /// Emit events and errors as JSON lines instead of text
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace)
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "warn")]
    pub log_level: String,

    #[command(flatten)]
    pub rt: RtArgs,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

/// Real-time knobs shared by every motion command.
#[derive(Args, Debug, Clone, Copy)]
pub struct RtArgs {
    /// Enable real-time mode (SCHED_FIFO, affinity, mlockall)
    #[arg(
        long,
        global = true,
        action = ArgAction::SetTrue,
        long_help = "Enable real-time mode for the control loop (Linux, `rt` feature).\n\nAttempts SCHED_FIFO priority, pins the process to one CPU and calls mlockall to keep the address space resident. Needs CAP_SYS_NICE and CAP_IPC_LOCK (or root)."
    )]
    pub rt: bool,
    /// Real-time priority for SCHED_FIFO (1..=max)
    #[arg(long, global = true, value_name = "PRIO")]
    pub rt_prio: Option<i32>,
    /// Memory locking mode for --rt: none, current, or all
    #[arg(long, global = true, value_enum, value_name = "MODE")]
    pub rt_lock: Option<RtLock>,
    /// CPU index to pin the process to when --rt is enabled (default 0)
    #[arg(long, global = true, value_name = "CPU")]
    pub rt_cpu: Option<usize>,
}

/// Memory locking mode for real-time operation.
#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum RtLock {
    /// Do not lock memory
    None,
    /// Lock currently resident pages
    Current,
    /// Lock current and future pages
    All,
}

impl RtLock {
    #[inline]
    pub fn os_default() -> Self {
        if cfg!(target_os = "linux") {
            RtLock::Current
        } else {
            RtLock::None
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum Shape {
    Square,
    FigureEight,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Hold a closed-loop wheel speed
    Drive {
        /// Target speed in cm/s (negative reverses)
        #[arg(long, allow_hyphen_values = true)]
        velocity: f32,
        #[arg(long, value_name = "MS", default_value_t = 2000)]
        duration_ms: u64,
    },
    /// Differential drive from joystick axes in [-1, 1]
    Joystick {
        /// Steering axis (right positive)
        #[arg(long, allow_hyphen_values = true, default_value_t = 0.0)]
        x: f32,
        /// Throttle axis (forward positive)
        #[arg(long, allow_hyphen_values = true)]
        y: f32,
        #[arg(long, value_name = "MS", default_value_t = 2000)]
        duration_ms: u64,
    },
    /// Open-loop power per wheel in [-1, 1]
    Motors {
        #[arg(long, allow_hyphen_values = true)]
        left: f32,
        #[arg(long, allow_hyphen_values = true)]
        right: f32,
        #[arg(long, value_name = "MS", default_value_t = 2000)]
        duration_ms: u64,
    },
    /// Sweep PWM duty and record the wheel speed at each step
    Calibrate {
        /// Motors to drive: left, right or both
        #[arg(long, default_value_t = MotorSelect::Both)]
        motor: MotorSelect,
        #[arg(long, allow_negative_numbers = true, default_value_t = 0)]
        start: i32,
        #[arg(long, allow_negative_numbers = true, default_value_t = 255)]
        end: i32,
        #[arg(long, allow_negative_numbers = true, default_value_t = 10)]
        step: i32,
        /// Time each duty is held before sampling
        #[arg(long, value_name = "MS", default_value_t = 1000)]
        hold_ms: u64,
        /// Write the sweep to this CSV (duty,left_velocity,right_velocity)
        #[arg(long, value_name = "FILE")]
        csv: Option<PathBuf>,
        /// Fit polynomial models of this degree from the sweep
        #[arg(long, value_name = "DEGREE", value_parser = clap::value_parser!(u8).range(1..=5))]
        poly_degree: Option<u8>,
        /// Store the fitted tuning record here
        #[arg(long, value_name = "FILE")]
        save_tuning: Option<PathBuf>,
    },
    /// Run a built-in autonomous pattern
    Pattern {
        #[arg(long, value_enum, default_value_t = Shape::Square)]
        shape: Shape,
        /// Side length for the square
        #[arg(long, default_value_t = 50.0)]
        side_cm: f32,
        /// Refuse other motion commands while the pattern runs
        #[arg(long, action = ArgAction::SetTrue)]
        exclusive: bool,
        /// Stop the pattern after this long
        #[arg(long, value_name = "MS")]
        max_ms: Option<u64>,
    },
    /// Print the effective tuning record as TOML
    Tuning,
    /// Quick health check (hardware presence / sim ok)
    SelfCheck,
}

impl Commands {
    pub fn name(&self) -> &'static str {
        match self {
            Commands::Drive { .. } => "drive",
            Commands::Joystick { .. } => "joystick",
            Commands::Motors { .. } => "motors",
            Commands::Calibrate { .. } => "calibrate",
            Commands::Pattern { .. } => "pattern",
            Commands::Tuning => "tuning",
            Commands::SelfCheck => "self-check",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn negative_velocity_parses() {
        let cli = Cli::try_parse_from(["rover", "drive", "--velocity", "-12.5"]).unwrap();
        match cli.cmd {
            Commands::Drive { velocity, duration_ms } => {
                assert!((velocity + 12.5).abs() < f32::EPSILON);
                assert_eq!(duration_ms, 2000);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn rt_flags_are_global() {
        let cli = Cli::try_parse_from(["rover", "self-check", "--rt", "--rt-lock", "all"]).unwrap();
        assert!(cli.rt.rt);
        assert_eq!(cli.rt.rt_lock, Some(RtLock::All));
    }

    #[test]
    fn poly_degree_is_bounded() {
        assert!(Cli::try_parse_from(["rover", "calibrate", "--poly-degree", "6"]).is_err());
    }
}
