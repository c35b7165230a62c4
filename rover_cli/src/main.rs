mod cli;
mod error_fmt;
mod motion;
mod publish;
mod rt;
mod session;

use clap::Parser;
use cli::{Cli, Commands, FILE_GUARD, JSON_MODE};
use eyre::WrapErr;
use publish::{Format, Publisher};
use rover_config::{Config, Logging, TuningRecord};
use rover_core::SweepConfig;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

fn main() {
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);
    if let Err(e) = color_eyre::install() {
        eprintln!("warning: error reporter not installed: {e}");
    }

    let code = match run(cli) {
        Ok(()) => 0,
        Err(err) => {
            tracing::error!(error = %format!("{err:#}"), "command failed");
            if JSON_MODE.get().copied().unwrap_or(false) {
                eprintln!("{}", error_fmt::format_error_json(&err));
            } else {
                eprintln!("{}", error_fmt::humanize(&err));
            }
            error_fmt::exit_code_for_error(&err)
        }
    };
    std::process::exit(code);
}

fn run(cli: Cli) -> eyre::Result<()> {
    let cfg = load_config(cli.config.as_deref(), cli.tuning.as_deref())?;
    init_tracing(&cli, &cfg.logging)?;
    tracing::debug!(command = cli.cmd.name(), "config loaded");

    if let Commands::Tuning = cli.cmd {
        if cli.json {
            println!("{}", serde_json::to_string(&cfg.tuning)?);
        } else {
            print!("{}", cfg.tuning.to_toml()?);
        }
        return Ok(());
    }

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let flag = Arc::clone(&shutdown);
        ctrlc::set_handler(move || flag.store(true, Ordering::Relaxed))
            .wrap_err("install signal handler")?;
    }
    rt::setup_rt_once(cli.rt);

    let format = if cli.json { Format::Json } else { Format::Text };
    let publisher = Publisher::stdout(format);
    let result = dispatch(cli.cmd, &cfg, &publisher, &shutdown);
    if publisher.dropped() > 0 {
        tracing::warn!(dropped = publisher.dropped(), "event output fell behind");
    }
    publisher.finish();
    result
}

fn dispatch(
    cmd: Commands,
    cfg: &Config,
    publisher: &Publisher,
    shutdown: &AtomicBool,
) -> eyre::Result<()> {
    let ms = Duration::from_millis;
    match cmd {
        Commands::Drive {
            velocity,
            duration_ms,
        } => motion::drive(cfg, publisher, shutdown, velocity, ms(duration_ms)),
        Commands::Joystick { x, y, duration_ms } => {
            motion::joystick(cfg, publisher, shutdown, (x, y), ms(duration_ms))
        }
        Commands::Motors {
            left,
            right,
            duration_ms,
        } => motion::motors(cfg, publisher, shutdown, (left, right), ms(duration_ms)),
        Commands::Calibrate {
            motor,
            start,
            end,
            step,
            hold_ms,
            csv,
            poly_degree,
            save_tuning,
        } => motion::calibrate(
            cfg,
            publisher,
            shutdown,
            motion::CalibrateArgs {
                sweep: SweepConfig {
                    motor,
                    start_duty: start,
                    end_duty: end,
                    step,
                    hold: ms(hold_ms),
                },
                csv,
                poly_degree,
                save_tuning,
            },
        ),
        Commands::Pattern {
            shape,
            side_cm,
            exclusive,
            max_ms,
        } => motion::pattern(
            cfg,
            publisher,
            shutdown,
            shape,
            side_cm,
            exclusive,
            max_ms.map(ms),
        ),
        Commands::SelfCheck => motion::self_check(cfg, publisher, shutdown),
        Commands::Tuning => Ok(()),
    }
}

/// Built-in defaults without `--config`; `--tuning` replaces the `[tuning]` table.
fn load_config(config: Option<&Path>, tuning: Option<&Path>) -> eyre::Result<Config> {
    let mut cfg = match config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .wrap_err_with(|| format!("read config {}", path.display()))?;
            rover_config::load_toml(&text)
                .wrap_err_with(|| format!("invalid configuration in {}", path.display()))?
        }
        None => Config::default(),
    };
    if let Some(path) = tuning {
        cfg.tuning = TuningRecord::load_file(path)?;
    }
    cfg.validate().wrap_err("invalid configuration")?;
    Ok(cfg)
}

/// Console logs go to stderr (stdout carries events); an optional JSON file
/// layer follows `[logging]`. `RUST_LOG` overrides `--log-level`.
fn init_tracing(cli: &Cli, logging: &Logging) -> eyre::Result<()> {
    use tracing_subscriber::{EnvFilter, Layer, Registry, fmt, prelude::*};

    let console_filter = match EnvFilter::try_from_default_env() {
        Ok(f) => f,
        Err(_) => EnvFilter::try_new(&cli.log_level)
            .wrap_err_with(|| format!("invalid --log-level '{}'", cli.log_level))?,
    };
    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();
    if cli.json {
        layers.push(
            fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_filter(console_filter)
                .boxed(),
        );
    } else {
        layers.push(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_filter(console_filter)
                .boxed(),
        );
    }

    if let Some(file) = &logging.file {
        use tracing_appender::rolling;
        let path = Path::new(file);
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let name = path
            .file_name()
            .ok_or_else(|| eyre::eyre!("logging.file '{file}' has no file name"))?;
        let appender = match logging.rotation.as_deref() {
            Some("daily") => rolling::daily(dir, name),
            Some("hourly") => rolling::hourly(dir, name),
            _ => rolling::never(dir, name),
        };
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let _ = FILE_GUARD.set(guard);
        let level = logging.level.as_deref().unwrap_or("info");
        let file_filter = EnvFilter::try_new(level)
            .wrap_err_with(|| format!("invalid logging.level '{level}'"))?;
        layers.push(
            fmt::layer()
                .json()
                .with_ansi(false)
                .with_writer(writer)
                .with_filter(file_filter)
                .boxed(),
        );
    }

    tracing_subscriber::registry().with(layers).try_init()?;
    Ok(())
}
