//! One runner per motion subcommand.
//!
//! Each runner opens the rig, takes control, starts its command, drives the
//! control loop and publishes a final summary record.

use crate::cli::Shape;
use crate::publish::{Publisher, telemetry_json};
use crate::session::{Ended, Rig, RunStats};
use eyre::WrapErr;
use rover_config::{
    CalibrationRow, Config, Side, TuningRecord, fit_duty_to_velocity, fit_feedforward,
    fit_velocity_to_duty, write_calibration_csv,
};
use rover_core::{AutonomousSequence, CoreEvent, Intent, MotorSelect, RoverCore, SweepConfig};
use serde_json::json;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

fn elapsed_ms(stats: &RunStats) -> u64 {
    u64::try_from(stats.elapsed.as_millis()).unwrap_or(u64::MAX)
}

/// Shared body of the three keep-alive driven commands.
fn run_held(
    cfg: &Config,
    publisher: &Publisher,
    shutdown: &AtomicBool,
    command: &'static str,
    intent: &Intent,
    duration: Duration,
) -> eyre::Result<()> {
    let mut rig = Rig::open(cfg)?;
    rig.connect();
    rig.send(intent.clone())?;
    let refresh = |core: &mut RoverCore| core.handle(crate::session::CLI_CLIENT, intent.clone());
    let stats = rig.run(publisher, shutdown, Some(duration), refresh, |_| {})?;
    let telemetry = rig.core().telemetry();
    let speeds = rig.core().drivetrain().measured_velocity();
    rig.close(publisher);

    let text = match speeds {
        Some(v) => format!(
            "{command} finished after {} ms: left {:.1} cm/s, right {:.1} cm/s",
            elapsed_ms(&stats),
            v.left,
            v.right
        ),
        None => format!("{command} finished after {} ms", elapsed_ms(&stats)),
    };
    publisher.publish_summary(
        text,
        json!({
            "event": "summary",
            "command": command,
            "elapsed_ms": elapsed_ms(&stats),
            "ticks": stats.ticks,
            "overruns": stats.overruns,
            "timed_out": stats.ended == Ended::Idle,
            "telemetry": telemetry_json(&telemetry),
        }),
    );
    Ok(())
}

pub fn drive(
    cfg: &Config,
    publisher: &Publisher,
    shutdown: &AtomicBool,
    velocity: f32,
    duration: Duration,
) -> eyre::Result<()> {
    run_held(cfg, publisher, shutdown, "drive", &Intent::Velocity(velocity), duration)
}

pub fn joystick(
    cfg: &Config,
    publisher: &Publisher,
    shutdown: &AtomicBool,
    (x, y): (f32, f32),
    duration: Duration,
) -> eyre::Result<()> {
    run_held(cfg, publisher, shutdown, "joystick", &Intent::Joystick { x, y }, duration)
}

pub fn motors(
    cfg: &Config,
    publisher: &Publisher,
    shutdown: &AtomicBool,
    (left, right): (f32, f32),
    duration: Duration,
) -> eyre::Result<()> {
    run_held(
        cfg,
        publisher,
        shutdown,
        "motors",
        &Intent::DirectMotor { left, right },
        duration,
    )
}

#[derive(Debug)]
pub struct CalibrateArgs {
    pub sweep: SweepConfig,
    pub csv: Option<PathBuf>,
    pub poly_degree: Option<u8>,
    pub save_tuning: Option<PathBuf>,
}

fn sides(motor: MotorSelect) -> &'static [Side] {
    match motor {
        MotorSelect::Left => &[Side::Left],
        MotorSelect::Right => &[Side::Right],
        MotorSelect::Both => &[Side::Left, Side::Right],
    }
}

#[allow(clippy::cast_precision_loss)]
fn mean_coeffs(sets: &[Vec<f32>]) -> Vec<f32> {
    let len = sets.iter().map(Vec::len).max().unwrap_or(0);
    (0..len)
        .map(|i| {
            let vals: Vec<f32> = sets.iter().filter_map(|s| s.get(i).copied()).collect();
            vals.iter().sum::<f32>() / vals.len().max(1) as f32
        })
        .collect()
}

/// Fold sweep rows into `base`: feedforward always, polynomials when asked.
#[allow(clippy::cast_precision_loss)]
pub fn fit_tuning(
    rows: &[CalibrationRow],
    motor: MotorSelect,
    poly_degree: Option<u8>,
    base: &TuningRecord,
) -> eyre::Result<TuningRecord> {
    let sides = sides(motor);
    let mut record = base.clone();

    let fits = sides
        .iter()
        .map(|&side| fit_feedforward(rows, side))
        .collect::<eyre::Result<Vec<_>>>()?;
    let n = fits.len() as f32;
    record.deadzone_pwm = fits.iter().map(|f| f.deadzone).sum::<f32>() / n;
    record.feedforward_gain = fits.iter().map(|f| f.gain).sum::<f32>() / n;

    if let Some(degree) = poly_degree {
        let degree = usize::from(degree);
        let v2d = sides
            .iter()
            .map(|&side| fit_velocity_to_duty(rows, side, degree))
            .collect::<eyre::Result<Vec<_>>>()?;
        let d2v = sides
            .iter()
            .map(|&side| fit_duty_to_velocity(rows, side, degree))
            .collect::<eyre::Result<Vec<_>>>()?;
        record.vel2pwm = mean_coeffs(&v2d);
        record.pwm2vel = mean_coeffs(&d2v);
    }
    record.validate().wrap_err("fitted tuning is out of range")?;
    Ok(record)
}

pub fn calibrate(
    cfg: &Config,
    publisher: &Publisher,
    shutdown: &AtomicBool,
    args: CalibrateArgs,
) -> eyre::Result<()> {
    let mut rig = Rig::open(cfg)?;
    rig.connect();
    rig.send(Intent::StartCalibration(args.sweep))?;

    let mut rows = Vec::new();
    let collect = |e: &CoreEvent| {
        if let CoreEvent::CalibrationPoint(p) = e {
            rows.push(CalibrationRow {
                duty: p.duty,
                left_velocity: p.left_velocity,
                right_velocity: p.right_velocity,
            });
        }
    };
    let stats = rig.run(publisher, shutdown, None, |_| Ok(()), collect)?;
    rig.close(publisher);

    if rows.is_empty() {
        eyre::bail!("calibration sweep produced no points");
    }
    if let Some(path) = &args.csv {
        write_calibration_csv(path, &rows)?;
        tracing::info!(path = %path.display(), rows = rows.len(), "calibration CSV written");
    }

    let mut summary = json!({
        "event": "summary",
        "command": "calibrate",
        "elapsed_ms": elapsed_ms(&stats),
        "points": rows.len(),
        "csv": args.csv.as_ref().map(|p| p.display().to_string()),
    });
    let mut text = format!("calibration recorded {} points", rows.len());

    if args.poly_degree.is_some() || args.save_tuning.is_some() {
        let record = fit_tuning(&rows, args.sweep.motor, args.poly_degree, &cfg.tuning)?;
        text.push_str(&format!(
            "; deadzone {:.1}, gain {:.3}",
            record.deadzone_pwm, record.feedforward_gain
        ));
        summary["tuning"] = serde_json::to_value(&record)?;
        if let Some(path) = &args.save_tuning {
            record.save_file(path)?;
            text.push_str(&format!("; saved to {}", path.display()));
        }
    }
    publisher.publish_summary(text, summary);
    Ok(())
}

pub fn pattern(
    cfg: &Config,
    publisher: &Publisher,
    shutdown: &AtomicBool,
    shape: Shape,
    side_cm: f32,
    exclusive: bool,
    limit: Option<Duration>,
) -> eyre::Result<()> {
    let seq = match shape {
        Shape::Square => AutonomousSequence::square(side_cm),
        Shape::FigureEight => AutonomousSequence::figure_eight(),
    }
    .with_interruptible(!exclusive);
    let total = seq.steps().len();

    let mut rig = Rig::open(cfg)?;
    rig.connect();
    rig.send(Intent::StartAutonomous(seq))?;

    let mut success = None;
    let mut steps_done = 0;
    let watch = |e: &CoreEvent| match e {
        CoreEvent::SequenceProgress { step, .. } => steps_done = *step,
        CoreEvent::SequenceComplete { success: s } => success = Some(*s),
        _ => {}
    };
    let stats = rig.run(publisher, shutdown, limit, |_| Ok(()), watch)?;
    if stats.ended == Ended::Deadline {
        tracing::info!("pattern time limit reached; stopping sequence");
        rig.send(Intent::StopAutonomous)?;
        rig.flush(publisher, &mut |e: &CoreEvent| {
            if let CoreEvent::SequenceComplete { success: s } = e {
                success = Some(*s);
            }
        });
    }
    rig.close(publisher);

    let success = success.unwrap_or(false);
    publisher.publish_summary(
        format!(
            "pattern {} after {} ms ({steps_done}/{total} steps)",
            if success { "complete" } else { "stopped" },
            elapsed_ms(&stats)
        ),
        json!({
            "event": "summary",
            "command": "pattern",
            "elapsed_ms": elapsed_ms(&stats),
            "steps": steps_done,
            "total": total,
            "success": success,
        }),
    );
    Ok(())
}

/// Pulse both wheels briefly and check that odometry saw it.
pub fn self_check(cfg: &Config, publisher: &Publisher, shutdown: &AtomicBool) -> eyre::Result<()> {
    let mut rig = Rig::open(cfg)?;
    rig.connect();
    rig.send(Intent::DirectMotor {
        left: 0.5,
        right: 0.5,
    })?;
    rig.run(publisher, shutdown, Some(Duration::from_millis(300)), |_| Ok(()), |_| {})?;
    let counts = rig.core().encoder_snapshot().map(|p| (p.left.count, p.right.count));
    let report = rig.close(publisher);

    if report.plant_pulses.is_some() {
        match counts {
            Some((l, r)) if l > 0 && r > 0 => {}
            other => eyre::bail!("self-check: encoders did not follow the simulated wheels ({other:?})"),
        }
    }
    let (left, right) = counts.unwrap_or_default();
    publisher.publish_summary(
        format!("ok ({} backend, encoders {left}/{right})", report.name),
        json!({
            "event": "summary",
            "command": "self-check",
            "status": "ok",
            "backend": report.name,
            "encoders": { "left": left, "right": right },
        }),
    );
    Ok(())
}
