//! Off-thread event output.
//!
//! The control loop hands `Record`s to a bounded channel and never waits on
//! stdout; a writer thread renders them as JSON lines or plain text. When the
//! channel is full the record is counted as dropped instead of stalling a tick.

use crossbeam_channel::{Sender, TrySendError, bounded};
use rover_core::{CoreEvent, EncoderSnapshot, TelemetrySnapshot, WheelPair};
use serde_json::{Value, json};
use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::JoinHandle;

const CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    Text,
}

#[derive(Debug)]
pub enum Record {
    Event { t_ms: u64, event: CoreEvent },
    /// Final line of a command, rendered from `json` in JSON mode.
    Summary { text: String, json: Value },
}

pub struct Publisher {
    tx: Option<Sender<Record>>,
    join: Option<JoinHandle<()>>,
    dropped: Arc<AtomicU64>,
}

impl Publisher {
    pub fn spawn(format: Format, mut out: impl Write + Send + 'static) -> Self {
        let (tx, rx) = bounded::<Record>(CHANNEL_CAPACITY);
        let join = std::thread::Builder::new()
            .name("rover-publish".into())
            .spawn(move || {
                for record in rx.iter() {
                    let line = render(format, &record);
                    if let Err(e) = writeln!(out, "{line}") {
                        tracing::warn!(error = %e, "event output closed");
                        break;
                    }
                }
                let _ = out.flush();
            })
            .map_err(|e| tracing::error!(error = %e, "publisher thread failed to start"))
            .ok();
        Self {
            tx: Some(tx),
            join,
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn stdout(format: Format) -> Self {
        Self::spawn(format, std::io::stdout())
    }

    pub fn publish(&self, record: Record) {
        let Some(tx) = &self.tx else { return };
        match tx.try_send(record) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
            Err(TrySendError::Disconnected(_)) => {
                tracing::debug!("publisher gone; record discarded");
            }
        }
    }

    /// Summaries must not be lost to back-pressure, so this one blocks.
    pub fn publish_summary(&self, text: String, json: Value) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(Record::Summary { text, json });
        }
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Close the channel and wait until everything queued is written.
    pub fn finish(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.tx.take();
        if let Some(h) = self.join.take() {
            let _ = h.join();
        }
    }
}

impl Drop for Publisher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn render(format: Format, record: &Record) -> String {
    match (format, record) {
        (Format::Json, Record::Event { t_ms, event }) => event_json(*t_ms, event).to_string(),
        (Format::Text, Record::Event { t_ms, event }) => event_text(*t_ms, event),
        (Format::Json, Record::Summary { json, .. }) => json.to_string(),
        (Format::Text, Record::Summary { text, .. }) => text.clone(),
    }
}

fn encoder_json(e: &EncoderSnapshot) -> Value {
    json!({
        "count": e.count,
        "revolutions": e.revolutions,
        "distance_cm": e.distance_cm,
        "velocity": e.velocity,
        "rpm": e.rpm,
    })
}

fn pair_json<T>(p: &WheelPair<T>, f: impl Fn(&T) -> Value) -> Value {
    json!({ "left": f(&p.left), "right": f(&p.right) })
}

/// One JSON object per event; `event` carries the stable tag.
pub fn event_json(t_ms: u64, event: &CoreEvent) -> Value {
    let mut v = json!({ "t_ms": t_ms, "event": event.name() });
    let fields = match event {
        CoreEvent::ControlChanged { previous, owner } => json!({
            "previous": previous.map(|c| c.0),
            "owner": owner.map(|c| c.0),
        }),
        CoreEvent::CommandAccepted { intent } => json!({ "intent": intent }),
        CoreEvent::CommandRejected { intent, reason } => {
            json!({ "intent": intent, "reason": reason })
        }
        CoreEvent::ModeChanged { from, to } => json!({ "from": from.name(), "to": to.name() }),
        CoreEvent::CalibrationPoint(p) => json!({
            "duty": p.duty,
            "left_velocity": p.left_velocity,
            "right_velocity": p.right_velocity,
        }),
        CoreEvent::CalibrationProgress { current, start, end } => {
            json!({ "current": current, "start": start, "end": end })
        }
        CoreEvent::CalibrationComplete { points } => json!({ "points": points }),
        CoreEvent::SequenceProgress { step, total } => json!({ "step": step, "total": total }),
        CoreEvent::SequenceComplete { success } => json!({ "success": success }),
        CoreEvent::TuningApplied | CoreEvent::EncodersReset => Value::Null,
        CoreEvent::Encoders(pair) => pair_json(pair, encoder_json),
    };
    if let (Value::Object(dst), Value::Object(src)) = (&mut v, fields) {
        dst.extend(src);
    }
    v
}

pub fn event_text(t_ms: u64, event: &CoreEvent) -> String {
    let body = match event {
        CoreEvent::ControlChanged { previous, owner } => {
            let show = |c: &Option<rover_core::ClientId>| {
                c.map_or_else(|| "none".to_string(), |c| c.to_string())
            };
            format!("control {} -> {}", show(previous), show(owner))
        }
        CoreEvent::CommandAccepted { intent } => format!("accepted {intent}"),
        CoreEvent::CommandRejected { intent, reason } => format!("rejected {intent}: {reason}"),
        CoreEvent::ModeChanged { from, to } => format!("mode {from} -> {to}"),
        CoreEvent::CalibrationPoint(p) => format!(
            "calibration duty={} left={:.2} right={:.2}",
            p.duty, p.left_velocity, p.right_velocity
        ),
        CoreEvent::CalibrationProgress { current, start, end } => {
            format!("calibration progress {current} ({start}..{end})")
        }
        CoreEvent::CalibrationComplete { points } => format!("calibration complete, {points} points"),
        CoreEvent::SequenceProgress { step, total } => format!("sequence step {step}/{total}"),
        CoreEvent::SequenceComplete { success } => {
            format!("sequence {}", if *success { "complete" } else { "aborted" })
        }
        CoreEvent::TuningApplied => "tuning applied".to_string(),
        CoreEvent::EncodersReset => "encoders reset".to_string(),
        CoreEvent::Encoders(p) => format!(
            "encoders left={} ({:.1} cm/s) right={} ({:.1} cm/s)",
            p.left.count, p.left.velocity, p.right.count, p.right.velocity
        ),
    };
    format!("[{t_ms:>6} ms] {body}")
}

pub fn telemetry_json(t: &TelemetrySnapshot) -> Value {
    json!({
        "mode": t.mode.name(),
        "owner": t.owner.map(|c| c.0),
        "duty": pair_json(&t.duty, |d| json!(d)),
        "targets": pair_json(&t.targets, |v| json!(v)),
        "velocity_error": pair_json(&t.velocity_error, |v| json!(v)),
        "pid_enabled": t.pid_enabled,
        "encoders": t.encoders.as_ref().map(|p| pair_json(p, encoder_json)),
    })
}
