//! Quadrature encoder inputs via GPIO interrupts.
//!
//! Each encoder gets one thread that waits on both of its lines with
//! `Gpio::poll_interrupts`. That thread is the only writer for the encoder's
//! channel: it primes the counter, then for every edge reads the sibling line
//! and hands the pair to [`EncoderLines`].

use rppal::gpio::{Gpio, InputPin, Level, Trigger};
use rover_traits::EdgeSink;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

pub use crate::edges::EncoderPins;
use crate::edges::EncoderLines;
use crate::error::Result;

/// Upper bound on how long a worker takes to notice shutdown.
const POLL_TIMEOUT: Duration = Duration::from_millis(50);

/// Running encoder workers; stops and joins them on drop, which releases the
/// interrupt pins.
pub struct EncoderInterrupts {
    shutdown: Arc<AtomicBool>,
    workers: Vec<JoinHandle<()>>,
}

impl EncoderInterrupts {
    /// Attach both encoders (index 0 = left, 1 = right) and start one worker
    /// per encoder. Counters must already be registered on `sink`.
    pub fn attach(pins: [EncoderPins; 2], sink: Arc<dyn EdgeSink>) -> Result<Self> {
        let gpio = Gpio::new()?;
        let mut this = Self {
            shutdown: Arc::new(AtomicBool::new(false)),
            workers: Vec::with_capacity(pins.len()),
        };
        for (channel, p) in pins.into_iter().enumerate() {
            let mut a = gpio.get(p.a)?.into_input_pullup();
            let mut b = gpio.get(p.b)?.into_input_pullup();
            a.set_interrupt(Trigger::Both)?;
            b.set_interrupt(Trigger::Both)?;

            let lines = EncoderLines::new(channel, p, Arc::clone(&sink));
            let gpio = gpio.clone();
            let stop = Arc::clone(&this.shutdown);
            let join = std::thread::Builder::new()
                .name(format!("rover-encoder-{channel}"))
                .spawn(move || watch(&gpio, &a, &b, &lines, &stop))?;
            tracing::info!(channel, a = p.a, b = p.b, "encoder attached");
            this.workers.push(join);
        }
        Ok(this)
    }
}

fn watch(gpio: &Gpio, a: &InputPin, b: &InputPin, lines: &EncoderLines, stop: &AtomicBool) {
    lines.prime(a.is_high(), b.is_high());
    while !stop.load(Ordering::Relaxed) {
        match gpio.poll_interrupts(&[a, b], false, Some(POLL_TIMEOUT)) {
            Ok(Some((pin, level))) => {
                let other = if pin.pin() == a.pin() { b } else { a };
                lines.dispatch(pin.pin(), level == Level::High, other.is_high());
            }
            Ok(None) => {}
            Err(e) => {
                tracing::error!(channel = lines.channel(), error = %e, "encoder polling stopped");
                break;
            }
        }
    }
    tracing::debug!(channel = lines.channel(), "encoder worker exiting");
}

impl Drop for EncoderInterrupts {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}
