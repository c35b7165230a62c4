//! Line events of one encoder mapped onto an [`EdgeSink`] channel.

use rover_traits::{EdgeSink, Phase};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncoderPins {
    pub a: u8,
    pub b: u8,
}

/// One encoder's view of the sink. Owned by the single thread that watches
/// both of its lines, so every count update for `channel` happens there.
pub struct EncoderLines {
    channel: usize,
    pins: EncoderPins,
    sink: Arc<dyn EdgeSink>,
}

impl EncoderLines {
    pub fn new(channel: usize, pins: EncoderPins, sink: Arc<dyn EdgeSink>) -> Self {
        Self {
            channel,
            pins,
            sink,
        }
    }

    pub fn channel(&self) -> usize {
        self.channel
    }

    pub fn prime(&self, a: bool, b: bool) {
        self.sink.prime(self.channel, a, b);
    }

    /// `pin` changed to `level`; `other` is the sibling line read just after.
    /// Returns false when `pin` is not one of this encoder's lines.
    pub fn dispatch(&self, pin: u8, level: bool, other: bool) -> bool {
        let (phase, a, b) = if pin == self.pins.a {
            (Phase::A, level, other)
        } else if pin == self.pins.b {
            (Phase::B, other, level)
        } else {
            return false;
        };
        self.sink.on_edge(self.channel, phase, a, b);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        edges: Mutex<Vec<(usize, Phase, bool, bool)>>,
        primed: Mutex<Vec<(usize, bool, bool)>>,
    }

    impl EdgeSink for Recorder {
        fn on_edge(&self, channel: usize, phase: Phase, a: bool, b: bool) {
            self.edges.lock().unwrap().push((channel, phase, a, b));
        }

        fn prime(&self, channel: usize, a: bool, b: bool) {
            self.primed.lock().unwrap().push((channel, a, b));
        }
    }

    fn lines(rec: &Arc<Recorder>) -> EncoderLines {
        let sink: Arc<dyn EdgeSink> = rec.clone();
        EncoderLines::new(1, EncoderPins { a: 22, b: 23 }, sink)
    }

    #[test]
    fn each_edge_carries_the_live_sibling_level() {
        let rec = Arc::new(Recorder::default());
        let enc = lines(&rec);
        // Forward quarter turns: A rises, B rises, A falls, B falls.
        assert!(enc.dispatch(22, true, false));
        assert!(enc.dispatch(23, true, true));
        assert!(enc.dispatch(22, false, true));
        assert!(enc.dispatch(23, false, false));
        assert_eq!(
            *rec.edges.lock().unwrap(),
            [
                (1, Phase::A, true, false),
                (1, Phase::B, true, true),
                (1, Phase::A, false, true),
                (1, Phase::B, false, false),
            ]
        );
    }

    #[test]
    fn foreign_pin_is_ignored() {
        let rec = Arc::new(Recorder::default());
        let enc = lines(&rec);
        assert!(!enc.dispatch(17, true, true));
        assert!(rec.edges.lock().unwrap().is_empty());
    }

    #[test]
    fn prime_goes_to_own_channel() {
        let rec = Arc::new(Recorder::default());
        let enc = lines(&rec);
        enc.prime(true, false);
        assert_eq!(*rec.primed.lock().unwrap(), [(1, true, false)]);
        assert_eq!(enc.channel(), 1);
    }
}
