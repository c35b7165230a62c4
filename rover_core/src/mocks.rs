//! Test and helper mocks for rover_core

use rover_traits::{Direction, MotorBridge, Wheel};
use std::sync::{Arc, Mutex};

/// One recorded bridge write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BridgeWrite {
    pub wheel: Wheel,
    pub direction: Direction,
    pub duty: u8,
}

/// Bridge that records every write; clones share the log so a test can keep
/// a handle after boxing one into the driver.
#[derive(Debug, Clone, Default)]
pub struct RecordingBridge {
    writes: Arc<Mutex<Vec<BridgeWrite>>>,
    fail_with: Option<&'static str>,
}

impl RecordingBridge {
    /// Records writes but reports every one of them as failed.
    pub fn failing(msg: &'static str) -> Self {
        Self {
            fail_with: Some(msg),
            ..Self::default()
        }
    }

    pub fn writes(&self) -> Vec<BridgeWrite> {
        self.writes.lock().map(|w| w.clone()).unwrap_or_default()
    }

    pub fn last(&self, wheel: Wheel) -> Option<BridgeWrite> {
        self.writes()
            .into_iter()
            .rev()
            .find(|w| w.wheel == wheel)
    }

    pub fn clear(&self) {
        if let Ok(mut w) = self.writes.lock() {
            w.clear();
        }
    }
}

impl MotorBridge for RecordingBridge {
    fn write(
        &mut self,
        wheel: Wheel,
        direction: Direction,
        duty: u8,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if let Ok(mut w) = self.writes.lock() {
            w.push(BridgeWrite {
                wheel,
                direction,
                duty,
            });
        }
        match self.fail_with {
            Some(msg) => Err(Box::new(std::io::Error::other(msg))),
            None => Ok(()),
        }
    }
}
