//! Maps `Box<dyn Error>` from the bridge trait boundary to a typed `RoverError`.
//!
//! With the `hardware-errors` feature the concrete `rover_hardware::HwError`
//! is recognised by downcast; anything else goes through string heuristics.

use crate::error::RoverError;

pub fn map_bridge_error(e: &(dyn std::error::Error + 'static)) -> RoverError {
    #[cfg(feature = "hardware-errors")]
    {
        if let Some(hw) = e.downcast_ref::<rover_hardware::error::HwError>() {
            return match hw {
                rover_hardware::error::HwError::Timeout => RoverError::Timeout,
                other => RoverError::BridgeFault(other.to_string()),
            };
        }
    }

    let s = e.to_string();
    if s.to_lowercase().contains("timeout") {
        RoverError::Timeout
    } else {
        RoverError::Bridge(s)
    }
}
