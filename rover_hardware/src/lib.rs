//! Motor bridge and encoder backends for the rover.
//!
//! The simulation is always available. The L298N bridge and GPIO encoder
//! workers need the `hardware` feature on Linux (rppal).
pub mod edges;
pub mod error;
pub mod sim;

#[cfg(all(feature = "hardware", target_os = "linux"))]
pub mod encoder;
#[cfg(all(feature = "hardware", target_os = "linux"))]
pub mod l298n;

pub use sim::{PlantHandle, SimParams, SimulatedBridge, SimulatedPlant};
