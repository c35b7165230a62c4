use crate::command::CommandKind;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum RoverError {
    #[error("bridge error: {0}")]
    Bridge(String),
    #[error("bridge fault: {0}")]
    BridgeFault(String),
    #[error("bridge write timed out")]
    Timeout,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum BuildError {
    #[error("missing motor bridge")]
    MissingBridge,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

/// Reasons a command refuses to start.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StartError {
    #[error("autonomous sequence has no steps")]
    EmptySequence,
    #[error("calibration step must be positive, got {0}")]
    InvalidStep(i32),
    #[error("step {index} is not executable: {reason}")]
    InvalidAction { index: usize, reason: &'static str },
    #[error("distance steps need wheel odometry")]
    MissingOdometry,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum EngineError {
    #[error("{active} is running and cannot be replaced by {requested}")]
    Rejected {
        active: CommandKind,
        requested: CommandKind,
    },
    #[error("{kind} failed to start: {source}")]
    StartFailed {
        kind: CommandKind,
        #[source]
        source: StartError,
    },
}

/// Why an inbound intent had no effect.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum IntentError {
    #[error("client {0} does not hold the control token")]
    NotOwner(u32),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("no {0} command is active")]
    NotActive(CommandKind),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("edge channel {0} is out of range")]
    OutOfRange(usize),
    #[error("edge channel {0} is already registered")]
    Occupied(usize),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
