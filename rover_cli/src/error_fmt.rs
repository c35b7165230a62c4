//! Human-readable error descriptions and structured JSON error formatting.

use crate::session::SessionError;
use rover_core::error::{BuildError, EngineError, IntentError, StartError};
use rover_hardware::error::HwError;

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingBridge => {
                "What happened: No motor bridge was provided to the rover core.\nLikely causes: The backend failed to initialize or was not wired into the builder.\nHow to fix: Check the hardware feature and the [pins] table, then retry.".to_string()
            }
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Out-of-range values in [geometry] or [control].\nHow to fix: Edit the config file, then rerun."
            ),
        };
    }

    if let Some(SessionError::Interrupted) = err.downcast_ref::<SessionError>() {
        return "What happened: The run was interrupted.\nLikely causes: Ctrl-C or a termination signal.\nHow to fix: Nothing to fix; the motors were stopped before exit.".to_string();
    }

    if let Some(ie) = err.downcast_ref::<IntentError>() {
        return match ie {
            IntentError::NotOwner(client) => format!(
                "What happened: Client {client} does not hold the control token.\nLikely causes: Another client took control.\nHow to fix: Request control before sending motion commands."
            ),
            IntentError::NotActive(kind) => format!(
                "What happened: No {kind} command is running, so there is nothing to stop."
            ),
            IntentError::Engine(EngineError::Rejected { active, requested }) => format!(
                "What happened: {requested} was refused while {active} is running.\nLikely causes: A calibration or exclusive sequence is in progress.\nHow to fix: Stop it first or wait until it completes."
            ),
            IntentError::Engine(EngineError::StartFailed { kind, source }) => {
                let hint = match source {
                    StartError::InvalidStep(_) => "Use a positive --step.",
                    StartError::EmptySequence => "Give the sequence at least one step.",
                    StartError::InvalidAction { .. } => "Fix the offending step parameters.",
                    StartError::MissingOdometry => "Wire the wheel encoders or drop distance steps.",
                };
                format!("What happened: {kind} could not start ({source}).\nHow to fix: {hint}")
            }
        };
    }

    if let Some(hw) = err.downcast_ref::<HwError>() {
        return match hw {
            HwError::Gpio(msg) => format!(
                "What happened: Failed to initialize GPIO ({msg}).\nLikely causes: Incorrect pin numbers or insufficient GPIO permissions.\nHow to fix: Fix the [pins] values in the config; ensure the process may access /dev/gpiomem."
            ),
            HwError::Timeout => "What happened: A motor bridge write timed out.\nLikely causes: Wiring or power problem on the L298N.\nHow to fix: Check the bridge supply and the enable lines.".to_string(),
            HwError::Io(e) => format!("What happened: I/O error ({e})."),
        };
    }

    // String-based heuristics for errors coming from config loading
    let msg = format!("{err:#}");
    let lower = msg.to_ascii_lowercase();

    if lower.contains("calibration csv must have headers") {
        return "Invalid headers in calibration CSV. Expected 'duty,left_velocity,right_velocity'."
            .to_string();
    }

    if lower.contains("toml parse error") || lower.contains("invalid configuration") {
        return format!(
            "What happened: Configuration is invalid.\nDetails: {msg}\nHow to fix: Edit the TOML and try again."
        );
    }

    let cause = err
        .chain()
        .nth(1)
        .map(|src| format!(" Cause: {src}"))
        .unwrap_or_default();
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Stable exit codes: 2 interrupted, 3 command refused, 4 hardware, 1 otherwise.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    if err.downcast_ref::<SessionError>().is_some() {
        2
    } else if err.downcast_ref::<IntentError>().is_some() {
        3
    } else if err.downcast_ref::<HwError>().is_some() {
        4
    } else {
        1
    }
}

fn reason_name(err: &eyre::Report) -> &'static str {
    if err.downcast_ref::<SessionError>().is_some() {
        "Interrupted"
    } else if err.downcast_ref::<IntentError>().is_some() {
        "Rejected"
    } else if err.downcast_ref::<HwError>().is_some() {
        "Hardware"
    } else if err.downcast_ref::<BuildError>().is_some() {
        "Build"
    } else {
        "Error"
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    serde_json::json!({
        "event": "error",
        "reason": reason_name(err),
        "exit_code": exit_code_for_error(err),
        "message": humanize(err),
    })
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rover_core::CommandKind;

    #[test]
    fn rejection_maps_to_exit_3() {
        let err: eyre::Report = IntentError::Engine(EngineError::Rejected {
            active: CommandKind::Calibration,
            requested: CommandKind::Velocity,
        })
        .into();
        assert_eq!(exit_code_for_error(&err), 3);
        assert!(humanize(&err).contains("Velocity was refused while Calibration"));
    }

    #[test]
    fn invalid_step_gets_hint() {
        let err: eyre::Report = IntentError::Engine(EngineError::StartFailed {
            kind: CommandKind::Calibration,
            source: StartError::InvalidStep(0),
        })
        .into();
        assert!(humanize(&err).contains("positive --step"));
    }

    #[test]
    fn interrupted_json_has_reason() {
        let err: eyre::Report = SessionError::Interrupted.into();
        let v: serde_json::Value = serde_json::from_str(&format_error_json(&err)).unwrap();
        assert_eq!(v["reason"], "Interrupted");
        assert_eq!(v["exit_code"], 2);
    }

    #[test]
    fn wrapped_config_error_keeps_details() {
        let err = eyre::eyre!("geometry.ppr must be > 0").wrap_err("invalid configuration");
        assert_eq!(exit_code_for_error(&err), 1);
        assert!(humanize(&err).contains("geometry.ppr must be > 0"));
    }
}
