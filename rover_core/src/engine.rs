//! Single-slot command lifecycle.
//!
//! States are `Empty` and `Running(Command)`. A new command replaces the
//! running one only if that one is interruptible, and a non-blocking command
//! never displaces a blocking one.

use crate::command::{Command, CommandKind};
use crate::drivetrain::Drivetrain;
use crate::error::EngineError;
use crate::events::CoreEvent;
use std::time::Instant;

#[derive(Debug, Default)]
pub struct CommandEngine {
    active: Option<Command>,
}

impl CommandEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.active.is_some()
    }

    pub fn active_kind(&self) -> Option<CommandKind> {
        self.active.as_ref().map(Command::kind)
    }

    pub fn active(&self) -> Option<&Command> {
        self.active.as_ref()
    }

    /// Mutable access for in-place refresh of the running command.
    pub fn active_mut(&mut self) -> Option<&mut Command> {
        self.active.as_mut()
    }

    /// Whether `requested` would be allowed to replace the running command.
    pub fn admits(&self, requested: CommandKind) -> Result<(), EngineError> {
        let Some(current) = self.active.as_ref() else {
            return Ok(());
        };
        if !current.is_interruptible() || (current.is_blocking() && !requested.is_blocking()) {
            return Err(EngineError::Rejected {
                active: current.kind(),
                requested,
            });
        }
        Ok(())
    }

    /// Stop whatever runs (if allowed) and start `cmd`.
    ///
    /// On rejection nothing changes. On start failure the engine is left empty.
    pub fn execute(
        &mut self,
        mut cmd: Command,
        dt: &mut Drivetrain,
        now: Instant,
        events: &mut Vec<CoreEvent>,
    ) -> Result<(), EngineError> {
        let kind = cmd.kind();
        if let Err(e) = self.admits(kind) {
            tracing::warn!(error = %e, "command rejected");
            return Err(e);
        }
        if let Some(mut current) = self.active.take() {
            tracing::info!(command = %current.kind(), "stopping command");
            current.stop(dt, events);
        }
        match cmd.start(dt, now, events) {
            Ok(()) => {
                tracing::info!(
                    command = %kind,
                    blocking = kind.is_blocking(),
                    "started command"
                );
                self.active = Some(cmd);
                Ok(())
            }
            Err(source) => {
                tracing::warn!(command = %kind, error = %source, "command failed to start");
                Err(EngineError::StartFailed { kind, source })
            }
        }
    }

    /// Advance the running command one step; stop and drop it once it reports
    /// completion. Returns the kind of a command that just finished.
    pub fn tick(
        &mut self,
        dt: &mut Drivetrain,
        now: Instant,
        events: &mut Vec<CoreEvent>,
    ) -> Option<CommandKind> {
        let cmd = self.active.as_mut()?;
        if cmd.update(dt, now, events).is_running() {
            return None;
        }
        let kind = cmd.kind();
        cmd.stop(dt, events);
        self.active = None;
        tracing::info!(command = %kind, "command completed");
        Some(kind)
    }

    /// Unconditional stop, used for explicit external stop requests.
    pub fn cancel(&mut self, dt: &mut Drivetrain, events: &mut Vec<CoreEvent>) -> Option<CommandKind> {
        let mut cmd = self.active.take()?;
        let kind = cmd.kind();
        cmd.stop(dt, events);
        tracing::info!(command = %kind, "command cancelled");
        Some(kind)
    }
}
