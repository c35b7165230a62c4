//! Result of one command update.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandStatus {
    /// Keep calling `update` on the next tick.
    Running,
    /// The command completed or timed out; the engine stops and drops it.
    Finished,
}

impl CommandStatus {
    #[inline]
    pub fn is_running(self) -> bool {
        matches!(self, CommandStatus::Running)
    }
}
