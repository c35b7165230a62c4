//! Single-owner control token.
//!
//! The arbiter is plain data: every method that changes ownership returns the
//! resulting [`OwnershipChange`], which the caller turns into a notification.
//! A call that changes nothing returns `None`.

use crate::types::ClientId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OwnershipChange {
    pub previous: Option<ClientId>,
    pub owner: Option<ClientId>,
}

#[derive(Debug, Default, Clone)]
pub struct ControlArbiter {
    owner: Option<ClientId>,
}

impl ControlArbiter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn owner(&self) -> Option<ClientId> {
        self.owner
    }

    pub fn has_control(&self, client: ClientId) -> bool {
        self.owner == Some(client)
    }

    /// Last requester wins; always produces a change notice.
    pub fn request(&mut self, client: ClientId) -> OwnershipChange {
        let previous = self.owner.replace(client);
        tracing::info!(client = client.0, previous = ?previous.map(|c| c.0), "control granted");
        OwnershipChange {
            previous,
            owner: Some(client),
        }
    }

    /// Only the current owner can release.
    pub fn release(&mut self, client: ClientId) -> Option<OwnershipChange> {
        if !self.has_control(client) {
            tracing::debug!(client = client.0, "release ignored, not the owner");
            return None;
        }
        self.owner = None;
        tracing::info!(client = client.0, "control released");
        Some(OwnershipChange {
            previous: Some(client),
            owner: None,
        })
    }

    /// Transport lost the client; same effect as a release.
    pub fn on_disconnect(&mut self, client: ClientId) -> Option<OwnershipChange> {
        self.release(client)
    }

    /// Auto-grant for the first client to connect.
    pub fn grant_to_first_if_unowned(&mut self, client: ClientId) -> Option<OwnershipChange> {
        if self.owner.is_some() {
            return None;
        }
        Some(self.request(client))
    }
}
