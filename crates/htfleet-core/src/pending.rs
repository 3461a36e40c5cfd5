// ── Deferred subscription commands ──
//
// Select/unselect requests made while the link is down are not queued:
// only the most recent one matters, because each command fully replaces
// the server-side selection. A single slot with last-writer-wins
// semantics captures that.

use std::sync::Mutex;

use htfleet_api::ClientCommand;

/// A subscription change waiting for the link to come up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PendingAction {
    Select { id: String },
    Unselect { id: String },
}

impl PendingAction {
    /// The wire command this action replays as.
    pub(crate) fn into_command(self) -> ClientCommand {
        match self {
            Self::Select { id } => ClientCommand::SelectDevice { id },
            Self::Unselect { id } => ClientCommand::UnselectDevice { id },
        }
    }
}

/// Single-slot holder for the most recent deferred action.
pub(crate) struct PendingSlot {
    slot: Mutex<Option<PendingAction>>,
}

impl PendingSlot {
    pub(crate) fn new() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }

    /// Store an action, replacing whatever was there.
    pub(crate) fn store(&self, action: PendingAction) {
        let mut guard = self.slot.lock().expect("pending lock poisoned");
        if let Some(ref old) = *guard {
            tracing::debug!(?old, new = ?action, "replacing pending action");
        }
        *guard = Some(action);
    }

    /// Take the stored action, leaving the slot empty.
    pub(crate) fn take(&self) -> Option<PendingAction> {
        self.slot.lock().expect("pending lock poisoned").take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_writer_wins() {
        let slot = PendingSlot::new();
        slot.store(PendingAction::Select { id: "d1".into() });
        slot.store(PendingAction::Select { id: "d2".into() });
        slot.store(PendingAction::Unselect { id: "d2".into() });

        assert_eq!(slot.take(), Some(PendingAction::Unselect { id: "d2".into() }));
        assert_eq!(slot.take(), None);
    }

    #[test]
    fn action_maps_to_wire_command() {
        let select = PendingAction::Select { id: "d1".into() }.into_command();
        assert_eq!(select, ClientCommand::SelectDevice { id: "d1".into() });

        let unselect = PendingAction::Unselect { id: "d1".into() }.into_command();
        assert_eq!(unselect, ClientCommand::UnselectDevice { id: "d1".into() });
    }
}
