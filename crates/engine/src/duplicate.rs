//! Filename-collision arbitration.
//!
//! At most one file awaits the caller's decision; later collisions queue
//! FIFO behind it unless a global policy is set.

use std::collections::VecDeque;

use uplink_protocol::DuplicateAction;

use crate::types::FileId;

/// What to do with a file that just entered `Duplicate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Arrival {
    /// A global policy exists; apply it now.
    Apply(DuplicateAction),
    /// Ask the caller about this file.
    Confirm,
    /// Another confirmation is outstanding.
    Queued,
}

/// Follow-up work after a decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Resolution {
    /// Ask about this file next.
    Confirm(FileId),
    /// The decision became the global policy; apply it to these files.
    ApplyAll(Vec<FileId>),
    Idle,
}

pub(crate) struct DuplicateResolver {
    policy: Option<DuplicateAction>,
    awaiting: Option<FileId>,
    queue: VecDeque<FileId>,
}

impl DuplicateResolver {
    pub(crate) fn new(policy: Option<DuplicateAction>) -> Self {
        Self {
            policy,
            awaiting: None,
            queue: VecDeque::new(),
        }
    }

    pub(crate) fn policy(&self) -> Option<DuplicateAction> {
        self.policy
    }

    #[cfg(test)]
    pub(crate) fn awaiting(&self) -> Option<FileId> {
        self.awaiting
    }

    pub(crate) fn arrive(&mut self, id: FileId) -> Arrival {
        if let Some(action) = self.policy {
            return Arrival::Apply(action);
        }
        if self.awaiting.is_some() {
            self.queue.push_back(id);
            Arrival::Queued
        } else {
            self.awaiting = Some(id);
            Arrival::Confirm
        }
    }

    /// Records the caller's decision for `id`.
    ///
    /// With `apply_all` the action becomes the global policy and every
    /// other waiting file is returned for the caller to resolve.
    pub(crate) fn resolve(
        &mut self,
        id: FileId,
        action: DuplicateAction,
        apply_all: bool,
    ) -> Resolution {
        self.queue.retain(|queued| *queued != id);
        let was_awaited = self.awaiting == Some(id);
        if was_awaited {
            self.awaiting = None;
        }

        if apply_all {
            self.policy = Some(action);
            let mut rest: Vec<FileId> = self.awaiting.take().into_iter().collect();
            rest.extend(self.queue.drain(..));
            return Resolution::ApplyAll(rest);
        }

        if was_awaited {
            self.advance()
        } else {
            Resolution::Idle
        }
    }

    /// Forgets `id`; if it was awaiting a decision, the next file is up.
    pub(crate) fn remove(&mut self, id: FileId) -> Resolution {
        self.queue.retain(|queued| *queued != id);
        if self.awaiting == Some(id) {
            self.awaiting = None;
            self.advance()
        } else {
            Resolution::Idle
        }
    }

    fn advance(&mut self) -> Resolution {
        match self.queue.pop_front() {
            Some(next) => {
                self.awaiting = Some(next);
                Resolution::Confirm(next)
            }
            None => Resolution::Idle,
        }
    }
}
