//! Per-kind fetch slot bookkeeping
//!
//! At most one request of each kind is outstanding. Starting a new fetch of a
//! kind cancels the previous one and hands out a fresh sequence number; a
//! reply is accepted only if it carries the current sequence number for its
//! kind, so a cancelled request's late completion can never mutate the cache.

use tokio_util::sync::CancellationToken;

/// Kinds of cancellable backend requests the store issues
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchKind {
    Activation,
    Uuids,
    Submission,
    ProcessingData,
}

impl FetchKind {
    fn idx(self) -> usize {
        match self {
            FetchKind::Activation => 0,
            FetchKind::Uuids => 1,
            FetchKind::Submission => 2,
            FetchKind::ProcessingData => 3,
        }
    }
}

#[derive(Debug)]
struct Slot {
    seq: u64,
    token: CancellationToken,
}

/// One in-flight slot per fetch kind
#[derive(Debug, Default)]
pub struct FetchSlots {
    next_seq: u64,
    slots: [Option<Slot>; 4],
}

impl FetchSlots {
    /// Open a slot for `kind`, cancelling any previous in-flight request of
    /// the same kind first
    pub fn begin(&mut self, kind: FetchKind) -> (u64, CancellationToken) {
        self.cancel(kind);
        self.next_seq += 1;
        let token = CancellationToken::new();
        self.slots[kind.idx()] = Some(Slot {
            seq: self.next_seq,
            token: token.clone(),
        });
        (self.next_seq, token)
    }

    /// Accept a reply: true iff `seq` is the current sequence for `kind`
    ///
    /// Accepting clears the slot; a second reply with the same sequence is
    /// rejected too.
    pub fn try_complete(&mut self, kind: FetchKind, seq: u64) -> bool {
        match &self.slots[kind.idx()] {
            Some(slot) if slot.seq == seq => {
                self.slots[kind.idx()] = None;
                true
            }
            _ => false,
        }
    }

    /// Whether a request of `kind` is currently outstanding
    pub fn is_in_flight(&self, kind: FetchKind) -> bool {
        self.slots[kind.idx()].is_some()
    }

    /// Cancel one kind's in-flight request, if any
    pub fn cancel(&mut self, kind: FetchKind) {
        if let Some(slot) = self.slots[kind.idx()].take() {
            slot.token.cancel();
        }
    }

    /// Cancel everything in flight
    pub fn cancel_all(&mut self) {
        for kind in [
            FetchKind::Activation,
            FetchKind::Uuids,
            FetchKind::Submission,
            FetchKind::ProcessingData,
        ] {
            self.cancel(kind);
        }
    }
}
