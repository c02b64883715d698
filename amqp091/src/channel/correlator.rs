//! Matching of replies to the single outstanding call of a channel
//!
//! Replies carry no request id, so a channel allows at most one call in flight. A caller
//! first takes the channel's gate, then registers the reply it expects together with the
//! gate permit, and only then sends its request. The permit lives inside the
//! [`PendingReply`] and is released once the reply is resolved, whichever way.

use amqp091_types::methods::{Method, MethodId};
use tokio::sync::{oneshot, OwnedMutexGuard};

use super::Error;

pub(crate) type ReplyResult = Result<Method, Error>;

/// The call a channel is waiting on
#[derive(Debug)]
pub(crate) struct PendingReply {
    expected: MethodId,
    responder: oneshot::Sender<ReplyResult>,
    _permit: OwnedMutexGuard<()>,
}

impl PendingReply {
    pub fn expected(&self) -> MethodId {
        self.expected
    }

    /// Hand the result to the caller and release the gate
    pub fn complete(self, result: ReplyResult) {
        // The caller may have stopped waiting, which is fine
        let _ = self.responder.send(result);
    }
}

/// Outcome of matching an incoming reply
#[derive(Debug)]
pub(crate) enum Correlation {
    /// The reply is the one the pending call expects
    Expected(PendingReply),

    /// A call is pending but expects a different reply
    Mismatch(PendingReply),

    /// No call is pending
    Unsolicited,
}

#[derive(Debug, Default)]
pub(crate) struct Correlator {
    pending: Option<PendingReply>,
}

impl Correlator {
    /// Register the reply the next call expects
    pub fn expect(
        &mut self,
        expected: MethodId,
        permit: OwnedMutexGuard<()>,
    ) -> oneshot::Receiver<ReplyResult> {
        debug_assert!(self.pending.is_none(), "gate admits one call at a time");
        let (responder, reply) = oneshot::channel();
        self.pending = Some(PendingReply {
            expected,
            responder,
            _permit: permit,
        });
        reply
    }

    /// Remove the pending call and tell how `found` relates to it
    pub fn take(&mut self, found: MethodId) -> Correlation {
        match self.pending.take() {
            Some(pending) if pending.expected == found => Correlation::Expected(pending),
            Some(pending) => Correlation::Mismatch(pending),
            None => Correlation::Unsolicited,
        }
    }

    /// Fail the pending call, if any
    pub fn fail(&mut self, error: Error) {
        if let Some(pending) = self.pending.take() {
            pending.complete(Err(error));
        }
    }

    #[cfg(test)]
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    #[cfg(test)]
    pub fn expected(&self) -> Option<MethodId> {
        self.pending.as_ref().map(PendingReply::expected)
    }
}
