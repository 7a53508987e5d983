//! Request tokens
//!
//! A [`TokenSlot`] holds the single authoritative token of one operation
//! family. Issuing a token cancels the previous one before the caller gets
//! the new one, so a superseded transport call is aborted and its
//! continuation finds itself stale at settlement.

use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio_util::sync::CancellationToken;

/// Handle for the operation that is currently allowed to mutate state
#[derive(Debug, Clone)]
pub struct RequestToken {
    generation: u64,
    signal: CancellationToken,
}

impl RequestToken {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Abort signal to hand to the transport
    pub fn signal(&self) -> CancellationToken {
        self.signal.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.signal.is_cancelled()
    }
}

#[derive(Debug, Default)]
struct SlotState {
    generation: u64,
    current: Option<RequestToken>,
}

#[derive(Debug, Default)]
pub struct TokenSlot {
    state: Mutex<SlotState>,
}

impl TokenSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel the outstanding token, if any, and mint its successor
    pub fn issue(&self) -> RequestToken {
        let mut state = self.lock();
        if let Some(previous) = state.current.take() {
            tracing::debug!("Cancelling superseded request #{}", previous.generation);
            previous.signal.cancel();
        }
        state.generation += 1;
        let token = RequestToken {
            generation: state.generation,
            signal: CancellationToken::new(),
        };
        state.current = Some(token.clone());
        token
    }

    /// Whether `token` is still the authoritative one
    pub fn is_current(&self, token: &RequestToken) -> bool {
        self.lock()
            .current
            .as_ref()
            .is_some_and(|current| current.generation == token.generation)
    }

    pub fn current(&self) -> Option<RequestToken> {
        self.lock().current.clone()
    }

    /// Cancel the outstanding token without issuing a new one
    pub fn cancel(&self) {
        if let Some(previous) = self.lock().current.take() {
            previous.signal.cancel();
        }
    }

    fn lock(&self) -> MutexGuard<'_, SlotState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// How an operation ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settled {
    /// The result was committed to state
    Applied,
    /// The error was committed to state
    Failed,
    /// A newer operation took over; nothing was committed
    Superseded,
}

impl Settled {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_supersedes_previous() {
        let slot = TokenSlot::new();
        let first = slot.issue();
        assert!(slot.is_current(&first));

        let second = slot.issue();
        assert!(first.is_cancelled());
        assert!(!slot.is_current(&first));
        assert!(slot.is_current(&second));
        assert!(second.generation() > first.generation());
    }

    #[test]
    fn test_cancel_clears_slot() {
        let slot = TokenSlot::new();
        let token = slot.issue();
        slot.cancel();
        assert!(token.is_cancelled());
        assert!(!slot.is_current(&token));
        assert!(slot.current().is_none());
    }
}
