//! Keystroke debounce.
//!
//! Before a remote-backed plugin touches the network or its cache it waits a
//! short delay. If the host invalidates the query during that window the wait
//! ends early with [`Gate::Abort`] and the caller must do no further work.

use crate::cancel::CancellationToken;
use std::time::Duration;
use tracing::debug;

/// Outcome of a debounce wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    /// The query survived the delay; go ahead.
    Proceed,
    /// The query was superseded or cancelled.
    Abort,
}

impl Gate {
    pub fn should_proceed(self) -> bool {
        matches!(self, Gate::Proceed)
    }
}

/// Wait `delay`, or less if `token` is cancelled first.
pub async fn await_stable(token: &CancellationToken, delay: Duration) -> Gate {
    if token.is_cancelled() {
        return Gate::Abort;
    }

    tokio::select! {
        biased;
        _ = token.cancelled() => {
            debug!("Query cancelled during debounce");
            Gate::Abort
        }
        _ = tokio::time::sleep(delay) => {
            // A cancel racing the timer still wins.
            if token.is_cancelled() {
                Gate::Abort
            } else {
                Gate::Proceed
            }
        }
    }
}
