//! Single-shot completion signal for playback units

use crate::playback::UnitToken;
use flashdeck_common::events::UnitOutcome;
use std::time::Duration;
use tokio::sync::mpsc;

/// Completion report delivered to the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnitCompletion {
    pub token: UnitToken,
    pub outcome: UnitOutcome,
}

/// How long a unit that has started is expected to run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnitLength {
    pub token: UnitToken,
    pub expected: Duration,
}

/// Handed to a backend together with each playback unit
///
/// `finish` consumes the value, so a unit reports at most once. Dropping it without
/// finishing (cancellation) reports nothing.
#[derive(Debug)]
pub struct Completion {
    token: UnitToken,
    tx: mpsc::UnboundedSender<UnitCompletion>,
    lengths: Option<mpsc::UnboundedSender<UnitLength>>,
}

impl Completion {
    pub fn new(token: UnitToken, tx: mpsc::UnboundedSender<UnitCompletion>) -> Self {
        Self {
            token,
            tx,
            lengths: None,
        }
    }

    /// Also forward expected-length reports to `lengths`
    pub fn with_lengths(mut self, lengths: mpsc::UnboundedSender<UnitLength>) -> Self {
        self.lengths = Some(lengths);
        self
    }

    /// Create a completion plus the receiver it reports to
    pub fn channel(token: UnitToken) -> (Self, mpsc::UnboundedReceiver<UnitCompletion>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(token, tx), rx)
    }

    pub fn token(&self) -> UnitToken {
        self.token
    }

    /// Tell the engine how long the unit should run once it is known
    pub fn report_length(&self, expected: Duration) {
        if let Some(lengths) = &self.lengths {
            let _ = lengths.send(UnitLength {
                token: self.token,
                expected,
            });
        }
    }

    pub fn finish(self, outcome: UnitOutcome) {
        // Receiver gone means the engine shut down
        let _ = self.tx.send(UnitCompletion {
            token: self.token,
            outcome,
        });
    }
}
