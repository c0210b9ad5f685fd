use std::fmt;

use tracing::debug;

use crate::error::CoreResult;

/// Lifecycle of one orchestrated operation.
///
/// `Resolving` and `Authorizing` never write. Only `Executing` touches the
/// store with side effects.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Resolving,
    Authorizing,
    Executing,
    Done,
    Failed,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Resolving => "resolving",
            Self::Authorizing => "authorizing",
            Self::Executing => "executing",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Records phase transitions for one operation as `tracing` events.
#[derive(Debug)]
pub(crate) struct Progress {
    op: &'static str,
    phase: Phase,
}

impl Progress {
    pub(crate) fn start(op: &'static str) -> Self {
        debug!(op, phase = %Phase::Resolving, "operation started");
        Self {
            op,
            phase: Phase::Resolving,
        }
    }

    pub(crate) fn enter(&mut self, phase: Phase) {
        debug_assert!(!self.phase.is_terminal());
        self.phase = phase;
        debug!(op = self.op, phase = %phase, "phase");
    }

    /// Close the operation, logging where it failed if it did.
    pub(crate) fn finish<T>(mut self, result: CoreResult<T>) -> CoreResult<T> {
        match &result {
            Ok(_) => {
                self.phase = Phase::Done;
                debug!(op = self.op, phase = %self.phase, "operation finished");
            }
            Err(e) => {
                let failed_in = self.phase;
                self.phase = Phase::Failed;
                debug!(
                    op = self.op,
                    phase = %self.phase,
                    failed_in = %failed_in,
                    kind = ?e.kind(),
                    error = %e,
                    "operation failed"
                );
            }
        }
        result
    }
}
