//! # Reconciliation State
//!
//! The lifecycle of one sealed secret as an explicit state machine.
//!
//! ```text
//!            Begin                ApplySucceeded
//!   Absent ---------> Pending -----------------------> Applied
//!   Failed ---------^    |                               |  ^
//!   Applied --------^    | ApplyFailed        Gone/Deleted|  | StillPresent
//!                        v                               v  |
//!                      Failed                          Absent
//! ```
//!
//! A `Pending` record whose operation was dropped mid-flight (a caller
//! timeout, say) accepts `Begin`, `StillPresent`, `Gone` and `Deleted`, so the
//! next operation picks it up from whatever was last recorded.
//!
//! [`ReconciliationState::next`] is a pure function of the current state and
//! the observed event, so transitions can be tested without a cluster.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ReconciliationState {
    /// Nothing has been applied, or the applied resource is gone
    #[default]
    Absent,
    /// A sealed manifest is being built and applied
    Pending,
    /// The sealed manifest is live in the store
    Applied,
    /// The last apply exhausted its retries
    Failed,
}

/// Observations that move a record between states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconciliationEvent {
    /// Create or Update started building a new manifest
    Begin,
    ApplySucceeded,
    ApplyFailed,
    /// Read found the resource still present
    StillPresent,
    /// Read found the resource missing
    Gone,
    /// Delete removed the resource
    Deleted,
}

impl ReconciliationState {
    /// Compute the state reached by observing `event`
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTransition`] for events that cannot occur in
    /// the current state, e.g. an apply outcome without a pending apply.
    pub fn next(self, event: ReconciliationEvent) -> Result<Self> {
        use ReconciliationEvent as E;
        use ReconciliationState as S;

        match (self, event) {
            (_, E::Begin) => Ok(S::Pending),
            (S::Pending, E::ApplySucceeded) => Ok(S::Applied),
            (S::Pending, E::ApplyFailed) => Ok(S::Failed),
            (S::Applied | S::Failed, E::StillPresent) => Ok(self),
            (S::Pending, E::StillPresent) => Ok(S::Applied),
            (_, E::Gone | E::Deleted) => Ok(S::Absent),
            (from, event) => Err(Error::InvalidTransition {
                from: format!("{from:?}"),
                event: format!("{event:?}"),
            }),
        }
    }
}

/// Caller-persisted bookkeeping for one sealed secret
///
/// Mutated only through the reconciler's four operations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationRecord {
    /// Identity returned by the store on the last successful apply
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_identity: Option<String>,
    /// Sealed manifest text last applied to the store
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_applied_manifest: Option<String>,
    #[serde(default)]
    pub state: ReconciliationState,
}

impl ReconciliationRecord {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply `event` to the record's state
    ///
    /// # Errors
    ///
    /// Propagates [`Error::InvalidTransition`]; the record is left unchanged.
    pub fn advance(&mut self, event: ReconciliationEvent) -> Result<()> {
        self.state = self.state.next(event)?;
        Ok(())
    }

    /// Record a successful apply
    pub(crate) fn applied(&mut self, manifest: String, identity: String) -> Result<()> {
        self.advance(ReconciliationEvent::ApplySucceeded)?;
        self.last_applied_manifest = Some(manifest);
        self.external_identity = Some(identity);
        Ok(())
    }

    /// Forget the remote resource
    pub(crate) fn clear(&mut self, event: ReconciliationEvent) -> Result<()> {
        self.advance(event)?;
        self.last_applied_manifest = None;
        self.external_identity = None;
        Ok(())
    }

    #[must_use]
    pub fn is_absent(&self) -> bool {
        self.state == ReconciliationState::Absent
    }
}
