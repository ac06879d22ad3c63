//! Sealed Secret Reconciler Library
//!
//! Seals plaintext secret specifications under a SealedSecrets controller's
//! public key and reconciles the sealed manifests against a cluster.
//!
//! - [`seal`] fetches certificates and builds encrypted manifests
//! - [`manifest`] renders and normalizes the plaintext `Secret`
//! - [`store`] applies, deletes, and looks up sealed manifests
//! - [`reconciler`] drives the Create/Read/Update/Delete lifecycle

pub mod cancel;
pub mod config;
pub mod constants;
pub mod error;
pub mod manifest;
pub mod reconciler;
pub mod seal;
pub mod spec;
pub mod store;

pub use config::ReconcilerConfig;
pub use error::{Error, Operation, Result};
pub use reconciler::{
    Applied, ReconciliationEvent, ReconciliationRecord, ReconciliationState, Reconciler,
    UpdateOutcome,
};
pub use seal::{SealedSecret, Sealer, SealingKey, SealingScope};
pub use spec::{ControllerIdentity, SecretSpec};
pub use store::ManifestStore;
