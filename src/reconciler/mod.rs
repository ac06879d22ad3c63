//! # Reconciler
//!
//! Drives the Create/Read/Update/Delete lifecycle of one sealed secret
//! against a [`ManifestStore`].
//!
//! ## Lifecycle
//!
//! - **Create**: seal the specification under a freshly fetched key, then
//!   apply it with retry. The record ends `Applied` or `Failed`.
//! - **Read**: check that the recorded identity still exists. A missing object
//!   is drift, not an error, and leaves the record `Absent`.
//! - **Update**: identity changes delete then create, content changes re-seal
//!   and re-apply, anything else (including a new controller) is a no-op.
//! - **Delete**: remove the recorded manifest, if there is one.
//!
//! The caller owns the [`ReconciliationRecord`] and guarantees at most one
//! operation in flight per record, so the reconciler holds no locks.

pub mod backoff;
pub mod retry;
pub mod state;

pub use state::{ReconciliationEvent, ReconciliationRecord, ReconciliationState};

use crate::cancel::bounded;
use crate::config::ReconcilerConfig;
use crate::error::{Error, Operation, Result};
use crate::seal::{CertificateFetcher, Sealer};
use crate::spec::{ControllerIdentity, SecretSpec};
use crate::store::ManifestStore;
use retry::retry_notify;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, info_span, warn, Instrument};

/// Manifest and identity produced by a successful apply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Applied {
    pub manifest: String,
    pub identity: String,
}

/// Result of [`Reconciler::update`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// A new manifest was sealed and applied
    Applied(Applied),
    /// No tracked field changed; nothing was contacted
    Unchanged,
}

/// Reconciles sealed secrets against a remote store
#[derive(Clone)]
pub struct Reconciler {
    sealer: Sealer,
    store: Arc<dyn ManifestStore>,
    config: Arc<ReconcilerConfig>,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("sealer", &self.sealer)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    #[must_use]
    pub fn new(
        fetcher: Arc<dyn CertificateFetcher>,
        store: Arc<dyn ManifestStore>,
        config: ReconcilerConfig,
    ) -> Self {
        Self {
            sealer: Sealer::new(fetcher, config.request_timeout()),
            store,
            config: Arc::new(config),
        }
    }

    #[must_use]
    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    /// Controller that seals `spec`: its own override, else the configured one
    #[must_use]
    pub fn controller_for(&self, spec: &SecretSpec) -> ControllerIdentity {
        spec.controller_identity
            .clone()
            .unwrap_or_else(|| ControllerIdentity {
                name: self.config.controller_name.clone(),
                namespace: self.config.controller_namespace.clone(),
            })
    }

    /// Seal `spec` and apply it, recording the outcome in `record`
    ///
    /// Validation failures leave `record` untouched. Any later failure moves
    /// it to `Failed` and keeps the previously applied manifest and identity.
    ///
    /// # Errors
    ///
    /// [`Error::Validation`] before any network call, sealing errors from
    /// the certificate fetch, [`Error::Apply`] once retries are exhausted, or
    /// [`Error::Cancelled`].
    pub async fn create(
        &self,
        spec: &SecretSpec,
        record: &mut ReconciliationRecord,
        token: &CancellationToken,
    ) -> Result<Applied> {
        let span = info_span!(
            "sealer.create",
            secret.name = %spec.name,
            secret.namespace = %spec.namespace,
        );
        self.seal_and_apply(spec, record, token, Operation::Create)
            .instrument(span)
            .await
    }

    /// Check whether the recorded object still exists
    ///
    /// Records with nothing applied answer `false` without contacting the
    /// store. A missing object clears the record.
    ///
    /// # Errors
    ///
    /// [`Error::Read`] on transport failure, leaving `record` unchanged, or
    /// [`Error::Cancelled`].
    pub async fn read(
        &self,
        record: &mut ReconciliationRecord,
        token: &CancellationToken,
    ) -> Result<bool> {
        let Some(identity) = record
            .external_identity
            .clone()
            .filter(|_| !record.is_absent())
        else {
            return Ok(false);
        };

        let span = info_span!("sealer.read", record.identity = %identity);
        async {
            let exists = bounded(
                token,
                self.config.request_timeout(),
                Operation::Read,
                &identity,
                self.store.exists(&identity),
            )
            .await
            .map_err(|e| match e {
                Error::Cancelled { .. } | Error::Read { .. } => e,
                other => Error::Read {
                    identity: identity.clone(),
                    message: other.to_string(),
                },
            })?;

            if exists {
                record.advance(ReconciliationEvent::StillPresent)?;
            } else {
                warn!("Sealed secret no longer exists, clearing record");
                record.clear(ReconciliationEvent::Gone)?;
            }
            Ok(exists)
        }
        .instrument(span)
        .await
    }

    /// Bring the store from `old` to `new`
    ///
    /// # Errors
    ///
    /// Anything [`Reconciler::delete`] or [`Reconciler::create`] returns.
    pub async fn update(
        &self,
        old: &SecretSpec,
        new: &SecretSpec,
        record: &mut ReconciliationRecord,
        token: &CancellationToken,
    ) -> Result<UpdateOutcome> {
        let span = info_span!(
            "sealer.update",
            secret.name = %new.name,
            secret.namespace = %new.namespace,
            record.identity = record.external_identity.as_deref().unwrap_or_default(),
        );
        async {
            if old.identity_changed(new) {
                info!(
                    from = %old.resource(),
                    to = %new.resource(),
                    "Secret identity changed, replacing"
                );
                crate::manifest::validate(new, self.allow_empty_data(new))?;
                self.delete_recorded(record, token).await?;
                return self
                    .seal_and_apply(new, record, token, Operation::Update)
                    .await
                    .map(UpdateOutcome::Applied);
            }

            if old.content_changed(new) {
                info!("Secret content changed, resealing");
                return self
                    .seal_and_apply(new, record, token, Operation::Update)
                    .await
                    .map(UpdateOutcome::Applied);
            }

            info!("No tracked field changed");
            Ok(UpdateOutcome::Unchanged)
        }
        .instrument(span)
        .await
    }

    /// Delete the recorded manifest from the store
    ///
    /// A record with no manifest is a no-op. On failure the record is left
    /// as it was so the caller can retry.
    ///
    /// # Errors
    ///
    /// [`Error::Delete`] or [`Error::Cancelled`].
    pub async fn delete(
        &self,
        record: &mut ReconciliationRecord,
        token: &CancellationToken,
    ) -> Result<()> {
        let span = info_span!(
            "sealer.delete",
            record.identity = record.external_identity.as_deref().unwrap_or_default(),
        );
        self.delete_recorded(record, token).instrument(span).await
    }

    async fn delete_recorded(
        &self,
        record: &mut ReconciliationRecord,
        token: &CancellationToken,
    ) -> Result<()> {
        let Some(manifest) = record.last_applied_manifest.clone() else {
            if !record.is_absent() {
                record.clear(ReconciliationEvent::Deleted)?;
            }
            return Ok(());
        };
        let resource = record
            .external_identity
            .clone()
            .unwrap_or_else(|| "<unrecorded>".to_string());
        record.state.next(ReconciliationEvent::Deleted)?;

        bounded(
            token,
            self.config.request_timeout(),
            Operation::Delete,
            &resource,
            self.store.delete(&manifest),
        )
        .await
        .map_err(|e| match e {
            Error::Cancelled { .. } | Error::Delete { .. } => e,
            other => Error::Delete {
                resource: resource.clone(),
                message: other.to_string(),
            },
        })?;

        record.clear(ReconciliationEvent::Deleted)?;
        info!(resource = %resource, "Deleted sealed secret");
        Ok(())
    }

    fn allow_empty_data(&self, spec: &SecretSpec) -> bool {
        self.config.allow_empty_data || spec.allow_empty_data
    }

    async fn seal_and_apply(
        &self,
        spec: &SecretSpec,
        record: &mut ReconciliationRecord,
        token: &CancellationToken,
        operation: Operation,
    ) -> Result<Applied> {
        let allow_empty_data = self.allow_empty_data(spec);
        crate::manifest::validate(spec, allow_empty_data)?;
        record.advance(ReconciliationEvent::Begin)?;

        match self.try_seal_and_apply(spec, token, operation, allow_empty_data).await {
            Ok(applied) => {
                record.applied(applied.manifest.clone(), applied.identity.clone())?;
                info!(identity = %applied.identity, "Sealed secret applied");
                Ok(applied)
            }
            Err(e) => {
                record.advance(ReconciliationEvent::ApplyFailed)?;
                error!(error = %e, "Failed to reconcile sealed secret");
                Err(e)
            }
        }
    }

    async fn try_seal_and_apply(
        &self,
        spec: &SecretSpec,
        token: &CancellationToken,
        operation: Operation,
        allow_empty_data: bool,
    ) -> Result<Applied> {
        let resource = spec.resource();
        let controller = self.controller_for(spec);
        let manifest = self
            .sealer
            .seal_spec(spec, &controller, self.config.scope, allow_empty_data, token)
            .await?;

        let timeout = self.config.request_timeout();
        let mut retries = 0_u32;
        let outcome = retry_notify(
            self.config.apply_backoff(),
            token,
            operation,
            &resource,
            |_attempt| bounded(token, timeout, operation, &resource, self.store.apply(&manifest)),
            |_err, _wait| retries += 1,
        )
        .await;
        let identity = outcome.map_err(|e| match e {
            Error::Apply {
                resource, message, ..
            } => Error::Apply {
                operation,
                resource,
                attempts: retries + 1,
                message,
            },
            Error::Network { message, .. } => Error::Apply {
                operation,
                resource: resource.clone(),
                attempts: retries + 1,
                message,
            },
            other => other,
        })?;

        Ok(Applied { manifest, identity })
    }
}
