//! # Sealing
//!
//! Fetches the controller's public key and seals plaintext secrets with it.
//!
//! The key is fetched fresh for every seal and never cached, so sealed output
//! always reflects the certificate the controller currently publishes.

pub mod certificate;
pub mod crypto;
pub mod key;
pub mod scope;
pub mod sealed_secret;
pub mod sealer;

pub use certificate::{CertificateFetcher, CertificateStream, KubeCertificateFetcher};
pub use key::SealingKey;
pub use scope::SealingScope;
pub use sealed_secret::{SealedSecret, SealedSecretSpec};
pub use sealer::{seal, unseal};

use crate::cancel::bounded;
use crate::error::{Error, Operation, Result};
use crate::manifest::render;
use crate::spec::{ControllerIdentity, SecretSpec};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, Instrument};

/// Builds sealed manifests from secret specifications
#[derive(Clone)]
pub struct Sealer {
    fetcher: Arc<dyn CertificateFetcher>,
    timeout: Duration,
}

impl std::fmt::Debug for Sealer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sealer")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl Sealer {
    #[must_use]
    pub fn new(fetcher: Arc<dyn CertificateFetcher>, timeout: Duration) -> Self {
        Self { fetcher, timeout }
    }

    /// Fetch and parse the sealing key of `controller`
    ///
    /// The certificate stream is released before this returns, whether or
    /// not parsing succeeded. Timeouts carry the same proxy hint as any other
    /// fetch failure.
    ///
    /// # Errors
    ///
    /// [`Error::Network`](crate::Error::Network) if the certificate cannot be
    /// fetched, [`Error::Parse`](crate::Error::Parse) if it is unusable, and
    /// [`Error::Cancelled`](crate::Error::Cancelled) on cancellation.
    pub async fn fetch_key(
        &self,
        controller: &ControllerIdentity,
        token: &CancellationToken,
    ) -> Result<SealingKey> {
        let resource = format!("{}/{}", controller.namespace, controller.name);
        bounded(token, self.timeout, Operation::Seal, &resource, async {
            let stream = self.fetcher.fetch(controller).await?;
            certificate::read_sealing_key(stream).await
        })
        .await
        .map_err(|e| match e {
            Error::Network {
                hint: None,
                message,
                ..
            } => certificate::fetch_error(controller, &message),
            other => other,
        })
    }

    /// Validate, render, and seal `spec` under `controller`'s current key
    ///
    /// Validation runs before any network call.
    ///
    /// # Errors
    ///
    /// [`Error::Validation`](crate::Error::Validation) for unsealable input,
    /// otherwise anything [`Sealer::fetch_key`] or [`seal`] returns.
    pub async fn seal_spec(
        &self,
        spec: &SecretSpec,
        controller: &ControllerIdentity,
        scope: SealingScope,
        allow_empty_data: bool,
        token: &CancellationToken,
    ) -> Result<String> {
        let allow_empty_data = allow_empty_data || spec.allow_empty_data;
        crate::manifest::validate(spec, allow_empty_data)?;

        let span = tracing::info_span!(
            "sealer.seal",
            secret.name = %spec.name,
            secret.namespace = %spec.namespace,
            controller = %controller.name,
        );
        async {
            let plaintext = render(spec);
            let key = self.fetch_key(controller, token).await?;
            let manifest = seal(plaintext, &key, scope, allow_empty_data)?;
            info!(scope = %scope, "Built sealed manifest");
            Ok(manifest)
        }
        .instrument(span)
        .await
    }
}
