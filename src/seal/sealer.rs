//! # Sealer
//!
//! Encrypts a plaintext `Secret` into a [`SealedSecret`] manifest.
//!
//! ## Sealing Flow
//!
//! 1. Reject empty data (unless allowed) and missing names
//! 2. Strip server-populated metadata
//! 3. Record the sealing scope in the annotations
//! 4. Hybrid-encrypt every `data` and `stringData` value
//! 5. Render the result as YAML

use super::crypto::{hybrid_decrypt, hybrid_encrypt};
use super::key::SealingKey;
use super::scope::SealingScope;
use super::sealed_secret::{SealedSecret, SealedSecretSpec, SecretTemplate, TemplateMetadata};
use crate::error::{Error, Result};
use crate::manifest::{normalize, validate_secret};
use base64::{engine::general_purpose, Engine as _};
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use rand::rngs::OsRng;
use rsa::RsaPrivateKey;
use std::collections::BTreeMap;
use tracing::debug;

/// Seal `secret` for the holder of `key`
///
/// # Errors
///
/// Returns [`Error::Validation`] when the secret has no data and
/// `allow_empty_data` is false, or when it has no name. Encryption and
/// encoding failures surface as [`Error::Crypto`] and
/// [`Error::Serialization`].
pub fn seal(
    secret: Secret,
    key: &SealingKey,
    scope: SealingScope,
    allow_empty_data: bool,
) -> Result<String> {
    validate_secret(&secret, allow_empty_data)?;
    let secret = normalize(secret);

    let name = secret.metadata.name.clone().unwrap_or_default();
    let namespace = secret
        .metadata
        .namespace
        .clone()
        .unwrap_or_else(|| "default".to_string());
    let label = scope.label(&namespace, &name);

    let mut annotations = secret.metadata.annotations.clone().unwrap_or_default();
    scope.annotate(&mut annotations);

    let mut encrypted_data = BTreeMap::new();
    let values = secret
        .data
        .iter()
        .flatten()
        .map(|(k, v)| (k, v.0.as_slice()))
        .chain(
            secret
                .string_data
                .iter()
                .flatten()
                .map(|(k, v)| (k, v.as_bytes())),
        );
    for (item, value) in values {
        let ciphertext = hybrid_encrypt(&mut OsRng, &key.public_key, value, &label)?;
        encrypted_data.insert(item.clone(), general_purpose::STANDARD.encode(ciphertext));
    }

    let mut scope_annotations = BTreeMap::new();
    scope.annotate(&mut scope_annotations);

    let sealed = SealedSecret {
        metadata: ObjectMeta {
            name: Some(name.clone()),
            namespace: Some(namespace.clone()),
            annotations: Some(scope_annotations),
            ..ObjectMeta::default()
        },
        spec: SealedSecretSpec {
            template: SecretTemplate {
                metadata: TemplateMetadata {
                    name: Some(name),
                    namespace: Some(namespace),
                    annotations,
                    labels: secret.metadata.labels.clone().unwrap_or_default(),
                },
                secret_type: secret.type_.clone(),
            },
            encrypted_data,
        },
    };

    debug!(
        secret.name = %sealed.name(),
        secret.namespace = %sealed.namespace(),
        scope = %scope,
        items = sealed.spec.encrypted_data.len(),
        "Sealed secret"
    );
    sealed.to_manifest()
}

/// Decrypt every item of a sealed manifest with the controller's private key
///
/// The scope is read back from the manifest's annotations, mirroring what
/// the controller does when it unseals.
///
/// # Errors
///
/// Returns [`Error::Serialization`] for malformed manifests or base64, and
/// [`Error::Crypto`] when an item does not decrypt under `private_key`.
pub fn unseal(manifest: &str, private_key: &RsaPrivateKey) -> Result<BTreeMap<String, Vec<u8>>> {
    let sealed = SealedSecret::from_manifest(manifest)?;
    let scope = SealingScope::from_annotations(
        sealed.metadata.annotations.as_ref().unwrap_or(&BTreeMap::new()),
    );
    let label = scope.label(sealed.namespace(), sealed.name());

    sealed
        .spec
        .encrypted_data
        .iter()
        .map(|(item, encoded)| {
            let ciphertext = general_purpose::STANDARD
                .decode(encoded)
                .map_err(|e| Error::Serialization(format!("item {item:?} is not base64: {e}")))?;
            Ok((item.clone(), hybrid_decrypt(private_key, &ciphertext, &label)?))
        })
        .collect()
}
