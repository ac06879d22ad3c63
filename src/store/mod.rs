//! # Manifest Store
//!
//! The remote store sealed manifests are reconciled against.
//!
//! The reconciler only needs three primitives: apply a manifest and learn
//! its identity, delete by manifest, and check whether an identity still
//! exists. [`KubeManifestStore`] implements them against the cluster API.
//!
//! Identities look like the resource paths `kubectl` prints:
//!
//! ```text
//! /apis/bitnami.com/v1alpha1/namespaces/app/sealedsecrets/db
//! ```

mod cluster;

pub use cluster::KubeManifestStore;

use crate::constants::{SEALED_SECRET_GROUP, SEALED_SECRET_PLURAL, SEALED_SECRET_VERSION};
use crate::error::Result;
use async_trait::async_trait;

/// Remote store primitives
#[async_trait]
pub trait ManifestStore: Send + Sync {
    /// Create or update the object described by `manifest`, returning its identity
    async fn apply(&self, manifest: &str) -> Result<String>;

    /// Delete the object described by `manifest`
    ///
    /// Deleting an object that does not exist succeeds.
    async fn delete(&self, manifest: &str) -> Result<()>;

    /// Whether the object behind `identity` still exists
    async fn exists(&self, identity: &str) -> Result<bool>;
}

/// Identity of the sealed secret `namespace/name`
#[must_use]
pub fn identity(namespace: &str, name: &str) -> String {
    format!(
        "/apis/{SEALED_SECRET_GROUP}/{SEALED_SECRET_VERSION}/namespaces/{namespace}/{SEALED_SECRET_PLURAL}/{name}"
    )
}

/// Split an identity back into `(namespace, name)`
#[must_use]
pub fn parse_identity(identity: &str) -> Option<(&str, &str)> {
    let prefix = format!("/apis/{SEALED_SECRET_GROUP}/{SEALED_SECRET_VERSION}/namespaces/");
    let rest = identity.strip_prefix(prefix.as_str())?;
    let (namespace, rest) = rest.split_once('/')?;
    let name = rest.strip_prefix(SEALED_SECRET_PLURAL)?.strip_prefix('/')?;
    if namespace.is_empty() || name.is_empty() || name.contains('/') {
        return None;
    }
    Some((namespace, name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_shape() {
        assert_eq!(
            identity("app", "db"),
            "/apis/bitnami.com/v1alpha1/namespaces/app/sealedsecrets/db"
        );
    }

    #[test]
    fn test_parse_identity() {
        assert_eq!(parse_identity(&identity("app", "db")), Some(("app", "db")));
        assert_eq!(parse_identity("/api/v1/namespaces/app/secrets/db"), None);
        assert_eq!(
            parse_identity("/apis/bitnami.com/v1alpha1/namespaces/app/sealedsecrets/"),
            None
        );
        assert_eq!(
            parse_identity("/apis/bitnami.com/v1alpha1/namespaces/app/sealedsecrets/db/status"),
            None
        );
    }
}
