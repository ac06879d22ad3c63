//! # SealedSecret Resource
//!
//! The encrypted document recognised by the SealedSecrets controller.
//!
//! # Example
//!
//! ```yaml
//! apiVersion: bitnami.com/v1alpha1
//! kind: SealedSecret
//! metadata:
//!   name: db
//!   namespace: app
//!   annotations:
//!     sealedsecrets.bitnami.com/cluster-wide: "true"
//! spec:
//!   template:
//!     metadata:
//!       name: db
//!       namespace: app
//!     type: Opaque
//!   encryptedData:
//!     password: AgB4...
//! ```

use crate::error::{Error, Result};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(CustomResource, Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "bitnami.com",
    version = "v1alpha1",
    kind = "SealedSecret",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct SealedSecretSpec {
    /// Shape of the Secret the controller materialises
    pub template: SecretTemplate,
    /// Per-key hybrid ciphertext, base64 encoded
    #[serde(default)]
    pub encrypted_data: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SecretTemplate {
    #[serde(default)]
    pub metadata: TemplateMetadata,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub secret_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TemplateMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}

impl SealedSecret {
    /// Parse a sealed manifest
    ///
    /// # Errors
    ///
    /// Returns [`Error::Serialization`] if the text is not a `SealedSecret`.
    pub fn from_manifest(manifest: &str) -> Result<Self> {
        let sealed: Self = serde_yaml::from_str(manifest)?;
        if sealed.metadata.name.as_deref().is_none_or(str::is_empty) {
            return Err(Error::Serialization(
                "sealed manifest has no metadata.name".into(),
            ));
        }
        Ok(sealed)
    }

    /// Render as pretty-printed YAML
    ///
    /// # Errors
    ///
    /// Returns [`Error::Serialization`] if encoding fails.
    pub fn to_manifest(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        self.metadata.name.as_deref().unwrap_or_default()
    }

    #[must_use]
    pub fn namespace(&self) -> &str {
        self.metadata.namespace.as_deref().unwrap_or("default")
    }
}
