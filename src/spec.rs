//! # Secret Specification
//!
//! The plaintext description of a secret to be sealed.
//!
//! # Example
//!
//! ```yaml
//! name: db
//! namespace: app
//! type: Opaque
//! data:
//!   password: s3cr3t
//!   port: 5432
//! labels:
//!   env: prod
//! controllerIdentity:
//!   name: sealed-secrets-controller
//!   namespace: kube-system
//! ```

use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Secret to seal
///
/// Maps are ordered so rendering is deterministic.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SecretSpec {
    /// Secret name, must be non-empty
    pub name: String,
    /// Secret namespace
    #[serde(default = "default_namespace")]
    pub namespace: String,
    /// Secret type (e.g. "Opaque", "kubernetes.io/dockerconfigjson")
    #[serde(default = "default_secret_type", rename = "type")]
    pub secret_type: String,
    /// Plaintext values; scalars such as numbers and booleans are stringified
    #[serde(default, deserialize_with = "stringify_values")]
    #[schemars(with = "BTreeMap<String, String>")]
    pub data: BTreeMap<String, String>,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    /// Controller whose certificate seals this secret (defaults to the configured one)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controller_identity: Option<ControllerIdentity>,
    /// Seal even when `data` is empty
    #[serde(default)]
    pub allow_empty_data: bool,
}

/// SealedSecrets controller service
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ControllerIdentity {
    pub name: String,
    pub namespace: String,
}

impl SecretSpec {
    #[must_use]
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            secret_type: default_secret_type(),
            ..Self::default()
        }
    }

    /// `namespace/name`, used in logs and errors
    #[must_use]
    pub fn resource(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }

    /// Whether `other` names a different object than `self`
    ///
    /// Identity changes cannot be applied in place.
    #[must_use]
    pub fn identity_changed(&self, other: &Self) -> bool {
        self.name != other.name || self.namespace != other.namespace
    }

    /// Whether `other` differs in any field that ends up in the sealed manifest
    #[must_use]
    pub fn content_changed(&self, other: &Self) -> bool {
        self.data != other.data
            || self.secret_type != other.secret_type
            || self.annotations != other.annotations
            || self.labels != other.labels
    }
}

fn default_namespace() -> String {
    "default".to_string()
}

fn default_secret_type() -> String {
    "Opaque".to_string()
}

/// Accept any YAML scalar as a secret value
fn stringify_values<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    let raw = BTreeMap::<String, serde_yaml::Value>::deserialize(deserializer)?;
    raw.into_iter()
        .map(|(key, value)| {
            let value = match value {
                serde_yaml::Value::String(s) => s,
                serde_yaml::Value::Number(n) => n.to_string(),
                serde_yaml::Value::Bool(b) => b.to_string(),
                serde_yaml::Value::Null => String::new(),
                other => {
                    return Err(D::Error::custom(format!(
                        "value for key {key:?} must be a scalar, found {other:?}"
                    )))
                }
            };
            Ok((key, value))
        })
        .collect()
}
