//! # Sealing Scope
//!
//! Binds a sealed value's decryptability to where it may be unsealed.
//!
//! The scope is folded into the RSA-OAEP label, so ciphertext produced for
//! one namespace/name cannot be replayed under another.

use crate::constants::{CLUSTER_WIDE_ANNOTATION, NAMESPACE_WIDE_ANNOTATION};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SealingScope {
    /// Only decryptable under the original namespace and name
    Strict,
    /// Decryptable under any name within the original namespace
    NamespaceWide,
    /// Decryptable anywhere in the cluster
    #[default]
    ClusterWide,
}

impl SealingScope {
    /// OAEP label for a secret sealed under this scope
    #[must_use]
    pub fn label(self, namespace: &str, name: &str) -> String {
        match self {
            Self::Strict => format!("{namespace}/{name}"),
            Self::NamespaceWide => namespace.to_string(),
            Self::ClusterWide => String::new(),
        }
    }

    /// Set the scope annotations, replacing any previous scope
    pub fn annotate(self, annotations: &mut BTreeMap<String, String>) {
        annotations.remove(CLUSTER_WIDE_ANNOTATION);
        annotations.remove(NAMESPACE_WIDE_ANNOTATION);
        match self {
            Self::Strict => {}
            Self::NamespaceWide => {
                annotations.insert(NAMESPACE_WIDE_ANNOTATION.to_string(), "true".to_string());
            }
            Self::ClusterWide => {
                annotations.insert(CLUSTER_WIDE_ANNOTATION.to_string(), "true".to_string());
            }
        }
    }

    /// Scope recorded in a set of annotations
    ///
    /// Cluster-wide wins if both markers are present.
    #[must_use]
    pub fn from_annotations(annotations: &BTreeMap<String, String>) -> Self {
        let marked = |key: &str| annotations.get(key).is_some_and(|v| v == "true");
        if marked(CLUSTER_WIDE_ANNOTATION) {
            Self::ClusterWide
        } else if marked(NAMESPACE_WIDE_ANNOTATION) {
            Self::NamespaceWide
        } else {
            Self::Strict
        }
    }
}

impl FromStr for SealingScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "namespace-wide" => Ok(Self::NamespaceWide),
            "cluster-wide" => Ok(Self::ClusterWide),
            other => Err(format!(
                "unknown sealing scope {other:?} (expected strict, namespace-wide or cluster-wide)"
            )),
        }
    }
}

impl std::fmt::Display for SealingScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Strict => "strict",
            Self::NamespaceWide => "namespace-wide",
            Self::ClusterWide => "cluster-wide",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels() {
        assert_eq!(SealingScope::Strict.label("app", "db"), "app/db");
        assert_eq!(SealingScope::NamespaceWide.label("app", "db"), "app");
        assert!(SealingScope::ClusterWide.label("app", "db").is_empty());
    }

    #[test]
    fn test_annotations_round_trip() {
        for scope in [
            SealingScope::Strict,
            SealingScope::NamespaceWide,
            SealingScope::ClusterWide,
        ] {
            let mut annotations = BTreeMap::new();
            scope.annotate(&mut annotations);
            assert_eq!(SealingScope::from_annotations(&annotations), scope);
        }
    }

    #[test]
    fn test_annotate_replaces_previous_scope() {
        let mut annotations = BTreeMap::new();
        SealingScope::ClusterWide.annotate(&mut annotations);
        SealingScope::Strict.annotate(&mut annotations);
        assert!(annotations.is_empty());
    }

    #[test]
    fn test_parse() {
        assert_eq!("strict".parse(), Ok(SealingScope::Strict));
        assert_eq!("Namespace-Wide".parse(), Ok(SealingScope::NamespaceWide));
        assert_eq!("cluster-wide".parse(), Ok(SealingScope::ClusterWide));
        assert!("global".parse::<SealingScope>().is_err());
    }
}
