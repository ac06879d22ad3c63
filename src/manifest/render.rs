use crate::error::{Error, Result};
use crate::spec::SecretSpec;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::ByteString;
use serde::Deserialize;
use std::collections::BTreeMap;

/// Render the plaintext `Secret` for `spec`
///
/// Values are carried as raw bytes and serialize as base64 under `data`.
/// Empty annotation and label maps are kept so the document shape does not
/// depend on which optional fields were supplied.
#[must_use]
pub fn render(spec: &SecretSpec) -> Secret {
    let data: BTreeMap<String, ByteString> = spec
        .data
        .iter()
        .map(|(key, value)| (key.clone(), ByteString(value.as_bytes().to_vec())))
        .collect();

    Secret {
        metadata: ObjectMeta {
            name: Some(spec.name.clone()),
            namespace: Some(spec.namespace.clone()),
            annotations: Some(spec.annotations.clone()),
            labels: Some(spec.labels.clone()),
            ..ObjectMeta::default()
        },
        type_: Some(spec.secret_type.clone()),
        data: Some(data),
        ..Secret::default()
    }
}

/// Serialize a plaintext `Secret` as YAML
///
/// # Errors
///
/// Returns [`Error::Serialization`] if encoding fails.
pub fn to_yaml(secret: &Secret) -> Result<String> {
    Ok(serde_yaml::to_string(secret)?)
}

/// Parse a single `Secret` document
///
/// # Errors
///
/// Returns [`Error::Validation`] for multi-document input and
/// [`Error::Serialization`] when the document is not a valid `Secret`.
pub fn parse_secret(text: &str) -> Result<Secret> {
    let mut documents = serde_yaml::Deserializer::from_str(text)
        .map(serde_yaml::Value::deserialize)
        .collect::<std::result::Result<Vec<_>, _>>()?;
    documents.retain(|doc| !doc.is_null());

    match documents.len() {
        0 => Err(Error::Serialization("input contains no document".into())),
        1 => {
            let document = documents.remove(0);
            Ok(serde_yaml::from_value(document)?)
        }
        n => Err(Error::validation(
            "input",
            format!("expected a single Secret document, found {n}"),
        )),
    }
}
