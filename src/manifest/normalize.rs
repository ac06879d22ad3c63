use crate::constants::LAST_APPLIED_ANNOTATION;
use crate::error::{Error, Result};
use crate::spec::SecretSpec;
use k8s_openapi::api::core::v1::Secret;

/// Strip server-populated metadata from a plaintext `Secret`
///
/// Identifiers, timestamps, resource version, generation, deletion markers
/// and client-side apply bookkeeping never make it into a sealed manifest.
#[must_use]
pub fn normalize(mut secret: Secret) -> Secret {
    let meta = &mut secret.metadata;
    meta.self_link = None;
    meta.uid = None;
    meta.resource_version = None;
    meta.generation = None;
    meta.creation_timestamp = None;
    meta.deletion_timestamp = None;
    meta.deletion_grace_period_seconds = None;
    meta.managed_fields = None;
    if let Some(annotations) = meta.annotations.as_mut() {
        annotations.remove(LAST_APPLIED_ANNOTATION);
    }
    secret
}

/// Reject a specification that cannot be sealed
///
/// # Errors
///
/// Returns [`Error::Validation`] when `name` is empty, or when `data` is
/// empty and `allow_empty_data` is not set on either the specification or the caller.
pub fn validate(spec: &SecretSpec, allow_empty_data: bool) -> Result<()> {
    if spec.name.trim().is_empty() {
        return Err(Error::validation(spec.resource(), "missing metadata.name"));
    }
    if spec.data.is_empty() && !(allow_empty_data || spec.allow_empty_data) {
        return Err(empty_data(&spec.resource()));
    }
    Ok(())
}

/// Reject a plaintext `Secret` that cannot be sealed
///
/// # Errors
///
/// Same rules as [`validate`], checking both `data` and `stringData`.
pub fn validate_secret(secret: &Secret, allow_empty_data: bool) -> Result<()> {
    let resource = format!(
        "{}/{}",
        secret.metadata.namespace.as_deref().unwrap_or_default(),
        secret.metadata.name.as_deref().unwrap_or_default()
    );

    let has_data = secret.data.as_ref().is_some_and(|d| !d.is_empty());
    let has_string_data = secret.string_data.as_ref().is_some_and(|d| !d.is_empty());
    if !has_data && !has_string_data && !allow_empty_data {
        return Err(empty_data(&resource));
    }
    if secret.metadata.name.as_deref().is_none_or(str::is_empty) {
        return Err(Error::validation(resource, "missing metadata.name in input Secret"));
    }
    Ok(())
}

fn empty_data(resource: &str) -> Error {
    Error::validation(
        resource,
        "secret data is empty, assuming this is an error and aborting; set allowEmptyData to seal an empty secret",
    )
}
