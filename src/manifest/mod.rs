//! # Plaintext Manifest
//!
//! Turns a [`SecretSpec`](crate::spec::SecretSpec) into the canonical
//! Kubernetes `Secret` document that gets sealed.
//!
//! - [`render`] is a pure mapping from the specification to a `Secret`
//! - [`normalize`] strips server-populated metadata so resealing is stable
//! - [`validate`] rejects unsealable input before any network call
//! - [`parse_secret`] reads an existing single-document `Secret` manifest

mod normalize;
mod render;

pub use normalize::{normalize, validate, validate_secret};
pub use render::{parse_secret, render, to_yaml};
