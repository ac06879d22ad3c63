//! # Public Key Extraction
//!
//! Parses the controller's PEM certificate chain and returns the RSA key of
//! the leading certificate. Ordering is controller-defined; only the first
//! certificate is consulted.

use crate::error::{Error, Result};
use rsa::{BigUint, RsaPublicKey};
use x509_parser::pem::Pem;
use x509_parser::public_key::PublicKey;

/// Recipient key plus the chain it came from
///
/// Owned by a single seal operation and dropped with it.
#[derive(Debug, Clone)]
pub struct SealingKey {
    pub public_key: RsaPublicKey,
    /// DER encoding of every certificate in the fetched chain
    pub chain: Vec<Vec<u8>>,
}

/// Extract the sealing key from PEM bytes
///
/// `source` names where the PEM came from, usually the controller's
/// `namespace/name`, and is carried in every error.
///
/// # Errors
///
/// Returns [`Error::Parse`] on malformed PEM, when no certificate is present,
/// or when the first certificate's key is not RSA.
pub fn extract(pem: &[u8], source: &str) -> Result<SealingKey> {
    let blocks = Pem::iter_from_buffer(pem)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::parse(source, format!("malformed PEM block: {e}")))?;
    let chain: Vec<Vec<u8>> = blocks
        .into_iter()
        .filter(|block| block.label == "CERTIFICATE")
        .map(|block| block.contents)
        .collect();

    let leaf = chain
        .first()
        .ok_or_else(|| Error::parse(source, "failed to read any certificates"))?;

    let (_, certificate) = x509_parser::parse_x509_certificate(leaf)
        .map_err(|e| Error::parse(source, format!("invalid certificate: {e}")))?;
    let parsed = certificate
        .public_key()
        .parsed()
        .map_err(|e| Error::parse(source, format!("invalid public key: {e}")))?;

    let rsa_key = match parsed {
        PublicKey::RSA(rsa_key) => rsa_key,
        other => {
            return Err(Error::parse(
                source,
                format!("expected RSA public key but found {}", key_kind(&other)),
            ))
        }
    };

    let public_key = RsaPublicKey::new(
        BigUint::from_bytes_be(rsa_key.modulus),
        BigUint::from_bytes_be(rsa_key.exponent),
    )
    .map_err(|e| Error::parse(source, format!("unusable RSA public key: {e}")))?;

    Ok(SealingKey { public_key, chain })
}

fn key_kind(key: &PublicKey<'_>) -> &'static str {
    match key {
        PublicKey::RSA(_) => "RSA",
        PublicKey::EC(_) => "EC",
        PublicKey::DSA(_) => "DSA",
        _ => "an unsupported key type",
    }
}
