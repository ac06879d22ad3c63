//! # Certificate Fetcher
//!
//! Retrieves the SealedSecrets controller's PEM certificate through the
//! Kubernetes service proxy:
//!
//! ```text
//! GET /api/v1/namespaces/{namespace}/services/http:{name}:/proxy/v1/cert.pem
//! Accept: application/x-pem-file, */*
//! ```
//!
//! The response is handed out as a [`CertificateStream`]. Dropping the
//! stream releases the connection, so [`read_sealing_key`] takes it by value
//! and the release happens on every exit path, parse failures included.

use crate::constants::{CERTIFICATE_ACCEPT, CERTIFICATE_PATH};
use crate::error::{Error, Operation, Result};
use crate::seal::key::{self, SealingKey};
use crate::spec::ControllerIdentity;
use async_trait::async_trait;
use futures::io::{AsyncBufRead, AsyncReadExt, Cursor};
use kube::Client;
use std::pin::Pin;
use tracing::{debug, info};

/// Source of controller certificates
#[async_trait]
pub trait CertificateFetcher: Send + Sync {
    /// Open the certificate endpoint of `controller`
    async fn fetch(&self, controller: &ControllerIdentity) -> Result<CertificateStream>;
}

/// Open certificate response body
///
/// Released when dropped.
pub struct CertificateStream {
    reader: Pin<Box<dyn AsyncBufRead + Send>>,
    source: String,
}

impl CertificateStream {
    pub fn new(reader: impl AsyncBufRead + Send + 'static, source: impl Into<String>) -> Self {
        Self {
            reader: Box::pin(reader),
            source: source.into(),
        }
    }

    /// Stream over an in-memory PEM document
    pub fn from_bytes(bytes: impl Into<Vec<u8>>, source: impl Into<String>) -> Self {
        Self::new(Cursor::new(bytes.into()), source)
    }

    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    async fn read_all(&mut self) -> std::io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.reader.read_to_end(&mut buf).await?;
        Ok(buf)
    }
}

impl std::fmt::Debug for CertificateStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CertificateStream")
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

impl Drop for CertificateStream {
    fn drop(&mut self) {
        debug!(source = %self.source, "Released certificate stream");
    }
}

/// Drain `stream` and extract the sealing key from it
///
/// # Errors
///
/// Returns [`Error::Network`] if the body cannot be read and
/// [`Error::Parse`] if it does not hold a usable RSA certificate.
pub async fn read_sealing_key(mut stream: CertificateStream) -> Result<SealingKey> {
    let pem = stream.read_all().await.map_err(|e| Error::Network {
        operation: Operation::Seal,
        resource: stream.source().to_string(),
        message: format!("failed to read certificate body: {e}"),
        hint: None,
    })?;
    key::extract(&pem, stream.source())
}

/// Fetches certificates through the API server's service proxy
#[derive(Clone)]
pub struct KubeCertificateFetcher {
    client: Client,
}

impl KubeCertificateFetcher {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

impl std::fmt::Debug for KubeCertificateFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeCertificateFetcher").finish_non_exhaustive()
    }
}

#[async_trait]
impl CertificateFetcher for KubeCertificateFetcher {
    async fn fetch(&self, controller: &ControllerIdentity) -> Result<CertificateStream> {
        let path = proxy_path(controller);
        let source = format!("{}/{}", controller.namespace, controller.name);
        info!(
            controller.name = %controller.name,
            controller.namespace = %controller.namespace,
            "Fetching sealing certificate"
        );

        let request = http::Request::get(path.as_str())
            .header(http::header::ACCEPT, CERTIFICATE_ACCEPT)
            .body(Vec::new())
            .map_err(|e| fetch_error(controller, &e.to_string()))?;

        // Non-success statuses surface here as `kube::Error::Api`
        let body = self
            .client
            .request_stream(request)
            .await
            .map_err(|e| fetch_error(controller, &e.to_string()))?;

        Ok(CertificateStream::new(body, source))
    }
}

/// API server path of the controller's certificate endpoint
#[must_use]
pub fn proxy_path(controller: &ControllerIdentity) -> String {
    format!(
        "/api/v1/namespaces/{}/services/http:{}:/proxy{}",
        controller.namespace, controller.name, CERTIFICATE_PATH
    )
}

/// Manual command that checks the proxy path outside this process
#[must_use]
pub fn proxy_help(controller: &ControllerIdentity) -> String {
    format!(
        "kubectl proxy --port 8080 & curl -H \"accept:application/x-pem-file\" localhost:8080/api/v1/namespaces/{}/services/{}/proxy{}",
        controller.namespace, controller.name, CERTIFICATE_PATH
    )
}

pub(crate) fn fetch_error(controller: &ControllerIdentity, cause: &str) -> Error {
    let hint = proxy_help(controller);
    Error::Network {
        operation: Operation::Seal,
        resource: format!("{}/{}", controller.namespace, controller.name),
        message: format!(
            "failed to fetch certificate: {cause}; if this is a timeout, make sure this succeeds first: {hint}"
        ),
        hint: Some(hint),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller() -> ControllerIdentity {
        ControllerIdentity {
            name: "sealed-secrets-controller".into(),
            namespace: "kube-system".into(),
        }
    }

    #[test]
    fn test_proxy_path() {
        assert_eq!(
            proxy_path(&controller()),
            "/api/v1/namespaces/kube-system/services/http:sealed-secrets-controller:/proxy/v1/cert.pem"
        );
    }

    #[test]
    fn test_fetch_error_carries_hint() {
        let err = fetch_error(&controller(), "connection refused");
        let hint = err.hint().unwrap();
        assert!(hint.contains("kubectl proxy"));
        assert!(hint.contains("kube-system/services/sealed-secrets-controller"));
        assert!(err.to_string().contains("connection refused"));
        assert!(err.to_string().contains(hint));
    }

    #[tokio::test]
    async fn test_read_sealing_key_from_stream() {
        let stream = CertificateStream::from_bytes(
            include_str!("../../tests/fixtures/rsa-cert.pem"),
            "kube-system/sealed-secrets-controller",
        );
        let key = read_sealing_key(stream).await.unwrap();
        assert_eq!(key.chain.len(), 1);
    }

    #[tokio::test]
    async fn test_read_sealing_key_parse_failure() {
        let stream = CertificateStream::from_bytes("", "kube-system/sealed-secrets-controller");
        assert!(matches!(
            read_sealing_key(stream).await,
            Err(Error::Parse { resource, .. }) if resource == "kube-system/sealed-secrets-controller"
        ));
    }
}
