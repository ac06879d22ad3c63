//! Common test utilities for reconciler integration tests
//!
//! In-memory fakes of the certificate fetcher and manifest store, plus the
//! static PEM fixtures they serve.

#![allow(dead_code, reason = "each test binary uses a different subset")]

use async_trait::async_trait;
use rsa::pkcs8::DecodePrivateKey;
use rsa::RsaPrivateKey;
use sealed_secret_reconciler::seal::{CertificateFetcher, CertificateStream, SealedSecret};
use sealed_secret_reconciler::store::{identity, ManifestStore};
use sealed_secret_reconciler::{
    ControllerIdentity, Error, Operation, ReconcilerConfig, Result, SecretSpec,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

pub const RSA_CERT: &str = include_str!("../fixtures/rsa-cert.pem");
pub const RSA_KEY: &str = include_str!("../fixtures/rsa-key.pem");
pub const EC_CERT: &str = include_str!("../fixtures/ec-cert.pem");

pub fn private_key() -> RsaPrivateKey {
    RsaPrivateKey::from_pkcs8_pem(RSA_KEY).expect("fixture key should parse")
}

/// `db` in `app` holding one password
pub fn db_spec() -> SecretSpec {
    let mut spec = SecretSpec::new("db", "app");
    spec.data.insert("password".into(), "s3cr3t".into());
    spec
}

/// `db` in `app` with no values
pub fn db_spec_without_data() -> SecretSpec {
    SecretSpec::new("db", "app")
}

/// Configuration with retries disabled
pub fn config() -> ReconcilerConfig {
    ReconcilerConfig::default()
}

/// Serves a fixed PEM document and counts requests
#[derive(Debug)]
pub struct FakeFetcher {
    pem: String,
    pub calls: AtomicU32,
    pub controllers: Mutex<Vec<ControllerIdentity>>,
}

impl FakeFetcher {
    pub fn new(pem: &str) -> Self {
        Self {
            pem: pem.to_string(),
            calls: AtomicU32::new(0),
            controllers: Mutex::new(Vec::new()),
        }
    }

    pub fn rsa() -> Self {
        Self::new(RSA_CERT)
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CertificateFetcher for FakeFetcher {
    async fn fetch(&self, controller: &ControllerIdentity) -> Result<CertificateStream> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.controllers
            .lock()
            .expect("controllers lock")
            .push(controller.clone());
        Ok(CertificateStream::from_bytes(
            self.pem.clone(),
            format!("{}/{}", controller.namespace, controller.name),
        ))
    }
}

/// Never answers; every fetch outlives any sane timeout
#[derive(Debug, Default)]
pub struct HangingFetcher {
    pub calls: AtomicU32,
}

#[async_trait]
impl CertificateFetcher for HangingFetcher {
    async fn fetch(&self, _controller: &ControllerIdentity) -> Result<CertificateStream> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Err(Error::Network {
            operation: Operation::Seal,
            resource: "unreachable".into(),
            message: "hung fetch returned".into(),
            hint: None,
        })
    }
}

/// In-memory store keyed by identity
#[derive(Debug, Default)]
pub struct FakeStore {
    pub objects: Mutex<HashMap<String, String>>,
    pub apply_calls: AtomicU32,
    pub delete_calls: AtomicU32,
    pub exists_calls: AtomicU32,
    /// Number of leading apply attempts that fail
    pub failing_applies: AtomicU32,
    /// Fail every `exists` call with a transport error
    pub exists_unreachable: AtomicBool,
    /// Number of leading delete calls that fail
    pub failing_deletes: AtomicU32,
    pub apply_times: Mutex<Vec<Instant>>,
}

impl FakeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_first(applies: u32) -> Self {
        let store = Self::default();
        store.failing_applies.store(applies, Ordering::SeqCst);
        store
    }

    pub fn network_calls(&self) -> u32 {
        self.apply_calls.load(Ordering::SeqCst)
            + self.delete_calls.load(Ordering::SeqCst)
            + self.exists_calls.load(Ordering::SeqCst)
    }

    /// Simulate the object being removed behind the reconciler's back
    pub fn remove(&self, identity: &str) {
        self.objects.lock().expect("objects lock").remove(identity);
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.objects
            .lock()
            .expect("objects lock")
            .contains_key(identity)
    }
}

#[async_trait]
impl ManifestStore for FakeStore {
    async fn apply(&self, manifest: &str) -> Result<String> {
        let attempt = self.apply_calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.apply_times
            .lock()
            .expect("apply_times lock")
            .push(Instant::now());

        let sealed = SealedSecret::from_manifest(manifest)?;
        if attempt <= self.failing_applies.load(Ordering::SeqCst) {
            return Err(Error::Apply {
                operation: Operation::Create,
                resource: format!("{}/{}", sealed.namespace(), sealed.name()),
                attempts: 1,
                message: format!("transient failure on attempt {attempt}"),
            });
        }

        let id = identity(sealed.namespace(), sealed.name());
        self.objects
            .lock()
            .expect("objects lock")
            .insert(id.clone(), manifest.to_string());
        Ok(id)
    }

    async fn delete(&self, manifest: &str) -> Result<()> {
        let attempt = self.delete_calls.fetch_add(1, Ordering::SeqCst) + 1;
        let sealed = SealedSecret::from_manifest(manifest)?;
        if attempt <= self.failing_deletes.load(Ordering::SeqCst) {
            return Err(Error::Delete {
                resource: format!("{}/{}", sealed.namespace(), sealed.name()),
                message: "the server is currently unable to handle the request".into(),
            });
        }
        self.remove(&identity(sealed.namespace(), sealed.name()));
        Ok(())
    }

    async fn exists(&self, id: &str) -> Result<bool> {
        self.exists_calls.fetch_add(1, Ordering::SeqCst);
        if self.exists_unreachable.load(Ordering::SeqCst) {
            return Err(Error::Network {
                operation: Operation::Read,
                resource: id.to_string(),
                message: "connection refused".into(),
                hint: None,
            });
        }
        Ok(self.contains(id))
    }
}
