//! Kubernetes-backed [`ManifestStore`].

use super::{identity, parse_identity, ManifestStore};
use crate::constants::FIELD_MANAGER;
use crate::error::{Error, Operation, Result};
use crate::seal::SealedSecret;
use async_trait::async_trait;
use kube::api::{Api, DeleteParams, Patch, PatchParams};
use kube::Client;
use tracing::{debug, info};

/// Applies sealed manifests with server-side apply
#[derive(Clone)]
pub struct KubeManifestStore {
    client: Client,
}

impl KubeManifestStore {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api(&self, namespace: &str) -> Api<SealedSecret> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

impl std::fmt::Debug for KubeManifestStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeManifestStore").finish_non_exhaustive()
    }
}

#[async_trait]
impl ManifestStore for KubeManifestStore {
    async fn apply(&self, manifest: &str) -> Result<String> {
        let sealed = SealedSecret::from_manifest(manifest)?;
        let (namespace, name) = (sealed.namespace().to_string(), sealed.name().to_string());
        let resource = format!("{namespace}/{name}");

        let params = PatchParams::apply(FIELD_MANAGER).force();
        self.api(&namespace)
            .patch(&name, &params, &Patch::Apply(&sealed))
            .await
            // The reconciler restamps operation and attempts on exhaustion
            .map_err(|e| Error::Apply {
                operation: Operation::Create,
                resource: resource.clone(),
                attempts: 1,
                message: e.to_string(),
            })?;

        info!(resource = %resource, "Applied sealed secret");
        Ok(identity(&namespace, &name))
    }

    async fn delete(&self, manifest: &str) -> Result<()> {
        let sealed = SealedSecret::from_manifest(manifest)?;
        let resource = format!("{}/{}", sealed.namespace(), sealed.name());

        match self
            .api(sealed.namespace())
            .delete(sealed.name(), &DeleteParams::default())
            .await
        {
            Ok(_) => {
                info!(resource = %resource, "Deleted sealed secret");
                Ok(())
            }
            Err(kube::Error::Api(api_err)) if api_err.code == 404 => {
                debug!(resource = %resource, "Sealed secret already deleted");
                Ok(())
            }
            Err(e) => Err(Error::Delete {
                resource,
                message: e.to_string(),
            }),
        }
    }

    async fn exists(&self, identity: &str) -> Result<bool> {
        let Some((namespace, name)) = parse_identity(identity) else {
            return Err(Error::Read {
                identity: identity.to_string(),
                message: "not a sealed secret identity".into(),
            });
        };

        self.api(namespace)
            .get_opt(name)
            .await
            .map(|found| found.is_some())
            .map_err(|e| Error::Network {
                operation: Operation::Read,
                resource: identity.to_string(),
                message: e.to_string(),
                hint: None,
            })
    }
}
