mod helm;
mod inventory;

pub use inventory::Scope;

use anyhow::Result;
use async_trait::async_trait;
use kube::Client;

use crate::expiry::ClusterObject;

/// The two external tools this binary drives: the cluster inventory and
/// the helm release manager. Behind a trait so the cleanup orchestrator
/// can be tested without a live cluster.
#[async_trait]
pub trait ClusterTools {
    async fn fetch_inventory(&self, scope: &Scope) -> Result<Vec<ClusterObject>>;
    async fn uninstall_release(&self, name: &str, namespace: &str) -> Result<String>;
}

/// Production implementation: kube API for the inventory, a `helm`
/// subprocess for uninstalls.
pub struct KubeHelm {
    client: Client,
}

impl KubeHelm {
    pub async fn connect() -> Result<Self> {
        Ok(Self {
            client: Client::try_default().await?,
        })
    }
}

#[async_trait]
impl ClusterTools for KubeHelm {
    async fn fetch_inventory(&self, scope: &Scope) -> Result<Vec<ClusterObject>> {
        inventory::fetch_inventory(self.client.clone(), scope).await
    }

    async fn uninstall_release(&self, name: &str, namespace: &str) -> Result<String> {
        helm::uninstall_release(name, namespace).await
    }
}
