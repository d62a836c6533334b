use std::fmt::Debug;

use anyhow::Result;
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, ReplicaSet, StatefulSet};
use k8s_openapi::api::batch::v1::{CronJob, Job};
use k8s_openapi::api::core::v1::{Pod, Service};
use k8s_openapi::NamespaceResourceScope;
use kube::api::{Api, ListParams};
use kube::{Client, Resource};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::expiry::ClusterObject;

/// Where to look for expiry-annotated objects.
#[derive(Debug, Clone)]
pub enum Scope {
    Namespace(String),
    AllNamespaces,
}

/// Snapshot the workload kinds helm manages, flattened to name plus
/// annotations. Any list error is fatal to the run.
pub async fn fetch_inventory(client: Client, scope: &Scope) -> Result<Vec<ClusterObject>> {
    let mut objects = Vec::new();

    list_kind::<Pod>(client.clone(), scope, &mut objects).await?;
    list_kind::<Service>(client.clone(), scope, &mut objects).await?;
    list_kind::<Deployment>(client.clone(), scope, &mut objects).await?;
    list_kind::<ReplicaSet>(client.clone(), scope, &mut objects).await?;
    list_kind::<StatefulSet>(client.clone(), scope, &mut objects).await?;
    list_kind::<DaemonSet>(client.clone(), scope, &mut objects).await?;
    list_kind::<Job>(client.clone(), scope, &mut objects).await?;
    list_kind::<CronJob>(client, scope, &mut objects).await?;

    Ok(objects)
}

// Only the metadata is fetched; annotations are all the scanner reads.
async fn list_kind<K>(client: Client, scope: &Scope, objects: &mut Vec<ClusterObject>) -> Result<()>
where
    K: Resource<DynamicType = (), Scope = NamespaceResourceScope>
        + Clone
        + DeserializeOwned
        + Debug,
{
    let api: Api<K> = match scope {
        Scope::Namespace(ns) => Api::namespaced(client, ns),
        Scope::AllNamespaces => Api::all(client),
    };

    let list = api.list_metadata(&ListParams::default()).await?;
    debug!(kind = %K::kind(&()), count = list.items.len(), "listed objects");

    for item in list.items {
        objects.push(ClusterObject {
            name: item.metadata.name.unwrap_or_default(),
            annotations: item.metadata.annotations.unwrap_or_default(),
        });
    }

    Ok(())
}
