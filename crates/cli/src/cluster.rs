//! Cluster capacity sources available to the CLI

use async_trait::async_trait;
use clap::ValueEnum;
use k8s_openapi::api::core::v1::Node;
use kube::api::{Api, ListParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use portal_lib::{
    CapacityError, CapacityProvider, KubectlNodeSource, NodeAllocatable, NodeCapacitySource,
    PolicyConfig,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// Where node capacity is read from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CapacitySource {
    /// Kubernetes API via kubeconfig or in-cluster credentials
    #[default]
    Api,
    /// `kubectl get nodes -o json`
    Kubectl,
    /// Skip the cluster and size against the fallback capacity
    Offline,
}

/// Lists nodes through the Kubernetes API
pub struct KubeApiNodeSource {
    kubeconfig: Option<PathBuf>,
    context: Option<String>,
}

impl KubeApiNodeSource {
    pub fn new(kubeconfig: Option<PathBuf>, context: Option<String>) -> Self {
        Self { kubeconfig, context }
    }

    async fn client(&self) -> Result<Client, CapacityError> {
        let options = KubeConfigOptions {
            context: self.context.clone(),
            ..Default::default()
        };

        let config = match &self.kubeconfig {
            Some(path) => {
                let kubeconfig = Kubeconfig::read_from(path).map_err(|e| {
                    CapacityError::Query(format!("failed to read kubeconfig {}: {}", path.display(), e))
                })?;
                Config::from_custom_kubeconfig(kubeconfig, &options)
                    .await
                    .map_err(|e| CapacityError::Query(format!("invalid kubeconfig: {}", e)))?
            }
            None if self.context.is_some() => Config::from_kubeconfig(&options)
                .await
                .map_err(|e| CapacityError::Query(format!("invalid kubeconfig: {}", e)))?,
            None => Config::infer()
                .await
                .map_err(|e| CapacityError::Query(format!("no cluster configuration: {}", e)))?,
        };

        Client::try_from(config)
            .map_err(|e| CapacityError::Query(format!("failed to create client: {}", e)))
    }
}

/// Extract allocatable CPU and memory from a node object
pub fn node_allocatable(node: Node) -> Result<NodeAllocatable, CapacityError> {
    let name = node.metadata.name.unwrap_or_default();
    let allocatable = node
        .status
        .and_then(|status| status.allocatable)
        .unwrap_or_default();

    let quantity = |key: &str| {
        allocatable
            .get(key)
            .map(|q| q.0.clone())
            .ok_or_else(|| CapacityError::Query(format!("node '{}' reports no allocatable {}", name, key)))
    };
    let cpu = quantity("cpu")?;
    let memory = quantity("memory")?;

    Ok(NodeAllocatable { name, cpu, memory })
}

#[async_trait]
impl NodeCapacitySource for KubeApiNodeSource {
    async fn allocatable(&self) -> Result<Vec<NodeAllocatable>, CapacityError> {
        let nodes: Api<Node> = Api::all(self.client().await?);
        let list = nodes
            .list(&ListParams::default())
            .await
            .map_err(|e| CapacityError::Query(format!("failed to list nodes: {}", e)))?;
        debug!(nodes = list.items.len(), "Listed cluster nodes");

        list.items.into_iter().map(node_allocatable).collect()
    }

    fn describe(&self) -> String {
        match &self.kubeconfig {
            Some(path) => format!("kubernetes api ({})", path.display()),
            None => "kubernetes api (inferred)".to_string(),
        }
    }
}

/// Never queries a cluster; every snapshot degrades to the fallback capacity
pub struct OfflineNodeSource;

#[async_trait]
impl NodeCapacitySource for OfflineNodeSource {
    async fn allocatable(&self) -> Result<Vec<NodeAllocatable>, CapacityError> {
        Err(CapacityError::Query("offline mode, cluster not queried".to_string()))
    }

    fn describe(&self) -> String {
        "offline".to_string()
    }
}

/// Build the capacity provider for the selected source
pub fn capacity_provider(
    source: CapacitySource,
    kubeconfig: Option<PathBuf>,
    context: Option<String>,
    policy: &PolicyConfig,
) -> CapacityProvider {
    let source: Arc<dyn NodeCapacitySource> = match source {
        CapacitySource::Api => Arc::new(KubeApiNodeSource::new(kubeconfig, context)),
        CapacitySource::Kubectl => Arc::new(
            KubectlNodeSource::new()
                .with_kubeconfig(kubeconfig)
                .with_context(context),
        ),
        CapacitySource::Offline => Arc::new(OfflineNodeSource),
    };
    CapacityProvider::from_policy(source, policy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::NodeStatus;
    use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use std::collections::BTreeMap;

    fn node(name: &str, allocatable: &[(&str, &str)]) -> Node {
        Node {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                ..Default::default()
            },
            status: Some(NodeStatus {
                allocatable: Some(
                    allocatable
                        .iter()
                        .map(|(k, v)| (k.to_string(), Quantity(v.to_string())))
                        .collect::<BTreeMap<_, _>>(),
                ),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_node_allocatable() {
        let parsed = node_allocatable(node("worker-1", &[("cpu", "3920m"), ("memory", "15883332Ki")])).unwrap();
        assert_eq!(parsed, NodeAllocatable::new("worker-1", "3920m", "15883332Ki"));
    }

    #[test]
    fn test_node_without_memory_is_query_error() {
        let err = node_allocatable(node("worker-1", &[("cpu", "4")])).unwrap_err();
        assert!(matches!(err, CapacityError::Query(msg) if msg.contains("memory")));
    }

    #[tokio::test]
    async fn test_offline_source_uses_fallback() {
        let policy = PolicyConfig::default();
        let provider = capacity_provider(CapacitySource::Offline, None, None, &policy);
        let snapshot = provider.snapshot().await.unwrap();
        assert!(snapshot.is_degraded());
        assert_eq!(snapshot.capacity, policy.fallback_capacity);
        assert!(snapshot.degraded_reason().unwrap().contains("offline"));
    }
}
