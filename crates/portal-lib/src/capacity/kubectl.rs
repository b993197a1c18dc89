//! Node capacity via the `kubectl` command line
//!
//! Runs `kubectl get nodes -o json` and reads
//! `items[].status.allocatable.{cpu,memory}` from the output.

use super::{CapacityError, NodeAllocatable, NodeCapacitySource};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;

#[derive(Deserialize)]
struct NodeList {
    items: Vec<Node>,
}

#[derive(Deserialize)]
struct Node {
    #[serde(default)]
    metadata: NodeMetadata,
    status: NodeStatus,
}

#[derive(Deserialize, Default)]
struct NodeMetadata {
    #[serde(default)]
    name: String,
}

#[derive(Deserialize)]
struct NodeStatus {
    allocatable: Allocatable,
}

#[derive(Deserialize)]
struct Allocatable {
    cpu: RawQuantity,
    memory: RawQuantity,
}

/// Quantities are strings in the API, but tolerate bare JSON numbers
#[derive(Deserialize)]
#[serde(untagged)]
enum RawQuantity {
    Text(String),
    Number(serde_json::Number),
}

impl RawQuantity {
    fn into_string(self) -> String {
        match self {
            RawQuantity::Text(s) => s,
            RawQuantity::Number(n) => n.to_string(),
        }
    }
}

/// Parse the JSON produced by `kubectl get nodes -o json`
pub fn parse_node_list(json: &str) -> Result<Vec<NodeAllocatable>, CapacityError> {
    let list: NodeList = serde_json::from_str(json)?;
    Ok(list
        .items
        .into_iter()
        .map(|node| NodeAllocatable {
            name: node.metadata.name,
            cpu: node.status.allocatable.cpu.into_string(),
            memory: node.status.allocatable.memory.into_string(),
        })
        .collect())
}

/// Lists nodes by running kubectl as a subprocess
#[derive(Debug, Clone)]
pub struct KubectlNodeSource {
    program: PathBuf,
    kubeconfig: Option<PathBuf>,
    context: Option<String>,
}

impl Default for KubectlNodeSource {
    fn default() -> Self {
        Self::new()
    }
}

impl KubectlNodeSource {
    pub fn new() -> Self {
        Self {
            program: PathBuf::from("kubectl"),
            kubeconfig: None,
            context: None,
        }
    }

    /// Use a different kubectl binary (for testing)
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    pub fn with_kubeconfig(mut self, kubeconfig: Option<PathBuf>) -> Self {
        self.kubeconfig = kubeconfig;
        self
    }

    pub fn with_context(mut self, context: Option<String>) -> Self {
        self.context = context;
        self
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        if let Some(kubeconfig) = &self.kubeconfig {
            cmd.arg("--kubeconfig").arg(kubeconfig);
        }
        if let Some(context) = &self.context {
            cmd.arg("--context").arg(context);
        }
        cmd.args(["get", "nodes", "-o", "json"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // the provider's timeout drops this future; take the child with it
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl NodeCapacitySource for KubectlNodeSource {
    async fn allocatable(&self) -> Result<Vec<NodeAllocatable>, CapacityError> {
        let output = self.command().output().await.map_err(|e| {
            CapacityError::Query(format!("failed to run {}: {}", self.program.display(), e))
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CapacityError::Query(format!(
                "kubectl exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_node_list(&stdout)
    }

    fn describe(&self) -> String {
        format!("kubectl ({})", self.program.display())
    }
}
