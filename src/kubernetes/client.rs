//! Kubernetes API client
//!
//! Wraps the kube crate to list pods and expose them as selection candidates.

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use kube::{
    api::{Api, ListParams},
    config::KubeConfigOptions,
    Client, Config,
};
use thiserror::Error;

use super::config::{CredentialSource, KubeConfig, KubeConfigError};

#[derive(Debug, Error)]
pub enum KubeClientError {
    #[error("Failed to create client: {0}")]
    ClientError(#[from] kube::Error),
    #[error("Failed to load config: {0}")]
    ConfigError(#[from] kube::config::KubeconfigError),
    #[error("Failed to load in-cluster config: {0}")]
    InClusterError(#[from] kube::config::InClusterError),
    #[error(transparent)]
    Credentials(#[from] KubeConfigError),
}

/// Coarse pod lifecycle phase
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PodPhase {
    Pending,
    Running,
    Succeeded,
    Failed,
    Unknown,
    /// Anything the cluster reports that is not a core phase
    Other(String),
}

impl From<&str> for PodPhase {
    fn from(phase: &str) -> Self {
        match phase {
            "Pending" => Self::Pending,
            "Running" => Self::Running,
            "Succeeded" => Self::Succeeded,
            "Failed" => Self::Failed,
            "Unknown" => Self::Unknown,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for PodPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => f.write_str("Pending"),
            Self::Running => f.write_str("Running"),
            Self::Succeeded => f.write_str("Succeeded"),
            Self::Failed => f.write_str("Failed"),
            Self::Unknown => f.write_str("Unknown"),
            Self::Other(phase) => f.write_str(phase),
        }
    }
}

/// A pod as observed at selection time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PodCandidate {
    pub name: String,
    pub namespace: String,
    pub labels: BTreeMap<String, String>,
    pub phase: PodPhase,
}

impl PodCandidate {
    pub fn new(name: impl Into<String>, namespace: impl Into<String>, phase: PodPhase) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            labels: BTreeMap::new(),
            phase,
        }
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn is_running(&self) -> bool {
        self.phase == PodPhase::Running
    }
}

impl From<Pod> for PodCandidate {
    fn from(pod: Pod) -> Self {
        let name = pod.metadata.name.unwrap_or_default();
        let namespace = pod.metadata.namespace.unwrap_or_default();
        let labels = pod.metadata.labels.unwrap_or_default();
        let phase = pod
            .status
            .and_then(|s| s.phase)
            .map(|p| PodPhase::from(p.as_str()))
            .unwrap_or(PodPhase::Unknown);

        Self {
            name,
            namespace,
            labels,
            phase,
        }
    }
}

/// Source of pods for selection.
///
/// A successful call with no pods is not an error; only transport and auth
/// failures are.
#[async_trait]
pub trait PodSource: Send + Sync {
    /// List every pod currently in `namespace`
    async fn list_pods(&self, namespace: &str) -> Result<Vec<PodCandidate>, KubeClientError>;
}

/// Kubernetes API client
#[derive(Clone)]
pub struct KubeClient {
    client: Client,
}

impl KubeClient {
    /// Build a client from the given credential source
    pub async fn connect(source: &CredentialSource) -> Result<Self, KubeClientError> {
        let start = std::time::Instant::now();

        let config = match source {
            CredentialSource::InCluster => {
                tracing::debug!("Using in-cluster service account credentials");
                Config::incluster()?
            }
            CredentialSource::Kubeconfig { context } => {
                let kubeconfig = KubeConfig::load_default()?;
                let ctx = kubeconfig.validate(context.as_deref())?;
                tracing::debug!("Using kubeconfig {:?} context {}", kubeconfig.paths, ctx.name);

                let options = KubeConfigOptions {
                    context: Some(ctx.name.clone()),
                    ..Default::default()
                };
                Config::from_kubeconfig(&options).await?
            }
        };

        let client = Client::try_from(config)?;
        tracing::debug!("K8s client created in {:?}", start.elapsed());

        Ok(Self { client })
    }

    /// Get the raw kube client for exec operations
    pub fn inner(&self) -> &Client {
        &self.client
    }
}

#[async_trait]
impl PodSource for KubeClient {
    async fn list_pods(&self, namespace: &str) -> Result<Vec<PodCandidate>, KubeClientError> {
        let start = std::time::Instant::now();
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let list = pods.list(&ListParams::default()).await?;
        tracing::debug!("list_pods({}) API call took {:?}", namespace, start.elapsed());

        Ok(list.items.into_iter().map(PodCandidate::from).collect())
    }
}
