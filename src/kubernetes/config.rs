//! Cluster credential bootstrap
//!
//! Decides between in-cluster service account credentials and a kubeconfig
//! context, and inspects kubeconfig files so that a missing context, cluster
//! or user is reported precisely.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Service account token mounted into every pod by default
pub const SERVICE_ACCOUNT_TOKEN_FILE: &str = "/var/run/secrets/kubernetes.io/serviceaccount/token";
/// CA bundle mounted next to the service account token
pub const SERVICE_ACCOUNT_CA_FILE: &str = "/var/run/secrets/kubernetes.io/serviceaccount/ca.crt";

#[derive(Debug, Error)]
pub enum KubeConfigError {
    #[error("Failed to read kubeconfig: {0}")]
    ReadError(#[from] std::io::Error),
    #[error("Failed to parse kubeconfig: {0}")]
    ParseError(String),
    #[error("Context not found: {0}")]
    ContextNotFound(String),
    #[error("Cluster not found: {0}")]
    ClusterNotFound(String),
    #[error("User not found: {0}")]
    UserNotFound(String),
    #[error("Kubeconfig has no current context and none was given")]
    NoCurrentContext,
    #[error("No kubeconfig found")]
    NotFound,
}

/// Where cluster credentials come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSource {
    /// Service account token + CA certificate mounted into the pod
    InCluster,
    /// A kubeconfig file, optionally pinned to a named context
    Kubeconfig { context: Option<String> },
}

impl CredentialSource {
    /// Pick in-cluster credentials when the service account token and CA are readable
    pub fn detect(context: Option<String>) -> Self {
        Self::detect_with(
            Path::new(SERVICE_ACCOUNT_TOKEN_FILE),
            Path::new(SERVICE_ACCOUNT_CA_FILE),
            context,
        )
    }

    pub fn detect_with(token_path: &Path, ca_path: &Path, context: Option<String>) -> Self {
        let readable = |p: &Path| std::fs::File::open(p).is_ok();
        // An explicit context always means the caller wants their kubeconfig
        if context.is_none() && readable(token_path) && readable(ca_path) {
            Self::InCluster
        } else {
            Self::Kubeconfig { context }
        }
    }
}

/// A context entry from kubeconfig
#[derive(Debug, Clone)]
pub struct KubeContext {
    pub name: String,
    pub cluster: String,
    pub user: String,
    pub namespace: Option<String>,
}

/// Parsed kubeconfig, limited to what is needed to validate a context
///
/// May be the merge of several files, in which case the first file to define
/// a name (or a non-empty current context) wins.
#[derive(Debug, Clone, Default)]
pub struct KubeConfig {
    pub paths: Vec<PathBuf>,
    pub current_context: Option<String>,
    pub contexts: Vec<KubeContext>,
    pub clusters: Vec<String>,
    pub users: Vec<String>,
}

impl KubeConfig {
    /// Load and merge kubeconfig from the default locations
    pub fn load_default() -> Result<Self, KubeConfigError> {
        Self::load_merged(&Self::default_paths()?)
    }

    /// Resolve every existing `$KUBECONFIG` entry, or `~/.kube/config`
    pub fn default_paths() -> Result<Vec<PathBuf>, KubeConfigError> {
        if let Some(kubeconfig) = std::env::var_os("KUBECONFIG").filter(|v| !v.is_empty()) {
            let paths: Vec<PathBuf> = std::env::split_paths(&kubeconfig)
                .filter(|p| !p.as_os_str().is_empty() && p.exists())
                .collect();
            if !paths.is_empty() {
                return Ok(paths);
            }
        }

        let home = dirs::home_dir().ok_or(KubeConfigError::NotFound)?;
        let path = home.join(".kube").join("config");
        if path.exists() {
            Ok(vec![path])
        } else {
            Err(KubeConfigError::NotFound)
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, KubeConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content, path.to_path_buf())
    }

    /// Load each file in order and fold them into one view
    pub fn load_merged(paths: &[PathBuf]) -> Result<Self, KubeConfigError> {
        if paths.is_empty() {
            return Err(KubeConfigError::NotFound);
        }
        let mut merged = Self::default();
        for path in paths {
            merged.merge(Self::load_from(path)?);
        }
        Ok(merged)
    }

    fn merge(&mut self, other: Self) {
        self.paths.extend(other.paths);
        if self.current_context.is_none() {
            self.current_context = other.current_context;
        }
        for ctx in other.contexts {
            if self.get_context(&ctx.name).is_none() {
                self.contexts.push(ctx);
            }
        }
        for cluster in other.clusters {
            if !self.has_cluster(&cluster) {
                self.clusters.push(cluster);
            }
        }
        for user in other.users {
            if !self.has_user(&user) {
                self.users.push(user);
            }
        }
    }

    fn parse(content: &str, path: PathBuf) -> Result<Self, KubeConfigError> {
        let yaml: serde_json::Value = serde_yaml_ng::from_str(content)
            .map_err(|e| KubeConfigError::ParseError(e.to_string()))?;

        let current_context = yaml
            .get("current-context")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(String::from);

        let names = |section: &str| -> Vec<String> {
            yaml.get(section)
                .and_then(|v| v.as_array())
                .map(|list| {
                    list.iter()
                        .filter_map(|entry| entry.get("name").and_then(|v| v.as_str()))
                        .map(String::from)
                        .collect()
                })
                .unwrap_or_default()
        };

        let mut contexts = Vec::new();
        if let Some(context_list) = yaml.get("contexts").and_then(|v| v.as_array()) {
            for context in context_list {
                if let (Some(name), Some(context_data)) = (
                    context.get("name").and_then(|v| v.as_str()),
                    context.get("context"),
                ) {
                    let field = |key: &str| {
                        context_data
                            .get(key)
                            .and_then(|v| v.as_str())
                            .unwrap_or("")
                            .to_string()
                    };
                    contexts.push(KubeContext {
                        name: name.to_string(),
                        cluster: field("cluster"),
                        user: field("user"),
                        namespace: context_data
                            .get("namespace")
                            .and_then(|v| v.as_str())
                            .map(String::from),
                    });
                }
            }
        }

        Ok(Self {
            paths: vec![path],
            current_context,
            contexts,
            clusters: names("clusters"),
            users: names("users"),
        })
    }

    pub fn get_context(&self, name: &str) -> Option<&KubeContext> {
        self.contexts.iter().find(|c| c.name == name)
    }

    pub fn has_cluster(&self, name: &str) -> bool {
        self.clusters.iter().any(|c| c == name)
    }

    pub fn has_user(&self, name: &str) -> bool {
        self.users.iter().any(|u| u == name)
    }

    /// Check that the requested (or current) context resolves to a cluster and a user
    pub fn validate(&self, context: Option<&str>) -> Result<&KubeContext, KubeConfigError> {
        let name = context
            .or(self.current_context.as_deref())
            .ok_or(KubeConfigError::NoCurrentContext)?;

        let ctx = self
            .get_context(name)
            .ok_or_else(|| KubeConfigError::ContextNotFound(name.to_string()))?;

        if !self.has_cluster(&ctx.cluster) {
            return Err(KubeConfigError::ClusterNotFound(ctx.cluster.clone()));
        }
        if !self.has_user(&ctx.user) {
            return Err(KubeConfigError::UserNotFound(ctx.user.clone()));
        }

        Ok(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const KUBECONFIG: &str = r#"
apiVersion: v1
kind: Config
current-context: minikube
clusters:
- name: minikube
  cluster:
    server: https://192.168.49.2:8443
- name: production
  cluster:
    server: https://k8s.example.com:6443
contexts:
- name: minikube
  context:
    cluster: minikube
    user: minikube
    namespace: default
- name: production
  context:
    cluster: production
    user: admin
- name: orphan
  context:
    cluster: gone
    user: minikube
users:
- name: minikube
  user:
    token: abc
"#;

    fn parsed() -> KubeConfig {
        KubeConfig::parse(KUBECONFIG, PathBuf::from("/test/config")).unwrap()
    }

    #[test]
    fn test_parse_kubeconfig() {
        let config = parsed();
        assert_eq!(config.current_context, Some("minikube".to_string()));
        assert_eq!(config.contexts.len(), 3);
        assert_eq!(config.clusters, vec!["minikube".to_string(), "production".to_string()]);
        assert_eq!(config.users, vec!["minikube".to_string()]);
        assert!(config.has_cluster("production"));
        assert!(!config.has_cluster("gone"));
    }

    #[test]
    fn test_validate_current_context() {
        let config = parsed();
        let ctx = config.validate(None).unwrap();
        assert_eq!(ctx.name, "minikube");
        assert_eq!(ctx.namespace.as_deref(), Some("default"));
    }

    #[test]
    fn test_validate_missing_context() {
        let err = parsed().validate(Some("staging")).unwrap_err();
        assert!(matches!(err, KubeConfigError::ContextNotFound(name) if name == "staging"));
    }

    #[test]
    fn test_validate_missing_cluster() {
        let err = parsed().validate(Some("orphan")).unwrap_err();
        assert!(matches!(err, KubeConfigError::ClusterNotFound(name) if name == "gone"));
    }

    #[test]
    fn test_validate_missing_user() {
        let err = parsed().validate(Some("production")).unwrap_err();
        assert!(matches!(err, KubeConfigError::UserNotFound(name) if name == "admin"));
    }

    #[test]
    fn test_validate_without_current_context() {
        let config = KubeConfig::parse("apiVersion: v1\nkind: Config\n", PathBuf::from("/x")).unwrap();
        assert!(matches!(config.validate(None), Err(KubeConfigError::NoCurrentContext)));
    }

    #[test]
    fn test_parse_garbage() {
        let err = KubeConfig::parse("clusters: [unclosed", PathBuf::from("/x")).unwrap_err();
        assert!(matches!(err, KubeConfigError::ParseError(_)));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config");
        std::fs::write(&path, KUBECONFIG).unwrap();

        let config = KubeConfig::load_from(&path).unwrap();
        assert_eq!(config.paths, vec![path]);
        assert!(config.get_context("production").is_some());
    }

    const PROD_KUBECONFIG: &str = r#"
apiVersion: v1
kind: Config
current-context: prod
clusters:
- name: prod
  cluster:
    server: https://prod.example.com:6443
contexts:
- name: prod
  context:
    cluster: prod
    user: deployer
- name: minikube
  context:
    cluster: prod
    user: deployer
users:
- name: deployer
  user:
    token: xyz
"#;

    fn split_kubeconfig() -> (tempfile::TempDir, Vec<PathBuf>) {
        let dir = tempdir().unwrap();
        let first = dir.path().join("a");
        let second = dir.path().join("b");
        std::fs::write(&first, KUBECONFIG).unwrap();
        std::fs::write(&second, PROD_KUBECONFIG).unwrap();
        (dir, vec![first, second])
    }

    #[test]
    fn test_context_from_later_file_resolves() {
        let (_dir, paths) = split_kubeconfig();
        let config = KubeConfig::load_merged(&paths).unwrap();

        let ctx = config.validate(Some("prod")).unwrap();
        assert_eq!(ctx.cluster, "prod");
        assert_eq!(ctx.user, "deployer");
        assert_eq!(config.paths, paths);
    }

    #[test]
    fn test_first_file_wins_on_merge() {
        let (_dir, paths) = split_kubeconfig();
        let config = KubeConfig::load_merged(&paths).unwrap();

        assert_eq!(config.current_context.as_deref(), Some("minikube"));
        let ctx = config.validate(None).unwrap();
        assert_eq!(ctx.cluster, "minikube");
        assert_eq!(config.contexts.len(), 4);
    }

    #[test]
    fn test_empty_current_context_defers_to_later_file() {
        let dir = tempdir().unwrap();
        let first = dir.path().join("a");
        let second = dir.path().join("b");
        std::fs::write(&first, "apiVersion: v1\nkind: Config\ncurrent-context: \"\"\n").unwrap();
        std::fs::write(&second, PROD_KUBECONFIG).unwrap();

        let config = KubeConfig::load_merged(&[first, second]).unwrap();
        assert_eq!(config.validate(None).unwrap().name, "prod");
    }

    #[test]
    fn test_load_merged_without_files() {
        assert!(matches!(KubeConfig::load_merged(&[]), Err(KubeConfigError::NotFound)));
    }

    fn service_account_dir() -> (tempfile::TempDir, PathBuf, PathBuf) {
        let dir = tempdir().unwrap();
        let token = dir.path().join("token");
        let ca = dir.path().join("ca.crt");
        std::fs::write(&token, "secret").unwrap();
        std::fs::write(&ca, "-----BEGIN CERTIFICATE-----").unwrap();
        (dir, token, ca)
    }

    #[test]
    fn test_detect_in_cluster_when_token_readable() {
        let (_dir, token, ca) = service_account_dir();
        assert_eq!(CredentialSource::detect_with(&token, &ca, None), CredentialSource::InCluster);
    }

    #[test]
    fn test_detect_kubeconfig_when_token_missing() {
        let (_dir, token, ca) = service_account_dir();
        std::fs::remove_file(&token).unwrap();

        assert_eq!(
            CredentialSource::detect_with(&token, &ca, None),
            CredentialSource::Kubeconfig { context: None }
        );
    }

    #[test]
    fn test_detect_kubeconfig_when_ca_missing() {
        let (_dir, token, ca) = service_account_dir();
        std::fs::remove_file(&ca).unwrap();

        assert_eq!(
            CredentialSource::detect_with(&token, &ca, None),
            CredentialSource::Kubeconfig { context: None }
        );
    }

    #[test]
    fn test_explicit_context_prefers_kubeconfig() {
        let (_dir, token, ca) = service_account_dir();

        assert_eq!(
            CredentialSource::detect_with(&token, &ca, Some("prod".to_string())),
            CredentialSource::Kubeconfig {
                context: Some("prod".to_string())
            }
        );
    }
}
