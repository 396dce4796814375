//! Kubernetes integration module
//!
//! Provides credential bootstrap, pod listing, and non-interactive pod exec.

pub mod client;
pub mod config;
pub mod exec;

pub use client::{KubeClient, KubeClientError, PodCandidate, PodPhase, PodSource};
pub use config::{CredentialSource, KubeConfig, KubeConfigError};
pub use exec::{CommandTransport, ExecError, ExecutionOutcome, RawExecution, RemoteExecutor};
