//! Kubernetes pod exec functionality
//!
//! Runs a non-interactive command in a pod container over the kube websocket
//! exec channel and captures its exit status and both output streams.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Status;
use kube::api::{Api, AttachParams};
use thiserror::Error;
use time::OffsetDateTime;
use tokio::io::{AsyncRead, AsyncReadExt};

use super::client::{KubeClient, PodCandidate};

/// Shell used to interpret the joined command string
pub const DEFAULT_SHELL: &str = "/bin/sh";

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("Kube error: {0}")]
    KubeError(#[from] kube::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Pod not found: {0}/{1}")]
    PodNotFound(String, String),
    #[error("Remote command error: {0}")]
    RemoteCommandError(String),
    #[error("Remote command ended without reporting an exit status")]
    MissingStatus,
}

/// Exit code and captured output of a finished remote process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawExecution {
    pub exit_code: i32,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

/// Transport that runs a command inside a pod container.
///
/// A non-zero exit code is a successful call; `Err` is reserved for failures
/// to establish or complete the channel.
#[async_trait]
pub trait CommandTransport: Send + Sync {
    async fn exec(
        &self,
        pod: &PodCandidate,
        container: &str,
        argv: Vec<String>,
    ) -> Result<RawExecution, ExecError>;
}

/// Result of one invocation of [`RemoteExecutor::execute`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    /// The command ran to completion on the pod
    Completed {
        pod: PodCandidate,
        command: String,
        exit_code: i32,
        stdout: Vec<u8>,
        stderr: Vec<u8>,
        /// Wall clock time at dispatch
        started_at: OffsetDateTime,
        elapsed: Duration,
    },
    /// Nothing was dispatched
    DryRun { pod: PodCandidate, command: String },
}

impl ExecutionOutcome {
    pub fn pod(&self) -> &PodCandidate {
        match self {
            Self::Completed { pod, .. } | Self::DryRun { pod, .. } => pod,
        }
    }

    pub fn command(&self) -> &str {
        match self {
            Self::Completed { command, .. } | Self::DryRun { command, .. } => command,
        }
    }

    /// Remote exit code, `None` for a dry run
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::Completed { exit_code, .. } => Some(*exit_code),
            Self::DryRun { .. } => None,
        }
    }

    pub fn is_dry_run(&self) -> bool {
        matches!(self, Self::DryRun { .. })
    }
}

/// Join command tokens into the single string handed to the shell
pub fn join_command<S: AsRef<str>>(tokens: &[S]) -> String {
    tokens
        .iter()
        .map(|t| t.as_ref())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Runs commands on a selected pod through a [`CommandTransport`]
pub struct RemoteExecutor<'a, T: ?Sized> {
    transport: &'a T,
    shell: String,
}

impl<'a, T: CommandTransport + ?Sized> RemoteExecutor<'a, T> {
    pub fn new(transport: &'a T) -> Self {
        Self {
            transport,
            shell: DEFAULT_SHELL.to_string(),
        }
    }

    pub fn with_shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = shell.into();
        self
    }

    pub async fn execute<S: AsRef<str>>(
        &self,
        pod: &PodCandidate,
        container: &str,
        command: &[S],
        dry_run: bool,
    ) -> Result<ExecutionOutcome, ExecError> {
        let command = join_command(command);

        if dry_run {
            tracing::info!("Dry run, not executing on pod {}: {}", pod.name, command);
            return Ok(ExecutionOutcome::DryRun {
                pod: pod.clone(),
                command,
            });
        }

        let argv = vec![self.shell.clone(), "-c".to_string(), command.clone()];
        tracing::info!("Running on {}/{} [{}]: {}", pod.namespace, pod.name, container, command);

        let started_at = OffsetDateTime::now_utc();
        let start = Instant::now();
        let raw = self.transport.exec(pod, container, argv).await?;
        let elapsed = start.elapsed();
        tracing::debug!("Remote command finished with {} in {:?}", raw.exit_code, elapsed);

        Ok(ExecutionOutcome::Completed {
            pod: pod.clone(),
            command,
            exit_code: raw.exit_code,
            stdout: raw.stdout,
            stderr: raw.stderr,
            started_at,
            elapsed,
        })
    }
}

/// Map the exec channel's terminal status object to an exit code
pub fn exit_code_from_status(status: &Status) -> Result<i32, ExecError> {
    if status.status.as_deref() == Some("Success") {
        return Ok(0);
    }

    let exit_code = status
        .details
        .as_ref()
        .and_then(|d| d.causes.as_ref())
        .and_then(|causes| {
            causes
                .iter()
                .find(|c| c.reason.as_deref() == Some("ExitCode"))
        })
        .and_then(|c| c.message.as_deref())
        .and_then(|m| m.trim().parse::<i32>().ok());

    match (status.reason.as_deref(), exit_code) {
        (Some("NonZeroExitCode"), Some(code)) => Ok(code),
        _ => Err(ExecError::RemoteCommandError(
            status
                .message
                .clone()
                .unwrap_or_else(|| "unknown failure".to_string()),
        )),
    }
}

async fn drain<R: AsyncRead + Unpin>(reader: Option<R>) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    if let Some(mut reader) = reader {
        reader.read_to_end(&mut buf).await?;
    }
    Ok(buf)
}

#[async_trait]
impl CommandTransport for KubeClient {
    async fn exec(
        &self,
        pod: &PodCandidate,
        container: &str,
        argv: Vec<String>,
    ) -> Result<RawExecution, ExecError> {
        let pods: Api<Pod> = Api::namespaced(self.inner().clone(), &pod.namespace);

        let attach_params = AttachParams::default()
            .container(container)
            .stdin(false)
            .stdout(true)
            .stderr(true)
            .tty(false);

        let mut attached = pods.exec(&pod.name, argv, &attach_params).await.map_err(|e| match e {
            kube::Error::Api(ref err) if err.code == 404 => {
                ExecError::PodNotFound(pod.namespace.clone(), pod.name.clone())
            }
            other => ExecError::KubeError(other),
        })?;

        let status = attached.take_status();
        let (stdout, stderr) = tokio::try_join!(drain(attached.stdout()), drain(attached.stderr()))?;

        let status = match status {
            Some(status) => status.await,
            None => None,
        };

        attached
            .join()
            .await
            .map_err(|e| ExecError::RemoteCommandError(e.to_string()))?;

        let exit_code = exit_code_from_status(&status.ok_or(ExecError::MissingStatus)?)?;

        Ok(RawExecution {
            exit_code,
            stdout,
            stderr,
        })
    }
}
