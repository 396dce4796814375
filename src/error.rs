use thiserror::Error;

use crate::config::ConfigError;
use crate::kubernetes::{ExecError, KubeClientError, KubeConfigError};
use crate::labels::LabelError;

/// Process exit code for bad user input
pub const EXIT_INPUT_ERROR: u8 = 2;
/// Process exit code when no pod could be selected
pub const EXIT_NO_SUITABLE_POD: u8 = 3;

/// Errors that end an invocation
#[derive(Debug, Error)]
pub enum PodExecError {
    #[error(transparent)]
    InvalidLabelSelector(#[from] LabelError),

    #[error("Missing required argument: {0}")]
    MissingArgument(&'static str),

    #[error("Credential error: {0}")]
    Credentials(#[from] KubeConfigError),

    #[error("Cluster error: {0}")]
    Cluster(#[source] KubeClientError),

    #[error("No suitable pod found in namespace {namespace} after {attempts} attempts")]
    NoSuitablePod { namespace: String, attempts: u32 },

    #[error("Execution failed: {0}")]
    Exec(#[from] ExecError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl From<KubeClientError> for PodExecError {
    fn from(error: KubeClientError) -> Self {
        match error {
            KubeClientError::Credentials(e) => Self::Credentials(e),
            other => Self::Cluster(other),
        }
    }
}

impl PodExecError {
    /// Process exit code for this failure; always non-zero
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::InvalidLabelSelector(_) | Self::MissingArgument(_) => EXIT_INPUT_ERROR,
            Self::NoSuitablePod { .. } => EXIT_NO_SUITABLE_POD,
            _ => 1,
        }
    }

    /// True when the cluster answered but no pod qualified
    pub fn is_no_suitable_pod(&self) -> bool {
        matches!(self, Self::NoSuitablePod { .. })
    }
}
