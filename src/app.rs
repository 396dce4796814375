use rand::Rng;

use crate::error::PodExecError;
use crate::kubernetes::{CommandTransport, ExecutionOutcome, PodSource, RemoteExecutor};
use crate::labels::LabelSelector;
use crate::selector::{PodSelector, RetryPolicy};

/// Everything needed for one select-and-execute cycle
#[derive(Debug, Clone, PartialEq)]
pub struct ExecRequest {
    pub namespace: String,
    pub selector: LabelSelector,
    pub container: String,
    pub command: Vec<String>,
    pub dry_run: bool,
    pub retry: RetryPolicy,
    pub shell: String,
    /// Kubeconfig context, `None` for the current one or in-cluster credentials
    pub context: Option<String>,
}

/// Select a pod for `request` and run its command there.
///
/// Selection retries internally; every other failure is returned as is.
pub async fn run<S, T, R>(
    source: &S,
    transport: &T,
    rng: R,
    request: &ExecRequest,
) -> Result<ExecutionOutcome, PodExecError>
where
    S: PodSource + ?Sized,
    T: CommandTransport + ?Sized,
    R: Rng,
{
    let pod = PodSelector::new(source, rng)
        .select_pod(&request.namespace, &request.selector, request.retry)
        .await?
        .into_pod(&request.namespace)?;

    let outcome = RemoteExecutor::new(transport)
        .with_shell(request.shell.clone())
        .execute(&pod, &request.container, &request.command, request.dry_run)
        .await?;

    Ok(outcome)
}

/// Process exit code for a finished invocation.
///
/// A dry run exits 0. Remote codes outside `0..=255` collapse to 1.
pub fn process_exit_code(outcome: &ExecutionOutcome) -> u8 {
    match outcome.exit_code() {
        None => 0,
        Some(code) => u8::try_from(code).unwrap_or(1),
    }
}
