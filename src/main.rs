use std::process::ExitCode;

use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use podexec::kubernetes::{CredentialSource, ExecutionOutcome, KubeClient};
use podexec::{report, Args, PodExecError};

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging; stdout is reserved for command output
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .is_err()
    {
        tracing::debug!("TLS crypto provider already installed");
    }

    let args = Args::parse();

    match execute(args).await {
        Ok(outcome) => {
            if let Err(e) = report::render_outcome(&mut std::io::stdout().lock(), &outcome) {
                tracing::error!("Failed to write output: {}", e);
            }
            ExitCode::from(podexec::process_exit_code(&outcome))
        }
        Err(e) => {
            let _ = report::render_error(&mut std::io::stderr().lock(), &e);
            ExitCode::from(e.exit_code())
        }
    }
}

async fn execute(args: Args) -> Result<ExecutionOutcome, PodExecError> {
    let settings = args.load_settings()?;
    let request = args.into_request(settings)?;

    let source = CredentialSource::detect(request.context.clone());
    let client = KubeClient::connect(&source).await?;

    podexec::run(&client, &client, StdRng::from_entropy(), &request).await
}
