//! Human readable output
//!
//! Renders execution outcomes and failures for a terminal.

use std::io::{self, Write};

use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::error::PodExecError;
use crate::kubernetes::ExecutionOutcome;

fn section<W: Write>(out: &mut W, title: &str, body: &[u8]) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "{}", title)?;
    writeln!(out, "{}", "-".repeat(title.len()))?;
    out.write_all(body)?;
    if !body.is_empty() && !body.ends_with(b"\n") {
        writeln!(out)?;
    }
    Ok(())
}

/// RFC 3339 at whole-second precision
fn stamp(at: OffsetDateTime) -> String {
    let at = at.replace_nanosecond(0).unwrap_or(at);
    at.format(&Rfc3339).unwrap_or_else(|_| "<invalid-time>".to_string())
}

fn banner<W: Write>(out: &mut W, text: &str) -> io::Result<()> {
    let rule = format!("+{}+", "-".repeat(text.len() + 2));
    writeln!(out, "{}", rule)?;
    writeln!(out, "| {} |", text)?;
    writeln!(out, "{}", rule)
}

/// Write the outcome of an invocation to `out`
pub fn render_outcome<W: Write>(out: &mut W, outcome: &ExecutionOutcome) -> io::Result<()> {
    match outcome {
        ExecutionOutcome::DryRun { pod, command } => {
            banner(
                out,
                &format!("DRY RUN Would have run the following command on pod: {}", pod.name),
            )?;
            writeln!(out, "{}", command)?;
        }
        ExecutionOutcome::Completed {
            pod,
            command,
            exit_code,
            stdout,
            stderr,
            started_at,
            elapsed,
        } => {
            writeln!(
                out,
                "[{}] Running command: {}..done ({} seconds)",
                stamp(*started_at),
                command,
                elapsed.as_secs()
            )?;
            banner(
                out,
                &format!("[{}] Output for pod: {}", stamp(*started_at + *elapsed), pod.name),
            )?;

            if *exit_code != 0 {
                writeln!(out, "Command returned a non-zero status code: {}", exit_code)?;
            }

            section(out, "Std Output", stdout)?;
            section(out, "Std Error", stderr)?;
        }
    }
    out.flush()
}

/// Write a terminal failure to `out`
pub fn render_error<W: Write>(out: &mut W, error: &PodExecError) -> io::Result<()> {
    writeln!(out, "error: {}", error)?;
    if error.is_no_suitable_pod() {
        writeln!(
            out,
            "hint: check the label selector and that the workload has running replicas"
        )?;
    }
    out.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kubernetes::{PodCandidate, PodPhase};
    use std::time::Duration;
    use time::macros::datetime;

    fn pod() -> PodCandidate {
        PodCandidate::new("web-7f9c", "apps", PodPhase::Running)
    }

    fn rendered(outcome: &ExecutionOutcome) -> String {
        let mut buf = Vec::new();
        render_outcome(&mut buf, outcome).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_render_dry_run() {
        let text = rendered(&ExecutionOutcome::DryRun {
            pod: pod(),
            command: "php artisan migrate".to_string(),
        });

        assert!(text.contains("DRY RUN Would have run the following command on pod: web-7f9c"));
        assert!(text.ends_with("php artisan migrate\n"));
        assert!(!text.contains("Std Output"));
    }

    #[test]
    fn test_render_completed_success() {
        let text = rendered(&ExecutionOutcome::Completed {
            pod: pod(),
            command: "ls".to_string(),
            exit_code: 0,
            stdout: b"out".to_vec(),
            stderr: b"err\n".to_vec(),
            started_at: datetime!(2024-03-01 09:15:00.250 UTC),
            elapsed: Duration::from_millis(3_400),
        });

        assert!(text.starts_with("[2024-03-01T09:15:00Z] Running command: ls..done (3 seconds)\n"));
        assert!(text.contains("| [2024-03-01T09:15:03Z] Output for pod: web-7f9c |"));
        assert!(!text.contains("non-zero"));
        assert!(text.contains("\nStd Output\n----------\nout\n"));
        assert!(text.ends_with("\nStd Error\n---------\nerr\n"));
    }

    #[test]
    fn test_render_completed_failure() {
        let text = rendered(&ExecutionOutcome::Completed {
            pod: pod(),
            command: "false".to_string(),
            exit_code: 137,
            stdout: Vec::new(),
            stderr: Vec::new(),
            started_at: datetime!(2024-03-01 09:15:00 UTC),
            elapsed: Duration::ZERO,
        });

        assert!(text.contains("Command returned a non-zero status code: 137\n"));
        assert!(text.contains("Std Output"));
        assert!(text.contains("Std Error"));
    }

    #[test]
    fn test_render_no_suitable_pod_error() {
        let mut buf = Vec::new();
        let err = PodExecError::NoSuitablePod {
            namespace: "apps".to_string(),
            attempts: 19,
        };
        render_error(&mut buf, &err).unwrap();

        let text = String::from_utf8(buf).unwrap();
        assert!(text.starts_with("error: No suitable pod found in namespace apps after 19 attempts\n"));
        assert!(text.contains("hint:"));
    }
}
