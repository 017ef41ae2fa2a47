//! Terminal front end: submit one artifact and follow the session until it ends.

use crate::artifact::Artifact;
use crate::catalog::ModelCatalog;
use crate::config::AppConfig;
use crate::session::{Session, SessionController, SessionState};
use crate::transfer::{FailureReason, HttpTransferClient};
use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "haske")]
#[command(about = "Submit an imaging study to a segmentation model and follow the job")]
#[command(version)]
pub struct Args {
    /// Zip archive containing the image series
    #[arg(required_unless_present = "list_models")]
    pub artifact: Option<PathBuf>,

    /// Model to run (defaults to the first catalog entry)
    #[arg(short, long)]
    pub model: Option<String>,

    /// Processing endpoint, overrides config and HASKE_ENDPOINT
    #[arg(short, long)]
    pub endpoint: Option<String>,

    /// Write the returned image here
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Print the model catalog and exit
    #[arg(long)]
    pub list_models: bool,
}

/// Entry point for the binary when the desktop shell is not compiled in.
/// Returns the process exit code.
pub fn run() -> i32 {
    crate::init_tracing();
    let args = Args::parse();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Failed to start async runtime: {}", e);
            return 2;
        }
    };

    match runtime.block_on(execute(args)) {
        Ok(true) => 0,
        Ok(false) => 1,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            2
        }
    }
}

async fn execute(args: Args) -> Result<bool> {
    let mut config = AppConfig::load().context("Failed to load configuration")?;
    if let Some(endpoint) = args.endpoint {
        config.endpoint = endpoint;
    }

    let catalog = ModelCatalog::builtin();
    if args.list_models {
        for model in catalog.models() {
            println!(
                "{:<10} {:<10} {:<12} accuracy {:>4}  speed {:?}",
                model.id,
                model.display_name,
                model.modality,
                model.expected_accuracy,
                model.relative_speed
            );
        }
        return Ok(true);
    }

    let path = args.artifact.context("An artifact path is required")?;
    let artifact = Artifact::open(&path)
        .await
        .with_context(|| format!("Cannot use {}", path.display()))?;

    let client = Arc::new(HttpTransferClient::from_config(&config));
    let controller =
        SessionController::new(catalog, client, &config).context("Invalid configuration")?;

    if let Some(model) = &args.model {
        controller.select_model(model)?;
    }
    controller.select_artifact(artifact)?;

    let mut updates = controller.subscribe();
    controller.start()?;
    println!(
        "Submitting {} to {} ({})",
        path.display(),
        controller.snapshot().selected_model,
        config.endpoint
    );

    let mut last_progress = None;
    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let session = updates.borrow_and_update().clone();
                if last_progress != Some(session.progress) {
                    last_progress = Some(session.progress);
                    println!("{}", progress_line(&session));
                }
                if session.state.is_terminal() {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted, cancelling submission");
                controller.cancel();
            }
        }
    }

    report(&controller.snapshot(), args.output.as_deref()).await
}

async fn report(session: &Session, output: Option<&Path>) -> Result<bool> {
    match (&session.state, &session.result, &session.error) {
        (SessionState::Succeeded, Some(result), _) => {
            println!("Processing complete");

            let mut metrics: Vec<_> = result.metrics.iter().collect();
            metrics.sort_by(|a, b| a.0.cmp(b.0));
            for (key, value) in metrics {
                println!("  {}: {}", key, display_value(value));
            }

            if let Some(path) = output {
                let image = result.image_bytes().context("Result image is not valid base64")?;
                tokio::fs::write(path, image)
                    .await
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                println!("Image written to {}", path.display());
            }
            Ok(true)
        }
        (SessionState::Failed, _, Some(failure)) => {
            println!("{}", failure_line(&failure.reason, &failure.message));
            Ok(false)
        }
        _ => Ok(false),
    }
}

fn progress_line(session: &Session) -> String {
    const WIDTH: usize = 30;
    let filled = WIDTH * session.progress as usize / 100;
    format!(
        "[{}{}] {:>3}%",
        "#".repeat(filled),
        "-".repeat(WIDTH - filled),
        session.progress
    )
}

fn failure_line(reason: &FailureReason, message: &str) -> String {
    match reason {
        FailureReason::Cancelled => "Processing cancelled".to_string(),
        _ => format!("Processing failed: {}", message),
    }
}

fn display_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::fixtures::sample_result;
    use crate::transfer::TransferFailure;

    #[test]
    fn test_args_require_artifact() {
        assert!(Args::try_parse_from(["haske"]).is_err());
        assert!(Args::try_parse_from(["haske", "--list-models"]).is_ok());

        let args = Args::try_parse_from(["haske", "study.zip", "-m", "deepmedic"]).unwrap();
        assert_eq!(args.artifact, Some(PathBuf::from("study.zip")));
        assert_eq!(args.model.as_deref(), Some("deepmedic"));
    }

    #[test]
    fn test_progress_line() {
        let mut session = Session::new("unet_t1c");
        session.progress = 50;

        assert_eq!(progress_line(&session), format!("[{}{}]  50%", "#".repeat(15), "-".repeat(15)));

        session.progress = 100;
        assert!(progress_line(&session).ends_with("] 100%"));
    }

    #[test]
    fn test_failure_line() {
        assert_eq!(
            failure_line(&FailureReason::ServerRejected { status: 400 }, "invalid format"),
            "Processing failed: invalid format"
        );
        assert_eq!(
            failure_line(&FailureReason::Cancelled, "Processing was cancelled."),
            "Processing cancelled"
        );
    }

    #[tokio::test]
    async fn test_report_writes_image() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("mask.png");

        let mut session = Session::new("unet_t1c");
        session.state = SessionState::Succeeded;
        session.progress = 100;
        session.result = Some(sample_result());

        assert!(report(&session, Some(&output)).await.unwrap());
        assert_eq!(tokio::fs::read(&output).await.unwrap(), b"hello");
    }

    #[tokio::test]
    async fn test_report_failure() {
        let mut session = Session::new("unet_t1c");
        session.state = SessionState::Failed;
        session.error = Some(TransferFailure::network());

        assert!(!report(&session, None).await.unwrap());
    }
}
