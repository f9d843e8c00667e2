//! Estimate command: upload, translate, extract, price.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::cli::args::{EstimateArgs, OutputFormat};
use crate::core::models::{JobStatus, ProjectEstimate, TranslationJob, UploadProgress};
use crate::error::{BimcostError, Result};
use crate::forge::{ForgeClient, JobTracker, PollPolicy};
use crate::render;
use crate::storage::AppConfig;
use crate::util::format::format_bytes;

/// Object-key scope for uploads made from the command line.
pub const CLI_SCOPE: &str = "cli";

/// Execute the estimate command.
pub async fn execute(
    args: &EstimateArgs,
    config: &AppConfig,
    format: OutputFormat,
    pretty: bool,
    no_color: bool,
) -> Result<()> {
    args.validate()?;
    let policy = poll_policy(args, config);
    let forge = Arc::new(ForgeClient::from_config(config)?);
    let tracker = JobTracker::new(Arc::clone(&forge), policy);
    let chatty = format == OutputFormat::Human;

    let job = match (&args.urn, &args.file) {
        (Some(urn), _) => tracker.track(urn)?,
        (None, Some(path)) => {
            let session = forge
                .upload_file(path, CLI_SCOPE, &config.upload_policy(), |p| {
                    if chatty {
                        report_upload(p);
                    }
                })
                .await?;
            if chatty {
                eprintln!();
            }
            let urn = session.object_urn().ok_or_else(|| {
                BimcostError::ParseResponse("upload finished without a URN".to_string())
            })?;
            tracker.submit(urn).await?
        }
        (None, None) => {
            return Err(BimcostError::InvalidInput(
                "a model file or --urn is required".to_string(),
            ));
        }
    };
    if chatty {
        eprintln!("Translating {}", job.urn);
    }

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    let signal = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_signal.cancel();
        }
    });

    let waited = tracker
        .wait(job, &cancel, |j| {
            if chatty {
                report_poll(j, policy);
            }
        })
        .await;
    signal.abort();
    let job = waited?;

    if !job.status.is_terminal() && chatty {
        eprintln!("Stopped waiting. Resume with: bimcost estimate --urn {}", job.urn);
    }

    let batch = forge.extract_elements(&job).await?;
    let rates = config.rate_table();
    let records: Vec<_> = batch.records(&rates).collect();
    let estimate = ProjectEstimate::from_records(batch.urn(), &records);

    let output = render::render_estimate(&estimate, format, pretty, no_color)?;
    print!("{output}");
    Ok(())
}

fn poll_policy(args: &EstimateArgs, config: &AppConfig) -> PollPolicy {
    let base = config.poll_policy();
    PollPolicy::new(
        args.interval.map_or(base.interval, Duration::from_secs),
        args.max_attempts.unwrap_or(base.max_attempts),
    )
}

fn report_upload(progress: UploadProgress) {
    eprint!(
        "\rUploading {} / {} ({:.0}%)",
        format_bytes(progress.bytes_transferred),
        format_bytes(progress.file_size_bytes),
        progress.percent()
    );
}

fn report_poll(job: &TranslationJob, policy: PollPolicy) {
    match job.status {
        JobStatus::Success => eprintln!("Translation complete"),
        JobStatus::Failed => eprintln!("Translation failed"),
        JobStatus::TimedOut => eprintln!(
            "Gave up after {} polls; the job may still finish remotely",
            job.poll_attempts
        ),
        JobStatus::Submitted | JobStatus::InProgress => eprintln!(
            "  {}% (poll {}/{})",
            job.progress_percent, job.poll_attempts, policy.max_attempts
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Config;
    use std::path::PathBuf;

    #[test]
    fn flags_override_configured_policy() {
        let config = AppConfig::resolve(Config::default(), |_| None).unwrap();
        let args = EstimateArgs {
            file: Some(PathBuf::from("model.ifc")),
            urn: None,
            interval: Some(5),
            max_attempts: None,
        };
        let policy = poll_policy(&args, &config);
        assert_eq!(policy.interval, Duration::from_secs(5));
        assert_eq!(policy.max_attempts, config.poll_policy().max_attempts);
    }
}
