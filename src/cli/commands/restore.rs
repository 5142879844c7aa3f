//! Restore command implementations.
//!
//! `estimate --size-gb` and the `jobs`/`cleanup` sub-commands work offline.
//! Everything else talks to S3 through the aws binary.

use super::helpers::{aws_cli, format_gb, prompt_confirmation};
use crate::cli::{RestoreCommand, RuntimeConfig, SourceArgs};
use crate::error::Result;
use crate::restore::{CandidateQuery, CostEstimate, RestoreJob, RestoreTier, RestoreTracker};
use crate::state::JobStore;

/// Execute a restore sub-command
pub(super) async fn execute_restore(action: &RestoreCommand, config: &RuntimeConfig) -> Result<i32> {
    let store = JobStore::new(&config.state_dir);

    match action {
        RestoreCommand::List { source, json } => list(config, &store, source, *json).await,
        RestoreCommand::Estimate {
            size_gb,
            bucket,
            date,
            prefix,
            date_format,
            tier,
            json,
        } => {
            let estimates: Vec<CostEstimate> = match (size_gb, bucket, date) {
                (Some(gb), _, _) => tiers(*tier)
                    .into_iter()
                    .map(|t| CostEstimate::for_gb(*gb, t))
                    .collect(),
                (None, Some(bucket), Some(date)) => {
                    let query = CandidateQuery::new(bucket, date, prefix, date_format)?;
                    let aws = aws_cli(config)?;
                    let tracker = RestoreTracker::new(&aws, config.region.clone(), &store);
                    let candidates = tracker.list_candidates(&query).await?;
                    config.verbose_println(&format!(
                        "{} archived object(s), {} under s3://{bucket}/{}",
                        candidates.archived.len(),
                        format_gb(candidates.archived_bytes()),
                        candidates.prefix
                    ));
                    tiers(*tier)
                        .into_iter()
                        .map(|t| CostEstimate::for_bytes(candidates.archived_bytes(), t))
                        .collect()
                }
                _ => unreachable!("validated: --size-gb or --bucket with --date"),
            };
            print_estimates(config, &estimates, *json)?;
            Ok(0)
        }
        RestoreCommand::Initiate {
            source,
            tier,
            days,
            yes,
        } => initiate(config, &store, source, *tier, *days, *yes).await,
        RestoreCommand::Status { job_id, json } => {
            let aws = aws_cli(config)?;
            let tracker = RestoreTracker::new(&aws, config.region.clone(), &store);
            let job = tracker.refresh(job_id).await?;
            if *json {
                config.output().data(&serde_json::to_string_pretty(&job)?)?;
            } else {
                print_job(config, &job);
            }
            Ok(0)
        }
        RestoreCommand::Download {
            job_id,
            destination,
            overwrite,
        } => {
            let aws = aws_cli(config)?;
            let tracker = RestoreTracker::new(&aws, config.region.clone(), &store);
            config.progress_println(&format!(
                "Downloading restored objects of {job_id} to {}...",
                destination.display()
            ));
            let report = tracker.download(job_id, destination, *overwrite).await?;

            config.success_println(&format!("Downloaded {} object(s)", report.downloaded.len()));
            if !report.already_downloaded.is_empty() {
                config.println(&format!(
                    "Skipped {} object(s) downloaded earlier (use --overwrite to copy again)",
                    report.already_downloaded.len()
                ));
            }
            if !report.pending.is_empty() {
                config.warning_println(&format!(
                    "{} object(s) not restored yet",
                    report.pending.len()
                ));
                for key in &report.pending {
                    config.indent(key);
                }
            }
            for (key, reason) in &report.failed {
                config.error_println(&format!("{key}: {reason}"));
            }
            Ok(if report.failed.is_empty() { 0 } else { 1 })
        }
        RestoreCommand::Jobs { json } => {
            let jobs = store.list()?;
            if *json {
                config.output().data(&serde_json::to_string_pretty(&jobs)?)?;
            } else if jobs.is_empty() {
                config.println("No restore jobs found");
            } else {
                for job in &jobs {
                    config.println(&job.summary());
                }
            }
            Ok(0)
        }
        RestoreCommand::Cleanup { job_id, all, yes } => {
            if !yes {
                let what = match job_id {
                    Some(id) => format!("restore job {id}"),
                    None => "every restore job record".to_string(),
                };
                config.println(&format!("About to remove {what}"));
                if !prompt_confirmation("Continue with cleanup?")? {
                    config.println("Cleanup cancelled");
                    return Ok(0);
                }
            }

            if *all {
                let removed = store.remove_all()?;
                config.success_println(&format!("Removed {removed} job record(s)"));
            } else if let Some(id) = job_id {
                store.remove(id)?;
                config.success_println(&format!("Removed job {id}"));
            }
            Ok(0)
        }
    }
}

async fn list(config: &RuntimeConfig, store: &JobStore, source: &SourceArgs, json: bool) -> Result<i32> {
    let query = CandidateQuery::new(&source.bucket, &source.date, &source.prefix, &source.date_format)?;
    let aws = aws_cli(config)?;
    let tracker = RestoreTracker::new(&aws, config.region.clone(), store);
    let candidates = tracker.list_candidates(&query).await?;

    if json {
        config.output().data(&serde_json::to_string_pretty(&candidates)?)?;
        return Ok(0);
    }

    config.section(&format!("s3://{}/{}", source.bucket, candidates.prefix));
    for object in &candidates.archived {
        config.println(&format!(
            "  {:<13} {:>12}  {}",
            object.storage_class,
            format_gb(object.size),
            object.key
        ));
    }
    config.println(&format!(
        "{} archived object(s), {}",
        candidates.archived.len(),
        format_gb(candidates.archived_bytes())
    ));
    if !candidates.available.is_empty() {
        config.println(&format!(
            "{} object(s) already readable without a restore",
            candidates.available.len()
        ));
    }
    Ok(0)
}

async fn initiate(
    config: &RuntimeConfig,
    store: &JobStore,
    source: &SourceArgs,
    tier: RestoreTier,
    days: u32,
    yes: bool,
) -> Result<i32> {
    let query = CandidateQuery::new(&source.bucket, &source.date, &source.prefix, &source.date_format)?;
    let aws = aws_cli(config)?;
    let tracker = RestoreTracker::new(&aws, config.region.clone(), store);

    if !yes {
        let candidates = tracker.list_candidates(&query).await?;
        let estimate = CostEstimate::for_bytes(candidates.archived_bytes(), tier);
        config.println(&format!(
            "About to restore {} object(s) ({}) at {tier} tier for about ${:.2}",
            candidates.archived.len(),
            format_gb(candidates.archived_bytes()),
            estimate.cost_usd
        ));
        if !prompt_confirmation("Continue with restore?")? {
            config.println("Restore cancelled");
            return Ok(0);
        }
    }

    let job = tracker.initiate(&query, tier, days).await?;
    let failed = job.files.iter().filter(|f| f.request_error.is_some()).count();

    config.success_println(&format!("Created restore job {}", job.job_id));
    config.indent(&format!(
        "{} object(s), {}, estimated ${:.2}, typically {}",
        job.files.len(),
        format_gb(job.total_size_bytes),
        job.estimated_cost_usd,
        tier.typical_latency()
    ));
    if failed > 0 {
        config.warning_println(&format!("{failed} restore request(s) failed; see `restore status`"));
    }
    config.println(&format!(
        "Check progress with: stackpilot restore status --job-id {}",
        job.job_id
    ));
    Ok(0)
}

fn tiers(only: Option<RestoreTier>) -> Vec<RestoreTier> {
    match only {
        Some(tier) => vec![tier],
        None => RestoreTier::ALL.to_vec(),
    }
}

fn print_estimates(config: &RuntimeConfig, estimates: &[CostEstimate], json: bool) -> Result<()> {
    if json {
        config.output().data(&serde_json::to_string_pretty(estimates)?)?;
        return Ok(());
    }

    for estimate in estimates {
        let line = format!(
            "{:<10} {:>10.2} GB x ${:<7} = ${:.2}  ({})",
            estimate.tier.to_string(),
            estimate.size_gb,
            estimate.rate_per_gb,
            estimate.cost_usd,
            estimate.tier.typical_latency()
        );
        // Estimates are the command's result, so quiet mode still shows them
        config.output().data(&line)?;
    }
    Ok(())
}

fn print_job(config: &RuntimeConfig, job: &RestoreJob) {
    let progress = job.progress();
    config.println(&format!("📊 {}", job.summary()));
    for file in &job.files {
        let mut line = format!("  {:<13} {}", file.restore.label(), file.key);
        if let Some(error) = &file.request_error {
            line.push_str(&format!("  (request failed: {error})"));
        } else if file.downloaded_at.is_some() {
            line.push_str("  (downloaded)");
        }
        config.println(&line);
    }

    let ready = format!(
        "{}/{} ready, {} in progress, {} not requested, {} downloaded",
        progress.completed, progress.total, progress.in_progress, progress.not_requested, progress.downloaded
    );
    if progress.is_complete() {
        config.success_println(&ready);
    } else {
        config.println(&ready);
    }
}
