//! Scheduled maintenance service
//!
//! Runs the four daily jobs (ingestion, repair, corporate actions,
//! quality) at their configured times and shuts down cooperatively on
//! ctrl-c: the in-flight symbol finishes, nothing new starts.

use anyhow::Result;
use clap::Args;
use tokio::sync::broadcast;
use tracing::{error, info};

use crate::config::{JobTime, Settings};
use crate::jobs::{JobKind, Schedule, ScheduleExpression, Scheduler};

/// Arguments for the serve command
#[derive(Args)]
pub struct ServeArgs {
    /// Run every job once before entering the schedule loop
    #[arg(long)]
    pub run_on_startup: bool,
}

/// Execute the serve command
pub async fn execute(args: ServeArgs) -> Result<()> {
    let settings = Settings::load().unwrap_or_else(|_| Settings::default_settings());

    let (shutdown, _) = broadcast::channel(1);
    let orchestrator = super::build_orchestrator(&settings, shutdown.clone()).await?;

    let scheduler = Scheduler::new();
    for (kind, at) in job_times(&settings) {
        scheduler.add_schedule(Schedule::new(
            kind.as_str().to_string(),
            ScheduleExpression::DailyAt(at.hour, at.minute),
        ));
    }

    for schedule in scheduler.list_schedules() {
        info!(
            job = %schedule.name,
            next_run = ?schedule.next_run,
            "scheduled"
        );
    }

    if args.run_on_startup || settings.scheduler.run_on_startup {
        info!("running all jobs once at startup");
        for kind in JobKind::ALL {
            run_job(&orchestrator, kind).await;
            scheduler.mark_run(kind.as_str());
        }
    }

    let mut poll = tokio::time::interval(std::time::Duration::from_secs(
        settings.scheduler.poll_interval_secs.max(1),
    ));

    info!("data hub scheduler started");
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown requested");
                // Cooperative: running jobs stop before their next symbol
                let _ = shutdown.send(());
                break;
            }
            _ = poll.tick() => {
                for name in scheduler.due_schedules() {
                    let Some(kind) = JobKind::from_str(&name) else {
                        continue;
                    };
                    run_job(&orchestrator, kind).await;
                    scheduler.mark_run(&name);
                }
            }
        }
    }

    info!("data hub scheduler stopped");
    Ok(())
}

fn job_times(settings: &Settings) -> [(JobKind, JobTime); 4] {
    [
        (JobKind::Ingestion, settings.scheduler.ingestion_at),
        (JobKind::Repair, settings.scheduler.repair_at),
        (JobKind::CorporateActions, settings.scheduler.actions_at),
        (JobKind::Quality, settings.scheduler.quality_at),
    ]
}

async fn run_job(orchestrator: &crate::jobs::Orchestrator, kind: JobKind) {
    match orchestrator.run_now(kind).await {
        Ok(summary) => {
            info!(
                job = %kind,
                succeeded = summary.succeeded(),
                failed = summary.failed(),
                records = summary.total_records(),
                "scheduled job finished"
            );
        }
        Err(e) => {
            error!(job = %kind, error = %e, "scheduled job did not run");
        }
    }
}
