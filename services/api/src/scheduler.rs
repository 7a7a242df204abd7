//! services/api/src/scheduler.rs
//!
//! Background tasks: the durable-timer poller that resumes due booking
//! workflows, and the cron loops for the periodic jobs. Every loop stops when
//! the shared `CancellationToken` is cancelled.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use cron::Schedule;
use detailing_core::jobs::Jobs;
use detailing_core::ports::{Clock, PortResult, WorkflowScheduler};
use detailing_core::workflow::{BookingWorkflow, DEFAULT_LEASE_SECONDS};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::{JobSchedules, WorkflowConfig};

//=========================================================================================
// Durable-Timer Poller
//=========================================================================================

/// Claims due checkpoints on every tick and resumes each on its own task. The
/// claim is the run's lease, so the spawned task does not take it again.
pub async fn run_workflow_poller(
    scheduler: Arc<dyn WorkflowScheduler>,
    workflow: BookingWorkflow,
    clock: Arc<dyn Clock>,
    config: WorkflowConfig,
    shutdown: CancellationToken,
) {
    let lease = ChronoDuration::from_std(config.lease)
        .unwrap_or_else(|_| ChronoDuration::seconds(DEFAULT_LEASE_SECONDS));
    let mut ticker = tokio::time::interval(config.poll_interval);
    info!(
        interval_secs = config.poll_interval.as_secs(),
        batch = config.batch_size,
        "Workflow poller started"
    );

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("Workflow poller stopping");
                break;
            }
            _ = ticker.tick() => {}
        }

        let due = match scheduler.claim_due(clock.now(), lease, config.batch_size).await {
            Ok(due) => due,
            Err(e) => {
                error!("Failed to claim due workflows: {:?}", e);
                continue;
            }
        };
        if due.is_empty() {
            continue;
        }
        debug!(count = due.len(), "Claimed due workflows");

        for booking_id in due {
            let workflow = workflow.clone();
            tokio::spawn(async move {
                match workflow.resume_claimed(booking_id).await {
                    Ok(outcome) => debug!(booking_id = %booking_id, ?outcome, "Workflow resumed"),
                    Err(e) => error!(booking_id = %booking_id, "Workflow resume failed: {:?}", e),
                }
            });
        }
    }
}

//=========================================================================================
// Cron-Driven Jobs
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodicJob {
    KnowledgeRefresh,
    DailyAnalytics,
    Cleanup,
}

impl PeriodicJob {
    pub fn name(self) -> &'static str {
        match self {
            PeriodicJob::KnowledgeRefresh => "knowledge-refresh",
            PeriodicJob::DailyAnalytics => "daily-analytics",
            PeriodicJob::Cleanup => "cleanup",
        }
    }

    async fn run(self, jobs: &Jobs) -> PortResult<()> {
        match self {
            PeriodicJob::KnowledgeRefresh => jobs.refresh_pricing_knowledge().await.map(|_| ()),
            PeriodicJob::DailyAnalytics => jobs.calculate_daily_analytics().await.map(|_| ()),
            PeriodicJob::Cleanup => jobs.cleanup_old_data().await.map(|_| ()),
        }
    }
}

/// How long to sleep until the schedule's next firing after `now`.
/// `None` when the schedule never fires again.
pub fn next_delay(schedule: &Schedule, now: DateTime<Utc>) -> Option<Duration> {
    let next = schedule.after(&now).next()?;
    Some((next - now).to_std().unwrap_or(Duration::ZERO))
}

async fn run_cron_job(job: PeriodicJob, schedule: Schedule, jobs: Jobs, shutdown: CancellationToken) {
    loop {
        let Some(delay) = next_delay(&schedule, Utc::now()) else {
            warn!(job = job.name(), "Schedule has no upcoming runs; stopping");
            return;
        };

        tokio::select! {
            _ = shutdown.cancelled() => {
                info!(job = job.name(), "Job loop stopping");
                return;
            }
            _ = tokio::time::sleep(delay) => {}
        }

        info!(job = job.name(), "Running scheduled job");
        if let Err(e) = job.run(&jobs).await {
            error!(job = job.name(), "Scheduled job failed: {:?}", e);
        }
    }
}

/// Starts one loop per periodic job.
pub fn spawn_jobs(
    jobs: Jobs,
    schedules: &JobSchedules,
    shutdown: CancellationToken,
) -> Vec<JoinHandle<()>> {
    [
        (PeriodicJob::KnowledgeRefresh, schedules.knowledge_refresh.clone()),
        (PeriodicJob::DailyAnalytics, schedules.daily_analytics.clone()),
        (PeriodicJob::Cleanup, schedules.cleanup.clone()),
    ]
    .into_iter()
    .map(|(job, schedule)| tokio::spawn(run_cron_job(job, schedule, jobs.clone(), shutdown.clone())))
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::str::FromStr;

    #[test]
    fn next_delay_waits_for_the_next_firing() {
        let schedule = Schedule::from_str("0 0 3 * * *").unwrap();
        let now = Utc.with_ymd_and_hms(2024, 7, 10, 2, 30, 0).unwrap();
        assert_eq!(next_delay(&schedule, now), Some(Duration::from_secs(30 * 60)));

        // Just after the firing, the next one is a day later.
        let now = Utc.with_ymd_and_hms(2024, 7, 10, 3, 0, 1).unwrap();
        assert_eq!(
            next_delay(&schedule, now),
            Some(Duration::from_secs(24 * 3600 - 1))
        );
    }

    #[test]
    fn weekly_cleanup_fires_on_monday() {
        let schedule = Schedule::from_str("0 0 4 * * Mon").unwrap();
        // 2024-07-10 is a Wednesday.
        let now = Utc.with_ymd_and_hms(2024, 7, 10, 12, 0, 0).unwrap();
        let next = schedule.after(&now).next().unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2024, 7, 15, 4, 0, 0).unwrap());
    }

    #[test]
    fn job_names_are_stable() {
        assert_eq!(PeriodicJob::KnowledgeRefresh.name(), "knowledge-refresh");
        assert_eq!(PeriodicJob::DailyAnalytics.name(), "daily-analytics");
        assert_eq!(PeriodicJob::Cleanup.name(), "cleanup");
    }
}
