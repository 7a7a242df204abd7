//! crates/detailing_core/src/workflow.rs
//!
//! The booking lifecycle as an explicit, persisted state machine.
//!
//! A run is identified by its booking id. Each call to [`BookingWorkflow::resume`]
//! loads the stored [`WorkflowCheckpoint`], executes every step that is due,
//! and persists the checkpoint again before returning, either suspended until
//! a future instant or finished. Long waits are therefore rows in storage and
//! never in-memory timers; an external poller wakes the run up.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::domain::{string_enum, Booking, BookingStatus, WorkflowRunStatus, WorkflowState};
use crate::ports::{
    Clock, DatabaseService, NotificationKind, NotificationService, PortError, PortResult,
    WorkflowScheduler,
};

/// The reminder goes out this many hours before the appointment.
pub const REMINDER_LEAD_HOURS: i64 = 24;
/// Added to the summed service durations before the follow-up.
pub const SERVICE_BUFFER_MINUTES: i64 = 30;
/// Used when the booked services have no duration at all.
pub const FALLBACK_SERVICE_MINUTES: i64 = 60;
/// How long a run may own a checkpoint before others can take it over.
pub const DEFAULT_LEASE_SECONDS: i64 = 300;

pub fn reminder_lead() -> Duration {
    Duration::hours(REMINDER_LEAD_HOURS)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WorkflowStep {
    Confirmation,
    ReminderWait,
    Reminder,
    ScheduledWait,
    StartService,
    ServiceDuration,
    FollowUp,
    Finished,
}

string_enum!(WorkflowStep {
    Confirmation => "confirmation",
    ReminderWait => "reminder-wait",
    Reminder => "reminder",
    ScheduledWait => "scheduled-wait",
    StartService => "start-service",
    ServiceDuration => "service-duration",
    FollowUp => "follow-up",
    Finished => "finished",
});

/// The durable resume point of one booking's run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowCheckpoint {
    pub booking_id: Uuid,
    /// The step to execute once `resume_at` has passed.
    pub step: WorkflowStep,
    pub resume_at: DateTime<Utc>,
    /// Idempotency keys of side-effecting steps that already ran.
    pub completed_steps: Vec<String>,
}

impl WorkflowCheckpoint {
    /// A fresh checkpoint that is due immediately.
    pub fn start(booking_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            booking_id,
            step: WorkflowStep::Confirmation,
            resume_at: now,
            completed_steps: Vec::new(),
        }
    }

    pub fn idempotency_key(&self, step: WorkflowStep) -> String {
        format!("{}:{}", WorkflowState::workflow_id_for(self.booking_id), step)
    }

    pub fn is_done(&self, step: WorkflowStep) -> bool {
        let key = self.idempotency_key(step);
        self.completed_steps.iter().any(|k| *k == key)
    }

    fn mark_done(&mut self, step: WorkflowStep) {
        if !self.is_done(step) {
            let key = self.idempotency_key(step);
            self.completed_steps.push(key);
        }
    }

    fn advance(&mut self, step: WorkflowStep, resume_at: DateTime<Utc>) {
        self.step = step;
        self.resume_at = resume_at;
    }
}

/// What a step decides to do, given the freshly read booking.
#[derive(Debug, Clone, PartialEq)]
pub enum StepPlan {
    Notify {
        kind: NotificationKind,
        next: WorkflowStep,
    },
    /// Park the run. `wait` is the label reported while parked.
    Suspend {
        wait: WorkflowStep,
        until: DateTime<Utc>,
        next: WorkflowStep,
    },
    Skip {
        next: WorkflowStep,
    },
    /// Move a confirmed booking to in-progress, then wait out the service.
    StartService,
    Finish(WorkflowRunStatus),
}

/// Pure step logic: a function of the step, the current booking and the time.
pub fn plan_step(step: WorkflowStep, booking: &Booking, now: DateTime<Utc>) -> StepPlan {
    let cancelled = booking.status == BookingStatus::Cancelled;
    match step {
        WorkflowStep::Confirmation => StepPlan::Notify {
            kind: NotificationKind::BookingConfirmation,
            next: WorkflowStep::ReminderWait,
        },
        WorkflowStep::ReminderWait => {
            let reminder_at = booking.scheduled_at - reminder_lead();
            if reminder_at > now {
                StepPlan::Suspend {
                    wait: WorkflowStep::ReminderWait,
                    until: reminder_at,
                    next: WorkflowStep::Reminder,
                }
            } else {
                StepPlan::Skip {
                    next: WorkflowStep::ScheduledWait,
                }
            }
        }
        WorkflowStep::Reminder if cancelled => StepPlan::Finish(WorkflowRunStatus::Cancelled),
        WorkflowStep::Reminder => StepPlan::Notify {
            kind: NotificationKind::BookingReminder,
            next: WorkflowStep::ScheduledWait,
        },
        WorkflowStep::ScheduledWait => {
            if booking.scheduled_at > now {
                StepPlan::Suspend {
                    wait: WorkflowStep::ScheduledWait,
                    until: booking.scheduled_at,
                    next: WorkflowStep::StartService,
                }
            } else {
                StepPlan::Skip {
                    next: WorkflowStep::StartService,
                }
            }
        }
        WorkflowStep::StartService if cancelled => StepPlan::Finish(WorkflowRunStatus::Cancelled),
        WorkflowStep::StartService => StepPlan::StartService,
        // Only ever parked on; the follow-up is what runs when it elapses.
        WorkflowStep::ServiceDuration => StepPlan::Skip {
            next: WorkflowStep::FollowUp,
        },
        WorkflowStep::FollowUp if cancelled => StepPlan::Finish(WorkflowRunStatus::Cancelled),
        WorkflowStep::FollowUp => StepPlan::Notify {
            kind: NotificationKind::CompletionFollowUp,
            next: WorkflowStep::Finished,
        },
        WorkflowStep::Finished => StepPlan::Finish(WorkflowRunStatus::Completed),
    }
}

/// How long to wait between starting the service and the follow-up.
pub fn service_window(total_minutes: u32) -> Duration {
    let minutes = if total_minutes == 0 {
        FALLBACK_SERVICE_MINUTES
    } else {
        i64::from(total_minutes)
    };
    Duration::minutes(minutes + SERVICE_BUFFER_MINUTES)
}

/// Result of one `resume` call.
#[derive(Debug, Clone, PartialEq)]
pub enum ResumeOutcome {
    /// Parked at `step` until `until`.
    Suspended {
        step: WorkflowStep,
        until: DateTime<Utc>,
    },
    Finished(WorkflowRunStatus),
    /// Woken before the stored resume time; nothing ran.
    NotDue { until: DateTime<Utc> },
    /// Another run holds the lease on this booking; nothing ran.
    Busy,
    /// No checkpoint exists for this booking.
    Missing,
}

#[derive(Clone)]
pub struct BookingWorkflow {
    db: Arc<dyn DatabaseService>,
    scheduler: Arc<dyn WorkflowScheduler>,
    notifier: Arc<dyn NotificationService>,
    clock: Arc<dyn Clock>,
    lease: Duration,
}

impl BookingWorkflow {
    pub fn new(
        db: Arc<dyn DatabaseService>,
        scheduler: Arc<dyn WorkflowScheduler>,
        notifier: Arc<dyn NotificationService>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            db,
            scheduler,
            notifier,
            clock,
            lease: Duration::seconds(DEFAULT_LEASE_SECONDS),
        }
    }

    pub fn with_lease(mut self, lease: Duration) -> Self {
        self.lease = lease;
        self
    }

    /// The bookkeeping rows written together with a new booking.
    pub fn initial_records(
        booking: &Booking,
        now: DateTime<Utc>,
    ) -> (WorkflowState, WorkflowCheckpoint) {
        let state = WorkflowState {
            workflow_id: WorkflowState::workflow_id_for(booking.id),
            booking_id: booking.id,
            tenant_id: booking.tenant_id,
            current_step: WorkflowStep::Confirmation.to_string(),
            status: WorkflowRunStatus::Running,
            started_at: now,
            completed_at: None,
            error: None,
        };
        (state, WorkflowCheckpoint::start(booking.id, now))
    }

    /// Takes the checkpoint lease, then runs every due step for the booking.
    /// Returns `Busy` without running anything while another run owns it.
    pub async fn resume(&self, booking_id: Uuid) -> PortResult<ResumeOutcome> {
        let now = self.clock.now();
        if !self.scheduler.try_lease(booking_id, now, self.lease).await? {
            if self.scheduler.load_checkpoint(booking_id).await?.is_none() {
                return Ok(ResumeOutcome::Missing);
            }
            debug!(booking_id = %booking_id, "Workflow is leased by another run");
            return Ok(ResumeOutcome::Busy);
        }
        self.resume_claimed(booking_id).await
    }

    /// Runs every due step for a booking whose lease the caller already holds,
    /// as handed out by `WorkflowScheduler::claim_due`. On a storage error the
    /// run is marked failed and its checkpoint removed, so it will not be
    /// resumed.
    pub async fn resume_claimed(&self, booking_id: Uuid) -> PortResult<ResumeOutcome> {
        match self.run(booking_id).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                self.fail(booking_id, &e).await;
                Err(e)
            }
        }
    }

    async fn run(&self, booking_id: Uuid) -> PortResult<ResumeOutcome> {
        let Some(mut checkpoint) = self.scheduler.load_checkpoint(booking_id).await? else {
            warn!(booking_id = %booking_id, "No workflow checkpoint to resume");
            return Ok(ResumeOutcome::Missing);
        };

        loop {
            let now = self.clock.now();
            if checkpoint.resume_at > now {
                self.scheduler.release_lease(booking_id).await?;
                return Ok(ResumeOutcome::NotDue {
                    until: checkpoint.resume_at,
                });
            }

            let step = checkpoint.step;
            let booking = self.db.get_booking_by_id(booking_id).await?;

            match plan_step(step, &booking, now) {
                StepPlan::Notify { kind, next } => {
                    if !checkpoint.is_done(step) {
                        self.notify(kind, &booking).await?;
                        checkpoint.mark_done(step);
                    }
                    checkpoint.advance(next, now);
                    self.scheduler.save_checkpoint(&checkpoint).await?;
                    self.mirror_step(booking_id, next).await;
                }
                StepPlan::Skip { next } => {
                    checkpoint.advance(next, now);
                    self.scheduler.save_checkpoint(&checkpoint).await?;
                }
                StepPlan::Suspend { wait, until, next } => {
                    checkpoint.advance(next, until);
                    self.park(&checkpoint).await?;
                    self.mirror_step(booking_id, wait).await;
                    info!(
                        booking_id = %booking_id,
                        step = %wait,
                        until = %until,
                        "Workflow suspended"
                    );
                    return Ok(ResumeOutcome::Suspended { step: wait, until });
                }
                StepPlan::StartService => {
                    if !checkpoint.is_done(step) {
                        if !self.start_service(&booking).await? {
                            return self
                                .finish(&checkpoint, WorkflowRunStatus::Cancelled)
                                .await;
                        }
                        checkpoint.mark_done(step);
                    }
                    let until = now + service_window(self.total_service_minutes(&booking).await?);
                    checkpoint.advance(WorkflowStep::FollowUp, until);
                    self.park(&checkpoint).await?;
                    self.mirror_step(booking_id, WorkflowStep::ServiceDuration).await;
                    info!(booking_id = %booking_id, until = %until, "Service window started");
                    return Ok(ResumeOutcome::Suspended {
                        step: WorkflowStep::ServiceDuration,
                        until,
                    });
                }
                StepPlan::Finish(status) => return self.finish(&checkpoint, status).await,
            }
        }
    }

    /// Stores a checkpoint that waits for a future instant and hands the
    /// lease back. Intermediate saves keep the lease.
    async fn park(&self, checkpoint: &WorkflowCheckpoint) -> PortResult<()> {
        self.scheduler.save_checkpoint(checkpoint).await?;
        self.scheduler.release_lease(checkpoint.booking_id).await
    }

    /// Compare-and-set `confirmed -> in-progress`. Returns `false` when the
    /// booking turned out to be cancelled.
    async fn start_service(&self, booking: &Booking) -> PortResult<bool> {
        if booking.status != BookingStatus::Confirmed {
            // Pending bookings and operator-advanced ones are left alone.
            info!(
                booking_id = %booking.id,
                status = %booking.status,
                "Booking not confirmed at appointment time; leaving status unchanged"
            );
            return Ok(true);
        }

        let moved = self
            .db
            .transition_booking_status(
                booking.id,
                BookingStatus::Confirmed,
                BookingStatus::InProgress,
                None,
            )
            .await?;
        if moved {
            info!(booking_id = %booking.id, "Booking moved to in-progress");
            return Ok(true);
        }

        let current = self.db.get_booking_by_id(booking.id).await?;
        Ok(current.status != BookingStatus::Cancelled)
    }

    async fn total_service_minutes(&self, booking: &Booking) -> PortResult<u32> {
        let mut total = 0u32;
        for service_id in &booking.service_ids {
            match self.db.get_service_by_id(*service_id).await {
                Ok(service) => total += service.duration_minutes,
                Err(PortError::NotFound(_)) => {
                    warn!(
                        booking_id = %booking.id,
                        service_id = %service_id,
                        "Booked service no longer exists"
                    );
                }
                Err(e) => return Err(e),
            }
        }
        Ok(total)
    }

    async fn notify(&self, kind: NotificationKind, booking: &Booking) -> PortResult<()> {
        let recipient = self.db.get_user_by_id(booking.user_id).await?;
        if let Err(e) = self.notifier.send(kind, booking, &recipient).await {
            warn!(booking_id = %booking.id, kind = ?kind, "Notification failed: {}", e);
        }
        Ok(())
    }

    async fn finish(
        &self,
        checkpoint: &WorkflowCheckpoint,
        status: WorkflowRunStatus,
    ) -> PortResult<ResumeOutcome> {
        let booking_id = checkpoint.booking_id;
        self.scheduler.remove_checkpoint(booking_id).await?;

        let now = self.clock.now();
        let label = match status {
            WorkflowRunStatus::Cancelled => "cancelled".to_string(),
            _ => WorkflowStep::Finished.to_string(),
        };
        self.mirror(booking_id, |state| {
            state.current_step = label;
            state.status = status;
            state.completed_at = Some(now);
        })
        .await;
        info!(booking_id = %booking_id, status = %status, "Workflow finished");
        Ok(ResumeOutcome::Finished(status))
    }

    async fn fail(&self, booking_id: Uuid, cause: &PortError) {
        error!(booking_id = %booking_id, "Workflow step failed: {}", cause);
        let now = self.clock.now();
        let message = cause.to_string();
        self.mirror(booking_id, |state| {
            state.status = WorkflowRunStatus::Failed;
            state.error = Some(message);
            state.completed_at = Some(now);
        })
        .await;
        if let Err(e) = self.scheduler.remove_checkpoint(booking_id).await {
            error!(booking_id = %booking_id, "Could not remove failed workflow checkpoint: {}", e);
        }
    }

    async fn mirror_step(&self, booking_id: Uuid, step: WorkflowStep) {
        self.mirror(booking_id, |state| state.current_step = step.to_string())
            .await;
    }

    /// Best-effort update of the observability record.
    async fn mirror<F>(&self, booking_id: Uuid, update: F)
    where
        F: FnOnce(&mut WorkflowState) + Send,
    {
        let mut state = match self.db.get_workflow_state(booking_id).await {
            Ok(state) => state,
            Err(e) => {
                warn!(booking_id = %booking_id, "Workflow state unavailable: {}", e);
                return;
            }
        };
        update(&mut state);
        if let Err(e) = self.db.save_workflow_state(&state).await {
            warn!(booking_id = %booking_id, "Could not update workflow state: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{sample_booking, MemoryStore, RecordingNotifier, TestClock};
    use chrono::TimeZone;

    struct Harness {
        store: Arc<MemoryStore>,
        notifier: Arc<RecordingNotifier>,
        clock: Arc<TestClock>,
        workflow: BookingWorkflow,
    }

    fn harness(now: DateTime<Utc>) -> Harness {
        let store = Arc::new(MemoryStore::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let clock = Arc::new(TestClock::new(now));
        let workflow =
            BookingWorkflow::new(store.clone(), store.clone(), notifier.clone(), clock.clone());
        Harness {
            store,
            notifier,
            clock,
            workflow,
        }
    }

    fn created_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 10, 9, 0, 0).unwrap()
    }

    /// Inserts a booking with its bookkeeping rows, as booking creation does.
    async fn book(h: &Harness, scheduled_at: DateTime<Utc>, status: BookingStatus) -> Booking {
        let mut booking = sample_booking(&h.store, scheduled_at).await;
        booking.status = status;
        h.store.put_booking(booking.clone());
        let (state, checkpoint) = BookingWorkflow::initial_records(&booking, h.clock.now());
        h.store.put_workflow_state(state);
        h.workflow.scheduler.save_checkpoint(&checkpoint).await.unwrap();
        booking
    }

    #[test]
    fn service_window_falls_back_when_durations_are_zero() {
        assert_eq!(service_window(0), Duration::minutes(90));
        assert_eq!(service_window(120), Duration::minutes(150));
    }

    #[tokio::test]
    async fn full_lifecycle_sends_each_notification_once_in_order() {
        let h = harness(created_at());
        let scheduled = created_at() + Duration::days(5);
        let booking = book(&h, scheduled, BookingStatus::Confirmed).await;

        let outcome = h.workflow.resume(booking.id).await.unwrap();
        assert_eq!(
            outcome,
            ResumeOutcome::Suspended {
                step: WorkflowStep::ReminderWait,
                until: scheduled - reminder_lead()
            }
        );

        h.clock.set(scheduled - reminder_lead());
        let outcome = h.workflow.resume(booking.id).await.unwrap();
        assert_eq!(
            outcome,
            ResumeOutcome::Suspended {
                step: WorkflowStep::ScheduledWait,
                until: scheduled
            }
        );

        h.clock.set(scheduled);
        let outcome = h.workflow.resume(booking.id).await.unwrap();
        // sample services last 120 minutes in total
        assert_eq!(
            outcome,
            ResumeOutcome::Suspended {
                step: WorkflowStep::ServiceDuration,
                until: scheduled + Duration::minutes(150)
            }
        );
        assert_eq!(h.store.booking(booking.id).status, BookingStatus::InProgress);

        h.clock.set(scheduled + Duration::minutes(150));
        let outcome = h.workflow.resume(booking.id).await.unwrap();
        assert_eq!(outcome, ResumeOutcome::Finished(WorkflowRunStatus::Completed));

        assert_eq!(
            h.notifier.kinds(),
            vec![
                NotificationKind::BookingConfirmation,
                NotificationKind::BookingReminder,
                NotificationKind::CompletionFollowUp,
            ]
        );
        let state = h.store.workflow_state(booking.id);
        assert_eq!(state.status, WorkflowRunStatus::Completed);
        assert_eq!(state.current_step, "finished");
        assert!(state.completed_at.is_some());
        assert!(h.store.checkpoint(booking.id).is_none());
    }

    #[tokio::test]
    async fn booking_within_a_day_skips_the_reminder() {
        let h = harness(created_at());
        let scheduled = created_at() + Duration::hours(6);
        let booking = book(&h, scheduled, BookingStatus::Confirmed).await;

        let outcome = h.workflow.resume(booking.id).await.unwrap();
        assert_eq!(
            outcome,
            ResumeOutcome::Suspended {
                step: WorkflowStep::ScheduledWait,
                until: scheduled
            }
        );
        assert_eq!(h.notifier.kinds(), vec![NotificationKind::BookingConfirmation]);
    }

    #[tokio::test]
    async fn early_or_repeated_wakeups_do_not_resend() {
        let h = harness(created_at());
        let booking = book(&h, created_at() + Duration::days(3), BookingStatus::Confirmed).await;

        h.workflow.resume(booking.id).await.unwrap();
        let outcome = h.workflow.resume(booking.id).await.unwrap();
        assert!(matches!(outcome, ResumeOutcome::NotDue { .. }));
        assert_eq!(h.notifier.kinds().len(), 1);
    }

    #[tokio::test]
    async fn recorded_step_is_not_replayed_after_restart() {
        let h = harness(created_at());
        let booking = book(&h, created_at() + Duration::days(3), BookingStatus::Confirmed).await;

        // A checkpoint that still points at the confirmation but already
        // carries its idempotency key.
        let mut checkpoint = WorkflowCheckpoint::start(booking.id, created_at());
        checkpoint.mark_done(WorkflowStep::Confirmation);
        h.workflow.scheduler.save_checkpoint(&checkpoint).await.unwrap();

        h.workflow.resume(booking.id).await.unwrap();
        assert!(h.notifier.kinds().is_empty());
    }

    #[tokio::test]
    async fn cancellation_before_appointment_stops_everything() {
        let h = harness(created_at());
        let scheduled = created_at() + Duration::days(3);
        let booking = book(&h, scheduled, BookingStatus::Confirmed).await;

        h.workflow.resume(booking.id).await.unwrap();
        h.clock.set(scheduled - reminder_lead());
        h.workflow.resume(booking.id).await.unwrap();

        h.store.set_status(booking.id, BookingStatus::Cancelled);
        h.clock.set(scheduled);
        let outcome = h.workflow.resume(booking.id).await.unwrap();
        assert_eq!(outcome, ResumeOutcome::Finished(WorkflowRunStatus::Cancelled));

        assert_eq!(h.store.booking(booking.id).status, BookingStatus::Cancelled);
        assert_eq!(
            h.notifier.kinds(),
            vec![NotificationKind::BookingConfirmation, NotificationKind::BookingReminder]
        );
        assert_eq!(h.store.workflow_state(booking.id).status, WorkflowRunStatus::Cancelled);
        assert!(h.store.checkpoint(booking.id).is_none());
    }

    #[tokio::test]
    async fn cancellation_before_reminder_skips_it() {
        let h = harness(created_at());
        let scheduled = created_at() + Duration::days(3);
        let booking = book(&h, scheduled, BookingStatus::Pending).await;

        h.workflow.resume(booking.id).await.unwrap();
        h.store.set_status(booking.id, BookingStatus::Cancelled);
        h.clock.set(scheduled - reminder_lead());
        let outcome = h.workflow.resume(booking.id).await.unwrap();

        assert_eq!(outcome, ResumeOutcome::Finished(WorkflowRunStatus::Cancelled));
        assert_eq!(h.notifier.kinds(), vec![NotificationKind::BookingConfirmation]);
    }

    #[tokio::test]
    async fn pending_booking_is_not_started_but_gets_follow_up() {
        let h = harness(created_at());
        let scheduled = created_at() + Duration::hours(2);
        let booking = book(&h, scheduled, BookingStatus::Pending).await;

        h.workflow.resume(booking.id).await.unwrap();
        h.clock.set(scheduled);
        h.workflow.resume(booking.id).await.unwrap();
        assert_eq!(h.store.booking(booking.id).status, BookingStatus::Pending);

        h.clock.set(scheduled + Duration::hours(4));
        let outcome = h.workflow.resume(booking.id).await.unwrap();
        assert_eq!(outcome, ResumeOutcome::Finished(WorkflowRunStatus::Completed));
        assert_eq!(
            h.notifier.kinds().last(),
            Some(&NotificationKind::CompletionFollowUp)
        );
    }

    #[tokio::test]
    async fn notification_failure_does_not_block_progress() {
        let h = harness(created_at());
        h.notifier.fail_all();
        let booking = book(&h, created_at() + Duration::days(2), BookingStatus::Confirmed).await;

        let outcome = h.workflow.resume(booking.id).await.unwrap();
        assert!(matches!(
            outcome,
            ResumeOutcome::Suspended {
                step: WorkflowStep::ReminderWait,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn storage_error_marks_run_failed() {
        let h = harness(created_at());
        let booking = book(&h, created_at() + Duration::days(2), BookingStatus::Confirmed).await;
        h.store.remove_booking(booking.id);

        let result = h.workflow.resume(booking.id).await;
        assert!(matches!(result, Err(PortError::NotFound(_))));

        let state = h.store.workflow_state(booking.id);
        assert_eq!(state.status, WorkflowRunStatus::Failed);
        assert!(state.error.is_some());
        assert!(h.store.checkpoint(booking.id).is_none());
    }

    #[tokio::test]
    async fn concurrent_resumes_confirm_once() {
        let h = harness(created_at());
        h.notifier.yield_before_send();
        let booking = book(&h, created_at() + Duration::days(3), BookingStatus::Confirmed).await;

        let (first, second) =
            tokio::join!(h.workflow.resume(booking.id), h.workflow.resume(booking.id));
        let outcomes = [first.unwrap(), second.unwrap()];

        assert!(outcomes.contains(&ResumeOutcome::Busy));
        assert!(outcomes
            .iter()
            .any(|o| matches!(o, ResumeOutcome::Suspended { .. })));
        assert_eq!(h.notifier.kinds(), vec![NotificationKind::BookingConfirmation]);
    }

    #[tokio::test]
    async fn claimed_checkpoint_is_not_resumed_inline() {
        let h = harness(created_at());
        h.notifier.yield_before_send();
        let booking = book(&h, created_at() + Duration::days(3), BookingStatus::Confirmed).await;

        let claimed = h
            .store
            .claim_due(created_at(), Duration::minutes(5), 32)
            .await
            .unwrap();
        assert_eq!(claimed, vec![booking.id]);

        let (polled, inline) = tokio::join!(
            h.workflow.resume_claimed(booking.id),
            h.workflow.resume(booking.id)
        );
        assert!(matches!(polled.unwrap(), ResumeOutcome::Suspended { .. }));
        assert_eq!(inline.unwrap(), ResumeOutcome::Busy);
        assert_eq!(h.notifier.kinds(), vec![NotificationKind::BookingConfirmation]);
    }

    #[tokio::test]
    async fn saving_progress_keeps_the_lease() {
        let h = harness(created_at());
        let booking = book(&h, created_at() + Duration::days(3), BookingStatus::Confirmed).await;
        let lease = Duration::minutes(5);

        assert!(h.store.try_lease(booking.id, created_at(), lease).await.unwrap());
        let checkpoint = h.store.checkpoint(booking.id).unwrap();
        h.store.save_checkpoint(&checkpoint).await.unwrap();
        assert!(h.store.claim_due(created_at(), lease, 32).await.unwrap().is_empty());
        assert!(!h.store.try_lease(booking.id, created_at(), lease).await.unwrap());

        h.store.release_lease(booking.id).await.unwrap();
        assert_eq!(
            h.store.claim_due(created_at(), lease, 32).await.unwrap(),
            vec![booking.id]
        );
    }

    #[tokio::test]
    async fn parked_run_is_claimable_once_due() {
        let h = harness(created_at());
        let scheduled = created_at() + Duration::days(3);
        let booking = book(&h, scheduled, BookingStatus::Confirmed).await;
        let lease = Duration::minutes(5);

        h.workflow.resume(booking.id).await.unwrap();
        assert!(h.store.claim_due(created_at(), lease, 32).await.unwrap().is_empty());

        let due = scheduled - reminder_lead();
        assert_eq!(h.store.claim_due(due, lease, 32).await.unwrap(), vec![booking.id]);
    }

    #[tokio::test]
    async fn missing_checkpoint_is_reported() {
        let h = harness(created_at());
        let outcome = h.workflow.resume(Uuid::new_v4()).await.unwrap();
        assert_eq!(outcome, ResumeOutcome::Missing);
    }

    #[test]
    fn idempotency_keys_name_the_booking_and_step() {
        let id = Uuid::nil();
        let checkpoint = WorkflowCheckpoint::start(id, created_at());
        assert_eq!(
            checkpoint.idempotency_key(WorkflowStep::Reminder),
            format!("booking-{}:reminder", id)
        );
    }
}
