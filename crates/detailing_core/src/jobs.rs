//! crates/detailing_core/src/jobs.rs
//!
//! Periodic maintenance. The service runs these on a cron schedule; operators
//! can also trigger them on demand. Each job only reads closed windows so it
//! can run alongside live booking traffic.

use chrono::{DateTime, Duration, FixedOffset, NaiveTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::domain::{BookingStatus, MetricRecord, TimeOfDay};
use crate::ports::{Clock, DatabaseService, PortError, PortResult};
use crate::pricing::round_display;

pub const KNOWLEDGE_WINDOW_DAYS: i64 = 30;
pub const HISTORY_RETENTION_DAYS: i64 = 90;

pub const METRIC_DAILY_BOOKINGS: &str = "daily_bookings";
pub const METRIC_DAILY_REVENUE: &str = "daily_revenue";
pub const METRIC_DAILY_COMPLETED: &str = "daily_completed";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct DailyMetrics {
    /// Start of the summarized day.
    pub date: DateTime<Utc>,
    pub bookings: u64,
    pub revenue: Decimal,
    pub completed: u64,
}

/// Acceptance rate of one time-of-day slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct SlotAcceptance {
    pub time_of_day: TimeOfDay,
    pub total: u64,
    pub accepted: u64,
    pub acceptance_rate: Decimal,
}

/// `[yesterday 00:00, today 00:00)` in the reference timezone, as UTC.
pub fn previous_day_window(
    now: DateTime<Utc>,
    offset: FixedOffset,
) -> PortResult<(DateTime<Utc>, DateTime<Utc>)> {
    let today = now.with_timezone(&offset).date_naive();
    let midnight = offset
        .from_local_datetime(&today.and_time(NaiveTime::MIN))
        .single()
        .ok_or_else(|| PortError::Unexpected("ambiguous local midnight".to_string()))?
        .with_timezone(&Utc);
    Ok((midnight - Duration::days(1), midnight))
}

#[derive(Clone)]
pub struct Jobs {
    db: Arc<dyn DatabaseService>,
    clock: Arc<dyn Clock>,
    offset: FixedOffset,
}

impl Jobs {
    pub fn new(db: Arc<dyn DatabaseService>, clock: Arc<dyn Clock>, offset: FixedOffset) -> Self {
        Self { db, clock, offset }
    }

    /// Recomputes per-slot acceptance over the 30 closed days before today.
    pub async fn refresh_pricing_knowledge(&self) -> PortResult<Vec<SlotAcceptance>> {
        let (_, today) = previous_day_window(self.clock.now(), self.offset)?;
        let start = today - Duration::days(KNOWLEDGE_WINDOW_DAYS);
        let records: Vec<_> = self
            .db
            .get_pricing_history_between(start, today)
            .await?
            .into_iter()
            .filter(|r| r.scheduled_at < today)
            .collect();

        let mut slots: BTreeMap<&'static str, (TimeOfDay, u64, u64)> = BTreeMap::new();
        for record in &records {
            let slot = slots
                .entry(record.time_of_day.as_str())
                .or_insert((record.time_of_day, 0, 0));
            slot.1 += 1;
            if record.was_accepted {
                slot.2 += 1;
            }
        }

        let summary: Vec<SlotAcceptance> = slots
            .into_values()
            .map(|(time_of_day, total, accepted)| SlotAcceptance {
                time_of_day,
                total,
                accepted,
                acceptance_rate: round_display(
                    Decimal::from(accepted) * Decimal::ONE_HUNDRED / Decimal::from(total),
                ),
            })
            .collect();

        for slot in &summary {
            info!(
                time_of_day = %slot.time_of_day,
                total = slot.total,
                acceptance_rate = %slot.acceptance_rate,
                "Slot acceptance"
            );
        }
        info!(records = records.len(), "Pricing knowledge refreshed");
        Ok(summary)
    }

    /// Rolls up the previous closed day and stores three metric records.
    pub async fn calculate_daily_analytics(&self) -> PortResult<DailyMetrics> {
        let (start, end) = previous_day_window(self.clock.now(), self.offset)?;
        let bookings = self.db.list_bookings_scheduled_between(start, end).await?;

        let completed: Vec<_> = bookings
            .iter()
            .filter(|b| b.status == BookingStatus::Completed)
            .collect();
        let metrics = DailyMetrics {
            date: start,
            bookings: bookings.len() as u64,
            revenue: round_display(completed.iter().map(|b| b.total_price).sum()),
            completed: completed.len() as u64,
        };

        for (name, value) in [
            (METRIC_DAILY_BOOKINGS, Decimal::from(metrics.bookings)),
            (METRIC_DAILY_REVENUE, metrics.revenue),
            (METRIC_DAILY_COMPLETED, Decimal::from(metrics.completed)),
        ] {
            self.db
                .save_metric(MetricRecord {
                    id: Uuid::new_v4(),
                    tenant_id: None,
                    date: start,
                    metric: name.to_string(),
                    value,
                })
                .await?;
        }

        info!(
            date = %start,
            bookings = metrics.bookings,
            revenue = %metrics.revenue,
            "Daily analytics stored"
        );
        Ok(metrics)
    }

    /// Drops pricing history older than the retention window.
    pub async fn cleanup_old_data(&self) -> PortResult<u64> {
        let cutoff = self.clock.now() - Duration::days(HISTORY_RETENTION_DAYS);
        let deleted = self.db.delete_pricing_history_before(cutoff).await?;
        info!(deleted, cutoff = %cutoff, "Old pricing history removed");
        Ok(deleted)
    }
}
