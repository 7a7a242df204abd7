//! crates/detailing_core/src/analytics.rs
//!
//! Read-side rollups over a window of pricing history.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::domain::PricingHistory;
use crate::policy::{authorize, Action, Actor, Resource};
use crate::ports::{DatabaseService, PortError, PortResult};
use crate::pricing::round_display;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct VehicleTypeStats {
    /// The vehicle type string as recorded at booking time.
    pub vehicle_type: String,
    pub count: u64,
    pub avg_price: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct PricingAnalytics {
    pub total_bookings: u64,
    pub accepted_bookings: u64,
    /// Percentage, two decimals.
    pub acceptance_rate: Decimal,
    pub avg_base_price: Decimal,
    pub avg_final_price: Decimal,
    /// Sorted by vehicle type.
    pub price_by_vehicle_type: Vec<VehicleTypeStats>,
}

fn mean(sum: Decimal, count: u64) -> Decimal {
    if count == 0 {
        Decimal::ZERO
    } else {
        round_display(sum / Decimal::from(count))
    }
}

/// Summarizes a set of records. An empty set yields zeros throughout.
pub fn summarize(records: &[PricingHistory]) -> PricingAnalytics {
    let total = records.len() as u64;
    let accepted = records.iter().filter(|r| r.was_accepted).count() as u64;

    let acceptance_rate = if total == 0 {
        Decimal::ZERO
    } else {
        round_display(Decimal::from(accepted) * Decimal::ONE_HUNDRED / Decimal::from(total))
    };

    let base_sum: Decimal = records.iter().map(|r| r.base_price).sum();
    let final_sum: Decimal = records.iter().map(|r| r.final_price).sum();

    let mut groups: BTreeMap<&str, (u64, Decimal)> = BTreeMap::new();
    for record in records {
        let entry = groups
            .entry(record.vehicle_type.as_str())
            .or_insert((0, Decimal::ZERO));
        entry.0 += 1;
        entry.1 += record.final_price;
    }

    PricingAnalytics {
        total_bookings: total,
        accepted_bookings: accepted,
        acceptance_rate,
        avg_base_price: mean(base_sum, total),
        avg_final_price: mean(final_sum, total),
        price_by_vehicle_type: groups
            .into_iter()
            .map(|(vehicle_type, (count, sum))| VehicleTypeStats {
                vehicle_type: vehicle_type.to_string(),
                count,
                avg_price: mean(sum, count),
            })
            .collect(),
    }
}

#[derive(Clone)]
pub struct AnalyticsService {
    db: Arc<dyn DatabaseService>,
}

impl AnalyticsService {
    pub fn new(db: Arc<dyn DatabaseService>) -> Self {
        Self { db }
    }

    /// Rollup over records scheduled within `[start, end]`.
    pub async fn pricing_analytics(
        &self,
        actor: &Actor,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> PortResult<PricingAnalytics> {
        authorize(actor, Action::ViewPricingAnalytics, Resource::Platform)?;
        if end < start {
            return Err(PortError::Validation(
                "end date must not be before start date".to_string(),
            ));
        }
        let records = self.db.get_pricing_history_between(start, end).await?;
        Ok(summarize(&records))
    }
}
