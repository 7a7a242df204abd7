//! crates/detailing_core/src/pricing.rs
//!
//! The dynamic pricing calculator used by the booking flow.
//!
//! Pricing is a pure multiplier pipeline over the selected services:
//! `base × demand × seasonal × time-of-day × (1 − loyalty)`, rounded once at the
//! end. The knowledge base is consulted only for human-readable insights and
//! never changes the number.

use chrono::{DateTime, Datelike, FixedOffset, Timelike, Utc};
use futures::future::try_join_all;
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::{PricingFactors, Service, TimeOfDay, VehicleType};
use crate::knowledge;
use crate::ports::{
    DatabaseService, EmbeddingService, KnowledgeFilter, KnowledgeStore, PortError, PortResult,
};

/// How many neighbours are fetched from the knowledge base.
const KNOWLEDGE_LIMIT: usize = 5;
/// How many of them are surfaced as insights.
const INSIGHT_LIMIT: usize = 3;

//=========================================================================================
// Rounding
//=========================================================================================

/// Rounds to the nearest whole currency unit, halves away from zero.
pub fn round_currency(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
}

/// Rounds to two decimal places for display.
pub fn round_display(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

//=========================================================================================
// Calendar Features & Multipliers
//=========================================================================================

/// The calendar facts the multipliers depend on, in the reference timezone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarFeatures {
    /// 0 = Sunday ... 6 = Saturday.
    pub day_of_week: u8,
    pub hour: u32,
    /// 0 = January ... 11 = December.
    pub month0: u32,
}

impl CalendarFeatures {
    pub fn from_timestamp(timestamp: DateTime<Utc>, offset: FixedOffset) -> Self {
        let local = timestamp.with_timezone(&offset);
        Self {
            day_of_week: local.weekday().num_days_from_sunday() as u8,
            hour: local.hour(),
            month0: local.month0(),
        }
    }

    pub fn is_weekend(&self) -> bool {
        self.day_of_week == 0 || self.day_of_week == 6
    }

    pub fn is_peak_season(&self) -> bool {
        (3..=8).contains(&self.month0)
    }

    pub fn time_of_day(&self) -> TimeOfDay {
        TimeOfDay::from_hour(self.hour)
    }
}

/// Weekend 1.15, Friday 1.10, any other day 0.95.
pub fn demand_multiplier(day_of_week: u8) -> Decimal {
    match day_of_week {
        0 | 6 => dec!(1.15),
        5 => dec!(1.10),
        _ => dec!(0.95),
    }
}

/// April through September 1.20, otherwise 0.90.
pub fn seasonal_multiplier(month0: u32) -> Decimal {
    if (3..=8).contains(&month0) {
        dec!(1.20)
    } else {
        dec!(0.90)
    }
}

/// 14:00 to 17:59 is 1.10, 08:00 to 11:59 is 0.90, otherwise 1.00.
pub fn time_multiplier(hour: u32) -> Decimal {
    match hour {
        14..=17 => dec!(1.10),
        8..=11 => dec!(0.90),
        _ => Decimal::ONE,
    }
}

/// 10% from five completed bookings, 5% from three, otherwise nothing.
pub fn loyalty_discount(completed_bookings: u32) -> Decimal {
    if completed_bookings >= 5 {
        dec!(0.10)
    } else if completed_bookings >= 3 {
        dec!(0.05)
    } else {
        Decimal::ZERO
    }
}

fn overflow() -> PortError {
    PortError::Validation("price exceeds the representable range".to_string())
}

/// `a × b`, or a `Validation` error instead of an arithmetic overflow.
pub fn checked_mul(a: Decimal, b: Decimal) -> PortResult<Decimal> {
    a.checked_mul(b).ok_or_else(overflow)
}

/// Sum of `base_price × multiplier[vehicle_type]` over the services.
pub fn base_price(services: &[Service], vehicle_type: VehicleType) -> PortResult<Decimal> {
    services.iter().try_fold(Decimal::ZERO, |total, s| {
        let multiplier = s.vehicle_type_multipliers.get(vehicle_type);
        let contribution = checked_mul(s.base_price, multiplier)?;
        total.checked_add(contribution).ok_or_else(overflow)
    })
}

//=========================================================================================
// Price Breakdown
//=========================================================================================

/// Rounded running totals for display. Only `final_price` is authoritative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct PriceCheckpoints {
    pub base: Decimal,
    pub after_demand: Decimal,
    pub after_seasonal: Decimal,
    pub after_time: Decimal,
    pub final_price: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct PriceBreakdown {
    pub base_price: Decimal,
    pub vehicle_multiplier: Decimal,
    pub demand_multiplier: Decimal,
    pub seasonal_multiplier: Decimal,
    pub time_multiplier: Decimal,
    pub loyalty_discount: Decimal,
    pub final_price: Decimal,
    pub checkpoints: PriceCheckpoints,
    pub time_of_day: TimeOfDay,
    pub insights: Vec<String>,
}

impl PriceBreakdown {
    /// The snapshot frozen onto a booking.
    pub fn pricing_factors(&self) -> PricingFactors {
        PricingFactors {
            base_price: self.base_price,
            vehicle_multiplier: self.vehicle_multiplier,
            demand_multiplier: self.demand_multiplier,
            seasonal_multiplier: self.seasonal_multiplier,
            loyalty_discount: self.loyalty_discount,
            final_price: self.final_price,
        }
    }
}

/// Prices a set of services. `completed_bookings` is `None` for guests, who
/// never get a loyalty discount. Fails with `Validation` if the catalog
/// values overflow the decimal range.
pub fn compute_price(
    services: &[Service],
    vehicle_type: VehicleType,
    features: CalendarFeatures,
    completed_bookings: Option<u32>,
) -> PortResult<PriceBreakdown> {
    let base = base_price(services, vehicle_type)?;
    let demand = demand_multiplier(features.day_of_week);
    let seasonal = seasonal_multiplier(features.month0);
    let time = time_multiplier(features.hour);
    let loyalty = completed_bookings.map(loyalty_discount).unwrap_or(Decimal::ZERO);

    let after_demand = checked_mul(base, demand)?;
    let after_seasonal = checked_mul(after_demand, seasonal)?;
    let before_discount = checked_mul(after_seasonal, time)?;
    let final_price = round_currency(checked_mul(before_discount, Decimal::ONE - loyalty)?);

    let vehicle_multiplier = services
        .first()
        .map(|s| s.vehicle_type_multipliers.get(vehicle_type))
        .unwrap_or(Decimal::ONE);

    Ok(PriceBreakdown {
        base_price: round_currency(base),
        vehicle_multiplier: round_display(vehicle_multiplier),
        demand_multiplier: round_display(demand),
        seasonal_multiplier: round_display(seasonal),
        time_multiplier: round_display(time),
        loyalty_discount: round_display(loyalty),
        final_price,
        checkpoints: PriceCheckpoints {
            base: round_currency(base),
            after_demand: round_currency(after_demand),
            after_seasonal: round_currency(after_seasonal),
            after_time: round_currency(before_discount),
            final_price,
        },
        time_of_day: features.time_of_day(),
        insights: Vec::new(),
    })
}

//=========================================================================================
// Pricing Engine (ports-backed)
//=========================================================================================

#[derive(Debug, Clone, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct QuoteRequest {
    pub service_ids: Vec<Uuid>,
    pub vehicle_type: VehicleType,
    pub scheduled_at: DateTime<Utc>,
    pub customer_id: Option<Uuid>,
}

/// The knowledge side channel. Both halves are optional at runtime.
#[derive(Clone)]
pub struct InsightSource {
    pub embedder: Arc<dyn EmbeddingService>,
    pub store: Arc<dyn KnowledgeStore>,
}

#[derive(Clone)]
pub struct PricingEngine {
    db: Arc<dyn DatabaseService>,
    insights: Option<InsightSource>,
    offset: FixedOffset,
}

impl PricingEngine {
    pub fn new(
        db: Arc<dyn DatabaseService>,
        insights: Option<InsightSource>,
        offset: FixedOffset,
    ) -> Self {
        Self {
            db,
            insights,
            offset,
        }
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    pub fn features_for(&self, timestamp: DateTime<Utc>) -> CalendarFeatures {
        CalendarFeatures::from_timestamp(timestamp, self.offset)
    }

    /// Loads the referenced services. Any unknown id is a `NotFound`.
    pub async fn load_services(&self, service_ids: &[Uuid]) -> PortResult<Vec<Service>> {
        try_join_all(service_ids.iter().map(|id| self.db.get_service_by_id(*id))).await
    }

    /// Computes a quote including advisory insights.
    pub async fn calculate_price(&self, request: &QuoteRequest) -> PortResult<PriceBreakdown> {
        let services = self.load_services(&request.service_ids).await?;
        self.price_loaded(
            &services,
            request.vehicle_type,
            request.scheduled_at,
            request.customer_id,
        )
        .await
    }

    /// Like [`calculate_price`](Self::calculate_price) with services already loaded.
    pub async fn price_loaded(
        &self,
        services: &[Service],
        vehicle_type: VehicleType,
        scheduled_at: DateTime<Utc>,
        customer_id: Option<Uuid>,
    ) -> PortResult<PriceBreakdown> {
        let features = self.features_for(scheduled_at);
        let completed = match customer_id {
            Some(user_id) => Some(self.db.count_completed_bookings(user_id).await?),
            None => None,
        };

        let mut breakdown = compute_price(services, vehicle_type, features, completed)?;
        breakdown.insights = self.insights(vehicle_type, features).await;
        debug!(
            final_price = %breakdown.final_price,
            services = services.len(),
            "Computed price quote"
        );
        Ok(breakdown)
    }

    /// Best-effort retrieval; any failure yields no insights.
    async fn insights(
        &self,
        vehicle_type: VehicleType,
        features: CalendarFeatures,
    ) -> Vec<String> {
        let Some(source) = &self.insights else {
            return Vec::new();
        };
        let query = knowledge::context_query(vehicle_type, features);

        let embedding = match source.embedder.embed(&query).await {
            Ok(embedding) => embedding,
            Err(e) => {
                warn!("Skipping pricing insights, embedding failed: {}", e);
                return Vec::new();
            }
        };

        match source
            .store
            .search_knowledge(&embedding, KNOWLEDGE_LIMIT, KnowledgeFilter::default())
            .await
        {
            Ok(hits) => hits
                .into_iter()
                .take(INSIGHT_LIMIT)
                .map(|hit| hit.item.content)
                .collect(),
            Err(e) => {
                warn!("Skipping pricing insights, knowledge search failed: {}", e);
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{MultiplierTable, ServiceCategory};
    use crate::ports::PortError;
    use chrono::TimeZone;

    fn service(base: Decimal, table: MultiplierTable) -> Service {
        Service {
            id: Uuid::new_v4(),
            tenant_id: None,
            name: "Express Exterior Wash".to_string(),
            description: "Quick exterior wash with hand dry.".to_string(),
            category: ServiceCategory::Exterior,
            base_price: base,
            duration_minutes: 30,
            is_active: true,
            vehicle_type_multipliers: table,
        }
    }

    fn features(y: i32, m: u32, d: u32, h: u32) -> CalendarFeatures {
        let ts = Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap();
        CalendarFeatures::from_timestamp(ts, FixedOffset::east_opt(0).unwrap())
    }

    #[test]
    fn saturday_afternoon_in_june_for_new_customer() {
        // 2024-06-15 is a Saturday.
        let services = [service(dec!(100), MultiplierTable::default())];
        let quote =
            compute_price(&services, VehicleType::Sedan, features(2024, 6, 15, 15), Some(0))
                .unwrap();

        assert_eq!(quote.base_price, dec!(100));
        assert_eq!(quote.demand_multiplier, dec!(1.15));
        assert_eq!(quote.seasonal_multiplier, dec!(1.20));
        assert_eq!(quote.time_multiplier, dec!(1.10));
        assert_eq!(quote.loyalty_discount, dec!(0));
        assert_eq!(quote.checkpoints.after_time, dec!(152));
        assert_eq!(quote.final_price, dec!(152));
    }

    #[test]
    fn loyal_customer_gets_ten_percent_off() {
        let services = [service(dec!(100), MultiplierTable::default())];
        let quote =
            compute_price(&services, VehicleType::Sedan, features(2024, 6, 15, 15), Some(5))
                .unwrap();
        // round(151.8 * 0.9) = round(136.62)
        assert_eq!(quote.final_price, dec!(137));
    }

    #[test]
    fn guests_never_get_a_discount() {
        let services = [service(dec!(100), MultiplierTable::default())];
        let quote =
            compute_price(&services, VehicleType::Sedan, features(2024, 6, 15, 15), None)
                .unwrap();
        assert_eq!(quote.loyalty_discount, Decimal::ZERO);
        assert_eq!(quote.final_price, dec!(152));
    }

    #[test]
    fn no_services_prices_to_zero() {
        let quote =
            compute_price(&[], VehicleType::Suv, features(2024, 1, 10, 9), Some(7)).unwrap();
        assert_eq!(quote.base_price, Decimal::ZERO);
        assert_eq!(quote.final_price, Decimal::ZERO);
        assert_eq!(quote.vehicle_multiplier, Decimal::ONE);
        assert_eq!(quote.demand_multiplier, dec!(0.95));
    }

    #[test]
    fn base_contribution_uses_vehicle_multiplier() {
        let table = MultiplierTable {
            suv: dec!(1.3),
            ..MultiplierTable::default()
        };
        let services = [service(dec!(49), table)];
        assert_eq!(base_price(&services, VehicleType::Suv).unwrap(), dec!(63.7));
        assert_eq!(base_price(&services, VehicleType::Sedan).unwrap(), dec!(49));
    }

    #[test]
    fn final_price_ignores_service_order() {
        let a = service(dec!(49), MultiplierTable::uniform(dec!(1.4)));
        let b = service(dec!(129), MultiplierTable::uniform(dec!(1.25)));
        let c = service(dec!(75.5), MultiplierTable::default());
        let when = features(2024, 10, 4, 16); // a Friday

        let forward =
            compute_price(&[a.clone(), b.clone(), c.clone()], VehicleType::Van, when, Some(3))
                .unwrap();
        let reversed = compute_price(&[c, b, a], VehicleType::Van, when, Some(3)).unwrap();
        assert_eq!(forward.final_price, reversed.final_price);
        assert!(forward.final_price >= Decimal::ZERO);
    }

    #[test]
    fn demand_covers_every_day_exactly_once() {
        let expected = [
            dec!(1.15),
            dec!(0.95),
            dec!(0.95),
            dec!(0.95),
            dec!(0.95),
            dec!(1.10),
            dec!(1.15),
        ];
        for (day, want) in expected.iter().enumerate() {
            assert_eq!(demand_multiplier(day as u8), *want);
        }
    }

    #[test]
    fn seasonal_and_time_boundaries() {
        assert_eq!(seasonal_multiplier(2), dec!(0.90));
        assert_eq!(seasonal_multiplier(3), dec!(1.20));
        assert_eq!(seasonal_multiplier(8), dec!(1.20));
        assert_eq!(seasonal_multiplier(9), dec!(0.90));

        assert_eq!(time_multiplier(7), Decimal::ONE);
        assert_eq!(time_multiplier(8), dec!(0.90));
        assert_eq!(time_multiplier(11), dec!(0.90));
        assert_eq!(time_multiplier(12), Decimal::ONE);
        assert_eq!(time_multiplier(14), dec!(1.10));
        assert_eq!(time_multiplier(17), dec!(1.10));
        assert_eq!(time_multiplier(18), Decimal::ONE);
    }

    #[test]
    fn loyalty_is_monotonic_with_two_steps() {
        let mut previous = Decimal::ZERO;
        let mut steps = 0;
        for count in 0..20 {
            let discount = loyalty_discount(count);
            assert!(discount >= previous);
            if discount != previous {
                steps += 1;
                assert!(count == 3 || count == 5);
            }
            previous = discount;
        }
        assert_eq!(steps, 2);
    }

    #[test]
    fn calendar_features_respect_reference_offset() {
        // 02:00 UTC Sunday is still Saturday evening at UTC-5.
        let ts = Utc.with_ymd_and_hms(2024, 6, 16, 2, 0, 0).unwrap();
        let eastern = FixedOffset::west_opt(5 * 3600).unwrap();
        let local = CalendarFeatures::from_timestamp(ts, eastern);
        assert_eq!(local.day_of_week, 6);
        assert_eq!(local.hour, 21);
        assert_eq!(local.time_of_day(), TimeOfDay::Evening);
    }

    #[test]
    fn rounding_is_half_up() {
        assert_eq!(round_currency(dec!(136.5)), dec!(137));
        assert_eq!(round_currency(dec!(136.49)), dec!(136));
        assert_eq!(round_display(dec!(66.665)), dec!(66.67));
    }

    #[test]
    fn oversized_catalog_values_fail_instead_of_panicking() {
        let huge = service(Decimal::MAX / dec!(2), MultiplierTable::uniform(dec!(3)));
        let result = compute_price(&[huge], VehicleType::Sedan, features(2024, 6, 15, 15), None);
        assert!(matches!(result, Err(PortError::Validation(_))));

        // The base fits, but the weekend demand factor pushes it over.
        let edge = service(Decimal::MAX, MultiplierTable::default());
        let result = compute_price(&[edge], VehicleType::Sedan, features(2024, 6, 15, 15), None);
        assert!(matches!(result, Err(PortError::Validation(_))));
    }

    async fn engine_with(embedder: crate::test_support::LetterEmbedder) -> (PricingEngine, Uuid) {
        use crate::test_support::{service_row, utc, MemoryStore};

        let store = Arc::new(MemoryStore::new());
        let wash = service_row("Hand Wash", dec!(100), 60);
        store.put_service(wash.clone());
        let embedder: Arc<dyn EmbeddingService> = Arc::new(embedder);
        knowledge::seed_knowledge(embedder.as_ref(), store.as_ref()).await.ok();

        let source = InsightSource {
            embedder,
            store: store.clone(),
        };
        (PricingEngine::new(store, Some(source), utc()), wash.id)
    }

    fn quote_request(service_id: Uuid) -> QuoteRequest {
        QuoteRequest {
            service_ids: vec![service_id],
            vehicle_type: VehicleType::Sedan,
            scheduled_at: Utc.with_ymd_and_hms(2024, 6, 15, 15, 0, 0).unwrap(),
            customer_id: None,
        }
    }

    #[tokio::test]
    async fn quote_carries_at_most_three_insights() {
        let (engine, service_id) = engine_with(Default::default()).await;
        let quote = engine.calculate_price(&quote_request(service_id)).await.unwrap();
        assert_eq!(quote.final_price, dec!(152));
        assert_eq!(quote.insights.len(), 3);
    }

    #[tokio::test]
    async fn failed_retrieval_leaves_price_untouched() {
        let failing = crate::test_support::LetterEmbedder::failing();
        let (engine, service_id) = engine_with(failing).await;
        let quote = engine.calculate_price(&quote_request(service_id)).await.unwrap();
        assert_eq!(quote.final_price, dec!(152));
        assert!(quote.insights.is_empty());
    }

    #[tokio::test]
    async fn unknown_service_fails_the_quote() {
        let (engine, _) = engine_with(Default::default()).await;
        let result = engine.calculate_price(&quote_request(Uuid::new_v4())).await;
        assert!(matches!(result, Err(PortError::NotFound(_))));
    }
}
