//! crates/detailing_core/src/bookings.rs
//!
//! The customer booking flow and operator status changes.
//!
//! A booking is priced on the server at creation time. The price snapshot,
//! the pricing-history record, the workflow bookkeeping and the first
//! workflow checkpoint are handed to storage as one unit, after which the
//! lifecycle workflow is started.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use crate::domain::{
    Booking, BookingStatus, DemandLevel, Location, PricingHistory, Service, VehicleType,
};
use crate::policy::{authorize, Action, Actor, Resource};
use crate::ports::{Clock, DatabaseService, NewBookingRecords, PortError, PortResult};
use crate::pricing::{PriceBreakdown, PricingEngine, QuoteRequest};
use crate::validation::{is_valid_zip, Violations};
use crate::workflow::BookingWorkflow;

/// A quote request from a signed-in customer.
#[derive(Debug, Clone, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct QuoteInput {
    pub service_ids: Vec<Uuid>,
    pub vehicle_type: VehicleType,
    pub scheduled_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CreateBookingRequest {
    pub vehicle_id: Uuid,
    pub service_ids: Vec<Uuid>,
    pub scheduled_at: DateTime<Utc>,
    pub location: Location,
    pub notes: Option<String>,
}

fn validate_request(request: &CreateBookingRequest, now: DateTime<Utc>) -> PortResult<()> {
    let location = &request.location;
    let mut v = Violations::new();
    v.check(
        !request.service_ids.is_empty(),
        "at least one service must be selected",
    )
    .check(request.scheduled_at > now, "scheduled time must be in the future")
    .min_len("address", &location.address, 5)
    .min_len("city", &location.city, 2)
    .min_len("state", &location.state, 2)
    .check(
        is_valid_zip(location.zip_code.trim()),
        "zip code must be 5 digits, optionally followed by -4 digits",
    );
    v.finish()
}

fn reject_inactive(services: &[Service]) -> PortResult<()> {
    let inactive: Vec<&str> = services
        .iter()
        .filter(|s| !s.is_active)
        .map(|s| s.name.as_str())
        .collect();
    if inactive.is_empty() {
        Ok(())
    } else {
        Err(PortError::Validation(format!(
            "services are no longer offered: {}",
            inactive.join(", ")
        )))
    }
}

#[derive(Clone)]
pub struct BookingService {
    db: Arc<dyn DatabaseService>,
    pricing: PricingEngine,
    workflow: BookingWorkflow,
    clock: Arc<dyn Clock>,
}

impl BookingService {
    pub fn new(
        db: Arc<dyn DatabaseService>,
        pricing: PricingEngine,
        workflow: BookingWorkflow,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            db,
            pricing,
            workflow,
            clock,
        }
    }

    /// Prices a prospective booking. Guests never get a loyalty discount.
    pub async fn quote(
        &self,
        actor: Option<&Actor>,
        input: QuoteInput,
    ) -> PortResult<PriceBreakdown> {
        let request = QuoteRequest {
            service_ids: input.service_ids,
            vehicle_type: input.vehicle_type,
            scheduled_at: input.scheduled_at,
            customer_id: actor.map(|a| a.user_id),
        };
        self.pricing.calculate_price(&request).await
    }

    pub async fn create_booking(
        &self,
        actor: &Actor,
        request: CreateBookingRequest,
    ) -> PortResult<Booking> {
        let now = self.clock.now();
        validate_request(&request, now)?;

        let vehicle = self.db.get_vehicle_by_id(request.vehicle_id).await?;
        authorize(actor, Action::ManageVehicle, Resource::OwnedBy(vehicle.user_id))?;

        let services = self.pricing.load_services(&request.service_ids).await?;
        reject_inactive(&services)?;

        let tenant_id = vehicle.tenant_id.or(actor.tenant_id);
        let status = self.initial_status(tenant_id).await?;

        let breakdown = self
            .pricing
            .price_loaded(
                &services,
                vehicle.vehicle_type,
                request.scheduled_at,
                Some(actor.user_id),
            )
            .await?;
        let features = self.pricing.features_for(request.scheduled_at);

        let booking = Booking {
            id: Uuid::new_v4(),
            user_id: actor.user_id,
            tenant_id,
            vehicle_id: vehicle.id,
            service_ids: request.service_ids,
            scheduled_at: request.scheduled_at,
            status,
            total_price: breakdown.final_price,
            pricing_factors: breakdown.pricing_factors(),
            location: request.location,
            notes: request.notes,
            completed_at: None,
            assigned_detailer_id: None,
            created_at: now,
        };
        let history = PricingHistory {
            id: Uuid::new_v4(),
            booking_id: booking.id,
            tenant_id,
            service_ids: booking.service_ids.clone(),
            vehicle_type: vehicle.vehicle_type.to_string(),
            scheduled_at: booking.scheduled_at,
            day_of_week: features.day_of_week,
            time_of_day: features.time_of_day(),
            demand_level: DemandLevel::from_multiplier(breakdown.demand_multiplier),
            base_price: breakdown.base_price,
            final_price: breakdown.final_price,
            was_accepted: true,
        };
        let (workflow_state, checkpoint) = BookingWorkflow::initial_records(&booking, now);

        let booking = self
            .db
            .create_booking(NewBookingRecords {
                booking,
                history,
                workflow_state,
                checkpoint,
            })
            .await?;
        info!(
            booking_id = %booking.id,
            status = %booking.status,
            total_price = %booking.total_price,
            "Created booking"
        );

        // Leased like any other run, so a concurrent poller claim makes this
        // a no-op. The run records its own failure; the booking itself stands.
        if let Err(e) = self.workflow.resume(booking.id).await {
            error!(booking_id = %booking.id, "Could not start booking workflow: {}", e);
        }
        Ok(booking)
    }

    async fn initial_status(&self, tenant_id: Option<Uuid>) -> PortResult<BookingStatus> {
        let Some(tenant_id) = tenant_id else {
            return Ok(BookingStatus::Pending);
        };
        let tenant = self.db.get_tenant_by_id(tenant_id).await?;
        Ok(if tenant.settings.auto_approve_bookings {
            BookingStatus::Confirmed
        } else {
            BookingStatus::Pending
        })
    }

    /// The caller's bookings, latest appointment first.
    pub async fn list_my_bookings(&self, actor: &Actor) -> PortResult<Vec<Booking>> {
        let mut bookings = self.db.get_bookings_by_user(actor.user_id).await?;
        bookings.sort_by(|a, b| b.scheduled_at.cmp(&a.scheduled_at));
        Ok(bookings)
    }

    pub async fn get_booking(&self, actor: &Actor, booking_id: Uuid) -> PortResult<Booking> {
        let booking = self.db.get_booking_by_id(booking_id).await?;
        authorize(actor, Action::ViewBooking, Resource::OwnedBy(booking.user_id))?;
        Ok(booking)
    }

    pub async fn list_bookings(
        &self,
        actor: &Actor,
        status: Option<BookingStatus>,
    ) -> PortResult<Vec<Booking>> {
        authorize(actor, Action::ListAllBookings, Resource::Platform)?;
        self.db.list_bookings(status).await
    }

    /// Operator status change, enforced against the lifecycle and applied
    /// with compare-and-set.
    pub async fn update_booking_status(
        &self,
        actor: &Actor,
        booking_id: Uuid,
        next: BookingStatus,
    ) -> PortResult<Booking> {
        authorize(actor, Action::UpdateBookingStatus, Resource::Platform)?;

        let current = self.db.get_booking_by_id(booking_id).await?;
        if !current.status.can_transition_to(next) {
            return Err(PortError::Validation(format!(
                "cannot move booking from {} to {}",
                current.status, next
            )));
        }

        let completed_at = (next == BookingStatus::Completed).then(|| self.clock.now());
        let applied = self
            .db
            .transition_booking_status(booking_id, current.status, next, completed_at)
            .await?;
        if !applied {
            return Err(PortError::Validation(
                "booking status changed concurrently; reload and retry".to_string(),
            ));
        }

        info!(
            booking_id = %booking_id,
            from = %current.status,
            to = %next,
            "Booking status updated"
        );
        self.db.get_booking_by_id(booking_id).await
    }

    pub async fn completed_booking_count(&self, user_id: Uuid) -> PortResult<u32> {
        self.db.count_completed_bookings(user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Role, TimeOfDay, WorkflowRunStatus};
    use crate::ports::{NotificationKind, WorkflowScheduler};
    use crate::test_support::Fixture;
    use crate::workflow::WorkflowStep;
    use chrono::{Duration, TimeZone};
    use rust_decimal_macros::dec;

    /// Monday 2024-06-10 09:00 UTC.
    fn monday() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 10, 9, 0, 0).unwrap()
    }

    fn saturday_afternoon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 15, 15, 0, 0).unwrap()
    }

    fn location() -> Location {
        Location {
            address: "500 Market St".to_string(),
            city: "San Francisco".to_string(),
            state: "CA".to_string(),
            zip_code: "94105".to_string(),
        }
    }

    struct Setup {
        fx: Fixture,
        bookings: BookingService,
        customer: Actor,
        request: CreateBookingRequest,
    }

    async fn setup() -> Setup {
        let fx = Fixture::new(monday());
        let bookings = fx.booking_service();
        let customer = fx.actor(Role::Customer).await;
        let vehicle = fx.vehicle(&customer, VehicleType::Sedan).await;
        let service = fx.service("Exterior Wash", dec!(100), 60).await;
        let request = CreateBookingRequest {
            vehicle_id: vehicle.id,
            service_ids: vec![service.id],
            scheduled_at: saturday_afternoon(),
            location: location(),
            notes: None,
        };
        Setup {
            fx,
            bookings,
            customer,
            request,
        }
    }

    #[tokio::test]
    async fn create_booking_persists_everything_and_starts_workflow() {
        let s = setup().await;
        let booking = s.bookings.create_booking(&s.customer, s.request.clone()).await.unwrap();

        assert_eq!(booking.status, BookingStatus::Pending);
        assert_eq!(booking.total_price, dec!(152));
        assert_eq!(booking.pricing_factors.demand_multiplier, dec!(1.15));

        let history = s.fx.store.history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].booking_id, booking.id);
        assert_eq!(history[0].day_of_week, 6);
        assert_eq!(history[0].time_of_day, TimeOfDay::Afternoon);
        assert_eq!(history[0].demand_level, DemandLevel::High);
        assert_eq!(history[0].vehicle_type, "sedan");

        let state = s.fx.store.workflow_state(booking.id);
        assert_eq!(state.status, WorkflowRunStatus::Running);
        assert_eq!(state.current_step, WorkflowStep::ReminderWait.as_str());

        let checkpoint = s.fx.store.load_checkpoint(booking.id).await.unwrap().unwrap();
        assert_eq!(checkpoint.step, WorkflowStep::Reminder);
        assert_eq!(checkpoint.resume_at, saturday_afternoon() - Duration::hours(24));
        assert_eq!(s.fx.notifier.kinds(), vec![NotificationKind::BookingConfirmation]);
    }

    #[tokio::test]
    async fn auto_approving_tenant_confirms_immediately() {
        let s = setup().await;
        let tenant = s.fx.tenant("shine-co", true).await;
        let mut customer = s.customer.clone();
        customer.tenant_id = Some(tenant.id);

        let booking = s.bookings.create_booking(&customer, s.request.clone()).await.unwrap();
        assert_eq!(booking.status, BookingStatus::Confirmed);
        assert_eq!(booking.tenant_id, Some(tenant.id));
    }

    #[tokio::test]
    async fn invalid_request_writes_nothing() {
        let s = setup().await;
        let mut request = s.request.clone();
        request.location.zip_code = "9410".to_string();
        request.scheduled_at = monday() - Duration::hours(1);
        request.service_ids.clear();

        match s.bookings.create_booking(&s.customer, request).await {
            Err(PortError::Validation(msg)) => {
                assert!(msg.contains("zip"));
                assert!(msg.contains("future"));
                assert!(msg.contains("service"));
            }
            other => panic!("expected validation error, got {:?}", other),
        }
        assert!(s.fx.store.history().is_empty());
        assert!(s.fx.notifier.kinds().is_empty());
    }

    #[tokio::test]
    async fn cannot_book_someone_elses_vehicle() {
        let s = setup().await;
        let stranger = s.fx.actor(Role::Customer).await;
        let result = s.bookings.create_booking(&stranger, s.request.clone()).await;
        assert!(matches!(result, Err(PortError::Unauthorized)));
    }

    #[tokio::test]
    async fn inactive_services_cannot_be_booked() {
        let s = setup().await;
        let mut service = s.fx.store.service(s.request.service_ids[0]);
        service.is_active = false;
        s.fx.store.put_service(service);

        let result = s.bookings.create_booking(&s.customer, s.request.clone()).await;
        assert!(matches!(result, Err(PortError::Validation(_))));
    }

    #[tokio::test]
    async fn unknown_service_is_not_found() {
        let s = setup().await;
        let mut request = s.request.clone();
        request.service_ids.push(Uuid::new_v4());
        let result = s.bookings.create_booking(&s.customer, request).await;
        assert!(matches!(result, Err(PortError::NotFound(_))));
    }

    #[tokio::test]
    async fn quote_applies_loyalty_only_for_known_customers() {
        let s = setup().await;
        s.fx.store.set_completed_count(s.customer.user_id, 5);
        let input = QuoteInput {
            service_ids: s.request.service_ids.clone(),
            vehicle_type: VehicleType::Sedan,
            scheduled_at: saturday_afternoon(),
        };

        let guest = s.bookings.quote(None, input.clone()).await.unwrap();
        let loyal = s.bookings.quote(Some(&s.customer), input).await.unwrap();
        assert_eq!(guest.final_price, dec!(152));
        assert_eq!(loyal.final_price, dec!(137));
    }

    #[tokio::test]
    async fn operator_status_changes_follow_the_lifecycle() {
        let s = setup().await;
        let admin = s.fx.actor(Role::Admin).await;
        let booking = s.bookings.create_booking(&s.customer, s.request.clone()).await.unwrap();

        assert!(matches!(
            s.bookings
                .update_booking_status(&s.customer, booking.id, BookingStatus::Confirmed)
                .await,
            Err(PortError::Unauthorized)
        ));
        assert!(matches!(
            s.bookings
                .update_booking_status(&admin, booking.id, BookingStatus::Completed)
                .await,
            Err(PortError::Validation(_))
        ));

        let confirmed = s
            .bookings
            .update_booking_status(&admin, booking.id, BookingStatus::Confirmed)
            .await
            .unwrap();
        assert_eq!(confirmed.status, BookingStatus::Confirmed);

        s.bookings
            .update_booking_status(&admin, booking.id, BookingStatus::InProgress)
            .await
            .unwrap();
        let completed = s
            .bookings
            .update_booking_status(&admin, booking.id, BookingStatus::Completed)
            .await
            .unwrap();
        assert_eq!(completed.completed_at, Some(monday()));
        assert_eq!(s.bookings.completed_booking_count(s.customer.user_id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn bookings_are_private_to_their_owner() {
        let s = setup().await;
        let stranger = s.fx.actor(Role::Customer).await;
        let admin = s.fx.actor(Role::Admin).await;
        let booking = s.bookings.create_booking(&s.customer, s.request.clone()).await.unwrap();

        assert!(s.bookings.get_booking(&s.customer, booking.id).await.is_ok());
        assert!(s.bookings.get_booking(&admin, booking.id).await.is_ok());
        assert!(matches!(
            s.bookings.get_booking(&stranger, booking.id).await,
            Err(PortError::Unauthorized)
        ));
        assert!(matches!(
            s.bookings.list_bookings(&s.customer, None).await,
            Err(PortError::Unauthorized)
        ));
        assert_eq!(s.bookings.list_bookings(&admin, None).await.unwrap().len(), 1);
        assert_eq!(s.bookings.list_my_bookings(&s.customer).await.unwrap().len(), 1);
    }
}
