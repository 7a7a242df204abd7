//! services/api/src/web/state.rs
//!
//! Defines the application's shared state: the core use cases, wired once at
//! startup against the concrete adapters and handed to every handler.

use crate::config::Config;
use chrono::{Duration as ChronoDuration, FixedOffset};
use detailing_core::analytics::AnalyticsService;
use detailing_core::assessments::AssessmentService;
use detailing_core::bookings::BookingService;
use detailing_core::catalog::CatalogService;
use detailing_core::jobs::Jobs;
use detailing_core::ports::{Clock, DatabaseService, NotificationService, WorkflowScheduler};
use detailing_core::pricing::{InsightSource, PricingEngine};
use detailing_core::tenants::TenantService;
use detailing_core::users::UserService;
use detailing_core::vehicles::VehicleService;
use detailing_core::workflow::{BookingWorkflow, DEFAULT_LEASE_SECONDS};
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub users: UserService,
    pub catalog: CatalogService,
    pub vehicles: VehicleService,
    pub bookings: BookingService,
    pub analytics: AnalyticsService,
    pub tenants: TenantService,
    pub assessments: AssessmentService,
    pub jobs: Jobs,
    pub workflow: BookingWorkflow,
}

impl AppState {
    /// Builds every use case from the adapters.
    pub fn new(
        config: Arc<Config>,
        db: Arc<dyn DatabaseService>,
        scheduler: Arc<dyn WorkflowScheduler>,
        notifier: Arc<dyn NotificationService>,
        insights: Option<InsightSource>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let offset: FixedOffset = config.pricing_offset;
        let pricing = PricingEngine::new(db.clone(), insights, offset);
        let lease = ChronoDuration::from_std(config.workflow.lease)
            .unwrap_or_else(|_| ChronoDuration::seconds(DEFAULT_LEASE_SECONDS));
        let workflow = BookingWorkflow::new(db.clone(), scheduler, notifier, clock.clone())
            .with_lease(lease);

        Self {
            users: UserService::new(db.clone()),
            catalog: CatalogService::new(db.clone()),
            vehicles: VehicleService::new(db.clone(), clock.clone()),
            bookings: BookingService::new(db.clone(), pricing, workflow.clone(), clock.clone()),
            analytics: AnalyticsService::new(db.clone()),
            tenants: TenantService::new(db.clone(), clock.clone()),
            assessments: AssessmentService::new(db.clone(), clock.clone()),
            jobs: Jobs::new(db, clock, offset),
            workflow,
            config,
        }
    }
}
