//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the customer and operator REST endpoints and
//! the master definition for the OpenAPI specification.

use crate::error::{ApiError, ErrorBody};
use crate::web::intake;
use crate::web::middleware::SUBJECT_HEADER;
use crate::web::state::AppState;
use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use chrono::{DateTime, Utc};
use detailing_core::analytics::{PricingAnalytics, VehicleTypeStats};
use detailing_core::bookings::{CreateBookingRequest, QuoteInput};
use detailing_core::catalog::{NewService, ServicePatch};
use detailing_core::domain::{
    Booking, BookingStatus, Location, MultiplierTable, PartialMultipliers, PricingFactors, Role,
    Service, ServiceCategory, TimeOfDay, User, Vehicle, VehicleType,
};
use detailing_core::jobs::{DailyMetrics, SlotAcceptance};
use detailing_core::policy::{authorize, Action, Actor, Resource};
use detailing_core::pricing::{PriceBreakdown, PriceCheckpoints};
use detailing_core::users::ProfileUpdate;
use detailing_core::vehicles::{VehicleInput, VehiclePatch};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::{IntoParams, Modify, OpenApi, ToSchema};
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        list_services_handler,
        get_service_handler,
        me_handler,
        update_profile_handler,
        list_vehicles_handler,
        add_vehicle_handler,
        get_vehicle_handler,
        update_vehicle_handler,
        delete_vehicle_handler,
        quote_handler,
        create_booking_handler,
        list_my_bookings_handler,
        get_booking_handler,
        admin_list_bookings_handler,
        admin_update_booking_status_handler,
        admin_create_service_handler,
        admin_update_service_handler,
        pricing_analytics_handler,
        run_knowledge_refresh_handler,
        run_daily_analytics_handler,
        run_cleanup_handler,
        intake::create_tenant_handler,
        intake::my_tenant_handler,
        intake::update_tenant_settings_handler,
        intake::tenant_stats_handler,
        intake::list_tenant_clients_handler,
        intake::list_tenant_assessments_handler,
        intake::review_assessment_handler,
        intake::approve_assessment_handler,
        intake::convert_assessment_handler,
        intake::tenant_by_slug_handler,
        intake::tenant_by_qr_handler,
        intake::create_client_handler,
        intake::create_assessment_handler,
        intake::get_assessment_handler,
        intake::update_condition_handler,
        intake::update_services_handler,
        intake::submit_assessment_handler,
    ),
    components(
        schemas(
            ErrorBody, User, Role, ProfileUpdate, Vehicle, VehicleType, VehicleInput, VehiclePatch,
            Service, ServiceCategory, MultiplierTable, PartialMultipliers, NewService, ServicePatch,
            QuoteInput, PriceBreakdown, PriceCheckpoints, CreateBookingRequest, Booking,
            BookingStatus, Location, PricingFactors, StatusUpdate, PricingAnalytics,
            VehicleTypeStats, TimeOfDay, DailyMetrics, SlotAcceptance, CleanupReport,
        )
    ),
    modifiers(&IdentityHeader),
    tags(
        (name = "Detailing Platform API", description = "Booking, pricing and self-assessment intake for mobile detailing businesses.")
    )
)]
pub struct ApiDoc;

/// Documents the identity header as an API-key security scheme.
struct IdentityHeader;

impl Modify for IdentityHeader {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "identity",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new(SUBJECT_HEADER))),
            );
        }
    }
}

//=========================================================================================
// API Query and Payload Structs
//=========================================================================================

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CategoryQuery {
    /// Restrict the listing to one category.
    pub category: Option<ServiceCategory>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct StatusQuery {
    pub status: Option<BookingStatus>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RangeQuery {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// The requested lifecycle status.
#[derive(Debug, Deserialize, ToSchema)]
pub struct StatusUpdate {
    pub status: BookingStatus,
}

/// Rows removed by the retention job.
#[derive(Debug, Serialize, ToSchema)]
pub struct CleanupReport {
    pub deleted: u64,
}

//=========================================================================================
// Public Catalog Handlers
//=========================================================================================

/// List active services.
#[utoipa::path(
    get,
    path = "/services",
    params(CategoryQuery),
    responses(
        (status = 200, description = "Active services, by name", body = [Service]),
        (status = 500, description = "Internal server error", body = ErrorBody)
    )
)]
pub async fn list_services_handler(
    State(app_state): State<Arc<AppState>>,
    Query(query): Query<CategoryQuery>,
) -> Result<Json<Vec<Service>>, ApiError> {
    Ok(Json(app_state.catalog.list_active_services(query.category).await?))
}

#[utoipa::path(
    get,
    path = "/services/{id}",
    params(("id" = Uuid, Path, description = "Service id")),
    responses(
        (status = 200, body = Service),
        (status = 404, description = "Unknown service", body = ErrorBody)
    )
)]
pub async fn get_service_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Service>, ApiError> {
    Ok(Json(app_state.catalog.get_service(id).await?))
}

//=========================================================================================
// Profile Handlers
//=========================================================================================

#[utoipa::path(
    get,
    path = "/me",
    security(("identity" = [])),
    responses((status = 200, body = User), (status = 401, description = "No identity"))
)]
pub async fn me_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<User>, ApiError> {
    Ok(Json(app_state.users.me(&actor).await?))
}

/// Update the caller's name and/or phone.
#[utoipa::path(
    patch,
    path = "/me",
    security(("identity" = [])),
    request_body = ProfileUpdate,
    responses((status = 200, body = User), (status = 400, body = ErrorBody))
)]
pub async fn update_profile_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<User>, ApiError> {
    Ok(Json(app_state.users.update_profile(&actor, update).await?))
}

//=========================================================================================
// Vehicle Handlers
//=========================================================================================

#[utoipa::path(
    get,
    path = "/vehicles",
    security(("identity" = [])),
    responses((status = 200, body = [Vehicle]))
)]
pub async fn list_vehicles_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<Vec<Vehicle>>, ApiError> {
    Ok(Json(app_state.vehicles.list_my_vehicles(&actor).await?))
}

#[utoipa::path(
    post,
    path = "/vehicles",
    security(("identity" = [])),
    request_body = VehicleInput,
    responses((status = 201, body = Vehicle), (status = 400, body = ErrorBody))
)]
pub async fn add_vehicle_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Json(input): Json<VehicleInput>,
) -> Result<impl IntoResponse, ApiError> {
    let vehicle = app_state.vehicles.add_vehicle(&actor, input).await?;
    Ok((StatusCode::CREATED, Json(vehicle)))
}

#[utoipa::path(
    get,
    path = "/vehicles/{id}",
    security(("identity" = [])),
    params(("id" = Uuid, Path, description = "Vehicle id")),
    responses(
        (status = 200, body = Vehicle),
        (status = 403, description = "Not the owner", body = ErrorBody),
        (status = 404, body = ErrorBody)
    )
)]
pub async fn get_vehicle_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vehicle>, ApiError> {
    Ok(Json(app_state.vehicles.get_vehicle(&actor, id).await?))
}

#[utoipa::path(
    patch,
    path = "/vehicles/{id}",
    security(("identity" = [])),
    params(("id" = Uuid, Path, description = "Vehicle id")),
    request_body = VehiclePatch,
    responses((status = 200, body = Vehicle), (status = 400, body = ErrorBody))
)]
pub async fn update_vehicle_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    Json(patch): Json<VehiclePatch>,
) -> Result<Json<Vehicle>, ApiError> {
    Ok(Json(app_state.vehicles.update_vehicle(&actor, id, patch).await?))
}

#[utoipa::path(
    delete,
    path = "/vehicles/{id}",
    security(("identity" = [])),
    params(("id" = Uuid, Path, description = "Vehicle id")),
    responses((status = 204, description = "Deleted"), (status = 404, body = ErrorBody))
)]
pub async fn delete_vehicle_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    app_state.vehicles.delete_vehicle(&actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

//=========================================================================================
// Quote & Booking Handlers
//=========================================================================================

/// Price a prospective booking, with advisory market insights.
#[utoipa::path(
    post,
    path = "/quotes",
    security(("identity" = [])),
    request_body = QuoteInput,
    responses(
        (status = 200, body = PriceBreakdown),
        (status = 404, description = "Unknown service id", body = ErrorBody)
    )
)]
pub async fn quote_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Json(input): Json<QuoteInput>,
) -> Result<Json<PriceBreakdown>, ApiError> {
    Ok(Json(app_state.bookings.quote(Some(&actor), input).await?))
}

/// Book an appointment. The price is recomputed server-side.
#[utoipa::path(
    post,
    path = "/bookings",
    security(("identity" = [])),
    request_body = CreateBookingRequest,
    responses(
        (status = 201, body = Booking),
        (status = 400, body = ErrorBody),
        (status = 403, description = "Vehicle belongs to someone else", body = ErrorBody)
    )
)]
pub async fn create_booking_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Json(request): Json<CreateBookingRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let booking = app_state.bookings.create_booking(&actor, request).await?;
    Ok((StatusCode::CREATED, Json(booking)))
}

#[utoipa::path(
    get,
    path = "/bookings",
    security(("identity" = [])),
    responses((status = 200, description = "Latest appointment first", body = [Booking]))
)]
pub async fn list_my_bookings_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<Vec<Booking>>, ApiError> {
    Ok(Json(app_state.bookings.list_my_bookings(&actor).await?))
}

#[utoipa::path(
    get,
    path = "/bookings/{id}",
    security(("identity" = [])),
    params(("id" = Uuid, Path, description = "Booking id")),
    responses((status = 200, body = Booking), (status = 403, body = ErrorBody), (status = 404, body = ErrorBody))
)]
pub async fn get_booking_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> Result<Json<Booking>, ApiError> {
    Ok(Json(app_state.bookings.get_booking(&actor, id).await?))
}

//=========================================================================================
// Operator Handlers
//=========================================================================================

#[utoipa::path(
    get,
    path = "/admin/bookings",
    security(("identity" = [])),
    params(StatusQuery),
    responses((status = 200, body = [Booking]), (status = 403, body = ErrorBody))
)]
pub async fn admin_list_bookings_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Query(query): Query<StatusQuery>,
) -> Result<Json<Vec<Booking>>, ApiError> {
    Ok(Json(app_state.bookings.list_bookings(&actor, query.status).await?))
}

/// Move a booking along its lifecycle.
#[utoipa::path(
    patch,
    path = "/admin/bookings/{id}/status",
    security(("identity" = [])),
    params(("id" = Uuid, Path, description = "Booking id")),
    request_body = StatusUpdate,
    responses(
        (status = 200, body = Booking),
        (status = 400, description = "Transition not allowed", body = ErrorBody),
        (status = 403, body = ErrorBody)
    )
)]
pub async fn admin_update_booking_status_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    Json(update): Json<StatusUpdate>,
) -> Result<Json<Booking>, ApiError> {
    let booking = app_state
        .bookings
        .update_booking_status(&actor, id, update.status)
        .await?;
    Ok(Json(booking))
}

#[utoipa::path(
    post,
    path = "/admin/services",
    security(("identity" = [])),
    request_body = NewService,
    responses((status = 201, body = Service), (status = 400, body = ErrorBody), (status = 403, body = ErrorBody))
)]
pub async fn admin_create_service_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Json(input): Json<NewService>,
) -> Result<impl IntoResponse, ApiError> {
    let service = app_state.catalog.create_service(&actor, input).await?;
    Ok((StatusCode::CREATED, Json(service)))
}

/// Partially update a service. Send `is_active: false` to deactivate it.
#[utoipa::path(
    patch,
    path = "/admin/services/{id}",
    security(("identity" = [])),
    params(("id" = Uuid, Path, description = "Service id")),
    request_body = ServicePatch,
    responses((status = 200, body = Service), (status = 400, body = ErrorBody), (status = 403, body = ErrorBody))
)]
pub async fn admin_update_service_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    Json(patch): Json<ServicePatch>,
) -> Result<Json<Service>, ApiError> {
    Ok(Json(app_state.catalog.update_service(&actor, id, patch).await?))
}

#[utoipa::path(
    get,
    path = "/admin/analytics/pricing",
    security(("identity" = [])),
    params(RangeQuery),
    responses((status = 200, body = PricingAnalytics), (status = 400, body = ErrorBody), (status = 403, body = ErrorBody))
)]
pub async fn pricing_analytics_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Query(range): Query<RangeQuery>,
) -> Result<Json<PricingAnalytics>, ApiError> {
    let analytics = app_state
        .analytics
        .pricing_analytics(&actor, range.start, range.end)
        .await?;
    Ok(Json(analytics))
}

//=========================================================================================
// On-Demand Job Handlers
//=========================================================================================

#[utoipa::path(
    post,
    path = "/admin/jobs/knowledge-refresh",
    security(("identity" = [])),
    responses((status = 200, body = [SlotAcceptance]), (status = 403, body = ErrorBody))
)]
pub async fn run_knowledge_refresh_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<Vec<SlotAcceptance>>, ApiError> {
    authorize(&actor, Action::RunJobs, Resource::Platform)?;
    Ok(Json(app_state.jobs.refresh_pricing_knowledge().await?))
}

#[utoipa::path(
    post,
    path = "/admin/jobs/daily-analytics",
    security(("identity" = [])),
    responses((status = 200, body = DailyMetrics), (status = 403, body = ErrorBody))
)]
pub async fn run_daily_analytics_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<DailyMetrics>, ApiError> {
    authorize(&actor, Action::RunJobs, Resource::Platform)?;
    Ok(Json(app_state.jobs.calculate_daily_analytics().await?))
}

#[utoipa::path(
    post,
    path = "/admin/jobs/cleanup",
    security(("identity" = [])),
    responses((status = 200, body = CleanupReport), (status = 403, body = ErrorBody))
)]
pub async fn run_cleanup_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<CleanupReport>, ApiError> {
    authorize(&actor, Action::RunJobs, Resource::Platform)?;
    let deleted = app_state.jobs.cleanup_old_data().await?;
    Ok(Json(CleanupReport { deleted }))
}
