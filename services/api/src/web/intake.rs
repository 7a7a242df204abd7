//! services/api/src/web/intake.rs
//!
//! Handlers for tenant accounts and the public self-assessment intake flow.
//! Intake routes are unauthenticated: a client reaches them through the
//! tenant's slug link or QR code.

use crate::error::{ApiError, ErrorBody};
use crate::web::state::AppState;
use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use detailing_core::assessments::NewAssessment;
use detailing_core::domain::{
    Assessment, AssessmentStatus, Client, ConditionAssessment, Tenant, TenantBranding,
    TenantContact,
};
use detailing_core::policy::Actor;
use detailing_core::tenants::{ClientInput, NewTenant, TenantSettingsUpdate, TenantStats};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

//=========================================================================================
// Payload Structs
//=========================================================================================

/// What an anonymous client may see of a tenant.
#[derive(Debug, Serialize, ToSchema)]
pub struct PublicTenant {
    pub id: Uuid,
    pub business_name: String,
    pub slug: String,
    pub branding: TenantBranding,
    pub contact: TenantContact,
    pub allow_self_assessment: bool,
    pub require_vin: bool,
}

impl From<Tenant> for PublicTenant {
    fn from(tenant: Tenant) -> Self {
        Self {
            id: tenant.id,
            business_name: tenant.business_name,
            slug: tenant.slug,
            branding: tenant.branding,
            contact: tenant.contact,
            allow_self_assessment: tenant.settings.allow_self_assessment,
            require_vin: tenant.settings.require_vin,
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AssessmentStatusQuery {
    pub status: Option<AssessmentStatus>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ServiceSelection {
    pub service_ids: Vec<Uuid>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ConversionRequest {
    pub booking_id: Uuid,
}

//=========================================================================================
// Tenant Account Handlers (identity required)
//=========================================================================================

/// Register a business. The caller becomes its owner.
#[utoipa::path(
    post,
    path = "/tenants",
    security(("identity" = [])),
    request_body = NewTenant,
    responses(
        (status = 201, body = Tenant),
        (status = 400, description = "Invalid input or slug taken", body = ErrorBody)
    )
)]
pub async fn create_tenant_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Json(input): Json<NewTenant>,
) -> Result<impl IntoResponse, ApiError> {
    let tenant = app_state.tenants.create_tenant(&actor, input).await?;
    Ok((StatusCode::CREATED, Json(tenant)))
}

#[utoipa::path(
    get,
    path = "/tenants/me",
    security(("identity" = [])),
    responses((status = 200, body = Tenant), (status = 404, body = ErrorBody))
)]
pub async fn my_tenant_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<Tenant>, ApiError> {
    Ok(Json(app_state.tenants.get_my_tenant(&actor).await?))
}

#[utoipa::path(
    patch,
    path = "/tenants/{id}/settings",
    security(("identity" = [])),
    params(("id" = Uuid, Path, description = "Tenant id")),
    request_body = TenantSettingsUpdate,
    responses((status = 200, body = Tenant), (status = 403, body = ErrorBody))
)]
pub async fn update_tenant_settings_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    Json(update): Json<TenantSettingsUpdate>,
) -> Result<Json<Tenant>, ApiError> {
    Ok(Json(app_state.tenants.update_tenant_settings(&actor, id, update).await?))
}

#[utoipa::path(
    get,
    path = "/tenants/{id}/stats",
    security(("identity" = [])),
    params(("id" = Uuid, Path, description = "Tenant id")),
    responses((status = 200, body = TenantStats), (status = 403, body = ErrorBody))
)]
pub async fn tenant_stats_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> Result<Json<TenantStats>, ApiError> {
    Ok(Json(app_state.tenants.tenant_stats(&actor, id).await?))
}

#[utoipa::path(
    get,
    path = "/tenants/{id}/clients",
    security(("identity" = [])),
    params(("id" = Uuid, Path, description = "Tenant id")),
    responses((status = 200, body = [Client]), (status = 403, body = ErrorBody))
)]
pub async fn list_tenant_clients_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Client>>, ApiError> {
    Ok(Json(app_state.tenants.list_tenant_clients(&actor, id).await?))
}

#[utoipa::path(
    get,
    path = "/tenants/{id}/assessments",
    security(("identity" = [])),
    params(("id" = Uuid, Path, description = "Tenant id"), AssessmentStatusQuery),
    responses((status = 200, body = [Assessment]), (status = 403, body = ErrorBody))
)]
pub async fn list_tenant_assessments_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    Query(query): Query<AssessmentStatusQuery>,
) -> Result<Json<Vec<Assessment>>, ApiError> {
    let assessments = app_state
        .assessments
        .list_tenant_assessments(&actor, id, query.status)
        .await?;
    Ok(Json(assessments))
}

#[utoipa::path(
    post,
    path = "/tenants/assessments/{id}/review",
    security(("identity" = [])),
    params(("id" = Uuid, Path, description = "Assessment id")),
    responses(
        (status = 200, body = Assessment),
        (status = 400, description = "Not submitted", body = ErrorBody),
        (status = 403, body = ErrorBody)
    )
)]
pub async fn review_assessment_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> Result<Json<Assessment>, ApiError> {
    Ok(Json(app_state.assessments.review_assessment(&actor, id).await?))
}

#[utoipa::path(
    post,
    path = "/tenants/assessments/{id}/approve",
    security(("identity" = [])),
    params(("id" = Uuid, Path, description = "Assessment id")),
    responses(
        (status = 200, body = Assessment),
        (status = 400, description = "Not reviewed", body = ErrorBody),
        (status = 403, body = ErrorBody)
    )
)]
pub async fn approve_assessment_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> Result<Json<Assessment>, ApiError> {
    Ok(Json(app_state.assessments.approve_assessment(&actor, id).await?))
}

/// Link an approved assessment to the booking it became.
#[utoipa::path(
    post,
    path = "/tenants/assessments/{id}/convert",
    security(("identity" = [])),
    params(("id" = Uuid, Path, description = "Assessment id")),
    request_body = ConversionRequest,
    responses(
        (status = 200, body = Assessment),
        (status = 400, description = "Not approved", body = ErrorBody),
        (status = 404, description = "Unknown booking", body = ErrorBody)
    )
)]
pub async fn convert_assessment_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    Json(request): Json<ConversionRequest>,
) -> Result<Json<Assessment>, ApiError> {
    let assessment = app_state
        .assessments
        .mark_assessment_converted(&actor, id, request.booking_id)
        .await?;
    Ok(Json(assessment))
}

//=========================================================================================
// Public Intake Handlers
//=========================================================================================

#[utoipa::path(
    get,
    path = "/intake/tenants/slug/{slug}",
    params(("slug" = String, Path, description = "Tenant slug")),
    responses((status = 200, body = PublicTenant), (status = 404, body = ErrorBody))
)]
pub async fn tenant_by_slug_handler(
    State(app_state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> Result<Json<PublicTenant>, ApiError> {
    let tenant = app_state.tenants.get_tenant_by_slug(&slug).await?;
    Ok(Json(tenant.into()))
}

#[utoipa::path(
    get,
    path = "/intake/tenants/qr/{code}",
    params(("code" = String, Path, description = "QR code value")),
    responses((status = 200, body = PublicTenant), (status = 404, body = ErrorBody))
)]
pub async fn tenant_by_qr_handler(
    State(app_state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> Result<Json<PublicTenant>, ApiError> {
    let tenant = app_state.tenants.get_tenant_by_qr_code(&code).await?;
    Ok(Json(tenant.into()))
}

/// Register (or look up) a client by email.
#[utoipa::path(
    post,
    path = "/intake/tenants/{id}/clients",
    params(("id" = Uuid, Path, description = "Tenant id")),
    request_body = ClientInput,
    responses((status = 200, body = Client), (status = 400, body = ErrorBody), (status = 404, body = ErrorBody))
)]
pub async fn create_client_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(input): Json<ClientInput>,
) -> Result<Json<Client>, ApiError> {
    Ok(Json(app_state.tenants.create_or_get_client(id, input).await?))
}

#[utoipa::path(
    post,
    path = "/intake/assessments",
    request_body = NewAssessment,
    responses(
        (status = 201, body = Assessment),
        (status = 400, body = ErrorBody),
        (status = 403, description = "Client belongs to another tenant", body = ErrorBody)
    )
)]
pub async fn create_assessment_handler(
    State(app_state): State<Arc<AppState>>,
    Json(input): Json<NewAssessment>,
) -> Result<impl IntoResponse, ApiError> {
    let assessment = app_state.assessments.create_assessment(input).await?;
    Ok((StatusCode::CREATED, Json(assessment)))
}

#[utoipa::path(
    get,
    path = "/intake/assessments/{id}",
    params(("id" = Uuid, Path, description = "Assessment id")),
    responses((status = 200, body = Assessment), (status = 404, body = ErrorBody))
)]
pub async fn get_assessment_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Assessment>, ApiError> {
    Ok(Json(app_state.assessments.get_assessment(id).await?))
}

#[utoipa::path(
    put,
    path = "/intake/assessments/{id}/condition",
    params(("id" = Uuid, Path, description = "Assessment id")),
    request_body = ConditionAssessment,
    responses((status = 200, body = Assessment), (status = 400, description = "Not a draft", body = ErrorBody))
)]
pub async fn update_condition_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(condition): Json<ConditionAssessment>,
) -> Result<Json<Assessment>, ApiError> {
    let assessment = app_state
        .assessments
        .update_assessment_condition(id, condition)
        .await?;
    Ok(Json(assessment))
}

/// Choose services; the estimate is recomputed from the condition.
#[utoipa::path(
    put,
    path = "/intake/assessments/{id}/services",
    params(("id" = Uuid, Path, description = "Assessment id")),
    request_body = ServiceSelection,
    responses((status = 200, body = Assessment), (status = 400, body = ErrorBody), (status = 404, body = ErrorBody))
)]
pub async fn update_services_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(selection): Json<ServiceSelection>,
) -> Result<Json<Assessment>, ApiError> {
    let assessment = app_state
        .assessments
        .update_assessment_services(id, selection.service_ids)
        .await?;
    Ok(Json(assessment))
}

#[utoipa::path(
    post,
    path = "/intake/assessments/{id}/submit",
    params(("id" = Uuid, Path, description = "Assessment id")),
    responses((status = 200, body = Assessment), (status = 400, body = ErrorBody))
)]
pub async fn submit_assessment_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Assessment>, ApiError> {
    Ok(Json(app_state.assessments.submit_assessment(id).await?))
}
