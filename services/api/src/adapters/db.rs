//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DatabaseService`, `KnowledgeStore` and `WorkflowScheduler` ports from the
//! core crate. It handles all interactions with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use detailing_core::domain::{
    Assessment, AssessmentPricingFactors, AssessmentStatus, AssessmentVehicleInfo, Booking,
    BookingStatus, Client, ConditionAssessment, Identity, KnowledgeItem, KnowledgeMetadata,
    Location, MetricRecord, MultiplierTable, PartialMultipliers, PricingFactors, PricingHistory,
    Role, Service, ServiceCategory, Tenant, TenantBranding, TenantContact, TenantSettings,
    TenantSubscription, User, Vehicle, WorkflowState,
};
use detailing_core::knowledge::rank_nearest;
use detailing_core::ports::{
    DatabaseService, KnowledgeFilter, KnowledgeStore, NewBookingRecords, PortError, PortResult,
    ScoredKnowledge, WorkflowScheduler,
};
use detailing_core::workflow::WorkflowCheckpoint;
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the storage ports.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

fn not_found_or_unexpected(e: sqlx::Error, what: &str, id: Uuid) -> PortError {
    match e {
        sqlx::Error::RowNotFound => PortError::NotFound(format!("{} {} not found", what, id)),
        _ => PortError::Unexpected(e.to_string()),
    }
}

fn to_u32(value: i32, column: &str) -> PortResult<u32> {
    u32::try_from(value)
        .map_err(|_| PortError::Unexpected(format!("negative value in column {}", column)))
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

const USER_COLUMNS: &str = "id, subject, email, name, phone, role, tenant_id, created_at";

#[derive(FromRow)]
struct UserRecord {
    id: Uuid,
    subject: String,
    email: String,
    name: String,
    phone: Option<String>,
    role: String,
    tenant_id: Option<Uuid>,
    created_at: DateTime<Utc>,
}
impl UserRecord {
    fn to_domain(self) -> PortResult<User> {
        Ok(User {
            id: self.id,
            subject: self.subject,
            email: self.email,
            name: self.name,
            phone: self.phone,
            role: self.role.parse()?,
            tenant_id: self.tenant_id,
            created_at: self.created_at,
        })
    }
}

const SERVICE_COLUMNS: &str = "id, tenant_id, name, description, category, base_price, \
     duration_minutes, is_active, vehicle_type_multipliers";

#[derive(FromRow)]
struct ServiceRecord {
    id: Uuid,
    tenant_id: Option<Uuid>,
    name: String,
    description: String,
    category: String,
    base_price: Decimal,
    duration_minutes: i32,
    is_active: bool,
    vehicle_type_multipliers: Json<PartialMultipliers>,
}
impl ServiceRecord {
    fn to_domain(self) -> PortResult<Service> {
        Ok(Service {
            id: self.id,
            tenant_id: self.tenant_id,
            name: self.name,
            description: self.description,
            category: self.category.parse()?,
            base_price: self.base_price,
            duration_minutes: to_u32(self.duration_minutes, "duration_minutes")?,
            is_active: self.is_active,
            vehicle_type_multipliers: MultiplierTable::normalize_logged(
                &self.vehicle_type_multipliers.0,
                self.id,
            ),
        })
    }
}

const VEHICLE_COLUMNS: &str =
    "id, user_id, tenant_id, make, model, year, color, license_plate, vehicle_type, notes";

#[derive(FromRow)]
struct VehicleRecord {
    id: Uuid,
    user_id: Uuid,
    tenant_id: Option<Uuid>,
    make: String,
    model: String,
    year: i32,
    color: String,
    license_plate: Option<String>,
    vehicle_type: String,
    notes: Option<String>,
}
impl VehicleRecord {
    fn to_domain(self) -> PortResult<Vehicle> {
        Ok(Vehicle {
            id: self.id,
            user_id: self.user_id,
            tenant_id: self.tenant_id,
            make: self.make,
            model: self.model,
            year: self.year,
            color: self.color,
            license_plate: self.license_plate,
            vehicle_type: self.vehicle_type.parse()?,
            notes: self.notes,
        })
    }
}

const BOOKING_COLUMNS: &str = "id, user_id, tenant_id, vehicle_id, service_ids, scheduled_at, \
     status, total_price, pricing_factors, location, notes, completed_at, assigned_detailer_id, \
     created_at";

#[derive(FromRow)]
struct BookingRecord {
    id: Uuid,
    user_id: Uuid,
    tenant_id: Option<Uuid>,
    vehicle_id: Uuid,
    service_ids: Vec<Uuid>,
    scheduled_at: DateTime<Utc>,
    status: String,
    total_price: Decimal,
    pricing_factors: Json<PricingFactors>,
    location: Json<Location>,
    notes: Option<String>,
    completed_at: Option<DateTime<Utc>>,
    assigned_detailer_id: Option<Uuid>,
    created_at: DateTime<Utc>,
}
impl BookingRecord {
    fn to_domain(self) -> PortResult<Booking> {
        Ok(Booking {
            id: self.id,
            user_id: self.user_id,
            tenant_id: self.tenant_id,
            vehicle_id: self.vehicle_id,
            service_ids: self.service_ids,
            scheduled_at: self.scheduled_at,
            status: self.status.parse()?,
            total_price: self.total_price,
            pricing_factors: self.pricing_factors.0,
            location: self.location.0,
            notes: self.notes,
            completed_at: self.completed_at,
            assigned_detailer_id: self.assigned_detailer_id,
            created_at: self.created_at,
        })
    }
}

#[derive(FromRow)]
struct PricingHistoryRecord {
    id: Uuid,
    booking_id: Uuid,
    tenant_id: Option<Uuid>,
    service_ids: Vec<Uuid>,
    vehicle_type: String,
    scheduled_at: DateTime<Utc>,
    day_of_week: i16,
    time_of_day: String,
    demand_level: String,
    base_price: Decimal,
    final_price: Decimal,
    was_accepted: bool,
}
impl PricingHistoryRecord {
    fn to_domain(self) -> PortResult<PricingHistory> {
        Ok(PricingHistory {
            id: self.id,
            booking_id: self.booking_id,
            tenant_id: self.tenant_id,
            service_ids: self.service_ids,
            vehicle_type: self.vehicle_type,
            scheduled_at: self.scheduled_at,
            day_of_week: self.day_of_week as u8,
            time_of_day: self.time_of_day.parse()?,
            demand_level: self.demand_level.parse()?,
            base_price: self.base_price,
            final_price: self.final_price,
            was_accepted: self.was_accepted,
        })
    }
}

#[derive(FromRow)]
struct WorkflowStateRecord {
    workflow_id: String,
    booking_id: Uuid,
    tenant_id: Option<Uuid>,
    current_step: String,
    status: String,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    error: Option<String>,
}
impl WorkflowStateRecord {
    fn to_domain(self) -> PortResult<WorkflowState> {
        Ok(WorkflowState {
            workflow_id: self.workflow_id,
            booking_id: self.booking_id,
            tenant_id: self.tenant_id,
            current_step: self.current_step,
            status: self.status.parse()?,
            started_at: self.started_at,
            completed_at: self.completed_at,
            error: self.error,
        })
    }
}

#[derive(FromRow)]
struct CheckpointRecord {
    booking_id: Uuid,
    step: String,
    resume_at: DateTime<Utc>,
    completed_steps: Json<Vec<String>>,
}
impl CheckpointRecord {
    fn to_domain(self) -> PortResult<WorkflowCheckpoint> {
        Ok(WorkflowCheckpoint {
            booking_id: self.booking_id,
            step: self.step.parse()?,
            resume_at: self.resume_at,
            completed_steps: self.completed_steps.0,
        })
    }
}

const TENANT_COLUMNS: &str = "id, business_name, owner_subject, owner_email, slug, qr_code, \
     branding, contact, settings, subscription, is_active, created_at";

#[derive(FromRow)]
struct TenantRecord {
    id: Uuid,
    business_name: String,
    owner_subject: String,
    owner_email: String,
    slug: String,
    qr_code: String,
    branding: Json<TenantBranding>,
    contact: Json<TenantContact>,
    settings: Json<TenantSettings>,
    subscription: Json<TenantSubscription>,
    is_active: bool,
    created_at: DateTime<Utc>,
}
impl TenantRecord {
    fn to_domain(self) -> Tenant {
        Tenant {
            id: self.id,
            business_name: self.business_name,
            owner_subject: self.owner_subject,
            owner_email: self.owner_email,
            slug: self.slug,
            qr_code: self.qr_code,
            branding: self.branding.0,
            contact: self.contact.0,
            settings: self.settings.0,
            subscription: self.subscription.0,
            is_active: self.is_active,
            created_at: self.created_at,
        }
    }
}

const CLIENT_COLUMNS: &str = "id, tenant_id, email, name, phone, created_at, last_assessment_at";

#[derive(FromRow)]
struct ClientRecord {
    id: Uuid,
    tenant_id: Uuid,
    email: String,
    name: String,
    phone: String,
    created_at: DateTime<Utc>,
    last_assessment_at: Option<DateTime<Utc>>,
}
impl ClientRecord {
    fn to_domain(self) -> Client {
        Client {
            id: self.id,
            tenant_id: self.tenant_id,
            email: self.email,
            name: self.name,
            phone: self.phone,
            created_at: self.created_at,
            last_assessment_at: self.last_assessment_at,
        }
    }
}

const ASSESSMENT_COLUMNS: &str = "id, tenant_id, client_id, vehicle_info, condition, \
     selected_services, estimated_price, pricing_factors, status, converted_booking_id, \
     created_at, submitted_at";

#[derive(FromRow)]
struct AssessmentRecord {
    id: Uuid,
    tenant_id: Uuid,
    client_id: Uuid,
    vehicle_info: Json<AssessmentVehicleInfo>,
    condition: Json<ConditionAssessment>,
    selected_services: Vec<Uuid>,
    estimated_price: Decimal,
    pricing_factors: Json<AssessmentPricingFactors>,
    status: String,
    converted_booking_id: Option<Uuid>,
    created_at: DateTime<Utc>,
    submitted_at: Option<DateTime<Utc>>,
}
impl AssessmentRecord {
    fn to_domain(self) -> PortResult<Assessment> {
        Ok(Assessment {
            id: self.id,
            tenant_id: self.tenant_id,
            client_id: self.client_id,
            vehicle_info: self.vehicle_info.0,
            condition: self.condition.0,
            selected_services: self.selected_services,
            estimated_price: self.estimated_price,
            pricing_factors: self.pricing_factors.0,
            status: self.status.parse()?,
            converted_booking_id: self.converted_booking_id,
            created_at: self.created_at,
            submitted_at: self.submitted_at,
        })
    }
}

#[derive(FromRow)]
struct KnowledgeRecord {
    id: Uuid,
    tenant_id: Option<Uuid>,
    content: String,
    category: String,
    metadata: Json<KnowledgeMetadata>,
    embedding: Vec<f32>,
}
impl KnowledgeRecord {
    fn to_domain(self) -> PortResult<KnowledgeItem> {
        Ok(KnowledgeItem {
            id: self.id,
            tenant_id: self.tenant_id,
            content: self.content,
            category: self.category.parse()?,
            metadata: self.metadata.0,
            embedding: self.embedding,
        })
    }
}

fn collect<R, T>(records: Vec<R>, convert: impl Fn(R) -> PortResult<T>) -> PortResult<Vec<T>> {
    records.into_iter().map(convert).collect()
}

//=========================================================================================
// Shared Statements
//=========================================================================================

const UPSERT_WORKFLOW_STATE: &str = "INSERT INTO workflow_states \
     (workflow_id, booking_id, tenant_id, current_step, status, started_at, completed_at, error) \
     VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
     ON CONFLICT (workflow_id) DO UPDATE SET current_step = EXCLUDED.current_step, \
     status = EXCLUDED.status, completed_at = EXCLUDED.completed_at, error = EXCLUDED.error";

// Progress saves leave `leased_until` alone; only `release_lease` clears it.
const UPSERT_CHECKPOINT: &str = "INSERT INTO workflow_checkpoints \
     (booking_id, step, resume_at, completed_steps, leased_until) \
     VALUES ($1, $2, $3, $4, NULL) \
     ON CONFLICT (booking_id) DO UPDATE SET step = EXCLUDED.step, \
     resume_at = EXCLUDED.resume_at, completed_steps = EXCLUDED.completed_steps";

fn bind_workflow_state<'q>(
    query: sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments>,
    state: &'q WorkflowState,
) -> sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments> {
    query
        .bind(&state.workflow_id)
        .bind(state.booking_id)
        .bind(state.tenant_id)
        .bind(&state.current_step)
        .bind(state.status.as_str())
        .bind(state.started_at)
        .bind(state.completed_at)
        .bind(&state.error)
}

fn bind_checkpoint<'q>(
    query: sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments>,
    checkpoint: &'q WorkflowCheckpoint,
) -> sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments> {
    query
        .bind(checkpoint.booking_id)
        .bind(checkpoint.step.as_str())
        .bind(checkpoint.resume_at)
        .bind(Json(&checkpoint.completed_steps))
}

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for DbAdapter {
    async fn get_or_create_user(&self, identity: &Identity) -> PortResult<User> {
        sqlx::query(
            "INSERT INTO users (id, subject, email, name, phone, role) \
             VALUES ($1, $2, $3, $4, $5, $6) ON CONFLICT (subject) DO NOTHING",
        )
        .bind(Uuid::new_v4())
        .bind(&identity.subject)
        .bind(identity.email.clone().unwrap_or_default())
        .bind(identity.name.clone().unwrap_or_default())
        .bind(&identity.phone)
        .bind(Role::Customer.as_str())
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;

        let record = sqlx::query_as::<_, UserRecord>(&format!(
            "SELECT {} FROM users WHERE subject = $1",
            USER_COLUMNS
        ))
        .bind(&identity.subject)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => {
                PortError::NotFound(format!("User {} not found", identity.subject))
            }
            _ => unexpected(e),
        })?;
        record.to_domain()
    }

    async fn get_user_by_id(&self, user_id: Uuid) -> PortResult<User> {
        sqlx::query_as::<_, UserRecord>(&format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS))
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| not_found_or_unexpected(e, "User", user_id))?
            .to_domain()
    }

    async fn update_user_profile(
        &self,
        user_id: Uuid,
        name: Option<&str>,
        phone: Option<&str>,
    ) -> PortResult<User> {
        sqlx::query_as::<_, UserRecord>(&format!(
            "UPDATE users SET name = COALESCE($2, name), phone = COALESCE($3, phone) \
             WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        ))
        .bind(user_id)
        .bind(name)
        .bind(phone)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| not_found_or_unexpected(e, "User", user_id))?
        .to_domain()
    }

    async fn set_user_role(
        &self,
        user_id: Uuid,
        role: Role,
        tenant_id: Option<Uuid>,
    ) -> PortResult<()> {
        let result = sqlx::query("UPDATE users SET role = $2, tenant_id = $3 WHERE id = $1")
            .bind(user_id)
            .bind(role.as_str())
            .bind(tenant_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("User {} not found", user_id)));
        }
        Ok(())
    }

    async fn create_service(&self, service: Service) -> PortResult<Service> {
        sqlx::query(
            "INSERT INTO services (id, tenant_id, name, description, category, base_price, \
             duration_minutes, is_active, vehicle_type_multipliers) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(service.id)
        .bind(service.tenant_id)
        .bind(&service.name)
        .bind(&service.description)
        .bind(service.category.as_str())
        .bind(service.base_price)
        .bind(service.duration_minutes as i32)
        .bind(service.is_active)
        .bind(Json(PartialMultipliers::from(service.vehicle_type_multipliers)))
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(service)
    }

    async fn get_service_by_id(&self, service_id: Uuid) -> PortResult<Service> {
        sqlx::query_as::<_, ServiceRecord>(&format!(
            "SELECT {} FROM services WHERE id = $1",
            SERVICE_COLUMNS
        ))
        .bind(service_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| not_found_or_unexpected(e, "Service", service_id))?
        .to_domain()
    }

    async fn list_active_services(
        &self,
        category: Option<ServiceCategory>,
    ) -> PortResult<Vec<Service>> {
        let records = sqlx::query_as::<_, ServiceRecord>(&format!(
            "SELECT {} FROM services WHERE is_active AND ($1::TEXT IS NULL OR category = $1) \
             ORDER BY name ASC",
            SERVICE_COLUMNS
        ))
        .bind(category.map(|c| c.as_str()))
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        collect(records, ServiceRecord::to_domain)
    }

    async fn update_service(&self, service: &Service) -> PortResult<()> {
        let result = sqlx::query(
            "UPDATE services SET name = $2, description = $3, category = $4, base_price = $5, \
             duration_minutes = $6, is_active = $7, vehicle_type_multipliers = $8 WHERE id = $1",
        )
        .bind(service.id)
        .bind(&service.name)
        .bind(&service.description)
        .bind(service.category.as_str())
        .bind(service.base_price)
        .bind(service.duration_minutes as i32)
        .bind(service.is_active)
        .bind(Json(PartialMultipliers::from(service.vehicle_type_multipliers)))
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Service {} not found", service.id)));
        }
        Ok(())
    }

    async fn create_vehicle(&self, vehicle: Vehicle) -> PortResult<Vehicle> {
        sqlx::query(
            "INSERT INTO vehicles (id, user_id, tenant_id, make, model, year, color, \
             license_plate, vehicle_type, notes) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(vehicle.id)
        .bind(vehicle.user_id)
        .bind(vehicle.tenant_id)
        .bind(&vehicle.make)
        .bind(&vehicle.model)
        .bind(vehicle.year)
        .bind(&vehicle.color)
        .bind(&vehicle.license_plate)
        .bind(vehicle.vehicle_type.as_str())
        .bind(&vehicle.notes)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(vehicle)
    }

    async fn get_vehicle_by_id(&self, vehicle_id: Uuid) -> PortResult<Vehicle> {
        sqlx::query_as::<_, VehicleRecord>(&format!(
            "SELECT {} FROM vehicles WHERE id = $1",
            VEHICLE_COLUMNS
        ))
        .bind(vehicle_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| not_found_or_unexpected(e, "Vehicle", vehicle_id))?
        .to_domain()
    }

    async fn get_vehicles_by_user(&self, user_id: Uuid) -> PortResult<Vec<Vehicle>> {
        let records = sqlx::query_as::<_, VehicleRecord>(&format!(
            "SELECT {} FROM vehicles WHERE user_id = $1 ORDER BY make, model",
            VEHICLE_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        collect(records, VehicleRecord::to_domain)
    }

    async fn update_vehicle(&self, vehicle: &Vehicle) -> PortResult<()> {
        sqlx::query(
            "UPDATE vehicles SET make = $2, model = $3, year = $4, color = $5, \
             license_plate = $6, vehicle_type = $7, notes = $8 WHERE id = $1",
        )
        .bind(vehicle.id)
        .bind(&vehicle.make)
        .bind(&vehicle.model)
        .bind(vehicle.year)
        .bind(&vehicle.color)
        .bind(&vehicle.license_plate)
        .bind(vehicle.vehicle_type.as_str())
        .bind(&vehicle.notes)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn delete_vehicle(&self, vehicle_id: Uuid) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM vehicles WHERE id = $1")
            .bind(vehicle_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Vehicle {} not found", vehicle_id)));
        }
        Ok(())
    }

    async fn create_booking(&self, records: NewBookingRecords) -> PortResult<Booking> {
        let NewBookingRecords {
            booking,
            history,
            workflow_state,
            checkpoint,
        } = records;

        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        sqlx::query(
            "INSERT INTO bookings (id, user_id, tenant_id, vehicle_id, service_ids, scheduled_at, \
             status, total_price, pricing_factors, location, notes, completed_at, \
             assigned_detailer_id, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)",
        )
        .bind(booking.id)
        .bind(booking.user_id)
        .bind(booking.tenant_id)
        .bind(booking.vehicle_id)
        .bind(&booking.service_ids)
        .bind(booking.scheduled_at)
        .bind(booking.status.as_str())
        .bind(booking.total_price)
        .bind(Json(booking.pricing_factors))
        .bind(Json(&booking.location))
        .bind(&booking.notes)
        .bind(booking.completed_at)
        .bind(booking.assigned_detailer_id)
        .bind(booking.created_at)
        .execute(&mut *tx)
        .await
        .map_err(unexpected)?;

        sqlx::query(
            "INSERT INTO pricing_history (id, booking_id, tenant_id, service_ids, vehicle_type, \
             scheduled_at, day_of_week, time_of_day, demand_level, base_price, final_price, \
             was_accepted) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
        )
        .bind(history.id)
        .bind(history.booking_id)
        .bind(history.tenant_id)
        .bind(&history.service_ids)
        .bind(&history.vehicle_type)
        .bind(history.scheduled_at)
        .bind(history.day_of_week as i16)
        .bind(history.time_of_day.as_str())
        .bind(history.demand_level.as_str())
        .bind(history.base_price)
        .bind(history.final_price)
        .bind(history.was_accepted)
        .execute(&mut *tx)
        .await
        .map_err(unexpected)?;

        bind_workflow_state(sqlx::query(UPSERT_WORKFLOW_STATE), &workflow_state)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;

        bind_checkpoint(sqlx::query(UPSERT_CHECKPOINT), &checkpoint)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;

        tx.commit().await.map_err(unexpected)?;
        Ok(booking)
    }

    async fn get_booking_by_id(&self, booking_id: Uuid) -> PortResult<Booking> {
        sqlx::query_as::<_, BookingRecord>(&format!(
            "SELECT {} FROM bookings WHERE id = $1",
            BOOKING_COLUMNS
        ))
        .bind(booking_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| not_found_or_unexpected(e, "Booking", booking_id))?
        .to_domain()
    }

    async fn get_bookings_by_user(&self, user_id: Uuid) -> PortResult<Vec<Booking>> {
        let records = sqlx::query_as::<_, BookingRecord>(&format!(
            "SELECT {} FROM bookings WHERE user_id = $1 ORDER BY scheduled_at DESC",
            BOOKING_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        collect(records, BookingRecord::to_domain)
    }

    async fn list_bookings(&self, status: Option<BookingStatus>) -> PortResult<Vec<Booking>> {
        let records = sqlx::query_as::<_, BookingRecord>(&format!(
            "SELECT {} FROM bookings WHERE ($1::TEXT IS NULL OR status = $1) \
             ORDER BY scheduled_at DESC",
            BOOKING_COLUMNS
        ))
        .bind(status.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        collect(records, BookingRecord::to_domain)
    }

    async fn list_bookings_by_tenant(&self, tenant_id: Uuid) -> PortResult<Vec<Booking>> {
        let records = sqlx::query_as::<_, BookingRecord>(&format!(
            "SELECT {} FROM bookings WHERE tenant_id = $1",
            BOOKING_COLUMNS
        ))
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        collect(records, BookingRecord::to_domain)
    }

    async fn list_bookings_scheduled_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> PortResult<Vec<Booking>> {
        let records = sqlx::query_as::<_, BookingRecord>(&format!(
            "SELECT {} FROM bookings WHERE scheduled_at >= $1 AND scheduled_at < $2",
            BOOKING_COLUMNS
        ))
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        collect(records, BookingRecord::to_domain)
    }

    async fn count_completed_bookings(&self, user_id: Uuid) -> PortResult<u32> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM bookings WHERE user_id = $1 AND status = $2",
        )
        .bind(user_id)
        .bind(BookingStatus::Completed.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(count as u32)
    }

    async fn transition_booking_status(
        &self,
        booking_id: Uuid,
        expected: BookingStatus,
        next: BookingStatus,
        completed_at: Option<DateTime<Utc>>,
    ) -> PortResult<bool> {
        let result = sqlx::query(
            "UPDATE bookings SET status = $3, completed_at = COALESCE($4, completed_at) \
             WHERE id = $1 AND status = $2",
        )
        .bind(booking_id)
        .bind(expected.as_str())
        .bind(next.as_str())
        .bind(completed_at)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;

        if result.rows_affected() == 1 {
            return Ok(true);
        }
        // Distinguish a lost race from a missing row.
        self.get_booking_by_id(booking_id).await?;
        Ok(false)
    }

    async fn get_pricing_history_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> PortResult<Vec<PricingHistory>> {
        let records = sqlx::query_as::<_, PricingHistoryRecord>(
            "SELECT id, booking_id, tenant_id, service_ids, vehicle_type, scheduled_at, \
             day_of_week, time_of_day, demand_level, base_price, final_price, was_accepted \
             FROM pricing_history WHERE scheduled_at >= $1 AND scheduled_at <= $2 \
             ORDER BY scheduled_at ASC",
        )
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        collect(records, PricingHistoryRecord::to_domain)
    }

    async fn delete_pricing_history_before(&self, cutoff: DateTime<Utc>) -> PortResult<u64> {
        let result = sqlx::query("DELETE FROM pricing_history WHERE scheduled_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(result.rows_affected())
    }

    async fn save_metric(&self, metric: MetricRecord) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO metrics (id, tenant_id, date, metric, value) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(metric.id)
        .bind(metric.tenant_id)
        .bind(metric.date)
        .bind(&metric.metric)
        .bind(metric.value)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn get_workflow_state(&self, booking_id: Uuid) -> PortResult<WorkflowState> {
        sqlx::query_as::<_, WorkflowStateRecord>(
            "SELECT workflow_id, booking_id, tenant_id, current_step, status, started_at, \
             completed_at, error FROM workflow_states WHERE booking_id = $1",
        )
        .bind(booking_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| not_found_or_unexpected(e, "Workflow state for booking", booking_id))?
        .to_domain()
    }

    async fn save_workflow_state(&self, state: &WorkflowState) -> PortResult<()> {
        bind_workflow_state(sqlx::query(UPSERT_WORKFLOW_STATE), state)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn create_tenant(&self, tenant: Tenant) -> PortResult<Tenant> {
        sqlx::query(
            "INSERT INTO tenants (id, business_name, owner_subject, owner_email, slug, qr_code, \
             branding, contact, settings, subscription, is_active, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
        )
        .bind(tenant.id)
        .bind(&tenant.business_name)
        .bind(&tenant.owner_subject)
        .bind(&tenant.owner_email)
        .bind(&tenant.slug)
        .bind(&tenant.qr_code)
        .bind(Json(&tenant.branding))
        .bind(Json(&tenant.contact))
        .bind(Json(&tenant.settings))
        .bind(Json(&tenant.subscription))
        .bind(tenant.is_active)
        .bind(tenant.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                PortError::Validation(format!("slug '{}' is already taken", tenant.slug))
            }
            other => unexpected(other),
        })?;
        Ok(tenant)
    }

    async fn get_tenant_by_id(&self, tenant_id: Uuid) -> PortResult<Tenant> {
        let record = sqlx::query_as::<_, TenantRecord>(&format!(
            "SELECT {} FROM tenants WHERE id = $1",
            TENANT_COLUMNS
        ))
        .bind(tenant_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| not_found_or_unexpected(e, "Tenant", tenant_id))?;
        Ok(record.to_domain())
    }

    async fn find_tenant_by_slug(&self, slug: &str) -> PortResult<Option<Tenant>> {
        let record = sqlx::query_as::<_, TenantRecord>(&format!(
            "SELECT {} FROM tenants WHERE slug = $1",
            TENANT_COLUMNS
        ))
        .bind(slug)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.map(TenantRecord::to_domain))
    }

    async fn find_tenant_by_qr_code(&self, qr_code: &str) -> PortResult<Option<Tenant>> {
        let record = sqlx::query_as::<_, TenantRecord>(&format!(
            "SELECT {} FROM tenants WHERE qr_code = $1",
            TENANT_COLUMNS
        ))
        .bind(qr_code)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.map(TenantRecord::to_domain))
    }

    async fn update_tenant(&self, tenant: &Tenant) -> PortResult<()> {
        sqlx::query(
            "UPDATE tenants SET business_name = $2, branding = $3, contact = $4, settings = $5, \
             subscription = $6, is_active = $7 WHERE id = $1",
        )
        .bind(tenant.id)
        .bind(&tenant.business_name)
        .bind(Json(&tenant.branding))
        .bind(Json(&tenant.contact))
        .bind(Json(&tenant.settings))
        .bind(Json(&tenant.subscription))
        .bind(tenant.is_active)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn find_client_by_email(
        &self,
        tenant_id: Uuid,
        email: &str,
    ) -> PortResult<Option<Client>> {
        let record = sqlx::query_as::<_, ClientRecord>(&format!(
            "SELECT {} FROM clients WHERE tenant_id = $1 AND email = $2",
            CLIENT_COLUMNS
        ))
        .bind(tenant_id)
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.map(ClientRecord::to_domain))
    }

    async fn create_client(&self, client: Client) -> PortResult<Client> {
        // A concurrent intake for the same email wins; return whichever row exists.
        let record = sqlx::query_as::<_, ClientRecord>(&format!(
            "INSERT INTO clients (id, tenant_id, email, name, phone, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (tenant_id, email) DO UPDATE SET email = EXCLUDED.email \
             RETURNING {}",
            CLIENT_COLUMNS
        ))
        .bind(client.id)
        .bind(client.tenant_id)
        .bind(&client.email)
        .bind(&client.name)
        .bind(&client.phone)
        .bind(client.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn get_client_by_id(&self, client_id: Uuid) -> PortResult<Client> {
        let record = sqlx::query_as::<_, ClientRecord>(&format!(
            "SELECT {} FROM clients WHERE id = $1",
            CLIENT_COLUMNS
        ))
        .bind(client_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| not_found_or_unexpected(e, "Client", client_id))?;
        Ok(record.to_domain())
    }

    async fn list_clients_by_tenant(&self, tenant_id: Uuid) -> PortResult<Vec<Client>> {
        let records = sqlx::query_as::<_, ClientRecord>(&format!(
            "SELECT {} FROM clients WHERE tenant_id = $1 ORDER BY created_at DESC",
            CLIENT_COLUMNS
        ))
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(ClientRecord::to_domain).collect())
    }

    async fn touch_client_assessment(&self, client_id: Uuid, at: DateTime<Utc>) -> PortResult<()> {
        let result = sqlx::query("UPDATE clients SET last_assessment_at = $2 WHERE id = $1")
            .bind(client_id)
            .bind(at)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Client {} not found", client_id)));
        }
        Ok(())
    }

    async fn create_assessment(&self, assessment: Assessment) -> PortResult<Assessment> {
        sqlx::query(
            "INSERT INTO assessments (id, tenant_id, client_id, vehicle_info, condition, \
             selected_services, estimated_price, pricing_factors, status, converted_booking_id, \
             created_at, submitted_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
        )
        .bind(assessment.id)
        .bind(assessment.tenant_id)
        .bind(assessment.client_id)
        .bind(Json(&assessment.vehicle_info))
        .bind(Json(&assessment.condition))
        .bind(&assessment.selected_services)
        .bind(assessment.estimated_price)
        .bind(Json(assessment.pricing_factors))
        .bind(assessment.status.as_str())
        .bind(assessment.converted_booking_id)
        .bind(assessment.created_at)
        .bind(assessment.submitted_at)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(assessment)
    }

    async fn get_assessment_by_id(&self, assessment_id: Uuid) -> PortResult<Assessment> {
        sqlx::query_as::<_, AssessmentRecord>(&format!(
            "SELECT {} FROM assessments WHERE id = $1",
            ASSESSMENT_COLUMNS
        ))
        .bind(assessment_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| not_found_or_unexpected(e, "Assessment", assessment_id))?
        .to_domain()
    }

    async fn list_assessments_by_tenant(
        &self,
        tenant_id: Uuid,
        status: Option<AssessmentStatus>,
    ) -> PortResult<Vec<Assessment>> {
        let records = sqlx::query_as::<_, AssessmentRecord>(&format!(
            "SELECT {} FROM assessments WHERE tenant_id = $1 \
             AND ($2::TEXT IS NULL OR status = $2) ORDER BY created_at DESC",
            ASSESSMENT_COLUMNS
        ))
        .bind(tenant_id)
        .bind(status.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        collect(records, AssessmentRecord::to_domain)
    }

    async fn update_assessment(&self, assessment: &Assessment) -> PortResult<()> {
        let result = sqlx::query(
            "UPDATE assessments SET vehicle_info = $2, condition = $3, selected_services = $4, \
             estimated_price = $5, pricing_factors = $6, status = $7, converted_booking_id = $8, \
             submitted_at = $9 WHERE id = $1",
        )
        .bind(assessment.id)
        .bind(Json(&assessment.vehicle_info))
        .bind(Json(&assessment.condition))
        .bind(&assessment.selected_services)
        .bind(assessment.estimated_price)
        .bind(Json(assessment.pricing_factors))
        .bind(assessment.status.as_str())
        .bind(assessment.converted_booking_id)
        .bind(assessment.submitted_at)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!(
                "Assessment {} not found",
                assessment.id
            )));
        }
        Ok(())
    }
}

//=========================================================================================
// `KnowledgeStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl KnowledgeStore for DbAdapter {
    async fn insert_knowledge(&self, item: KnowledgeItem) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO knowledge_items (id, tenant_id, content, category, metadata, embedding) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(item.id)
        .bind(item.tenant_id)
        .bind(&item.content)
        .bind(item.category.as_str())
        .bind(Json(&item.metadata))
        .bind(&item.embedding)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn count_knowledge(&self) -> PortResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM knowledge_items")
            .fetch_one(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(count as u64)
    }

    /// Filters in SQL and ranks by cosine similarity in process. The knowledge
    /// base is a few dozen rows, so no vector index is needed.
    async fn search_knowledge(
        &self,
        embedding: &[f32],
        limit: usize,
        filter: KnowledgeFilter,
    ) -> PortResult<Vec<ScoredKnowledge>> {
        let records = sqlx::query_as::<_, KnowledgeRecord>(
            "SELECT id, tenant_id, content, category, metadata, embedding FROM knowledge_items \
             WHERE ($1::TEXT IS NULL OR category = $1) AND ($2::UUID IS NULL OR tenant_id = $2)",
        )
        .bind(filter.category.map(|c| c.as_str()))
        .bind(filter.tenant_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        let items = collect(records, KnowledgeRecord::to_domain)?;
        Ok(rank_nearest(items, embedding, limit, &filter))
    }
}

//=========================================================================================
// `WorkflowScheduler` Trait Implementation
//=========================================================================================

#[async_trait]
impl WorkflowScheduler for DbAdapter {
    async fn save_checkpoint(&self, checkpoint: &WorkflowCheckpoint) -> PortResult<()> {
        bind_checkpoint(sqlx::query(UPSERT_CHECKPOINT), checkpoint)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn load_checkpoint(&self, booking_id: Uuid) -> PortResult<Option<WorkflowCheckpoint>> {
        let record = sqlx::query_as::<_, CheckpointRecord>(
            "SELECT booking_id, step, resume_at, completed_steps FROM workflow_checkpoints \
             WHERE booking_id = $1",
        )
        .bind(booking_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        record.map(CheckpointRecord::to_domain).transpose()
    }

    async fn remove_checkpoint(&self, booking_id: Uuid) -> PortResult<()> {
        sqlx::query("DELETE FROM workflow_checkpoints WHERE booking_id = $1")
            .bind(booking_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn try_lease(
        &self,
        booking_id: Uuid,
        now: DateTime<Utc>,
        lease: Duration,
    ) -> PortResult<bool> {
        let result = sqlx::query(
            "UPDATE workflow_checkpoints SET leased_until = $3 \
             WHERE booking_id = $1 AND (leased_until IS NULL OR leased_until <= $2)",
        )
        .bind(booking_id)
        .bind(now)
        .bind(now + lease)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(result.rows_affected() == 1)
    }

    async fn release_lease(&self, booking_id: Uuid) -> PortResult<()> {
        sqlx::query("UPDATE workflow_checkpoints SET leased_until = NULL WHERE booking_id = $1")
            .bind(booking_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn claim_due(
        &self,
        now: DateTime<Utc>,
        lease: Duration,
        limit: usize,
    ) -> PortResult<Vec<Uuid>> {
        // SKIP LOCKED lets several service instances poll the same table.
        let claimed: Vec<Uuid> = sqlx::query_scalar(
            "UPDATE workflow_checkpoints SET leased_until = $2 \
             WHERE booking_id IN ( \
                 SELECT booking_id FROM workflow_checkpoints \
                 WHERE resume_at <= $1 AND (leased_until IS NULL OR leased_until <= $1) \
                 ORDER BY resume_at ASC LIMIT $3 FOR UPDATE SKIP LOCKED) \
             RETURNING booking_id",
        )
        .bind(now)
        .bind(now + lease)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(claimed)
    }
}
