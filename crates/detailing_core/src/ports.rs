//! crates/detailing_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the platform's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of the hosted database, the embedding provider, the
//! notification channel and the durable timer.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::domain::{
    Assessment, AssessmentStatus, Booking, BookingStatus, Client, Identity, KnowledgeCategory,
    KnowledgeItem, MetricRecord, PricingHistory, Role, Service, ServiceCategory, Tenant, User,
    Vehicle, WorkflowState,
};
use crate::workflow::WorkflowCheckpoint;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Storage Port
//=========================================================================================

/// Everything written when a booking is accepted. Adapters must persist all four
/// records in one transaction.
#[derive(Debug, Clone)]
pub struct NewBookingRecords {
    pub booking: Booking,
    pub history: PricingHistory,
    pub workflow_state: WorkflowState,
    pub checkpoint: WorkflowCheckpoint,
}

#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- Users ---
    async fn get_or_create_user(&self, identity: &Identity) -> PortResult<User>;

    async fn get_user_by_id(&self, user_id: Uuid) -> PortResult<User>;

    async fn update_user_profile(
        &self,
        user_id: Uuid,
        name: Option<&str>,
        phone: Option<&str>,
    ) -> PortResult<User>;

    async fn set_user_role(
        &self,
        user_id: Uuid,
        role: Role,
        tenant_id: Option<Uuid>,
    ) -> PortResult<()>;

    // --- Service Catalog ---
    async fn create_service(&self, service: Service) -> PortResult<Service>;

    async fn get_service_by_id(&self, service_id: Uuid) -> PortResult<Service>;

    async fn list_active_services(
        &self,
        category: Option<ServiceCategory>,
    ) -> PortResult<Vec<Service>>;

    async fn update_service(&self, service: &Service) -> PortResult<()>;

    // --- Vehicles ---
    async fn create_vehicle(&self, vehicle: Vehicle) -> PortResult<Vehicle>;

    async fn get_vehicle_by_id(&self, vehicle_id: Uuid) -> PortResult<Vehicle>;

    async fn get_vehicles_by_user(&self, user_id: Uuid) -> PortResult<Vec<Vehicle>>;

    async fn update_vehicle(&self, vehicle: &Vehicle) -> PortResult<()>;

    async fn delete_vehicle(&self, vehicle_id: Uuid) -> PortResult<()>;

    // --- Bookings ---
    async fn create_booking(&self, records: NewBookingRecords) -> PortResult<Booking>;

    async fn get_booking_by_id(&self, booking_id: Uuid) -> PortResult<Booking>;

    async fn get_bookings_by_user(&self, user_id: Uuid) -> PortResult<Vec<Booking>>;

    async fn list_bookings(&self, status: Option<BookingStatus>) -> PortResult<Vec<Booking>>;

    /// Bookings for a tenant; used by the tenant statistics.
    async fn list_bookings_by_tenant(&self, tenant_id: Uuid) -> PortResult<Vec<Booking>>;

    /// Bookings with `start <= scheduled_at < end`.
    async fn list_bookings_scheduled_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> PortResult<Vec<Booking>>;

    async fn count_completed_bookings(&self, user_id: Uuid) -> PortResult<u32>;

    /// Compare-and-set status update. Returns `false` without writing if the
    /// stored status is no longer `expected`.
    async fn transition_booking_status(
        &self,
        booking_id: Uuid,
        expected: BookingStatus,
        next: BookingStatus,
        completed_at: Option<DateTime<Utc>>,
    ) -> PortResult<bool>;

    // --- Pricing History & Metrics ---
    /// Records with `start <= scheduled_at <= end`.
    async fn get_pricing_history_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> PortResult<Vec<PricingHistory>>;

    async fn delete_pricing_history_before(&self, cutoff: DateTime<Utc>) -> PortResult<u64>;

    async fn save_metric(&self, metric: MetricRecord) -> PortResult<()>;

    // --- Workflow Bookkeeping ---
    async fn get_workflow_state(&self, booking_id: Uuid) -> PortResult<WorkflowState>;

    async fn save_workflow_state(&self, state: &WorkflowState) -> PortResult<()>;

    // --- Tenants & Clients ---
    async fn create_tenant(&self, tenant: Tenant) -> PortResult<Tenant>;

    async fn get_tenant_by_id(&self, tenant_id: Uuid) -> PortResult<Tenant>;

    async fn find_tenant_by_slug(&self, slug: &str) -> PortResult<Option<Tenant>>;

    async fn find_tenant_by_qr_code(&self, qr_code: &str) -> PortResult<Option<Tenant>>;

    async fn update_tenant(&self, tenant: &Tenant) -> PortResult<()>;

    async fn find_client_by_email(&self, tenant_id: Uuid, email: &str)
        -> PortResult<Option<Client>>;

    async fn create_client(&self, client: Client) -> PortResult<Client>;

    async fn get_client_by_id(&self, client_id: Uuid) -> PortResult<Client>;

    async fn list_clients_by_tenant(&self, tenant_id: Uuid) -> PortResult<Vec<Client>>;

    async fn touch_client_assessment(&self, client_id: Uuid, at: DateTime<Utc>) -> PortResult<()>;

    // --- Assessments ---
    async fn create_assessment(&self, assessment: Assessment) -> PortResult<Assessment>;

    async fn get_assessment_by_id(&self, assessment_id: Uuid) -> PortResult<Assessment>;

    async fn list_assessments_by_tenant(
        &self,
        tenant_id: Uuid,
        status: Option<AssessmentStatus>,
    ) -> PortResult<Vec<Assessment>>;

    async fn update_assessment(&self, assessment: &Assessment) -> PortResult<()>;
}

//=========================================================================================
// Knowledge Retrieval Ports
//=========================================================================================

/// Restricts a nearest-neighbour search to one category and/or tenant.
#[derive(Debug, Clone, Copy, Default)]
pub struct KnowledgeFilter {
    pub category: Option<KnowledgeCategory>,
    pub tenant_id: Option<Uuid>,
}

/// A knowledge item paired with its similarity to the query vector.
#[derive(Debug, Clone)]
pub struct ScoredKnowledge {
    pub item: KnowledgeItem,
    pub score: f32,
}

#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    async fn insert_knowledge(&self, item: KnowledgeItem) -> PortResult<()>;

    async fn count_knowledge(&self) -> PortResult<u64>;

    /// Returns at most `limit` items, most similar first.
    async fn search_knowledge(
        &self,
        embedding: &[f32],
        limit: usize,
        filter: KnowledgeFilter,
    ) -> PortResult<Vec<ScoredKnowledge>>;
}

#[async_trait]
pub trait EmbeddingService: Send + Sync {
    /// Turns a piece of text into a dense vector.
    async fn embed(&self, text: &str) -> PortResult<Vec<f32>>;
}

//=========================================================================================
// Notification Port
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationKind {
    BookingConfirmation,
    BookingReminder,
    CompletionFollowUp,
}

#[async_trait]
pub trait NotificationService: Send + Sync {
    /// Fire-and-log delivery. Delivery guarantees belong to the adapter.
    async fn send(&self, kind: NotificationKind, booking: &Booking, recipient: &User)
        -> PortResult<()>;
}

//=========================================================================================
// Durable Timer Port
//=========================================================================================

/// Durable storage of workflow checkpoints, with a lease that gives one run
/// at a time exclusive ownership of a booking's checkpoint.
#[async_trait]
pub trait WorkflowScheduler: Send + Sync {
    /// Persists (inserts or replaces) the checkpoint for a booking's workflow.
    /// An existing lease on the row is left in place.
    async fn save_checkpoint(&self, checkpoint: &WorkflowCheckpoint) -> PortResult<()>;

    async fn load_checkpoint(&self, booking_id: Uuid) -> PortResult<Option<WorkflowCheckpoint>>;

    async fn remove_checkpoint(&self, booking_id: Uuid) -> PortResult<()>;

    /// Takes the lease on one checkpoint until `now + lease`. Returns `false`
    /// if the checkpoint is missing or someone else holds an unexpired lease.
    async fn try_lease(
        &self,
        booking_id: Uuid,
        now: DateTime<Utc>,
        lease: Duration,
    ) -> PortResult<bool>;

    /// Gives up the lease so the poller can claim the checkpoint again.
    async fn release_lease(&self, booking_id: Uuid) -> PortResult<()>;

    /// Claims up to `limit` checkpoints whose `resume_at <= now`. Claimed
    /// checkpoints are hidden from other claimers until `now + lease`.
    async fn claim_due(
        &self,
        now: DateTime<Utc>,
        lease: Duration,
        limit: usize,
    ) -> PortResult<Vec<Uuid>>;
}

//=========================================================================================
// Clock
//=========================================================================================

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
