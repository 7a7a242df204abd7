//! crates/detailing_core/src/test_support.rs
//!
//! In-memory implementations of every port plus small builders, so the use
//! cases can be exercised end to end without a database.

use async_trait::async_trait;
use chrono::{DateTime, Duration, FixedOffset, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

use crate::assessments::AssessmentService;
use crate::bookings::BookingService;
use crate::domain::*;
use crate::jobs::Jobs;
use crate::knowledge;
use crate::policy::Actor;
use crate::ports::*;
use crate::pricing::PricingEngine;
use crate::tenants::{ClientInput, TenantService};
use crate::workflow::{BookingWorkflow, WorkflowCheckpoint};

fn not_found(kind: &str, id: impl std::fmt::Display) -> PortError {
    PortError::NotFound(format!("{} {}", kind, id))
}

//=========================================================================================
// Storage
//=========================================================================================

#[derive(Default)]
struct Inner {
    users: HashMap<Uuid, User>,
    services: HashMap<Uuid, Service>,
    vehicles: HashMap<Uuid, Vehicle>,
    bookings: HashMap<Uuid, Booking>,
    history: Vec<PricingHistory>,
    metrics: Vec<MetricRecord>,
    workflow_states: HashMap<Uuid, WorkflowState>,
    checkpoints: HashMap<Uuid, (WorkflowCheckpoint, Option<DateTime<Utc>>)>,
    tenants: HashMap<Uuid, Tenant>,
    clients: HashMap<Uuid, Client>,
    assessments: HashMap<Uuid, Assessment>,
    knowledge: Vec<KnowledgeItem>,
    extra_completed: HashMap<Uuid, u32>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap()
    }

    pub fn put_user(&self, user: User) {
        self.lock().users.insert(user.id, user);
    }

    pub fn user(&self, id: Uuid) -> User {
        self.lock().users[&id].clone()
    }

    pub fn put_service(&self, service: Service) {
        self.lock().services.insert(service.id, service);
    }

    pub fn service(&self, id: Uuid) -> Service {
        self.lock().services[&id].clone()
    }

    pub fn put_booking(&self, booking: Booking) {
        self.lock().bookings.insert(booking.id, booking);
    }

    pub fn booking(&self, id: Uuid) -> Booking {
        self.lock().bookings[&id].clone()
    }

    pub fn remove_booking(&self, id: Uuid) {
        self.lock().bookings.remove(&id);
    }

    /// Simulates an operator changing the status behind the workflow's back.
    pub fn set_status(&self, id: Uuid, status: BookingStatus) {
        if let Some(booking) = self.lock().bookings.get_mut(&id) {
            booking.status = status;
        }
    }

    /// Adds completed bookings to a user's loyalty count without storing them.
    pub fn set_completed_count(&self, user_id: Uuid, count: u32) {
        self.lock().extra_completed.insert(user_id, count);
    }

    pub fn put_history(&self, record: PricingHistory) {
        self.lock().history.push(record);
    }

    pub fn history(&self) -> Vec<PricingHistory> {
        self.lock().history.clone()
    }

    pub fn metrics(&self) -> Vec<MetricRecord> {
        self.lock().metrics.clone()
    }

    pub fn put_workflow_state(&self, state: WorkflowState) {
        self.lock().workflow_states.insert(state.booking_id, state);
    }

    pub fn workflow_state(&self, booking_id: Uuid) -> WorkflowState {
        self.lock().workflow_states[&booking_id].clone()
    }

    pub fn checkpoint(&self, booking_id: Uuid) -> Option<WorkflowCheckpoint> {
        self.lock().checkpoints.get(&booking_id).map(|(c, _)| c.clone())
    }

    pub fn put_tenant(&self, tenant: Tenant) {
        self.lock().tenants.insert(tenant.id, tenant);
    }

    pub fn client(&self, id: Uuid) -> Client {
        self.lock().clients[&id].clone()
    }

    pub fn knowledge_len(&self) -> usize {
        self.lock().knowledge.len()
    }
}

#[async_trait]
impl DatabaseService for MemoryStore {
    async fn get_or_create_user(&self, identity: &Identity) -> PortResult<User> {
        let mut inner = self.lock();
        if let Some(user) = inner.users.values().find(|u| u.subject == identity.subject) {
            return Ok(user.clone());
        }
        let user = User {
            id: Uuid::new_v4(),
            subject: identity.subject.clone(),
            email: identity.email.clone().unwrap_or_default(),
            name: identity.name.clone().unwrap_or_else(|| "User".to_string()),
            phone: identity.phone.clone(),
            role: Role::Customer,
            tenant_id: None,
            created_at: Utc::now(),
        };
        inner.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn get_user_by_id(&self, user_id: Uuid) -> PortResult<User> {
        self.lock()
            .users
            .get(&user_id)
            .cloned()
            .ok_or_else(|| not_found("user", user_id))
    }

    async fn update_user_profile(
        &self,
        user_id: Uuid,
        name: Option<&str>,
        phone: Option<&str>,
    ) -> PortResult<User> {
        let mut inner = self.lock();
        let user = inner
            .users
            .get_mut(&user_id)
            .ok_or_else(|| not_found("user", user_id))?;
        if let Some(name) = name {
            user.name = name.to_string();
        }
        if let Some(phone) = phone {
            user.phone = Some(phone.to_string());
        }
        Ok(user.clone())
    }

    async fn set_user_role(
        &self,
        user_id: Uuid,
        role: Role,
        tenant_id: Option<Uuid>,
    ) -> PortResult<()> {
        let mut inner = self.lock();
        let user = inner
            .users
            .get_mut(&user_id)
            .ok_or_else(|| not_found("user", user_id))?;
        user.role = role;
        user.tenant_id = tenant_id;
        Ok(())
    }

    async fn create_service(&self, service: Service) -> PortResult<Service> {
        self.put_service(service.clone());
        Ok(service)
    }

    async fn get_service_by_id(&self, service_id: Uuid) -> PortResult<Service> {
        self.lock()
            .services
            .get(&service_id)
            .cloned()
            .ok_or_else(|| not_found("service", service_id))
    }

    async fn list_active_services(
        &self,
        category: Option<ServiceCategory>,
    ) -> PortResult<Vec<Service>> {
        let mut services: Vec<Service> = self
            .lock()
            .services
            .values()
            .filter(|s| s.is_active && category.map_or(true, |c| s.category == c))
            .cloned()
            .collect();
        services.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(services)
    }

    async fn update_service(&self, service: &Service) -> PortResult<()> {
        let mut inner = self.lock();
        if !inner.services.contains_key(&service.id) {
            return Err(not_found("service", service.id));
        }
        inner.services.insert(service.id, service.clone());
        Ok(())
    }

    async fn create_vehicle(&self, vehicle: Vehicle) -> PortResult<Vehicle> {
        self.lock().vehicles.insert(vehicle.id, vehicle.clone());
        Ok(vehicle)
    }

    async fn get_vehicle_by_id(&self, vehicle_id: Uuid) -> PortResult<Vehicle> {
        self.lock()
            .vehicles
            .get(&vehicle_id)
            .cloned()
            .ok_or_else(|| not_found("vehicle", vehicle_id))
    }

    async fn get_vehicles_by_user(&self, user_id: Uuid) -> PortResult<Vec<Vehicle>> {
        Ok(self
            .lock()
            .vehicles
            .values()
            .filter(|v| v.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn update_vehicle(&self, vehicle: &Vehicle) -> PortResult<()> {
        self.lock().vehicles.insert(vehicle.id, vehicle.clone());
        Ok(())
    }

    async fn delete_vehicle(&self, vehicle_id: Uuid) -> PortResult<()> {
        self.lock()
            .vehicles
            .remove(&vehicle_id)
            .map(|_| ())
            .ok_or_else(|| not_found("vehicle", vehicle_id))
    }

    async fn create_booking(&self, records: NewBookingRecords) -> PortResult<Booking> {
        let mut inner = self.lock();
        let booking = records.booking;
        inner.bookings.insert(booking.id, booking.clone());
        inner.history.push(records.history);
        inner
            .workflow_states
            .insert(booking.id, records.workflow_state);
        inner
            .checkpoints
            .insert(booking.id, (records.checkpoint, None));
        Ok(booking)
    }

    async fn get_booking_by_id(&self, booking_id: Uuid) -> PortResult<Booking> {
        self.lock()
            .bookings
            .get(&booking_id)
            .cloned()
            .ok_or_else(|| not_found("booking", booking_id))
    }

    async fn get_bookings_by_user(&self, user_id: Uuid) -> PortResult<Vec<Booking>> {
        Ok(self
            .lock()
            .bookings
            .values()
            .filter(|b| b.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn list_bookings(&self, status: Option<BookingStatus>) -> PortResult<Vec<Booking>> {
        Ok(self
            .lock()
            .bookings
            .values()
            .filter(|b| status.map_or(true, |s| b.status == s))
            .cloned()
            .collect())
    }

    async fn list_bookings_by_tenant(&self, tenant_id: Uuid) -> PortResult<Vec<Booking>> {
        Ok(self
            .lock()
            .bookings
            .values()
            .filter(|b| b.tenant_id == Some(tenant_id))
            .cloned()
            .collect())
    }

    async fn list_bookings_scheduled_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> PortResult<Vec<Booking>> {
        Ok(self
            .lock()
            .bookings
            .values()
            .filter(|b| b.scheduled_at >= start && b.scheduled_at < end)
            .cloned()
            .collect())
    }

    async fn count_completed_bookings(&self, user_id: Uuid) -> PortResult<u32> {
        let inner = self.lock();
        let stored = inner
            .bookings
            .values()
            .filter(|b| b.user_id == user_id && b.status == BookingStatus::Completed)
            .count() as u32;
        Ok(stored + inner.extra_completed.get(&user_id).copied().unwrap_or(0))
    }

    async fn transition_booking_status(
        &self,
        booking_id: Uuid,
        expected: BookingStatus,
        next: BookingStatus,
        completed_at: Option<DateTime<Utc>>,
    ) -> PortResult<bool> {
        let mut inner = self.lock();
        let booking = inner
            .bookings
            .get_mut(&booking_id)
            .ok_or_else(|| not_found("booking", booking_id))?;
        if booking.status != expected {
            return Ok(false);
        }
        booking.status = next;
        if completed_at.is_some() {
            booking.completed_at = completed_at;
        }
        Ok(true)
    }

    async fn get_pricing_history_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> PortResult<Vec<PricingHistory>> {
        Ok(self
            .lock()
            .history
            .iter()
            .filter(|h| h.scheduled_at >= start && h.scheduled_at <= end)
            .cloned()
            .collect())
    }

    async fn delete_pricing_history_before(&self, cutoff: DateTime<Utc>) -> PortResult<u64> {
        let mut inner = self.lock();
        let before = inner.history.len();
        inner.history.retain(|h| h.scheduled_at >= cutoff);
        Ok((before - inner.history.len()) as u64)
    }

    async fn save_metric(&self, metric: MetricRecord) -> PortResult<()> {
        self.lock().metrics.push(metric);
        Ok(())
    }

    async fn get_workflow_state(&self, booking_id: Uuid) -> PortResult<WorkflowState> {
        self.lock()
            .workflow_states
            .get(&booking_id)
            .cloned()
            .ok_or_else(|| not_found("workflow state for booking", booking_id))
    }

    async fn save_workflow_state(&self, state: &WorkflowState) -> PortResult<()> {
        self.put_workflow_state(state.clone());
        Ok(())
    }

    async fn create_tenant(&self, tenant: Tenant) -> PortResult<Tenant> {
        self.put_tenant(tenant.clone());
        Ok(tenant)
    }

    async fn get_tenant_by_id(&self, tenant_id: Uuid) -> PortResult<Tenant> {
        self.lock()
            .tenants
            .get(&tenant_id)
            .cloned()
            .ok_or_else(|| not_found("tenant", tenant_id))
    }

    async fn find_tenant_by_slug(&self, slug: &str) -> PortResult<Option<Tenant>> {
        Ok(self.lock().tenants.values().find(|t| t.slug == slug).cloned())
    }

    async fn find_tenant_by_qr_code(&self, qr_code: &str) -> PortResult<Option<Tenant>> {
        Ok(self
            .lock()
            .tenants
            .values()
            .find(|t| t.qr_code == qr_code)
            .cloned())
    }

    async fn update_tenant(&self, tenant: &Tenant) -> PortResult<()> {
        self.put_tenant(tenant.clone());
        Ok(())
    }

    async fn find_client_by_email(
        &self,
        tenant_id: Uuid,
        email: &str,
    ) -> PortResult<Option<Client>> {
        Ok(self
            .lock()
            .clients
            .values()
            .find(|c| c.tenant_id == tenant_id && c.email == email)
            .cloned())
    }

    async fn create_client(&self, client: Client) -> PortResult<Client> {
        self.lock().clients.insert(client.id, client.clone());
        Ok(client)
    }

    async fn get_client_by_id(&self, client_id: Uuid) -> PortResult<Client> {
        self.lock()
            .clients
            .get(&client_id)
            .cloned()
            .ok_or_else(|| not_found("client", client_id))
    }

    async fn list_clients_by_tenant(&self, tenant_id: Uuid) -> PortResult<Vec<Client>> {
        Ok(self
            .lock()
            .clients
            .values()
            .filter(|c| c.tenant_id == tenant_id)
            .cloned()
            .collect())
    }

    async fn touch_client_assessment(&self, client_id: Uuid, at: DateTime<Utc>) -> PortResult<()> {
        let mut inner = self.lock();
        let client = inner
            .clients
            .get_mut(&client_id)
            .ok_or_else(|| not_found("client", client_id))?;
        client.last_assessment_at = Some(at);
        Ok(())
    }

    async fn create_assessment(&self, assessment: Assessment) -> PortResult<Assessment> {
        self.lock()
            .assessments
            .insert(assessment.id, assessment.clone());
        Ok(assessment)
    }

    async fn get_assessment_by_id(&self, assessment_id: Uuid) -> PortResult<Assessment> {
        self.lock()
            .assessments
            .get(&assessment_id)
            .cloned()
            .ok_or_else(|| not_found("assessment", assessment_id))
    }

    async fn list_assessments_by_tenant(
        &self,
        tenant_id: Uuid,
        status: Option<AssessmentStatus>,
    ) -> PortResult<Vec<Assessment>> {
        Ok(self
            .lock()
            .assessments
            .values()
            .filter(|a| a.tenant_id == tenant_id && status.map_or(true, |s| a.status == s))
            .cloned()
            .collect())
    }

    async fn update_assessment(&self, assessment: &Assessment) -> PortResult<()> {
        self.lock()
            .assessments
            .insert(assessment.id, assessment.clone());
        Ok(())
    }
}

#[async_trait]
impl WorkflowScheduler for MemoryStore {
    async fn save_checkpoint(&self, checkpoint: &WorkflowCheckpoint) -> PortResult<()> {
        let mut inner = self.lock();
        let leased = inner
            .checkpoints
            .get(&checkpoint.booking_id)
            .and_then(|(_, leased)| *leased);
        inner
            .checkpoints
            .insert(checkpoint.booking_id, (checkpoint.clone(), leased));
        Ok(())
    }

    async fn load_checkpoint(&self, booking_id: Uuid) -> PortResult<Option<WorkflowCheckpoint>> {
        Ok(self.checkpoint(booking_id))
    }

    async fn remove_checkpoint(&self, booking_id: Uuid) -> PortResult<()> {
        self.lock().checkpoints.remove(&booking_id);
        Ok(())
    }

    async fn try_lease(
        &self,
        booking_id: Uuid,
        now: DateTime<Utc>,
        lease: Duration,
    ) -> PortResult<bool> {
        let mut inner = self.lock();
        match inner.checkpoints.get_mut(&booking_id) {
            Some((_, leased)) if leased.map_or(true, |until| until <= now) => {
                *leased = Some(now + lease);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn release_lease(&self, booking_id: Uuid) -> PortResult<()> {
        if let Some((_, leased)) = self.lock().checkpoints.get_mut(&booking_id) {
            *leased = None;
        }
        Ok(())
    }

    async fn claim_due(
        &self,
        now: DateTime<Utc>,
        lease: Duration,
        limit: usize,
    ) -> PortResult<Vec<Uuid>> {
        let mut inner = self.lock();
        let mut due: Vec<(DateTime<Utc>, Uuid)> = inner
            .checkpoints
            .values()
            .filter(|(c, leased)| {
                c.resume_at <= now && leased.map_or(true, |until| until <= now)
            })
            .map(|(c, _)| (c.resume_at, c.booking_id))
            .collect();
        due.sort();
        due.truncate(limit);

        for (_, booking_id) in &due {
            if let Some(entry) = inner.checkpoints.get_mut(booking_id) {
                entry.1 = Some(now + lease);
            }
        }
        Ok(due.into_iter().map(|(_, id)| id).collect())
    }
}

#[async_trait]
impl KnowledgeStore for MemoryStore {
    async fn insert_knowledge(&self, item: KnowledgeItem) -> PortResult<()> {
        self.lock().knowledge.push(item);
        Ok(())
    }

    async fn count_knowledge(&self) -> PortResult<u64> {
        Ok(self.lock().knowledge.len() as u64)
    }

    async fn search_knowledge(
        &self,
        embedding: &[f32],
        limit: usize,
        filter: KnowledgeFilter,
    ) -> PortResult<Vec<ScoredKnowledge>> {
        let items = self.lock().knowledge.clone();
        Ok(knowledge::rank_nearest(items, embedding, limit, &filter))
    }
}

//=========================================================================================
// Other Collaborators
//=========================================================================================

#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(NotificationKind, Uuid)>>,
    failing: AtomicBool,
    yielding: AtomicBool,
}

impl RecordingNotifier {
    /// Kinds of successfully delivered notifications, in order.
    pub fn kinds(&self) -> Vec<NotificationKind> {
        self.sent.lock().unwrap().iter().map(|(k, _)| *k).collect()
    }

    pub fn fail_all(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    /// Makes every delivery yield to the runtime first, so concurrent runs
    /// interleave at the send.
    pub fn yield_before_send(&self) {
        self.yielding.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl NotificationService for RecordingNotifier {
    async fn send(
        &self,
        kind: NotificationKind,
        booking: &Booking,
        _recipient: &User,
    ) -> PortResult<()> {
        if self.yielding.load(Ordering::SeqCst) {
            tokio::task::yield_now().await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(PortError::Unexpected("mail server unavailable".to_string()));
        }
        self.sent.lock().unwrap().push((kind, booking.id));
        Ok(())
    }
}

pub struct TestClock {
    now: Mutex<DateTime<Utc>>,
}

impl TestClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap() = now;
    }
}

impl Clock for TestClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// Embeds text as letter frequencies, so similar wording lands close together.
#[derive(Default)]
pub struct LetterEmbedder {
    failing: AtomicBool,
}

impl LetterEmbedder {
    pub fn failing() -> Self {
        Self {
            failing: AtomicBool::new(true),
        }
    }
}

#[async_trait]
impl EmbeddingService for LetterEmbedder {
    async fn embed(&self, text: &str) -> PortResult<Vec<f32>> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(PortError::Unexpected("embedding provider down".to_string()));
        }
        let mut vector = vec![0.0f32; 26];
        for c in text.chars().filter(|c| c.is_ascii_alphabetic()) {
            vector[(c.to_ascii_lowercase() as u8 - b'a') as usize] += 1.0;
        }
        Ok(vector)
    }
}

//=========================================================================================
// Builders
//=========================================================================================

pub fn utc() -> FixedOffset {
    FixedOffset::east_opt(0).unwrap()
}

pub async fn actor_with_role(store: &MemoryStore, role: Role) -> Actor {
    let user = User {
        id: Uuid::new_v4(),
        subject: format!("idp|{}", Uuid::new_v4()),
        email: "someone@example.com".to_string(),
        name: "Someone".to_string(),
        phone: None,
        role,
        tenant_id: None,
        created_at: Utc::now(),
    };
    store.put_user(user.clone());
    Actor::from(&user)
}

pub fn service_row(name: &str, base_price: Decimal, duration_minutes: u32) -> Service {
    Service {
        id: Uuid::new_v4(),
        tenant_id: None,
        name: name.to_string(),
        description: format!("{} for any vehicle.", name),
        category: ServiceCategory::Exterior,
        base_price,
        duration_minutes,
        is_active: true,
        vehicle_type_multipliers: MultiplierTable::default(),
    }
}

/// An unsaved confirmed booking whose owner and two 60-minute services exist.
pub async fn sample_booking(store: &MemoryStore, scheduled_at: DateTime<Utc>) -> Booking {
    let owner = actor_with_role(store, Role::Customer).await;
    let wash = service_row("Hand Wash", dec!(60), 60);
    let wax = service_row("Wax", dec!(40), 60);
    store.put_service(wash.clone());
    store.put_service(wax.clone());

    Booking {
        id: Uuid::new_v4(),
        user_id: owner.user_id,
        tenant_id: None,
        vehicle_id: Uuid::new_v4(),
        service_ids: vec![wash.id, wax.id],
        scheduled_at,
        status: BookingStatus::Confirmed,
        total_price: dec!(100),
        pricing_factors: PricingFactors {
            base_price: dec!(100),
            vehicle_multiplier: Decimal::ONE,
            demand_multiplier: Decimal::ONE,
            seasonal_multiplier: Decimal::ONE,
            loyalty_discount: Decimal::ZERO,
            final_price: dec!(100),
        },
        location: Location {
            address: "1 Infinite Loop".to_string(),
            city: "Cupertino".to_string(),
            state: "CA".to_string(),
            zip_code: "95014".to_string(),
        },
        notes: None,
        completed_at: None,
        assigned_detailer_id: None,
        created_at: Utc::now(),
    }
}

/// Shared wiring for use-case tests.
pub struct Fixture {
    pub store: Arc<MemoryStore>,
    pub notifier: Arc<RecordingNotifier>,
    pub clock: Arc<TestClock>,
}

impl Fixture {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            store: Arc::new(MemoryStore::new()),
            notifier: Arc::new(RecordingNotifier::default()),
            clock: Arc::new(TestClock::new(now)),
        }
    }

    pub fn pricing(&self) -> PricingEngine {
        PricingEngine::new(self.store.clone(), None, utc())
    }

    pub fn workflow(&self) -> BookingWorkflow {
        BookingWorkflow::new(
            self.store.clone(),
            self.store.clone(),
            self.notifier.clone(),
            self.clock.clone(),
        )
    }

    pub fn booking_service(&self) -> BookingService {
        BookingService::new(self.store.clone(), self.pricing(), self.workflow(), self.clock.clone())
    }

    pub fn tenant_service(&self) -> TenantService {
        TenantService::new(self.store.clone(), self.clock.clone())
    }

    pub fn assessment_service(&self) -> AssessmentService {
        AssessmentService::new(self.store.clone(), self.clock.clone())
    }

    pub fn jobs(&self) -> Jobs {
        Jobs::new(self.store.clone(), self.clock.clone(), utc())
    }

    pub async fn actor(&self, role: Role) -> Actor {
        actor_with_role(&self.store, role).await
    }

    /// Re-reads the actor's user, picking up role or tenant changes.
    pub fn refreshed(&self, actor: &Actor) -> Actor {
        Actor::from(&self.store.user(actor.user_id))
    }

    pub async fn service(&self, name: &str, base_price: Decimal, duration_minutes: u32) -> Service {
        let service = service_row(name, base_price, duration_minutes);
        self.store.put_service(service.clone());
        service
    }

    pub async fn vehicle(&self, owner: &Actor, vehicle_type: VehicleType) -> Vehicle {
        let vehicle = Vehicle {
            id: Uuid::new_v4(),
            user_id: owner.user_id,
            tenant_id: None,
            make: "Toyota".to_string(),
            model: "Camry".to_string(),
            year: 2020,
            color: "Silver".to_string(),
            license_plate: None,
            vehicle_type,
            notes: None,
        };
        self.store.create_vehicle(vehicle).await.unwrap()
    }

    pub async fn tenant(&self, slug: &str, auto_approve: bool) -> Tenant {
        let now = self.clock.now();
        let tenant = Tenant {
            id: Uuid::new_v4(),
            business_name: format!("{} detailing", slug),
            owner_subject: format!("idp|owner-{}", slug),
            owner_email: format!("owner@{}.example", slug),
            slug: slug.to_string(),
            qr_code: format!("{}-{}", slug, now.timestamp_millis()),
            branding: TenantBranding::default(),
            contact: TenantContact {
                phone: "555-0100".to_string(),
                email: format!("owner@{}.example", slug),
                address: "1 Main St".to_string(),
                city: "Austin".to_string(),
                state: "TX".to_string(),
                zip_code: "73301".to_string(),
            },
            settings: TenantSettings {
                allow_self_assessment: true,
                require_vin: false,
                auto_approve_bookings: auto_approve,
                notification_email: format!("owner@{}.example", slug),
            },
            subscription: TenantSubscription {
                plan: SubscriptionPlan::Free,
                status: SubscriptionStatus::Active,
                current_period_end: now + Duration::days(30),
            },
            is_active: true,
            created_at: now,
        };
        self.store.put_tenant(tenant.clone());
        tenant
    }

    pub async fn client(&self, tenant_id: Uuid, email: &str) -> Client {
        self.tenant_service()
            .create_or_get_client(
                tenant_id,
                ClientInput {
                    email: email.to_string(),
                    name: "Pat".to_string(),
                    phone: "555-0142".to_string(),
                },
            )
            .await
            .unwrap()
    }

    /// Stores a pending booking for `owner` a day from now, with no workflow.
    pub async fn stored_booking(&self, owner: &Actor) -> Booking {
        let mut booking = sample_booking(&self.store, self.clock.now() + Duration::days(1)).await;
        booking.user_id = owner.user_id;
        booking.status = BookingStatus::Pending;
        self.store.put_booking(booking.clone());
        booking
    }
}
