//! crates/detailing_core/src/tenants.rs
//!
//! Business accounts and the walk-in clients that reach them through an
//! intake link.

use chrono::Duration;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::domain::{
    BookingStatus, Client, Role, SubscriptionPlan, SubscriptionStatus, Tenant, TenantBranding,
    TenantContact, TenantSettings, TenantSubscription,
};
use crate::policy::{authorize, Action, Actor, Resource};
use crate::ports::{Clock, DatabaseService, PortError, PortResult};
use crate::pricing::round_display;
use crate::validation::{is_valid_slug, Violations};

/// Length of the free period granted to a new tenant.
pub const TRIAL_DAYS: i64 = 30;

#[derive(Debug, Clone, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct NewTenant {
    pub business_name: String,
    pub slug: String,
    pub contact: TenantContact,
}

/// Sections that are present replace the stored ones.
#[derive(Debug, Clone, Default, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct TenantSettingsUpdate {
    pub settings: Option<TenantSettings>,
    pub branding: Option<TenantBranding>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct TenantStats {
    pub total_assessments: u64,
    pub total_bookings: u64,
    pub total_clients: u64,
    pub completed_bookings: u64,
    pub revenue: Decimal,
    /// Bookings per assessment, as a percentage.
    pub conversion_rate: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ClientInput {
    pub email: String,
    pub name: String,
    pub phone: String,
}

#[derive(Clone)]
pub struct TenantService {
    db: Arc<dyn DatabaseService>,
    clock: Arc<dyn Clock>,
}

impl TenantService {
    pub fn new(db: Arc<dyn DatabaseService>, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    /// Registers a business and makes the caller its owner.
    pub async fn create_tenant(&self, actor: &Actor, input: NewTenant) -> PortResult<Tenant> {
        let slug = input.slug.trim().to_string();
        let mut v = Violations::new();
        v.min_len("business name", &input.business_name, 2)
            .check(
                is_valid_slug(&slug),
                "slug must be at least 3 lowercase letters, digits or dashes",
            )
            .check(input.contact.email.contains('@'), "contact email is invalid");
        v.finish()?;

        if self.db.find_tenant_by_slug(&slug).await?.is_some() {
            return Err(PortError::Validation(format!("slug '{}' is already taken", slug)));
        }

        let now = self.clock.now();
        let tenant = Tenant {
            id: Uuid::new_v4(),
            business_name: input.business_name.trim().to_string(),
            owner_subject: actor.subject.clone(),
            owner_email: input.contact.email.clone(),
            qr_code: format!("{}-{}", slug, now.timestamp_millis()),
            slug,
            branding: TenantBranding::default(),
            settings: TenantSettings {
                allow_self_assessment: true,
                require_vin: false,
                auto_approve_bookings: false,
                notification_email: input.contact.email.clone(),
            },
            contact: input.contact,
            subscription: TenantSubscription {
                plan: SubscriptionPlan::Free,
                status: SubscriptionStatus::Active,
                current_period_end: now + Duration::days(TRIAL_DAYS),
            },
            is_active: true,
            created_at: now,
        };

        let tenant = self.db.create_tenant(tenant).await?;
        self.db
            .set_user_role(actor.user_id, Role::TenantOwner, Some(tenant.id))
            .await?;
        info!(tenant_id = %tenant.id, slug = %tenant.slug, "Created tenant");
        Ok(tenant)
    }

    pub async fn get_tenant_by_slug(&self, slug: &str) -> PortResult<Tenant> {
        self.db
            .find_tenant_by_slug(slug)
            .await?
            .ok_or_else(|| PortError::NotFound(format!("tenant with slug '{}'", slug)))
    }

    pub async fn get_tenant_by_qr_code(&self, qr_code: &str) -> PortResult<Tenant> {
        self.db
            .find_tenant_by_qr_code(qr_code)
            .await?
            .ok_or_else(|| PortError::NotFound(format!("tenant with QR code '{}'", qr_code)))
    }

    pub async fn get_my_tenant(&self, actor: &Actor) -> PortResult<Tenant> {
        let tenant_id = actor
            .tenant_id
            .ok_or_else(|| PortError::NotFound("caller has no tenant".to_string()))?;
        self.db.get_tenant_by_id(tenant_id).await
    }

    pub async fn update_tenant_settings(
        &self,
        actor: &Actor,
        tenant_id: Uuid,
        update: TenantSettingsUpdate,
    ) -> PortResult<Tenant> {
        let mut tenant = self.db.get_tenant_by_id(tenant_id).await?;
        authorize(actor, Action::ManageTenant, Resource::Tenant(&tenant))?;

        if let Some(settings) = &update.settings {
            let mut v = Violations::new();
            v.check(
                settings.notification_email.contains('@'),
                "notification email is invalid",
            );
            v.finish()?;
        }

        if let Some(settings) = update.settings {
            tenant.settings = settings;
        }
        if let Some(branding) = update.branding {
            tenant.branding = branding;
        }
        self.db.update_tenant(&tenant).await?;
        info!(tenant_id = %tenant.id, "Updated tenant settings");
        Ok(tenant)
    }

    pub async fn tenant_stats(&self, actor: &Actor, tenant_id: Uuid) -> PortResult<TenantStats> {
        let tenant = self.db.get_tenant_by_id(tenant_id).await?;
        authorize(actor, Action::ViewTenantData, Resource::Tenant(&tenant))?;

        let assessments = self.db.list_assessments_by_tenant(tenant_id, None).await?;
        let bookings = self.db.list_bookings_by_tenant(tenant_id).await?;
        let clients = self.db.list_clients_by_tenant(tenant_id).await?;

        let completed: Vec<_> = bookings
            .iter()
            .filter(|b| b.status == BookingStatus::Completed)
            .collect();
        let revenue: Decimal = completed.iter().map(|b| b.total_price).sum();

        let conversion_rate = if assessments.is_empty() {
            Decimal::ZERO
        } else {
            round_display(
                Decimal::from(bookings.len() as u64) * Decimal::ONE_HUNDRED
                    / Decimal::from(assessments.len() as u64),
            )
        };

        Ok(TenantStats {
            total_assessments: assessments.len() as u64,
            total_bookings: bookings.len() as u64,
            total_clients: clients.len() as u64,
            completed_bookings: completed.len() as u64,
            revenue: round_display(revenue),
            conversion_rate,
        })
    }

    /// Idempotent per (tenant, email).
    pub async fn create_or_get_client(
        &self,
        tenant_id: Uuid,
        input: ClientInput,
    ) -> PortResult<Client> {
        let email = input.email.trim().to_lowercase();
        let mut v = Violations::new();
        v.check(email.contains('@'), "email is invalid")
            .min_len("name", &input.name, 1);
        v.finish()?;

        let tenant = self.db.get_tenant_by_id(tenant_id).await?;
        if !tenant.is_active {
            return Err(PortError::NotFound(format!("tenant {}", tenant_id)));
        }

        if let Some(existing) = self.db.find_client_by_email(tenant_id, &email).await? {
            return Ok(existing);
        }

        let client = Client {
            id: Uuid::new_v4(),
            tenant_id,
            email,
            name: input.name.trim().to_string(),
            phone: input.phone.trim().to_string(),
            created_at: self.clock.now(),
            last_assessment_at: None,
        };
        let client = self.db.create_client(client).await?;
        info!(tenant_id = %tenant_id, client_id = %client.id, "Registered client");
        Ok(client)
    }

    pub async fn list_tenant_clients(
        &self,
        actor: &Actor,
        tenant_id: Uuid,
    ) -> PortResult<Vec<Client>> {
        authorize(actor, Action::ViewTenantData, Resource::TenantScope(tenant_id))?;
        self.db.list_clients_by_tenant(tenant_id).await
    }
}
