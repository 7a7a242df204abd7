//! crates/detailing_core/src/catalog.rs
//!
//! Operator management of the service catalog. Services are deactivated,
//! never deleted.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::domain::{MultiplierTable, PartialMultipliers, Service, ServiceCategory};
use crate::policy::{authorize, Action, Actor, Resource};
use crate::ports::{DatabaseService, PortResult};
use crate::validation::Violations;

pub const MIN_DURATION_MINUTES: u32 = 15;
pub const MAX_DURATION_MINUTES: u32 = 480;
pub const MAX_BASE_PRICE: Decimal = dec!(100000);
pub const MAX_MULTIPLIER: Decimal = dec!(10);

#[derive(Debug, Clone, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct NewService {
    pub name: String,
    pub description: String,
    pub category: ServiceCategory,
    pub base_price: Decimal,
    pub duration_minutes: u32,
    pub vehicle_type_multipliers: PartialMultipliers,
    #[serde(default)]
    pub tenant_id: Option<Uuid>,
}

/// A partial update; absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ServicePatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<ServiceCategory>,
    pub base_price: Option<Decimal>,
    pub duration_minutes: Option<u32>,
    pub is_active: Option<bool>,
    pub vehicle_type_multipliers: Option<PartialMultipliers>,
}

fn check_name(v: &mut Violations, name: &str) {
    v.min_len("name", name, 3);
}

fn check_description(v: &mut Violations, description: &str) {
    v.min_len("description", description, 10);
}

fn check_price(v: &mut Violations, price: Decimal) {
    v.check(
        price > Decimal::ZERO && price <= MAX_BASE_PRICE,
        format!("base price must be greater than 0 and at most {}", MAX_BASE_PRICE),
    );
}

fn check_duration(v: &mut Violations, minutes: u32) {
    v.check(
        (MIN_DURATION_MINUTES..=MAX_DURATION_MINUTES).contains(&minutes),
        format!(
            "duration must be between {} and {} minutes",
            MIN_DURATION_MINUTES, MAX_DURATION_MINUTES
        ),
    );
}

/// Operator input must name every vehicle type with a multiplier in `(0, 10]`.
fn check_multipliers(v: &mut Violations, table: &PartialMultipliers) {
    let missing = table.missing();
    v.check(
        missing.is_empty(),
        format!(
            "multiplier table is missing: {}",
            missing.iter().map(|t| t.as_str()).collect::<Vec<_>>().join(", ")
        ),
    );
    v.check(
        [table.sedan, table.suv, table.truck, table.van, table.coupe, table.luxury]
            .iter()
            .flatten()
            .all(|m| *m > Decimal::ZERO && *m <= MAX_MULTIPLIER),
        format!("multipliers must be greater than 0 and at most {}", MAX_MULTIPLIER),
    );
}

#[derive(Clone)]
pub struct CatalogService {
    db: Arc<dyn DatabaseService>,
}

impl CatalogService {
    pub fn new(db: Arc<dyn DatabaseService>) -> Self {
        Self { db }
    }

    pub async fn create_service(&self, actor: &Actor, input: NewService) -> PortResult<Service> {
        authorize(actor, Action::ManageCatalog, Resource::Platform)?;

        let mut v = Violations::new();
        check_name(&mut v, &input.name);
        check_description(&mut v, &input.description);
        check_price(&mut v, input.base_price);
        check_duration(&mut v, input.duration_minutes);
        check_multipliers(&mut v, &input.vehicle_type_multipliers);
        v.finish()?;

        let (table, _) = MultiplierTable::normalize(&input.vehicle_type_multipliers);
        let service = Service {
            id: Uuid::new_v4(),
            tenant_id: input.tenant_id,
            name: input.name.trim().to_string(),
            description: input.description.trim().to_string(),
            category: input.category,
            base_price: input.base_price,
            duration_minutes: input.duration_minutes,
            is_active: true,
            vehicle_type_multipliers: table,
        };
        let created = self.db.create_service(service).await?;
        info!(service_id = %created.id, name = %created.name, "Created service");
        Ok(created)
    }

    /// Validates the whole patch before applying any of it.
    pub async fn update_service(
        &self,
        actor: &Actor,
        service_id: Uuid,
        patch: ServicePatch,
    ) -> PortResult<Service> {
        authorize(actor, Action::ManageCatalog, Resource::Platform)?;

        let mut v = Violations::new();
        if let Some(name) = &patch.name {
            check_name(&mut v, name);
        }
        if let Some(description) = &patch.description {
            check_description(&mut v, description);
        }
        if let Some(price) = patch.base_price {
            check_price(&mut v, price);
        }
        if let Some(minutes) = patch.duration_minutes {
            check_duration(&mut v, minutes);
        }
        if let Some(table) = &patch.vehicle_type_multipliers {
            check_multipliers(&mut v, table);
        }
        v.finish()?;

        let mut service = self.db.get_service_by_id(service_id).await?;
        if let Some(name) = patch.name {
            service.name = name.trim().to_string();
        }
        if let Some(description) = patch.description {
            service.description = description.trim().to_string();
        }
        if let Some(category) = patch.category {
            service.category = category;
        }
        if let Some(price) = patch.base_price {
            service.base_price = price;
        }
        if let Some(minutes) = patch.duration_minutes {
            service.duration_minutes = minutes;
        }
        if let Some(active) = patch.is_active {
            service.is_active = active;
        }
        if let Some(table) = patch.vehicle_type_multipliers {
            service.vehicle_type_multipliers = MultiplierTable::normalize(&table).0;
        }

        self.db.update_service(&service).await?;
        info!(service_id = %service.id, active = service.is_active, "Updated service");
        Ok(service)
    }

    pub async fn list_active_services(
        &self,
        category: Option<ServiceCategory>,
    ) -> PortResult<Vec<Service>> {
        self.db.list_active_services(category).await
    }

    pub async fn get_service(&self, service_id: Uuid) -> PortResult<Service> {
        self.db.get_service_by_id(service_id).await
    }
}
