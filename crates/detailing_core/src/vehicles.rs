//! crates/detailing_core/src/vehicles.rs
//!
//! Customer vehicles. Only the owner may read or change one.

use chrono::Datelike;
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::domain::{Vehicle, VehicleType};
use crate::policy::{authorize, Action, Actor, Resource};
use crate::ports::{Clock, DatabaseService, PortResult};
use crate::validation::Violations;

pub const MIN_VEHICLE_YEAR: i32 = 1900;

#[derive(Debug, Clone, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct VehicleInput {
    pub make: String,
    pub model: String,
    pub year: i32,
    pub color: String,
    pub vehicle_type: VehicleType,
    pub license_plate: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct VehiclePatch {
    pub make: Option<String>,
    pub model: Option<String>,
    pub year: Option<i32>,
    pub color: Option<String>,
    pub vehicle_type: Option<VehicleType>,
    pub license_plate: Option<String>,
    pub notes: Option<String>,
}

struct VehicleRules {
    max_year: i32,
}

impl VehicleRules {
    fn make(&self, v: &mut Violations, make: &str) {
        v.min_len("make", make, 2);
    }

    fn model(&self, v: &mut Violations, model: &str) {
        v.min_len("model", model, 1);
    }

    fn year(&self, v: &mut Violations, year: i32) {
        v.check(
            (MIN_VEHICLE_YEAR..=self.max_year).contains(&year),
            format!("year must be between {} and {}", MIN_VEHICLE_YEAR, self.max_year),
        );
    }

    fn color(&self, v: &mut Violations, color: &str) {
        v.min_len("color", color, 2);
    }
}

#[derive(Clone)]
pub struct VehicleService {
    db: Arc<dyn DatabaseService>,
    clock: Arc<dyn Clock>,
}

impl VehicleService {
    pub fn new(db: Arc<dyn DatabaseService>, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    fn rules(&self) -> VehicleRules {
        VehicleRules {
            max_year: self.clock.now().year() + 1,
        }
    }

    pub async fn add_vehicle(&self, actor: &Actor, input: VehicleInput) -> PortResult<Vehicle> {
        let rules = self.rules();
        let mut v = Violations::new();
        rules.make(&mut v, &input.make);
        rules.model(&mut v, &input.model);
        rules.year(&mut v, input.year);
        rules.color(&mut v, &input.color);
        v.finish()?;

        let vehicle = Vehicle {
            id: Uuid::new_v4(),
            user_id: actor.user_id,
            tenant_id: actor.tenant_id,
            make: input.make.trim().to_string(),
            model: input.model.trim().to_string(),
            year: input.year,
            color: input.color.trim().to_string(),
            license_plate: input.license_plate,
            vehicle_type: input.vehicle_type,
            notes: input.notes,
        };
        let created = self.db.create_vehicle(vehicle).await?;
        info!(vehicle_id = %created.id, user_id = %actor.user_id, "Added vehicle");
        Ok(created)
    }

    pub async fn list_my_vehicles(&self, actor: &Actor) -> PortResult<Vec<Vehicle>> {
        self.db.get_vehicles_by_user(actor.user_id).await
    }

    /// Loads a vehicle and checks the caller owns it.
    pub async fn get_vehicle(&self, actor: &Actor, vehicle_id: Uuid) -> PortResult<Vehicle> {
        let vehicle = self.db.get_vehicle_by_id(vehicle_id).await?;
        authorize(actor, Action::ManageVehicle, Resource::OwnedBy(vehicle.user_id))?;
        Ok(vehicle)
    }

    pub async fn update_vehicle(
        &self,
        actor: &Actor,
        vehicle_id: Uuid,
        patch: VehiclePatch,
    ) -> PortResult<Vehicle> {
        let mut vehicle = self.get_vehicle(actor, vehicle_id).await?;

        let rules = self.rules();
        let mut v = Violations::new();
        if let Some(make) = &patch.make {
            rules.make(&mut v, make);
        }
        if let Some(model) = &patch.model {
            rules.model(&mut v, model);
        }
        if let Some(year) = patch.year {
            rules.year(&mut v, year);
        }
        if let Some(color) = &patch.color {
            rules.color(&mut v, color);
        }
        v.finish()?;

        if let Some(make) = patch.make {
            vehicle.make = make.trim().to_string();
        }
        if let Some(model) = patch.model {
            vehicle.model = model.trim().to_string();
        }
        if let Some(year) = patch.year {
            vehicle.year = year;
        }
        if let Some(color) = patch.color {
            vehicle.color = color.trim().to_string();
        }
        if let Some(vehicle_type) = patch.vehicle_type {
            vehicle.vehicle_type = vehicle_type;
        }
        if patch.license_plate.is_some() {
            vehicle.license_plate = patch.license_plate;
        }
        if patch.notes.is_some() {
            vehicle.notes = patch.notes;
        }

        self.db.update_vehicle(&vehicle).await?;
        Ok(vehicle)
    }

    pub async fn delete_vehicle(&self, actor: &Actor, vehicle_id: Uuid) -> PortResult<()> {
        let vehicle = self.get_vehicle(actor, vehicle_id).await?;
        self.db.delete_vehicle(vehicle.id).await?;
        info!(vehicle_id = %vehicle.id, "Deleted vehicle");
        Ok(())
    }
}
