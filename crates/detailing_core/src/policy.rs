//! crates/detailing_core/src/policy.rs
//!
//! The single authorization policy. Every use case calls [`authorize`] at
//! entry instead of checking roles inline.

use uuid::Uuid;

use crate::domain::{Role, Tenant, User};
use crate::ports::{PortError, PortResult};

/// The verified caller, as resolved from the identity collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub user_id: Uuid,
    pub subject: String,
    pub role: Role,
    pub tenant_id: Option<Uuid>,
}

impl Actor {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Owner or admin of the given tenant.
    pub fn operates(&self, tenant_id: Uuid) -> bool {
        matches!(self.role, Role::TenantOwner | Role::TenantAdmin)
            && self.tenant_id == Some(tenant_id)
    }
}

impl From<&User> for Actor {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id,
            subject: user.subject.clone(),
            role: user.role,
            tenant_id: user.tenant_id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    ManageCatalog,
    ViewBooking,
    ListAllBookings,
    UpdateBookingStatus,
    ManageVehicle,
    ViewPricingAnalytics,
    RunJobs,
    ManageTenant,
    ViewTenantData,
    ReviewAssessment,
}

/// What an action is performed on.
#[derive(Debug, Clone, Copy)]
pub enum Resource<'a> {
    /// Platform-wide data such as the catalog or all bookings.
    Platform,
    /// A record owned by the given user.
    OwnedBy(Uuid),
    Tenant(&'a Tenant),
    /// Data belonging to a tenant, by id.
    TenantScope(Uuid),
}

pub fn can_perform(actor: &Actor, action: Action, resource: Resource<'_>) -> bool {
    use Action::*;

    match (action, resource) {
        (
            ManageCatalog | ListAllBookings | UpdateBookingStatus | ViewPricingAnalytics | RunJobs,
            Resource::Platform,
        ) => {
            actor.is_admin()
        }
        (ViewBooking, Resource::OwnedBy(owner)) => owner == actor.user_id || actor.is_admin(),
        // Vehicles are never managed on someone else's behalf.
        (ManageVehicle, Resource::OwnedBy(owner)) => owner == actor.user_id,
        (ManageTenant, Resource::Tenant(tenant)) => {
            tenant.owner_subject == actor.subject || actor.is_admin()
        }
        (ViewTenantData | ReviewAssessment, Resource::Tenant(tenant)) => {
            actor.operates(tenant.id) || tenant.owner_subject == actor.subject || actor.is_admin()
        }
        (ViewTenantData | ReviewAssessment, Resource::TenantScope(tenant_id)) => {
            actor.operates(tenant_id) || actor.is_admin()
        }
        _ => false,
    }
}

/// [`can_perform`] as a `PortResult`.
pub fn authorize(actor: &Actor, action: Action, resource: Resource<'_>) -> PortResult<()> {
    if can_perform(actor, action, resource) {
        Ok(())
    } else {
        tracing::debug!(user_id = %actor.user_id, ?action, "Authorization denied");
        Err(PortError::Unauthorized)
    }
}
