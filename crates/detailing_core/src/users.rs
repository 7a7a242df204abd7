//! crates/detailing_core/src/users.rs
//!
//! Maps verified identities to internal users and edits their profile.

use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

use crate::domain::{Identity, User};
use crate::policy::Actor;
use crate::ports::{DatabaseService, PortResult};
use crate::validation::Violations;

pub const DEFAULT_USER_NAME: &str = "User";

#[derive(Debug, Clone, Default, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub phone: Option<String>,
}

#[derive(Clone)]
pub struct UserService {
    db: Arc<dyn DatabaseService>,
}

impl UserService {
    pub fn new(db: Arc<dyn DatabaseService>) -> Self {
        Self { db }
    }

    /// Returns the user for an identity, creating a `customer` on first sight.
    pub async fn resolve(&self, identity: &Identity) -> PortResult<User> {
        let mut identity = identity.clone();
        let blank = identity.name.as_deref().map_or(true, |n| n.trim().is_empty());
        if blank {
            identity.name = Some(DEFAULT_USER_NAME.to_string());
        }
        let user = self.db.get_or_create_user(&identity).await?;
        debug!(user_id = %user.id, role = %user.role, "Resolved caller");
        Ok(user)
    }

    pub async fn me(&self, actor: &Actor) -> PortResult<User> {
        self.db.get_user_by_id(actor.user_id).await
    }

    /// Changes only the supplied fields.
    pub async fn update_profile(&self, actor: &Actor, update: ProfileUpdate) -> PortResult<User> {
        let mut violations = Violations::new();
        if let Some(name) = &update.name {
            violations.min_len("name", name, 1);
        }
        violations.finish()?;

        self.db
            .update_user_profile(
                actor.user_id,
                update.name.as_deref().map(str::trim),
                update.phone.as_deref(),
            )
            .await
    }
}
