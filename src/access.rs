//! Access gate: who may do what to which resource.
//!
//! The rules only need the caller's id and role plus the owner ids of the
//! resource, so they are plain functions over copies of those values.

use uuid::Uuid;

use crate::models::{User, UserRole};
use crate::service::ServiceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub id: Uuid,
    pub role: UserRole,
}

impl Actor {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

impl From<&User> for Actor {
    fn from(user: &User) -> Self {
        Actor {
            id: user.id,
            role: user.role,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    /// The listing catalogue as a whole.
    Listings,
    Internship { owner: Uuid },
    Application { student: Uuid, internship_owner: Uuid },
    /// Account administration.
    Users,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Create,
    Update,
    Delete,
    ViewApplications,
    Decide,
    Withdraw,
    Manage,
}

pub fn require_role(actor: &Actor, roles: &[UserRole]) -> Result<(), ServiceError> {
    if roles.contains(&actor.role) {
        Ok(())
    } else {
        Err(ServiceError::Forbidden)
    }
}

fn owner_or_admin(actor: &Actor, owner: Uuid) -> Result<(), ServiceError> {
    if actor.is_admin() || actor.id == owner {
        Ok(())
    } else {
        Err(ServiceError::Forbidden)
    }
}

pub fn authorize(actor: &Actor, resource: Resource, action: Action) -> Result<(), ServiceError> {
    match (resource, action) {
        (Resource::Listings, Action::Create) => {
            require_role(actor, &[UserRole::Company, UserRole::Admin])
        }
        (
            Resource::Internship { owner },
            Action::Update | Action::Delete | Action::ViewApplications,
        ) => owner_or_admin(actor, owner),
        (
            Resource::Application {
                internship_owner, ..
            },
            Action::Decide,
        ) => owner_or_admin(actor, internship_owner),
        (Resource::Application { student, .. }, Action::Withdraw) => {
            owner_or_admin(actor, student)
        }
        (Resource::Users, Action::Manage) => require_role(actor, &[UserRole::Admin]),
        _ => Err(ServiceError::Forbidden),
    }
}
