use actix_web::HttpRequest;
use uuid::Uuid;

use crate::errors::ApiError;

/// Role asserted by the upstream auth middleware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorRole {
    Customer,
    Owner,
    Admin,
}

impl ActorRole {
    fn parse(value: &str) -> Self {
        match value {
            "admin" => Self::Admin,
            "owner" | "business_owner" => Self::Owner,
            _ => Self::Customer,
        }
    }
}

/// The acting identity behind a request.
///
/// Credential validation happens upstream; this service trusts the identity
/// headers the gateway injects (`X-Actor-Id`, `X-Actor-Role`).
#[derive(Debug, Clone, Copy)]
pub struct Actor {
    pub id: Uuid,
    pub role: ActorRole,
}

impl Actor {
    pub fn is_admin(&self) -> bool {
        self.role == ActorRole::Admin
    }

    /// Capability check used before every mutation: the actor must own the
    /// target or hold the admin role.
    pub fn can_manage(&self, target_owner_id: Uuid) -> bool {
        self.id == target_owner_id || self.is_admin()
    }

    /// Business creation is reserved for owner or admin accounts.
    pub fn can_list_businesses(&self) -> bool {
        matches!(self.role, ActorRole::Owner | ActorRole::Admin)
    }
}

/// Extracts the acting identity from the request headers, failing with 401
/// when the gateway did not supply one.
pub fn require_actor(req: &HttpRequest) -> Result<Actor, ApiError> {
    let id = req
        .headers()
        .get("X-Actor-Id")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| Uuid::parse_str(s).ok())
        .ok_or_else(|| {
            ApiError::Unauthorized("Missing or invalid X-Actor-Id header".to_string())
        })?;

    let role = req
        .headers()
        .get("X-Actor-Role")
        .and_then(|h| h.to_str().ok())
        .map(ActorRole::parse)
        .unwrap_or(ActorRole::Customer);

    Ok(Actor { id, role })
}
