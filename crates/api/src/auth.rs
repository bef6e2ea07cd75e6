//! Principal extraction.
//!
//! Session resolution is owned by the auth layer in front of this
//! service; by the time a request reaches us it carries the resolved
//! identity in `x-user-id` / `x-user-role` headers. This extractor
//! turns those into a [`Principal`] and rejects anything malformed.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use common::{Principal, Role, UserId};
use uuid::Uuid;

use crate::error::ApiError;

/// The authenticated principal for a request.
#[derive(Debug, Clone, Copy)]
pub struct AuthPrincipal(pub Principal);

impl<S> FromRequestParts<S> for AuthPrincipal
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .ok_or_else(|| ApiError::Unauthorized(format!("Missing {name} header")))
        };

        let id = Uuid::parse_str(header("x-user-id")?)
            .map_err(|e| ApiError::Unauthorized(format!("Invalid x-user-id: {e}")))?;
        let role = Role::parse(header("x-user-role")?)
            .ok_or_else(|| ApiError::Unauthorized("Invalid x-user-role".to_string()))?;

        Ok(AuthPrincipal(Principal::new(UserId::from_uuid(id), role)))
    }
}
