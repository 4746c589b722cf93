// Bearer authentication and permission checks for axum handlers

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use orchestrator::PermittedGroups;
use tracing::{instrument, warn};

use crate::auth::{AuthError, UserClaims};
use crate::state::AppState;

/// Claims of the authenticated caller, stored in request extensions
#[derive(Clone, Debug)]
pub struct AuthenticatedUser(pub UserClaims);

impl AuthenticatedUser {
    /// Job groups this caller may see or act on
    pub fn permitted_groups(&self) -> PermittedGroups {
        PermittedGroups::from_groups(self.0.groups.iter().cloned())
    }
}

#[instrument(skip(state, request, next))]
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| {
            warn!("Missing Authorization header");
            AuthError::InvalidToken("Missing Authorization header".to_string())
        })?;

    let token = auth_header.strip_prefix("Bearer ").ok_or_else(|| {
        warn!("Invalid Authorization header format");
        AuthError::InvalidToken("Invalid Authorization header format".to_string())
    })?;

    let claims = state.jwt.decode_token(token)?;
    request.extensions_mut().insert(AuthenticatedUser(claims));

    Ok(next.run(request).await)
}

pub fn check_permission(
    user: &AuthenticatedUser,
    required_permission: &str,
) -> Result<(), AuthError> {
    if !user.0.permissions.iter().any(|p| p == required_permission) {
        warn!(
            user_id = %user.0.sub,
            username = %user.0.username,
            required_permission = %required_permission,
            "Insufficient permissions"
        );
        return Err(AuthError::InsufficientPermissions(
            required_permission.to_string(),
        ));
    }

    tracing::debug!(
        user_id = %user.0.sub,
        permission = %required_permission,
        "Permission check passed"
    );
    Ok(())
}
