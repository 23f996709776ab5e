//! Bearer token verification for secured routes.

use crate::{
    domain::{media_store::MediaStore, user_repository::UserRepository},
    infra::api::AppState,
};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};
use error_ext::axum::Error;
use uuid::Uuid;

/// The authenticated user, attached to the request by [require_auth].
#[derive(Debug, Clone, Copy)]
pub struct CurrentUser {
    pub id: Uuid,
}

/// Middleware verifying the bearer access token and attaching the authenticated user to the
/// request. Requests without a valid token are rejected before any handler runs.
pub async fn require_auth<R, M>(
    State(app_state): State<AppState<R, M>>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    mut request: Request,
    next: Next,
) -> Result<Response, Error>
where
    R: UserRepository,
    M: MediaStore,
{
    let token = bearer
        .ok_or(Error::unauthorized("missing bearer token"))
        .map(|TypedHeader(Authorization(bearer))| bearer.token().into())?;

    let id = app_state
        .tokens
        .verify_access_token(&token)
        .map_err(Error::unauthorized)?;

    request.extensions_mut().insert(CurrentUser { id });

    Ok(next.run(request).await)
}
