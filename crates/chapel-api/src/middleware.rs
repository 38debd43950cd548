use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};

use chapel_types::api::Claims;
use chapel_types::models::Member;

use crate::{Api, ApiError};

/// Caller holding a valid bearer JWT.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Claims);

/// Caller whose stored account currently holds a staff role. The role in the
/// token is not trusted, so a demotion takes effect on the next request.
#[derive(Debug, Clone)]
pub struct StaffUser(pub Member);

fn bearer_token(parts: &Parts) -> Result<&str, ApiError> {
    parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| ApiError::Unauthorized("missing bearer token".to_string()))
}

impl FromRequestParts<Api> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, api: &Api) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;
        api.auth().decode_token(token).map(AuthUser)
    }
}

impl FromRequestParts<Api> for StaffUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, api: &Api) -> Result<Self, Self::Rejection> {
        let AuthUser(claims) = AuthUser::from_request_parts(parts, api).await?;
        let member = api
            .members()
            .get(&claims.sub)
            .await?
            .ok_or_else(|| ApiError::Unauthorized("account no longer exists".to_string()))?;
        if !member.role.is_staff() {
            return Err(ApiError::Forbidden("staff role required".to_string()));
        }
        Ok(StaffUser(member))
    }
}
