//! Request extractors: tenant context, authenticated callers and JSON-error
//! wrappers around axum's body, path and query extractors.

use crate::{ApiError, AppState};
use async_trait::async_trait;
use axum::{
    extract::{FromRequest, FromRequestParts, Path, Query, Request},
    http::{header, request::Parts},
    Json,
};
use serde::de::DeserializeOwned;
use tidyhub_core::prelude::*;
use tidyhub_core::tenant::{cookie_value, resolve_tenant, TENANT_COOKIE, TENANT_HEADER};
use tracing::{debug, warn};

/// Cookie holding the access token for browser sessions
pub const ACCESS_TOKEN_COOKIE: &str = "sb-access-token";

fn header_value<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts.headers.get(name).and_then(|v| v.to_str().ok())
}

fn cookie<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts
        .headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|raw| cookie_value(raw, name))
}

/// Bearer token from the `Authorization` header, else the session cookie
pub fn access_token(parts: &Parts) -> Option<String> {
    header_value(parts, header::AUTHORIZATION.as_str())
        .and_then(|v| v.strip_prefix("Bearer ").or_else(|| v.strip_prefix("bearer ")))
        .map(str::trim)
        .or_else(|| cookie(parts, ACCESS_TOKEN_COOKIE))
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}

/// Tenant named by the request, if any. A malformed value is an error.
pub fn requested_tenant(parts: &Parts) -> Result<Option<TenantId>, ApiError> {
    let header = header_value(parts, TENANT_HEADER).filter(|v| !v.trim().is_empty());
    let cookie = cookie(parts, TENANT_COOKIE).filter(|v| !v.trim().is_empty());
    if header.is_none() && cookie.is_none() {
        return Ok(None);
    }
    Ok(Some(resolve_tenant(header, cookie)?))
}

/// An active tenant resolved from the request
#[derive(Debug, Clone, Copy)]
pub struct TenantContext(pub TenantId);

#[async_trait]
impl FromRequestParts<AppState> for TenantContext {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let tenant = requested_tenant(parts)?.ok_or_else(|| ApiError::forbidden("Tenant context required"))?;
        state.marketplace.ensure_tenant_active(tenant).await?;
        Ok(TenantContext(tenant))
    }
}

/// An authenticated user, with the caller the services act for
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub identity: Identity,
    pub caller: Caller,
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = access_token(parts).ok_or_else(ApiError::unauthorized)?;
        let identity = state.marketplace.authenticate(&token).await?;
        let requested = requested_tenant(parts)?;

        let tenant = if identity.role.is_root() {
            requested
        } else {
            match requested {
                Some(tenant) if identity.tenant_id != Some(tenant) => {
                    warn!("User {} presented a token for another tenant", identity.id);
                    return Err(ApiError::forbidden("Tenant mismatch"));
                }
                Some(tenant) => Some(tenant),
                None => identity.tenant_id,
            }
        };
        if !identity.role.is_root() {
            if let Some(tenant) = tenant {
                state.marketplace.ensure_tenant_active(tenant).await?;
            }
        }

        debug!("Authenticated {} as {}", identity.id, identity.role);
        let caller = Caller {
            user_id: identity.id,
            role: identity.role,
            tenant,
        };
        Ok(AuthUser { identity, caller })
    }
}

/// A tenant administrator or root administrator
#[derive(Debug, Clone)]
pub struct AdminUser(pub AuthUser);

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if !user.identity.role.is_admin() {
            return Err(ApiError::forbidden("Admin access required"));
        }
        Ok(AdminUser(user))
    }
}

/// A root administrator acting platform-wide
#[derive(Debug, Clone)]
pub struct RootAdminUser(pub AuthUser);

#[async_trait]
impl FromRequestParts<AppState> for RootAdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let mut user = AuthUser::from_request_parts(parts, state).await?;
        if !user.identity.role.is_root() {
            return Err(ApiError::forbidden("Root admin access required"));
        }
        // Root routes always run with the service role
        user.caller.tenant = None;
        Ok(RootAdminUser(user))
    }
}

/// JSON body whose rejection is a JSON error
#[derive(Debug)]
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(request: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(request, state)
            .await
            .map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;
        Ok(JsonBody(value))
    }
}

/// Path parameters whose rejection is a JSON error
#[derive(Debug)]
pub struct ApiPath<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for ApiPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(value) = Path::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;
        Ok(ApiPath(value))
    }
}

/// Query string whose rejection is a JSON error
#[derive(Debug)]
pub struct ApiQuery<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;
        Ok(ApiQuery(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request as HttpRequest;

    fn parts(headers: &[(&str, &str)]) -> Parts {
        let mut builder = HttpRequest::builder().uri("/api/bookings");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_access_token_sources() {
        assert_eq!(access_token(&parts(&[("authorization", "Bearer abc")])), Some("abc".to_string()));
        assert_eq!(
            access_token(&parts(&[("cookie", "theme=dark; sb-access-token=xyz")])),
            Some("xyz".to_string())
        );
        assert_eq!(access_token(&parts(&[("authorization", "Basic Zm9v")])), None);
        assert_eq!(access_token(&parts(&[])), None);
    }

    #[test]
    fn test_requested_tenant() {
        let tenant = TenantId::new_v4();
        let header = parts(&[("x-tenant-id", &tenant.to_string())]);
        assert_eq!(requested_tenant(&header).unwrap(), Some(tenant));

        let cookie = parts(&[("cookie", &format!("tenant_id={}", tenant))]);
        assert_eq!(requested_tenant(&cookie).unwrap(), Some(tenant));

        assert_eq!(requested_tenant(&parts(&[])).unwrap(), None);

        // Version 1 UUIDs are not tenant ids
        let v1 = parts(&[("x-tenant-id", "c232ab00-9414-11ec-b3c8-9f6bdeced846")]);
        let error = requested_tenant(&v1).unwrap_err();
        assert_eq!(error.status, axum::http::StatusCode::FORBIDDEN);
        assert_eq!(error.message, "Invalid tenant id");
    }
}
