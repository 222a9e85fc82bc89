// src/utils/jwt.rs

use std::time::{SystemTime, UNIX_EPOCH};

use axum::{
    body::Body,
    extract::{FromRequestParts, State},
    http::{Request, header, request::Parts},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::{error::AppError, state::AppState};

/// JWT Claims structure.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Claims {
    /// Subject - Stores the User ID (as string).
    pub sub: String,
    /// Token generation of the user; logging out bumps it and revokes older tokens.
    pub ver: i32,
    /// Expiration time as Unix timestamp.
    pub exp: usize,
}

/// The authenticated user behind a request.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthUser {
    pub id: i64,
    pub role: String,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == "admin"
    }
}

/// Request extension inserted by `auth_middleware` for every request.
/// `None` means the request is anonymous.
#[derive(Debug, Clone, Default)]
pub struct Viewer(pub Option<AuthUser>);

impl Viewer {
    pub fn user_id(&self) -> Option<i64> {
        self.0.as_ref().map(|u| u.id)
    }
}

/// Signs a new JWT for the user.
///
/// The role is not part of the token; `auth_middleware` reads it from the
/// user row on every request.
///
/// Arguments:
/// * `id`: User ID.
/// * `version`: Current token version of the user.
pub fn sign_jwt(
    id: i64,
    version: i32,
    secret: &str,
    expiration_seconds: u64,
) -> Result<String, AppError> {
    // Calculate expiration: current time + expiration_seconds
    let expiration = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| AppError::InternalServerError(e.to_string()))?
        .as_secs() as usize
        + expiration_seconds as usize;

    let claims = Claims {
        sub: id.to_string(),
        ver: version,
        exp: expiration,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::InternalServerError(e.to_string()))
}

/// Verifies and decodes a JWT string.
///
/// Returns the `Claims` if valid, otherwise returns an `AppError`.
pub fn verify_jwt(token: &str, secret: &str) -> Result<Claims, AppError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| AppError::invalid_token())?;

    Ok(token_data.claims)
}

/// Extracts the token from `Token <jwt>` or `Bearer <jwt>`.
fn token_from_header(value: &str) -> Option<&str> {
    value
        .strip_prefix("Token ")
        .or_else(|| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Axum Middleware: Authentication.
///
/// Resolves the caller for every request and injects a `Viewer` extension.
/// Requests without an `Authorization` header pass through as anonymous;
/// a header carrying a malformed, expired or revoked token is rejected with 401.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .map(|value| value.to_str().map_err(|_| AppError::invalid_token()))
        .transpose()?;

    let viewer = match auth_header {
        None => Viewer(None),
        Some(header) => {
            let token = token_from_header(header).ok_or_else(AppError::invalid_token)?;
            let claims = verify_jwt(token, &state.config.secret_key)?;
            let user_id = claims
                .sub
                .parse::<i64>()
                .map_err(|_| AppError::invalid_token())?;

            let current = sqlx::query_as::<_, (i32, String)>(
                "SELECT token_version, role FROM users WHERE id = $1",
            )
            .bind(user_id)
            .fetch_optional(&state.pool)
            .await?;

            match current {
                Some((version, role)) if version == claims.ver => {
                    Viewer(Some(AuthUser { id: user_id, role }))
                }
                _ => return Err(AppError::invalid_token()),
            }
        }
    };

    req.extensions_mut().insert(viewer);
    Ok(next.run(req).await)
}

/// Axum Middleware: Admin Authorization.
///
/// Must run AFTER `auth_middleware`. Anonymous callers get 401, non-admins 403.
pub async fn admin_middleware(req: Request<Body>, next: Next) -> Result<Response, AppError> {
    let user = req
        .extensions()
        .get::<Viewer>()
        .and_then(|v| v.0.as_ref())
        .ok_or_else(AppError::unauthenticated)?;

    if !user.is_admin() {
        return Err(AppError::Forbidden(
            "You do not have permission to perform this action.".to_string(),
        ));
    }

    Ok(next.run(req).await)
}

/// Handlers taking `AuthUser` require an authenticated caller.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Viewer>()
            .and_then(|v| v.0.clone())
            .ok_or_else(AppError::unauthenticated)
    }
}

/// Handlers taking `Viewer` accept anonymous callers too.
impl<S> FromRequestParts<S> for Viewer
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts.extensions.get::<Viewer>().cloned().unwrap_or_default())
    }
}
