// src/handlers/auth.rs

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde_json::json;
use sqlx::PgPool;
use validator::Validate;

use crate::{
    config::Config,
    error::AppError,
    models::user::{CreateUserRequest, CreatedUser, LoginRequest, User},
    utils::{
        hash::{hash_password, verify_password},
        jwt::{AuthUser, sign_jwt},
    },
};

/// Unique constraints on `users` and the field each one reports against.
pub(crate) const USER_UNIQUE_CONSTRAINTS: &[(&str, &str, &str)] = &[
    (
        "users_email_key",
        "email",
        "A user with that email already exists.",
    ),
    (
        "users_email_lower_key",
        "email",
        "A user with that email already exists.",
    ),
    (
        "users_username_key",
        "username",
        "A user with that username already exists.",
    ),
];

/// Registers a new user.
///
/// Hashes the password using Argon2 before storing it.
/// Returns 201 Created and the user object (excluding password).
pub async fn register(
    State(pool): State<PgPool>,
    Json(payload): Json<CreateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let hashed_password = hash_password(&payload.password)?;

    let user = sqlx::query_as::<_, CreatedUser>(
        r#"
        INSERT INTO users (email, username, first_name, last_name, password)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id, email, username, first_name, last_name
        "#,
    )
    .bind(&payload.email)
    .bind(&payload.username)
    .bind(&payload.first_name)
    .bind(&payload.last_name)
    .bind(&hashed_password)
    .fetch_one(&pool)
    .await
    .map_err(|e| AppError::from_db(e, USER_UNIQUE_CONSTRAINTS))?;

    tracing::info!("Registered user '{}' (id {})", user.username, user.id);

    Ok((StatusCode::CREATED, Json(user)))
}

/// Exchanges e-mail and password for a token.
pub async fn login(
    State(pool): State<PgPool>,
    State(config): State<Config>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let invalid_credentials =
        || AppError::BadRequest("Unable to log in with provided credentials.".to_string());

    let user = sqlx::query_as::<_, User>(
        r#"
        SELECT id, email, username, first_name, last_name,
               password, role, token_version, created_at
        FROM users
        WHERE LOWER(email) = LOWER($1)
        "#,
    )
    .bind(payload.email.trim())
    .fetch_optional(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Login DB error: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?
    .ok_or_else(invalid_credentials)?;

    if !verify_password(&payload.password, &user.password)? {
        return Err(invalid_credentials());
    }

    let token = sign_jwt(
        user.id,
        user.token_version,
        &config.secret_key,
        config.jwt_expiration,
    )?;

    tracing::debug!("Issued token for user {}", user.id);

    Ok(Json(json!({ "auth_token": token })))
}

/// Revokes every token issued to the caller so far.
pub async fn logout(
    State(pool): State<PgPool>,
    user: AuthUser,
) -> Result<StatusCode, AppError> {
    sqlx::query("UPDATE users SET token_version = token_version + 1 WHERE id = $1")
        .bind(user.id)
        .execute(&pool)
        .await?;

    tracing::debug!("User {} logged out", user.id);

    Ok(StatusCode::NO_CONTENT)
}
