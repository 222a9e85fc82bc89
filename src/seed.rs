// src/seed.rs

use sqlx::PgPool;

use crate::{config::Config, error::AppError, utils::hash::hash_password};

/// Creates the admin account from the `ADMIN_*` settings.
///
/// Does nothing when any of the settings is missing or when a user with the
/// same e-mail (any case) or username already exists. Returns whether an
/// account was created.
pub async fn seed_admin_user(pool: &PgPool, config: &Config) -> Result<bool, AppError> {
    let (Some(email), Some(username), Some(password)) = (
        &config.admin_email,
        &config.admin_username,
        &config.admin_password,
    ) else {
        return Ok(false);
    };

    let user_exists = sqlx::query_scalar::<_, i64>(
        "SELECT id FROM users WHERE LOWER(email) = LOWER($1) OR username = $2",
    )
    .bind(email)
    .bind(username)
    .fetch_optional(pool)
    .await?;

    if user_exists.is_some() {
        tracing::debug!("Admin user '{}' already present, skipping seed", username);
        return Ok(false);
    }

    tracing::info!("Seeding admin user: {}", username);
    let hashed_password = hash_password(password)?;

    sqlx::query(
        r#"
        INSERT INTO users (email, username, first_name, last_name, password, role)
        VALUES ($1, $2, 'Admin', 'Admin', $3, 'admin')
        "#,
    )
    .bind(email)
    .bind(username)
    .bind(&hashed_password)
    .execute(pool)
    .await?;

    tracing::info!("Admin user created successfully.");
    Ok(true)
}
