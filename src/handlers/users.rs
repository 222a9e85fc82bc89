// src/handlers/users.rs

use std::collections::HashMap;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::{FromRow, PgPool};
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        recipe::ShortRecipe,
        user::{
            RecipesLimitParams, SetPasswordRequest, SubscriptionResponse, USER_PROFILE_COLUMNS,
            UserListParams, UserProfile,
        },
    },
    utils::{
        hash::{hash_password, verify_password},
        jwt::{AuthUser, Viewer},
        pagination::Pagination,
    },
};

#[derive(Debug, FromRow)]
struct AuthorRecipeRow {
    author_id: i64,
    id: i64,
    name: String,
    image: String,
    cooking_time: i32,
}

/// Loads one user as seen by `viewer_id`.
pub(crate) async fn fetch_user_profile(
    pool: &PgPool,
    user_id: i64,
    viewer_id: Option<i64>,
) -> Result<Option<UserProfile>, AppError> {
    let sql = format!("SELECT {} FROM users u WHERE u.id = $2", USER_PROFILE_COLUMNS);
    let profile = sqlx::query_as::<_, UserProfile>(&sql)
        .bind(viewer_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await?;
    Ok(profile)
}

/// Attaches recipe previews and counts to each author.
///
/// `recipes_limit` caps the preview per author; a negative value is ignored.
async fn with_recipes(
    pool: &PgPool,
    authors: Vec<UserProfile>,
    recipes_limit: Option<i64>,
) -> Result<Vec<SubscriptionResponse>, AppError> {
    if authors.is_empty() {
        return Ok(Vec::new());
    }
    let ids: Vec<i64> = authors.iter().map(|a| a.id).collect();
    let limit = recipes_limit.filter(|l| *l >= 0);

    let counts: HashMap<i64, i64> = sqlx::query_as::<_, (i64, i64)>(
        "SELECT author_id, COUNT(*) FROM recipes WHERE author_id = ANY($1) GROUP BY author_id",
    )
    .bind(&ids)
    .fetch_all(pool)
    .await?
    .into_iter()
    .collect();

    let rows = sqlx::query_as::<_, AuthorRecipeRow>(
        r#"
        SELECT author_id, id, name, image, cooking_time
        FROM (
            SELECT r.*, ROW_NUMBER() OVER (PARTITION BY r.author_id ORDER BY r.id) AS rn
            FROM recipes r
            WHERE r.author_id = ANY($1)
        ) ranked
        WHERE $2::BIGINT IS NULL OR rn <= $2
        ORDER BY id
        "#,
    )
    .bind(&ids)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    let mut recipes: HashMap<i64, Vec<ShortRecipe>> = HashMap::new();
    for row in rows {
        recipes.entry(row.author_id).or_default().push(ShortRecipe {
            id: row.id,
            name: row.name,
            image: row.image,
            cooking_time: row.cooking_time,
        });
    }

    Ok(authors
        .into_iter()
        .map(|user| SubscriptionResponse {
            recipes: recipes.remove(&user.id).unwrap_or_default(),
            recipes_count: counts.get(&user.id).copied().unwrap_or(0),
            user,
        })
        .collect())
}

/// Lists users, optionally filtered by exact username.
pub async fn list_users(
    State(pool): State<PgPool>,
    viewer: Viewer,
    pagination: Pagination,
    Query(params): Query<UserListParams>,
) -> Result<impl IntoResponse, AppError> {
    let search = params.search.filter(|s| !s.is_empty());

    let count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM users u WHERE ($1::TEXT IS NULL OR LOWER(u.username) = LOWER($1))",
    )
    .bind(&search)
    .fetch_one(&pool)
    .await?;
    pagination.ensure_in_range(count)?;

    let sql = format!(
        r#"
        SELECT {}
        FROM users u
        WHERE ($2::TEXT IS NULL OR LOWER(u.username) = LOWER($2))
        ORDER BY u.id
        LIMIT $3 OFFSET $4
        "#,
        USER_PROFILE_COLUMNS
    );
    let users = sqlx::query_as::<_, UserProfile>(&sql)
        .bind(viewer.user_id())
        .bind(&search)
        .bind(pagination.limit)
        .bind(pagination.offset())
        .fetch_all(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to list users: {:?}", e);
            AppError::from(e)
        })?;

    Ok(Json(pagination.into_page(count, users)))
}

pub async fn get_user(
    State(pool): State<PgPool>,
    viewer: Viewer,
    Path(user_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let profile = fetch_user_profile(&pool, user_id, viewer.user_id())
        .await?
        .ok_or_else(|| AppError::NotFound("No User matches the given query.".to_string()))?;

    Ok(Json(profile))
}

/// Current user's own profile.
pub async fn me(
    State(pool): State<PgPool>,
    user: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    // Nobody can subscribe to themselves, so no viewer is needed here.
    let profile = fetch_user_profile(&pool, user.id, None)
        .await?
        .ok_or_else(AppError::invalid_token)?;

    Ok(Json(profile))
}

pub async fn set_password(
    State(pool): State<PgPool>,
    user: AuthUser,
    Json(payload): Json<SetPasswordRequest>,
) -> Result<StatusCode, AppError> {
    payload.validate()?;

    let current_hash =
        sqlx::query_scalar::<_, String>("SELECT password FROM users WHERE id = $1")
            .bind(user.id)
            .fetch_one(&pool)
            .await?;

    if !verify_password(&payload.current_password, &current_hash)? {
        return Err(AppError::BadRequest("Wrong password".to_string()));
    }

    let new_hash = hash_password(&payload.new_password)?;
    sqlx::query("UPDATE users SET password = $1 WHERE id = $2")
        .bind(&new_hash)
        .bind(user.id)
        .execute(&pool)
        .await?;

    tracing::info!("User {} changed password", user.id);

    Ok(StatusCode::NO_CONTENT)
}

/// Authors the caller follows, with their recipes.
pub async fn subscriptions(
    State(pool): State<PgPool>,
    user: AuthUser,
    pagination: Pagination,
    Query(params): Query<RecipesLimitParams>,
) -> Result<impl IntoResponse, AppError> {
    let recipes_limit = params.limit()?;
    let count =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM subscriptions WHERE subscriber_id = $1")
            .bind(user.id)
            .fetch_one(&pool)
            .await?;
    pagination.ensure_in_range(count)?;

    let sql = format!(
        r#"
        SELECT {}
        FROM users u
        JOIN subscriptions follow ON follow.author_id = u.id
        WHERE follow.subscriber_id = $1
        ORDER BY u.username
        LIMIT $2 OFFSET $3
        "#,
        USER_PROFILE_COLUMNS
    );
    let authors = sqlx::query_as::<_, UserProfile>(&sql)
        .bind(user.id)
        .bind(pagination.limit)
        .bind(pagination.offset())
        .fetch_all(&pool)
        .await?;

    let results = with_recipes(&pool, authors, recipes_limit).await?;
    Ok(Json(pagination.into_page(count, results)))
}

async fn ensure_user_exists(pool: &PgPool, user_id: i64) -> Result<(), AppError> {
    let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM users WHERE id = $1)")
        .bind(user_id)
        .fetch_one(pool)
        .await?;
    if !exists {
        return Err(AppError::NotFound(format!("User {} does not exist.", user_id)));
    }
    Ok(())
}

pub async fn subscribe(
    State(pool): State<PgPool>,
    user: AuthUser,
    Path(author_id): Path<i64>,
    Query(params): Query<RecipesLimitParams>,
) -> Result<impl IntoResponse, AppError> {
    let recipes_limit = params.limit()?;
    ensure_user_exists(&pool, author_id).await?;

    if author_id == user.id {
        return Err(AppError::BadRequest(
            "You cannot subscribe to yourself.".to_string(),
        ));
    }

    let inserted = sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO subscriptions (subscriber_id, author_id)
        VALUES ($1, $2)
        ON CONFLICT (subscriber_id, author_id) DO NOTHING
        RETURNING id
        "#,
    )
    .bind(user.id)
    .bind(author_id)
    .fetch_optional(&pool)
    .await?;

    if inserted.is_none() {
        return Err(AppError::BadRequest(
            "You are already subscribed to this user.".to_string(),
        ));
    }

    tracing::info!("User {} subscribed to {}", user.id, author_id);

    let profile = fetch_user_profile(&pool, author_id, Some(user.id))
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} does not exist.", author_id)))?;
    let mut expanded = with_recipes(&pool, vec![profile], recipes_limit).await?;
    let body = expanded
        .pop()
        .ok_or_else(|| AppError::InternalServerError("subscription lookup came back empty".to_string()))?;

    Ok((StatusCode::CREATED, Json(body)))
}

pub async fn unsubscribe(
    State(pool): State<PgPool>,
    user: AuthUser,
    Path(author_id): Path<i64>,
) -> Result<StatusCode, AppError> {
    ensure_user_exists(&pool, author_id).await?;

    let result =
        sqlx::query("DELETE FROM subscriptions WHERE subscriber_id = $1 AND author_id = $2")
            .bind(user.id)
            .bind(author_id)
            .execute(&pool)
            .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::BadRequest(
            "You are not subscribed to this user.".to_string(),
        ));
    }

    tracing::info!("User {} unsubscribed from {}", user.id, author_id);

    Ok(StatusCode::NO_CONTENT)
}
