use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};
use sqlx::PgPool;

use crate::{error::AppError, models::tag::Tag};

/// Returns every tag; the list is small and not paginated.
pub async fn list_tags(State(pool): State<PgPool>) -> Result<impl IntoResponse, AppError> {
    let tags = sqlx::query_as::<_, Tag>("SELECT id, name, slug, color FROM tags ORDER BY id")
        .fetch_all(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to fetch tags: {:?}", e);
            AppError::from(e)
        })?;

    Ok(Json(tags))
}

pub async fn get_tag(
    State(pool): State<PgPool>,
    Path(tag_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let tag = sqlx::query_as::<_, Tag>("SELECT id, name, slug, color FROM tags WHERE id = $1")
        .bind(tag_id)
        .fetch_optional(&pool)
        .await?
        .ok_or_else(|| AppError::NotFound("No Tag matches the given query.".to_string()))?;

    Ok(Json(tag))
}
