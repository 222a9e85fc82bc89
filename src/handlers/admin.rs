// src/handlers/admin.rs

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::PgPool;
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        ingredient::{Ingredient, NewIngredient},
        tag::{CreateTagRequest, Tag},
    },
    utils::color,
};

const TAG_UNIQUE_CONSTRAINTS: &[(&str, &str, &str)] =
    &[("tags_slug_key", "slug", "A tag with that slug already exists.")];

const INGREDIENT_UNIQUE_CONSTRAINTS: &[(&str, &str, &str)] = &[(
    "unique_ingredient",
    "name",
    "This ingredient with that measurement unit already exists.",
)];

/// Creates a tag.
/// Admin only.
pub async fn create_tag(
    State(pool): State<PgPool>,
    Json(payload): Json<CreateTagRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let hex = color::normalize(&payload.color)
        .ok_or_else(|| AppError::field("color", "Invalid colour format."))?;

    let tag = sqlx::query_as::<_, Tag>(
        r#"
        INSERT INTO tags (name, slug, color)
        VALUES ($1, $2, $3)
        RETURNING id, name, slug, color
        "#,
    )
    .bind(payload.name.trim())
    .bind(&payload.slug)
    .bind(&hex)
    .fetch_one(&pool)
    .await
    .map_err(|e| AppError::from_db(e, TAG_UNIQUE_CONSTRAINTS))?;

    tracing::info!("Created tag '{}' (id {})", tag.slug, tag.id);

    Ok((StatusCode::CREATED, Json(tag)))
}

/// Deletes a tag. Recipes lose the tag but are kept.
/// Admin only.
pub async fn delete_tag(
    State(pool): State<PgPool>,
    Path(tag_id): Path<i64>,
) -> Result<StatusCode, AppError> {
    let result = sqlx::query("DELETE FROM tags WHERE id = $1")
        .bind(tag_id)
        .execute(&pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("No Tag matches the given query.".to_string()));
    }

    tracing::info!("Deleted tag {}", tag_id);

    Ok(StatusCode::NO_CONTENT)
}

/// Adds an ingredient to the catalogue.
/// Admin only.
pub async fn create_ingredient(
    State(pool): State<PgPool>,
    Json(payload): Json<NewIngredient>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let ingredient = sqlx::query_as::<_, Ingredient>(
        r#"
        INSERT INTO ingredients (name, measurement_unit)
        VALUES ($1, $2)
        RETURNING id, name, measurement_unit
        "#,
    )
    .bind(payload.name.trim())
    .bind(payload.measurement_unit.trim())
    .fetch_one(&pool)
    .await
    .map_err(|e| AppError::from_db(e, INGREDIENT_UNIQUE_CONSTRAINTS))?;

    tracing::info!("Created ingredient '{}' (id {})", ingredient.name, ingredient.id);

    Ok((StatusCode::CREATED, Json(ingredient)))
}

/// Removes an ingredient; recipe lines that use it are removed with it.
/// Admin only.
pub async fn delete_ingredient(
    State(pool): State<PgPool>,
    Path(ingredient_id): Path<i64>,
) -> Result<StatusCode, AppError> {
    let result = sqlx::query("DELETE FROM ingredients WHERE id = $1")
        .bind(ingredient_id)
        .execute(&pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(
            "No Ingredient matches the given query.".to_string(),
        ));
    }

    tracing::info!("Deleted ingredient {}", ingredient_id);

    Ok(StatusCode::NO_CONTENT)
}
