use axum::{
    Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use sqlx::PgPool;

use crate::{
    error::AppError,
    models::ingredient::{Ingredient, IngredientSearchParams},
};

/// Escapes `LIKE` wildcards so user input matches literally.
fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for ch in input.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

/// Lists ingredients whose name starts with `?name=` (case-insensitive).
pub async fn list_ingredients(
    State(pool): State<PgPool>,
    Query(params): Query<IngredientSearchParams>,
) -> Result<impl IntoResponse, AppError> {
    let prefix = params
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(escape_like);

    let ingredients = sqlx::query_as::<_, Ingredient>(
        r#"
        SELECT id, name, measurement_unit
        FROM ingredients
        WHERE $1::TEXT IS NULL OR LOWER(name) LIKE (LOWER($1) || '%')
        ORDER BY name, id
        "#,
    )
    .bind(&prefix)
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to search ingredients: {:?}", e);
        AppError::from(e)
    })?;

    Ok(Json(ingredients))
}

pub async fn get_ingredient(
    State(pool): State<PgPool>,
    Path(ingredient_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let ingredient = sqlx::query_as::<_, Ingredient>(
        "SELECT id, name, measurement_unit FROM ingredients WHERE id = $1",
    )
    .bind(ingredient_id)
    .fetch_optional(&pool)
    .await?
    .ok_or_else(|| AppError::NotFound("No Ingredient matches the given query.".to_string()))?;

    Ok(Json(ingredient))
}

#[cfg(test)]
mod tests {
    use super::escape_like;

    #[test]
    fn wildcards_are_escaped() {
        assert_eq!(escape_like("сах"), "сах");
        assert_eq!(escape_like("50%_x"), "50\\%\\_x");
        assert_eq!(escape_like("a\\b"), "a\\\\b");
    }
}
