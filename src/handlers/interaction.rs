// src/handlers/interaction.rs

use axum::{
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use sqlx::PgPool;

use crate::{
    error::AppError,
    models::recipe::ShortRecipe,
    utils::{
        jwt::AuthUser,
        shopping::{ExportFormat, ShoppingItem},
    },
};

/// A per-user mark on a recipe, stored as a flag on `user_recipes`.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Mark {
    Favorite,
    ShoppingCart,
}

impl Mark {
    fn column(self) -> &'static str {
        match self {
            Mark::Favorite => "is_favorited",
            Mark::ShoppingCart => "is_in_shopping_cart",
        }
    }

    fn list_name(self) -> &'static str {
        match self {
            Mark::Favorite => "favourites",
            Mark::ShoppingCart => "shopping cart",
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct DownloadParams {
    pub format: Option<String>,
}

async fn find_short_recipe(pool: &PgPool, recipe_id: i64) -> Result<Option<ShortRecipe>, AppError> {
    let recipe = sqlx::query_as::<_, ShortRecipe>(
        "SELECT id, name, image, cooking_time FROM recipes WHERE id = $1",
    )
    .bind(recipe_id)
    .fetch_optional(pool)
    .await?;
    Ok(recipe)
}

/// Sets the mark in a single upsert; a row that already carries it is left untouched.
async fn add_mark(
    pool: &PgPool,
    user: &AuthUser,
    recipe_id: i64,
    mark: Mark,
) -> Result<(StatusCode, Json<ShortRecipe>), AppError> {
    let recipe = find_short_recipe(pool, recipe_id)
        .await?
        .ok_or_else(|| AppError::BadRequest(format!("Recipe {} does not exist.", recipe_id)))?;

    let column = mark.column();
    let sql = format!(
        r#"
        INSERT INTO user_recipes (user_id, recipe_id, {column})
        VALUES ($1, $2, TRUE)
        ON CONFLICT (user_id, recipe_id)
        DO UPDATE SET {column} = TRUE
        WHERE user_recipes.{column} = FALSE
        RETURNING id
        "#
    );
    let updated = sqlx::query_scalar::<_, i64>(&sql)
        .bind(user.id)
        .bind(recipe_id)
        .fetch_optional(pool)
        .await?;

    if updated.is_none() {
        return Err(AppError::BadRequest(format!(
            "Recipe is already in your {}.",
            mark.list_name()
        )));
    }

    tracing::debug!("User {} added recipe {} to {}", user.id, recipe_id, mark.list_name());

    Ok((StatusCode::CREATED, Json(recipe)))
}

/// Clears the mark and drops rows that no longer carry any.
async fn remove_mark(
    pool: &PgPool,
    user: &AuthUser,
    recipe_id: i64,
    mark: Mark,
) -> Result<StatusCode, AppError> {
    if find_short_recipe(pool, recipe_id).await?.is_none() {
        return Err(AppError::NotFound(format!(
            "Recipe {} does not exist.",
            recipe_id
        )));
    }

    let column = mark.column();
    let mut tx = pool.begin().await?;

    let sql = format!(
        "UPDATE user_recipes SET {column} = FALSE \
         WHERE user_id = $1 AND recipe_id = $2 AND {column} = TRUE"
    );
    let result = sqlx::query(&sql)
        .bind(user.id)
        .bind(recipe_id)
        .execute(&mut *tx)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::BadRequest(format!(
            "Recipe is not in your {}.",
            mark.list_name()
        )));
    }

    sqlx::query(
        r#"
        DELETE FROM user_recipes
        WHERE user_id = $1 AND recipe_id = $2
          AND NOT is_favorited AND NOT is_in_shopping_cart
        "#,
    )
    .bind(user.id)
    .bind(recipe_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::debug!(
        "User {} removed recipe {} from {}",
        user.id,
        recipe_id,
        mark.list_name()
    );

    Ok(StatusCode::NO_CONTENT)
}

pub async fn add_favorite(
    State(pool): State<PgPool>,
    user: AuthUser,
    Path(recipe_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    add_mark(&pool, &user, recipe_id, Mark::Favorite).await
}

pub async fn remove_favorite(
    State(pool): State<PgPool>,
    user: AuthUser,
    Path(recipe_id): Path<i64>,
) -> Result<StatusCode, AppError> {
    remove_mark(&pool, &user, recipe_id, Mark::Favorite).await
}

pub async fn add_to_cart(
    State(pool): State<PgPool>,
    user: AuthUser,
    Path(recipe_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    add_mark(&pool, &user, recipe_id, Mark::ShoppingCart).await
}

pub async fn remove_from_cart(
    State(pool): State<PgPool>,
    user: AuthUser,
    Path(recipe_id): Path<i64>,
) -> Result<StatusCode, AppError> {
    remove_mark(&pool, &user, recipe_id, Mark::ShoppingCart).await
}

/// Sums the ingredients of every recipe in the caller's cart and returns them as a file.
pub async fn download_shopping_cart(
    State(pool): State<PgPool>,
    user: AuthUser,
    Query(params): Query<DownloadParams>,
) -> Result<impl IntoResponse, AppError> {
    let format = ExportFormat::from_param(params.format.as_deref())?;
    let items = sqlx::query_as::<_, ShoppingItem>(
        r#"
        SELECT i.name, i.measurement_unit, SUM(ri.amount)::BIGINT AS total
        FROM user_recipes ur
        JOIN recipe_ingredients ri ON ri.recipe_id = ur.recipe_id
        JOIN ingredients i ON i.id = ri.ingredient_id
        WHERE ur.user_id = $1 AND ur.is_in_shopping_cart
        GROUP BY i.name, i.measurement_unit
        ORDER BY i.name, i.measurement_unit
        "#,
    )
    .bind(user.id)
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to build shopping list: {:?}", e);
        AppError::from(e)
    })?;

    let body = format.render(&items)?;

    tracing::info!(
        "User {} downloaded a shopping list with {} items",
        user.id,
        items.len()
    );

    Ok((
        [
            (header::CONTENT_TYPE, format.content_type().to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", format.filename()),
            ),
        ],
        body,
    ))
}
