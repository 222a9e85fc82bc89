// src/handlers/recipes.rs

use std::collections::HashMap;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::Query;
use sqlx::{PgPool, Postgres, QueryBuilder};
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        recipe::{
            RecipeFilterParams, RecipeIngredientResponse, RecipeIngredientRow, RecipeResponse,
            RecipeRow, RecipeTagRow, RecipeWriteRequest, parse_flag, parse_int,
        },
        tag::Tag,
        user::{USER_PROFILE_COLUMNS, UserProfile},
    },
    state::AppState,
    utils::{
        image::{DecodedImage, decode_data_url},
        jwt::{AuthUser, Viewer},
        pagination::Pagination,
    },
};

const RECIPE_UNIQUE_CONSTRAINTS: &[(&str, &str, &str)] = &[(
    "recipes_name_key",
    "name",
    "A recipe with that name already exists.",
)];

/// Recipe columns plus the viewer's marks. Expects `recipes r` joined with `user_recipes ur`.
const RECIPE_COLUMNS: &str = r#"
    r.id, r.author_id, r.name, r.image, r.text, r.cooking_time,
    COALESCE(ur.is_favorited, FALSE) AS is_favorited,
    COALESCE(ur.is_in_shopping_cart, FALSE) AS is_in_shopping_cart
"#;

fn not_found() -> AppError {
    AppError::NotFound("No Recipe matches the given query.".to_string())
}

fn forbidden() -> AppError {
    AppError::Forbidden("You do not have permission to perform this action.".to_string())
}

/// Filters resolved against the current viewer.
#[derive(Debug, Default)]
struct RecipeFilters {
    author: Option<i64>,
    tags: Vec<String>,
    is_favorited: Option<bool>,
    is_in_shopping_cart: Option<bool>,
}

impl RecipeFilters {
    /// Flag filters only apply to authenticated viewers.
    fn resolve(params: RecipeFilterParams, viewer: &Viewer) -> Result<Self, AppError> {
        let author = parse_int("author", params.author.as_deref())?;
        let is_favorited = parse_flag("is_favorited", params.is_favorited.as_deref())?;
        let is_in_shopping_cart =
            parse_flag("is_in_shopping_cart", params.is_in_shopping_cart.as_deref())?;
        let authenticated = viewer.0.is_some();

        Ok(Self {
            author,
            tags: params.tags.into_iter().filter(|t| !t.is_empty()).collect(),
            is_favorited: is_favorited.filter(|_| authenticated),
            is_in_shopping_cart: is_in_shopping_cart.filter(|_| authenticated),
        })
    }

    fn push_where(&self, builder: &mut QueryBuilder<'_, Postgres>) {
        builder.push(" WHERE TRUE");
        if let Some(author) = self.author {
            builder.push(" AND r.author_id = ").push_bind(author);
        }
        if !self.tags.is_empty() {
            builder
                .push(
                    " AND EXISTS (SELECT 1 FROM recipe_tags rt JOIN tags t ON t.id = rt.tag_id \
                     WHERE rt.recipe_id = r.id AND t.slug = ANY(",
                )
                .push_bind(self.tags.clone())
                .push("))");
        }
        if let Some(flag) = self.is_favorited {
            builder
                .push(" AND COALESCE(ur.is_favorited, FALSE) = ")
                .push_bind(flag);
        }
        if let Some(flag) = self.is_in_shopping_cart {
            builder
                .push(" AND COALESCE(ur.is_in_shopping_cart, FALSE) = ")
                .push_bind(flag);
        }
    }
}

fn push_recipe_source(builder: &mut QueryBuilder<'_, Postgres>, viewer_id: Option<i64>) {
    builder
        .push(
            " FROM recipes r LEFT JOIN user_recipes ur \
             ON ur.recipe_id = r.id AND ur.user_id = ",
        )
        .push_bind(viewer_id);
}

/// Assembles full representations for the given rows, preserving their order.
async fn load_recipes(
    pool: &PgPool,
    rows: Vec<RecipeRow>,
    viewer_id: Option<i64>,
) -> Result<Vec<RecipeResponse>, AppError> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }
    let recipe_ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
    let mut author_ids: Vec<i64> = rows.iter().map(|r| r.author_id).collect();
    author_ids.sort_unstable();
    author_ids.dedup();

    let tag_rows = sqlx::query_as::<_, RecipeTagRow>(
        r#"
        SELECT rt.recipe_id, t.id, t.name, t.slug, t.color
        FROM recipe_tags rt
        JOIN tags t ON t.id = rt.tag_id
        WHERE rt.recipe_id = ANY($1)
        ORDER BY t.id
        "#,
    )
    .bind(&recipe_ids)
    .fetch_all(pool)
    .await?;

    let ingredient_rows = sqlx::query_as::<_, RecipeIngredientRow>(
        r#"
        SELECT ri.recipe_id, i.id, i.name, i.measurement_unit, ri.amount
        FROM recipe_ingredients ri
        JOIN ingredients i ON i.id = ri.ingredient_id
        WHERE ri.recipe_id = ANY($1)
        ORDER BY i.name, i.id
        "#,
    )
    .bind(&recipe_ids)
    .fetch_all(pool)
    .await?;

    let authors_sql = format!("SELECT {} FROM users u WHERE u.id = ANY($2)", USER_PROFILE_COLUMNS);
    let authors: HashMap<i64, UserProfile> = sqlx::query_as::<_, UserProfile>(&authors_sql)
        .bind(viewer_id)
        .bind(&author_ids)
        .fetch_all(pool)
        .await?
        .into_iter()
        .map(|a| (a.id, a))
        .collect();

    let mut tags: HashMap<i64, Vec<Tag>> = HashMap::new();
    for row in tag_rows {
        tags.entry(row.recipe_id).or_default().push(Tag {
            id: row.id,
            name: row.name,
            slug: row.slug,
            color: row.color,
        });
    }

    let mut ingredients: HashMap<i64, Vec<RecipeIngredientResponse>> = HashMap::new();
    for row in ingredient_rows {
        ingredients
            .entry(row.recipe_id)
            .or_default()
            .push(RecipeIngredientResponse {
                id: row.id,
                name: row.name,
                measurement_unit: row.measurement_unit,
                amount: row.amount,
            });
    }

    rows.into_iter()
        .map(|row| {
            let author = authors.get(&row.author_id).cloned().ok_or_else(|| {
                AppError::InternalServerError(format!("author {} missing", row.author_id))
            })?;
            Ok(RecipeResponse {
                id: row.id,
                tags: tags.remove(&row.id).unwrap_or_default(),
                author,
                ingredients: ingredients.remove(&row.id).unwrap_or_default(),
                is_favorited: row.is_favorited,
                is_in_shopping_cart: row.is_in_shopping_cart,
                name: row.name,
                image: row.image,
                text: row.text,
                cooking_time: row.cooking_time,
            })
        })
        .collect()
}

async fn fetch_recipe(
    pool: &PgPool,
    recipe_id: i64,
    viewer_id: Option<i64>,
) -> Result<Option<RecipeResponse>, AppError> {
    let mut builder = QueryBuilder::<Postgres>::new("SELECT ");
    builder.push(RECIPE_COLUMNS);
    push_recipe_source(&mut builder, viewer_id);
    builder.push(" WHERE r.id = ").push_bind(recipe_id);

    let row = builder
        .build_query_as::<RecipeRow>()
        .fetch_optional(pool)
        .await?;

    match row {
        Some(row) => Ok(load_recipes(pool, vec![row], viewer_id).await?.pop()),
        None => Ok(None),
    }
}

/// Returns (author_id, image) of a recipe, or 404.
async fn fetch_ownership(pool: &PgPool, recipe_id: i64) -> Result<(i64, String), AppError> {
    sqlx::query_as::<_, (i64, String)>("SELECT author_id, image FROM recipes WHERE id = $1")
        .bind(recipe_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(not_found)
}

/// Lists recipes newest-id-last with author, tag and flag filters.
pub async fn list_recipes(
    State(pool): State<PgPool>,
    viewer: Viewer,
    pagination: Pagination,
    Query(params): Query<RecipeFilterParams>,
) -> Result<impl IntoResponse, AppError> {
    let filters = RecipeFilters::resolve(params, &viewer)?;
    let viewer_id = viewer.user_id();

    let mut count_query = QueryBuilder::<Postgres>::new("SELECT COUNT(*)");
    push_recipe_source(&mut count_query, viewer_id);
    filters.push_where(&mut count_query);
    let count = count_query
        .build_query_scalar::<i64>()
        .fetch_one(&pool)
        .await?;
    pagination.ensure_in_range(count)?;

    let mut page_query = QueryBuilder::<Postgres>::new("SELECT ");
    page_query.push(RECIPE_COLUMNS);
    push_recipe_source(&mut page_query, viewer_id);
    filters.push_where(&mut page_query);
    page_query
        .push(" ORDER BY r.id LIMIT ")
        .push_bind(pagination.limit)
        .push(" OFFSET ")
        .push_bind(pagination.offset());

    let rows = page_query
        .build_query_as::<RecipeRow>()
        .fetch_all(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to list recipes: {:?}", e);
            AppError::from(e)
        })?;

    let recipes = load_recipes(&pool, rows, viewer_id).await?;
    Ok(Json(pagination.into_page(count, recipes)))
}

pub async fn get_recipe(
    State(pool): State<PgPool>,
    viewer: Viewer,
    Path(recipe_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let recipe = fetch_recipe(&pool, recipe_id, viewer.user_id())
        .await?
        .ok_or_else(not_found)?;

    Ok(Json(recipe))
}

/// Rejects tag and ingredient ids that do not exist.
async fn ensure_references(pool: &PgPool, payload: &RecipeWriteRequest) -> Result<(), AppError> {
    let found_tags = sqlx::query_scalar::<_, i64>("SELECT id FROM tags WHERE id = ANY($1)")
        .bind(&payload.tags)
        .fetch_all(pool)
        .await?;
    if let Some(missing) = payload.tags.iter().find(|id| !found_tags.contains(id)) {
        return Err(AppError::field(
            "tags",
            format!("Invalid pk \"{}\" - object does not exist.", missing),
        ));
    }

    let ingredient_ids: Vec<i64> = payload.ingredients.iter().map(|i| i.id).collect();
    let found_ingredients =
        sqlx::query_scalar::<_, i64>("SELECT id FROM ingredients WHERE id = ANY($1)")
            .bind(&ingredient_ids)
            .fetch_all(pool)
            .await?;
    if let Some(missing) = ingredient_ids
        .iter()
        .find(|id| !found_ingredients.contains(id))
    {
        return Err(AppError::field(
            "ingredients",
            format!("Ingredient {} does not exist.", missing),
        ));
    }

    Ok(())
}

/// Writes the recipe row and replaces its tags and ingredients in one transaction.
///
/// `recipe_id` is `None` for a new recipe. Returns the recipe id.
async fn write_recipe(
    pool: &PgPool,
    recipe_id: Option<i64>,
    author_id: i64,
    payload: &RecipeWriteRequest,
    image: &str,
) -> Result<i64, AppError> {
    let mut tx = pool.begin().await?;

    let recipe_id = match recipe_id {
        None => sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO recipes (author_id, name, image, text, cooking_time)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(author_id)
        .bind(&payload.name)
        .bind(image)
        .bind(&payload.text)
        .bind(payload.cooking_time)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::from_db(e, RECIPE_UNIQUE_CONSTRAINTS))?,
        Some(id) => {
            sqlx::query(
                "UPDATE recipes SET name = $1, image = $2, text = $3, cooking_time = $4 WHERE id = $5",
            )
            .bind(&payload.name)
            .bind(image)
            .bind(&payload.text)
            .bind(payload.cooking_time)
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::from_db(e, RECIPE_UNIQUE_CONSTRAINTS))?;

            sqlx::query("DELETE FROM recipe_tags WHERE recipe_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            sqlx::query("DELETE FROM recipe_ingredients WHERE recipe_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            id
        }
    };

    sqlx::query("INSERT INTO recipe_tags (recipe_id, tag_id) SELECT $1, UNNEST($2::BIGINT[])")
        .bind(recipe_id)
        .bind(&payload.tags)
        .execute(&mut *tx)
        .await?;

    let ingredient_ids: Vec<i64> = payload.ingredients.iter().map(|i| i.id).collect();
    let amounts: Vec<i32> = payload.ingredients.iter().map(|i| i.amount).collect();
    sqlx::query(
        r#"
        INSERT INTO recipe_ingredients (recipe_id, ingredient_id, amount)
        SELECT $1, item.ingredient_id, item.amount
        FROM UNNEST($2::BIGINT[], $3::INT[]) AS item(ingredient_id, amount)
        "#,
    )
    .bind(recipe_id)
    .bind(&ingredient_ids)
    .bind(&amounts)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(recipe_id)
}

/// Saves the image, then writes the recipe; the saved file is removed if the write fails.
async fn save_and_write(
    state: &AppState,
    recipe_id: Option<i64>,
    author_id: i64,
    payload: &RecipeWriteRequest,
    image: &DecodedImage,
) -> Result<i64, AppError> {
    let path = state.images.save(image).await?;

    match write_recipe(&state.pool, recipe_id, author_id, payload, &path).await {
        Ok(id) => Ok(id),
        Err(e) => {
            if let Err(cleanup) = state.images.remove(&path).await {
                tracing::warn!("Failed to remove orphaned image {}: {}", path, cleanup);
            }
            Err(e)
        }
    }
}

/// Creates a recipe authored by the caller.
pub async fn create_recipe(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<RecipeWriteRequest>,
) -> Result<impl IntoResponse, AppError> {
    let payload = payload.normalized();
    payload.validate()?;

    let image = match payload.image.as_deref() {
        Some(data) if !data.is_empty() => decode_data_url(data)?,
        _ => return Err(AppError::field("image", "This field is required.")),
    };
    ensure_references(&state.pool, &payload).await?;

    let recipe_id = save_and_write(&state, None, user.id, &payload, &image).await?;

    tracing::info!("User {} created recipe {}", user.id, recipe_id);

    let recipe = fetch_recipe(&state.pool, recipe_id, Some(user.id))
        .await?
        .ok_or_else(not_found)?;
    Ok((StatusCode::CREATED, Json(recipe)))
}

/// Replaces a recipe's fields, tags and ingredients. Author only.
pub async fn update_recipe(
    State(state): State<AppState>,
    user: AuthUser,
    Path(recipe_id): Path<i64>,
    Json(payload): Json<RecipeWriteRequest>,
) -> Result<impl IntoResponse, AppError> {
    let (author_id, old_image) = fetch_ownership(&state.pool, recipe_id).await?;
    if author_id != user.id {
        return Err(forbidden());
    }

    let payload = payload.normalized();
    payload.validate()?;
    let new_image = match payload.image.as_deref() {
        Some(data) if !data.is_empty() => Some(decode_data_url(data)?),
        _ => None,
    };
    ensure_references(&state.pool, &payload).await?;

    match new_image {
        Some(image) => {
            save_and_write(&state, Some(recipe_id), user.id, &payload, &image).await?;
            if let Err(e) = state.images.remove(&old_image).await {
                tracing::warn!("Failed to remove replaced image {}: {}", old_image, e);
            }
        }
        None => {
            write_recipe(&state.pool, Some(recipe_id), user.id, &payload, &old_image).await?;
        }
    }

    tracing::info!("User {} updated recipe {}", user.id, recipe_id);

    let recipe = fetch_recipe(&state.pool, recipe_id, Some(user.id))
        .await?
        .ok_or_else(not_found)?;
    Ok(Json(recipe))
}

pub async fn delete_recipe(
    State(state): State<AppState>,
    user: AuthUser,
    Path(recipe_id): Path<i64>,
) -> Result<StatusCode, AppError> {
    let (author_id, image) = fetch_ownership(&state.pool, recipe_id).await?;
    if author_id != user.id {
        return Err(forbidden());
    }

    sqlx::query("DELETE FROM recipes WHERE id = $1")
        .bind(recipe_id)
        .execute(&state.pool)
        .await?;

    if let Err(e) = state.images.remove(&image).await {
        tracing::warn!("Failed to remove image of deleted recipe {}: {}", recipe_id, e);
    }

    tracing::info!("User {} deleted recipe {}", user.id, recipe_id);

    Ok(StatusCode::NO_CONTENT)
}
