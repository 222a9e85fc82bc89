// src/routes.rs

use axum::{
    Router,
    body::Body,
    extract::{DefaultBodyLimit, State},
    http::{HeaderValue, Method, Request, header, request::Parts},
    middleware::{self, Next},
    response::Response,
    routing::{delete, get, post},
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use url::Url;

use crate::{
    config::Config,
    error::AppError,
    handlers::{admin, auth, ingredients, interaction, recipes, tags, users},
    state::AppState,
    utils::jwt::{admin_middleware, auth_middleware},
};

/// Recipe payloads carry base64 images, so the default 2 MB body limit is too small.
const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Rejects requests whose `Host` is not listed in `ALLOWED_HOSTS`.
async fn host_middleware(
    State(config): State<Config>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let host = req
        .headers()
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .or_else(|| req.uri().host());

    if let Some(host) = host {
        if !config.is_host_allowed(host) {
            tracing::warn!("Rejected request for host '{}'", host);
            return Err(AppError::BadRequest("Invalid host header".to_string()));
        }
    }

    Ok(next.run(req).await)
}

/// CORS mirrors `ALLOWED_HOSTS`: an origin is allowed when its host is.
fn cors_layer(config: &Config) -> CorsLayer {
    let config = config.clone();
    let allow_origin = AllowOrigin::predicate(move |origin: &HeaderValue, _parts: &Parts| {
        origin
            .to_str()
            .ok()
            .and_then(|o| Url::parse(o).ok())
            .and_then(|url| url.host_str().map(|host| config.is_host_allowed(host)))
            .unwrap_or(false)
    });

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}

/// Assembles the main application router.
///
/// * Public catalogue, recipe and user routes; handlers decide which need a caller.
/// * Admin catalogue management behind `admin_middleware`.
/// * Uploaded media served from `MEDIA_ROOT` under `/media`.
/// * Global middleware: host check, then authentication, then tracing and CORS.
pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config);

    let auth_routes = Router::new()
        .route("/api/auth/token/login/", post(auth::login))
        .route("/api/auth/token/logout/", post(auth::logout));

    let user_routes = Router::new()
        .route("/api/users/", get(users::list_users).post(auth::register))
        .route("/api/users/me/", get(users::me))
        .route("/api/users/set_password/", post(users::set_password))
        .route("/api/users/subscriptions/", get(users::subscriptions))
        .route("/api/users/{id}/", get(users::get_user))
        .route(
            "/api/users/{id}/subscribe/",
            post(users::subscribe).delete(users::unsubscribe),
        );

    let catalogue_routes = Router::new()
        .route("/api/tags/", get(tags::list_tags))
        .route("/api/tags/{id}/", get(tags::get_tag))
        .route("/api/ingredients/", get(ingredients::list_ingredients))
        .route("/api/ingredients/{id}/", get(ingredients::get_ingredient));

    let recipe_routes = Router::new()
        .route(
            "/api/recipes/",
            get(recipes::list_recipes).post(recipes::create_recipe),
        )
        .route(
            "/api/recipes/download_shopping_cart/",
            get(interaction::download_shopping_cart),
        )
        .route(
            "/api/recipes/{id}/",
            get(recipes::get_recipe)
                .patch(recipes::update_recipe)
                .delete(recipes::delete_recipe),
        )
        .route(
            "/api/recipes/{id}/favorite/",
            post(interaction::add_favorite).delete(interaction::remove_favorite),
        )
        .route(
            "/api/recipes/{id}/shopping_cart/",
            post(interaction::add_to_cart).delete(interaction::remove_from_cart),
        );

    let admin_routes = Router::new()
        .route("/api/admin/tags/", post(admin::create_tag))
        .route("/api/admin/tags/{id}/", delete(admin::delete_tag))
        .route("/api/admin/ingredients/", post(admin::create_ingredient))
        .route(
            "/api/admin/ingredients/{id}/",
            delete(admin::delete_ingredient),
        )
        // Runs after the global auth middleware has resolved the caller
        .route_layer(middleware::from_fn(admin_middleware));

    Router::new()
        .merge(auth_routes)
        .merge(user_routes)
        .merge(catalogue_routes)
        .merge(recipe_routes)
        .merge(admin_routes)
        .nest_service("/media", ServeDir::new(&state.config.media_root))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        // Global Middleware (last added runs first)
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .layer(middleware::from_fn_with_state(state.clone(), host_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
