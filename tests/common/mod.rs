// tests/common/mod.rs

#![allow(dead_code)]

use std::{collections::HashMap, sync::Arc, time::Duration};

use foodgram::{
    config::Config, routes, seed::seed_admin_user, state::AppState,
    utils::image::LocalImageStore,
};
use serde_json::{Value, json};
use sqlx::{
    PgPool,
    postgres::{PgConnectOptions, PgPoolOptions},
};
use tempfile::TempDir;

pub const PIXEL_PNG: &str = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

pub fn test_config(extra: &[(&str, &str)]) -> Config {
    let mut vars: HashMap<String, String> = HashMap::from([
        ("SECRET_KEY".to_string(), "test_secret_for_integration_tests".to_string()),
        ("JWT_EXPIRATION".to_string(), "600".to_string()),
        ("RUST_LOG".to_string(), "error".to_string()),
        ("ALLOWED_HOSTS".to_string(), "localhost,127.0.0.1".to_string()),
    ]);
    for (key, value) in extra {
        vars.insert(key.to_string(), value.to_string());
    }
    Config::from_lookup(|key| vars.get(key).cloned()).expect("valid test configuration")
}

/// State whose pool never connects; good for requests rejected before any query.
pub fn offline_state(media: &TempDir) -> AppState {
    let pool = PgPoolOptions::new()
        .acquire_timeout(Duration::from_secs(1))
        .connect_lazy_with(PgConnectOptions::new().host("127.0.0.1").port(1));

    AppState {
        pool,
        config: test_config(&[]),
        images: Arc::new(LocalImageStore::new(media.path())),
    }
}

pub struct TestApp {
    pub address: String,
    pub pool: PgPool,
    pub client: reqwest::Client,
    _media: TempDir,
}

/// Spawns the app on a random port against DATABASE_URL.
pub async fn spawn_app() -> TestApp {
    // Note: For Postgres, you must have a running database.
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .expect("Failed to connect to Postgres for testing. Make sure DATABASE_URL is set.");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to migrate database");

    let media = TempDir::new().expect("temp media dir");
    let state = AppState {
        pool: pool.clone(),
        config: test_config(&[("DATABASE_URL", database_url.as_str())]),
        images: Arc::new(LocalImageStore::new(media.path())),
    };

    let app = routes::create_router(state);

    // Bind to port 0 to get a random available port
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestApp {
        address: format!("http://127.0.0.1:{}", port),
        pool,
        client: reqwest::Client::new(),
        _media: media,
    }
}

/// A registered and logged-in user.
pub struct TestUser {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub password: String,
    pub token: String,
}

impl TestUser {
    pub fn auth(&self) -> String {
        format!("Token {}", self.token)
    }
}

pub fn unique(prefix: &str) -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("{}_{}", prefix, &id[..12])
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    pub async fn register_and_login(&self) -> TestUser {
        let username = unique("cook");
        let email = format!("{}@example.com", username);
        let password = "s3cret-pass".to_string();

        let response = self
            .client
            .post(self.url("/api/users/"))
            .json(&json!({
                "email": email,
                "username": username,
                "first_name": "Test",
                "last_name": "Cook",
                "password": password,
            }))
            .send()
            .await
            .expect("Failed to execute request");
        assert_eq!(response.status().as_u16(), 201);
        let body: Value = response.json().await.unwrap();
        let id = body["id"].as_i64().unwrap();
        let token = self.login(&email, &password).await;

        TestUser {
            id,
            username,
            email,
            password,
            token,
        }
    }

    pub async fn login(&self, email: &str, password: &str) -> String {
        let response = self
            .client
            .post(self.url("/api/auth/token/login/"))
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .expect("Failed to execute request");
        assert_eq!(response.status().as_u16(), 200);
        let body: Value = response.json().await.unwrap();
        body["auth_token"].as_str().unwrap().to_string()
    }

    /// Seeds a fresh admin account the way start-up does, then logs it in.
    pub async fn seed_admin_and_login(&self) -> TestUser {
        let username = unique("admin");
        let email = format!("{}@example.com", username);
        let password = "adm1n-pass".to_string();
        let config = test_config(&[
            ("ADMIN_EMAIL", email.as_str()),
            ("ADMIN_USERNAME", username.as_str()),
            ("ADMIN_PASSWORD", password.as_str()),
        ]);
        assert!(seed_admin_user(&self.pool, &config).await.unwrap());

        let id = sqlx::query_scalar::<_, i64>("SELECT id FROM users WHERE username = $1")
            .bind(&username)
            .fetch_one(&self.pool)
            .await
            .unwrap();
        let token = self.login(&email, &password).await;

        TestUser {
            id,
            username,
            email,
            password,
            token,
        }
    }

    /// Inserts a tag directly; returns its id.
    pub async fn create_tag(&self, color: &str) -> (i64, String) {
        let slug = unique("tag");
        let id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO tags (name, slug, color) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(&slug)
        .bind(&slug)
        .bind(color)
        .fetch_one(&self.pool)
        .await
        .unwrap();
        (id, slug)
    }

    /// Inserts an ingredient directly; returns its id.
    pub async fn create_ingredient(&self, name: &str, unit: &str) -> i64 {
        sqlx::query_scalar::<_, i64>(
            "INSERT INTO ingredients (name, measurement_unit) VALUES ($1, $2) RETURNING id",
        )
        .bind(name)
        .bind(unit)
        .fetch_one(&self.pool)
        .await
        .unwrap()
    }

    pub async fn create_recipe(&self, user: &TestUser, body: &Value) -> reqwest::Response {
        self.client
            .post(self.url("/api/recipes/"))
            .header("Authorization", user.auth())
            .json(body)
            .send()
            .await
            .expect("Failed to execute request")
    }
}
