// src/models/user.rs

use std::{borrow::Cow, sync::LazyLock};

use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::{Validate, ValidationError};

use super::recipe::{ShortRecipe, parse_int};
use crate::error::AppError;

static USERNAME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\w.@+-]+\z").expect("valid username regex"));

/// Selects the public user columns plus `is_subscribed` for the viewer bound as `$1`.
pub const USER_PROFILE_COLUMNS: &str = r#"
    u.id, u.email, u.username, u.first_name, u.last_name,
    EXISTS (
        SELECT 1 FROM subscriptions s
        WHERE s.subscriber_id = $1 AND s.author_id = u.id
    ) AS is_subscribed
"#;

/// Represents the 'users' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,

    /// Argon2 password hash.
    /// Skipped during serialization to prevent leaking sensitive data.
    #[serde(skip)]
    pub password: String,

    /// User role: 'user' or 'admin'.
    pub role: String,

    /// Bumped on logout; tokens carrying an older version are rejected.
    pub token_version: i32,

    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Public user representation as seen by the current viewer.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct UserProfile {
    pub id: i64,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub is_subscribed: bool,
}

/// Response for a freshly registered user (no subscription flag).
#[derive(Debug, Serialize, FromRow)]
pub struct CreatedUser {
    pub id: i64,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
}

/// A followed author together with a preview of their recipes.
#[derive(Debug, Serialize)]
pub struct SubscriptionResponse {
    #[serde(flatten)]
    pub user: UserProfile,
    pub recipes: Vec<ShortRecipe>,
    pub recipes_count: i64,
}

fn validate_username_not_me(username: &str) -> Result<(), ValidationError> {
    if username == "me" {
        return Err(ValidationError::new("reserved_username")
            .with_message(Cow::Borrowed("Username cannot be 'me'.")));
    }
    Ok(())
}

/// DTO for creating a new user (Registration).
#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(
        email(message = "Enter a valid email address."),
        length(max = 254, message = "Email must be at most 254 characters.")
    )]
    pub email: String,

    #[validate(
        length(min = 1, max = 150, message = "Username length must be between 1 and 150 characters."),
        regex(path = *USERNAME_REGEX, message = "Username may contain only letters, digits and @/./+/-/_ characters."),
        custom(function = validate_username_not_me)
    )]
    pub username: String,

    #[validate(length(min = 1, max = 150, message = "First name length must be between 1 and 150 characters."))]
    pub first_name: String,

    #[validate(length(min = 1, max = 150, message = "Last name length must be between 1 and 150 characters."))]
    pub last_name: String,

    #[validate(length(min = 1, max = 150, message = "Password length must be between 1 and 150 characters."))]
    pub password: String,
}

/// DTO for obtaining a token.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SetPasswordRequest {
    pub current_password: String,
    #[validate(length(min = 1, max = 150, message = "Password length must be between 1 and 150 characters."))]
    pub new_password: String,
}

/// Query parameters for the user list.
#[derive(Debug, Deserialize)]
pub struct UserListParams {
    /// Exact (case-insensitive) username match.
    pub search: Option<String>,
}

/// Query parameters for subscription endpoints.
#[derive(Debug, Deserialize)]
pub struct RecipesLimitParams {
    pub recipes_limit: Option<String>,
}

impl RecipesLimitParams {
    pub fn limit(&self) -> Result<Option<i64>, AppError> {
        parse_int("recipes_limit", self.recipes_limit.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> CreateUserRequest {
        CreateUserRequest {
            email: "cook@example.com".to_string(),
            username: "cook.42".to_string(),
            first_name: "Ada".to_string(),
            last_name: "Cook".to_string(),
            password: "pass-word".to_string(),
        }
    }

    #[test]
    fn valid_registration() {
        assert!(request().validate().is_ok());
    }

    #[test]
    fn recipes_limit_parsing() {
        let params = |raw: Option<&str>| RecipesLimitParams {
            recipes_limit: raw.map(str::to_string),
        };
        assert_eq!(params(None).limit().unwrap(), None);
        assert_eq!(params(Some("")).limit().unwrap(), None);
        assert_eq!(params(Some("3")).limit().unwrap(), Some(3));
        assert!(matches!(
            params(Some("three")).limit(),
            Err(AppError::Validation(map)) if map.contains_key("recipes_limit")
        ));
    }

    #[test]
    fn username_me_is_reserved() {
        let mut req = request();
        req.username = "me".to_string();
        let errors = req.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("username"));
    }

    #[test]
    fn username_charset() {
        let mut req = request();
        req.username = "bad name!".to_string();
        assert!(req.validate().is_err());

        req.username = "good+name@host".to_string();
        assert!(req.validate().is_ok());
    }

    #[test]
    fn email_and_required_fields() {
        let mut req = request();
        req.email = "not-an-email".to_string();
        req.first_name = String::new();
        let errors = req.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("email"));
        assert!(fields.contains_key("first_name"));
    }

    #[test]
    fn subscription_response_flattens_user() {
        let response = SubscriptionResponse {
            user: UserProfile {
                id: 1,
                email: "a@b.c".to_string(),
                username: "a".to_string(),
                first_name: "A".to_string(),
                last_name: "B".to_string(),
                is_subscribed: true,
            },
            recipes: vec![],
            recipes_count: 0,
        };
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["username"], "a");
        assert_eq!(value["is_subscribed"], true);
        assert_eq!(value["recipes_count"], 0);
    }
}
