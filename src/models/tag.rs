use std::{borrow::Cow, sync::LazyLock};

use regex::Regex;
use serde::{Deserialize, Serialize, Serializer};
use sqlx::FromRow;
use validator::{Validate, ValidationError};

use crate::utils::color;

static SLUG_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[-a-zA-Z0-9_]+$").expect("valid slug regex"));

/// Represents the 'tags' table in the database.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Tag {
    pub id: i64,
    pub name: String,
    pub slug: String,
    /// Stored as `#rrggbb`, rendered with its CSS3 name when there is one.
    #[serde(serialize_with = "serialize_color")]
    pub color: String,
}

fn serialize_color<S: Serializer>(hex: &str, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&color::display(hex))
}

fn validate_color(value: &str) -> Result<(), ValidationError> {
    match color::normalize(value) {
        Some(_) => Ok(()),
        None => Err(ValidationError::new("color")
            .with_message(Cow::Borrowed("Invalid colour format."))),
    }
}

/// DTO for creating a tag (admin).
#[derive(Debug, Deserialize, Validate)]
pub struct CreateTagRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(
        length(min = 1, max = 50),
        regex(path = *SLUG_REGEX, message = "Slug may contain only letters, digits, hyphens and underscores.")
    )]
    pub slug: String,
    /// `#rrggbb` or a CSS3 colour name.
    #[validate(custom(function = validate_color))]
    pub color: String,
}
