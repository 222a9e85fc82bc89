use std::{borrow::Cow, collections::HashSet};

use serde::{Deserialize, Serialize, Serializer};
use sqlx::FromRow;
use validator::{Validate, ValidationError};

use super::{tag::Tag, user::UserProfile};
use crate::{
    error::AppError,
    utils::{html::clean_html, image::media_url},
};

pub const MIN_AMOUNT: i32 = 1;
pub const MAX_AMOUNT: i32 = 32000;

fn serialize_image<S: Serializer>(path: &str, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&media_url(path))
}

/// Represents a row of the 'recipes' table joined with the viewer's marks.
#[derive(Debug, Clone, FromRow)]
pub struct RecipeRow {
    pub id: i64,
    pub author_id: i64,
    pub name: String,
    pub image: String,
    pub text: String,
    pub cooking_time: i32,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
}

/// Ingredient line of a recipe, tagged with the recipe it belongs to.
#[derive(Debug, Clone, FromRow)]
pub struct RecipeIngredientRow {
    pub recipe_id: i64,
    pub id: i64,
    pub name: String,
    pub measurement_unit: String,
    pub amount: i32,
}

/// Tag of a recipe, tagged with the recipe it belongs to.
#[derive(Debug, Clone, FromRow)]
pub struct RecipeTagRow {
    pub recipe_id: i64,
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub color: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecipeIngredientResponse {
    pub id: i64,
    pub name: String,
    pub measurement_unit: String,
    pub amount: i32,
}

/// Full recipe representation.
#[derive(Debug, Serialize)]
pub struct RecipeResponse {
    pub id: i64,
    pub tags: Vec<Tag>,
    pub author: UserProfile,
    pub ingredients: Vec<RecipeIngredientResponse>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
    pub name: String,
    #[serde(serialize_with = "serialize_image")]
    pub image: String,
    pub text: String,
    pub cooking_time: i32,
}

/// Compact recipe card used by favourites, cart and subscriptions.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ShortRecipe {
    pub id: i64,
    pub name: String,
    #[serde(serialize_with = "serialize_image")]
    pub image: String,
    pub cooking_time: i32,
}

/// Ingredient reference inside a recipe payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngredientAmount {
    pub id: i64,
    pub amount: i32,
}

fn validate_tag_ids(tags: &[i64]) -> Result<(), ValidationError> {
    if tags.is_empty() {
        return Err(ValidationError::new("required")
            .with_message(Cow::Borrowed("Select at least one tag.")));
    }
    let unique: HashSet<_> = tags.iter().collect();
    if unique.len() != tags.len() {
        return Err(ValidationError::new("duplicate")
            .with_message(Cow::Borrowed("Tags must not repeat.")));
    }
    Ok(())
}

fn validate_ingredients(items: &[IngredientAmount]) -> Result<(), ValidationError> {
    if items.is_empty() {
        return Err(ValidationError::new("required")
            .with_message(Cow::Borrowed("Add at least one ingredient.")));
    }
    let unique: HashSet<_> = items.iter().map(|i| i.id).collect();
    if unique.len() != items.len() {
        return Err(ValidationError::new("duplicate")
            .with_message(Cow::Borrowed("Ingredients must not repeat.")));
    }
    if items
        .iter()
        .any(|i| !(MIN_AMOUNT..=MAX_AMOUNT).contains(&i.amount))
    {
        return Err(ValidationError::new("amount_range")
            .with_message(Cow::Borrowed("Ingredient amount must be between 1 and 32000.")));
    }
    Ok(())
}

/// DTO for creating or updating a recipe.
///
/// `image` is a base64 data URL; it is required on creation and
/// optional on update (the stored image is kept when absent).
#[derive(Debug, Deserialize, Validate)]
pub struct RecipeWriteRequest {
    #[validate(length(min = 1, max = 200, message = "Name length must be between 1 and 200 characters."))]
    pub name: String,

    #[validate(length(min = 1, message = "Description is required."))]
    pub text: String,

    #[validate(range(min = 1, max = 32000, message = "Cooking time must be between 1 and 32000 minutes."))]
    pub cooking_time: i32,

    pub image: Option<String>,

    #[validate(custom(function = validate_tag_ids))]
    pub tags: Vec<i64>,

    #[validate(custom(function = validate_ingredients))]
    pub ingredients: Vec<IngredientAmount>,
}

impl RecipeWriteRequest {
    /// Trims the name and sanitises the text, so validation sees what gets stored.
    pub fn normalized(mut self) -> Self {
        self.name = self.name.trim().to_string();
        self.text = clean_html(&self.text).trim().to_string();
        self
    }
}

/// Query parameters for the recipe list.
#[derive(Debug, Default, Deserialize)]
pub struct RecipeFilterParams {
    pub author: Option<String>,
    /// Tag slugs; a recipe matches if it has any of them.
    #[serde(default)]
    pub tags: Vec<String>,
    pub is_favorited: Option<String>,
    pub is_in_shopping_cart: Option<String>,
}

/// Parses an optional integer query parameter; blank means absent.
pub fn parse_int(field: &str, value: Option<&str>) -> Result<Option<i64>, AppError> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => raw
            .parse::<i64>()
            .map(Some)
            .map_err(|_| AppError::field(field, "A valid integer is required.")),
    }
}

/// Parses a `0`/`1` filter flag.
pub fn parse_flag(field: &str, value: Option<&str>) -> Result<Option<bool>, AppError> {
    match value {
        None | Some("") => Ok(None),
        Some("1") | Some("true") | Some("True") => Ok(Some(true)),
        Some("0") | Some("false") | Some("False") => Ok(Some(false)),
        Some(other) => Err(AppError::field(
            field,
            format!("Select a valid choice. {} is not one of the available choices.", other),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> RecipeWriteRequest {
        RecipeWriteRequest {
            name: "Борщ".to_string(),
            text: "Варить".to_string(),
            cooking_time: 90,
            image: None,
            tags: vec![1, 2],
            ingredients: vec![
                IngredientAmount { id: 1, amount: 300 },
                IngredientAmount { id: 2, amount: 2 },
            ],
        }
    }

    #[test]
    fn valid_request() {
        assert!(request().validate().is_ok());
    }

    #[test]
    fn blank_name_is_rejected_after_trimming() {
        let mut req = request();
        req.name = "   ".to_string();
        assert!(req.validate().is_ok());

        let req = req.normalized();
        assert_eq!(req.name, "");
        assert!(req.validate().unwrap_err().field_errors().contains_key("name"));
    }

    #[test]
    fn script_only_text_is_rejected_after_cleaning() {
        let mut req = request();
        req.text = "<script>x</script>".to_string();

        let req = req.normalized();
        assert_eq!(req.text, "");
        assert!(req.validate().unwrap_err().field_errors().contains_key("text"));
    }

    #[test]
    fn normalized_keeps_safe_markup() {
        let mut req = request();
        req.name = "  Борщ ".to_string();
        req.text = "<p>Варить</p><script>alert(1)</script>".to_string();

        let req = req.normalized();
        assert_eq!(req.name, "Борщ");
        assert_eq!(req.text, "<p>Варить</p>");
        assert!(req.validate().is_ok());
    }

    #[test]
    fn empty_and_duplicate_tags() {
        let mut req = request();
        req.tags = vec![];
        assert!(req.validate().unwrap_err().field_errors().contains_key("tags"));

        req.tags = vec![3, 3];
        assert!(req.validate().unwrap_err().field_errors().contains_key("tags"));
    }

    #[test]
    fn ingredient_rules() {
        let mut req = request();
        req.ingredients = vec![];
        assert!(req.validate().is_err());

        req.ingredients = vec![
            IngredientAmount { id: 1, amount: 1 },
            IngredientAmount { id: 1, amount: 5 },
        ];
        assert!(req.validate().unwrap_err().field_errors().contains_key("ingredients"));

        req.ingredients = vec![IngredientAmount { id: 1, amount: 0 }];
        assert!(req.validate().unwrap_err().field_errors().contains_key("ingredients"));
    }

    #[test]
    fn cooking_time_bounds() {
        let mut req = request();
        req.cooking_time = 0;
        assert!(req.validate().unwrap_err().field_errors().contains_key("cooking_time"));
        req.cooking_time = 32000;
        assert!(req.validate().is_ok());
    }

    #[test]
    fn flag_parsing() {
        assert_eq!(parse_flag("is_favorited", None).unwrap(), None);
        assert_eq!(parse_flag("is_favorited", Some("1")).unwrap(), Some(true));
        assert_eq!(parse_flag("is_favorited", Some("0")).unwrap(), Some(false));
        assert!(parse_flag("is_favorited", Some("2")).is_err());
    }

    #[test]
    fn short_recipe_serializes_image_url() {
        let recipe = ShortRecipe {
            id: 5,
            name: "Салат".to_string(),
            image: "recipes/images/x.png".to_string(),
            cooking_time: 10,
        };
        let value = serde_json::to_value(&recipe).unwrap();
        assert_eq!(value["image"], "/media/recipes/images/x.png");
    }
}
