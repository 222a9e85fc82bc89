use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Represents the 'ingredients' table in the database.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Ingredient {
    pub id: i64,
    pub name: String,
    pub measurement_unit: String,
}

/// DTO for adding an ingredient to the catalogue.
#[derive(Debug, Clone, PartialEq, Deserialize, Validate)]
pub struct NewIngredient {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(min = 1, max = 200))]
    pub measurement_unit: String,
}

/// Query parameters for the ingredient list.
#[derive(Debug, Deserialize)]
pub struct IngredientSearchParams {
    /// Case-insensitive name prefix.
    pub name: Option<String>,
}
