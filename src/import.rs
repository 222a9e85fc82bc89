// src/import.rs

//! Bulk loading of the ingredient catalogue from `ingredients.csv` / `ingredients.json`.
//!
//! CSV rows are headerless `name,measurement_unit` pairs; JSON is an array of
//! `{"name": ..., "measurement_unit": ...}` objects.

use std::{
    fmt,
    io::Read,
    path::{Path, PathBuf},
};

use sqlx::PgPool;
use validator::Validate;

use crate::models::ingredient::NewIngredient;

#[derive(Debug)]
pub enum ImportError {
    Io(std::io::Error),
    Csv(csv::Error),
    Json(serde_json::Error),
    Database(sqlx::Error),
    /// A record that parsed but is not a usable ingredient (1-based record number).
    InvalidRecord { record: usize, reason: String },
}

impl fmt::Display for ImportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportError::Io(e) => write!(f, "failed to read input: {}", e),
            ImportError::Csv(e) => write!(f, "malformed CSV: {}", e),
            ImportError::Json(e) => write!(f, "malformed JSON: {}", e),
            ImportError::Database(e) => write!(f, "database error: {}", e),
            ImportError::InvalidRecord { record, reason } => {
                write!(f, "record {}: {}", record, reason)
            }
        }
    }
}

impl std::error::Error for ImportError {}

impl From<std::io::Error> for ImportError {
    fn from(err: std::io::Error) -> Self {
        ImportError::Io(err)
    }
}

impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        ImportError::Csv(err)
    }
}

impl From<serde_json::Error> for ImportError {
    fn from(err: serde_json::Error) -> Self {
        ImportError::Json(err)
    }
}

impl From<sqlx::Error> for ImportError {
    fn from(err: sqlx::Error) -> Self {
        ImportError::Database(err)
    }
}

/// Default input file inside the data folder.
pub fn default_path(data_folder: &Path, json: bool) -> PathBuf {
    data_folder.join(if json {
        "ingredients.json"
    } else {
        "ingredients.csv"
    })
}

fn checked(record: usize, name: &str, unit: &str) -> Result<NewIngredient, ImportError> {
    let ingredient = NewIngredient {
        name: name.trim().to_string(),
        measurement_unit: unit.trim().to_string(),
    };
    ingredient
        .validate()
        .map_err(|e| ImportError::InvalidRecord {
            record,
            reason: e.to_string(),
        })?;
    Ok(ingredient)
}

pub fn parse_csv<R: Read>(reader: R) -> Result<Vec<NewIngredient>, ImportError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);

    let mut ingredients = Vec::new();
    for (index, result) in csv_reader.records().enumerate() {
        let record = result?;
        let number = index + 1;
        match (record.get(0), record.get(1)) {
            (Some(name), Some(unit)) if record.len() == 2 => {
                ingredients.push(checked(number, name, unit)?);
            }
            _ => {
                return Err(ImportError::InvalidRecord {
                    record: number,
                    reason: format!("expected 2 fields, found {}", record.len()),
                });
            }
        }
    }
    Ok(ingredients)
}

pub fn parse_json<R: Read>(reader: R) -> Result<Vec<NewIngredient>, ImportError> {
    let raw: Vec<NewIngredient> = serde_json::from_reader(reader)?;
    raw.iter()
        .enumerate()
        .map(|(index, item)| checked(index + 1, &item.name, &item.measurement_unit))
        .collect()
}

/// Inserts all ingredients in one transaction, skipping ones already present.
/// Returns how many rows were actually inserted.
pub async fn load(pool: &PgPool, ingredients: &[NewIngredient]) -> Result<u64, ImportError> {
    let mut tx = pool.begin().await?;
    let mut inserted = 0;

    for ingredient in ingredients {
        let result = sqlx::query(
            r#"
            INSERT INTO ingredients (name, measurement_unit)
            VALUES ($1, $2)
            ON CONFLICT (name, measurement_unit) DO NOTHING
            "#,
        )
        .bind(&ingredient.name)
        .bind(&ingredient.measurement_unit)
        .execute(&mut *tx)
        .await?;
        inserted += result.rows_affected();
    }

    tx.commit().await?;
    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_rows_are_trimmed() {
        let input = "абрикосовое варенье,г\n  ананас , шт. \n\"соль, морская\",г\n";
        let items = parse_csv(input.as_bytes()).unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items[1].name, "ананас");
        assert_eq!(items[1].measurement_unit, "шт.");
        assert_eq!(items[2].name, "соль, морская");
    }

    #[test]
    fn csv_wrong_field_count_reports_record() {
        let err = parse_csv("мука,г\nсахар\n".as_bytes()).unwrap_err();
        assert!(matches!(err, ImportError::InvalidRecord { record: 2, .. }));
    }

    #[test]
    fn csv_empty_name_is_rejected() {
        let err = parse_csv(" ,г\n".as_bytes()).unwrap_err();
        assert!(matches!(err, ImportError::InvalidRecord { record: 1, .. }));
    }

    #[test]
    fn json_array() {
        let input = r#"[{"name": "мука", "measurement_unit": "г"}, {"name": "яйца", "measurement_unit": "шт."}]"#;
        let items = parse_json(input.as_bytes()).unwrap();
        assert_eq!(
            items[0],
            NewIngredient {
                name: "мука".to_string(),
                measurement_unit: "г".to_string()
            }
        );
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn json_missing_field_is_an_error() {
        assert!(matches!(
            parse_json(r#"[{"name": "мука"}]"#.as_bytes()),
            Err(ImportError::Json(_))
        ));
    }

    #[test]
    fn bundled_data_parses() {
        let root = Path::new(env!("CARGO_MANIFEST_DIR")).join("data");
        let csv = parse_csv(std::fs::File::open(default_path(&root, false)).unwrap()).unwrap();
        let json = parse_json(std::fs::File::open(default_path(&root, true)).unwrap()).unwrap();
        assert!(!csv.is_empty());
        assert_eq!(csv, json);
    }
}
