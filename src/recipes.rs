use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::sheet::{Row, Worksheet, find_row_index};

/// Column set of the recipes sheet, in sheet order.
pub const RECIPE_COLUMNS: [&str; 6] = [
    "name",
    "category",
    "diet",
    "duration",
    "ingredients",
    "preparation",
];

/// One recipe as entered through the add-recipe form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recipe {
    pub name: String,
    pub category: String,
    pub diet: String,
    pub duration: String,
    pub ingredients: String,
    pub preparation: String,
}

impl Recipe {
    pub fn to_row(&self) -> Row {
        vec![
            self.name.clone(),
            self.category.clone(),
            self.diet.clone(),
            self.duration.clone(),
            self.ingredients.clone(),
            self.preparation.clone(),
        ]
    }

    /// All fields are required; whitespace-only counts as empty.
    pub fn validate(&self) -> Result<(), AppError> {
        let fields = [
            ("name", &self.name),
            ("category", &self.category),
            ("diet", &self.diet),
            ("duration", &self.duration),
            ("ingredients", &self.ingredients),
            ("preparation", &self.preparation),
        ];
        for (label, value) in fields {
            if value.trim().is_empty() {
                return Err(AppError::Validation(format!(
                    "please fill in all fields: '{label}' is missing"
                )));
            }
        }
        Ok(())
    }
}

/// Validates and appends a recipe as the sheet's last row. Duplicate recipe
/// names are allowed; nothing is written when validation fails.
pub fn add_recipe(ws: &mut dyn Worksheet, recipe: &Recipe) -> Result<(), AppError> {
    recipe.validate()?;
    ws.append_row(recipe.to_row())
}

/// Deletes the recipe addressed by `name`. The index is resolved immediately
/// before the delete; when duplicate names exist the first match wins.
pub fn delete_recipe(ws: &mut dyn Worksheet, name: &str) -> Result<(), AppError> {
    match find_row_index(ws, name)? {
        Some(row_index) => ws.delete_row(row_index),
        None => Err(AppError::NotFound(format!(
            "recipe '{name}' could not be found, check your input"
        ))),
    }
}
