//! Freezing a source's nutrients into its dependents before the source row
//! is deleted. Runs on the deleting transaction's connection; if any update
//! fails, the caller's transaction rolls the delete back with it.

use chrono::NaiveDateTime;
use diesel::sqlite::SqliteConnection;
use log::info;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{CatalogFood, CustomFood};
use crate::nutrition::{round1, Macros};
use crate::query;
use crate::recipe::LoadedRecipe;

/// Manual-entry values written into dependents in place of a reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub name: String,
    pub proteins: f64,
    pub fats: f64,
    pub carbohydrates: f64,
    pub kcal: f64,
}

impl Snapshot {
    fn new(name: &str, macros: Macros) -> Self {
        Self {
            name: name.to_string(),
            proteins: macros.proteins,
            fats: macros.fats,
            carbohydrates: macros.carbohydrates,
            kcal: macros.kcal(),
        }
    }

    pub fn from_catalog_food(food: &CatalogFood) -> Self {
        Self::new(&food.name, food.macros())
    }

    pub fn from_custom_food(food: &CustomFood) -> Self {
        Self::new(&food.name, food.macros())
    }

    /// The recipe's per-100g profile. Rounding each averaged macro can push
    /// their sum to 100.1 or 100.2; the excess comes off the largest macro
    /// so the frozen entry is still a valid manual entry.
    pub fn from_recipe(recipe: &LoadedRecipe) -> Self {
        let per_100g = recipe.profile().per_100g;
        let mut macros = per_100g.macros();
        let excess = round1(macros.sum() - 100.0);
        if excess > 0.0 {
            let largest = if macros.proteins >= macros.fats && macros.proteins >= macros.carbohydrates
            {
                &mut macros.proteins
            } else if macros.fats >= macros.carbohydrates {
                &mut macros.fats
            } else {
                &mut macros.carbohydrates
            };
            *largest = round1(*largest - excess);
        }
        Self::new(&recipe.recipe.name, macros)
    }
}

/// Rows rewritten by one denormalization pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Denormalized {
    pub ingredients: usize,
    pub consumption_records: usize,
}

impl Denormalized {
    pub fn total(&self) -> usize {
        self.ingredients + self.consumption_records
    }
}

pub fn on_catalog_food_delete(
    conn: &SqliteConnection,
    food: &CatalogFood,
    now: NaiveDateTime,
) -> Result<Denormalized> {
    let snapshot = Snapshot::from_catalog_food(food);
    let rows = Denormalized {
        ingredients: query::freeze_ingredients_of_catalog_food(conn, food.id, &snapshot, now)?,
        consumption_records: query::freeze_records_of_catalog_food(conn, food.id, &snapshot, now)?,
    };
    info!(
        "catalog food {} ({}): froze {} ingredients and {} consumption records",
        food.id, food.name, rows.ingredients, rows.consumption_records
    );
    Ok(rows)
}

pub fn on_custom_food_delete(
    conn: &SqliteConnection,
    food: &CustomFood,
    now: NaiveDateTime,
) -> Result<Denormalized> {
    let snapshot = Snapshot::from_custom_food(food);
    let rows = Denormalized {
        ingredients: query::freeze_ingredients_of_custom_food(conn, food.id, &snapshot, now)?,
        consumption_records: query::freeze_records_of_custom_food(conn, food.id, &snapshot, now)?,
    };
    info!(
        "custom food {} ({}): froze {} ingredients and {} consumption records",
        food.id, food.name, rows.ingredients, rows.consumption_records
    );
    Ok(rows)
}

/// Ingredients go with the recipe; only consumption records are frozen.
pub fn on_recipe_delete(
    conn: &SqliteConnection,
    recipe: &LoadedRecipe,
    now: NaiveDateTime,
) -> Result<Denormalized> {
    let snapshot = Snapshot::from_recipe(recipe);
    let rows = Denormalized {
        ingredients: 0,
        consumption_records: query::freeze_records_of_recipe(
            conn,
            recipe.recipe.id,
            &snapshot,
            now,
        )?,
    };
    info!(
        "recipe {} ({}): froze {} consumption records",
        recipe.recipe.id, recipe.recipe.name, rows.consumption_records
    );
    Ok(rows)
}
