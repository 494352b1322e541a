use chrono::NaiveDateTime;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::nutrition::{Macros, Nutrition};
use crate::schema::{
    catalog_foods, consumption_records, custom_foods, favorites, recipe_ingredients, recipes,
};
use crate::source::{IngredientSource, NutrientSource, SourceSlots};

pub const MIN_MASS_GRAMS: i32 = 1;
pub const MAX_MASS_GRAMS: i32 = 10_000;

/// Cached values are stored as bincode bytes.
pub(crate) fn to_u8<T: Serialize>(value: &T) -> Result<Vec<u8>, bincode::Error> {
    bincode::serialize(value)
}

pub(crate) fn from_u8<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, bincode::Error> {
    bincode::deserialize(bytes)
}

pub fn validate_mass(mass_grams: i32) -> Result<i32, ValidationError> {
    if (MIN_MASS_GRAMS..=MAX_MASS_GRAMS).contains(&mass_grams) {
        Ok(mass_grams)
    } else {
        Err(ValidationError::InvalidMass(mass_grams))
    }
}

/// Shared reference food, maintained by moderators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Queryable)]
pub struct CatalogFood {
    pub id: i64,
    pub name: String,
    pub proteins: f64,
    pub fats: f64,
    pub carbohydrates: f64,
    pub kcal: f64,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl CatalogFood {
    pub fn macros(&self) -> Macros {
        Macros::new(self.proteins, self.fats, self.carbohydrates)
    }

    pub fn profile(&self) -> Nutrition {
        self.macros().profile()
    }
}

/// A food one owner defined for themselves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Queryable)]
pub struct CustomFood {
    pub id: i64,
    pub owner_id: i64,
    pub name: String,
    pub proteins: f64,
    pub fats: f64,
    pub carbohydrates: f64,
    pub kcal: f64,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl CustomFood {
    pub fn macros(&self) -> Macros {
        Macros::new(self.proteins, self.fats, self.carbohydrates)
    }

    pub fn profile(&self) -> Nutrition {
        self.macros().profile()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Queryable)]
pub struct Recipe {
    pub id: i64,
    pub owner_id: i64,
    pub name: String,
    pub description: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Queryable)]
pub struct RecipeIngredient {
    pub id: i64,
    pub owner_id: i64,
    pub recipe_id: i64,
    pub mass_grams: i32,
    pub catalog_food_id: Option<i64>,
    pub custom_food_id: Option<i64>,
    pub name: Option<String>,
    pub proteins: Option<f64>,
    pub fats: Option<f64>,
    pub carbohydrates: Option<f64>,
    pub kcal: Option<f64>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl RecipeIngredient {
    pub fn slots(&self) -> SourceSlots {
        SourceSlots {
            catalog_food_id: self.catalog_food_id,
            custom_food_id: self.custom_food_id,
            recipe_id: None,
            name: self.name.clone(),
            proteins: self.proteins,
            fats: self.fats,
            carbohydrates: self.carbohydrates,
        }
    }

    pub fn source(&self) -> Result<IngredientSource, ValidationError> {
        self.slots().resolve_ingredient()
    }
}

/// An "eaten food" entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Queryable)]
pub struct ConsumptionRecord {
    pub id: i64,
    pub owner_id: i64,
    pub eaten_at: NaiveDateTime,
    pub mass_grams: i32,
    pub catalog_food_id: Option<i64>,
    pub custom_food_id: Option<i64>,
    pub recipe_id: Option<i64>,
    pub name: Option<String>,
    pub proteins: Option<f64>,
    pub fats: Option<f64>,
    pub carbohydrates: Option<f64>,
    pub kcal: Option<f64>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl ConsumptionRecord {
    pub fn slots(&self) -> SourceSlots {
        SourceSlots {
            catalog_food_id: self.catalog_food_id,
            custom_food_id: self.custom_food_id,
            recipe_id: self.recipe_id,
            name: self.name.clone(),
            proteins: self.proteins,
            fats: self.fats,
            carbohydrates: self.carbohydrates,
        }
    }

    pub fn source(&self) -> Result<NutrientSource, ValidationError> {
        self.slots().resolve()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Queryable)]
pub struct Favorite {
    pub id: i64,
    pub owner_id: i64,
    pub catalog_food_id: i64,
    pub created_at: NaiveDateTime,
}

/// Name and macros of a catalog or custom food, as submitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoodInput {
    pub name: String,
    pub macros: Macros,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeInput {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngredientInput {
    pub mass_grams: i32,
    pub source: IngredientSource,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsumptionInput {
    pub eaten_at: NaiveDateTime,
    pub mass_grams: i32,
    pub source: NutrientSource,
}

/// Column values for one source, ready for insert or update.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub(crate) struct SourceColumns<'a> {
    pub catalog_food_id: Option<i64>,
    pub custom_food_id: Option<i64>,
    pub recipe_id: Option<i64>,
    pub name: Option<&'a str>,
    pub proteins: Option<f64>,
    pub fats: Option<f64>,
    pub carbohydrates: Option<f64>,
    pub kcal: Option<f64>,
}

impl<'a> SourceColumns<'a> {
    pub fn new(source: &'a NutrientSource) -> Self {
        match source {
            NutrientSource::Catalog(id) => SourceColumns {
                catalog_food_id: Some(*id),
                ..Default::default()
            },
            NutrientSource::Custom(id) => SourceColumns {
                custom_food_id: Some(*id),
                ..Default::default()
            },
            NutrientSource::Recipe(id) => SourceColumns {
                recipe_id: Some(*id),
                ..Default::default()
            },
            NutrientSource::Manual(entry) => SourceColumns {
                name: Some(entry.name.as_str()),
                proteins: Some(entry.macros.proteins),
                fats: Some(entry.macros.fats),
                carbohydrates: Some(entry.macros.carbohydrates),
                kcal: Some(entry.macros.kcal()),
                ..Default::default()
            },
        }
    }
}

#[derive(Debug, Insertable)]
#[table_name = "catalog_foods"]
pub(crate) struct NewCatalogFood<'a> {
    pub name: &'a str,
    pub proteins: f64,
    pub fats: f64,
    pub carbohydrates: f64,
    pub kcal: f64,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, AsChangeset)]
#[table_name = "catalog_foods"]
pub(crate) struct CatalogFoodChanges<'a> {
    pub name: &'a str,
    pub proteins: f64,
    pub fats: f64,
    pub carbohydrates: f64,
    pub kcal: f64,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[table_name = "custom_foods"]
pub(crate) struct NewCustomFood<'a> {
    pub owner_id: i64,
    pub name: &'a str,
    pub proteins: f64,
    pub fats: f64,
    pub carbohydrates: f64,
    pub kcal: f64,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, AsChangeset)]
#[table_name = "custom_foods"]
pub(crate) struct CustomFoodChanges<'a> {
    pub name: &'a str,
    pub proteins: f64,
    pub fats: f64,
    pub carbohydrates: f64,
    pub kcal: f64,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[table_name = "recipes"]
pub(crate) struct NewRecipe<'a> {
    pub owner_id: i64,
    pub name: &'a str,
    pub description: &'a str,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, AsChangeset)]
#[table_name = "recipes"]
pub(crate) struct RecipeChanges<'a> {
    pub name: &'a str,
    pub description: &'a str,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[table_name = "recipe_ingredients"]
pub(crate) struct NewRecipeIngredient<'a> {
    pub owner_id: i64,
    pub recipe_id: i64,
    pub mass_grams: i32,
    pub catalog_food_id: Option<i64>,
    pub custom_food_id: Option<i64>,
    pub name: Option<&'a str>,
    pub proteins: Option<f64>,
    pub fats: Option<f64>,
    pub carbohydrates: Option<f64>,
    pub kcal: Option<f64>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, AsChangeset)]
#[table_name = "recipe_ingredients"]
#[changeset_options(treat_none_as_null = "true")]
pub(crate) struct RecipeIngredientChanges<'a> {
    pub mass_grams: i32,
    pub catalog_food_id: Option<i64>,
    pub custom_food_id: Option<i64>,
    pub name: Option<&'a str>,
    pub proteins: Option<f64>,
    pub fats: Option<f64>,
    pub carbohydrates: Option<f64>,
    pub kcal: Option<f64>,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[table_name = "consumption_records"]
pub(crate) struct NewConsumptionRecord<'a> {
    pub owner_id: i64,
    pub eaten_at: NaiveDateTime,
    pub mass_grams: i32,
    pub catalog_food_id: Option<i64>,
    pub custom_food_id: Option<i64>,
    pub recipe_id: Option<i64>,
    pub name: Option<&'a str>,
    pub proteins: Option<f64>,
    pub fats: Option<f64>,
    pub carbohydrates: Option<f64>,
    pub kcal: Option<f64>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, AsChangeset)]
#[table_name = "consumption_records"]
#[changeset_options(treat_none_as_null = "true")]
pub(crate) struct ConsumptionRecordChanges<'a> {
    pub eaten_at: NaiveDateTime,
    pub mass_grams: i32,
    pub catalog_food_id: Option<i64>,
    pub custom_food_id: Option<i64>,
    pub recipe_id: Option<i64>,
    pub name: Option<&'a str>,
    pub proteins: Option<f64>,
    pub fats: Option<f64>,
    pub carbohydrates: Option<f64>,
    pub kcal: Option<f64>,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[table_name = "favorites"]
pub(crate) struct NewFavorite {
    pub owner_id: i64,
    pub catalog_food_id: i64,
    pub created_at: NaiveDateTime,
}
