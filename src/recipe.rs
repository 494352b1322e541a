//! Recipe nutrient profiles, derived from the ingredient set.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::{CatalogFood, CustomFood, Recipe, RecipeIngredient};
use crate::nutrition::{round1, Nutrition};
use crate::source::{IngredientSource, ManualEntry, SourceKind};

/// Source data behind one ingredient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum IngredientData {
    Catalog(CatalogFood),
    Custom(CustomFood),
    Manual(ManualEntry),
}

impl IngredientData {
    pub fn kind(&self) -> SourceKind {
        match self {
            IngredientData::Catalog(_) => SourceKind::Catalog,
            IngredientData::Custom(_) => SourceKind::Custom,
            IngredientData::Manual(_) => SourceKind::Manual,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            IngredientData::Catalog(food) => &food.name,
            IngredientData::Custom(food) => &food.name,
            IngredientData::Manual(entry) => &entry.name,
        }
    }

    pub fn per_100g(&self) -> Nutrition {
        match self {
            IngredientData::Catalog(food) => food.profile(),
            IngredientData::Custom(food) => food.profile(),
            IngredientData::Manual(entry) => entry.profile(),
        }
    }
}

/// A recipe ingredient joined with whatever its source columns point at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngredientEntry {
    pub id: i64,
    pub mass_grams: i32,
    pub data: IngredientData,
}

impl IngredientEntry {
    /// Resolve a stored ingredient against its joined catalog/custom rows.
    pub fn from_row(
        row: RecipeIngredient,
        catalog: Option<CatalogFood>,
        custom: Option<CustomFood>,
    ) -> Result<Self> {
        let data = match row.source()? {
            IngredientSource::Catalog(id) => IngredientData::Catalog(catalog.ok_or_else(|| {
                Error::Integrity(format!(
                    "ingredient {} references missing catalog food {}",
                    row.id, id
                ))
            })?),
            IngredientSource::Custom(id) => IngredientData::Custom(custom.ok_or_else(|| {
                Error::Integrity(format!(
                    "ingredient {} references missing custom food {}",
                    row.id, id
                ))
            })?),
            IngredientSource::Manual(entry) => IngredientData::Manual(entry),
        };
        Ok(Self {
            id: row.id,
            mass_grams: row.mass_grams,
            data,
        })
    }

    /// This ingredient's contribution at its own mass, unrounded.
    pub fn contribution(&self) -> Nutrition {
        self.data.per_100g().scaled(self.mass_grams as f64)
    }
}

/// A recipe with its ingredients loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadedRecipe {
    pub recipe: Recipe,
    pub ingredients: Vec<IngredientEntry>,
}

impl LoadedRecipe {
    pub fn profile(&self) -> RecipeProfile {
        compute_profile(&self.ingredients)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RecipeProfile {
    pub total_mass: i64,
    pub per_total: Nutrition,
    pub per_100g: Nutrition,
}

/// One row of a recipe's ingredient listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngredientDetail {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: SourceKind,
    pub name: String,
    pub mass_grams: i32,
    pub proteins: f64,
    pub fats: f64,
    pub carbohydrates: f64,
    pub kcal: f64,
}

/// Sum the ingredients at full precision and normalise to 100g.
///
/// Only the outputs are rounded. Per-100g kcal is derived from the rounded
/// per-100g macros; an empty ingredient set yields an all-zero profile.
pub fn compute_profile(ingredients: &[IngredientEntry]) -> RecipeProfile {
    let total_mass: i64 = ingredients.iter().map(|i| i64::from(i.mass_grams)).sum();
    if total_mass == 0 {
        return RecipeProfile::default();
    }

    let totals: Nutrition = ingredients
        .iter()
        .map(IngredientEntry::contribution)
        .sum::<Nutrition>()
        .with_derived_kcal();

    let mass = total_mass as f64;
    let per_100g = Nutrition {
        proteins: round1(totals.proteins * 100.0 / mass),
        fats: round1(totals.fats * 100.0 / mass),
        carbohydrates: round1(totals.carbohydrates * 100.0 / mass),
        kcal: 0.0,
    }
    .rounded_with_derived_kcal();

    RecipeProfile {
        total_mass,
        per_total: totals.rounded(),
        per_100g,
    }
}

pub fn ingredient_details(ingredients: &[IngredientEntry]) -> Vec<IngredientDetail> {
    ingredients
        .iter()
        .map(|ingredient| {
            let nutrition = ingredient.contribution().rounded();
            IngredientDetail {
                id: ingredient.id,
                kind: ingredient.data.kind(),
                name: ingredient.data.name().to_string(),
                mass_grams: ingredient.mass_grams,
                proteins: nutrition.proteins,
                fats: nutrition.fats,
                carbohydrates: nutrition.carbohydrates,
                kcal: nutrition.kcal,
            }
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::nutrition::Macros;

    pub(crate) fn catalog(id: i64, name: &str, p: f64, f: f64, c: f64) -> CatalogFood {
        let at = NaiveDate::from_ymd_opt(2026, 1, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .unwrap();
        CatalogFood {
            id,
            name: name.to_string(),
            proteins: p,
            fats: f,
            carbohydrates: c,
            kcal: Macros::new(p, f, c).kcal(),
            created_at: at,
            updated_at: at,
        }
    }

    pub(crate) fn entry(id: i64, mass_grams: i32, data: IngredientData) -> IngredientEntry {
        IngredientEntry {
            id,
            mass_grams,
            data,
        }
    }

    #[test]
    fn test_empty_recipe_profile() {
        let profile = compute_profile(&[]);
        assert_eq!(profile.total_mass, 0);
        assert_eq!(profile.per_total, Nutrition::zero());
        assert_eq!(profile.per_100g, Nutrition::zero());
    }

    #[test]
    fn test_weighted_average() {
        let rice = catalog(1, "Rice", 7.0, 1.0, 77.0);
        let oil = ManualEntry::new("Oil", Macros::new(0.0, 99.9, 0.0)).unwrap();
        let ingredients = vec![
            entry(1, 300, IngredientData::Catalog(rice)),
            entry(2, 15, IngredientData::Manual(oil)),
        ];

        let profile = compute_profile(&ingredients);
        assert_eq!(profile.total_mass, 315);

        let proteins = 7.0 * 300.0 / 100.0 + 0.0;
        let fats = 1.0 * 300.0 / 100.0 + 99.9 * 15.0 / 100.0;
        let carbs = 77.0 * 300.0 / 100.0;
        assert_eq!(profile.per_100g.proteins, round1(proteins * 100.0 / 315.0));
        assert_eq!(profile.per_100g.fats, round1(fats * 100.0 / 315.0));
        assert_eq!(profile.per_100g.carbohydrates, round1(carbs * 100.0 / 315.0));
        assert_eq!(
            profile.per_100g.kcal,
            Macros::new(
                profile.per_100g.proteins,
                profile.per_100g.fats,
                profile.per_100g.carbohydrates
            )
            .kcal()
        );
        assert_eq!(profile.per_total.proteins, 21.0);
        assert_eq!(profile.per_total.carbohydrates, 231.0);
    }

    #[test]
    fn test_ingredient_details() {
        let chicken = catalog(4, "Chicken", 20.0, 5.0, 0.0);
        let details = ingredient_details(&[entry(10, 200, IngredientData::Catalog(chicken))]);
        assert_eq!(
            details,
            vec![IngredientDetail {
                id: 10,
                kind: SourceKind::Catalog,
                name: "Chicken".to_string(),
                mass_grams: 200,
                proteins: 40.0,
                fats: 10.0,
                carbohydrates: 0.0,
                kcal: 250.0,
            }]
        );
    }

    #[test]
    fn test_from_row_requires_joined_food() {
        let at = NaiveDate::from_ymd_opt(2026, 1, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .unwrap();
        let row = RecipeIngredient {
            id: 1,
            owner_id: 1,
            recipe_id: 1,
            mass_grams: 100,
            catalog_food_id: Some(5),
            custom_food_id: None,
            name: None,
            proteins: None,
            fats: None,
            carbohydrates: None,
            kcal: None,
            created_at: at,
            updated_at: at,
        };
        assert!(matches!(
            IngredientEntry::from_row(row.clone(), None, None),
            Err(Error::Integrity(_))
        ));

        let resolved =
            IngredientEntry::from_row(row, Some(catalog(5, "Egg", 12.7, 11.5, 0.7)), None)
                .unwrap();
        assert_eq!(resolved.data.kind(), SourceKind::Catalog);
        assert_eq!(resolved.data.name(), "Egg");
    }
}
