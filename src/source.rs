//! Nutrient source resolution.
//!
//! Ingredients and consumption records carry their nutrient source as a set
//! of nullable columns: one foreign key per structured source plus the
//! manual-entry fields. [`SourceSlots`] is that raw shape; resolving it
//! yields a [`NutrientSource`] (or an [`IngredientSource`], which cannot
//! name a recipe) or the reason it is not exactly one source.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::nutrition::{round1, Macros, Nutrition};

pub const MAX_NAME_LEN: usize = 255;

/// Type tag reported with resolved items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Catalog,
    Custom,
    Recipe,
    Manual,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Catalog => "catalog",
            SourceKind::Custom => "custom",
            SourceKind::Recipe => "recipe",
            SourceKind::Manual => "manual",
        }
    }
}

/// One-off nutrient values typed in by the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManualEntry {
    pub name: String,
    pub macros: Macros,
}

impl ManualEntry {
    /// Validated manual entry, macros normalised to one decimal.
    pub fn new(name: impl Into<String>, macros: Macros) -> Result<Self, ValidationError> {
        let name = validate_name(name.into())?;
        let macros = validate_macros(macros)?;
        Ok(Self { name, macros })
    }

    /// Per-100g profile; kcal is always derived from the macros.
    pub fn profile(&self) -> Nutrition {
        self.macros.profile()
    }
}

/// Where a consumption record takes its nutrients from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NutrientSource {
    Catalog(i64),
    Custom(i64),
    Recipe(i64),
    Manual(ManualEntry),
}

impl NutrientSource {
    pub fn kind(&self) -> SourceKind {
        match self {
            NutrientSource::Catalog(_) => SourceKind::Catalog,
            NutrientSource::Custom(_) => SourceKind::Custom,
            NutrientSource::Recipe(_) => SourceKind::Recipe,
            NutrientSource::Manual(_) => SourceKind::Manual,
        }
    }
}

/// Where a recipe ingredient takes its nutrients from. Recipes do not nest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum IngredientSource {
    Catalog(i64),
    Custom(i64),
    Manual(ManualEntry),
}

impl IngredientSource {
    pub fn kind(&self) -> SourceKind {
        match self {
            IngredientSource::Catalog(_) => SourceKind::Catalog,
            IngredientSource::Custom(_) => SourceKind::Custom,
            IngredientSource::Manual(_) => SourceKind::Manual,
        }
    }
}

impl From<IngredientSource> for NutrientSource {
    fn from(source: IngredientSource) -> Self {
        match source {
            IngredientSource::Catalog(id) => NutrientSource::Catalog(id),
            IngredientSource::Custom(id) => NutrientSource::Custom(id),
            IngredientSource::Manual(entry) => NutrientSource::Manual(entry),
        }
    }
}

/// The nullable source columns of a stored row or an incoming payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceSlots {
    pub catalog_food_id: Option<i64>,
    pub custom_food_id: Option<i64>,
    pub recipe_id: Option<i64>,
    pub name: Option<String>,
    pub proteins: Option<f64>,
    pub fats: Option<f64>,
    pub carbohydrates: Option<f64>,
}

impl SourceSlots {
    /// The one populated source.
    ///
    /// A complete manual set counts as one candidate; setting any manual
    /// field next to a structured reference counts as a second one.
    pub fn resolve(&self) -> Result<NutrientSource, ValidationError> {
        let structured = self.structured_count();
        let manual = self.manual_fields();
        let manual_any = manual.iter().any(|set| *set);
        let manual_full = manual.iter().all(|set| *set);

        if structured == 0 && manual_any && !manual_full {
            return Err(ValidationError::IncompleteManualEntry);
        }
        let found = self.candidate_count();
        if found != 1 {
            return Err(ValidationError::InvalidSourceCount { found });
        }

        if let Some(id) = self.catalog_food_id {
            return Ok(NutrientSource::Catalog(id));
        }
        if let Some(id) = self.custom_food_id {
            return Ok(NutrientSource::Custom(id));
        }
        if let Some(id) = self.recipe_id {
            return Ok(NutrientSource::Recipe(id));
        }
        match (&self.name, self.proteins, self.fats, self.carbohydrates) {
            (Some(name), Some(proteins), Some(fats), Some(carbohydrates)) => Ok(
                NutrientSource::Manual(ManualEntry::new(
                    name.clone(),
                    Macros::new(proteins, fats, carbohydrates),
                )?),
            ),
            _ => Err(ValidationError::IncompleteManualEntry),
        }
    }

    /// Like [`resolve`](Self::resolve), but a recipe reference is not a
    /// valid candidate.
    pub fn resolve_ingredient(&self) -> Result<IngredientSource, ValidationError> {
        if self.recipe_id.is_some() {
            // a lone recipe reference is not a source here at all
            let found = match self.candidate_count() {
                1 => 0,
                n => n,
            };
            return Err(ValidationError::InvalidSourceCount { found });
        }
        match self.resolve()? {
            NutrientSource::Catalog(id) => Ok(IngredientSource::Catalog(id)),
            NutrientSource::Custom(id) => Ok(IngredientSource::Custom(id)),
            NutrientSource::Manual(entry) => Ok(IngredientSource::Manual(entry)),
            NutrientSource::Recipe(_) => Err(ValidationError::InvalidSourceCount { found: 0 }),
        }
    }
}

impl SourceSlots {
    fn structured_count(&self) -> usize {
        [self.catalog_food_id, self.custom_food_id, self.recipe_id]
            .iter()
            .filter(|slot| slot.is_some())
            .count()
    }

    fn manual_fields(&self) -> [bool; 4] {
        [
            self.name.is_some(),
            self.proteins.is_some(),
            self.fats.is_some(),
            self.carbohydrates.is_some(),
        ]
    }

    fn candidate_count(&self) -> usize {
        self.structured_count() + self.manual_fields().iter().any(|set| *set) as usize
    }
}

impl From<&NutrientSource> for SourceSlots {
    fn from(source: &NutrientSource) -> Self {
        match source {
            NutrientSource::Catalog(id) => SourceSlots {
                catalog_food_id: Some(*id),
                ..Default::default()
            },
            NutrientSource::Custom(id) => SourceSlots {
                custom_food_id: Some(*id),
                ..Default::default()
            },
            NutrientSource::Recipe(id) => SourceSlots {
                recipe_id: Some(*id),
                ..Default::default()
            },
            NutrientSource::Manual(entry) => SourceSlots {
                name: Some(entry.name.clone()),
                proteins: Some(entry.macros.proteins),
                fats: Some(entry.macros.fats),
                carbohydrates: Some(entry.macros.carbohydrates),
                ..Default::default()
            },
        }
    }
}

impl From<&IngredientSource> for SourceSlots {
    fn from(source: &IngredientSource) -> Self {
        SourceSlots::from(&NutrientSource::from(source.clone()))
    }
}

pub fn validate_name(name: String) -> Result<String, ValidationError> {
    let trimmed = name.trim();
    if trimmed.is_empty() || trimmed.chars().count() > MAX_NAME_LEN {
        return Err(ValidationError::InvalidName);
    }
    Ok(trimmed.to_string())
}

/// Range-checks each macro, normalises to one decimal and checks the sum.
pub fn validate_macros(macros: Macros) -> Result<Macros, ValidationError> {
    for (field, value) in [
        ("proteins", macros.proteins),
        ("fats", macros.fats),
        ("carbohydrates", macros.carbohydrates),
    ] {
        if !(0.0..=100.0).contains(&value) {
            return Err(ValidationError::MacroOutOfRange { field, value });
        }
    }
    let macros = macros.normalized();
    let sum = round1(macros.sum());
    if sum > 100.0 {
        return Err(ValidationError::MacroSumExceeded { sum });
    }
    Ok(macros)
}
