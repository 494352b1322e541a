//! Nutrient totals for consumption records, per record, per day and per
//! date range.

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result, ValidationError};
use crate::models::{CatalogFood, ConsumptionRecord, CustomFood};
use crate::nutrition::Nutrition;
use crate::recipe::LoadedRecipe;
use crate::source::{ManualEntry, NutrientSource, SourceKind};

/// Source data behind one consumption record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RecordData {
    Catalog(CatalogFood),
    Custom(CustomFood),
    Recipe(LoadedRecipe),
    Manual(ManualEntry),
}

impl RecordData {
    pub fn kind(&self) -> SourceKind {
        match self {
            RecordData::Catalog(_) => SourceKind::Catalog,
            RecordData::Custom(_) => SourceKind::Custom,
            RecordData::Recipe(_) => SourceKind::Recipe,
            RecordData::Manual(_) => SourceKind::Manual,
        }
    }

    pub fn source_id(&self) -> Option<i64> {
        match self {
            RecordData::Catalog(food) => Some(food.id),
            RecordData::Custom(food) => Some(food.id),
            RecordData::Recipe(loaded) => Some(loaded.recipe.id),
            RecordData::Manual(_) => None,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            RecordData::Catalog(food) => &food.name,
            RecordData::Custom(food) => &food.name,
            RecordData::Recipe(loaded) => &loaded.recipe.name,
            RecordData::Manual(entry) => &entry.name,
        }
    }

    /// Per-100g profile. For recipes this is the aggregated profile.
    pub fn per_100g(&self) -> Nutrition {
        match self {
            RecordData::Catalog(food) => food.profile(),
            RecordData::Custom(food) => food.profile(),
            RecordData::Recipe(loaded) => loaded.profile().per_100g,
            RecordData::Manual(entry) => entry.profile(),
        }
    }
}

/// A consumption record joined with whatever its source columns point at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsumptionEntry {
    pub id: i64,
    pub eaten_at: NaiveDateTime,
    pub mass_grams: i32,
    pub data: RecordData,
}

impl ConsumptionEntry {
    pub fn from_row(
        row: ConsumptionRecord,
        catalog: Option<CatalogFood>,
        custom: Option<CustomFood>,
        recipe: Option<LoadedRecipe>,
    ) -> Result<Self> {
        let missing = |what: &str, id: i64| {
            Error::Integrity(format!(
                "consumption record {} references missing {} {}",
                row.id, what, id
            ))
        };
        let data = match row.source()? {
            NutrientSource::Catalog(id) => {
                RecordData::Catalog(catalog.ok_or_else(|| missing("catalog food", id))?)
            }
            NutrientSource::Custom(id) => {
                RecordData::Custom(custom.ok_or_else(|| missing("custom food", id))?)
            }
            NutrientSource::Recipe(id) => {
                RecordData::Recipe(recipe.ok_or_else(|| missing("recipe", id))?)
            }
            NutrientSource::Manual(entry) => RecordData::Manual(entry),
        };
        Ok(Self {
            id: row.id,
            eaten_at: row.eaten_at,
            mass_grams: row.mass_grams,
            data,
        })
    }

    pub fn day(&self) -> NaiveDate {
        self.eaten_at.date()
    }

    fn exact_nutrition(&self) -> Nutrition {
        self.data.per_100g().scaled(self.mass_grams as f64)
    }
}

/// One row of an itemized consumption listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsumptionItem {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: SourceKind,
    pub source_id: Option<i64>,
    pub name: String,
    pub mass_grams: i32,
    pub eaten_at: NaiveDateTime,
    pub nutrition: Nutrition,
}

/// Nutrition of one record at its mass, each field rounded.
pub fn record_nutrition(entry: &ConsumptionEntry) -> Nutrition {
    entry.exact_nutrition().rounded()
}

/// Sum of [`record_nutrition`] over the records eaten on `day`.
pub fn daily_totals(entries: &[ConsumptionEntry], day: NaiveDate) -> Nutrition {
    entries
        .iter()
        .filter(|entry| entry.day() == day)
        .map(record_nutrition)
        .sum::<Nutrition>()
        .rounded()
}

/// Daily totals for every day in `[start, end]`; days without records map to
/// zero.
pub fn range_totals(
    entries: &[ConsumptionEntry],
    start: NaiveDate,
    end: NaiveDate,
) -> Result<BTreeMap<NaiveDate, Nutrition>, ValidationError> {
    if start > end {
        return Err(ValidationError::InvalidRange { start, end });
    }

    let mut days = BTreeMap::new();
    let mut next = Some(start);
    while let Some(day) = next.filter(|day| *day <= end) {
        days.insert(day, Nutrition::zero());
        next = day.succ_opt();
    }

    for entry in entries {
        if let Some(total) = days.get_mut(&entry.day()) {
            *total += record_nutrition(entry);
        }
    }
    for total in days.values_mut() {
        *total = total.rounded();
    }
    Ok(days)
}

/// Itemized listing plus a grand total.
///
/// The grand total sums unrounded per-record values and rounds once, so it
/// can differ in the last digit from summing the listed (rounded) items.
pub fn list_with_totals(entries: &[ConsumptionEntry]) -> (Vec<ConsumptionItem>, Nutrition) {
    let mut grand_total = Nutrition::zero();
    let items = entries
        .iter()
        .map(|entry| {
            let exact = entry.exact_nutrition();
            grand_total += exact;
            ConsumptionItem {
                id: entry.id,
                kind: entry.data.kind(),
                source_id: entry.data.source_id(),
                name: entry.data.name().to_string(),
                mass_grams: entry.mass_grams,
                eaten_at: entry.eaten_at,
                nutrition: exact.rounded(),
            }
        })
        .collect();
    (items, grand_total.rounded())
}
