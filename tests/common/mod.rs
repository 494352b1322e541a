//! Shared fixtures: a tracker over a throwaway SQLite file and an
//! in-process cache, with a frozen clock.

#![allow(dead_code)]

use chrono::{Duration, NaiveDate, NaiveDateTime};
use tempfile::TempDir;

use nutrition_engine::cache::{CacheCoherence, EntityKind, Scope};
use nutrition_engine::database::{establish_pool, init_schema, DbPool};
use nutrition_engine::models::{CatalogFood, CustomFood, Recipe};
use nutrition_engine::{
    ConsumptionInput, FixedClock, FoodInput, IngredientInput, IngredientSource, Macros,
    ManualEntry, MemoryCache, NutrientSource, RecipeInput, Settings, Tracker,
};

pub const OWNER: i64 = 1;
pub const OTHER_OWNER: i64 = 2;

pub struct TestTracker {
    pub tracker: Tracker<MemoryCache>,
    pub pool: DbPool,
    _dir: TempDir,
}

impl std::ops::Deref for TestTracker {
    type Target = Tracker<MemoryCache>;

    fn deref(&self) -> &Self::Target {
        &self.tracker
    }
}

impl TestTracker {
    pub fn generation(&self, entity: EntityKind, scope: Scope) -> u64 {
        let conn = self.pool.get().unwrap();
        CacheCoherence::new(&*conn)
            .current_generation(entity, scope)
            .unwrap()
    }
}

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// 2026-03-10 12:00 UTC
pub fn now() -> NaiveDateTime {
    today().and_hms_opt(12, 0, 0).unwrap()
}

pub fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, 10).unwrap()
}

pub fn hours_ago(hours: i64) -> NaiveDateTime {
    now() - Duration::hours(hours)
}

pub fn tracker() -> TestTracker {
    tracker_with(Settings::default())
}

pub fn tracker_with(settings: Settings) -> TestTracker {
    init_logger();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nutrition.db");
    let pool = establish_pool(path.to_str().unwrap(), 4).unwrap();
    init_schema(&pool.get().unwrap()).unwrap();
    TestTracker {
        tracker: Tracker::new(pool.clone(), MemoryCache::new(), FixedClock(now()), settings),
        pool,
        _dir: dir,
    }
}

pub fn food(name: &str, proteins: f64, fats: f64, carbohydrates: f64) -> FoodInput {
    FoodInput {
        name: name.to_string(),
        macros: Macros::new(proteins, fats, carbohydrates),
    }
}

pub fn manual(name: &str, proteins: f64, fats: f64, carbohydrates: f64) -> ManualEntry {
    ManualEntry::new(name, Macros::new(proteins, fats, carbohydrates)).unwrap()
}

pub fn chicken(t: &TestTracker) -> CatalogFood {
    t.create_catalog_food(food("Chicken", 20.0, 5.0, 0.0)).unwrap()
}

pub fn oats(t: &TestTracker) -> CatalogFood {
    t.create_catalog_food(food("Oats", 12.0, 6.0, 60.0)).unwrap()
}

pub fn custom(t: &TestTracker, owner_id: i64, name: &str) -> CustomFood {
    t.create_custom_food(owner_id, food(name, 10.0, 10.0, 10.0))
        .unwrap()
}

/// 50g oats and 150g milk.
pub fn porridge(t: &TestTracker) -> (Recipe, CatalogFood) {
    let oats = oats(t);
    let recipe = t
        .create_recipe(
            OWNER,
            RecipeInput {
                name: "Porridge".to_string(),
                description: "Oats cooked in milk".to_string(),
            },
            vec![
                IngredientInput {
                    mass_grams: 50,
                    source: IngredientSource::Catalog(oats.id),
                },
                IngredientInput {
                    mass_grams: 150,
                    source: IngredientSource::Manual(manual("Milk", 3.0, 2.5, 4.8)),
                },
            ],
        )
        .unwrap();
    (recipe, oats)
}

pub fn eaten(eaten_at: NaiveDateTime, mass_grams: i32, source: NutrientSource) -> ConsumptionInput {
    ConsumptionInput {
        eaten_at,
        mass_grams,
        source,
    }
}
