//! The operations a request layer calls.
//!
//! Every write validates its input, persists, denormalizes (for deletes) and
//! bumps cache generations inside one immediate SQLite transaction. Reads go
//! through the cache under generation-versioned keys.

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use diesel::sqlite::SqliteConnection;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::cache::{get_or_compute, CacheCoherence, CacheStore, EntityKind, MemoryCache, Scope};
use crate::clock::{Clock, SystemClock};
use crate::config::{Config, RecipePolicy, Settings};
use crate::consumption::{self, ConsumptionItem};
use crate::database::{self, DbConnection, DbPool};
use crate::denormalize::{self, Denormalized};
use crate::error::{Error, Result, ValidationError};
use crate::models::{
    validate_mass, CatalogFood, CatalogFoodChanges, ConsumptionInput, ConsumptionRecord,
    ConsumptionRecordChanges, CustomFood, CustomFoodChanges, FoodInput, IngredientInput,
    NewCatalogFood, NewConsumptionRecord, NewCustomFood, NewFavorite, NewRecipe,
    NewRecipeIngredient, Recipe, RecipeChanges, RecipeInput, RecipeIngredient,
    RecipeIngredientChanges, SourceColumns,
};
use crate::nutrition::{Macros, Nutrition};
use crate::query;
use crate::recipe::{ingredient_details, IngredientDetail, RecipeProfile};
use crate::redis_cache::RedisCache;
use crate::source::{validate_macros, validate_name, IngredientSource, ManualEntry, NutrientSource};

/// A recipe with its computed profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeSummary {
    pub recipe: Recipe,
    pub profile: RecipeProfile,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeIngredients {
    pub recipe_id: i64,
    pub recipe_name: String,
    pub ingredients: Vec<IngredientDetail>,
    pub profile: RecipeProfile,
}

/// Everything eaten on one day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayReport {
    pub day: NaiveDate,
    pub items: Vec<ConsumptionItem>,
    pub total: Nutrition,
}

pub struct Tracker<C> {
    pool: DbPool,
    cache: C,
    clock: Box<dyn Clock>,
    settings: Settings,
}

impl Tracker<Box<dyn CacheStore>> {
    /// Pool and schema from `DATABASE_URL`; redis when `REDIS_URL` is set,
    /// an in-process cache otherwise.
    pub fn from_config(config: &Config) -> Result<Self> {
        let pool = database::connect(config)?;
        let cache: Box<dyn CacheStore> = match &config.redis_url {
            Some(url) => Box::new(RedisCache::new(url, config)?),
            None => Box::new(MemoryCache::new()),
        };
        Ok(Self::new(pool, cache, SystemClock, config.settings.clone()))
    }
}

impl<C: CacheStore> Tracker<C> {
    pub fn new(pool: DbPool, cache: C, clock: impl Clock + 'static, settings: Settings) -> Self {
        Self {
            pool,
            cache,
            clock: Box::new(clock),
            settings,
        }
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    fn conn(&self) -> Result<DbConnection> {
        Ok(self.pool.get()?)
    }

    /// Run `f` in an immediate transaction, so concurrent writers queue on
    /// the write lock instead of failing to upgrade a read lock.
    fn write<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&SqliteConnection) -> Result<T>,
    {
        let pooled = self.conn()?;
        let conn: &SqliteConnection = &pooled;
        conn.immediate_transaction(|| f(conn))
    }

    fn cached<T, F>(&self, key: &str, compute: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Result<T>,
    {
        get_or_compute(&self.cache, key, Some(self.settings.cache_ttl), compute)
    }

    // catalog foods

    pub fn create_catalog_food(&self, input: FoodInput) -> Result<CatalogFood> {
        let (name, macros) = validate_food(input)?;
        let now = self.clock.now();
        self.write(|conn| {
            let food = query::insert_catalog_food(
                conn,
                &NewCatalogFood {
                    name: &name,
                    proteins: macros.proteins,
                    fats: macros.fats,
                    carbohydrates: macros.carbohydrates,
                    kcal: macros.kcal(),
                    created_at: now,
                    updated_at: now,
                },
            )?;
            bump(conn, EntityKind::CatalogFood, Scope::Global)?;
            Ok(food)
        })
    }

    pub fn update_catalog_food(&self, id: i64, input: FoodInput) -> Result<CatalogFood> {
        let (name, macros) = validate_food(input)?;
        let now = self.clock.now();
        self.write(|conn| {
            let changes = CatalogFoodChanges {
                name: &name,
                proteins: macros.proteins,
                fats: macros.fats,
                carbohydrates: macros.carbohydrates,
                kcal: macros.kcal(),
                updated_at: now,
            };
            if query::update_catalog_food(conn, id, &changes)? == 0 {
                return Err(Error::not_found("catalog food", id));
            }
            bump(conn, EntityKind::CatalogFood, Scope::Global)?;
            query::find_catalog_food(conn, id)?.ok_or_else(|| Error::not_found("catalog food", id))
        })
    }

    /// Freezes the food into every ingredient and consumption record that
    /// references it, then deletes it.
    pub fn delete_catalog_food(&self, id: i64) -> Result<Denormalized> {
        let now = self.clock.now();
        self.write(|conn| {
            let food = query::find_catalog_food(conn, id)?
                .ok_or_else(|| Error::not_found("catalog food", id))?;
            let owners = query::owners_referencing_catalog_food(conn, id)?;
            let rows = denormalize::on_catalog_food_delete(conn, &food, now)?;
            query::delete_catalog_food(conn, id)?;

            bump(conn, EntityKind::CatalogFood, Scope::Global)?;
            for owner_id in owners {
                bump(conn, EntityKind::RecipeIngredient, Scope::Owner(owner_id))?;
                bump(conn, EntityKind::Consumption, Scope::Owner(owner_id))?;
            }
            Ok(rows)
        })
    }

    pub fn get_catalog_food(&self, id: i64) -> Result<CatalogFood> {
        let conn = self.conn()?;
        query::find_catalog_food(&conn, id)?.ok_or_else(|| Error::not_found("catalog food", id))
    }

    pub fn list_catalog_foods(&self) -> Result<Vec<CatalogFood>> {
        let conn = self.conn()?;
        let key = CacheCoherence::new(&*conn).cache_key(
            EntityKind::CatalogFood,
            Scope::Global,
            "all",
        )?;
        self.cached(&key, || query::find_all_catalog_foods(&conn))
    }

    // custom foods

    pub fn create_custom_food(&self, owner_id: i64, input: FoodInput) -> Result<CustomFood> {
        let (name, macros) = validate_food(input)?;
        let now = self.clock.now();
        self.write(|conn| {
            let food = query::insert_custom_food(
                conn,
                &NewCustomFood {
                    owner_id,
                    name: &name,
                    proteins: macros.proteins,
                    fats: macros.fats,
                    carbohydrates: macros.carbohydrates,
                    kcal: macros.kcal(),
                    created_at: now,
                    updated_at: now,
                },
            )?;
            bump(conn, EntityKind::CustomFood, Scope::Owner(owner_id))?;
            Ok(food)
        })
    }

    pub fn update_custom_food(
        &self,
        owner_id: i64,
        id: i64,
        input: FoodInput,
    ) -> Result<CustomFood> {
        let (name, macros) = validate_food(input)?;
        let now = self.clock.now();
        self.write(|conn| {
            owned_custom_food(conn, owner_id, id)?;
            let changes = CustomFoodChanges {
                name: &name,
                proteins: macros.proteins,
                fats: macros.fats,
                carbohydrates: macros.carbohydrates,
                kcal: macros.kcal(),
                updated_at: now,
            };
            query::update_custom_food(conn, id, &changes)?;
            bump(conn, EntityKind::CustomFood, Scope::Owner(owner_id))?;
            owned_custom_food(conn, owner_id, id)
        })
    }

    pub fn delete_custom_food(&self, owner_id: i64, id: i64) -> Result<Denormalized> {
        let now = self.clock.now();
        self.write(|conn| {
            let food = owned_custom_food(conn, owner_id, id)?;
            let rows = denormalize::on_custom_food_delete(conn, &food, now)?;
            query::delete_custom_food(conn, id)?;

            let scope = Scope::Owner(owner_id);
            bump(conn, EntityKind::CustomFood, scope)?;
            if rows.ingredients > 0 {
                bump(conn, EntityKind::RecipeIngredient, scope)?;
            }
            if rows.consumption_records > 0 {
                bump(conn, EntityKind::Consumption, scope)?;
            }
            Ok(rows)
        })
    }

    pub fn get_custom_food(&self, owner_id: i64, id: i64) -> Result<CustomFood> {
        let conn = self.conn()?;
        owned_custom_food(&conn, owner_id, id)
    }

    pub fn list_custom_foods(&self, owner_id: i64) -> Result<Vec<CustomFood>> {
        let conn = self.conn()?;
        let key = CacheCoherence::new(&*conn).cache_key(
            EntityKind::CustomFood,
            Scope::Owner(owner_id),
            "all",
        )?;
        self.cached(&key, || query::find_custom_foods_by_owner(&conn, owner_id))
    }

    // recipes

    /// Create a recipe together with its initial ingredients.
    pub fn create_recipe(
        &self,
        owner_id: i64,
        input: RecipeInput,
        ingredients: Vec<IngredientInput>,
    ) -> Result<Recipe> {
        let name = validate_name(input.name)?;
        let ingredients = ingredients
            .into_iter()
            .map(validate_ingredient)
            .collect::<Result<Vec<_>, _>>()?;
        let now = self.clock.now();
        self.write(|conn| {
            let recipe = query::insert_recipe(
                conn,
                &NewRecipe {
                    owner_id,
                    name: &name,
                    description: &input.description,
                    created_at: now,
                    updated_at: now,
                },
            )?;
            if ingredients.is_empty() && self.settings.recipe_policy == RecipePolicy::RequireIngredients
            {
                return Err(ValidationError::EmptyRecipe(recipe.id).into());
            }
            for ingredient in &ingredients {
                insert_ingredient(conn, &recipe, ingredient, now)?;
            }

            let scope = Scope::Owner(owner_id);
            bump(conn, EntityKind::Recipe, scope)?;
            if !ingredients.is_empty() {
                bump(conn, EntityKind::RecipeIngredient, scope)?;
            }
            Ok(recipe)
        })
    }

    pub fn update_recipe(&self, owner_id: i64, id: i64, input: RecipeInput) -> Result<Recipe> {
        let name = validate_name(input.name)?;
        let now = self.clock.now();
        self.write(|conn| {
            owned_recipe(conn, owner_id, id)?;
            let changes = RecipeChanges {
                name: &name,
                description: &input.description,
                updated_at: now,
            };
            query::update_recipe(conn, id, &changes)?;
            bump(conn, EntityKind::Recipe, Scope::Owner(owner_id))?;
            owned_recipe(conn, owner_id, id)
        })
    }

    /// Freezes the recipe's per-100g profile into the consumption records
    /// that reference it, then deletes it with its ingredients.
    pub fn delete_recipe(&self, owner_id: i64, id: i64) -> Result<Denormalized> {
        let now = self.clock.now();
        self.write(|conn| {
            owned_recipe(conn, owner_id, id)?;
            let loaded = query::load_recipe(conn, id)?.ok_or_else(|| Error::not_found("recipe", id))?;
            let rows = denormalize::on_recipe_delete(conn, &loaded, now)?;
            query::delete_recipe(conn, id)?;

            let scope = Scope::Owner(owner_id);
            bump(conn, EntityKind::Recipe, scope)?;
            if !loaded.ingredients.is_empty() {
                bump(conn, EntityKind::RecipeIngredient, scope)?;
            }
            if rows.consumption_records > 0 {
                bump(conn, EntityKind::Consumption, scope)?;
            }
            Ok(rows)
        })
    }

    pub fn get_recipe(&self, owner_id: i64, id: i64) -> Result<Recipe> {
        let conn = self.conn()?;
        owned_recipe(&conn, owner_id, id)
    }

    pub fn recipe_profile(&self, owner_id: i64, id: i64) -> Result<RecipeProfile> {
        let conn = self.conn()?;
        let key = recipe_key(&conn, owner_id, &format!("profile:{}", id))?;
        self.cached(&key, || {
            owned_recipe(&conn, owner_id, id)?;
            let loaded =
                query::load_recipe(&conn, id)?.ok_or_else(|| Error::not_found("recipe", id))?;
            Ok(loaded.profile())
        })
    }

    pub fn list_recipes(&self, owner_id: i64) -> Result<Vec<RecipeSummary>> {
        let conn = self.conn()?;
        let key = recipe_key(&conn, owner_id, "all")?;
        self.cached(&key, || {
            let recipes = query::find_recipes_by_owner(&conn, owner_id)?;
            Ok(query::load_recipes(&conn, recipes)?
                .into_iter()
                .map(|loaded| RecipeSummary {
                    profile: loaded.profile(),
                    recipe: loaded.recipe,
                })
                .collect())
        })
    }

    pub fn recipe_ingredients(&self, owner_id: i64, id: i64) -> Result<RecipeIngredients> {
        let conn = self.conn()?;
        let key = recipe_key(&conn, owner_id, &format!("ingredients:{}", id))?;
        self.cached(&key, || {
            owned_recipe(&conn, owner_id, id)?;
            let loaded =
                query::load_recipe(&conn, id)?.ok_or_else(|| Error::not_found("recipe", id))?;
            Ok(RecipeIngredients {
                recipe_id: loaded.recipe.id,
                ingredients: ingredient_details(&loaded.ingredients),
                profile: loaded.profile(),
                recipe_name: loaded.recipe.name,
            })
        })
    }

    // recipe ingredients

    pub fn add_ingredient(
        &self,
        owner_id: i64,
        recipe_id: i64,
        input: IngredientInput,
    ) -> Result<RecipeIngredient> {
        let ingredient = validate_ingredient(input)?;
        let now = self.clock.now();
        self.write(|conn| {
            let recipe = query::find_recipe(conn, recipe_id)?
                .ok_or_else(|| Error::not_found("recipe", recipe_id))?;
            if recipe.owner_id != owner_id {
                return Err(ValidationError::OwnerMismatch { recipe_id }.into());
            }
            let row = insert_ingredient(conn, &recipe, &ingredient, now)?;
            bump(conn, EntityKind::RecipeIngredient, Scope::Owner(owner_id))?;
            Ok(row)
        })
    }

    pub fn update_ingredient(
        &self,
        owner_id: i64,
        id: i64,
        input: IngredientInput,
    ) -> Result<RecipeIngredient> {
        let ingredient = validate_ingredient(input)?;
        let now = self.clock.now();
        self.write(|conn| {
            let existing = owned_ingredient(conn, owner_id, id)?;
            check_ingredient_source(conn, owner_id, &ingredient.source)?;

            let source = NutrientSource::from(ingredient.source.clone());
            let columns = SourceColumns::new(&source);
            let changes = RecipeIngredientChanges {
                mass_grams: ingredient.mass_grams,
                catalog_food_id: columns.catalog_food_id,
                custom_food_id: columns.custom_food_id,
                name: columns.name,
                proteins: columns.proteins,
                fats: columns.fats,
                carbohydrates: columns.carbohydrates,
                kcal: columns.kcal,
                updated_at: now,
            };
            query::update_ingredient(conn, existing.id, &changes)?;
            bump(conn, EntityKind::RecipeIngredient, Scope::Owner(owner_id))?;
            owned_ingredient(conn, owner_id, id)
        })
    }

    pub fn remove_ingredient(&self, owner_id: i64, id: i64) -> Result<()> {
        self.write(|conn| {
            let existing = owned_ingredient(conn, owner_id, id)?;
            if self.settings.recipe_policy == RecipePolicy::RequireIngredients
                && query::count_ingredients(conn, existing.recipe_id)? <= 1
            {
                return Err(ValidationError::EmptyRecipe(existing.recipe_id).into());
            }
            query::delete_ingredient(conn, id)?;
            bump(conn, EntityKind::RecipeIngredient, Scope::Owner(owner_id))?;
            Ok(())
        })
    }

    // consumption records

    pub fn record_consumption(
        &self,
        owner_id: i64,
        input: ConsumptionInput,
    ) -> Result<ConsumptionRecord> {
        let now = self.clock.now();
        let input = self.validate_consumption(input, now)?;
        self.write(|conn| {
            check_consumption_source(conn, owner_id, &input.source)?;
            let columns = SourceColumns::new(&input.source);
            let record = query::insert_consumption_record(
                conn,
                &NewConsumptionRecord {
                    owner_id,
                    eaten_at: input.eaten_at,
                    mass_grams: input.mass_grams,
                    catalog_food_id: columns.catalog_food_id,
                    custom_food_id: columns.custom_food_id,
                    recipe_id: columns.recipe_id,
                    name: columns.name,
                    proteins: columns.proteins,
                    fats: columns.fats,
                    carbohydrates: columns.carbohydrates,
                    kcal: columns.kcal,
                    created_at: now,
                    updated_at: now,
                },
            )?;
            bump(conn, EntityKind::Consumption, Scope::Owner(owner_id))?;
            Ok(record)
        })
    }

    pub fn update_consumption(
        &self,
        owner_id: i64,
        id: i64,
        input: ConsumptionInput,
    ) -> Result<ConsumptionRecord> {
        let now = self.clock.now();
        let input = self.validate_consumption(input, now)?;
        self.write(|conn| {
            owned_consumption_record(conn, owner_id, id)?;
            check_consumption_source(conn, owner_id, &input.source)?;
            let columns = SourceColumns::new(&input.source);
            let changes = ConsumptionRecordChanges {
                eaten_at: input.eaten_at,
                mass_grams: input.mass_grams,
                catalog_food_id: columns.catalog_food_id,
                custom_food_id: columns.custom_food_id,
                recipe_id: columns.recipe_id,
                name: columns.name,
                proteins: columns.proteins,
                fats: columns.fats,
                carbohydrates: columns.carbohydrates,
                kcal: columns.kcal,
                updated_at: now,
            };
            query::update_consumption_record(conn, id, &changes)?;
            bump(conn, EntityKind::Consumption, Scope::Owner(owner_id))?;
            owned_consumption_record(conn, owner_id, id)
        })
    }

    pub fn delete_consumption(&self, owner_id: i64, id: i64) -> Result<()> {
        self.write(|conn| {
            owned_consumption_record(conn, owner_id, id)?;
            query::delete_consumption_record(conn, id)?;
            bump(conn, EntityKind::Consumption, Scope::Owner(owner_id))?;
            Ok(())
        })
    }

    pub fn get_consumption_record(&self, owner_id: i64, id: i64) -> Result<ConsumptionRecord> {
        let conn = self.conn()?;
        owned_consumption_record(&conn, owner_id, id)
    }

    /// One record with its nutrition at its mass.
    pub fn consumption_item(&self, owner_id: i64, id: i64) -> Result<ConsumptionItem> {
        let conn = self.conn()?;
        match query::load_consumption_entry(&conn, id)? {
            Some((owner, entry)) if owner == owner_id => {
                let (mut items, _) = consumption::list_with_totals(&[entry]);
                items.pop().ok_or_else(|| Error::not_found("consumption record", id))
            }
            _ => Err(Error::not_found("consumption record", id)),
        }
    }

    /// Itemized records for `day` plus their grand total. Fails with
    /// `NotFound` when nothing was eaten that day.
    pub fn day_report(&self, owner_id: i64, day: NaiveDate) -> Result<DayReport> {
        let conn = self.conn()?;
        let key = consumption_key(&conn, owner_id, &format!("day:{}", day))?;
        self.cached(&key, || {
            let (from, until) = day_bounds(day, day);
            let entries = query::load_consumption_entries(&conn, owner_id, from, until)?;
            if entries.is_empty() {
                return Err(Error::NotFound(format!("consumption records on {}", day)));
            }
            let (items, total) = consumption::list_with_totals(&entries);
            Ok(DayReport { day, items, total })
        })
    }

    /// Sum of the rounded record values eaten on `day`; zero for an empty day.
    pub fn daily_totals(&self, owner_id: i64, day: NaiveDate) -> Result<Nutrition> {
        let conn = self.conn()?;
        let key = consumption_key(&conn, owner_id, &format!("daily:{}", day))?;
        self.cached(&key, || {
            let (from, until) = day_bounds(day, day);
            let entries = query::load_consumption_entries(&conn, owner_id, from, until)?;
            Ok(consumption::daily_totals(&entries, day))
        })
    }

    /// Per-day totals for every day in `[start, end]`. Fails with `NotFound`
    /// when the whole range is empty.
    pub fn range_report(
        &self,
        owner_id: i64,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<BTreeMap<NaiveDate, Nutrition>> {
        if start > end {
            return Err(ValidationError::InvalidRange { start, end }.into());
        }
        let conn = self.conn()?;
        let key = consumption_key(&conn, owner_id, &format!("range:{}:{}", start, end))?;
        self.cached(&key, || {
            let (from, until) = day_bounds(start, end);
            let entries = query::load_consumption_entries(&conn, owner_id, from, until)?;
            if entries.is_empty() {
                return Err(Error::NotFound(format!(
                    "consumption records between {} and {}",
                    start, end
                )));
            }
            Ok(consumption::range_totals(&entries, start, end)?)
        })
    }

    // favorites

    pub fn add_favorite(&self, owner_id: i64, catalog_food_id: i64) -> Result<()> {
        let now = self.clock.now();
        self.write(|conn| {
            query::find_catalog_food(conn, catalog_food_id)?
                .ok_or_else(|| Error::not_found("catalog food", catalog_food_id))?;
            query::insert_favorite(
                conn,
                &NewFavorite {
                    owner_id,
                    catalog_food_id,
                    created_at: now,
                },
            )?;
            bump(conn, EntityKind::Favorite, Scope::Owner(owner_id))?;
            Ok(())
        })
    }

    /// Returns whether the food was a favorite.
    pub fn remove_favorite(&self, owner_id: i64, catalog_food_id: i64) -> Result<bool> {
        self.write(|conn| {
            let removed = query::delete_favorite(conn, owner_id, catalog_food_id)? > 0;
            if removed {
                bump(conn, EntityKind::Favorite, Scope::Owner(owner_id))?;
            }
            Ok(removed)
        })
    }

    pub fn list_favorites(&self, owner_id: i64) -> Result<Vec<CatalogFood>> {
        let conn = self.conn()?;
        let key = CacheCoherence::new(&*conn).dependent_key(
            EntityKind::Favorite,
            Scope::Owner(owner_id),
            &[(EntityKind::CatalogFood, Scope::Global)],
            "all",
        )?;
        self.cached(&key, || query::find_favorite_foods(&conn, owner_id))
    }

    fn validate_consumption(
        &self,
        input: ConsumptionInput,
        now: NaiveDateTime,
    ) -> Result<ConsumptionInput, ValidationError> {
        let mass_grams = validate_mass(input.mass_grams)?;
        if input.eaten_at > now {
            return Err(ValidationError::InvalidDate {
                eaten_at: input.eaten_at,
                reason: "in the future".to_string(),
            });
        }
        let oldest = self
            .settings
            .retention_window()
            .and_then(|window| now.checked_sub_signed(window));
        if matches!(oldest, Some(oldest) if input.eaten_at < oldest) {
            return Err(ValidationError::InvalidDate {
                eaten_at: input.eaten_at,
                reason: format!(
                    "older than {} days",
                    self.settings.max_eaten_food_age_days
                ),
            });
        }
        let source = match input.source {
            NutrientSource::Manual(entry) => NutrientSource::Manual(revalidate(entry)?),
            other => other,
        };
        Ok(ConsumptionInput {
            eaten_at: input.eaten_at,
            mass_grams,
            source,
        })
    }
}

fn bump(conn: &SqliteConnection, entity: EntityKind, scope: Scope) -> Result<()> {
    CacheCoherence::new(conn).bump_for_write(entity, scope)
}

/// Recipe aggregates depend on the owner's ingredients and on every food an
/// ingredient can reference.
fn recipe_key(conn: &SqliteConnection, owner_id: i64, suffix: &str) -> Result<String> {
    let scope = Scope::Owner(owner_id);
    CacheCoherence::new(conn).dependent_key(
        EntityKind::Recipe,
        scope,
        &[
            (EntityKind::RecipeIngredient, scope),
            (EntityKind::CatalogFood, Scope::Global),
            (EntityKind::CustomFood, scope),
        ],
        suffix,
    )
}

fn consumption_key(conn: &SqliteConnection, owner_id: i64, suffix: &str) -> Result<String> {
    let scope = Scope::Owner(owner_id);
    CacheCoherence::new(conn).dependent_key(
        EntityKind::Consumption,
        scope,
        &[
            (EntityKind::Recipe, scope),
            (EntityKind::RecipeIngredient, scope),
            (EntityKind::CatalogFood, Scope::Global),
            (EntityKind::CustomFood, scope),
        ],
        suffix,
    )
}

/// `[start 00:00, end + 1 day 00:00)`, open-ended when `end` is the last
/// representable date.
fn day_bounds(start: NaiveDate, end: NaiveDate) -> (NaiveDateTime, Option<NaiveDateTime>) {
    let from = start.and_time(NaiveTime::MIN);
    let until = end.succ_opt().map(|next| next.and_time(NaiveTime::MIN));
    (from, until)
}

fn validate_food(input: FoodInput) -> Result<(String, Macros), ValidationError> {
    Ok((validate_name(input.name)?, validate_macros(input.macros)?))
}

fn revalidate(entry: ManualEntry) -> Result<ManualEntry, ValidationError> {
    ManualEntry::new(entry.name, entry.macros)
}

fn validate_ingredient(input: IngredientInput) -> Result<IngredientInput, ValidationError> {
    let mass_grams = validate_mass(input.mass_grams)?;
    let source = match input.source {
        IngredientSource::Manual(entry) => IngredientSource::Manual(revalidate(entry)?),
        other => other,
    };
    Ok(IngredientInput { mass_grams, source })
}

fn owned_custom_food(conn: &SqliteConnection, owner_id: i64, id: i64) -> Result<CustomFood> {
    query::find_custom_food(conn, id)?
        .filter(|food| food.owner_id == owner_id)
        .ok_or_else(|| Error::not_found("custom food", id))
}

fn owned_recipe(conn: &SqliteConnection, owner_id: i64, id: i64) -> Result<Recipe> {
    query::find_recipe(conn, id)?
        .filter(|recipe| recipe.owner_id == owner_id)
        .ok_or_else(|| Error::not_found("recipe", id))
}

fn owned_ingredient(conn: &SqliteConnection, owner_id: i64, id: i64) -> Result<RecipeIngredient> {
    query::find_ingredient(conn, id)?
        .filter(|ingredient| ingredient.owner_id == owner_id)
        .ok_or_else(|| Error::not_found("recipe ingredient", id))
}

fn owned_consumption_record(
    conn: &SqliteConnection,
    owner_id: i64,
    id: i64,
) -> Result<ConsumptionRecord> {
    query::find_consumption_record(conn, id)?
        .filter(|record| record.owner_id == owner_id)
        .ok_or_else(|| Error::not_found("consumption record", id))
}

fn check_ingredient_source(
    conn: &SqliteConnection,
    owner_id: i64,
    source: &IngredientSource,
) -> Result<()> {
    match source {
        IngredientSource::Catalog(id) => {
            query::find_catalog_food(conn, *id)?
                .ok_or_else(|| Error::not_found("catalog food", *id))?;
        }
        IngredientSource::Custom(id) => {
            owned_custom_food(conn, owner_id, *id)?;
        }
        IngredientSource::Manual(_) => {}
    }
    Ok(())
}

fn check_consumption_source(
    conn: &SqliteConnection,
    owner_id: i64,
    source: &NutrientSource,
) -> Result<()> {
    match source {
        NutrientSource::Catalog(id) => {
            query::find_catalog_food(conn, *id)?
                .ok_or_else(|| Error::not_found("catalog food", *id))?;
        }
        NutrientSource::Custom(id) => {
            owned_custom_food(conn, owner_id, *id)?;
        }
        NutrientSource::Recipe(id) => {
            owned_recipe(conn, owner_id, *id)?;
            if query::count_ingredients(conn, *id)? == 0 {
                return Err(ValidationError::EmptyRecipe(*id).into());
            }
        }
        NutrientSource::Manual(_) => {}
    }
    Ok(())
}

fn insert_ingredient(
    conn: &SqliteConnection,
    recipe: &Recipe,
    ingredient: &IngredientInput,
    now: NaiveDateTime,
) -> Result<RecipeIngredient> {
    check_ingredient_source(conn, recipe.owner_id, &ingredient.source)?;
    let source = NutrientSource::from(ingredient.source.clone());
    let columns = SourceColumns::new(&source);
    query::insert_ingredient(
        conn,
        &NewRecipeIngredient {
            owner_id: recipe.owner_id,
            recipe_id: recipe.id,
            mass_grams: ingredient.mass_grams,
            catalog_food_id: columns.catalog_food_id,
            custom_food_id: columns.custom_food_id,
            name: columns.name,
            proteins: columns.proteins,
            fats: columns.fats,
            carbohydrates: columns.carbohydrates,
            kcal: columns.kcal,
            created_at: now,
            updated_at: now,
        },
    )
}
