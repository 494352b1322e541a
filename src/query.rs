//! Diesel data access. Every function takes the connection it runs on, so
//! callers decide the transaction boundary.

use std::collections::{BTreeSet, HashMap};

use chrono::NaiveDateTime;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;

use crate::cache::GenerationStore;
use crate::consumption::ConsumptionEntry;
use crate::denormalize::Snapshot;
use crate::error::Result;
use crate::models::{
    CatalogFood, CatalogFoodChanges, ConsumptionRecord, ConsumptionRecordChanges, CustomFood,
    CustomFoodChanges, NewCatalogFood, NewConsumptionRecord, NewCustomFood, NewFavorite,
    NewRecipe, NewRecipeIngredient, Recipe, RecipeChanges, RecipeIngredient,
    RecipeIngredientChanges,
};
use crate::recipe::{IngredientEntry, LoadedRecipe};
use crate::schema::{
    cache_generations, catalog_foods, consumption_records, custom_foods, favorites,
    recipe_ingredients, recipes,
};

no_arg_sql_function!(
    last_insert_rowid,
    diesel::sql_types::BigInt,
    "Id of the row most recently inserted on this connection"
);

fn inserted_id(conn: &SqliteConnection) -> QueryResult<i64> {
    diesel::select(last_insert_rowid).get_result(conn)
}

// catalog foods

pub(crate) fn insert_catalog_food(
    conn: &SqliteConnection,
    food: &NewCatalogFood,
) -> Result<CatalogFood> {
    diesel::insert_into(catalog_foods::table)
        .values(food)
        .execute(conn)?;
    let id = inserted_id(conn)?;
    Ok(catalog_foods::table.find(id).first(conn)?)
}

pub(crate) fn find_catalog_food(conn: &SqliteConnection, id: i64) -> Result<Option<CatalogFood>> {
    Ok(catalog_foods::table.find(id).first(conn).optional()?)
}

pub(crate) fn find_all_catalog_foods(conn: &SqliteConnection) -> Result<Vec<CatalogFood>> {
    Ok(catalog_foods::table
        .order(catalog_foods::name.asc())
        .load(conn)?)
}

pub(crate) fn update_catalog_food(
    conn: &SqliteConnection,
    id: i64,
    changes: &CatalogFoodChanges,
) -> Result<usize> {
    Ok(diesel::update(catalog_foods::table.find(id))
        .set(changes)
        .execute(conn)?)
}

pub(crate) fn delete_catalog_food(conn: &SqliteConnection, id: i64) -> Result<usize> {
    Ok(diesel::delete(catalog_foods::table.find(id)).execute(conn)?)
}

// custom foods

pub(crate) fn insert_custom_food(
    conn: &SqliteConnection,
    food: &NewCustomFood,
) -> Result<CustomFood> {
    diesel::insert_into(custom_foods::table)
        .values(food)
        .execute(conn)?;
    let id = inserted_id(conn)?;
    Ok(custom_foods::table.find(id).first(conn)?)
}

pub(crate) fn find_custom_food(conn: &SqliteConnection, id: i64) -> Result<Option<CustomFood>> {
    Ok(custom_foods::table.find(id).first(conn).optional()?)
}

pub(crate) fn find_custom_foods_by_owner(
    conn: &SqliteConnection,
    owner_id: i64,
) -> Result<Vec<CustomFood>> {
    Ok(custom_foods::table
        .filter(custom_foods::owner_id.eq(owner_id))
        .order(custom_foods::name.asc())
        .load(conn)?)
}

pub(crate) fn update_custom_food(
    conn: &SqliteConnection,
    id: i64,
    changes: &CustomFoodChanges,
) -> Result<usize> {
    Ok(diesel::update(custom_foods::table.find(id))
        .set(changes)
        .execute(conn)?)
}

pub(crate) fn delete_custom_food(conn: &SqliteConnection, id: i64) -> Result<usize> {
    Ok(diesel::delete(custom_foods::table.find(id)).execute(conn)?)
}

// recipes

pub(crate) fn insert_recipe(conn: &SqliteConnection, recipe: &NewRecipe) -> Result<Recipe> {
    diesel::insert_into(recipes::table)
        .values(recipe)
        .execute(conn)?;
    let id = inserted_id(conn)?;
    Ok(recipes::table.find(id).first(conn)?)
}

pub(crate) fn find_recipe(conn: &SqliteConnection, id: i64) -> Result<Option<Recipe>> {
    Ok(recipes::table.find(id).first(conn).optional()?)
}

pub(crate) fn find_recipes_by_owner(conn: &SqliteConnection, owner_id: i64) -> Result<Vec<Recipe>> {
    Ok(recipes::table
        .filter(recipes::owner_id.eq(owner_id))
        .order(recipes::id.asc())
        .load(conn)?)
}

pub(crate) fn update_recipe(
    conn: &SqliteConnection,
    id: i64,
    changes: &RecipeChanges,
) -> Result<usize> {
    Ok(diesel::update(recipes::table.find(id))
        .set(changes)
        .execute(conn)?)
}

pub(crate) fn delete_recipe(conn: &SqliteConnection, id: i64) -> Result<usize> {
    Ok(diesel::delete(recipes::table.find(id)).execute(conn)?)
}

// recipe ingredients

pub(crate) fn insert_ingredient(
    conn: &SqliteConnection,
    ingredient: &NewRecipeIngredient,
) -> Result<RecipeIngredient> {
    diesel::insert_into(recipe_ingredients::table)
        .values(ingredient)
        .execute(conn)?;
    let id = inserted_id(conn)?;
    Ok(recipe_ingredients::table.find(id).first(conn)?)
}

pub(crate) fn find_ingredient(
    conn: &SqliteConnection,
    id: i64,
) -> Result<Option<RecipeIngredient>> {
    Ok(recipe_ingredients::table.find(id).first(conn).optional()?)
}

pub(crate) fn update_ingredient(
    conn: &SqliteConnection,
    id: i64,
    changes: &RecipeIngredientChanges,
) -> Result<usize> {
    Ok(diesel::update(recipe_ingredients::table.find(id))
        .set(changes)
        .execute(conn)?)
}

pub(crate) fn delete_ingredient(conn: &SqliteConnection, id: i64) -> Result<usize> {
    Ok(diesel::delete(recipe_ingredients::table.find(id)).execute(conn)?)
}

pub(crate) fn count_ingredients(conn: &SqliteConnection, recipe_id: i64) -> Result<i64> {
    Ok(recipe_ingredients::table
        .filter(recipe_ingredients::recipe_id.eq(recipe_id))
        .count()
        .get_result(conn)?)
}

/// Ingredients of `recipe_ids` with their catalog or custom food joined in,
/// grouped by recipe.
fn load_ingredient_entries(
    conn: &SqliteConnection,
    recipe_ids: &[i64],
) -> Result<HashMap<i64, Vec<IngredientEntry>>> {
    let rows = recipe_ingredients::table
        .left_join(catalog_foods::table)
        .left_join(custom_foods::table)
        .filter(recipe_ingredients::recipe_id.eq_any(recipe_ids))
        .order(recipe_ingredients::id.asc())
        .load::<(RecipeIngredient, Option<CatalogFood>, Option<CustomFood>)>(conn)?;

    let mut grouped: HashMap<i64, Vec<IngredientEntry>> = HashMap::new();
    for (row, catalog, custom) in rows {
        let recipe_id = row.recipe_id;
        let entry = IngredientEntry::from_row(row, catalog, custom)?;
        grouped.entry(recipe_id).or_default().push(entry);
    }
    Ok(grouped)
}

/// Attach ingredients to already-fetched recipes, in one query.
pub(crate) fn load_recipes(
    conn: &SqliteConnection,
    recipes: Vec<Recipe>,
) -> Result<Vec<LoadedRecipe>> {
    let ids: Vec<i64> = recipes.iter().map(|recipe| recipe.id).collect();
    let mut ingredients = load_ingredient_entries(conn, &ids)?;
    Ok(recipes
        .into_iter()
        .map(|recipe| LoadedRecipe {
            ingredients: ingredients.remove(&recipe.id).unwrap_or_default(),
            recipe,
        })
        .collect())
}

pub(crate) fn load_recipe(conn: &SqliteConnection, id: i64) -> Result<Option<LoadedRecipe>> {
    match find_recipe(conn, id)? {
        None => Ok(None),
        Some(recipe) => Ok(load_recipes(conn, vec![recipe])?.pop()),
    }
}

// consumption records

pub(crate) fn insert_consumption_record(
    conn: &SqliteConnection,
    record: &NewConsumptionRecord,
) -> Result<ConsumptionRecord> {
    diesel::insert_into(consumption_records::table)
        .values(record)
        .execute(conn)?;
    let id = inserted_id(conn)?;
    Ok(consumption_records::table.find(id).first(conn)?)
}

pub(crate) fn find_consumption_record(
    conn: &SqliteConnection,
    id: i64,
) -> Result<Option<ConsumptionRecord>> {
    Ok(consumption_records::table.find(id).first(conn).optional()?)
}

pub(crate) fn update_consumption_record(
    conn: &SqliteConnection,
    id: i64,
    changes: &ConsumptionRecordChanges,
) -> Result<usize> {
    Ok(diesel::update(consumption_records::table.find(id))
        .set(changes)
        .execute(conn)?)
}

pub(crate) fn delete_consumption_record(conn: &SqliteConnection, id: i64) -> Result<usize> {
    Ok(diesel::delete(consumption_records::table.find(id)).execute(conn)?)
}

type ConsumptionRow = (ConsumptionRecord, Option<CatalogFood>, Option<CustomFood>);

/// Resolve joined consumption rows, loading every referenced recipe with its
/// ingredients in two queries.
fn resolve_consumption_rows(
    conn: &SqliteConnection,
    rows: Vec<ConsumptionRow>,
) -> Result<Vec<ConsumptionEntry>> {
    let recipe_ids: Vec<i64> = rows
        .iter()
        .filter_map(|(row, _, _)| row.recipe_id)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let mut loaded: HashMap<i64, LoadedRecipe> = HashMap::new();
    if !recipe_ids.is_empty() {
        let found = recipes::table
            .filter(recipes::id.eq_any(&recipe_ids))
            .load::<Recipe>(conn)?;
        for recipe in load_recipes(conn, found)? {
            loaded.insert(recipe.recipe.id, recipe);
        }
    }

    rows.into_iter()
        .map(|(row, catalog, custom)| {
            let recipe = row.recipe_id.and_then(|id| loaded.get(&id).cloned());
            ConsumptionEntry::from_row(row, catalog, custom, recipe)
        })
        .collect()
}

/// An owner's records eaten in `[from, until)`, resolved against their
/// sources, oldest first. `until: None` leaves the range open-ended.
pub(crate) fn load_consumption_entries(
    conn: &SqliteConnection,
    owner_id: i64,
    from: NaiveDateTime,
    until: Option<NaiveDateTime>,
) -> Result<Vec<ConsumptionEntry>> {
    let mut query = consumption_records::table
        .left_join(catalog_foods::table)
        .left_join(custom_foods::table)
        .filter(consumption_records::owner_id.eq(owner_id))
        .filter(consumption_records::eaten_at.ge(from))
        .into_boxed();
    if let Some(until) = until {
        query = query.filter(consumption_records::eaten_at.lt(until));
    }
    let rows = query
        .order((
            consumption_records::eaten_at.asc(),
            consumption_records::id.asc(),
        ))
        .load::<ConsumptionRow>(conn)?;
    resolve_consumption_rows(conn, rows)
}

pub(crate) fn load_consumption_entry(
    conn: &SqliteConnection,
    id: i64,
) -> Result<Option<(i64, ConsumptionEntry)>> {
    let rows = consumption_records::table
        .left_join(catalog_foods::table)
        .left_join(custom_foods::table)
        .filter(consumption_records::id.eq(id))
        .load::<ConsumptionRow>(conn)?;
    let owner_id = match rows.first() {
        None => return Ok(None),
        Some((row, _, _)) => row.owner_id,
    };
    Ok(resolve_consumption_rows(conn, rows)?
        .pop()
        .map(|entry| (owner_id, entry)))
}

// favorites

pub(crate) fn insert_favorite(conn: &SqliteConnection, favorite: &NewFavorite) -> Result<()> {
    diesel::insert_into(favorites::table)
        .values(favorite)
        .execute(conn)?;
    Ok(())
}

pub(crate) fn delete_favorite(
    conn: &SqliteConnection,
    owner_id: i64,
    catalog_food_id: i64,
) -> Result<usize> {
    Ok(diesel::delete(
        favorites::table
            .filter(favorites::owner_id.eq(owner_id))
            .filter(favorites::catalog_food_id.eq(catalog_food_id)),
    )
    .execute(conn)?)
}

pub(crate) fn find_favorite_foods(
    conn: &SqliteConnection,
    owner_id: i64,
) -> Result<Vec<CatalogFood>> {
    Ok(favorites::table
        .inner_join(catalog_foods::table)
        .filter(favorites::owner_id.eq(owner_id))
        .order(catalog_foods::name.asc())
        .select(catalog_foods::all_columns)
        .load(conn)?)
}

/// Owners whose ingredients or consumption records reference a catalog
/// food, i.e. whose cached aggregates a delete of it rewrites.
pub(crate) fn owners_referencing_catalog_food(
    conn: &SqliteConnection,
    food_id: i64,
) -> Result<BTreeSet<i64>> {
    let mut owners: BTreeSet<i64> = recipe_ingredients::table
        .filter(recipe_ingredients::catalog_food_id.eq(food_id))
        .select(recipe_ingredients::owner_id)
        .distinct()
        .load::<i64>(conn)?
        .into_iter()
        .collect();
    owners.extend(
        consumption_records::table
            .filter(consumption_records::catalog_food_id.eq(food_id))
            .select(consumption_records::owner_id)
            .distinct()
            .load::<i64>(conn)?,
    );
    Ok(owners)
}

// denormalization bulk updates
//
// Each one writes the snapshot into the manual columns and nulls the
// structured reference in a single statement, so no row is ever observed
// with zero sources.

pub(crate) fn freeze_ingredients_of_catalog_food(
    conn: &SqliteConnection,
    food_id: i64,
    snapshot: &Snapshot,
    now: NaiveDateTime,
) -> Result<usize> {
    use crate::schema::recipe_ingredients::dsl::*;

    Ok(diesel::update(recipe_ingredients.filter(catalog_food_id.eq(food_id)))
        .set((
            catalog_food_id.eq(None::<i64>),
            name.eq(Some(snapshot.name.as_str())),
            proteins.eq(Some(snapshot.proteins)),
            fats.eq(Some(snapshot.fats)),
            carbohydrates.eq(Some(snapshot.carbohydrates)),
            kcal.eq(Some(snapshot.kcal)),
            updated_at.eq(now),
        ))
        .execute(conn)?)
}

pub(crate) fn freeze_ingredients_of_custom_food(
    conn: &SqliteConnection,
    food_id: i64,
    snapshot: &Snapshot,
    now: NaiveDateTime,
) -> Result<usize> {
    use crate::schema::recipe_ingredients::dsl::*;

    Ok(diesel::update(recipe_ingredients.filter(custom_food_id.eq(food_id)))
        .set((
            custom_food_id.eq(None::<i64>),
            name.eq(Some(snapshot.name.as_str())),
            proteins.eq(Some(snapshot.proteins)),
            fats.eq(Some(snapshot.fats)),
            carbohydrates.eq(Some(snapshot.carbohydrates)),
            kcal.eq(Some(snapshot.kcal)),
            updated_at.eq(now),
        ))
        .execute(conn)?)
}

pub(crate) fn freeze_records_of_catalog_food(
    conn: &SqliteConnection,
    food_id: i64,
    snapshot: &Snapshot,
    now: NaiveDateTime,
) -> Result<usize> {
    use crate::schema::consumption_records::dsl::*;

    Ok(diesel::update(consumption_records.filter(catalog_food_id.eq(food_id)))
        .set((
            catalog_food_id.eq(None::<i64>),
            name.eq(Some(snapshot.name.as_str())),
            proteins.eq(Some(snapshot.proteins)),
            fats.eq(Some(snapshot.fats)),
            carbohydrates.eq(Some(snapshot.carbohydrates)),
            kcal.eq(Some(snapshot.kcal)),
            updated_at.eq(now),
        ))
        .execute(conn)?)
}

pub(crate) fn freeze_records_of_custom_food(
    conn: &SqliteConnection,
    food_id: i64,
    snapshot: &Snapshot,
    now: NaiveDateTime,
) -> Result<usize> {
    use crate::schema::consumption_records::dsl::*;

    Ok(diesel::update(consumption_records.filter(custom_food_id.eq(food_id)))
        .set((
            custom_food_id.eq(None::<i64>),
            name.eq(Some(snapshot.name.as_str())),
            proteins.eq(Some(snapshot.proteins)),
            fats.eq(Some(snapshot.fats)),
            carbohydrates.eq(Some(snapshot.carbohydrates)),
            kcal.eq(Some(snapshot.kcal)),
            updated_at.eq(now),
        ))
        .execute(conn)?)
}

pub(crate) fn freeze_records_of_recipe(
    conn: &SqliteConnection,
    source_recipe_id: i64,
    snapshot: &Snapshot,
    now: NaiveDateTime,
) -> Result<usize> {
    use crate::schema::consumption_records::dsl::*;

    Ok(diesel::update(consumption_records.filter(recipe_id.eq(source_recipe_id)))
        .set((
            recipe_id.eq(None::<i64>),
            name.eq(Some(snapshot.name.as_str())),
            proteins.eq(Some(snapshot.proteins)),
            fats.eq(Some(snapshot.fats)),
            carbohydrates.eq(Some(snapshot.carbohydrates)),
            kcal.eq(Some(snapshot.kcal)),
            updated_at.eq(now),
        ))
        .execute(conn)?)
}

// cache generations

fn read_generation(conn: &SqliteConnection, key: &str) -> QueryResult<Option<i64>> {
    cache_generations::table
        .find(key)
        .select(cache_generations::generation)
        .first(conn)
        .optional()
}

fn ensure_generation(conn: &SqliteConnection, key: &str) -> QueryResult<usize> {
    diesel::insert_or_ignore_into(cache_generations::table)
        .values((
            cache_generations::key.eq(key),
            cache_generations::generation.eq(1_i64),
        ))
        .execute(conn)
}

/// Counters live next to the data, so a bump made inside a write
/// transaction commits or rolls back with it.
impl GenerationStore for SqliteConnection {
    fn generation(&self, key: &str) -> Result<u64> {
        if let Some(generation) = read_generation(self, key)? {
            return Ok(generation as u64);
        }
        ensure_generation(self, key)?;
        Ok(read_generation(self, key)?.unwrap_or(1) as u64)
    }

    fn increment(&self, key: &str) -> Result<u64> {
        self.transaction::<_, diesel::result::Error, _>(|| {
            ensure_generation(self, key)?;
            diesel::update(cache_generations::table.find(key))
                .set(cache_generations::generation.eq(cache_generations::generation + 1))
                .execute(self)?;
            cache_generations::table
                .find(key)
                .select(cache_generations::generation)
                .first::<i64>(self)
        })
        .map(|generation| generation as u64)
        .map_err(Into::into)
    }
}
