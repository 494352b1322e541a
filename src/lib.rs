//! Nutrition composition and cache-coherence engine.
//!
//! Foods come from a shared catalog, an owner's custom foods, a recipe built
//! from ingredients, or a one-off manual entry. [`tracker::Tracker`] is the
//! entry point: it validates and persists writes, freezes nutrient data into
//! dependents before a source is deleted, and serves cached aggregates under
//! generation-versioned keys.

#[macro_use]
extern crate diesel;

pub mod cache;
pub mod clock;
pub mod config;
pub mod consumption;
pub mod database;
pub mod denormalize;
pub mod error;
pub mod models;
pub mod nutrition;
mod query;
pub mod recipe;
pub mod redis_cache;
pub mod schema;
pub mod source;
pub mod tracker;

pub use crate::cache::{CacheCoherence, CacheStore, EntityKind, MemoryCache, Scope};
pub use crate::clock::{Clock, FixedClock, SystemClock};
pub use crate::config::{Config, RecipePolicy, Settings};
pub use crate::error::{Error, ErrorKind, Result, ValidationError};
pub use crate::models::{ConsumptionInput, FoodInput, IngredientInput, RecipeInput};
pub use crate::nutrition::{Macros, Nutrition};
pub use crate::source::{IngredientSource, ManualEntry, NutrientSource, SourceKind};
pub use crate::tracker::Tracker;
