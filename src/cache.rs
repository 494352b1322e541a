//! Generation-versioned cache keys.
//!
//! Every `(entity kind, owner scope)` pair has a counter. Cache keys embed
//! the counter, so bumping it makes every key built before the bump
//! unreachable; stale values are left to the cache store's own expiry and are
//! never deleted explicitly.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use log::debug;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use crate::error::Result;
use crate::models::{from_u8, to_u8};

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend unavailable: circuit breaker is open")]
    Unavailable,

    #[error("cache pool error: {0}")]
    Pool(#[from] r2d2_redis::r2d2::Error),

    #[error("redis error: {0}")]
    Redis(#[from] r2d2_redis::redis::RedisError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKind {
    CatalogFood,
    CustomFood,
    Recipe,
    RecipeIngredient,
    Consumption,
    Favorite,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::CatalogFood => "catalog_food",
            EntityKind::CustomFood => "custom_food",
            EntityKind::Recipe => "recipe",
            EntityKind::RecipeIngredient => "recipe_ingredient",
            EntityKind::Consumption => "consumption",
            EntityKind::Favorite => "favorite",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whose copy of an entity kind a counter versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Scope {
    Global,
    Owner(i64),
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Global => f.write_str("global"),
            Scope::Owner(id) => write!(f, "{}", id),
        }
    }
}

pub fn generation_key(entity: EntityKind, scope: Scope) -> String {
    format!("cache_version:{}:{}", entity, scope)
}

/// Atomic per-key counters backing [`CacheCoherence`].
pub trait GenerationStore {
    /// Current value, created as 1 on first access.
    fn generation(&self, key: &str) -> Result<u64>;

    /// Atomically add one and return the new value. A missing counter counts
    /// as 1 before the increment.
    fn increment(&self, key: &str) -> Result<u64>;
}

impl<T: GenerationStore + ?Sized> GenerationStore for &T {
    fn generation(&self, key: &str) -> Result<u64> {
        (**self).generation(key)
    }

    fn increment(&self, key: &str) -> Result<u64> {
        (**self).increment(key)
    }
}

pub struct CacheCoherence<G> {
    generations: G,
}

impl<G: GenerationStore> CacheCoherence<G> {
    pub fn new(generations: G) -> Self {
        Self { generations }
    }

    pub fn current_generation(&self, entity: EntityKind, scope: Scope) -> Result<u64> {
        self.generations.generation(&generation_key(entity, scope))
    }

    pub fn bump(&self, entity: EntityKind, scope: Scope) -> Result<u64> {
        let generation = self.generations.increment(&generation_key(entity, scope))?;
        debug!("bumped {}:{} to v{}", entity, scope, generation);
        Ok(generation)
    }

    /// `entity:scope:v{generation}:suffix`
    pub fn cache_key(&self, entity: EntityKind, scope: Scope, suffix: &str) -> Result<String> {
        let generation = self.current_generation(entity, scope)?;
        Ok(format!("{}:{}:v{}:{}", entity, scope, generation, suffix))
    }

    /// Like [`cache_key`](Self::cache_key) for values that also depend on
    /// other entity kinds: each dependency's generation is appended, so a
    /// bump on any of them also retires the key.
    pub fn dependent_key(
        &self,
        entity: EntityKind,
        scope: Scope,
        dependencies: &[(EntityKind, Scope)],
        suffix: &str,
    ) -> Result<String> {
        let mut suffix = suffix.to_string();
        for (dependency, dependency_scope) in dependencies {
            let generation = self.current_generation(*dependency, *dependency_scope)?;
            suffix.push_str(&format!(
                ":{}@{}=v{}",
                dependency, dependency_scope, generation
            ));
        }
        self.cache_key(entity, scope, &suffix)
    }

    /// Bump everything a write to `entity` invalidates. Ingredient writes
    /// also retire the owning recipe's aggregates.
    pub fn bump_for_write(&self, entity: EntityKind, scope: Scope) -> Result<()> {
        self.bump(entity, scope)?;
        if entity == EntityKind::RecipeIngredient {
            self.bump(EntityKind::Recipe, scope)?;
        }
        Ok(())
    }
}

/// In-process counters.
#[derive(Debug, Default)]
pub struct MemoryGenerations {
    counters: DashMap<String, u64>,
}

impl MemoryGenerations {
    pub fn new() -> Self {
        Self::default()
    }
}

impl GenerationStore for MemoryGenerations {
    fn generation(&self, key: &str) -> Result<u64> {
        Ok(*self.counters.entry(key.to_string()).or_insert(1))
    }

    fn increment(&self, key: &str) -> Result<u64> {
        // the entry guard holds the shard lock across read-modify-write
        let mut counter = self.counters.entry(key.to_string()).or_insert(1);
        *counter += 1;
        Ok(*counter)
    }
}

/// Key/value store with its own expiry. Values are never deleted by the
/// crate.
pub trait CacheStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<(), CacheError>;
}

impl<T: CacheStore + ?Sized> CacheStore for Box<T> {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<(), CacheError> {
        (**self).set(key, value, ttl)
    }
}

impl<T: CacheStore + ?Sized> CacheStore for Arc<T> {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<(), CacheError> {
        (**self).set(key, value, ttl)
    }
}

fn is_expired(expires_at: Option<Instant>) -> bool {
    expires_at.map_or(false, |expires_at| Instant::now() >= expires_at)
}

/// In-process cache with per-entry expiry.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: DashMap<String, (Vec<u8>, Option<Instant>)>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl CacheStore for MemoryCache {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        // expiry is decided under the shard lock
        self.entries
            .remove_if(key, |_, (_, expires_at)| is_expired(*expires_at));
        Ok(self
            .entries
            .get(key)
            .filter(|entry| !is_expired(entry.1))
            .map(|entry| entry.0.clone()))
    }

    fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<(), CacheError> {
        let expires_at = ttl.map(|ttl| Instant::now() + ttl);
        self.entries
            .insert(key.to_string(), (value.to_vec(), expires_at));
        Ok(())
    }
}

/// Cache-aside read: decode the value under `key`, or compute, store and
/// return it.
pub fn get_or_compute<C, T, F>(cache: &C, key: &str, ttl: Option<Duration>, compute: F) -> Result<T>
where
    C: CacheStore + ?Sized,
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Result<T>,
{
    if let Some(bytes) = cache.get(key)? {
        debug!("cache hit {}", key);
        return Ok(from_u8(&bytes)?);
    }
    debug!("cache miss {}", key);
    let value = compute()?;
    cache.set(key, &to_u8(&value)?, ttl)?;
    Ok(value)
}
