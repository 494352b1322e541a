use std::env;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use chrono::Duration as RetentionWindow;
use log::info;
use thiserror::Error;

pub const DEFAULT_DB_POOL_MAX_SIZE: u32 = 16;
pub const DEFAULT_CACHE_POOL_MAX_OPEN: u32 = 16;
pub const DEFAULT_CACHE_POOL_MIN_IDLE: u32 = 8;
pub const DEFAULT_CACHE_POOL_EXPIRE_SECONDS: u64 = 60;
pub const DEFAULT_CACHE_TTL_SECONDS: u64 = 300;
pub const DEFAULT_MAX_EATEN_FOOD_AGE_DAYS: i64 = 30;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("invalid {key} value {value:?}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Whether a recipe may exist without ingredients.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RecipePolicy {
    #[default]
    AllowEmpty,
    /// Recipes are created with at least one ingredient and keep at least
    /// one.
    RequireIngredients,
}

impl FromStr for RecipePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "allow" => Ok(RecipePolicy::AllowEmpty),
            "reject" => Ok(RecipePolicy::RequireIngredients),
            other => Err(format!("expected `allow` or `reject`, got `{}`", other)),
        }
    }
}

/// What the tracker needs at runtime.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub cache_ttl: Duration,
    pub max_eaten_food_age_days: i64,
    pub recipe_policy: RecipePolicy,
}

impl Settings {
    /// `None` when the window is too long to represent.
    pub fn retention_window(&self) -> Option<RetentionWindow> {
        RetentionWindow::try_days(self.max_eaten_food_age_days)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECONDS),
            max_eaten_food_age_days: DEFAULT_MAX_EATEN_FOOD_AGE_DAYS,
            recipe_policy: RecipePolicy::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub database_url: String,
    pub db_pool_max_size: u32,
    /// `None` keeps the cache in process.
    pub redis_url: Option<String>,
    pub cache_pool_max_open: u32,
    pub cache_pool_min_idle: u32,
    pub cache_pool_expire: Duration,
    pub settings: Settings,
}

impl Config {
    /// Read the process environment, after loading `.env` if there is one.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;
        let max_eaten_food_age_days = try_load(
            &lookup,
            "MAX_EATEN_FOOD_AGE_DAYS",
            DEFAULT_MAX_EATEN_FOOD_AGE_DAYS,
        )?;
        let invalid_age = |reason: &str| ConfigError::Invalid {
            key: "MAX_EATEN_FOOD_AGE_DAYS",
            value: max_eaten_food_age_days.to_string(),
            reason: reason.to_string(),
        };
        if max_eaten_food_age_days < 0 {
            return Err(invalid_age("must not be negative"));
        }
        if RetentionWindow::try_days(max_eaten_food_age_days).is_none() {
            return Err(invalid_age("too many days"));
        }

        Ok(Self {
            database_url,
            db_pool_max_size: try_load(&lookup, "DB_POOL_MAX_SIZE", DEFAULT_DB_POOL_MAX_SIZE)?,
            redis_url: lookup("REDIS_URL").filter(|url| !url.trim().is_empty()),
            cache_pool_max_open: try_load(
                &lookup,
                "CACHE_POOL_MAX_OPEN",
                DEFAULT_CACHE_POOL_MAX_OPEN,
            )?,
            cache_pool_min_idle: try_load(
                &lookup,
                "CACHE_POOL_MIN_IDLE",
                DEFAULT_CACHE_POOL_MIN_IDLE,
            )?,
            cache_pool_expire: Duration::from_secs(try_load(
                &lookup,
                "CACHE_POOL_EXPIRE_SECONDS",
                DEFAULT_CACHE_POOL_EXPIRE_SECONDS,
            )?),
            settings: Settings {
                cache_ttl: Duration::from_secs(try_load(
                    &lookup,
                    "CACHE_TTL_SECONDS",
                    DEFAULT_CACHE_TTL_SECONDS,
                )?),
                max_eaten_food_age_days,
                recipe_policy: try_load(&lookup, "RECIPE_EMPTY_POLICY", RecipePolicy::default())?,
            },
        })
    }
}

fn try_load<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: Display,
{
    match lookup(key) {
        None => {
            info!("{} not set, using default", key);
            Ok(default)
        }
        Some(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            reason: e.to_string(),
            value,
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[("DATABASE_URL", "nutrition.db")])).unwrap();
        assert_eq!(config.database_url, "nutrition.db");
        assert_eq!(config.db_pool_max_size, 16);
        assert_eq!(config.redis_url, None);
        assert_eq!(config.cache_pool_max_open, 16);
        assert_eq!(config.cache_pool_min_idle, 8);
        assert_eq!(config.cache_pool_expire, Duration::from_secs(60));
        assert_eq!(config.settings, Settings::default());
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "nutrition.db"),
            ("REDIS_URL", "redis://127.0.0.1/"),
            ("CACHE_TTL_SECONDS", "10"),
            ("MAX_EATEN_FOOD_AGE_DAYS", "7"),
            ("RECIPE_EMPTY_POLICY", "reject"),
        ]))
        .unwrap();
        assert_eq!(config.redis_url.as_deref(), Some("redis://127.0.0.1/"));
        assert_eq!(config.settings.cache_ttl, Duration::from_secs(10));
        assert_eq!(config.settings.retention_window(), Some(RetentionWindow::days(7)));
        assert_eq!(
            config.settings.recipe_policy,
            RecipePolicy::RequireIngredients
        );
    }

    #[test]
    fn test_missing_database_url() {
        assert_eq!(
            Config::from_lookup(lookup(&[])),
            Err(ConfigError::Missing("DATABASE_URL"))
        );
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            Config::from_lookup(lookup(&[
                ("DATABASE_URL", "nutrition.db"),
                ("DB_POOL_MAX_SIZE", "many"),
            ])),
            Err(ConfigError::Invalid {
                key: "DB_POOL_MAX_SIZE",
                ..
            })
        ));
        assert!(matches!(
            Config::from_lookup(lookup(&[
                ("DATABASE_URL", "nutrition.db"),
                ("RECIPE_EMPTY_POLICY", "sometimes"),
            ])),
            Err(ConfigError::Invalid {
                key: "RECIPE_EMPTY_POLICY",
                ..
            })
        ));
        assert!(matches!(
            Config::from_lookup(lookup(&[
                ("DATABASE_URL", "nutrition.db"),
                ("MAX_EATEN_FOOD_AGE_DAYS", "-1"),
            ])),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn test_retention_window_must_fit() {
        assert_eq!(
            Config::from_lookup(lookup(&[
                ("DATABASE_URL", "nutrition.db"),
                ("MAX_EATEN_FOOD_AGE_DAYS", "9223372036854775807"),
            ])),
            Err(ConfigError::Invalid {
                key: "MAX_EATEN_FOOD_AGE_DAYS",
                value: "9223372036854775807".to_string(),
                reason: "too many days".to_string(),
            })
        );

        let settings = Settings {
            max_eaten_food_age_days: i64::MAX,
            ..Settings::default()
        };
        assert_eq!(settings.retention_window(), None);
    }
}
