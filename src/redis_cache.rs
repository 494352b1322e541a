//! Redis-backed [`CacheStore`].

use std::ops::DerefMut;
use std::time::Duration;

use failsafe::backoff::EqualJittered;
use failsafe::failure_policy::{ConsecutiveFailures, OrElse, SuccessRateOverTimeWindow};
use failsafe::{CircuitBreaker, StateMachine};
use log::warn;
use r2d2_redis::r2d2;
use r2d2_redis::redis::Commands;
use r2d2_redis::RedisConnectionManager;

use crate::cache::{CacheError, CacheStore};
use crate::config::Config;

pub type RedisPool = r2d2::Pool<RedisConnectionManager>;

pub type CircuitBreakerType = StateMachine<
    OrElse<SuccessRateOverTimeWindow<EqualJittered>, ConsecutiveFailures<EqualJittered>>,
    (),
>;

/// Every redis round trip goes through the breaker; once it opens, calls
/// fail fast with [`CacheError::Unavailable`] instead of waiting on a dead
/// server.
pub struct RedisCache {
    pool: RedisPool,
    circuit_breaker: CircuitBreakerType,
}

impl RedisCache {
    pub fn new(redis_url: &str, config: &Config) -> Result<Self, CacheError> {
        let manager = RedisConnectionManager::new(redis_url)?;
        let pool = r2d2::Pool::builder()
            .max_size(config.cache_pool_max_open)
            .max_lifetime(Some(config.cache_pool_expire))
            .min_idle(Some(config.cache_pool_min_idle))
            .build(manager)?;
        Ok(Self::from_pool(pool))
    }

    pub fn from_pool(pool: RedisPool) -> Self {
        Self {
            pool,
            circuit_breaker: failsafe::Config::new().build(),
        }
    }

    fn guarded<T, F>(&self, f: F) -> Result<T, CacheError>
    where
        F: FnOnce() -> Result<T, CacheError>,
    {
        match self.circuit_breaker.call(f) {
            Ok(value) => Ok(value),
            Err(failsafe::Error::Inner(err)) => Err(err),
            Err(failsafe::Error::Rejected) => {
                warn!("redis circuit breaker is open, rejecting cache call");
                Err(CacheError::Unavailable)
            }
        }
    }
}

impl CacheStore for RedisCache {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        self.guarded(|| {
            let mut redis_conn = self.pool.get()?;
            let redis_conn = redis_conn.deref_mut();
            let value: Option<Vec<u8>> = redis_conn.get(key)?;
            // redis answers a missing key with nil, which some clients decode as empty
            Ok(value.filter(|bytes| !bytes.is_empty()))
        })
    }

    fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<(), CacheError> {
        self.guarded(|| {
            let mut redis_conn = self.pool.get()?;
            let redis_conn = redis_conn.deref_mut();
            match ttl {
                // SETEX rejects a zero expiry
                Some(ttl) => {
                    redis_conn.set_ex::<_, _, ()>(key, value, ttl.as_secs().max(1) as usize)?
                }
                None => redis_conn.set::<_, _, ()>(key, value)?,
            }
            Ok(())
        })
    }
}
