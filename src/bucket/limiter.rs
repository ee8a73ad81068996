//! Clock-bound rate limiter.

use std::sync::Arc;

use primitive_types::U256;
use tracing::info;

use super::engine::BucketEngine;
use super::id::BucketId;
use super::state::Bucket;
use crate::clock::{Clock, SystemClock};
use crate::config::BucketSpec;
use crate::error::BucketResult;

/// The bucket operations with `now` read from a [`Clock`].
///
/// This struct is thread-safe and can be shared across multiple tasks.
pub struct RateLimiter {
    engine: BucketEngine,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    /// Create a rate limiter on the system clock.
    pub fn new(engine: BucketEngine) -> Self {
        Self::with_clock(engine, Arc::new(SystemClock))
    }

    pub fn with_clock(engine: BucketEngine, clock: Arc<dyn Clock>) -> Self {
        Self { engine, clock }
    }

    /// The current time according to this limiter's clock.
    pub fn now(&self) -> u64 {
        self.clock.now_secs()
    }

    pub fn engine(&self) -> &BucketEngine {
        &self.engine
    }

    /// Create every bucket declared in configuration.
    pub fn seed(&self, specs: &[BucketSpec]) -> BucketResult<()> {
        for spec in specs {
            self.add_bucket(spec.id, spec.limit, spec.duration)?;
            info!(
                bucket = %spec.id,
                limit = %spec.limit,
                duration = spec.duration,
                "Seeded bucket"
            );
        }
        Ok(())
    }

    pub fn add_bucket(&self, id: BucketId, limit: U256, duration: u64) -> BucketResult<()> {
        self.engine.add_bucket(id, limit, duration, self.now())
    }

    pub fn remove_bucket(&self, id: &BucketId) -> BucketResult<()> {
        self.engine.remove_bucket(id)
    }

    pub fn get_bucket(&self, id: &BucketId) -> BucketResult<Bucket> {
        self.engine.get_bucket(id, self.now())
    }

    pub fn get_current_capacity(&self, id: &BucketId) -> BucketResult<U256> {
        self.engine.get_current_capacity(id, self.now())
    }

    pub fn get_rate_limit(&self, id: &BucketId) -> BucketResult<U256> {
        self.engine.get_rate_limit(id)
    }

    pub fn get_rate_duration(&self, id: &BucketId) -> BucketResult<u64> {
        self.engine.get_rate_duration(id)
    }

    pub fn has_capacity(&self, id: &BucketId, amount: U256) -> BucketResult<bool> {
        self.engine.has_capacity(id, amount, self.now())
    }

    pub fn update_capacity(&self, id: &BucketId) -> BucketResult<()> {
        self.engine.update_capacity(id, self.now())
    }

    pub fn consume_amount(&self, id: &BucketId, amount: U256) -> BucketResult<()> {
        self.engine.consume_amount(id, amount, self.now())
    }

    pub fn fill_amount(&self, id: &BucketId, amount: U256) -> BucketResult<()> {
        self.engine.fill_amount(id, amount, self.now())
    }

    pub fn update_rate_limit(&self, id: &BucketId, new_limit: U256) -> BucketResult<()> {
        self.engine.update_rate_limit(id, new_limit, self.now())
    }

    pub fn update_rate_duration(&self, id: &BucketId, new_duration: u64) -> BucketResult<()> {
        self.engine.update_rate_duration(id, new_duration, self.now())
    }

    pub fn set_current_capacity(&self, id: &BucketId, capacity: U256) -> BucketResult<()> {
        self.engine.set_current_capacity(id, capacity, self.now())
    }
}
