//! Bucket engine: every bucket operation, against an explicit `now`.

use std::sync::Arc;

use primitive_types::U256;
use tracing::{debug, trace};

use super::events::{BucketEvent, EventSink};
use super::id::BucketId;
use super::state::Bucket;
use super::store::BucketStore;
use crate::error::BucketResult;

/// Owns the bucket collection and applies settle-then-mutate operations.
///
/// Reads settle a copy and never persist. Mutations settle, apply their
/// effect, commit and notify the configured sinks in one step under the
/// bucket's lock, so events for one bucket arrive in commit order. Sinks
/// must not call back into the engine.
#[derive(Default)]
pub struct BucketEngine {
    store: BucketStore,
    sinks: Vec<Arc<dyn EventSink>>,
}

impl BucketEngine {
    /// Create an engine with no event sinks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sink receiving every event emitted by this engine.
    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    fn emit(&self, event: BucketEvent) {
        for sink in &self.sinks {
            sink.emit(&event);
        }
    }

    /// Create a full bucket.
    pub fn add_bucket(
        &self,
        id: BucketId,
        limit: U256,
        duration: u64,
        now: u64,
    ) -> BucketResult<()> {
        self.store
            .insert_new_with(id, Bucket::new(limit, duration, now), |_| {
                self.emit(BucketEvent::Added { id, limit, duration })
            })?;

        debug!(bucket = %id, limit = %limit, duration, "Bucket added");
        Ok(())
    }

    /// Delete a bucket and all of its state.
    pub fn remove_bucket(&self, id: &BucketId) -> BucketResult<()> {
        self.store
            .delete_with(id, |_| self.emit(BucketEvent::Removed { id: *id }))?;

        debug!(bucket = %id, "Bucket removed");
        Ok(())
    }

    /// Fails with `UnknownBucket` if the id is not stored.
    pub fn check_bucket_known(&self, id: &BucketId) -> BucketResult<()> {
        self.store.get(id).map(|_| ())
    }

    /// The bucket as it would be if settled at `now`.
    pub fn get_bucket(&self, id: &BucketId, now: u64) -> BucketResult<Bucket> {
        let bucket = self.store.get(id)?.settled(now);
        trace!(bucket = %id, capacity = %bucket.current_capacity, "Read bucket");
        Ok(bucket)
    }

    /// The bucket exactly as persisted, without settlement.
    pub fn stored_bucket(&self, id: &BucketId) -> BucketResult<Bucket> {
        self.store.get(id)
    }

    pub fn get_current_capacity(&self, id: &BucketId, now: u64) -> BucketResult<U256> {
        Ok(self.store.get(id)?.settled_capacity(now))
    }

    pub fn get_rate_limit(&self, id: &BucketId) -> BucketResult<U256> {
        Ok(self.store.get(id)?.limit)
    }

    pub fn get_rate_duration(&self, id: &BucketId) -> BucketResult<u64> {
        Ok(self.store.get(id)?.duration)
    }

    /// Whether `amount` could be consumed at `now`. Always true for unlimited buckets.
    pub fn has_capacity(&self, id: &BucketId, amount: U256, now: u64) -> BucketResult<bool> {
        Ok(self.store.get(id)?.has_capacity(amount, now))
    }

    /// Persist settlement as of `now`. A no-op for unlimited buckets.
    pub fn update_capacity(&self, id: &BucketId, now: u64) -> BucketResult<()> {
        self.store.update(id, |bucket| {
            bucket.settle(now);
            Ok(())
        })
    }

    /// Consume `amount`, failing if the settled capacity is short.
    ///
    /// Unlimited buckets accept any amount without recording it.
    pub fn consume_amount(&self, id: &BucketId, amount: U256, now: u64) -> BucketResult<()> {
        let applied = self
            .store
            .update_with(
                id,
                |bucket| bucket.consume(amount, now),
                |applied| {
                    if *applied {
                        self.emit(BucketEvent::Consumed { id: *id, amount });
                    }
                },
            )
            .inspect_err(|e| {
                debug!(bucket = %id, amount = %amount, error = %e, "Consume rejected")
            })?;

        if !applied {
            trace!(bucket = %id, "Consume ignored on unlimited bucket");
        }
        Ok(())
    }

    /// Add `amount` back, clamped to the limit. Ignored for unlimited buckets.
    pub fn fill_amount(&self, id: &BucketId, amount: U256, now: u64) -> BucketResult<()> {
        let applied = self.store.update_with(
            id,
            |bucket| Ok(bucket.fill(amount, now)),
            |applied| {
                if let Some(amount) = applied {
                    self.emit(BucketEvent::Filled {
                        id: *id,
                        amount: *amount,
                    });
                }
            },
        )?;

        if applied.is_none() {
            trace!(bucket = %id, "Fill ignored on unlimited bucket");
        }
        Ok(())
    }

    pub fn update_rate_limit(&self, id: &BucketId, new_limit: U256, now: u64) -> BucketResult<()> {
        self.store.update_with(
            id,
            |bucket| {
                bucket.update_rate_limit(new_limit, now);
                Ok(())
            },
            |_| {
                self.emit(BucketEvent::RateLimitUpdated {
                    id: *id,
                    limit: new_limit,
                })
            },
        )
    }

    pub fn update_rate_duration(
        &self,
        id: &BucketId,
        new_duration: u64,
        now: u64,
    ) -> BucketResult<()> {
        self.store.update_with(
            id,
            |bucket| {
                bucket.update_rate_duration(new_duration, now);
                Ok(())
            },
            |_| {
                self.emit(BucketEvent::RateDurationUpdated {
                    id: *id,
                    duration: new_duration,
                })
            },
        )
    }

    /// Overwrite the stored capacity. Emits no event.
    pub fn set_current_capacity(
        &self,
        id: &BucketId,
        capacity: U256,
        now: u64,
    ) -> BucketResult<()> {
        self.store
            .update(id, |bucket| bucket.set_current_capacity(capacity, now))?;

        debug!(bucket = %id, capacity = %capacity, "Capacity overridden");
        Ok(())
    }

    /// Number of stored buckets.
    pub fn bucket_count(&self) -> usize {
        self.store.len()
    }

    pub fn bucket_ids(&self) -> Vec<BucketId> {
        self.store.ids()
    }
}
