//! Bucket state and lazy capacity settlement.
//!
//! A bucket only stores the capacity it held at `last_updated`. Recovery since
//! then is computed on access from the elapsed time, so no background task is
//! needed to refill buckets. Every mutation settles first and then applies its
//! own effect to the settled state.

use primitive_types::{U256, U512};

use crate::error::{BucketError, BucketResult};

/// One independently rate-limited counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bucket {
    /// Maximum capacity; also the amount recovered per `duration`
    pub limit: U256,
    /// Capacity as of `last_updated`
    pub current_capacity: U256,
    /// Seconds to recover from empty to `limit`; zero means unlimited
    pub duration: u64,
    /// Unix seconds at which `current_capacity` was authoritative
    pub last_updated: u64,
}

impl Bucket {
    /// Create a full bucket.
    pub fn new(limit: U256, duration: u64, now: u64) -> Self {
        Self {
            limit,
            current_capacity: limit,
            duration,
            last_updated: now,
        }
    }

    /// Whether time-based recovery is disabled for this bucket.
    pub fn is_unlimited(&self) -> bool {
        self.duration == 0
    }

    /// Capacity as of `now`, without modifying the bucket.
    ///
    /// Computes `min(limit, current_capacity + limit * elapsed / duration)`
    /// with a 512-bit intermediate, so the full `U256` limit range combined
    /// with any `u64` elapsed time cannot overflow.
    pub fn settled_capacity(&self, now: u64) -> U256 {
        if self.is_unlimited() {
            return self.current_capacity;
        }

        // A clock that went backwards recovers nothing
        let elapsed = now.saturating_sub(self.last_updated);
        let accrued = self.limit.full_mul(U256::from(elapsed)) / U512::from(self.duration);
        let recovered = U512::from(self.current_capacity) + accrued;

        if recovered >= U512::from(self.limit) {
            self.limit
        } else {
            U256::try_from(recovered).unwrap_or(self.limit)
        }
    }

    /// Bring `current_capacity` and `last_updated` up to date as of `now`.
    ///
    /// Unlimited buckets are left untouched, including `last_updated`.
    pub fn settle(&mut self, now: u64) {
        if self.is_unlimited() {
            return;
        }
        self.current_capacity = self.settled_capacity(now);
        self.last_updated = self.last_updated.max(now);
    }

    /// A copy of this bucket settled as of `now`.
    pub fn settled(&self, now: u64) -> Self {
        let mut bucket = *self;
        bucket.settle(now);
        bucket
    }

    /// Whether `amount` could be consumed at `now`. Unlimited buckets always can.
    pub fn has_capacity(&self, amount: U256, now: u64) -> bool {
        self.is_unlimited() || amount <= self.settled_capacity(now)
    }

    /// Consume `amount` after settling.
    ///
    /// Returns `Ok(false)` without touching state when the bucket is unlimited.
    pub fn consume(&mut self, amount: U256, now: u64) -> BucketResult<bool> {
        self.settle(now);
        if self.is_unlimited() {
            return Ok(false);
        }

        if amount > self.current_capacity {
            return Err(BucketError::InsufficientCapacity {
                requested: amount,
                available: self.current_capacity,
            });
        }

        self.current_capacity -= amount;
        Ok(true)
    }

    /// Fill `amount` after settling, never exceeding `limit`.
    ///
    /// Returns the amount actually added, or `None` for unlimited buckets.
    pub fn fill(&mut self, amount: U256, now: u64) -> Option<U256> {
        self.settle(now);
        if self.is_unlimited() {
            return None;
        }

        let headroom = self.limit.saturating_sub(self.current_capacity);
        let applied = amount.min(headroom);
        self.current_capacity += applied;
        Some(applied)
    }

    /// Change `limit`, shifting capacity by the same signed delta.
    ///
    /// Capacity is floored at zero when the limit shrinks by more than it holds.
    pub fn update_rate_limit(&mut self, new_limit: U256, now: u64) {
        self.settle(now);

        self.current_capacity = if new_limit < self.limit {
            self.current_capacity.saturating_sub(self.limit - new_limit)
        } else {
            self.current_capacity
                .saturating_add(new_limit - self.limit)
                .min(new_limit)
        };
        self.limit = new_limit;
    }

    /// Change `duration`, settling against the old one first.
    pub fn update_rate_duration(&mut self, new_duration: u64, now: u64) {
        self.settle(now);

        // Settlement skips unlimited buckets, so the recovery basis has to be
        // reset here or the next settle would count time spent unlimited.
        self.last_updated = self.last_updated.max(now);
        self.duration = new_duration;
    }

    /// Overwrite the capacity, restarting recovery from `now`.
    pub fn set_current_capacity(&mut self, capacity: U256, now: u64) -> BucketResult<()> {
        if capacity > self.limit {
            return Err(BucketError::InvalidArgument(format!(
                "capacity {} exceeds limit {}",
                capacity, self.limit
            )));
        }

        self.current_capacity = capacity;
        self.last_updated = self.last_updated.max(now);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DAY: u64 = 86_400;
    const START: u64 = 1_700_000_000;

    fn thousand_tokens() -> U256 {
        U256::from(1000u64) * U256::exp10(18)
    }

    #[test]
    fn test_new_bucket_is_full() {
        let bucket = Bucket::new(U256::from(100u64), DAY, START);

        assert_eq!(bucket.current_capacity, U256::from(100u64));
        assert_eq!(bucket.last_updated, START);
        assert!(!bucket.is_unlimited());
    }

    #[test]
    fn test_settle_without_elapsed_time_is_noop() {
        let limit = thousand_tokens();
        let mut bucket = Bucket::new(limit, DAY, START);
        bucket.current_capacity = limit / 2;

        bucket.settle(START);
        bucket.settle(START);

        assert_eq!(bucket.current_capacity, limit / 2);
        assert_eq!(bucket.last_updated, START);
    }

    #[test]
    fn test_linear_recovery() {
        let limit = thousand_tokens();
        let mut bucket = Bucket::new(limit, DAY, START);
        bucket.current_capacity = limit / 4;

        assert_eq!(bucket.settled_capacity(START + DAY / 4), limit / 2);

        bucket.settle(START + DAY / 4);
        assert_eq!(bucket.current_capacity, limit / 2);
        assert_eq!(bucket.last_updated, START + DAY / 4);
    }

    #[test]
    fn test_recovery_floors_partial_units() {
        let mut bucket = Bucket::new(U256::from(10u64), 3, START);
        bucket.current_capacity = U256::zero();

        // 10 * 1 / 3 = 3.33
        assert_eq!(bucket.settled_capacity(START + 1), U256::from(3u64));
    }

    #[test]
    fn test_recovery_never_exceeds_limit() {
        let limit = thousand_tokens();
        let mut bucket = Bucket::new(limit, DAY, START);
        bucket.current_capacity = limit / 4;

        assert_eq!(bucket.settled_capacity(START + DAY), limit);
        assert_eq!(bucket.settled_capacity(START + 10 * DAY), limit);
    }

    #[test]
    fn test_recovery_does_not_overflow() {
        let mut bucket = Bucket::new(U256::MAX, 1, START);
        bucket.current_capacity = U256::MAX - 1;

        let now = START + i64::MAX as u64;
        assert_eq!(bucket.settled_capacity(now), U256::MAX);

        bucket.settle(now);
        assert_eq!(bucket.current_capacity, U256::MAX);
        assert_eq!(bucket.last_updated, now);
    }

    #[test]
    fn test_unlimited_bucket_never_settles() {
        let mut bucket = Bucket::new(U256::from(100u64), 0, START);
        bucket.current_capacity = U256::from(10u64);

        bucket.settle(START + DAY);

        assert_eq!(bucket.current_capacity, U256::from(10u64));
        assert_eq!(bucket.last_updated, START);
    }

    #[test]
    fn test_backwards_clock_recovers_nothing() {
        let mut bucket = Bucket::new(U256::from(100u64), DAY, START);
        bucket.current_capacity = U256::from(10u64);

        bucket.settle(START - 100);

        assert_eq!(bucket.current_capacity, U256::from(10u64));
        assert_eq!(bucket.last_updated, START);
    }

    #[test]
    fn test_has_capacity() {
        let mut bucket = Bucket::new(U256::from(100u64), DAY, START);
        bucket.current_capacity = U256::from(10u64);

        assert!(bucket.has_capacity(U256::from(10u64), START));
        assert!(!bucket.has_capacity(U256::from(11u64), START));

        let unlimited = Bucket::new(U256::zero(), 0, START);
        assert!(unlimited.has_capacity(U256::MAX, START));
    }

    #[test]
    fn test_consume() {
        let mut bucket = Bucket::new(U256::from(100u64), DAY, START);

        assert_eq!(bucket.consume(U256::from(60u64), START), Ok(true));
        assert_eq!(bucket.current_capacity, U256::from(40u64));

        let err = bucket.consume(U256::from(41u64), START).unwrap_err();
        assert_eq!(
            err,
            BucketError::InsufficientCapacity {
                requested: U256::from(41u64),
                available: U256::from(40u64),
            }
        );
        assert_eq!(bucket.current_capacity, U256::from(40u64));
    }

    #[test]
    fn test_consume_ignored_when_unlimited() {
        let mut bucket = Bucket::new(U256::from(5u64), 0, START);
        let before = bucket;

        assert_eq!(bucket.consume(U256::MAX, START + DAY), Ok(false));
        assert_eq!(bucket, before);
    }

    #[test]
    fn test_fill_returns_clamped_amount() {
        let mut bucket = Bucket::new(U256::from(100u64), DAY, START);
        bucket.current_capacity = U256::from(70u64);

        assert_eq!(bucket.fill(U256::from(20u64), START), Some(U256::from(20u64)));
        assert_eq!(bucket.current_capacity, U256::from(90u64));

        assert_eq!(bucket.fill(U256::from(50u64), START), Some(U256::from(10u64)));
        assert_eq!(bucket.current_capacity, U256::from(100u64));
    }

    #[test]
    fn test_fill_at_max_does_not_overflow() {
        let mut bucket = Bucket::new(U256::MAX, 1, START);

        assert_eq!(bucket.fill(U256::MAX, START + 1), Some(U256::zero()));
        assert_eq!(bucket.current_capacity, U256::MAX);
    }

    #[test]
    fn test_fill_ignored_when_unlimited() {
        let mut bucket = Bucket::new(U256::from(100u64), 0, START);
        bucket.current_capacity = U256::from(1u64);

        assert_eq!(bucket.fill(U256::from(50u64), START + DAY), None);
        assert_eq!(bucket.current_capacity, U256::from(1u64));
    }

    #[test]
    fn test_update_rate_limit_shifts_capacity() {
        let mut bucket = Bucket::new(U256::from(100u64), DAY, START);
        bucket.current_capacity = U256::from(50u64);

        bucket.update_rate_limit(U256::from(80u64), START);
        assert_eq!(bucket.current_capacity, U256::from(30u64));
        assert_eq!(bucket.limit, U256::from(80u64));

        bucket.update_rate_limit(U256::from(10u64), START);
        assert_eq!(bucket.current_capacity, U256::zero());

        bucket.update_rate_limit(U256::from(110u64), START);
        assert_eq!(bucket.current_capacity, U256::from(100u64));
        assert_eq!(bucket.limit, U256::from(110u64));
    }

    #[test]
    fn test_update_rate_limit_settles_first() {
        let mut bucket = Bucket::new(U256::from(100u64), 100, START);
        bucket.current_capacity = U256::zero();

        // 40 recovered, then reduced by 20
        bucket.update_rate_limit(U256::from(80u64), START + 40);
        assert_eq!(bucket.current_capacity, U256::from(20u64));
        assert_eq!(bucket.last_updated, START + 40);
    }

    #[test]
    fn test_update_rate_duration_settles_with_old_duration() {
        let mut bucket = Bucket::new(U256::from(100u64), 100, START);
        bucket.current_capacity = U256::zero();

        bucket.update_rate_duration(10, START + 50);

        assert_eq!(bucket.current_capacity, U256::from(50u64));
        assert_eq!(bucket.duration, 10);
        assert_eq!(bucket.last_updated, START + 50);
    }

    #[test]
    fn test_update_rate_duration_from_unlimited_resets_basis() {
        let limit = thousand_tokens();
        let mut bucket = Bucket::new(limit, 0, START);
        bucket.current_capacity = limit / 2;

        let update_at = START + DAY;
        bucket.update_rate_duration(DAY, update_at);
        assert_eq!(bucket.last_updated, update_at);
        assert_eq!(bucket.current_capacity, limit / 2);

        // A quarter of the duration recovers a quarter of the limit, not the
        // whole day spent unlimited
        let later = update_at + DAY / 4;
        assert_eq!(bucket.settled_capacity(later), limit / 2 + limit / 4);
    }

    #[test]
    fn test_update_rate_duration_to_unlimited_freezes_capacity() {
        let mut bucket = Bucket::new(U256::from(100u64), 100, START);
        bucket.current_capacity = U256::zero();

        bucket.update_rate_duration(0, START + 30);
        assert_eq!(bucket.current_capacity, U256::from(30u64));
        assert_eq!(bucket.last_updated, START + 30);

        assert_eq!(bucket.settled_capacity(START + 1000), U256::from(30u64));
    }

    #[test]
    fn test_set_current_capacity() {
        let mut bucket = Bucket::new(U256::from(100u64), DAY, START);

        bucket.set_current_capacity(U256::from(25u64), START + 5).unwrap();
        assert_eq!(bucket.current_capacity, U256::from(25u64));
        assert_eq!(bucket.last_updated, START + 5);

        let err = bucket
            .set_current_capacity(U256::from(101u64), START + 6)
            .unwrap_err();
        assert!(matches!(err, BucketError::InvalidArgument(_)));
        assert_eq!(bucket.current_capacity, U256::from(25u64));
    }
}
