//! Keyed bucket storage.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::id::BucketId;
use super::state::Bucket;
use crate::error::{BucketError, BucketResult};

/// Concurrent map from bucket id to bucket.
///
/// Operations on one id are serialized by the map's shard lock; buckets on
/// other shards proceed independently.
#[derive(Debug, Default)]
pub struct BucketStore {
    buckets: DashMap<BucketId, Bucket>,
}

impl BucketStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a copy of the stored bucket.
    pub fn get(&self, id: &BucketId) -> BucketResult<Bucket> {
        self.buckets
            .get(id)
            .map(|bucket| *bucket)
            .ok_or(BucketError::UnknownBucket(*id))
    }

    /// Insert or replace a bucket.
    pub fn put(&self, id: BucketId, bucket: Bucket) {
        self.buckets.insert(id, bucket);
    }

    /// Insert a bucket, failing if the id is taken.
    pub fn insert_new(&self, id: BucketId, bucket: Bucket) -> BucketResult<()> {
        self.insert_new_with(id, bucket, |_| {})
    }

    /// Like [`insert_new`](Self::insert_new), running `on_commit` on the
    /// inserted bucket before its lock is released.
    pub fn insert_new_with<C>(
        &self,
        id: BucketId,
        bucket: Bucket,
        on_commit: C,
    ) -> BucketResult<()>
    where
        C: FnOnce(&Bucket),
    {
        match self.buckets.entry(id) {
            Entry::Occupied(_) => Err(BucketError::BucketAlreadyExists(id)),
            Entry::Vacant(slot) => {
                let inserted = slot.insert(bucket);
                on_commit(inserted.value());
                Ok(())
            }
        }
    }

    /// Remove a bucket, returning its last state.
    pub fn delete(&self, id: &BucketId) -> BucketResult<Bucket> {
        self.delete_with(id, |_| {})
    }

    /// Like [`delete`](Self::delete), running `on_commit` on the last state
    /// while the entry is still locked.
    pub fn delete_with<C>(&self, id: &BucketId, on_commit: C) -> BucketResult<Bucket>
    where
        C: FnOnce(&Bucket),
    {
        match self.buckets.entry(*id) {
            Entry::Vacant(_) => Err(BucketError::UnknownBucket(*id)),
            Entry::Occupied(entry) => {
                on_commit(entry.get());
                Ok(entry.remove())
            }
        }
    }

    pub fn exists(&self, id: &BucketId) -> bool {
        self.buckets.contains_key(id)
    }

    /// Apply `f` to a copy of the bucket while holding its lock, writing the
    /// copy back only if `f` succeeds.
    pub fn update<T, F>(&self, id: &BucketId, f: F) -> BucketResult<T>
    where
        F: FnOnce(&mut Bucket) -> BucketResult<T>,
    {
        self.update_with(id, f, |_| {})
    }

    /// Like [`update`](Self::update), running `on_commit` on the result after
    /// the write-back and before the lock is released.
    ///
    /// `on_commit` must not touch this store; the shard is still locked.
    pub fn update_with<T, F, C>(&self, id: &BucketId, f: F, on_commit: C) -> BucketResult<T>
    where
        F: FnOnce(&mut Bucket) -> BucketResult<T>,
        C: FnOnce(&T),
    {
        let mut entry = self
            .buckets
            .get_mut(id)
            .ok_or(BucketError::UnknownBucket(*id))?;

        let mut working = *entry;
        let out = f(&mut working)?;
        *entry = working;
        on_commit(&out);
        Ok(out)
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Ids of every stored bucket, in no particular order.
    pub fn ids(&self) -> Vec<BucketId> {
        self.buckets.iter().map(|entry| *entry.key()).collect()
    }
}
