//! Token buckets with lazy, time-based capacity recovery.

pub mod amount;
mod engine;
mod events;
mod id;
mod limiter;
mod state;
mod store;

pub use engine::BucketEngine;
pub use events::{BroadcastSink, BucketEvent, EventSink, MemorySink, TracingSink};
pub use id::{BucketId, BUCKET_ID_LEN};
pub use limiter::RateLimiter;
pub use state::Bucket;
pub use store::BucketStore;
