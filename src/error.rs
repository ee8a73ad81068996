//! Error types for the Capacitor service.

use primitive_types::U256;
use thiserror::Error;

use crate::bucket::BucketId;

/// Failures returned by bucket operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BucketError {
    /// No bucket is stored under the id
    #[error("Unknown bucket: {0}")]
    UnknownBucket(BucketId),

    /// A bucket is already stored under the id
    #[error("Bucket already exists: {0}")]
    BucketAlreadyExists(BucketId),

    /// A consume asked for more than the settled capacity
    #[error("Insufficient capacity to consume: requested {requested}, available {available}")]
    InsufficientCapacity { requested: U256, available: U256 },

    /// Malformed id or out-of-range numeric argument
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

/// Result type alias for bucket operations.
pub type BucketResult<T> = std::result::Result<T, BucketError>;

/// Main error type for Capacitor operations.
#[derive(Error, Debug)]
pub enum CapacitorError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Bucket engine errors
    #[error("Bucket error: {0}")]
    Bucket(#[from] BucketError),

    /// gRPC server errors
    #[error("gRPC error: {0}")]
    Grpc(#[from] tonic::transport::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Capacitor operations.
pub type Result<T> = std::result::Result<T, CapacitorError>;
