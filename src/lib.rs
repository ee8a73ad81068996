//! Capacitor - Token-Bucket Rate Limiting Service
//!
//! This crate implements independently keyed token buckets over 256-bit
//! amounts. Capacity recovers lazily: each bucket stores the capacity it held
//! at its last update and settles elapsed-time recovery on access, so no
//! background task is needed. Buckets are served over gRPC.

pub mod bucket;
pub mod clock;
pub mod config;
pub mod error;
pub mod grpc;
pub mod set;
