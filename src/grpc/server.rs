//! gRPC server implementation.

use std::net::SocketAddr;
use std::sync::Arc;
use tonic::transport::Server;
use tracing::{error, info};

use super::proto::capacitor::v1::bucket_service_server::BucketServiceServer;
use super::service::BucketServiceImpl;
use crate::bucket::{BroadcastSink, RateLimiter};
use crate::error::{CapacitorError, Result};

/// gRPC server for the bucket service.
pub struct GrpcServer {
    /// Address to bind to
    addr: SocketAddr,
    /// The rate limiter instance
    limiter: Arc<RateLimiter>,
    /// Event source for `WatchEvents`
    events: Option<BroadcastSink>,
}

impl GrpcServer {
    /// Create a new gRPC server.
    pub fn new(addr: SocketAddr, limiter: Arc<RateLimiter>) -> Self {
        Self {
            addr,
            limiter,
            events: None,
        }
    }

    /// Enable `WatchEvents`, fed by a sink attached to the limiter's engine.
    pub fn with_events(mut self, events: BroadcastSink) -> Self {
        self.events = Some(events);
        self
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    fn service(&self) -> BucketServiceServer<BucketServiceImpl> {
        let mut service = BucketServiceImpl::new(self.limiter.clone());
        if let Some(events) = &self.events {
            service = service.with_events(events.clone());
        }
        BucketServiceServer::new(service)
    }

    /// Start the gRPC server.
    ///
    /// This method will block until the server is shut down.
    pub async fn serve(self) -> Result<()> {
        info!(addr = %self.addr, "Starting gRPC server for BucketService");

        Server::builder()
            .add_service(self.service())
            .serve(self.addr)
            .await
            .map_err(|e| {
                error!(error = %e, "gRPC server failed");
                CapacitorError::Grpc(e)
            })
    }

    /// Start the gRPC server with graceful shutdown.
    ///
    /// The server will shut down when the provided signal resolves.
    pub async fn serve_with_shutdown<F>(self, signal: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send,
    {
        info!(
            addr = %self.addr,
            "Starting gRPC server for BucketService with graceful shutdown"
        );

        Server::builder()
            .add_service(self.service())
            .serve_with_shutdown(self.addr, signal)
            .await
            .map_err(|e| {
                error!(error = %e, "gRPC server failed");
                CapacitorError::Grpc(e)
            })
    }
}
