//! Bucket service implementation.

use std::pin::Pin;
use std::sync::Arc;

use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};
use tonic::{Request, Response, Status};
use tracing::{debug, instrument, warn};

use super::proto::capacitor::v1 as pb;
use super::proto::capacitor::v1::bucket_event::Kind;
use super::proto::capacitor::v1::bucket_service_server::BucketService;

use crate::bucket::amount::{from_be_bytes, to_be_bytes};
use crate::bucket::{BroadcastSink, BucketEvent, BucketId, RateLimiter};
use crate::error::BucketError;

impl From<BucketError> for Status {
    fn from(err: BucketError) -> Self {
        match err {
            BucketError::UnknownBucket(_) => Status::not_found(err.to_string()),
            BucketError::BucketAlreadyExists(_) => Status::already_exists(err.to_string()),
            BucketError::InsufficientCapacity { .. } => {
                Status::failed_precondition(err.to_string())
            }
            BucketError::InvalidArgument(_) => Status::invalid_argument(err.to_string()),
        }
    }
}

fn reject(err: BucketError) -> Status {
    debug!(error = %err, "Bucket request rejected");
    Status::from(err)
}

fn parse_id(bytes: &[u8]) -> Result<BucketId, Status> {
    BucketId::from_slice(bytes).map_err(reject)
}

fn to_proto_event(event: &BucketEvent) -> pb::BucketEvent {
    let kind = match event {
        BucketEvent::Added { limit, duration, .. } => Kind::Added(pb::BucketAdded {
            limit: to_be_bytes(*limit),
            duration: *duration,
        }),
        BucketEvent::Removed { .. } => Kind::Removed(pb::BucketRemoved {}),
        BucketEvent::RateLimitUpdated { limit, .. } => {
            Kind::RateLimitUpdated(pb::BucketRateLimitUpdated {
                limit: to_be_bytes(*limit),
            })
        }
        BucketEvent::RateDurationUpdated { duration, .. } => {
            Kind::RateDurationUpdated(pb::BucketRateDurationUpdated {
                duration: *duration,
            })
        }
        BucketEvent::Consumed { amount, .. } => Kind::Consumed(pb::BucketConsumed {
            amount: to_be_bytes(*amount),
        }),
        BucketEvent::Filled { amount, .. } => Kind::Filled(pb::BucketFilled {
            amount: to_be_bytes(*amount),
        }),
    };

    pb::BucketEvent {
        bucket_id: event.bucket_id().as_bytes().to_vec(),
        kind: Some(kind),
    }
}

/// Implementation of the `capacitor.v1.BucketService` gRPC interface.
pub struct BucketServiceImpl {
    /// The rate limiter instance
    limiter: Arc<RateLimiter>,
    /// Source for `WatchEvents`; streaming is unavailable without it
    events: Option<BroadcastSink>,
}

impl BucketServiceImpl {
    /// Create a new BucketServiceImpl with the given rate limiter.
    pub fn new(limiter: Arc<RateLimiter>) -> Self {
        Self {
            limiter,
            events: None,
        }
    }

    /// Serve `WatchEvents` from this sink. It should also be attached to the limiter's engine.
    pub fn with_events(mut self, events: BroadcastSink) -> Self {
        self.events = Some(events);
        self
    }
}

type EventStream = Pin<Box<dyn Stream<Item = Result<pb::BucketEvent, Status>> + Send + 'static>>;

#[tonic::async_trait]
impl BucketService for BucketServiceImpl {
    type WatchEventsStream = EventStream;

    #[instrument(skip(self, request), fields(bucket = %hex::encode(&request.get_ref().bucket_id)))]
    async fn add_bucket(
        &self,
        request: Request<pb::AddBucketRequest>,
    ) -> Result<Response<pb::Ack>, Status> {
        let req = request.into_inner();
        let id = parse_id(&req.bucket_id)?;
        let limit = from_be_bytes(&req.limit).map_err(reject)?;

        self.limiter
            .add_bucket(id, limit, req.duration)
            .map_err(reject)?;
        Ok(Response::new(pb::Ack {}))
    }

    #[instrument(skip(self, request), fields(bucket = %hex::encode(&request.get_ref().bucket_id)))]
    async fn remove_bucket(
        &self,
        request: Request<pb::BucketRequest>,
    ) -> Result<Response<pb::Ack>, Status> {
        let id = parse_id(&request.get_ref().bucket_id)?;

        self.limiter.remove_bucket(&id).map_err(reject)?;
        Ok(Response::new(pb::Ack {}))
    }

    #[instrument(skip(self, request), fields(bucket = %hex::encode(&request.get_ref().bucket_id)))]
    async fn get_bucket(
        &self,
        request: Request<pb::BucketRequest>,
    ) -> Result<Response<pb::BucketView>, Status> {
        let id = parse_id(&request.get_ref().bucket_id)?;
        let bucket = self.limiter.get_bucket(&id).map_err(reject)?;

        Ok(Response::new(pb::BucketView {
            bucket_id: id.as_bytes().to_vec(),
            limit: to_be_bytes(bucket.limit),
            current_capacity: to_be_bytes(bucket.current_capacity),
            duration: bucket.duration,
            last_updated: bucket.last_updated,
        }))
    }

    #[instrument(skip(self, request), fields(bucket = %hex::encode(&request.get_ref().bucket_id)))]
    async fn get_current_capacity(
        &self,
        request: Request<pb::BucketRequest>,
    ) -> Result<Response<pb::AmountResponse>, Status> {
        let id = parse_id(&request.get_ref().bucket_id)?;
        let capacity = self.limiter.get_current_capacity(&id).map_err(reject)?;

        Ok(Response::new(pb::AmountResponse {
            amount: to_be_bytes(capacity),
        }))
    }

    #[instrument(skip(self, request), fields(bucket = %hex::encode(&request.get_ref().bucket_id)))]
    async fn get_rate_limit(
        &self,
        request: Request<pb::BucketRequest>,
    ) -> Result<Response<pb::AmountResponse>, Status> {
        let id = parse_id(&request.get_ref().bucket_id)?;
        let limit = self.limiter.get_rate_limit(&id).map_err(reject)?;

        Ok(Response::new(pb::AmountResponse {
            amount: to_be_bytes(limit),
        }))
    }

    #[instrument(skip(self, request), fields(bucket = %hex::encode(&request.get_ref().bucket_id)))]
    async fn get_rate_duration(
        &self,
        request: Request<pb::BucketRequest>,
    ) -> Result<Response<pb::DurationResponse>, Status> {
        let id = parse_id(&request.get_ref().bucket_id)?;
        let duration = self.limiter.get_rate_duration(&id).map_err(reject)?;

        Ok(Response::new(pb::DurationResponse { duration }))
    }

    #[instrument(skip(self, request), fields(bucket = %hex::encode(&request.get_ref().bucket_id)))]
    async fn has_capacity(
        &self,
        request: Request<pb::AmountRequest>,
    ) -> Result<Response<pb::HasCapacityResponse>, Status> {
        let req = request.into_inner();
        let id = parse_id(&req.bucket_id)?;
        let amount = from_be_bytes(&req.amount).map_err(reject)?;

        let has_capacity = self.limiter.has_capacity(&id, amount).map_err(reject)?;
        Ok(Response::new(pb::HasCapacityResponse { has_capacity }))
    }

    #[instrument(skip(self, request), fields(bucket = %hex::encode(&request.get_ref().bucket_id)))]
    async fn update_capacity(
        &self,
        request: Request<pb::BucketRequest>,
    ) -> Result<Response<pb::Ack>, Status> {
        let id = parse_id(&request.get_ref().bucket_id)?;

        self.limiter.update_capacity(&id).map_err(reject)?;
        Ok(Response::new(pb::Ack {}))
    }

    #[instrument(skip(self, request), fields(bucket = %hex::encode(&request.get_ref().bucket_id)))]
    async fn consume_amount(
        &self,
        request: Request<pb::AmountRequest>,
    ) -> Result<Response<pb::Ack>, Status> {
        let req = request.into_inner();
        let id = parse_id(&req.bucket_id)?;
        let amount = from_be_bytes(&req.amount).map_err(reject)?;

        self.limiter.consume_amount(&id, amount).map_err(reject)?;
        Ok(Response::new(pb::Ack {}))
    }

    #[instrument(skip(self, request), fields(bucket = %hex::encode(&request.get_ref().bucket_id)))]
    async fn fill_amount(
        &self,
        request: Request<pb::AmountRequest>,
    ) -> Result<Response<pb::Ack>, Status> {
        let req = request.into_inner();
        let id = parse_id(&req.bucket_id)?;
        let amount = from_be_bytes(&req.amount).map_err(reject)?;

        self.limiter.fill_amount(&id, amount).map_err(reject)?;
        Ok(Response::new(pb::Ack {}))
    }

    #[instrument(skip(self, request), fields(bucket = %hex::encode(&request.get_ref().bucket_id)))]
    async fn update_rate_limit(
        &self,
        request: Request<pb::UpdateRateLimitRequest>,
    ) -> Result<Response<pb::Ack>, Status> {
        let req = request.into_inner();
        let id = parse_id(&req.bucket_id)?;
        let limit = from_be_bytes(&req.limit).map_err(reject)?;

        self.limiter.update_rate_limit(&id, limit).map_err(reject)?;
        Ok(Response::new(pb::Ack {}))
    }

    #[instrument(skip(self, request), fields(bucket = %hex::encode(&request.get_ref().bucket_id)))]
    async fn update_rate_duration(
        &self,
        request: Request<pb::UpdateRateDurationRequest>,
    ) -> Result<Response<pb::Ack>, Status> {
        let req = request.into_inner();
        let id = parse_id(&req.bucket_id)?;

        self.limiter
            .update_rate_duration(&id, req.duration)
            .map_err(reject)?;
        Ok(Response::new(pb::Ack {}))
    }

    #[instrument(skip(self, request), fields(bucket = %hex::encode(&request.get_ref().bucket_id)))]
    async fn set_current_capacity(
        &self,
        request: Request<pb::AmountRequest>,
    ) -> Result<Response<pb::Ack>, Status> {
        let req = request.into_inner();
        let id = parse_id(&req.bucket_id)?;
        let capacity = from_be_bytes(&req.amount).map_err(reject)?;

        self.limiter
            .set_current_capacity(&id, capacity)
            .map_err(reject)?;
        Ok(Response::new(pb::Ack {}))
    }

    #[instrument(skip(self, request))]
    async fn watch_events(
        &self,
        request: Request<pb::WatchEventsRequest>,
    ) -> Result<Response<Self::WatchEventsStream>, Status> {
        let req = request.into_inner();
        let filter = if req.bucket_id.is_empty() {
            None
        } else {
            Some(parse_id(&req.bucket_id)?)
        };

        let events = self.events.as_ref().ok_or_else(|| {
            warn!("WatchEvents requested but event streaming is not enabled");
            Status::unimplemented("event streaming is not enabled")
        })?;

        debug!(filter = ?filter, "Starting event stream");

        // A lagging subscriber gets one error item, which ends the stream
        let stream = BroadcastStream::new(events.subscribe()).filter_map(move |item| match item {
            Ok(event) if filter.map_or(true, |id| event.bucket_id() == id) => {
                Some(Ok(to_proto_event(&event)))
            }
            Ok(_) => None,
            Err(BroadcastStreamRecvError::Lagged(missed)) => {
                warn!(missed, "Event subscriber lagged");
                Some(Err(Status::resource_exhausted(format!(
                    "subscriber lagged behind by {} events",
                    missed
                ))))
            }
        });

        Ok(Response::new(Box::pin(stream) as EventStream))
    }
}
