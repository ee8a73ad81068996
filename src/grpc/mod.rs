//! gRPC server module for the bucket service.

mod server;
mod service;

pub use server::GrpcServer;
pub use service::BucketServiceImpl;

// Include the generated protobuf code
pub mod proto {
    pub mod capacitor {
        pub mod v1 {
            tonic::include_proto!("capacitor.v1");

            /// Encoded descriptor set for the service, for reflection clients.
            pub const FILE_DESCRIPTOR_SET: &[u8] =
                tonic::include_file_descriptor_set!("capacitor_descriptor");
        }
    }
}

// Re-export commonly used types
pub use proto::capacitor::v1::bucket_service_server::BucketServiceServer;
