//! Shared contract for the coupon issuance service.
//!
//! This crate holds everything the client and server sides agree on: the
//! `coupon.v1` protobuf bindings, the unified [`Error`] type with its mapping
//! onto [`tonic::Status`], the campaign status state machine, and the
//! coupon-code alphabet.

mod common;
pub use common::*;

/// Generated gRPC bindings for the `coupon.v1` package.
pub mod proto {
    tonic::include_proto!("coupon.v1");

    /// Encoded file descriptor set, registered with the reflection service.
    pub const FILE_DESCRIPTOR_SET: &[u8] =
        tonic::include_file_descriptor_set!("coupon_descriptor");
}
