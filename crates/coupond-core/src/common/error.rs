//! Error types for the coupon issuance service.
//!
//! This module defines the central `Error` enum covering every reportable
//! failure in the issuance system. It implements `From<Error>` for
//! `tonic::Status` so request handlers can propagate errors straight to the
//! wire with the matching gRPC status code.
//!
//! ## Error cases
//! - `InvalidRequest`: the client request failed validation.
//! - `CampaignNotFound`: the referenced campaign does not exist.
//! - `CampaignNotActive`: the campaign exists but is not accepting issuance.
//! - `CouponsExhausted`: the campaign has reached its coupon ceiling.
//! - `Storage` / `Counter`: durable store or counter store I/O failed.
//! - `ServiceShutdown`: a request arrived while the service was draining.

use core::fmt;

use tonic::Status;

pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for the coupon issuance service.
#[derive(Clone, thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// The client request was invalid or exceeded constraints.
    #[error("Invalid request: {reason}")]
    InvalidRequest { reason: String },

    /// The referenced campaign does not exist.
    #[error("Campaign not found: {campaign_id}")]
    CampaignNotFound { campaign_id: String },

    /// The campaign is not currently issuing coupons.
    #[error("Campaign is not active (status: {status})")]
    CampaignNotActive { status: String },

    /// The campaign has reached its coupon limit.
    #[error("Campaign has reached its coupon limit")]
    CouponsExhausted,

    /// Durable store I/O failure.
    #[error("Storage error: {context}")]
    Storage { context: String },

    /// Counter store I/O failure.
    #[error("Counter error: {context}")]
    Counter { context: String },

    /// The service is in the process of shutting down.
    #[error("Service is shutting down")]
    ServiceShutdown,
}

impl Error {
    /// Validation failure on an incoming request.
    pub fn invalid_request(reason: impl Into<String>) -> Self {
        Self::InvalidRequest {
            reason: reason.into(),
        }
    }

    /// The campaign id did not resolve to a row.
    pub fn not_found(campaign_id: impl fmt::Display) -> Self {
        Self::CampaignNotFound {
            campaign_id: campaign_id.to_string(),
        }
    }

    /// Wraps a durable-store failure, keeping only its display form.
    pub fn storage(err: impl fmt::Display) -> Self {
        Self::Storage {
            context: err.to_string(),
        }
    }

    /// Wraps a counter-store failure, keeping only its display form.
    pub fn counter(err: impl fmt::Display) -> Self {
        Self::Counter {
            context: err.to_string(),
        }
    }
}

impl From<Error> for Status {
    fn from(err: Error) -> Self {
        match err {
            Error::InvalidRequest { reason } => Self::invalid_argument(reason),
            Error::CampaignNotFound { campaign_id } => {
                Self::not_found(format!("campaign not found: {campaign_id}"))
            }
            Error::CampaignNotActive { status } => {
                Self::failed_precondition(format!("campaign is not active (status: {status})"))
            }
            Error::CouponsExhausted => {
                Self::resource_exhausted("campaign has reached its coupon limit")
            }
            Error::Storage { context } => Self::internal(format!("storage error: {context}")),
            Error::Counter { context } => Self::internal(format!("counter error: {context}")),
            Error::ServiceShutdown => Self::unavailable("service is shutting down"),
        }
    }
}
