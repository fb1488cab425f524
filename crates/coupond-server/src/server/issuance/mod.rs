//! Issuance orchestration.
//!
//! [`coordinator`] drives a single `IssueCoupon` request across the counter
//! store, the code generator and the durable store, including the
//! compensation paths and the transition to `finished` on the last unit.

pub mod coordinator;

pub use coordinator::Issuer;
