//! gRPC service implementation and background-task lifecycle.
//!
//! - [`handler`] — the `coupon.v1.CouponService` entry point
//!   ([`IssuanceService`]), which also owns the writer and scheduler tasks
//!   and their shutdown.

pub mod handler;

pub use handler::IssuanceService;
