//! Campaign activation scheduling.
//!
//! [`activator`] drains due entries from the activation index and promotes
//! campaigns from `scheduled` to `active` without ever scanning the campaign
//! table.

pub mod activator;

pub use activator::run_activator;
