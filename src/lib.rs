//! Interval-indexed allocation of scarce, time-bound values and capacity.
//!
//! - [`index`]: bucketed interval index shared by everything else.
//! - [`value`]: value-spaces and the allocation task deciding reuse or a
//!   fresh collision-free value.
//! - [`utilization`]: expiring, incrementally loaded occupancy cache.
//! - [`store`]: collaborator contracts and an in-memory implementation.

pub mod config;
pub mod index;
pub mod limits;
pub mod model;
pub mod observability;
pub mod store;
pub mod utilization;
pub mod value;
