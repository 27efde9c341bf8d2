//! Crop activity scheduling and coalesced parcel weather for the agrotrack platform.

pub mod client;
pub mod config;
pub mod error;
pub mod schedule;
pub mod scheduler;
pub mod shutdown;
pub mod weather;
