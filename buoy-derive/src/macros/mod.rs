//! Derive macro implementations

mod buoy_record;

pub use buoy_record::derive_buoy_record;
