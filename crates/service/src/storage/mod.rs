//! On-disk state for the client. Currently only the flat string map that
//! backs the persisted session.

pub mod json_map_store;

pub use json_map_store::JsonMapStore;
