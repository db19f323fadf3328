//! Shared runtime helpers for the SafeRice client binaries and services.

pub mod env;
pub mod utils;
