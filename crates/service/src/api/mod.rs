//! Typed operations per screen, built on the dispatcher and the registries.

pub mod content;
pub mod inference;

pub use content::ContentClient;
pub use inference::InferenceClient;
