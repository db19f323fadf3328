//! SafeRice client core.
//! - `registry`: logical service name -> `host:port`, two independent registries.
//! - `dispatch`: one JSON or multipart exchange per call, classified errors, bounded timeout.
//! - `api` / `auth`: typed per-screen operations on top of the two.
//! - `submission`: per-screen `Idle -> Submitting -> {Succeeded, Failed}` with cancellation.

pub mod errors;
pub mod registry;
pub mod dispatch;
pub mod observability;
pub mod storage;
pub mod session;
pub mod submission;
pub mod api;
pub mod auth;
pub mod catalog;

pub use dispatch::{Dispatcher, ImagePart, UploadRequest};
pub use errors::{ConfigurationError, RequestError, TransportKind};
pub use registry::{Endpoints, RegistryHandle, Service, ServiceRegistry};
