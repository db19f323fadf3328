//! Auth module: login/signup/logout workflows over the content backend, with
//! the resulting session persisted through a [`SessionStore`](crate::session::SessionStore).

pub mod errors;
pub mod service;

pub use errors::AuthError;
pub use service::AuthService;
