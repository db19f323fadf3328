use thiserror::Error;

use crate::errors::{RequestError, StoreError};

/// Business errors for auth workflows
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("{0}")]
    Rejected(String),
    #[error("not logged in")]
    NotLoggedIn,
    #[error(transparent)]
    Request(#[from] RequestError),
    #[error("session store error: {0}")]
    Store(#[from] StoreError),
}

impl AuthError {
    /// Stable numeric code for external mapping/logging
    pub fn code(&self) -> u16 {
        match self {
            AuthError::Validation(_) => 1001,
            AuthError::Rejected(_) => 1002,
            AuthError::NotLoggedIn => 1004,
            AuthError::Request(_) => 1100,
            AuthError::Store(_) => 1200,
        }
    }
}

impl From<models::errors::ModelError> for AuthError {
    fn from(e: models::errors::ModelError) -> Self {
        match e {
            models::errors::ModelError::Validation(m) => AuthError::Validation(m),
            models::errors::ModelError::Decode(m) => AuthError::Request(RequestError::decode(m)),
        }
    }
}
