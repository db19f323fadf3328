//! Client-side session persistence: the auth token and user id written on
//! login, read on resume and cleared on logout.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use models::UserId;

use crate::errors::StoreError;
use crate::storage::json_map_store::JsonMapStore;

pub const AUTH_TOKEN_KEY: &str = "authToken";
pub const USER_ID_KEY: &str = "use_id";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub token: String,
    pub user_id: UserId,
}

/// Storage abstraction for the persisted session.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn save(&self, session: &Session) -> Result<(), StoreError>;
    /// `None` unless both values are present.
    async fn load(&self) -> Result<Option<Session>, StoreError>;
    async fn clear(&self) -> Result<(), StoreError>;
}

/// Session kept in a small JSON file under the data directory.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    store: Arc<JsonMapStore>,
}

impl FileSessionStore {
    pub async fn open<P: Into<PathBuf>>(path: P) -> Result<Self, StoreError> {
        Ok(Self { store: JsonMapStore::open(path).await? })
    }

    pub fn path(&self) -> &Path {
        self.store.path()
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn save(&self, session: &Session) -> Result<(), StoreError> {
        self.store
            .insert_many([
                (AUTH_TOKEN_KEY.to_string(), session.token.clone()),
                (USER_ID_KEY.to_string(), session.user_id.to_string()),
            ])
            .await
    }

    async fn load(&self) -> Result<Option<Session>, StoreError> {
        let token = self.store.get(AUTH_TOKEN_KEY).await;
        let user_id = self.store.get(USER_ID_KEY).await;
        Ok(match (token, user_id) {
            (Some(token), Some(user_id)) => Some(Session { token, user_id: UserId(user_id) }),
            _ => None,
        })
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.store.remove_many(&[AUTH_TOKEN_KEY, USER_ID_KEY]).await.map(|_| ())
    }
}

/// Simple in-memory store for tests and doc examples
pub mod mock {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct MemorySessionStore {
        session: Mutex<Option<Session>>,
    }

    #[async_trait]
    impl SessionStore for MemorySessionStore {
        async fn save(&self, session: &Session) -> Result<(), StoreError> {
            *self.session.lock().unwrap() = Some(session.clone());
            Ok(())
        }

        async fn load(&self) -> Result<Option<Session>, StoreError> {
            Ok(self.session.lock().unwrap().clone())
        }

        async fn clear(&self) -> Result<(), StoreError> {
            *self.session.lock().unwrap() = None;
            Ok(())
        }
    }
}
