use std::sync::Arc;

use models::{LoginRequest, Profile, SignupRequest};
use tracing::{info, instrument, warn};

use super::errors::AuthError;
use crate::api::ContentClient;
use crate::errors::RequestError;
use crate::session::{Session, SessionStore};

/// Auth workflows independent of any UI
pub struct AuthService<S: SessionStore> {
    content: ContentClient,
    store: Arc<S>,
}

impl<S: SessionStore> AuthService<S> {
    pub fn new(content: ContentClient, store: Arc<S>) -> Self {
        Self { content, store }
    }

    /// Log in and persist the returned token and user id.
    ///
    /// # Examples
    /// ```no_run
    /// use std::sync::Arc;
    /// use service::{api::ContentClient, auth::AuthService, dispatch::Dispatcher, registry::Endpoints};
    /// use service::session::mock::MemorySessionStore;
    ///
    /// let cfg = configs::AppConfig::default();
    /// let dispatcher = Arc::new(Dispatcher::new(&cfg.dispatch).unwrap());
    /// let content = ContentClient::new(Endpoints::from_config(&cfg.registries), dispatcher);
    /// let auth = AuthService::new(content, Arc::new(MemorySessionStore::default()));
    /// let input = models::LoginRequest { username: "bob".into(), password: "x".into() };
    /// let session = tokio::runtime::Runtime::new().unwrap().block_on(auth.login(input)).unwrap();
    /// println!("logged in as user {}", session.user_id);
    /// ```
    #[instrument(skip(self, input), fields(username = %input.username))]
    pub async fn login(&self, input: LoginRequest) -> Result<Session, AuthError> {
        input.validate()?;
        let resp = self.content.login(&input).await?;
        if !resp.success {
            warn!("login rejected by backend");
            return Err(AuthError::Rejected(resp.message.unwrap_or_else(|| "login failed".into())));
        }
        let (Some(token), Some(user_id)) = (resp.token, resp.use_id) else {
            return Err(RequestError::decode("login response is missing token or use_id").into());
        };
        let session = Session { token, user_id };
        self.store.save(&session).await?;
        info!(user_id = %session.user_id, "user_logged_in");
        Ok(session)
    }

    /// Create an account; returns the backend's confirmation message.
    #[instrument(skip(self, input), fields(username = %input.username))]
    pub async fn signup(&self, input: SignupRequest) -> Result<Option<String>, AuthError> {
        input.validate()?;
        let resp = self.content.signup(&input).await?;
        if !resp.success {
            return Err(AuthError::Rejected(resp.message.unwrap_or_else(|| "signup failed".into())));
        }
        info!("user_signed_up");
        Ok(resp.message)
    }

    /// Session persisted by an earlier login, if any.
    pub async fn restore(&self) -> Result<Option<Session>, AuthError> {
        Ok(self.store.load().await?)
    }

    async fn require_session(&self) -> Result<Session, AuthError> {
        self.store.load().await?.ok_or(AuthError::NotLoggedIn)
    }

    pub async fn username(&self) -> Result<String, AuthError> {
        let session = self.require_session().await?;
        let resp = self.content.get_username(&session.token).await?;
        resp.username.ok_or_else(|| {
            AuthError::Rejected(resp.message.unwrap_or_else(|| "failed to fetch username".into()))
        })
    }

    pub async fn profile(&self) -> Result<Profile, AuthError> {
        let session = self.require_session().await?;
        Ok(self.content.get_profile(&session.token).await?)
    }

    /// Log out on the backend, then forget the local session.
    #[instrument(skip(self))]
    pub async fn logout(&self) -> Result<(), AuthError> {
        let session = self.require_session().await?;
        let resp = self.content.logout(&session.token, &session.user_id).await?;
        if !resp.success {
            return Err(AuthError::Rejected(resp.message.unwrap_or_else(|| "logout failed".into())));
        }
        self.store.clear().await?;
        info!(user_id = %session.user_id, "user_logged_out");
        Ok(())
    }
}
