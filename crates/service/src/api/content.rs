use std::sync::Arc;

use models::{
    DiseaseSolution, Dish, LoginRequest, LoginResponse, LogoutRequest, LogoutResponse, Medicine,
    Profile, SignupRequest, SignupResponse, UserId, UsernameResponse,
};
use tracing::instrument;

use crate::dispatch::{Dispatcher, UploadRequest};
use crate::errors::RequestError;
use crate::registry::{Endpoints, Service};

/// Account and catalog lookups against the `database` service.
#[derive(Debug, Clone)]
pub struct ContentClient {
    endpoints: Endpoints,
    dispatcher: Arc<Dispatcher>,
}

impl ContentClient {
    pub fn new(endpoints: Endpoints, dispatcher: Arc<Dispatcher>) -> Self {
        Self { endpoints, dispatcher }
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, path: &str, bearer: Option<&str>) -> Result<T, RequestError> {
        let service = Service::Database;
        let mut request = UploadRequest::get(service.name(), path);
        if let Some(token) = bearer {
            request = request.with_bearer(token);
        }
        self.dispatcher.execute_as(self.endpoints.for_service(service), request).await
    }

    async fn post<B, T>(&self, path: &str, body: &B, bearer: Option<&str>) -> Result<T, RequestError>
    where
        B: serde::Serialize,
        T: serde::de::DeserializeOwned,
    {
        let service = Service::Database;
        let mut request = UploadRequest::post_json(service.name(), path, body)?;
        if let Some(token) = bearer {
            request = request.with_bearer(token);
        }
        self.dispatcher.execute_as(self.endpoints.for_service(service), request).await
    }

    #[instrument(skip(self, input), fields(username = %input.username))]
    pub async fn login(&self, input: &LoginRequest) -> Result<LoginResponse, RequestError> {
        self.post("/login", input, None).await
    }

    #[instrument(skip(self, input), fields(username = %input.username))]
    pub async fn signup(&self, input: &SignupRequest) -> Result<SignupResponse, RequestError> {
        self.post("/signup", input, None).await
    }

    pub async fn get_username(&self, token: &str) -> Result<UsernameResponse, RequestError> {
        self.get("/getUsername", Some(token)).await
    }

    #[instrument(skip(self, token))]
    pub async fn logout(&self, token: &str, user_id: &UserId) -> Result<LogoutResponse, RequestError> {
        self.post("/logout", &LogoutRequest { user_id: user_id.clone() }, Some(token)).await
    }

    pub async fn get_profile(&self, token: &str) -> Result<Profile, RequestError> {
        self.get("/getProfile", Some(token)).await
    }

    pub async fn get_cuisine(&self) -> Result<Vec<Dish>, RequestError> {
        self.get("/getCuisine", None).await
    }

    pub async fn get_medicine(&self) -> Result<Vec<Medicine>, RequestError> {
        self.get("/getMedicine", None).await
    }

    /// Disease names used to filter the medicine list.
    pub async fn get_diseases(&self) -> Result<Vec<String>, RequestError> {
        self.get("/getDiseases", None).await
    }

    pub async fn get_disease_solutions(&self) -> Result<Vec<DiseaseSolution>, RequestError> {
        self.get("/getDiseaseSolutions", None).await
    }
}
