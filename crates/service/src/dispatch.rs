//! One network exchange per call: build a JSON or multipart request, send it,
//! classify the outcome.
//!
//! The dispatcher never retries, never caches and never de-duplicates. Every
//! call is bounded by the configured request timeout.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use configs::DispatchConfig;
use reqwest::header::ACCEPT;
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio_util::io::ReaderStream;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::errors::RequestError;
use crate::observability::{DISPATCH_DURATION, DISPATCH_FAILURES_TOTAL, DISPATCH_TOTAL};
use crate::registry::RegistryHandle;

/// Multipart field name every inference endpoint reads the photo from.
pub const DEFAULT_IMAGE_FIELD: &str = "image";

// metrics label for calls made with a pre-resolved URL
const DIRECT_LABEL: &str = "direct";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// A single binary part of a multipart upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePart {
    pub uri: String,
    pub field_name: String,
    pub file_name: String,
    pub mime_type: String,
}

impl ImagePart {
    pub fn new(
        uri: impl Into<String>,
        field_name: impl Into<String>,
        file_name: impl Into<String>,
        mime_type: impl Into<String>,
    ) -> Self {
        Self {
            uri: uri.into(),
            field_name: field_name.into(),
            file_name: file_name.into(),
            mime_type: mime_type.into(),
        }
    }

    /// JPEG photo under the `image` field.
    pub fn jpeg(uri: impl Into<String>) -> Self {
        Self::new(uri, DEFAULT_IMAGE_FIELD, "image.jpg", "image/jpeg")
    }

    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = file_name.into();
        self
    }

    /// Local path behind `uri`; `file://` URIs are unwrapped.
    pub fn path(&self) -> PathBuf {
        PathBuf::from(self.uri.strip_prefix("file://").unwrap_or(&self.uri))
    }

    fn invalid(&self, message: impl Into<String>) -> RequestError {
        RequestError::InvalidImage { uri: self.uri.clone(), message: message.into() }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Empty,
    Json(Value),
    Image(ImagePart),
}

/// One outbound call against a logical service. Consumed by [`Dispatcher::execute`].
#[derive(Debug, Clone, PartialEq)]
pub struct UploadRequest {
    pub service: String,
    pub path: String,
    pub method: Method,
    pub bearer: Option<String>,
    pub body: RequestBody,
}

impl UploadRequest {
    pub fn get(service: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            path: path.into(),
            method: Method::Get,
            bearer: None,
            body: RequestBody::Empty,
        }
    }

    pub fn post_json<T: Serialize + ?Sized>(
        service: impl Into<String>,
        path: impl Into<String>,
        payload: &T,
    ) -> Result<Self, RequestError> {
        let body = serde_json::to_value(payload)
            .map_err(|e| RequestError::decode(format!("cannot encode request body: {e}")))?;
        Ok(Self {
            service: service.into(),
            path: path.into(),
            method: Method::Post,
            bearer: None,
            body: RequestBody::Json(body),
        })
    }

    pub fn post_image(service: impl Into<String>, path: impl Into<String>, image: ImagePart) -> Self {
        Self {
            service: service.into(),
            path: path.into(),
            method: Method::Post,
            bearer: None,
            body: RequestBody::Image(image),
        }
    }

    pub fn with_bearer(mut self, token: impl Into<String>) -> Self {
        self.bearer = Some(token.into());
        self
    }
}

/// Stateless request sender. Holds only the HTTP client handle and the timeout.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    client: reqwest::Client,
    request_timeout: Duration,
}

impl Dispatcher {
    pub fn new(cfg: &DispatchConfig) -> Result<Self, RequestError> {
        Self::with_timeouts(cfg.request_timeout(), cfg.connect_timeout())
    }

    pub fn with_timeouts(request_timeout: Duration, connect_timeout: Duration) -> Result<Self, RequestError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .connect_timeout(connect_timeout.min(request_timeout))
            .build()?;
        Ok(Self { client, request_timeout })
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// POST `payload` as JSON and decode the JSON reply.
    pub async fn send_json<T: Serialize + ?Sized>(&self, endpoint: &str, payload: &T) -> Result<Value, RequestError> {
        let body = serde_json::to_value(payload)
            .map_err(|e| RequestError::decode(format!("cannot encode request body: {e}")))?;
        self.send(DIRECT_LABEL, endpoint, Method::Post, None, &RequestBody::Json(body)).await
    }

    /// GET with no body, for read-only lookups.
    pub async fn fetch_json(&self, endpoint: &str) -> Result<Value, RequestError> {
        self.send(DIRECT_LABEL, endpoint, Method::Get, None, &RequestBody::Empty).await
    }

    /// POST a multipart body carrying exactly one file part.
    pub async fn send_image(&self, endpoint: &str, image: &ImagePart) -> Result<Value, RequestError> {
        self.send(DIRECT_LABEL, endpoint, Method::Post, None, &RequestBody::Image(image.clone())).await
    }

    /// Resolve the request's service against `registry`, then dispatch it.
    pub async fn execute(&self, registry: &RegistryHandle, request: UploadRequest) -> Result<Value, RequestError> {
        let endpoint = match registry.endpoint(&request.service, &request.path) {
            Ok(endpoint) => endpoint,
            Err(e) => {
                // counted as an attempt so failures never exceed the total
                DISPATCH_TOTAL.with_label_values(&[request.service.as_str()]).inc();
                DISPATCH_FAILURES_TOTAL.with_label_values(&[request.service.as_str(), "configuration"]).inc();
                warn!(service = %request.service, error = %e, "endpoint resolution failed");
                return Err(e.into());
            }
        };
        self.send(&request.service, &endpoint, request.method, request.bearer.as_deref(), &request.body)
            .await
    }

    /// Like [`execute`](Self::execute), decoding the payload into `T`.
    pub async fn execute_as<T: DeserializeOwned>(
        &self,
        registry: &RegistryHandle,
        request: UploadRequest,
    ) -> Result<T, RequestError> {
        let value = self.execute(registry, request).await?;
        serde_json::from_value(value).map_err(|e| RequestError::decode(e.to_string()))
    }

    #[instrument(
        name = "dispatch",
        skip(self, bearer, body),
        fields(request_id = %Uuid::new_v4())
    )]
    async fn send(
        &self,
        service: &str,
        endpoint: &str,
        method: Method,
        bearer: Option<&str>,
        body: &RequestBody,
    ) -> Result<Value, RequestError> {
        DISPATCH_TOTAL.with_label_values(&[service]).inc();
        let started = Instant::now();

        let result = self.exchange(endpoint, method, bearer, body).await;

        let elapsed = started.elapsed();
        DISPATCH_DURATION.with_label_values(&[service]).observe(elapsed.as_secs_f64());
        match &result {
            Ok(_) => debug!(elapsed_ms = elapsed.as_millis() as u64, "request succeeded"),
            Err(e) => {
                DISPATCH_FAILURES_TOTAL.with_label_values(&[service, e.kind()]).inc();
                warn!(elapsed_ms = elapsed.as_millis() as u64, kind = e.kind(), error = %e, "request failed");
            }
        }
        result
    }

    async fn exchange(
        &self,
        endpoint: &str,
        method: Method,
        bearer: Option<&str>,
        body: &RequestBody,
    ) -> Result<Value, RequestError> {
        let mut builder = match method {
            Method::Get => self.client.get(endpoint),
            Method::Post => self.client.post(endpoint),
        }
        .header(ACCEPT, "application/json");
        if let Some(token) = bearer {
            builder = builder.bearer_auth(token);
        }
        builder = match body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(value),
            RequestBody::Image(image) => builder.multipart(image_form(image).await?),
        };

        let exchange = async {
            let resp = builder.send().await?;
            let status = resp.status();
            let bytes = resp.bytes().await?;
            Ok::<_, RequestError>((status, bytes))
        };
        let (status, bytes) = tokio::time::timeout(self.request_timeout, exchange)
            .await
            .map_err(|_| RequestError::timeout(format!("no response within {:?}", self.request_timeout)))??;

        if !status.is_success() {
            return Err(RequestError::Http { status: status.as_u16(), message: server_message(&bytes) });
        }
        if bytes.is_empty() {
            return Err(RequestError::decode("empty response body"));
        }
        serde_json::from_slice(&bytes).map_err(|e| RequestError::decode(e.to_string()))
    }
}

async fn image_form(image: &ImagePart) -> Result<Form, RequestError> {
    let path = image.path();
    let file = tokio::fs::File::open(&path)
        .await
        .map_err(|e| image.invalid(format!("cannot open {}: {e}", path.display())))?;
    let len = file
        .metadata()
        .await
        .map_err(|e| image.invalid(format!("cannot stat {}: {e}", path.display())))?
        .len();
    let stream = reqwest::Body::wrap_stream(ReaderStream::new(file));
    let part = Part::stream_with_length(stream, len)
        .file_name(image.file_name.clone())
        .mime_str(&image.mime_type)
        .map_err(|e| image.invalid(format!("bad mime type {:?}: {e}", image.mime_type)))?;
    Ok(Form::new().part(image.field_name.clone(), part))
}

/// Server-supplied failure text: JSON `message` or `error`, else the raw body.
fn server_message(body: &[u8]) -> Option<String> {
    if let Ok(Value::Object(map)) = serde_json::from_slice::<Value>(body) {
        for key in ["message", "error"] {
            if let Some(Value::String(s)) = map.get(key) {
                return Some(s.clone());
            }
        }
    }
    let text = String::from_utf8_lossy(body);
    if text.trim().is_empty() {
        None
    } else {
        Some(text.into_owned())
    }
}
