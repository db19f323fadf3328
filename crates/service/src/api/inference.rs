use std::sync::Arc;

use models::{Diagnosis, MultiGrainNutrition, OutlineReport, SingleGrainReport};
use serde::de::DeserializeOwned;
use tracing::{info, instrument};

use crate::dispatch::{Dispatcher, ImagePart, UploadRequest};
use crate::errors::RequestError;
use crate::registry::{Endpoints, Service};

/// Photo uploads to the ML inference services.
#[derive(Debug, Clone)]
pub struct InferenceClient {
    endpoints: Endpoints,
    dispatcher: Arc<Dispatcher>,
}

impl InferenceClient {
    pub fn new(endpoints: Endpoints, dispatcher: Arc<Dispatcher>) -> Self {
        Self { endpoints, dispatcher }
    }

    #[instrument(skip(self, image), fields(uri = %image.uri))]
    async fn upload<T: DeserializeOwned>(&self, service: Service, path: &str, image: ImagePart) -> Result<T, RequestError> {
        let request = UploadRequest::post_image(service.name(), path, image);
        let out = self.dispatcher.execute_as(self.endpoints.for_service(service), request).await?;
        info!(%service, "inference completed");
        Ok(out)
    }

    pub async fn diagnose_health(&self, image: ImagePart) -> Result<Diagnosis, RequestError> {
        self.upload(Service::Health, "/diagnoseHealth", image).await
    }

    pub async fn diagnose_disease(&self, image: ImagePart) -> Result<Diagnosis, RequestError> {
        self.upload(Service::Disease, "/diagnoseDisease", image).await
    }

    pub async fn analyze_rice(&self, image: ImagePart) -> Result<SingleGrainReport, RequestError> {
        self.upload(Service::NutritionSingleGrain, "/analyze_rice", image).await
    }

    pub async fn classify_grains(&self, image: ImagePart) -> Result<MultiGrainNutrition, RequestError> {
        self.upload(Service::NutritionMultiGrain, "/classify_grains", image).await
    }

    pub async fn analyze_outline(&self, image: ImagePart) -> Result<OutlineReport, RequestError> {
        self.upload(Service::OutlineMultiGrain, "/analyze", image.with_file_name("upload.jpg")).await
    }
}
