//! Endpoint resolution: logical service name -> `host:port` base URL.
//!
//! A [`ServiceRegistry`] is an immutable value. [`RegistryHandle`] lets a
//! whole registry be swapped atomically; every resolution reads the current
//! value, so nothing derived from it is ever cached.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwap;
use configs::{RegistriesConfig, RegistryConfig};
use tracing::info;

use crate::errors::ConfigurationError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceRegistry {
    label: String,
    base_host: String,
    ports: BTreeMap<String, String>,
}

impl ServiceRegistry {
    pub fn new<I, K, V>(label: impl Into<String>, base_host: impl Into<String>, ports: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            label: label.into(),
            base_host: base_host.into(),
            ports: ports.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }

    pub fn from_config(label: impl Into<String>, cfg: &RegistryConfig) -> Self {
        Self::new(label, cfg.base_host.clone(), cfg.ports.clone())
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn base_host(&self) -> &str {
        &self.base_host
    }

    pub fn contains(&self, service: &str) -> bool {
        self.ports.contains_key(service)
    }

    pub fn service_names(&self) -> impl Iterator<Item = &str> {
        self.ports.keys().map(String::as_str)
    }

    /// `base_host + ":" + port` for a registered service.
    pub fn get_url(&self, service: &str) -> Result<String, ConfigurationError> {
        let port = self.ports.get(service).ok_or_else(|| ConfigurationError::UnknownService {
            registry: self.label.clone(),
            service: service.to_string(),
        })?;
        Ok(format!("{}:{}", self.base_host, port))
    }

    /// Resolved base URL with a fixed path suffix appended.
    pub fn endpoint(&self, service: &str, path: &str) -> Result<String, ConfigurationError> {
        let base = self.get_url(service)?;
        if path.is_empty() || path.starts_with('/') {
            Ok(format!("{base}{path}"))
        } else {
            Ok(format!("{base}/{path}"))
        }
    }

    /// Copy of this registry pointing at another host.
    pub fn with_base_host(&self, base_host: impl Into<String>) -> Self {
        Self { base_host: base_host.into(), ..self.clone() }
    }
}

/// Shared, swappable reference to one registry.
#[derive(Clone)]
pub struct RegistryHandle {
    inner: Arc<ArcSwap<ServiceRegistry>>,
}

impl RegistryHandle {
    pub fn new(registry: ServiceRegistry) -> Self {
        Self { inner: Arc::new(ArcSwap::from_pointee(registry)) }
    }

    pub fn current(&self) -> Arc<ServiceRegistry> {
        self.inner.load_full()
    }

    pub fn get_url(&self, service: &str) -> Result<String, ConfigurationError> {
        self.inner.load().get_url(service)
    }

    pub fn endpoint(&self, service: &str, path: &str) -> Result<String, ConfigurationError> {
        self.inner.load().endpoint(service, path)
    }

    /// Install a new registry value; subsequent resolutions see it immediately.
    pub fn replace(&self, registry: ServiceRegistry) {
        info!(
            registry = %registry.label(),
            base_host = %registry.base_host(),
            "registry replaced"
        );
        self.inner.store(Arc::new(registry));
    }
}

impl fmt::Debug for RegistryHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RegistryHandle").field(&*self.inner.load()).finish()
    }
}

/// Backend family a registry describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Content,
    Inference,
}

/// Every logical service a screen talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Service {
    Database,
    Health,
    Disease,
    NutritionSingleGrain,
    NutritionMultiGrain,
    OutlineMultiGrain,
}

impl Service {
    pub const ALL: [Service; 6] = [
        Service::Database,
        Service::Health,
        Service::Disease,
        Service::NutritionSingleGrain,
        Service::NutritionMultiGrain,
        Service::OutlineMultiGrain,
    ];

    /// Key in the registry's port table.
    pub fn name(&self) -> &'static str {
        match self {
            Service::Database => "database",
            Service::Health => "health",
            Service::Disease => "disease",
            Service::NutritionSingleGrain => "nutrition_extract_single_grain",
            Service::NutritionMultiGrain => "nutrition_extract_multi_grain",
            Service::OutlineMultiGrain => "outline_Multi_Grain",
        }
    }

    /// Registry the service is resolved against.
    pub fn backend(&self) -> Backend {
        match self {
            Service::Disease | Service::OutlineMultiGrain => Backend::Inference,
            Service::Database
            | Service::Health
            | Service::NutritionSingleGrain
            | Service::NutritionMultiGrain => Backend::Content,
        }
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Both registries, passed explicitly to every client that resolves endpoints.
#[derive(Debug, Clone)]
pub struct Endpoints {
    content: RegistryHandle,
    inference: RegistryHandle,
}

impl Endpoints {
    pub fn new(content: ServiceRegistry, inference: ServiceRegistry) -> Self {
        Self { content: RegistryHandle::new(content), inference: RegistryHandle::new(inference) }
    }

    pub fn from_config(cfg: &RegistriesConfig) -> Self {
        Self::new(
            ServiceRegistry::from_config("content", &cfg.content),
            ServiceRegistry::from_config("inference", &cfg.inference),
        )
    }

    pub fn registry(&self, backend: Backend) -> &RegistryHandle {
        match backend {
            Backend::Content => &self.content,
            Backend::Inference => &self.inference,
        }
    }

    pub fn for_service(&self, service: Service) -> &RegistryHandle {
        self.registry(service.backend())
    }

    pub fn url(&self, service: Service) -> Result<String, ConfigurationError> {
        self.for_service(service).get_url(service.name())
    }

    /// Resolution for every known service, in declaration order.
    pub fn resolved(&self) -> Vec<(Service, Result<String, ConfigurationError>)> {
        Service::ALL.iter().map(|s| (*s, self.url(*s))).collect()
    }

    /// Fail on the first service whose registry has no port for it.
    pub fn validate_routes(&self) -> Result<(), ConfigurationError> {
        for service in Service::ALL {
            self.url(service)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn content() -> ServiceRegistry {
        ServiceRegistry::new(
            "content",
            "http://192.168.18.8",
            [("database", "5001"), ("health", "5000")],
        )
    }

    #[test]
    fn resolves_registered_services() {
        let reg = content();
        assert_eq!(reg.get_url("database").unwrap(), "http://192.168.18.8:5001");
        assert_eq!(reg.get_url("health").unwrap(), "http://192.168.18.8:5000");
    }

    #[test]
    fn every_registered_pair_resolves_exactly() {
        let cfg = RegistriesConfig::default();
        for (label, table) in [("content", &cfg.content), ("inference", &cfg.inference)] {
            let reg = ServiceRegistry::from_config(label, table);
            for (service, port) in &table.ports {
                assert_eq!(reg.get_url(service).unwrap(), format!("{}:{}", table.base_host, port));
            }
        }
    }

    #[test]
    fn unknown_service_is_configuration_error() {
        let err = content().get_url("outline_Multi_Grain").unwrap_err();
        assert_eq!(
            err,
            ConfigurationError::UnknownService {
                registry: "content".into(),
                service: "outline_Multi_Grain".into(),
            }
        );
        assert!(content().endpoint("nope", "/x").is_err());
    }

    #[test]
    fn introspection_lists_registered_services() {
        let reg = content();
        assert!(reg.contains("database"));
        assert!(!reg.contains("outline_Multi_Grain"));
        assert_eq!(reg.service_names().collect::<Vec<_>>(), vec!["database", "health"]);
    }

    #[test]
    fn endpoint_joins_path() {
        let reg = content();
        assert_eq!(reg.endpoint("database", "/login").unwrap(), "http://192.168.18.8:5001/login");
        assert_eq!(reg.endpoint("database", "login").unwrap(), "http://192.168.18.8:5001/login");
        assert_eq!(reg.endpoint("database", "").unwrap(), "http://192.168.18.8:5001");
    }

    #[test]
    fn handle_sees_replacement_immediately() {
        let handle = RegistryHandle::new(content());
        let before = handle.current();
        assert_eq!(handle.get_url("database").unwrap(), "http://192.168.18.8:5001");

        handle.replace(content().with_base_host("http://10.0.0.2"));
        assert_eq!(handle.get_url("database").unwrap(), "http://10.0.0.2:5001");
        // earlier snapshots are untouched
        assert_eq!(before.base_host(), "http://192.168.18.8");
    }

    #[test]
    fn registries_are_independent() {
        let endpoints = Endpoints::from_config(&RegistriesConfig::default());
        endpoints
            .registry(Backend::Inference)
            .replace(ServiceRegistry::new("inference", "http://10.1.1.1", [("disease", "9000")]));
        assert_eq!(endpoints.url(Service::Database).unwrap(), "http://192.168.18.8:5001");
        assert_eq!(endpoints.url(Service::Disease).unwrap(), "http://10.1.1.1:9000");
    }

    #[test]
    fn default_routes_are_complete() {
        let endpoints = Endpoints::from_config(&RegistriesConfig::default());
        endpoints.validate_routes().unwrap();
        assert_eq!(
            endpoints.url(Service::OutlineMultiGrain).unwrap(),
            "http://192.168.18.8:5001"
        );
        assert_eq!(endpoints.resolved().len(), Service::ALL.len());
    }

    #[test]
    fn validate_routes_reports_missing_service() {
        let endpoints = Endpoints::new(
            content(),
            ServiceRegistry::new("inference", "http://192.168.18.8", [("disease", "5002")]),
        );
        let err = endpoints.validate_routes().unwrap_err();
        assert!(err.to_string().contains("nutrition_extract_single_grain"), "{err}");
    }
}
