use crate::config::GatewayConfig;
use crate::error::{Error, Result};
use crate::model::Dataset;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Hands out datasets scoped to resource names, with the configured
/// defaults applied.
///
/// Datasets are cached by name behind a lock so relations can be built
/// concurrently against one gateway. The cached datasets themselves are
/// immutable values; the lock only guards the map.
#[derive(Debug)]
pub struct Gateway {
    config: GatewayConfig,
    /// Fully configured dataset the per-resource datasets derive from.
    template: Dataset,
    datasets: RwLock<HashMap<String, Dataset>>,
}

impl Gateway {
    /// Fails fast when required configuration is absent, naming every
    /// missing key at once.
    pub fn new(config: GatewayConfig) -> Result<Self> {
        let missing = config.missing_keys();
        let (Some(uri), Some(request_handler), Some(response_handler)) = (
            config.uri.clone(),
            config.request_handler.clone(),
            config.response_handler.clone(),
        ) else {
            return Err(Error::configuration(missing));
        };

        let mut template = Dataset::new(uri)
            .with_request_handler(request_handler)
            .with_response_handler(response_handler);
        if !config.headers.is_empty() {
            template = template.with_headers(config.headers.clone());
        }
        if !config.query_params.is_empty() {
            template = template.with_query_params(config.query_params.clone());
        }

        Ok(Self {
            config,
            template,
            datasets: RwLock::new(HashMap::new()),
        })
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Return the dataset for a resource name, building and caching it on
    /// first use. The resource name becomes the dataset's base path.
    pub fn dataset(&self, name: &str) -> Dataset {
        if let Some(dataset) = self.datasets.read().get(name) {
            return dataset.clone();
        }

        let mut datasets = self.datasets.write();
        // Another writer may have won the race between the locks.
        datasets
            .entry(name.to_string())
            .or_insert_with(|| {
                log::debug!("building dataset for resource `{name}`");
                self.template.with_base_path(name)
            })
            .clone()
    }

    pub fn dataset_exists(&self, name: &str) -> bool {
        self.datasets.read().contains_key(name)
    }
}
