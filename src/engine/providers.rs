//! Provider registry — local data sources answering by data type.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use super::AggregationEngine;
use crate::types::Result;

/// A local data source.
///
/// Providers are registered under a data type but asked for every collect;
/// it is up to the provider to return what it has for the requested type
/// (typically an empty map for types it does not serve).
#[async_trait]
pub trait DataProvider: Send + Sync {
    async fn provide(
        &self,
        data_type: &str,
        filter_criteria: Option<&str>,
    ) -> Result<Map<String, Value>>;
}

pub(crate) struct ProviderEntry {
    pub data_type: String,
    pub provider: Arc<dyn DataProvider>,
}

impl AggregationEngine {
    /// Register a provider for `data_type`.
    ///
    /// The returned registration id is opaque; hold it for
    /// [`unregister_data_provider`](Self::unregister_data_provider).
    pub fn register_data_provider(
        &self,
        data_type: impl Into<String>,
        provider: Arc<dyn DataProvider>,
    ) -> String {
        let data_type = data_type.into();
        let registration_id = format!("{}-{}", data_type, Uuid::new_v4());
        self.providers.insert(
            registration_id.clone(),
            ProviderEntry {
                data_type: data_type.clone(),
                provider,
            },
        );
        debug!(%data_type, %registration_id, "registered data provider");
        registration_id
    }

    /// Remove a provider. Returns true iff the registration existed.
    pub fn unregister_data_provider(&self, registration_id: &str) -> bool {
        let removed = self.providers.remove(registration_id).is_some();
        if removed {
            debug!(registration_id, "unregistered data provider");
        }
        removed
    }

    /// Distinct data types currently served by this node, sorted.
    pub fn local_data_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self
            .providers
            .iter()
            .map(|entry| entry.value().data_type.clone())
            .collect();
        types.sort();
        types.dedup();
        types
    }

    /// Gather contributions from every registered provider.
    ///
    /// This is "gather", not "aggregate": colliding keys are overwritten in
    /// invocation order. A failing provider is skipped and its siblings still
    /// contribute.
    pub(crate) async fn collect(
        &self,
        data_type: &str,
        filter_criteria: Option<&str>,
    ) -> Map<String, Value> {
        // Snapshot so registration changes during the awaits are harmless.
        let providers: Vec<(String, Arc<dyn DataProvider>)> = self
            .providers
            .iter()
            .map(|entry| (entry.key().clone(), Arc::clone(&entry.value().provider)))
            .collect();

        let mut out = Map::new();
        for (registration_id, provider) in providers {
            match provider.provide(data_type, filter_criteria).await {
                Ok(contribution) => {
                    for (key, value) in contribution {
                        out.insert(key, value);
                    }
                }
                Err(e) => {
                    warn!(
                        %registration_id,
                        data_type,
                        error = %e,
                        "provider failed, skipping its contribution"
                    );
                }
            }
        }
        out
    }
}
