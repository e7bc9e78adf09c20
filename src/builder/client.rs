// SPDX-License-Identifier: MIT

//! Catalog client - composes the host's source and item providers
//!
//! Non-searchable sources never reach the item provider, item pages are
//! capped at the configured page size and the sources catalog can be kept
//! for a short while since it rarely changes within a session.

use crate::conditions::{
    ConditionsError, Item, ItemId, ItemProvider, Source, SourceCatalog, SourceProvider,
};
use std::env;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Default number of items per page
pub const DEFAULT_PAGE_SIZE: usize = 20;

/// Catalog client settings
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub page_size: usize,
    /// How long a fetched sources catalog is reused. Zero disables caching.
    pub sources_ttl: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            sources_ttl: Duration::ZERO,
        }
    }
}

impl ClientConfig {
    /// Read `VC_PAGE_SIZE` and `VC_SOURCES_CACHE_SECS`, falling back to defaults
    pub fn from_env() -> Result<Self, ConditionsError> {
        let mut config = Self::default();
        if let Some(size) = env_number("VC_PAGE_SIZE")? {
            if size == 0 {
                return Err(ConditionsError::config("VC_PAGE_SIZE must be positive"));
            }
            config.page_size = size as usize;
        }
        if let Some(secs) = env_number("VC_SOURCES_CACHE_SECS")? {
            config.sources_ttl = Duration::from_secs(secs);
        }
        Ok(config)
    }
}

/// Parse an optional numeric environment variable
pub(crate) fn env_number(name: &str) -> Result<Option<u64>, ConditionsError> {
    match env::var(name) {
        Ok(value) => value.trim().parse::<u64>().map(Some).map_err(|_| {
            ConditionsError::config(format!("{} must be a number, got '{}'", name, value))
        }),
        Err(_) => Ok(None),
    }
}

struct CachedSources {
    catalog: SourceCatalog,
    fetched_at: Instant,
}

/// Fetches sources and items through host supplied providers
pub struct CatalogClient {
    sources: Arc<dyn SourceProvider>,
    items: Arc<dyn ItemProvider>,
    config: ClientConfig,
    cache: RwLock<Option<CachedSources>>,
}

impl CatalogClient {
    pub fn new(
        sources: Arc<dyn SourceProvider>,
        items: Arc<dyn ItemProvider>,
        config: ClientConfig,
    ) -> Self {
        Self {
            sources,
            items,
            config,
            cache: RwLock::new(None),
        }
    }

    /// Build a client from one value providing both capabilities
    pub fn from_provider<P>(provider: Arc<P>, config: ClientConfig) -> Self
    where
        P: SourceProvider + ItemProvider + 'static,
    {
        Self::new(provider.clone(), provider, config)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Fetch the grouped sources catalog
    pub async fn list_sources(&self) -> Result<SourceCatalog, ConditionsError> {
        if !self.config.sources_ttl.is_zero() {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.as_ref() {
                if cached.fetched_at.elapsed() < self.config.sources_ttl {
                    log::debug!("Using cached sources catalog");
                    return Ok(cached.catalog.clone());
                }
            }
        }

        let catalog = self.sources.list_sources().await?;
        log::info!(
            "Fetched sources catalog with {} groups",
            catalog.groups().len()
        );

        if !self.config.sources_ttl.is_zero() {
            let mut cache = self.cache.write().await;
            *cache = Some(CachedSources {
                catalog: catalog.clone(),
                fetched_at: Instant::now(),
            });
        }

        Ok(catalog)
    }

    /// Fetch one page of items of `source` matching `query`
    pub async fn list_items(
        &self,
        source: &Source,
        query: &str,
    ) -> Result<Vec<Item>, ConditionsError> {
        if !source.searchable {
            return Ok(vec![]);
        }

        let mut items = self.items.list_items(source.items_key(), query).await?;
        if items.len() > self.config.page_size {
            log::debug!(
                "Truncating {} items from '{}' to page size {}",
                items.len(),
                source.items_key(),
                self.config.page_size
            );
            items.truncate(self.config.page_size);
        }
        Ok(items)
    }

    /// Resolve saved identifiers to items; unknown identifiers are left out
    pub async fn resolve_items(
        &self,
        source: &Source,
        ids: &[ItemId],
    ) -> Result<Vec<Item>, ConditionsError> {
        if !source.searchable || ids.is_empty() {
            return Ok(vec![]);
        }
        let items = self.items.resolve_items(source.items_key(), ids).await?;
        Ok(items.into_iter().filter(|i| ids.contains(&i.id)).collect())
    }

    /// Drop the cached sources catalog
    pub async fn invalidate(&self) {
        *self.cache.write().await = None;
    }
}
