//! Inventory client with keyed caching and mutation invalidation.

use color_eyre::Result;
use std::sync::Arc;
use tracing::debug;

use crate::api::params::InventoryQuery;
use crate::api::types::{
  CreateItem, CreateLabel, CreateLocation, DuplicateOptions, ExportFile, InventoryItem,
  InventoryPage, Label, LocationDetail, LocationNode, UpdateItem, UpdateLocation,
};
use crate::api::{ApiClient, InventoryApi, LocationsApi};
use crate::cache::{CacheLayer, CacheResult, KeyFilter, QueryCategory, QueryKey};
use crate::config::Config;
use crate::error::ApiError;
use crate::query::Query;
use crate::session::Session;

/// Keys a successful item write makes stale.
fn item_writes() -> [KeyFilter; 2] {
  [
    KeyFilter::Category(QueryCategory::Inventory),
    KeyFilter::Category(QueryCategory::LocationItems),
  ]
}

/// Unwrap a cached read, noting when the network was skipped.
fn served<T>(what: &str, result: CacheResult<T>) -> Arc<T> {
  if result.source.is_cached() {
    debug!("Served {} from cache ({:?})", what, result.source);
  }
  result.data
}

/// Inventory client with transparent caching.
///
/// Reads go through the shared [`CacheLayer`] under their [`QueryKey`].
/// Writes are never cached; each one invalidates its keys once the server
/// confirms it.
#[derive(Clone)]
pub struct CachedInventoryClient {
  session: Session,
  inventory: InventoryApi,
  locations: LocationsApi,
  cache: CacheLayer,
}

impl CachedInventoryClient {
  pub fn new(config: &Config, session: Session) -> Result<Self> {
    let client = ApiClient::new(&config.api.url, config.api.timeout())?;
    let cache = CacheLayer::new(config.cache.stale_time(), config.cache.gc_time());
    if !config.cache.gc_time().is_zero() {
      cache.spawn_gc(config.cache.gc_time());
    }
    Ok(Self::with_parts(client, cache, session))
  }

  pub fn with_parts(client: ApiClient, cache: CacheLayer, session: Session) -> Self {
    Self {
      session,
      inventory: InventoryApi::new(client.clone()),
      locations: LocationsApi::new(client),
      cache,
    }
  }

  pub fn cache(&self) -> &CacheLayer {
    &self.cache
  }

  pub fn session(&self) -> &Session {
    &self.session
  }

  // --------------------------------------------------------------------------
  // Reads
  // --------------------------------------------------------------------------

  pub async fn inventory(&self, query: &InventoryQuery) -> Result<Arc<InventoryPage>, ApiError> {
    let api = self.inventory.clone();
    let session = self.session.clone();
    let query = query.clone();
    let result = self
      .cache
      .fetch(QueryKey::Inventory(query.clone()), move || {
        let api = api.clone();
        let session = session.clone();
        let query = query.clone();
        async move { api.get_inventory(&session, &query).await }
      })
      .await?;
    Ok(served("inventory", result))
  }

  pub async fn item(&self, id: &str) -> Result<Arc<InventoryItem>, ApiError> {
    let api = self.inventory.clone();
    let session = self.session.clone();
    let id = id.to_string();
    let result = self
      .cache
      .fetch(QueryKey::Item(id.clone()), move || {
        let api = api.clone();
        let session = session.clone();
        let id = id.clone();
        async move { api.get_item(&session, &id).await }
      })
      .await?;
    Ok(served("item", result))
  }

  pub async fn labels(&self) -> Result<Arc<Vec<Label>>, ApiError> {
    let api = self.inventory.clone();
    let session = self.session.clone();
    let result = self
      .cache
      .fetch(QueryKey::Labels, move || {
        let api = api.clone();
        let session = session.clone();
        async move { api.get_labels(&session).await }
      })
      .await?;
    Ok(served("labels", result))
  }

  pub async fn locations(&self, filter_children: bool) -> Result<Arc<Vec<LocationNode>>, ApiError> {
    let api = self.locations.clone();
    let session = self.session.clone();
    let result = self
      .cache
      .fetch(QueryKey::Locations { filter_children }, move || {
        let api = api.clone();
        let session = session.clone();
        async move { api.get_locations(&session, filter_children).await }
      })
      .await?;
    Ok(served("locations", result))
  }

  pub async fn location(&self, id: &str) -> Result<Arc<LocationDetail>, ApiError> {
    let api = self.locations.clone();
    let session = self.session.clone();
    let id = id.to_string();
    let result = self
      .cache
      .fetch(QueryKey::Location(id.clone()), move || {
        let api = api.clone();
        let session = session.clone();
        let id = id.clone();
        async move { api.get_location(&session, &id).await }
      })
      .await?;
    Ok(served("location", result))
  }

  /// Items stored in one location, as the location detail view lists them.
  pub async fn location_items(&self, id: &str) -> Result<Arc<InventoryPage>, ApiError> {
    let api = self.inventory.clone();
    let session = self.session.clone();
    let query = InventoryQuery::in_location(id);
    let result = self
      .cache
      .fetch(QueryKey::LocationItems(id.to_string()), move || {
        let api = api.clone();
        let session = session.clone();
        let query = query.clone();
        async move { api.get_inventory(&session, &query).await }
      })
      .await?;
    Ok(served("location items", result))
  }

  // --------------------------------------------------------------------------
  // Observed queries for views
  // --------------------------------------------------------------------------

  pub fn inventory_query(&self, query: InventoryQuery) -> Query<InventoryQuery, InventoryPage> {
    let api = self.inventory.clone();
    let session = self.session.clone();
    Query::new(self.cache.clone(), query, QueryKey::Inventory, move |q| {
      let api = api.clone();
      let session = session.clone();
      async move { api.get_inventory(&session, &q).await }
    })
  }

  pub fn locations_query(&self, filter_children: bool) -> Query<bool, Vec<LocationNode>> {
    let api = self.locations.clone();
    let session = self.session.clone();
    Query::new(
      self.cache.clone(),
      filter_children,
      |filter_children| QueryKey::Locations { filter_children },
      move |filter_children| {
        let api = api.clone();
        let session = session.clone();
        async move { api.get_locations(&session, filter_children).await }
      },
    )
  }

  pub fn location_query(&self, id: String) -> Query<String, LocationDetail> {
    let api = self.locations.clone();
    let session = self.session.clone();
    Query::new(self.cache.clone(), id, QueryKey::Location, move |id| {
      let api = api.clone();
      let session = session.clone();
      async move { api.get_location(&session, &id).await }
    })
  }

  // --------------------------------------------------------------------------
  // Mutations
  // --------------------------------------------------------------------------

  pub async fn create_item(&self, payload: &CreateItem) -> Result<InventoryItem, ApiError> {
    self
      .cache
      .mutate(
        self.inventory.create_inventory(&self.session, payload),
        &item_writes(),
      )
      .await
  }

  pub async fn update_item(&self, id: &str, payload: &UpdateItem) -> Result<InventoryItem, ApiError> {
    self
      .cache
      .mutate(
        self.inventory.update_inventory_item(&self.session, id, payload),
        &item_writes(),
      )
      .await
  }

  pub async fn delete_item(&self, id: &str) -> Result<(), ApiError> {
    self
      .cache
      .mutate(
        self.inventory.delete_inventory_item(&self.session, id),
        &item_writes(),
      )
      .await
  }

  pub async fn duplicate_item(
    &self,
    id: &str,
    options: &DuplicateOptions,
  ) -> Result<InventoryItem, ApiError> {
    self
      .cache
      .mutate(
        self
          .inventory
          .duplicate_inventory_item(&self.session, id, options),
        &item_writes(),
      )
      .await
  }

  /// Export is a read of the whole inventory; not cached.
  pub async fn export(&self) -> Result<ExportFile, ApiError> {
    self.inventory.export_inventory(&self.session).await
  }

  pub async fn create_label(&self, payload: &CreateLabel) -> Result<Label, ApiError> {
    self
      .cache
      .mutate(
        self.inventory.create_label(&self.session, payload),
        &[KeyFilter::Category(QueryCategory::Labels)],
      )
      .await
  }

  pub async fn create_location(&self, payload: &CreateLocation) -> Result<LocationDetail, ApiError> {
    self
      .cache
      .mutate(
        self.locations.create_location(&self.session, payload),
        &[KeyFilter::Category(QueryCategory::Locations)],
      )
      .await
  }

  pub async fn update_location(
    &self,
    id: &str,
    payload: &UpdateLocation,
  ) -> Result<LocationDetail, ApiError> {
    self
      .cache
      .mutate(
        self.locations.update_location(&self.session, id, payload),
        &[
          KeyFilter::Category(QueryCategory::Locations),
          KeyFilter::Exact(QueryKey::Location(id.to_string())),
        ],
      )
      .await
  }

  pub async fn delete_location(&self, id: &str) -> Result<(), ApiError> {
    self
      .cache
      .mutate(
        self.locations.delete_location(&self.session, id),
        &[
          KeyFilter::Category(QueryCategory::Locations),
          KeyFilter::Exact(QueryKey::Location(id.to_string())),
          KeyFilter::Category(QueryCategory::LocationItems),
        ],
      )
      .await
  }
}
