//! View state: pagination, filters and location selection.
//!
//! Views own their queries and are driven by `tick()`, which settles
//! debounced input, feeds the current filters into the query key and polls
//! for results.

use std::time::{Duration, Instant};

use crate::api::params::InventoryQuery;
use crate::api::types::{InventoryItem, InventoryPage, LocationNode};
use crate::debounce::Debouncer;
use crate::query::Query;
use crate::tree::{LocationArena, TreeRecord};

/// Paged, filtered item list.
///
/// Changing any filter resets the page to 1. Search text only reaches the
/// query once it has settled for the debounce window.
pub struct InventoryView {
  filters: InventoryQuery,
  search_input: String,
  debouncer: Debouncer<String>,
  query: Query<InventoryQuery, InventoryPage>,
}

impl InventoryView {
  /// Starts fetching the query's initial params right away.
  pub fn new(mut query: Query<InventoryQuery, InventoryPage>, debounce: Duration) -> Self {
    let mut filters = query.params().clone();
    filters.page = filters.page.max(1);
    filters.page_size = filters.page_size.max(1);
    query.set_params(filters.clone());
    query.fetch();

    Self {
      search_input: filters.q.clone(),
      filters,
      debouncer: Debouncer::new(debounce),
      query,
    }
  }

  pub fn page(&self) -> u32 {
    self.filters.page
  }

  pub fn page_size(&self) -> u32 {
    self.filters.page_size
  }

  /// Raw search text as typed.
  pub fn search_input(&self) -> &str {
    &self.search_input
  }

  /// Search text the current query is keyed on.
  pub fn search(&self) -> &str {
    &self.filters.q
  }

  pub fn filters(&self) -> &InventoryQuery {
    &self.filters
  }

  pub fn query(&self) -> &Query<InventoryQuery, InventoryPage> {
    &self.query
  }

  pub fn items(&self) -> &[InventoryItem] {
    self
      .query
      .data()
      .map(|page| page.items.as_slice())
      .unwrap_or(&[])
  }

  pub fn total(&self) -> u64 {
    self.query.data().map(|page| page.total).unwrap_or_default()
  }

  pub fn total_pages(&self) -> u32 {
    let size = u64::from(self.filters.page_size.max(1));
    u32::try_from(self.total().div_ceil(size)).unwrap_or(u32::MAX)
  }

  pub fn set_page(&mut self, page: u32) {
    self.filters.page = page.max(1);
    self.sync();
  }

  pub fn next_page(&mut self) {
    if self.filters.page < self.total_pages() {
      self.set_page(self.filters.page + 1);
    }
  }

  pub fn prev_page(&mut self) {
    if self.filters.page > 1 {
      self.set_page(self.filters.page - 1);
    }
  }

  pub fn set_page_size(&mut self, page_size: u32) {
    self.filters.page_size = page_size.max(1);
    self.reset_page();
  }

  /// Record a keystroke; the query only changes once typing pauses.
  pub fn set_search(&mut self, text: impl Into<String>, now: Instant) {
    let text = text.into();
    self.search_input = text.clone();
    self.debouncer.push(text, now);
  }

  /// Apply pending search text immediately.
  pub fn submit_search(&mut self) {
    if let Some(text) = self.debouncer.flush() {
      self.apply_search(text);
    }
  }

  pub fn set_labels(&mut self, labels: Vec<String>) {
    self.filters.labels = labels;
    self.reset_page();
  }

  pub fn set_locations(&mut self, locations: Vec<String>) {
    self.filters.locations = locations;
    self.reset_page();
  }

  pub fn set_parent_ids(&mut self, parent_ids: Vec<String>) {
    self.filters.parent_ids = parent_ids;
    self.reset_page();
  }

  /// Manual retry after an error.
  pub fn retry(&mut self) {
    self.query.refetch();
  }

  /// Settle debounced search and poll the query. Returns `true` if the
  /// displayed data changed.
  pub fn tick(&mut self, now: Instant) -> bool {
    if let Some(text) = self.debouncer.poll(now) {
      self.apply_search(text);
    }
    self.query.poll()
  }

  fn apply_search(&mut self, text: String) {
    let text = text.trim().to_string();
    if text != self.filters.q {
      self.filters.q = text;
      self.reset_page();
    }
  }

  fn reset_page(&mut self) {
    self.filters.page = 1;
    self.sync();
  }

  fn sync(&mut self) {
    self.query.set_params(self.filters.clone());
  }
}

/// Location tree with a selection restricted to location nodes.
pub struct LocationsView {
  query: Query<bool, Vec<LocationNode>>,
  arena: LocationArena,
  selected: Option<String>,
}

impl LocationsView {
  pub fn new(mut query: Query<bool, Vec<LocationNode>>) -> Self {
    query.fetch();
    Self {
      query,
      arena: LocationArena::default(),
      selected: None,
    }
  }

  pub fn query(&self) -> &Query<bool, Vec<LocationNode>> {
    &self.query
  }

  pub fn arena(&self) -> &LocationArena {
    &self.arena
  }

  pub fn selected(&self) -> Option<&TreeRecord> {
    self.selected.as_deref().and_then(|id| self.arena.get(id))
  }

  /// Select a location. Item nodes and unknown IDs are rejected.
  pub fn select(&mut self, id: &str) -> bool {
    if !self.arena.is_selectable(id) {
      return false;
    }
    self.selected = Some(id.to_string());
    true
  }

  pub fn clear_selection(&mut self) {
    self.selected = None;
  }

  /// Path from the root to the selection.
  pub fn breadcrumbs(&self) -> Vec<&TreeRecord> {
    self
      .selected
      .as_deref()
      .map(|id| self.arena.ancestors(id))
      .unwrap_or_default()
  }

  pub fn retry(&mut self) {
    self.query.refetch();
  }

  pub fn tick(&mut self) -> bool {
    if !self.query.poll() {
      return false;
    }

    if let Some(nodes) = self.query.data() {
      self.arena = LocationArena::from_nodes(nodes);
    }
    // A refetch may have removed the selected location
    if self
      .selected
      .as_deref()
      .is_some_and(|id| !self.arena.is_selectable(id))
    {
      self.selected = None;
    }
    true
  }
}
