//! Cache keys: a resource category plus every parameter that shapes the response.

use std::fmt;

use crate::api::params::InventoryQuery;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryCategory {
  Inventory,
  Labels,
  Locations,
  Location,
  LocationItems,
}

impl QueryCategory {
  pub fn name(&self) -> &'static str {
    match self {
      QueryCategory::Inventory => "inventory",
      QueryCategory::Labels => "labels",
      QueryCategory::Locations => "locations",
      QueryCategory::Location => "location",
      QueryCategory::LocationItems => "location-items",
    }
  }
}

/// Structurally equal keys share one cache entry and one in-flight request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryKey {
  /// A page of the item list
  Inventory(InventoryQuery),
  /// A single item; lives under the inventory category
  Item(String),
  Labels,
  Locations { filter_children: bool },
  Location(String),
  /// Items stored in one location
  LocationItems(String),
}

impl QueryKey {
  pub fn category(&self) -> QueryCategory {
    match self {
      Self::Inventory(_) | Self::Item(_) => QueryCategory::Inventory,
      Self::Labels => QueryCategory::Labels,
      Self::Locations { .. } => QueryCategory::Locations,
      Self::Location(_) => QueryCategory::Location,
      Self::LocationItems(_) => QueryCategory::LocationItems,
    }
  }
}

impl fmt::Display for QueryKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Inventory(q) => write!(
        f,
        "inventory page {} (size {}, q '{}', {} label(s), {} location(s), {} parent(s))",
        q.page,
        q.page_size,
        q.q,
        q.labels.len(),
        q.locations.len(),
        q.parent_ids.len()
      ),
      Self::Item(id) => write!(f, "inventory item {}", id),
      Self::Labels => write!(f, "labels"),
      Self::Locations { filter_children } => {
        if *filter_children {
          write!(f, "location tree")
        } else {
          write!(f, "all locations")
        }
      }
      Self::Location(id) => write!(f, "location {}", id),
      Self::LocationItems(id) => write!(f, "items in location {}", id),
    }
  }
}

/// Selects the entries a mutation invalidates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyFilter {
  /// Every key in the category (prefix match)
  Category(QueryCategory),
  Exact(QueryKey),
}

impl KeyFilter {
  pub fn matches(&self, key: &QueryKey) -> bool {
    match self {
      KeyFilter::Category(category) => key.category() == *category,
      KeyFilter::Exact(exact) => exact == key,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_structural_equality() {
    let a = QueryKey::Inventory(InventoryQuery {
      page: 1,
      page_size: 10,
      locations: vec!["L1".into()],
      ..Default::default()
    });
    let b = QueryKey::Inventory(InventoryQuery {
      page: 1,
      page_size: 10,
      locations: vec!["L1".into()],
      ..Default::default()
    });
    assert_eq!(a, b);

    let c = QueryKey::Inventory(InventoryQuery {
      page: 2,
      page_size: 10,
      locations: vec!["L1".into()],
      ..Default::default()
    });
    assert_ne!(a, c);
  }

  #[test]
  fn test_category_filter_is_prefix() {
    let filter = KeyFilter::Category(QueryCategory::Inventory);
    assert!(filter.matches(&QueryKey::Inventory(InventoryQuery::default())));
    assert!(filter.matches(&QueryKey::Item("i1".into())));
    assert!(!filter.matches(&QueryKey::Labels));
    assert!(!filter.matches(&QueryKey::LocationItems("l1".into())));
  }

  #[test]
  fn test_locations_and_location_are_distinct() {
    let list = KeyFilter::Category(QueryCategory::Locations);
    assert!(list.matches(&QueryKey::Locations { filter_children: true }));
    assert!(!list.matches(&QueryKey::Location("l1".into())));

    let exact = KeyFilter::Exact(QueryKey::Location("l1".into()));
    assert!(exact.matches(&QueryKey::Location("l1".into())));
    assert!(!exact.matches(&QueryKey::Location("l2".into())));
  }
}
