//! Query-string shaping for list endpoints.
//!
//! The client only sends string pairs, so each parameter type has its own
//! encoder. ID lists are comma-joined into a single value
//! (`locations=L1,L2`); the service splits them back on `,`. IDs are opaque
//! but must not themselves contain a comma.

/// Ordered query parameters. Empty values are never emitted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
  pairs: Vec<(String, String)>,
}

impl QueryParams {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn push(&mut self, key: &str, value: impl Into<String>) {
    let value = value.into();
    if !value.is_empty() {
      self.pairs.push((key.to_string(), value));
    }
  }

  pub fn push_opt(&mut self, key: &str, value: Option<String>) {
    if let Some(value) = value {
      self.push(key, value);
    }
  }

  pub fn is_empty(&self) -> bool {
    self.pairs.is_empty()
  }

  pub fn pairs(&self) -> &[(String, String)] {
    &self.pairs
  }

  pub fn get(&self, key: &str) -> Option<&str> {
    self
      .pairs
      .iter()
      .find(|(k, _)| k == key)
      .map(|(_, v)| v.as_str())
  }
}

/// Encode a positive number; zero means "not set".
pub fn encode_count(value: u32) -> Option<String> {
  (value > 0).then(|| value.to_string())
}

pub fn encode_flag(value: bool) -> String {
  value.to_string()
}

/// Comma-join an ID list; an empty list is omitted entirely.
pub fn encode_ids(ids: &[String]) -> Option<String> {
  if ids.is_empty() {
    None
  } else {
    Some(ids.join(","))
  }
}

/// Inverse of [`encode_ids`]. IDs are taken exactly as sent, spaces and
/// empty entries included; only an empty value means "no IDs".
pub fn decode_ids(value: &str) -> Vec<String> {
  if value.is_empty() {
    return Vec::new();
  }
  value.split(',').map(String::from).collect()
}

/// Parameters of `GET /items`. Also the inventory cache key payload, so every
/// field that changes the response lives here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct InventoryQuery {
  pub page: u32,
  pub page_size: u32,
  pub q: String,
  pub labels: Vec<String>,
  pub locations: Vec<String>,
  pub parent_ids: Vec<String>,
}

impl InventoryQuery {
  /// Items stored directly in one location, as the location detail view lists them.
  pub fn in_location(location_id: &str) -> Self {
    Self {
      locations: vec![location_id.to_string()],
      ..Default::default()
    }
  }

  pub fn to_params(&self) -> QueryParams {
    let mut params = QueryParams::new();
    params.push_opt("page", encode_count(self.page));
    params.push_opt("pageSize", encode_count(self.page_size));
    params.push("q", self.q.trim());
    params.push_opt("labels", encode_ids(&self.labels));
    params.push_opt("locations", encode_ids(&self.locations));
    params.push_opt("parentIds", encode_ids(&self.parent_ids));
    params
  }

  pub fn from_params(params: &QueryParams) -> Self {
    let count = |key| {
      params
        .get(key)
        .and_then(|v| v.parse().ok())
        .unwrap_or_default()
    };
    let ids = |key| params.get(key).map(decode_ids).unwrap_or_default();

    Self {
      page: count("page"),
      page_size: count("pageSize"),
      q: params.get("q").unwrap_or_default().to_string(),
      labels: ids("labels"),
      locations: ids("locations"),
      parent_ids: ids("parentIds"),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_id_list_encoding() {
    let ids = vec!["L1".to_string(), "L2".to_string()];
    assert_eq!(encode_ids(&ids).as_deref(), Some("L1,L2"));
    assert_eq!(decode_ids("L1,L2"), ids);
    assert_eq!(encode_ids(&[]), None);
    assert!(decode_ids("").is_empty());
  }

  #[test]
  fn test_id_list_round_trip_keeps_ids_intact() {
    let ids: Vec<String> = vec![" shelf 2 ".into(), "".into(), "Küche/Regal".into(), "a-b_c".into()];
    let encoded = encode_ids(&ids).unwrap();
    assert_eq!(encoded, " shelf 2 ,,Küche/Regal,a-b_c");
    assert_eq!(decode_ids(&encoded), ids);

    let query = InventoryQuery {
      labels: vec!["red label".into(), "L 2".into()],
      ..Default::default()
    };
    assert_eq!(InventoryQuery::from_params(&query.to_params()), query);
  }

  #[test]
  fn test_counts_and_flags() {
    assert_eq!(encode_count(0), None);
    assert_eq!(encode_count(3).as_deref(), Some("3"));
    assert_eq!(encode_flag(true), "true");
  }

  #[test]
  fn test_inventory_query_params() {
    let query = InventoryQuery {
      page: 2,
      page_size: 10,
      q: "drill".into(),
      labels: vec![],
      locations: vec!["L1".into(), "L2".into()],
      parent_ids: vec!["P1".into()],
    };
    let params = query.to_params();
    assert_eq!(
      params.pairs(),
      &[
        ("page".to_string(), "2".to_string()),
        ("pageSize".to_string(), "10".to_string()),
        ("q".to_string(), "drill".to_string()),
        ("locations".to_string(), "L1,L2".to_string()),
        ("parentIds".to_string(), "P1".to_string()),
      ]
    );
    assert_eq!(InventoryQuery::from_params(&params), query);
  }

  #[test]
  fn test_empty_query_sends_nothing() {
    assert!(InventoryQuery::default().to_params().is_empty());
  }

  #[test]
  fn test_location_items_query() {
    let params = InventoryQuery::in_location("L9").to_params();
    assert_eq!(params.get("locations"), Some("L9"));
    assert_eq!(params.get("page"), None);
  }
}
