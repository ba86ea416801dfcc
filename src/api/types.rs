//! Wire types for the inventory service.
//!
//! Entities are owned by the remote service; these types only describe their
//! shape. Nothing here validates beyond what deserialization requires.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ============================================================================
// Items
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryItem {
  pub id: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub asset_id: Option<String>,
  pub name: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  #[serde(default)]
  pub archived: bool,
  #[serde(default)]
  pub insured: bool,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub manufacturer: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub model_number: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub serial_number: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub purchase_price: Option<f64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub purchase_from: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub purchase_time: Option<String>,
  #[serde(default)]
  pub quantity: u32,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub sold_time: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub sold_price: Option<f64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub sold_to: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub sold_notes: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub warranty_expires: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub warranty_details: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub notes: Option<String>,
  /// Owning location, absent when unassigned
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub location: Option<Location>,
  #[serde(default)]
  pub labels: Vec<Label>,
  #[serde(default)]
  pub fields: Vec<CustomField>,
  #[serde(default)]
  pub attachments: Vec<Attachment>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl InventoryItem {
  /// The attachment marked primary, if any.
  pub fn primary_attachment(&self) -> Option<&Attachment> {
    self.attachments.iter().find(|a| a.primary)
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
  pub id: String,
  pub path: String,
  pub mime_type: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub thumbnail: Option<Thumbnail>,
  #[serde(default)]
  pub primary: bool,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thumbnail {
  pub path: String,
}

/// Custom field with exactly one typed value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "ApiCustomField", into = "ApiCustomField")]
pub struct CustomField {
  pub id: String,
  pub name: String,
  pub value: FieldValue,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
  Text(String),
  Number(f64),
  Boolean(bool),
  /// A type this client has no variant for; its value slots are kept as sent.
  Other {
    field_type: String,
    raw: Map<String, Value>,
  },
}

/// Custom field as the service sends it: a type tag plus one populated slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiCustomField {
  id: String,
  name: String,
  #[serde(rename = "type")]
  field_type: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  text_value: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  number_value: Option<f64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  boolean_value: Option<bool>,
  #[serde(flatten)]
  rest: Map<String, Value>,
}

impl From<ApiCustomField> for CustomField {
  fn from(raw: ApiCustomField) -> Self {
    let value = match raw.field_type.as_str() {
      "text" => FieldValue::Text(raw.text_value.unwrap_or_default()),
      "number" => FieldValue::Number(raw.number_value.unwrap_or_default()),
      "boolean" => FieldValue::Boolean(raw.boolean_value.unwrap_or_default()),
      _ => {
        let mut slots = raw.rest;
        if let Some(v) = raw.text_value {
          slots.insert("textValue".into(), Value::from(v));
        }
        if let Some(v) = raw.number_value {
          slots.insert("numberValue".into(), Value::from(v));
        }
        if let Some(v) = raw.boolean_value {
          slots.insert("booleanValue".into(), Value::from(v));
        }
        FieldValue::Other {
          field_type: raw.field_type,
          raw: slots,
        }
      }
    };
    CustomField {
      id: raw.id,
      name: raw.name,
      value,
    }
  }
}

impl From<CustomField> for ApiCustomField {
  fn from(field: CustomField) -> Self {
    let mut raw = ApiCustomField {
      id: field.id,
      name: field.name,
      field_type: String::new(),
      text_value: None,
      number_value: None,
      boolean_value: None,
      rest: Map::new(),
    };
    match field.value {
      FieldValue::Text(v) => {
        raw.field_type = "text".to_string();
        raw.text_value = Some(v);
      }
      FieldValue::Number(v) => {
        raw.field_type = "number".to_string();
        raw.number_value = Some(v);
      }
      FieldValue::Boolean(v) => {
        raw.field_type = "boolean".to_string();
        raw.boolean_value = Some(v);
      }
      FieldValue::Other { field_type, raw: slots } => {
        raw.field_type = field_type;
        raw.rest = slots;
      }
    }
    raw
  }
}

/// One page of `GET /items`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryPage {
  #[serde(default)]
  pub items: Vec<InventoryItem>,
  pub page: u32,
  pub page_size: u32,
  pub total: u64,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateItem {
  pub name: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  pub quantity: u32,
  pub location_id: String,
  pub label_ids: Vec<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub parent_id: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub manufacturer: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub model_number: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub serial_number: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub purchase_price: Option<f64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub purchase_from: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub purchase_time: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub warranty_expires: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub warranty_details: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub notes: Option<String>,
}

impl CreateItem {
  /// Required-field check done before sending; everything else is the service's call.
  pub fn missing_fields(&self) -> Vec<&'static str> {
    let mut missing = Vec::new();
    if self.name.trim().is_empty() {
      missing.push("name");
    }
    if self.location_id.trim().is_empty() {
      missing.push("locationId");
    }
    missing
  }
}

/// Partial update for `PUT /items/{id}`; unset fields are left alone.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateItem {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub quantity: Option<u32>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub location_id: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub label_ids: Option<Vec<String>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub manufacturer: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub model_number: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub serial_number: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub purchase_price: Option<f64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub purchase_from: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub purchase_time: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub warranty_expires: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub warranty_details: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub notes: Option<String>,
}

/// Options for `POST /items/{id}/duplicate`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateOptions {
  pub copy_attachments: bool,
  pub copy_custom_fields: bool,
  pub copy_maintenance: bool,
  pub copy_prefix: String,
}

impl Default for DuplicateOptions {
  fn default() -> Self {
    Self {
      copy_attachments: true,
      copy_custom_fields: true,
      copy_maintenance: true,
      copy_prefix: "Copy of ".to_string(),
    }
  }
}

/// Binary export with the upstream's content headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportFile {
  pub content_type: Option<String>,
  pub content_disposition: Option<String>,
  pub bytes: Vec<u8>,
}

impl ExportFile {
  /// Filename from `Content-Disposition: attachment; filename="..."`.
  ///
  /// Only the last path component is kept, so the name is always relative to
  /// the directory it is saved in.
  pub fn filename(&self) -> Option<String> {
    let disposition = self.content_disposition.as_deref()?;
    let name = disposition
      .split(';')
      .map(str::trim)
      .find_map(|part| part.strip_prefix("filename="))?
      .trim_matches('"');
    let name = name.rsplit(['/', '\\']).next()?.trim();
    if matches!(name, "" | "." | "..") {
      return None;
    }
    Some(name.to_string())
  }
}

// ============================================================================
// Labels
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Label {
  pub id: String,
  pub name: String,
  #[serde(default)]
  pub color: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CreateLabel {
  pub name: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub color: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
}

// ============================================================================
// Locations
// ============================================================================

/// Location as embedded in an item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
  pub id: String,
  pub name: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
  Location,
  Item,
}

/// Node of the mixed location/item tree returned by `GET /locations`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationNode {
  pub id: String,
  pub name: String,
  #[serde(rename = "type")]
  pub kind: NodeKind,
  #[serde(default)]
  pub children: Vec<LocationNode>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub item_count: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParentRef {
  pub id: String,
  pub name: String,
}

/// `GET /locations/{id}` with server-computed aggregates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationDetail {
  pub id: String,
  pub name: String,
  #[serde(default)]
  pub description: String,
  #[serde(default)]
  pub item_count: u64,
  #[serde(default)]
  pub total_price: f64,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
  #[serde(default)]
  pub children: Vec<LocationNode>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub parent: Option<ParentRef>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateLocation {
  pub name: String,
  pub description: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub parent_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateLocation {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub parent_id: Option<String>,
}

// ============================================================================
// Authentication
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
  pub username: String,
  pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
  pub token: String,
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_item_with_relations() {
    let item: InventoryItem = serde_json::from_value(json!({
      "id": "item-1",
      "name": "Drill",
      "quantity": 2,
      "location": {
        "id": "loc-1", "name": "Garage",
        "createdAt": "2024-01-01T00:00:00Z", "updatedAt": "2024-01-01T00:00:00Z"
      },
      "labels": [{
        "id": "lab-1", "name": "Tools", "color": "red",
        "createdAt": "2024-01-01T00:00:00Z", "updatedAt": "2024-01-01T00:00:00Z"
      }],
      "fields": [
        {"id": "f1", "name": "Voltage", "type": "number", "numberValue": 18.0},
        {"id": "f2", "name": "Cordless", "type": "boolean", "booleanValue": true}
      ],
      "attachments": [
        {"id": "a1", "path": "/a1.jpg", "mimeType": "image/jpeg", "primary": false,
         "createdAt": "2024-01-01T00:00:00Z", "updatedAt": "2024-01-01T00:00:00Z"},
        {"id": "a2", "path": "/a2.jpg", "mimeType": "image/jpeg", "primary": true,
         "createdAt": "2024-01-01T00:00:00Z", "updatedAt": "2024-01-01T00:00:00Z"}
      ],
      "createdAt": "2024-01-01T00:00:00Z",
      "updatedAt": "2024-02-01T00:00:00Z"
    }))
    .unwrap();

    assert_eq!(item.location.as_ref().map(|l| l.name.as_str()), Some("Garage"));
    assert_eq!(item.labels.len(), 1);
    assert_eq!(item.fields[0].value, FieldValue::Number(18.0));
    assert_eq!(item.fields[1].value, FieldValue::Boolean(true));
    assert_eq!(item.primary_attachment().map(|a| a.id.as_str()), Some("a2"));
  }

  #[test]
  fn test_unassigned_item_has_no_location() {
    let item: InventoryItem = serde_json::from_value(json!({
      "id": "item-2", "name": "Loose screws", "quantity": 0,
      "createdAt": "2024-01-01T00:00:00Z", "updatedAt": "2024-01-01T00:00:00Z"
    }))
    .unwrap();
    assert!(item.location.is_none());
    assert!(item.labels.is_empty());
  }

  #[test]
  fn test_custom_field_serializes_single_slot() {
    let field = CustomField {
      id: "f1".into(),
      name: "Color".into(),
      value: FieldValue::Text("blue".into()),
    };
    let value = serde_json::to_value(&field).unwrap();
    assert_eq!(
      value,
      json!({"id": "f1", "name": "Color", "type": "text", "textValue": "blue"})
    );
  }

  #[test]
  fn test_unknown_custom_field_type_passes_through() {
    let sent = json!({
      "id": "f", "name": "Service due", "type": "time",
      "timeValue": "2024-06-01T00:00:00Z"
    });
    let field: CustomField = serde_json::from_value(sent.clone()).unwrap();
    match &field.value {
      FieldValue::Other { field_type, raw } => {
        assert_eq!(field_type, "time");
        assert_eq!(raw["timeValue"], "2024-06-01T00:00:00Z");
      }
      other => panic!("unexpected value {:?}", other),
    }
    assert_eq!(serde_json::to_value(&field).unwrap(), sent);

    let item: InventoryItem = serde_json::from_value(json!({
      "id": "i1", "name": "Mower", "quantity": 1,
      "fields": [sent, {"id": "g", "name": "Fuel", "type": "text", "textValue": "petrol"}],
      "createdAt": "2024-01-01T00:00:00Z", "updatedAt": "2024-01-01T00:00:00Z"
    }))
    .unwrap();
    assert_eq!(item.fields.len(), 2);
    assert_eq!(item.fields[1].value, FieldValue::Text("petrol".into()));
  }

  #[test]
  fn test_export_filename_is_a_bare_name() {
    let file = |disposition: &str| ExportFile {
      content_type: None,
      content_disposition: Some(disposition.to_string()),
      bytes: vec![],
    };
    assert_eq!(
      file("attachment; filename=\"inventory.xlsx\"").filename().as_deref(),
      Some("inventory.xlsx")
    );
    assert_eq!(
      file("attachment; filename=\"../../tmp/evil.sh\"").filename().as_deref(),
      Some("evil.sh")
    );
    assert_eq!(
      file("attachment; filename=C:\\Users\\x\\out.xlsx").filename().as_deref(),
      Some("out.xlsx")
    );
    assert_eq!(file("attachment; filename=\"/etc/\"").filename(), None);
    assert_eq!(file("attachment; filename=\"..\"").filename(), None);
    assert_eq!(file("attachment").filename(), None);
  }

  #[test]
  fn test_create_item_required_fields() {
    let payload = CreateItem {
      name: "  ".into(),
      ..Default::default()
    };
    assert_eq!(payload.missing_fields(), vec!["name", "locationId"]);

    let payload = CreateItem {
      name: "Drill".into(),
      location_id: "loc-1".into(),
      quantity: 1,
      ..Default::default()
    };
    assert!(payload.missing_fields().is_empty());
    let body = serde_json::to_value(&payload).unwrap();
    assert_eq!(body["locationId"], "loc-1");
    assert_eq!(body["labelIds"], json!([]));
    assert!(body.get("parentId").is_none());
  }

  #[test]
  fn test_duplicate_defaults() {
    let body = serde_json::to_value(DuplicateOptions::default()).unwrap();
    assert_eq!(
      body,
      json!({
        "copyAttachments": true,
        "copyCustomFields": true,
        "copyMaintenance": true,
        "copyPrefix": "Copy of "
      })
    );
  }

  #[test]
  fn test_export_filename() {
    let file = ExportFile {
      content_type: Some("application/vnd.ms-excel".into()),
      content_disposition: Some("attachment; filename=\"inventory.xlsx\"".into()),
      bytes: vec![],
    };
    assert_eq!(file.filename().as_deref(), Some("inventory.xlsx"));

    let bare = ExportFile {
      content_disposition: Some("attachment".into()),
      ..file
    };
    assert_eq!(bare.filename(), None);
  }

  #[test]
  fn test_location_tree_node_kinds() {
    let nodes: Vec<LocationNode> = serde_json::from_value(json!([
      {"id": "l1", "name": "House", "type": "location", "children": [
        {"id": "i1", "name": "Lamp", "type": "item"}
      ]}
    ]))
    .unwrap();
    assert_eq!(nodes[0].kind, NodeKind::Location);
    assert_eq!(nodes[0].children[0].kind, NodeKind::Item);
  }
}
