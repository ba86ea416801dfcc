//! Item and label endpoints.

use super::client::{resource_path, ApiClient, RequestBody};
use super::params::InventoryQuery;
use super::types::{
  CreateItem, CreateLabel, DuplicateOptions, ExportFile, InventoryItem, InventoryPage, Label,
  UpdateItem,
};
use crate::error::ApiError;
use crate::session::Session;

#[derive(Clone)]
pub struct InventoryApi {
  client: ApiClient,
}

impl InventoryApi {
  pub fn new(client: ApiClient) -> Self {
    Self { client }
  }

  /// One page of items matching the query.
  pub async fn get_inventory(
    &self,
    session: &Session,
    query: &InventoryQuery,
  ) -> Result<InventoryPage, ApiError> {
    let params = query.to_params();
    self.client.get(session, "items", Some(&params)).await
  }

  pub async fn get_item(&self, session: &Session, id: &str) -> Result<InventoryItem, ApiError> {
    let path = resource_path(&["items", id])?;
    self.client.get(session, &path, None).await
  }

  pub async fn create_inventory(
    &self,
    session: &Session,
    payload: &CreateItem,
  ) -> Result<InventoryItem, ApiError> {
    self
      .client
      .post(session, "items", RequestBody::json(payload)?)
      .await
  }

  pub async fn update_inventory_item(
    &self,
    session: &Session,
    id: &str,
    payload: &UpdateItem,
  ) -> Result<InventoryItem, ApiError> {
    let path = resource_path(&["items", id])?;
    self
      .client
      .put(session, &path, RequestBody::json(payload)?)
      .await
  }

  pub async fn delete_inventory_item(&self, session: &Session, id: &str) -> Result<(), ApiError> {
    let path = resource_path(&["items", id])?;
    self.client.delete(session, &path).await
  }

  /// Ask the service to clone an item; the copy gets a new identity.
  pub async fn duplicate_inventory_item(
    &self,
    session: &Session,
    id: &str,
    options: &DuplicateOptions,
  ) -> Result<InventoryItem, ApiError> {
    let path = resource_path(&["items", id, "duplicate"])?;
    self
      .client
      .post(session, &path, RequestBody::json(options)?)
      .await
  }

  /// Spreadsheet export with the service's content headers.
  pub async fn export_inventory(&self, session: &Session) -> Result<ExportFile, ApiError> {
    self.client.download(session, "items/export").await
  }

  pub async fn get_labels(&self, session: &Session) -> Result<Vec<Label>, ApiError> {
    self.client.get(session, "labels", None).await
  }

  pub async fn create_label(&self, session: &Session, payload: &CreateLabel) -> Result<Label, ApiError> {
    self
      .client
      .post(session, "labels", RequestBody::json(payload)?)
      .await
  }
}
