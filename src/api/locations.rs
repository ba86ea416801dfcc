//! Location endpoints.

use super::client::{resource_path, ApiClient, RequestBody};
use super::params::{encode_flag, QueryParams};
use super::types::{CreateLocation, LocationDetail, LocationNode, UpdateLocation};
use crate::error::ApiError;
use crate::session::Session;

#[derive(Clone)]
pub struct LocationsApi {
  client: ApiClient,
}

impl LocationsApi {
  pub fn new(client: ApiClient) -> Self {
    Self { client }
  }

  /// List locations; with `filter_children` the service returns only roots,
  /// each carrying its subtree.
  pub async fn get_locations(
    &self,
    session: &Session,
    filter_children: bool,
  ) -> Result<Vec<LocationNode>, ApiError> {
    let mut params = QueryParams::new();
    params.push("filterChildren", encode_flag(filter_children));
    self.client.get(session, "locations", Some(&params)).await
  }

  pub async fn get_location(&self, session: &Session, id: &str) -> Result<LocationDetail, ApiError> {
    let path = resource_path(&["locations", id])?;
    self.client.get(session, &path, None).await
  }

  pub async fn create_location(
    &self,
    session: &Session,
    payload: &CreateLocation,
  ) -> Result<LocationDetail, ApiError> {
    self
      .client
      .post(session, "locations", RequestBody::json(payload)?)
      .await
  }

  pub async fn update_location(
    &self,
    session: &Session,
    id: &str,
    payload: &UpdateLocation,
  ) -> Result<LocationDetail, ApiError> {
    let path = resource_path(&["locations", id])?;
    self
      .client
      .put(session, &path, RequestBody::json(payload)?)
      .await
  }

  pub async fn delete_location(&self, session: &Session, id: &str) -> Result<(), ApiError> {
    let path = resource_path(&["locations", id])?;
    self.client.delete(session, &path).await
  }
}
