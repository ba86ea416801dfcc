//! Typed client and domain modules for the inventory service.

pub mod auth;
pub mod client;
pub mod inventory;
pub mod locations;
pub mod params;
pub mod types;

pub use auth::AuthApi;
pub use client::ApiClient;
pub use inventory::InventoryApi;
pub use locations::LocationsApi;
