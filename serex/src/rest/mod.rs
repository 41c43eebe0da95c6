//! Fleet-management REST API client.
//!
//! The management API is a separate subsystem from console provisioning:
//! token-based auth (a short-lived token fetched per operation and attached
//! as the `x-token-id` header) over a device-inventory CRUD surface. Any
//! non-2xx answer is the operation's failure.

mod client;
mod types;

pub use client::{FleetApiClient, FleetApiConfig};
pub use types::{DeviceListing, ManagedDevice};
