//! Wire types for the fleet-management API.

use serde::{Deserialize, Serialize};

/// Answer from the token service.
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    #[serde(default)]
    pub token: String,
}

/// One device as the management API reports it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagedDevice {
    #[serde(rename = "deviceId")]
    pub device_id: String,

    #[serde(rename = "ipAddress", default)]
    pub ip_address: Option<String>,

    #[serde(default)]
    pub hostname: Option<String>,

    #[serde(rename = "status", default)]
    pub status: Option<String>,
}

/// A page of the device inventory.
#[derive(Debug, Default, Deserialize)]
pub struct DeviceListing {
    #[serde(default)]
    pub data: Vec<ManagedDevice>,
}
