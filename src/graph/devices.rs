//! Intune device-management Graph API operations
//!
//! Typed wrappers over the endpoints the category reconciler consumes:
//! the category catalog, the managed device inventory, the per-device
//! primary user, and the category assignment write.

use crate::error::Result;
use crate::graph::{GraphClient, PaginatedResponse};
use serde::{Deserialize, Serialize};

/// A selectable device category from the tenant's catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceCategory {
    pub id: String,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// An Intune managed device, trimmed to the fields reconciliation reads
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagedDevice {
    pub id: String,
    #[serde(default)]
    pub device_name: String,
    #[serde(default)]
    pub operating_system: String,
    /// Current category label; Intune reports "Unknown" when none is set
    #[serde(default)]
    pub device_category_display_name: Option<String>,
}

/// A user associated with a managed device
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceUser {
    pub id: String,
}

/// Fetch the complete category catalog, following pagination to exhaustion
pub async fn list_categories(client: &GraphClient) -> Result<Vec<DeviceCategory>> {
    client
        .get_all_pages("deviceManagement/deviceCategories")
        .await
}

/// Fetch every managed device for one operating system family
///
/// The filter is applied server-side; pagination is followed until the
/// next-page cursor is absent.
pub async fn list_devices_by_os(client: &GraphClient, os: &str) -> Result<Vec<ManagedDevice>> {
    let endpoint = format!(
        "deviceManagement/managedDevices?$filter=operatingSystem eq '{}'\
         &$select=id,deviceName,operatingSystem,deviceCategoryDisplayName",
        os
    );
    client.get_all_pages(&endpoint).await
}

/// Look up a device's primary user
///
/// The users collection lists the primary user first; an empty collection
/// means the device has none, which is a normal state for kiosks and
/// shared devices.
pub async fn primary_user(client: &GraphClient, device_id: &str) -> Result<Option<DeviceUser>> {
    let response: PaginatedResponse<DeviceUser> = client
        .get(&format!(
            "deviceManagement/managedDevices/{}/users",
            device_id
        ))
        .await?;

    Ok(response.value.into_iter().next())
}

/// Assign a category to a managed device
///
/// Binds the device's deviceCategory navigation property via a $ref PUT.
/// The write is idempotent; re-assigning the current category succeeds.
pub async fn assign_category(
    client: &GraphClient,
    device_id: &str,
    category_id: &str,
) -> Result<()> {
    let endpoint = format!(
        "deviceManagement/managedDevices/{}/deviceCategory/$ref",
        device_id
    );
    let body = serde_json::json!({
        "@odata.id": format!(
            "{}/deviceManagement/deviceCategories/{}",
            client.base_url(),
            category_id
        )
    });

    client.put(&endpoint, &body).await
}
