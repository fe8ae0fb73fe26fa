//! Entra ID directory user lookups

use crate::error::Result;
use crate::graph::GraphClient;
use serde::Deserialize;

/// Directory profile of a device's primary user
///
/// The department field is free text maintained by directory admins; it is
/// matched verbatim against category names.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub department: Option<String>,
}

/// Fetch a user's profile, selecting only the fields reconciliation needs
pub async fn get_profile(client: &GraphClient, user_id: &str) -> Result<UserProfile> {
    client
        .get(&format!(
            "users/{}?$select=id,displayName,department",
            user_id
        ))
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_with_null_department() {
        let json = r#"{"id": "u1", "displayName": "Dana Reyes", "department": null}"#;
        let profile: UserProfile = serde_json::from_str(json).unwrap();
        assert!(profile.department.is_none());
    }
}
