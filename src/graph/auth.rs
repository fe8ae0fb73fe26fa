use crate::config::{ConfigManager, TenantConfig, TokenCache};
use crate::error::{Cat365Error, Result};
use oauth2::{
    AuthUrl, ClientId, ClientSecret, Scope, TokenResponse, TokenUrl, basic::BasicClient,
    reqwest::async_http_client,
};
use std::time::Duration;

const MICROSOFT_AUTHORITY: &str = "https://login.microsoftonline.com";
const GRAPH_SCOPE: &str = "https://graph.microsoft.com/.default";

/// Graph API permissions the app registration needs (documentation)
#[allow(dead_code)]
pub const REQUIRED_SCOPES: &[&str] = &[
    "DeviceManagementManagedDevices.ReadWrite.All",
    "User.Read.All",
];

pub struct GraphAuth {
    config_manager: ConfigManager,
}

impl GraphAuth {
    pub fn new(config_manager: ConfigManager) -> Self {
        Self { config_manager }
    }

    /// Authenticate using client credentials flow (non-interactive)
    pub async fn login_client_credentials(
        &self,
        tenant_config: &TenantConfig,
    ) -> Result<TokenCache> {
        let client_secret = tenant_config.client_secret.as_ref().ok_or_else(|| {
            Cat365Error::AuthError("Client secret required for client credentials flow".into())
        })?;

        tracing::info!(
            "Authenticating with client credentials for tenant '{}'",
            tenant_config.name
        );

        let tenant_id = &tenant_config.tenant_id;
        let client_id = ClientId::new(tenant_config.client_id.clone());
        let client_secret = ClientSecret::new(client_secret.clone());

        let auth_url = AuthUrl::new(format!(
            "{}/{}/oauth2/v2.0/authorize",
            MICROSOFT_AUTHORITY, tenant_id
        ))
        .map_err(|e| Cat365Error::AuthError(format!("Invalid auth URL: {}", e)))?;

        let token_url = TokenUrl::new(format!(
            "{}/{}/oauth2/v2.0/token",
            MICROSOFT_AUTHORITY, tenant_id
        ))
        .map_err(|e| Cat365Error::AuthError(format!("Invalid token URL: {}", e)))?;

        let client = BasicClient::new(client_id, Some(client_secret), auth_url, Some(token_url));

        let token = client
            .exchange_client_credentials()
            .add_scope(Scope::new(GRAPH_SCOPE.to_string()))
            .request_async(async_http_client)
            .await
            .map_err(|e| {
                Cat365Error::AuthError(format!("Client credentials exchange failed: {}", e))
            })?;

        let expires_at = chrono::Utc::now()
            + chrono::Duration::from_std(token.expires_in().unwrap_or(Duration::from_secs(3600)))
                .unwrap_or_else(|_| chrono::Duration::seconds(3600));

        let token_cache = TokenCache {
            access_token: token.access_token().secret().clone(),
            expires_at,
            tenant_id: tenant_id.clone(),
        };

        self.config_manager
            .save_token(&tenant_config.name, &token_cache)?;

        Ok(token_cache)
    }

    /// Get a valid access token for the tenant, re-authenticating when the
    /// cached one is missing or expired
    pub async fn get_access_token(&self, tenant_name: &str) -> Result<String> {
        match self.config_manager.load_token(tenant_name) {
            Ok(token) => Ok(token.access_token),
            Err(Cat365Error::AuthError(_)) | Err(Cat365Error::TokenNotFound) => {
                // Expired or never acquired; client credentials can renew
                // without user interaction if we have a secret on file
                let tenant = self.config_manager.get_tenant_or_env(tenant_name)?;
                if tenant.client_secret.is_some() {
                    let token = self.login_client_credentials(&tenant).await?;
                    Ok(token.access_token)
                } else {
                    Err(Cat365Error::TokenNotFound)
                }
            }
            Err(e) => Err(e),
        }
    }

    /// Logout (delete token cache)
    pub fn logout(&self, tenant_name: &str) -> Result<()> {
        self.config_manager.delete_token(tenant_name)?;
        Ok(())
    }
}
