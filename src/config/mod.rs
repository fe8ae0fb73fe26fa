use crate::error::{Cat365Error, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

/// Category labels Intune reports for a device that has no category set.
/// These are English display strings, not API sentinels; tenants running
/// localized or renamed catalogs can override them in config or per run.
pub const DEFAULT_UNASSIGNED_LABELS: &[&str] = &["Unassigned", "Unknown"];

/// Main configuration structure
#[derive(Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub current_tenant: Option<String>,

    #[serde(default)]
    pub sync: SyncDefaults,
}

/// Persistent defaults for the sync command
#[derive(Debug, Serialize, Deserialize, Default)]
pub struct SyncDefaults {
    /// Overrides the built-in "no category" labels when non-empty
    #[serde(default)]
    pub unassigned_labels: Vec<String>,
}

impl SyncDefaults {
    pub fn unassigned_labels(&self) -> Vec<String> {
        if self.unassigned_labels.is_empty() {
            DEFAULT_UNASSIGNED_LABELS
                .iter()
                .map(|s| s.to_string())
                .collect()
        } else {
            self.unassigned_labels.clone()
        }
    }
}

/// Tenant-specific configuration
///
/// Reconciliation runs non-interactively, so every tenant authenticates
/// with the client-credentials flow; the secret may live here or in an
/// .env file next to the config.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TenantConfig {
    pub name: String,
    pub tenant_id: String,
    pub client_id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Token cache structure
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenCache {
    pub access_token: String,
    pub expires_at: chrono::DateTime<chrono::Utc>,
    pub tenant_id: String,
}

/// Configuration manager
#[derive(Clone)]
pub struct ConfigManager {
    config_dir: PathBuf,
}

impl ConfigManager {
    pub fn new() -> Result<Self> {
        let project_dirs = ProjectDirs::from("com", "cat365", "cat365").ok_or_else(|| {
            Cat365Error::ConfigError("Failed to determine config directory".into())
        })?;

        let config_dir = project_dirs.config_dir().to_path_buf();

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)?;
        }

        Ok(Self { config_dir })
    }

    pub fn load() -> Result<Self> {
        Self::new()
    }

    #[cfg(test)]
    fn with_dir(config_dir: PathBuf) -> Self {
        Self { config_dir }
    }

    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join("config.toml")
    }

    pub fn tenants_file(&self) -> PathBuf {
        self.config_dir.join("tenants.toml")
    }

    pub fn token_cache_file(&self, tenant_name: &str) -> PathBuf {
        self.config_dir
            .join("cache")
            .join(format!("{}.token", tenant_name))
    }

    /// Load main config
    pub fn load_config(&self) -> Result<Config> {
        let config_path = self.config_file();

        if !config_path.exists() {
            return Ok(Config::default());
        }

        let contents = fs::read_to_string(config_path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save main config
    pub fn save_config(&self, config: &Config) -> Result<()> {
        let contents = toml::to_string_pretty(config)
            .map_err(|e| Cat365Error::ConfigError(format!("Failed to serialize config: {}", e)))?;
        fs::write(self.config_file(), contents)?;
        Ok(())
    }

    /// Load all tenants
    pub fn load_tenants(&self) -> Result<Vec<TenantConfig>> {
        let tenants_path = self.tenants_file();

        if !tenants_path.exists() {
            return Ok(Vec::new());
        }

        let contents = fs::read_to_string(tenants_path)?;

        #[derive(Deserialize)]
        struct TenantsFile {
            tenants: Vec<TenantConfig>,
        }

        let file: TenantsFile = toml::from_str(&contents)?;
        Ok(file.tenants)
    }

    /// Save all tenants
    pub fn save_tenants(&self, tenants: &[TenantConfig]) -> Result<()> {
        #[derive(Serialize)]
        struct TenantsFile<'a> {
            tenants: &'a [TenantConfig],
        }

        let file = TenantsFile { tenants };
        let contents = toml::to_string_pretty(&file)
            .map_err(|e| Cat365Error::ConfigError(format!("Failed to serialize tenants: {}", e)))?;
        fs::write(self.tenants_file(), contents)?;
        Ok(())
    }

    /// Add or update tenant
    pub fn add_tenant(&self, tenant: TenantConfig) -> Result<()> {
        let mut tenants = self.load_tenants()?;

        tenants.retain(|t| t.name != tenant.name);
        tenants.push(tenant);
        self.save_tenants(&tenants)?;
        Ok(())
    }

    /// Get tenant by name
    pub fn get_tenant(&self, name: &str) -> Result<TenantConfig> {
        let tenants = self.load_tenants()?;
        tenants
            .into_iter()
            .find(|t| t.name == name)
            .ok_or_else(|| Cat365Error::TenantNotFound(name.to_string()))
    }

    /// Get active tenant
    pub fn get_active_tenant(&self) -> Result<Option<TenantConfig>> {
        let config = self.load_config()?;

        match config.current_tenant {
            Some(tenant_name) => Ok(Some(self.get_tenant(&tenant_name)?)),
            None => Ok(None),
        }
    }

    /// Set the active tenant
    pub fn set_active_tenant(&self, tenant_name: &str) -> Result<()> {
        let _tenant = self.get_tenant(tenant_name)?;

        let mut config = self.load_config()?;
        config.current_tenant = Some(tenant_name.to_string());
        self.save_config(&config)?;

        Ok(())
    }

    /// Remove a tenant by name
    pub fn remove_tenant(&self, tenant_name: &str) -> Result<()> {
        let mut tenants = self.load_tenants()?;
        let original_len = tenants.len();
        tenants.retain(|t| !t.name.eq_ignore_ascii_case(tenant_name));

        if tenants.len() == original_len {
            return Err(Cat365Error::TenantNotFound(tenant_name.to_string()));
        }

        self.save_tenants(&tenants)?;
        let _ = self.delete_token(tenant_name);

        // Clear current_tenant if it pointed here
        let config = self.load_config()?;
        if config.current_tenant.as_deref() == Some(tenant_name) {
            let mut updated = config;
            updated.current_tenant = None;
            self.save_config(&updated)?;
        }

        Ok(())
    }

    /// Save token cache
    pub fn save_token(&self, tenant_name: &str, token: &TokenCache) -> Result<()> {
        let cache_dir = self.config_dir.join("cache");
        if !cache_dir.exists() {
            fs::create_dir_all(&cache_dir)?;
        }

        let contents = serde_json::to_string_pretty(token)?;
        fs::write(self.token_cache_file(tenant_name), contents)?;
        Ok(())
    }

    /// Load token cache, rejecting expired tokens
    pub fn load_token(&self, tenant_name: &str) -> Result<TokenCache> {
        let token_path = self.token_cache_file(tenant_name);

        if !token_path.exists() {
            return Err(Cat365Error::TokenNotFound);
        }

        let contents = fs::read_to_string(token_path)?;
        let token: TokenCache = serde_json::from_str(&contents)?;

        if token.expires_at < chrono::Utc::now() {
            return Err(Cat365Error::AuthError("Token expired".into()));
        }

        Ok(token)
    }

    /// Delete token cache
    pub fn delete_token(&self, tenant_name: &str) -> Result<()> {
        let token_path = self.token_cache_file(tenant_name);

        if token_path.exists() {
            fs::remove_file(token_path)?;
        }

        Ok(())
    }

    /// Load tenant credentials from an .env file in the config directory
    ///
    /// Checks `{name}.env` first, then the shared `.env`:
    /// ```text
    /// TENANT_ID=xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx
    /// CLIENT_ID=xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx
    /// CLIENT_SECRET=your-secret-here
    /// ```
    pub fn load_env_file(&self, name: &str) -> Result<Option<TenantConfig>> {
        let env_path = self.config_dir.join(format!("{}.env", name.to_lowercase()));
        let fallback_path = self.config_dir.join(".env");

        let path = if env_path.exists() {
            env_path
        } else if fallback_path.exists() {
            fallback_path
        } else {
            return Ok(None);
        };

        let contents = fs::read_to_string(&path)?;
        let env_vars = parse_env_vars(&contents);

        Ok(vars_to_tenant(name, &env_vars))
    }

    /// Load all tenants from a multi-tenant `tenants.env` file
    ///
    /// Sections are bracketed tenant names, each followed by KEY=VALUE
    /// lines:
    /// ```text
    /// [CONTOSO]
    /// TENANT_ID=xxx
    /// CLIENT_ID=xxx
    /// CLIENT_SECRET=xxx
    /// ```
    pub fn load_tenants_env(&self) -> Result<Vec<TenantConfig>> {
        let env_path = self.config_dir.join("tenants.env");

        if !env_path.exists() {
            return Ok(Vec::new());
        }

        let contents = fs::read_to_string(&env_path)?;
        let mut tenants = Vec::new();
        let mut current_section: Option<String> = None;
        let mut current_block = String::new();

        for line in contents.lines() {
            let line = line.trim();

            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if line.starts_with('[') && line.ends_with(']') {
                if let Some(name) = current_section.take() {
                    let vars = parse_env_vars(&current_block);
                    if let Some(tenant) = vars_to_tenant(&name, &vars) {
                        tenants.push(tenant);
                    }
                }
                current_section = Some(line[1..line.len() - 1].to_string());
                current_block.clear();
                continue;
            }

            current_block.push_str(line);
            current_block.push('\n');
        }

        if let Some(name) = current_section {
            let vars = parse_env_vars(&current_block);
            if let Some(tenant) = vars_to_tenant(&name, &vars) {
                tenants.push(tenant);
            }
        }

        Ok(tenants)
    }

    /// Get tenant by name, falling back to the .env secret store
    ///
    /// Tenants found in env files are saved to tenants.toml for future use.
    pub fn get_tenant_or_env(&self, name: &str) -> Result<TenantConfig> {
        if let Ok(tenant) = self.get_tenant(name) {
            return Ok(tenant);
        }

        let env_tenants = self.load_tenants_env()?;
        if let Some(tenant) = env_tenants
            .into_iter()
            .find(|t| t.name.eq_ignore_ascii_case(name))
        {
            self.add_tenant(tenant.clone())?;
            return Ok(tenant);
        }

        if let Some(tenant) = self.load_env_file(name)? {
            self.add_tenant(tenant.clone())?;
            return Ok(tenant);
        }

        Err(Cat365Error::TenantNotFound(name.to_string()))
    }
}

/// Parse KEY=VALUE lines, ignoring comments and blank lines, with keys
/// uppercased and surrounding quotes stripped from values
fn parse_env_vars(contents: &str) -> HashMap<String, String> {
    let mut vars = HashMap::new();

    for line in contents.lines() {
        let line = line.trim();

        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some(pos) = line.find('=') {
            let key = line[..pos].trim().to_uppercase();
            let value = line[pos + 1..].trim();

            let value = if (value.starts_with('"') && value.ends_with('"') && value.len() >= 2)
                || (value.starts_with('\'') && value.ends_with('\'') && value.len() >= 2)
            {
                value[1..value.len() - 1].to_string()
            } else {
                value.to_string()
            };

            vars.insert(key, value);
        }
    }

    vars
}

fn vars_to_tenant(name: &str, vars: &HashMap<String, String>) -> Option<TenantConfig> {
    let tenant_id = vars.get("TENANT_ID")?;
    let client_id = vars.get("CLIENT_ID")?;

    Some(TenantConfig {
        name: name.to_string(),
        tenant_id: tenant_id.clone(),
        client_id: client_id.clone(),
        client_secret: vars.get("CLIENT_SECRET").cloned(),
        description: vars.get("DESCRIPTION").cloned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_env_vars_strips_quotes_and_comments() {
        let vars = parse_env_vars(
            "# comment\nTENANT_ID=abc\nclient_id='cid'\nCLIENT_SECRET=\"s3cret\"\n\njunk line\n",
        );
        assert_eq!(vars.get("TENANT_ID").unwrap(), "abc");
        assert_eq!(vars.get("CLIENT_ID").unwrap(), "cid");
        assert_eq!(vars.get("CLIENT_SECRET").unwrap(), "s3cret");
        assert!(!vars.contains_key("JUNK LINE"));
    }

    #[test]
    fn test_vars_to_tenant_requires_ids() {
        let mut vars = HashMap::new();
        vars.insert("TENANT_ID".to_string(), "t".to_string());
        assert!(vars_to_tenant("acme", &vars).is_none());

        vars.insert("CLIENT_ID".to_string(), "c".to_string());
        let tenant = vars_to_tenant("acme", &vars).unwrap();
        assert_eq!(tenant.name, "acme");
        assert!(tenant.client_secret.is_none());
    }

    #[test]
    fn test_sync_defaults_fall_back_to_builtin_labels() {
        let defaults = SyncDefaults::default();
        assert_eq!(defaults.unassigned_labels(), vec!["Unassigned", "Unknown"]);

        let custom = SyncDefaults {
            unassigned_labels: vec!["Nicht zugewiesen".to_string()],
        };
        assert_eq!(custom.unassigned_labels(), vec!["Nicht zugewiesen"]);
    }

    #[test]
    fn test_tenants_env_sections() {
        let dir = std::env::temp_dir().join(format!("cat365-test-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join("tenants.env"),
            "[CONTOSO]\nTENANT_ID=t1\nCLIENT_ID=c1\nCLIENT_SECRET=s1\n\n[FABRIKAM]\nTENANT_ID=t2\nCLIENT_ID=c2\n",
        )
        .unwrap();

        let manager = ConfigManager::with_dir(dir.clone());
        let tenants = manager.load_tenants_env().unwrap();
        assert_eq!(tenants.len(), 2);
        assert_eq!(tenants[0].name, "CONTOSO");
        assert_eq!(tenants[0].client_secret.as_deref(), Some("s1"));
        assert!(tenants[1].client_secret.is_none());

        fs::remove_dir_all(&dir).ok();
    }
}
