use crate::config::{ConfigManager, TenantConfig};
use crate::error::Result;
use crate::graph::auth::GraphAuth;
use clap::Args;
use colored::Colorize;

/// Truncate a string to n characters (not bytes) to avoid panics on non-ASCII
fn truncate_chars(s: &str, n: usize) -> String {
    s.chars().take(n).collect()
}

#[derive(Args, Debug)]
pub struct LoginArgs {
    /// Tenant name or abbreviation (e.g. CONTOSO)
    /// Checked against tenants.toml, then ~/.config/cat365/{name}.env
    #[arg(index = 1)]
    name: Option<String>,

    /// Tenant name (if already configured) - alias for positional
    #[arg(short, long)]
    tenant: Option<String>,

    /// Tenant ID (Entra ID tenant ID)
    #[arg(long)]
    tenant_id: Option<String>,

    /// Client ID (Application ID)
    #[arg(long)]
    client_id: Option<String>,

    /// Client secret
    #[arg(long)]
    client_secret: Option<String>,

    /// Tenant description
    #[arg(long)]
    description: Option<String>,
}

#[derive(Args, Debug)]
pub struct LogoutArgs {
    /// Tenant name
    #[arg(short, long)]
    tenant: Option<String>,

    /// Logout from all tenants
    #[arg(long)]
    all: bool,
}

pub async fn login(args: LoginArgs) -> Result<()> {
    let config_manager = ConfigManager::new()?;
    let auth = GraphAuth::new(config_manager.clone());

    // Resolve tenant name from positional arg or --tenant flag
    let tenant_name = args.name.as_ref().or(args.tenant.as_ref());

    let tenant_config = if let Some(name) = tenant_name {
        match config_manager.get_tenant_or_env(name) {
            Ok(tenant) => {
                println!(
                    "{} Loaded tenant: {} ({})",
                    "✓".green(),
                    name.bold(),
                    tenant.description.as_deref().unwrap_or("")
                );
                println!("  Tenant ID: {}...", truncate_chars(&tenant.tenant_id, 8));
                println!("  Client ID: {}...", truncate_chars(&tenant.client_id, 8));
                tenant
            }
            Err(_) => {
                return Err(crate::error::Cat365Error::ConfigError(format!(
                    "Tenant '{}' not found.\n\n\
                    Options:\n\
                    1. Add to tenants.env in the config directory:\n   \
                       [{}]\n   \
                       TENANT_ID=your-tenant-id\n   \
                       CLIENT_ID=your-client-id\n   \
                       CLIENT_SECRET=your-secret\n\n\
                    2. Create {}.env with the same keys\n\n\
                    3. Run: cat365 tenant add {} --tenant-id ... --client-id ... --client-secret ...",
                    name,
                    name.to_uppercase(),
                    name.to_lowercase(),
                    name
                )));
            }
        }
    } else if let (Some(tenant_id), Some(client_id)) = (&args.tenant_id, &args.client_id) {
        // Quick setup: create the tenant config on-the-fly
        println!(
            "\n{} Quick setup mode: creating tenant configuration...",
            "→".cyan()
        );

        let name = args.tenant.unwrap_or_else(|| {
            let auto_name = tenant_id
                .split('-')
                .next()
                .unwrap_or("my-tenant")
                .to_string();
            println!(
                "{} Auto-generated tenant name: {}",
                "→".cyan(),
                auto_name.bold()
            );
            auto_name
        });

        let tenant = TenantConfig {
            name: name.clone(),
            tenant_id: tenant_id.clone(),
            client_id: client_id.clone(),
            client_secret: args.client_secret.clone(),
            description: args.description,
        };

        config_manager.add_tenant(tenant.clone())?;
        println!("{} Tenant '{}' configuration saved", "✓".green(), name);

        tenant
    } else {
        return Err(crate::error::Cat365Error::InvalidConfig(
            "Usage:\n  \
            cat365 login CONTOSO        # Load from config dir contoso.env\n  \
            cat365 login --tenant NAME  # Use existing config\n  \
            cat365 login --tenant-id ID --client-id ID --client-secret SECRET"
                .into(),
        ));
    };

    auth.login_client_credentials(&tenant_config).await?;
    println!("{} Authentication successful", "✓".green());

    // Set as current tenant
    let mut config = config_manager.load_config()?;
    config.current_tenant = Some(tenant_config.name.clone());
    config_manager.save_config(&config)?;

    println!(
        "\n{} Active tenant: {}",
        "→".cyan(),
        tenant_config.name.bold()
    );
    Ok(())
}

pub async fn logout(args: LogoutArgs) -> Result<()> {
    let config_manager = ConfigManager::new()?;
    let auth = GraphAuth::new(config_manager.clone());

    if args.all {
        let tenants = config_manager.load_tenants()?;

        for tenant in &tenants {
            auth.logout(&tenant.name)?;
            println!("{} Logged out from tenant '{}'", "✓".green(), tenant.name);
        }
    } else if let Some(tenant_name) = &args.tenant {
        auth.logout(tenant_name)?;
        println!("{} Logged out from tenant '{}'", "✓".green(), tenant_name);
    } else {
        let config = config_manager.load_config()?;

        if let Some(current_tenant) = config.current_tenant {
            auth.logout(&current_tenant)?;
            println!("{} Logged out from tenant '{}'", "✓".green(), current_tenant);
        } else {
            println!("{} No active tenant", "!".yellow());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_chars_handles_multibyte() {
        assert_eq!(truncate_chars("abcdef", 3), "abc");
        assert_eq!(truncate_chars("äöüß", 2), "äö");
        assert_eq!(truncate_chars("ab", 8), "ab");
    }
}
