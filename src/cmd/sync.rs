/// Device-category reconciliation command
///
/// Resolves credentials (direct flags, configured tenant, or the .env
/// secret store), runs the reconciler, and prints the run summary.
use crate::config::{ConfigManager, TenantConfig};
use crate::error::Result;
use crate::graph::GraphClient;
use crate::graph::auth::GraphAuth;
use crate::reconcile::{ReconcileOptions, Reconciler, RunSummary};
use clap::Args;
use colored::Colorize;

#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Configured tenant name (defaults to the active tenant)
    #[arg(short, long)]
    pub tenant: Option<String>,

    /// Tenant ID, for direct credentials without a configured tenant
    #[arg(long)]
    pub tenant_id: Option<String>,

    /// Client ID, for direct credentials
    #[arg(long)]
    pub client_id: Option<String>,

    /// Client secret, for direct credentials
    #[arg(long)]
    pub client_secret: Option<String>,

    /// Simulate: compute and log decisions without changing anything
    #[arg(long, alias = "dry-run")]
    pub simulate: bool,

    /// Category label treated as "no category set" (repeatable; overrides
    /// the defaults "Unassigned" and "Unknown")
    #[arg(long = "unassigned-label")]
    pub unassigned_labels: Vec<String>,

    /// Operating system family to reconcile
    #[arg(long, default_value = "Windows")]
    pub os: String,

    /// Print the summary as JSON
    #[arg(long)]
    pub json: bool,

    /// Skip confirmation prompt
    #[arg(short = 'y', long)]
    pub yes: bool,
}

pub async fn sync(args: SyncArgs) -> Result<()> {
    println!("{} device categories...", "Reconciling".cyan().bold());

    let config = ConfigManager::load()?;
    let tenant_config = resolve_tenant(&config, &args)?;

    println!("→ Tenant: {}", tenant_config.name.cyan().bold());

    if args.simulate {
        println!("\n{}", "SIMULATION - no changes will be made".yellow().bold());
    } else if !args.yes {
        use std::io::{self, Write};
        println!(
            "\n{} This will update device categories in tenant '{}'",
            "⚠".yellow().bold(),
            tenant_config.name
        );
        print!("Continue? [y/N]: ");
        io::stdout().flush()?;

        let mut response = String::new();
        io::stdin().read_line(&mut response)?;
        if !response.trim().eq_ignore_ascii_case("y") {
            println!("{}", "Cancelled.".yellow());
            return Ok(());
        }
    }

    // Credential acquisition failure is fatal; no devices are processed
    let auth = GraphAuth::new(config.clone());
    let token = auth.login_client_credentials(&tenant_config).await?;
    let graph = GraphClient::new(token.access_token);

    let mut options = ReconcileOptions {
        simulate: args.simulate,
        unassigned_labels: config.load_config()?.sync.unassigned_labels(),
        os: args.os.clone(),
    };
    if !args.unassigned_labels.is_empty() {
        options.unassigned_labels = args.unassigned_labels.clone();
    }

    let summary = Reconciler::new(&graph, options).run().await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }

    Ok(())
}

/// Resolve the tenant to run against
///
/// Direct credentials win when all three are supplied; otherwise the named
/// tenant (tenants.toml or .env secret store), otherwise the active tenant.
fn resolve_tenant(config: &ConfigManager, args: &SyncArgs) -> Result<TenantConfig> {
    if let (Some(tenant_id), Some(client_id), Some(client_secret)) =
        (&args.tenant_id, &args.client_id, &args.client_secret)
    {
        let name = args
            .tenant
            .clone()
            .unwrap_or_else(|| tenant_id.split('-').next().unwrap_or("direct").to_string());

        return Ok(TenantConfig {
            name,
            tenant_id: tenant_id.clone(),
            client_id: client_id.clone(),
            client_secret: Some(client_secret.clone()),
            description: None,
        });
    }

    if let Some(name) = &args.tenant {
        return config.get_tenant_or_env(name);
    }

    config.get_active_tenant()?.ok_or_else(|| {
        crate::error::Error::ConfigError(
            "No active tenant. Run 'cat365 login' or pass --tenant-id/--client-id/--client-secret."
                .into(),
        )
    })
}

fn print_summary(summary: &RunSummary) {
    println!("\n{}", "Run Summary".bold());
    println!("{}", "─".repeat(40));
    println!("  Devices processed:  {}", summary.total);
    println!(
        "  Updated:            {}{}",
        summary.updated.to_string().green(),
        if summary.simulate {
            " (simulated)".yellow().to_string()
        } else {
            String::new()
        }
    );
    println!("  Already correct:    {}", summary.already_correct);
    println!("  Skipped:            {}", summary.skipped.to_string().yellow());
    println!("  Errors:             {}", summary.errored.to_string().red());

    if summary.simulate {
        println!(
            "\n{} Simulation complete. Re-run without --simulate to apply.",
            "ℹ".yellow().bold()
        );
    } else if summary.errored > 0 {
        println!(
            "\n{} Some devices failed; see the log above for details",
            "⚠".yellow()
        );
    } else {
        println!("\n{} Reconciliation complete", "✓".green().bold());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_args() -> SyncArgs {
        SyncArgs {
            tenant: None,
            tenant_id: None,
            client_id: None,
            client_secret: None,
            simulate: false,
            unassigned_labels: Vec::new(),
            os: "Windows".to_string(),
            json: false,
            yes: true,
        }
    }

    #[test]
    fn test_direct_credentials_win() {
        let config = ConfigManager::load().unwrap();
        let mut args = base_args();
        args.tenant_id = Some("11111111-2222-3333-4444-555555555555".to_string());
        args.client_id = Some("app".to_string());
        args.client_secret = Some("secret".to_string());

        let tenant = resolve_tenant(&config, &args).unwrap();
        assert_eq!(tenant.name, "11111111");
        assert_eq!(tenant.client_secret.as_deref(), Some("secret"));
    }

    #[test]
    fn test_partial_direct_credentials_fall_through() {
        let config = ConfigManager::load().unwrap();
        let mut args = base_args();
        args.tenant_id = Some("t".to_string());
        // client_id/secret absent: falls back to the secret store, and with
        // no tenant configured that is an error
        args.tenant = Some("no-such-tenant-xyzzy".to_string());

        assert!(resolve_tenant(&config, &args).is_err());
    }
}
