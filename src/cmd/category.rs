/// Device category catalog inspection
///
/// Departments must match these names verbatim for reconciliation to act,
/// so listing the catalog is the first stop when debugging naming drift.
use crate::cmd::progress;
use crate::config::ConfigManager;
use crate::error::Result;
use crate::graph::{GraphClient, devices};
use clap::Args;
use colored::Colorize;

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Show category IDs
    #[arg(short, long)]
    pub verbose: bool,
}

/// List the tenant's device categories
pub async fn list(args: ListArgs) -> Result<()> {
    println!("{} device categories...", "Listing".cyan().bold());

    let config = ConfigManager::load()?;
    let active_tenant = config
        .get_active_tenant()?
        .ok_or_else(|| crate::error::Error::ConfigError("No active tenant".into()))?;

    println!("→ Tenant: {}", active_tenant.name.cyan().bold());

    let graph = GraphClient::from_config(&config, &active_tenant.name).await?;

    let spinner = progress::create_spinner("Fetching category catalog...");
    let categories = match devices::list_categories(&graph).await {
        Ok(categories) => {
            progress::finish_spinner_success(
                &spinner,
                &format!("{} categories found", categories.len()),
            );
            categories
        }
        Err(e) => {
            progress::finish_spinner_error(&spinner, "Failed to fetch categories");
            return Err(e);
        }
    };

    if categories.is_empty() {
        println!("\n{} No device categories defined in this tenant", "ℹ".yellow());
        println!(
            "   Reconciliation can only assign categories that already exist; create them in Intune first."
        );
        return Ok(());
    }

    println!("\n{:<40} {}", "Name".bold(), "Description".bold());
    println!("{}", "─".repeat(70));

    for category in &categories {
        println!(
            "{:<40} {}",
            category.display_name,
            category.description.as_deref().unwrap_or("").dimmed()
        );

        if args.verbose {
            println!("   ID: {}", category.id.dimmed());
        }
    }

    println!(
        "\n{} Departments must match these names exactly (case, spacing, punctuation)",
        "ℹ".cyan()
    );

    Ok(())
}
