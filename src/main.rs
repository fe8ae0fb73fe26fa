use cat365::{cmd, error};
use clap::{Parser, Subcommand};
use colored::Colorize;

#[derive(Parser, Debug)]
#[command(
    name = "cat365",
    about = "Reconcile Intune device categories from Entra ID user departments",
    version,
    long_about = "Keeps Intune device categories in sync with each device's primary\n\
                  user's directory department. Categories are assigned only when the\n\
                  department exactly matches an existing category name; run with\n\
                  --simulate first to review the would-be changes."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Authenticate to Microsoft Graph API
    Login(cmd::login::LoginArgs),

    /// Logout and clear cached credentials
    Logout(cmd::login::LogoutArgs),

    /// Manage tenant configurations
    #[command(subcommand)]
    Tenant(TenantCommands),

    /// Inspect the device category catalog
    #[command(subcommand)]
    Category(CategoryCommands),

    /// Reconcile device categories from user departments
    Sync(cmd::sync::SyncArgs),
}

#[derive(Subcommand, Debug)]
enum TenantCommands {
    /// Add a new tenant configuration
    Add(cmd::tenant::TenantAddArgs),

    /// List all configured tenants
    List(cmd::tenant::TenantListArgs),

    /// Switch active tenant
    Switch(cmd::tenant::TenantSwitchArgs),

    /// Remove a tenant configuration
    Remove(cmd::tenant::TenantRemoveArgs),

    /// Show the active tenant configuration
    Show,
}

#[derive(Subcommand, Debug)]
enum CategoryCommands {
    /// List device categories in the tenant
    List(cmd::category::ListArgs),
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

async fn run() -> error::Result<()> {
    let cli = Cli::parse();

    // Every decision the reconciler makes is a timestamped, leveled log
    // line; --verbose adds the transport-level detail
    let filter = if cli.verbose {
        "cat365=debug"
    } else {
        "cat365=info"
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Login(args) => cmd::login::login(args).await?,
        Commands::Logout(args) => cmd::login::logout(args).await?,
        Commands::Tenant(tenant_cmd) => match tenant_cmd {
            TenantCommands::Add(args) => cmd::tenant::add(args).await?,
            TenantCommands::List(args) => cmd::tenant::list(args).await?,
            TenantCommands::Switch(args) => cmd::tenant::switch(args).await?,
            TenantCommands::Remove(args) => cmd::tenant::remove(args).await?,
            TenantCommands::Show => cmd::tenant::show().await?,
        },
        Commands::Category(category_cmd) => match category_cmd {
            CategoryCommands::List(args) => cmd::category::list(args).await?,
        },
        Commands::Sync(args) => cmd::sync::sync(args).await?,
    }

    Ok(())
}
