//! Taskpulse - role-based project and task tracking service.
//!
//! Runs the HTTP API, prepares the database, or triggers a one-off risk scan.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use taskpulse::core::{Config, Role, UserStatus};
use taskpulse::service::{activate_user, register_user, NewUser};
use taskpulse::store::Store;
use taskpulse::{server, App};

/// Role-based project and task tracking service
#[derive(Parser)]
#[command(name = "taskpulse")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server
    Serve {
        /// Host to bind to (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Create the database schema
    InitDb,

    /// Scan open tasks for deadline risk and record the findings
    Scan,

    /// Create an account directly in the database
    AddUser {
        /// Display name
        #[arg(long)]
        name: String,

        /// Email address (stored lower-cased)
        #[arg(long)]
        email: String,

        /// Role: employee, pm or hr
        #[arg(long, default_value = "employee")]
        role: Role,

        /// Department name
        #[arg(long)]
        department: Option<String>,

        /// Create the account active instead of pending approval
        #[arg(long)]
        active: bool,
    },

    /// Activate a pending account by email
    Approve {
        /// Email of the account to activate
        email: String,
    },

    /// Show current configuration
    Config {
        /// Show config file path instead of contents
        #[arg(long)]
        path: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry().with(fmt::layer().with_target(false)).with(filter).init();

    match cli.command {
        Commands::Serve { host, port } => cmd_serve(host, port),
        Commands::InitDb => cmd_init_db(),
        Commands::Scan => cmd_scan(),
        Commands::AddUser { name, email, role, department, active } => {
            cmd_add_user(NewUser { name, email, role: Some(role), department }, active)
        }
        Commands::Approve { email } => cmd_approve(&email),
        Commands::Config { path } => cmd_config(path),
    }
}

/// Run the API server until interrupted.
fn cmd_serve(host: Option<String>, port: Option<u16>) -> Result<()> {
    let mut config = Config::load()?;
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    let app = Arc::new(App::from_config(config)?);

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(server::serve(app))
}

/// Create the schema in the configured database.
fn cmd_init_db() -> Result<()> {
    let config = Config::load()?;
    let path = &config.database.path;
    Store::open(path).with_context(|| format!("Failed to open database at {}", path.display()))?;

    println!("Database ready at {}", path.display());
    Ok(())
}

/// Run one batch risk scan over every open task.
fn cmd_scan() -> Result<()> {
    let app = App::from_config(Config::load()?)?;

    let rt = tokio::runtime::Runtime::new()?;
    let report = rt.block_on(app.scan_risks(Utc::now()))?;

    println!("{}: scanned {}, risks found {}", report.message, report.scanned, report.risks_found);
    Ok(())
}

/// Open the configured database without the AI or upload stack.
fn open_store() -> Result<Store> {
    let config = Config::load()?;
    let path = &config.database.path;
    Store::open(path).with_context(|| format!("Failed to open database at {}", path.display()))
}

/// Create an account, e.g. the first hr user who approves everyone else.
fn cmd_add_user(input: NewUser, active: bool) -> Result<()> {
    let store = open_store()?;
    let status = if active { UserStatus::Active } else { UserStatus::Pending };
    let user = register_user(&store, input, status, Utc::now())?;

    tracing::info!(user = %user.id, role = %user.role, status = %user.status, "User added");
    println!(
        "Added {} <{}> as {} ({}), id {}",
        user.name, user.email, user.role, user.status, user.id
    );
    Ok(())
}

/// Activate a pending account.
fn cmd_approve(email: &str) -> Result<()> {
    let store = open_store()?;
    let user = activate_user(&store, email)?;

    println!("Activated {} <{}>", user.name, user.email);
    Ok(())
}

/// Show the configuration with secrets masked, or where it is read from.
fn cmd_config(show_path: bool) -> Result<()> {
    if show_path {
        match Config::locate().or_else(|| Config::config_dir().map(|d| d.join("config.toml"))) {
            Some(path) => println!("{}", path.display()),
            None => println!("No config directory available"),
        }
        return Ok(());
    }

    let config = Config::load()?;
    println!("{}", config.to_redacted_toml()?);

    Ok(())
}
