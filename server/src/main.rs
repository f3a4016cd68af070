use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use employee_server::{AppConfig, AppState, ServeConfig, serve};
use platform_obs::{ObsConfig, init_tracing};
use products_hr::{EmployeeStore, demo_employees};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "employee-server", version, about = "Employee records service")]
struct Cli {
    /// Employee document path (overrides EMPLOYEES_FILE).
    #[arg(long, global = true, value_name = "FILE")]
    data_file: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP server.
    Serve(ServeCommand),
    /// Create an empty employee document if none exists.
    Init,
    /// Append demo employees that are not stored yet.
    Seed,
}

#[derive(Args, Debug)]
struct ServeCommand {
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    host: std::net::IpAddr,
    #[arg(long, env = "PORT", default_value_t = 8080)]
    port: u16,
    #[arg(long, help = "Create the employee document before serving if it is missing")]
    init: bool,
}

impl From<&ServeCommand> for ServeConfig {
    fn from(value: &ServeCommand) -> Self {
        ServeConfig::new(value.host, value.port)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing(ObsConfig::from_env())?;
    let cli = Cli::parse();
    let mut config = AppConfig::load()?;
    if let Some(path) = cli.data_file {
        config = config.with_data_file(path);
    }
    match cli.command {
        Command::Serve(cmd) => run_server(cmd, config).await,
        Command::Init => init_document(config).await,
        Command::Seed => run_seed(config).await,
    }
}

async fn run_server(cmd: ServeCommand, config: AppConfig) -> Result<()> {
    let state = AppState::new(config);
    if cmd.init {
        state
            .store
            .initialize(&[])
            .await
            .context("failed to initialize employee document")?;
    }
    if state.store.ensure_available().await.is_err() {
        tracing::warn!(
            path = %state.store.path().display(),
            "employee document missing; requests will report File not found until `init` runs"
        );
    }
    serve((&cmd).into(), state).await
}

async fn init_document(config: AppConfig) -> Result<()> {
    let store = EmployeeStore::new(config.store);
    let created = store
        .initialize(&[])
        .await
        .context("failed to initialize employee document")?;
    if created {
        info!(path = %store.path().display(), "employee document created");
    } else {
        info!(path = %store.path().display(), "employee document already present");
    }
    Ok(())
}

async fn run_seed(config: AppConfig) -> Result<()> {
    let store = EmployeeStore::new(config.store);
    let added = store
        .seed(&demo_employees())
        .await
        .context("seed data failed")?;
    info!(path = %store.path().display(), added, "demo employees seeded");
    Ok(())
}
