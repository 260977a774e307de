use anyhow::Context;
use clap::{Parser, Subcommand};
use shelf_kernel::settings::Settings;

#[derive(Debug, Parser)]
#[command(name = "shelf", version, about = "SHELF book catalogue service")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP service until interrupted
    Serve,
    /// Print a random secret for auth.api_key or auth.jwt_secret
    GenKey,
    /// Load and validate the layered configuration, then exit
    CheckConfig,
}

fn load_settings() -> anyhow::Result<Settings> {
    Settings::load().context("failed to load SHELF settings")
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Serve => {
            let settings = load_settings()?;
            shelf_telemetry::init(&settings.telemetry)?;
            tracing::info!(env = ?settings.environment, "starting SHELF");

            let runtime = tokio::runtime::Runtime::new().context("failed to start tokio runtime")?;
            runtime.block_on(shelf_app::run(settings))
        }
        Command::GenKey => {
            println!("{}", shelf_authz::generate_secret());
            Ok(())
        }
        Command::CheckConfig => {
            let settings = load_settings()?;
            settings.validate()?;
            println!(
                "configuration ok: env={:?} listen={}:{} storage={:?} cache={:?}",
                settings.environment,
                settings.server.host,
                settings.server.port,
                settings.database.backend,
                settings.cache.backend,
            );
            Ok(())
        }
    }
}
