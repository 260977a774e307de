//! SHELF book catalogue: module wiring and service lifecycle.

pub mod backends;
pub mod modules;

use anyhow::Context;
use shelf_kernel::{settings::Settings, InitCtx, ModuleRegistry};

pub use backends::Backends;

/// Registry holding every catalogue module, bound to `backends`.
pub fn build_registry(backends: &Backends, settings: &Settings) -> anyhow::Result<ModuleRegistry> {
    let mut registry = ModuleRegistry::new();
    modules::register_all(&mut registry, backends, settings)?;
    Ok(registry)
}

/// Connect backends, bootstrap the schema and serve until SIGINT/SIGTERM.
pub async fn run(settings: Settings) -> anyhow::Result<()> {
    settings.validate().context("invalid configuration")?;

    let backends = Backends::connect(&settings)
        .await
        .context("failed to connect backends")?;
    let registry = build_registry(&backends, &settings)?;

    if let Some(postgres) = &backends.postgres {
        postgres
            .apply_migrations(&registry.collect_migrations())
            .await
            .context("failed to apply bootstrap migrations")?;
    }

    let ctx = InitCtx {
        settings: &settings,
    };
    registry.init_modules(&ctx).await?;
    registry.start_modules(&ctx).await?;

    let served = shelf_http::start_server(&registry, &settings, shutdown_signal()).await;

    registry.stop_modules().await?;
    served
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
