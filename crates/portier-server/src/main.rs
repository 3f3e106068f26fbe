use anyhow::{Context, Result};
use clap::Parser;
use portier_locator::RandomPicker;
use portier_server::config::load_config;
use portier_server::lifecycle::LifecycleReporter;
use portier_server::shutdown::{serve, shutdown_signal};
use portier_server::state::{build_locator, AppState};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "portier-server", version, about = "Portier authentication service")]
struct Args {
    /// Path to a YAML config file
    #[arg(long, env = "PORTIER_CONFIG")]
    config: Option<String>,

    /// Listening port, overrides the port of `listen`
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut config = load_config(args.config.as_deref())?;
    if let Some(port) = args.port {
        config.set_port(port)?;
    }
    config.validate().context("Invalid configuration")?;

    tracing::info!("Starting {} on {}", config.service_name, config.listen);

    let locator = build_locator(&config.registry)?;
    let state = AppState::new(config.clone(), locator.clone(), Arc::new(RandomPicker))?;
    state.seed_initial_user().await?;

    let listener = tokio::net::TcpListener::bind(&config.listen)
        .await
        .with_context(|| format!("Failed to bind to {}", config.listen))?;
    let port = listener.local_addr()?.port();

    let reporter = Arc::new(LifecycleReporter::new(
        locator,
        &config.service_name,
        &config.advertise_address(port),
    ));
    reporter
        .register()
        .await
        .context("Failed to register service")?;

    // Heartbeat, deregistration and HTTP drain all hang off the same token
    let cancel_token = CancellationToken::new();
    let _heartbeat =
        reporter.start_heartbeat(config.lifecycle.heartbeat_interval(), cancel_token.clone());
    let deregister = reporter.deregister_on_shutdown(cancel_token.clone());
    tokio::spawn(shutdown_signal(cancel_token.clone()));

    let app = portier_server::web::build_router(state);

    tracing::info!("{} listening on {}", config.service_name, config.listen);

    let served = serve(
        listener,
        app,
        cancel_token.clone(),
        config.lifecycle.shutdown_grace(),
    )
    .await;

    // Covers the server failing on its own, before any signal
    cancel_token.cancel();
    if let Err(e) = deregister.await {
        tracing::warn!("Deregistration task failed: {}", e);
    }

    served
}
