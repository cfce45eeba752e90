//! # RegionalOps API Server
//!
//! HTTP API for regional social-program operations. Members, activities,
//! goals, institutions and documents are stored in Supabase; this server
//! validates requests, applies role and regional rules, and computes the
//! goal dashboard.
//!
//! ## Usage
//!
//! ```bash
//! SUPABASE_URL=... SUPABASE_ANON_KEY=... cargo run -p regionalops-api
//! ```
//!
//! Set `LOG_FORMAT=json` for JSON log lines.

use regionalops_api::{
    app::{build_router, AppState},
    config::Config,
};
use regionalops_shared::supabase::SupabaseClient;
use std::net::SocketAddr;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "regionalops_api=debug,tower_http=debug".into());

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for ctrl-c");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
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

    tracing::info!("Shutdown signal received, draining connections...");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    tracing::info!(
        "RegionalOps API Server v{} starting...",
        env!("CARGO_PKG_VERSION")
    );

    let config = Config::from_env()?;
    let supabase = SupabaseClient::new(config.supabase.clone())?;

    tracing::info!(
        supabase_url = %config.supabase.url,
        service_role = supabase.has_service_role(),
        local_jwt_check = config.supabase.jwt_secret.is_some(),
        "Supabase client ready"
    );

    let addr = config.bind_address();
    let state = AppState::new(supabase, config);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", listener.local_addr()?);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Server stopped");

    Ok(())
}
