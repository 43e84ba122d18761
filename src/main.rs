//! OpenInsure Oracle Server
//!
//! Long-running oracle daemon for the OpenInsure flight-insurance dApp: it
//! registers the node's accounts as oracles, answers the contract's flight
//! status requests with simulated submissions, and exposes a small API for
//! observability.

use axum::http::{header, HeaderValue, Method};
use axum::routing::get;
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

use openinsure_server::app_state::AppState;
use openinsure_server::config::OracleConfig;
use openinsure_server::contract::EthOpenInsureApp;
use openinsure_server::eth::EthRpcClient;
use openinsure_server::routes;
use openinsure_server::services::oracle_daemon::{self, StartError};
use openinsure_server::services::status_tally::StatusTally;

const DAEMON_SUPERVISOR_MAX_BACKOFF_SECONDS: u64 = 30;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    // Load environment variables
    dotenvy::dotenv().ok();

    let config = OracleConfig::from_env();
    let tally = Arc::new(StatusTally::new());

    let rpc = EthRpcClient::new(config.rpc_url.clone());
    let contract = config
        .app_address
        .map(|address| Arc::new(EthOpenInsureApp::new(rpc.clone(), address, config.gas_limit)));
    let state = AppState::new(Arc::clone(&tally), rpc, contract);

    // Create the app router
    let app = Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .merge(routes::oracle_routes())
        .layer(build_cors_layer())
        .with_state(state);

    // Start and supervise the background oracle daemon.
    {
        let config = config.clone();
        let tally = Arc::clone(&tally);
        tokio::spawn(async move {
            let mut restart_count: u32 = 0;
            loop {
                let daemon_config = config.clone();
                let daemon_tally = Arc::clone(&tally);
                let handle =
                    tokio::spawn(
                        async move { oracle_daemon::run(daemon_config, daemon_tally).await },
                    );

                match handle.await {
                    Ok(Ok(())) => {
                        info!("oracle daemon exited cleanly; stopping supervisor");
                        break;
                    }
                    Ok(Err(StartError::NoContractConfigured)) => {
                        info!("oracle daemon disabled: APP_CONTRACT_ADDRESS is not set");
                        break;
                    }
                    Ok(Err(error)) => {
                        error!(error = %error, "oracle daemon failed to start; restarting");
                    }
                    Err(join_error) => {
                        if join_error.is_panic() {
                            error!("oracle daemon panicked; restarting");
                        } else {
                            error!(error = %join_error, "oracle daemon task failed; restarting");
                        }
                    }
                }

                restart_count = restart_count.saturating_add(1);
                let backoff_seconds = (2u64.saturating_pow(restart_count.min(5)))
                    .min(DAEMON_SUPERVISOR_MAX_BACKOFF_SECONDS);
                warn!(restart_count, backoff_seconds, "oracle daemon restart backoff");
                sleep(Duration::from_secs(backoff_seconds)).await;
            }
        });
    }

    // Get port from environment or default to 3001
    let port = std::env::var("PORT")
        .unwrap_or_else(|_| "3001".to_string())
        .parse()
        .expect("PORT must be a number");

    let addr = SocketAddr::from(([127, 0, 0, 1], port));

    info!("Server starting on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}

async fn root() -> &'static str {
    "OpenInsure Oracle Server"
}

async fn health_check() -> &'static str {
    "OK"
}

fn build_cors_layer() -> CorsLayer {
    let allowed_origins = std::env::var("CORS_ALLOWED_ORIGINS")
        .unwrap_or_else(|_| "http://localhost:3000".to_string())
        .split(',')
        .filter_map(|origin| origin.trim().parse::<HeaderValue>().ok())
        .collect::<Vec<_>>();

    CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
        .allow_credentials(false)
}
