//! Environment-driven configuration, read once at process start.

use std::env;
use std::time::Duration;

use tracing::warn;

use crate::contract::DEFAULT_GAS_LIMIT;
use crate::eth::Address;
use crate::services::responder::StatusSimulation;

const DEFAULT_RPC_URL: &str = "http://localhost:8545";
const DEFAULT_POLL_INTERVAL_SECONDS: u64 = 5;

#[derive(Clone, Debug)]
pub struct OracleConfig {
    pub rpc_url: String,
    /// Deployed OpenInsureApp address. Absent means the daemon stays
    /// disabled while the API surface keeps serving.
    pub app_address: Option<Address>,
    pub gas_limit: u64,
    pub poll_interval: Duration,
    pub simulation: StatusSimulation,
}

impl OracleConfig {
    pub fn from_env() -> Self {
        let rpc_url = env::var("ETH_RPC_URL").unwrap_or_else(|_| DEFAULT_RPC_URL.to_string());

        let app_address = match env::var("APP_CONTRACT_ADDRESS") {
            Ok(raw) if !raw.trim().is_empty() => match raw.trim().parse::<Address>() {
                Ok(address) => Some(address),
                Err(error) => {
                    warn!(error = %error, "ignoring unparseable APP_CONTRACT_ADDRESS");
                    None
                }
            },
            _ => None,
        };

        let gas_limit = env::var("ORACLE_GAS_LIMIT")
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or(DEFAULT_GAS_LIMIT);

        let poll_interval = env::var("EVENT_POLL_INTERVAL_SECONDS")
            .ok()
            .and_then(|value| value.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(DEFAULT_POLL_INTERVAL_SECONDS));

        let simulation = match env::var("SIMULATED_STATUS") {
            Ok(raw) => raw.parse().unwrap_or_else(|error: String| {
                warn!(error = %error, "ignoring unparseable SIMULATED_STATUS");
                StatusSimulation::default()
            }),
            Err(_) => StatusSimulation::default(),
        };

        Self {
            rpc_url,
            app_address,
            gas_limit,
            poll_interval,
            simulation,
        }
    }
}
