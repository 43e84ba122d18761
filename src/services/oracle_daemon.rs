//! Startup assembly for the oracle daemon.

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use crate::config::OracleConfig;
use crate::contract::{ContractError, EthOpenInsureApp};
use crate::eth::EthRpcClient;
use crate::services::event_listener::EventListener;
use crate::services::registrar::OracleRegistrar;
use crate::services::responder::OracleResponder;
use crate::services::status_tally::StatusTally;

#[derive(Debug, Error)]
pub enum StartError {
    #[error("no contract address configured")]
    NoContractConfigured,
    #[error("daemon startup failed: {0}")]
    Init(#[from] ContractError),
}

/// Runs the oracle daemon: enumerate the node's accounts, register each as
/// an oracle, then poll for contract events until the process exits. The
/// listener is armed only after the registration sweep completes. Returns
/// only on a startup failure; the supervisor decides whether to retry.
pub async fn run(config: OracleConfig, tally: Arc<StatusTally>) -> Result<(), StartError> {
    let Some(app_address) = config.app_address else {
        return Err(StartError::NoContractConfigured);
    };

    let rpc = EthRpcClient::new(config.rpc_url.clone());
    let contract = Arc::new(EthOpenInsureApp::new(
        rpc.clone(),
        app_address,
        config.gas_limit,
    ));

    // The account set is enumerated once and lives for the process lifetime.
    let accounts = rpc.accounts().await.map_err(ContractError::from)?;
    if accounts.is_empty() {
        warn!("node exposes no accounts; the daemon will observe but never respond");
    }

    let registrar = OracleRegistrar::new(Arc::clone(&contract));
    registrar.register_all(&accounts).await?;

    let responder = Arc::new(OracleResponder::new(
        contract,
        Arc::new(accounts),
        config.simulation,
    ));

    // Arm the listener at the current head so only events emitted after
    // registration are handled.
    let armed_at = rpc.block_number().await.map_err(ContractError::from)?;
    info!(from_block = armed_at, "oracle daemon ready");

    let listener = EventListener::new(
        rpc,
        app_address,
        responder,
        tally,
        armed_at,
        config.poll_interval,
    );
    listener.start().await;

    Ok(())
}
