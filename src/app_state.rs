//! Application state shared across handlers

use std::sync::Arc;

use crate::contract::EthOpenInsureApp;
use crate::eth::EthRpcClient;
use crate::services::status_tally::StatusTally;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub tally: Arc<StatusTally>,
    pub rpc: EthRpcClient,
    /// Absent when no contract address is configured; the affected routes
    /// answer 503 instead.
    pub contract: Option<Arc<EthOpenInsureApp>>,
}

impl AppState {
    pub fn new(
        tally: Arc<StatusTally>,
        rpc: EthRpcClient,
        contract: Option<Arc<EthOpenInsureApp>>,
    ) -> Self {
        Self {
            tally,
            rpc,
            contract,
        }
    }
}
