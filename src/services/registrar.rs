//! Startup oracle registration.

use std::sync::Arc;

use tracing::{info, warn};

use crate::contract::{ContractError, OpenInsureApp};
use crate::eth::Address;

/// Result of one registration attempt. Failures are recorded, never retried.
#[derive(Debug)]
pub struct RegistrationOutcome {
    pub account: Address,
    pub result: Result<String, ContractError>,
}

impl RegistrationOutcome {
    pub fn succeeded(&self) -> bool {
        self.result.is_ok()
    }
}

pub struct OracleRegistrar<C> {
    contract: Arc<C>,
}

impl<C: OpenInsureApp> OracleRegistrar<C> {
    pub fn new(contract: Arc<C>) -> Self {
        Self { contract }
    }

    /// Registers every account as an oracle, in input order, one transaction
    /// at a time. All accounts live in one node signer pool, so submissions
    /// stay sequential to keep nonces ordered. Individual failures (already
    /// registered, insufficient fee) do not stop the sweep; the call as a
    /// whole fails only when the fee cannot be read at all.
    pub async fn register_all(
        &self,
        accounts: &[Address],
    ) -> Result<Vec<RegistrationOutcome>, ContractError> {
        let fee = self.contract.registration_fee().await?;
        info!(fee_wei = fee, accounts = accounts.len(), "registering oracle accounts");

        let mut outcomes = Vec::with_capacity(accounts.len());
        for &account in accounts {
            let result = self.contract.register_oracle(account, fee).await;
            match &result {
                Ok(tx_hash) => info!(account = %account, tx_hash = %tx_hash, "oracle registered"),
                Err(error) => {
                    warn!(account = %account, error = %error, "oracle registration failed")
                }
            }
            outcomes.push(RegistrationOutcome { account, result });
        }

        let registered = outcomes.iter().filter(|outcome| outcome.succeeded()).count();
        info!(registered, attempted = outcomes.len(), "oracle registration sweep complete");
        Ok(outcomes)
    }
}
