//! Typed gateway to the deployed OpenInsureApp contract.

use async_trait::async_trait;
use thiserror::Error;

use crate::eth::abi::{self, AbiError};
use crate::eth::{Address, EthRpcClient, RpcError, TransactionRequest};
use crate::models::StatusCode;

/// Gas ceiling for every state-changing call, matching the dApp's deployment
/// tooling.
pub const DEFAULT_GAS_LIMIT: u64 = 6_721_900;

#[derive(Debug, Error)]
pub enum ContractError {
    #[error(transparent)]
    Rpc(#[from] RpcError),
    #[error("transaction {tx_hash} reverted")]
    Reverted { tx_hash: String },
    #[error("abi decode failed: {0}")]
    Abi(#[from] AbiError),
}

/// The slice of the OpenInsureApp surface this daemon consumes. The contract
/// is the single source of truth for oracle state; implementations must not
/// cache index assignments.
#[async_trait]
pub trait OpenInsureApp: Send + Sync {
    /// Current oracle registration fee, in wei.
    async fn registration_fee(&self) -> Result<u128, ContractError>;

    /// Registers `from` as an oracle, paying `fee`. Resolves once the
    /// transaction is mined; returns the transaction hash.
    async fn register_oracle(&self, from: Address, fee: u128) -> Result<String, ContractError>;

    /// The three indexes assigned to `from` at registration time.
    async fn my_indexes(&self, from: Address) -> Result<[u8; 3], ContractError>;

    async fn submit_oracle_response(
        &self,
        from: Address,
        index: u8,
        airline: Address,
        flight: &str,
        timestamp: u64,
        status: StatusCode,
    ) -> Result<String, ContractError>;

    /// Opens a status request for a flight; the contract answers by emitting
    /// an `OracleRequest` event.
    async fn fetch_flight_status(
        &self,
        from: Address,
        airline: Address,
        flight: &str,
        timestamp: u64,
    ) -> Result<String, ContractError>;
}

/// JSON-RPC implementation backed by node-managed accounts.
pub struct EthOpenInsureApp {
    rpc: EthRpcClient,
    address: Address,
    gas_limit: u64,
}

impl EthOpenInsureApp {
    pub fn new(rpc: EthRpcClient, address: Address, gas_limit: u64) -> Self {
        Self {
            rpc,
            address,
            gas_limit,
        }
    }

    async fn send_and_confirm(&self, tx: TransactionRequest) -> Result<String, ContractError> {
        let tx_hash = self.rpc.send_transaction(&tx).await?;
        let receipt = self.rpc.wait_for_receipt(&tx_hash).await?;
        if !receipt.succeeded {
            return Err(ContractError::Reverted { tx_hash });
        }
        Ok(tx_hash)
    }
}

#[async_trait]
impl OpenInsureApp for EthOpenInsureApp {
    async fn registration_fee(&self) -> Result<u128, ContractError> {
        let raw = self
            .rpc
            .call(None, self.address, &abi::encode_get_registration_fee())
            .await?;
        Ok(abi::decode_registration_fee(&raw)?)
    }

    async fn register_oracle(&self, from: Address, fee: u128) -> Result<String, ContractError> {
        self.send_and_confirm(TransactionRequest {
            from,
            to: self.address,
            value: Some(fee),
            gas: self.gas_limit,
            data: abi::encode_register_oracle(),
        })
        .await
    }

    async fn my_indexes(&self, from: Address) -> Result<[u8; 3], ContractError> {
        let raw = self
            .rpc
            .call(Some(from), self.address, &abi::encode_get_my_indexes())
            .await?;
        Ok(abi::decode_index_set(&raw)?)
    }

    async fn submit_oracle_response(
        &self,
        from: Address,
        index: u8,
        airline: Address,
        flight: &str,
        timestamp: u64,
        status: StatusCode,
    ) -> Result<String, ContractError> {
        self.send_and_confirm(TransactionRequest {
            from,
            to: self.address,
            value: None,
            gas: self.gas_limit,
            data: abi::encode_submit_oracle_response(index, airline, flight, timestamp, status),
        })
        .await
    }

    async fn fetch_flight_status(
        &self,
        from: Address,
        airline: Address,
        flight: &str,
        timestamp: u64,
    ) -> Result<String, ContractError> {
        self.send_and_confirm(TransactionRequest {
            from,
            to: self.address,
            value: None,
            gas: self.gas_limit,
            data: abi::encode_fetch_flight_status(airline, flight, timestamp),
        })
        .await
    }
}
