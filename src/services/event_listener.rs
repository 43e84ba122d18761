//! Contract event polling loop.
//!
//! Scans the OpenInsureApp event log with a block cursor and dispatches on
//! the leading topic: status requests trigger responder passes, resolved
//! statuses feed the tally.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::Mutex;
use tokio::time::{sleep, Duration};
use tracing::{error, info, warn};

use crate::contract::OpenInsureApp;
use crate::eth::abi;
use crate::eth::{Address, EthRpcClient, LogEntry};
use crate::models::{FlightStatusRequest, StatusCode};
use crate::services::responder::OracleResponder;
use crate::services::status_tally::{StatusTally, LATE_AIRLINE_ADVISORY_THRESHOLD};

/// Blocks scanned per poll cycle, to keep `eth_getLogs` responses bounded.
const MAX_BLOCKS_PER_CYCLE: u64 = 200;

pub struct EventListener<C> {
    rpc: EthRpcClient,
    app_address: Address,
    responder: Arc<OracleResponder<C>>,
    tally: Arc<StatusTally>,
    cursor: Mutex<u64>,
    poll_interval: Duration,
}

impl<C: OpenInsureApp + 'static> EventListener<C> {
    pub fn new(
        rpc: EthRpcClient,
        app_address: Address,
        responder: Arc<OracleResponder<C>>,
        tally: Arc<StatusTally>,
        armed_at_block: u64,
        poll_interval: Duration,
    ) -> Self {
        Self {
            rpc,
            app_address,
            responder,
            tally,
            cursor: Mutex::new(armed_at_block),
            poll_interval,
        }
    }

    /// Polls the contract's event log for the lifetime of the process. Cycle
    /// failures are logged and the loop continues; whether events emitted
    /// during a provider outage are still seen depends on the node retaining
    /// that log range.
    pub async fn start(self) {
        info!(contract = %self.app_address, "event listener armed");

        loop {
            if let Err(error) = self.poll_once().await {
                error!(error = %error, "event poll cycle failed");
            }
            sleep(self.poll_interval).await;
        }
    }

    async fn poll_once(&self) -> Result<()> {
        let latest = self.rpc.block_number().await.context("fetching chain head")?;

        let mut cursor = self.cursor.lock().await;
        let from_block = cursor.saturating_add(1);
        if from_block > latest {
            return Ok(());
        }
        let to_block = latest.min(from_block + MAX_BLOCKS_PER_CYCLE);

        let logs = self
            .rpc
            .logs(self.app_address, from_block, to_block)
            .await
            .context("fetching contract logs")?;

        for log in logs {
            if let Some(request) = self.handle_log(&log) {
                let responder = Arc::clone(&self.responder);
                // Passes run as independent tasks and may overlap; the
                // responder holds no mutable process state.
                tokio::spawn(async move {
                    let outcomes = responder.respond(&request).await;
                    let submitted = outcomes
                        .iter()
                        .filter(|outcome| outcome.is_submitted())
                        .count();
                    info!(
                        flight = %request.flight,
                        requested_index = request.index,
                        submitted,
                        attempted = outcomes.len(),
                        "oracle response pass complete"
                    );
                });
            }
        }

        *cursor = to_block;
        Ok(())
    }

    /// Dispatches one log line. Returns the decoded request when a responder
    /// pass should run; resolved statuses are tallied inline.
    fn handle_log(&self, log: &LogEntry) -> Option<FlightStatusRequest> {
        let topic = log.topics.first()?.as_str();

        if topic == abi::oracle_request_topic() {
            match abi::decode_oracle_request(&log.data) {
                Ok(request) => {
                    info!(
                        flight = %request.flight,
                        requested_index = request.index,
                        airline = %request.airline,
                        "flight status requested"
                    );
                    return Some(request);
                }
                Err(error) => warn!(error = %error, "malformed OracleRequest payload"),
            }
        } else if topic == abi::flight_status_info_topic() {
            match abi::decode_flight_status_info(&log.data) {
                Ok(info) => {
                    let count = self.tally.record(info.status);
                    info!(
                        flight = %info.flight,
                        status = info.status.code(),
                        observed = count,
                        "flight status resolved"
                    );
                    if info.status == StatusCode::LateAirline
                        && count > LATE_AIRLINE_ADVISORY_THRESHOLD
                    {
                        warn!(
                            flight = %info.flight,
                            late_reports = count,
                            "flight repeatedly late on the airline; passengers eligible for credit"
                        );
                    }
                }
                Err(error) => warn!(error = %error, "malformed FlightStatusInfo payload"),
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::testing::FakeApp;
    use crate::eth::abi::test_payloads;
    use crate::services::responder::StatusSimulation;

    fn listener() -> EventListener<FakeApp> {
        let contract = Arc::new(FakeApp::new(0));
        let responder =
            OracleResponder::new(contract, Arc::new(Vec::new()), StatusSimulation::default());
        EventListener::new(
            EthRpcClient::new("http://localhost:8545".to_string()),
            FakeApp::account(200),
            Arc::new(responder),
            Arc::new(StatusTally::new()),
            0,
            Duration::from_secs(5),
        )
    }

    fn log(topic: &str, data: Vec<u8>) -> LogEntry {
        LogEntry {
            topics: vec![topic.to_string()],
            data,
            block_number: 1,
        }
    }

    #[test]
    fn oracle_request_logs_decode_into_a_pass_trigger() {
        let listener = listener();
        let data = test_payloads::oracle_request(5, FakeApp::account(9), "BAC2002", 1_700_000_000);

        let request = listener
            .handle_log(&log(abi::oracle_request_topic(), data))
            .unwrap();

        assert_eq!(request.index, 5);
        assert_eq!(request.airline, FakeApp::account(9));
        assert_eq!(request.flight, "BAC2002");
        assert_eq!(request.timestamp, 1_700_000_000);
    }

    #[test]
    fn flight_status_logs_feed_the_tally() {
        let listener = listener();
        for _ in 0..2 {
            let data = test_payloads::flight_status_info(FakeApp::account(9), "BAC2002", 1, 20);
            assert!(listener
                .handle_log(&log(abi::flight_status_info_topic(), data))
                .is_none());
        }

        let snapshot = listener.tally.snapshot();
        let late = snapshot
            .iter()
            .find(|row| row.status == StatusCode::LateAirline)
            .unwrap();
        assert_eq!(late.count, 2);
    }

    #[test]
    fn unknown_topics_and_malformed_payloads_are_skipped() {
        let listener = listener();

        assert!(listener.handle_log(&log("0xdeadbeef", Vec::new())).is_none());
        assert!(listener
            .handle_log(&log(abi::oracle_request_topic(), vec![0u8; 16]))
            .is_none());
        let bad_status = test_payloads::flight_status_info(FakeApp::account(9), "BAC2002", 1, 42);
        assert!(listener
            .handle_log(&log(abi::flight_status_info_topic(), bad_status))
            .is_none());

        assert!(listener.tally.snapshot().iter().all(|row| row.count == 0));
    }
}
