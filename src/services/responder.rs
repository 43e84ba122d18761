//! Oracle response passes.

use std::str::FromStr;
use std::sync::Arc;

use rand::Rng;
use tracing::{debug, info, warn};

use crate::contract::{ContractError, OpenInsureApp};
use crate::eth::Address;
use crate::models::{FlightStatusRequest, StatusCode};

/// How the simulated oracle picks the status it reports. A real oracle would
/// consult flight data; this daemon only feeds the contract's consensus
/// machinery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusSimulation {
    Fixed(StatusCode),
    Random,
}

impl StatusSimulation {
    pub fn next_status(&self) -> StatusCode {
        match self {
            StatusSimulation::Fixed(status) => *status,
            StatusSimulation::Random => {
                let pick = rand::thread_rng().gen_range(0..StatusCode::ALL.len());
                StatusCode::ALL[pick]
            }
        }
    }
}

impl Default for StatusSimulation {
    fn default() -> Self {
        StatusSimulation::Fixed(StatusCode::LateAirline)
    }
}

impl FromStr for StatusSimulation {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if value.eq_ignore_ascii_case("random") {
            return Ok(StatusSimulation::Random);
        }
        let code: u8 = value
            .parse()
            .map_err(|_| format!("expected a status code or \"random\", got {value:?}"))?;
        StatusCode::try_from(code)
            .map(StatusSimulation::Fixed)
            .map_err(|error| error.to_string())
    }
}

/// Typed outcome of one attempt within a response pass.
#[derive(Debug)]
pub enum ResponseOutcome {
    Submitted {
        account: Address,
        index: u8,
        tx_hash: String,
    },
    Rejected {
        account: Address,
        index: u8,
        error: ContractError,
    },
    IndexLookupFailed {
        account: Address,
        error: ContractError,
    },
}

impl ResponseOutcome {
    pub fn is_submitted(&self) -> bool {
        matches!(self, ResponseOutcome::Submitted { .. })
    }
}

pub struct OracleResponder<C> {
    contract: Arc<C>,
    accounts: Arc<Vec<Address>>,
    simulation: StatusSimulation,
}

impl<C: OpenInsureApp> OracleResponder<C> {
    pub fn new(contract: Arc<C>, accounts: Arc<Vec<Address>>, simulation: StatusSimulation) -> Self {
        Self {
            contract,
            accounts,
            simulation,
        }
    }

    /// Runs one response pass for a requested index. Index assignments are
    /// fetched fresh from the contract for every account; the contract is
    /// authoritative and assignments are never cached across passes. Every
    /// account/index combination is attempted independently, so a failure
    /// never cuts the pass short.
    pub async fn respond(&self, request: &FlightStatusRequest) -> Vec<ResponseOutcome> {
        let mut outcomes = Vec::new();

        for &account in self.accounts.iter() {
            let indexes = match self.contract.my_indexes(account).await {
                Ok(indexes) => indexes,
                Err(error) => {
                    warn!(account = %account, error = %error, "could not fetch oracle indexes");
                    outcomes.push(ResponseOutcome::IndexLookupFailed { account, error });
                    continue;
                }
            };
            debug!(account = %account, ?indexes, requested = request.index, "oracle index check");

            for index in indexes {
                if index != request.index {
                    continue;
                }
                let status = self.simulation.next_status();
                match self
                    .contract
                    .submit_oracle_response(
                        account,
                        index,
                        request.airline,
                        &request.flight,
                        request.timestamp,
                        status,
                    )
                    .await
                {
                    Ok(tx_hash) => {
                        info!(
                            account = %account,
                            index,
                            flight = %request.flight,
                            status = status.code(),
                            tx_hash = %tx_hash,
                            "oracle response submitted"
                        );
                        outcomes.push(ResponseOutcome::Submitted {
                            account,
                            index,
                            tx_hash,
                        });
                    }
                    Err(error) => {
                        // Late submissions after the contract has closed the
                        // request land here; the pass keeps going.
                        warn!(
                            account = %account,
                            index,
                            flight = %request.flight,
                            error = %error,
                            "oracle response rejected"
                        );
                        outcomes.push(ResponseOutcome::Rejected {
                            account,
                            index,
                            error,
                        });
                    }
                }
            }
        }

        outcomes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::testing::FakeApp;

    fn request(index: u8) -> FlightStatusRequest {
        FlightStatusRequest {
            index,
            airline: FakeApp::account(100),
            flight: "BAC2002".to_string(),
            timestamp: 1_700_000_000,
        }
    }

    /// Accounts 1..=size, each holding indexes that never match 5.
    fn fleet(contract: &mut FakeApp, size: u8) -> Vec<Address> {
        let accounts: Vec<Address> = (1..=size).map(FakeApp::account).collect();
        for &account in &accounts {
            contract.indexes.insert(account, [1, 2, 3]);
        }
        accounts
    }

    fn build(contract: FakeApp, accounts: Vec<Address>) -> (Arc<FakeApp>, OracleResponder<FakeApp>) {
        let contract = Arc::new(contract);
        let responder = OracleResponder::new(
            Arc::clone(&contract),
            Arc::new(accounts),
            StatusSimulation::Fixed(StatusCode::LateAirline),
        );
        (contract, responder)
    }

    #[tokio::test]
    async fn submits_exactly_one_response_per_matching_index() {
        let mut contract = FakeApp::new(0);
        let accounts = fleet(&mut contract, 20);
        contract.indexes.insert(FakeApp::account(3), [5, 7, 9]);
        contract.indexes.insert(FakeApp::account(11), [1, 5, 8]);
        let (contract, responder) = build(contract, accounts);

        let outcomes = responder.respond(&request(5)).await;

        assert_eq!(outcomes.iter().filter(|outcome| outcome.is_submitted()).count(), 2);
        let submissions = contract.submissions.lock().unwrap();
        assert_eq!(submissions.len(), 2);
        assert_eq!(submissions[0].0, FakeApp::account(3));
        assert_eq!(submissions[1].0, FakeApp::account(11));
        assert!(submissions.iter().all(|(_, index, flight, status)| {
            *index == 5 && flight == "BAC2002" && *status == StatusCode::LateAirline
        }));
    }

    #[tokio::test]
    async fn duplicate_index_assignment_submits_once_per_match() {
        let mut contract = FakeApp::new(0);
        let accounts = fleet(&mut contract, 3);
        contract.indexes.insert(FakeApp::account(2), [5, 5, 7]);
        let (contract, responder) = build(contract, accounts);

        let outcomes = responder.respond(&request(5)).await;

        assert_eq!(outcomes.iter().filter(|outcome| outcome.is_submitted()).count(), 2);
        assert_eq!(contract.submissions.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn rejected_submission_does_not_abort_the_pass() {
        let mut contract = FakeApp::new(0);
        let accounts = fleet(&mut contract, 12);
        contract.indexes.insert(FakeApp::account(3), [5, 7, 9]);
        contract.indexes.insert(FakeApp::account(11), [1, 5, 8]);
        contract.reject_response_from.insert(FakeApp::account(3));
        let (contract, responder) = build(contract, accounts);

        let outcomes = responder.respond(&request(5)).await;

        assert_eq!(outcomes.iter().filter(|outcome| outcome.is_submitted()).count(), 1);
        assert_eq!(
            outcomes
                .iter()
                .filter(|outcome| matches!(outcome, ResponseOutcome::Rejected { .. }))
                .count(),
            1
        );
        // Both attempts reached the contract.
        assert_eq!(contract.submissions.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn index_lookup_failure_is_recorded_and_skipped() {
        let mut contract = FakeApp::new(0);
        let accounts = fleet(&mut contract, 4);
        contract.fail_index_lookup_for.insert(FakeApp::account(1));
        contract.indexes.insert(FakeApp::account(4), [5, 6, 7]);
        let (contract, responder) = build(contract, accounts);

        let outcomes = responder.respond(&request(5)).await;

        assert_eq!(
            outcomes
                .iter()
                .filter(|outcome| matches!(outcome, ResponseOutcome::IndexLookupFailed { .. }))
                .count(),
            1
        );
        assert_eq!(outcomes.iter().filter(|outcome| outcome.is_submitted()).count(), 1);
    }

    #[tokio::test]
    async fn redelivered_request_produces_an_identical_pass() {
        let mut contract = FakeApp::new(0);
        let accounts = fleet(&mut contract, 8);
        contract.indexes.insert(FakeApp::account(5), [5, 1, 2]);
        let (contract, responder) = build(contract, accounts);

        let first = responder.respond(&request(5)).await;
        let second = responder.respond(&request(5)).await;

        assert_eq!(first.iter().filter(|outcome| outcome.is_submitted()).count(), 1);
        assert_eq!(second.iter().filter(|outcome| outcome.is_submitted()).count(), 1);
        assert_eq!(contract.submissions.lock().unwrap().len(), 2);
    }

    #[test]
    fn simulation_mode_parses_fixed_and_random() {
        assert_eq!(
            "20".parse::<StatusSimulation>().unwrap(),
            StatusSimulation::Fixed(StatusCode::LateAirline)
        );
        assert_eq!(
            "random".parse::<StatusSimulation>().unwrap(),
            StatusSimulation::Random
        );
        assert!("late".parse::<StatusSimulation>().is_err());
        assert!("15".parse::<StatusSimulation>().is_err());
    }

    #[test]
    fn random_simulation_stays_in_the_domain() {
        for _ in 0..64 {
            let status = StatusSimulation::Random.next_status();
            assert!(StatusCode::ALL.contains(&status));
        }
    }
}
