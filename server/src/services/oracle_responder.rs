//! Answers oracle requests on behalf of every matching registered oracle.

use std::sync::Arc;

use rand::Rng;
use tokio::task::JoinSet;
use tracing::{info, warn};

use super::oracle_registry::OracleRegistry;
use crate::chain::ChainClient;
use crate::models::{
    FanOutReport, FlightStatusCode, OracleRequest, OracleResponseSubmission, SubmissionFailure,
};

/// Picks the status an oracle reports for a request.
pub trait StatusPolicy: Send + Sync {
    fn pick(&self, request: &OracleRequest) -> FlightStatusCode;
}

/// Uniform draw over every status code, made independently per call.
pub struct RandomStatusPolicy;

impl StatusPolicy for RandomStatusPolicy {
    fn pick(&self, _request: &OracleRequest) -> FlightStatusCode {
        let slot = rand::thread_rng().gen_range(0..FlightStatusCode::ALL.len());
        FlightStatusCode::ALL[slot]
    }
}

/// Always reports the same status.
pub struct FixedStatusPolicy(pub FlightStatusCode);

impl StatusPolicy for FixedStatusPolicy {
    fn pick(&self, _request: &OracleRequest) -> FlightStatusCode {
        self.0
    }
}

pub struct OracleResponder {
    chain: Arc<dyn ChainClient>,
    registry: Arc<OracleRegistry>,
    policy: Arc<dyn StatusPolicy>,
}

impl OracleResponder {
    pub fn new(
        chain: Arc<dyn ChainClient>,
        registry: Arc<OracleRegistry>,
        policy: Arc<dyn StatusPolicy>,
    ) -> Self {
        Self {
            chain,
            registry,
            policy,
        }
    }

    /// Submits one response per matching oracle, concurrently. A rejected
    /// submission is recorded in the report and does not affect the others.
    pub async fn respond(&self, request: OracleRequest) -> FanOutReport {
        let oracles = self.registry.lookup(request.index).await;

        let mut submissions = JoinSet::new();
        for oracle in &oracles {
            let oracle = *oracle;
            let chain = self.chain.clone();
            let submission = OracleResponseSubmission {
                index: request.index,
                flight_code: request.flight_code.clone(),
                status_code: self.policy.pick(&request),
            };

            submissions.spawn(async move {
                let result = chain.submit_oracle_response(oracle, &submission).await;
                (oracle, result)
            });
        }

        // Oracles whose task has not reported back; anything left once the
        // set drains died without a result.
        let mut unanswered = oracles.clone();
        let mut failures = Vec::new();
        while let Some(joined) = submissions.join_next().await {
            if let Ok((oracle, _)) = &joined {
                if let Some(pos) = unanswered.iter().position(|o| o == oracle) {
                    unanswered.swap_remove(pos);
                }
            }

            match joined {
                Ok((_, Ok(_))) => {}
                Ok((oracle, Err(err))) => {
                    warn!(
                        oracle = ?oracle,
                        index = request.index,
                        flight_code = %request.flight_code,
                        error = %err,
                        "oracle response rejected"
                    );
                    failures.push(SubmissionFailure {
                        oracle,
                        error: err.to_string(),
                    });
                }
                Err(join_error) => {
                    warn!(error = %join_error, "oracle submission task failed");
                }
            }
        }

        failures.extend(unanswered.into_iter().map(|oracle| SubmissionFailure {
            oracle,
            error: "submission task aborted before completing".to_string(),
        }));

        let report = FanOutReport {
            request,
            attempted: oracles.len(),
            failures,
        };

        info!(
            index = report.request.index,
            flight_code = %report.request.flight_code,
            attempted = report.attempted,
            succeeded = report.succeeded(),
            "oracle request answered"
        );

        report
    }
}
