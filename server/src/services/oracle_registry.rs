//! Registered oracle identities and their assigned indexes.

use std::sync::Arc;

use ethers::types::{Address, U256};
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use crate::chain::{ChainClient, ChainError};
use crate::models::Oracle;

pub struct OracleRegistry {
    chain: Arc<dyn ChainClient>,
    stake: U256,
    oracles: RwLock<Vec<Oracle>>,
}

impl OracleRegistry {
    pub fn new(chain: Arc<dyn ChainClient>, stake: U256) -> Self {
        Self {
            chain,
            stake,
            oracles: RwLock::new(Vec::new()),
        }
    }

    /// Pays the registration stake from `identity` and records the indexes the
    /// contract assigned. Nothing is recorded if the registration reverts or
    /// the indexes cannot be read.
    ///
    /// A registration still pending when the receipt wait runs out may have
    /// been mined meanwhile, so the indexes are asked for anyway; only if
    /// that also fails is the timeout returned.
    pub async fn register(&self, identity: Address) -> Result<[u8; 3], ChainError> {
        let indexes = match self.chain.register_oracle(identity, self.stake).await {
            Ok(_) => self.chain.get_my_indexes(identity).await?,
            Err(ChainError::ReceiptTimeout(tx_hash)) => {
                warn!(
                    oracle = ?identity,
                    ?tx_hash,
                    "registration receipt timed out, checking indexes"
                );
                self.chain
                    .get_my_indexes(identity)
                    .await
                    .map_err(|_| ChainError::ReceiptTimeout(tx_hash))?
            }
            Err(err) => return Err(err),
        };

        self.oracles.write().await.push(Oracle {
            address: identity,
            indexes,
        });

        Ok(indexes)
    }

    /// Registers each identity in turn. Returns how many succeeded.
    pub async fn register_all(&self, identities: &[Address]) -> usize {
        let mut registered = 0;
        for identity in identities {
            match self.register(*identity).await {
                Ok(indexes) => {
                    info!(
                        oracle = ?identity,
                        "Oracle indexes: {}, {}, {}",
                        indexes[0],
                        indexes[1],
                        indexes[2]
                    );
                    registered += 1;
                }
                Err(err) => {
                    error!(oracle = ?identity, error = %err, "failed to register oracle");
                }
            }
        }
        registered
    }

    /// Every registered oracle whose index set contains `index`.
    pub async fn lookup(&self, index: u8) -> Vec<Address> {
        self.oracles
            .read()
            .await
            .iter()
            .filter(|oracle| oracle.serves(index))
            .map(|oracle| oracle.address)
            .collect()
    }

    pub async fn oracles(&self) -> Vec<Oracle> {
        self.oracles.read().await.clone()
    }
}
