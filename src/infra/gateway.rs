//! Runs contract operations as ledger transactions.

use std::sync::Arc;

use metrics::counter;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::application::{
    contract::{Contract, Contracts},
    error::ContractError,
    keys::composite_key,
    ledger::{KeyModification, LedgerStub},
    store::RecordStore,
};

use super::ledger::{EventQueue, MemoryLedger};

const SOURCE: &str = "marquee::gateway";

/// What a caller gets back from one invocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Invocation {
    pub tx_id: String,
    pub result: Value,
    /// False when the operation refused the request and its writes were dropped.
    pub committed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block: Option<u64>,
}

#[derive(Clone)]
pub struct Gateway {
    ledger: Arc<MemoryLedger>,
    contracts: Contracts,
}

impl Gateway {
    pub fn new(ledger: Arc<MemoryLedger>, contracts: Contracts) -> Self {
        Self { ledger, contracts }
    }

    pub fn ledger(&self) -> &Arc<MemoryLedger> {
        &self.ledger
    }

    pub fn events(&self) -> &Arc<EventQueue> {
        self.ledger.events()
    }

    /// Executes one operation in its own transaction.
    ///
    /// Writes are committed only when the operation succeeds and accepts the
    /// request. Any error drops the transaction.
    pub fn invoke(
        &self,
        contract: &str,
        operation: &str,
        args: &[String],
    ) -> Result<Invocation, ContractError> {
        let contract: Contract = contract.parse()?;
        let mut tx = self.ledger.begin();
        let tx_id = tx.tx_id().to_string();

        let outcome = {
            let mut store = RecordStore::new(&mut tx);
            self.contracts.dispatch(&mut store, contract, operation, args)
        };

        let result = match outcome {
            Ok(result) => result,
            Err(err) => {
                record(contract, operation, "error");
                warn!(
                    target = SOURCE,
                    tx_id = %tx_id,
                    contract = %contract,
                    operation,
                    code = err.code(),
                    error = %err,
                    "invocation failed; transaction dropped"
                );
                return Err(err);
            }
        };

        if !result.accepted {
            record(contract, operation, "refused");
            info!(
                target = SOURCE,
                tx_id = %tx_id,
                contract = %contract,
                operation,
                writes_dropped = tx.write_count(),
                "invocation refused; transaction dropped"
            );
            return Ok(Invocation {
                tx_id,
                result: result.payload,
                committed: false,
                block: None,
            });
        }

        let receipt = tx.commit().inspect_err(|_| record(contract, operation, "conflict"))?;
        record(contract, operation, "committed");
        info!(
            target = SOURCE,
            tx_id = %receipt.tx_id,
            contract = %contract,
            operation,
            block = receipt.block,
            event = receipt.event.as_deref().unwrap_or(""),
            "invocation committed"
        );
        Ok(Invocation {
            tx_id: receipt.tx_id,
            result: result.payload,
            committed: true,
            block: receipt.block,
        })
    }

    /// Committed revisions of the record stored under `tag` and `components`.
    pub fn history(
        &self,
        tag: &str,
        components: &[&str],
        limit: Option<usize>,
    ) -> Result<Vec<KeyModification>, ContractError> {
        let key = composite_key(tag, components)?;
        let tx = self.ledger.begin();
        let mut revisions = Vec::new();
        for revision in tx.history_for_key(&key)?.take(limit.unwrap_or(usize::MAX)) {
            revisions.push(revision?);
        }
        Ok(revisions)
    }
}

fn record(contract: Contract, operation: &str, outcome: &'static str) {
    counter!(
        "marquee_invocations_total",
        "contract" => contract.as_str(),
        "operation" => operation.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}
