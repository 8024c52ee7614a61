//! Data schemas for the address analyzer.
//!
//! This module is the canonical data model for the whole crate: the ledger
//! transaction shape produced by the fetcher, the per-address result record,
//! and the run metadata sidecar written alongside reports.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::statistics::ParameterSet;

/// Schema version for tracking changes to the result record
pub const SCHEMA_VERSION: &str = "1.0.0";

/// Satoshis per bitcoin, for value conversion at the reporting boundary.
pub const SATS_PER_BTC: f64 = 1e8;

/// Convert a satoshi amount to BTC.
#[inline]
pub fn sats_to_btc(sats: u64) -> f64 {
    sats as f64 / SATS_PER_BTC
}

// ============================================================================
// PART A: Ledger Transaction Schema
// ============================================================================

/// One side of a transaction: an input's previous output or an output.
///
/// The address is optional because coinbase inputs and non-standard scripts
/// carry no decodable address on Blockchain.info.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TxSlot {
    /// Base58 or bech32 address string, if the API could decode one
    pub address: Option<String>,

    /// Value in satoshis
    pub value_sat: u64,
}

/// One ledger transaction, validated and reduced to the fields the
/// classifier consumes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawTransaction {
    /// Transaction hash (hex)
    pub hash: String,

    /// Block/broadcast timestamp (UTC)
    pub time: DateTime<Utc>,

    /// Inputs, in ledger order (source address + value per input)
    pub inputs: Vec<TxSlot>,

    /// Outputs, in ledger order (destination address + value per output)
    pub outputs: Vec<TxSlot>,
}

impl RawTransaction {
    /// Whether `address` appears among this transaction's inputs.
    pub fn spends_from(&self, address: &str) -> bool {
        self.inputs
            .iter()
            .any(|i| i.address.as_deref() == Some(address))
    }

    /// Whether `address` appears among this transaction's outputs.
    pub fn pays_to(&self, address: &str) -> bool {
        self.outputs
            .iter()
            .any(|o| o.address.as_deref() == Some(address))
    }
}

// ============================================================================
// PART B: Address Summary Schema
// ============================================================================

/// Aggregate figures from the `rawaddr` response envelope.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct AddressSummary {
    /// Current balance in satoshis
    pub final_balance_sat: u64,

    /// Lifetime received in satoshis
    pub total_received_sat: u64,

    /// Lifetime sent in satoshis
    pub total_sent_sat: u64,

    /// Total transaction count known to the ledger (may exceed the fetched count)
    pub tx_count: u64,
}

/// Everything the fetcher produces for one address.
#[derive(Debug, Clone)]
pub struct AddressHistory {
    pub summary: AddressSummary,

    /// Ordered transaction sequence, truncated at the configured maximum
    pub transactions: Vec<RawTransaction>,
}

// ============================================================================
// PART C: Result Schema
// ============================================================================

/// One immutable analysis record per address: the address, its ledger
/// summary in BTC, and the 39 derived parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// The analyzed address
    pub address: String,

    /// Current balance (BTC)
    pub balance_btc: f64,

    /// Lifetime received (BTC)
    pub total_received_btc: f64,

    /// Lifetime sent (BTC)
    pub total_sent_btc: f64,

    /// Number of transactions actually fetched and classified
    pub fetched_tx_count: usize,

    /// The 39 behavioral parameters
    pub params: ParameterSet,
}

/// Per-address outcome of a batch run. Failures carry the address and the
/// terminal fetch error so a batch always yields one entry per input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AddressOutcome {
    Analyzed(AnalysisResult),
    Failed { address: String, reason: String },
}

impl AddressOutcome {
    /// The address this outcome belongs to.
    pub fn address(&self) -> &str {
        match self {
            AddressOutcome::Analyzed(result) => &result.address,
            AddressOutcome::Failed { address, .. } => address,
        }
    }

    pub fn is_analyzed(&self) -> bool {
        matches!(self, AddressOutcome::Analyzed(_))
    }

    pub fn as_result(&self) -> Option<&AnalysisResult> {
        match self {
            AddressOutcome::Analyzed(result) => Some(result),
            AddressOutcome::Failed { .. } => None,
        }
    }
}

// ============================================================================
// Metadata Schema
// ============================================================================

/// Run metadata for reproducibility and auditing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMetadata {
    /// Schema version used
    pub schema_version: String,

    /// Run timestamp
    pub run_timestamp: DateTime<Utc>,

    /// Addresses submitted to the pipeline
    pub addresses_requested: usize,

    /// Addresses that produced a full result record
    pub addresses_analyzed: usize,

    /// Addresses that ended in a fetch failure
    pub addresses_failed: usize,

    /// Analyzer version
    pub analyzer_version: String,
}

impl RunMetadata {
    pub fn new(requested: usize, analyzed: usize, failed: usize) -> Self {
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            run_timestamp: Utc::now(),
            addresses_requested: requested,
            addresses_analyzed: analyzed,
            addresses_failed: failed,
            analyzer_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Summarize a batch of outcomes.
    pub fn from_outcomes(outcomes: &[AddressOutcome]) -> Self {
        let analyzed = outcomes.iter().filter(|o| o.is_analyzed()).count();
        Self::new(outcomes.len(), analyzed, outcomes.len() - analyzed)
    }

    pub fn save(&self, path: &std::path::Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}
