//! Bitcoin Address Analyzer Library
//!
//! Fetches per-address transaction history from the Blockchain.info ledger
//! API and derives 39 behavioral parameters per address for downstream
//! analysis.
//!
//! # Analysis Stages
//!
//! 1. **Input handling** ([`bitcoin`]): Address plausibility checks and address-file loading
//! 2. **Fetch** ([`client`]): Rate-limited, retrying, paginated `rawaddr` retrieval
//! 3. **Classification** ([`classify`]): Splits a history into outgoing and incoming movements
//! 4. **Statistics** ([`statistics`]): Derives the 39-parameter set from the movement views
//! 5. **Orchestration** ([`pipeline`]): Sequential per-address processing with partial-failure semantics
//! 6. **Reports** ([`report`]): Results/failures CSVs, parameter guide, and run metadata
//!
//! # Example
//!
//! ```no_run
//! use btc_address_analyzer::client::BlockchainClient;
//! use btc_address_analyzer::config::AnalyzerConfig;
//! use btc_address_analyzer::pipeline::Pipeline;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = AnalyzerConfig::load()?;
//!     let client = BlockchainClient::new(&config);
//!     let pipeline = Pipeline::new(client, config);
//!     let outcomes = pipeline
//!         .analyze(&["1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa".to_string()])
//!         .await;
//!     println!("Analyzed {} addresses", outcomes.len());
//!     Ok(())
//! }
//! ```

pub mod bitcoin;
pub mod classify;
pub mod client;
pub mod config;
pub mod pipeline;
pub mod report;
pub mod schemas;
pub mod statistics;

// Re-export commonly used types
pub use config::AnalyzerConfig;
pub use schemas::{AddressOutcome, AnalysisResult, RawTransaction, RunMetadata};
pub use statistics::ParameterSet;
