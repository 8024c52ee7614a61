//! Per-address analysis orchestration.
//!
//! Drives the fetch → classify → summarize sequence for a batch of
//! addresses, strictly one address at a time with a courtesy delay between
//! them. A failed address becomes a [`AddressOutcome::Failed`] entry; it
//! never aborts the batch.

use crate::classify::classify;
use crate::client::{FetchError, TransactionSource};
use crate::config::AnalyzerConfig;
use crate::schemas::{sats_to_btc, AddressOutcome, AnalysisResult};
use crate::statistics::summarize;
use tracing::{info, warn};

pub struct Pipeline<S> {
    source: S,
    config: AnalyzerConfig,
}

impl<S: TransactionSource> Pipeline<S> {
    pub fn new(source: S, config: AnalyzerConfig) -> Self {
        Self { source, config }
    }

    /// Fetch, classify, and summarize a single address.
    pub async fn analyze_one(&self, address: &str) -> Result<AnalysisResult, FetchError> {
        let history = self
            .source
            .fetch_history(address, self.config.fetch.max_transactions)
            .await?;

        let (outgoing, incoming) = classify(address, &history.transactions);
        info!(
            "Classified {} transactions for {}: {} outgoing, {} incoming",
            history.transactions.len(),
            address,
            outgoing.len(),
            incoming.len()
        );

        let params = summarize(&outgoing, &incoming);

        Ok(AnalysisResult {
            address: address.to_string(),
            balance_btc: sats_to_btc(history.summary.final_balance_sat),
            total_received_btc: sats_to_btc(history.summary.total_received_sat),
            total_sent_btc: sats_to_btc(history.summary.total_sent_sat),
            fetched_tx_count: history.transactions.len(),
            params,
        })
    }

    /// Analyze a batch of addresses sequentially. Returns exactly one
    /// outcome per input address, in input order.
    pub async fn analyze(&self, addresses: &[String]) -> Vec<AddressOutcome> {
        let total = addresses.len();
        let mut outcomes = Vec::with_capacity(total);

        for (i, address) in addresses.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(self.config.rate_limits.inter_address_delay()).await;
            }
            info!("[{}/{}] analyzing {}", i + 1, total, address);

            match self.analyze_one(address).await {
                Ok(result) => outcomes.push(AddressOutcome::Analyzed(result)),
                Err(e) => {
                    warn!("Analysis failed for {}: {}", address, e);
                    outcomes.push(AddressOutcome::Failed {
                        address: address.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        let analyzed = outcomes.iter().filter(|o| o.is_analyzed()).count();
        info!("Batch complete: {}/{} addresses analyzed", analyzed, total);
        outcomes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schemas::{AddressHistory, AddressSummary, RawTransaction, TxSlot};
    use chrono::Utc;
    use std::cell::Cell;
    use std::collections::HashMap;

    struct MockSource {
        histories: HashMap<String, AddressHistory>,
        requested_max: Cell<usize>,
    }

    impl MockSource {
        fn new(histories: HashMap<String, AddressHistory>) -> Self {
            Self {
                histories,
                requested_max: Cell::new(0),
            }
        }
    }

    impl TransactionSource for MockSource {
        async fn fetch_history(
            &self,
            address: &str,
            max_transactions: usize,
        ) -> Result<AddressHistory, FetchError> {
            self.requested_max.set(max_transactions);
            self.histories
                .get(address)
                .cloned()
                .ok_or(FetchError::Server { status: 503 })
        }
    }

    fn slot(addr: Option<&str>, value: u64) -> TxSlot {
        TxSlot {
            address: addr.map(str::to_string),
            value_sat: value,
        }
    }

    fn history_for(address: &str) -> AddressHistory {
        AddressHistory {
            summary: AddressSummary {
                final_balance_sat: 150_000_000,
                total_received_sat: 500_000_000,
                total_sent_sat: 350_000_000,
                tx_count: 2,
            },
            transactions: vec![
                RawTransaction {
                    hash: "t1".into(),
                    time: Utc::now(),
                    inputs: vec![slot(Some(address), 400_000_000)],
                    outputs: vec![slot(Some("bob"), 350_000_000)],
                },
                RawTransaction {
                    hash: "t2".into(),
                    time: Utc::now(),
                    inputs: vec![slot(Some("alice"), 500_000_000)],
                    outputs: vec![slot(Some(address), 500_000_000)],
                },
            ],
        }
    }

    fn test_pipeline(addresses: &[&str]) -> Pipeline<MockSource> {
        let histories = addresses
            .iter()
            .map(|a| (a.to_string(), history_for(a)))
            .collect();
        Pipeline::new(MockSource::new(histories), AnalyzerConfig::default())
    }

    #[tokio::test]
    async fn analyze_one_produces_full_record() {
        let pipeline = test_pipeline(&["addr1"]);
        let result = pipeline.analyze_one("addr1").await.unwrap();

        assert_eq!(result.address, "addr1");
        assert_eq!(result.balance_btc, 1.5);
        assert_eq!(result.total_received_btc, 5.0);
        assert_eq!(result.fetched_tx_count, 2);
        assert_eq!(result.params.out_tx_count, 1);
        assert_eq!(result.params.in_tx_count, 1);
        assert_eq!(result.params.btc_sent_total, 3.5);
        assert_eq!(result.params.btc_received_total, 5.0);
    }

    #[tokio::test]
    async fn analyze_one_passes_configured_transaction_cap() {
        let pipeline = test_pipeline(&["addr1"]);
        pipeline.analyze_one("addr1").await.unwrap();
        assert_eq!(pipeline.source.requested_max.get(), 1000);
    }

    #[tokio::test(start_paused = true)]
    async fn batch_yields_one_outcome_per_address_in_order() {
        let pipeline = test_pipeline(&["addr1", "addr3"]);
        let inputs = vec![
            "addr1".to_string(),
            "addr2".to_string(),
            "addr3".to_string(),
        ];

        let outcomes = pipeline.analyze(&inputs).await;

        assert_eq!(outcomes.len(), 3);
        assert_eq!(outcomes[0].address(), "addr1");
        assert_eq!(outcomes[1].address(), "addr2");
        assert_eq!(outcomes[2].address(), "addr3");
        assert!(outcomes[0].is_analyzed());
        assert!(!outcomes[1].is_analyzed());
        assert!(outcomes[2].is_analyzed());

        match &outcomes[1] {
            AddressOutcome::Failed { reason, .. } => assert!(reason.contains("503")),
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn batch_waits_between_addresses() {
        let pipeline = test_pipeline(&["addr1", "addr2", "addr3"]);
        let inputs = vec![
            "addr1".to_string(),
            "addr2".to_string(),
            "addr3".to_string(),
        ];

        let start = tokio::time::Instant::now();
        pipeline.analyze(&inputs).await;
        // Two gaps of the default 3s inter-address delay
        assert_eq!(start.elapsed(), std::time::Duration::from_secs(6));
    }

    #[tokio::test]
    async fn empty_batch_yields_no_outcomes() {
        let pipeline = test_pipeline(&[]);
        let outcomes = pipeline.analyze(&[]).await;
        assert!(outcomes.is_empty());
    }
}
