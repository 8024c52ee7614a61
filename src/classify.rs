//! Transaction classification relative to a target address.
//!
//! Splits a fetched history into two views: movements where the target is a
//! sender (outgoing) and movements where it is a receiver (incoming). The
//! split is pure and deterministic; the statistics engine consumes the
//! resulting movement lists without ever seeing raw transactions.

use crate::schemas::RawTransaction;

/// A transaction in which the target address appears among the inputs.
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingMovement {
    /// Output addresses other than the target (multiset, ledger order).
    /// Outputs without a decodable address contribute nothing here.
    pub recipients: Vec<String>,

    /// All decodable input addresses, target included (multiset)
    pub input_addresses: Vec<String>,

    /// Satoshis leaving the target: every output value not paid back to it,
    /// addressless outputs included
    pub amount_sent: u64,
}

impl OutgoingMovement {
    /// No external recipient remained after excluding self-change.
    pub fn is_pure_change(&self) -> bool {
        self.recipients.is_empty()
    }
}

/// A transaction in which the target address appears among the outputs.
#[derive(Debug, Clone, PartialEq)]
pub struct IncomingMovement {
    /// Input addresses other than the target (multiset, ledger order)
    pub senders: Vec<String>,

    /// All decodable output addresses, target included (multiset)
    pub output_addresses: Vec<String>,

    /// Satoshis paid to the target across this transaction's outputs
    pub amount_received: u64,
}

impl IncomingMovement {
    /// No external sender remained after excluding the target, so the value
    /// is change coming back from the target's own spend.
    pub fn is_pure_change(&self) -> bool {
        self.senders.is_empty()
    }
}

/// Split `transactions` into the target's outgoing and incoming movements.
///
/// Input and output membership are tested independently, so a transaction
/// that both spends from and pays to the target yields one movement of each
/// kind. Transactions touching the target on neither side are dropped.
pub fn classify(
    address: &str,
    transactions: &[RawTransaction],
) -> (Vec<OutgoingMovement>, Vec<IncomingMovement>) {
    let mut outgoing = Vec::new();
    let mut incoming = Vec::new();

    for tx in transactions {
        if tx.spends_from(address) {
            outgoing.push(outgoing_movement(address, tx));
        }
        if tx.pays_to(address) {
            incoming.push(incoming_movement(address, tx));
        }
    }

    (outgoing, incoming)
}

fn outgoing_movement(address: &str, tx: &RawTransaction) -> OutgoingMovement {
    let recipients = tx
        .outputs
        .iter()
        .filter_map(|o| o.address.as_deref())
        .filter(|a| *a != address)
        .map(str::to_string)
        .collect();

    let input_addresses = tx
        .inputs
        .iter()
        .filter_map(|i| i.address.as_deref())
        .map(str::to_string)
        .collect();

    let amount_sent = tx
        .outputs
        .iter()
        .filter(|o| o.address.as_deref() != Some(address))
        .map(|o| o.value_sat)
        .sum();

    OutgoingMovement {
        recipients,
        input_addresses,
        amount_sent,
    }
}

fn incoming_movement(address: &str, tx: &RawTransaction) -> IncomingMovement {
    let senders = tx
        .inputs
        .iter()
        .filter_map(|i| i.address.as_deref())
        .filter(|a| *a != address)
        .map(str::to_string)
        .collect();

    let output_addresses = tx
        .outputs
        .iter()
        .filter_map(|o| o.address.as_deref())
        .map(str::to_string)
        .collect();

    let amount_received = tx
        .outputs
        .iter()
        .filter(|o| o.address.as_deref() == Some(address))
        .map(|o| o.value_sat)
        .sum();

    IncomingMovement {
        senders,
        output_addresses,
        amount_received,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schemas::TxSlot;
    use chrono::Utc;

    const TARGET: &str = "target";

    fn slot(addr: Option<&str>, value: u64) -> TxSlot {
        TxSlot {
            address: addr.map(str::to_string),
            value_sat: value,
        }
    }

    fn tx(inputs: Vec<TxSlot>, outputs: Vec<TxSlot>) -> RawTransaction {
        RawTransaction {
            hash: "ab".into(),
            time: Utc::now(),
            inputs,
            outputs,
        }
    }

    #[test]
    fn test_spend_with_change_yields_both_movements() {
        let txs = vec![tx(
            vec![slot(Some(TARGET), 500)],
            vec![slot(Some("bob"), 300), slot(Some(TARGET), 180)],
        )];

        let (outgoing, incoming) = classify(TARGET, &txs);
        assert_eq!(outgoing.len(), 1);
        assert_eq!(outgoing[0].recipients, vec!["bob".to_string()]);
        assert_eq!(outgoing[0].input_addresses, vec![TARGET.to_string()]);
        // The change output back to the target does not count as sent
        assert_eq!(outgoing[0].amount_sent, 300);

        // The change output also registers as an incoming movement, but one
        // with no external sender
        assert_eq!(incoming.len(), 1);
        assert!(incoming[0].is_pure_change());
        assert_eq!(incoming[0].amount_received, 180);
    }

    #[test]
    fn test_addressless_output_counts_toward_amount_only() {
        let txs = vec![tx(
            vec![slot(Some(TARGET), 500)],
            vec![slot(Some("bob"), 300), slot(None, 100)],
        )];

        let (outgoing, _) = classify(TARGET, &txs);
        assert_eq!(outgoing[0].recipients, vec!["bob".to_string()]);
        assert_eq!(outgoing[0].amount_sent, 400);
    }

    #[test]
    fn test_receipt_is_incoming() {
        let txs = vec![tx(
            vec![slot(Some("alice"), 400), slot(Some("carol"), 200)],
            vec![slot(Some(TARGET), 350), slot(Some("alice"), 240)],
        )];

        let (outgoing, incoming) = classify(TARGET, &txs);
        assert!(outgoing.is_empty());
        assert_eq!(incoming.len(), 1);
        assert_eq!(
            incoming[0].senders,
            vec!["alice".to_string(), "carol".to_string()]
        );
        // Output addresses keep the target and the co-recipient
        assert_eq!(
            incoming[0].output_addresses,
            vec![TARGET.to_string(), "alice".to_string()]
        );
        assert_eq!(incoming[0].amount_received, 350);
    }

    #[test]
    fn test_target_never_among_counterparties() {
        let txs = vec![
            tx(
                vec![slot(Some(TARGET), 100), slot(Some(TARGET), 100)],
                vec![slot(Some("bob"), 150), slot(Some(TARGET), 40)],
            ),
            tx(
                vec![slot(Some("alice"), 300)],
                vec![slot(Some(TARGET), 290)],
            ),
        ];

        let (outgoing, incoming) = classify(TARGET, &txs);
        assert!(!outgoing[0].recipients.iter().any(|a| a == TARGET));
        assert!(!incoming[0].senders.iter().any(|a| a == TARGET));
    }

    #[test]
    fn test_unrelated_transaction_is_dropped() {
        let txs = vec![tx(
            vec![slot(Some("alice"), 100)],
            vec![slot(Some("bob"), 90)],
        )];

        let (outgoing, incoming) = classify(TARGET, &txs);
        assert!(outgoing.is_empty());
        assert!(incoming.is_empty());
    }

    #[test]
    fn test_pure_self_transfer_has_no_counterparties() {
        let txs = vec![tx(
            vec![slot(Some(TARGET), 100)],
            vec![slot(Some(TARGET), 95)],
        )];

        let (outgoing, incoming) = classify(TARGET, &txs);
        assert_eq!(outgoing.len(), 1);
        assert!(outgoing[0].is_pure_change());
        assert_eq!(outgoing[0].amount_sent, 0);

        assert_eq!(incoming.len(), 1);
        assert!(incoming[0].is_pure_change());
        assert_eq!(incoming[0].amount_received, 95);
    }

    #[test]
    fn test_classification_is_deterministic() {
        let txs = vec![
            tx(
                vec![slot(Some(TARGET), 100)],
                vec![slot(Some("bob"), 90)],
            ),
            tx(
                vec![slot(Some("alice"), 50)],
                vec![slot(Some(TARGET), 45)],
            ),
        ];

        let first = classify(TARGET, &txs);
        let second = classify(TARGET, &txs);
        assert_eq!(first, second);
    }
}
