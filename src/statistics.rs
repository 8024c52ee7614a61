//! Derivation of the 39 per-address behavioral parameters.
//!
//! Consumes the classifier's movement lists and produces a flat
//! [`ParameterSet`]: 20 parameters over the outgoing view and 19 over the
//! incoming view. All values are totals, set sizes, or distribution moments
//! (mean, min, max, population standard deviation) with defined zero values
//! for empty inputs.

use crate::classify::{IncomingMovement, OutgoingMovement};
use crate::schemas::sats_to_btc;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// The 39 derived parameters for one address. Fields 1-20 describe the
/// outgoing view, 21-39 the incoming view.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParameterSet {
    // Outgoing view
    pub out_tx_count: u64,
    pub out_recipient_total: u64,
    pub out_recipient_unique: u64,
    pub out_recipients_per_tx_mean: f64,
    pub out_recipients_per_tx_max: u64,
    pub out_recipients_per_tx_min: u64,
    pub out_recipients_per_tx_std: f64,
    /// Distinct input addresses across all outgoing transactions. Reported
    /// under both a "total" and a "unique" column; inputs are deduplicated
    /// because the same wallet typically signs every input.
    pub out_sender_total: u64,
    pub out_sender_unique: u64,
    pub out_senders_per_tx_mean: f64,
    pub out_senders_per_tx_max: u64,
    pub out_senders_per_tx_min: u64,
    pub out_senders_per_tx_std: f64,
    pub btc_sent_total: f64,
    pub btc_sent_mean: f64,
    pub btc_sent_min: f64,
    pub btc_sent_max: f64,
    pub btc_sent_std: f64,
    pub btc_sent_per_recipient: f64,
    pub btc_sent_per_unique_recipient: f64,

    // Incoming view
    pub in_tx_count: u64,
    /// Distinct counterparty senders; mirrored into two columns like the
    /// outgoing sender fields
    pub in_sender_total: u64,
    pub in_sender_unique: u64,
    pub in_senders_per_tx_mean: f64,
    pub in_senders_per_tx_max: u64,
    pub in_senders_per_tx_min: u64,
    pub in_senders_per_tx_std: f64,
    pub in_receiver_total: u64,
    pub in_receiver_unique: u64,
    pub in_receivers_per_tx_mean: f64,
    pub in_receivers_per_tx_max: u64,
    pub in_receivers_per_tx_min: u64,
    pub in_receivers_per_tx_std: f64,
    pub btc_received_total: f64,
    pub btc_received_mean: f64,
    pub btc_received_min: f64,
    pub btc_received_max: f64,
    pub btc_received_std: f64,
    pub btc_received_per_sender: f64,
}

/// Derive the full parameter set from the two movement views.
pub fn summarize(outgoing: &[OutgoingMovement], incoming: &[IncomingMovement]) -> ParameterSet {
    let mut params = ParameterSet::default();

    // --- Outgoing view ---
    let recipient_counts: Vec<u64> = outgoing.iter().map(|m| m.recipients.len() as u64).collect();
    let sender_counts: Vec<u64> = outgoing
        .iter()
        .map(|m| m.input_addresses.len() as u64)
        .collect();
    let unique_senders: HashSet<&str> = outgoing
        .iter()
        .flat_map(|m| m.input_addresses.iter().map(String::as_str))
        .collect();
    let recipient_total: u64 = recipient_counts.iter().sum();
    let unique_recipients: HashSet<&str> = outgoing
        .iter()
        .flat_map(|m| m.recipients.iter().map(String::as_str))
        .collect();

    // Pure-change movements stay out of the amount distribution so change
    // values cannot drag the moments toward zero
    let sent_btc: Vec<f64> = outgoing
        .iter()
        .filter(|m| !m.is_pure_change())
        .map(|m| sats_to_btc(m.amount_sent))
        .collect();
    let sent_total: f64 = sent_btc.iter().sum();

    params.out_tx_count = outgoing.len() as u64;
    params.out_recipient_total = recipient_total;
    params.out_recipient_unique = unique_recipients.len() as u64;
    params.out_recipients_per_tx_mean = mean_counts(&recipient_counts);
    params.out_recipients_per_tx_max = max_count(&recipient_counts);
    params.out_recipients_per_tx_min = min_count(&recipient_counts);
    params.out_recipients_per_tx_std = std_counts(&recipient_counts);
    params.out_sender_total = unique_senders.len() as u64;
    params.out_sender_unique = unique_senders.len() as u64;
    params.out_senders_per_tx_mean = mean_counts(&sender_counts);
    params.out_senders_per_tx_max = max_count(&sender_counts);
    params.out_senders_per_tx_min = min_count(&sender_counts);
    params.out_senders_per_tx_std = std_counts(&sender_counts);
    params.btc_sent_total = sent_total;
    params.btc_sent_mean = mean(&sent_btc);
    params.btc_sent_min = min_value(&sent_btc);
    params.btc_sent_max = max_value(&sent_btc);
    params.btc_sent_std = population_std(&sent_btc);
    params.btc_sent_per_recipient = safe_div(sent_total, recipient_total);
    params.btc_sent_per_unique_recipient = safe_div(sent_total, unique_recipients.len() as u64);

    // --- Incoming view ---
    let in_sender_counts: Vec<u64> = incoming.iter().map(|m| m.senders.len() as u64).collect();
    let receiver_counts: Vec<u64> = incoming
        .iter()
        .map(|m| m.output_addresses.len() as u64)
        .collect();
    let unique_in_senders: HashSet<&str> = incoming
        .iter()
        .flat_map(|m| m.senders.iter().map(String::as_str))
        .collect();
    let unique_receivers: HashSet<&str> = incoming
        .iter()
        .flat_map(|m| m.output_addresses.iter().map(String::as_str))
        .collect();

    // Change coming back from the target's own spends is not a receipt
    let received_btc: Vec<f64> = incoming
        .iter()
        .filter(|m| !m.is_pure_change())
        .map(|m| sats_to_btc(m.amount_received))
        .collect();
    let received_total: f64 = received_btc.iter().sum();

    params.in_tx_count = incoming.len() as u64;
    params.in_sender_total = unique_in_senders.len() as u64;
    params.in_sender_unique = unique_in_senders.len() as u64;
    params.in_senders_per_tx_mean = mean_counts(&in_sender_counts);
    params.in_senders_per_tx_max = max_count(&in_sender_counts);
    params.in_senders_per_tx_min = min_count(&in_sender_counts);
    params.in_senders_per_tx_std = std_counts(&in_sender_counts);
    params.in_receiver_total = receiver_counts.iter().sum();
    params.in_receiver_unique = unique_receivers.len() as u64;
    params.in_receivers_per_tx_mean = mean_counts(&receiver_counts);
    params.in_receivers_per_tx_max = max_count(&receiver_counts);
    params.in_receivers_per_tx_min = min_count(&receiver_counts);
    params.in_receivers_per_tx_std = std_counts(&receiver_counts);
    params.btc_received_total = received_total;
    params.btc_received_mean = mean(&received_btc);
    params.btc_received_min = min_value(&received_btc);
    params.btc_received_max = max_value(&received_btc);
    params.btc_received_std = population_std(&received_btc);
    params.btc_received_per_sender = safe_div(received_total, unique_in_senders.len() as u64);

    params
}

// Distribution helpers with defined zero values for empty input

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn min_value(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().copied().fold(f64::INFINITY, f64::min)
    }
}

fn max_value(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }
}

/// Population standard deviation; 0 for fewer than two samples.
fn population_std(values: &[f64]) -> f64 {
    if values.len() <= 1 {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

fn mean_counts(counts: &[u64]) -> f64 {
    let as_f64: Vec<f64> = counts.iter().map(|&c| c as f64).collect();
    mean(&as_f64)
}

fn std_counts(counts: &[u64]) -> f64 {
    let as_f64: Vec<f64> = counts.iter().map(|&c| c as f64).collect();
    population_std(&as_f64)
}

fn max_count(counts: &[u64]) -> u64 {
    counts.iter().copied().max().unwrap_or(0)
}

fn min_count(counts: &[u64]) -> u64 {
    counts.iter().copied().min().unwrap_or(0)
}

fn safe_div(total: f64, count: u64) -> f64 {
    if count == 0 {
        0.0
    } else {
        total / count as f64
    }
}
