//! Report writers: results CSV, failures CSV, parameter guide, and the run
//! metadata sidecar.
//!
//! Column order follows the established 1-39 parameter numbering: the
//! outgoing view first, then the incoming view, with the address and its
//! ledger summary in front.

use crate::schemas::{AddressOutcome, AnalysisResult, RunMetadata};
use anyhow::Context;
use chrono::Utc;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

/// Column headers for the results CSV: address + ledger summary, then the
/// 39 parameters in canonical order.
pub const RESULT_HEADER: [&str; 44] = [
    "address",
    "balance_btc",
    "total_received_btc",
    "total_sent_btc",
    "fetched_tx_count",
    // Outgoing view (1-20)
    "out_tx_count",
    "out_recipient_total",
    "out_recipient_unique",
    "out_recipients_per_tx_mean",
    "out_recipients_per_tx_max",
    "out_recipients_per_tx_min",
    "out_recipients_per_tx_std",
    "out_sender_total",
    "out_sender_unique",
    "out_senders_per_tx_mean",
    "out_senders_per_tx_max",
    "out_senders_per_tx_min",
    "out_senders_per_tx_std",
    "btc_sent_total",
    "btc_sent_mean",
    "btc_sent_min",
    "btc_sent_max",
    "btc_sent_std",
    "btc_sent_per_recipient",
    "btc_sent_per_unique_recipient",
    // Incoming view (21-39)
    "in_tx_count",
    "in_sender_total",
    "in_sender_unique",
    "in_senders_per_tx_mean",
    "in_senders_per_tx_max",
    "in_senders_per_tx_min",
    "in_senders_per_tx_std",
    "in_receiver_total",
    "in_receiver_unique",
    "in_receivers_per_tx_mean",
    "in_receivers_per_tx_max",
    "in_receivers_per_tx_min",
    "in_receivers_per_tx_std",
    "btc_received_total",
    "btc_received_mean",
    "btc_received_min",
    "btc_received_max",
    "btc_received_std",
    "btc_received_per_sender",
];

fn result_row(result: &AnalysisResult) -> Vec<String> {
    let p = &result.params;
    vec![
        result.address.clone(),
        result.balance_btc.to_string(),
        result.total_received_btc.to_string(),
        result.total_sent_btc.to_string(),
        result.fetched_tx_count.to_string(),
        p.out_tx_count.to_string(),
        p.out_recipient_total.to_string(),
        p.out_recipient_unique.to_string(),
        p.out_recipients_per_tx_mean.to_string(),
        p.out_recipients_per_tx_max.to_string(),
        p.out_recipients_per_tx_min.to_string(),
        p.out_recipients_per_tx_std.to_string(),
        p.out_sender_total.to_string(),
        p.out_sender_unique.to_string(),
        p.out_senders_per_tx_mean.to_string(),
        p.out_senders_per_tx_max.to_string(),
        p.out_senders_per_tx_min.to_string(),
        p.out_senders_per_tx_std.to_string(),
        p.btc_sent_total.to_string(),
        p.btc_sent_mean.to_string(),
        p.btc_sent_min.to_string(),
        p.btc_sent_max.to_string(),
        p.btc_sent_std.to_string(),
        p.btc_sent_per_recipient.to_string(),
        p.btc_sent_per_unique_recipient.to_string(),
        p.in_tx_count.to_string(),
        p.in_sender_total.to_string(),
        p.in_sender_unique.to_string(),
        p.in_senders_per_tx_mean.to_string(),
        p.in_senders_per_tx_max.to_string(),
        p.in_senders_per_tx_min.to_string(),
        p.in_senders_per_tx_std.to_string(),
        p.in_receiver_total.to_string(),
        p.in_receiver_unique.to_string(),
        p.in_receivers_per_tx_mean.to_string(),
        p.in_receivers_per_tx_max.to_string(),
        p.in_receivers_per_tx_min.to_string(),
        p.in_receivers_per_tx_std.to_string(),
        p.btc_received_total.to_string(),
        p.btc_received_mean.to_string(),
        p.btc_received_min.to_string(),
        p.btc_received_max.to_string(),
        p.btc_received_std.to_string(),
        p.btc_received_per_sender.to_string(),
    ]
}

/// Write analyzed addresses to a results CSV. Returns the number of rows.
pub fn write_results_csv(path: &Path, outcomes: &[AddressOutcome]) -> anyhow::Result<usize> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create results file: {}", path.display()))?;

    writer.write_record(RESULT_HEADER)?;
    let mut rows = 0;
    for result in outcomes.iter().filter_map(AddressOutcome::as_result) {
        writer.write_record(result_row(result))?;
        rows += 1;
    }
    writer.flush()?;
    Ok(rows)
}

/// Write failed addresses and their terminal errors to a CSV. Returns the
/// number of rows.
pub fn write_failures_csv(path: &Path, outcomes: &[AddressOutcome]) -> anyhow::Result<usize> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create failures file: {}", path.display()))?;

    writer.write_record(["address", "reason"])?;
    let mut rows = 0;
    for outcome in outcomes {
        if let AddressOutcome::Failed { address, reason } = outcome {
            writer.write_record([address.as_str(), reason.as_str()])?;
            rows += 1;
        }
    }
    writer.flush()?;
    Ok(rows)
}

/// One guide entry: canonical number, column name, description, category.
pub fn parameter_guide() -> Vec<(u8, &'static str, &'static str, &'static str)> {
    vec![
        (1, "out_tx_count", "Number of transactions where this address sends coins to others", "Count"),
        (2, "out_recipient_total", "Total count of addresses that received coins (change to self excluded)", "Count"),
        (3, "out_recipient_unique", "Count of unique addresses that received coins from this address", "Count"),
        (4, "out_recipients_per_tx_mean", "Average number of recipients per outgoing transaction", "Average"),
        (5, "out_recipients_per_tx_max", "Maximum recipients in any single outgoing transaction", "Maximum"),
        (6, "out_recipients_per_tx_min", "Minimum recipients in any single outgoing transaction", "Minimum"),
        (7, "out_recipients_per_tx_std", "Statistical variation in recipients per outgoing transaction", "Statistics"),
        (8, "out_sender_total", "Total count of sender addresses in outgoing transactions", "Count"),
        (9, "out_sender_unique", "Count of unique sender addresses in outgoing transactions", "Count"),
        (10, "out_senders_per_tx_mean", "Average number of senders per outgoing transaction", "Average"),
        (11, "out_senders_per_tx_max", "Maximum senders in any single outgoing transaction", "Maximum"),
        (12, "out_senders_per_tx_min", "Minimum senders in any single outgoing transaction", "Minimum"),
        (13, "out_senders_per_tx_std", "Statistical variation in senders per outgoing transaction", "Statistics"),
        (14, "btc_sent_total", "Total BTC sent to others (change to self excluded)", "BTC Amount"),
        (15, "btc_sent_mean", "Average BTC sent per outgoing transaction", "BTC Amount"),
        (16, "btc_sent_min", "Minimum BTC sent in any single transaction", "BTC Amount"),
        (17, "btc_sent_max", "Maximum BTC sent in any single transaction", "BTC Amount"),
        (18, "btc_sent_std", "Statistical variation in BTC sent per transaction", "Statistics"),
        (19, "btc_sent_per_recipient", "Average BTC sent per recipient address", "BTC Amount"),
        (20, "btc_sent_per_unique_recipient", "Average BTC sent per unique recipient address", "BTC Amount"),
        (21, "in_tx_count", "Number of transactions where this address receives coins", "Count"),
        (22, "in_sender_total", "Total count of addresses that sent coins (self excluded)", "Count"),
        (23, "in_sender_unique", "Count of unique addresses that sent coins to this address", "Count"),
        (24, "in_senders_per_tx_mean", "Average number of senders per incoming transaction", "Average"),
        (25, "in_senders_per_tx_max", "Maximum senders in any single incoming transaction", "Maximum"),
        (26, "in_senders_per_tx_min", "Minimum senders in any single incoming transaction", "Minimum"),
        (27, "in_senders_per_tx_std", "Statistical variation in senders per incoming transaction", "Statistics"),
        (28, "in_receiver_total", "Total count of receiver addresses in incoming transactions", "Count"),
        (29, "in_receiver_unique", "Count of unique receiver addresses in incoming transactions", "Count"),
        (30, "in_receivers_per_tx_mean", "Average number of receivers per incoming transaction", "Average"),
        (31, "in_receivers_per_tx_max", "Maximum receivers in any single incoming transaction", "Maximum"),
        (32, "in_receivers_per_tx_min", "Minimum receivers in any single incoming transaction", "Minimum"),
        (33, "in_receivers_per_tx_std", "Statistical variation in receivers per incoming transaction", "Statistics"),
        (34, "btc_received_total", "Total BTC received from others", "BTC Amount"),
        (35, "btc_received_mean", "Average BTC received per incoming transaction", "BTC Amount"),
        (36, "btc_received_min", "Minimum BTC received in any single transaction", "BTC Amount"),
        (37, "btc_received_max", "Maximum BTC received in any single transaction", "BTC Amount"),
        (38, "btc_received_std", "Statistical variation in BTC received per transaction", "Statistics"),
        (39, "btc_received_per_sender", "Average BTC received per unique sender address", "BTC Amount"),
    ]
}

/// Write the parameter guide as CSV to any writer (a file or stdout).
pub fn write_parameter_guide<W: Write>(writer: W) -> anyhow::Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(["number", "name", "description", "category"])?;
    for (number, name, description, category) in parameter_guide() {
        csv_writer.write_record([number.to_string().as_str(), name, description, category])?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// A timestamped path under `dir` that does not collide with an existing
/// file. Collisions within one second get a numeric suffix.
pub fn unique_output_path(dir: &Path, stem: &str, extension: &str) -> PathBuf {
    let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
    let mut candidate = dir.join(format!("{stem}_{timestamp}.{extension}"));
    let mut counter = 1;
    while candidate.exists() {
        candidate = dir.join(format!("{stem}_{timestamp}_{counter}.{extension}"));
        counter += 1;
    }
    candidate
}

/// Paths produced by one report run.
#[derive(Debug)]
pub struct ReportPaths {
    pub results: PathBuf,
    pub failures: Option<PathBuf>,
    pub metadata: PathBuf,
}

/// Write the full report set for a batch: results CSV, failures CSV (only
/// when there are failures), and the run metadata sidecar.
pub fn write_reports(output_dir: &Path, outcomes: &[AddressOutcome]) -> anyhow::Result<ReportPaths> {
    let results_path = unique_output_path(output_dir, "analysis", "csv");
    let analyzed = write_results_csv(&results_path, outcomes)?;
    info!("Wrote {} result rows to {}", analyzed, results_path.display());

    let failed = outcomes.iter().filter(|o| !o.is_analyzed()).count();
    let failures = if failed > 0 {
        let failures_path = unique_output_path(output_dir, "failures", "csv");
        write_failures_csv(&failures_path, outcomes)?;
        info!("Wrote {} failure rows to {}", failed, failures_path.display());
        Some(failures_path)
    } else {
        None
    };

    let metadata_path = results_path.with_extension("meta.json");
    RunMetadata::from_outcomes(outcomes).save(&metadata_path)?;

    Ok(ReportPaths {
        results: results_path,
        failures,
        metadata: metadata_path,
    })
}
