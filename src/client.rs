//! Blockchain.info ledger-query client with rate limiting and retry logic.
//!
//! Provides a robust wrapper around the `rawaddr` endpoint with:
//! - A minimum-interval rate governor owned by the client (no global state)
//! - Bounded exponential backoff on transient failures
//! - Offset-based pagination up to a configured transaction cap
//! - Structural validation that skips malformed transactions instead of
//!   failing the whole fetch

use crate::config::{AnalyzerConfig, FetchConfig, RateLimitConfig};
use crate::schemas::{AddressHistory, AddressSummary, RawTransaction, TxSlot};
use chrono::{DateTime, Utc};
use governor::{Quota, RateLimiter};
use serde::Deserialize;
use std::future::Future;
use std::num::NonZeroU32;
use std::time::Duration;
use tracing::{debug, warn};

/// Address used for the connectivity probe (the genesis coinbase address,
/// guaranteed to exist on every Bitcoin ledger index).
pub const PROBE_ADDRESS: &str = "1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa";

#[derive(Debug, Clone, thiserror::Error)]
pub enum FetchError {
    /// Connection-level failure (DNS, refused, reset)
    #[error("network error: {0}")]
    Network(String),

    /// The per-request timeout elapsed
    #[error("request timed out")]
    TimedOut,

    /// HTTP 429 from the API
    #[error("rate limited (HTTP 429)")]
    RateLimited,

    /// HTTP 5xx from the API
    #[error("server error (HTTP {status})")]
    Server { status: u16 },

    /// Non-retryable HTTP 4xx (invalid address, bad request)
    #[error("client error (HTTP {status}): {body}")]
    Client { status: u16, body: String },

    /// Response body was not the expected JSON envelope
    #[error("malformed response body: {0}")]
    Malformed(String),

    /// Retry budget consumed without a successful response
    #[error("retry budget exhausted after {retries} retries: {last}")]
    Exhausted { retries: u32, last: String },
}

impl FetchError {
    /// Whether this failure should be retried with backoff.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            FetchError::Network(_)
                | FetchError::TimedOut
                | FetchError::RateLimited
                | FetchError::Server { .. }
        )
    }

    fn from_send(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::TimedOut
        } else {
            FetchError::Network(err.to_string())
        }
    }
}

/// Minimum-interval pacing for requests to the API. Explicitly owned by the
/// client; one governor per client instance.
pub struct RateGovernor {
    limiter: RateLimiter<
        governor::state::NotKeyed,
        governor::state::InMemoryState,
        governor::clock::DefaultClock,
    >,
}

impl RateGovernor {
    /// A governor that admits one request per `min_interval`.
    pub fn new(min_interval: Duration) -> Self {
        let quota = Quota::with_period(min_interval)
            .unwrap_or_else(|| Quota::per_second(NonZeroU32::new(1).expect("nonzero")));
        Self {
            limiter: RateLimiter::direct(quota),
        }
    }

    /// Wait until the minimum interval since the previous request has passed.
    pub async fn pace(&self) {
        self.limiter.until_ready().await;
    }

    /// Non-blocking admission check.
    #[cfg(test)]
    fn try_pass(&self) -> bool {
        self.limiter.check().is_ok()
    }
}

/// Calculate the next backoff delay: doubling, capped at `max`.
pub fn next_backoff(current: Duration, max: Duration) -> Duration {
    (current * 2).min(max)
}

/// Run `attempt` under the retry policy: transient failures are retried up
/// to `max_retries` times with exponential backoff starting at `base_delay`;
/// permanent failures surface immediately.
pub async fn with_retry<T, F, Fut>(
    operation: &str,
    limits: &RateLimitConfig,
    mut attempt: F,
) -> Result<T, FetchError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    let mut delay = limits.base_delay();
    let mut last: Option<FetchError> = None;

    for retry in 0..=limits.max_retries {
        if retry > 0 {
            warn!(
                "[retry {}/{}] {} failed transiently: {} — retrying in {:?}",
                retry,
                limits.max_retries,
                operation,
                last.as_ref().map(|e| e.to_string()).unwrap_or_default(),
                delay
            );
            tokio::time::sleep(delay).await;
            delay = next_backoff(delay, limits.max_backoff());
        }

        match attempt().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() => last = Some(e),
            Err(e) => return Err(e),
        }
    }

    Err(FetchError::Exhausted {
        retries: limits.max_retries,
        last: last.map(|e| e.to_string()).unwrap_or_default(),
    })
}

// ============================================================================
// Wire format (rawaddr endpoint)
// ============================================================================

#[derive(Debug, Deserialize)]
struct RawAddrResponse {
    #[serde(default)]
    final_balance: u64,
    #[serde(default)]
    total_received: u64,
    #[serde(default)]
    total_sent: u64,
    #[serde(default)]
    n_tx: u64,
    /// Kept as raw JSON so one malformed transaction can be skipped without
    /// rejecting the page
    #[serde(default)]
    txs: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct WireTx {
    hash: String,
    #[serde(default)]
    time: i64,
    inputs: Vec<WireInput>,
    out: Vec<WireOutput>,
}

#[derive(Debug, Deserialize)]
struct WireInput {
    /// Absent for coinbase inputs
    prev_out: Option<WirePrevOut>,
}

#[derive(Debug, Deserialize)]
struct WirePrevOut {
    addr: Option<String>,
    #[serde(default)]
    value: u64,
}

#[derive(Debug, Deserialize)]
struct WireOutput {
    addr: Option<String>,
    #[serde(default)]
    value: u64,
}

/// Validate one raw transaction object. Missing `inputs`/`out` lists or a
/// missing hash make the record structurally invalid.
fn parse_transaction(value: serde_json::Value) -> Result<RawTransaction, serde_json::Error> {
    let wire: WireTx = serde_json::from_value(value)?;

    let inputs = wire
        .inputs
        .into_iter()
        .map(|i| match i.prev_out {
            Some(prev) => TxSlot {
                address: prev.addr,
                value_sat: prev.value,
            },
            None => TxSlot {
                address: None,
                value_sat: 0,
            },
        })
        .collect();

    let outputs = wire
        .out
        .into_iter()
        .map(|o| TxSlot {
            address: o.addr,
            value_sat: o.value,
        })
        .collect();

    Ok(RawTransaction {
        hash: wire.hash,
        time: DateTime::<Utc>::from_timestamp(wire.time, 0).unwrap_or_default(),
        inputs,
        outputs,
    })
}

/// Walk the `limit`/`offset` pages served by `request` until
/// `max_transactions` have been collected or a short page signals the end of
/// the history. Structurally invalid transactions are skipped with a
/// warning, never fatal to the fetch.
async fn paginate<F, Fut>(
    address: &str,
    max_transactions: usize,
    page_size: usize,
    mut request: F,
) -> Result<AddressHistory, FetchError>
where
    F: FnMut(usize, usize) -> Fut,
    Fut: Future<Output = Result<RawAddrResponse, FetchError>>,
{
    let mut transactions: Vec<RawTransaction> = Vec::new();
    let mut summary: Option<AddressSummary> = None;
    let mut offset = 0usize;
    let mut skipped = 0usize;

    while transactions.len() < max_transactions {
        let want = (max_transactions - transactions.len()).min(page_size);
        let page = request(want, offset).await?;

        if summary.is_none() {
            summary = Some(AddressSummary {
                final_balance_sat: page.final_balance,
                total_received_sat: page.total_received,
                total_sent_sat: page.total_sent,
                tx_count: page.n_tx,
            });
        }

        let received = page.txs.len();
        for value in page.txs {
            match parse_transaction(value) {
                Ok(tx) => transactions.push(tx),
                Err(e) => {
                    skipped += 1;
                    warn!(
                        "Skipping malformed transaction for {} at offset {}: {}",
                        address, offset, e
                    );
                }
            }
        }

        debug!(
            "Fetched page for {}: {} transactions at offset {} ({} total)",
            address,
            received,
            offset,
            transactions.len()
        );

        // A short page means the history is exhausted
        if received < want {
            break;
        }
        offset += received;
    }

    if skipped > 0 {
        warn!(
            "Dropped {} structurally invalid transactions for {}",
            skipped, address
        );
    }

    transactions.truncate(max_transactions);

    Ok(AddressHistory {
        summary: summary.unwrap_or_default(),
        transactions,
    })
}

// ============================================================================
// Client
// ============================================================================

/// Source of per-address transaction history. The ledger API's pagination
/// convention stays behind this seam; the pipeline and everything after it
/// see only [`AddressHistory`].
#[allow(async_fn_in_trait)]
pub trait TransactionSource {
    async fn fetch_history(
        &self,
        address: &str,
        max_transactions: usize,
    ) -> Result<AddressHistory, FetchError>;
}

/// Rate-limited Blockchain.info client.
pub struct BlockchainClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    governor: RateGovernor,
    limits: RateLimitConfig,
    fetch: FetchConfig,
}

impl BlockchainClient {
    pub fn new(config: &AnalyzerConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(config.rate_limits.timeout())
            .user_agent(concat!("btc-address-analyzer/", env!("CARGO_PKG_VERSION")))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            http,
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
            governor: RateGovernor::new(config.rate_limits.base_delay()),
            limits: config.rate_limits.clone(),
            fetch: config.fetch.clone(),
        }
    }

    /// One paced request for a page of the address's history.
    async fn request_page(
        &self,
        address: &str,
        limit: usize,
        offset: usize,
    ) -> Result<RawAddrResponse, FetchError> {
        self.governor.pace().await;

        let url = format!("{}/rawaddr/{}", self.base_url, address);
        let mut request = self.http.get(&url).query(&[
            ("limit", limit.to_string()),
            ("offset", offset.to_string()),
        ]);
        if let Some(key) = &self.api_key {
            request = request.query(&[("api_code", key.as_str())]);
        }

        let response = request.send().await.map_err(FetchError::from_send)?;
        let status = response.status();

        if status.as_u16() == 429 {
            return Err(FetchError::RateLimited);
        }
        if status.is_server_error() {
            return Err(FetchError::Server {
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Client {
                status: status.as_u16(),
                body: body.chars().take(200).collect(),
            });
        }

        response
            .json::<RawAddrResponse>()
            .await
            .map_err(|e| FetchError::Malformed(e.to_string()))
    }

    /// Probe the API with a 1-transaction request against a known address.
    /// Single attempt, no retry; used by the `check` command.
    pub async fn check_connectivity(&self) -> Result<(), FetchError> {
        self.request_page(PROBE_ADDRESS, 1, 0).await.map(|_| ())
    }
}

impl TransactionSource for BlockchainClient {
    /// Fetch up to `max_transactions` transactions for `address`, walking the
    /// API's `limit`/`offset` pages under the retry policy.
    async fn fetch_history(
        &self,
        address: &str,
        max_transactions: usize,
    ) -> Result<AddressHistory, FetchError> {
        paginate(address, max_transactions, self.fetch.page_size, |want, offset| {
            with_retry("rawaddr", &self.limits, move || {
                self.request_page(address, want, offset)
            })
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn test_limits(max_retries: u32, base_ms: u64) -> RateLimitConfig {
        RateLimitConfig {
            base_delay_ms: base_ms,
            inter_address_delay_ms: 0,
            max_retries,
            timeout_secs: 30,
            max_backoff_secs: 60,
        }
    }

    #[test]
    fn test_next_backoff_doubles_and_caps() {
        let next = next_backoff(Duration::from_millis(100), Duration::from_secs(30));
        assert_eq!(next, Duration::from_millis(200));

        let capped = next_backoff(Duration::from_secs(20), Duration::from_secs(30));
        assert_eq!(capped, Duration::from_secs(30));
    }

    #[test]
    fn test_transient_classification() {
        assert!(FetchError::TimedOut.is_transient());
        assert!(FetchError::RateLimited.is_transient());
        assert!(FetchError::Server { status: 503 }.is_transient());
        assert!(FetchError::Network("reset".into()).is_transient());

        assert!(!FetchError::Client {
            status: 404,
            body: String::new()
        }
        .is_transient());
        assert!(!FetchError::Malformed("bad json".into()).is_transient());
        assert!(!FetchError::Exhausted {
            retries: 10,
            last: String::new()
        }
        .is_transient());
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_succeeds_after_transient_failures() {
        let limits = test_limits(10, 1000);
        let calls = Cell::new(0u32);
        let start = tokio::time::Instant::now();

        let result = with_retry("test", &limits, || {
            let n = calls.get() + 1;
            calls.set(n);
            async move {
                if n <= 3 {
                    Err(FetchError::TimedOut)
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 4);
        assert_eq!(calls.get(), 4);
        // Backoff intervals: 1s + 2s + 4s under the paused clock
        assert_eq!(start.elapsed(), Duration::from_secs(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_exhausts_budget_on_sustained_failure() {
        let limits = test_limits(3, 10);
        let calls = Cell::new(0u32);

        let result: Result<(), _> = with_retry("test", &limits, || {
            calls.set(calls.get() + 1);
            async { Err(FetchError::Server { status: 502 }) }
        })
        .await;

        // Initial attempt + exactly max_retries retries
        assert_eq!(calls.get(), 4);
        match result.unwrap_err() {
            FetchError::Exhausted { retries, last } => {
                assert_eq!(retries, 3);
                assert!(last.contains("502"));
            }
            other => panic!("expected Exhausted, got {other}"),
        }
    }

    #[tokio::test]
    async fn test_permanent_failure_is_not_retried() {
        let limits = test_limits(10, 1);
        let calls = Cell::new(0u32);

        let result: Result<(), _> = with_retry("test", &limits, || {
            calls.set(calls.get() + 1);
            async {
                Err(FetchError::Client {
                    status: 400,
                    body: "bad address".into(),
                })
            }
        })
        .await;

        assert_eq!(calls.get(), 1);
        assert!(matches!(
            result.unwrap_err(),
            FetchError::Client { status: 400, .. }
        ));
    }

    #[test]
    fn test_governor_enforces_minimum_interval() {
        let governor = RateGovernor::new(Duration::from_secs(1));
        assert!(governor.try_pass());
        // Second admission inside the interval is denied
        assert!(!governor.try_pass());
    }

    #[test]
    fn test_parse_transaction_valid() {
        let value = serde_json::json!({
            "hash": "f4184fc596403b9d638783cf57adfe4c75c605f6356fbc91338530e9831e9e16",
            "time": 1231731025,
            "inputs": [
                { "prev_out": { "addr": "12cbQLTFMXRnSzktFkuoG3eHoMeFtpTu3S", "value": 5_000_000_000u64 } }
            ],
            "out": [
                { "addr": "1Q2TWHE3GMdB6BZKafqwxXtWAWgFt5Jvm3", "value": 1_000_000_000u64 },
                { "addr": "12cbQLTFMXRnSzktFkuoG3eHoMeFtpTu3S", "value": 4_000_000_000u64 }
            ]
        });

        let tx = parse_transaction(value).unwrap();
        assert_eq!(tx.inputs.len(), 1);
        assert_eq!(tx.outputs.len(), 2);
        assert_eq!(
            tx.inputs[0].address.as_deref(),
            Some("12cbQLTFMXRnSzktFkuoG3eHoMeFtpTu3S")
        );
        assert_eq!(tx.outputs[0].value_sat, 1_000_000_000);
    }

    #[test]
    fn test_parse_transaction_coinbase_input_has_no_address() {
        let value = serde_json::json!({
            "hash": "4a5e1e4baab89f3a32518a88c31bc87f618f76673e2cc77ab2127b7afdeda33b",
            "time": 1231006505,
            "inputs": [ {} ],
            "out": [ { "addr": "1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa", "value": 5_000_000_000u64 } ]
        });

        let tx = parse_transaction(value).unwrap();
        assert_eq!(tx.inputs[0].address, None);
        assert_eq!(tx.inputs[0].value_sat, 0);
    }

    #[test]
    fn test_parse_transaction_rejects_missing_lists() {
        let missing_out = serde_json::json!({
            "hash": "ab",
            "time": 0,
            "inputs": []
        });
        assert!(parse_transaction(missing_out).is_err());

        let missing_inputs = serde_json::json!({
            "hash": "ab",
            "time": 0,
            "out": []
        });
        assert!(parse_transaction(missing_inputs).is_err());

        assert!(parse_transaction(serde_json::json!("not an object")).is_err());
    }

    fn wire_tx(hash: &str) -> serde_json::Value {
        serde_json::json!({
            "hash": hash,
            "time": 1231731025,
            "inputs": [
                { "prev_out": { "addr": "1sender", "value": 100u64 } }
            ],
            "out": [
                { "addr": "1recipient", "value": 90u64 }
            ]
        })
    }

    fn page_of(ledger: &[serde_json::Value], want: usize, offset: usize) -> RawAddrResponse {
        let txs = if offset >= ledger.len() {
            Vec::new()
        } else {
            ledger[offset..(offset + want).min(ledger.len())].to_vec()
        };
        RawAddrResponse {
            final_balance: 150,
            total_received: 500,
            total_sent: 350,
            n_tx: ledger.len() as u64,
            txs,
        }
    }

    #[tokio::test]
    async fn test_paginate_truncates_at_transaction_cap() {
        let ledger: Vec<serde_json::Value> =
            (0..250).map(|i| wire_tx(&format!("tx{i}"))).collect();
        let calls = std::cell::RefCell::new(Vec::new());

        let history = paginate("addr", 200, 100, |want, offset| {
            calls.borrow_mut().push((want, offset));
            let page = page_of(&ledger, want, offset);
            async move { Ok(page) }
        })
        .await
        .unwrap();

        // Two full pages, then the cap stops the walk
        assert_eq!(*calls.borrow(), vec![(100, 0), (100, 100)]);
        assert_eq!(history.transactions.len(), 200);
        assert_eq!(history.transactions[0].hash, "tx0");
        assert_eq!(history.transactions[199].hash, "tx199");
        assert_eq!(history.summary.final_balance_sat, 150);
        assert_eq!(history.summary.tx_count, 250);
    }

    #[tokio::test]
    async fn test_paginate_stops_on_short_page() {
        let ledger: Vec<serde_json::Value> =
            (0..50).map(|i| wire_tx(&format!("tx{i}"))).collect();
        let calls = std::cell::Cell::new(0);

        let history = paginate("addr", 200, 100, |want, offset| {
            calls.set(calls.get() + 1);
            let page = page_of(&ledger, want, offset);
            async move { Ok(page) }
        })
        .await
        .unwrap();

        assert_eq!(calls.get(), 1);
        assert_eq!(history.transactions.len(), 50);
    }

    #[tokio::test]
    async fn test_paginate_skips_malformed_mid_page() {
        // Second record has no inputs/out lists
        let ledger = vec![
            wire_tx("tx0"),
            serde_json::json!({ "hash": "broken" }),
            wire_tx("tx2"),
            wire_tx("tx3"),
        ];

        let history = paginate("addr", 4, 2, |want, offset| {
            let page = page_of(&ledger, want, offset);
            async move { Ok(page) }
        })
        .await
        .unwrap();

        let hashes: Vec<&str> = history
            .transactions
            .iter()
            .map(|tx| tx.hash.as_str())
            .collect();
        assert_eq!(hashes, vec!["tx0", "tx2", "tx3"]);
    }

    #[tokio::test]
    async fn test_paginate_propagates_request_failure() {
        let result = paginate("addr", 100, 100, |_, _| async {
            Err(FetchError::Exhausted {
                retries: 10,
                last: "server error (HTTP 502)".into(),
            })
        })
        .await;

        assert!(matches!(result, Err(FetchError::Exhausted { .. })));
    }
}
