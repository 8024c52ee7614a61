//! Bitcoin address input handling.
//!
//! Addresses are opaque lookup keys to the analyzer; this module only does
//! glue-level plausibility checks (base58 / bech32 shape) so obvious garbage
//! from an address file is rejected before it costs an API round-trip.

use regex::Regex;
use std::collections::HashSet;
use std::path::Path;
use std::sync::LazyLock;
use thiserror::Error;

/// Legacy (P2PKH/P2SH) base58 addresses: 1... or 3..., 26-35 chars total
static BASE58_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[13][1-9A-HJ-NP-Za-km-z]{25,34}$").expect("Invalid regex pattern")
});

/// Segwit (bech32/bech32m) addresses: bc1...
static BECH32_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^bc1[02-9ac-hj-np-z]{11,87}$").expect("Invalid regex pattern")
});

/// Pattern for pulling address-shaped tokens out of free text
static EMBEDDED_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:[13][1-9A-HJ-NP-Za-km-z]{25,34}|bc1[02-9ac-hj-np-z]{11,87})\b")
        .expect("Invalid regex pattern")
});

#[derive(Error, Debug)]
pub enum AddressError {
    #[error("Implausible address: {0}")]
    Implausible(String),

    #[error("Address file contained no plausible addresses: {0}")]
    EmptyFile(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Whether `input` has the shape of a Bitcoin address. This is a character
/// set and length check, not checksum verification; the ledger API is the
/// authority on whether an address exists.
pub fn is_plausible_address(input: &str) -> bool {
    BASE58_PATTERN.is_match(input) || BECH32_PATTERN.is_match(input)
}

/// Trim and shape-check one address.
pub fn normalize(input: &str) -> Result<String, AddressError> {
    let trimmed = input.trim();
    if is_plausible_address(trimmed) {
        Ok(trimmed.to_string())
    } else {
        Err(AddressError::Implausible(input.to_string()))
    }
}

/// Extract all address-shaped tokens from a text blob.
pub fn extract_addresses(text: &str) -> Vec<String> {
    EMBEDDED_PATTERN
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Shape-check a list of addresses and drop duplicates, preserving first-seen
/// order. Implausible entries are dropped silently; batch order is the
/// contract the pipeline's output order follows.
pub fn validate_and_dedupe(addresses: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut result = Vec::new();

    for addr in addresses {
        if let Ok(normalized) = normalize(&addr) {
            if seen.insert(normalized.clone()) {
                result.push(normalized);
            }
        }
    }

    result
}

/// Load addresses from a text file, one per line. Blank lines and `#`
/// comments are skipped; a line that is not a bare address is scanned for
/// embedded address tokens instead.
pub fn load_address_file(path: &Path) -> Result<Vec<String>, AddressError> {
    let contents = std::fs::read_to_string(path)?;

    let mut candidates: Vec<String> = Vec::new();
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if is_plausible_address(line) {
            candidates.push(line.to_string());
        } else {
            candidates.extend(extract_addresses(line));
        }
    }

    let validated = validate_and_dedupe(candidates);
    if validated.is_empty() {
        return Err(AddressError::EmptyFile(path.display().to_string()));
    }

    Ok(validated)
}
