//! Prometheus metrics for monitoring
//!
//! Exposes metrics for:
//! - Submission attempts and their outcome
//! - Rejections and confirmation timeouts
//! - End-to-end submission latency

use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, Encoder, HistogramVec, TextEncoder,
};
use std::path::Path;

lazy_static! {
    pub static ref TX_ATTEMPTS: CounterVec = register_counter_vec!(
        "airdrop_submission_attempts_total",
        "Total submission attempts, retries included",
        &["chain_id"]
    ).unwrap();

    pub static ref TX_SENT: CounterVec = register_counter_vec!(
        "airdrop_transactions_sent_total",
        "Total transactions accepted by the node",
        &["chain_id"]
    ).unwrap();

    pub static ref TX_CONFIRMED: CounterVec = register_counter_vec!(
        "airdrop_transactions_confirmed_total",
        "Total transactions with a receipt",
        &["chain_id"]
    ).unwrap();

    pub static ref TX_REJECTED: CounterVec = register_counter_vec!(
        "airdrop_transactions_rejected_total",
        "Total transactions rejected by the node",
        &["chain_id"]
    ).unwrap();

    pub static ref CONFIRMATION_TIMEOUTS: CounterVec = register_counter_vec!(
        "airdrop_confirmation_timeouts_total",
        "Total attempts without a receipt within the block bound",
        &["chain_id"]
    ).unwrap();

    pub static ref SUBMISSIONS_EXHAUSTED: CounterVec = register_counter_vec!(
        "airdrop_submissions_exhausted_total",
        "Total submissions that failed every attempt",
        &["chain_id"]
    ).unwrap();

    pub static ref SUBMISSION_LATENCY: HistogramVec = register_histogram_vec!(
        "airdrop_submission_latency_seconds",
        "Time from first attempt to receipt",
        &["chain_id"],
        vec![1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0]
    ).unwrap();
}

pub fn record_attempt(chain_id: u64) {
    TX_ATTEMPTS.with_label_values(&[&chain_id.to_string()]).inc();
}

pub fn record_tx_sent(chain_id: u64) {
    TX_SENT.with_label_values(&[&chain_id.to_string()]).inc();
}

pub fn record_tx_confirmed(chain_id: u64) {
    TX_CONFIRMED.with_label_values(&[&chain_id.to_string()]).inc();
}

pub fn record_tx_rejected(chain_id: u64) {
    TX_REJECTED.with_label_values(&[&chain_id.to_string()]).inc();
}

pub fn record_confirmation_timeout(chain_id: u64) {
    CONFIRMATION_TIMEOUTS
        .with_label_values(&[&chain_id.to_string()])
        .inc();
}

pub fn record_exhausted(chain_id: u64) {
    SUBMISSIONS_EXHAUSTED
        .with_label_values(&[&chain_id.to_string()])
        .inc();
}

pub fn record_latency(chain_id: u64, seconds: f64) {
    SUBMISSION_LATENCY
        .with_label_values(&[&chain_id.to_string()])
        .observe(seconds);
}

/// Encode all registered metrics in the Prometheus text format
pub fn render() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if encoder.encode(&metric_families, &mut buffer).is_err() {
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

/// Write the metrics for a node-exporter textfile collector.
///
/// Written to a temporary file first so the collector never reads a partial file.
pub fn write_textfile(path: &Path) -> std::io::Result<()> {
    let tmp = path.with_extension("prom.tmp");
    std::fs::write(&tmp, render())?;
    std::fs::rename(&tmp, path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_includes_recorded_metrics() {
        record_attempt(424242);
        record_tx_sent(424242);

        let text = render();
        assert!(text.contains("airdrop_submission_attempts_total"));
        assert!(text.contains("chain_id=\"424242\""));
    }

    #[test]
    fn test_write_textfile() {
        record_tx_confirmed(7);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("airdrop.prom");

        write_textfile(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("airdrop_transactions_confirmed_total"));
        assert!(!dir.path().join("airdrop.prom.tmp").exists());
    }
}
