//! Shared helpers for integration tests.

use powchain_core::{double_sha256, TxId};

/// Install a test subscriber once. Honors `RUST_LOG`, defaults to warnings.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

/// Deterministic fake transaction ids: sha256d("<tag>-<i>").
pub fn fake_txids(tag: &str, count: usize) -> Vec<TxId> {
    (0..count)
        .map(|i| double_sha256(format!("{}-{}", tag, i).as_bytes()))
        .collect()
}
