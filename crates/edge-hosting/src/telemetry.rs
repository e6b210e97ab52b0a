//! Tracing bootstrap. Metrics/OTel export is out of scope; this crate's only
//! ambient observability surface is structured `tracing` to stdout.

use std::sync::OnceLock;

use tracing_subscriber::EnvFilter;

static INSTALLED: OnceLock<()> = OnceLock::new();

/// Installs a global `tracing` subscriber reading `RUST_LOG`, defaulting to
/// `info`. Safe to call more than once; only the first call takes effect.
pub fn install() {
    INSTALLED.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        tracing_subscriber::fmt().with_env_filter(filter).init();
    });
}
