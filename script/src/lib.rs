//! Concrete transport, prover and environment wiring shared by the
//! `light-pool` CLI and the `e2e` script.

pub mod config;
pub mod flows;
pub mod prover;
pub mod rpc;

pub use config::EnvConfig;
pub use prover::SnarkjsProver;
pub use rpc::RpcLedger;

/// Installs the fmt subscriber. `RUST_LOG` wins; otherwise `info`, or
/// `debug` when `verbose` is set.
pub fn setup_logger(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
