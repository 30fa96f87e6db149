//! Node handle for the chain instances the devnet provisions.
//!
//! The [`Node`] trait is the seam the rest of the workspace talks to. The
//! production implementation, [`NodeHandle`], wraps an alloy provider with
//! an instrumented JSON-RPC client.

pub mod alloy;
pub mod block_stream;
pub mod errors;
pub mod node;

pub use {
    block_stream::{BlockHashBatches, BlockInfo},
    errors::Error,
    node::{Node, NodeHandle, Receipt, Tx},
};
#[cfg(any(test, feature = "test-util"))]
pub use node::MockNode;
use {
    ::alloy::providers::DynProvider,
    std::time::{Duration, Instant},
};

pub type AlloyProvider = DynProvider;

#[derive(Debug, Clone)]
pub struct Config {
    /// How long to wait for a submitted transaction to be included before
    /// giving up on it.
    pub receipt_timeout: Duration,

    /// How often the node gets polled for new blocks and pending receipts.
    pub poll_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            receipt_timeout: Duration::from_secs(30),
            poll_interval: Duration::from_secs(1),
        }
    }
}

/// Polls the node until it answers a request or `timeout` elapses.
///
/// Freshly spawned nodes might not be able to handle requests right away so
/// this is used to synchronize with their startup.
pub async fn wait_until_ready(node: &dyn Node, timeout: Duration) -> Result<u64, Error> {
    const RETRY_DELAY: Duration = Duration::from_millis(100);

    let start = Instant::now();
    loop {
        match node.chain_id().await {
            Ok(chain_id) => {
                tracing::debug!(start_up = ?start.elapsed(), chain_id, "node is ready to use");
                return Ok(chain_id);
            }
            Err(err) if start.elapsed() >= timeout => {
                tracing::error!(?err, ?timeout, "node did not become ready");
                return Err(err);
            }
            Err(err) => {
                tracing::trace!(?err, "node not ready yet");
                tokio::time::sleep(RETRY_DELAY).await;
            }
        }
    }
}
