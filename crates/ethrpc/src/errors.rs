use {
    alloy::{
        primitives::B256,
        providers::{PendingTransactionError, WatchTxError},
        transports::TransportError,
    },
    std::time::Duration,
};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("rpc error: {0}")]
    Rpc(#[from] TransportError),
    #[error("no receipt for transaction {tx_hash} after {timeout:?}")]
    ReceiptTimeout { tx_hash: B256, timeout: Duration },
    #[error("transaction {tx_hash} reverted")]
    Reverted { tx_hash: B256 },
    #[error("block not found: {0}")]
    MissingBlock(String),
}

impl Error {
    /// Maps the error of a pending transaction watcher into our error type.
    pub(crate) fn from_pending(
        err: PendingTransactionError,
        tx_hash: B256,
        timeout: Duration,
    ) -> Self {
        match err {
            PendingTransactionError::TransportError(err) => Self::Rpc(err),
            PendingTransactionError::TxWatcher(WatchTxError::Timeout) => {
                Self::ReceiptTimeout { tx_hash, timeout }
            }
            other => Self::Rpc(TransportError::local_usage_str(&other.to_string())),
        }
    }
}
