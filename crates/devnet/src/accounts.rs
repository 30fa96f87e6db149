//! Sending accounts. Every account used to submit transactions is guarded by
//! a mutex so two components reusing the same account never race for its
//! nonce.

use {
    alloy::primitives::{Address, Bytes},
    ethrpc::{Node, Receipt, Tx},
    std::{
        collections::HashMap,
        sync::{Arc, Mutex},
    },
    tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard},
    url::Url,
};

#[derive(Clone, Debug)]
pub struct Sender {
    pub address: Address,
    lock: Arc<AsyncMutex<()>>,
}

impl Sender {
    /// Submits a transaction from this account and waits for its receipt.
    /// Submissions from the same account are serialized.
    pub async fn submit(
        &self,
        node: &dyn Node,
        to: Option<Address>,
        input: Bytes,
        gas_limit: Option<u64>,
    ) -> Result<Receipt, ethrpc::Error> {
        let _guard = self.lock.lock().await;
        node.submit(Tx {
            from: self.address,
            to,
            input,
            gas_limit,
        })
        .await
    }

    /// Reserves the account for a caller that sends transactions through
    /// other means (e.g. an external deploy tool).
    pub async fn exclusive(&self) -> OwnedMutexGuard<()> {
        self.lock.clone().lock_owned().await
    }
}

/// Hands out one [`Sender`] per (node endpoint, address) pair.
#[derive(Default)]
pub struct Senders(Mutex<HashMap<(Url, Address), Arc<AsyncMutex<()>>>>);

impl Senders {
    pub fn get(&self, endpoint: &Url, address: Address) -> Sender {
        let mut locks = self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let lock = locks
            .entry((endpoint.clone(), address))
            .or_default()
            .clone();
        Sender { address, lock }
    }
}
