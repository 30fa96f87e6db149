use {
    crate::{AlloyProvider, BlockHashBatches, BlockInfo, Config, Error},
    alloy::{
        network::TransactionBuilder,
        primitives::{Address, B256, Bytes},
        providers::Provider,
        rpc::types::TransactionRequest,
    },
    futures::StreamExt,
    std::fmt::{self, Debug, Formatter},
    url::Url,
};

/// A transaction to be executed by an unlocked account of the node.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Tx {
    pub from: Address,
    /// `None` creates a contract from `input`.
    pub to: Option<Address>,
    pub input: Bytes,
    pub gas_limit: Option<u64>,
}

impl Tx {
    fn into_request(self) -> TransactionRequest {
        let mut request = TransactionRequest::default().with_from(self.from);
        request = match self.to {
            Some(to) => request.with_to(to).with_input(self.input),
            None => request.with_deploy_code(self.input),
        };
        if let Some(gas_limit) = self.gas_limit {
            request = request.with_gas_limit(gas_limit);
        }
        request
    }
}

/// The parts of a mined transaction's receipt the devnet cares about.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Receipt {
    pub tx_hash: B256,
    pub block_number: Option<u64>,
    pub contract_address: Option<Address>,
}

/// A JSON-RPC speaking blockchain node.
#[cfg_attr(any(test, feature = "test-util"), mockall::automock)]
#[async_trait::async_trait]
pub trait Node: Send + Sync {
    /// Accounts managed (and unlocked) by the node.
    async fn accounts(&self) -> Result<Vec<Address>, Error>;

    async fn chain_id(&self) -> Result<u64, Error>;

    /// Submits the transaction and waits until it got mined. Returns
    /// [`Error::Reverted`] if the transaction was included but failed.
    async fn submit(&self, tx: Tx) -> Result<Receipt, Error>;

    /// Executes the transaction against the latest block without
    /// submitting it and returns the raw return data.
    async fn call(&self, tx: Tx) -> Result<Bytes, Error>;

    async fn block(&self, hash: B256) -> Result<BlockInfo, Error>;

    /// Subscribes to the hashes of newly produced blocks. Only blocks
    /// produced after the subscription are reported.
    async fn new_block_hashes(&self) -> Result<BlockHashBatches, Error>;
}

/// [`Node`] implementation backed by an alloy provider.
#[derive(Clone)]
pub struct NodeHandle {
    provider: AlloyProvider,
    url: Url,
    config: Config,
}

impl NodeHandle {
    pub fn new(url: Url, label: &str, config: Config) -> Self {
        let provider = crate::alloy::provider(&url, label, config.poll_interval);
        Self {
            provider,
            url,
            config,
        }
    }
}

impl Debug for NodeHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeHandle")
            .field("url", &self.url.as_str())
            .finish()
    }
}

#[async_trait::async_trait]
impl Node for NodeHandle {
    async fn accounts(&self) -> Result<Vec<Address>, Error> {
        Ok(self.provider.get_accounts().await?)
    }

    async fn chain_id(&self) -> Result<u64, Error> {
        Ok(self.provider.get_chain_id().await?)
    }

    async fn submit(&self, tx: Tx) -> Result<Receipt, Error> {
        let pending = self.provider.send_transaction(tx.into_request()).await?;
        let tx_hash = *pending.tx_hash();
        tracing::trace!(?tx_hash, "submitted transaction");

        let timeout = self.config.receipt_timeout;
        let receipt = pending
            .with_timeout(Some(timeout))
            .get_receipt()
            .await
            .map_err(|err| Error::from_pending(err, tx_hash, timeout))?;
        if !receipt.status() {
            return Err(Error::Reverted { tx_hash });
        }
        Ok(Receipt {
            tx_hash,
            block_number: receipt.block_number,
            contract_address: receipt.contract_address,
        })
    }

    async fn call(&self, tx: Tx) -> Result<Bytes, Error> {
        Ok(self.provider.call(tx.into_request()).await?)
    }

    async fn block(&self, hash: B256) -> Result<BlockInfo, Error> {
        self.provider
            .get_block_by_hash(hash)
            .await?
            .map(BlockInfo::from)
            .ok_or_else(|| Error::MissingBlock(hash.to_string()))
    }

    async fn new_block_hashes(&self) -> Result<BlockHashBatches, Error> {
        let poller = self.provider.watch_blocks().await?;
        Ok(poller
            .with_poll_interval(self.config.poll_interval)
            .into_stream()
            .boxed())
    }
}

#[cfg(test)]
mod tests {
    use {super::*, alloy::primitives::TxKind};

    #[test]
    fn call_transaction_targets_contract() {
        let to = Address::repeat_byte(0x11);
        let request = Tx {
            from: Address::repeat_byte(0x22),
            to: Some(to),
            input: Bytes::from_static(&[1, 2, 3]),
            gas_limit: Some(100_000),
        }
        .into_request();

        assert_eq!(request.from, Some(Address::repeat_byte(0x22)));
        assert_eq!(request.to, Some(TxKind::Call(to)));
        assert_eq!(request.input.input(), Some(&Bytes::from_static(&[1, 2, 3])));
        assert_eq!(request.gas, Some(100_000));
    }

    #[test]
    fn missing_recipient_creates_contract() {
        let request = Tx {
            from: Address::repeat_byte(0x22),
            to: None,
            input: Bytes::from_static(&[0x60, 0x80]),
            gas_limit: None,
        }
        .into_request();

        assert_eq!(request.to, Some(TxKind::Create));
        assert_eq!(request.gas, None);
    }

    #[ignore]
    #[tokio::test]
    async fn local_node() {
        let node = NodeHandle::new(
            "http://localhost:8545".parse().unwrap(),
            "test",
            Config::default(),
        );
        let chain_id = crate::wait_until_ready(&node, std::time::Duration::from_secs(5))
            .await
            .unwrap();
        println!("chain id {chain_id}");

        let accounts = node.accounts().await.unwrap();
        let receipt = node
            .submit(Tx {
                from: accounts[0],
                to: Some(accounts[1]),
                ..Default::default()
            })
            .await
            .unwrap();
        let block = node.block(B256::ZERO).await;
        assert!(matches!(block, Err(Error::MissingBlock(_))));
        println!("{receipt:?}");
    }
}
