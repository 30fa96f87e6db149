use {
    crate::{accounts::Sender, chain::ChainInstance, contracts::IElection, observe},
    alloy::{
        primitives::{Address, B256},
        sol_types::SolCall,
    },
    ethrpc::BlockInfo,
    futures::{Stream, StreamExt},
    std::time::Duration,
    tracing::Instrument,
};

/// Refreshes the election contract's tickets on every new block of a chain.
pub struct Watcher {
    pub chain: ChainInstance,
    pub election: Address,
    pub sender: Sender,
    /// Delay before subscribing again after the block stream ended.
    pub retry_interval: Duration,
}

/// Most recent block the watcher has seen. Never moves backwards.
#[derive(Debug, Default)]
pub struct BlockCursor(Option<BlockInfo>);

impl BlockCursor {
    pub fn advance(&mut self, block: BlockInfo) {
        if self.0.is_none_or(|current| block.number > current.number) {
            self.0 = Some(block);
        }
    }

    pub fn current(&self) -> Option<&BlockInfo> {
        self.0.as_ref()
    }
}

impl Watcher {
    pub async fn run_forever(self) -> ! {
        observe::watching(self.chain.id, self.election);
        let mut cursor = BlockCursor::default();
        loop {
            match self.chain.node.new_block_hashes().await {
                Ok(hashes) => {
                    self.process(hashes, &mut cursor).await;
                    observe::block_stream_ended(self.retry_interval);
                }
                Err(err) => observe::subscribe_failed(&err, self.retry_interval),
            }
            tokio::time::sleep(self.retry_interval).await;
        }
    }

    /// Dispatches one refresh per hash, in the order the node reported them,
    /// until the stream ends.
    async fn process(&self, hashes: impl Stream<Item = Vec<B256>>, cursor: &mut BlockCursor) {
        futures::pin_mut!(hashes);
        while let Some(batch) = hashes.next().await {
            for hash in batch {
                self.dispatch(hash, cursor)
                    .instrument(tracing::debug_span!("refresh", block = ?hash))
                    .await;
            }
        }
    }

    async fn dispatch(&self, hash: B256, cursor: &mut BlockCursor) {
        match self.chain.node.block(hash).await {
            Ok(block) => {
                observe::new_block(&block);
                cursor.advance(block);
            }
            Err(err) => observe::block_lookup_failed(hash, &err),
        }

        let call = IElection::refreshTicketsCall {}.abi_encode();
        match self
            .sender
            .submit(
                self.chain.node.as_ref(),
                Some(self.election),
                call.into(),
                None,
            )
            .await
        {
            Ok(receipt) => observe::refreshed(hash, &receipt),
            Err(err) => observe::refresh_failed(hash, &err),
        }
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{
            accounts::Senders,
            chain::ChainId,
            orchestrator::tests::{DEPLOYER, chain},
        },
        ethrpc::{MockNode, Receipt, Tx},
        mockall::{Sequence, predicate::eq},
        std::sync::{Arc, Mutex},
    };

    const ELECTION: Address = Address::new([0xee; 20]);

    fn hash(n: u8) -> B256 {
        B256::repeat_byte(n)
    }

    fn block(n: u8) -> BlockInfo {
        BlockInfo {
            number: n.into(),
            hash: hash(n),
            ..Default::default()
        }
    }

    fn watcher(node: MockNode) -> Watcher {
        let chain = chain(ChainId::A, node);
        Watcher {
            sender: Senders::default().get(&chain.endpoint, DEPLOYER),
            chain,
            election: ELECTION,
            retry_interval: Duration::from_millis(10),
        }
    }

    #[tokio::test]
    async fn refreshes_once_per_block_in_node_order() {
        let mut node = MockNode::new();
        let mut seq = Sequence::new();
        for n in 1..=3u8 {
            node.expect_block()
                .with(eq(hash(n)))
                .times(1)
                .in_sequence(&mut seq)
                .returning(move |_| Ok(block(n)));
            node.expect_submit()
                .withf(|tx: &Tx| {
                    tx.to == Some(ELECTION)
                        && tx.input[..] == IElection::refreshTicketsCall {}.abi_encode()[..]
                })
                .times(1)
                .in_sequence(&mut seq)
                .returning(|_| Ok(Receipt::default()));
        }
        let watcher = watcher(node);

        let batches = futures::stream::iter(vec![vec![hash(1), hash(2)], vec![], vec![hash(3)]]);
        let mut cursor = BlockCursor::default();
        watcher.process(batches, &mut cursor).await;
        assert_eq!(cursor.current().unwrap().number, 3);
    }

    #[tokio::test]
    async fn failures_do_not_stop_later_blocks() {
        let refreshed = Arc::new(Mutex::new(0));
        let mut node = MockNode::new();
        node.expect_block()
            .with(eq(hash(1)))
            .returning(|_| Err(ethrpc::Error::MissingBlock("gone".into())));
        node.expect_block()
            .with(eq(hash(2)))
            .returning(|_| Ok(block(2)));
        let count = refreshed.clone();
        node.expect_submit().times(3).returning(move |_| {
            let mut count = count.lock().unwrap();
            *count += 1;
            // The refresh of the second block reverts.
            if *count == 2 {
                return Err(ethrpc::Error::Reverted {
                    tx_hash: Default::default(),
                });
            }
            Ok(Receipt::default())
        });
        node.expect_block()
            .with(eq(hash(3)))
            .returning(|_| Ok(block(3)));
        let watcher = watcher(node);

        let batches = futures::stream::iter(vec![vec![hash(1), hash(2), hash(3)]]);
        let mut cursor = BlockCursor::default();
        watcher.process(batches, &mut cursor).await;
        assert_eq!(*refreshed.lock().unwrap(), 3);
        assert_eq!(cursor.current().unwrap().number, 3);
    }

    #[tokio::test]
    async fn resubscribes_after_stream_ends() {
        let mut node = MockNode::new();
        let mut subscriptions = 0;
        node.expect_new_block_hashes().returning(move || {
            subscriptions += 1;
            match subscriptions {
                1 => Err(ethrpc::Error::MissingBlock("filter".into())),
                2 => Ok(futures::stream::iter(vec![vec![hash(1)]]).boxed()),
                _ => Ok(futures::stream::pending().boxed()),
            }
        });
        node.expect_block().returning(|_| Ok(block(1)));
        node.expect_submit()
            .times(1)
            .returning(|_| Ok(Receipt::default()));
        let watcher = watcher(node);

        let _ = tokio::time::timeout(Duration::from_millis(200), watcher.run_forever()).await;
    }

    #[test]
    fn cursor_never_moves_backwards() {
        let mut cursor = BlockCursor::default();
        cursor.advance(block(5));
        cursor.advance(block(4));
        assert_eq!(cursor.current().unwrap().number, 5);
        cursor.advance(block(6));
        assert_eq!(cursor.current().unwrap().number, 6);
    }
}
