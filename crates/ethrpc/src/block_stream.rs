use {
    alloy::{primitives::B256, rpc::types::Block},
    futures::stream::BoxStream,
    std::time::Instant,
};

/// Stream of block hashes the node reported since the previous poll. A batch
/// may hold several hashes when blocks were produced faster than they were
/// polled.
pub type BlockHashBatches = BoxStream<'static, Vec<B256>>;

/// Block information.
#[derive(Clone, Copy, Debug, Eq)]
pub struct BlockInfo {
    pub number: u64,
    pub hash: B256,
    pub parent_hash: B256,
    pub timestamp: u64,
    /// When the system noticed the new block.
    pub observed_at: Instant,
}

impl Default for BlockInfo {
    fn default() -> Self {
        Self {
            number: Default::default(),
            hash: Default::default(),
            parent_hash: Default::default(),
            timestamp: Default::default(),
            observed_at: Instant::now(),
        }
    }
}

impl PartialEq<Self> for BlockInfo {
    fn eq(&self, other: &Self) -> bool {
        // Ignore `observed_at` so the same block fetched twice compares equal.
        self.number == other.number
            && self.hash == other.hash
            && self.parent_hash == other.parent_hash
            && self.timestamp == other.timestamp
    }
}

impl From<Block> for BlockInfo {
    fn from(value: Block) -> Self {
        value.header.into()
    }
}

impl From<alloy::rpc::types::Header> for BlockInfo {
    fn from(value: alloy::rpc::types::Header) -> Self {
        Self {
            number: value.number,
            hash: value.hash,
            parent_hash: value.parent_hash,
            timestamp: value.timestamp,
            observed_at: Instant::now(),
        }
    }
}
