use {
    alloy::primitives::Address,
    anyhow::{Context, Result},
    ethrpc::Node,
    serde::Serialize,
    std::sync::Arc,
    url::Url,
};

/// Identifies one of the two chain instances of the devnet.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    strum::Display,
    strum::EnumIter,
    strum::IntoStaticStr,
)]
pub enum ChainId {
    #[serde(rename = "chain_a")]
    #[strum(serialize = "chain_a")]
    A,
    #[serde(rename = "chain_b")]
    #[strum(serialize = "chain_b")]
    B,
}

impl ChainId {
    pub fn as_str(&self) -> &'static str {
        self.into()
    }
}

/// A connected chain instance. Immutable once created.
#[derive(Clone)]
pub struct ChainInstance {
    pub id: ChainId,
    pub endpoint: Url,
    pub node: Arc<dyn Node>,
    /// Accounts the node keeps unlocked for us.
    pub accounts: Vec<Address>,
}

impl ChainInstance {
    pub async fn connect(id: ChainId, endpoint: Url, node: Arc<dyn Node>) -> Result<Self> {
        let accounts = node
            .accounts()
            .await
            .with_context(|| format!("fetching accounts of {id}"))?;
        tracing::debug!(chain = %id, accounts = accounts.len(), "connected to node");
        Ok(Self {
            id,
            endpoint,
            node,
            accounts,
        })
    }
}

impl std::fmt::Debug for ChainInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainInstance")
            .field("id", &self.id)
            .field("endpoint", &self.endpoint.as_str())
            .field("accounts", &self.accounts)
            .finish()
    }
}
