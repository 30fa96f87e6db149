//! The deployment state served by the status API. A snapshot is either
//! complete or does not exist: it can only be built once every contract on
//! every chain is known, and it is published at most once.

use {
    crate::{artifact::Artifacts, chain::ChainId, contracts::ContractKind},
    alloy::{json_abi::JsonAbi, primitives::Address},
    serde::Serialize,
    std::{
        collections::{BTreeMap, HashSet},
        sync::{Arc, OnceLock},
    },
    strum::IntoEnumIterator,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeployedContract {
    pub chain: ChainId,
    pub kind: ContractKind,
    pub address: Address,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PublishedContract {
    pub address: Address,
    pub abi: JsonAbi,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum NotReady {
    #[error("deployment has not been published yet")]
    Unpublished,
    #[error("{kind} contract on {chain} is not deployed")]
    Missing { chain: ChainId, kind: ContractKind },
    #[error("no artifact for {0} contract")]
    MissingArtifact(ContractKind),
    #[error("{chain} uses {address} for more than one contract")]
    DuplicateAddress { chain: ChainId, address: Address },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(transparent)]
pub struct DeploymentSnapshot(BTreeMap<ChainId, BTreeMap<ContractKind, PublishedContract>>);

impl DeploymentSnapshot {
    pub fn address(&self, chain: ChainId, kind: ContractKind) -> Address {
        // Construction guarantees every (chain, kind) pair is present.
        self.0[&chain][&kind].address
    }
}

/// Collects deployed contracts while the chains are being set up.
#[derive(Debug, Default)]
pub struct SnapshotBuilder {
    deployed: BTreeMap<(ChainId, ContractKind), Address>,
}

impl SnapshotBuilder {
    pub fn record(&mut self, contract: DeployedContract) {
        let previous = self
            .deployed
            .insert((contract.chain, contract.kind), contract.address);
        if let Some(previous) = previous {
            tracing::warn!(chain = %contract.chain, kind = %contract.kind, %previous, "contract recorded twice");
        }
    }

    pub fn build(self, artifacts: &Artifacts) -> Result<DeploymentSnapshot, NotReady> {
        let mut chains = BTreeMap::new();
        for chain in ChainId::iter() {
            let mut contracts = BTreeMap::new();
            let mut addresses = HashSet::new();
            for kind in ContractKind::iter() {
                let address = *self
                    .deployed
                    .get(&(chain, kind))
                    .ok_or(NotReady::Missing { chain, kind })?;
                if !addresses.insert(address) {
                    return Err(NotReady::DuplicateAddress { chain, address });
                }
                let artifact = artifacts.get(kind).ok_or(NotReady::MissingArtifact(kind))?;
                contracts.insert(
                    kind,
                    PublishedContract {
                        address,
                        abi: artifact.abi.clone(),
                    },
                );
            }
            chains.insert(chain, contracts);
        }
        Ok(DeploymentSnapshot(chains))
    }
}

/// Write-once cell holding the published snapshot. Readers never block.
#[derive(Clone, Debug, Default)]
pub struct Published(Arc<OnceLock<DeploymentSnapshot>>);

impl Published {
    /// Publishes the snapshot. Returns `false` if one was already published.
    pub fn publish(&self, snapshot: DeploymentSnapshot) -> bool {
        self.0.set(snapshot).is_ok()
    }

    pub fn get(&self) -> Result<&DeploymentSnapshot, NotReady> {
        self.0.get().ok_or(NotReady::Unpublished)
    }
}
