//! Deploys the contracts of every chain in dependency order and wires them
//! together.

use {
    crate::{
        accounts::Sender,
        arguments::NodeTopology,
        chain::{ChainId, ChainInstance},
        contracts::{ContractKind, ICore},
        deploy::{DeployFailure, DeployRequest, Deployer},
        observe,
        snapshot::{DeployedContract, SnapshotBuilder},
    },
    alloy::{primitives::Address, sol_types::SolCall},
    std::{collections::BTreeMap, sync::Arc},
    tracing::Instrument,
};

/// Everything needed to set up the contracts of one chain.
#[derive(Clone, Debug)]
pub struct ChainSetup {
    pub chain: ChainInstance,
    /// Account deploying and wiring the contracts.
    pub deployer: Sender,
    pub minter: Address,
    pub enforcer: Address,
}

/// Addresses of a fully wired chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChainContracts {
    pub core: Address,
    pub election: Address,
    pub slashing: Address,
}

impl ChainContracts {
    pub fn deployed(&self, chain: ChainId) -> [DeployedContract; 3] {
        [
            (ContractKind::Core, self.core),
            (ContractKind::Election, self.election),
            (ContractKind::Slashing, self.slashing),
        ]
        .map(|(kind, address)| DeployedContract {
            chain,
            kind,
            address,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SetupFailure {
    #[error("deploying {kind} contract failed: {source}")]
    Deploy {
        kind: ContractKind,
        #[source]
        source: DeployFailure,
    },
    #[error("linking election contract failed: {0}")]
    Link(#[source] ethrpc::Error),
    #[error("{kind} contract was deployed to {address} which is already in use")]
    AddressCollision { kind: ContractKind, address: Address },
}

/// Outcome of setting up every chain.
#[derive(Debug, Default)]
pub struct SetupReport(pub BTreeMap<ChainId, Result<ChainContracts, SetupFailure>>);

impl SetupReport {
    pub fn contracts(&self, chain: ChainId) -> Option<&ChainContracts> {
        self.0.get(&chain)?.as_ref().ok()
    }

    /// Records every successfully wired chain.
    pub fn snapshot_builder(&self) -> SnapshotBuilder {
        let mut builder = SnapshotBuilder::default();
        for (chain, contracts) in &self.0 {
            if let Ok(contracts) = contracts {
                contracts
                    .deployed(*chain)
                    .into_iter()
                    .for_each(|contract| builder.record(contract));
            }
        }
        builder
    }
}

pub struct Orchestrator {
    pub deployer: Arc<dyn Deployer>,
    pub topology: NodeTopology,
    pub slashing_gas_limit: u64,
}

impl Orchestrator {
    /// Sets up all chains. Chains sharing a node are processed one after the
    /// other, independent nodes concurrently. A failing chain does not affect
    /// the others.
    pub async fn run(&self, setups: &[ChainSetup]) -> SetupReport {
        let pipelines = setups.iter().map(|setup| {
            let span = tracing::info_span!("setup", chain = %setup.chain.id);
            async move { (setup.chain.id, self.setup_chain(setup).await) }.instrument(span)
        });

        let results = match self.topology {
            NodeTopology::Shared => {
                let mut results = Vec::with_capacity(setups.len());
                for pipeline in pipelines {
                    results.push(pipeline.await);
                }
                results
            }
            NodeTopology::Independent => futures::future::join_all(pipelines).await,
        };

        for (chain, result) in &results {
            if let Err(err) = result {
                observe::chain_setup_failed(*chain, err);
            }
        }
        SetupReport(results.into_iter().collect())
    }

    /// Deploys core and election, links them, then deploys slashing. Every
    /// step is required: the first failure aborts the chain.
    pub async fn setup_chain(&self, setup: &ChainSetup) -> Result<ChainContracts, SetupFailure> {
        let chain = &setup.chain;

        let core = self
            .deploy(setup, ContractKind::Core, vec![], None)
            .await?;
        let election = self
            .deploy(setup, ContractKind::Election, vec![setup.minter], None)
            .await?;
        ensure_distinct(ContractKind::Election, election, &[core])?;

        let call = ICore::setElectionContractCall { election }.abi_encode();
        match setup
            .deployer
            .submit(chain.node.as_ref(), Some(core), call.into(), None)
            .await
        {
            Ok(receipt) => observe::linked(chain.id, core, election, &receipt),
            Err(err) => {
                observe::link_failed(chain.id, core, &err);
                return Err(SetupFailure::Link(err));
            }
        }

        let slashing = self
            .deploy(
                setup,
                ContractKind::Slashing,
                vec![setup.enforcer],
                Some(self.slashing_gas_limit),
            )
            .await?;
        ensure_distinct(ContractKind::Slashing, slashing, &[core, election])?;

        Ok(ChainContracts {
            core,
            election,
            slashing,
        })
    }

    async fn deploy(
        &self,
        setup: &ChainSetup,
        kind: ContractKind,
        args: Vec<Address>,
        gas_limit: Option<u64>,
    ) -> Result<Address, SetupFailure> {
        let chain = setup.chain.id;
        observe::deploying(chain, kind);
        let request = DeployRequest {
            kind,
            args,
            gas_limit,
            from: setup.deployer.clone(),
        };
        match self.deployer.deploy(&setup.chain, request).await {
            Ok(address) => {
                observe::deployed(chain, kind, address);
                Ok(address)
            }
            Err(err) => {
                observe::deploy_failed(chain, kind, &err);
                Err(SetupFailure::Deploy { kind, source: err })
            }
        }
    }
}

fn ensure_distinct(
    kind: ContractKind,
    address: Address,
    existing: &[Address],
) -> Result<(), SetupFailure> {
    if existing.contains(&address) {
        return Err(SetupFailure::AddressCollision { kind, address });
    }
    Ok(())
}
