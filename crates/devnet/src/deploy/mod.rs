//! Contract deployment. A [`Deployer`] turns a deploy request into the
//! address of the created contract, either through the external deploy tool
//! or by submitting the artifact's bytecode directly.

pub mod bytecode;
pub mod forge;
pub mod output;

use {
    crate::{accounts::Sender, chain::ChainInstance, contracts::ContractKind},
    alloy::primitives::{Address, B256},
    std::time::Duration,
};

#[derive(Clone, Debug)]
pub struct DeployRequest {
    pub kind: ContractKind,
    /// Constructor arguments in declaration order.
    pub args: Vec<Address>,
    pub gas_limit: Option<u64>,
    pub from: Sender,
}

#[derive(Debug, thiserror::Error)]
pub enum DeployFailure {
    #[error("deploy tool failed: {0}")]
    ToolInvocation(String),
    #[error("deploy tool did not finish within {0:?}")]
    ToolTimeout(Duration),
    #[error("could not parse deployed address: {0}")]
    AddressParse(#[from] output::ParseError),
    #[error("rpc failure: {0}")]
    Rpc(ethrpc::Error),
    #[error("no receipt for deployment {tx_hash} after {timeout:?}")]
    ReceiptTimeout { tx_hash: B256, timeout: Duration },
    #[error("deployment {0} did not create a contract")]
    MissingContractAddress(B256),
    #[error("no artifact loaded for {0}")]
    MissingArtifact(ContractKind),
}

impl From<ethrpc::Error> for DeployFailure {
    fn from(err: ethrpc::Error) -> Self {
        match err {
            ethrpc::Error::ReceiptTimeout { tx_hash, timeout } => {
                Self::ReceiptTimeout { tx_hash, timeout }
            }
            ethrpc::Error::Reverted { tx_hash } => Self::MissingContractAddress(tx_hash),
            err => Self::Rpc(err),
        }
    }
}

impl DeployFailure {
    /// Short label used for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Self::ToolInvocation(_) => "tool_invocation",
            Self::ToolTimeout(_) => "tool_timeout",
            Self::AddressParse(_) => "address_parse",
            Self::Rpc(_) => "rpc",
            Self::ReceiptTimeout { .. } => "receipt_timeout",
            Self::MissingContractAddress(_) => "missing_contract_address",
            Self::MissingArtifact(_) => "missing_artifact",
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait Deployer: Send + Sync {
    /// Creates the contract and waits until it is mined.
    async fn deploy(
        &self,
        chain: &ChainInstance,
        request: DeployRequest,
    ) -> Result<Address, DeployFailure>;
}
