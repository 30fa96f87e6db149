//! The contracts the devnet deploys and the calls it makes into them.

use serde::Serialize;

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
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ContractKind {
    /// Execution contract holding token balances. Clients know it by the
    /// name of its implementation.
    #[serde(rename = "spvm")]
    Core,
    /// Issues tickets and picks the proposer of each block.
    Election,
    /// Punishes proposers breaking their preconfirmations.
    Slashing,
}

impl ContractKind {
    pub fn as_str(&self) -> &'static str {
        self.into()
    }
}

alloy::sol! {
    interface ICore {
        function setElectionContract(address election) external;
        function getBalance(string token, address owner) external view returns (uint16);
        function testExecuteRawMintTransaction() external;
    }

    interface IElection {
        function mintTicket(address proposer) external;
        function setDefaultRecipient(address recipient) external;
        function refreshTickets() external;
    }
}

/// Tokens reported by the test wallet balance endpoint.
pub const TEST_TOKENS: [&str; 3] = ["RAIN", "QUEEN", "INFINITY"];
