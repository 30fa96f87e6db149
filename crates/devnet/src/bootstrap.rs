//! Seeds the initial on-chain state once the contracts of a chain are wired.

use {
    crate::{
        accounts::Sender,
        chain::ChainInstance,
        contracts::{ICore, IElection},
        observe,
    },
    alloy::{primitives::Address, sol_types::SolCall},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct BootstrapReport {
    pub minted: usize,
    pub failed: usize,
    pub default_recipient_set: bool,
}

pub struct Bootstrap {
    pub tickets_per_proposer: usize,
}

impl Bootstrap {
    /// Mints tickets to the proposers, taking turns between them, and makes
    /// the first proposer the default recipient. Every transaction is awaited
    /// before the next one is sent. Failures are logged and skipped.
    pub async fn run(
        &self,
        chain: &ChainInstance,
        election: Address,
        proposers: &[Address],
        sender: &Sender,
    ) -> BootstrapReport {
        let mut report = BootstrapReport::default();

        for round in 0..self.tickets_per_proposer {
            for &proposer in proposers {
                let call = IElection::mintTicketCall { proposer }.abi_encode();
                match sender
                    .submit(chain.node.as_ref(), Some(election), call.into(), None)
                    .await
                {
                    Ok(_) => {
                        observe::minted(chain.id, proposer, round);
                        report.minted += 1;
                    }
                    Err(err) => {
                        observe::mint_failed(chain.id, proposer, round, &err);
                        report.failed += 1;
                    }
                }
            }
        }
        observe::bootstrapped(chain.id, report.minted, report.failed);

        if let Some(&recipient) = proposers.first() {
            let call = IElection::setDefaultRecipientCall { recipient }.abi_encode();
            match sender
                .submit(chain.node.as_ref(), Some(election), call.into(), None)
                .await
            {
                Ok(_) => {
                    observe::default_recipient_set(chain.id, recipient);
                    report.default_recipient_set = true;
                }
                Err(err) => observe::default_recipient_failed(chain.id, recipient, &err),
            }
        }

        report
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BalanceError {
    #[error(transparent)]
    Rpc(#[from] ethrpc::Error),
    #[error("undecodable balance: {0}")]
    Decode(#[from] alloy::sol_types::Error),
}

/// Reads the balance of `owner` in `token` from a core contract.
pub async fn balance(
    chain: &ChainInstance,
    core: Address,
    token: &str,
    owner: Address,
) -> Result<u16, BalanceError> {
    let call = ICore::getBalanceCall {
        token: token.to_string(),
        owner,
    };
    let data = chain
        .node
        .call(ethrpc::Tx {
            from: owner,
            to: Some(core),
            input: call.abi_encode().into(),
            gas_limit: None,
        })
        .await?;
    Ok(ICore::getBalanceCall::abi_decode_returns(&data)?)
}

/// Runs the core contract's test mint and reports the wallet's RAIN balance
/// before and after. Best effort: failures are only logged.
pub async fn seed_test_tokens(chain: &ChainInstance, core: Address, wallet: Address, sender: &Sender) {
    let before = match balance(chain, core, "RAIN", wallet).await {
        Ok(balance) => Some(balance),
        Err(err) => {
            tracing::debug!(?err, "could not read balance before seeding");
            None
        }
    };

    let call = ICore::testExecuteRawMintTransactionCall {}.abi_encode();
    if let Err(err) = sender
        .submit(chain.node.as_ref(), Some(core), call.into(), None)
        .await
    {
        observe::test_token_seeding_failed(&err);
        return;
    }

    let after = balance(chain, core, "RAIN", wallet).await.ok();
    observe::test_tokens_seeded(wallet, before, after);
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
        alloy::{primitives::U256, sol_types::SolValue},
        ethrpc::{MockNode, Receipt, Tx},
        std::sync::{Arc, Mutex},
    };

    const ELECTION: Address = Address::new([0xee; 20]);
    const PROPOSER_A: Address = Address::new([0x0a; 20]);
    const PROPOSER_B: Address = Address::new([0x0b; 20]);

    fn decode(tx: &Tx) -> String {
        if let Ok(call) = IElection::mintTicketCall::abi_decode(&tx.input) {
            return format!("mint {}", call.proposer);
        }
        if let Ok(call) = IElection::setDefaultRecipientCall::abi_decode(&tx.input) {
            return format!("default {}", call.recipient);
        }
        "unknown".to_string()
    }

    #[tokio::test]
    async fn mints_alternately_then_sets_default_recipient() {
        let calls = Arc::new(Mutex::new(vec![]));
        let mut node = MockNode::new();
        let log = calls.clone();
        node.expect_submit().returning(move |tx| {
            assert_eq!(tx.to, Some(ELECTION));
            assert_eq!(tx.from, DEPLOYER);
            log.lock().unwrap().push(decode(&tx));
            Ok(Receipt::default())
        });
        let chain = chain(ChainId::A, node);
        let sender = Senders::default().get(&chain.endpoint, DEPLOYER);

        let report = Bootstrap {
            tickets_per_proposer: 2,
        }
        .run(&chain, ELECTION, &[PROPOSER_A, PROPOSER_B], &sender)
        .await;

        assert_eq!(
            report,
            BootstrapReport {
                minted: 4,
                failed: 0,
                default_recipient_set: true
            }
        );
        assert_eq!(
            *calls.lock().unwrap(),
            vec![
                format!("mint {PROPOSER_A}"),
                format!("mint {PROPOSER_B}"),
                format!("mint {PROPOSER_A}"),
                format!("mint {PROPOSER_B}"),
                format!("default {PROPOSER_A}"),
            ]
        );
    }

    #[tokio::test]
    async fn failed_mints_do_not_stop_bootstrap() {
        let mut node = MockNode::new();
        let mut count = 0;
        node.expect_submit().times(2 * 3 + 1).returning(move |tx| {
            count += 1;
            // Every third mint times out, the default recipient call fails.
            if count % 3 == 0 {
                return Err(ethrpc::Error::ReceiptTimeout {
                    tx_hash: Default::default(),
                    timeout: Default::default(),
                });
            }
            if IElection::setDefaultRecipientCall::abi_decode(&tx.input).is_ok() {
                return Err(ethrpc::Error::Reverted {
                    tx_hash: Default::default(),
                });
            }
            Ok(Receipt::default())
        });
        let chain = chain(ChainId::B, node);
        let sender = Senders::default().get(&chain.endpoint, DEPLOYER);

        let report = Bootstrap {
            tickets_per_proposer: 3,
        }
        .run(&chain, ELECTION, &[PROPOSER_A, PROPOSER_B], &sender)
        .await;

        assert_eq!(
            report,
            BootstrapReport {
                minted: 4,
                failed: 2,
                default_recipient_set: false
            }
        );
    }

    #[tokio::test]
    async fn reads_balance() {
        let core = Address::new([0xc0; 20]);
        let wallet = Address::new([0xaa; 20]);
        let mut node = MockNode::new();
        node.expect_call()
            .withf(move |tx| {
                let Ok(call) = ICore::getBalanceCall::abi_decode(&tx.input) else {
                    return false;
                };
                tx.to == Some(core) && call.token == "QUEEN" && call.owner == wallet
            })
            .returning(|_| Ok(U256::from(12).abi_encode().into()));
        let chain = chain(ChainId::A, node);

        assert_eq!(balance(&chain, core, "QUEEN", wallet).await.unwrap(), 12);
    }

    #[tokio::test]
    async fn seeding_stops_after_failed_mint() {
        let mut node = MockNode::new();
        node.expect_call()
            .times(1)
            .returning(|_| Ok(U256::from(0).abi_encode().into()));
        node.expect_submit()
            .times(1)
            .returning(|_| Err(ethrpc::Error::Reverted { tx_hash: Default::default() }));
        let chain = chain(ChainId::A, node);
        let sender = Senders::default().get(&chain.endpoint, DEPLOYER);

        seed_test_tokens(&chain, Address::new([0xc0; 20]), Address::new([0xaa; 20]), &sender).await;
    }
}
