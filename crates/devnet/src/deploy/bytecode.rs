use {
    super::{DeployFailure, DeployRequest, Deployer},
    crate::{artifact::Artifacts, chain::ChainInstance},
    alloy::{
        dyn_abi::DynSolValue,
        primitives::{Address, Bytes},
    },
};

/// Deploys contracts by submitting the artifact's creation code followed by
/// the ABI encoded constructor arguments.
#[derive(Clone, Debug)]
pub struct BytecodeDeployer {
    artifacts: Artifacts,
}

impl BytecodeDeployer {
    pub fn new(artifacts: Artifacts) -> Self {
        Self { artifacts }
    }
}

pub fn creation_code(bytecode: &Bytes, args: &[Address]) -> Bytes {
    let args = DynSolValue::Tuple(args.iter().copied().map(DynSolValue::Address).collect());
    [bytecode.as_ref(), &args.abi_encode_params()].concat().into()
}

#[async_trait::async_trait]
impl Deployer for BytecodeDeployer {
    async fn deploy(
        &self,
        chain: &ChainInstance,
        request: DeployRequest,
    ) -> Result<Address, DeployFailure> {
        let artifact = self
            .artifacts
            .get(request.kind)
            .ok_or(DeployFailure::MissingArtifact(request.kind))?;
        let input = creation_code(&artifact.bytecode, &request.args);
        let receipt = request
            .from
            .submit(chain.node.as_ref(), None, input, request.gas_limit)
            .await?;
        match receipt.contract_address {
            Some(address) if !address.is_zero() => Ok(address),
            _ => Err(DeployFailure::MissingContractAddress(receipt.tx_hash)),
        }
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{
            accounts::Senders,
            artifact::tests::artifact,
            chain::{ChainId, ChainInstance},
            contracts::ContractKind,
        },
        alloy::primitives::B256,
        ethrpc::{MockNode, Receipt},
        std::sync::Arc,
    };

    fn chain(node: MockNode) -> ChainInstance {
        ChainInstance {
            id: ChainId::A,
            endpoint: "http://localhost:8545".parse().unwrap(),
            node: Arc::new(node),
            accounts: vec![],
        }
    }

    #[test]
    fn appends_constructor_arguments() {
        let code = creation_code(&Bytes::from_static(&[0x60, 0x80]), &[Address::repeat_byte(0xab)]);
        assert_eq!(code.len(), 2 + 32);
        assert_eq!(&code[..2], &[0x60, 0x80]);
        assert_eq!(&code[2..14], &[0u8; 12]);
        assert_eq!(&code[14..], Address::repeat_byte(0xab).as_slice());

        let code = creation_code(&Bytes::from_static(&[0x60, 0x80]), &[]);
        assert_eq!(code, Bytes::from_static(&[0x60, 0x80]));
    }

    #[tokio::test]
    async fn deploys_artifact_bytecode() {
        let created = Address::repeat_byte(0xcc);
        let minter = Address::repeat_byte(0x01);
        let mut node = MockNode::new();
        node.expect_submit()
            .withf(move |tx| {
                tx.to.is_none()
                    && tx.from == minter
                    && tx.input.starts_with(&[0x60, 0x80, 0x60, 0x40, 0x52])
                    && tx.input.len() == 5 + 32
            })
            .times(1)
            .returning(move |_| {
                Ok(Receipt {
                    contract_address: Some(created),
                    ..Default::default()
                })
            });
        let chain = chain(node);
        let deployer =
            BytecodeDeployer::new(Artifacts::from_artifacts([(ContractKind::Election, artifact())]));

        let address = deployer
            .deploy(
                &chain,
                DeployRequest {
                    kind: ContractKind::Election,
                    args: vec![minter],
                    gas_limit: None,
                    from: Senders::default().get(&chain.endpoint, minter),
                },
            )
            .await
            .unwrap();
        assert_eq!(address, created);
    }

    #[tokio::test]
    async fn receipt_without_contract_fails() {
        let mut node = MockNode::new();
        node.expect_submit().returning(|_| {
            Ok(Receipt {
                tx_hash: B256::repeat_byte(9),
                ..Default::default()
            })
        });
        let chain = chain(node);
        let deployer =
            BytecodeDeployer::new(Artifacts::from_artifacts([(ContractKind::Core, artifact())]));

        let result = deployer
            .deploy(
                &chain,
                DeployRequest {
                    kind: ContractKind::Core,
                    args: vec![],
                    gas_limit: None,
                    from: Senders::default().get(&chain.endpoint, Address::repeat_byte(1)),
                },
            )
            .await;
        assert!(matches!(
            result,
            Err(DeployFailure::MissingContractAddress(hash)) if hash == B256::repeat_byte(9)
        ));
    }

    #[tokio::test]
    async fn unknown_artifact_fails_without_submitting() {
        let chain = chain(MockNode::new());
        let deployer = BytecodeDeployer::new(Artifacts::default());
        let result = deployer
            .deploy(
                &chain,
                DeployRequest {
                    kind: ContractKind::Slashing,
                    args: vec![],
                    gas_limit: None,
                    from: Senders::default().get(&chain.endpoint, Address::repeat_byte(1)),
                },
            )
            .await;
        assert!(matches!(
            result,
            Err(DeployFailure::MissingArtifact(ContractKind::Slashing))
        ));
    }
}
