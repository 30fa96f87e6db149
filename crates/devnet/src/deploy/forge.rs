use {
    super::{DeployFailure, DeployRequest, Deployer, output},
    crate::{artifact::ContractSource, chain::ChainInstance, contracts::ContractKind},
    alloy::primitives::Address,
    std::{path::PathBuf, process::Output, time::Duration},
    tokio::process::Command,
    url::Url,
};

/// Deploys contracts by running `forge create` inside the contract's
/// repository.
#[derive(Clone, Debug)]
pub struct Forge {
    pub command: String,
    /// Directory holding one repository per contract kind.
    pub contracts_dir: PathBuf,
    /// Appended verbatim to every `forge create` invocation.
    pub extra_args: Vec<String>,
    /// Upper bound for a single invocation. The process gets killed once it
    /// is exceeded.
    pub timeout: Duration,
}

impl Forge {
    /// Arguments of the `forge create` invocation deploying `request` to the
    /// node at `endpoint`.
    pub fn create_args(&self, endpoint: &Url, request: &DeployRequest) -> Vec<String> {
        let source = ContractSource::of(request.kind);
        let mut args = vec!["create".to_string(), source.contract.to_string()];
        if !request.args.is_empty() {
            args.push("--constructor-args".to_string());
            args.extend(request.args.iter().map(|arg| arg.to_string()));
        }
        args.extend([
            "--rpc-url".to_string(),
            endpoint.to_string(),
            "--unlocked".to_string(),
            "--from".to_string(),
            request.from.address.to_string(),
        ]);
        if let Some(gas_limit) = request.gas_limit {
            args.extend(["--gas-limit".to_string(), gas_limit.to_string()]);
        }
        args.extend(self.extra_args.iter().cloned());
        args
    }

    /// Compiles the sources of `kind` so its artifact is up to date.
    pub async fn build(&self, kind: ContractKind) -> Result<(), DeployFailure> {
        let dir = ContractSource::of(kind).repo_dir(&self.contracts_dir);
        tracing::debug!(%kind, ?dir, "building contract");
        self.run(&["build".to_string()], dir).await.map(|_| ())
    }

    async fn run(&self, args: &[String], dir: PathBuf) -> Result<Output, DeployFailure> {
        let mut command = Command::new(&self.command);
        command.args(args).current_dir(&dir).kill_on_drop(true);
        let output = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| DeployFailure::ToolTimeout(self.timeout))?
            .map_err(|err| {
                let command = &self.command;
                DeployFailure::ToolInvocation(format!("spawning {command} in {dir:?}: {err}"))
            })?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DeployFailure::ToolInvocation(format!(
                "{} exited with {}: {}",
                self.command,
                output.status,
                stderr.trim()
            )));
        }
        Ok(output)
    }
}

#[async_trait::async_trait]
impl Deployer for Forge {
    async fn deploy(
        &self,
        chain: &ChainInstance,
        request: DeployRequest,
    ) -> Result<Address, DeployFailure> {
        let args = self.create_args(&chain.endpoint, &request);
        let dir = ContractSource::of(request.kind).repo_dir(&self.contracts_dir);
        // forge sends from the account itself so nothing else may use it
        // until the deployment is mined.
        let _guard = request.from.exclusive().await;
        let output = self.run(&args, dir).await?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        tracing::trace!(chain = %chain.id, kind = %request.kind, %stdout, "forge output");
        Ok(output::deployed_address(&stdout)?)
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
        ethrpc::MockNode,
        std::os::unix::fs::PermissionsExt,
    };

    fn forge() -> Forge {
        Forge {
            command: "forge".into(),
            contracts_dir: "/repos".into(),
            extra_args: vec!["--broadcast".into()],
            timeout: Duration::from_secs(60),
        }
    }

    #[test]
    fn create_args_with_constructor_args_and_gas() {
        let endpoint: Url = "http://localhost:8545".parse().unwrap();
        let sender = Senders::default().get(&endpoint, Address::repeat_byte(0xf3));
        let enforcer = Address::repeat_byte(0xaa);
        let request = DeployRequest {
            kind: ContractKind::Slashing,
            args: vec![enforcer],
            gas_limit: Some(20_000_000),
            from: sender.clone(),
        };

        let args = forge().create_args(&endpoint, &request);
        assert_eq!(
            args,
            vec![
                "create".to_string(),
                "src/Slashing.sol:Slashing".into(),
                "--constructor-args".into(),
                enforcer.to_string(),
                "--rpc-url".into(),
                "http://localhost:8545/".into(),
                "--unlocked".into(),
                "--from".into(),
                sender.address.to_string(),
                "--gas-limit".into(),
                "20000000".into(),
                "--broadcast".into(),
            ]
        );
    }

    #[test]
    fn create_args_without_constructor_args() {
        let endpoint: Url = "http://localhost:8545".parse().unwrap();
        let request = DeployRequest {
            kind: ContractKind::Core,
            args: vec![],
            gas_limit: None,
            from: Senders::default().get(&endpoint, Address::repeat_byte(1)),
        };

        let args = forge().create_args(&endpoint, &request);
        assert_eq!(args[1], "src/spvm-1.sol:SPVM");
        assert!(!args.contains(&"--constructor-args".to_string()));
        assert!(!args.contains(&"--gas-limit".to_string()));
    }

    #[tokio::test]
    async fn missing_tool_is_an_invocation_failure() {
        let forge = Forge {
            command: "definitely-not-a-forge-binary".into(),
            contracts_dir: std::env::temp_dir(),
            extra_args: vec![],
            timeout: Duration::from_secs(60),
        };
        let dir = std::env::temp_dir();
        let result = forge.run(&["build".into()], dir).await;
        assert!(matches!(result, Err(DeployFailure::ToolInvocation(_))));
    }

    #[tokio::test]
    async fn hanging_tool_times_out_and_releases_account() {
        let dir = tempfile::tempdir().unwrap();
        let command = dir.path().join("forge");
        std::fs::write(&command, "#!/bin/sh\nsleep 30\n").unwrap();
        std::fs::set_permissions(&command, std::fs::Permissions::from_mode(0o755)).unwrap();
        let source = ContractSource::of(ContractKind::Election);
        std::fs::create_dir_all(source.repo_dir(dir.path())).unwrap();

        let forge = Forge {
            command: command.to_string_lossy().into_owned(),
            contracts_dir: dir.path().to_path_buf(),
            extra_args: vec![],
            timeout: Duration::from_millis(200),
        };
        let chain = chain(ChainId::A, MockNode::new());
        let sender = Senders::default().get(&chain.endpoint, DEPLOYER);
        let request = DeployRequest {
            kind: ContractKind::Election,
            args: vec![],
            gas_limit: None,
            from: sender.clone(),
        };

        let result = tokio::time::timeout(Duration::from_secs(5), forge.deploy(&chain, request))
            .await
            .expect("deployment must not hang");
        assert!(matches!(
            result,
            Err(DeployFailure::ToolTimeout(timeout)) if timeout == Duration::from_millis(200)
        ));
        // The account is usable again.
        tokio::time::timeout(Duration::from_secs(1), sender.exclusive())
            .await
            .unwrap();
    }
}
