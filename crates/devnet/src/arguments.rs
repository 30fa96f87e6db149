use {
    alloy::primitives::{Address, address},
    clap::{Parser, ValueEnum},
    std::{
        fmt::{self, Display, Formatter},
        net::SocketAddr,
        path::PathBuf,
        time::Duration,
    },
    url::Url,
};

/// Anvil's first well-known account. Unlocked on every fresh node.
const DEFAULT_ACCOUNT: Address = address!("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266");

#[derive(Parser)]
#[clap(version, about = "Provisions a two-chain devnet and keeps it ticking")]
pub struct Arguments {
    #[clap(flatten)]
    pub logging: LoggingArguments,

    /// Address the status API binds to.
    #[clap(long, env, default_value = "0.0.0.0:5000")]
    pub bind_address: SocketAddr,

    /// Whether both chains share a single node or each gets its own.
    #[clap(long, env, value_enum, default_value_t = NodeTopology::Shared)]
    pub node_topology: NodeTopology,

    /// Spawn the node processes. Disable to connect to nodes that are
    /// already running.
    #[clap(long, env, action = clap::ArgAction::Set, default_value_t = true)]
    pub spawn_node: bool,

    /// Command used to start a node.
    #[clap(long, env, default_value = "anvil")]
    pub node_command: String,

    /// Interface spawned nodes listen on.
    #[clap(long, env, default_value = "0.0.0.0")]
    pub node_host: String,

    /// Host used to reach the nodes over JSON-RPC.
    #[clap(long, env, default_value = "localhost")]
    pub rpc_host: String,

    /// Port of chain A's node. Also used by chain B when the node is shared.
    #[clap(long, env, default_value = "8545")]
    pub chain_a_port: u16,

    /// Port of chain B's node when nodes are independent.
    #[clap(long, env, default_value = "8546")]
    pub chain_b_port: u16,

    /// Directory receiving the output of spawned nodes.
    #[clap(long, env, default_value = ".")]
    pub node_log_dir: PathBuf,

    /// How long to wait for a node to answer requests before giving up.
    #[clap(long, env, default_value = "30s", value_parser = humantime::parse_duration)]
    pub node_startup_timeout: Duration,

    /// How long to wait for a transaction receipt.
    #[clap(long, env, default_value = "30s", value_parser = humantime::parse_duration)]
    pub receipt_timeout: Duration,

    /// How often nodes are polled for new blocks and receipts.
    #[clap(long, env, default_value = "1s", value_parser = humantime::parse_duration)]
    pub poll_interval: Duration,

    /// Directory holding one checkout per contract repository. A leading `~`
    /// stands for the home directory.
    #[clap(long, env, default_value = "~/spire-poc/repos", value_parser = expand_home)]
    pub contracts_dir: PathBuf,

    /// Compile all contracts before loading their artifacts.
    #[clap(long, env)]
    pub build_contracts: bool,

    /// How contracts get deployed.
    #[clap(long, env, value_enum, default_value_t = DeployMode::Forge)]
    pub deploy_mode: DeployMode,

    /// Command of the contract build and deploy tool.
    #[clap(long, env, default_value = "forge")]
    pub forge_command: String,

    /// Additional arguments passed to every `forge create` invocation.
    #[clap(
        long,
        env,
        default_value = "--broadcast",
        value_delimiter = ',',
        allow_hyphen_values = true
    )]
    pub forge_extra_args: Vec<String>,

    /// Maximum duration of a single forge invocation.
    #[clap(long, env, default_value = "5m", value_parser = humantime::parse_duration)]
    pub forge_timeout: Duration,

    /// Account deploying and wiring all contracts.
    #[clap(long, env, default_value_t = DEFAULT_ACCOUNT)]
    pub deployer: Address,

    /// Account allowed to mint tickets. Defaults to the deployer.
    #[clap(long, env)]
    pub minter: Option<Address>,

    /// Account allowed to slash proposers. Defaults to the deployer.
    #[clap(long, env)]
    pub enforcer: Option<Address>,

    /// Account sending the per-block ticket refresh. Defaults to the deployer.
    #[clap(long, env)]
    pub refresh_sender: Option<Address>,

    /// Proposers receiving tickets on chain A. The first one becomes the
    /// default recipient.
    #[clap(
        long,
        env,
        value_delimiter = ',',
        default_value = "0x70997970C51812dc3A010C7d01b50e0d17dc79C8,0x3C44CdDdB6a900fa2b585dd299e03d12FA4293BC"
    )]
    pub chain_a_proposers: Vec<Address>,

    /// Proposers receiving tickets on chain B. The first one becomes the
    /// default recipient.
    #[clap(
        long,
        env,
        value_delimiter = ',',
        default_value = "0x90F79bf6EB2c4f870365E785982E1f101E93b906,0x15d34AAf54267DB7D7c367839AAf71A00a2C6A65"
    )]
    pub chain_b_proposers: Vec<Address>,

    /// Tickets minted to every proposer during bootstrap.
    #[clap(long, env, default_value = "50")]
    pub tickets_per_proposer: usize,

    /// Gas limit of the slashing contract deployment.
    #[clap(long, env, default_value = "20000000")]
    pub slashing_gas_limit: u64,

    /// Wallet whose token balances the status API reports.
    #[clap(
        long,
        env,
        default_value = "0xa0Ee7A142d267C1f36714E4a8F75612F20a79720"
    )]
    pub test_wallet: Address,

    /// Mint test tokens on chain A's core contract after bootstrap.
    #[clap(long, env)]
    pub seed_test_tokens: bool,
}

#[derive(clap::Args)]
pub struct LoggingArguments {
    #[clap(long, env, default_value = "warn,devnet=debug,ethrpc=info,observe=info")]
    pub log_filter: String,

    /// Events at this level or more severe are written to stderr.
    #[clap(long, env)]
    pub log_stderr_threshold: Option<tracing::Level>,

    #[clap(long, env)]
    pub use_json_logs: bool,
}

impl LoggingArguments {
    pub fn config(&self) -> observe::Config {
        observe::Config::new(
            &self.log_filter,
            self.log_stderr_threshold,
            self.use_json_logs,
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum NodeTopology {
    /// One node hosts both chains. Chains are set up one after the other.
    Shared,
    /// Every chain gets its own node. Chains are set up concurrently.
    Independent,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum DeployMode {
    /// Run `forge create` in the contract's repository.
    Forge,
    /// Submit the compiled artifact's bytecode directly.
    Bytecode,
}

impl Arguments {
    pub fn minter(&self) -> Address {
        self.minter.unwrap_or(self.deployer)
    }

    pub fn enforcer(&self) -> Address {
        self.enforcer.unwrap_or(self.deployer)
    }

    pub fn refresh_sender(&self) -> Address {
        self.refresh_sender.unwrap_or(self.deployer)
    }

    /// Port of the node serving chain B.
    pub fn chain_b_port(&self) -> u16 {
        match self.node_topology {
            NodeTopology::Shared => self.chain_a_port,
            NodeTopology::Independent => self.chain_b_port,
        }
    }

    pub fn rpc_url(&self, port: u16) -> Result<Url, url::ParseError> {
        format!("http://{}:{port}", self.rpc_host).parse()
    }
}

/// Resolves a leading `~` against `$HOME`.
fn expand_home(path: &str) -> Result<PathBuf, String> {
    let rest = match path.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => rest.trim_start_matches('/'),
        _ => return Ok(PathBuf::from(path)),
    };
    let home = std::env::var_os("HOME").ok_or("HOME is not set, cannot resolve `~`")?;
    Ok(PathBuf::from(home).join(rest))
}

impl Display for Arguments {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let Self {
            logging,
            bind_address,
            node_topology,
            spawn_node,
            node_command,
            node_host,
            rpc_host,
            chain_a_port,
            chain_b_port: _,
            node_log_dir,
            node_startup_timeout,
            receipt_timeout,
            poll_interval,
            contracts_dir,
            build_contracts,
            deploy_mode,
            forge_command,
            forge_extra_args,
            forge_timeout,
            deployer,
            minter: _,
            enforcer: _,
            refresh_sender: _,
            chain_a_proposers,
            chain_b_proposers,
            tickets_per_proposer,
            slashing_gas_limit,
            test_wallet,
            seed_test_tokens,
        } = self;

        writeln!(f, "log_filter: {}", logging.log_filter)?;
        writeln!(f, "log_stderr_threshold: {:?}", logging.log_stderr_threshold)?;
        writeln!(f, "use_json_logs: {}", logging.use_json_logs)?;
        writeln!(f, "bind_address: {bind_address}")?;
        writeln!(f, "node_topology: {node_topology}")?;
        writeln!(f, "spawn_node: {spawn_node}")?;
        writeln!(f, "node_command: {node_command}")?;
        writeln!(f, "node_host: {node_host}")?;
        writeln!(f, "rpc_host: {rpc_host}")?;
        writeln!(f, "chain_a_port: {chain_a_port}")?;
        writeln!(f, "chain_b_port: {}", self.chain_b_port())?;
        writeln!(f, "node_log_dir: {node_log_dir:?}")?;
        writeln!(f, "node_startup_timeout: {node_startup_timeout:?}")?;
        writeln!(f, "receipt_timeout: {receipt_timeout:?}")?;
        writeln!(f, "poll_interval: {poll_interval:?}")?;
        writeln!(f, "contracts_dir: {contracts_dir:?}")?;
        writeln!(f, "build_contracts: {build_contracts}")?;
        writeln!(f, "deploy_mode: {deploy_mode}")?;
        writeln!(f, "forge_command: {forge_command}")?;
        writeln!(f, "forge_extra_args: {forge_extra_args:?}")?;
        writeln!(f, "forge_timeout: {forge_timeout:?}")?;
        writeln!(f, "deployer: {deployer}")?;
        writeln!(f, "minter: {}", self.minter())?;
        writeln!(f, "enforcer: {}", self.enforcer())?;
        writeln!(f, "refresh_sender: {}", self.refresh_sender())?;
        writeln!(f, "chain_a_proposers: {chain_a_proposers:?}")?;
        writeln!(f, "chain_b_proposers: {chain_b_proposers:?}")?;
        writeln!(f, "tickets_per_proposer: {tickets_per_proposer}")?;
        writeln!(f, "slashing_gas_limit: {slashing_gas_limit}")?;
        writeln!(f, "test_wallet: {test_wallet}")?;
        writeln!(f, "seed_test_tokens: {seed_test_tokens}")?;
        Ok(())
    }
}
