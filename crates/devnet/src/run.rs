use {
    crate::{
        accounts::Senders,
        api::Api,
        arguments::{Arguments, DeployMode, NodeTopology},
        artifact::Artifacts,
        bootstrap::{self, Bootstrap},
        chain::{ChainId, ChainInstance},
        contracts::ContractKind,
        deploy::{Deployer, bytecode::BytecodeDeployer, forge::Forge},
        observe,
        orchestrator::{ChainSetup, Orchestrator},
        snapshot::Published,
        supervisor::{self, NodeProcess},
        watcher::Watcher,
    },
    anyhow::{Context, Result, anyhow},
    clap::Parser,
    ethrpc::{Node, NodeHandle},
    std::{future::Future, sync::Arc, time::Duration},
    strum::IntoEnumIterator,
    tokio::{sync::oneshot, task::AbortHandle},
    tracing::Instrument,
};

pub async fn start(args: impl Iterator<Item = String>) {
    let args = Arguments::parse_from(args);
    observe::init(&args.logging.config());
    tracing::info!("running devnet with validated arguments:\n{}", args);
    if let Err(err) = run(args).await {
        tracing::error!(?err, "devnet failed");
        std::process::exit(1);
    }
}

pub async fn run(args: Arguments) -> Result<()> {
    let _nodes = spawn_nodes(&args).await?;
    let chains = connect(&args).await?;
    let chain_a = chains
        .iter()
        .find(|chain| chain.id == ChainId::A)
        .cloned()
        .context("chain A is not configured")?;

    // The API answers right away so clients can poll it until the deployment
    // gets published.
    let published = Published::default();
    let (shutdown_sender, shutdown_receiver) = oneshot::channel();
    let serve = Api {
        addr: args.bind_address,
        published: published.clone(),
        chain_a,
        test_wallet: args.test_wallet,
        addr_sender: None,
    }
    .serve(async {
        let _ = shutdown_receiver.await;
    });
    futures::pin_mut!(serve);

    let watcher = tokio::select! {
        result = &mut serve => return api_exited(result),
        watcher = provision(&args, &chains, &published) => watcher?,
        _ = shutdown_signal() => return shutdown(shutdown_sender, serve).await,
    };

    let result = tokio::select! {
        result = &mut serve => api_exited(result),
        _ = shutdown_signal() => shutdown(shutdown_sender, serve).await,
    };
    if let Some(watcher) = watcher {
        watcher.abort();
    }
    result
}

/// Deploys and wires the contracts of every chain, seeds their state and
/// publishes the resulting snapshot. Returns the handle of the block watcher
/// if chain A is ready for it.
async fn provision(
    args: &Arguments,
    chains: &[ChainInstance],
    published: &Published,
) -> Result<Option<AbortHandle>> {
    let forge = Forge {
        command: args.forge_command.clone(),
        contracts_dir: args.contracts_dir.clone(),
        extra_args: args.forge_extra_args.clone(),
        timeout: args.forge_timeout,
    };
    if args.build_contracts {
        for kind in ContractKind::iter() {
            if let Err(err) = forge.build(kind).await {
                observe::build_failed(kind, &err);
            }
        }
    }
    let artifacts = Artifacts::load(&args.contracts_dir)
        .await
        .context("loading contract artifacts")?;
    let deployer: Arc<dyn Deployer> = match args.deploy_mode {
        DeployMode::Forge => Arc::new(forge),
        DeployMode::Bytecode => Arc::new(BytecodeDeployer::new(artifacts.clone())),
    };

    let senders = Senders::default();
    let setups: Vec<_> = chains
        .iter()
        .map(|chain| ChainSetup {
            deployer: senders.get(&chain.endpoint, args.deployer),
            chain: chain.clone(),
            minter: args.minter(),
            enforcer: args.enforcer(),
        })
        .collect();
    let report = Orchestrator {
        deployer,
        topology: args.node_topology,
        slashing_gas_limit: args.slashing_gas_limit,
    }
    .run(&setups)
    .await;

    let bootstrap = Bootstrap {
        tickets_per_proposer: args.tickets_per_proposer,
    };
    let jobs = setups.iter().filter_map(|setup| {
        let contracts = report.contracts(setup.chain.id)?;
        let proposers = match setup.chain.id {
            ChainId::A => &args.chain_a_proposers,
            ChainId::B => &args.chain_b_proposers,
        };
        let span = tracing::info_span!("bootstrap", chain = %setup.chain.id);
        Some(
            bootstrap
                .run(&setup.chain, contracts.election, proposers, &setup.deployer)
                .instrument(span),
        )
    });
    run_per_topology(args.node_topology, jobs).await;

    let chain_a = setups
        .iter()
        .find(|setup| setup.chain.id == ChainId::A)
        .and_then(|setup| Some((setup, report.contracts(ChainId::A)?)));

    if args.seed_test_tokens {
        match chain_a {
            Some((setup, contracts)) => {
                bootstrap::seed_test_tokens(
                    &setup.chain,
                    contracts.core,
                    args.test_wallet,
                    &setup.deployer,
                )
                .await;
            }
            None => tracing::warn!("not seeding test tokens, chain A is not set up"),
        }
    }

    match report.snapshot_builder().build(&artifacts) {
        Ok(snapshot) => {
            published.publish(snapshot);
            observe::published();
        }
        Err(err) => observe::not_published(&err),
    }

    let Some((setup, contracts)) = chain_a else {
        tracing::warn!("not watching blocks, chain A is not set up");
        return Ok(None);
    };
    let watcher = Watcher {
        sender: senders.get(&setup.chain.endpoint, args.refresh_sender()),
        chain: setup.chain.clone(),
        election: contracts.election,
        retry_interval: args.poll_interval,
    };
    let span = tracing::info_span!("watcher", chain = %ChainId::A);
    let handle = tokio::task::spawn(watcher.run_forever().instrument(span));
    Ok(Some(handle.abort_handle()))
}

fn api_exited(result: std::io::Result<()>) -> Result<()> {
    result.context("status API failed")?;
    Err(anyhow!("status API exited unexpectedly"))
}

async fn shutdown(
    sender: oneshot::Sender<()>,
    serve: impl Future<Output = std::io::Result<()>>,
) -> Result<()> {
    tracing::info!("shutting down");
    let _ = sender.send(());
    tokio::time::timeout(Duration::from_secs(10), serve)
        .await
        .context("status API shutdown exceeded timeout")?
        .context("status API failed during shutdown")
}

/// Starts one node per distinct port unless nodes are managed externally.
async fn spawn_nodes(args: &Arguments) -> Result<Vec<NodeProcess>> {
    if !args.spawn_node {
        return Ok(vec![]);
    }
    let ports = match args.node_topology {
        NodeTopology::Shared => vec![(ChainId::A, args.chain_a_port)],
        NodeTopology::Independent => vec![
            (ChainId::A, args.chain_a_port),
            (ChainId::B, args.chain_b_port()),
        ],
    };
    let mut nodes = Vec::with_capacity(ports.len());
    for (chain, port) in ports {
        let node = supervisor::spawn(
            &args.node_command,
            &args.node_host,
            port,
            &args.node_log_dir,
        )
        .await?;
        observe::node_spawned(chain, port, node.pid(), &node.log_file);
        nodes.push(node);
    }
    Ok(nodes)
}

/// Connects to the node of every chain. A node that does not become ready in
/// time is fatal.
async fn connect(args: &Arguments) -> Result<Vec<ChainInstance>> {
    let config = ethrpc::Config {
        receipt_timeout: args.receipt_timeout,
        poll_interval: args.poll_interval,
    };
    let mut chains = Vec::new();
    for id in ChainId::iter() {
        let port = match id {
            ChainId::A => args.chain_a_port,
            ChainId::B => args.chain_b_port(),
        };
        let url = args.rpc_url(port)?;
        let node: Arc<dyn Node> =
            Arc::new(NodeHandle::new(url.clone(), id.as_str(), config.clone()));
        let chain_id = ethrpc::wait_until_ready(node.as_ref(), args.node_startup_timeout)
            .await
            .with_context(|| format!("node of {id} at {url} did not become ready"))?;
        let chain = ChainInstance::connect(id, url, node).await?;
        observe::node_ready(id, chain_id, chain.accounts.len());
        chains.push(chain);
    }
    Ok(chains)
}

/// Runs jobs targeting a shared node one after the other and jobs targeting
/// independent nodes concurrently.
async fn run_per_topology<F: Future>(topology: NodeTopology, jobs: impl Iterator<Item = F>) {
    match topology {
        NodeTopology::Shared => {
            for job in jobs {
                job.await;
            }
        }
        NodeTopology::Independent => {
            futures::future::join_all(jobs).await;
        }
    }
}

#[cfg(unix)]
async fn shutdown_signal() {
    // Intercept signals for graceful shutdown. Ctrl-C sends sigint, process
    // managers usually sigterm.
    let sigterm = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::warn!(?err, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    let sigint = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::warn!(?err, "cannot listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };
    futures::pin_mut!(sigint);
    futures::pin_mut!(sigterm);
    futures::future::select(sigterm, sigint).await;
}

#[cfg(windows)]
async fn shutdown_signal() {
    // No support for signal handling on Windows.
    std::future::pending().await
}
