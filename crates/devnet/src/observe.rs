//! Events that are meaningful to the devnet. Each function logs the event and
//! updates the metrics if the event is worth measuring.

use {
    crate::{
        chain::ChainId,
        contracts::ContractKind,
        deploy::DeployFailure,
        orchestrator::SetupFailure,
        snapshot::NotReady,
    },
    alloy::primitives::{Address, B256},
    ethrpc::{BlockInfo, Receipt},
    std::{path::Path, time::Duration},
};

/// Setup the observability of the devnet binary.
pub fn init(config: &::observe::Config) {
    ::observe::tracing::initialize(config);
    ::observe::metrics::setup_registry(Some("devnet".to_owned()), None);
}

pub fn node_spawned(chain: ChainId, port: u16, pid: Option<u32>, log_file: &Path) {
    tracing::info!(%chain, port, ?pid, ?log_file, "started node in the background");
}

pub fn node_ready(chain: ChainId, chain_id: u64, accounts: usize) {
    tracing::info!(%chain, chain_id, accounts, "connected to node");
}

pub fn build_failed(kind: ContractKind, err: &DeployFailure) {
    tracing::warn!(%kind, ?err, "building contract failed");
}

pub fn deploying(chain: ChainId, kind: ContractKind) {
    tracing::debug!(%chain, %kind, "deploying contract");
}

pub fn deployed(chain: ChainId, kind: ContractKind, address: Address) {
    tracing::info!(%chain, %kind, %address, "deployed contract");
    metrics()
        .deployments
        .with_label_values(&[chain.as_str(), kind.as_str(), "success"])
        .inc();
}

pub fn deploy_failed(chain: ChainId, kind: ContractKind, err: &DeployFailure) {
    tracing::error!(%chain, %kind, ?err, "deploying contract failed");
    metrics()
        .deployments
        .with_label_values(&[chain.as_str(), kind.as_str(), err.label()])
        .inc();
}

pub fn linked(chain: ChainId, core: Address, election: Address, receipt: &Receipt) {
    tracing::info!(%chain, %core, %election, tx = ?receipt.tx_hash, "linked election contract");
    setup_transaction(chain, "set_election_contract", "success");
}

pub fn link_failed(chain: ChainId, core: Address, err: &ethrpc::Error) {
    tracing::error!(%chain, %core, ?err, "linking election contract failed");
    setup_transaction(chain, "set_election_contract", "error");
}

pub fn chain_setup_failed(chain: ChainId, err: &SetupFailure) {
    tracing::error!(%chain, ?err, "chain setup aborted");
}

pub fn mint_failed(chain: ChainId, proposer: Address, round: usize, err: &ethrpc::Error) {
    tracing::warn!(%chain, %proposer, round, ?err, "minting ticket failed");
    metrics()
        .ticket_mints
        .with_label_values(&[chain.as_str(), "error"])
        .inc();
}

pub fn minted(chain: ChainId, proposer: Address, round: usize) {
    tracing::trace!(%chain, %proposer, round, "minted ticket");
    metrics()
        .ticket_mints
        .with_label_values(&[chain.as_str(), "success"])
        .inc();
}

pub fn bootstrapped(chain: ChainId, minted: usize, failed: usize) {
    tracing::info!(%chain, minted, failed, "minted tickets");
}

pub fn default_recipient_set(chain: ChainId, recipient: Address) {
    tracing::info!(%chain, %recipient, "set default recipient");
    setup_transaction(chain, "set_default_recipient", "success");
}

pub fn default_recipient_failed(chain: ChainId, recipient: Address, err: &ethrpc::Error) {
    tracing::warn!(%chain, %recipient, ?err, "setting default recipient failed");
    setup_transaction(chain, "set_default_recipient", "error");
}

pub fn test_tokens_seeded(wallet: Address, before: Option<u16>, after: Option<u16>) {
    tracing::info!(%wallet, ?before, ?after, "seeded test tokens");
    setup_transaction(ChainId::A, "test_execute_raw_mint", "success");
}

pub fn test_token_seeding_failed(err: &dyn std::error::Error) {
    tracing::warn!(%err, "seeding test tokens failed");
    setup_transaction(ChainId::A, "test_execute_raw_mint", "error");
}

pub fn published() {
    tracing::info!("published deployment snapshot");
}

pub fn not_published(err: &NotReady) {
    tracing::error!(%err, "deployment incomplete, status API will report not ready");
}

pub fn serving(addr: std::net::SocketAddr) {
    tracing::info!(%addr, "serving status API");
}

pub fn watching(chain: ChainId, election: Address) {
    tracing::info!(%chain, %election, "refreshing tickets on every new block");
}

pub fn new_block(block: &BlockInfo) {
    tracing::debug!(number = block.number, hash = ?block.hash, "new block");
    metrics().last_seen_block.set(block.number.try_into().unwrap_or(i64::MAX));
}

pub fn block_lookup_failed(hash: B256, err: &ethrpc::Error) {
    tracing::warn!(?hash, ?err, "could not fetch block");
}

pub fn refreshed(block: B256, receipt: &Receipt) {
    tracing::debug!(?block, tx = ?receipt.tx_hash, "refreshed tickets");
    metrics().refreshes.with_label_values(&["success"]).inc();
    if let Some(number) = receipt.block_number {
        metrics()
            .last_refresh_block
            .set(number.try_into().unwrap_or(i64::MAX));
    }
}

pub fn refresh_failed(block: B256, err: &ethrpc::Error) {
    tracing::warn!(?block, ?err, "refreshing tickets failed");
    metrics().refreshes.with_label_values(&["error"]).inc();
}

pub fn block_stream_ended(retry_in: Duration) {
    tracing::warn!(?retry_in, "block stream ended, resubscribing");
}

pub fn subscribe_failed(err: &ethrpc::Error, retry_in: Duration) {
    tracing::warn!(?err, ?retry_in, "could not subscribe to new blocks");
}

fn setup_transaction(chain: ChainId, call: &str, result: &str) {
    metrics()
        .setup_transactions
        .with_label_values(&[chain.as_str(), call, result])
        .inc();
}

#[derive(Debug, Clone, prometheus_metric_storage::MetricStorage)]
struct Metrics {
    /// Contract deployments by outcome.
    #[metric(labels("chain", "kind", "result"))]
    deployments: prometheus::IntCounterVec,
    /// Wiring and seeding transactions by outcome.
    #[metric(labels("chain", "call", "result"))]
    setup_transactions: prometheus::IntCounterVec,
    /// Ticket mints by outcome.
    #[metric(labels("chain", "result"))]
    ticket_mints: prometheus::IntCounterVec,
    /// Ticket refreshes dispatched by the block watcher.
    #[metric(labels("result"))]
    refreshes: prometheus::IntCounterVec,
    /// Number of the last block the watcher observed.
    last_seen_block: prometheus::IntGauge,
    /// Block in which the last successful refresh got included.
    last_refresh_block: prometheus::IntGauge,
}

fn metrics() -> &'static Metrics {
    Metrics::instance(::observe::metrics::get_storage_registry())
        .expect("unexpected error getting metrics instance")
}
