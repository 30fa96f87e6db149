mod instrumentation;

use {
    crate::AlloyProvider,
    alloy::{
        providers::{Provider, ProviderBuilder},
        rpc::client::ClientBuilder,
    },
    instrumentation::InstrumentationLayer,
    std::time::Duration,
    url::Url,
};

/// Creates an instrumented provider for the node behind `url`. All requests
/// get logged and recorded in metrics under `label`.
///
/// The provider does not carry a wallet: transactions are signed by the node
/// itself, which requires the sending accounts to be unlocked.
pub fn provider(url: &Url, label: &str, poll_interval: Duration) -> AlloyProvider {
    let rpc = ClientBuilder::default()
        .layer(InstrumentationLayer {
            label: label.to_string(),
        })
        .http(url.clone())
        .with_poll_interval(poll_interval);
    ProviderBuilder::new().connect_client(rpc).erased()
}
