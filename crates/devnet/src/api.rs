//! Read-only status API over the published deployment.

use {
    crate::{
        bootstrap,
        chain::{ChainId, ChainInstance},
        contracts::{ContractKind, TEST_TOKENS},
        observe,
        snapshot::Published,
    },
    alloy::primitives::Address,
    axum::{
        Router,
        extract::State,
        http::StatusCode,
        response::{IntoResponse, Json, Response},
        routing::get,
    },
    serde::Serialize,
    std::{borrow::Cow, collections::BTreeMap, future::Future, net::SocketAddr, sync::Arc},
    tokio::sync::oneshot,
    tower_http::{cors::CorsLayer, trace::TraceLayer},
};

pub struct Api {
    pub addr: SocketAddr,
    pub published: Published,
    /// Chain whose core contract holds the test wallet's balances.
    pub chain_a: ChainInstance,
    pub test_wallet: Address,
    /// If this channel is specified, the bound address will be sent to it.
    /// This allows binding to port 0 in tests.
    pub addr_sender: Option<oneshot::Sender<SocketAddr>>,
}

struct Inner {
    published: Published,
    chain_a: ChainInstance,
    test_wallet: Address,
}

type AppState = Arc<Inner>;

impl Api {
    pub async fn serve(
        self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(), std::io::Error> {
        let app = router(Arc::new(Inner {
            published: self.published,
            chain_a: self.chain_a,
            test_wallet: self.test_wallet,
        }));

        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        let local_addr = listener.local_addr()?;
        observe::serving(local_addr);
        if let Some(addr_sender) = self.addr_sender {
            let _ = addr_sender.send(local_addr);
        }
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
    }
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/contracts", get(contracts))
        .route("/test-wallet-balance", get(test_wallet_balance))
        .route("/metrics", get(metrics))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

async fn contracts(State(state): State<AppState>) -> Response {
    match state.published.get() {
        Ok(snapshot) => Json(snapshot).into_response(),
        Err(err) => not_ready(&err),
    }
}

async fn test_wallet_balance(State(state): State<AppState>) -> Response {
    let snapshot = match state.published.get() {
        Ok(snapshot) => snapshot,
        Err(err) => return not_ready(&err),
    };
    let core = snapshot.address(ChainId::A, ContractKind::Core);

    let mut balances = BTreeMap::new();
    for token in TEST_TOKENS {
        match bootstrap::balance(&state.chain_a, core, token, state.test_wallet).await {
            Ok(balance) => {
                balances.insert(token.to_lowercase(), balance);
            }
            Err(err) => {
                tracing::warn!(token, ?err, "failed to read test wallet balance");
                return internal_error_reply();
            }
        }
    }
    Json(balances).into_response()
}

async fn metrics() -> String {
    ::observe::metrics::encode(::observe::metrics::get_registry())
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Error {
    pub error_type: Cow<'static, str>,
    pub description: Cow<'static, str>,
}

pub fn error(error_type: &'static str, description: impl AsRef<str>) -> Json<Error> {
    Json(Error {
        error_type: error_type.into(),
        description: Cow::Owned(description.as_ref().to_owned()),
    })
}

fn not_ready(err: &impl std::fmt::Display) -> Response {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        error("NotReady", err.to_string()),
    )
        .into_response()
}

pub fn internal_error_reply() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        error("InternalServerError", ""),
    )
        .into_response()
}
