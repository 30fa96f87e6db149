//! Alloy transport layer that emits logs and metrics for every RPC call
//! going to a node. Each layer carries the label of the chain instance it
//! talks to so metrics of different nodes can be told apart.
use {
    alloy::{
        rpc::json_rpc::{RequestPacket, ResponsePacket},
        transports::TransportError,
    },
    std::{
        fmt::Debug,
        pin::Pin,
        task::{Context, Poll},
    },
    tower::{Layer, Service},
};

pub(crate) struct InstrumentationLayer {
    pub label: String,
}

impl<S> Layer<S> for InstrumentationLayer {
    type Service = InstrumentedProvider<S>;

    fn layer(&self, inner: S) -> Self::Service {
        InstrumentedProvider {
            inner,
            label: self.label.clone(),
            metrics: Metrics::get(),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct InstrumentedProvider<S> {
    inner: S,
    label: String,
    metrics: &'static Metrics,
}

impl<S> Service<RequestPacket> for InstrumentedProvider<S>
where
    S: Service<RequestPacket, Response = ResponsePacket, Error = TransportError>,
    S::Future: Send + 'static,
    S::Response: Send + 'static + Debug,
    S::Error: Send + 'static + Debug,
{
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;
    type Response = S::Response;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: RequestPacket) -> Self::Future {
        let timers: Vec<_> = req
            .requests()
            .iter()
            .map(|r| {
                tracing::trace!(chain = %self.label, method = r.method(), "executing request");
                self.metrics.on_request_start(&self.label, r.method())
            })
            .collect();

        let metrics = self.metrics;
        let label = self.label.clone();
        let fut = self.inner.call(req);
        Box::pin(async move {
            let res = fut.await;
            drop(timers);
            if let Err(err) = &res {
                tracing::debug!(chain = %label, ?err, "request failed");
                metrics.requests_failed.with_label_values(&[&label]).inc();
            }
            res
        })
    }
}

#[derive(prometheus_metric_storage::MetricStorage, Clone, Debug)]
#[metric(subsystem = "node_rpc")]
struct Metrics {
    /// Number of inflight RPC requests per node.
    #[metric(labels("chain", "method"))]
    requests_inflight: prometheus::IntGaugeVec,

    /// Number of completed RPC requests per node.
    #[metric(labels("chain", "method"))]
    requests_complete: prometheus::IntCounterVec,

    /// Number of RPC requests that failed at the transport level.
    #[metric(labels("chain"))]
    requests_failed: prometheus::IntCounterVec,

    /// Execution time for each RPC request.
    #[metric(labels("chain", "method"))]
    requests_duration_seconds: prometheus::HistogramVec,
}

impl Metrics {
    fn get() -> &'static Self {
        Metrics::instance(observe::metrics::get_storage_registry())
            .expect("unexpected error getting metrics instance")
    }

    #[must_use]
    fn on_request_start(&self, label: &str, method: &str) -> impl Drop + use<> {
        let requests_inflight = self.requests_inflight.with_label_values(&[label, method]);
        let requests_complete = self.requests_complete.with_label_values(&[label, method]);
        let requests_duration_seconds = self
            .requests_duration_seconds
            .with_label_values(&[label, method]);

        requests_inflight.inc();
        let timer = requests_duration_seconds.start_timer();

        scopeguard::guard(timer, move |timer| {
            requests_inflight.dec();
            requests_complete.inc();
            timer.stop_and_record();
        })
    }
}
