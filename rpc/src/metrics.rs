//! Prometheus metrics owned by the HTTP layer.

use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

/// Request counters plus the `/metrics` renderer for the shared registry.
#[derive(Clone)]
pub struct RpcMetrics {
    registry: Registry,
    /// Requests by route and outcome (`ok` or the error kind).
    pub requests: IntCounterVec,
    /// Claims refused as below the dust threshold.
    pub claims_rejected: IntCounter,
}

impl RpcMetrics {
    /// Register the HTTP counters on `registry`. Everything else registered
    /// there is rendered too.
    pub fn register(registry: &Registry) -> prometheus::Result<Self> {
        let requests = IntCounterVec::new(
            Opts::new("can_rpc_requests_total", "HTTP requests by route and outcome"),
            &["route", "outcome"],
        )?;
        registry.register(Box::new(requests.clone()))?;

        let claims_rejected = IntCounter::with_opts(Opts::new(
            "can_claims_rejected_total",
            "Claims refused because nothing was claimable",
        ))?;
        registry.register(Box::new(claims_rejected.clone()))?;

        Ok(Self {
            registry: registry.clone(),
            requests,
            claims_rejected,
        })
    }

    pub fn observe(&self, route: &str, outcome: &str) {
        self.requests.with_label_values(&[route, outcome]).inc();
    }

    /// Prometheus text exposition of the whole registry.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        String::from_utf8(buf).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
