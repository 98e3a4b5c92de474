//! Prometheus metrics
//!
//! One [`Metrics`] instance is built in `main`, shared by the watchers, the
//! relay and the HTTP server.

use prometheus::{IntCounterVec, IntGaugeVec, Opts, Registry};

pub struct Metrics {
    /// Poll cycles by chain and outcome (caught_up, behind, failed)
    pub polls_total: IntCounterVec,
    /// Deposit events seen by chain
    pub deposits_detected_total: IntCounterVec,
    /// Mint submissions by destination chain and status (submitted, failed)
    pub relays_total: IntCounterVec,
    /// Last checkpointed block per bridge
    pub checkpoint_block: IntGaugeVec,
    /// Snapshot writes by status (ok, error)
    pub snapshots_total: IntCounterVec,
    pub registry: Registry,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let polls_total = IntCounterVec::new(
            Opts::new("relayer_polls_total", "Poll cycles by chain and outcome"),
            &["chain", "outcome"],
        )
        .expect("constant metric name is valid");

        let deposits_detected_total = IntCounterVec::new(
            Opts::new(
                "relayer_deposits_detected_total",
                "Deposit events observed on bridge contracts",
            ),
            &["chain"],
        )
        .expect("constant metric name is valid");

        let relays_total = IntCounterVec::new(
            Opts::new(
                "relayer_relays_total",
                "Mint transactions by destination chain and status",
            ),
            &["chain", "status"],
        )
        .expect("constant metric name is valid");

        let checkpoint_block = IntGaugeVec::new(
            Opts::new(
                "relayer_checkpoint_block",
                "Last fully processed block per bridge",
            ),
            &["chain", "bridge"],
        )
        .expect("constant metric name is valid");

        let snapshots_total = IntCounterVec::new(
            Opts::new("relayer_snapshots_total", "Checkpoint snapshot writes by status"),
            &["status"],
        )
        .expect("constant metric name is valid");

        // Names are unique constants and each instance owns its registry
        registry
            .register(Box::new(polls_total.clone()))
            .expect("metric registration must not be called twice");
        registry
            .register(Box::new(deposits_detected_total.clone()))
            .expect("metric registration must not be called twice");
        registry
            .register(Box::new(relays_total.clone()))
            .expect("metric registration must not be called twice");
        registry
            .register(Box::new(checkpoint_block.clone()))
            .expect("metric registration must not be called twice");
        registry
            .register(Box::new(snapshots_total.clone()))
            .expect("metric registration must not be called twice");

        Self {
            polls_total,
            deposits_detected_total,
            relays_total,
            checkpoint_block,
            snapshots_total,
            registry,
        }
    }

    pub fn record_poll(&self, chain_id: u64, outcome: &str) {
        self.polls_total
            .with_label_values(&[chain_id.to_string().as_str(), outcome])
            .inc();
    }

    pub fn record_deposits(&self, chain_id: u64, count: usize) {
        self.deposits_detected_total
            .with_label_values(&[chain_id.to_string().as_str()])
            .inc_by(count as u64);
    }

    pub fn record_relay(&self, chain_id: u64, status: &str) {
        self.relays_total
            .with_label_values(&[chain_id.to_string().as_str(), status])
            .inc();
    }

    pub fn set_checkpoint(&self, chain_id: u64, bridge: &str, block: u64) {
        self.checkpoint_block
            .with_label_values(&[chain_id.to_string().as_str(), bridge])
            .set(block as i64);
    }

    pub fn record_snapshot(&self, ok: bool) {
        self.snapshots_total
            .with_label_values(&[if ok { "ok" } else { "error" }])
            .inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_register_and_count() {
        let metrics = Metrics::new();
        metrics.record_poll(56, "behind");
        metrics.record_poll(56, "behind");
        metrics.record_deposits(56, 3);
        metrics.set_checkpoint(56, "0xabc", 1029);

        assert_eq!(
            metrics
                .polls_total
                .with_label_values(&["56", "behind"])
                .get(),
            2
        );
        assert_eq!(
            metrics
                .deposits_detected_total
                .with_label_values(&["56"])
                .get(),
            3
        );
        assert_eq!(
            metrics
                .checkpoint_block
                .with_label_values(&["56", "0xabc"])
                .get(),
            1029
        );
        assert!(!metrics.registry.gather().is_empty());
    }

    #[test]
    fn test_independent_instances() {
        let a = Metrics::new();
        let b = Metrics::new();
        a.record_snapshot(true);
        assert_eq!(b.snapshots_total.with_label_values(&["ok"]).get(), 0);
    }
}
