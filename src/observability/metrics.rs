use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crate::domain::{Event, SuretyError};
use crate::ledger::{Outcome, Receipt, Revert};

/// Metrics registry for the application.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    /// Calls that committed
    pub calls_committed: AtomicU64,

    /// Reverted calls by error kind
    pub reverts_operational: AtomicU64,
    pub reverts_authorization: AtomicU64,
    pub reverts_validation: AtomicU64,
    pub reverts_state: AtomicU64,
    pub reverts_transfer: AtomicU64,

    /// Call latency buckets (microseconds)
    pub latency_under_100us: AtomicU64,
    pub latency_100us_1ms: AtomicU64,
    pub latency_1_10ms: AtomicU64,
    pub latency_over_10ms: AtomicU64,

    /// Oracle activity
    pub status_requests_total: AtomicU64,
    pub oracle_responses_total: AtomicU64,
    pub statuses_finalized_total: AtomicU64,

    /// Policies purchased
    pub policies_total: AtomicU64,

    /// Payouts withdrawn
    pub payouts_total: AtomicU64,
    pub payouts_wei_total: AtomicU64,

    /// Fees charged
    pub fees_wei_total: AtomicU64,
}

impl MetricsRegistry {
    /// Create a new metrics registry.
    pub fn new() -> Self {
        MetricsRegistry::default()
    }

    /// Record a committed call and what it emitted.
    pub fn record_receipt(&self, receipt: &Receipt) {
        self.calls_committed.fetch_add(1, Ordering::Relaxed);
        self.add_wei(&self.fees_wei_total, receipt.fee);

        for event in &receipt.events {
            let counter = match event {
                Event::OracleRequest { .. } => &self.status_requests_total,
                Event::OracleReport { .. } => &self.oracle_responses_total,
                Event::FlightStatusInfo { .. } => &self.statuses_finalized_total,
            };
            counter.fetch_add(1, Ordering::Relaxed);
        }

        match receipt.outcome {
            Outcome::Paid { amount } => {
                self.payouts_total.fetch_add(1, Ordering::Relaxed);
                self.add_wei(&self.payouts_wei_total, amount);
            }
            Outcome::Insured(_) => {
                self.policies_total.fetch_add(1, Ordering::Relaxed);
            }
            _ => {}
        }
    }

    /// Record a reverted call.
    pub fn record_revert(&self, revert: &Revert) {
        self.add_wei(&self.fees_wei_total, revert.fee);

        let counter = match revert.error {
            SuretyError::Operational => &self.reverts_operational,
            SuretyError::Authorization(_) => &self.reverts_authorization,
            SuretyError::Validation(_) => &self.reverts_validation,
            SuretyError::State(_) => &self.reverts_state,
            SuretyError::Transfer(_) => &self.reverts_transfer,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Record call latency.
    pub fn record_latency(&self, start: Instant) {
        let micros = start.elapsed().as_micros() as u64;

        if micros < 100 {
            self.latency_under_100us.fetch_add(1, Ordering::Relaxed);
        } else if micros < 1000 {
            self.latency_100us_1ms.fetch_add(1, Ordering::Relaxed);
        } else if micros < 10000 {
            self.latency_1_10ms.fetch_add(1, Ordering::Relaxed);
        } else {
            self.latency_over_10ms.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Saturating add of a wei amount into a 64-bit counter.
    fn add_wei(&self, counter: &AtomicU64, wei: u128) {
        let wei = u64::try_from(wei).unwrap_or(u64::MAX);
        let _ = counter.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| {
            Some(v.saturating_add(wei))
        });
    }

    fn reverts_total(&self) -> u64 {
        self.reverts_operational.load(Ordering::Relaxed)
            + self.reverts_authorization.load(Ordering::Relaxed)
            + self.reverts_validation.load(Ordering::Relaxed)
            + self.reverts_state.load(Ordering::Relaxed)
            + self.reverts_transfer.load(Ordering::Relaxed)
    }

    /// Export metrics in Prometheus format.
    pub fn to_prometheus(&self) -> String {
        format!(
            r#"# HELP surety_calls_committed_total Calls that committed
# TYPE surety_calls_committed_total counter
surety_calls_committed_total {}

# HELP surety_calls_reverted_total Calls that reverted
# TYPE surety_calls_reverted_total counter
surety_calls_reverted_total {}

# HELP surety_reverts Reverted calls by error kind
# TYPE surety_reverts counter
surety_reverts{{kind="operational"}} {}
surety_reverts{{kind="authorization"}} {}
surety_reverts{{kind="validation"}} {}
surety_reverts{{kind="state"}} {}
surety_reverts{{kind="transfer"}} {}

# HELP surety_call_latency_bucket Call latency histogram
# TYPE surety_call_latency_bucket counter
surety_call_latency_bucket{{le="0.0001"}} {}
surety_call_latency_bucket{{le="0.001"}} {}
surety_call_latency_bucket{{le="0.01"}} {}
surety_call_latency_bucket{{le="+Inf"}} {}

# HELP surety_status_requests_total Flight status requests opened
# TYPE surety_status_requests_total counter
surety_status_requests_total {}

# HELP surety_oracle_responses_total Oracle responses recorded
# TYPE surety_oracle_responses_total counter
surety_oracle_responses_total {}

# HELP surety_statuses_finalized_total Flight statuses finalized by quorum
# TYPE surety_statuses_finalized_total counter
surety_statuses_finalized_total {}

# HELP surety_policies_total Insurance policies purchased
# TYPE surety_policies_total counter
surety_policies_total {}

# HELP surety_payouts_total Payouts withdrawn
# TYPE surety_payouts_total counter
surety_payouts_total {}

# HELP surety_payouts_wei_total Wei paid out to passengers
# TYPE surety_payouts_wei_total counter
surety_payouts_wei_total {}

# HELP surety_fees_wei_total Wei charged as call fees
# TYPE surety_fees_wei_total counter
surety_fees_wei_total {}
"#,
            self.calls_committed.load(Ordering::Relaxed),
            self.reverts_total(),
            self.reverts_operational.load(Ordering::Relaxed),
            self.reverts_authorization.load(Ordering::Relaxed),
            self.reverts_validation.load(Ordering::Relaxed),
            self.reverts_state.load(Ordering::Relaxed),
            self.reverts_transfer.load(Ordering::Relaxed),
            self.latency_under_100us.load(Ordering::Relaxed),
            self.latency_under_100us.load(Ordering::Relaxed)
                + self.latency_100us_1ms.load(Ordering::Relaxed),
            self.latency_under_100us.load(Ordering::Relaxed)
                + self.latency_100us_1ms.load(Ordering::Relaxed)
                + self.latency_1_10ms.load(Ordering::Relaxed),
            self.latency_under_100us.load(Ordering::Relaxed)
                + self.latency_100us_1ms.load(Ordering::Relaxed)
                + self.latency_1_10ms.load(Ordering::Relaxed)
                + self.latency_over_10ms.load(Ordering::Relaxed),
            self.status_requests_total.load(Ordering::Relaxed),
            self.oracle_responses_total.load(Ordering::Relaxed),
            self.statuses_finalized_total.load(Ordering::Relaxed),
            self.policies_total.load(Ordering::Relaxed),
            self.payouts_total.load(Ordering::Relaxed),
            self.payouts_wei_total.load(Ordering::Relaxed),
            self.fees_wei_total.load(Ordering::Relaxed),
        )
    }
}

/// Timing guard that records latency on drop.
pub struct TimingGuard<'a> {
    registry: &'a MetricsRegistry,
    start: Instant,
}

impl<'a> TimingGuard<'a> {
    pub fn new(registry: &'a MetricsRegistry) -> Self {
        TimingGuard {
            registry,
            start: Instant::now(),
        }
    }
}

impl Drop for TimingGuard<'_> {
    fn drop(&mut self) {
        self.registry.record_latency(self.start);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Address, FlightKey, StatusCode};
    use chrono::Utc;
    use uuid::Uuid;

    fn receipt(method: &'static str, outcome: Outcome, events: Vec<Event>) -> Receipt {
        Receipt {
            tx_id: Uuid::new_v4(),
            sequence: 1,
            caller: Address::new("0xp1"),
            method,
            fee: 10,
            outcome,
            events,
            committed_at: Utc::now(),
        }
    }

    fn revert(error: SuretyError) -> Revert {
        Revert {
            tx_id: Uuid::new_v4(),
            sequence: 1,
            caller: Address::new("0xp1"),
            method: "pay",
            fee: 10,
            error,
        }
    }

    #[test]
    fn test_only_purchases_count_as_policies() {
        let registry = MetricsRegistry::new();
        let key = FlightKey::derive(&Address::new("0xa1"), "AC110", 1);

        registry.record_receipt(&receipt("register_flight", Outcome::FlightKey(key), vec![]));
        registry.record_receipt(&receipt("register_flight", Outcome::FlightKey(key), vec![]));
        assert_eq!(registry.policies_total.load(Ordering::Relaxed), 0);

        registry.record_receipt(&receipt("buy", Outcome::Insured(key), vec![]));
        assert_eq!(registry.policies_total.load(Ordering::Relaxed), 1);
        assert_eq!(registry.calls_committed.load(Ordering::Relaxed), 3);
    }

    #[test]
    fn test_record_receipts() {
        let registry = MetricsRegistry::new();
        let key = FlightKey::derive(&Address::new("0xa1"), "AC110", 1);

        registry.record_receipt(&receipt("buy", Outcome::Insured(key), vec![]));
        registry.record_receipt(&receipt("register_flight", Outcome::FlightKey(key), vec![]));
        registry.record_receipt(&receipt("pay", Outcome::Paid { amount: 150 }, vec![]));

        let report = Event::OracleReport {
            airline: Address::new("0xa1"),
            flight: "AC110".to_string(),
            timestamp: 1,
            status: StatusCode::LateAirline,
        };
        let finalized = Event::FlightStatusInfo {
            airline: Address::new("0xa1"),
            flight: "AC110".to_string(),
            timestamp: 1,
            status: StatusCode::LateAirline,
        };
        let events = vec![report, finalized];
        registry.record_receipt(&receipt("submit_oracle_response", Outcome::None, events));

        assert_eq!(registry.calls_committed.load(Ordering::Relaxed), 4);
        assert_eq!(registry.policies_total.load(Ordering::Relaxed), 1);
        assert_eq!(registry.payouts_total.load(Ordering::Relaxed), 1);
        assert_eq!(registry.payouts_wei_total.load(Ordering::Relaxed), 150);
        assert_eq!(registry.oracle_responses_total.load(Ordering::Relaxed), 1);
        assert_eq!(registry.statuses_finalized_total.load(Ordering::Relaxed), 1);
        assert_eq!(registry.fees_wei_total.load(Ordering::Relaxed), 40);
    }

    #[test]
    fn test_record_reverts() {
        let registry = MetricsRegistry::new();

        registry.record_revert(&revert(SuretyError::Operational));
        registry.record_revert(&revert(SuretyError::state("passenger is not insured")));
        let nothing_due = SuretyError::state("there is no payment due for this passenger");
        registry.record_revert(&revert(nothing_due));

        assert_eq!(registry.reverts_operational.load(Ordering::Relaxed), 1);
        assert_eq!(registry.reverts_state.load(Ordering::Relaxed), 2);
        assert_eq!(registry.reverts_total(), 3);
    }

    #[test]
    fn test_wei_counter_saturates() {
        let registry = MetricsRegistry::new();
        registry.record_receipt(&receipt("pay", Outcome::Paid { amount: u128::MAX }, vec![]));
        registry.record_receipt(&receipt("pay", Outcome::Paid { amount: 1 }, vec![]));

        assert_eq!(registry.payouts_wei_total.load(Ordering::Relaxed), u64::MAX);
    }

    #[test]
    fn test_prometheus_export() {
        let registry = MetricsRegistry::new();
        registry.record_revert(&revert(SuretyError::validation("function is not payable")));

        let output = registry.to_prometheus();

        assert!(output.contains("surety_calls_reverted_total 1"));
        assert!(output.contains("surety_reverts{kind=\"validation\"} 1"));
        assert!(output.contains("# TYPE surety_payouts_total counter"));
    }

    #[test]
    fn test_timing_guard() {
        let registry = MetricsRegistry::new();
        {
            let _guard = TimingGuard::new(&registry);
        }

        let total = registry.latency_under_100us.load(Ordering::Relaxed)
            + registry.latency_100us_1ms.load(Ordering::Relaxed)
            + registry.latency_1_10ms.load(Ordering::Relaxed)
            + registry.latency_over_10ms.load(Ordering::Relaxed);
        assert_eq!(total, 1);
    }
}
