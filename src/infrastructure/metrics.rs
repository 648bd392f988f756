//! Process-wide counters (lock-free atomics), rendered for Prometheus.

use std::sync::atomic::{AtomicU64, Ordering};

pub static METRICS: Metrics = Metrics::new();

pub struct Metrics {
    pub sync_requests: AtomicU64,
    pub domains_synced: AtomicU64,
    pub domains_failed: AtomicU64,
    /// Index add/remove calls that failed after the record write succeeded.
    pub index_update_failures: AtomicU64,
    /// Entries added or removed by the index sweep.
    pub index_repairs: AtomicU64,
}

impl Metrics {
    const fn new() -> Self {
        Self {
            sync_requests: AtomicU64::new(0),
            domains_synced: AtomicU64::new(0),
            domains_failed: AtomicU64::new(0),
            index_update_failures: AtomicU64::new(0),
            index_repairs: AtomicU64::new(0),
        }
    }

    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Render in Prometheus text exposition format.
    pub fn render(&self) -> String {
        let sync_requests = self.sync_requests.load(Ordering::Relaxed);
        let domains_synced = self.domains_synced.load(Ordering::Relaxed);
        let domains_failed = self.domains_failed.load(Ordering::Relaxed);
        let index_failures = self.index_update_failures.load(Ordering::Relaxed);
        let index_repairs = self.index_repairs.load(Ordering::Relaxed);

        format!(
            "\
# HELP cookie_relay_sync_requests_total Sync batches processed.\n\
# TYPE cookie_relay_sync_requests_total counter\n\
cookie_relay_sync_requests_total {sync_requests}\n\
# HELP cookie_relay_domains_synced_total Domains saved by sync batches.\n\
# TYPE cookie_relay_domains_synced_total counter\n\
cookie_relay_domains_synced_total {domains_synced}\n\
# HELP cookie_relay_domains_failed_total Domains that failed inside sync batches.\n\
# TYPE cookie_relay_domains_failed_total counter\n\
cookie_relay_domains_failed_total {domains_failed}\n\
# HELP cookie_relay_index_update_failures_total Domain index updates that failed after a record write.\n\
# TYPE cookie_relay_index_update_failures_total counter\n\
cookie_relay_index_update_failures_total {index_failures}\n\
# HELP cookie_relay_index_repairs_total Index entries fixed by the sweep.\n\
# TYPE cookie_relay_index_repairs_total counter\n\
cookie_relay_index_repairs_total {index_repairs}\n"
        )
    }
}
