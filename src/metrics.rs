//! Round settlement counters and their Prometheus text rendering

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Instant;

pub struct SpinMetrics {
    start_time: Instant,
    spins_total: AtomicU64,
    wins_total: AtomicU64,
    faults_total: AtomicU64,
    sessions_started: AtomicU64,
    wagered_units: AtomicU64,
    paid_units: AtomicU64,
    declines: Mutex<BTreeMap<&'static str, u64>>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub uptime_seconds: u64,
    pub spins_total: u64,
    pub wins_total: u64,
    pub faults_total: u64,
    pub sessions_started: u64,
    pub wagered_units: u64,
    pub paid_units: u64,
    pub declines: BTreeMap<String, u64>,
}

impl Default for SpinMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl SpinMetrics {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            spins_total: AtomicU64::new(0),
            wins_total: AtomicU64::new(0),
            faults_total: AtomicU64::new(0),
            sessions_started: AtomicU64::new(0),
            wagered_units: AtomicU64::new(0),
            paid_units: AtomicU64::new(0),
            declines: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn record_spin(&self, wager_units: u64, payout_units: u64) {
        self.spins_total.fetch_add(1, Ordering::SeqCst);
        self.wagered_units.fetch_add(wager_units, Ordering::SeqCst);
        self.paid_units.fetch_add(payout_units, Ordering::SeqCst);
        if payout_units > 0 {
            self.wins_total.fetch_add(1, Ordering::SeqCst);
        }
    }

    pub fn record_decline(&self, code: &'static str) {
        if let Ok(mut declines) = self.declines.lock() {
            *declines.entry(code).or_insert(0) += 1;
        }
    }

    pub fn record_fault(&self) {
        self.faults_total.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_session_started(&self) {
        self.sessions_started.fetch_add(1, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let declines = self
            .declines
            .lock()
            .map(|d| d.iter().map(|(k, v)| (k.to_string(), *v)).collect())
            .unwrap_or_default();

        MetricsSnapshot {
            uptime_seconds: self.start_time.elapsed().as_secs(),
            spins_total: self.spins_total.load(Ordering::SeqCst),
            wins_total: self.wins_total.load(Ordering::SeqCst),
            faults_total: self.faults_total.load(Ordering::SeqCst),
            sessions_started: self.sessions_started.load(Ordering::SeqCst),
            wagered_units: self.wagered_units.load(Ordering::SeqCst),
            paid_units: self.paid_units.load(Ordering::SeqCst),
            declines,
        }
    }

    /// Observed return to player, paid / wagered
    pub fn observed_rtp(&self) -> f64 {
        let wagered = self.wagered_units.load(Ordering::SeqCst);
        if wagered == 0 {
            return 0.0;
        }
        self.paid_units.load(Ordering::SeqCst) as f64 / wagered as f64
    }

    pub fn to_prometheus_format(&self) -> String {
        let snapshot = self.snapshot();
        let mut output = String::new();

        let counters = [
            ("rgs_spins_total", "Total number of settled spins", snapshot.spins_total),
            ("rgs_wins_total", "Settled spins with a non-zero payout", snapshot.wins_total),
            ("rgs_faults_total", "Spins aborted by a transaction fault", snapshot.faults_total),
            ("rgs_sessions_started_total", "Sessions issued", snapshot.sessions_started),
            ("rgs_wagered_micro_units_total", "Sum of settled wagers", snapshot.wagered_units),
            ("rgs_paid_micro_units_total", "Sum of settled payouts", snapshot.paid_units),
        ];
        for (name, help, value) in counters {
            output.push_str(&format!(
                "# HELP {name} {help}\n# TYPE {name} counter\n{name} {value}\n\n"
            ));
        }

        output.push_str(
            "# HELP rgs_declines_total Declined requests by code\n\
             # TYPE rgs_declines_total counter\n",
        );
        for (code, count) in &snapshot.declines {
            output.push_str(&format!("rgs_declines_total{{code=\"{}\"}} {}\n", code, count));
        }
        output.push('\n');

        output.push_str(&format!(
            "# HELP rgs_observed_rtp Paid over wagered since start\n\
             # TYPE rgs_observed_rtp gauge\n\
             rgs_observed_rtp {:.6}\n\n",
            self.observed_rtp()
        ));

        output.push_str(&format!(
            "# HELP rgs_uptime_seconds Process uptime\n\
             # TYPE rgs_uptime_seconds gauge\n\
             rgs_uptime_seconds {}\n",
            snapshot.uptime_seconds
        ));

        output
    }
}
