//! Top-level metrics snapshot for `admin/metrics()` (§6), combining the
//! lifecycle manager's performance counters (C4), the tiered router's
//! routing/throughput stats (C5), and the failover manager's chain-level
//! counters (C6).

use crate::failover::FailoverMetrics;
use crate::lifecycle::PerformanceSnapshot;
use crate::router::RouterMetrics;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct RouterSnapshot {
    pub lifecycle: PerformanceSnapshot,
    pub router: RouterMetrics,
    pub failover: FailoverSnapshot,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailoverSnapshot {
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub fallback_requests: u64,
    pub provider_usage: std::collections::BTreeMap<String, u64>,
    pub average_response_time_seconds: f64,
    pub success_rate_percent: f64,
}

impl From<FailoverMetrics> for FailoverSnapshot {
    fn from(m: FailoverMetrics) -> Self {
        Self {
            average_response_time_seconds: m.average_response_time_seconds(),
            success_rate_percent: m.success_rate_percent(),
            successful_requests: m.successful_requests,
            failed_requests: m.failed_requests,
            fallback_requests: m.fallback_requests,
            provider_usage: m.provider_usage.into_iter().collect(),
        }
    }
}
