use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use ballot_core::Category;
use once_cell::sync::OnceCell;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

static TRACING_INIT: OnceCell<()> = OnceCell::new();

#[derive(Debug)]
pub struct AppMetrics {
    requests_total: AtomicU64,
    rule_replies_total: AtomicU64,
    escalations_total: AtomicU64,
    escalation_failures_total: AtomicU64,
    total_latency_millis: AtomicU64,
    by_category: Vec<AtomicU64>,
}

impl Default for AppMetrics {
    fn default() -> Self {
        Self {
            requests_total: AtomicU64::new(0),
            rule_replies_total: AtomicU64::new(0),
            escalations_total: AtomicU64::new(0),
            escalation_failures_total: AtomicU64::new(0),
            total_latency_millis: AtomicU64::new(0),
            by_category: Category::ALL.iter().map(|_| AtomicU64::new(0)).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub requests_total: u64,
    pub rule_replies_total: u64,
    pub escalations_total: u64,
    pub escalation_failures_total: u64,
    pub avg_latency_millis: f64,
    pub categories: BTreeMap<String, u64>,
}

impl AppMetrics {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn inc_request(&self) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_category(&self, category: Category) {
        self.by_category[category as usize].fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_rule_reply(&self) {
        self.rule_replies_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_escalation(&self) {
        self.escalations_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_escalation_failure(&self) {
        self.escalation_failures_total
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn observe_latency(&self, duration: Duration) {
        self.total_latency_millis
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let requests = self.requests_total.load(Ordering::Relaxed);
        let latency = self.total_latency_millis.load(Ordering::Relaxed);

        let categories = Category::ALL
            .iter()
            .zip(&self.by_category)
            .map(|(category, count)| (category.as_code().to_string(), count.load(Ordering::Relaxed)))
            .filter(|(_, count)| *count > 0)
            .collect();

        MetricsSnapshot {
            requests_total: requests,
            rule_replies_total: self.rule_replies_total.load(Ordering::Relaxed),
            escalations_total: self.escalations_total.load(Ordering::Relaxed),
            escalation_failures_total: self.escalation_failures_total.load(Ordering::Relaxed),
            avg_latency_millis: if requests == 0 {
                0.0
            } else {
                latency as f64 / requests as f64
            },
            categories,
        }
    }
}

pub fn init_tracing(service_name: &str) {
    TRACING_INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}=info,ballot_api=info,ballot_agents=info,ballot_llm=info",
                service_name
            ))
        });

        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(true)
            .with_span_list(true)
            .init();
    });
}
