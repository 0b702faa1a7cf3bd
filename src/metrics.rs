// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Prometheus metrics.
//!
//! Each [`Metrics`] owns its registry so tests can build isolated instances.

use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

/// Counters for send outcomes, limiter enforcement mode and store failures.
pub struct Metrics {
    registry: Registry,
    /// Send attempts by outcome label
    pub send_outcomes: IntCounterVec,
    /// Limiter consumptions by enforcement mode (distributed / local)
    pub limiter_consumptions: IntCounterVec,
    /// Store failures by component (reputation / limiter)
    pub store_failures: IntCounterVec,
    /// Addresses flagged by the classifier
    pub flags: IntCounter,
    /// 1 while the limiter enforces local-only limits
    pub local_mode: IntGauge,
    /// Mailbox reads and answer writes denied
    pub forbidden: IntCounter,
}

impl Metrics {
    /// Create and register all collectors.
    ///
    /// # Errors
    /// Returns error if a collector fails to register.
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new_custom(Some("anon_inbox".to_string()), None)?;

        let send_outcomes = IntCounterVec::new(
            Opts::new("send_outcomes_total", "Send attempts by outcome"),
            &["outcome"],
        )?;
        let limiter_consumptions = IntCounterVec::new(
            Opts::new(
                "limiter_consumptions_total",
                "Rate limiter consumptions by enforcement mode",
            ),
            &["mode"],
        )?;
        let store_failures = IntCounterVec::new(
            Opts::new("store_failures_total", "Shared store failures by component"),
            &["component"],
        )?;
        let flags = IntCounter::new("flags_total", "Addresses flagged as suspicious")?;
        let local_mode = IntGauge::new(
            "limiter_local_mode",
            "1 while rate limits are enforced with process-local counters only",
        )?;
        let forbidden = IntCounter::new("forbidden_total", "Denied mailbox reads and answers")?;

        registry.register(Box::new(send_outcomes.clone()))?;
        registry.register(Box::new(limiter_consumptions.clone()))?;
        registry.register(Box::new(store_failures.clone()))?;
        registry.register(Box::new(flags.clone()))?;
        registry.register(Box::new(local_mode.clone()))?;
        registry.register(Box::new(forbidden.clone()))?;

        Ok(Self {
            registry,
            send_outcomes,
            limiter_consumptions,
            store_failures,
            flags,
            local_mode,
            forbidden,
        })
    }

    /// Render all metrics in the Prometheus text format.
    pub fn render(&self) -> String {
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(e) = encoder.encode(&self.registry.gather(), &mut buffer) {
            tracing::error!(error = %e, "Failed to encode metrics");
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_includes_namespace() {
        let metrics = Metrics::new().unwrap();
        metrics.send_outcomes.with_label_values(&["accepted"]).inc();
        metrics.flags.inc();

        let text = metrics.render();
        assert!(text.contains("anon_inbox_send_outcomes_total{outcome=\"accepted\"} 1"));
        assert!(text.contains("anon_inbox_flags_total 1"));
    }
}
