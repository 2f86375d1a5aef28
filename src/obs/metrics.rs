//! Relay counters and histograms, recorded through the global `metrics` recorder.

// self
use crate::obs::{FlowKind, FlowOutcome};

/// Counts one renewal or decoration step, labeled by `flow` and `outcome`.
pub fn record_flow_outcome(kind: FlowKind, outcome: FlowOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"token_relay_flow_total",
			"flow" => kind.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}
	#[cfg(not(feature = "metrics"))]
	{
		let _ = (kind, outcome);
	}
}

/// Records how long one renewal took, successful or not.
pub fn record_renewal_latency(kind: FlowKind, elapsed: std::time::Duration) {
	#[cfg(feature = "metrics")]
	{
		metrics::histogram!("token_relay_renewal_seconds", "flow" => kind.as_str())
			.record(elapsed.as_secs_f64());
	}
	#[cfg(not(feature = "metrics"))]
	{
		let _ = (kind, elapsed);
	}
}

/// Counts a rejected grant whose cached record could not be evicted.
pub fn record_eviction_failure() {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!("token_relay_eviction_failures_total").increment(1);
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn recording_without_an_installed_recorder_is_harmless() {
		record_flow_outcome(FlowKind::Decorate, FlowOutcome::Failure);
		record_renewal_latency(FlowKind::ClientCredentials, std::time::Duration::from_millis(12));
		record_eviction_failure();
	}
}
