//! Optional observability hooks for token provisioning.
//!
//! # Feature Flags
//!
//! - `tracing` wraps renewals and decoration in `token_relay.flow` spans carrying `flow` and
//!   `target` fields, and emits events for unreadable endpoint responses, failed evictions, and
//!   requests that go out without a token.
//! - `metrics` increments `token_relay_flow_total` (labeled by `flow` and `outcome`) and
//!   `token_relay_eviction_failures_total`, and records renewal durations in the
//!   `token_relay_renewal_seconds` histogram.
//!
//! Without either feature every helper here compiles down to nothing.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Work units observed by the relay.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowKind {
	/// `client_credentials` acquisition.
	ClientCredentials,
	/// `refresh_token` renewal of a user token.
	Refresh,
	/// Bearer header attachment on an outgoing request.
	Decorate,
}
impl FlowKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowKind::ClientCredentials => "client_credentials",
			FlowKind::Refresh => "refresh",
			FlowKind::Decorate => "decorate",
		}
	}
}
impl Display for FlowKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowOutcome {
	/// A renewal or decoration started.
	Attempt,
	/// Token obtained.
	Success,
	/// Failure surfaced to the caller (or, for decoration, request forwarded without a token).
	Failure,
}
impl FlowOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowOutcome::Attempt => "attempt",
			FlowOutcome::Success => "success",
			FlowOutcome::Failure => "failure",
		}
	}
}
impl Display for FlowOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Logs a token endpoint response that could not be interpreted.
pub fn log_protocol_error(kind: FlowKind, key: &impl Display, error: &Error) {
	#[cfg(feature = "tracing")]
	{
		::tracing::error!(
			flow = kind.as_str(),
			key = %key,
			error = %error,
			"token endpoint returned an invalid response"
		);
	}

	#[cfg(not(feature = "tracing"))]
	{
		let _ = (kind, key, error);
	}
}

/// Logs a rejected grant whose cached record could not be evicted.
pub fn log_eviction_failure(key: &impl Display, error: &crate::cache::CacheError) {
	#[cfg(feature = "tracing")]
	{
		::tracing::warn!(key = %key, error = %error, "failed to evict a rejected token");
	}

	#[cfg(not(feature = "tracing"))]
	{
		let _ = (key, error);
	}
}

/// Logs a request that is forwarded without a bearer token.
pub fn log_undecorated(source: &impl Display, reason: &impl Display) {
	#[cfg(feature = "tracing")]
	{
		::tracing::warn!(
			source = %source,
			reason = %reason,
			"forwarding request without an access token"
		);
	}

	#[cfg(not(feature = "tracing"))]
	{
		let _ = (source, reason);
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn labels_are_stable() {
		assert_eq!(FlowKind::ClientCredentials.to_string(), "client_credentials");
		assert_eq!(FlowKind::Decorate.as_str(), "decorate");
		assert_eq!(FlowOutcome::Failure.to_string(), "failure");
	}

	#[test]
	fn log_helpers_accept_relay_errors() {
		let err = Error::InvalidGrant { reason: "revoked".into() };

		log_protocol_error(FlowKind::Refresh, &"web/user:alice/fp", &err);
		log_undecorated(&"client:svc1", &err);
		log_eviction_failure(
			&"web/user:alice/fp",
			&crate::cache::CacheError::Backend { message: "read-only replica".into() },
		);
	}
}
