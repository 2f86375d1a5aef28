//! Spans around renewals and request decoration.

// self
use crate::{_prelude::*, obs::FlowKind};

/// Future returned by [`FlowSpan::instrument`].
#[cfg(feature = "tracing")]
pub type Traced<F> = tracing::instrument::Instrumented<F>;
/// Future returned by [`FlowSpan::instrument`]; the input itself without the `tracing` feature.
#[cfg(not(feature = "tracing"))]
pub type Traced<F> = F;

/// `token_relay.flow` span tying events to the token being worked on.
///
/// `target` carries the cache key of a renewal or the token source of a decorator.
#[derive(Clone, Debug)]
pub struct FlowSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl FlowSpan {
	/// Span for renewing the token stored under `key`.
	pub fn renewal(kind: FlowKind, key: &impl Display) -> Self {
		Self::open(kind, key)
	}

	/// Span for attaching a token from `source` to one outgoing request.
	pub fn decoration(source: &impl Display) -> Self {
		Self::open(FlowKind::Decorate, source)
	}

	/// Runs `fut` inside the span; no guard is held across its awaits.
	pub fn instrument<Fut>(&self, fut: Fut) -> Traced<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			tracing::Instrument::instrument(fut, self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}

	fn open(kind: FlowKind, target: &impl Display) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span =
				tracing::info_span!("token_relay.flow", flow = kind.as_str(), target = %target);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (kind, target);

			Self {}
		}
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[tokio::test]
	async fn spans_hand_back_the_wrapped_output() {
		let renewal = FlowSpan::renewal(FlowKind::Refresh, &"web/user:alice/fp");
		let decoration = FlowSpan::decoration(&"client:svc1");

		assert_eq!(renewal.instrument(async { 7 }).await, 7);
		assert_eq!(decoration.instrument(async { "sent" }).await, "sent");
	}
}
