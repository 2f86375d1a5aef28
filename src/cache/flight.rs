//! Single-flight markers for token renewals.
//!
//! The first caller that needs a fresh token for a [`CacheKey`] starts a flight; everyone else
//! asking for the same key while it is airborne joins it and receives the same token or the same
//! error. Each flight runs as its own Tokio task and reports back over a oneshot channel, so it
//! lands even after every waiter has given up. Waiters hold a [`Shared`] view of that channel.
//! The task clears the marker before publishing its result, and a task that dies early (panic,
//! runtime shutdown) clears it on the way out, so a key is never left grounded.

// crates.io
use futures::{
	channel::oneshot,
	future::{BoxFuture, FutureExt, Shared},
};
// self
use crate::{_prelude::*, auth::TokenRecord, cache::CacheKey};

type Flight = Shared<BoxFuture<'static, Result<TokenRecord>>>;
type FlightMap = Arc<Mutex<HashMap<CacheKey, Flight>>>;

/// Per-key registry of in-flight renewals.
///
/// The map lock only guards marker lookup and insertion; it is never held across an await, so
/// renewals for unrelated keys proceed in parallel.
#[derive(Clone, Default)]
pub struct FlightGroup {
	inflight: FlightMap,
}
impl FlightGroup {
	/// Joins the flight for `key`, starting one with `start` when none is airborne.
	///
	/// `start` runs at most once per flight and only for the leader. The renewal it returns is
	/// spawned onto the current Tokio runtime, so this must be called from within one.
	pub fn join<F, Fut>(&self, key: &CacheKey, start: F) -> Boarding
	where
		F: FnOnce() -> Fut,
		Fut: 'static + Send + Future<Output = Result<TokenRecord>>,
	{
		let (landed, flight) = {
			let mut inflight = self.inflight.lock();

			if let Some(flight) = inflight.get(key) {
				return Boarding { flight: flight.clone(), leader: false };
			}

			let (landed, arrival) = oneshot::channel();
			let flight = arrival
				.map(|outcome: Result<Result<TokenRecord>, oneshot::Canceled>| {
					outcome.unwrap_or_else(|_| {
						Err(Error::RenewalAborted { reason: "renewal task ended early".into() })
					})
				})
				.boxed()
				.shared();

			inflight.insert(key.clone(), flight.clone());

			(landed, flight)
		};
		let landing = Landing {
			registry: Arc::clone(&self.inflight),
			key: key.clone(),
			landed: Some(landed),
		};
		let work = start();

		tokio::spawn(async move { landing.land(work.await) });

		Boarding { flight, leader: true }
	}

	/// Boards the flight for `key` without starting one.
	pub fn board(&self, key: &CacheKey) -> Option<Boarding> {
		self.inflight
			.lock()
			.get(key)
			.map(|flight| Boarding { flight: flight.clone(), leader: false })
	}

	/// Returns `true` while a renewal for `key` is airborne.
	pub fn is_in_flight(&self, key: &CacheKey) -> bool {
		self.inflight.lock().contains_key(key)
	}

	/// Number of airborne renewals.
	pub fn len(&self) -> usize {
		self.inflight.lock().len()
	}

	/// Returns `true` when nothing is airborne.
	pub fn is_empty(&self) -> bool {
		self.inflight.lock().is_empty()
	}
}
impl Debug for FlightGroup {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("FlightGroup").field("in_flight", &self.len()).finish()
	}
}

/// Handle on a flight returned by [`FlightGroup::join`].
#[must_use = "a boarding pass does nothing until it is awaited"]
pub struct Boarding {
	flight: Flight,
	leader: bool,
}
impl Boarding {
	/// Returns `true` for the caller that started the flight.
	pub fn is_leader(&self) -> bool {
		self.leader
	}

	/// Waits for the flight to land.
	pub async fn wait(self) -> Result<TokenRecord> {
		self.flight.await
	}
}
impl Debug for Boarding {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Boarding").field("leader", &self.leader).finish()
	}
}

/// Clears a flight's marker when its task finishes or is torn down.
struct Landing {
	registry: FlightMap,
	key: CacheKey,
	landed: Option<oneshot::Sender<Result<TokenRecord>>>,
}
impl Landing {
	fn land(mut self, result: Result<TokenRecord>) {
		let Some(landed) = self.landed.take() else {
			return;
		};

		self.registry.lock().remove(&self.key);
		// Every waiter may have left already.
		let _ = landed.send(result);
	}
}
impl Drop for Landing {
	fn drop(&mut self) {
		// Torn down before landing; the sender goes right after, failing the waiters.
		if self.landed.is_some() {
			self.registry.lock().remove(&self.key);
		}
	}
}
