//! Token cache contract, cache keys, and the built-in backends.
//!
//! [`TokenCache`] is the persistence seam: `get`, `set`, and `invalidate` keyed by
//! [`CacheKey`]. Coalescing concurrent refreshes for one key lives next to it in
//! [`flight::FlightGroup`], which the provisioning service consults before it touches the token
//! endpoint.

pub mod flight;
pub mod memory;

pub use flight::FlightGroup;
pub use memory::MemoryCache;

// self
use crate::{
	_prelude::*,
	auth::{ClientName, ScopeSet, Subject, TokenRecord},
};

/// Boxed future returned by [`TokenCache`] operations.
pub type CacheFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, CacheError>> + 'a + Send>>;

/// Storage contract for issued tokens.
///
/// Entries are replaced on `set`, never evicted by size; a record's lifetime is governed by its
/// expiry. Implementations must be cheap to call concurrently because every outgoing request
/// performs a `get`.
pub trait TokenCache
where
	Self: Send + Sync,
{
	/// Returns the record stored under `key`, if any.
	fn get<'a>(&'a self, key: &'a CacheKey) -> CacheFuture<'a, Option<TokenRecord>>;

	/// Stores or replaces the record under `key`.
	fn set(&self, key: CacheKey, record: TokenRecord) -> CacheFuture<'_, ()>;

	/// Removes the record under `key`, returning it when present.
	fn invalidate<'a>(&'a self, key: &'a CacheKey) -> CacheFuture<'a, Option<TokenRecord>>;
}

/// Error type produced by [`TokenCache`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum CacheError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

/// Identity a cached token is stored under: (client, subject, scope).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
	/// Named client whose credentials obtain the token.
	pub client: ClientName,
	/// Identity the token speaks for.
	pub subject: Subject,
	/// Fingerprint of the normalized scope set.
	pub scope_fingerprint: String,
}
impl CacheKey {
	/// Builds a key for the provided identity.
	pub fn new(client: &ClientName, subject: &Subject, scope: &ScopeSet) -> Self {
		Self {
			client: client.clone(),
			subject: subject.clone(),
			scope_fingerprint: scope.fingerprint(),
		}
	}

	/// Builds the key a record is stored under.
	pub fn for_record(record: &TokenRecord) -> Self {
		Self::new(&record.client, &record.subject, &record.scope)
	}
}
impl Display for CacheKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "{}/{}/{}", self.client, self.subject, self.scope_fingerprint)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{auth::UserId, error::Error};

	fn client() -> ClientName {
		ClientName::new("svc1").expect("Client fixture should be valid.")
	}

	#[test]
	fn cache_error_converts_into_relay_error_with_source() {
		let cache_error = CacheError::Backend { message: "redis unreachable".into() };
		let relay_error: Error = cache_error.clone().into();

		assert!(matches!(relay_error, Error::Cache(_)));
		assert!(relay_error.to_string().contains("redis unreachable"));

		let source = StdError::source(&relay_error)
			.expect("Relay error should expose the original cache error as its source.");

		assert_eq!(source.to_string(), cache_error.to_string());
	}

	#[test]
	fn key_ignores_scope_order() {
		let read_write = ScopeSet::new(["read", "write"]).expect("Scope fixture should be valid.");
		let write_read = ScopeSet::new(["write", "read"]).expect("Scope fixture should be valid.");

		assert_eq!(
			CacheKey::new(&client(), &Subject::Client, &read_write),
			CacheKey::new(&client(), &Subject::Client, &write_read)
		);
	}

	#[test]
	fn key_separates_subjects_and_clients() {
		let scope = ScopeSet::new(["read"]).expect("Scope fixture should be valid.");
		let user = Subject::User(UserId::new("alice").expect("User fixture should be valid."));
		let other = ClientName::new("svc2").expect("Client fixture should be valid.");
		let app_key = CacheKey::new(&client(), &Subject::Client, &scope);

		assert_ne!(app_key, CacheKey::new(&client(), &user, &scope));
		assert_ne!(app_key, CacheKey::new(&other, &Subject::Client, &scope));
		assert!(app_key.to_string().starts_with("svc1/client/"));
	}
}
