//! Thread-safe in-memory [`TokenCache`].

// self
use crate::{
	_prelude::*,
	auth::TokenRecord,
	cache::{CacheError, CacheFuture, CacheKey, TokenCache},
};

type CacheMap = Arc<RwLock<HashMap<CacheKey, TokenRecord>>>;

/// In-process token cache; the default backend.
///
/// A record that has expired and carries no refresh token can never be used again, so `get`
/// drops it on sight. Expired records that still hold a refresh token stay put: they are the
/// only way to renew a user's token without a new login.
#[derive(Clone, Debug, Default)]
pub struct MemoryCache(CacheMap);
impl MemoryCache {
	/// Number of stored records, dead ones included.
	pub fn len(&self) -> usize {
		self.0.read().len()
	}

	/// Returns `true` when nothing is cached.
	pub fn is_empty(&self) -> bool {
		self.0.read().is_empty()
	}

	/// Drops every dead record at `now`, returning how many were removed.
	pub fn purge_expired(&self, now: OffsetDateTime) -> usize {
		let mut guard = self.0.write();
		let before = guard.len();

		guard.retain(|_, record| !is_dead(record, now));

		before - guard.len()
	}

	fn get_now(map: &CacheMap, key: &CacheKey, now: OffsetDateTime) -> Option<TokenRecord> {
		{
			let guard = map.read();

			match guard.get(key) {
				Some(record) if !is_dead(record, now) => return Some(record.clone()),
				Some(_) => {},
				None => return None,
			}
		}

		let mut guard = map.write();

		// Re-check under the write lock; a concurrent `set` may have replaced the record.
		if guard.get(key).is_some_and(|record| is_dead(record, now)) {
			guard.remove(key);

			return None;
		}

		guard.get(key).cloned()
	}
}
impl TokenCache for MemoryCache {
	fn get<'a>(&'a self, key: &'a CacheKey) -> CacheFuture<'a, Option<TokenRecord>> {
		let map = self.0.clone();

		Box::pin(async move { Ok(Self::get_now(&map, key, OffsetDateTime::now_utc())) })
	}

	fn set(&self, key: CacheKey, record: TokenRecord) -> CacheFuture<'_, ()> {
		let map = self.0.clone();

		Box::pin(async move {
			map.write().insert(key, record);

			Ok::<_, CacheError>(())
		})
	}

	fn invalidate<'a>(&'a self, key: &'a CacheKey) -> CacheFuture<'a, Option<TokenRecord>> {
		let map = self.0.clone();

		Box::pin(async move { Ok(map.write().remove(key)) })
	}
}

fn is_dead(record: &TokenRecord, now: OffsetDateTime) -> bool {
	record.is_expired_at(now) && !record.can_refresh()
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::auth::{ClientName, ScopeSet, Subject, UserId};

	fn record(subject: Subject, expires_in: Duration, refresh: Option<&str>) -> TokenRecord {
		let client = ClientName::new("svc1").expect("Client fixture should be valid.");
		let scope = ScopeSet::new(["read"]).expect("Scope fixture should be valid.");
		let issued = OffsetDateTime::now_utc() - Duration::hours(2);
		let mut builder = TokenRecord::builder(client, subject, scope)
			.access_token("access")
			.issued_at(issued)
			.expires_at(OffsetDateTime::now_utc() + expires_in);

		if let Some(refresh) = refresh {
			builder = builder.refresh_token(refresh);
		}

		builder.build().expect("Record fixture should build.")
	}

	#[test]
	fn expired_records_without_refresh_token_are_dropped_on_read() {
		let cache = MemoryCache::default();
		let dead = record(Subject::Client, Duration::minutes(-1), None);
		let key = CacheKey::for_record(&dead);

		cache.0.write().insert(key.clone(), dead);

		assert_eq!(cache.len(), 1);
		assert!(MemoryCache::get_now(&cache.0, &key, OffsetDateTime::now_utc()).is_none());
		assert!(cache.is_empty());
	}

	#[test]
	fn expired_records_with_refresh_token_survive() {
		let cache = MemoryCache::default();
		let user = Subject::User(UserId::new("alice").expect("User fixture should be valid."));
		let stale = record(user, Duration::minutes(-1), Some("refresh"));
		let key = CacheKey::for_record(&stale);

		cache.0.write().insert(key.clone(), stale);

		let fetched = MemoryCache::get_now(&cache.0, &key, OffsetDateTime::now_utc())
			.expect("Refreshable record should still be returned.");

		assert!(fetched.can_refresh());
	}

	#[test]
	fn purge_counts_removed_records() {
		let cache = MemoryCache::default();
		let live = record(Subject::Client, Duration::hours(1), None);
		let dead = record(
			Subject::User(UserId::new("bob").expect("User fixture should be valid.")),
			Duration::minutes(-5),
			None,
		);

		cache.0.write().insert(CacheKey::for_record(&live), live);
		cache.0.write().insert(CacheKey::for_record(&dead), dead);

		assert_eq!(cache.purge_expired(OffsetDateTime::now_utc()), 1);
		assert_eq!(cache.len(), 1);
	}
}
