mod common;

// std
use std::{
	collections::HashMap,
	sync::{
		Arc,
		atomic::{AtomicUsize, Ordering},
	},
};
// crates.io
use httpmock::prelude::*;
use parking_lot::Mutex;
use time::{Duration, OffsetDateTime};
// self
use common::*;
use token_relay::{
	auth::{Subject, TokenRecord},
	cache::{CacheError, CacheFuture, CacheKey, MemoryCache, TokenCache},
	config::ClientAuthMethod,
	endpoint::TokenGrant,
	error::Error,
	registration::TokenManagement,
};

/// Backend that counts writes and can be switched into a failing state.
#[derive(Default)]
struct RecordingCache {
	records: Mutex<HashMap<CacheKey, TokenRecord>>,
	sets: AtomicUsize,
	offline: Mutex<bool>,
}
impl RecordingCache {
	fn check(&self) -> Result<(), CacheError> {
		if *self.offline.lock() {
			return Err(CacheError::Backend { message: "cache node unreachable".into() });
		}

		Ok(())
	}
}
impl TokenCache for RecordingCache {
	fn get<'a>(&'a self, key: &'a CacheKey) -> CacheFuture<'a, Option<TokenRecord>> {
		Box::pin(async move {
			self.check()?;

			Ok(self.records.lock().get(key).cloned())
		})
	}

	fn set(&self, key: CacheKey, record: TokenRecord) -> CacheFuture<'_, ()> {
		Box::pin(async move {
			self.check()?;
			self.sets.fetch_add(1, Ordering::SeqCst);
			self.records.lock().insert(key, record);

			Ok(())
		})
	}

	fn invalidate<'a>(&'a self, key: &'a CacheKey) -> CacheFuture<'a, Option<TokenRecord>> {
		Box::pin(async move {
			self.check()?;

			Ok(self.records.lock().remove(key))
		})
	}
}

fn management_over(server: &MockServer, cache: Arc<dyn TokenCache>) -> TokenManagement {
	TokenManagement::builder(options_with(
		credentials(server, ClientAuthMethod::ClientSecretPost),
		Duration::seconds(60),
	))
	.cache(cache)
	.token_http_client(insecure_client())
	.build()
	.expect("Token management should build.")
}

#[tokio::test]
async fn custom_backend_receives_acquired_tokens() {
	let server = MockServer::start_async().await;
	let token = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200)
				.header("content-type", "application/json")
				.body(token_body("backend-token", 1800));
		})
		.await;
	let cache = Arc::new(RecordingCache::default());
	let management = management_over(&server, cache.clone());
	let svc1 = client_name("svc1");
	let first = management
		.service()
		.client_access_token(&svc1)
		.await
		.expect("Acquisition should succeed.");
	let second = management
		.service()
		.client_access_token(&svc1)
		.await
		.expect("Cached token should be served.");
	let key = CacheKey::for_record(&first);
	let stored = cache.records.lock().get(&key).cloned().expect("Record should be in the backend.");

	assert_eq!(first.access_token.expose(), "backend-token");
	assert_eq!(second.access_token.expose(), "backend-token");
	assert_eq!(stored.subject, Subject::Client);
	assert_eq!(cache.sets.load(Ordering::SeqCst), 1);
	token.assert_calls_async(1).await;
}

#[tokio::test]
async fn backend_failures_surface_as_cache_errors() {
	let server = MockServer::start_async().await;
	let token = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200)
				.header("content-type", "application/json")
				.body(token_body("never-used", 1800));
		})
		.await;
	let cache = Arc::new(RecordingCache::default());

	*cache.offline.lock() = true;

	let err = management_over(&server, cache)
		.service()
		.client_access_token(&client_name("svc1"))
		.await
		.expect_err("An unreachable cache must surface.");

	assert!(matches!(err, Error::Cache(CacheError::Backend { .. })));
	assert!(err.to_string().contains("cache node unreachable"));
	token.assert_calls_async(0).await;
}

#[tokio::test]
async fn invalidating_a_user_forces_a_new_sign_in() {
	let server = MockServer::start_async().await;
	let refresh = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200)
				.header("content-type", "application/json")
				.body(token_body("should-not-be-issued", 3600));
		})
		.await;
	let cache = Arc::new(MemoryCache::default());
	let management = management_over(&server, cache.clone());
	let erin = user("erin");

	management
		.service()
		.store_user_token(
			erin.clone(),
			TokenGrant::new("erin-token", Duration::hours(1)).with_refresh_token("erin-refresh"),
		)
		.await
		.expect("Seeding the user token should succeed.");

	assert_eq!(cache.len(), 1);

	let removed = management
		.service()
		.invalidate_user(&erin)
		.await
		.expect("Invalidation should succeed.")
		.expect("The seeded record should be returned.");

	assert_eq!(removed.access_token.expose(), "erin-token");
	assert!(cache.is_empty());

	let err = management
		.service()
		.user_access_token(&erin)
		.await
		.expect_err("A user without a stored token must sign in again.");

	assert!(matches!(err, Error::InvalidGrant { .. }));
	refresh.assert_calls_async(0).await;
}

#[tokio::test]
async fn purge_drops_only_unrecoverable_records() {
	let server = MockServer::start_async().await;
	let cache = Arc::new(MemoryCache::default());
	let management = management_over(&server, cache.clone());

	for (name, refresh) in [("frank", Some("frank-refresh")), ("grace", None)] {
		let grant = TokenGrant::new(format!("{name}-token"), Duration::seconds(1));
		let grant = match refresh {
			Some(token) => grant.with_refresh_token(token),
			None => grant,
		};

		management
			.service()
			.store_user_token(user(name), grant)
			.await
			.expect("Seeding the user token should succeed.");
	}

	assert_eq!(cache.len(), 2);
	assert_eq!(cache.purge_expired(OffsetDateTime::now_utc() + Duration::minutes(5)), 1);
	assert_eq!(cache.len(), 1);
}
