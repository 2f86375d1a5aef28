//! Token provisioning: cache lookup, expiry-skew check, and single-flight renewal.
//!
//! [`TokenService::get_token`] serves a cached token while its remaining lifetime is above the
//! expiry skew. Otherwise the caller boards the renewal flight for the token's [`CacheKey`]:
//! exactly one renewal per key is in flight at a time, and everybody on board receives its
//! outcome. Renewal re-reads the cache (a previous flight may have just landed), then runs the
//! `client_credentials` grant for app-only tokens or the `refresh_token` grant for user tokens.
//! A renewal that outlives the configured renewal timeout fails as a transient endpoint error.
//! An `invalid_grant` rejection evicts the cached record so the next request starts from scratch.

pub mod request;

mod client_credentials;
mod counters;
mod refresh;

pub use counters::ProvisioningMetrics;
pub use request::TokenRequest;

// self
use crate::{
	_prelude::*,
	auth::{ClientName, Subject, TokenRecord, UserId},
	cache::{CacheKey, FlightGroup, TokenCache},
	config::TokenManagementOptions,
	endpoint::{TokenEndpoint, TokenGrant},
	error::{ConfigError, EndpointError},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	provisioning::request::ResolvedRequest,
};

/// Hands out valid access tokens, renewing them through the token endpoint when needed.
///
/// Cloning is cheap; clones share the cache, the endpoint client, the flight group, and the
/// counters.
#[derive(Clone)]
pub struct TokenService {
	cache: Arc<dyn TokenCache>,
	endpoint: Arc<dyn TokenEndpoint>,
	options: Arc<TokenManagementOptions>,
	flights: FlightGroup,
	metrics: Arc<ProvisioningMetrics>,
}
impl TokenService {
	/// Creates a service over the provided cache and endpoint client.
	pub fn new(
		options: TokenManagementOptions,
		cache: Arc<dyn TokenCache>,
		endpoint: Arc<dyn TokenEndpoint>,
	) -> Result<Self, ConfigError> {
		options.validate()?;

		Ok(Self {
			cache,
			endpoint,
			options: Arc::new(options),
			flights: FlightGroup::default(),
			metrics: Default::default(),
		})
	}

	/// Options the service was built with.
	pub fn options(&self) -> &TokenManagementOptions {
		&self.options
	}

	/// Provisioning counters.
	pub fn metrics(&self) -> &ProvisioningMetrics {
		&self.metrics
	}

	/// Cache key `request` resolves to.
	pub fn key_for(&self, request: TokenRequest) -> Result<CacheKey> {
		Ok(request.resolve(&self.options)?.key)
	}

	/// Returns a token for `request`, renewing it when it is missing or about to expire.
	pub async fn get_token(&self, request: TokenRequest) -> Result<TokenRecord> {
		let target = request.resolve(&self.options)?;

		if !target.force {
			let now = OffsetDateTime::now_utc();
			let cached = self.cache.get(&target.key).await?;

			if let Some(record) = cached.filter(|record| !target.needs_refresh(record, now)) {
				self.metrics.record_cache_hit();

				return Ok(record);
			}
		}

		let key = target.key.clone();
		let service = self.clone();
		let boarding = self.flights.join(&key, move || service.renew(target));

		if !boarding.is_leader() {
			self.metrics.record_coalesced();
		}

		boarding.wait().await
	}

	/// App-only token for the named client.
	pub async fn client_access_token(&self, client: &ClientName) -> Result<TokenRecord> {
		self.get_token(TokenRequest::for_client(client.clone())).await
	}

	/// Delegated token for `user`, refreshed through the configured user client.
	pub async fn user_access_token(&self, user: &UserId) -> Result<TokenRecord> {
		self.get_token(TokenRequest::for_user(user.clone())).await
	}

	/// Stores the token a user obtained by signing in, making it available to
	/// [`user_access_token`](Self::user_access_token).
	///
	/// A refresh already in flight for the same user lands first; the new grant then replaces
	/// whatever it produced.
	pub async fn store_user_token(&self, user: UserId, grant: TokenGrant) -> Result<TokenRecord> {
		let target = TokenRequest::for_user(user).resolve(&self.options)?;

		if let Some(boarding) = self.flights.board(&target.key) {
			// Superseded by the new grant whatever the outcome.
			let _ = boarding.wait().await;
		}

		let record = grant.into_record(
			target.client,
			target.subject,
			target.scope,
			OffsetDateTime::now_utc(),
			None,
		)?;

		self.cache.set(target.key, record.clone()).await?;

		Ok(record)
	}

	/// Drops the cached token stored under `key`.
	pub async fn invalidate(&self, key: &CacheKey) -> Result<Option<TokenRecord>> {
		Ok(self.cache.invalidate(key).await?)
	}

	/// Drops `user`'s cached token, e.g. on sign-out.
	pub async fn invalidate_user(&self, user: &UserId) -> Result<Option<TokenRecord>> {
		let key = self.key_for(TokenRequest::for_user(user.clone()))?;

		self.invalidate(&key).await
	}

	async fn renew(self, target: ResolvedRequest) -> Result<TokenRecord> {
		let kind = match target.subject {
			Subject::Client => FlowKind::ClientCredentials,
			Subject::User(_) => FlowKind::Refresh,
		};
		let span = FlowSpan::renewal(kind, &target.key);
		let deadline = self.options.renewal_timeout;
		let started = std::time::Instant::now();

		obs::record_flow_outcome(kind, FlowOutcome::Attempt);

		let result = span
			.instrument(tokio::time::timeout(deadline.unsigned_abs(), self.renew_inner(&target)))
			.await
			.unwrap_or_else(|_| {
				Err(EndpointError::Unavailable {
					message: format!("renewal did not finish within {deadline}"),
					status: None,
					retry_after: None,
				}
				.into())
			});

		obs::record_renewal_latency(kind, started.elapsed());

		match &result {
			Ok(_) => obs::record_flow_outcome(kind, FlowOutcome::Success),
			Err(e) => {
				self.metrics.record_failure();
				obs::record_flow_outcome(kind, FlowOutcome::Failure);

				if let Error::Protocol(_) = e {
					obs::log_protocol_error(kind, &target.key, e);
				}
			},
		}

		result
	}

	async fn renew_inner(&self, target: &ResolvedRequest) -> Result<TokenRecord> {
		let current = self.cache.get(&target.key).await?;

		if let Some(record) = current
			.as_ref()
			.filter(|record| !target.needs_refresh(record, OffsetDateTime::now_utc()))
		{
			return Ok(record.clone());
		}

		let result = match target.subject {
			Subject::Client => self.acquire_client_token(target).await,
			Subject::User(_) => self.refresh_user_token(target, current).await,
		};

		let evicted = match &result {
			Err(Error::InvalidGrant { .. }) => self.cache.invalidate(&target.key).await.map(drop),
			_ => Ok(()),
		};

		// The rejection is what callers see; a failed eviction is only reported.
		if let Err(e) = evicted {
			obs::log_eviction_failure(&target.key, &e);
			obs::record_eviction_failure();
		}

		result
	}
}
impl Debug for TokenService {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenService")
			.field("clients", &self.options.clients.keys().collect::<Vec<_>>())
			.field("flights", &self.flights)
			.field("metrics", &self.metrics)
			.finish()
	}
}
