//! Request decorator that attaches bearer tokens to outgoing requests.
//!
//! [`BearerTokenMiddleware`] plugs into a [`reqwest_middleware::ClientWithMiddleware`]. For every
//! request it asks the [`TokenService`] for a token and sets `Authorization: Bearer <token>`.
//! When no token can be obtained in time the request is still sent, unmodified, so the remote
//! server's `401` reaches the caller instead of a relay error.

// crates.io
use oauth2::http::Extensions;
use reqwest::{
	Request, Response,
	header::{AUTHORIZATION, HeaderValue},
};
use reqwest_middleware::{Middleware, Next};
// self
use crate::{
	_prelude::*,
	auth::{ClientName, ScopeSet, TokenRecord, UserId},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	provisioning::{TokenRequest, TokenService},
};

/// Which token a decorated client sends.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TokenSource {
	/// App-only token of the named client.
	Client(ClientName),
	/// Token of the user named by the request's [`UserContext`].
	User,
}
impl Display for TokenSource {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match self {
			Self::Client(name) => write!(f, "client:{name}"),
			Self::User => f.write_str("user"),
		}
	}
}

/// Request extension naming the user a [`TokenSource::User`] request acts for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserContext(pub UserId);

/// Request extension overriding how long this request waits for a token.
///
/// Negative limits count as zero.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AcquireTimeout(pub Duration);

/// Why a request goes out without a token.
#[derive(Debug)]
enum Undecorated {
	MissingUserContext,
	HeaderValue,
	Token(Error),
}
impl Display for Undecorated {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match self {
			Self::MissingUserContext => f.write_str("request carries no user context"),
			Self::HeaderValue => f.write_str("access token is not a valid header value"),
			Self::Token(e) => Display::fmt(e, f),
		}
	}
}

/// Middleware attaching `Authorization: Bearer <token>`.
#[derive(Clone, Debug)]
pub struct BearerTokenMiddleware {
	service: TokenService,
	source: TokenSource,
	scope: Option<ScopeSet>,
	timeout: Option<Duration>,
}
impl BearerTokenMiddleware {
	/// Creates a decorator for `source`, bounded by the service's acquire timeout.
	pub fn new(service: TokenService, source: TokenSource) -> Self {
		let timeout = service.options().acquire_timeout;

		Self { service, source, scope: None, timeout }
	}

	/// Decorator sending the named client's app-only token.
	pub fn for_client(service: TokenService, client: ClientName) -> Self {
		Self::new(service, TokenSource::Client(client))
	}

	/// Decorator sending the current user's token.
	pub fn for_user(service: TokenService) -> Self {
		Self::new(service, TokenSource::User)
	}

	/// Requests `scope` instead of the configured default.
	pub fn with_scope(mut self, scope: ScopeSet) -> Self {
		self.scope = Some(scope);

		self
	}

	/// Overrides the acquisition timeout; negative values count as zero.
	pub fn with_timeout(mut self, timeout: Duration) -> Self {
		self.timeout = Some(timeout.max(Duration::ZERO));

		self
	}

	/// Token source of this decorator.
	pub fn source(&self) -> &TokenSource {
		&self.source
	}

	async fn token(&self, extensions: &Extensions) -> Result<TokenRecord, Undecorated> {
		let request = match &self.source {
			TokenSource::Client(client) => TokenRequest::for_client(client.clone()),
			TokenSource::User => {
				let UserContext(user) =
					extensions.get::<UserContext>().ok_or(Undecorated::MissingUserContext)?;

				TokenRequest::for_user(user.clone())
			},
		};
		let request = match &self.scope {
			Some(scope) => request.with_scope(scope.clone()),
			None => request,
		};
		let timeout = extensions
			.get::<AcquireTimeout>()
			.map(|AcquireTimeout(limit)| (*limit).max(Duration::ZERO))
			.or(self.timeout);
		let pending = self.service.get_token(request);
		let result = match timeout {
			Some(limit) => tokio::time::timeout(limit.unsigned_abs(), pending)
				.await
				.unwrap_or(Err(Error::Timeout { waited: limit })),
			None => pending.await,
		};

		result.map_err(Undecorated::Token)
	}
}
#[async_trait::async_trait]
impl Middleware for BearerTokenMiddleware {
	async fn handle(
		&self,
		mut req: Request,
		extensions: &mut Extensions,
		next: Next<'_>,
	) -> reqwest_middleware::Result<Response> {
		const KIND: FlowKind = FlowKind::Decorate;

		let span = FlowSpan::decoration(&self.source);

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let header = span.instrument(self.token(extensions)).await.and_then(|record| {
			let mut value =
				HeaderValue::from_str(&format!("Bearer {}", record.access_token.expose()))
					.map_err(|_| Undecorated::HeaderValue)?;

			value.set_sensitive(true);

			Ok(value)
		});

		match header {
			Ok(value) => {
				req.headers_mut().insert(AUTHORIZATION, value);
				obs::record_flow_outcome(KIND, FlowOutcome::Success);
			},
			Err(reason) => {
				obs::log_undecorated(&self.source, &reason);
				obs::record_flow_outcome(KIND, FlowOutcome::Failure);
			},
		}

		next.run(req, extensions).await
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use httpmock::prelude::*;
	use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
	// self
	use super::*;
	use crate::{_preludet::*, cache::MemoryCache, endpoint::TokenGrant};

	fn service(endpoint: &Arc<FakeEndpoint>) -> TokenService {
		TokenService::new(
			test_options("https://idp.example.com/token"),
			Arc::new(MemoryCache::default()),
			endpoint.clone(),
		)
		.expect("Service fixture should build.")
	}

	fn client(middleware: BearerTokenMiddleware) -> ClientWithMiddleware {
		ClientBuilder::new(test_reqwest_client()).with(middleware).build()
	}

	#[tokio::test]
	async fn client_token_replaces_existing_authorization() {
		let server = MockServer::start_async().await;
		let api = server
			.mock_async(|when, then| {
				when.method(GET).path("/api").header("authorization", "Bearer svc1-token");
				then.status(200);
			})
			.await;
		let endpoint = Arc::new(FakeEndpoint::default());

		endpoint.push_acquire(Ok(TokenGrant::new("svc1-token", Duration::seconds(3600))));

		let http = client(BearerTokenMiddleware::for_client(
			service(&endpoint),
			test_client_name("svc1"),
		));
		let response = http
			.get(server.url("/api"))
			.header("authorization", "Bearer stale")
			.send()
			.await
			.expect("Decorated request should be sent.");

		assert_eq!(response.status().as_u16(), 200);
		api.assert_async().await;
	}

	#[tokio::test]
	async fn failed_acquisition_forwards_the_request_unmodified() {
		let server = MockServer::start_async().await;
		let api = server
			.mock_async(|when, then| {
				when.method(GET).path("/api").header_missing("authorization");
				then.status(401);
			})
			.await;
		let endpoint = Arc::new(FakeEndpoint::default());

		endpoint.push_acquire(Err(Error::InvalidClient { reason: "bad secret".into() }));

		let http = client(BearerTokenMiddleware::for_client(
			service(&endpoint),
			test_client_name("svc1"),
		));
		let response =
			http.get(server.url("/api")).send().await.expect("Request should still be sent.");

		assert_eq!(response.status().as_u16(), 401);
		api.assert_async().await;
	}

	#[tokio::test]
	async fn slow_acquisition_times_out_and_forwards() {
		let server = MockServer::start_async().await;
		let api = server
			.mock_async(|when, then| {
				when.method(GET).path("/api").header_missing("authorization");
				then.status(401);
			})
			.await;
		let endpoint = Arc::new(FakeEndpoint::default().with_delay(2_000));

		endpoint.push_acquire(Ok(TokenGrant::new("too-late", Duration::seconds(3600))));

		let http = client(BearerTokenMiddleware::for_client(
			service(&endpoint),
			test_client_name("svc1"),
		));
		let started = std::time::Instant::now();
		let response = http
			.get(server.url("/api"))
			.with_extension(AcquireTimeout(Duration::milliseconds(50)))
			.send()
			.await
			.expect("Request should be forwarded after the timeout.");

		assert_eq!(response.status().as_u16(), 401);
		assert!(started.elapsed() < std::time::Duration::from_millis(1_500));
		api.assert_async().await;
	}

	#[tokio::test]
	async fn negative_timeout_gives_up_at_once() {
		let server = MockServer::start_async().await;
		let api = server
			.mock_async(|when, then| {
				when.method(GET).path("/api").header_missing("authorization");
				then.status(401);
			})
			.await;
		let endpoint = Arc::new(FakeEndpoint::default().with_delay(1_000));

		endpoint.push_acquire(Ok(TokenGrant::new("in-time-if-waited", Duration::seconds(3600))));

		let http = client(BearerTokenMiddleware::for_client(
			service(&endpoint),
			test_client_name("svc1"),
		));
		let started = std::time::Instant::now();
		let response = http
			.get(server.url("/api"))
			.with_extension(AcquireTimeout(Duration::seconds(-5)))
			.send()
			.await
			.expect("Request should be forwarded without waiting.");

		assert_eq!(response.status().as_u16(), 401);
		assert!(started.elapsed() < std::time::Duration::from_millis(800));
		api.assert_async().await;

		let clamped =
			BearerTokenMiddleware::for_user(service(&endpoint)).with_timeout(Duration::minutes(-1));

		assert_eq!(clamped.timeout, Some(Duration::ZERO));
	}

	#[tokio::test]
	async fn user_token_follows_the_request_context() {
		let server = MockServer::start_async().await;
		let with_token = server
			.mock_async(|when, then| {
				when.method(GET).path("/me").header("authorization", "Bearer alice-token");
				then.status(200);
			})
			.await;
		let without_token = server
			.mock_async(|when, then| {
				when.method(GET).path("/me").header_missing("authorization");
				then.status(401);
			})
			.await;
		let endpoint = Arc::new(FakeEndpoint::default());
		let service = service(&endpoint);
		let alice = UserId::new("alice").expect("User fixture should be valid.");

		service
			.store_user_token(
				alice.clone(),
				TokenGrant::new("alice-token", Duration::seconds(3600)).with_refresh_token("rt"),
			)
			.await
			.expect("Seeding the user token should succeed.");

		let http = client(BearerTokenMiddleware::for_user(service));
		let signed_in = http
			.get(server.url("/me"))
			.with_extension(UserContext(alice))
			.send()
			.await
			.expect("User request should be sent.");
		let anonymous =
			http.get(server.url("/me")).send().await.expect("Anonymous request should be sent.");

		assert_eq!(signed_in.status().as_u16(), 200);
		assert_eq!(anonymous.status().as_u16(), 401);
		with_token.assert_async().await;
		without_token.assert_async().await;
		assert_eq!(endpoint.refresh_calls(), 0);
	}

	#[test]
	fn sources_render_for_logs() {
		assert_eq!(TokenSource::Client(test_client_name("svc1")).to_string(), "client:svc1");
		assert_eq!(TokenSource::User.to_string(), "user");
	}
}
