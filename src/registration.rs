//! Composition root: wires the cache, endpoint client, and provisioning service together and
//! hands out named HTTP clients that send access tokens automatically.

// crates.io
use reqwest::ClientBuilder as ReqwestClientBuilder;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
// self
use crate::{
	_prelude::*,
	auth::ClientName,
	cache::{MemoryCache, TokenCache},
	config::TokenManagementOptions,
	decorator::BearerTokenMiddleware,
	endpoint::{OAuth2TokenEndpoint, TokenEndpoint},
	error::ConfigError,
	http::EndpointHttpClient,
	provisioning::TokenService,
};

type ClientRegistry = Arc<RwLock<HashMap<String, ClientWithMiddleware>>>;

/// Assembled token management stack plus its registry of named HTTP clients.
#[derive(Clone)]
pub struct TokenManagement {
	service: TokenService,
	clients: ClientRegistry,
}
impl TokenManagement {
	/// Starts assembling a stack from `options`.
	pub fn builder(options: TokenManagementOptions) -> TokenManagementBuilder {
		TokenManagementBuilder::new(options)
	}

	/// Provisioning service shared by every decorator this stack hands out.
	pub fn service(&self) -> &TokenService {
		&self.service
	}

	/// Decorator sending the named client's app-only token.
	pub fn client_access_token_middleware(
		&self,
		token_client: ClientName,
	) -> Result<BearerTokenMiddleware, ConfigError> {
		self.service.options().credentials(&token_client)?;

		Ok(BearerTokenMiddleware::for_client(self.service.clone(), token_client))
	}

	/// Decorator sending the current user's token.
	pub fn user_access_token_middleware(&self) -> BearerTokenMiddleware {
		BearerTokenMiddleware::for_user(self.service.clone())
	}

	/// Registers an HTTP client named `name` that sends `token_client`'s app-only token.
	pub fn add_client_access_token_client(
		&self,
		name: impl Into<String>,
		token_client: ClientName,
	) -> Result<ClientWithMiddleware, ConfigError> {
		self.add_client_access_token_client_with(name, token_client, |builder| builder)
	}

	/// Like [`add_client_access_token_client`](Self::add_client_access_token_client), with a hook
	/// to configure the underlying reqwest client.
	pub fn add_client_access_token_client_with<F>(
		&self,
		name: impl Into<String>,
		token_client: ClientName,
		configure: F,
	) -> Result<ClientWithMiddleware, ConfigError>
	where
		F: FnOnce(ReqwestClientBuilder) -> ReqwestClientBuilder,
	{
		let middleware = self.client_access_token_middleware(token_client)?;

		self.register(name.into(), middleware, configure)
	}

	/// Registers an HTTP client named `name` that sends the current user's token.
	pub fn add_user_access_token_client(
		&self,
		name: impl Into<String>,
	) -> Result<ClientWithMiddleware, ConfigError> {
		self.add_user_access_token_client_with(name, |builder| builder)
	}

	/// Like [`add_user_access_token_client`](Self::add_user_access_token_client), with a hook to
	/// configure the underlying reqwest client.
	pub fn add_user_access_token_client_with<F>(
		&self,
		name: impl Into<String>,
		configure: F,
	) -> Result<ClientWithMiddleware, ConfigError>
	where
		F: FnOnce(ReqwestClientBuilder) -> ReqwestClientBuilder,
	{
		self.register(name.into(), self.user_access_token_middleware(), configure)
	}

	/// Returns the HTTP client registered under `name`.
	pub fn http_client(&self, name: &str) -> Option<ClientWithMiddleware> {
		self.clients.read().get(name).cloned()
	}

	fn register<F>(
		&self,
		name: String,
		middleware: BearerTokenMiddleware,
		configure: F,
	) -> Result<ClientWithMiddleware, ConfigError>
	where
		F: FnOnce(ReqwestClientBuilder) -> ReqwestClientBuilder,
	{
		let base = configure(ReqwestClient::builder()).build()?;
		let client = ClientBuilder::new(base).with(middleware).build();

		self.clients.write().insert(name, client.clone());

		Ok(client)
	}
}
impl Debug for TokenManagement {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		let mut names = self.clients.read().keys().cloned().collect::<Vec<_>>();

		names.sort();

		f.debug_struct("TokenManagement")
			.field("service", &self.service)
			.field("http_clients", &names)
			.finish()
	}
}

/// Builder for [`TokenManagement`].
pub struct TokenManagementBuilder {
	options: TokenManagementOptions,
	cache: Option<Arc<dyn TokenCache>>,
	endpoint: Option<Arc<dyn TokenEndpoint>>,
	token_http_client: Option<ReqwestClient>,
}
impl TokenManagementBuilder {
	fn new(options: TokenManagementOptions) -> Self {
		Self { options, cache: None, endpoint: None, token_http_client: None }
	}

	/// Replaces the default [`MemoryCache`].
	pub fn cache(mut self, cache: Arc<dyn TokenCache>) -> Self {
		self.cache = Some(cache);

		self
	}

	/// Replaces the default [`OAuth2TokenEndpoint`].
	pub fn endpoint(mut self, endpoint: Arc<dyn TokenEndpoint>) -> Self {
		self.endpoint = Some(endpoint);

		self
	}

	/// Reqwest client the default endpoint uses for token requests; it should not follow
	/// redirects. Ignored when [`endpoint`](Self::endpoint) is set.
	pub fn token_http_client(mut self, client: ReqwestClient) -> Self {
		self.token_http_client = Some(client);

		self
	}

	/// Validates the options and assembles the stack.
	pub fn build(self) -> Result<TokenManagement, ConfigError> {
		let cache: Arc<dyn TokenCache> = match self.cache {
			Some(cache) => cache,
			None => Arc::new(MemoryCache::default()),
		};
		let endpoint: Arc<dyn TokenEndpoint> = match (self.endpoint, self.token_http_client) {
			(Some(endpoint), _) => endpoint,
			(None, Some(client)) => Arc::new(OAuth2TokenEndpoint::with_http_client(
				EndpointHttpClient::with_client(client),
			)),
			(None, None) => Arc::new(OAuth2TokenEndpoint::new()?),
		};
		let service = TokenService::new(self.options, cache, endpoint)?;

		Ok(TokenManagement { service, clients: Default::default() })
	}
}
impl Debug for TokenManagementBuilder {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenManagementBuilder")
			.field("options", &self.options)
			.field("custom_cache", &self.cache.is_some())
			.field("custom_endpoint", &self.endpoint.is_some())
			.field("custom_token_http_client", &self.token_http_client.is_some())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{_preludet::*, config::OptionsError, decorator::TokenSource};

	fn management() -> TokenManagement {
		TokenManagement::builder(test_options("https://idp.example.com/token"))
			.endpoint(Arc::new(FakeEndpoint::default()))
			.build()
			.expect("Management fixture should build.")
	}

	#[test]
	fn named_clients_are_registered_and_replaced() {
		let management = management();

		management
			.add_client_access_token_client("inventory", test_client_name("svc1"))
			.expect("Client registration should succeed.");
		management
			.add_user_access_token_client_with("profile", |builder| {
				builder.timeout(std::time::Duration::from_secs(5))
			})
			.expect("User client registration should succeed.");
		management
			.add_user_access_token_client("inventory")
			.expect("Re-registration should replace the client.");

		assert!(management.http_client("inventory").is_some());
		assert!(management.http_client("profile").is_some());
		assert!(management.http_client("billing").is_none());
		assert!(format!("{management:?}").contains("\"inventory\", \"profile\""));
	}

	#[test]
	fn unknown_token_clients_are_rejected() {
		let err = management()
			.add_client_access_token_client("billing", test_client_name("svc9"))
			.expect_err("Unknown token clients must be rejected.");

		assert!(matches!(err, ConfigError::UnknownClient { ref client } if client == "svc9"));
	}

	#[test]
	fn middleware_sources_follow_the_factory() {
		let management = management();
		let client_mw = management
			.client_access_token_middleware(test_client_name("svc1"))
			.expect("svc1 is configured.");

		assert_eq!(client_mw.source(), &TokenSource::Client(test_client_name("svc1")));
		assert_eq!(management.user_access_token_middleware().source(), &TokenSource::User);
	}

	#[test]
	fn build_validates_options() {
		let mut options = test_options("https://idp.example.com/token");

		options.expiry_skew = Duration::seconds(-1);

		let err = TokenManagement::builder(options)
			.build()
			.expect_err("Invalid options must be rejected.");

		assert!(matches!(err, ConfigError::Options(OptionsError::NegativeExpirySkew)));
	}
}
