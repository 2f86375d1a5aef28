//! Options consumed by the composition root.
//!
//! Options are read once at startup, validated, and treated as read-only afterwards. They can be
//! assembled in code through [`TokenManagementOptions::builder`] or loaded from JSON with
//! [`TokenManagementOptions::from_json_str`]; both paths run the same validation.

// self
use crate::{
	_prelude::*,
	auth::{ClientName, ScopeSet, TokenSecret},
	error::ConfigError,
};

const DEFAULT_EXPIRY_SKEW_SECS: i64 = 60;
const DEFAULT_RENEWAL_TIMEOUT_SECS: i64 = 30;

/// Errors raised while validating or loading options.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum OptionsError {
	/// Token endpoints must use HTTPS.
	#[error("Token endpoint for client `{client}` must use HTTPS: {url}.")]
	InsecureTokenEndpoint {
		/// Client whose endpoint failed validation.
		client: String,
		/// Endpoint URL that failed validation.
		url: String,
	},
	/// OAuth client identifiers must not be blank.
	#[error("Client `{client}` has an empty client_id.")]
	EmptyClientId {
		/// Client whose identifier is blank.
		client: String,
	},
	/// Expiry skew cannot be negative.
	#[error("Expiry skew must not be negative.")]
	NegativeExpirySkew,
	/// Acquisition timeout must be strictly positive.
	#[error("Acquire timeout must be positive.")]
	NonPositiveAcquireTimeout,
	/// Renewal deadline must be strictly positive.
	#[error("Renewal timeout must be positive.")]
	NonPositiveRenewalTimeout,
	/// User tokens must be refreshed through a configured client.
	#[error("User token client `{client}` is not configured.")]
	UnknownUserClient {
		/// Client named by the user options.
		client: String,
	},
	/// JSON input could not be decoded.
	#[error("Options JSON is invalid at `{path}`: {message}.")]
	Json {
		/// Path to the offending field.
		path: String,
		/// Decoder message.
		message: String,
	},
}

/// How a client authenticates to the token endpoint.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientAuthMethod {
	#[default]
	/// HTTP Basic with `client_id`/`client_secret`.
	ClientSecretBasic,
	/// Form body parameters for `client_id`/`client_secret`.
	ClientSecretPost,
	/// Public client; only `client_id` is sent.
	None,
}

/// Credentials and endpoint of one named OAuth client.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientCredentials {
	/// OAuth `client_id`.
	pub client_id: String,
	/// OAuth `client_secret`; ignored for [`ClientAuthMethod::None`].
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub client_secret: Option<TokenSecret>,
	/// Token endpoint URL.
	pub token_endpoint: Url,
	/// Scope requested when a request does not override it.
	#[serde(default)]
	pub scope: ScopeSet,
	/// Client authentication method.
	#[serde(default)]
	pub auth_method: ClientAuthMethod,
	/// Extra form parameters sent with every token request (`audience`, `resource`, ...).
	#[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
	pub extra_params: BTreeMap<String, String>,
}
impl ClientCredentials {
	/// Creates credentials for a public client; chain the setters to fill in the rest.
	pub fn new(client_id: impl Into<String>, token_endpoint: Url) -> Self {
		Self {
			client_id: client_id.into(),
			client_secret: None,
			token_endpoint,
			scope: ScopeSet::default(),
			auth_method: ClientAuthMethod::default(),
			extra_params: BTreeMap::new(),
		}
	}

	/// Sets the client secret.
	pub fn client_secret(mut self, secret: impl Into<String>) -> Self {
		self.client_secret = Some(TokenSecret::new(secret));

		self
	}

	/// Sets the default scope.
	pub fn scope(mut self, scope: ScopeSet) -> Self {
		self.scope = scope;

		self
	}

	/// Sets the client authentication method.
	pub fn auth_method(mut self, method: ClientAuthMethod) -> Self {
		self.auth_method = method;

		self
	}

	/// Adds an extra form parameter.
	pub fn extra_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.extra_params.insert(key.into(), value.into());

		self
	}

	fn validate(&self, name: &ClientName) -> Result<(), OptionsError> {
		if self.client_id.trim().is_empty() {
			return Err(OptionsError::EmptyClientId { client: name.to_string() });
		}
		if self.token_endpoint.scheme() != "https" {
			return Err(OptionsError::InsecureTokenEndpoint {
				client: name.to_string(),
				url: self.token_endpoint.to_string(),
			});
		}

		Ok(())
	}
}

/// Settings for user-delegated tokens.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserTokenOptions {
	/// Named client used for `refresh_token` grants.
	#[serde(default)]
	pub client: ClientName,
	/// Scope user tokens are cached and refreshed under.
	#[serde(default)]
	pub scope: ScopeSet,
}

/// Options for the whole token management stack.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenManagementOptions {
	/// Named OAuth clients.
	#[serde(default)]
	pub clients: BTreeMap<ClientName, ClientCredentials>,
	/// User token settings.
	#[serde(default)]
	pub user: UserTokenOptions,
	/// Tokens are refreshed once their remaining lifetime is at or below this margin.
	#[serde(default = "default_expiry_skew", with = "seconds")]
	pub expiry_skew: Duration,
	/// Upper bound a decorated request waits for a token; unbounded when absent.
	#[serde(default, with = "optional_seconds", skip_serializing_if = "Option::is_none")]
	pub acquire_timeout: Option<Duration>,
	/// Deadline for one renewal, after which its waiters get a transient failure and the key
	/// becomes renewable again.
	#[serde(default = "default_renewal_timeout", with = "seconds")]
	pub renewal_timeout: Duration,
}
impl TokenManagementOptions {
	/// Returns a builder seeded with the defaults.
	pub fn builder() -> TokenManagementOptionsBuilder {
		TokenManagementOptionsBuilder::default()
	}

	/// Decodes and validates options from JSON.
	pub fn from_json_str(json: &str) -> Result<Self, OptionsError> {
		let de = &mut serde_json::Deserializer::from_str(json);
		let options: Self = serde_path_to_error::deserialize(de).map_err(|e| OptionsError::Json {
			path: e.path().to_string(),
			message: e.inner().to_string(),
		})?;

		options.validate()?;

		Ok(options)
	}

	/// Checks the option invariants.
	pub fn validate(&self) -> Result<(), OptionsError> {
		for (name, credentials) in &self.clients {
			credentials.validate(name)?;
		}

		if self.expiry_skew.is_negative() {
			return Err(OptionsError::NegativeExpirySkew);
		}
		if self.acquire_timeout.is_some_and(|timeout| !timeout.is_positive()) {
			return Err(OptionsError::NonPositiveAcquireTimeout);
		}
		if !self.renewal_timeout.is_positive() {
			return Err(OptionsError::NonPositiveRenewalTimeout);
		}
		if !self.clients.is_empty() && !self.clients.contains_key(&self.user.client) {
			return Err(OptionsError::UnknownUserClient { client: self.user.client.to_string() });
		}

		Ok(())
	}

	/// Looks up the credentials registered under `name`.
	pub fn credentials(&self, name: &ClientName) -> Result<&ClientCredentials, ConfigError> {
		self.clients
			.get(name)
			.ok_or_else(|| ConfigError::UnknownClient { client: name.to_string() })
	}
}
impl Default for TokenManagementOptions {
	fn default() -> Self {
		Self {
			clients: BTreeMap::new(),
			user: UserTokenOptions::default(),
			expiry_skew: default_expiry_skew(),
			acquire_timeout: None,
			renewal_timeout: default_renewal_timeout(),
		}
	}
}

/// Builder for [`TokenManagementOptions`].
#[derive(Clone, Debug, Default)]
pub struct TokenManagementOptionsBuilder {
	options: TokenManagementOptions,
}
impl TokenManagementOptionsBuilder {
	/// Registers (or replaces) a named client.
	pub fn client(mut self, name: ClientName, credentials: ClientCredentials) -> Self {
		self.options.clients.insert(name, credentials);

		self
	}

	/// Selects the client used to refresh user tokens.
	pub fn user_client(mut self, name: ClientName) -> Self {
		self.options.user.client = name;

		self
	}

	/// Sets the scope user tokens are refreshed under.
	pub fn user_scope(mut self, scope: ScopeSet) -> Self {
		self.options.user.scope = scope;

		self
	}

	/// Overrides the default 60 second expiry skew.
	pub fn expiry_skew(mut self, skew: Duration) -> Self {
		self.options.expiry_skew = skew;

		self
	}

	/// Bounds how long a decorated request waits for a token.
	pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
		self.options.acquire_timeout = Some(timeout);

		self
	}

	/// Overrides the default 30 second renewal deadline.
	pub fn renewal_timeout(mut self, timeout: Duration) -> Self {
		self.options.renewal_timeout = timeout;

		self
	}

	/// Validates and returns the options.
	pub fn build(self) -> Result<TokenManagementOptions, OptionsError> {
		self.options.validate()?;

		Ok(self.options)
	}
}

fn default_expiry_skew() -> Duration {
	Duration::seconds(DEFAULT_EXPIRY_SKEW_SECS)
}

fn default_renewal_timeout() -> Duration {
	Duration::seconds(DEFAULT_RENEWAL_TIMEOUT_SECS)
}

mod seconds {
	// crates.io
	use serde::{Deserializer, Serializer};
	// self
	use crate::_prelude::*;

	pub fn serialize<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_i64(value.whole_seconds())
	}

	pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
	where
		D: Deserializer<'de>,
	{
		i64::deserialize(deserializer).map(Duration::seconds)
	}
}

mod optional_seconds {
	// crates.io
	use serde::{Deserializer, Serializer};
	// self
	use crate::_prelude::*;

	pub fn serialize<S>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		match value {
			Some(duration) => serializer.serialize_some(&duration.whole_seconds()),
			None => serializer.serialize_none(),
		}
	}

	pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
	where
		D: Deserializer<'de>,
	{
		Ok(<Option<i64>>::deserialize(deserializer)?.map(Duration::seconds))
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn name(value: &str) -> ClientName {
		ClientName::new(value).expect("Client fixture should be valid.")
	}

	fn credentials(endpoint: &str) -> ClientCredentials {
		ClientCredentials::new(
			"svc1-id",
			Url::parse(endpoint).expect("Endpoint fixture should parse."),
		)
		.client_secret("svc1-secret")
		.scope(ScopeSet::new(["read"]).expect("Scope fixture should be valid."))
	}

	#[test]
	fn defaults_use_sixty_second_skew() {
		let options = TokenManagementOptions::default();

		assert_eq!(options.expiry_skew, Duration::seconds(60));
		assert!(options.acquire_timeout.is_none());
		assert_eq!(options.renewal_timeout, Duration::seconds(30));
		assert_eq!(options.user.client, ClientName::default());
		assert!(options.validate().is_ok());
	}

	#[test]
	fn builder_rejects_plain_http_endpoints() {
		let err = TokenManagementOptions::builder()
			.client(name("svc1"), credentials("http://idp.example.com/token"))
			.user_client(name("svc1"))
			.build()
			.expect_err("Plain HTTP endpoints must be rejected.");

		assert!(matches!(
			err,
			OptionsError::InsecureTokenEndpoint { ref client, .. } if client == "svc1"
		));
	}

	#[test]
	fn builder_checks_skew_timeout_and_user_client() {
		let base = TokenManagementOptions::builder()
			.client(name("svc1"), credentials("https://idp.example.com/token"));

		assert_eq!(
			base.clone().user_client(name("svc1")).expiry_skew(Duration::seconds(-1)).build(),
			Err(OptionsError::NegativeExpirySkew)
		);
		assert_eq!(
			base.clone().user_client(name("svc1")).acquire_timeout(Duration::ZERO).build(),
			Err(OptionsError::NonPositiveAcquireTimeout)
		);
		assert_eq!(
			base.clone().user_client(name("svc1")).renewal_timeout(Duration::seconds(-3)).build(),
			Err(OptionsError::NonPositiveRenewalTimeout)
		);
		assert_eq!(
			base.clone().build(),
			Err(OptionsError::UnknownUserClient { client: "default".into() })
		);
		assert!(base.user_client(name("svc1")).build().is_ok());
	}

	#[test]
	fn blank_client_id_is_rejected() {
		let mut creds = credentials("https://idp.example.com/token");

		creds.client_id = "  ".into();

		assert_eq!(
			TokenManagementOptions::builder().client(name("default"), creds).build(),
			Err(OptionsError::EmptyClientId { client: "default".into() })
		);
	}

	#[test]
	fn json_options_round_out_defaults() {
		let options = TokenManagementOptions::from_json_str(
			r#"{
				"clients": {
					"svc1": {
						"client_id": "svc1-id",
						"client_secret": "svc1-secret",
						"token_endpoint": "https://idp.example.com/token",
						"scope": ["read"],
						"auth_method": "client_secret_post",
						"extra_params": { "audience": "api" }
					}
				},
				"user": { "client": "svc1", "scope": ["openid", "api"] },
				"acquire_timeout": 5,
				"renewal_timeout": 10
			}"#,
		)
		.expect("JSON options should load.");
		let svc1 = options.credentials(&name("svc1")).expect("svc1 should be configured.");

		assert_eq!(svc1.auth_method, ClientAuthMethod::ClientSecretPost);
		assert_eq!(svc1.extra_params.get("audience").map(String::as_str), Some("api"));
		assert_eq!(svc1.client_secret.as_ref().map(TokenSecret::expose), Some("svc1-secret"));
		assert_eq!(options.expiry_skew, Duration::seconds(60));
		assert_eq!(options.acquire_timeout, Some(Duration::seconds(5)));
		assert_eq!(options.renewal_timeout, Duration::seconds(10));
		assert_eq!(options.user.scope.normalized(), "api openid");
		assert!(matches!(
			options.credentials(&name("svc2")),
			Err(ConfigError::UnknownClient { ref client }) if client == "svc2"
		));
	}

	#[test]
	fn json_errors_report_the_failing_path() {
		let err = TokenManagementOptions::from_json_str(
			r#"{ "clients": { "svc1": { "client_id": "x", "token_endpoint": 7 } } }"#,
		)
		.expect_err("Numeric endpoints must be rejected.");

		assert!(matches!(
			err,
			OptionsError::Json { ref path, .. } if path.contains("token_endpoint")
		));
	}
}
