//! Relay-level error types shared by the cache, endpoint client, provisioning service, and
//! decorator.
//!
//! Every type here is [`Clone`] so a single failed refresh can be handed to every caller that
//! was coalesced onto it. Foreign error sources are therefore kept behind [`Arc`].

// self
use crate::_prelude::*;

/// Relay-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type SharedError = Arc<dyn StdError + Send + Sync>;

/// Canonical relay error exposed by public APIs.
#[derive(Clone, Debug, ThisError)]
pub enum Error {
	/// Cache backend failure.
	#[error("{0}")]
	Cache(
		#[from]
		#[source]
		crate::cache::CacheError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Temporary token endpoint failure; a later retry may succeed.
	#[error(transparent)]
	Endpoint(#[from] EndpointError),
	/// Token endpoint answered with something that is not a valid token response.
	#[error(transparent)]
	Protocol(#[from] ProtocolError),

	/// Token endpoint rejected the grant (revoked or expired refresh token, unknown user).
	///
	/// Terminal for the grant in use: the user has to re-authenticate upstream.
	#[error("Token endpoint rejected the grant: {reason}.")]
	InvalidGrant {
		/// Endpoint- or relay-supplied reason string.
		reason: String,
	},
	/// Client authentication failed or credentials are malformed.
	#[error("Client authentication failed: {reason}.")]
	InvalidClient {
		/// Endpoint-supplied reason string.
		reason: String,
	},
	/// Requested scopes exceed what the client may obtain.
	#[error("Token lacks the required scopes: {reason}.")]
	InsufficientScope {
		/// Endpoint-supplied reason string.
		reason: String,
	},
	/// A renewal task ended without producing a token (it panicked or its runtime shut down).
	#[error("Token renewal stopped before finishing: {reason}.")]
	RenewalAborted {
		/// Runtime-supplied description of how the task ended.
		reason: String,
	},
	/// The caller stopped waiting for a token.
	#[error("Gave up waiting for an access token after {waited}.")]
	Timeout {
		/// How long the caller waited.
		waited: Duration,
	},
}
impl Error {
	/// Returns `true` when the failure is worth retrying later.
	pub fn is_transient(&self) -> bool {
		matches!(self, Self::Endpoint(_) | Self::Timeout { .. })
	}
}

/// Configuration and wiring failures.
#[derive(Clone, Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying builder failure.
		#[source]
		source: SharedError,
	},
	/// Token request could not be turned into an HTTP request.
	#[error("Token request could not be built.")]
	HttpRequest {
		/// Underlying `http` failure.
		#[source]
		source: Arc<oauth2::http::Error>,
	},
	/// Token endpoint URL was rejected by the OAuth client.
	#[error("Token endpoint URL is invalid.")]
	InvalidTokenEndpoint {
		/// Underlying parsing failure.
		#[source]
		source: oauth2::url::ParseError,
	},
	/// Options failed validation.
	#[error(transparent)]
	Options(#[from] crate::config::OptionsError),

	/// A request referenced a client name that is not configured.
	#[error("No client named `{client}` is configured.")]
	UnknownClient {
		/// Requested client name.
		client: String,
	},
	/// Cached user token carries no refresh token.
	#[error("Cached token record is missing a refresh token.")]
	MissingRefreshToken,
	/// Request scopes cannot be normalized.
	#[error("Requested scopes are invalid.")]
	InvalidScope(#[from] crate::auth::ScopeValidationError),
	/// Token record builder validation failed.
	#[error("Unable to build token record.")]
	TokenBuild(#[from] crate::auth::TokenRecordBuilderError),
}
impl ConfigError {
	/// Wraps an HTTP client builder failure.
	pub fn http_client_build(src: impl 'static + Send + Sync + StdError) -> Self {
		Self::HttpClientBuild { source: Arc::new(src) }
	}
}
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}
impl From<oauth2::http::Error> for ConfigError {
	fn from(e: oauth2::http::Error) -> Self {
		Self::HttpRequest { source: Arc::new(e) }
	}
}

/// Transient token endpoint failures (safe to retry later).
#[derive(Clone, Debug, ThisError)]
pub enum EndpointError {
	/// Endpoint was reachable but could not serve the request (5xx, 429, timeouts).
	#[error("Token endpoint is unavailable: {message}.")]
	Unavailable {
		/// Relay-supplied summary of the failure.
		message: String,
		/// HTTP status code, when available.
		status: Option<u16>,
		/// Retry-After hint from the endpoint, if supplied.
		retry_after: Option<Duration>,
	},
	/// Network failure (DNS, TCP, TLS) before a response arrived.
	#[error("Network error occurred while calling the token endpoint.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: SharedError,
	},
}
impl EndpointError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + StdError) -> Self {
		Self::Network { source: Arc::new(src) }
	}

	/// HTTP status associated with the failure, if any.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::Unavailable { status, .. } => *status,
			Self::Network { .. } => None,
		}
	}
}
impl From<ReqwestError> for EndpointError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}
impl From<std::io::Error> for EndpointError {
	fn from(e: std::io::Error) -> Self {
		Self::network(e)
	}
}

/// Malformed or inconsistent token endpoint responses.
#[derive(Clone, Debug, ThisError)]
pub enum ProtocolError {
	/// Response body was not a parseable token response.
	#[error("Token endpoint returned malformed JSON.")]
	MalformedJson {
		/// Structured parsing failure.
		#[source]
		source: Arc<serde_path_to_error::Error<serde_json::Error>>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// Response omitted `expires_in`.
	#[error("Token endpoint response is missing expires_in.")]
	MissingExpiresIn,
	/// Response carried an excessively large `expires_in`.
	#[error("The expires_in value exceeds the supported range.")]
	ExpiresInOutOfRange,
	/// Response carried a non-positive `expires_in`.
	#[error("The expires_in value must be positive.")]
	NonPositiveExpiresIn,
	/// Endpoint granted a different scope set than the one requested.
	#[error("Token endpoint changed scopes during the {grant} grant.")]
	ScopesChanged {
		/// Grant label.
		grant: &'static str,
	},
	/// Endpoint returned scope values that cannot be normalized.
	#[error("Token endpoint returned invalid scopes.")]
	InvalidScope(#[from] crate::auth::ScopeValidationError),
	/// Anything else the OAuth client could not interpret.
	#[error("Token endpoint returned an unexpected response: {message}.")]
	Unexpected {
		/// Summary of the unexpected payload.
		message: String,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
}
