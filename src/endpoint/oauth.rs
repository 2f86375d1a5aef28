//! [`TokenEndpoint`] implementation on top of the `oauth2` crate and reqwest.

pub use oauth2;

// crates.io
use oauth2::{
	AuthType, ClientId, ClientSecret, HttpClientError, RefreshToken, RequestTokenError, Scope,
	TokenResponse, TokenUrl,
	basic::{BasicClient, BasicErrorResponse, BasicRequestTokenError, BasicTokenResponse},
};
// self
use crate::{
	_prelude::*,
	auth::{ScopeSet, TokenSecret},
	config::{ClientAuthMethod, ClientCredentials},
	endpoint::{EndpointFuture, TokenEndpoint, TokenGrant},
	error::{ConfigError, EndpointError, ProtocolError},
	http::{EndpointHttpClient, ResponseMetadata, ResponseMetadataSlot},
};

type ConfiguredBasicClient = BasicClient<
	oauth2::EndpointNotSet,
	oauth2::EndpointNotSet,
	oauth2::EndpointNotSet,
	oauth2::EndpointNotSet,
	oauth2::EndpointSet,
>;

/// Token grants the relay performs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Grant {
	ClientCredentials,
	RefreshToken,
}
impl Grant {
	const fn as_str(self) -> &'static str {
		match self {
			Self::ClientCredentials => "client_credentials",
			Self::RefreshToken => "refresh_token",
		}
	}
}

/// Classified provider rejection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Rejection {
	InvalidGrant,
	InvalidClient,
	InsufficientScope,
	Transient,
}

/// Form-encoded token endpoint client.
///
/// The OAuth client is assembled per call from the [`ClientCredentials`] in play, so one
/// endpoint instance serves every named client.
#[derive(Clone, Debug)]
pub struct OAuth2TokenEndpoint {
	http_client: EndpointHttpClient,
}
impl OAuth2TokenEndpoint {
	/// Creates an endpoint client over a redirect-less reqwest client.
	pub fn new() -> Result<Self, ConfigError> {
		Ok(Self::with_http_client(EndpointHttpClient::new()?))
	}

	/// Creates an endpoint client over the provided transport.
	pub fn with_http_client(http_client: EndpointHttpClient) -> Self {
		Self { http_client }
	}

	fn oauth_client(credentials: &ClientCredentials) -> Result<ConfiguredBasicClient> {
		let token_url = TokenUrl::new(credentials.token_endpoint.to_string())
			.map_err(|source| ConfigError::InvalidTokenEndpoint { source })?;
		let mut client = BasicClient::new(ClientId::new(credentials.client_id.clone()))
			.set_token_uri(token_url);

		match credentials.auth_method {
			ClientAuthMethod::None => {},
			method => {
				if let Some(secret) = &credentials.client_secret {
					client =
						client.set_client_secret(ClientSecret::new(secret.expose().to_owned()));
				}
				if method == ClientAuthMethod::ClientSecretPost {
					client = client.set_auth_type(AuthType::RequestBody);
				}
			},
		}

		Ok(client)
	}
}
impl TokenEndpoint for OAuth2TokenEndpoint {
	fn acquire<'a>(
		&'a self,
		credentials: &'a ClientCredentials,
		scope: &'a ScopeSet,
	) -> EndpointFuture<'a, TokenGrant> {
		Box::pin(async move {
			let oauth_client = Self::oauth_client(credentials)?;
			let meta = ResponseMetadataSlot::default();
			let handle = self.http_client.metered(meta.clone());
			let mut request = oauth_client.exchange_client_credentials();

			for value in scope.iter() {
				request = request.add_scope(Scope::new(value.to_owned()));
			}
			for (key, value) in &credentials.extra_params {
				request = request.add_extra_param(key.as_str(), value.as_str());
			}

			let response = request
				.request_async(&handle)
				.await
				.map_err(|e| map_request_error(e, meta.take()))?;

			grant_from_response(Grant::ClientCredentials, scope, response)
		})
	}

	fn refresh<'a>(
		&'a self,
		credentials: &'a ClientCredentials,
		refresh_token: &'a TokenSecret,
		scope: &'a ScopeSet,
	) -> EndpointFuture<'a, TokenGrant> {
		Box::pin(async move {
			let oauth_client = Self::oauth_client(credentials)?;
			let meta = ResponseMetadataSlot::default();
			let handle = self.http_client.metered(meta.clone());
			let refresh_secret = RefreshToken::new(refresh_token.expose().to_owned());
			let mut request = oauth_client.exchange_refresh_token(&refresh_secret);

			for value in scope.iter() {
				request = request.add_scope(Scope::new(value.to_owned()));
			}
			for (key, value) in &credentials.extra_params {
				request = request.add_extra_param(key.as_str(), value.as_str());
			}

			let response = request
				.request_async(&handle)
				.await
				.map_err(|e| map_request_error(e, meta.take()))?;

			grant_from_response(Grant::RefreshToken, scope, response)
		})
	}
}

fn grant_from_response(
	grant: Grant,
	requested: &ScopeSet,
	response: BasicTokenResponse,
) -> Result<TokenGrant> {
	let expires_in = response.expires_in().ok_or(ProtocolError::MissingExpiresIn)?.as_secs();
	let expires_in = i64::try_from(expires_in).map_err(|_| ProtocolError::ExpiresInOutOfRange)?;

	if expires_in <= 0 {
		return Err(ProtocolError::NonPositiveExpiresIn.into());
	}

	// An empty request leaves the scope to the server, so there is nothing to compare against.
	if let Some(scopes) = response.scopes().filter(|_| !requested.is_empty()) {
		let returned = ScopeSet::new(scopes.iter().map(|scope| scope.as_str()))
			.map_err(ProtocolError::from)?;

		if returned != *requested {
			return Err(ProtocolError::ScopesChanged { grant: grant.as_str() }.into());
		}
	}

	let mut token =
		TokenGrant::new(response.access_token().secret().to_owned(), Duration::seconds(expires_in));

	if let Some(refresh) = response.refresh_token() {
		token = token.with_refresh_token(refresh.secret().to_owned());
	}

	Ok(token)
}

fn map_request_error(
	err: BasicRequestTokenError<HttpClientError<ReqwestError>>,
	meta: Option<ResponseMetadata>,
) -> Error {
	let meta = meta.unwrap_or_default();

	match err {
		RequestTokenError::ServerResponse(response) => map_server_response(response, &meta),
		RequestTokenError::Request(error) => map_transport_error(error, &meta),
		// `oauth2` reports non-JSON error bodies as parse failures; classify those by status.
		RequestTokenError::Parse(source, _body) => match meta.status {
			Some(status) if !is_success(status) => rejection_error(
				classify_status(Some(status)),
				format!("Token endpoint answered with HTTP {status}"),
				&meta,
			),
			status => ProtocolError::MalformedJson { source: Arc::new(source), status }.into(),
		},
		RequestTokenError::Other(message) => match meta.status {
			Some(status) if !is_success(status) =>
				rejection_error(classify_status(Some(status)), message, &meta),
			status => ProtocolError::Unexpected { message, status }.into(),
		},
	}
}

fn map_server_response(response: BasicErrorResponse, meta: &ResponseMetadata) -> Error {
	let code = response.error().as_ref().to_owned();
	let kind = match_exact_value(&code)
		.or_else(|| response.error_description().and_then(|d| match_exact_value(d)))
		.unwrap_or_else(|| classify_status(meta.status));
	let message = match response.error_description() {
		Some(description) => format!("{code}: {description}"),
		None => code,
	};

	rejection_error(kind, message, meta)
}

fn map_transport_error(err: HttpClientError<ReqwestError>, meta: &ResponseMetadata) -> Error {
	match err {
		HttpClientError::Reqwest(inner) => {
			let inner = *inner;

			if inner.is_builder() {
				return ConfigError::from(inner).into();
			}
			if inner.is_timeout() {
				return EndpointError::Unavailable {
					message: "request to the token endpoint timed out".into(),
					status: meta.status.or_else(|| inner.status().map(|code| code.as_u16())),
					retry_after: meta.retry_after,
				}
				.into();
			}

			EndpointError::from(inner).into()
		},
		HttpClientError::Http(inner) => ConfigError::from(inner).into(),
		HttpClientError::Io(inner) => EndpointError::from(inner).into(),
		HttpClientError::Other(message) => EndpointError::Unavailable {
			message,
			status: meta.status,
			retry_after: meta.retry_after,
		}
		.into(),
		_ => EndpointError::Unavailable {
			message: "HTTP client error while calling the token endpoint".into(),
			status: meta.status,
			retry_after: meta.retry_after,
		}
		.into(),
	}
}

fn rejection_error(kind: Rejection, reason: String, meta: &ResponseMetadata) -> Error {
	match kind {
		Rejection::InvalidGrant => Error::InvalidGrant { reason },
		Rejection::InvalidClient => Error::InvalidClient { reason },
		Rejection::InsufficientScope => Error::InsufficientScope { reason },
		Rejection::Transient => EndpointError::Unavailable {
			message: reason,
			status: meta.status,
			retry_after: meta.retry_after,
		}
		.into(),
	}
}

fn match_exact_value(value: &str) -> Option<Rejection> {
	if value.eq_ignore_ascii_case("invalid_grant") || value.eq_ignore_ascii_case("access_denied") {
		Some(Rejection::InvalidGrant)
	} else if value.eq_ignore_ascii_case("invalid_client")
		|| value.eq_ignore_ascii_case("unauthorized_client")
	{
		Some(Rejection::InvalidClient)
	} else if value.eq_ignore_ascii_case("invalid_scope")
		|| value.eq_ignore_ascii_case("insufficient_scope")
	{
		Some(Rejection::InsufficientScope)
	} else if value.eq_ignore_ascii_case("temporarily_unavailable")
		|| value.eq_ignore_ascii_case("server_error")
	{
		Some(Rejection::Transient)
	} else {
		None
	}
}

fn classify_status(status: Option<u16>) -> Rejection {
	match status {
		Some(400 | 404 | 410) => Rejection::InvalidGrant,
		Some(401) => Rejection::InvalidClient,
		Some(403) => Rejection::InsufficientScope,
		_ => Rejection::Transient,
	}
}

fn is_success(status: u16) -> bool {
	(200..300).contains(&status)
}
