//! Token endpoint client contract.
//!
//! [`TokenEndpoint`] is the seam between provisioning and the network: one call per grant, no
//! retries, failures classified into the relay [`Error`] taxonomy. [`OAuth2TokenEndpoint`] is the
//! production implementation; tests plug in fakes.

pub mod oauth;

pub use oauth::OAuth2TokenEndpoint;

// self
use crate::{
	_prelude::*,
	auth::{ClientName, ScopeSet, Subject, TokenRecord, TokenSecret},
	config::ClientCredentials,
	error::{ConfigError, ProtocolError},
};

/// Boxed future returned by [`TokenEndpoint`] operations.
pub type EndpointFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + 'a + Send>>;

/// Performs token grants against an OAuth2 token endpoint.
pub trait TokenEndpoint
where
	Self: Send + Sync,
{
	/// Runs the `client_credentials` grant for `scope`.
	fn acquire<'a>(
		&'a self,
		credentials: &'a ClientCredentials,
		scope: &'a ScopeSet,
	) -> EndpointFuture<'a, TokenGrant>;

	/// Runs the `refresh_token` grant for `scope`.
	///
	/// A revoked or expired refresh token surfaces as [`Error::InvalidGrant`].
	fn refresh<'a>(
		&'a self,
		credentials: &'a ClientCredentials,
		refresh_token: &'a TokenSecret,
		scope: &'a ScopeSet,
	) -> EndpointFuture<'a, TokenGrant>;
}

/// Successful token response, before it is bound to an identity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenGrant {
	/// Issued access token.
	pub access_token: TokenSecret,
	/// Lifetime reported by the endpoint.
	pub expires_in: Duration,
	/// Rotated or newly issued refresh token.
	pub refresh_token: Option<TokenSecret>,
}
impl TokenGrant {
	/// Creates a grant without a refresh token.
	pub fn new(access_token: impl Into<String>, expires_in: Duration) -> Self {
		Self { access_token: TokenSecret::new(access_token), expires_in, refresh_token: None }
	}

	/// Attaches a refresh token.
	pub fn with_refresh_token(mut self, token: impl Into<String>) -> Self {
		self.refresh_token = Some(TokenSecret::new(token));

		self
	}

	/// Binds the grant to an identity, issued at `issued_at`.
	///
	/// `previous_refresh` is kept when the endpoint did not rotate the refresh token.
	pub fn into_record(
		self,
		client: ClientName,
		subject: Subject,
		scope: ScopeSet,
		issued_at: OffsetDateTime,
		previous_refresh: Option<TokenSecret>,
	) -> Result<TokenRecord> {
		if !self.expires_in.is_positive() {
			return Err(ProtocolError::NonPositiveExpiresIn.into());
		}

		let expires_at =
			issued_at.checked_add(self.expires_in).ok_or(ProtocolError::ExpiresInOutOfRange)?;

		TokenRecord::builder(client, subject, scope)
			.access_token(self.access_token.expose())
			.issued_at(issued_at)
			.expires_at(expires_at)
			.maybe_refresh_token(self.refresh_token.or(previous_refresh))
			.build()
			.map_err(|e| ConfigError::from(e).into())
	}
}
