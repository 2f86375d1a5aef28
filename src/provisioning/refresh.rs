//! Renewal of user tokens through the `refresh_token` grant.
//!
//! User tokens enter the cache from outside (see [`TokenService::store_user_token`]); the relay
//! only keeps them alive. Without a stored record there is nothing to refresh and the user has
//! to sign in again.

// self
use crate::{
	_prelude::*,
	auth::TokenRecord,
	error::ConfigError,
	provisioning::{ResolvedRequest, TokenService},
};

impl TokenService {
	pub(super) async fn refresh_user_token(
		&self,
		target: &ResolvedRequest,
		current: Option<TokenRecord>,
	) -> Result<TokenRecord> {
		let current = current.ok_or_else(|| Error::InvalidGrant {
			reason: format!(
				"no token is stored for {}; the user must sign in again",
				target.subject
			),
		})?;
		let refresh_token = current.refresh_token.ok_or(ConfigError::MissingRefreshToken)?;
		let credentials = self.options.credentials(&target.client)?;
		let issued_at = OffsetDateTime::now_utc();

		self.metrics.record_endpoint_call();

		let grant = self.endpoint.refresh(credentials, &refresh_token, &target.scope).await?;
		let record = grant.into_record(
			target.client.clone(),
			target.subject.clone(),
			target.scope.clone(),
			issued_at,
			Some(refresh_token),
		)?;

		self.cache.set(target.key.clone(), record.clone()).await?;

		Ok(record)
	}
}
