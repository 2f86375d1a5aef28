//! App-only tokens through the `client_credentials` grant.

// self
use crate::{
	_prelude::*,
	auth::{Subject, TokenRecord},
	provisioning::{ResolvedRequest, TokenService},
};

impl TokenService {
	pub(super) async fn acquire_client_token(
		&self,
		target: &ResolvedRequest,
	) -> Result<TokenRecord> {
		let credentials = self.options.credentials(&target.client)?;
		let issued_at = OffsetDateTime::now_utc();

		self.metrics.record_endpoint_call();

		let record = self.endpoint.acquire(credentials, &target.scope).await?.into_record(
			target.client.clone(),
			Subject::Client,
			target.scope.clone(),
			issued_at,
			None,
		)?;

		self.cache.set(target.key.clone(), record.clone()).await?;

		Ok(record)
	}
}
