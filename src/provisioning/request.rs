//! Token requests and their resolution against the configured options.

// self
use crate::{
	_prelude::*,
	auth::{ClientName, ScopeSet, Subject, TokenRecord, UserId},
	cache::CacheKey,
	config::TokenManagementOptions,
};

/// What a caller needs a token for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenRequest {
	/// Named client to use; defaults to the user client for user requests.
	pub client: Option<ClientName>,
	/// Identity the token must speak for.
	pub subject: Subject,
	/// Scope override; defaults to the client's (or user options') scope.
	pub scope: Option<ScopeSet>,
	/// Bypasses the cache when `true`.
	pub force: bool,
	/// Expiry skew override.
	pub expiry_skew: Option<Duration>,
}
impl TokenRequest {
	/// App-only token for the named client.
	pub fn for_client(client: ClientName) -> Self {
		Self {
			client: Some(client),
			subject: Subject::Client,
			scope: None,
			force: false,
			expiry_skew: None,
		}
	}

	/// Delegated token for `user`.
	pub fn for_user(user: UserId) -> Self {
		Self {
			client: None,
			subject: Subject::User(user),
			scope: None,
			force: false,
			expiry_skew: None,
		}
	}

	/// Picks the named client explicitly.
	pub fn with_client(mut self, client: ClientName) -> Self {
		self.client = Some(client);

		self
	}

	/// Overrides the requested scope.
	pub fn with_scope(mut self, scope: ScopeSet) -> Self {
		self.scope = Some(scope);

		self
	}

	/// Skips the cached token and renews unconditionally.
	pub fn force_refresh(mut self) -> Self {
		self.force = true;

		self
	}

	/// Overrides the expiry skew; negative values are clamped to zero.
	pub fn with_expiry_skew(mut self, skew: Duration) -> Self {
		self.expiry_skew = Some(if skew.is_negative() { Duration::ZERO } else { skew });

		self
	}

	pub(crate) fn resolve(self, options: &TokenManagementOptions) -> Result<ResolvedRequest> {
		let client = match (self.client, &self.subject) {
			(Some(client), _) => client,
			(None, Subject::User(_)) => options.user.client.clone(),
			(None, Subject::Client) => ClientName::default(),
		};
		let scope = match (self.scope, &self.subject) {
			(Some(scope), _) => scope,
			(None, Subject::User(_)) => options.user.scope.clone(),
			(None, Subject::Client) => options.credentials(&client)?.scope.clone(),
		};
		let key = CacheKey::new(&client, &self.subject, &scope);

		Ok(ResolvedRequest {
			client,
			subject: self.subject,
			scope,
			force: self.force,
			expiry_skew: self.expiry_skew.unwrap_or(options.expiry_skew),
			key,
		})
	}
}

/// A [`TokenRequest`] with every default filled in.
#[derive(Clone, Debug)]
pub(crate) struct ResolvedRequest {
	pub(crate) client: ClientName,
	pub(crate) subject: Subject,
	pub(crate) scope: ScopeSet,
	pub(crate) force: bool,
	pub(crate) expiry_skew: Duration,
	pub(crate) key: CacheKey,
}
impl ResolvedRequest {
	/// Returns `true` when `record` cannot be handed out as-is at `now`.
	pub(crate) fn needs_refresh(&self, record: &TokenRecord, now: OffsetDateTime) -> bool {
		self.force || record.expires_within(now, self.expiry_skew)
	}
}
