//! Who a token speaks for.

// self
use crate::{_prelude::*, auth::UserId};

/// Identity a token was issued to.
///
/// Client-credentials tokens are app-only and belong to the client itself; delegated tokens
/// belong to a user and are renewed with that user's refresh token.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Subject {
	/// App-only token obtained through the `client_credentials` grant.
	Client,
	/// Delegated token for a signed-in user.
	User(UserId),
}
impl Subject {
	/// Returns the user identifier for delegated tokens.
	pub fn user(&self) -> Option<&UserId> {
		match self {
			Self::Client => None,
			Self::User(user) => Some(user),
		}
	}

	/// Returns `true` for app-only tokens.
	pub fn is_client(&self) -> bool {
		matches!(self, Self::Client)
	}
}
impl From<UserId> for Subject {
	fn from(user: UserId) -> Self {
		Self::User(user)
	}
}
impl Display for Subject {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match self {
			Self::Client => f.write_str("client"),
			Self::User(user) => write!(f, "user:{user}"),
		}
	}
}
