//! Names for token clients and the users delegated tokens are issued to.
//!
//! Both are an [`Identifier`] tagged with an [`IdentifierKind`], so a user can never be passed
//! where a client is expected. Identifiers end up in cache keys and log fields, hence the rules:
//! non-empty, no whitespace, at most [`Identifier::MAX_LEN`] bytes.

// std
use std::{borrow::Borrow, marker::PhantomData, ops::Deref};
// crates.io
use serde::{Deserializer, Serializer, de::Error as DeError};
// self
use crate::_prelude::*;

/// Tag distinguishing what an [`Identifier`] names.
pub trait IdentifierKind {
	/// Label used in `Debug` output and validation errors.
	const LABEL: &'static str;
}

/// Tag of [`ClientName`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClientKind;
impl IdentifierKind for ClientKind {
	const LABEL: &'static str = "Client";
}

/// Tag of [`UserId`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UserKind;
impl IdentifierKind for UserKind {
	const LABEL: &'static str = "User";
}

/// Name a token client (credentials plus token endpoint) is configured under.
pub type ClientName = Identifier<ClientKind>;
/// User a delegated token belongs to.
pub type UserId = Identifier<UserKind>;

/// Error returned when identifier validation fails.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum IdentifierError {
	/// Nothing was supplied.
	#[error("{kind} identifier cannot be empty.")]
	Empty {
		/// [`IdentifierKind::LABEL`] of the rejected value.
		kind: &'static str,
	},
	/// Whitespace would make cache keys and log fields ambiguous.
	#[error("{kind} identifier contains whitespace.")]
	ContainsWhitespace {
		/// [`IdentifierKind::LABEL`] of the rejected value.
		kind: &'static str,
	},
	/// Longer than [`Identifier::MAX_LEN`] bytes.
	#[error("{kind} identifier exceeds {max} characters.")]
	TooLong {
		/// [`IdentifierKind::LABEL`] of the rejected value.
		kind: &'static str,
		/// Byte limit that was exceeded.
		max: usize,
	},
}

/// Validated name tagged with its kind.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Identifier<K> {
	value: String,
	kind: PhantomData<K>,
}
impl<K> Identifier<K> {
	/// Longest accepted identifier, in bytes.
	pub const MAX_LEN: usize = 128;

	/// Borrows the identifier text.
	pub fn as_str(&self) -> &str {
		&self.value
	}
}
impl<K> Identifier<K>
where
	K: IdentifierKind,
{
	/// Validates `value` as an identifier of kind `K`.
	pub fn new(value: impl AsRef<str>) -> Result<Self, IdentifierError> {
		Self::parse(value.as_ref().to_owned())
	}

	fn parse(value: String) -> Result<Self, IdentifierError> {
		let kind = K::LABEL;

		if value.is_empty() {
			Err(IdentifierError::Empty { kind })
		} else if value.contains(char::is_whitespace) {
			Err(IdentifierError::ContainsWhitespace { kind })
		} else if value.len() > Self::MAX_LEN {
			Err(IdentifierError::TooLong { kind, max: Self::MAX_LEN })
		} else {
			Ok(Self { value, kind: PhantomData })
		}
	}
}
impl Identifier<ClientKind> {
	/// Client used for user tokens unless the options name another.
	pub const DEFAULT: &'static str = "default";

	/// The client named [`DEFAULT`](Self::DEFAULT).
	pub fn default_client() -> Self {
		Self { value: Self::DEFAULT.to_owned(), kind: PhantomData }
	}
}
impl Default for Identifier<ClientKind> {
	fn default() -> Self {
		Self::default_client()
	}
}
impl<K> Deref for Identifier<K> {
	type Target = str;

	fn deref(&self) -> &str {
		self.as_str()
	}
}
impl<K> AsRef<str> for Identifier<K> {
	fn as_ref(&self) -> &str {
		self.as_str()
	}
}
impl<K> Borrow<str> for Identifier<K> {
	fn borrow(&self) -> &str {
		self.as_str()
	}
}
impl<K> From<Identifier<K>> for String {
	fn from(id: Identifier<K>) -> Self {
		id.value
	}
}
impl<K> TryFrom<String> for Identifier<K>
where
	K: IdentifierKind,
{
	type Error = IdentifierError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		Self::parse(value)
	}
}
impl<K> FromStr for Identifier<K>
where
	K: IdentifierKind,
{
	type Err = IdentifierError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::new(s)
	}
}
impl<K> Debug for Identifier<K>
where
	K: IdentifierKind,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "{}({})", K::LABEL, self.value)
	}
}
impl<K> Display for Identifier<K> {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.value)
	}
}
impl<K> Serialize for Identifier<K> {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_str(&self.value)
	}
}
impl<'de, K> Deserialize<'de> for Identifier<K>
where
	K: IdentifierKind,
{
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: Deserializer<'de>,
	{
		Self::parse(String::deserialize(deserializer)?).map_err(D::Error::custom)
	}
}
