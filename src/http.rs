//! HTTP transport used for token endpoint calls.
//!
//! [`EndpointHttpClient`] wraps a [`ReqwestClient`] and hands the `oauth2` crate a short-lived
//! [`MeteredHandle`] per token request. The handle records the status code and `Retry-After`
//! hint of the response into a [`ResponseMetadataSlot`] so failures can be classified with
//! that context after `oauth2` has consumed the response.

// crates.io
use oauth2::{AsyncHttpClient, HttpRequest, HttpResponse};
use reqwest::{
	header::{HeaderMap, RETRY_AFTER},
	redirect::Policy,
};
use time::format_description::well_known::Rfc2822;
// self
use crate::{_prelude::*, error::ConfigError};

/// Deadline applied to each token endpoint round trip by [`EndpointHttpClient::new`].
pub const DEFAULT_REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

/// Status and retry hint of the most recent token endpoint response.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResponseMetadata {
	/// HTTP status code returned by the token endpoint.
	pub status: Option<u16>,
	/// Retry-After hint expressed as a relative duration.
	pub retry_after: Option<Duration>,
}

/// Shared slot one token request writes its [`ResponseMetadata`] into.
#[derive(Clone, Debug, Default)]
pub struct ResponseMetadataSlot(Arc<Mutex<Option<ResponseMetadata>>>);
impl ResponseMetadataSlot {
	/// Stores metadata for the current request.
	pub fn store(&self, meta: ResponseMetadata) {
		*self.0.lock() = Some(meta);
	}

	/// Takes the captured metadata, leaving the slot empty.
	pub fn take(&self) -> Option<ResponseMetadata> {
		self.0.lock().take()
	}
}

/// Reqwest client dedicated to token endpoint traffic.
///
/// Token endpoints answer directly, so the client built by [`EndpointHttpClient::new`] never
/// follows redirects. A client passed to [`EndpointHttpClient::with_client`] should be
/// configured the same way.
#[derive(Clone, Debug)]
pub struct EndpointHttpClient(ReqwestClient);
impl EndpointHttpClient {
	/// Builds a client that refuses redirects and gives up on a round trip after
	/// [`DEFAULT_REQUEST_TIMEOUT`].
	pub fn new() -> Result<Self, ConfigError> {
		let client = ReqwestClient::builder()
			.redirect(Policy::none())
			.timeout(DEFAULT_REQUEST_TIMEOUT)
			.build()?;

		Ok(Self(client))
	}

	/// Wraps an existing reqwest client.
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}

	/// Returns a handle that records response metadata into `slot`.
	pub fn metered(&self, slot: ResponseMetadataSlot) -> MeteredHandle {
		MeteredHandle { client: self.0.clone(), slot }
	}
}
impl AsRef<ReqwestClient> for EndpointHttpClient {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}

/// [`AsyncHttpClient`] adapter handed to `oauth2` for a single token request.
#[derive(Clone, Debug)]
pub struct MeteredHandle {
	client: ReqwestClient,
	slot: ResponseMetadataSlot,
}
impl<'c> AsyncHttpClient<'c> for MeteredHandle {
	type Error = oauth2::HttpClientError<ReqwestError>;
	type Future =
		Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'c + Send + Sync>>;

	fn call(&'c self, request: HttpRequest) -> Self::Future {
		Box::pin(async move {
			self.slot.take();

			let response = self
				.client
				.execute(request.try_into().map_err(Box::new)?)
				.await
				.map_err(Box::new)?;
			let status = response.status();
			let headers = response.headers().to_owned();

			self.slot.store(ResponseMetadata {
				status: Some(status.as_u16()),
				retry_after: parse_retry_after(&headers, OffsetDateTime::now_utc()),
			});

			let mut converted =
				HttpResponse::new(response.bytes().await.map_err(Box::new)?.to_vec());

			*converted.status_mut() = status;
			*converted.headers_mut() = headers;

			Ok(converted)
		})
	}
}

fn parse_retry_after(headers: &HeaderMap, now: OffsetDateTime) -> Option<Duration> {
	let raw = headers.get(RETRY_AFTER)?.to_str().ok()?.trim();

	if let Ok(secs) = raw.parse::<u32>() {
		return Some(Duration::seconds(secs.into()));
	}

	let moment = OffsetDateTime::parse(raw, &Rfc2822).ok()?;
	let delta = moment - now;

	delta.is_positive().then_some(delta)
}
