//! Bearer-token relay for outgoing HTTP requests: cached OAuth 2.0 access tokens, single-flight
//! renewal ahead of expiry, and reqwest middleware that attaches them.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod cache;
pub mod config;
pub mod decorator;
pub mod endpoint;
pub mod error;
pub mod http;
pub mod obs;
pub mod provisioning;
pub mod registration;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and fixtures for tests; enabled via `cfg(test)` or the `test` crate
	//! feature.

	pub use crate::_prelude::*;

	// std
	use std::{
		collections::VecDeque,
		sync::atomic::{AtomicUsize, Ordering},
	};
	// self
	use crate::{
		auth::{ClientName, ScopeSet, TokenSecret},
		config::{ClientAuthMethod, ClientCredentials, TokenManagementOptions},
		endpoint::{EndpointFuture, TokenEndpoint, TokenGrant},
		error::EndpointError,
		http::EndpointHttpClient,
	};

	/// Builds a reqwest client that accepts the self-signed certificates produced by `httpmock`.
	pub fn test_reqwest_client() -> ReqwestClient {
		ReqwestClient::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.build()
			.expect("Failed to build insecure Reqwest client for tests.")
	}

	/// Token endpoint transport over [`test_reqwest_client`].
	pub fn test_endpoint_http_client() -> EndpointHttpClient {
		EndpointHttpClient::with_client(test_reqwest_client())
	}

	/// Parses a client name fixture.
	pub fn test_client_name(value: &str) -> ClientName {
		ClientName::new(value).expect("Client name fixture should be valid.")
	}

	/// Options with one client, `svc1` (scope `read`), which also refreshes user tokens (scope
	/// `openid`).
	pub fn test_options(token_endpoint: &str) -> TokenManagementOptions {
		let credentials = ClientCredentials::new(
			"svc1-id",
			Url::parse(token_endpoint).expect("Token endpoint fixture should parse."),
		)
		.client_secret("svc1-secret")
		.auth_method(ClientAuthMethod::ClientSecretPost)
		.scope(ScopeSet::new(["read"]).expect("Scope fixture should be valid."));

		TokenManagementOptions::builder()
			.client(test_client_name("svc1"), credentials)
			.user_client(test_client_name("svc1"))
			.user_scope(ScopeSet::new(["openid"]).expect("Scope fixture should be valid."))
			.build()
			.expect("Options fixture should validate.")
	}

	/// Scripted [`TokenEndpoint`] that counts its calls.
	#[derive(Debug, Default)]
	pub struct FakeEndpoint {
		acquire: Mutex<VecDeque<Result<TokenGrant>>>,
		refresh: Mutex<VecDeque<Result<TokenGrant>>>,
		acquire_calls: AtomicUsize,
		refresh_calls: AtomicUsize,
		last_refresh_token: Mutex<Option<TokenSecret>>,
		delay_ms: u64,
		stalled: AtomicUsize,
	}
	impl FakeEndpoint {
		/// Makes every call take `delay_ms` milliseconds.
		pub fn with_delay(mut self, delay_ms: u64) -> Self {
			self.delay_ms = delay_ms;

			self
		}

		/// Makes the next `calls` endpoint calls hang without ever answering.
		pub fn with_stalled_calls(self, calls: usize) -> Self {
			self.stalled.store(calls, Ordering::SeqCst);

			self
		}

		/// Queues the outcome of the next `acquire` call.
		pub fn push_acquire(&self, outcome: Result<TokenGrant>) {
			self.acquire.lock().push_back(outcome);
		}

		/// Queues the outcome of the next `refresh` call.
		pub fn push_refresh(&self, outcome: Result<TokenGrant>) {
			self.refresh.lock().push_back(outcome);
		}

		/// Number of `acquire` calls so far.
		pub fn acquire_calls(&self) -> usize {
			self.acquire_calls.load(Ordering::SeqCst)
		}

		/// Number of `refresh` calls so far.
		pub fn refresh_calls(&self) -> usize {
			self.refresh_calls.load(Ordering::SeqCst)
		}

		/// Refresh token presented by the latest `refresh` call.
		pub fn last_refresh_token(&self) -> Option<TokenSecret> {
			self.last_refresh_token.lock().clone()
		}

		async fn respond(&self, queue: &Mutex<VecDeque<Result<TokenGrant>>>) -> Result<TokenGrant> {
			let stalls = self
				.stalled
				.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1));

			if stalls.is_ok() {
				std::future::pending::<()>().await;
			}
			if self.delay_ms > 0 {
				tokio::time::sleep(std::time::Duration::from_millis(self.delay_ms)).await;
			}

			let next = queue.lock().pop_front();

			next.unwrap_or_else(|| {
				Err(EndpointError::Unavailable {
					message: "no scripted response left".into(),
					status: None,
					retry_after: None,
				}
				.into())
			})
		}
	}
	impl TokenEndpoint for FakeEndpoint {
		fn acquire<'a>(
			&'a self,
			_credentials: &'a ClientCredentials,
			_scope: &'a ScopeSet,
		) -> EndpointFuture<'a, TokenGrant> {
			self.acquire_calls.fetch_add(1, Ordering::SeqCst);

			Box::pin(self.respond(&self.acquire))
		}

		fn refresh<'a>(
			&'a self,
			_credentials: &'a ClientCredentials,
			refresh_token: &'a TokenSecret,
			_scope: &'a ScopeSet,
		) -> EndpointFuture<'a, TokenGrant> {
			self.refresh_calls.fetch_add(1, Ordering::SeqCst);
			*self.last_refresh_token.lock() = Some(refresh_token.clone());

			Box::pin(self.respond(&self.refresh))
		}
	}
}

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		hash::{Hash, Hasher},
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use parking_lot::{Mutex, RwLock};
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use reqwest;
pub use reqwest_middleware;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};
