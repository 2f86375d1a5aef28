#![allow(dead_code)]

// crates.io
use httpmock::prelude::*;
use reqwest::Client;
use time::Duration;
use url::Url;
// self
use token_relay::{
	auth::{ClientName, ScopeSet, UserId},
	config::{ClientAuthMethod, ClientCredentials, TokenManagementOptions},
	registration::TokenManagement,
};

pub const CLIENT_ID: &str = "svc1-id";
pub const CLIENT_SECRET: &str = "svc1-secret";

/// Reqwest client that trusts the self-signed certificates `httpmock` serves.
pub fn insecure_client() -> Client {
	Client::builder()
		.danger_accept_invalid_certs(true)
		.danger_accept_invalid_hostnames(true)
		.redirect(reqwest::redirect::Policy::none())
		.build()
		.expect("Failed to build insecure Reqwest client for tests.")
}

/// Configures a registered API client to trust `httpmock`'s certificates.
pub fn trust_mock_tls(builder: reqwest::ClientBuilder) -> reqwest::ClientBuilder {
	builder.danger_accept_invalid_certs(true).danger_accept_invalid_hostnames(true)
}

pub fn client_name(value: &str) -> ClientName {
	ClientName::new(value).expect("Client name fixture should be valid.")
}

pub fn user(value: &str) -> UserId {
	UserId::new(value).expect("User fixture should be valid.")
}

pub fn scope(values: &[&str]) -> ScopeSet {
	ScopeSet::new(values.iter().copied()).expect("Scope fixture should be valid.")
}

/// `svc1` posts its secret in the form body, asks for `read`, and refreshes user tokens
/// (scope `api`).
pub fn credentials(server: &MockServer, method: ClientAuthMethod) -> ClientCredentials {
	ClientCredentials::new(
		CLIENT_ID,
		Url::parse(&server.url("/token")).expect("Mock token endpoint should parse successfully."),
	)
	.client_secret(CLIENT_SECRET)
	.auth_method(method)
	.scope(scope(&["read"]))
}

pub fn options_with(credentials: ClientCredentials, skew: Duration) -> TokenManagementOptions {
	TokenManagementOptions::builder()
		.client(client_name("svc1"), credentials)
		.user_client(client_name("svc1"))
		.user_scope(scope(&["api"]))
		.expiry_skew(skew)
		.build()
		.expect("Options fixture should validate.")
}

pub fn management_with(options: TokenManagementOptions) -> TokenManagement {
	TokenManagement::builder(options)
		.token_http_client(insecure_client())
		.build()
		.expect("Token management should build.")
}

pub fn management(server: &MockServer) -> TokenManagement {
	management_with(options_with(
		credentials(server, ClientAuthMethod::ClientSecretPost),
		Duration::seconds(60),
	))
}

pub fn token_body(access: &str, expires_in: i64) -> String {
	format!(r#"{{"access_token":"{access}","token_type":"bearer","expires_in":{expires_in}}}"#)
}

pub fn token_body_with_refresh(access: &str, refresh: &str, expires_in: i64) -> String {
	format!(
		r#"{{"access_token":"{access}","refresh_token":"{refresh}","token_type":"bearer","expires_in":{expires_in}}}"#
	)
}
