//! Demonstrates a named HTTP client that attaches a cached app-only token to every request.

// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
use url::Url;
// self
use token_relay::{
	auth::{ClientName, ScopeSet},
	config::{ClientCredentials, TokenManagementOptions},
	registration::TokenManagement,
	reqwest::Client,
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let token_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token").body_includes("grant_type=client_credentials");
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"demo-access\",\"token_type\":\"bearer\",\"expires_in\":900}",
			);
		})
		.await;
	let api_mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/orders").header("authorization", "Bearer demo-access");
			then.status(200).body("[]");
		})
		.await;
	let inventory = ClientName::new("inventory")?;
	let credentials = ClientCredentials::new("demo-client", Url::parse(&server.url("/token"))?)
		.client_secret("super-secret")
		.scope(ScopeSet::new(["orders.read"])?);
	let options = TokenManagementOptions::builder()
		.client(inventory.clone(), credentials)
		.user_client(inventory.clone())
		.build()?;
	let management = TokenManagement::builder(options)
		.token_http_client(
			Client::builder()
				.danger_accept_invalid_certs(true)
				.danger_accept_invalid_hostnames(true)
				.build()?,
		)
		.build()?;
	let orders = management.add_client_access_token_client_with("orders", inventory, |builder| {
		builder.danger_accept_invalid_certs(true).danger_accept_invalid_hostnames(true)
	})?;

	for _ in 0..3 {
		let response = orders.get(server.url("/orders")).send().await?;

		println!("Orders API answered {}.", response.status());
	}

	println!("Token endpoint calls: {}.", management.service().metrics().endpoint_calls());

	token_mock.assert_async().await;
	api_mock.assert_calls_async(3).await;

	Ok(())
}
