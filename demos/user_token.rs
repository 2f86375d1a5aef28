//! Demonstrates refreshing a signed-in user's token ahead of expiry and sending it downstream.

// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
use time::Duration;
use url::Url;
// self
use token_relay::{
	auth::{ClientName, ScopeSet, UserId},
	config::{ClientCredentials, TokenManagementOptions},
	decorator::UserContext,
	endpoint::TokenGrant,
	registration::TokenManagement,
	reqwest::Client,
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let refresh_mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/token")
				.body_includes("grant_type=refresh_token")
				.body_includes("refresh_token=alice-refresh");
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"alice-fresh\",\"refresh_token\":\"alice-refresh-2\",\"token_type\":\"bearer\",\"expires_in\":3600}",
			);
		})
		.await;
	let profile_mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/me").header("authorization", "Bearer alice-fresh");
			then.status(200).body("{\"name\":\"alice\"}");
		})
		.await;
	let web = ClientName::new("web")?;
	let credentials = ClientCredentials::new("web-client", Url::parse(&server.url("/token"))?)
		.client_secret("web-secret");
	let options = TokenManagementOptions::builder()
		.client(web.clone(), credentials)
		.user_client(web)
		.user_scope(ScopeSet::new(["openid", "profile"])?)
		.expiry_skew(Duration::seconds(60))
		.build()?;
	let management = TokenManagement::builder(options)
		.token_http_client(
			Client::builder()
				.danger_accept_invalid_certs(true)
				.danger_accept_invalid_hostnames(true)
				.build()?,
		)
		.build()?;
	let alice = UserId::new("alice")?;

	// Sign-in handed us a token that expires inside the skew window.
	management
		.service()
		.store_user_token(
			alice.clone(),
			TokenGrant::new("alice-stale", Duration::seconds(30))
				.with_refresh_token("alice-refresh"),
		)
		.await?;

	let profile = management.add_user_access_token_client_with("profile", |builder| {
		builder.danger_accept_invalid_certs(true).danger_accept_invalid_hostnames(true)
	})?;
	let response =
		profile.get(server.url("/me")).with_extension(UserContext(alice.clone())).send().await?;

	println!("Profile API answered {}.", response.status());

	let record = management.service().user_access_token(&alice).await?;

	println!("Current token for {alice} expires at {}.", record.expires_at);

	refresh_mock.assert_async().await;
	profile_mock.assert_async().await;

	Ok(())
}
