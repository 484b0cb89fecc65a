//! Upstream client implementations.
//!
//! [`PlaceholderClient`] stands in for a real integration: it hands out a fixed
//! username with an empty password and treats every revoke as done.
//! [`HttpUpstreamClient`] talks to a JSON credentials endpoint over HTTPS and
//! offers the upstream a candidate password with every issue request.

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::client::{ClientFactory, CredentialRequest, Credentials, UpstreamClient};
use super::config_store::BackendConfig;
use super::passwords::PasswordGenerator;
use crate::config::UpstreamSettings;
use crate::errors::{Error, Result};
use crate::secrets::SecretString;

/// Username handed out by [`PlaceholderClient`]
pub const PLACEHOLDER_USERNAME: &str = "foo";

/// Upstream stand-in that never leaves the process.
#[derive(Debug, Default)]
pub struct PlaceholderClient;

#[async_trait]
impl UpstreamClient for PlaceholderClient {
    async fn issue_credentials(&self, request: &CredentialRequest) -> Result<Credentials> {
        debug!(role = %request.role, host = %request.host, "Issuing placeholder credentials");
        Ok(Credentials {
            username: PLACEHOLDER_USERNAME.to_string(),
            password: SecretString::default(),
        })
    }

    async fn revoke_credentials(&self, username: &str) -> Result<()> {
        debug!(username = %username, "Placeholder revoke");
        Ok(())
    }
}

/// Builds a [`PlaceholderClient`] for any valid configuration.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlaceholderClientFactory;

impl ClientFactory for PlaceholderClientFactory {
    fn build(&self, _config: &BackendConfig) -> Result<Arc<dyn UpstreamClient>> {
        Ok(Arc::new(PlaceholderClient))
    }
}

#[derive(Serialize)]
struct IssueRequestBody<'a> {
    role: &'a str,
    host: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct IssueResponseBody {
    username: String,
    #[serde(default)]
    password: Option<String>,
}

/// HTTP client for a credentials API.
///
/// - issue: `POST {url}/{credentials_path}` with `{role, host, password}`
/// - revoke: `DELETE {url}/{credentials_path}/{username}`
///
/// Both use HTTP basic auth with the configured username and password. The
/// candidate password follows the `password_policy` of the configuration the
/// client was built from.
#[derive(Debug, Clone)]
pub struct HttpUpstreamClient {
    client: Client,
    endpoint: Url,
    username: String,
    password: SecretString,
    password_policy: String,
    passwords: PasswordGenerator,
}

impl HttpUpstreamClient {
    pub fn new(config: &BackendConfig, settings: &UpstreamSettings) -> Result<Self> {
        Self::with_password_generator(config, settings, PasswordGenerator::default())
    }

    pub fn with_password_generator(
        config: &BackendConfig,
        settings: &UpstreamSettings,
        passwords: PasswordGenerator,
    ) -> Result<Self> {
        let mut endpoint = Url::parse(&config.url).map_err(|e| {
            Error::invalid_config(format!("client URL '{}' is not valid: {}", config.url, e))
        })?;

        {
            let mut segments = endpoint.path_segments_mut().map_err(|_| {
                Error::invalid_config(format!("client URL '{}' cannot be a base URL", config.url))
            })?;
            segments.pop_if_empty();
            segments.extend(settings.credentials_path.split('/').filter(|s| !s.is_empty()));
        }

        let mut builder = Client::builder().user_agent(settings.user_agent.as_str());
        if let Some(secs) = settings.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder
            .build()
            .map_err(|e| Error::invalid_config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint,
            username: config.username.clone(),
            password: config.password.clone(),
            password_policy: config.password_policy.clone(),
            passwords,
        })
    }

    /// Credentials collection URL
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn account_url(&self, username: &str) -> Result<Url> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| Error::invalid_config("credentials endpoint cannot be a base URL"))?
            .push(username);
        Ok(url)
    }

    /// Password offered to the upstream. Never fails: a policy that cannot be
    /// served falls back to a random password.
    async fn candidate_password(&self) -> SecretString {
        match self.passwords.generate(&self.password_policy).await {
            Ok(password) => password,
            Err(e) => {
                warn!(
                    policy = %self.password_policy,
                    error = %e,
                    "Password policy unavailable, using a random password"
                );
                self.passwords.random()
            }
        }
    }
}

#[async_trait]
impl UpstreamClient for HttpUpstreamClient {
    async fn issue_credentials(&self, request: &CredentialRequest) -> Result<Credentials> {
        let candidate = self.candidate_password().await;
        let body = IssueRequestBody {
            role: &request.role,
            host: &request.host,
            password: candidate.expose_secret(),
        };

        debug!(url = %self.endpoint, role = %request.role, "POST credentials");
        let response = self
            .client
            .post(self.endpoint.clone())
            .basic_auth(&self.username, Some(self.password.expose_secret()))
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::upstream("credentials request failed", e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::upstream(
                "credentials request rejected",
                format!("upstream responded with status {}", status),
            ));
        }

        let issued: IssueResponseBody = response
            .json()
            .await
            .map_err(|e| Error::upstream("invalid credentials response", e))?;

        let password = match issued.password {
            Some(password) if !password.is_empty() => SecretString::new(password),
            _ => candidate,
        };

        info!(role = %request.role, username = %issued.username, "Upstream issued credentials");
        Ok(Credentials { username: issued.username, password })
    }

    async fn revoke_credentials(&self, username: &str) -> Result<()> {
        if username.is_empty() {
            debug!("No username bound to lease, nothing to revoke upstream");
            return Ok(());
        }

        let url = self.account_url(username)?;
        debug!(url = %url, "DELETE credentials");
        let response = self
            .client
            .delete(url)
            .basic_auth(&self.username, Some(self.password.expose_secret()))
            .send()
            .await
            .map_err(|e| Error::upstream("revoke request failed", e))?;

        match response.status() {
            status if status.is_success() => {
                info!(username = %username, "Upstream revoked credentials");
                Ok(())
            }
            StatusCode::NOT_FOUND => {
                debug!(username = %username, "Username already gone upstream");
                Ok(())
            }
            status => Err(Error::upstream(
                "revoke request rejected",
                format!("upstream responded with status {}", status),
            )),
        }
    }
}

/// Builds [`HttpUpstreamClient`]s using process-level upstream settings.
#[derive(Debug, Clone, Default)]
pub struct HttpClientFactory {
    settings: UpstreamSettings,
    passwords: PasswordGenerator,
}

impl HttpClientFactory {
    pub fn new(settings: UpstreamSettings) -> Self {
        Self { settings, passwords: PasswordGenerator::default() }
    }

    pub fn with_password_generator(mut self, passwords: PasswordGenerator) -> Self {
        self.passwords = passwords;
        self
    }
}

impl ClientFactory for HttpClientFactory {
    fn build(&self, config: &BackendConfig) -> Result<Arc<dyn UpstreamClient>> {
        let client = HttpUpstreamClient::with_password_generator(
            config,
            &self.settings,
            self.passwords.clone(),
        )?;
        Ok(Arc::new(client))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::passwords::PasswordPolicySource;
    use wiremock::matchers::{body_partial_json, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Debug)]
    struct StrictPolicy;

    #[async_trait]
    impl PasswordPolicySource for StrictPolicy {
        async fn generate(&self, _policy: &str) -> Result<SecretString> {
            Ok(SecretString::new("Str1ct-Passw0rd"))
        }
    }

    fn config(url: &str) -> BackendConfig {
        BackendConfig {
            username: "svc".to_string(),
            password: SecretString::new("p"),
            url: url.to_string(),
            password_policy: String::new(),
        }
    }

    fn credential_request() -> CredentialRequest {
        CredentialRequest { role: "db1".to_string(), host: "db.internal".to_string() }
    }

    async fn offered_password(server: &MockServer) -> String {
        let requests = server.received_requests().await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        body["password"].as_str().unwrap().to_string()
    }

    async fn mount_issue_without_password(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/credentials"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"username": "v-db1"})),
            )
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_placeholder_client() {
        let client = PlaceholderClient;
        let creds = client.issue_credentials(&credential_request()).await.unwrap();
        assert_eq!(creds.username, PLACEHOLDER_USERNAME);
        assert!(creds.password.is_empty());
        assert!(client.revoke_credentials("").await.is_ok());
    }

    #[test]
    fn test_endpoint_joins_credentials_path() {
        let settings = UpstreamSettings::default();
        let client =
            HttpUpstreamClient::new(&config("https://api.example/v1/"), &settings).unwrap();
        assert_eq!(client.endpoint().as_str(), "https://api.example/v1/credentials");
        assert_eq!(
            client.account_url("a b").unwrap().as_str(),
            "https://api.example/v1/credentials/a%20b"
        );
    }

    #[test]
    fn test_malformed_url_is_invalid_config() {
        let settings = UpstreamSettings::default();

        let err = HttpUpstreamClient::new(&config("not a url"), &settings).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig { .. }));

        let err =
            HttpUpstreamClient::new(&config("mailto:ops@example.com"), &settings).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig { .. }));
    }

    #[test]
    fn test_builds_with_and_without_timeout() {
        let mut settings = UpstreamSettings::default();
        assert!(HttpUpstreamClient::new(&config("https://api.example"), &settings).is_ok());

        settings.request_timeout_secs = Some(5);
        assert!(HttpUpstreamClient::new(&config("https://api.example"), &settings).is_ok());
    }

    #[tokio::test]
    async fn test_issue_posts_role_and_host() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/credentials"))
            .and(header_exists("authorization"))
            .and(body_partial_json(serde_json::json!({"role": "db1", "host": "db.internal"})))
            .respond_with(ResponseTemplate::new(201).set_body_json(
                serde_json::json!({"username": "v-db1-abc", "password": "s3cret"}),
            ))
            .expect(1)
            .mount(&server)
            .await;

        let client =
            HttpUpstreamClient::new(&config(&server.uri()), &UpstreamSettings::default()).unwrap();
        let creds = client.issue_credentials(&credential_request()).await.unwrap();
        assert_eq!(creds.username, "v-db1-abc");
        assert_eq!(creds.password.expose_secret(), "s3cret");
    }

    #[tokio::test]
    async fn test_issue_falls_back_to_offered_password() {
        let server = MockServer::start().await;
        mount_issue_without_password(&server).await;

        let passwords = PasswordGenerator::new(24);
        let client = HttpUpstreamClient::with_password_generator(
            &config(&server.uri()),
            &UpstreamSettings::default(),
            passwords,
        )
        .unwrap();
        let creds = client.issue_credentials(&credential_request()).await.unwrap();
        assert_eq!(creds.password.len(), 24);
        assert_eq!(creds.password.expose_secret(), offered_password(&server).await);
    }

    #[tokio::test]
    async fn test_policy_served_by_source() {
        let server = MockServer::start().await;
        mount_issue_without_password(&server).await;

        let mut with_policy = config(&server.uri());
        with_policy.password_policy = "strict".to_string();
        let passwords = PasswordGenerator::default().with_policy_source(Arc::new(StrictPolicy));
        let client = HttpUpstreamClient::with_password_generator(
            &with_policy,
            &UpstreamSettings::default(),
            passwords,
        )
        .unwrap();

        let creds = client.issue_credentials(&credential_request()).await.unwrap();
        assert_eq!(creds.password.expose_secret(), "Str1ct-Passw0rd");
        assert_eq!(offered_password(&server).await, "Str1ct-Passw0rd");
    }

    #[tokio::test]
    async fn test_unserved_policy_falls_back_to_random() {
        let server = MockServer::start().await;
        mount_issue_without_password(&server).await;

        let mut with_policy = config(&server.uri());
        with_policy.password_policy = "strict".to_string();
        let client = HttpUpstreamClient::new(&with_policy, &UpstreamSettings::default()).unwrap();

        let creds = client.issue_credentials(&credential_request()).await.unwrap();
        assert_eq!(creds.password.len(), 36);
        assert!(creds.password.expose_secret().chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[tokio::test]
    async fn test_issue_error_status_is_upstream_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client =
            HttpUpstreamClient::new(&config(&server.uri()), &UpstreamSettings::default()).unwrap();
        let err = client.issue_credentials(&credential_request()).await.unwrap_err();
        assert!(matches!(err, Error::Upstream { .. }));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_revoke_statuses() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/credentials/alive"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/credentials/gone"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/credentials/locked"))
            .respond_with(ResponseTemplate::new(409))
            .mount(&server)
            .await;

        let client =
            HttpUpstreamClient::new(&config(&server.uri()), &UpstreamSettings::default()).unwrap();
        assert!(client.revoke_credentials("alive").await.is_ok());
        assert!(client.revoke_credentials("gone").await.is_ok());
        assert!(client.revoke_credentials("").await.is_ok());

        let err = client.revoke_credentials("locked").await.unwrap_err();
        assert!(matches!(err, Error::Upstream { .. }));
    }
}
