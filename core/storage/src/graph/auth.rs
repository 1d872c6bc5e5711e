//! Service-principal authentication against Azure AD.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use oauth2::basic::BasicClient;
use oauth2::{
    reqwest, ClientId, EndpointNotSet, EndpointSet, RequestTokenError, Scope, TokenResponse,
    TokenUrl,
};
use std::fmt;

use graphxfer_common::{ClientSecret, Error, Result};

/// Default Azure AD authority host.
pub const DEFAULT_AUTHORITY: &str = "https://login.microsoftonline.com";

/// Scope requesting the application permissions granted to the app on Graph.
const GRAPH_SCOPE: &str = "https://graph.microsoft.com/.default";

type TokenClient =
    BasicClient<EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

/// Bearer token with expiration tracking.
#[derive(Clone)]
pub struct AccessToken {
    secret: String,
    expires_at: DateTime<Utc>,
}

impl AccessToken {
    /// Create a token that expires at the given instant.
    pub fn new(secret: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            secret: secret.into(),
            expires_at,
        }
    }

    /// The raw bearer value.
    pub fn secret(&self) -> &str {
        &self.secret
    }

    /// Check if the token is expired or about to expire.
    pub fn is_expired(&self) -> bool {
        // Consider expired if less than 5 minutes remaining
        self.expires_at < Utc::now() + Duration::minutes(5)
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("secret", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Source of bearer tokens for Graph requests.
#[async_trait]
pub trait TokenCredential: Send + Sync {
    /// Get a valid access token.
    ///
    /// # Errors
    /// - `Authentication` if the directory rejects the credentials
    /// - `Transport` if the token endpoint cannot be reached
    async fn access_token(&self) -> Result<AccessToken>;
}

/// Client-credentials grant for a tenant/application/secret triple.
///
/// Construction performs no network I/O; the credentials are first checked
/// by the directory when a token is requested.
pub struct ClientSecretCredential {
    client: TokenClient,
    http: reqwest::Client,
    token_url: String,
    cached: tokio::sync::RwLock<Option<AccessToken>>,
}

impl ClientSecretCredential {
    /// Create a credential against the default authority.
    ///
    /// # Errors
    /// - `Configuration` if any input is empty
    pub fn new(tenant_id: &str, client_id: &str, client_secret: ClientSecret) -> Result<Self> {
        Self::with_authority(DEFAULT_AUTHORITY, tenant_id, client_id, client_secret)
    }

    /// Create a credential against a specific authority host.
    ///
    /// # Errors
    /// - `Configuration` if any input is empty or the token URL is invalid
    pub fn with_authority(
        authority: &str,
        tenant_id: &str,
        client_id: &str,
        client_secret: ClientSecret,
    ) -> Result<Self> {
        if tenant_id.trim().is_empty() {
            return Err(Error::Configuration("Tenant id is missing".to_string()));
        }
        if client_id.trim().is_empty() {
            return Err(Error::Configuration("Client id is missing".to_string()));
        }
        if client_secret.is_empty() {
            return Err(Error::Configuration("Client secret is missing".to_string()));
        }

        let token_url = format!(
            "{}/{}/oauth2/v2.0/token",
            authority.trim_end_matches('/'),
            tenant_id.trim()
        );

        let client = BasicClient::new(ClientId::new(client_id.trim().to_string()))
            .set_client_secret(oauth2::ClientSecret::new(
                client_secret.expose().to_string(),
            ))
            .set_token_uri(
                TokenUrl::new(token_url.clone())
                    .map_err(|e| Error::Configuration(format!("Invalid token URL: {}", e)))?,
            );

        let http = reqwest::ClientBuilder::new()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| Error::Transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            http,
            token_url,
            cached: tokio::sync::RwLock::new(None),
        })
    }

    /// Token endpoint this credential talks to.
    pub fn token_url(&self) -> &str {
        &self.token_url
    }

    async fn request_token(&self) -> Result<AccessToken> {
        let response = self
            .client
            .exchange_client_credentials()
            .add_scope(Scope::new(GRAPH_SCOPE.to_string()))
            .request_async(&self.http)
            .await
            .map_err(|e| match e {
                RequestTokenError::ServerResponse(resp) => {
                    Error::Authentication(format!("Token request rejected: {}", resp))
                }
                other => Error::Transport(format!("Token request failed: {}", other)),
            })?;

        let expires_in = response
            .expires_in()
            .unwrap_or_else(|| std::time::Duration::from_secs(3600));

        let expires_at =
            Utc::now() + Duration::from_std(expires_in).unwrap_or_else(|_| Duration::hours(1));

        Ok(AccessToken::new(
            response.access_token().secret().clone(),
            expires_at,
        ))
    }
}

#[async_trait]
impl TokenCredential for ClientSecretCredential {
    async fn access_token(&self) -> Result<AccessToken> {
        {
            let cached = self.cached.read().await;
            if let Some(token) = cached.as_ref().filter(|t| !t.is_expired()) {
                return Ok(token.clone());
            }
        }

        let mut cached = self.cached.write().await;

        // Double-check after acquiring write lock
        if let Some(token) = cached.as_ref().filter(|t| !t.is_expired()) {
            return Ok(token.clone());
        }

        tracing::debug!(token_url = %self.token_url, "Requesting access token");
        let token = self.request_token().await?;
        *cached = Some(token.clone());

        Ok(token)
    }
}

impl fmt::Debug for ClientSecretCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientSecretCredential")
            .field("token_url", &self.token_url)
            .finish_non_exhaustive()
    }
}

/// Pre-issued bearer token.
pub struct StaticToken {
    token: AccessToken,
}

impl StaticToken {
    /// Wrap a token that is treated as valid for a day.
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            token: AccessToken::new(secret, Utc::now() + Duration::days(1)),
        }
    }
}

#[async_trait]
impl TokenCredential for StaticToken {
    async fn access_token(&self) -> Result<AccessToken> {
        Ok(self.token.clone())
    }
}
