//! Microsoft Graph REST client.

use bytes::Bytes;
use futures::{Stream, StreamExt};
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use reqwest::{header, Body, Client, StatusCode};
use serde::Deserialize;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use graphxfer_common::{Error, Result};

use super::auth::TokenCredential;

/// Graph API base URL.
pub const GRAPH_API_BASE: &str = "https://graph.microsoft.com/v1.0";

/// Default connect and idle-read timeout.
///
/// A transfer may take as long as it needs while bytes keep flowing; only a
/// connection that stalls for this long fails.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Characters escaped inside a single URL path segment.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b':')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'[')
    .add(b'\\')
    .add(b']')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

/// Directory user projected to `$select=id`.
#[derive(Debug, Clone, Deserialize)]
pub struct GraphUser {
    /// Object ID.
    #[serde(default)]
    pub id: Option<String>,
}

/// Drive resource.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphDrive {
    /// Drive ID.
    pub id: String,
    /// "personal", "business" or "documentLibrary".
    #[serde(default)]
    pub drive_type: Option<String>,
}

/// DriveItem resource.
#[derive(Debug, Clone, Deserialize)]
pub struct GraphDriveItem {
    /// Item ID.
    pub id: String,
    /// Item name.
    pub name: String,
    /// Size in bytes.
    #[serde(default)]
    pub size: Option<u64>,
}

/// Thin Graph API client over reqwest.
pub struct GraphClient {
    http: Client,
    base_url: String,
    credential: Arc<dyn TokenCredential>,
}

impl GraphClient {
    /// Create a client against the public Graph endpoint.
    pub fn new(credential: Arc<dyn TokenCredential>) -> Result<Self> {
        Self::with_base_url(credential, GRAPH_API_BASE, DEFAULT_TIMEOUT)
    }

    /// Create a client against a specific Graph base URL.
    ///
    /// `timeout` bounds connecting and each individual read, not the whole
    /// request.
    ///
    /// # Errors
    /// - `Configuration` if the base URL does not parse
    /// - `Transport` if the HTTP client cannot be built
    pub fn with_base_url(
        credential: Arc<dyn TokenCredential>,
        base_url: &str,
        timeout: Duration,
    ) -> Result<Self> {
        url::Url::parse(base_url)
            .map_err(|e| Error::Configuration(format!("Invalid Graph base URL: {}", e)))?;

        let http = Client::builder()
            .user_agent(concat!("GraphXfer/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(timeout)
            .read_timeout(timeout)
            .build()
            .map_err(|e| Error::Transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            credential,
        })
    }

    /// Base URL requests are issued against.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Get authorization header.
    async fn auth_header(&self) -> Result<String> {
        let token = self.credential.access_token().await?;
        Ok(format!("Bearer {}", token.secret()))
    }

    /// `GET /users/{principal}?$select=id`
    pub async fn get_user_id(&self, principal: &str) -> Result<GraphUser> {
        let url = user_url(&self.base_url, principal);
        let auth = self.auth_header().await?;

        let response = self
            .http
            .get(&url)
            .header(header::AUTHORIZATION, auth)
            .query(&[("$select", "id")])
            .send()
            .await
            .map_err(|e| Error::Transport(format!("Failed to look up user: {}", e)))?;

        self.handle_response(response).await
    }

    /// `GET /users/{id}/drive`
    pub async fn get_user_drive(&self, user_id: &str) -> Result<GraphDrive> {
        let url = format!("{}/drive", user_url(&self.base_url, user_id));
        let auth = self.auth_header().await?;

        let response = self
            .http
            .get(&url)
            .header(header::AUTHORIZATION, auth)
            .send()
            .await
            .map_err(|e| Error::Transport(format!("Failed to get drive: {}", e)))?;

        self.handle_response(response).await
    }

    /// `PUT /drives/{drive}/items/root:/{name}:/content`
    pub async fn put_root_content<S>(
        &self,
        drive_id: &str,
        name: &str,
        content: S,
        content_length: u64,
    ) -> Result<GraphDriveItem>
    where
        S: Stream<Item = Result<Bytes>> + Send + 'static,
    {
        let url = root_content_url(&self.base_url, drive_id, name);
        let auth = self.auth_header().await?;

        let response = self
            .http
            .put(&url)
            .header(header::AUTHORIZATION, auth)
            .header(header::CONTENT_TYPE, "application/octet-stream")
            .header(header::CONTENT_LENGTH, content_length)
            .body(Body::wrap_stream(content))
            .send()
            .await
            .map_err(|e| Error::Transport(format!("Failed to upload file: {}", e)))?;

        self.handle_response(response).await
    }

    /// `GET /drives/{drive}/items/{item}/content` as a stream.
    ///
    /// Graph answers with a redirect to a pre-authenticated URL, which
    /// reqwest follows without forwarding the bearer token.
    pub async fn get_item_content(
        &self,
        drive_id: &str,
        item_id: &str,
    ) -> Result<Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>> {
        let url = item_content_url(&self.base_url, drive_id, item_id);
        let auth = self.auth_header().await?;

        let response = self
            .http
            .get(&url)
            .header(header::AUTHORIZATION, auth)
            .send()
            .await
            .map_err(|e| Error::Transport(format!("Failed to start download: {}", e)))?;

        let response = check_status(response).await?;

        let stream = response
            .bytes_stream()
            .map(|result| result.map_err(|e| Error::Transport(format!("Stream read error: {}", e))));

        Ok(Box::pin(stream))
    }

    /// Handle API response with error checking.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T> {
        check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| Error::Transport(format!("Failed to parse response: {}", e)))
    }
}

/// Map a non-success status onto the error taxonomy.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(status_error(status, &body))
}

fn status_error(status: StatusCode, body: &str) -> Error {
    match status {
        StatusCode::NOT_FOUND => Error::NotFound(format!("Resource not found: {}", body)),
        StatusCode::UNAUTHORIZED => {
            Error::Authentication(format!("Invalid or expired token: {}", body))
        }
        _ => Error::Transport(format!("API error: {} - {}", status, body)),
    }
}

fn encode_segment(segment: &str) -> String {
    utf8_percent_encode(segment, PATH_SEGMENT).to_string()
}

fn user_url(base: &str, user: &str) -> String {
    format!("{}/users/{}", base, encode_segment(user))
}

fn root_content_url(base: &str, drive_id: &str, name: &str) -> String {
    format!(
        "{}/drives/{}/items/root:/{}:/content",
        base,
        encode_segment(drive_id),
        encode_segment(name)
    )
}

fn item_content_url(base: &str, drive_id: &str, item_id: &str) -> String {
    format!(
        "{}/drives/{}/items/{}/content",
        base,
        encode_segment(drive_id),
        encode_segment(item_id)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::auth::StaticToken;
    use crate::graph::test_server::{Reply, TestServer};
    use futures::stream;

    #[test]
    fn test_user_url_encodes_principal() {
        assert_eq!(
            user_url(GRAPH_API_BASE, "user@example.com"),
            "https://graph.microsoft.com/v1.0/users/user@example.com"
        );
        assert_eq!(
            user_url(GRAPH_API_BASE, "guest#EXT#@contoso.com"),
            "https://graph.microsoft.com/v1.0/users/guest%23EXT%23@contoso.com"
        );
    }

    #[test]
    fn test_content_urls() {
        assert_eq!(
            root_content_url(GRAPH_API_BASE, "D1", "my report.txt"),
            "https://graph.microsoft.com/v1.0/drives/D1/items/root:/my%20report.txt:/content"
        );
        assert_eq!(
            item_content_url(GRAPH_API_BASE, "b!x", "F1"),
            "https://graph.microsoft.com/v1.0/drives/b!x/items/F1/content"
        );
    }

    #[test]
    fn test_name_with_separator_stays_one_segment() {
        let url = root_content_url(GRAPH_API_BASE, "D1", "a/b.txt");
        assert!(url.ends_with("root:/a%2Fb.txt:/content"));
    }

    #[test]
    fn test_status_error_mapping() {
        assert!(matches!(
            status_error(StatusCode::NOT_FOUND, ""),
            Error::NotFound(_)
        ));
        assert!(matches!(
            status_error(StatusCode::UNAUTHORIZED, ""),
            Error::Authentication(_)
        ));
        assert!(matches!(
            status_error(StatusCode::FORBIDDEN, "Authorization_RequestDenied"),
            Error::Transport(_)
        ));
        assert!(matches!(
            status_error(StatusCode::BAD_GATEWAY, ""),
            Error::Transport(_)
        ));
    }

    #[test]
    fn test_graph_payloads_deserialize() {
        let user: GraphUser = serde_json::from_str(r#"{"id":"U1"}"#).unwrap();
        assert_eq!(user.id.as_deref(), Some("U1"));

        let drive: GraphDrive =
            serde_json::from_str(r#"{"id":"D1","driveType":"business","name":"OneDrive"}"#)
                .unwrap();
        assert_eq!(drive.id, "D1");
        assert_eq!(drive.drive_type.as_deref(), Some("business"));

        let item: GraphDriveItem =
            serde_json::from_str(r#"{"id":"F1","name":"example.txt","size":12,"file":{}}"#)
                .unwrap();
        assert_eq!(item.size, Some(12));
    }

    #[test]
    fn test_base_url_validation() {
        let credential = Arc::new(StaticToken::new("t"));
        let client =
            GraphClient::with_base_url(credential.clone(), "http://localhost:8080/v1.0/", DEFAULT_TIMEOUT)
                .unwrap();
        assert_eq!(client.base_url(), "http://localhost:8080/v1.0");

        assert!(matches!(
            GraphClient::with_base_url(credential, "::", DEFAULT_TIMEOUT),
            Err(Error::Configuration(_))
        ));
    }

    fn client_for(server: &TestServer, timeout: Duration) -> GraphClient {
        GraphClient::with_base_url(Arc::new(StaticToken::new("tok")), &server.url("/v1.0"), timeout)
            .unwrap()
    }

    async fn collect(
        mut content: Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>,
    ) -> Result<Vec<u8>> {
        let mut data = Vec::new();
        while let Some(chunk) = content.next().await {
            data.extend_from_slice(&chunk?);
        }
        Ok(data)
    }

    #[tokio::test]
    async fn test_get_user_id_request() {
        let server = TestServer::start(vec![Reply::json(200, r#"{"id":"U1"}"#)]).await;
        let client = client_for(&server, DEFAULT_TIMEOUT);

        let user = client.get_user_id("user@example.com").await.unwrap();
        assert_eq!(user.id.as_deref(), Some("U1"));

        let request = &server.requests()[0];
        assert_eq!(request.method, "GET");
        assert_eq!(request.target, "/v1.0/users/user@example.com?%24select=id");
        assert_eq!(request.header("authorization"), Some("Bearer tok"));
    }

    #[tokio::test]
    async fn test_put_root_content_request() {
        let server = TestServer::start(vec![Reply::json(
            201,
            r#"{"id":"F1","name":"example.txt","size":11}"#,
        )])
        .await;
        let client = client_for(&server, DEFAULT_TIMEOUT);

        let content = stream::iter(vec![
            Ok::<_, Error>(Bytes::from_static(b"hello ")),
            Ok(Bytes::from_static(b"world")),
        ]);
        let item = client
            .put_root_content("D1", "example.txt", content, 11)
            .await
            .unwrap();
        assert_eq!(item.id, "F1");
        assert_eq!(item.size, Some(11));

        let request = &server.requests()[0];
        assert_eq!(request.method, "PUT");
        assert_eq!(request.target, "/v1.0/drives/D1/items/root:/example.txt:/content");
        assert_eq!(request.header("content-type"), Some("application/octet-stream"));
        assert_eq!(request.header("content-length"), Some("11"));
        assert_eq!(request.header("authorization"), Some("Bearer tok"));
        assert_eq!(request.body, b"hello world");
    }

    #[tokio::test]
    async fn test_get_item_content_streams_body() {
        let server = TestServer::start(vec![Reply::bytes(b"file contents")]).await;
        let client = client_for(&server, DEFAULT_TIMEOUT);

        let content = client.get_item_content("D1", "F1").await.unwrap();
        assert_eq!(collect(content).await.unwrap(), b"file contents");

        let request = &server.requests()[0];
        assert_eq!(request.target, "/v1.0/drives/D1/items/F1/content");
    }

    #[tokio::test]
    async fn test_error_statuses_over_the_wire() {
        let server = TestServer::start(vec![
            Reply::json(404, r#"{"error":{"code":"itemNotFound"}}"#),
            Reply::json(401, r#"{"error":{"code":"InvalidAuthenticationToken"}}"#),
            Reply::json(500, r#"{"error":{"code":"generalException"}}"#),
            Reply::json(200, "not json"),
        ])
        .await;
        let client = client_for(&server, DEFAULT_TIMEOUT);

        assert!(matches!(
            client.get_user_drive("U1").await,
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            client.get_user_drive("U1").await,
            Err(Error::Authentication(_))
        ));
        assert!(matches!(
            client.get_user_drive("U1").await,
            Err(Error::Transport(_))
        ));
        assert!(matches!(
            client.get_user_drive("U1").await,
            Err(Error::Transport(_))
        ));
        assert_eq!(server.request_count(), 4);
    }

    #[tokio::test]
    async fn test_slow_download_outlasting_timeout_completes() {
        // Eight bytes at 250 ms each take about twice the timeout in total.
        let server = TestServer::start(vec![Reply::Trickle {
            chunks: b"abcdefgh".iter().map(|b| vec![*b]).collect(),
            interval: Duration::from_millis(250),
        }])
        .await;
        let client = client_for(&server, Duration::from_secs(1));

        let content = client.get_item_content("D1", "F1").await.unwrap();
        assert_eq!(collect(content).await.unwrap(), b"abcdefgh");
    }

    #[tokio::test]
    async fn test_stalled_download_times_out() {
        let server = TestServer::start(vec![Reply::Stall {
            head: b"ab".to_vec(),
            total_len: 10,
            pause: Duration::from_secs(3),
        }])
        .await;
        let client = client_for(&server, Duration::from_millis(500));

        let content = client.get_item_content("D1", "F1").await.unwrap();
        assert!(matches!(collect(content).await, Err(Error::Transport(_))));
    }
}
