//! API client for the Monarch Money REST and GraphQL endpoints.
//!
//! Only the calls needed to establish and verify a session live here:
//! password login, MFA completion and the account list query.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::Config;
use crate::store::{SessionSource, SessionToken};

use super::error::truncate_body;
use super::{ApiError, AuthError, FinanceApi};

// ============================================================================
// Constants
// ============================================================================

const LOGIN_PATH: &str = "/auth/login/";
const GRAPHQL_PATH: &str = "/graphql";

const CLIENT_PLATFORM: &str = "web";
const USER_AGENT: &str = concat!("monarch-session/", env!("CARGO_PKG_VERSION"));

const GET_ACCOUNTS_QUERY: &str = r#"query GetAccounts {
  accounts {
    id
    displayName
    currentBalance
    isHidden
    type { name display }
    institution { id name }
  }
}"#;

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
    trusted_device: bool,
    supports_mfa: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    totp: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    detail: Option<String>,
    error_code: Option<String>,
}

#[derive(Debug, Serialize)]
struct GraphqlRequest<'a> {
    #[serde(rename = "operationName")]
    operation_name: &'a str,
    query: &'a str,
    variables: Value,
}

#[derive(Debug, Deserialize)]
struct GraphqlResponse {
    data: Option<Value>,
    #[serde(default)]
    errors: Vec<GraphqlError>,
}

#[derive(Debug, Deserialize)]
struct GraphqlError {
    message: String,
}

/// API client for Monarch Money.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct MonarchClient {
    client: Client,
    base_url: String,
    token: Option<SessionToken>,
}

impl MonarchClient {
    pub fn new(config: &Config) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            base_url: config.api_url.trim_end_matches('/').to_string(),
            token: None,
        })
    }

    /// Create a client bound to a previously stored session, sharing the connection pool.
    pub fn with_token(&self, token: SessionToken) -> Self {
        Self {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            token: Some(token),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn base_headers() -> header::HeaderMap {
        let mut headers = header::HeaderMap::new();
        headers.insert(header::ACCEPT, header::HeaderValue::from_static("application/json"));
        headers.insert(
            header::HeaderName::from_static("client-platform"),
            header::HeaderValue::from_static(CLIENT_PLATFORM),
        );
        headers
    }

    fn auth_headers(&self) -> Result<header::HeaderMap, ApiError> {
        let token = self.token.as_ref().ok_or(ApiError::NotAuthenticated)?;
        let mut headers = Self::base_headers();
        let value = header::HeaderValue::from_str(&format!("Token {}", token.as_str()))
            .map_err(|_| ApiError::InvalidResponse("session token is not a valid header".to_string()))?;
        headers.insert(header::AUTHORIZATION, value);
        Ok(headers)
    }

    /// Pull the human-readable reason out of an error body.
    fn describe_failure(status: StatusCode, body: &str) -> String {
        let reason = serde_json::from_str::<ErrorDetail>(body)
            .ok()
            .and_then(|d| d.detail.or(d.error_code))
            .unwrap_or_else(|| truncate_body(body));
        if reason.is_empty() {
            format!("HTTP {}", status)
        } else {
            format!("HTTP {}: {}", status, reason)
        }
    }

    async fn post_login(&mut self, request: &LoginRequest<'_>) -> Result<(), AuthError> {
        let is_mfa = request.totp.is_some();
        let response = self
            .client
            .post(self.url(LOGIN_PATH))
            .headers(Self::base_headers())
            .json(request)
            .send()
            .await?;

        let status = response.status();
        debug!(status = %status, mfa = is_mfa, "Login response received");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let reason = Self::describe_failure(status, &body);
            return Err(if is_mfa {
                AuthError::Mfa(reason)
            } else if status == StatusCode::FORBIDDEN {
                AuthError::MfaRequired
            } else {
                AuthError::Credentials(reason)
            });
        }

        let parsed: LoginResponse = response
            .json()
            .await
            .map_err(|e| AuthError::InvalidResponse(format!("Failed to parse login response: {}", e)))?;

        match parsed.token.filter(|t| !t.is_empty()) {
            Some(token) => {
                self.token = Some(SessionToken::new(token));
                Ok(())
            }
            None => Err(AuthError::InvalidResponse(
                "login response did not contain a token".to_string(),
            )),
        }
    }

    async fn graphql(&self, operation_name: &str, query: &str) -> Result<Value, ApiError> {
        let body = GraphqlRequest {
            operation_name,
            query,
            variables: Value::Object(Default::default()),
        };

        let response = self
            .client
            .post(self.url(GRAPHQL_PATH))
            .headers(self.auth_headers()?)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::from_status(status, &body));
        }

        let parsed: GraphqlResponse = response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse {} response: {}", operation_name, e)))?;

        if !parsed.errors.is_empty() {
            let messages: Vec<_> = parsed.errors.into_iter().map(|e| e.message).collect();
            warn!(operation = operation_name, errors = ?messages, "GraphQL errors returned");
            return Err(ApiError::InvalidResponse(messages.join("; ")));
        }

        parsed
            .data
            .ok_or_else(|| ApiError::InvalidResponse(format!("{} response has no data", operation_name)))
    }
}

impl SessionSource for MonarchClient {
    fn session_token(&self) -> Option<SessionToken> {
        self.token.clone()
    }
}

#[async_trait]
impl FinanceApi for MonarchClient {
    async fn login(&mut self, email: &str, password: &str) -> Result<(), AuthError> {
        self.token = None;
        self.post_login(&LoginRequest {
            username: email,
            password,
            trusted_device: false,
            supports_mfa: true,
            totp: None,
        })
        .await
    }

    async fn submit_mfa(&mut self, email: &str, password: &str, code: &str) -> Result<(), AuthError> {
        self.post_login(&LoginRequest {
            username: email,
            password,
            trusted_device: false,
            supports_mfa: true,
            totp: Some(code),
        })
        .await
    }

    async fn fetch_accounts(&self) -> Result<Value, ApiError> {
        self.graphql("GetAccounts", GET_ACCOUNTS_QUERY).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use serde_json::json;

    fn client_for(server: &Server) -> MonarchClient {
        let config = Config {
            api_url: server.url(),
            ..Config::default()
        };
        MonarchClient::new(&config).expect("client")
    }

    #[tokio::test]
    async fn test_login_success_sets_token() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/auth/login/")
            .match_header("client-platform", "web")
            .match_body(Matcher::PartialJson(json!({
                "username": "user@example.com",
                "password": "correct",
                "supports_mfa": true
            })))
            .with_status(200)
            .with_body(json!({"token": "tok-123"}).to_string())
            .create_async()
            .await;

        let mut client = client_for(&server);
        client.login("user@example.com", "correct").await.unwrap();

        mock.assert_async().await;
        assert_eq!(client.session_token(), Some(SessionToken::new("tok-123")));
    }

    #[tokio::test]
    async fn test_login_403_is_mfa_required() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/auth/login/")
            .with_status(403)
            .with_body(json!({"detail": "Multi-Factor Auth Required"}).to_string())
            .create_async()
            .await;

        let mut client = client_for(&server);
        let err = client.login("user@example.com", "correct").await.unwrap_err();
        assert!(matches!(err, AuthError::MfaRequired));
        assert!(client.session_token().is_none());
    }

    #[tokio::test]
    async fn test_login_bad_password_is_credential_error() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/auth/login/")
            .with_status(401)
            .with_body(json!({"detail": "Invalid email or password"}).to_string())
            .create_async()
            .await;

        let mut client = client_for(&server);
        match client.login("user@example.com", "wrong").await {
            Err(AuthError::Credentials(reason)) => {
                assert!(reason.contains("Invalid email or password"));
            }
            other => panic!("expected credential error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_login_without_token_is_invalid_response() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/auth/login/")
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        let mut client = client_for(&server);
        let err = client.login("user@example.com", "correct").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_submit_mfa_sends_code() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/auth/login/")
            .match_body(Matcher::PartialJson(json!({"totp": "123456"})))
            .with_status(200)
            .with_body(json!({"token": "tok-mfa"}).to_string())
            .create_async()
            .await;

        let mut client = client_for(&server);
        client
            .submit_mfa("user@example.com", "correct", "123456")
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(client.session_token(), Some(SessionToken::new("tok-mfa")));
    }

    #[tokio::test]
    async fn test_submit_mfa_rejected_code() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/auth/login/")
            .with_status(403)
            .with_body(json!({"error_code": "MFA_CODE_INVALID"}).to_string())
            .create_async()
            .await;

        let mut client = client_for(&server);
        match client.submit_mfa("user@example.com", "correct", "000000").await {
            Err(AuthError::Mfa(reason)) => assert!(reason.contains("MFA_CODE_INVALID")),
            other => panic!("expected MFA error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fetch_accounts_uses_token() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/graphql")
            .match_header("authorization", "Token tok-123")
            .match_body(Matcher::PartialJson(json!({"operationName": "GetAccounts"})))
            .with_status(200)
            .with_body(json!({"data": {"accounts": [{"id": "a"}, {"id": "b"}]}}).to_string())
            .create_async()
            .await;

        let client = client_for(&server).with_token(SessionToken::new("tok-123"));
        let data = client.fetch_accounts().await.unwrap();

        mock.assert_async().await;
        assert_eq!(data["accounts"].as_array().map(|a| a.len()), Some(2));
    }

    #[tokio::test]
    async fn test_fetch_accounts_requires_session() {
        let server = Server::new_async().await;
        let client = client_for(&server);
        let err = client.fetch_accounts().await.unwrap_err();
        assert!(matches!(err, ApiError::NotAuthenticated));
    }

    #[tokio::test]
    async fn test_fetch_accounts_graphql_errors() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/graphql")
            .with_status(200)
            .with_body(json!({"data": null, "errors": [{"message": "boom"}]}).to_string())
            .create_async()
            .await;

        let client = client_for(&server).with_token(SessionToken::new("tok"));
        match client.fetch_accounts().await {
            Err(ApiError::InvalidResponse(msg)) => assert_eq!(msg, "boom"),
            other => panic!("expected invalid response, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_fetch_accounts_expired_session() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/graphql")
            .with_status(401)
            .create_async()
            .await;

        let client = client_for(&server).with_token(SessionToken::new("stale"));
        let err = client.fetch_accounts().await.unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized));
    }

    #[test]
    fn test_describe_failure() {
        assert_eq!(
            MonarchClient::describe_failure(StatusCode::UNAUTHORIZED, r#"{"detail":"bad"}"#),
            "HTTP 401 Unauthorized: bad"
        );
        assert_eq!(
            MonarchClient::describe_failure(StatusCode::BAD_REQUEST, ""),
            "HTTP 400 Bad Request"
        );
    }
}
