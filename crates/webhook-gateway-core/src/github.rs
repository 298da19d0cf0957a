//! GitHub feedback: installation tokens and issue comments.
//!
//! The gateway reports back on the PR or issue that triggered it. Every
//! comment is authenticated with an installation token from a
//! [`TokenManager`]; how tokens are minted is outside this crate.

use crate::{logging, InstallationId};
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;
use url::Url;
use zeroize::Zeroizing;

/// Default GitHub REST API base URL
pub const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";

/// Default `User-Agent` for GitHub API calls
pub const DEFAULT_USER_AGENT: &str = "Webhook-Gateway";

/// Default timeout for one comment request
pub const DEFAULT_COMMENT_TIMEOUT: Duration = Duration::from_secs(15);

const GITHUB_API_VERSION: &str = "2022-11-28";
const GITHUB_ACCEPT: &str = "application/vnd.github+json";

// ============================================================================
// Installation tokens
// ============================================================================

/// Installation access token.
///
/// The token is wiped from memory on drop and never printed by `Debug`.
#[derive(Clone)]
pub struct InstallationToken {
    token: Zeroizing<String>,
    expires_at: DateTime<Utc>,
}

impl InstallationToken {
    pub fn new(token: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            token: Zeroizing::new(token.into()),
            expires_at,
        }
    }

    /// Token value for the `Authorization` header
    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

impl std::fmt::Debug for InstallationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstallationToken")
            .field("token", &"<REDACTED>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("no installation token available for installation {installation_id}")]
    Unavailable { installation_id: InstallationId },

    #[error("installation token request failed: {message}")]
    Request { message: String },
}

/// Source of installation tokens
#[async_trait]
pub trait TokenManager: Send + Sync {
    async fn mint_installation_token(
        &self,
        installation_id: InstallationId,
    ) -> Result<InstallationToken, TokenError>;
}

/// Hands out one pre-provisioned token for every installation.
///
/// Suitable when the deployment injects a token from a secret store.
pub struct StaticTokenManager {
    token: Zeroizing<String>,
    lifetime: ChronoDuration,
}

impl StaticTokenManager {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: Zeroizing::new(token.into()),
            lifetime: ChronoDuration::hours(1),
        }
    }
}

impl std::fmt::Debug for StaticTokenManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticTokenManager")
            .field("token", &"<REDACTED>")
            .finish()
    }
}

#[async_trait]
impl TokenManager for StaticTokenManager {
    async fn mint_installation_token(
        &self,
        installation_id: InstallationId,
    ) -> Result<InstallationToken, TokenError> {
        if self.token.is_empty() {
            return Err(TokenError::Unavailable { installation_id });
        }
        Ok(InstallationToken::new(
            self.token.as_str(),
            Utc::now() + self.lifetime,
        ))
    }
}

// ============================================================================
// Comments
// ============================================================================

/// Errors posting a comment
#[derive(Debug, thiserror::Error)]
pub enum CommentError {
    #[error("failed to mint installation token: {0}")]
    Token(#[from] TokenError),

    #[error("GitHub API returned status {status}: {message}")]
    HttpError { status: u16, message: String },

    #[error("Authentication failed")]
    AuthenticationFailed,

    #[error("Authorization failed")]
    AuthorizationFailed,

    #[error("Resource not found")]
    NotFound,

    #[error("Request timeout")]
    Timeout,

    #[error("HTTP client error: {0}")]
    HttpClientError(#[source] reqwest::Error),

    #[error("invalid GitHub API URL: {0}")]
    InvalidUrl(String),
}

impl CommentError {
    /// Whether retrying the same comment could succeed
    pub fn is_transient(&self) -> bool {
        match self {
            Self::HttpError { status, .. } => *status >= 500 || *status == 429,
            Self::Timeout | Self::HttpClientError(_) => true,
            Self::Token(_)
            | Self::AuthenticationFailed
            | Self::AuthorizationFailed
            | Self::NotFound
            | Self::InvalidUrl(_) => false,
        }
    }
}

impl From<reqwest::Error> for CommentError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else {
            Self::HttpClientError(e)
        }
    }
}

/// Posts feedback comments on issues and pull requests
#[async_trait]
pub trait IssueCommenter: Send + Sync {
    async fn post_confirmation(
        &self,
        installation_id: InstallationId,
        repository: &str,
        issue_number: u64,
        session_id: &str,
        delivery_id: &str,
    ) -> Result<(), CommentError>;

    async fn post_error(
        &self,
        installation_id: InstallationId,
        repository: &str,
        issue_number: u64,
        error_kind: &str,
        message: &str,
        delivery_id: &str,
    ) -> Result<(), CommentError>;
}

/// Confirmation comment body
pub fn confirmation_comment(session_id: &str) -> String {
    format!(
        "✅ **Session Created**\n\n\
         I've created an agentic session to help with your request.\n\n\
         **Session ID:** `{session_id}`\n\
         **Status:** Processing your request\n\n\
         I'll post my findings here when complete. This may take a few moments..."
    )
}

/// Error comment body with guidance for `error_kind`
pub fn error_comment(error_kind: &str, message: &str, delivery_id: &str) -> String {
    let guided = |title: &str, action: &str| {
        format!(
            "❌ **Session Creation Failed: {title}**\n\n\
             {message}\n\n\
             **Action Required:** {action}\n\n\
             _Delivery ID: `{delivery_id}`_"
        )
    };

    match error_kind {
        "quota_exceeded" => guided(
            "Quota Exceeded",
            "Contact your administrator to increase session quotas or wait for existing sessions to complete.",
        ),
        "not_authorized" => guided(
            "Not Authorized",
            "Install the GitHub App for this repository. Visit your repository settings → GitHub Apps to install.",
        ),
        "invalid_configuration" => guided(
            "Configuration Error",
            "Check your project settings and ensure webhook integration is properly configured.",
        ),
        _ => format!(
            "❌ **Session Creation Failed**\n\n\
             {message}\n\n\
             **Action Required:** This is an unexpected error. Please contact your administrator with the delivery ID below.\n\n\
             _Delivery ID: `{delivery_id}`_\n\
             _Error Type: `{error_kind}`_"
        ),
    }
}

#[derive(Serialize)]
struct CreateCommentRequest<'a> {
    body: &'a str,
}

/// [`IssueCommenter`] backed by the GitHub REST API
pub struct GitHubCommenter {
    client: reqwest::Client,
    token_manager: Arc<dyn TokenManager>,
    api_base_url: Url,
}

impl GitHubCommenter {
    pub fn new(
        token_manager: Arc<dyn TokenManager>,
        api_base_url: &str,
        user_agent: &str,
        timeout: Duration,
    ) -> Result<Self, CommentError> {
        let api_base_url =
            Url::parse(api_base_url).map_err(|e| CommentError::InvalidUrl(e.to_string()))?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(GITHUB_ACCEPT));
        headers.insert(
            "x-github-api-version",
            HeaderValue::from_static(GITHUB_API_VERSION),
        );
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(user_agent)
                .map_err(|e| CommentError::InvalidUrl(format!("invalid user agent: {e}")))?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(CommentError::HttpClientError)?;

        Ok(Self {
            client,
            token_manager,
            api_base_url,
        })
    }

    fn comments_url(&self, repository: &str, issue_number: u64) -> String {
        format!(
            "{}/repos/{}/issues/{}/comments",
            self.api_base_url.as_str().trim_end_matches('/'),
            repository,
            issue_number
        )
    }

    #[instrument(skip(self, body))]
    async fn post_comment(
        &self,
        installation_id: InstallationId,
        repository: &str,
        issue_number: u64,
        body: &str,
        comment_type: &str,
        delivery_id: &str,
    ) -> Result<(), CommentError> {
        let token = match self
            .token_manager
            .mint_installation_token(installation_id)
            .await
        {
            Ok(token) => token,
            Err(e) => {
                logging::error(
                    delivery_id,
                    "github_commenter",
                    "Failed to mint installation token",
                    Some(&e),
                );
                return Err(e.into());
            }
        };

        let url = self.comments_url(repository, issue_number);
        let auth = Zeroizing::new(format!("token {}", token.token()));

        let response = match self
            .client
            .post(&url)
            .header(AUTHORIZATION, auth.as_str())
            .header(CONTENT_TYPE, "application/json")
            .json(&CreateCommentRequest { body })
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                logging::error(
                    delivery_id,
                    "github_commenter",
                    "Failed to post comment to GitHub",
                    Some(&e),
                );
                logging::github_comment_posted(delivery_id, comment_type, &url, false);
                return Err(e.into());
            }
        };

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            logging::error(
                delivery_id,
                "github_commenter",
                &format!("GitHub API returned status {}: {}", status.as_u16(), message),
                None,
            );
            logging::github_comment_posted(delivery_id, comment_type, &url, false);

            return Err(match status.as_u16() {
                401 => CommentError::AuthenticationFailed,
                403 => CommentError::AuthorizationFailed,
                404 => CommentError::NotFound,
                code => CommentError::HttpError {
                    status: code,
                    message,
                },
            });
        }

        logging::github_comment_posted(delivery_id, comment_type, &url, true);
        Ok(())
    }
}

#[async_trait]
impl IssueCommenter for GitHubCommenter {
    async fn post_confirmation(
        &self,
        installation_id: InstallationId,
        repository: &str,
        issue_number: u64,
        session_id: &str,
        delivery_id: &str,
    ) -> Result<(), CommentError> {
        let body = confirmation_comment(session_id);
        self.post_comment(
            installation_id,
            repository,
            issue_number,
            &body,
            "confirmation",
            delivery_id,
        )
        .await
    }

    async fn post_error(
        &self,
        installation_id: InstallationId,
        repository: &str,
        issue_number: u64,
        error_kind: &str,
        message: &str,
        delivery_id: &str,
    ) -> Result<(), CommentError> {
        let body = error_comment(error_kind, message, delivery_id);
        self.post_comment(
            installation_id,
            repository,
            issue_number,
            &body,
            "error",
            delivery_id,
        )
        .await
    }
}

#[cfg(test)]
#[path = "github_tests.rs"]
mod tests;
