//! Common test utilities for integration tests
//!
//! Builds the full HTTP router over in-memory cluster collaborators and a
//! real GitHub commenter pointed at a wiremock server.

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, Response},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use webhook_gateway_api::{
    create_router, AppState, SecretString, ServiceConfig, WebhookHandler,
    WebhookHandlerComponents, WebhookMetrics,
};
use webhook_gateway_core::{
    github::StaticTokenManager,
    installation::{InstallationPolicy, InstallationRecord, InstallationRegistry},
    session::AgenticSession,
    signature::compute_signature,
    store::{GitHubInstallationBinding, ProjectSettings, ResourceStore, StoreError},
    DeduplicationCache, GitHubCommenter, InstallationVerifier, KeywordDetector,
    NamespaceResolver, SessionCreator,
};
use wiremock::MockServer;

pub const SECRET: &str = "integration-secret";
pub const INSTALLATION_ID: i64 = 555;
pub const INSTALLED_REPO: &str = "acme/backend";
pub const PROJECT_NAMESPACE: &str = "team-backend";

/// In-memory cluster: records created sessions and serves fixed
/// ProjectSettings and installation records
#[derive(Default)]
pub struct InMemoryCluster {
    pub settings: Vec<ProjectSettings>,
    pub installations: Vec<InstallationRecord>,
    pub created: Mutex<Vec<(String, AgenticSession)>>,
}

#[allow(dead_code)]
impl InMemoryCluster {
    /// One project owning [`INSTALLED_REPO`] through [`INSTALLATION_ID`]
    pub fn with_installed_repo() -> Self {
        Self {
            settings: vec![ProjectSettings {
                namespace: PROJECT_NAMESPACE.to_string(),
                github_installation: Some(GitHubInstallationBinding {
                    installation_id: INSTALLATION_ID,
                    repositories: vec![INSTALLED_REPO.to_string()],
                }),
            }],
            installations: vec![InstallationRecord {
                installation_id: INSTALLATION_ID,
                github_user_id: "1001".to_string(),
                repositories: vec![INSTALLED_REPO.to_string()],
            }],
            created: Mutex::new(Vec::new()),
        }
    }

    pub fn created_sessions(&self) -> Vec<(String, AgenticSession)> {
        self.created.lock().unwrap().clone()
    }
}

#[async_trait]
impl ResourceStore for InMemoryCluster {
    async fn create_session(
        &self,
        namespace: &str,
        session: &AgenticSession,
    ) -> Result<AgenticSession, StoreError> {
        let mut created = self.created.lock().unwrap();
        let name = session.metadata.name.clone().unwrap_or_default();
        if created
            .iter()
            .any(|(_, s)| s.metadata.name.as_deref() == Some(name.as_str()))
        {
            return Err(StoreError::AlreadyExists { name });
        }
        created.push((namespace.to_string(), session.clone()));
        Ok(session.clone())
    }

    async fn list_project_settings(&self) -> Result<Vec<ProjectSettings>, StoreError> {
        Ok(self.settings.clone())
    }
}

#[async_trait]
impl InstallationRegistry for InMemoryCluster {
    async fn list_installations(&self) -> Result<Vec<InstallationRecord>, StoreError> {
        Ok(self.installations.clone())
    }
}

/// Router plus the handles tests inspect after a request
pub struct TestGateway {
    pub router: Router,
    pub cluster: Arc<InMemoryCluster>,
    pub github: MockServer,
}

#[allow(dead_code)]
impl TestGateway {
    pub async fn start(cluster: InMemoryCluster) -> Self {
        let github = MockServer::start().await;
        let cluster = Arc::new(cluster);

        let mut config = ServiceConfig::default();
        config.webhooks.secret = Some(SecretString::new(SECRET));
        config.github.api_url = github.uri();

        let commenter = GitHubCommenter::new(
            Arc::new(StaticTokenManager::new("gh-test-token")),
            &github.uri(),
            "webhook-gateway-tests",
            Duration::from_secs(5),
        )
        .unwrap();

        let handler = WebhookHandler::new(WebhookHandlerComponents {
            secret: SecretString::new(SECRET),
            max_body_size: config.webhooks.max_body_size,
            dedup: Arc::new(DeduplicationCache::new(config.webhooks.dedup_ttl())),
            installations: Arc::new(InstallationVerifier::new(
                cluster.clone(),
                InstallationPolicy::RepositoryScoped,
                config.webhooks.installation_cache_ttl(),
            )),
            keywords: KeywordDetector::new(&config.webhooks.keyword).unwrap(),
            namespaces: NamespaceResolver::new(cluster.clone()),
            sessions: SessionCreator::new(cluster.clone()),
            commenter: Arc::new(commenter),
            metrics: Arc::new(WebhookMetrics::new().unwrap()),
        });

        let router = create_router(AppState::new(config, Arc::new(handler)));

        Self {
            router,
            cluster,
            github,
        }
    }

    /// Number of comments GitHub received
    pub async fn comment_count(&self) -> usize {
        self.github
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|r| r.method.as_str() == "POST" && r.url.path().ends_with("/comments"))
            .count()
    }

    /// Bodies of the comments GitHub received
    pub async fn comment_bodies(&self) -> Vec<String> {
        self.github
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter_map(|r| serde_json::from_slice::<Value>(&r.body).ok())
            .filter_map(|v| v["body"].as_str().map(str::to_string))
            .collect()
    }
}

/// `issue_comment` payload for a comment on pull request 42
#[allow(dead_code)]
pub fn pr_comment_payload(repository: &str, body: &str) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "action": "created",
        "issue": {
            "number": 42,
            "title": "Fix the flaky test",
            "state": "open",
            "html_url": format!("https://github.com/{repository}/pull/42"),
            "pull_request": {
                "url": format!("https://api.github.com/repos/{repository}/pulls/42"),
                "html_url": format!("https://github.com/{repository}/pull/42"),
            },
        },
        "comment": {
            "id": 1001,
            "body": body,
            "user": { "login": "octocat", "id": 1, "type": "User" },
        },
        "repository": { "id": 7, "full_name": repository, "private": false },
        "sender": { "login": "octocat", "id": 1 },
        "installation": { "id": INSTALLATION_ID },
    }))
    .unwrap()
}

/// Signed webhook POST
#[allow(dead_code)]
pub fn signed_request(event: &str, delivery_id: &str, payload: Vec<u8>) -> Request<Body> {
    let signature = compute_signature(&payload, SECRET.as_bytes());
    webhook_request(event, delivery_id, &signature, payload)
}

#[allow(dead_code)]
pub fn webhook_request(
    event: &str,
    delivery_id: &str,
    signature: &str,
    payload: Vec<u8>,
) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/webhook")
        .header("content-type", "application/json")
        .header("x-github-event", event)
        .header("x-github-delivery", delivery_id)
        .header("x-hub-signature-256", signature)
        .body(Body::from(payload))
        .unwrap()
}

#[allow(dead_code)]
pub async fn json_body(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[allow(dead_code)]
pub async fn text_body(response: Response<Body>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}
