use super::*;
use std::sync::atomic::{AtomicUsize, Ordering};

struct MockRegistry {
    records: Mutex<Vec<InstallationRecord>>,
    fail: bool,
    calls: AtomicUsize,
}

impl MockRegistry {
    fn with(records: Vec<InstallationRecord>) -> Arc<Self> {
        Arc::new(Self {
            records: Mutex::new(records),
            fail: false,
            calls: AtomicUsize::new(0),
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            records: Mutex::new(Vec::new()),
            fail: true,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl InstallationRegistry for MockRegistry {
    async fn list_installations(&self) -> Result<Vec<InstallationRecord>, StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(StoreError::Transport {
                message: "connection refused".to_string(),
            });
        }
        Ok(self.records.lock().unwrap().clone())
    }
}

fn record(id: i64, repositories: &[&str]) -> InstallationRecord {
    InstallationRecord {
        installation_id: id,
        github_user_id: "user-1".to_string(),
        repositories: repositories.iter().map(|r| r.to_string()).collect(),
    }
}

fn scoped(registry: Arc<MockRegistry>) -> InstallationVerifier {
    InstallationVerifier::new(
        registry,
        InstallationPolicy::RepositoryScoped,
        DEFAULT_INSTALLATION_CACHE_TTL,
    )
}

mod policy_tests {
    use super::*;

    #[tokio::test]
    async fn test_scoped_policy_requires_listed_repository() {
        let registry = MockRegistry::with(vec![
            record(11, &["acme/frontend"]),
            record(22, &["acme/backend"]),
        ]);
        let verifier = scoped(registry);

        let id = verifier.verify("acme/backend").await.unwrap();
        assert_eq!(id.as_i64(), 22);
    }

    #[tokio::test]
    async fn test_scoped_policy_ignores_case() {
        let registry = MockRegistry::with(vec![record(22, &["Acme/Backend"])]);
        let verifier = scoped(registry);

        assert_eq!(verifier.verify("acme/backend").await.unwrap().as_i64(), 22);
    }

    #[tokio::test]
    async fn test_scoped_policy_rejects_unlisted_repository() {
        let registry = MockRegistry::with(vec![record(11, &["acme/frontend"])]);
        let verifier = scoped(registry);

        let err = verifier.verify("acme/backend").await.unwrap_err();
        assert!(matches!(
            err,
            InstallationError::NotAuthorized { ref repository } if repository == "acme/backend"
        ));
    }

    #[tokio::test]
    async fn test_any_installation_accepts_first_valid_record() {
        let registry = MockRegistry::with(vec![record(0, &[]), record(33, &[])]);
        let verifier = InstallationVerifier::new(
            registry,
            InstallationPolicy::AnyInstallation,
            DEFAULT_INSTALLATION_CACHE_TTL,
        );

        assert_eq!(verifier.verify("any/repo").await.unwrap().as_i64(), 33);
    }

    #[tokio::test]
    async fn test_invalid_ids_are_skipped() {
        let registry = MockRegistry::with(vec![record(-1, &["acme/backend"])]);
        let verifier = scoped(registry);

        assert!(matches!(
            verifier.verify("acme/backend").await,
            Err(InstallationError::NotAuthorized { .. })
        ));
    }

    #[tokio::test]
    async fn test_empty_registry_is_not_authorized() {
        let verifier = scoped(MockRegistry::with(Vec::new()));
        assert!(matches!(
            verifier.verify("acme/backend").await,
            Err(InstallationError::NotAuthorized { .. })
        ));
    }

    #[tokio::test]
    async fn test_registry_failure_is_distinct_from_not_authorized() {
        let verifier = scoped(MockRegistry::failing());
        assert!(matches!(
            verifier.verify("acme/backend").await,
            Err(InstallationError::Registry(_))
        ));
        assert_eq!(verifier.cache_size(), 0);
    }

    #[test]
    fn test_policy_serde_names() {
        let p: InstallationPolicy = serde_json::from_str("\"any_installation\"").unwrap();
        assert_eq!(p, InstallationPolicy::AnyInstallation);
        assert_eq!(InstallationPolicy::default(), InstallationPolicy::RepositoryScoped);
        assert_eq!(
            serde_json::to_string(&InstallationPolicy::RepositoryScoped).unwrap(),
            "\"repository_scoped\""
        );
    }

    #[test]
    fn test_record_deserializes_config_map_format() {
        let rec: InstallationRecord = serde_json::from_str(
            r#"{"installationId": 98765, "githubUserId": "octocat", "repositories": ["acme/backend"]}"#,
        )
        .unwrap();
        assert_eq!(rec.installation_id, 98765);
        assert_eq!(rec.github_user_id, "octocat");
        assert!(rec.covers("acme/backend"));

        let bare: InstallationRecord =
            serde_json::from_str(r#"{"installationId": 1}"#).unwrap();
        assert!(bare.repositories.is_empty());
    }
}

mod cache_tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_positive_result_is_cached_until_ttl() {
        let registry = MockRegistry::with(vec![record(22, &["acme/backend"])]);
        let verifier = InstallationVerifier::new(
            registry.clone(),
            InstallationPolicy::RepositoryScoped,
            Duration::from_secs(60),
        );

        verifier.verify("acme/backend").await.unwrap();
        verifier.verify("acme/backend").await.unwrap();
        assert_eq!(registry.calls(), 1);
        assert_eq!(verifier.cache_size(), 1);

        tokio::time::advance(Duration::from_secs(61)).await;
        verifier.verify("acme/backend").await.unwrap();
        assert_eq!(registry.calls(), 2);
    }

    #[tokio::test]
    async fn test_negative_result_is_not_cached() {
        let registry = MockRegistry::with(Vec::new());
        let verifier = scoped(registry.clone());

        assert!(verifier.verify("acme/backend").await.is_err());
        assert_eq!(verifier.cache_size(), 0);

        registry
            .records
            .lock()
            .unwrap()
            .push(record(44, &["acme/backend"]));
        assert_eq!(verifier.verify("acme/backend").await.unwrap().as_i64(), 44);
        assert_eq!(registry.calls(), 2);
    }

    #[tokio::test]
    async fn test_invalidate_forces_refetch() {
        let registry = MockRegistry::with(vec![record(22, &["acme/backend"])]);
        let verifier = scoped(registry.clone());

        verifier.verify("acme/backend").await.unwrap();
        verifier.invalidate("acme/backend");
        assert_eq!(verifier.cache_size(), 0);

        verifier.verify("acme/backend").await.unwrap();
        assert_eq!(registry.calls(), 2);
    }

    #[tokio::test]
    async fn test_cache_key_ignores_case() {
        let registry = MockRegistry::with(vec![record(22, &["acme/backend"])]);
        let verifier = scoped(registry.clone());

        verifier.verify("Acme/Backend").await.unwrap();
        verifier.verify("acme/backend").await.unwrap();
        assert_eq!(registry.calls(), 1);
        assert_eq!(verifier.cache_size(), 1);

        verifier.invalidate("ACME/BACKEND");
        assert_eq!(verifier.cache_size(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_purges_expired_entries() {
        let registry = MockRegistry::with(vec![record(22, &["a/b", "c/d"])]);
        let verifier = InstallationVerifier::with_sweeper(
            registry,
            InstallationPolicy::RepositoryScoped,
            Duration::from_secs(60),
            Duration::from_secs(120),
        );

        verifier.verify("a/b").await.unwrap();
        verifier.verify("c/d").await.unwrap();
        assert_eq!(verifier.cache_size(), 2);

        tokio::time::sleep(Duration::from_secs(125)).await;
        assert_eq!(verifier.cache_size(), 0);

        verifier.shutdown().await;
        verifier.shutdown().await;
    }
}
