//! Tests for [`ServiceConfig`] and secret loading.

use super::*;
use std::io::Write;

fn valid_config() -> ServiceConfig {
    let mut config = ServiceConfig::default();
    config.webhooks.secret = Some(SecretString::new("s3cret"));
    config
}

mod defaults_tests {
    use super::*;

    #[test]
    fn test_defaults_match_pipeline_constants() {
        let config = ServiceConfig::default();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.webhooks.endpoint_path, "/webhook");
        assert_eq!(config.webhooks.max_body_size, 10 * 1024 * 1024);
        assert_eq!(config.webhooks.keyword, "@amber");
        assert_eq!(config.webhooks.dedup_ttl(), Duration::from_secs(86_400));
        assert_eq!(config.webhooks.dedup_sweep_interval(), Duration::from_secs(600));
        assert_eq!(
            config.webhooks.installation_cache_ttl(),
            Duration::from_secs(3_600)
        );
        assert_eq!(
            config.webhooks.installation_sweep_interval(),
            Duration::from_secs(900)
        );
        assert_eq!(config.webhooks.session_timeout(), Duration::from_secs(5));
        assert_eq!(
            config.webhooks.installation_policy,
            InstallationPolicy::RepositoryScoped
        );
        assert_eq!(config.github.request_timeout(), Duration::from_secs(15));
        assert_eq!(config.github.api_url, "https://api.github.com");
        assert_eq!(config.cluster.installations_config_map, "github-app-installations");
    }

    #[test]
    fn test_partial_document_fills_defaults() {
        let config: ServiceConfig = serde_json::from_str(
            r#"{"server": {"port": 9090}, "webhooks": {"installation_policy": "any_installation"}}"#,
        )
        .unwrap();

        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(
            config.webhooks.installation_policy,
            InstallationPolicy::AnyInstallation
        );
        assert_eq!(config.webhooks.keyword, "@amber");
    }
}

mod validate_tests {
    use super::*;

    #[test]
    fn test_valid_config_passes() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_missing_secret_fails() {
        let config = ServiceConfig::default();
        assert!(matches!(config.validate(), Err(ConfigError::Missing { .. })));
    }

    #[test]
    fn test_empty_secret_fails() {
        let mut config = valid_config();
        config.webhooks.secret = Some(SecretString::new(""));
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn test_zero_port_fails() {
        let mut config = valid_config();
        config.server.port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_body_cap_fails() {
        let mut config = valid_config();
        config.webhooks.max_body_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_blank_keyword_fails() {
        let mut config = valid_config();
        config.webhooks.keyword = "   ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_relative_endpoint_path_fails() {
        let mut config = valid_config();
        config.webhooks.endpoint_path = "webhook".to_string();
        assert!(config.validate().is_err());
    }
}

mod secret_tests {
    use super::*;

    #[test]
    fn test_debug_redacts_secrets() {
        let mut config = valid_config();
        config.github.token = Some(SecretString::new("ghs_token"));
        let debug = format!("{config:?}");

        assert!(!debug.contains("s3cret"));
        assert!(!debug.contains("ghs_token"));
        assert!(debug.contains("<REDACTED>"));
    }

    #[test]
    fn test_configured_secret_wins() {
        let mut webhooks = WebhookConfig {
            secret: Some(SecretString::new("from-config")),
            ..WebhookConfig::default()
        };
        webhooks
            .load_secret_with(|_| Some("from-env".to_string()))
            .unwrap();
        assert_eq!(webhooks.secret.unwrap().expose(), "from-config");
    }

    #[test]
    fn test_secret_file_is_read_and_trimmed() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "  file-secret  ").unwrap();

        let mut webhooks = WebhookConfig {
            secret_file: Some(file.path().to_path_buf()),
            ..WebhookConfig::default()
        };
        webhooks
            .load_secret_with(|_| Some("from-env".to_string()))
            .unwrap();
        assert_eq!(webhooks.secret.unwrap().expose(), "file-secret");
    }

    #[test]
    fn test_unreadable_secret_file_fails() {
        let mut webhooks = WebhookConfig {
            secret_file: Some(PathBuf::from("/nonexistent/webhook-secret")),
            ..WebhookConfig::default()
        };
        let err = webhooks.load_secret_with(|_| None).unwrap_err();
        assert!(matches!(err, ConfigError::SecretFile { .. }));
    }

    #[test]
    fn test_environment_fallback() {
        let mut webhooks = WebhookConfig::default();
        webhooks
            .load_secret_with(|key| (key == WEBHOOK_SECRET_ENV).then(|| "from-env".to_string()))
            .unwrap();
        assert_eq!(webhooks.secret.unwrap().expose(), "from-env");
    }

    #[test]
    fn test_no_source_leaves_secret_unset() {
        let mut webhooks = WebhookConfig::default();
        webhooks.load_secret_with(|_| None).unwrap();
        assert!(webhooks.secret.is_none());
    }

    #[test]
    fn test_github_token_resolution() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "ghs_from_file").unwrap();

        let github = GitHubConfig {
            token_file: Some(file.path().to_path_buf()),
            ..GitHubConfig::default()
        };
        assert_eq!(
            github.resolve_token().unwrap().unwrap().expose(),
            "ghs_from_file"
        );

        assert!(GitHubConfig::default().resolve_token().unwrap().is_none());
    }
}
