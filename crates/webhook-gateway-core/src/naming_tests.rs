use super::*;

fn is_dns_label(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= MAX_NAME_LENGTH
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        && !name.starts_with('-')
        && !name.ends_with('-')
}

#[test]
fn test_pr_session_name_format() {
    let name = session_name("acme/backend", SessionSubject::PullRequest(42), "delivery-1");

    assert!(name.starts_with("webhook-acme-backend-pr42-"));
    let hash = name.rsplit('-').next().unwrap();
    assert_eq!(hash.len(), 8);
    assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    assert!(is_dns_label(&name));
}

#[test]
fn test_issue_session_name_format() {
    let name = session_name("acme/backend", SessionSubject::Issue(7), "delivery-1");
    assert!(name.starts_with("webhook-acme-backend-issue7-"));
}

#[test]
fn test_names_are_deterministic() {
    let a = session_name("acme/backend", SessionSubject::PullRequest(1), "abc-123");
    let b = session_name("acme/backend", SessionSubject::PullRequest(1), "abc-123");
    assert_eq!(a, b);
}

#[test]
fn test_distinct_deliveries_get_distinct_names() {
    let a = session_name("acme/backend", SessionSubject::PullRequest(1), "abc-123");
    let b = session_name("acme/backend", SessionSubject::PullRequest(1), "abc-124");
    assert_ne!(a, b);
}

#[test]
fn test_hash_is_sha256_prefix_of_delivery_id() {
    // sha256("") = e3b0c442...
    let name = session_name("a/b", SessionSubject::Issue(1), "");
    assert_eq!(name, "webhook-a-b-issue1-e3b0c442");
}

#[test]
fn test_uppercase_and_symbols_are_sanitized() {
    let name = session_name("Acme_Corp/My.Repo", SessionSubject::PullRequest(3), "d");
    assert!(name.starts_with("webhook-acme-corp-my-repo-pr3-"));
    assert!(is_dns_label(&name));
}

#[test]
fn test_long_names_are_truncated_to_63_chars() {
    let repository = format!("{}/{}", "o".repeat(40), "r".repeat(40));
    let name = session_name(&repository, SessionSubject::PullRequest(123456), "delivery");

    assert!(name.len() <= MAX_NAME_LENGTH, "{} is {} chars", name, name.len());
    assert!(name.starts_with("webhook-oooo"));
    assert!(name.contains("-pr123456-"));
    assert!(is_dns_label(&name));
}

#[test]
fn test_truncation_does_not_leave_double_hyphen() {
    // Owner sized so the cut lands right after the owner-repo separator.
    let identifier_len = "pr1".len();
    let budget = MAX_NAME_LENGTH - "webhook-".len() - identifier_len - 8 - 3;
    let owner = "o".repeat(budget);
    let repository = format!("{owner}/{}", "r".repeat(20));

    let name = session_name(&repository, SessionSubject::PullRequest(1), "x");
    assert!(!name.contains("--"), "unexpected double hyphen in {name}");
    assert!(is_dns_label(&name));
}

#[test]
fn test_malformed_repository_uses_unknown() {
    let name = session_name("not-a-repo", SessionSubject::Issue(5), "d");
    assert!(name.starts_with("webhook-unknown-unknown-issue5-"));
}

mod sanitize_tests {
    use super::*;

    #[test]
    fn test_lowercases_and_replaces() {
        assert_eq!(sanitize_dns("Hello World"), "hello-world");
        assert_eq!(sanitize_dns("a.b_c"), "a-b-c");
    }

    #[test]
    fn test_collapses_and_trims_hyphens() {
        assert_eq!(sanitize_dns("--a---b--"), "a-b");
        assert_eq!(sanitize_dns("...x"), "x");
    }

    #[test]
    fn test_non_ascii_becomes_hyphen() {
        assert_eq!(sanitize_dns("café-bar"), "caf-bar");
    }

    #[test]
    fn test_all_symbols_yields_empty() {
        assert_eq!(sanitize_dns("!!!"), "");
    }
}

mod label_value_tests {
    use super::*;

    #[test]
    fn test_repository_slash_becomes_dot() {
        assert_eq!(repository_label("acme/backend"), "acme.backend");
        assert_eq!(repository_label("Acme/My_Repo.rs"), "Acme.My_Repo.rs");
    }

    #[test]
    fn test_invalid_characters_are_replaced_and_ends_trimmed() {
        assert_eq!(label_value("../evil id/!!"), "evil-id");
        assert_eq!(label_value("-_."), "");
    }

    #[test]
    fn test_value_is_capped_at_63_chars() {
        let value = label_value(&"a".repeat(100));
        assert_eq!(value.len(), MAX_NAME_LENGTH);
    }

    #[test]
    fn test_uuid_delivery_id_is_unchanged() {
        let id = "72d3162e-cc78-11e3-81ab-4c9367dc0958";
        assert_eq!(label_value(id), id);
    }
}
