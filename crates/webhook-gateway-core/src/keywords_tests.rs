//! Tests for [`KeywordDetector`].

use super::*;

fn detector() -> KeywordDetector {
    KeywordDetector::new(DEFAULT_KEYWORD).unwrap()
}

mod detect_tests {
    use super::*;

    #[test]
    fn test_matches_at_start_of_text() {
        assert!(detector().detect("@amber"));
        assert!(detector().detect("@amber review this PR"));
    }

    #[test]
    fn test_matches_after_whitespace() {
        let d = detector();
        assert!(d.detect("Please @amber analyze this"));
        assert!(d.detect("Line 1\n@amber fix the bug"));
        assert!(d.detect("\t@amber"));
        assert!(d.detect("\n@amber"));
    }

    #[test]
    fn test_matches_before_punctuation() {
        let d = detector();
        assert!(d.detect("@amber!"));
        assert!(d.detect("@amber, can you help?"));
        assert!(d.detect("thanks @amber."));
    }

    #[test]
    fn test_matches_after_punctuation_and_emoji() {
        let d = detector();
        assert!(d.detect("(@amber) please look"));
        assert!(d.detect("🚀@amber ship it"));
        assert!(d.detect("cc:@amber"));
    }

    #[test]
    fn test_matching_ignores_case() {
        let d = detector();
        assert!(d.detect("@Amber review"));
        assert!(d.detect("hey @AMBER"));
    }

    #[test]
    fn test_rejects_longer_handles() {
        let d = detector();
        assert!(!d.detect("@amberbot review this"));
        assert!(!d.detect("Contact @amber123"));
        assert!(!d.detect("@amber_bot"));
        assert!(!d.detect("@amber-bot please"));
    }

    #[test]
    fn test_rejects_email_addresses() {
        let d = detector();
        assert!(!d.detect("user@amber.com"));
        assert!(!d.detect("email me at someone@amber.io"));
    }

    #[test]
    fn test_rejects_text_without_mention() {
        let d = detector();
        assert!(!d.detect(""));
        assert!(!d.detect("LGTM, merging"));
        assert!(!d.detect("amber is a colour"));
    }

    #[test]
    fn test_later_valid_mention_still_counts() {
        assert!(detector().detect("@amberbot is not it, but @amber is"));
    }

    #[test]
    fn test_custom_keyword() {
        let d = KeywordDetector::new("@helper").unwrap();
        assert_eq!(d.keyword(), "@helper");
        assert!(d.detect("@helper go"));
        assert!(!d.detect("@amber go"));
    }

    #[test]
    fn test_empty_keyword_rejected() {
        assert!(matches!(KeywordDetector::new("  "), Err(KeywordError::Empty)));
    }
}

mod extract_command_tests {
    use super::*;

    #[test]
    fn test_returns_trimmed_remainder() {
        assert_eq!(
            detector().extract_command("@amber review this PR"),
            "review this PR"
        );
    }

    #[test]
    fn test_preserves_original_case() {
        assert_eq!(
            detector().extract_command("Hey @AMBER Fix The Tests  "),
            "Fix The Tests"
        );
    }

    #[test]
    fn test_uses_first_valid_mention() {
        assert_eq!(
            detector().extract_command("user@amber.com says: @amber check the docs"),
            "check the docs"
        );
    }

    #[test]
    fn test_returns_multiline_remainder() {
        assert_eq!(
            detector().extract_command("@amber\nstep one\nstep two\n"),
            "step one\nstep two"
        );
    }

    #[test]
    fn test_empty_without_mention() {
        assert_eq!(detector().extract_command("nothing here"), "");
        assert_eq!(detector().extract_command("@amberbot do it"), "");
    }

    #[test]
    fn test_empty_when_mention_is_last() {
        assert_eq!(detector().extract_command("thanks @amber"), "");
    }
}
