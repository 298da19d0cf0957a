//! Deterministic session naming.
//!
//! Names have the form `webhook-{owner}-{repo}-{pr<N>|issue<N>}-{hash8}`
//! where `hash8` is the first 8 hex characters of SHA-256 of the delivery
//! id. The same inputs always give the same name, so a redelivery after a
//! restart collides with the session that already exists instead of
//! creating a second one.
//!
//! Names are DNS-1123 labels: lowercase alphanumerics and `-`, at most 63
//! characters.

use crate::{split_repository, SessionSubject};
use sha2::{Digest, Sha256};

/// Maximum length of a resource name
pub const MAX_NAME_LENGTH: usize = 63;

const NAME_PREFIX: &str = "webhook-";
const HASH_LENGTH: usize = 8;

/// Session name for a PR or issue event
pub fn session_name(repository: &str, subject: SessionSubject, delivery_id: &str) -> String {
    let identifier = match subject {
        SessionSubject::PullRequest(n) => format!("pr{n}"),
        SessionSubject::Issue(n) => format!("issue{n}"),
    };
    compose(repository, &identifier, delivery_id)
}

/// Convert `s` into a DNS-1123 fragment.
///
/// Lowercases, replaces every character outside `[a-z0-9]` with `-`,
/// collapses runs of `-` and trims them from both ends.
pub fn sanitize_dns(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars().flat_map(char::to_lowercase) {
        let c = if c.is_ascii_lowercase() || c.is_ascii_digit() {
            c
        } else {
            '-'
        };
        if c == '-' && (out.is_empty() || out.ends_with('-')) {
            continue;
        }
        out.push(c);
    }
    while out.ends_with('-') {
        out.pop();
    }
    out
}

/// Convert `s` into a valid label value.
///
/// Keeps `[A-Za-z0-9._-]`, replaces everything else with `-`, caps the
/// result at [`MAX_NAME_LENGTH`] characters and trims non-alphanumerics
/// from both ends. The result may be empty, which is a valid value.
pub fn label_value(s: &str) -> String {
    let mut out: String = s
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '-'
            }
        })
        .take(MAX_NAME_LENGTH)
        .collect();

    while out.ends_with(|c: char| !c.is_ascii_alphanumeric()) {
        out.pop();
    }
    let leading = out.len() - out.trim_start_matches(|c: char| !c.is_ascii_alphanumeric()).len();
    out.drain(..leading);
    out
}

/// Label value for a repository full name: `owner/repo` becomes `owner.repo`
pub fn repository_label(repository: &str) -> String {
    label_value(&repository.replace('/', "."))
}

fn delivery_hash(delivery_id: &str) -> String {
    let digest = Sha256::digest(delivery_id.as_bytes());
    let mut hash = hex::encode(digest);
    hash.truncate(HASH_LENGTH);
    hash
}

fn compose(repository: &str, identifier: &str, delivery_id: &str) -> String {
    let (owner, repo) = split_repository(repository)
        .map(|(owner, repo)| (sanitize_dns(owner), sanitize_dns(repo)))
        .unwrap_or_else(|| ("unknown".to_string(), "unknown".to_string()));

    let hash = delivery_hash(delivery_id);
    let name = format!("{NAME_PREFIX}{owner}-{repo}-{identifier}-{hash}");
    if name.len() <= MAX_NAME_LENGTH {
        return name;
    }

    // Only the owner-repo segment gives way; the identifier and hash keep
    // the name unique. Three hyphens separate the four parts.
    let budget = MAX_NAME_LENGTH
        .saturating_sub(NAME_PREFIX.len() + identifier.len() + hash.len() + 3);
    let mut owner_repo = format!("{owner}-{repo}");
    owner_repo.truncate(budget);
    while owner_repo.ends_with('-') {
        owner_repo.pop();
    }

    format!("{NAME_PREFIX}{owner_repo}-{identifier}-{hash}")
}

#[cfg(test)]
#[path = "naming_tests.rs"]
mod tests;
