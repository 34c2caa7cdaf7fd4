//! Deterministic relation identifiers
//!
//! A conversation between two people about one listing always lives under
//! the same key, whichever side starts it. The id is
//! `{lower}~{higher}~{context}`. Participant ids must already be in the key
//! alphabet `[A-Za-z0-9]`; the context has every other character replaced
//! by `_`. Without a context the last segment is [`NO_CONTEXT`].

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::MarketError;

/// Joins the three segments; never produced by [`sanitize`]
pub const SEPARATOR: char = '~';

/// Stands in for characters outside the key alphabet
pub const PLACEHOLDER: char = '_';

/// Context segment of a relation not tied to any listing; never produced by
/// [`sanitize`]
pub const NO_CONTEXT: &str = "-";

/// Key of a two-party relation
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RelationId(String);

impl RelationId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for RelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RelationId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Map a raw context id onto the key alphabet
pub fn sanitize(raw: &str) -> String {
    raw.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { PLACEHOLDER })
        .collect()
}

/// Derive the relation id for `party_a` and `party_b`, optionally scoped to
/// `context` (a listing id). Argument order does not matter.
pub fn resolve_relation_id(
    party_a: &str,
    party_b: &str,
    context: Option<&str>,
) -> Result<RelationId, MarketError> {
    for party in [party_a, party_b] {
        if party.is_empty() {
            return Err(MarketError::InvalidArgument(
                "participant id must not be empty".to_string(),
            ));
        }
        if !party.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(MarketError::InvalidArgument(format!(
                "participant id {:?} is outside the key alphabet",
                party
            )));
        }
    }
    if party_a == party_b {
        return Err(MarketError::InvalidArgument(format!(
            "cannot relate {} to itself",
            party_a
        )));
    }

    let (lower, higher) = if party_a < party_b {
        (party_a, party_b)
    } else {
        (party_b, party_a)
    };
    let context = match context {
        Some(context) => sanitize(context),
        None => NO_CONTEXT.to_string(),
    };

    Ok(RelationId(format!(
        "{}{sep}{}{sep}{}",
        lower,
        higher,
        context,
        sep = SEPARATOR
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_key_char(c: char) -> bool {
        c.is_ascii_alphanumeric() || c == PLACEHOLDER || c == SEPARATOR
    }

    #[test]
    fn test_order_independent() {
        let pairs = [
            ("alice", "bob"),
            ("9f2c", "0a1b"),
            ("Zed", "abe"),
            ("user1", "User1"),
        ];
        for (a, b) in pairs {
            for ctx in [None, Some("p1"), Some("listing/42?x")] {
                assert_eq!(
                    resolve_relation_id(a, b, ctx).unwrap(),
                    resolve_relation_id(b, a, ctx).unwrap()
                );
            }
        }
    }

    #[test]
    fn test_known_value() {
        let id = resolve_relation_id("bob", "alice", Some("prod-7")).unwrap();
        assert_eq!(id.as_str(), "alice~bob~prod_7");
    }

    #[test]
    fn test_unsafe_context_is_sanitized() {
        let id = resolve_relation_id("alice", "bob", Some("../conv/ation ~ 1.2/messages")).unwrap();
        assert!(id.as_str().chars().all(is_key_char));
        assert!(!id.as_str().contains('/'));
        assert_eq!(id.as_str().matches(SEPARATOR).count(), 2);
        assert!(id.as_str().ends_with("~___conv_ation___1_2_messages"));
    }

    #[test]
    fn test_absent_context_uses_sentinel() {
        let id = resolve_relation_id("alice", "bob", None).unwrap();
        assert_eq!(id.as_str(), "alice~bob~-");
        assert_ne!(id, resolve_relation_id("alice", "bob", Some("p1")).unwrap());
        assert_ne!(id, resolve_relation_id("alice", "bob", Some("")).unwrap());
        assert_ne!(id, resolve_relation_id("alice", "bob", Some("-")).unwrap());
        assert!(!sanitize("-").contains(NO_CONTEXT));
    }

    #[test]
    fn test_participants_outside_key_alphabet_are_rejected() {
        // Would both collapse to `a_b` if sanitized
        assert!(matches!(
            resolve_relation_id("a-b", "a_b", None),
            Err(MarketError::InvalidArgument(_))
        ));
        assert!(matches!(
            resolve_relation_id("alice", "bob/../x", Some("p1")),
            Err(MarketError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_invalid_participants() {
        assert!(matches!(
            resolve_relation_id("alice", "alice", Some("p1")),
            Err(MarketError::InvalidArgument(_))
        ));
        assert!(matches!(
            resolve_relation_id("", "bob", None),
            Err(MarketError::InvalidArgument(_))
        ));
        assert!(matches!(
            resolve_relation_id("alice", "", None),
            Err(MarketError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_stable_across_calls() {
        let first = resolve_relation_id("u1", "u2", Some("p 1")).unwrap();
        let second = resolve_relation_id("u1", "u2", Some("p 1")).unwrap();
        assert_eq!(first, second);
    }
}
