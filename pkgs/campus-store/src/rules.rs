//! Server-side access rules
//!
//! Rules run inside the store for every read and write, so client code can
//! never grant itself access by computing a document path. Denial surfaces
//! as [`StoreError::PermissionDenied`].

use serde_json::Value;
use std::fmt;

use crate::document::field;
use crate::{DocPath, StoreError};

/// Kind of access being requested
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Read,
    Create,
    Update,
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Read => "read",
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
        };
        f.write_str(name)
    }
}

/// Everything a rule may inspect
#[derive(Debug, Clone, Copy)]
pub struct AccessRequest<'a> {
    /// Authenticated caller, `None` when signed out
    pub caller: Option<&'a str>,
    pub operation: Operation,
    pub path: &'a DocPath,
    /// Stored body before the operation
    pub existing: Option<&'a Value>,
    /// Body after the operation (create/update)
    pub incoming: Option<&'a Value>,
    /// Body of the owning document for subcollection paths
    pub parent: Option<&'a Value>,
}

impl AccessRequest<'_> {
    pub fn deny(&self) -> StoreError {
        StoreError::PermissionDenied(format!(
            "{} on {} by {}",
            self.operation,
            self.path,
            self.caller.unwrap_or("anonymous")
        ))
    }
}

/// Authorization policy evaluated by the store
pub trait AccessRules: Send + Sync + 'static {
    fn check(&self, request: &AccessRequest<'_>) -> Result<(), StoreError>;
}

/// Grants everything
#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAll;

impl AccessRules for AllowAll {
    fn check(&self, _request: &AccessRequest<'_>) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Marketplace policy for `users`, `products`, `conversations` and
/// `conversations/{id}/messages`
#[derive(Debug, Default, Clone, Copy)]
pub struct MarketRules;

impl MarketRules {
    fn is_participant(data: Option<&Value>, caller: &str) -> bool {
        data.and_then(|d| field(d, "participants"))
            .and_then(Value::as_array)
            .map(|ids| ids.iter().any(|id| id.as_str() == Some(caller)))
            .unwrap_or(false)
    }

    fn is_seller(data: Option<&Value>, caller: &str) -> bool {
        data.and_then(|d| field(d, "seller.id"))
            .and_then(Value::as_str)
            .map(|id| id == caller)
            .unwrap_or(false)
    }

    fn allowed(request: &AccessRequest<'_>) -> bool {
        let op = request.operation;

        // Listings are public
        if request.path.collection == "products" && op == Operation::Read {
            return true;
        }

        let Some(caller) = request.caller else {
            return false;
        };

        match request.path.collection.split('/').collect::<Vec<_>>().as_slice() {
            ["users"] => op == Operation::Read || request.path.id == caller,
            ["products"] => match op {
                Operation::Read => true,
                Operation::Create => Self::is_seller(request.incoming, caller),
                Operation::Update => {
                    Self::is_seller(request.existing, caller)
                        && Self::is_seller(request.incoming, caller)
                }
                Operation::Delete => Self::is_seller(request.existing, caller),
            },
            // A missing conversation has no participants, so reading it is
            // denied rather than answered with "not found".
            ["conversations"] => match op {
                Operation::Create => Self::is_participant(request.incoming, caller),
                Operation::Update => {
                    Self::is_participant(request.existing, caller)
                        && Self::is_participant(request.incoming, caller)
                }
                Operation::Read | Operation::Delete => {
                    Self::is_participant(request.existing, caller)
                }
            },
            ["conversations", _, "messages"] => {
                if !Self::is_participant(request.parent, caller) {
                    return false;
                }
                match op {
                    Operation::Read => true,
                    Operation::Create | Operation::Update => request
                        .incoming
                        .and_then(|d| field(d, "senderId"))
                        .and_then(Value::as_str)
                        == Some(caller),
                    Operation::Delete => request
                        .existing
                        .and_then(|d| field(d, "senderId"))
                        .and_then(Value::as_str)
                        == Some(caller),
                }
            }
            _ => false,
        }
    }
}

impl AccessRules for MarketRules {
    fn check(&self, request: &AccessRequest<'_>) -> Result<(), StoreError> {
        if Self::allowed(request) {
            Ok(())
        } else {
            Err(request.deny())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request<'a>(
        caller: Option<&'a str>,
        operation: Operation,
        path: &'a DocPath,
        existing: Option<&'a Value>,
        incoming: Option<&'a Value>,
    ) -> AccessRequest<'a> {
        AccessRequest {
            caller,
            operation,
            path,
            existing,
            incoming,
            parent: None,
        }
    }

    #[test]
    fn test_products_only_mutable_by_seller() {
        let path = DocPath::new("products", "p1").unwrap();
        let listing = json!({ "title": "Desk", "seller": { "id": "alice" } });
        let sold = json!({ "title": "Desk", "status": "sold", "seller": { "id": "alice" } });

        let rules = MarketRules;
        assert!(rules
            .check(&request(None, Operation::Read, &path, Some(&listing), None))
            .is_ok());
        assert!(rules
            .check(&request(Some("alice"), Operation::Update, &path, Some(&listing), Some(&sold)))
            .is_ok());

        let denied = rules
            .check(&request(Some("bob"), Operation::Update, &path, Some(&listing), Some(&sold)))
            .unwrap_err();
        assert!(denied.is_permission_denied());
        assert!(rules
            .check(&request(Some("bob"), Operation::Delete, &path, Some(&listing), None))
            .is_err());
    }

    #[test]
    fn test_missing_conversation_read_is_denied() {
        let path = DocPath::new("conversations", "a~b~p1").unwrap();
        let result = MarketRules.check(&request(Some("a"), Operation::Read, &path, None, None));
        assert!(matches!(result, Err(StoreError::PermissionDenied(_))));
    }

    #[test]
    fn test_users_writable_only_by_owner() {
        let path = DocPath::new("users", "alice").unwrap();
        let body = json!({ "name": "Alice" });
        assert!(MarketRules
            .check(&request(Some("alice"), Operation::Create, &path, None, Some(&body)))
            .is_ok());
        assert!(MarketRules
            .check(&request(Some("bob"), Operation::Update, &path, Some(&body), Some(&body)))
            .is_err());
        assert!(MarketRules
            .check(&request(None, Operation::Read, &path, Some(&body), None))
            .is_err());
    }

    #[test]
    fn test_messages_require_parent_participant() {
        let path = DocPath::new("conversations/c1/messages", "m1").unwrap();
        let parent = json!({ "participants": ["a", "b"] });
        let message = json!({ "senderId": "a", "text": "hi" });

        let mut req = request(Some("a"), Operation::Create, &path, None, Some(&message));
        req.parent = Some(&parent);
        assert!(MarketRules.check(&req).is_ok());

        req.caller = Some("b");
        assert!(MarketRules.check(&req).is_err(), "cannot send as someone else");

        req.caller = Some("c");
        req.operation = Operation::Read;
        assert!(MarketRules.check(&req).is_err());
    }
}
