//! Payload types shared by the call protocol, the registry, and the store.

use crate::identity::Uid;
use serde::{Deserialize, Serialize};

/// A named interception rule definition.
///
/// Held only in the in-memory registry; the store persists references by id.
/// The `rule` payload is opaque to this crate; the interception engine
/// interprets it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hook {
    pub id: String,
    /// Class/symbol name the rule attaches to. Mutable after load in exactly
    /// one case: the dynamic-target backfill during assignment resolution.
    pub target: String,
    #[serde(default)]
    pub rule: serde_json::Value,
}

impl Hook {
    /// Placeholder target resolved to the host-configured concrete class at
    /// assignment-resolution time.
    pub const DYNAMIC_TARGET: &'static str = "*";
}

/// A persisted binding of one hook to one application identity, with
/// usage/install/exception tracking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assignment {
    pub hook: Hook,
    /// Epoch millis; -1 = not yet observed in this process lifetime.
    pub installed: i64,
    /// Epoch millis; -1 = never.
    pub used: i64,
    pub restricted: bool,
    pub exception: Option<String>,
}

impl Assignment {
    pub fn new(hook: Hook) -> Self {
        Self {
            hook,
            installed: -1,
            used: -1,
            restricted: false,
            exception: None,
        }
    }
}

/// One installed application cross-referenced with its assignments, as
/// returned by `getApps`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct App {
    pub package_name: String,
    pub uid: Uid,
    pub label: String,
    pub enabled: bool,
    pub persistent: bool,
    pub assignments: Vec<Assignment>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_hook_serde_roundtrip() {
        let hook = Hook {
            id: "net.dns.lookup".into(),
            target: "resolver.Client".into(),
            rule: json!({"deny": true, "log": "caller"}),
        };
        let value = serde_json::to_value(&hook).unwrap();
        let back: Hook = serde_json::from_value(value).unwrap();
        assert_eq!(back, hook);
    }

    #[test]
    fn test_hook_rule_defaults_to_null() {
        let hook: Hook =
            serde_json::from_value(json!({"id": "h", "target": "t"})).unwrap();
        assert!(hook.rule.is_null());
    }

    #[test]
    fn test_new_assignment_is_unobserved() {
        let assignment = Assignment::new(Hook {
            id: "h".into(),
            target: "t".into(),
            rule: serde_json::Value::Null,
        });
        assert_eq!(assignment.installed, -1);
        assert_eq!(assignment.used, -1);
        assert!(!assignment.restricted);
        assert!(assignment.exception.is_none());
    }
}
