//! Typed convenience accessor for boolean settings.
//!
//! Thin wrapper over the `getSetting`/`putSetting` operations. Boolean
//! parsing follows standard boolean text parsing: exactly the string "true",
//! case-insensitively, is true; anything else, including an absent value,
//! is false. Several consumers rely on that literal contract.

use crate::error::Result;
use crate::identity::{self, Uid, UserId};
use crate::service::{ops, Service};
use serde_json::{json, Value};

pub struct Settings<'a> {
    service: &'a Service,
}

impl<'a> Settings<'a> {
    pub(crate) fn new(service: &'a Service) -> Self {
        Self { service }
    }

    /// Read a boolean setting. `user` defaults to the caller's own user.
    pub fn get_bool(
        &self,
        caller: Uid,
        user: Option<UserId>,
        category: &str,
        name: &str,
    ) -> Result<bool> {
        let user = user.unwrap_or_else(|| identity::user_id(caller));
        let result = self.service.call(
            caller,
            ops::GET_SETTING,
            json!({ "user": user, "category": category, "name": name }),
        )?;
        Ok(parse_bool(result.get("value").and_then(Value::as_str)))
    }

    /// Write a boolean setting. `user` defaults to the caller's own user.
    /// Owner-privileged, like any `putSetting`.
    pub fn put_bool(
        &self,
        caller: Uid,
        user: Option<UserId>,
        category: &str,
        name: &str,
        value: bool,
    ) -> Result<()> {
        let user = user.unwrap_or_else(|| identity::user_id(caller));
        self.service.call(
            caller,
            ops::PUT_SETTING,
            json!({
                "user": user,
                "category": category,
                "name": name,
                "value": value.to_string(),
            }),
        )?;
        Ok(())
    }
}

/// Only the exact text "true" (case-insensitive) parses as true; a missing
/// value is false.
pub fn parse_bool(value: Option<&str>) -> bool {
    value.is_some_and(|v| v.eq_ignore_ascii_case("true"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bool_literal_contract() {
        assert!(parse_bool(Some("true")));
        assert!(parse_bool(Some("TRUE")));
        assert!(parse_bool(Some("True")));
        assert!(!parse_bool(Some("yes")));
        assert!(!parse_bool(Some("1")));
        assert!(!parse_bool(Some(" true")));
        assert!(!parse_bool(Some("")));
        assert!(!parse_bool(None));
    }
}
