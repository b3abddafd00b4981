//! Redaction of sensitive fields before they cross the audit boundary.

use serde_json::{Map, Value as JsonValue};

/// Top-level field names that never reach an audit record.
pub const SENSITIVE_FIELDS: [&str; 6] = [
    "password",
    "confirmPassword",
    "currentPassword",
    "newPassword",
    "token",
    "secret",
];

/// Replacement value for redacted fields.
pub const REDACTED: &str = "[REDACTED]";

/// Replace denylisted top-level keys of an object with [`REDACTED`].
///
/// Redaction is shallow: nested objects are copied as-is. Non-object values are
/// returned unchanged.
pub fn sanitize(value: &JsonValue) -> JsonValue {
    match value {
        JsonValue::Object(fields) => {
            let redacted: Map<String, JsonValue> = fields
                .iter()
                .map(|(key, value)| {
                    if SENSITIVE_FIELDS.contains(&key.as_str()) {
                        (key.clone(), JsonValue::String(REDACTED.to_string()))
                    } else {
                        (key.clone(), value.clone())
                    }
                })
                .collect();
            JsonValue::Object(redacted)
        }
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn redacts_every_denylisted_key() {
        let input = json!({
            "email": "alice@example.com",
            "password": "hunter2",
            "confirmPassword": "hunter2",
            "currentPassword": "old",
            "newPassword": "new",
            "token": "abc",
            "secret": "xyz",
        });

        let out = sanitize(&input);

        assert_eq!(out["email"], "alice@example.com");
        for key in SENSITIVE_FIELDS {
            assert_eq!(out[key], REDACTED, "{key} not redacted");
        }
    }

    #[test]
    fn redaction_is_shallow_and_case_sensitive() {
        let input = json!({
            "profile": { "password": "nested" },
            "Password": "different-case",
        });

        assert_eq!(sanitize(&input), input);
    }

    #[test]
    fn non_objects_pass_through() {
        assert_eq!(sanitize(&json!("password")), json!("password"));
        assert_eq!(sanitize(&json!([{"password": 1}])), json!([{"password": 1}]));
        assert_eq!(sanitize(&JsonValue::Null), JsonValue::Null);
    }

    fn key() -> impl Strategy<Value = String> {
        prop_oneof![
            proptest::sample::select(SENSITIVE_FIELDS.to_vec()).prop_map(str::to_string),
            "[a-z]{1,8}",
        ]
    }

    proptest! {
        #[test]
        fn sanitize_is_idempotent_and_keeps_other_fields(
            entries in proptest::collection::btree_map(key(), any::<i64>(), 0..10)
        ) {
            let input = JsonValue::Object(
                entries.iter().map(|(k, v)| (k.clone(), JsonValue::from(*v))).collect(),
            );

            let once = sanitize(&input);
            prop_assert_eq!(&sanitize(&once), &once);

            for (k, v) in &entries {
                if SENSITIVE_FIELDS.contains(&k.as_str()) {
                    prop_assert_eq!(&once[k.as_str()], &JsonValue::from(REDACTED));
                } else {
                    prop_assert_eq!(&once[k.as_str()], &JsonValue::from(*v));
                }
            }
        }
    }
}
