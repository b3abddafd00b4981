//! Input schemas used by the validation middleware.
//!
//! A [`Schema`] checks a JSON input and reports every problem it finds, not just
//! the first. [`ObjectSchema`] covers the common "object with typed fields" case;
//! any `Fn(&JsonValue) -> Result<(), Vec<ValidationIssue>>` works for the rest.

use serde::Serialize;
use serde_json::Value as JsonValue;

/// One problem found in an input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    /// Field path (`""` for the input itself).
    pub path: String,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl core::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        if self.path.is_empty() {
            f.write_str(&self.message)
        } else {
            write!(f, "{}: {}", self.path, self.message)
        }
    }
}

pub trait Schema: Send + Sync {
    fn validate(&self, input: &JsonValue) -> Result<(), Vec<ValidationIssue>>;
}

impl<F> Schema for F
where
    F: Fn(&JsonValue) -> Result<(), Vec<ValidationIssue>> + Send + Sync,
{
    fn validate(&self, input: &JsonValue) -> Result<(), Vec<ValidationIssue>> {
        self(input)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum FieldKind {
    Any,
    Boolean,
    Number {
        min: Option<f64>,
        max: Option<f64>,
    },
    String {
        min_len: Option<usize>,
        max_len: Option<usize>,
        email: bool,
    },
}

/// Constraint on one object field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldRule {
    required: bool,
    kind: FieldKind,
}

impl FieldRule {
    fn of(kind: FieldKind) -> Self {
        Self {
            required: false,
            kind,
        }
    }

    pub fn any() -> Self {
        Self::of(FieldKind::Any)
    }

    pub fn boolean() -> Self {
        Self::of(FieldKind::Boolean)
    }

    pub fn number() -> Self {
        Self::of(FieldKind::Number {
            min: None,
            max: None,
        })
    }

    pub fn string() -> Self {
        Self::of(FieldKind::String {
            min_len: None,
            max_len: None,
            email: false,
        })
    }

    /// The field must be present and not `null`.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Minimum length in characters (strings only).
    ///
    /// Any positive minimum also rejects whitespace-only strings as empty.
    pub fn min_len(mut self, len: usize) -> Self {
        if let FieldKind::String { min_len, .. } = &mut self.kind {
            *min_len = Some(len);
        }
        self
    }

    /// Maximum length in characters (strings only).
    pub fn max_len(mut self, len: usize) -> Self {
        if let FieldKind::String { max_len, .. } = &mut self.kind {
            *max_len = Some(len);
        }
        self
    }

    pub fn non_empty(self) -> Self {
        self.min_len(1)
    }

    /// `local@domain` shape (strings only).
    pub fn email(mut self) -> Self {
        if let FieldKind::String { email, .. } = &mut self.kind {
            *email = true;
        }
        self
    }

    /// Inclusive numeric bounds (numbers only).
    pub fn range(mut self, lower: Option<f64>, upper: Option<f64>) -> Self {
        if let FieldKind::Number { min, max } = &mut self.kind {
            *min = lower;
            *max = upper;
        }
        self
    }

    fn check(&self, path: &str, value: Option<&JsonValue>, issues: &mut Vec<ValidationIssue>) {
        let value = match value {
            None | Some(JsonValue::Null) => {
                if self.required {
                    issues.push(ValidationIssue::new(path, "is required"));
                }
                return;
            }
            Some(v) => v,
        };

        match &self.kind {
            FieldKind::Any => {}
            FieldKind::Boolean => {
                if !value.is_boolean() {
                    issues.push(ValidationIssue::new(path, "expected a boolean"));
                }
            }
            FieldKind::Number { min, max } => {
                let Some(n) = value.as_f64() else {
                    issues.push(ValidationIssue::new(path, "expected a number"));
                    return;
                };
                if let Some(min) = min.filter(|min| n < *min) {
                    issues.push(ValidationIssue::new(path, format!("must be at least {min}")));
                }
                if let Some(max) = max.filter(|max| n > *max) {
                    issues.push(ValidationIssue::new(path, format!("must be at most {max}")));
                }
            }
            FieldKind::String {
                min_len,
                max_len,
                email,
            } => {
                let Some(s) = value.as_str() else {
                    issues.push(ValidationIssue::new(path, "expected a string"));
                    return;
                };
                let len = s.chars().count();
                match min_len {
                    Some(min) if *min > 0 && s.trim().is_empty() => {
                        issues.push(ValidationIssue::new(path, "must not be empty"));
                        return;
                    }
                    Some(min) if len < *min => {
                        issues.push(ValidationIssue::new(
                            path,
                            format!("must be at least {min} characters"),
                        ));
                    }
                    _ => {}
                }
                if let Some(max) = max_len.filter(|max| len > *max) {
                    issues.push(ValidationIssue::new(
                        path,
                        format!("must be at most {max} characters"),
                    ));
                }
                if *email && !looks_like_email(s) {
                    issues.push(ValidationIssue::new(path, "invalid email format"));
                }
            }
        }
    }
}

fn looks_like_email(s: &str) -> bool {
    let s = s.trim();
    match s.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && !s.chars().any(char::is_whitespace)
        }
        None => false,
    }
}

/// Schema for a JSON object with named fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectSchema {
    fields: Vec<(String, FieldRule)>,
    deny_unknown: bool,
}

impl ObjectSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: impl Into<String>, rule: FieldRule) -> Self {
        self.fields.push((name.into(), rule));
        self
    }

    /// Reject fields that were not declared.
    pub fn deny_unknown_fields(mut self) -> Self {
        self.deny_unknown = true;
        self
    }
}

impl Schema for ObjectSchema {
    fn validate(&self, input: &JsonValue) -> Result<(), Vec<ValidationIssue>> {
        let Some(object) = input.as_object() else {
            return Err(vec![ValidationIssue::new("", "expected an object")]);
        };

        let mut issues = Vec::new();
        for (name, rule) in &self.fields {
            rule.check(name, object.get(name), &mut issues);
        }
        if self.deny_unknown {
            for key in object.keys() {
                if !self.fields.iter().any(|(name, _)| name == key) {
                    issues.push(ValidationIssue::new(key.as_str(), "unknown field"));
                }
            }
        }

        if issues.is_empty() { Ok(()) } else { Err(issues) }
    }
}
