//! Form validation
//!
//! Field rules are declared once per form and applied both to full
//! submissions ([`FormValidator::validate`]) and to single fields as the
//! user corrects them ([`FormState::revalidate_field`]). The same rule sets
//! are rendered into the HTML forms as `required`/`maxlength`/`type`
//! attributes so the browser and the server agree.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// Basic email shape: something@something.tld, no whitespace
static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap_or_else(|e| panic!("invalid email regex: {e}"))
});

/// Submitted form values by field name
pub type FormData = HashMap<String, String>;

pub fn is_valid_email(value: &str) -> bool {
    EMAIL_RE.is_match(value)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Text,
    Email,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldRule {
    pub name: &'static str,
    pub required: bool,
    pub kind: FieldKind,
    /// Maximum length in characters
    pub max_len: Option<usize>,
}

impl FieldRule {
    pub const fn text(name: &'static str) -> Self {
        Self {
            name,
            required: false,
            kind: FieldKind::Text,
            max_len: None,
        }
    }

    pub const fn email(name: &'static str) -> Self {
        Self {
            name,
            required: false,
            kind: FieldKind::Email,
            max_len: None,
        }
    }

    pub const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub const fn max_len(mut self, max: usize) -> Self {
        self.max_len = Some(max);
        self
    }

    /// Check one value against this rule
    pub fn check(&self, raw: &str) -> Option<FieldError> {
        let value = raw.trim();

        if value.is_empty() {
            return self.required.then(|| FieldError::new(self.name, FieldErrorCode::Required));
        }
        if self.kind == FieldKind::Email && !is_valid_email(value) {
            return Some(FieldError::new(self.name, FieldErrorCode::InvalidEmail));
        }
        match self.max_len {
            Some(max) if value.chars().count() > max => {
                Some(FieldError::new(self.name, FieldErrorCode::TooLong { max }))
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum FieldErrorCode {
    Required,
    InvalidEmail,
    TooLong { max: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    #[serde(flatten)]
    pub code: FieldErrorCode,
    pub message: String,
}

impl FieldError {
    fn new(field: &'static str, code: FieldErrorCode) -> Self {
        let message = match code {
            FieldErrorCode::Required => "This field is required.".to_string(),
            FieldErrorCode::InvalidEmail => "Please enter a valid email address.".to_string(),
            FieldErrorCode::TooLong { max } => format!("Please use at most {max} characters."),
        };
        Self { field, code, message }
    }
}

/// A named set of field rules
#[derive(Debug, Clone)]
pub struct FormValidator {
    rules: Vec<FieldRule>,
}

impl FormValidator {
    pub fn new(rules: Vec<FieldRule>) -> Self {
        Self { rules }
    }

    /// Contact form: name, email and message required; subject optional
    pub fn contact() -> Self {
        Self::new(vec![
            FieldRule::text("name").required().max_len(100),
            FieldRule::email("email").required().max_len(254),
            FieldRule::text("subject").max_len(200),
            FieldRule::text("body").required().max_len(5000),
        ])
    }

    /// Chat posting: nickname 1..=32, body 1..=500 characters
    pub fn chat() -> Self {
        Self::new(vec![
            FieldRule::text("nickname").required().max_len(32),
            FieldRule::text("body").required().max_len(500),
        ])
    }

    pub fn login() -> Self {
        Self::new(vec![
            FieldRule::text("username").required().max_len(254),
            FieldRule::text("password").required().max_len(1024),
        ])
    }

    pub fn rules(&self) -> &[FieldRule] {
        &self.rules
    }

    pub fn rule(&self, name: &str) -> Option<&FieldRule> {
        self.rules.iter().find(|r| r.name == name)
    }

    /// Validate a full submission. Values are stored trimmed.
    pub fn validate(&self, data: &FormData) -> FormState {
        let mut state = FormState {
            rules: self.rules.clone(),
            values: BTreeMap::new(),
            errors: BTreeMap::new(),
        };

        for rule in &self.rules {
            let raw = data.get(rule.name).map(String::as_str).unwrap_or("");
            state.apply(rule.name, raw);
        }
        state
    }
}

/// Validation outcome that can be updated field by field
#[derive(Debug, Clone, Serialize)]
pub struct FormState {
    #[serde(skip)]
    rules: Vec<FieldRule>,
    values: BTreeMap<&'static str, String>,
    errors: BTreeMap<&'static str, FieldError>,
}

impl FormState {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn is_invalid(&self, field: &str) -> bool {
        self.errors.contains_key(field)
    }

    pub fn error(&self, field: &str) -> Option<&FieldError> {
        self.errors.get(field)
    }

    pub fn errors(&self) -> impl Iterator<Item = &FieldError> {
        self.errors.values()
    }

    pub fn invalid_fields(&self) -> Vec<&'static str> {
        self.errors.keys().copied().collect()
    }

    /// Trimmed value of a field ("" when absent)
    pub fn value(&self, field: &str) -> &str {
        self.values.get(field).map(String::as_str).unwrap_or("")
    }

    /// Re-check a single field with a new value.
    ///
    /// Marks the field invalid when it breaks its rule and clears the mark
    /// once it is corrected. Unknown field names are ignored. Returns whether
    /// the field is now valid.
    pub fn revalidate_field(&mut self, field: &str, value: &str) -> bool {
        let Some(name) = self.rules.iter().find(|r| r.name == field).map(|r| r.name) else {
            return true;
        };
        self.apply(name, value)
    }

    fn apply(&mut self, name: &'static str, raw: &str) -> bool {
        let Some(rule) = self.rules.iter().find(|r| r.name == name) else {
            return true;
        };
        let error = rule.check(raw);
        self.values.insert(name, raw.trim().to_string());

        match error {
            Some(err) => {
                self.errors.insert(name, err);
                false
            }
            None => {
                self.errors.remove(name);
                true
            }
        }
    }

    /// Field errors as a JSON object keyed by field name
    pub fn errors_json(&self) -> serde_json::Value {
        serde_json::to_value(&self.errors).unwrap_or(serde_json::Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn form(pairs: &[(&str, &str)]) -> FormData {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_email_pattern() {
        assert!(is_valid_email("a@b.co"));
        assert!(is_valid_email("first.last+tag@sub.example.org"));
        assert!(!is_valid_email("no-at-sign.com"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("a b@c.de"));
        assert!(!is_valid_email("a@@b.de"));
        assert!(!is_valid_email(""));
    }

    #[test]
    fn test_valid_contact_submission() {
        let state = FormValidator::contact().validate(&form(&[
            ("name", " Ada "),
            ("email", "ada@example.com"),
            ("body", "Hi!"),
        ]));
        assert!(state.is_valid());
        assert_eq!(state.value("name"), "Ada");
        assert_eq!(state.value("subject"), "");
    }

    #[test]
    fn test_missing_and_malformed_fields() {
        let state = FormValidator::contact().validate(&form(&[("name", "   "), ("email", "nope")]));
        assert!(!state.is_valid());
        assert_eq!(state.invalid_fields(), vec!["body", "email", "name"]);
        assert_eq!(state.error("name").unwrap().code, FieldErrorCode::Required);
        assert_eq!(state.error("email").unwrap().code, FieldErrorCode::InvalidEmail);
        assert!(!state.is_invalid("subject"));
    }

    #[test]
    fn test_revalidate_marks_and_clears() {
        let mut state = FormValidator::contact().validate(&form(&[
            ("name", "Ada"),
            ("email", "ada@example.com"),
            ("body", "Hi"),
        ]));
        assert!(state.is_valid());

        assert!(!state.revalidate_field("email", "broken"));
        assert!(state.is_invalid("email"));

        assert!(!state.revalidate_field("email", ""));
        assert_eq!(state.error("email").unwrap().code, FieldErrorCode::Required);

        assert!(state.revalidate_field("email", "ada@example.org"));
        assert!(state.is_valid());
        assert_eq!(state.value("email"), "ada@example.org");
    }

    #[test]
    fn test_revalidate_unknown_field_ignored() {
        let mut state = FormValidator::chat().validate(&FormData::new());
        assert!(state.revalidate_field("website", "spam"));
        assert_eq!(state.invalid_fields(), vec!["body", "nickname"]);
    }

    #[test]
    fn test_max_len_counts_chars() {
        let rule = FieldRule::text("nickname").required().max_len(3);
        assert!(rule.check("äöü").is_none());
        assert_eq!(rule.check("äöüß").unwrap().code, FieldErrorCode::TooLong { max: 3 });
    }

    #[test]
    fn test_errors_json_shape() {
        let state = FormValidator::chat().validate(&form(&[("nickname", "bob")]));
        let json = state.errors_json();
        assert_eq!(json["body"]["code"], "required");
        assert_eq!(json["body"]["field"], "body");
    }

    proptest! {
        #[test]
        fn prop_whitespace_never_valid_email(local in "[a-z]{1,8}", domain in "[a-z]{1,8}", ws in "[ \t]") {
            let candidate = format!("{local}{ws}@{domain}.com");
            prop_assert!(!is_valid_email(&candidate));
        }

        #[test]
        fn prop_simple_addresses_valid(local in "[a-z0-9._]{1,16}", domain in "[a-z0-9-]{1,16}", tld in "[a-z]{2,6}") {
            let candidate = format!("{}@{}.{}", local, domain, tld);
            prop_assert!(is_valid_email(&candidate));
        }

        #[test]
        fn prop_revalidate_matches_fresh_validation(value in ".{0,40}") {
            let validator = FormValidator::contact();
            let mut state = validator.validate(&form(&[("name", "x"), ("email", "a@b.cd"), ("body", "y")]));
            state.revalidate_field("email", &value);

            let fresh = validator.validate(&form(&[("name", "x"), ("email", &value), ("body", "y")]));
            prop_assert_eq!(state.is_invalid("email"), fresh.is_invalid("email"));
        }
    }
}
