// ✅ Field Validators - per-keystroke checks with human-readable reasons

use crate::client::PhoneType;
use crate::masking::unmask;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const NAME_MESSAGE: &str =
    "Name must have 3 to 100 characters and contain only letters, digits and spaces";
pub const DOCUMENT_MESSAGE: &str = "Invalid CPF";
pub const POSTAL_CODE_MESSAGE: &str = "Invalid CEP";
pub const EMAIL_MESSAGE: &str = "Invalid email";
pub const STATE_MESSAGE: &str = "State must be a two-letter code";
pub const PHONE_MESSAGE: &str = "Invalid phone number";

static NAME_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-ZÀ-ÖØ-öø-ÿ0-9\s]{3,100}$").expect("name pattern compiles")
});

static EMAIL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern compiles"));

// ============================================================================
// FIELD CHECK
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldCheck {
    pub valid: bool,
    pub message: Option<String>,
}

impl FieldCheck {
    pub fn pass() -> Self {
        FieldCheck {
            valid: true,
            message: None,
        }
    }

    pub fn fail(message: &str) -> Self {
        FieldCheck {
            valid: false,
            message: Some(message.to_string()),
        }
    }

    fn from_rule(valid: bool, message: &str) -> Self {
        if valid {
            Self::pass()
        } else {
            Self::fail(message)
        }
    }
}

pub fn is_valid_name(name: &str) -> bool {
    NAME_PATTERN.is_match(name)
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_PATTERN.is_match(email)
}

pub fn is_valid_document(value: &str) -> bool {
    unmask(value).len() == 11
}

pub fn is_valid_postal_code(value: &str) -> bool {
    unmask(value).len() == 8
}

pub fn is_valid_state(value: &str) -> bool {
    value.len() == 2 && value.chars().all(|c| c.is_ascii_alphabetic())
}

/// Mobile numbers need 11 raw digits, landlines 10.
pub fn is_valid_phone(phone_type: PhoneType, number: &str) -> bool {
    unmask(number).len() == phone_type.required_digits()
}

pub fn validate_phone(phone_type: PhoneType, number: &str) -> FieldCheck {
    FieldCheck::from_rule(is_valid_phone(phone_type, number), PHONE_MESSAGE)
}

/// Validate one field by its error-map key. Unknown keys always pass.
pub fn validate_field(field: &str, value: &str) -> FieldCheck {
    match field {
        "name" => FieldCheck::from_rule(is_valid_name(value), NAME_MESSAGE),
        "cpf" => FieldCheck::from_rule(is_valid_document(value), DOCUMENT_MESSAGE),
        "address.cep" => FieldCheck::from_rule(is_valid_postal_code(value), POSTAL_CODE_MESSAGE),
        "address.uf" => FieldCheck::from_rule(is_valid_state(value), STATE_MESSAGE),
        _ if field.starts_with("emails.") => {
            FieldCheck::from_rule(is_valid_email(value), EMAIL_MESSAGE)
        }
        _ => FieldCheck::pass(),
    }
}

// ============================================================================
// FIELD ERROR MAP
// ============================================================================

/// Field key -> error message. A missing key means the field passed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldErrorMap {
    errors: BTreeMap<String, String>,
}

impl FieldErrorMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace exactly one entry with the outcome of a check.
    pub fn record(&mut self, field: &str, check: &FieldCheck) {
        match &check.message {
            Some(message) if !check.valid => {
                self.errors.insert(field.to_string(), message.clone());
            }
            _ => {
                self.errors.remove(field);
            }
        }
    }

    pub fn set(&mut self, field: &str, message: impl Into<String>) {
        self.errors.insert(field.to_string(), message.into());
    }

    pub fn clear(&mut self, field: &str) {
        self.errors.remove(field);
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.errors.get(field).map(String::as_str)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.errors.contains_key(field)
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.errors.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.errors.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Validate `value` under `field` and store the outcome in `errors`.
pub fn check_into(errors: &mut FieldErrorMap, field: &str, value: &str) -> bool {
    let check = validate_field(field, value);
    errors.record(field, &check);
    check.valid
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("Maria Silva", true)]
    #[case("João Araújo 2", true)]
    #[case("Zé", false)]
    #[case("Ana-Maria", false)]
    #[case("Robert'); DROP", false)]
    fn test_name_rule(#[case] name: &str, #[case] expected: bool) {
        assert_eq!(is_valid_name(name), expected);
    }

    #[test]
    fn test_name_length_bounds() {
        assert!(is_valid_name(&"a".repeat(100)));
        assert!(!is_valid_name(&"a".repeat(101)));
        assert!(is_valid_name(&"é".repeat(100)));
    }

    #[rstest]
    #[case("maria@example.com", true)]
    #[case("a@b.co", true)]
    #[case(" maria@example.com", false)]
    #[case("maria@example", false)]
    #[case("maria@@example.com", false)]
    #[case("maria@exa mple.com", false)]
    #[case("", false)]
    fn test_email_rule(#[case] email: &str, #[case] expected: bool) {
        assert_eq!(is_valid_email(email), expected);
    }

    #[test]
    fn test_validate_field_by_key() {
        assert!(validate_field("cpf", "123.456.789-01").valid);
        assert!(!validate_field("cpf", "123.456").valid);
        assert!(validate_field("address.cep", "01310-930").valid);
        assert_eq!(
            validate_field("address.cep", "0131").message.as_deref(),
            Some(POSTAL_CODE_MESSAGE)
        );
        assert!(!validate_field("emails.3", "nope").valid);
        assert!(!validate_field("address.uf", "S1").valid);
    }

    #[rstest]
    #[case(PhoneType::Mobile, "(11) 98765-4321", true)]
    #[case(PhoneType::Mobile, "(11) 3333-4444", false)]
    #[case(PhoneType::Residential, "(11) 3333-4444", true)]
    #[case(PhoneType::Commercial, "11333344445", false)]
    fn test_phone_rule(#[case] phone_type: PhoneType, #[case] number: &str, #[case] expected: bool) {
        assert_eq!(is_valid_phone(phone_type, number), expected);
        assert_eq!(validate_phone(phone_type, number).valid, expected);
    }

    #[test]
    fn test_unknown_field_passes() {
        let check = validate_field("favourite_colour", "");
        assert!(check.valid);
        assert!(check.message.is_none());
    }

    #[test]
    fn test_record_touches_only_its_key() {
        let mut errors = FieldErrorMap::new();
        errors.set("name", NAME_MESSAGE);

        assert!(!check_into(&mut errors, "cpf", "123"));
        assert_eq!(errors.get("cpf"), Some(DOCUMENT_MESSAGE));
        assert_eq!(errors.get("name"), Some(NAME_MESSAGE));

        assert!(check_into(&mut errors, "cpf", "12345678901"));
        assert!(!errors.contains("cpf"));
        assert_eq!(errors.len(), 1);
    }
}
