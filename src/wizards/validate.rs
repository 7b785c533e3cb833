//! Field checks shared by the wizards.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::wizard::FieldError;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}$").expect("valid email regex")
});

/// UAE tax registration numbers are 15 digits
static TRN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{15}$").expect("valid TRN regex"));

pub fn is_valid_email(value: &str) -> bool {
    EMAIL_RE.is_match(value.trim())
}

/// Trimmed value, `None` when absent or blank
pub fn filled(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Owned optional text with blanks treated as unset
pub fn optional_text(value: Option<String>) -> Option<String> {
    filled(value.as_deref()).map(String::from)
}

pub fn check_email(field: &str, value: Option<&str>, errors: &mut Vec<FieldError>) {
    if let Some(email) = filled(value) {
        if !is_valid_email(email) {
            errors.push(FieldError::new(field, "is not a valid email address"));
        }
    }
}

pub fn check_trn(field: &str, value: Option<&str>, errors: &mut Vec<FieldError>) {
    if let Some(trn) = filled(value) {
        if !TRN_RE.is_match(trn) {
            errors.push(FieldError::new(field, "must be 15 digits"));
        }
    }
}

/// Take a required value, recording `field` as missing when absent
pub fn required<T: Clone>(value: Option<&T>, field: &str, errors: &mut Vec<FieldError>) -> Option<T> {
    match value {
        Some(v) => Some(v.clone()),
        None => {
            errors.push(FieldError::required(field));
            None
        }
    }
}

pub fn required_text(value: Option<&String>, field: &str, errors: &mut Vec<FieldError>) -> String {
    match value.map(|s| s.trim()).filter(|s| !s.is_empty()) {
        Some(s) => s.to_string(),
        None => {
            errors.push(FieldError::required(field));
            String::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_validation() {
        assert!(is_valid_email("finance@acme.ae"));
        assert!(is_valid_email(" a.b+c@example.co.uk "));
        assert!(!is_valid_email("not-an-email"));
        assert!(!is_valid_email("a@b"));
    }

    #[test]
    fn test_trn_check() {
        let mut errors = Vec::new();
        check_trn("vat_trn", Some("100234567800003"), &mut errors);
        assert!(errors.is_empty());
        check_trn("vat_trn", Some("12345"), &mut errors);
        assert_eq!(errors, vec![FieldError::new("vat_trn", "must be 15 digits")]);
    }

    #[test]
    fn test_blank_optional_values_are_unset() {
        let mut errors = Vec::new();
        check_trn("vat_trn", Some("  "), &mut errors);
        check_email("email", Some(""), &mut errors);
        assert!(errors.is_empty());
        assert_eq!(optional_text(Some(" ".into())), None);
        assert_eq!(optional_text(Some(" +971 4 ".into())).as_deref(), Some("+971 4"));
    }

    #[test]
    fn test_required_text_rejects_blank() {
        let mut errors = Vec::new();
        let blank = "  ".to_string();
        assert_eq!(required_text(Some(&blank), "name", &mut errors), "");
        assert_eq!(errors, vec![FieldError::required("name")]);
    }
}
