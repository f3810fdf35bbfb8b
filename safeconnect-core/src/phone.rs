//! Phone number normalisation.

use crate::ValidationError;

/// Strip everything except digits and a single leading `+`.
///
/// `"+1 (555) 010-2000"` becomes `"+15550102000"`. A `+` anywhere other than
/// the first retained position is dropped.
pub fn sanitize_phone(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if ch.is_ascii_digit() {
            out.push(ch);
        } else if ch == '+' && out.is_empty() {
            out.push(ch);
        }
    }
    out
}

/// Sanitise and require at least a plausible number of digits.
pub fn normalize_phone(raw: &str) -> Result<String, ValidationError> {
    let phone = sanitize_phone(raw);
    let digits = phone.trim_start_matches('+').len();
    if digits == 0 {
        return Err(ValidationError::RequiredFieldMissing {
            field: "phone".to_string(),
        });
    }
    if !(7..=15).contains(&digits) {
        return Err(ValidationError::InvalidFormat {
            field: "phone".to_string(),
            expected: "7 to 15 digits with optional leading '+'".to_string(),
        });
    }
    Ok(phone)
}

/// Mask all but the last four digits, for log lines.
pub fn mask_phone(phone: &str) -> String {
    let digits: Vec<char> = phone.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() <= 4 {
        return "*".repeat(digits.len());
    }
    let tail: String = digits[digits.len() - 4..].iter().collect();
    format!("{}{}", "*".repeat(digits.len() - 4), tail)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_sanitize_strips_formatting() {
        assert_eq!(sanitize_phone("+1 (555) 010-2000"), "+15550102000");
        assert_eq!(sanitize_phone("555.010.2000"), "5550102000");
    }

    #[test]
    fn test_sanitize_keeps_only_leading_plus() {
        assert_eq!(sanitize_phone("44+20+7946"), "44207946");
        assert_eq!(sanitize_phone("  +44 20 7946 0000"), "+442079460000");
        assert_eq!(sanitize_phone("++44"), "+44");
    }

    #[test]
    fn test_normalize_rejects_empty_and_short() {
        assert!(matches!(
            normalize_phone("abc"),
            Err(ValidationError::RequiredFieldMissing { .. })
        ));
        assert!(normalize_phone("+12").is_err());
        assert_eq!(normalize_phone("+1 555 010 2000"), Ok("+15550102000".to_string()));
    }

    #[test]
    fn test_mask_phone() {
        assert_eq!(mask_phone("+15550102000"), "*******2000");
        assert_eq!(mask_phone("123"), "***");
    }

    proptest! {
        #[test]
        fn prop_sanitized_is_digits_with_optional_leading_plus(raw in ".{0,40}") {
            let clean = sanitize_phone(&raw);
            let body = clean.strip_prefix('+').unwrap_or(&clean);
            prop_assert!(body.chars().all(|c| c.is_ascii_digit()));
            prop_assert_eq!(sanitize_phone(&clean), clean.clone());
        }
    }
}
