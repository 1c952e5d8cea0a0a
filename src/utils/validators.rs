use regex::Regex;
use std::sync::LazyLock;

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap());
static PHONE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{7,15}$").unwrap());
static NATIONAL_ID_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{6,8}$").unwrap());
static REFERENCE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{6}$").unwrap());
static TICKET_NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{4}$").unwrap());

pub fn validate_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

/// 7 to 15 digits once spaces, dashes and parentheses are stripped.
pub fn validate_phone(phone: &str) -> bool {
    let cleaned: String = phone
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')'))
        .collect();
    PHONE_RE.is_match(&cleaned)
}

/// National id: optional V/E prefix (with or without dash), then 6-8 digits.
pub fn validate_national_id(national_id: &str) -> bool {
    let cleaned = national_id
        .strip_prefix(['V', 'E', 'v', 'e'])
        .map(|rest| rest.strip_prefix('-').unwrap_or(rest))
        .unwrap_or(national_id);
    NATIONAL_ID_RE.is_match(cleaned)
}

/// Payment reference codes are exactly 6 ASCII digits.
pub fn validate_reference_code(code: &str) -> bool {
    REFERENCE_RE.is_match(code)
}

/// Ticket numbers are exactly 4 ASCII digits ("0000".."9999").
pub fn validate_ticket_number(number: &str) -> bool {
    TICKET_NUMBER_RE.is_match(number)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_email() {
        assert!(validate_email("test@example.com"));
        assert!(validate_email("user.name@domain.co.uk"));
        assert!(validate_email("user+tag@example.com"));

        assert!(!validate_email("invalid"));
        assert!(!validate_email("invalid@"));
        assert!(!validate_email("@example.com"));
        assert!(!validate_email("invalid@com"));
    }

    #[test]
    fn test_validate_phone() {
        assert!(validate_phone("04121234567"));
        assert!(validate_phone("0424-123-4567"));
        assert!(validate_phone("(0412) 123-4567"));
        assert!(validate_phone("0412 123 4567"));
        assert!(validate_phone("1234567890"));

        assert!(!validate_phone("12345")); // too short
        assert!(!validate_phone("1234567890123456")); // too long
        assert!(!validate_phone("abc1234567")); // letters
    }

    #[test]
    fn test_validate_national_id() {
        assert!(validate_national_id("12345678"));
        assert!(validate_national_id("1234567"));
        assert!(validate_national_id("123456"));
        assert!(validate_national_id("V-12345678"));
        assert!(validate_national_id("E-12345678"));
        assert!(validate_national_id("v12345678"));
        assert!(validate_national_id("e12345678"));

        assert!(!validate_national_id("12345")); // too short
        assert!(!validate_national_id("123456789")); // too long
        assert!(!validate_national_id("abc12345"));
    }

    #[test]
    fn test_validate_reference_code() {
        assert!(validate_reference_code("123456"));
        assert!(validate_reference_code("000000"));
        assert!(validate_reference_code("999999"));

        assert!(!validate_reference_code("12345"));
        assert!(!validate_reference_code("1234567"));
        assert!(!validate_reference_code("12345a"));
        assert!(!validate_reference_code(""));
    }

    #[test]
    fn test_validate_ticket_number() {
        assert!(validate_ticket_number("0000"));
        assert!(validate_ticket_number("1234"));
        assert!(validate_ticket_number("9999"));

        assert!(!validate_ticket_number("123"));
        assert!(!validate_ticket_number("12345"));
        assert!(!validate_ticket_number("123a"));
        assert!(!validate_ticket_number(""));
    }
}
