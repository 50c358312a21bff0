//! Login identifier derivation.
//!
//! The identity provider only knows email-shaped logins, so phone-based
//! accounts get a synthetic `<digits>@phone.local` address.

/// Suffix appended to phone digits to form a login identifier.
pub const PHONE_LOGIN_SUFFIX: &str = "@phone.local";

/// Strip everything but ASCII digits.
pub fn phone_digits(phone: &str) -> String {
    phone.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Login identifier for a phone number, `None` when it has no digits.
pub fn phone_login(phone: &str) -> Option<String> {
    let digits = phone_digits(phone);
    if digits.is_empty() {
        None
    } else {
        Some(format!("{}{}", digits, PHONE_LOGIN_SUFFIX))
    }
}

/// Derive the login identifier from the requested phone and email.
///
/// Phone wins whenever it carries at least one digit; otherwise a non-blank
/// email is used as-is after trimming. `None` means no identifier change.
pub fn login_identifier(phone: Option<&str>, email: Option<&str>) -> Option<String> {
    phone.and_then(phone_login).or_else(|| {
        email
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .map(str::to_string)
    })
}
