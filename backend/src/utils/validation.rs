use once_cell::sync::Lazy;
use regex::Regex;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email regex compiles"));

/// Loose shape check for email addresses. Deliverability is the mail
/// system's problem, not ours.
pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}
