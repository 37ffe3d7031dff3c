use subtle::ConstantTimeEq;

/// Header carrying the admin key on every `/api` request
pub const API_KEY_HEADER: &str = "X-API-Key";

/// Outcome of checking an admin request's key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminAuth {
    Granted,
    /// No admin key configured, so the admin API is off
    Disabled,
    Denied,
}

/// Check the key sent by the caller against the configured admin key
pub fn check_admin_key(provided: Option<&str>, configured: Option<&str>) -> AdminAuth {
    match (configured, provided) {
        (None, _) => AdminAuth::Disabled,
        (Some(expected), Some(given)) if constant_time_compare(given, expected) => AdminAuth::Granted,
        _ => AdminAuth::Denied,
    }
}

/// Constant-time string comparison for API keys and tokens
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.as_bytes().ct_eq(b.as_bytes()).into()
}
