//! Retry eligibility rules.
//!
//! # Responsibilities
//! - Determine if a failed upstream call may be retried
//! - Never retry non-idempotent methods (POST/PUT/PATCH/DELETE)
//! - Transport-class errors always retryable; 5xx only for idempotent calls
//! - 4xx responses are never retried

use axum::http::Method;

/// Returns true when the method is safe to replay against upstream.
pub fn is_idempotent(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}

/// Decide whether an attempt outcome warrants a retry.
///
/// `status` is the upstream status when a response was received;
/// `transport_error` is true for timeout/reset/refused-class failures.
pub fn is_retryable(method: &Method, status: Option<u16>, transport_error: bool) -> bool {
    if !is_idempotent(method) {
        return false;
    }
    if transport_error {
        return true;
    }
    matches!(status, Some(s) if s >= 500)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_errors_retryable_for_get() {
        assert!(is_retryable(&Method::GET, None, true));
        assert!(is_retryable(&Method::HEAD, None, true));
    }

    #[test]
    fn test_non_idempotent_never_retried() {
        assert!(!is_retryable(&Method::POST, None, true));
        assert!(!is_retryable(&Method::PUT, Some(503), false));
        assert!(!is_retryable(&Method::PATCH, Some(500), false));
    }

    #[test]
    fn test_5xx_retryable_4xx_not() {
        assert!(is_retryable(&Method::GET, Some(502), false));
        assert!(!is_retryable(&Method::GET, Some(404), false));
        assert!(!is_retryable(&Method::GET, Some(429), false));
    }
}
