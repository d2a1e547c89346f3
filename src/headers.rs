//! Required request header contract
//!
//! The opening handshake is only accepted when the three headers in
//! [`REQUIRED_HEADERS`] carry their required values. Rules are evaluated in
//! declared order and the first mismatch is reported, so a request that breaks
//! several rules always fails the same way.

use http::header::SEC_WEBSOCKET_KEY;
use http::{HeaderMap, HeaderValue, StatusCode};

use crate::error::HandshakeError;
use crate::handshake::is_valid_key;

/// How a header value is compared against the required value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HeaderMatch {
    /// Byte-exact, case-sensitive comparison of the whole value
    #[default]
    Exact,
    /// Comma-separated token list, compared case-insensitively
    /// (RFC 6455 §4.2.1, accepts `Connection: keep-alive, Upgrade`)
    Token,
}

/// A required header and the value it must carry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderRule {
    /// Header name
    pub name: &'static str,
    /// Required value
    pub value: &'static str,
    /// Status reported on mismatch
    pub status: StatusCode,
    /// Failure message
    pub message: &'static str,
}

/// The handshake's header contract, in evaluation order
pub const REQUIRED_HEADERS: [HeaderRule; 3] = [
    HeaderRule {
        name: "Connection",
        value: "Upgrade",
        status: StatusCode::BAD_REQUEST,
        message: "connection header must be Upgrade",
    },
    HeaderRule {
        name: "Upgrade",
        value: "websocket",
        status: StatusCode::BAD_REQUEST,
        message: "upgrade header must be websocket",
    },
    HeaderRule {
        name: "Sec-WebSocket-Version",
        value: crate::WEBSOCKET_VERSION,
        status: StatusCode::UPGRADE_REQUIRED,
        message: "Sec-WebSocket-Version must be 13",
    },
];

impl HeaderRule {
    /// Check this rule against the first value of its header
    pub fn check(&self, headers: &HeaderMap, mode: HeaderMatch) -> Result<(), HandshakeError> {
        match headers.get(self.name) {
            Some(value) if self.matches(value, mode) => Ok(()),
            _ => Err(self.violation()),
        }
    }

    /// The error reported when this rule fails
    pub fn violation(&self) -> HandshakeError {
        HandshakeError::new(self.name, self.message, self.status)
    }

    fn matches(&self, value: &HeaderValue, mode: HeaderMatch) -> bool {
        match mode {
            HeaderMatch::Exact => value.as_bytes() == self.value.as_bytes(),
            HeaderMatch::Token => value.to_str().is_ok_and(|v| {
                v.split(',')
                    .any(|token| token.trim().eq_ignore_ascii_case(self.value))
            }),
        }
    }
}

/// Validate the handshake's required headers
#[inline]
pub fn check_headers(headers: &HeaderMap, mode: HeaderMatch) -> Result<(), HandshakeError> {
    check_rules(headers, &REQUIRED_HEADERS, mode)
}

/// Validate an ordered rule set, failing on the first mismatch
pub fn check_rules(
    headers: &HeaderMap,
    rules: &[HeaderRule],
    mode: HeaderMatch,
) -> Result<(), HandshakeError> {
    rules.iter().try_for_each(|rule| rule.check(headers, mode))
}

/// Fetch the client nonce
///
/// The key must be present. With `validate` set it must also be base64 for
/// exactly 16 bytes.
pub fn check_key(headers: &HeaderMap, validate: bool) -> Result<&HeaderValue, HandshakeError> {
    let key = headers.get(SEC_WEBSOCKET_KEY).ok_or_else(|| {
        HandshakeError::new(
            "Sec-WebSocket-Key",
            "Sec-WebSocket-Key is required",
            StatusCode::BAD_REQUEST,
        )
    })?;

    if validate && !is_valid_key(key.as_bytes()) {
        return Err(HandshakeError::new(
            "Sec-WebSocket-Key",
            "Sec-WebSocket-Key must be a base64-encoded 16-byte nonce",
            StatusCode::BAD_REQUEST,
        ));
    }

    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::header::{CONNECTION, SEC_WEBSOCKET_VERSION, UPGRADE};

    fn upgrade_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONNECTION, HeaderValue::from_static("Upgrade"));
        headers.insert(UPGRADE, HeaderValue::from_static("websocket"));
        headers.insert(SEC_WEBSOCKET_VERSION, HeaderValue::from_static("13"));
        headers.insert(
            SEC_WEBSOCKET_KEY,
            HeaderValue::from_static("dGhlIHNhbXBsZSBub25jZQ=="),
        );
        headers
    }

    #[test]
    fn test_valid_headers() {
        assert!(check_headers(&upgrade_headers(), HeaderMatch::Exact).is_ok());
    }

    #[test]
    fn test_missing_connection() {
        let mut headers = upgrade_headers();
        headers.remove(CONNECTION);

        let err = check_headers(&headers, HeaderMatch::Exact).unwrap_err();
        assert_eq!(err.header, "Connection");
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_connection_mismatch() {
        let mut headers = upgrade_headers();
        headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));

        let err = check_headers(&headers, HeaderMatch::Exact).unwrap_err();
        assert_eq!(err.header, "Connection");
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_upgrade_chat() {
        let mut headers = upgrade_headers();
        headers.insert(UPGRADE, HeaderValue::from_static("chat"));

        let err = check_headers(&headers, HeaderMatch::Exact).unwrap_err();
        assert_eq!(err.header, "Upgrade");
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert!(err.to_string().contains("Upgrade"));
    }

    #[test]
    fn test_version_mismatch() {
        for version in ["8", "12", "14", ""] {
            let mut headers = upgrade_headers();
            headers.insert(SEC_WEBSOCKET_VERSION, HeaderValue::from_str(version).unwrap());

            let err = check_headers(&headers, HeaderMatch::Exact).unwrap_err();
            assert_eq!(err.header, "Sec-WebSocket-Version");
            assert_eq!(err.status, StatusCode::UPGRADE_REQUIRED);
        }
    }

    #[test]
    fn test_exact_is_case_sensitive() {
        let mut headers = upgrade_headers();
        headers.insert(UPGRADE, HeaderValue::from_static("WebSocket"));

        assert!(check_headers(&headers, HeaderMatch::Exact).is_err());
        assert!(check_headers(&headers, HeaderMatch::Token).is_ok());
    }

    #[test]
    fn test_first_violation_wins() {
        let mut headers = upgrade_headers();
        headers.insert(CONNECTION, HeaderValue::from_static("close"));
        headers.insert(UPGRADE, HeaderValue::from_static("chat"));
        headers.insert(SEC_WEBSOCKET_VERSION, HeaderValue::from_static("8"));

        let err = check_headers(&headers, HeaderMatch::Exact).unwrap_err();
        assert_eq!(err.header, "Connection");

        headers.insert(CONNECTION, HeaderValue::from_static("Upgrade"));
        let err = check_headers(&headers, HeaderMatch::Exact).unwrap_err();
        assert_eq!(err.header, "Upgrade");
    }

    #[test]
    fn test_check_is_idempotent() {
        let mut headers = upgrade_headers();
        headers.insert(SEC_WEBSOCKET_VERSION, HeaderValue::from_static("7"));

        let first = check_headers(&headers, HeaderMatch::Exact);
        let second = check_headers(&headers, HeaderMatch::Exact);
        assert_eq!(first, second);

        let headers = upgrade_headers();
        assert_eq!(
            check_headers(&headers, HeaderMatch::Exact),
            check_headers(&headers, HeaderMatch::Exact)
        );
    }

    #[test]
    fn test_token_connection_list() {
        let mut headers = upgrade_headers();
        headers.insert(CONNECTION, HeaderValue::from_static("keep-alive, Upgrade"));

        assert!(check_headers(&headers, HeaderMatch::Exact).is_err());
        assert!(check_headers(&headers, HeaderMatch::Token).is_ok());
    }

    #[test]
    fn test_token_rejects_partial_word() {
        let mut headers = upgrade_headers();
        headers.insert(UPGRADE, HeaderValue::from_static("websocketx"));

        assert!(check_headers(&headers, HeaderMatch::Token).is_err());
    }

    #[test]
    fn test_custom_rules() {
        let rules = [HeaderRule {
            name: "Origin",
            value: "https://example.com",
            status: StatusCode::FORBIDDEN,
            message: "origin not allowed",
        }];

        let err = check_rules(&upgrade_headers(), &rules, HeaderMatch::Exact).unwrap_err();
        assert_eq!(err.status, StatusCode::FORBIDDEN);
        assert_eq!(err, rules[0].violation());
    }

    #[test]
    fn test_missing_key() {
        let mut headers = upgrade_headers();
        headers.remove(SEC_WEBSOCKET_KEY);

        for validate in [false, true] {
            let err = check_key(&headers, validate).unwrap_err();
            assert_eq!(err.header, "Sec-WebSocket-Key");
            assert_eq!(err.status, StatusCode::BAD_REQUEST);
        }
    }

    #[test]
    fn test_malformed_key_only_checked_on_request() {
        let mut headers = upgrade_headers();
        headers.insert(SEC_WEBSOCKET_KEY, HeaderValue::from_static("short"));

        assert_eq!(check_key(&headers, false).unwrap(), "short");

        let err = check_key(&headers, true).unwrap_err();
        assert_eq!(err.header, "Sec-WebSocket-Key");
        assert!(err.message.contains("16-byte"));
    }

    #[test]
    fn test_valid_key() {
        let headers = upgrade_headers();
        assert_eq!(
            check_key(&headers, true).unwrap(),
            "dGhlIHNhbXBsZSBub25jZQ=="
        );
    }
}
