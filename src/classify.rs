//! Reference error classifier for use as a retry predicate.
//!
//! Works on error text alone: explicit HTTP status codes decide first,
//! then well-known transport failure phrases. A number only counts as a
//! status code when it opens the message or follows an HTTP-ish word, so
//! port numbers and ids are never mistaken for one.

use std::fmt::Display;

const NETWORK_MARKERS: &[&str] = &[
    "network",
    "connection",
    "connect error",
    "timeout",
    "timed out",
    "refused",
    "reset by peer",
    "broken pipe",
    "unreachable",
    "dns",
    "econnreset",
    "econnrefused",
    "etimedout",
];

/// Words that may directly precede a status code (`HTTP/1.1 503`, `status=404`).
const STATUS_CONTEXT: &[&str] = &["http", "status", "code", "error", "returned", "response"];

const RATE_LIMIT_MARKERS: &[&str] = &["rate limit", "rate-limit", "ratelimit", "too many requests"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Network,
    RateLimited,
    Server(u16),
    Client(u16),
    Other,
}

impl ErrorClass {
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::Network | Self::RateLimited | Self::Server(_))
    }
}

pub fn classify(message: &str) -> ErrorClass {
    let lowered = message.to_ascii_lowercase();

    if RATE_LIMIT_MARKERS.iter().any(|m| lowered.contains(m)) {
        return ErrorClass::RateLimited;
    }

    if let Some(status) = status_code(&lowered) {
        return match status {
            429 => ErrorClass::RateLimited,
            500..=599 => ErrorClass::Server(status),
            _ => ErrorClass::Client(status),
        };
    }

    if NETWORK_MARKERS.iter().any(|m| lowered.contains(m)) {
        return ErrorClass::Network;
    }

    ErrorClass::Other
}

/// Predicate form of [`classify`], suitable for `RetryPolicy::with_predicate`.
pub fn is_retryable<E: Display + ?Sized>(error: &E) -> bool {
    classify(&error.to_string()).is_retryable()
}

/// First three-digit code in 400..=599 that sits in a status position.
fn status_code(text: &str) -> Option<u16> {
    let tokens: Vec<&str> = text
        .split(|c: char| c.is_whitespace() || c == ':' || c == '=')
        .map(|token| token.trim_matches(|c: char| !c.is_ascii_alphanumeric() && c != '/'))
        .filter(|token| !token.is_empty())
        .collect();

    tokens.iter().enumerate().find_map(|(idx, token)| {
        if token.len() != 3 || !token.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let code = token.parse::<u16>().ok().filter(|code| (400..=599).contains(code))?;
        let in_status_position = idx == 0
            || STATUS_CONTEXT
                .iter()
                .any(|word| tokens[idx - 1].starts_with(word));
        in_status_position.then_some(code)
    })
}
