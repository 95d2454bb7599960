//! HTTP Digest authentication (RFC 2617, `qop="auth"`, MD5).
//!
//! Nonces are the server's unix time in lowercase hex. A nonce is accepted
//! while it is strictly younger than [`NONCE_LIFETIME_SECS`] and strictly
//! older than the current second. Request counts (`nc`) are hashed but not
//! tracked, so replay protection is limited to the nonce lifetime.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::auth::{CredentialStore, UserGroup};
use crate::http::request::Request;

/// Seconds a nonce stays valid after it was issued.
pub const NONCE_LIFETIME_SECS: u64 = 3600;

/// Fields every Digest `Authorization` header must carry.
const REQUIRED_FIELDS: [&str; 7] = ["username", "cnonce", "response", "uri", "qop", "nc", "nonce"];

/// Computes HA1 = MD5(user:domain:password) as lowercase hex.
///
/// ```
/// # use camweb::auth::calculate_ha1;
/// let ha1 = calculate_ha1("admin", "cam2web", "password");
/// assert_eq!(ha1.len(), 32);
/// ```
pub fn calculate_ha1(user: &str, domain: &str, password: &str) -> String {
    md5_hex(&[user, ":", domain, ":", password])
}

/// Resolves the caller's group from the request's `Authorization` header.
///
/// Every failure (no header, missing field, stale nonce, unknown user,
/// wrong response) resolves to [`UserGroup::Anyone`].
pub fn authenticate(store: &CredentialStore, request: &Request) -> UserGroup {
    authenticate_at(store, request, unix_now())
}

/// Same as [`authenticate`] with an explicit clock, in unix seconds.
pub fn authenticate_at(store: &CredentialStore, request: &Request, now: u64) -> UserGroup {
    let Some(header) = request.header("Authorization") else {
        return UserGroup::Anyone;
    };

    let params = parse_authorization(header);
    if REQUIRED_FIELDS.iter().any(|field| !params.contains_key(*field)) {
        tracing::debug!("Digest authorization header is missing fields");
        return UserGroup::Anyone;
    }

    let nonce = params["nonce"];
    if !nonce_is_fresh(nonce, now) {
        tracing::debug!(nonce, "Stale or invalid digest nonce");
        return UserGroup::Anyone;
    }

    let username = params["username"];
    let Some((ha1, group)) = store.lookup(username) else {
        tracing::debug!(username, "Unknown user in digest authorization");
        return UserGroup::Anyone;
    };

    let ha2 = if request.query.is_empty() {
        md5_hex(&[request.method.as_str(), ":", &request.uri])
    } else {
        md5_hex(&[request.method.as_str(), ":", &request.uri, "?", &request.query])
    };

    let expected = md5_hex(&[
        ha1,
        ":",
        nonce,
        ":",
        params["nc"],
        ":",
        params["cnonce"],
        ":",
        params["qop"],
        ":",
        &ha2,
    ]);

    if params["response"] == expected {
        group
    } else {
        tracing::debug!(username, "Digest response mismatch");
        UserGroup::Anyone
    }
}

/// Checks `0 < now - nonce < NONCE_LIFETIME_SECS`.
///
/// Only the leading hex digits of the nonce count; anything after them is
/// ignored. Nonces without leading hex digits, or too large for a `u64`,
/// are stale.
pub fn nonce_is_fresh(nonce: &str, now: u64) -> bool {
    let digits = nonce
        .find(|c: char| !c.is_ascii_hexdigit())
        .map_or(nonce, |end| &nonce[..end]);
    let issued = u64::from_str_radix(digits, 16).unwrap_or(0);
    now > issued && now - issued < NONCE_LIFETIME_SECS
}

/// Lowercase hex nonce for the given unix time.
pub fn make_nonce(now: u64) -> String {
    format!("{:x}", now)
}

/// Builds the full `401 Unauthorized` challenge, ready to be written as is.
pub fn challenge(realm: &str, now: u64) -> String {
    format!(
        "HTTP/1.1 401 Unauthorized\r\n\
         WWW-Authenticate: Digest qop=\"auth\", realm=\"{}\", nonce=\"{}\"\r\n\
         Content-Length: 0\r\n\r\n",
        realm,
        make_nonce(now)
    )
}

/// Splits a Digest credentials string into its `key=value` parameters.
///
/// Values may be quoted (commas allowed inside quotes) or bare. The leading
/// `Digest` scheme token is optional.
pub fn parse_authorization(header: &str) -> HashMap<&str, &str> {
    let mut params = HashMap::new();
    let mut rest = header.trim();

    if let Some(scheme) = rest.get(..6).filter(|s| s.eq_ignore_ascii_case("digest")) {
        rest = &rest[scheme.len()..];
    }

    loop {
        rest = rest.trim_start_matches(|c: char| c == ',' || c.is_ascii_whitespace());
        if rest.is_empty() {
            break;
        }

        let Some(eq) = rest.find('=') else {
            break;
        };
        let key = rest[..eq].trim();
        rest = rest[eq + 1..].trim_start();

        let value;
        if let Some(quoted) = rest.strip_prefix('"') {
            let Some(end) = quoted.find('"') else {
                break;
            };
            value = &quoted[..end];
            rest = &quoted[end + 1..];
        } else {
            let end = rest.find(',').unwrap_or(rest.len());
            value = rest[..end].trim();
            rest = &rest[end..];
        }

        params.insert(key, value);
    }

    params
}

pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn md5_hex(parts: &[&str]) -> String {
    let mut ctx = md5::Context::new();
    for part in parts {
        ctx.consume(part.as_bytes());
    }
    format!("{:x}", ctx.compute())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_quoted_and_bare_values() {
        let params = parse_authorization(
            r#"Digest username="admin", realm="cam2web", nonce="65f0a1b2", uri="/config?a=1,2", qop=auth, nc=00000001, cnonce="abc", response="ff""#,
        );

        assert_eq!(params["username"], "admin");
        assert_eq!(params["uri"], "/config?a=1,2");
        assert_eq!(params["qop"], "auth");
        assert_eq!(params["nc"], "00000001");
        assert_eq!(params["response"], "ff");
    }

    #[test]
    fn nc_is_not_confused_with_cnonce() {
        let params = parse_authorization(r#"Digest cnonce="xyz""#);
        assert!(!params.contains_key("nc"));
        assert_eq!(params["cnonce"], "xyz");
    }

    #[test]
    fn nonce_window_is_exclusive_at_both_ends() {
        let now = 1_700_000_000;
        assert!(!nonce_is_fresh(&make_nonce(now), now));
        assert!(nonce_is_fresh(&make_nonce(now - 1), now));
        assert!(nonce_is_fresh(&make_nonce(now - 3599), now));
        assert!(!nonce_is_fresh(&make_nonce(now - 3600), now));
        assert!(!nonce_is_fresh(&make_nonce(now + 10), now));
        assert!(!nonce_is_fresh("not-hex", now));
    }

    #[test]
    fn nonce_uses_leading_hex_digits_only() {
        let now = 1_700_000_000;
        let nonce = make_nonce(now - 10);
        assert!(nonce_is_fresh(&format!("{}-x1", nonce), now));
        assert!(!nonce_is_fresh(&format!("+{}", nonce), now));
        assert!(!nonce_is_fresh("ffffffffffffffffff", now));
    }

    #[test]
    fn scheme_check_tolerates_multibyte_text() {
        assert!(parse_authorization("abcdeé").is_empty());
        assert!(parse_authorization("abcdé").is_empty());
        assert!(parse_authorization("é").is_empty());
    }

    #[test]
    fn ha1_matches_known_digest() {
        assert_eq!(
            calculate_ha1("Mufasa", "testrealm@host.com", "Circle Of Life"),
            "939e7578ed9e3c518a452acee763bce9"
        );
    }

    #[test]
    fn challenge_format() {
        let text = challenge("cam2web", 0x1234abcd);
        assert!(text.starts_with("HTTP/1.1 401 Unauthorized\r\n"));
        assert!(text.contains(
            "WWW-Authenticate: Digest qop=\"auth\", realm=\"cam2web\", nonce=\"1234abcd\"\r\n"
        ));
        assert!(text.ends_with("Content-Length: 0\r\n\r\n"));
    }
}
