//! JSON parsing for cookies sent by the extension.
//!
//! Handles conversion from loosely-shaped browser cookie objects and
//! locally cached domain payloads to domain models.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::domain::{AppError, CookieEntry, Result, SameSite};

/// Cookie object as sent by the extension. Unknown fields are ignored.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCookie {
    name: String,
    #[serde(default)]
    value: Option<String>,
    #[serde(default)]
    domain: Option<String>,
    #[serde(default)]
    path: Option<String>,
    #[serde(default, alias = "expires", alias = "expirationDate")]
    expires_at: Option<Value>,
    #[serde(default)]
    http_only: Option<bool>,
    #[serde(default)]
    secure: Option<bool>,
    #[serde(default)]
    same_site: Option<String>,
}

/// Locally cached payload for one domain.
#[derive(Debug, Deserialize)]
struct RawDomainPayload {
    cookies: Option<Value>,
}

/// Parses a single cookie object.
///
/// # Errors
/// Returns a validation error if the value is not an object with a string `name`.
pub fn parse_cookie(value: Value) -> Result<CookieEntry> {
    let raw: RawCookie = serde_json::from_value(value)
        .map_err(|e| AppError::validation(format!("Invalid cookie: {e}")))?;

    let same_site = raw
        .same_site
        .as_deref()
        .map_or(Ok(SameSite::Unset), |s| s.parse::<SameSite>())
        .map_err(AppError::validation)?;

    Ok(CookieEntry {
        name: raw.name,
        value: raw.value.unwrap_or_default(),
        domain: raw.domain.unwrap_or_default(),
        path: raw.path.unwrap_or_default(),
        expires_at: parse_expiry(raw.expires_at.as_ref())?,
        http_only: raw.http_only.unwrap_or(false),
        secure: raw.secure.unwrap_or(false),
        same_site,
    })
}

/// Parses a list of cookie objects, naming the offending index on failure.
///
/// # Errors
/// Returns a validation error for the first invalid entry.
pub fn parse_cookies(values: Vec<Value>) -> Result<Vec<CookieEntry>> {
    values
        .into_iter()
        .enumerate()
        .map(|(i, value)| {
            parse_cookie(value).map_err(|e| AppError::validation(format!("Cookie {i}: {e}")))
        })
        .collect()
}

/// Extracts the `cookies` array from a locally cached domain payload.
///
/// The extension stores each domain as JSON text, but an already-decoded
/// object is accepted too. Returns `None` when the payload cannot be
/// decoded or has no `cookies` array.
#[must_use]
pub fn extract_cookie_array(payload: &Value) -> Option<Vec<Value>> {
    let decoded: RawDomainPayload = match payload {
        Value::String(text) => serde_json::from_str(text).ok()?,
        Value::Object(_) => serde_json::from_value(payload.clone()).ok()?,
        _ => return None,
    };

    match decoded.cookies? {
        Value::Array(items) => Some(items),
        _ => None,
    }
}

/// Parses an expiry given as epoch seconds or an RFC 3339 string.
fn parse_expiry(value: Option<&Value>) -> Result<Option<DateTime<Utc>>> {
    let invalid = || AppError::validation("Invalid cookie expiry");

    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => {
            let secs = n.as_f64().ok_or_else(invalid)?;
            let millis = (secs * 1000.0).round() as i64;
            DateTime::from_timestamp_millis(millis)
                .map(Some)
                .ok_or_else(invalid)
        }
        Some(Value::String(s)) => s
            .parse::<DateTime<Utc>>()
            .map(Some)
            .map_err(|_| invalid()),
        Some(_) => Err(invalid()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_chrome_cookie() {
        let cookie = parse_cookie(json!({
            "name": "sid",
            "value": "abc",
            "domain": ".example.com",
            "path": "/",
            "expirationDate": 1_767_225_600.5,
            "httpOnly": true,
            "secure": true,
            "sameSite": "no_restriction",
            "hostOnly": false,
            "storeId": "0"
        }))
        .unwrap();

        assert_eq!(cookie.name, "sid");
        assert_eq!(cookie.same_site, SameSite::None);
        assert!(cookie.http_only);
        assert_eq!(
            cookie.expires_at.unwrap().timestamp_millis(),
            1_767_225_600_500
        );
    }

    #[test]
    fn test_parse_minimal_cookie() {
        let cookie = parse_cookie(json!({ "name": "theme" })).unwrap();
        assert_eq!(cookie.value, "");
        assert_eq!(cookie.expires_at, None);
        assert_eq!(cookie.same_site, SameSite::Unset);
        assert!(!cookie.secure);
    }

    #[test]
    fn test_parse_iso_expiry() {
        let cookie =
            parse_cookie(json!({ "name": "a", "expiresAt": "2030-01-01T00:00:00Z" })).unwrap();
        assert_eq!(cookie.expires_at.unwrap().to_rfc3339(), "2030-01-01T00:00:00+00:00");
    }

    #[test]
    fn test_cookie_without_name_rejected() {
        let err = parse_cookies(vec![json!({ "name": "ok" }), json!({ "value": "x" })]).unwrap_err();
        assert!(err.to_string().starts_with("Cookie 1:"));
        assert!(parse_cookie(json!("just a string")).is_err());
    }

    #[test]
    fn test_extract_from_json_text() {
        let payload = json!(r#"{"cookies":[{"name":"a"}],"timestamp":1}"#);
        assert_eq!(extract_cookie_array(&payload).unwrap().len(), 1);
    }

    #[test]
    fn test_extract_from_object() {
        let payload = json!({ "cookies": [] });
        assert_eq!(extract_cookie_array(&payload), Some(vec![]));
    }

    #[test]
    fn test_extract_rejects_malformed() {
        assert_eq!(extract_cookie_array(&json!("{not json")), None);
        assert_eq!(extract_cookie_array(&json!({ "other": 1 })), None);
        assert_eq!(extract_cookie_array(&json!({ "cookies": "nope" })), None);
        assert_eq!(extract_cookie_array(&json!(true)), None);
    }
}
