//! HTTP transport collaborator for adapters
//!
//! Builds the configured `reqwest` client (per-source timeout, gzip, fixed
//! identifying user-agent) and derives request headers from a source's
//! auth policy: api-key header, bearer token, or basic credentials, plus
//! arbitrary custom headers.

use base64::Engine;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::Client;
use std::time::Duration;

use crate::error::RegistrationError;
use crate::models::{AuthConfig, AuthScheme, PollingConfig};

/// Build the per-source HTTP client
pub fn build_client(polling: &PollingConfig, user_agent: &str) -> Result<Client, RegistrationError> {
    Client::builder()
        .timeout(Duration::from_secs(polling.timeout_seconds))
        .gzip(true)
        .user_agent(user_agent)
        .build()
        .map_err(|e| RegistrationError::InvalidValue {
            field: "http_client",
            reason: e.to_string(),
        })
}

/// Derive the fixed request headers for a source's auth policy
///
/// Header construction failures (credentials that are not valid header
/// values) are registration errors: they are detectable before the first
/// poll and rejecting early beats failing every fetch.
pub fn auth_headers(auth: &AuthConfig) -> Result<HeaderMap, RegistrationError> {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("application/rss+xml, application/atom+xml, application/xml, text/xml;q=0.9, */*;q=0.8"),
    );

    match &auth.scheme {
        AuthScheme::None => {}
        AuthScheme::ApiKey { header, key } => {
            let name = HeaderName::from_bytes(header.as_bytes()).map_err(|_| {
                RegistrationError::InvalidValue {
                    field: "auth.header",
                    reason: format!("'{header}' is not a valid header name"),
                }
            })?;
            headers.insert(name, header_value("auth.key", key)?);
        }
        AuthScheme::Bearer { token } => {
            headers.insert(
                AUTHORIZATION,
                header_value("auth.token", &format!("Bearer {token}"))?,
            );
        }
        AuthScheme::Basic { username, password } => {
            let credentials =
                base64::engine::general_purpose::STANDARD.encode(format!("{username}:{password}"));
            headers.insert(
                AUTHORIZATION,
                header_value("auth.credentials", &format!("Basic {credentials}"))?,
            );
        }
    }

    for (name, value) in &auth.headers {
        let name =
            HeaderName::from_bytes(name.as_bytes()).map_err(|_| RegistrationError::InvalidValue {
                field: "auth.headers",
                reason: format!("'{name}' is not a valid header name"),
            })?;
        headers.insert(name, header_value("auth.headers", value)?);
    }

    Ok(headers)
}

fn header_value(field: &'static str, value: &str) -> Result<HeaderValue, RegistrationError> {
    HeaderValue::from_str(value).map_err(|_| RegistrationError::InvalidValue {
        field,
        reason: "value is not a valid header value".to_string(),
    })
}
