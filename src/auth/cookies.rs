use std::time::Duration;

use anyhow::{anyhow, Result};
use axum::http::{HeaderMap, HeaderValue};

pub const ACCESS_COOKIE: &str = "accessToken";
pub const REFRESH_COOKIE: &str = "refreshToken";

/// Extract a cookie value by name from a `Cookie` request header.
pub fn get_cookie(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    headers
        .get(axum::http::header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|cookies| {
            cookies.split(';').find_map(|cookie| {
                let mut parts = cookie.trim().splitn(2, '=');
                let name = parts.next()?.trim();
                let value = parts.next()?.trim();
                (name == cookie_name).then(|| value.to_string())
            })
        })
}

fn build_cookie(name: &str, value: &str, max_age: Option<Duration>) -> Result<HeaderValue> {
    let mut cookie = format!("{}={}", name, value);
    if let Some(age) = max_age {
        cookie.push_str(&format!("; Max-Age={}", age.as_secs()));
    }
    cookie.push_str("; Path=/; HttpOnly; Secure; SameSite=Strict");
    HeaderValue::from_str(&cookie).map_err(|e| anyhow!("invalid cookie value: {}", e))
}

/// `Set-Cookie` value for an auth token, HttpOnly and Secure.
pub fn auth_cookie(name: &str, value: &str, max_age: Duration) -> Result<HeaderValue> {
    build_cookie(name, value, Some(max_age))
}

/// `Set-Cookie` value that expires the named cookie immediately.
pub fn expired_cookie(name: &str) -> Result<HeaderValue> {
    build_cookie(name, "", Some(Duration::from_secs(0)))
}
