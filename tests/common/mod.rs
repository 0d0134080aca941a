#![allow(dead_code)]

use roost::CookieOptions;
use serde::{Deserialize, Serialize};
use tower_cookies::Cookies;

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct TestUser {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct TestSession {
    pub user: TestUser,
    pub preferences: TestPreferences,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct TestPreferences {
    pub theme: String,
    pub language: String,
}

pub fn create_test_session() -> TestSession {
    TestSession {
        user: TestUser {
            id: 1,
            name: "Test User".to_string(),
        },
        preferences: TestPreferences {
            theme: "dark".to_string(),
            language: "en".to_string(),
        },
    }
}

pub fn build_cookie_options() -> CookieOptions {
    CookieOptions::build()
        .name("test_sess")
        .http_only(true)
        .same_site(cookie::SameSite::Strict)
        .secure(true)
        .path("/")
}

/// Starts a new request jar holding the cookie `name` from a previous one,
/// the way a browser would send it back.
pub fn next_request(previous: &Cookies, name: &str) -> Cookies {
    let cookies = Cookies::default();
    if let Some(cookie) = previous.get(name) {
        cookies.add(cookie::Cookie::new(name.to_string(), cookie.value().to_string()));
    }
    cookies
}
