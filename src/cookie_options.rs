use std::time::Duration;

use cookie::{Cookie, SameSite};
use time::OffsetDateTime;
use tower_cookies::Cookies;

/// Configuration options for identity cookies.
///
/// # Example
///
/// ```rust
/// use roost::CookieOptions;
///
/// let cookie_options = CookieOptions::build()
///         .name("test_sess")
///         .http_only(true)
///         .same_site(cookie::SameSite::Lax)
///         .secure(true)
///         .path("/");
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CookieOptions {
    pub http_only: bool,
    pub name: &'static str,
    pub domain: Option<&'static str>,
    pub path: &'static str,
    pub same_site: SameSite,
    pub secure: bool,
    pub partitioned: bool,
}

impl Default for CookieOptions {
    fn default() -> Self {
        Self {
            http_only: true,
            name: "session",
            domain: None,
            path: "/",
            same_site: SameSite::Strict,
            secure: true,
            partitioned: false,
        }
    }
}

impl CookieOptions {
    /// Creates a new `CookieOptions` with default values.
    pub fn build() -> Self {
        Self::default()
    }

    /// Sets the name of the cookie.
    pub fn name(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }

    pub fn http_only(mut self, http_only: bool) -> Self {
        self.http_only = http_only;
        self
    }

    pub fn same_site(mut self, same_site: SameSite) -> Self {
        self.same_site = same_site;
        self
    }

    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    pub fn domain(mut self, domain: &'static str) -> Self {
        self.domain = Some(domain);
        self
    }

    pub fn path(mut self, path: &'static str) -> Self {
        self.path = path;
        self
    }

    pub fn partitioned(mut self, partitioned: bool) -> Self {
        self.partitioned = partitioned;
        self
    }

    /// Builds a cookie carrying `value` that lives for `ttl`.
    ///
    /// `Max-Age` is omitted when `ttl` is under a second, leaving `Expires`
    /// to bound the cookie.
    pub fn to_cookie(&self, value: String, ttl: Duration) -> Cookie<'static> {
        let max_age = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
        let mut cookie = self
            .builder(value)
            .expires(crate::store::expires_after(OffsetDateTime::now_utc(), ttl))
            .build();

        if max_age > 0 {
            cookie.set_max_age(cookie::time::Duration::seconds(max_age));
        }

        cookie
    }

    /// Builds an empty cookie that tells the client to discard it now.
    pub fn to_revoked(&self) -> Cookie<'static> {
        self.builder(String::new())
            .max_age(cookie::time::Duration::seconds(-1))
            .expires(OffsetDateTime::UNIX_EPOCH)
            .build()
    }

    fn builder(&self, value: String) -> cookie::CookieBuilder<'static> {
        let builder = Cookie::build((self.name, value))
            .path(self.path)
            .secure(self.secure)
            .http_only(self.http_only)
            .same_site(self.same_site)
            .partitioned(self.partitioned);

        if let Some(domain) = self.domain {
            builder.domain(domain)
        } else {
            builder
        }
    }
}

/// Binds a record identity to the cookie named in its [`CookieOptions`].
///
/// Owns no data: reading goes through the request's cookie jar, and issuing
/// or revoking adds a cookie to the jar that `CookieManagerLayer` turns into a
/// `Set-Cookie` header.
#[derive(Clone, Copy, Debug)]
pub struct CookieBinder {
    options: CookieOptions,
}

impl CookieBinder {
    pub fn new(options: CookieOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &CookieOptions {
        &self.options
    }

    /// The identity currently carried by the jar, if any. A revoked cookie
    /// (empty value) counts as absent.
    pub fn identity(&self, cookies: &Cookies) -> Option<String> {
        cookies
            .get(self.options.name)
            .map(|cookie| cookie.value().to_owned())
            .filter(|value| !value.is_empty())
    }

    /// (Re-)issues the cookie for `id`, living for `ttl`.
    pub fn issue(&self, cookies: &Cookies, id: impl Into<String>, ttl: Duration) {
        cookies.add(self.options.to_cookie(id.into(), ttl));
    }

    /// Issues an immediately-expiring cookie so the client drops its identity.
    pub fn revoke(&self, cookies: &Cookies) {
        cookies.add(self.options.to_revoked());
    }
}
