//! Cookie-bound authentication records.
//!
//! An [`Auth`] is created once per application. Each request borrows it
//! through [`Auth::with_cookies`], getting an [`AuthContext`] that reads and
//! writes the identity cookie of that request.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tower_cookies::Cookies;

use crate::codec::{Codec, JsonCodec};
use crate::config::{DEFAULT_AUTH_TTL, ExpiryConfig};
use crate::store::{Reclaimer, RecordStore};
use crate::{CookieBinder, CookieOptions, Error, Id, Result};

/// Application scoped auth store.
///
/// Cloning is cheap; all clones share one backend and one reclaimer.
#[derive(Debug)]
pub struct Auth<S: RecordStore, C: Codec = JsonCodec> {
    inner: Arc<Inner<S, C>>,
}

impl<S: RecordStore, C: Codec> Clone for Auth<S, C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[derive(Debug)]
struct Inner<S, C> {
    store: S,
    codec: C,
    binder: CookieBinder,
    config: ExpiryConfig,
    reclaimer: Reclaimer,
}

impl<S: RecordStore> Auth<S> {
    /// Starts configuring an auth store on top of `store`.
    pub fn builder(store: S) -> AuthBuilder<S> {
        AuthBuilder::new(store)
    }
}

impl<S: RecordStore, C: Codec> Auth<S, C> {
    /// Returns the request scoped view of this store.
    pub fn with_cookies(&self, cookies: Cookies) -> AuthContext<S, C> {
        AuthContext {
            auth: self.clone(),
            cookies,
        }
    }

    pub fn store(&self) -> &S {
        &self.inner.store
    }

    pub fn cookie_options(&self) -> &CookieOptions {
        self.inner.binder.options()
    }

    pub fn config(&self) -> &ExpiryConfig {
        &self.inner.config
    }

    /// Stops the background reclaimer. Stored records are left in place.
    pub fn stop(&self) {
        self.inner.reclaimer.stop();
    }
}

/// Builder for [`Auth`].
#[derive(Debug)]
pub struct AuthBuilder<S, C = JsonCodec> {
    store: S,
    codec: C,
    config: ExpiryConfig,
    cookie_options: CookieOptions,
}

impl<S: RecordStore> AuthBuilder<S> {
    fn new(store: S) -> Self {
        Self {
            store,
            codec: JsonCodec,
            config: ExpiryConfig::with_default_ttl(DEFAULT_AUTH_TTL),
            cookie_options: CookieOptions::build().name("auth"),
        }
    }
}

impl<S: RecordStore, C: Codec> AuthBuilder<S, C> {
    /// Replaces the payload codec. Defaults to [`JsonCodec`].
    pub fn codec<C2: Codec>(self, codec: C2) -> AuthBuilder<S, C2> {
        AuthBuilder {
            store: self.store,
            codec,
            config: self.config,
            cookie_options: self.cookie_options,
        }
    }

    /// Default record lifetime. Defaults to 24 hours.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.config.ttl = ttl;
        self
    }

    /// Renew the record and its cookie on every successful read.
    pub fn sliding(mut self, sliding: bool) -> Self {
        self.config.sliding = sliding;
        self
    }

    /// How often expired records are swept. Defaults to 10 minutes.
    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.config.sweep_interval = interval;
        self
    }

    /// Defaults to a cookie named `auth` with [`CookieOptions::default`] flags.
    pub fn cookie_options(mut self, cookie_options: CookieOptions) -> Self {
        self.cookie_options = cookie_options;
        self
    }

    /// Builds the store and starts its reclaimer.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime.
    pub fn build(self) -> Auth<S, C> {
        let config = self.config.normalized(DEFAULT_AUTH_TTL);
        let reclaimer = Reclaimer::spawn(self.store.clone(), config.sweep_interval);

        Auth {
            inner: Arc::new(Inner {
                store: self.store,
                codec: self.codec,
                binder: CookieBinder::new(self.cookie_options),
                config,
                reclaimer,
            }),
        }
    }
}

/// Request scoped access to an [`Auth`] store.
#[derive(Debug)]
pub struct AuthContext<S: RecordStore, C: Codec = JsonCodec> {
    auth: Auth<S, C>,
    cookies: Cookies,
}

impl<S: RecordStore, C: Codec> AuthContext<S, C> {
    /// Stores `value` under a freshly minted identity and sets the cookie.
    ///
    /// Any identity the request already carries is ignored and its record is
    /// left alive; call [`AuthContext::delete`] first to replace it.
    #[tracing::instrument(name = "setting auth record", skip_all)]
    pub async fn set<T>(&self, value: &T, ttl_override: Option<Duration>) -> Result<Id>
    where
        T: Serialize + ?Sized,
    {
        let inner = &self.auth.inner;
        let ttl = inner.config.effective_ttl(ttl_override);
        let data = inner.codec.marshal(value).map_err(|err| {
            tracing::error!(err = %err, "failed to encode auth payload");
            err
        })?;

        let id = Id::new();
        let token = id.to_string();
        inner
            .store
            .create_or_update(&token, &data, ttl)
            .await
            .map_err(|err| {
                tracing::error!(err = %err, "failed to save auth record");
                err
            })?;

        inner.binder.issue(&self.cookies, token, ttl);
        Ok(id)
    }

    /// Loads the value bound to the request's cookie.
    ///
    /// Returns [`Error::NotFound`] when there is no cookie, or its record is
    /// missing or expired. With sliding expiry the record and cookie are
    /// renewed, using `ttl_override` if positive.
    #[tracing::instrument(name = "getting auth record", skip_all)]
    pub async fn get<T>(&self, ttl_override: Option<Duration>) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let inner = &self.auth.inner;
        let token = self.id()?.to_string();

        let data = inner
            .store
            .read(&token)
            .await
            .map_err(|err| {
                tracing::error!(err = %err, "failed to read auth record");
                err
            })?
            .ok_or(Error::NotFound)?;

        let value = inner.codec.unmarshal(&data).map_err(|err| {
            tracing::error!(err = %err, "failed to decode auth payload");
            err
        })?;

        if inner.config.sliding {
            let ttl = inner.config.effective_ttl(ttl_override);
            inner
                .store
                .create_or_update(&token, &data, ttl)
                .await
                .map_err(|err| {
                    tracing::error!(err = %err, "failed to renew auth record");
                    err
                })?;
            inner.binder.issue(&self.cookies, token, ttl);
        }

        Ok(value)
    }

    /// Deletes the record bound to the request's cookie and revokes the
    /// cookie. Does nothing when the request has no cookie.
    #[tracing::instrument(name = "deleting auth record", skip_all)]
    pub async fn delete(&self) -> Result<()> {
        let inner = &self.auth.inner;
        let Some(token) = inner.binder.identity(&self.cookies) else {
            return Ok(());
        };

        let deleted = inner.store.delete(&token).await;
        inner.binder.revoke(&self.cookies);

        deleted.map_err(|err| {
            tracing::error!(err = %err, "failed to delete auth record");
            err.into()
        })
    }

    /// The identity carried by the request's cookie.
    pub fn id(&self) -> Result<Id> {
        let token = self
            .auth
            .inner
            .binder
            .identity(&self.cookies)
            .ok_or(Error::NotFound)?;

        token.parse::<Id>().map_err(|err| {
            tracing::warn!(err = %err, "possibly suspicious activity: malformed auth id");
            Error::NotFound
        })
    }

    pub fn cookies(&self) -> &Cookies {
        &self.cookies
    }
}
