//! Key/value sessions addressed by caller supplied keys.
//!
//! No cookie is involved: the key is whatever the application chooses, for
//! example a user id or a one-time token.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::codec::{Codec, JsonCodec};
use crate::config::{DEFAULT_SESSION_TTL, ExpiryConfig};
use crate::store::{Reclaimer, RecordStore};
use crate::{Error, Result};

/// Error type hooks may return.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Outcome of a lifecycle hook. Failures are logged and otherwise ignored.
pub type HookResult = std::result::Result<(), BoxError>;

type Hook = Arc<dyn Fn(&str) -> HookResult + Send + Sync>;

/// Callbacks run after successful operations, receiving the key.
#[derive(Clone, Default)]
pub struct Hooks {
    after_set: Option<Hook>,
    after_get: Option<Hook>,
    after_delete: Option<Hook>,
}

impl Hooks {
    pub fn after_set<F>(mut self, hook: F) -> Self
    where
        F: Fn(&str) -> HookResult + Send + Sync + 'static,
    {
        self.after_set = Some(Arc::new(hook));
        self
    }

    pub fn after_get<F>(mut self, hook: F) -> Self
    where
        F: Fn(&str) -> HookResult + Send + Sync + 'static,
    {
        self.after_get = Some(Arc::new(hook));
        self
    }

    pub fn after_delete<F>(mut self, hook: F) -> Self
    where
        F: Fn(&str) -> HookResult + Send + Sync + 'static,
    {
        self.after_delete = Some(Arc::new(hook));
        self
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("after_set", &self.after_set.is_some())
            .field("after_get", &self.after_get.is_some())
            .field("after_delete", &self.after_delete.is_some())
            .finish()
    }
}

fn run_hook(hook: &Option<Hook>, name: &'static str, key: &str) {
    if let Some(hook) = hook {
        if let Err(err) = hook(key) {
            tracing::warn!(err = %err, hook = name, "session hook failed");
        }
    }
}

/// Application scoped key/value session store.
#[derive(Debug)]
pub struct KeyedSessions<S: RecordStore, C: Codec = JsonCodec> {
    inner: Arc<Inner<S, C>>,
}

impl<S: RecordStore, C: Codec> Clone for KeyedSessions<S, C> {
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
    config: ExpiryConfig,
    hooks: Hooks,
    reclaimer: Reclaimer,
}

impl<S: RecordStore> KeyedSessions<S> {
    pub fn builder(store: S) -> KeyedSessionsBuilder<S> {
        KeyedSessionsBuilder {
            store,
            codec: JsonCodec,
            config: ExpiryConfig::with_default_ttl(DEFAULT_SESSION_TTL),
            hooks: Hooks::default(),
        }
    }
}

impl<S: RecordStore, C: Codec> KeyedSessions<S, C> {
    /// Stores `value` at `key`, replacing whatever was there.
    #[tracing::instrument(name = "setting keyed session", skip(self, value, ttl_override))]
    pub async fn set<T>(&self, key: &str, value: &T, ttl_override: Option<Duration>) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        let inner = &self.inner;
        let data = inner.codec.marshal(value).map_err(|err| {
            tracing::error!(err = %err, "failed to encode session payload");
            err
        })?;

        inner
            .store
            .create_or_update(key, &data, inner.config.effective_ttl(ttl_override))
            .await
            .map_err(|err| {
                tracing::error!(err = %err, "failed to save session");
                err
            })?;

        run_hook(&inner.hooks.after_set, "after_set", key);
        Ok(())
    }

    /// Loads the value at `key`.
    ///
    /// Returns [`Error::NotFound`] if the key is absent or expired. With
    /// sliding expiry the record is renewed, using `ttl_override` if positive.
    #[tracing::instrument(name = "getting keyed session", skip(self, ttl_override))]
    pub async fn get<T>(&self, key: &str, ttl_override: Option<Duration>) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let inner = &self.inner;
        let data = inner
            .store
            .read(key)
            .await
            .map_err(|err| {
                tracing::error!(err = %err, "failed to read session");
                err
            })?
            .ok_or(Error::NotFound)?;

        let value = inner.codec.unmarshal(&data).map_err(|err| {
            tracing::error!(err = %err, "failed to decode session payload");
            err
        })?;

        if inner.config.sliding {
            inner
                .store
                .create_or_update(key, &data, inner.config.effective_ttl(ttl_override))
                .await
                .map_err(|err| {
                    tracing::error!(err = %err, "failed to renew session");
                    err
                })?;
        }

        run_hook(&inner.hooks.after_get, "after_get", key);
        Ok(value)
    }

    /// Removes `key`. Removing an absent key succeeds.
    #[tracing::instrument(name = "deleting keyed session", skip(self))]
    pub async fn delete(&self, key: &str) -> Result<()> {
        self.inner.store.delete(key).await.map_err(|err| {
            tracing::error!(err = %err, "failed to delete session");
            err
        })?;

        run_hook(&self.inner.hooks.after_delete, "after_delete", key);
        Ok(())
    }

    pub fn store(&self) -> &S {
        &self.inner.store
    }

    pub fn config(&self) -> &ExpiryConfig {
        &self.inner.config
    }

    /// Stops the background reclaimer. Stored records are left in place.
    pub fn stop(&self) {
        self.inner.reclaimer.stop();
    }
}

/// Builder for [`KeyedSessions`].
#[derive(Debug)]
pub struct KeyedSessionsBuilder<S, C = JsonCodec> {
    store: S,
    codec: C,
    config: ExpiryConfig,
    hooks: Hooks,
}

impl<S: RecordStore, C: Codec> KeyedSessionsBuilder<S, C> {
    /// Replaces the payload codec. Defaults to [`JsonCodec`].
    pub fn codec<C2: Codec>(self, codec: C2) -> KeyedSessionsBuilder<S, C2> {
        KeyedSessionsBuilder {
            store: self.store,
            codec,
            config: self.config,
            hooks: self.hooks,
        }
    }

    /// Default record lifetime. Defaults to 1 hour.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.config.ttl = ttl;
        self
    }

    /// Renew records on every successful read. Off by default.
    pub fn sliding(mut self, sliding: bool) -> Self {
        self.config.sliding = sliding;
        self
    }

    /// How often expired records are swept. Defaults to 10 minutes.
    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.config.sweep_interval = interval;
        self
    }

    pub fn hooks(mut self, hooks: Hooks) -> Self {
        self.hooks = hooks;
        self
    }

    /// Builds the store and starts its reclaimer.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime.
    pub fn build(self) -> KeyedSessions<S, C> {
        let config = self.config.normalized(DEFAULT_SESSION_TTL);
        let reclaimer = Reclaimer::spawn(self.store.clone(), config.sweep_interval);

        KeyedSessions {
            inner: Arc::new(Inner {
                store: self.store,
                codec: self.codec,
                config,
                hooks: self.hooks,
                reclaimer,
            }),
        }
    }
}
