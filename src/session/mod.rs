//! Cookie-bound sessions holding many named values.
//!
//! A [`Session`] buffers every change in memory. Nothing reaches the store
//! until [`Session::save`] is called, so several mutations within one request
//! collapse into a single write.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde::Serialize;
use serde::de::DeserializeOwned;
use time::OffsetDateTime;
use tower_cookies::Cookies;

use crate::codec::{BinaryCodec, Codec};
use crate::config::{DEFAULT_SESSION_TTL, ExpiryConfig};
use crate::store::{Reclaimer, RecordStore, expires_after};
use crate::{CookieBinder, CookieOptions, Id, Result};

/// Application scoped store of cookie-bound sessions.
#[derive(Debug)]
pub struct Sessions<S: RecordStore, C: Codec = BinaryCodec> {
    inner: Arc<StoreInner<S, C>>,
}

impl<S: RecordStore, C: Codec> Clone for Sessions<S, C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[derive(Debug)]
struct StoreInner<S, C> {
    store: S,
    codec: C,
    binder: CookieBinder,
    config: ExpiryConfig,
    reclaimer: Reclaimer,
}

impl<S: RecordStore> Sessions<S> {
    pub fn builder(store: S) -> SessionsBuilder<S> {
        SessionsBuilder {
            store,
            codec: BinaryCodec::default(),
            config: ExpiryConfig::with_default_ttl(DEFAULT_SESSION_TTL),
            cookie_options: CookieOptions::default(),
        }
    }
}

impl<S: RecordStore, C: Codec> Sessions<S, C> {
    /// Resolves the session of the request carrying `cookies`.
    ///
    /// Without a usable cookie, or when its record is gone or expired, a new
    /// empty session is started and its cookie issued right away. The new
    /// session is not stored until it is saved with changes.
    #[tracing::instrument(name = "loading session", skip_all)]
    pub async fn load(&self, cookies: Cookies) -> Result<Session<S, C>> {
        let inner = &self.inner;

        let id = inner.binder.identity(&cookies).and_then(|token| {
            token
                .parse::<Id>()
                .map_err(|err| {
                    tracing::warn!(
                        err = %err,
                        "possibly suspicious activity: malformed session id"
                    )
                })
                .ok()
        });

        if let Some(id) = id {
            let record = inner
                .store
                .read_record(&id.to_string())
                .await
                .map_err(|err| {
                    tracing::error!(err = %err, "failed to load session");
                    err
                })?;

            if let Some(record) = record {
                let data = inner.codec.unmarshal(&record.data).map_err(|err| {
                    tracing::error!(err = %err, "failed to decode session");
                    err
                })?;

                return Ok(Session::new(
                    id,
                    self.clone(),
                    cookies,
                    State::new(data, record.expires_at),
                ));
            }
        }

        let id = Id::new();
        let ttl = inner.config.ttl;
        inner.binder.issue(&cookies, id.to_string(), ttl);
        tracing::debug!("started a new session");

        let expires_at = expires_after(OffsetDateTime::now_utc(), ttl);
        Ok(Session::new(
            id,
            self.clone(),
            cookies,
            State::new(HashMap::new(), expires_at),
        ))
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

    /// Stops the background reclaimer. Stored sessions are left in place.
    pub fn stop(&self) {
        self.inner.reclaimer.stop();
    }
}

/// Builder for [`Sessions`].
#[derive(Debug)]
pub struct SessionsBuilder<S, C = BinaryCodec> {
    store: S,
    codec: C,
    config: ExpiryConfig,
    cookie_options: CookieOptions,
}

impl<S: RecordStore, C: Codec> SessionsBuilder<S, C> {
    /// Replaces the codec used for field values and the stored field map.
    /// Defaults to [`BinaryCodec`].
    pub fn codec<C2: Codec>(self, codec: C2) -> SessionsBuilder<S, C2> {
        SessionsBuilder {
            store: self.store,
            codec,
            config: self.config,
            cookie_options: self.cookie_options,
        }
    }

    /// Default session lifetime. Defaults to 1 hour.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.config.ttl = ttl;
        self
    }

    /// How often expired sessions are swept. Defaults to 10 minutes.
    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.config.sweep_interval = interval;
        self
    }

    /// Defaults to a cookie named `session` with [`CookieOptions::default`] flags.
    pub fn cookie_options(mut self, cookie_options: CookieOptions) -> Self {
        self.cookie_options = cookie_options;
        self
    }

    /// Builds the store and starts its reclaimer.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime.
    pub fn build(self) -> Sessions<S, C> {
        let config = self.config.normalized(DEFAULT_SESSION_TTL);
        let reclaimer = Reclaimer::spawn(self.store.clone(), config.sweep_interval);

        Sessions {
            inner: Arc::new(StoreInner {
                store: self.store,
                codec: self.codec,
                binder: CookieBinder::new(self.cookie_options),
                config,
                reclaimer,
            }),
        }
    }
}

#[derive(Debug)]
struct State {
    data: HashMap<String, Vec<u8>>,
    expires_at: OffsetDateTime,
    // set by `extend`, otherwise the store default applies on save
    ttl: Option<Duration>,
    // set when a field is changed or the ttl is extended
    changed: bool,
}

impl State {
    fn new(data: HashMap<String, Vec<u8>>, expires_at: OffsetDateTime) -> Self {
        Self {
            data,
            expires_at,
            ttl: None,
            changed: false,
        }
    }
}

/// A request scoped session.
///
/// Clones share the same buffered state.
#[derive(Debug)]
pub struct Session<S: RecordStore, C: Codec = BinaryCodec> {
    inner: Arc<Inner<S, C>>,
}

impl<S: RecordStore, C: Codec> Clone for Session<S, C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[derive(Debug)]
struct Inner<S: RecordStore, C: Codec> {
    id: Id,
    sessions: Sessions<S, C>,
    cookies: Cookies,
    state: RwLock<State>,
}

impl<S: RecordStore, C: Codec> Session<S, C> {
    fn new(id: Id, sessions: Sessions<S, C>, cookies: Cookies, state: State) -> Self {
        Self {
            inner: Arc::new(Inner {
                id,
                sessions,
                cookies,
                state: RwLock::new(state),
            }),
        }
    }

    pub fn id(&self) -> Id {
        self.inner.id
    }

    /// Decodes the value of `field`, or `None` if the session has no such field.
    pub fn get<T>(&self, field: &str) -> Result<Option<T>>
    where
        T: DeserializeOwned,
    {
        let state = self.inner.state.read();
        match state.data.get(field) {
            Some(bytes) => Ok(Some(self.codec().unmarshal(bytes)?)),
            None => Ok(None),
        }
    }

    /// Buffers `value` as the new content of `field`.
    pub fn set<T>(&self, field: &str, value: &T) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        let bytes = self.codec().marshal(value).map_err(|err| {
            tracing::error!(err = %err, "failed to encode session field");
            err
        })?;

        let mut state = self.inner.state.write();
        state.data.insert(field.to_owned(), bytes);
        state.changed = true;
        Ok(())
    }

    /// Buffers the removal of `field`.
    pub fn delete(&self, field: &str) {
        let mut state = self.inner.state.write();
        state.data.remove(field);
        state.changed = true;
    }

    /// Buffers the removal of every field.
    pub fn clear(&self) {
        let mut state = self.inner.state.write();
        state.data.clear();
        state.changed = true;
    }

    /// When the session expires, as of the last load or save.
    pub fn expiry(&self) -> OffsetDateTime {
        self.inner.state.read().expires_at
    }

    /// Sets the lifetime applied on the next save. A zero `ttl` is ignored.
    pub fn extend(&self, ttl: Duration) {
        if ttl.is_zero() {
            return;
        }

        let mut state = self.inner.state.write();
        state.ttl = Some(ttl);
        state.changed = true;
    }

    /// Whether there are buffered changes not yet saved.
    pub fn is_changed(&self) -> bool {
        self.inner.state.read().changed
    }

    /// Writes the buffered fields back to the store and refreshes the cookie.
    ///
    /// Does nothing when nothing changed since the last save.
    #[tracing::instrument(name = "saving session", skip(self), fields(id = %self.inner.id))]
    pub async fn save(&self) -> Result<()> {
        let sessions = &self.inner.sessions.inner;

        let (data, ttl) = {
            let mut state = self.inner.state.write();
            if !state.changed {
                return Ok(());
            }

            let ttl = state.ttl.unwrap_or(sessions.config.ttl);
            let data = sessions.codec.marshal(&state.data).map_err(|err| {
                tracing::error!(err = %err, "failed to encode session");
                err
            })?;

            state.changed = false;
            (data, ttl)
        };

        let expires_at = expires_after(OffsetDateTime::now_utc(), ttl);
        let token = self.inner.id.to_string();
        if let Err(err) = sessions.store.create_or_update(&token, &data, ttl).await {
            tracing::error!(err = %err, "failed to save session");
            self.inner.state.write().changed = true;
            return Err(err.into());
        }

        self.inner.state.write().expires_at = expires_at;
        sessions.binder.issue(&self.inner.cookies, token, ttl);
        Ok(())
    }

    /// Deletes the stored session, revokes its cookie and empties the buffer.
    #[tracing::instrument(name = "destroying session", skip(self), fields(id = %self.inner.id))]
    pub async fn destroy(&self) -> Result<()> {
        let sessions = &self.inner.sessions.inner;

        let deleted = sessions.store.delete(&self.inner.id.to_string()).await;
        sessions.binder.revoke(&self.inner.cookies);
        {
            let mut state = self.inner.state.write();
            state.data.clear();
            state.ttl = None;
            state.changed = false;
        }

        deleted.map_err(|err| {
            tracing::error!(err = %err, "failed to delete session");
            err.into()
        })
    }

    pub fn cookies(&self) -> &Cookies {
        &self.inner.cookies
    }

    fn codec(&self) -> &C {
        &self.inner.sessions.inner.codec
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde::Deserialize;

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    struct Cart {
        items: Vec<String>,
    }

    fn sessions(ttl: Duration) -> Sessions<MemoryStore> {
        Sessions::builder(MemoryStore::new())
            .ttl(ttl)
            .cookie_options(CookieOptions::build().name("test"))
            .sweep_interval(Duration::from_millis(100))
            .build()
    }

    fn next_request(previous: &Cookies) -> Cookies {
        let cookies = Cookies::default();
        if let Some(cookie) = previous.get("test") {
            cookies.add(cookie.into_owned());
        }
        cookies
    }

    #[tokio::test]
    async fn test_new_session_issues_cookie_but_is_not_stored() {
        let sessions = sessions(Duration::from_secs(60));
        let cookies = Cookies::default();

        let session = sessions.load(cookies.clone()).await.unwrap();
        let cookie = cookies.get("test").expect("cookie should be issued");
        assert_eq!(cookie.value(), session.id().to_string());
        assert!(sessions.store().is_empty());

        // Saving without changes writes nothing.
        session.save().await.unwrap();
        assert!(sessions.store().is_empty());
    }

    #[tokio::test]
    async fn test_set_save_and_reload() {
        let sessions = sessions(Duration::from_secs(60));
        let cookies = Cookies::default();
        let cart = Cart {
            items: vec!["apple".to_string()],
        };

        let session = sessions.load(cookies.clone()).await.unwrap();
        session.set("cart", &cart).unwrap();
        session.set("visits", &3u32).unwrap();
        session.save().await.unwrap();
        assert_eq!(sessions.store().len(), 1);
        assert!(!session.is_changed());

        let reloaded = sessions.load(next_request(&cookies)).await.unwrap();
        assert_eq!(reloaded.id(), session.id());
        assert_eq!(reloaded.get::<Cart>("cart").unwrap(), Some(cart));
        assert_eq!(reloaded.get::<u32>("visits").unwrap(), Some(3));
        assert_eq!(reloaded.get::<u32>("missing").unwrap(), None);
    }

    #[tokio::test]
    async fn test_changes_are_buffered_until_save() {
        let sessions = sessions(Duration::from_secs(60));
        let cookies = Cookies::default();

        let session = sessions.load(cookies.clone()).await.unwrap();
        session.set("theme", "dark").unwrap();
        session.save().await.unwrap();

        session.set("theme", "light").unwrap();
        assert_eq!(
            session.get::<String>("theme").unwrap().as_deref(),
            Some("light")
        );

        let other = sessions.load(next_request(&cookies)).await.unwrap();
        assert_eq!(other.id(), session.id());
        assert_eq!(
            other.get::<String>("theme").unwrap().as_deref(),
            Some("dark")
        );

        session.save().await.unwrap();
        let after = sessions.load(next_request(&cookies)).await.unwrap();
        assert_eq!(
            after.get::<String>("theme").unwrap().as_deref(),
            Some("light")
        );
    }

    #[tokio::test]
    async fn test_delete_and_clear() {
        let sessions = sessions(Duration::from_secs(60));
        let cookies = Cookies::default();

        let session = sessions.load(cookies.clone()).await.unwrap();
        session.set("a", &1).unwrap();
        session.set("b", &2).unwrap();
        session.save().await.unwrap();

        session.delete("a");
        assert!(session.is_changed());
        session.save().await.unwrap();

        let reloaded = sessions.load(next_request(&cookies)).await.unwrap();
        assert_eq!(reloaded.get::<i32>("a").unwrap(), None);
        assert_eq!(reloaded.get::<i32>("b").unwrap(), Some(2));

        reloaded.clear();
        reloaded.save().await.unwrap();
        let cleared = sessions.load(next_request(&cookies)).await.unwrap();
        assert_eq!(cleared.get::<i32>("b").unwrap(), None);
    }

    #[tokio::test]
    async fn test_extend_and_expire() {
        let sessions = sessions(Duration::from_millis(90));
        let cookies = Cookies::default();

        let session = sessions.load(cookies.clone()).await.unwrap();
        session.set("key", &42).unwrap();
        session.extend(Duration::from_millis(180));
        session.save().await.unwrap();

        tokio::time::sleep(Duration::from_millis(110)).await;

        let session = sessions.load(next_request(&cookies)).await.unwrap();
        assert_eq!(session.get::<i32>("key").unwrap(), Some(42));

        tokio::time::sleep(Duration::from_millis(90)).await;

        let session = sessions.load(next_request(&cookies)).await.unwrap();
        assert_eq!(session.get::<i32>("key").unwrap(), None);
    }

    #[tokio::test]
    async fn test_extend_with_zero_is_ignored() {
        let sessions = sessions(Duration::from_secs(60));
        let session = sessions.load(Cookies::default()).await.unwrap();

        session.extend(Duration::ZERO);
        assert!(!session.is_changed());
    }

    #[tokio::test]
    async fn test_save_refreshes_expiry() {
        let sessions = sessions(Duration::from_secs(60));
        let session = sessions.load(Cookies::default()).await.unwrap();
        let before = session.expiry();

        session.extend(Duration::from_secs(3600));
        session.save().await.unwrap();
        assert!(session.expiry() > before);
    }

    /// Accepts reads but rejects every write.
    #[derive(Clone, Debug, Default)]
    struct ReadOnlyStore(MemoryStore);

    impl RecordStore for ReadOnlyStore {
        async fn create_or_update(
            &self,
            _id: &str,
            _data: &[u8],
            _ttl: Duration,
        ) -> std::result::Result<(), crate::store::Error> {
            Err(crate::store::Error::Backend("read only".to_string()))
        }

        async fn load(
            &self,
            id: &str,
        ) -> std::result::Result<Option<crate::store::Record>, crate::store::Error> {
            self.0.load(id).await
        }

        async fn delete(&self, id: &str) -> std::result::Result<(), crate::store::Error> {
            self.0.delete(id).await
        }

        async fn delete_if_expired(
            &self,
            id: &str,
            now: OffsetDateTime,
        ) -> std::result::Result<bool, crate::store::Error> {
            self.0.delete_if_expired(id, now).await
        }

        async fn sweep(
            &self,
            now: OffsetDateTime,
        ) -> std::result::Result<u64, crate::store::Error> {
            self.0.sweep(now).await
        }
    }

    #[tokio::test]
    async fn test_failed_save_keeps_expiry_and_changes() {
        let sessions = Sessions::builder(ReadOnlyStore::default())
            .ttl(Duration::from_secs(60))
            .build();
        let session = sessions.load(Cookies::default()).await.unwrap();
        let before = session.expiry();

        session.set("k", "v").unwrap();
        session.extend(Duration::from_secs(3600));
        let err = session.save().await.unwrap_err();

        assert!(matches!(err, crate::Error::Store(crate::store::Error::Backend(_))));
        assert_eq!(session.expiry(), before);
        assert!(session.is_changed());
        assert_eq!(session.get::<String>("k").unwrap().as_deref(), Some("v"));
    }

    #[tokio::test]
    async fn test_destroy() {
        let sessions = sessions(Duration::from_secs(60));
        let cookies = Cookies::default();

        let session = sessions.load(cookies.clone()).await.unwrap();
        session.set("k", "v").unwrap();
        session.save().await.unwrap();

        session.destroy().await.unwrap();
        assert!(sessions.store().is_empty());
        let revoked = cookies.get("test").unwrap();
        assert!(revoked.max_age().unwrap().is_negative());

        let fresh = sessions.load(next_request(&cookies)).await.unwrap();
        assert_ne!(fresh.id(), session.id());
    }

    #[tokio::test]
    async fn test_malformed_cookie_starts_new_session() {
        let sessions = sessions(Duration::from_secs(60));
        let cookies = Cookies::default();
        cookies.add(cookie::Cookie::new("test", "not-an-id"));

        let session = sessions.load(cookies.clone()).await.unwrap();
        assert_eq!(
            cookies.get("test").unwrap().value(),
            session.id().to_string()
        );
    }
}
