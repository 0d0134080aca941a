mod common;

#[cfg(test)]
mod tests {
    use super::*;

    use common::*;
    use roost::auth::Auth;
    use roost::codec::{Codec, JsonCodec};
    use roost::config::MAX_SWEEP_INTERVAL;
    use roost::keyed::{Hooks, KeyedSessions};
    use roost::session::Sessions;
    use roost::store::{MemoryStore, RecordStore};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tower_cookies::Cookies;

    #[tokio::test]
    async fn test_auth_roundtrip_with_struct_payload() {
        let auth = Auth::builder(MemoryStore::new())
            .cookie_options(build_cookie_options())
            .build();
        let cookies = Cookies::default();
        let data = create_test_session();

        let id = auth.with_cookies(cookies.clone()).set(&data, None).await.unwrap();

        let ctx = auth.with_cookies(next_request(&cookies, "test_sess"));
        assert_eq!(ctx.id().unwrap(), id);
        let loaded: TestSession = ctx.get(None).await.unwrap();
        assert_eq!(loaded, data);
    }

    #[tokio::test]
    async fn test_expired_records_stay_gone() {
        let store = MemoryStore::new();
        let auth = Auth::builder(store.clone())
            .ttl(Duration::from_millis(50))
            .cookie_options(build_cookie_options())
            .build();
        let cookies = Cookies::default();
        auth.with_cookies(cookies.clone())
            .set("short lived", None)
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(60)).await;

        for _ in 0..3 {
            let ctx = auth.with_cookies(next_request(&cookies, "test_sess"));
            assert!(ctx.get::<String>(None).await.unwrap_err().is_not_found());
        }
        // The first miss removed the record without waiting for a sweep.
        assert!(store.is_empty());

        // A new write makes the identity readable again.
        let ctx = auth.with_cookies(cookies.clone());
        ctx.set("fresh", None).await.unwrap();
        let ctx = auth.with_cookies(next_request(&cookies, "test_sess"));
        assert_eq!(ctx.get::<String>(None).await.unwrap(), "fresh");
    }

    #[tokio::test]
    async fn test_sliding_gap_longer_than_ttl_expires() {
        let auth = Auth::builder(MemoryStore::new())
            .ttl(Duration::from_millis(80))
            .sliding(true)
            .cookie_options(build_cookie_options())
            .build();
        let cookies = Cookies::default();
        auth.with_cookies(cookies.clone()).set(&7u8, None).await.unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        let ctx = auth.with_cookies(next_request(&cookies, "test_sess"));
        assert_eq!(ctx.get::<u8>(None).await.unwrap(), 7);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(ctx.get::<u8>(None).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_delete_is_idempotent_across_facades() {
        let store = MemoryStore::new();

        let auth = Auth::builder(store.clone()).build();
        let ctx = auth.with_cookies(Cookies::default());
        ctx.set("x", None).await.unwrap();
        ctx.delete().await.unwrap();
        ctx.delete().await.unwrap();
        assert!(ctx.get::<String>(None).await.unwrap_err().is_not_found());

        let keyed = KeyedSessions::builder(store.clone()).build();
        keyed.set("k", "v", None).await.unwrap();
        keyed.delete("k").await.unwrap();
        keyed.delete("k").await.unwrap();
        assert!(keyed.get::<String>("k", None).await.unwrap_err().is_not_found());

        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_delete_revokes_cookie() {
        let auth = Auth::builder(MemoryStore::new())
            .cookie_options(build_cookie_options())
            .build();
        let cookies = Cookies::default();
        auth.with_cookies(cookies.clone()).set("x", None).await.unwrap();

        let request = next_request(&cookies, "test_sess");
        auth.with_cookies(request.clone()).delete().await.unwrap();

        let revoked = request.get("test_sess").unwrap();
        assert_eq!(revoked.value(), "");
        assert!(revoked.max_age().unwrap().is_negative());
        assert_eq!(revoked.expires_datetime(), Some(time::OffsetDateTime::UNIX_EPOCH));
    }

    #[tokio::test]
    async fn test_facades_share_one_store() {
        let store = MemoryStore::new();
        let auth = Auth::builder(store.clone()).build();
        let keyed = KeyedSessions::builder(store.clone()).build();

        let id = auth
            .with_cookies(Cookies::default())
            .set("from auth", None)
            .await
            .unwrap();

        // Auth payloads are plain JSON, so the keyed facade can read them back.
        let value: String = keyed.get(&id.to_string(), None).await.unwrap();
        assert_eq!(value, "from auth");
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_keyed_scenario() {
        let sessions = KeyedSessions::builder(MemoryStore::new())
            .ttl(Duration::from_millis(100))
            .build();

        sessions.set("testkey", "hello session!", None).await.unwrap();
        assert_eq!(
            sessions.get::<String>("testkey", None).await.unwrap(),
            "hello session!"
        );

        tokio::time::sleep(Duration::from_millis(101)).await;
        assert!(
            sessions
                .get::<String>("testkey", None)
                .await
                .unwrap_err()
                .is_not_found()
        );
    }

    #[tokio::test]
    async fn test_keyed_hooks_count_successes() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let hooks = Hooks::default().after_get(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        let sessions = KeyedSessions::builder(MemoryStore::new())
            .hooks(hooks)
            .build();
        sessions.set("a", &create_test_session(), None).await.unwrap();

        let _: TestSession = sessions.get("a", None).await.unwrap();
        let _: TestSession = sessions.get("a", None).await.unwrap();
        let _ = sessions.get::<TestSession>("missing", None).await;
        // Decode failures are not successes either.
        let _ = sessions.get::<u64>("a", None).await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_session_buffering() {
        let sessions = Sessions::builder(MemoryStore::new())
            .cookie_options(build_cookie_options())
            .build();
        let cookies = Cookies::default();
        let session = sessions.load(cookies.clone()).await.unwrap();

        session.set("user", &create_test_session().user).unwrap();
        assert_eq!(
            session.get::<TestUser>("user").unwrap(),
            Some(create_test_session().user)
        );

        let concurrent = sessions
            .load(next_request(&cookies, "test_sess"))
            .await
            .unwrap();
        assert_eq!(concurrent.get::<TestUser>("user").unwrap(), None);

        session.save().await.unwrap();
        let after = sessions
            .load(next_request(&cookies, "test_sess"))
            .await
            .unwrap();
        assert_eq!(
            after.get::<TestUser>("user").unwrap(),
            Some(create_test_session().user)
        );
    }

    #[tokio::test]
    async fn test_session_with_json_codec() {
        let store = MemoryStore::new();
        let sessions = Sessions::builder(store.clone())
            .codec(JsonCodec)
            .cookie_options(build_cookie_options())
            .build();

        let session = sessions.load(Cookies::default()).await.unwrap();
        session.set("theme", "dark").unwrap();
        session.save().await.unwrap();

        let raw = store.read(&session.id().to_string()).await.unwrap().unwrap();
        let fields: std::collections::HashMap<String, Vec<u8>> =
            JsonCodec.unmarshal(&raw).unwrap();
        let theme: String = JsonCodec.unmarshal(&fields["theme"]).unwrap();
        assert_eq!(theme, "dark");
    }

    #[tokio::test]
    async fn test_huge_sweep_interval_is_clamped() {
        let auth = Auth::builder(MemoryStore::new())
            .sweep_interval(Duration::MAX)
            .build();
        assert_eq!(auth.config().sweep_interval, MAX_SWEEP_INTERVAL);

        let ctx = auth.with_cookies(Cookies::default());
        ctx.set("still works", None).await.unwrap();
        assert_eq!(ctx.get::<String>(None).await.unwrap(), "still works");
    }

    #[tokio::test]
    async fn test_stop_keeps_records() {
        let store = MemoryStore::new();
        let sessions = KeyedSessions::builder(store.clone())
            .ttl(Duration::from_millis(20))
            .sweep_interval(Duration::from_millis(10))
            .build();

        sessions.stop();
        sessions.stop();
        sessions.set("k", "v", None).await.unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        // Nothing swept it, yet reads treat it as gone.
        assert_eq!(store.len(), 1);
        assert!(sessions.get::<String>("k", None).await.unwrap_err().is_not_found());
    }
}
