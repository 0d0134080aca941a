use axum_core::extract::FromRequestParts;
use http::{StatusCode, request::Parts};
use tower_cookies::Cookies;

use crate::auth::{Auth, AuthContext};
use crate::codec::Codec;
use crate::keyed::KeyedSessions;
use crate::session::{Session, Sessions};
use crate::store::RecordStore;

type Rejection = (StatusCode, &'static str);

fn extension<T>(parts: &Parts, what: &'static str) -> Result<T, Rejection>
where
    T: Clone + Send + Sync + 'static,
{
    parts.extensions.get::<T>().cloned().ok_or_else(|| {
        tracing::error!("{what} not found in the request extensions");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "store layer not found in the request",
        )
    })
}

fn cookies(parts: &Parts) -> Result<Cookies, Rejection> {
    parts.extensions.get::<Cookies>().cloned().ok_or_else(|| {
        tracing::error!("cookies not found in the request extensions");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "cookies not found in the request",
        )
    })
}

/// Axum Extractor for [`AuthContext`].
impl<St, S, C> FromRequestParts<St> for AuthContext<S, C>
where
    St: Sync + Send,
    S: RecordStore,
    C: Codec,
{
    type Rejection = Rejection;

    async fn from_request_parts(parts: &mut Parts, _state: &St) -> Result<Self, Self::Rejection> {
        let auth = extension::<Auth<S, C>>(parts, "auth store")?;
        Ok(auth.with_cookies(cookies(parts)?))
    }
}

/// Axum Extractor for [`Session`]. Loads the session before the handler runs.
impl<St, S, C> FromRequestParts<St> for Session<S, C>
where
    St: Sync + Send,
    S: RecordStore,
    C: Codec,
{
    type Rejection = Rejection;

    async fn from_request_parts(parts: &mut Parts, _state: &St) -> Result<Self, Self::Rejection> {
        let sessions = extension::<Sessions<S, C>>(parts, "session store")?;
        let cookies = cookies(parts)?;

        sessions.load(cookies).await.map_err(|err| {
            tracing::error!(err = %err, "failed to load session");
            (StatusCode::INTERNAL_SERVER_ERROR, "failed to load session")
        })
    }
}

/// Axum Extractor for [`KeyedSessions`].
impl<St, S, C> FromRequestParts<St> for KeyedSessions<S, C>
where
    St: Sync + Send,
    S: RecordStore,
    C: Codec,
{
    type Rejection = Rejection;

    async fn from_request_parts(parts: &mut Parts, _state: &St) -> Result<Self, Self::Rejection> {
        extension::<KeyedSessions<S, C>>(parts, "keyed session store")
    }
}
