//! Store-sharing middleware for tower applications.
//!
//! This module provides [`StoreLayer`], which makes an application scoped
//! store ([`Auth`](crate::auth::Auth), [`Sessions`](crate::session::Sessions)
//! or [`KeyedSessions`](crate::keyed::KeyedSessions)) reachable from every
//! request.

use std::task::{Context, Poll};

use http::Request;
use tower::{Layer, Service};

/// A Tower Middleware inserting a clone of the store into each request.
#[derive(Clone, Debug)]
pub struct StoreService<S, T> {
    inner: S,
    store: T,
}

impl<ReqBody, S, T> Service<Request<ReqBody>> for StoreService<S, T>
where
    S: Service<Request<ReqBody>>,
    T: Clone + Send + Sync + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    #[inline]
    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<ReqBody>) -> Self::Future {
        req.extensions_mut().insert(self.store.clone());
        self.inner.call(req)
    }
}

/// Layer to apply [`StoreService`] middleware.
///
/// Cookie-bound stores read and write cookies through
/// [`tower_cookies::Cookies`], so the `CookieManagerLayer` must wrap this
/// layer.
///
/// # Example
///
/// ```rust,no_run
/// use roost::StoreLayer;
/// use roost::auth::Auth;
/// use roost::store::MemoryStore;
/// use tower_cookies::CookieManagerLayer;
///
/// # #[tokio::main]
/// # async fn main() {
/// let auth = Auth::builder(MemoryStore::new()).build();
///
/// let app: axum::Router = axum::Router::new()
///     .layer(StoreLayer::new(auth))
///     .layer(CookieManagerLayer::new());
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct StoreLayer<T> {
    store: T,
}

impl<T> StoreLayer<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(store: T) -> Self {
        Self { store }
    }
}

impl<S, T> Layer<S> for StoreLayer<T>
where
    T: Clone + Send + Sync + 'static,
{
    type Service = StoreService<S, T>;

    fn layer(&self, inner: S) -> Self::Service {
        StoreService {
            inner,
            store: self.store.clone(),
        }
    }
}
