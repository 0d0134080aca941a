//! # Roost: expiring records and sessions for Tower applications
//!
//! `roost` keeps short-lived key/value records behind a small set of
//! facades. Every record carries an expiry; expired records are invisible to
//! readers straight away and are reclaimed in the background.
//!
//! - [`auth::Auth`] binds one opaque value to a server-generated identity
//!   carried in a cookie.
//! - [`keyed::KeyedSessions`] stores values under keys chosen by the caller,
//!   with optional lifecycle hooks.
//! - [`session::Sessions`] binds a map of named fields to a cookie and buffers
//!   changes until [`session::Session::save`].
//!
//! # Quick Start
//!
//! Here's a basic example with [Axum](https://docs.rs/axum/latest/axum/) and
//! the [`MemoryStore`](store::MemoryStore). This requires the `axum` feature
//! (enabled by default).
//!
//! ```rust,no_run
//! use axum::{Router, routing::get};
//! use roost::StoreLayer;
//! use roost::session::{Session, Sessions};
//! use roost::store::MemoryStore;
//! use tower_cookies::CookieManagerLayer;
//!
//! #[tokio::main]
//! async fn main() {
//!     let sessions = Sessions::builder(MemoryStore::new()).build();
//!
//!     let app = Router::new()
//!         .route("/", get(handler))
//!         .layer(StoreLayer::new(sessions))
//!         .layer(CookieManagerLayer::new()); // CookieManagerLayer must be after
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await.unwrap();
//!     axum::serve(listener, app).await.unwrap();
//! }
//!
//! async fn handler(session: Session<MemoryStore>) -> String {
//!     let count: u32 = session.get("count").unwrap().unwrap_or(0) + 1;
//!     session.set("count", &count).unwrap();
//!     session.save().await.unwrap();
//!     format!("You've visited this page {count} times")
//! }
//! ```
//!
//! # Authentication records
//!
//! ```rust,no_run
//! use roost::auth::AuthContext;
//! use roost::store::MemoryStore;
//!
//! #[derive(serde::Serialize, serde::Deserialize)]
//! struct User { id: i32 }
//!
//! async fn login(auth: AuthContext<MemoryStore>) {
//!     // Mints a new identity and sets the cookie.
//!     let id = auth.set(&User { id: 1 }, None).await.unwrap();
//! }
//!
//! async fn me(auth: AuthContext<MemoryStore>) -> Option<i32> {
//!     auth.get::<User>(None).await.ok().map(|user| user.id)
//! }
//!
//! async fn logout(auth: AuthContext<MemoryStore>) {
//!     auth.delete().await.unwrap();
//! }
//! ```
//!
//! # Stores
//!
//! ## Memory
//! A sharded concurrent map. Records live as long as the process.
//!
//! ## SQLite
//! A single table in a SQLite database. Requires the `sqlite-store` feature.
//!
//! ```rust,no_run
//! use roost::store::sqlite::SqliteStoreBuilder;
//! use sqlx::SqlitePool;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let pool = SqlitePool::connect("sqlite://records.db").await.unwrap();
//! let store = SqliteStoreBuilder::new(pool)
//!     // .table_name("my_records")
//!     .build()
//!     .await
//!     .unwrap();
//! # }
//! ```
//!
//! ## Serialization
//! Single-value facades default to JSON. Multi-field sessions default to a
//! binary codec:
//!
//! - [`bincode`](https://crates.io/crates/bincode) (default)
//! - [`rmp-serde`](https://crates.io/crates/rmp-serde) (MessagePack)
//!
//! Any facade accepts another [`codec::Codec`] through its builder.
//!
//! # Important Notes
//!
//! ## Middleware Ordering
//! The `StoreLayer` must be applied **before** the `CookieManagerLayer`.
//!
//! ## Best Practices
//!
//! - Enable HTTPS in production and keep `secure: true` in cookie options.
//! - Use appropriate `SameSite` cookie settings (e.g., `Strict` or `Lax`).
//! - Delete the auth record on logout; a new login does not revoke the old one.

pub use cookie;

#[cfg(feature = "axum")]
mod extract;

#[cfg(feature = "sqlite-store")]
pub use sqlx;

pub mod auth;
pub mod codec;
pub mod config;

mod cookie_options;
pub use cookie_options::*;

mod error;
pub use error::*;

mod id;
pub use id::Id;

pub mod keyed;

mod service;
pub use service::*;

pub mod session;

pub mod store;

pub use tower_cookies;
