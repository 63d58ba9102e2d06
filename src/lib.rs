//! # nidus
//!
//! The per-request core of an embedded HTTP server: one context object per
//! accepted request, unifying the request and response facades, routing
//! result, session handle, identity, a shared item map, WebSocket-upgrade
//! capability, and a teardown registry with hard ordering and
//! fault-containment guarantees.
//!
//! ## The contract
//!
//! The transport parses bytes. The router matches paths. The session store
//! persists state. nidus does none of that — by design. It owns the one
//! thing those collaborators all need and none of them should implement:
//! the lifecycle of a request. Every external concern enters through a
//! trait ([`Connection`], [`HttpRequest`], [`HttpResponse`],
//! [`SessionProxy`], [`MimeTypeProvider`], [`WebSocket`]), so any transport
//! backend plugs in without touching the core.
//!
//! What nidus does own:
//!
//! - **Deterministic teardown** — close callbacks run exactly once each, in
//!   LIFO order, and one failure never suppresses the rest
//! - **Upgrade bridging** — synchronous request handling meets the
//!   asynchronous WebSocket handshake, with an explicit cancellation token
//!   as the sole cancellation authority
//! - **Race-safe shared state** — the lazily-created item map initializes
//!   exactly once under concurrent first access
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use nidus::{HttpContext, Principal, RouteMatch};
//!
//! // The server loop accepts a connection and builds the context…
//! let mut ctx = HttpContext::new(Arc::new(connection));
//!
//! // …pipeline stages fill in their piece…
//! ctx.set_route(RouteMatch::new("/42", params));
//! ctx.set_user(Principal::new("alice"));
//! ctx.items().insert("audit", audit_record);
//! ctx.on_close(|ctx| {
//!     tracing::info!(id = %ctx.id(), "request finished");
//!     Ok(())
//! })?;
//! ctx.set_handled();
//!
//! // …and the owning task tears it down. The response is finalized first,
//! // then callbacks run newest-first, each fenced against the others.
//! ctx.close();
//! ```

mod auth;
mod connection;
mod context;
mod error;
mod items;
mod mime;
mod request;
mod response;
mod route;
mod session;
mod ws;

pub use auth::Principal;
pub use connection::{BoxFuture, Connection, UpgradeOptions};
pub use context::{CloseCallback, HttpContext};
pub use error::{BoxError, Error};
pub use items::ItemMap;
pub use mime::{MimeTypeProvider, MimeTypeProviderStack};
pub use request::HttpRequest;
pub use response::HttpResponse;
pub use route::RouteMatch;
pub use session::SessionProxy;
pub use ws::{SUPPORTED_VERSION, WebSocket, WebSocketContext};

/// Re-exported so implementors and handlers share the exact token type
/// [`HttpContext::accept_websocket`] expects.
pub use tokio_util::sync::CancellationToken;
