//! The per-request HTTP context.
//!
//! One [`HttpContext`] exists per accepted request. Pipeline stages pass it
//! along by `&mut` — the borrow checker enforces the one-mutator-at-a-time
//! discipline the design relies on — and fill in their piece: the router
//! writes the route match, the session subsystem attaches its proxy, the
//! auth stage sets the identity, the handler marks the request handled and
//! may register teardown.
//!
//! # Teardown
//!
//! Teardown is where most request frameworks leak. The context gives three
//! hard guarantees:
//!
//! 1. The response is finalized first, unconditionally — even with zero
//!    callbacks registered.
//! 2. Callbacks run exactly once each, in reverse registration order (last
//!    in, first out).
//! 3. A failing callback is logged under the context id and the rest still
//!    run. No callback error ever escapes [`close`](HttpContext::close).
//!
//! `close` is idempotent: the original design re-ran teardown on a second
//! invocation, which re-flushed the response and re-fired every callback.
//! Here the second call is a no-op, so "runs exactly once" holds even for
//! sloppy callers.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{debug, error};
use uuid::Uuid;

use crate::auth::Principal;
use crate::connection::{Connection, UpgradeOptions};
use crate::error::{BoxError, Error};
use crate::items::{ItemMap, LazyItems};
use crate::mime::{MimeTypeProvider, MimeTypeProviderStack};
use crate::request::HttpRequest;
use crate::response::HttpResponse;
use crate::route::RouteMatch;
use crate::session::SessionProxy;
use crate::ws::WebSocketContext;

/// A teardown action registered via [`HttpContext::on_close`].
///
/// Runs at most once, during [`close`](HttpContext::close), with the closing
/// context as argument. An `Err` is contained and logged, never propagated.
pub type CloseCallback = Box<dyn FnOnce(&mut HttpContext) -> Result<(), BoxError> + Send>;

/// The per-request context: request, response, routing result, session,
/// identity, shared items, and a fault-contained teardown registry, behind
/// one handle.
pub struct HttpContext {
    id: String,
    created_at: Instant,
    local_addr: SocketAddr,
    remote_addr: SocketAddr,
    request: Box<dyn HttpRequest>,
    response: Box<dyn HttpResponse>,
    // Shared handle only: the socket's lifetime belongs to the server loop
    // that accepted it, never to the context.
    connection: Arc<dyn Connection>,
    route: Option<RouteMatch>,
    session: Option<Arc<dyn SessionProxy>>,
    user: Option<Principal>,
    items: LazyItems,
    handled: bool,
    error_message: Option<String>,
    support_compressed_requests: bool,
    mime_type_providers: MimeTypeProviderStack,
    close_callbacks: Vec<CloseCallback>,
    closed: bool,
}

impl HttpContext {
    /// Builds a context over `connection`.
    ///
    /// Opens the request and response facades, derives the endpoints from
    /// the request, assigns a fresh id, and starts the age clock. Assumes a
    /// valid connection; transport state is not validated here.
    pub fn new(connection: Arc<dyn Connection>) -> Self {
        let request = connection.open_request();
        let response = connection.open_response();
        let local_addr = request.local_addr();
        let remote_addr = request.remote_addr();

        Self {
            id: Uuid::new_v4().to_string(),
            created_at: Instant::now(),
            local_addr,
            remote_addr,
            request,
            response,
            connection,
            route: None,
            session: None,
            user: None,
            items: LazyItems::new(),
            handled: false,
            error_message: None,
            support_compressed_requests: false,
            mime_type_providers: MimeTypeProviderStack::new(),
            close_callbacks: Vec::new(),
            closed: false,
        }
    }

    // ── Identity & timing ────────────────────────────────────────────────────

    /// Unique id of this context, for log and trace correlation.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Time elapsed since construction. Never decreases.
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// The local endpoint the request arrived on.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// The peer that sent the request.
    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    // ── Request / response / connection ──────────────────────────────────────

    pub fn request(&self) -> &dyn HttpRequest {
        self.request.as_ref()
    }

    pub fn response(&self) -> &dyn HttpResponse {
        self.response.as_ref()
    }

    pub fn response_mut(&mut self) -> &mut dyn HttpResponse {
        self.response.as_mut()
    }

    /// The connection this request arrived on. The context never closes it.
    pub fn connection(&self) -> &dyn Connection {
        self.connection.as_ref()
    }

    // ── Pipeline-stage fields ────────────────────────────────────────────────

    /// The route match, once the router has run.
    pub fn route(&self) -> Option<&RouteMatch> {
        self.route.as_ref()
    }

    /// Attaches the router's result.
    pub fn set_route(&mut self, route: RouteMatch) {
        self.route = Some(route);
    }

    /// The sub-path of the current route, once routing has run.
    pub fn requested_path(&self) -> Option<&str> {
        self.route.as_ref().map(RouteMatch::sub_path)
    }

    pub fn session(&self) -> Option<&Arc<dyn SessionProxy>> {
        self.session.as_ref()
    }

    pub fn set_session(&mut self, session: Arc<dyn SessionProxy>) {
        self.session = Some(session);
    }

    pub fn user(&self) -> Option<&Principal> {
        self.user.as_ref()
    }

    /// Assigns the authenticated identity. At most one assignment sticks:
    /// once a request has an identity it keeps it, and later calls are
    /// ignored.
    pub fn set_user(&mut self, user: Principal) {
        if self.user.is_none() {
            self.user = Some(user);
        }
    }

    /// The shared item map, created on first access. Concurrent first
    /// accesses observe the same map.
    pub fn items(&self) -> Arc<ItemMap> {
        self.items.get_or_create()
    }

    /// Whether the item map has been materialized, without materializing it.
    pub fn items_initialized(&self) -> bool {
        self.items.initialized()
    }

    /// Whether a handler has produced a response.
    pub fn is_handled(&self) -> bool {
        self.handled
    }

    /// Marks the request as handled. Idempotent; the flag is never reset.
    pub fn set_handled(&mut self) {
        self.handled = true;
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    /// Annotates the context with an error for the error pipeline.
    pub fn set_error_message(&mut self, message: impl Into<String>) {
        self.error_message = Some(message.into());
    }

    pub fn has_error(&self) -> bool {
        self.error_message.is_some()
    }

    /// Whether the transport will accept compressed request bodies.
    pub fn supports_compressed_requests(&self) -> bool {
        self.support_compressed_requests
    }

    pub fn set_support_compressed_requests(&mut self, value: bool) {
        self.support_compressed_requests = value;
    }

    // ── MIME resolution ──────────────────────────────────────────────────────

    /// Registers a MIME provider at the top of this context's chain; it is
    /// consulted before every provider registered earlier.
    pub fn push_mime_type_provider(&mut self, provider: Arc<dyn MimeTypeProvider>) {
        self.mime_type_providers.push(provider);
    }

    /// Resolves a file extension through the provider chain, newest provider
    /// first. `None` when no provider can answer.
    pub fn get_mime_type(&self, extension: &str) -> Option<String> {
        self.mime_type_providers.mime_type(extension)
    }

    /// Asks the provider chain whether `mime_type` content should be served
    /// compressed. Returns `(handled, prefer_compression)`;
    /// `(false, false)` when no provider can decide.
    pub fn try_determine_compression(&self, mime_type: &str) -> (bool, bool) {
        match self.mime_type_providers.determine_compression(mime_type) {
            Some(prefer) => (true, prefer),
            None => (false, false),
        }
    }

    // ── Lifecycle ────────────────────────────────────────────────────────────

    /// Whether [`close`](HttpContext::close) has run.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Registers a teardown action to run when the context closes.
    ///
    /// Callbacks run in reverse registration order — the last one in is the
    /// first one out. Registration on a closed context fails with
    /// [`Error::ClosedContext`]; a successful registration guarantees the
    /// callback runs exactly once during [`close`](HttpContext::close).
    pub fn on_close(
        &mut self,
        callback: impl FnOnce(&mut HttpContext) -> Result<(), BoxError> + Send + 'static,
    ) -> Result<(), Error> {
        if self.closed {
            return Err(Error::ClosedContext { id: self.id.clone() });
        }
        self.close_callbacks.push(Box::new(callback));
        Ok(())
    }

    /// Finalizes the context.
    ///
    /// The response stream is closed first, no matter what — before any
    /// callback runs and even when none are registered. Then every
    /// registered callback runs exactly once, newest-first, with this
    /// context as argument. A callback's error is logged under the context
    /// id and the remaining callbacks still run; nothing is re-raised.
    ///
    /// Idempotent: a second call returns immediately without re-finalizing
    /// the response or re-running any callback.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        // The response goes out no matter what teardown does next.
        self.response.close();

        // Take the registry out of self so callbacks can borrow the context.
        let callbacks = std::mem::take(&mut self.close_callbacks);
        for callback in callbacks.into_iter().rev() {
            // Each invocation is fenced on its own: one failing action must
            // not starve the ones registered before it.
            if let Err(e) = callback(self) {
                error!(id = %self.id, "close callback failed: {e}");
            }
        }

        debug!(id = %self.id, age_ms = self.age().as_millis() as u64, "context closed");
    }

    // ── Protocol upgrade ─────────────────────────────────────────────────────

    /// Promotes this HTTP exchange to a WebSocket session.
    ///
    /// Suspends until the connection completes the handshake, then returns
    /// the [`WebSocketContext`] for the message layer. `cancellation` is the
    /// sole cancellation authority: if it fires before the handshake
    /// completes the operation fails with [`Error::Cancelled`], and the
    /// context's route, session, and items are left exactly as they were.
    /// A transport failure propagates uninterpreted as [`Error::Upgrade`];
    /// neither failure closes the context — that stays the caller's job.
    pub async fn accept_websocket(
        &self,
        requested_protocols: Vec<String>,
        accepted_protocol: Option<String>,
        receive_buffer_size: usize,
        keep_alive_interval: Duration,
        cancellation: CancellationToken,
    ) -> Result<WebSocketContext, Error> {
        let options = UpgradeOptions { receive_buffer_size, keep_alive_interval };
        let handshake = self
            .connection
            .accept_websocket(accepted_protocol.as_deref(), options);

        let socket = tokio::select! {
            // `biased` checks cancellation first, so an already-cancelled
            // token fails the upgrade before the handshake is even polled.
            biased;

            () = cancellation.cancelled() => return Err(Error::Cancelled),
            result = handshake => result.map_err(Error::Upgrade)?,
        };

        debug!(
            id = %self.id,
            protocol = accepted_protocol.as_deref().unwrap_or("-"),
            "websocket handshake complete"
        );

        Ok(WebSocketContext::new(
            requested_protocols,
            accepted_protocol,
            socket,
            cancellation,
        ))
    }
}
