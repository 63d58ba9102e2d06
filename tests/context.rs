//! Lifecycle tests for [`HttpContext`], run against in-memory mock
//! collaborators: a connection that counts response finalizations and a
//! handshake that can be told to accept, fail, or hang forever.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode, Uri, Version};
use parking_lot::Mutex;

use nidus::{
    BoxError, BoxFuture, CancellationToken, Connection, Error, HttpContext, HttpRequest,
    HttpResponse, Principal, RouteMatch, SUPPORTED_VERSION, SessionProxy, UpgradeOptions,
    WebSocket,
};

// ── Mock collaborators ───────────────────────────────────────────────────────

struct MockRequest {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
}

impl Default for MockRequest {
    fn default() -> Self {
        Self {
            method: Method::GET,
            uri: "/users/42".parse().unwrap(),
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }
}

impl HttpRequest for MockRequest {
    fn method(&self) -> &Method {
        &self.method
    }

    fn uri(&self) -> &Uri {
        &self.uri
    }

    fn version(&self) -> Version {
        Version::HTTP_11
    }

    fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    fn body(&self) -> &Bytes {
        &self.body
    }

    fn local_addr(&self) -> SocketAddr {
        "127.0.0.1:8080".parse().unwrap()
    }

    fn remote_addr(&self) -> SocketAddr {
        "127.0.0.1:49152".parse().unwrap()
    }
}

struct MockResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
    close_count: Arc<AtomicUsize>,
}

impl HttpResponse for MockResponse {
    fn status(&self) -> StatusCode {
        self.status
    }

    fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    fn write(&mut self, chunk: Bytes) {
        self.body.extend_from_slice(&chunk);
    }

    fn close(&mut self) {
        self.close_count.fetch_add(1, Ordering::SeqCst);
    }
}

struct MockSocket;

impl WebSocket for MockSocket {
    fn as_any(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

#[derive(Clone, Copy)]
enum Handshake {
    Accept,
    Fail,
    Never,
}

struct MockConnection {
    response_closes: Arc<AtomicUsize>,
    handshake: Handshake,
}

impl MockConnection {
    fn new() -> Self {
        Self::with_handshake(Handshake::Accept)
    }

    fn with_handshake(handshake: Handshake) -> Self {
        Self {
            response_closes: Arc::new(AtomicUsize::new(0)),
            handshake,
        }
    }
}

impl Connection for MockConnection {
    fn open_request(&self) -> Box<dyn HttpRequest> {
        Box::new(MockRequest::default())
    }

    fn open_response(&self) -> Box<dyn HttpResponse> {
        Box::new(MockResponse {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Vec::new(),
            close_count: Arc::clone(&self.response_closes),
        })
    }

    fn accept_websocket(
        &self,
        _accepted_protocol: Option<&str>,
        _options: UpgradeOptions,
    ) -> BoxFuture<Result<Box<dyn WebSocket>, BoxError>> {
        match self.handshake {
            Handshake::Accept => {
                Box::pin(async { Ok::<_, BoxError>(Box::new(MockSocket) as Box<dyn WebSocket>) })
            }
            Handshake::Fail => {
                let err: BoxError = "connection reset during handshake".into();
                Box::pin(async move { Err(err) })
            }
            Handshake::Never => {
                Box::pin(std::future::pending::<Result<Box<dyn WebSocket>, BoxError>>())
            }
        }
    }
}

struct MockSession {
    id: String,
}

impl SessionProxy for MockSession {
    fn id(&self) -> &str {
        &self.id
    }
}

/// A fresh context plus the counter of response finalizations behind it.
fn context() -> (HttpContext, Arc<AtomicUsize>) {
    let connection = Arc::new(MockConnection::new());
    let closes = Arc::clone(&connection.response_closes);
    (HttpContext::new(connection), closes)
}

fn context_with_handshake(handshake: Handshake) -> HttpContext {
    HttpContext::new(Arc::new(MockConnection::with_handshake(handshake)))
}

// ── Teardown ─────────────────────────────────────────────────────────────────

#[test]
fn close_runs_callbacks_in_lifo_order() {
    let (mut ctx, _) = context();
    let log = Arc::new(Mutex::new(Vec::new()));

    for name in ["a", "b", "c"] {
        let log = Arc::clone(&log);
        ctx.on_close(move |_| {
            log.lock().push(name);
            Ok(())
        })
        .unwrap();
    }

    ctx.close();
    assert_eq!(*log.lock(), vec!["c", "b", "a"]);
}

#[test]
fn on_close_after_close_is_rejected() {
    let (mut ctx, _) = context();
    ctx.close();

    let ran = Arc::new(AtomicUsize::new(0));
    let probe = Arc::clone(&ran);
    let result = ctx.on_close(move |_| {
        probe.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });

    assert!(matches!(result, Err(Error::ClosedContext { .. })));
    assert_eq!(ran.load(Ordering::SeqCst), 0);
}

#[test]
fn failing_callback_does_not_suppress_siblings() {
    let (mut ctx, closes) = context();
    let log = Arc::new(Mutex::new(Vec::new()));

    let first = Arc::clone(&log);
    ctx.on_close(move |_| {
        first.lock().push("first");
        Ok(())
    })
    .unwrap();

    ctx.on_close(|_| Err("boom".into())).unwrap();

    let last = Arc::clone(&log);
    ctx.on_close(move |_| {
        last.lock().push("last");
        Ok(())
    })
    .unwrap();

    // close() must not propagate the middle callback's error.
    ctx.close();

    assert_eq!(*log.lock(), vec!["last", "first"]);
    assert_eq!(closes.load(Ordering::SeqCst), 1);
}

#[test]
fn close_finalizes_response_even_with_no_callbacks() {
    let (mut ctx, closes) = context();
    ctx.close();
    assert_eq!(closes.load(Ordering::SeqCst), 1);
    assert!(ctx.is_closed());
}

#[test]
fn close_is_idempotent() {
    let (mut ctx, closes) = context();
    let runs = Arc::new(AtomicUsize::new(0));

    let probe = Arc::clone(&runs);
    ctx.on_close(move |_| {
        probe.fetch_add(1, Ordering::SeqCst);
        Ok(())
    })
    .unwrap();

    ctx.close();
    ctx.close();

    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert_eq!(closes.load(Ordering::SeqCst), 1);
}

#[test]
fn callbacks_can_read_the_closing_context() {
    let (mut ctx, _) = context();
    ctx.set_handled();

    let seen = Arc::new(Mutex::new(None));
    let probe = Arc::clone(&seen);
    ctx.on_close(move |ctx| {
        *probe.lock() = Some((ctx.id().to_string(), ctx.is_handled()));
        Ok(())
    })
    .unwrap();

    let id = ctx.id().to_string();
    ctx.close();

    assert_eq!(*seen.lock(), Some((id, true)));
}

// ── Identity, timing, pipeline fields ────────────────────────────────────────

#[test]
fn ids_are_pairwise_distinct() {
    let ids: HashSet<String> = (0..16)
        .map(|_| {
            let (ctx, _) = context();
            ctx.id().to_string()
        })
        .collect();
    assert_eq!(ids.len(), 16);
}

#[test]
fn age_never_decreases() {
    let (ctx, _) = context();
    let mut last = ctx.age();
    for _ in 0..100 {
        let now = ctx.age();
        assert!(now >= last);
        last = now;
    }
}

#[test]
fn endpoints_come_from_the_request() {
    let (ctx, _) = context();
    assert_eq!(ctx.local_addr(), "127.0.0.1:8080".parse().unwrap());
    assert_eq!(ctx.remote_addr(), "127.0.0.1:49152".parse().unwrap());
    assert_eq!(ctx.request().path(), "/users/42");
}

#[test]
fn requested_path_follows_the_route() {
    let (mut ctx, _) = context();
    assert_eq!(ctx.requested_path(), None);

    let params = [("id".to_string(), "42".to_string())].into_iter().collect();
    ctx.set_route(RouteMatch::new("/42", params));

    assert_eq!(ctx.requested_path(), Some("/42"));
    assert_eq!(ctx.route().unwrap().param("id"), Some("42"));
}

#[test]
fn session_is_attached_by_the_session_subsystem() {
    let (mut ctx, _) = context();
    assert!(ctx.session().is_none());

    ctx.set_session(Arc::new(MockSession { id: "s-1".into() }));
    assert_eq!(ctx.session().unwrap().id(), "s-1");
}

#[test]
fn first_user_assignment_wins() {
    let (mut ctx, _) = context();
    ctx.set_user(Principal::with_auth_type("alice", "Basic"));
    ctx.set_user(Principal::new("mallory"));

    let user = ctx.user().unwrap();
    assert_eq!(user.name(), "alice");
    assert_eq!(user.auth_type(), Some("Basic"));
}

#[test]
fn handled_flag_is_idempotent_and_sticky() {
    let (mut ctx, _) = context();
    assert!(!ctx.is_handled());
    ctx.set_handled();
    ctx.set_handled();
    assert!(ctx.is_handled());
}

#[test]
fn error_annotation_derives_has_error() {
    let (mut ctx, _) = context();
    assert!(!ctx.has_error());
    ctx.set_error_message("upstream timed out");
    assert!(ctx.has_error());
    assert_eq!(ctx.error_message(), Some("upstream timed out"));
}

#[test]
fn compressed_request_support_defaults_off() {
    let (mut ctx, _) = context();
    assert!(!ctx.supports_compressed_requests());
    ctx.set_support_compressed_requests(true);
    assert!(ctx.supports_compressed_requests());
}

#[test]
fn items_map_is_lazy_and_shared() {
    let (ctx, _) = context();
    assert!(!ctx.items_initialized());

    let a = ctx.items();
    let b = ctx.items();
    assert!(Arc::ptr_eq(&a, &b));
    assert!(ctx.items_initialized());

    a.insert("trace", "stage-1".to_string());
    assert_eq!(b.get::<String>("trace").as_deref(), Some("stage-1"));
}

// ── MIME resolution ──────────────────────────────────────────────────────────

#[test]
fn compression_is_undecided_without_providers() {
    let (ctx, _) = context();
    assert_eq!(ctx.try_determine_compression("text/html"), (false, false));
    assert_eq!(ctx.get_mime_type("html"), None);
}

#[test]
fn newest_mime_provider_is_consulted_first() {
    struct Answer(&'static str, Option<bool>);

    impl nidus::MimeTypeProvider for Answer {
        fn mime_type(&self, _extension: &str) -> Option<String> {
            Some(self.0.to_string())
        }

        fn prefer_compression(&self, _mime_type: &str) -> Option<bool> {
            self.1
        }
    }

    let (mut ctx, _) = context();
    ctx.push_mime_type_provider(Arc::new(Answer("text/plain", Some(true))));
    ctx.push_mime_type_provider(Arc::new(Answer("text/html", Some(false))));

    assert_eq!(ctx.get_mime_type("html").as_deref(), Some("text/html"));
    assert_eq!(ctx.try_determine_compression("text/html"), (true, false));
}

// ── WebSocket upgrade ────────────────────────────────────────────────────────

#[tokio::test]
async fn upgrade_yields_a_protocol_session() {
    let ctx = context_with_handshake(Handshake::Accept);
    let token = CancellationToken::new();

    let mut ws = ctx
        .accept_websocket(
            vec!["chat".into(), "superchat".into()],
            Some("chat".into()),
            4096,
            Duration::from_secs(30),
            token.clone(),
        )
        .await
        .unwrap();

    assert_eq!(ws.version(), SUPPORTED_VERSION);
    assert_eq!(ws.requested_protocols(), ["chat", "superchat"]);
    assert_eq!(ws.accepted_protocol(), Some("chat"));
    assert!(!ws.cancellation().is_cancelled());
    assert!(ws.socket_mut().as_any().downcast_mut::<MockSocket>().is_some());
}

#[tokio::test]
async fn cancelled_token_aborts_the_handshake_without_mutation() {
    let mut ctx = context_with_handshake(Handshake::Never);
    let token = CancellationToken::new();
    token.cancel();

    let result = ctx
        .accept_websocket(
            vec!["chat".into()],
            Some("chat".into()),
            4096,
            Duration::from_secs(30),
            token,
        )
        .await;

    assert!(matches!(result, Err(Error::Cancelled)));
    // The failed upgrade must leave the context exactly as it was.
    assert!(ctx.route().is_none());
    assert!(ctx.session().is_none());
    assert!(!ctx.items_initialized());
    assert!(!ctx.is_closed());

    // And the context stays usable: teardown still works afterwards.
    ctx.on_close(|_| Ok(())).unwrap();
    ctx.close();
}

#[tokio::test]
async fn transport_failure_propagates_uninterpreted() {
    let ctx = context_with_handshake(Handshake::Fail);

    let result = ctx
        .accept_websocket(vec![], None, 4096, Duration::from_secs(30), CancellationToken::new())
        .await;

    match result {
        Err(Error::Upgrade(source)) => {
            assert_eq!(source.to_string(), "connection reset during handshake");
        }
        Err(other) => panic!("expected transport failure, got {other}"),
        Ok(_) => panic!("expected transport failure, got an established session"),
    }
    // A failed handshake does not implicitly close the context.
    assert!(!ctx.is_closed());
}
