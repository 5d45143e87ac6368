//! Shared helpers for session integration tests.
//!
//! [`ControlPlane`] is an in-process `axum` server standing in for the
//! control plane: read legs receive whatever the test pushes with
//! [`ControlPlane::send_request`], write legs are decoded into a queue the
//! test drains with [`ControlPlane::next_body`]. Connection counters let
//! tests observe generations from the server side.

use std::collections::BTreeMap;
use std::convert::Infallible;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Body as HttpBody;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response as HttpResponse};
use axum::routing::post;
use axum::Router;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures_util::{StreamExt, TryStreamExt};
use tokio::sync::{mpsc, Notify};
use tokio_util::codec::FramedRead;
use tokio_util::io::StreamReader;
use tokio_util::sync::CancellationToken;

use node_session::components::{BoxFuture, Component, StaticRegistry};
use node_session::config::SessionOptions;
use node_session::dispatch::Collaborators;
use node_session::host::{ProcessExit, Rebooter, SystemdProbe};
use node_session::models::body::Body;
use node_session::models::health::{Event, HealthState, HealthStateType, Metric};
use node_session::models::request::Request;
use node_session::session::codec::{BodyCodec, Frame};
use node_session::update::UnavailableUpdater;
use node_session::Result;

pub const SESSION_PATH: &str = "/api/v1/session";

/// Headers seen on one leg.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegHeaders {
    pub machine_id: Option<String>,
    pub session_type: Option<String>,
    pub token: Option<String>,
}

/// Decrements a gauge when the connection it tracks goes away.
struct Gauge {
    open: Arc<AtomicUsize>,
}

impl Gauge {
    fn enter(open: &Arc<AtomicUsize>, peak: &AtomicUsize) -> Self {
        let now = open.fetch_add(1, Ordering::SeqCst) + 1;
        peak.fetch_max(now, Ordering::SeqCst);
        Self {
            open: Arc::clone(open),
        }
    }
}

impl Drop for Gauge {
    fn drop(&mut self) {
        self.open.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct PlaneState {
    readers: Mutex<Vec<mpsc::UnboundedSender<Bytes>>>,
    open_readers: Arc<AtomicUsize>,
    open_writers: Arc<AtomicUsize>,
    peak_readers: AtomicUsize,
    peak_writers: AtomicUsize,
    reader_connections: AtomicUsize,
    writer_connections: AtomicUsize,
    reject_reads: AtomicBool,
    hold_reads: AtomicBool,
    kick_writers: Notify,
    headers: Mutex<Vec<LegHeaders>>,
    received: Mutex<Option<mpsc::UnboundedSender<Body>>>,
}

/// Running fake control plane.
pub struct ControlPlane {
    pub addr: SocketAddr,
    state: Arc<PlaneState>,
    received: tokio::sync::Mutex<mpsc::UnboundedReceiver<Body>>,
    shutdown: CancellationToken,
}

impl ControlPlane {
    /// Bind an ephemeral port and start serving.
    pub async fn start() -> Self {
        let (received_tx, received_rx) = mpsc::unbounded_channel();
        let state = Arc::new(PlaneState::default());
        *state.received.lock().unwrap() = Some(received_tx);

        let app = Router::new()
            .route(SESSION_PATH, post(session_leg))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind ephemeral");
        let addr = listener.local_addr().expect("local addr");

        let shutdown = CancellationToken::new();
        let server_ct = shutdown.clone();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app)
                .with_graceful_shutdown(server_ct.cancelled_owned())
                .await;
        });

        Self {
            addr,
            state,
            received: tokio::sync::Mutex::new(received_rx),
            shutdown,
        }
    }

    pub fn url(&self) -> String {
        format!("http://{}{SESSION_PATH}", self.addr)
    }

    /// Push raw bytes to every open read leg; returns how many got them.
    pub fn send_raw(&self, bytes: impl Into<Bytes>) -> usize {
        let bytes = bytes.into();
        let mut readers = self.state.readers.lock().unwrap();
        readers.retain(|tx| tx.send(bytes.clone()).is_ok());
        readers.len()
    }

    pub fn send_body(&self, body: &Body) -> usize {
        self.send_raw(serde_json::to_vec(body).expect("encode body"))
    }

    pub fn send_request(&self, req_id: &str, request: &Request) -> usize {
        self.send_body(&Body::from_request(req_id, request).expect("encode request"))
    }

    /// End every open read stream from the server side.
    pub fn drop_readers(&self) {
        self.state.readers.lock().unwrap().clear();
    }

    /// Abort every open write leg from the server side.
    pub fn drop_writers(&self) {
        self.state.kick_writers.notify_waiters();
    }

    /// Answer read legs with `503` while set.
    pub fn reject_reads(&self, reject: bool) {
        self.state.reject_reads.store(reject, Ordering::SeqCst);
    }

    /// Never send response headers on read legs while set.
    pub fn hold_reads(&self, hold: bool) {
        self.state.hold_reads.store(hold, Ordering::SeqCst);
    }

    /// Next body received on any write leg.
    pub async fn next_body(&self, timeout: Duration) -> Option<Body> {
        let mut rx = self.received.lock().await;
        tokio::time::timeout(timeout, rx.recv()).await.ok().flatten()
    }

    /// Whether every leg has been released by the client.
    ///
    /// Pokes open read streams with whitespace first so the server notices
    /// a peer that has gone away.
    pub fn all_released(&self) -> bool {
        self.send_raw(" ");
        self.open_readers() == 0 && self.open_writers() == 0
    }

    pub fn open_readers(&self) -> usize {
        self.state.open_readers.load(Ordering::SeqCst)
    }

    pub fn open_writers(&self) -> usize {
        self.state.open_writers.load(Ordering::SeqCst)
    }

    pub fn peak_readers(&self) -> usize {
        self.state.peak_readers.load(Ordering::SeqCst)
    }

    pub fn peak_writers(&self) -> usize {
        self.state.peak_writers.load(Ordering::SeqCst)
    }

    pub fn reader_connections(&self) -> usize {
        self.state.reader_connections.load(Ordering::SeqCst)
    }

    pub fn writer_connections(&self) -> usize {
        self.state.writer_connections.load(Ordering::SeqCst)
    }

    pub fn headers(&self) -> Vec<LegHeaders> {
        self.state.headers.lock().unwrap().clone()
    }
}

impl Drop for ControlPlane {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
}

async fn session_leg(
    State(state): State<Arc<PlaneState>>,
    headers: HeaderMap,
    body: HttpBody,
) -> HttpResponse {
    let seen = LegHeaders {
        machine_id: header(&headers, "machine_id"),
        session_type: header(&headers, "session_type"),
        token: header(&headers, "token"),
    };
    state.headers.lock().unwrap().push(seen.clone());

    match seen.session_type.as_deref() {
        Some("read") => read_leg(state).await,
        Some("write") => write_leg(state, body).await,
        _ => StatusCode::BAD_REQUEST.into_response(),
    }
}

async fn read_leg(state: Arc<PlaneState>) -> HttpResponse {
    state.reader_connections.fetch_add(1, Ordering::SeqCst);
    if state.reject_reads.load(Ordering::SeqCst) {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }
    let gauge = Gauge::enter(&state.open_readers, &state.peak_readers);
    if state.hold_reads.load(Ordering::SeqCst) {
        std::future::pending::<()>().await;
    }

    let (tx, rx) = mpsc::unbounded_channel::<Bytes>();
    state.readers.lock().unwrap().push(tx);

    let stream = futures_util::stream::unfold((rx, gauge), |(mut rx, gauge)| async move {
        rx.recv()
            .await
            .map(|bytes| (Ok::<_, Infallible>(bytes), (rx, gauge)))
    });
    HttpResponse::new(HttpBody::from_stream(stream))
}

async fn write_leg(state: Arc<PlaneState>, body: HttpBody) -> HttpResponse {
    state.writer_connections.fetch_add(1, Ordering::SeqCst);
    let _gauge = Gauge::enter(&state.open_writers, &state.peak_writers);
    let Some(received) = state.received.lock().unwrap().clone() else {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    };

    let bytes = Box::pin(body.into_data_stream().map_err(io::Error::other));
    let mut frames = FramedRead::new(StreamReader::new(bytes), BodyCodec::new());

    loop {
        tokio::select! {
            () = state.kick_writers.notified() => break,
            frame = frames.next() => match frame {
                Some(Ok(Frame::Body(body))) => {
                    let _ = received.send(body);
                }
                Some(Ok(Frame::Invalid(_))) => {}
                Some(Err(_)) | None => break,
            },
        }
    }
    StatusCode::OK.into_response()
}

/// Poll `condition` every 10ms until it holds or `timeout` passes.
pub async fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Await `fut` or fail the test after `timeout`.
pub async fn within<T>(timeout: Duration, what: &str, fut: impl Future<Output = T>) -> T {
    tokio::time::timeout(timeout, fut)
        .await
        .unwrap_or_else(|_| panic!("{what} did not finish within {timeout:?}"))
}

// ── Collaborators ───────────────────────────────────────────

/// Component answering every accessor immediately, or hanging on `states`.
pub struct StaticComponent {
    pub name: &'static str,
    pub hang: bool,
}

impl Component for StaticComponent {
    fn name(&self) -> &str {
        self.name
    }

    fn states(&self) -> BoxFuture<'_, Result<Vec<HealthState>>> {
        Box::pin(async move {
            if self.hang {
                std::future::pending::<()>().await;
            }
            Ok(vec![HealthState::new(self.name, HealthStateType::Healthy, "")])
        })
    }

    fn events(&self, _since: DateTime<Utc>) -> BoxFuture<'_, Result<Vec<Event>>> {
        Box::pin(async move { Ok(Vec::new()) })
    }

    fn metrics(&self, _since: DateTime<Utc>) -> BoxFuture<'_, Result<Vec<Metric>>> {
        Box::pin(async move {
            Ok(vec![Metric {
                unix_seconds: Utc::now().timestamp(),
                name: format!("{}_load", self.name),
                labels: BTreeMap::new(),
                value: 0.25,
            }])
        })
    }
}

struct NeverActive;

impl SystemdProbe for NeverActive {
    fn is_active(&self, _unit: &str) -> BoxFuture<'_, Result<bool>> {
        Box::pin(async move { Ok(false) })
    }
}

#[derive(Default)]
pub struct CountingRebooter(pub AtomicUsize);

impl Rebooter for CountingRebooter {
    fn reboot(&self, _delay: Duration) -> BoxFuture<'_, Result<()>> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move { Ok(()) })
    }
}

struct PanicOnExit;

impl ProcessExit for PanicOnExit {
    fn exit(&self, code: i32) {
        panic!("unexpected process exit with code {code}");
    }
}

/// Collaborators with components `cpu` and `disk`, plus `slow` when
/// `with_slow` is set.
pub fn collaborators(with_slow: bool, rebooter: Arc<CountingRebooter>) -> Collaborators {
    let mut components: Vec<Arc<dyn Component>> = vec![
        Arc::new(StaticComponent {
            name: "cpu",
            hang: false,
        }),
        Arc::new(StaticComponent {
            name: "disk",
            hang: false,
        }),
    ];
    if with_slow {
        components.push(Arc::new(StaticComponent {
            name: "slow",
            hang: true,
        }));
    }

    Collaborators {
        registry: Arc::new(StaticRegistry::new(components)),
        updater: Arc::new(UnavailableUpdater),
        systemd: Arc::new(NeverActive),
        rebooter,
        exit: Arc::new(PanicOnExit),
    }
}

/// Options tuned for tests: fast reconnects, long idle timeout.
pub fn fast_options() -> SessionOptions {
    let mut options = SessionOptions::new("node-test");
    options.token = Some("t0k3n".into());
    options.reconnect_interval = Duration::from_millis(50);
    options.read_idle_timeout = Duration::from_secs(30);
    options.request_timeout = Duration::from_secs(30);
    options
}
