//! Telemetry frame server.
//!
//! Devices open a TCP connection to the configured server address and stream
//! fixed-size frames. Each connection owns its own [`FrameDecoder`]; the only
//! state shared between connections is the active-client table.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use socket2::{SockRef, TcpKeepalive};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{sleep, timeout, Instant};

use crate::config::ServerConfig;
use crate::events::{Emitter, ServerEvent};
use crate::protocol::FrameDecoder;
use crate::types::ServerStatus;

const READ_BUFFER_SIZE: usize = 4096;

/// Pause after a failed accept so a persistent error does not spin.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Lifecycle of a [`FrameServer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

struct Listening {
    port: u16,
    host: String,
    shutdown: watch::Sender<bool>,
    accept: JoinHandle<()>,
}

struct Shared {
    config: ServerConfig,
    events: Emitter<ServerEvent>,
    state: watch::Sender<ServerState>,
    listening: Mutex<Option<Listening>>,
    clients: Mutex<HashMap<u64, SocketAddr>>,
}

impl Shared {
    fn state(&self) -> ServerState {
        *self.state.borrow()
    }

    fn status(&self) -> ServerStatus {
        let running = self.state() == ServerState::Running;
        let listening = lock(&self.listening);
        ServerStatus {
            running,
            port: listening.as_ref().map(|l| l.port),
            host: listening.as_ref().map(|l| l.host.clone()),
            connections: lock(&self.clients).len(),
        }
    }

    fn emit_status(&self) {
        self.events.emit(ServerEvent::Status(self.status()));
    }
}

/// Shuts the listener down once the last [`FrameServer`] handle is gone.
///
/// Background tasks hold `Shared` but never this guard, so it is not kept
/// alive by the server it controls.
struct DropGuard {
    shared: Arc<Shared>,
}

impl Drop for DropGuard {
    fn drop(&mut self) {
        let listening = lock(&self.shared.listening).take();
        if let Some(listening) = listening {
            self.shared.events.info("Server handle dropped, shutting down");
            let _ = listening.shutdown.send(true);
        }
    }
}

/// TCP server that decodes telemetry frames from every connected device.
///
/// Cheap to clone; clones control the same server. Dropping the last clone
/// of a running server closes the listener and its connections.
#[derive(Clone)]
pub struct FrameServer {
    shared: Arc<Shared>,
    _guard: Arc<DropGuard>,
}

impl FrameServer {
    /// Create a stopped server and the receiver for its events.
    pub fn new(config: ServerConfig) -> (Self, UnboundedReceiver<ServerEvent>) {
        let (events, rx) = Emitter::new("server");
        let (state, _) = watch::channel(ServerState::Stopped);
        let shared = Arc::new(Shared {
            config,
            events,
            state,
            listening: Mutex::new(None),
            clients: Mutex::new(HashMap::new()),
        });
        let server = Self {
            _guard: Arc::new(DropGuard {
                shared: Arc::clone(&shared),
            }),
            shared,
        };
        (server, rx)
    }

    pub fn state(&self) -> ServerState {
        self.shared.state()
    }

    pub fn status(&self) -> ServerStatus {
        self.shared.status()
    }

    /// Distinct addresses of the connected devices, IPv4-mapped IPv6
    /// addresses reported as plain IPv4.
    pub fn connected_ips(&self) -> Vec<IpAddr> {
        let mut ips: Vec<IpAddr> = Vec::new();
        for peer in lock(&self.shared.clients).values() {
            if !ips.contains(&peer.ip()) {
                ips.push(peer.ip());
            }
        }
        ips.sort();
        ips
    }

    /// Bind `host:port` and start accepting devices.
    ///
    /// Rejected unless the server is stopped. Port `0` binds an ephemeral
    /// port, reported by [`status`](Self::status).
    pub async fn start(&self, port: u16, host: &str) -> bool {
        let shared = &self.shared;

        let mut previous = ServerState::Stopped;
        let claimed = shared.state.send_if_modified(|state| {
            previous = *state;
            if *state == ServerState::Stopped {
                *state = ServerState::Starting;
                true
            } else {
                false
            }
        });
        if !claimed {
            let why = match previous {
                ServerState::Starting => "server is starting",
                ServerState::Stopping => "server is stopping",
                _ => "already running",
            };
            shared.events.info(format!("Start ignored: {}", why));
            return false;
        }

        shared
            .events
            .info(format!("Server start requested: {}:{}", host, port));

        let listener = match TcpListener::bind((host, port)).await {
            Ok(listener) => listener,
            Err(e) => {
                shared
                    .events
                    .warn(format!("Server error: bind {}:{} failed: {}", host, port, e));
                shared.state.send_replace(ServerState::Stopped);
                shared.events.emit(ServerEvent::Status(ServerStatus::stopped()));
                return false;
            }
        };
        let bound_port = listener.local_addr().map(|a| a.port()).unwrap_or(port);

        let (shutdown, shutdown_rx) = watch::channel(false);
        let accept = tokio::spawn(accept_loop(Arc::clone(shared), listener, shutdown_rx));
        *lock(&shared.listening) = Some(Listening {
            port: bound_port,
            host: host.to_string(),
            shutdown,
            accept,
        });
        shared.state.send_replace(ServerState::Running);

        shared
            .events
            .info(format!("Server listening on {}:{}", host, bound_port));
        shared.emit_status();
        true
    }

    /// Shut the server down and wait until it is fully stopped.
    ///
    /// Open connections get a half-close first and are dropped once they
    /// close or the grace period runs out. A call made while another stop is
    /// in flight waits for that one. Returns `false` if nothing was running.
    pub async fn stop(&self) -> bool {
        let shared = &self.shared;
        let mut state_rx = shared.state.subscribe();

        loop {
            let mut previous = ServerState::Stopped;
            let claimed = shared.state.send_if_modified(|state| {
                previous = *state;
                if *state == ServerState::Running {
                    *state = ServerState::Stopping;
                    true
                } else {
                    false
                }
            });
            if claimed {
                break;
            }

            match previous {
                ServerState::Stopped => {
                    shared.events.info("Stop ignored: server not running");
                    shared.events.emit(ServerEvent::Status(ServerStatus::stopped()));
                    return false;
                }
                ServerState::Stopping => {
                    return state_rx
                        .wait_for(|s| *s == ServerState::Stopped)
                        .await
                        .is_ok();
                }
                // Let the pending start settle, then stop whatever it started.
                _ => {
                    if state_rx
                        .wait_for(|s| *s != ServerState::Starting)
                        .await
                        .is_err()
                    {
                        return false;
                    }
                }
            }
        }

        shared.events.info("Server stop requested");

        let listening = lock(&shared.listening).take();
        if let Some(listening) = listening {
            let _ = listening.shutdown.send(true);
            if let Err(e) = listening.accept.await {
                shared.events.warn(format!("Accept task failed: {}", e));
            }
        }

        shared.events.info("Server stopped");
        shared.events.emit(ServerEvent::Status(ServerStatus::stopped()));
        shared.state.send_replace(ServerState::Stopped);
        true
    }
}

/// Unwrap IPv4-mapped IPv6 addresses (`::ffff:a.b.c.d`).
pub fn normalize_peer_ip(ip: IpAddr) -> IpAddr {
    match ip {
        IpAddr::V6(v6) => v6.to_ipv4_mapped().map_or(IpAddr::V6(v6), IpAddr::V4),
        v4 => v4,
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn enable_keepalive(stream: &TcpStream, idle: Duration) -> std::io::Result<()> {
    SockRef::from(stream).set_tcp_keepalive(&TcpKeepalive::new().with_time(idle))
}

/// Accept devices until shutdown, then wait for every connection to end.
async fn accept_loop(
    shared: Arc<Shared>,
    listener: TcpListener,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut connections = JoinSet::new();
    let mut next_id = 0u64;

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    next_id += 1;
                    connections.spawn(handle_connection(
                        Arc::clone(&shared),
                        next_id,
                        stream,
                        peer,
                        shutdown.clone(),
                    ));
                }
                Err(e) => {
                    shared.events.warn(format!("Accept error: {}", e));
                    sleep(ACCEPT_BACKOFF).await;
                }
            },
            Some(joined) = connections.join_next(), if !connections.is_empty() => {
                if let Err(e) = joined {
                    shared.events.warn(format!("Connection task failed: {}", e));
                }
            }
        }
    }

    // No new connections from here on.
    drop(listener);

    while connections.join_next().await.is_some() {}
}

async fn handle_connection(
    shared: Arc<Shared>,
    id: u64,
    mut stream: TcpStream,
    peer: SocketAddr,
    mut shutdown: watch::Receiver<bool>,
) {
    let peer = SocketAddr::new(normalize_peer_ip(peer.ip()), peer.port());
    lock(&shared.clients).insert(id, peer);
    shared.events.info(format!("Client connected: {}", peer));
    shared.emit_status();

    if let Err(e) = enable_keepalive(&stream, shared.config.keepalive()) {
        shared
            .events
            .debug(format!("Keep-alive not enabled for {}: {}", peer, e));
    }

    let idle = shared.config.idle_timeout();
    let grace = shared.config.close_grace();
    let mut decoder = FrameDecoder::new();
    let mut buf = vec![0u8; READ_BUFFER_SIZE];
    // Set once the half-close went out; the peer has until then to hang up.
    let mut closing_at: Option<Instant> = None;

    loop {
        let wait = match closing_at {
            Some(deadline) => deadline.saturating_duration_since(Instant::now()),
            None => idle,
        };

        tokio::select! {
            _ = shutdown.changed(), if closing_at.is_none() => {
                if let Err(e) = stream.shutdown().await {
                    shared.events.debug(format!("Half-close failed for {}: {}", peer, e));
                }
                closing_at = Some(Instant::now() + grace);
            }
            read = timeout(wait, stream.read(&mut buf)) => match read {
                Ok(Ok(0)) => break,
                Ok(Ok(n)) => {
                    shared.events.debug(format!("RX {} bytes from {}", n, peer));
                    for frame in decoder.push(&buf[..n]) {
                        shared.events.emit(ServerEvent::Frame(frame));
                    }
                }
                Ok(Err(e)) => {
                    shared.events.warn(format!("Client error {}: {}", peer, e));
                    break;
                }
                Err(_) if closing_at.is_some() => {
                    shared.events.info(format!("Force close -> {}", peer));
                    break;
                }
                Err(_) => {
                    shared.events.info(format!("Socket timeout -> {}", peer));
                    break;
                }
            },
        }
    }

    drop(stream);
    lock(&shared.clients).remove(&id);
    shared.events.info(format!("Client disconnected: {}", peer));
    shared.emit_status();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::frame::tests::build_frame;
    use crate::types::TelemetryFrame;
    use std::net::{Ipv4Addr, Ipv6Addr};

    fn test_config() -> ServerConfig {
        ServerConfig {
            idle_timeout_ms: 2000,
            close_grace_ms: 100,
            ..ServerConfig::default()
        }
    }

    async fn started(config: ServerConfig) -> (FrameServer, UnboundedReceiver<ServerEvent>, u16) {
        let (server, rx) = FrameServer::new(config);
        assert!(server.start(0, "127.0.0.1").await);
        let port = server.status().port.unwrap();
        (server, rx, port)
    }

    async fn next_frame(rx: &mut UnboundedReceiver<ServerEvent>) -> TelemetryFrame {
        timeout(Duration::from_secs(2), async {
            loop {
                match rx.recv().await {
                    Some(ServerEvent::Frame(frame)) => break frame,
                    Some(_) => continue,
                    None => panic!("event channel closed"),
                }
            }
        })
        .await
        .unwrap()
    }

    async fn wait_for_connections(server: &FrameServer, count: usize) {
        timeout(Duration::from_secs(2), async {
            while server.status().connections != count {
                sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
    }

    fn drain(rx: &mut UnboundedReceiver<ServerEvent>) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn logs(events: &[ServerEvent]) -> Vec<&str> {
        events
            .iter()
            .filter_map(|e| match e {
                ServerEvent::Log(line) => Some(line.as_str()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_normalize_peer_ip() {
        let mapped: IpAddr = "::ffff:192.168.1.101".parse().unwrap();
        assert_eq!(
            normalize_peer_ip(mapped),
            IpAddr::V4(Ipv4Addr::new(192, 168, 1, 101))
        );

        let v6 = IpAddr::V6(Ipv6Addr::LOCALHOST);
        assert_eq!(normalize_peer_ip(v6), v6);

        let v4 = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1));
        assert_eq!(normalize_peer_ip(v4), v4);
    }

    #[tokio::test]
    async fn test_two_frames_in_one_write() {
        let (server, mut rx, port) = started(test_config()).await;

        let mut client = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
        let mut payload = build_frame([10, 0, 0, 1], [0, 0, 0]);
        payload.extend(build_frame([10, 0, 0, 2], [1, 1, 1]));
        client.write_all(&payload).await.unwrap();

        let first = next_frame(&mut rx).await;
        let second = next_frame(&mut rx).await;
        assert_eq!(first.device_ip, Ipv4Addr::new(10, 0, 0, 1));
        assert_eq!(second.device_ip, Ipv4Addr::new(10, 0, 0, 2));
        assert_eq!(second.sensor_status, [1, 1, 1]);

        assert!(server.stop().await);
    }

    #[tokio::test]
    async fn test_frame_split_across_writes() {
        let (server, mut rx, port) = started(test_config()).await;

        let mut client = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
        let frame = build_frame([10, 0, 0, 3], [0, 1, 0]);
        client.write_all(&[0xEE, 0xEE]).await.unwrap();
        client.write_all(&frame[..20]).await.unwrap();
        sleep(Duration::from_millis(50)).await;
        client.write_all(&frame[20..]).await.unwrap();

        let decoded = next_frame(&mut rx).await;
        assert_eq!(decoded.raw, frame);

        assert!(server.stop().await);
    }

    #[tokio::test]
    async fn test_stop_with_open_connections() {
        let (server, mut rx, port) = started(test_config()).await;

        // Neither client hangs up on its own, so both get force-closed.
        let mut a = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
        let mut b = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
        wait_for_connections(&server, 2).await;
        assert_eq!(
            server.connected_ips(),
            vec![IpAddr::V4(Ipv4Addr::LOCALHOST)]
        );

        assert!(server.stop().await);
        assert_eq!(server.state(), ServerState::Stopped);
        assert_eq!(server.status(), ServerStatus::stopped());
        assert!(server.connected_ips().is_empty());

        let events = drain(&mut rx);
        let last_status = events.iter().rev().find_map(|e| match e {
            ServerEvent::Status(s) => Some(s.clone()),
            _ => None,
        });
        assert_eq!(last_status, Some(ServerStatus::stopped()));
        let lines = logs(&events);
        assert_eq!(lines.iter().filter(|l| l.starts_with("Force close")).count(), 2);
        assert_eq!(lines.last(), Some(&"Server stopped"));

        let mut buf = [0u8; 8];
        assert!(matches!(a.read(&mut buf).await, Ok(0) | Err(_)));
        assert!(matches!(b.read(&mut buf).await, Ok(0) | Err(_)));

        // The port is free again.
        TcpListener::bind(("127.0.0.1", port)).await.unwrap();
    }

    #[tokio::test]
    async fn test_stop_waits_for_graceful_close() {
        let config = ServerConfig {
            close_grace_ms: 5000,
            ..test_config()
        };
        let (server, mut rx, port) = started(config).await;

        let mut client = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
        let peer = tokio::spawn(async move {
            let mut buf = [0u8; 8];
            // Hang up as soon as the server half-closes.
            while client.read(&mut buf).await.map(|n| n > 0).unwrap_or(false) {}
        });
        wait_for_connections(&server, 1).await;

        let started_at = Instant::now();
        assert!(server.stop().await);
        assert!(started_at.elapsed() < Duration::from_secs(2));
        peer.await.unwrap();

        let events = drain(&mut rx);
        assert!(!logs(&events).iter().any(|l| l.starts_with("Force close")));
    }

    #[tokio::test]
    async fn test_concurrent_stop_joins() {
        let (server, mut rx, port) = started(test_config()).await;
        let _client = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
        wait_for_connections(&server, 1).await;

        let (first, second) = tokio::join!(server.stop(), server.stop());
        assert!(first);
        assert!(second);
        assert_eq!(server.state(), ServerState::Stopped);

        let events = drain(&mut rx);
        assert_eq!(
            logs(&events).iter().filter(|l| **l == "Server stopped").count(),
            1
        );
    }

    #[tokio::test]
    async fn test_double_start_rejected() {
        let (server, mut rx, port) = started(test_config()).await;

        assert!(!server.start(0, "127.0.0.1").await);
        assert_eq!(server.status().port, Some(port));
        assert_eq!(server.state(), ServerState::Running);

        let events = drain(&mut rx);
        assert!(logs(&events).contains(&"Start ignored: already running"));

        assert!(server.stop().await);
    }

    #[tokio::test]
    async fn test_stop_when_not_running() {
        let (server, mut rx) = FrameServer::new(test_config());
        assert!(!server.stop().await);

        let events = drain(&mut rx);
        assert_eq!(
            events,
            vec![
                ServerEvent::Log("Stop ignored: server not running".to_string()),
                ServerEvent::Status(ServerStatus::stopped()),
            ]
        );
    }

    #[tokio::test]
    async fn test_restart_on_same_port() {
        let (server, _rx, port) = started(test_config()).await;
        assert!(server.stop().await);

        assert!(server.start(port, "127.0.0.1").await);
        assert_eq!(server.status().port, Some(port));
        assert!(server.stop().await);
    }

    #[tokio::test]
    async fn test_bind_failure_returns_to_stopped() {
        let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = taken.local_addr().unwrap().port();

        let (server, mut rx) = FrameServer::new(test_config());
        assert!(!server.start(port, "127.0.0.1").await);
        assert_eq!(server.state(), ServerState::Stopped);

        let events = drain(&mut rx);
        assert_eq!(
            events.last(),
            Some(&ServerEvent::Status(ServerStatus::stopped()))
        );

        assert!(server.start(0, "127.0.0.1").await);
        assert!(server.stop().await);
    }

    #[tokio::test]
    async fn test_dropped_server_releases_port() {
        let (server, mut rx, port) = started(test_config()).await;
        let mut client = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
        wait_for_connections(&server, 1).await;

        // A clone keeps the server alive.
        let other = server.clone();
        drop(server);
        assert_eq!(other.state(), ServerState::Running);
        drop(other);

        let mut buf = [0u8; 8];
        let read = timeout(Duration::from_secs(2), client.read(&mut buf))
            .await
            .unwrap();
        assert!(matches!(read, Ok(0) | Err(_)));

        timeout(Duration::from_secs(2), async {
            while TcpListener::bind(("127.0.0.1", port)).await.is_err() {
                sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        let events = drain(&mut rx);
        assert!(logs(&events).contains(&"Server handle dropped, shutting down"));
    }

    #[tokio::test]
    async fn test_idle_connection_is_closed() {
        let config = ServerConfig {
            idle_timeout_ms: 150,
            ..test_config()
        };
        let (server, mut rx, port) = started(config).await;

        let mut client = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
        let mut buf = [0u8; 8];
        let read = timeout(Duration::from_secs(2), client.read(&mut buf))
            .await
            .unwrap();
        assert!(matches!(read, Ok(0) | Err(_)));
        wait_for_connections(&server, 0).await;

        let events = drain(&mut rx);
        assert!(logs(&events).iter().any(|l| l.starts_with("Socket timeout")));
        assert!(server.stop().await);
    }
}
