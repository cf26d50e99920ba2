//! Session with one running mpv instance over its JSON IPC endpoint.
//!
//! ```text
//!   Session::connect() / Session::attach()
//!         │
//!         ├── writer_task   ← encoded Command lines via mpsc → socket
//!         └── reader_task   ← raw reads → LineBuffer → decode
//!                                ├── property-change / reply → StateManager
//!                                └── end-file               → SessionEvent channel
//! ```
//!
//! A session that fails to connect is *degraded*: it exists, reports
//! `is_connected() == false`, and refuses sends.  Nothing here is fatal.

use deck_proto::protocol::{self, Command, EngineEvent, Inbound, LineBuffer, Property};
use deck_proto::state::StateManager;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[cfg(unix)]
use tokio::net::UnixStream;

#[cfg(windows)]
use tokio::net::windows::named_pipe::{ClientOptions, NamedPipeClient};

const READ_CHUNK: usize = 4096;
const OUTBOUND_CAPACITY: usize = 64;
/// Pause between reads once the peer has closed, so the task does not spin.
const EOF_BACKOFF: Duration = Duration::from_millis(10);
/// Bound on joining each I/O task during shutdown.
const JOIN_BOUND: Duration = Duration::from_millis(100);
const NODE_POLL: Duration = Duration::from_millis(50);

/// Notifications the reader task cannot act on itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    EndOfFile { session: u64 },
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session {0} is not connected")]
    NotConnected(u64),
    #[error("session {0}: outbound queue is full")]
    QueueFull(u64),
    #[error("session {0}: writer task has stopped")]
    WriterGone(u64),
}

/// Everything a session needs from its owner.
#[derive(Clone)]
pub struct SessionWiring {
    pub id: u64,
    pub state: Arc<StateManager>,
    pub events: mpsc::Sender<SessionEvent>,
}

#[derive(Debug, Clone, Copy)]
pub struct ConnectTimeouts {
    /// How long the socket node may take to appear.
    pub startup: Duration,
    pub connect: Duration,
}

pub struct Session {
    id: u64,
    socket_node: Option<PathBuf>,
    connected: Arc<AtomicBool>,
    observed: Vec<Property>,
    outbound: Option<mpsc::Sender<String>>,
    stop: CancellationToken,
    reader: Option<JoinHandle<()>>,
    writer: Option<JoinHandle<()>>,
}

impl Session {
    /// Wait for the endpoint, connect and start the I/O tasks.
    /// Returns a degraded session on any failure.
    pub async fn connect(endpoint: &Path, wiring: SessionWiring, timeouts: ConnectTimeouts) -> Self {
        let node = socket_node_for(endpoint);
        match open_stream(endpoint, timeouts).await {
            Ok(stream) => {
                info!("session {}: connected to {:?}", wiring.id, endpoint);
                Self::attach(stream, node, wiring)
            }
            Err(e) => {
                warn!("session {}: connect to {:?} failed: {:#}", wiring.id, endpoint, e);
                let mut session = Self::degraded(wiring.id);
                session.socket_node = node;
                session
            }
        }
    }

    /// Start the reader and writer over an already-open stream and subscribe
    /// to the tracked properties.
    pub fn attach<S>(stream: S, socket_node: Option<PathBuf>, wiring: SessionWiring) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (read_half, write_half) = tokio::io::split(stream);
        let connected = Arc::new(AtomicBool::new(true));
        let stop = CancellationToken::new();
        let (tx, rx) = mpsc::channel::<String>(OUTBOUND_CAPACITY);

        let writer = tokio::spawn(writer_task(write_half, rx, connected.clone(), wiring.id));
        let reader = tokio::spawn(reader_task(
            read_half,
            wiring.clone(),
            connected.clone(),
            stop.clone(),
        ));

        let mut session = Self {
            id: wiring.id,
            socket_node,
            connected,
            observed: Vec::with_capacity(Property::OBSERVED.len()),
            outbound: Some(tx),
            stop,
            reader: Some(reader),
            writer: Some(writer),
        };

        for prop in Property::OBSERVED {
            match session.send(&Command::ObserveProperty(prop)) {
                Ok(()) => session.observed.push(prop),
                Err(e) => warn!("session {}: observe {} failed: {}", session.id, prop.name(), e),
            }
        }
        if let Err(e) = session.send(&Command::GetProperty(Property::Volume)) {
            warn!("session {}: volume query failed: {}", session.id, e);
        }
        session
    }

    /// A session with no connection behind it.
    pub fn degraded(id: u64) -> Self {
        Self {
            id,
            socket_node: None,
            connected: Arc::new(AtomicBool::new(false)),
            observed: Vec::new(),
            outbound: None,
            stop: CancellationToken::new(),
            reader: None,
            writer: None,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    pub fn observed(&self) -> &[Property] {
        &self.observed
    }

    /// Queue one command for the writer task without waiting.
    pub fn send(&self, command: &Command) -> Result<(), SessionError> {
        let tx = match &self.outbound {
            Some(tx) if self.is_connected() => tx,
            _ => return Err(SessionError::NotConnected(self.id)),
        };
        match tx.try_send(command.encode()) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                warn!("session {}: dropping {} (queue full)", self.id, command.verb());
                Err(SessionError::QueueFull(self.id))
            }
            Err(TrySendError::Closed(_)) => {
                warn!("session {}: writer gone, marking degraded", self.id);
                self.connected.store(false, Ordering::Relaxed);
                Err(SessionError::WriterGone(self.id))
            }
        }
    }

    /// Stop both tasks, waiting a bounded time for each, and remove the
    /// socket node.  Lines already queued are flushed if the writer gets to
    /// them within the bound.
    pub async fn shutdown(&mut self) {
        self.stop.cancel();
        self.outbound.take();

        for (name, handle) in [("writer", self.writer.take()), ("reader", self.reader.take())] {
            let Some(mut handle) = handle else { continue };
            if tokio::time::timeout(JOIN_BOUND, &mut handle).await.is_err() {
                warn!("session {}: {} did not stop in time, aborting", self.id, name);
                handle.abort();
            }
        }

        self.connected.store(false, Ordering::Relaxed);
        self.remove_socket_node();
        debug!("session {}: shut down", self.id);
    }

    fn remove_socket_node(&mut self) {
        let Some(path) = self.socket_node.take() else {
            return;
        };
        match std::fs::remove_file(&path) {
            Ok(()) => debug!("session {}: removed {:?}", self.id, path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("session {}: could not remove {:?}: {}", self.id, path, e),
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.stop.cancel();
        if let Some(handle) = self.reader.take() {
            handle.abort();
        }
        if let Some(handle) = self.writer.take() {
            handle.abort();
        }
        self.remove_socket_node();
    }
}

// ── transport ─────────────────────────────────────────────────────────────────

#[cfg(unix)]
fn socket_node_for(endpoint: &Path) -> Option<PathBuf> {
    Some(endpoint.to_path_buf())
}

#[cfg(windows)]
fn socket_node_for(_endpoint: &Path) -> Option<PathBuf> {
    None
}

#[cfg(unix)]
async fn open_stream(endpoint: &Path, timeouts: ConnectTimeouts) -> anyhow::Result<UnixStream> {
    let deadline = tokio::time::Instant::now() + timeouts.startup;
    while !endpoint.exists() {
        if tokio::time::Instant::now() >= deadline {
            anyhow::bail!("ipc socket did not appear within {:?}", timeouts.startup);
        }
        tokio::time::sleep(NODE_POLL).await;
    }

    let stream = tokio::time::timeout(timeouts.connect, UnixStream::connect(endpoint))
        .await
        .map_err(|_| anyhow::anyhow!("connect timed out after {:?}", timeouts.connect))??;
    Ok(stream)
}

#[cfg(windows)]
async fn open_stream(endpoint: &Path, timeouts: ConnectTimeouts) -> anyhow::Result<NamedPipeClient> {
    let pipe_path = format!(r"\\.\pipe\{}", endpoint.display());
    let deadline = tokio::time::Instant::now() + timeouts.startup + timeouts.connect;
    loop {
        match ClientOptions::new().open(&pipe_path) {
            Ok(client) => return Ok(client),
            Err(e) if tokio::time::Instant::now() >= deadline => return Err(e.into()),
            Err(_) => tokio::time::sleep(NODE_POLL).await,
        }
    }
}

// ── writer task ───────────────────────────────────────────────────────────────

async fn writer_task<W>(
    mut writer: W,
    mut rx: mpsc::Receiver<String>,
    connected: Arc<AtomicBool>,
    id: u64,
) where
    W: AsyncWrite + Unpin,
{
    while let Some(line) = rx.recv().await {
        debug!("session {}: send {}", id, line.trim_end());
        let written = async {
            writer.write_all(line.as_bytes()).await?;
            writer.flush().await
        }
        .await;
        if let Err(e) = written {
            warn!("session {}: write error: {}", id, e);
            connected.store(false, Ordering::Relaxed);
            break;
        }
    }
    debug!("session {}: writer exiting", id);
}

// ── reader task ───────────────────────────────────────────────────────────────

async fn reader_task<R>(
    mut reader: R,
    wiring: SessionWiring,
    connected: Arc<AtomicBool>,
    stop: CancellationToken,
) where
    R: AsyncRead + Unpin,
{
    let mut chunk = [0u8; READ_CHUNK];
    let mut lines = LineBuffer::new();

    loop {
        let read = tokio::select! {
            _ = stop.cancelled() => break,
            read = reader.read(&mut chunk) => read,
        };

        match read {
            Ok(0) => {
                if connected.swap(false, Ordering::Relaxed) {
                    info!("session {}: engine closed the connection", wiring.id);
                    wiring.state.request_redraw();
                }
                tokio::select! {
                    _ = stop.cancelled() => break,
                    _ = tokio::time::sleep(EOF_BACKOFF) => {}
                }
            }
            Ok(n) => {
                lines.extend(&chunk[..n]);
                while let Some(line) = lines.next_line() {
                    let msg = match protocol::decode(&line) {
                        Ok(msg) => msg,
                        Err(e) => {
                            debug!("session {}: discarding '{}': {}", wiring.id, line, e);
                            continue;
                        }
                    };
                    if let Some(event) = apply_inbound(msg, wiring.id, &wiring.state) {
                        if wiring.events.send(event).await.is_err() {
                            debug!("session {}: event receiver gone", wiring.id);
                        }
                    }
                }
            }
            Err(e) => {
                warn!("session {}: read error: {}", wiring.id, e);
                connected.store(false, Ordering::Relaxed);
                break;
            }
        }
    }
    debug!("session {}: reader exiting", wiring.id);
}

/// Fold one inbound message into shared state; returns the event the main
/// loop must handle, if any.
fn apply_inbound(msg: Inbound, session: u64, state: &StateManager) -> Option<SessionEvent> {
    match &msg {
        Inbound::Event(EngineEvent::EndOfFile { reason }) => {
            info!("session {}: end of file (reason={:?})", session, reason);
        }
        Inbound::Event(EngineEvent::Other(name)) => {
            debug!("session {}: event {}", session, name);
        }
        _ => {}
    }
    state
        .apply_inbound(&msg)
        .then_some(SessionEvent::EndOfFile { session })
}

#[cfg(test)]
mod tests {
    use super::*;
    use deck_proto::protocol::PropertyValue;
    use tokio::io::DuplexStream;

    fn wiring(id: u64) -> (SessionWiring, Arc<StateManager>, mpsc::Receiver<SessionEvent>) {
        let state = Arc::new(StateManager::default());
        let (tx, rx) = mpsc::channel(16);
        let wiring = SessionWiring {
            id,
            state: state.clone(),
            events: tx,
        };
        (wiring, state, rx)
    }

    async fn read_lines(peer: &mut DuplexStream, count: usize) -> Vec<String> {
        let mut buf = LineBuffer::new();
        let mut out = Vec::new();
        let mut chunk = [0u8; 512];
        while out.len() < count {
            let n = tokio::time::timeout(Duration::from_secs(1), peer.read(&mut chunk))
                .await
                .expect("engine peer read timed out")
                .unwrap();
            assert!(n > 0, "session closed its end");
            buf.extend(&chunk[..n]);
            while let Some(line) = buf.next_line() {
                out.push(line);
            }
        }
        out
    }

    async fn wait_until(mut cond: impl FnMut() -> bool) {
        for _ in 0..200 {
            if cond() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not reached");
    }

    #[tokio::test]
    async fn test_attach_subscribes_and_queries_volume() {
        let (ours, mut peer) = tokio::io::duplex(4096);
        let (wiring, _state, _rx) = wiring(1);
        let session = Session::attach(ours, None, wiring);

        assert!(session.is_connected());
        assert_eq!(session.observed(), &Property::OBSERVED);

        let lines = read_lines(&mut peer, 5).await;
        assert_eq!(lines[0], r#"{"command":["observe_property",1,"pause"]}"#);
        assert_eq!(lines[1], r#"{"command":["observe_property",2,"time-pos"]}"#);
        assert_eq!(lines[2], r#"{"command":["observe_property",3,"duration"]}"#);
        assert_eq!(lines[3], r#"{"command":["observe_property",4,"volume"]}"#);
        assert_eq!(lines[4], r#"{"command":["get_property","volume"]}"#);
    }

    #[tokio::test]
    async fn test_property_changes_update_state() {
        let (ours, mut peer) = tokio::io::duplex(4096);
        let (wiring, state, _rx) = wiring(1);
        let _session = Session::attach(ours, None, wiring);

        peer.write_all(
            b"{\"event\":\"property-change\",\"id\":2,\"name\":\"time-pos\",\"data\":41.5}\n\
              {\"event\":\"property-change\",\"id\":3,\"name\":\"duration\",\"data\":200.0}\n\
              {\"event\":\"property-change\",\"id\":1,\"name\":\"pause\",\"data\":true}\n\
              {\"event\":\"property-change\",\"id\":1,\"name\":\"pause\",\"data\":7}\n",
        )
        .await
        .unwrap();

        wait_until(|| state.read(|s| s.is_paused && s.duration_secs == 200.0)).await;
        assert_eq!(state.read(|s| s.position_secs), 41.5);

        peer.write_all(b"{\"event\":\"property-change\",\"name\":\"time-pos\",\"data\":null}\n")
            .await
            .unwrap();
        wait_until(|| state.read(|s| s.position_secs == 0.0)).await;
    }

    #[tokio::test]
    async fn test_end_of_file_split_across_reads_dispatches_once() {
        let (ours, mut peer) = tokio::io::duplex(4096);
        let (wiring, _state, mut rx) = wiring(9);
        let _session = Session::attach(ours, None, wiring);

        peer.write_all(br#"{"event":"end-"#).await.unwrap();
        peer.flush().await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(rx.try_recv().is_err());

        peer.write_all(b"file\",\"reason\":\"eof\"}\n").await.unwrap();
        let event = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap();
        assert_eq!(event, Some(SessionEvent::EndOfFile { session: 9 }));

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_malformed_line_is_skipped() {
        let (ours, mut peer) = tokio::io::duplex(4096);
        let (wiring, state, _rx) = wiring(1);
        let session = Session::attach(ours, None, wiring);

        peer.write_all(b"{not json\n{\"event\":\"property-change\",\"name\":\"duration\",\"data\":12}\n")
            .await
            .unwrap();
        wait_until(|| state.read(|s| s.duration_secs == 12.0)).await;
        assert!(session.is_connected());
    }

    #[test]
    fn test_volume_reply_accepted_only_in_range() {
        let state = StateManager::default();
        let reply = |error: &str, v: f64| Inbound::Reply {
            error: error.to_string(),
            data: Some(PropertyValue::Number(v)),
        };

        assert_eq!(apply_inbound(reply("success", 64.0), 1, &state), None);
        assert_eq!(state.read(|s| s.volume), 64.0);

        apply_inbound(reply("success", 130.0), 1, &state);
        apply_inbound(reply("property unavailable", 10.0), 1, &state);
        assert_eq!(state.read(|s| s.volume), 64.0);
    }

    #[tokio::test]
    async fn test_peer_close_degrades_session() {
        let (ours, peer) = tokio::io::duplex(4096);
        let (wiring, _state, _rx) = wiring(3);
        let session = Session::attach(ours, None, wiring);

        drop(peer);
        wait_until(|| !session.is_connected()).await;
        assert!(matches!(
            session.send(&Command::CyclePause),
            Err(SessionError::NotConnected(3))
        ));
    }

    #[tokio::test]
    async fn test_shutdown_flushes_queue_and_removes_node() {
        let dir = tempfile::tempdir().unwrap();
        let node = dir.path().join("engine.sock");
        std::fs::write(&node, b"").unwrap();

        let (ours, mut peer) = tokio::io::duplex(4096);
        let (wiring, _state, _rx) = wiring(4);
        let mut session = Session::attach(ours, Some(node.clone()), wiring);
        session.send(&Command::Quit).unwrap();
        session.shutdown().await;

        assert!(!session.is_connected());
        assert!(!node.exists());
        let lines = read_lines(&mut peer, 6).await;
        assert_eq!(lines[5], r#"{"command":["quit"]}"#);
    }

    #[tokio::test]
    async fn test_degraded_session_refuses_sends() {
        let session = Session::degraded(7);
        assert!(!session.is_connected());
        assert!(session.observed().is_empty());
        assert!(matches!(
            session.send(&Command::SetVolume(10.0)),
            Err(SessionError::NotConnected(7))
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_connect_times_out_to_degraded() {
        let dir = tempfile::tempdir().unwrap();
        let endpoint = dir.path().join("missing.sock");
        let (wiring, _state, _rx) = wiring(5);
        let timeouts = ConnectTimeouts {
            startup: Duration::from_millis(60),
            connect: Duration::from_millis(60),
        };
        let session = Session::connect(&endpoint, wiring, timeouts).await;
        assert!(!session.is_connected());
        assert_eq!(session.id(), 5);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_connect_over_unix_socket() {
        let dir = tempfile::tempdir().unwrap();
        let endpoint = dir.path().join("engine.sock");
        let listener = tokio::net::UnixListener::bind(&endpoint).unwrap();
        let (wiring, _state, _rx) = wiring(6);
        let timeouts = ConnectTimeouts {
            startup: Duration::from_secs(1),
            connect: Duration::from_secs(1),
        };

        let (session, accepted) =
            tokio::join!(Session::connect(&endpoint, wiring, timeouts), listener.accept());
        let (mut engine, _) = accepted.unwrap();
        assert!(session.is_connected());

        let mut chunk = [0u8; 64];
        let n = engine.read(&mut chunk).await.unwrap();
        assert!(std::str::from_utf8(&chunk[..n]).unwrap().starts_with("{\"command\""));

        let mut session = session;
        session.shutdown().await;
        assert!(!endpoint.exists());
    }
}
