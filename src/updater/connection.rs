//! Connection lifecycle for the update socket: connect, heartbeat,
//! fanout, and reconnect after a fixed delay.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at, sleep};
use tracing::{debug, info, warn};
use url::Url;

use super::{Connection, Connector, Topic, TopicRegistry};
use crate::consts::{HEARTBEAT_MESSAGE, UPDATER_PATH};
use crate::error::{Result, UpdaterError};

/// Timing knobs for [`ConnectionManager`].
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Interval between heartbeat frames.
    pub heartbeat_interval: Duration,
    /// Delay before each reconnection attempt.
    pub reconnect_delay: Duration,
    /// Consecutive failed attempts before giving up. `None` retries forever.
    pub max_reconnect_attempts: Option<u32>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(10),
            reconnect_delay: Duration::from_secs(1),
            max_reconnect_attempts: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// `connect` has not been called yet.
    Idle,
    Connecting,
    Connected,
    /// Waiting out the delay before the next attempt.
    Reconnecting,
    /// Retrying cannot help. `connect` is a no-op from here on.
    Failed(String),
    Disposed,
}

/// Build the updater endpoint from the backend base URL.
///
/// `http`/`https` become `ws`/`wss`, any path prefix on the backend is kept,
/// and `token` is passed as a query parameter for clients without cookies.
pub fn updater_url(backend: &Url, token: Option<&str>) -> Result<Url> {
    let mut url = backend.clone();
    let scheme = match backend.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => return Err(UpdaterError::UnsupportedScheme(other.to_string())),
    };
    url.set_scheme(scheme)
        .map_err(|_| UpdaterError::UnsupportedScheme(backend.scheme().to_string()))?;

    let path = format!("{}{}", backend.path().trim_end_matches('/'), UPDATER_PATH);
    url.set_path(&path);
    url.set_query(None);
    url.set_fragment(None);

    if let Some(token) = token {
        url.query_pairs_mut().append_pair("token", token);
    }
    Ok(url)
}

/// Owns the single update socket.
///
/// The run loop is spawned on the current tokio runtime by [`connect`] and
/// stops on [`dispose`] or when the manager is dropped.
///
/// [`connect`]: ConnectionManager::connect
/// [`dispose`]: ConnectionManager::dispose
pub struct ConnectionManager {
    shared: Arc<Shared>,
    running: Mutex<Option<Running>>,
}

struct Shared {
    registry: Arc<TopicRegistry>,
    connector: Arc<dyn Connector>,
    url: Url,
    config: ConnectionConfig,
    status: watch::Sender<ConnectionStatus>,
}

struct Running {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

#[derive(Debug, PartialEq, Eq)]
enum SessionEnd {
    Closed,
    Shutdown,
}

impl ConnectionManager {
    /// A zero heartbeat interval falls back to the default.
    pub fn new(
        registry: Arc<TopicRegistry>,
        connector: Arc<dyn Connector>,
        url: Url,
        mut config: ConnectionConfig,
    ) -> Self {
        if config.heartbeat_interval.is_zero() {
            warn!("heartbeat interval of zero ignored");
            config.heartbeat_interval = ConnectionConfig::default().heartbeat_interval;
        }
        let (status, _) = watch::channel(ConnectionStatus::Idle);
        Self {
            shared: Arc::new(Shared {
                registry,
                connector,
                url,
                config,
                status,
            }),
            running: Mutex::new(None),
        }
    }

    pub fn registry(&self) -> &Arc<TopicRegistry> {
        &self.shared.registry
    }

    /// Start the run loop. No-op if it is already running, or if a
    /// permanent failure was recorded.
    pub fn connect(&self) {
        let mut running = self.running.lock().unwrap();
        if running.is_some() {
            return;
        }
        if matches!(
            *self.shared.status.borrow(),
            ConnectionStatus::Failed(_) | ConnectionStatus::Disposed
        ) {
            return;
        }
        if !matches!(self.shared.url.scheme(), "ws" | "wss") {
            let err = UpdaterError::UnsupportedScheme(self.shared.url.scheme().to_string());
            warn!(error = %err, "not connecting updater");
            self.shared.set_status(ConnectionStatus::Failed(err.to_string()));
            return;
        }

        let (shutdown, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(Arc::clone(&self.shared).run(shutdown_rx));
        *running = Some(Running { shutdown, task });
    }

    /// Close the socket and stop reconnecting. The manager cannot be
    /// connected again afterwards.
    pub async fn dispose(&self) {
        let running = self.running.lock().unwrap().take();
        if let Some(Running { shutdown, task }) = running {
            let _ = shutdown.send(());
            let _ = task.await;
        }
        self.shared.set_status(ConnectionStatus::Disposed);
    }

    pub fn status(&self) -> ConnectionStatus {
        self.shared.status.borrow().clone()
    }

    pub fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.shared.status.subscribe()
    }
}

impl Shared {
    fn set_status(&self, status: ConnectionStatus) {
        self.status.send_replace(status);
    }

    async fn run(self: Arc<Self>, mut shutdown: oneshot::Receiver<()>) {
        let mut failures: u32 = 0;
        self.set_status(ConnectionStatus::Connecting);

        loop {
            let attempt = tokio::select! {
                _ = &mut shutdown => break,
                attempt = self.connector.connect(&self.url) => attempt,
            };

            match attempt {
                Ok(connection) => {
                    failures = 0;
                    if self.session(connection, &mut shutdown).await == SessionEnd::Shutdown {
                        break;
                    }
                }
                Err(e) if e.is_permanent() => {
                    warn!(error = %e, "updater connection refused, giving up");
                    self.set_status(ConnectionStatus::Failed(e.to_string()));
                    return;
                }
                Err(e) => {
                    failures += 1;
                    if let Some(max) = self.config.max_reconnect_attempts
                        && failures >= max
                    {
                        warn!(error = %e, attempts = failures, "updater unreachable, giving up");
                        self.set_status(ConnectionStatus::Failed(format!(
                            "gave up after {failures} attempts: {e}"
                        )));
                        return;
                    }
                    warn!(error = %e, "updater connection failed");
                }
            }

            self.set_status(ConnectionStatus::Reconnecting);
            debug!(delay = ?self.config.reconnect_delay, "reconnecting updater");
            tokio::select! {
                _ = &mut shutdown => break,
                _ = sleep(self.config.reconnect_delay) => {}
            }
            self.set_status(ConnectionStatus::Connecting);
        }

        self.set_status(ConnectionStatus::Disposed);
    }

    async fn session(
        &self,
        connection: Connection,
        shutdown: &mut oneshot::Receiver<()>,
    ) -> SessionEnd {
        let Connection {
            mut sink,
            mut stream,
        } = connection;

        self.set_status(ConnectionStatus::Connected);
        info!(url = %redacted(&self.url), "updater connected");

        // Anything may have changed while we were away.
        let replayed = self.registry.notify_all();
        debug!(callbacks = replayed, "replayed updates after connect");

        let period = self.config.heartbeat_interval;
        let mut heartbeat = interval_at(Instant::now() + period, period);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = &mut *shutdown => {
                    let _ = sink.close().await;
                    info!("updater closed");
                    return SessionEnd::Shutdown;
                }
                frame = stream.next() => match frame {
                    Some(Ok(text)) => self.dispatch(&text),
                    Some(Err(e)) => {
                        info!(error = %e, "updater disconnected");
                        return SessionEnd::Closed;
                    }
                    None => {
                        info!("updater stream ended");
                        return SessionEnd::Closed;
                    }
                },
                _ = heartbeat.tick() => {
                    debug!("sending heartbeat");
                    if let Err(e) = sink.send(HEARTBEAT_MESSAGE.to_string()).await {
                        info!(error = %e, "heartbeat failed, connection lost");
                        return SessionEnd::Closed;
                    }
                }
            }
        }
    }

    fn dispatch(&self, frame: &str) {
        match Topic::from_frame(frame) {
            Ok(topic) => {
                let invoked = self.registry.notify(topic);
                debug!(?topic, callbacks = invoked, "update received");
            }
            Err(e) => warn!(frame, error = %e, "discarding malformed update frame"),
        }
    }
}

/// The token travels in the query string; keep it out of the logs.
fn redacted(url: &Url) -> String {
    let mut url = url.clone();
    url.set_query(None);
    url.to_string()
}
