use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::channel::mpsc;
use futures::{StreamExt, sink};
use url::Url;

use super::{Connection, Connector};
use crate::error::{Result, UpdaterError};

/// A scripted socket for tests. Every successful `connect` opens a new
/// session the test can push frames into, close, and inspect.
#[derive(Clone, Default)]
pub struct MockConnector {
    state: Arc<Mutex<MockState>>,
}

#[derive(Default)]
struct MockState {
    attempts: usize,
    failures: Vec<UpdaterError>,
    sessions: Vec<Session>,
}

struct Session {
    inbound: Option<mpsc::UnboundedSender<Result<String>>>,
    sent: Arc<Mutex<Vec<String>>>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `connect` calls fail, in order.
    pub fn fail_next(&self, errors: Vec<UpdaterError>) {
        self.state.lock().unwrap().failures.extend(errors);
    }

    /// Total `connect` calls, successful or not.
    pub fn attempts(&self) -> usize {
        self.state.lock().unwrap().attempts
    }

    /// Successful connections so far.
    pub fn sessions(&self) -> usize {
        self.state.lock().unwrap().sessions.len()
    }

    /// Deliver a text frame on the latest session.
    /// Returns false if there is no open session.
    pub fn push(&self, frame: &str) -> bool {
        let state = self.state.lock().unwrap();
        state
            .sessions
            .last()
            .and_then(|s| s.inbound.as_ref())
            .is_some_and(|tx| tx.unbounded_send(Ok(frame.to_string())).is_ok())
    }

    /// Close the latest session from the server side.
    pub fn close(&self) {
        let mut state = self.state.lock().unwrap();
        if let Some(session) = state.sessions.last_mut() {
            session.inbound = None;
        }
    }

    /// Frames the client sent on session `index` (0-based).
    pub fn sent(&self, index: usize) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .sessions
            .get(index)
            .map(|s| s.sent.lock().unwrap().clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, _url: &Url) -> Result<Connection> {
        let mut state = self.state.lock().unwrap();
        state.attempts += 1;
        if !state.failures.is_empty() {
            return Err(state.failures.remove(0));
        }

        let (tx, rx) = mpsc::unbounded();
        let sent = Arc::new(Mutex::new(Vec::new()));
        state.sessions.push(Session {
            inbound: Some(tx),
            sent: Arc::clone(&sent),
        });

        // Sends fail once the server side has closed, like a real socket.
        let state_ref = Arc::clone(&self.state);
        let index = state.sessions.len() - 1;
        let sink = sink::unfold((), move |(), frame: String| {
            let state = Arc::clone(&state_ref);
            let sent = Arc::clone(&sent);
            async move {
                let open = state.lock().unwrap().sessions[index].inbound.is_some();
                if !open {
                    return Err(UpdaterError::ConnectionClosed);
                }
                sent.lock().unwrap().push(frame);
                Ok(())
            }
        });

        Ok(Connection {
            sink: Box::pin(sink),
            stream: rx.boxed(),
        })
    }
}
