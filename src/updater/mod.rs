//! Live update notifier.
//!
//! One socket to the backend's `/ws/updater` endpoint carries coarse
//! [`Topic`] notifications. The [`ConnectionManager`] fans each one out
//! through the [`TopicRegistry`], and every [`Updater`] cell observing
//! that topic re-runs its fetch.
//!
//! ```text
//! /ws/updater ──▶ ConnectionManager ──▶ TopicRegistry ──▶ Updater::fetch ──▶ Observer
//! ```

pub mod cell;
pub mod connection;
pub mod mock;
pub mod registry;
pub mod topic;
pub mod ws;

pub use cell::{Observer, Updater};
pub use connection::{ConnectionConfig, ConnectionManager, ConnectionStatus, updater_url};
pub use registry::{Callback, CallbackId, TopicRegistry};
pub use topic::Topic;

use async_trait::async_trait;
use futures::{Sink, Stream};
use std::pin::Pin;
use url::Url;

use crate::error::{Result, UpdaterError};

/// Outbound half of an open socket. Items are text frames.
pub type FrameSink = Pin<Box<dyn Sink<String, Error = UpdaterError> + Send>>;

/// Inbound half of an open socket. Yields text frames and ends when the
/// peer closes.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// An open socket, already split into its two directions.
pub struct Connection {
    pub sink: FrameSink,
    pub stream: FrameStream,
}

/// Opens sockets. The real implementation is [`ws::WsConnector`];
/// tests script one with [`mock::MockConnector`].
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, url: &Url) -> Result<Connection>;
}
