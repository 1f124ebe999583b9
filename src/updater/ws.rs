use async_trait::async_trait;
use futures::{SinkExt, StreamExt, future};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{self, Message};
use tracing::debug;
use url::Url;

use super::{Connection, Connector};
use crate::error::{Result, UpdaterError};

/// Connects with tokio-tungstenite. `wss://` uses the platform roots.
#[derive(Debug, Default, Clone, Copy)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, url: &Url) -> Result<Connection> {
        let (ws_stream, response) = connect_async(url.as_str())
            .await
            .map_err(|e| match e {
                tungstenite::Error::Http(response) => {
                    UpdaterError::Rejected(response.status().as_u16())
                }
                other => UpdaterError::WebSocket(other),
            })?;

        debug!(status = ?response.status(), "websocket handshake complete");

        let (write, read) = ws_stream.split();

        let sink = write
            .sink_map_err(UpdaterError::from)
            .with(|text: String| future::ready(Ok::<_, UpdaterError>(Message::Text(text.into()))));

        // Pings are answered by tungstenite itself; only text reaches the caller.
        let stream = read.filter_map(|msg| {
            future::ready(match msg {
                Ok(Message::Text(text)) => Some(Ok(text.as_str().to_owned())),
                Ok(Message::Close(frame)) => {
                    debug!(?frame, "received close frame");
                    Some(Err(UpdaterError::ConnectionClosed))
                }
                Ok(_) => None,
                Err(e) => Some(Err(UpdaterError::WebSocket(e))),
            })
        });

        Ok(Connection {
            sink: Box::pin(sink),
            stream: Box::pin(stream),
        })
    }
}
