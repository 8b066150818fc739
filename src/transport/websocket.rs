//! WebSocket transport implementation.
//!
//! The node runs a plain WebSocket server and exchanges one text message per
//! command or reply.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use crate::error::{Error, Result};
use crate::transport::{Inbound, Transport};

/// Default timeout for the TCP connect and WebSocket handshake.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Time allowed for the close handshake on disconnect.
const CLOSE_TIMEOUT: Duration = Duration::from_millis(500);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Configuration for WebSocket transport.
#[derive(Debug, Clone)]
pub struct WebSocketConfig {
    /// Timeout for establishing the connection.
    pub connect_timeout: Duration,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl WebSocketConfig {
    /// Creates a new WebSocket configuration with default settings.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Sets the connect timeout.
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

/// WebSocket transport for sensor node communication.
///
/// The socket is split: the write half stays here, the read half moves into
/// a background task that feeds the inbound channel.
pub struct WebSocketTransport {
    config: WebSocketConfig,
    writer: Option<SplitSink<WsStream, Message>>,
    read_task: Option<JoinHandle<()>>,
}

impl Default for WebSocketTransport {
    fn default() -> Self {
        Self::new(WebSocketConfig::new())
    }
}

impl WebSocketTransport {
    /// Creates a new WebSocket transport with the given configuration.
    #[must_use]
    pub const fn new(config: WebSocketConfig) -> Self {
        Self {
            config,
            writer: None,
            read_task: None,
        }
    }

    /// Returns true while the socket is open.
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        self.writer.is_some()
    }

    /// Runs the read loop, forwarding messages until the connection ends.
    async fn run_read_loop(mut reader: SplitStream<WsStream>, inbound: mpsc::Sender<Inbound>) {
        let reason = loop {
            let text = match reader.next().await {
                Some(Ok(Message::Text(text))) => text.as_str().to_owned(),
                Some(Ok(Message::Binary(data))) => String::from_utf8_lossy(&data).into_owned(),
                Some(Ok(Message::Close(frame))) => {
                    tracing::debug!("close frame received: {:?}", frame);
                    break "closed by peer".to_owned();
                }
                // Ping/pong are answered by tungstenite
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    tracing::error!("websocket read error: {}", e);
                    break e.to_string();
                }
                None => {
                    tracing::debug!("websocket stream ended");
                    break "stream ended".to_owned();
                }
            };

            tracing::trace!("received {:?}", text);
            if inbound.send(Inbound::Message(text)).await.is_err() {
                tracing::debug!("inbound receiver dropped");
                return;
            }
        };

        let _ = inbound.send(Inbound::Closed { reason }).await;
    }
}

impl Transport for WebSocketTransport {
    fn connect(
        &mut self,
        url: String,
        inbound: mpsc::Sender<Inbound>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            if self.writer.is_some() {
                tracing::debug!("replacing open connection");
                self.disconnect().await?;
            }

            tracing::info!("connecting to {}", url);

            let timeout = self.config.connect_timeout;
            let result = tokio::time::timeout(timeout, connect_async(url.as_str())).await;
            let stream = match result {
                Ok(Ok((stream, _response))) => stream,
                Ok(Err(e)) => {
                    return Err(Error::Connect {
                        url,
                        reason: e.to_string(),
                    });
                }
                Err(_) => {
                    return Err(Error::Timeout {
                        timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                    });
                }
            };

            let (writer, reader) = stream.split();
            self.writer = Some(writer);
            self.read_task = Some(tokio::spawn(Self::run_read_loop(reader, inbound)));

            tracing::info!("connected to {}", url);
            Ok(())
        })
    }

    fn disconnect(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            if let Some(task) = self.read_task.take() {
                task.abort();
            }
            if let Some(mut writer) = self.writer.take() {
                tracing::info!("disconnecting websocket");
                // The peer may already be gone
                if let Ok(Err(e)) = tokio::time::timeout(CLOSE_TIMEOUT, writer.close()).await {
                    tracing::debug!("close handshake failed: {}", e);
                }
            }
            Ok(())
        })
    }

    fn send(&mut self, text: String) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            let writer = self.writer.as_mut().ok_or(Error::NotConnected)?;

            tracing::trace!("sending {:?}", text);
            writer
                .send(Message::Text(text.clone().into()))
                .await
                .map_err(|e| Error::Send {
                    message: text,
                    reason: e.to_string(),
                })
        })
    }
}

impl Drop for WebSocketTransport {
    fn drop(&mut self) {
        if let Some(task) = self.read_task.take() {
            task.abort();
        }
    }
}
