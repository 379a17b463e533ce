//! Push-channel WebSocket connection and frame transport

use anyhow::{Context, Result};
use futures::{SinkExt, StreamExt};
use tokio_tungstenite::{connect_async, tungstenite::Message};

use super::frames;

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

pub struct RelaySocket {
    stream: WsStream,
}

impl RelaySocket {
    /// Connect to the push endpoint for the given server base URL.
    ///
    /// Identity travels in the query string; no further auth handshake on the
    /// socket itself.
    pub async fn connect(server_url: &str, user_id: &str) -> Result<Self> {
        let ws_base = server_url
            .replace("https://", "wss://")
            .replace("http://", "ws://");
        let ws_url = format!(
            "{}/socket.io/websocket?userId={}",
            ws_base.trim_end_matches('/'),
            user_id
        );

        tracing::info!("Connecting WebSocket to {}", ws_url);

        let (stream, response) = connect_async(&ws_url)
            .await
            .context("WebSocket connection failed")?;

        tracing::info!("WebSocket connected (status={})", response.status());

        Ok(Self { stream })
    }

    /// Send a text frame.
    pub async fn send_text(&mut self, msg: &str) -> Result<()> {
        tracing::debug!("WS send: {}", msg);
        self.stream
            .send(Message::Text(msg.to_string()))
            .await
            .context("Failed to send WebSocket message")
    }

    /// Receive the next text frame, ignoring pings/pongs.
    ///
    /// Event frames that carry an ack ID are acked automatically; without
    /// acks the server retries the event and blocks newer ones behind it.
    /// Returns `None` when the server closes the connection.
    pub async fn recv_frame(&mut self) -> Result<Option<String>> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    tracing::debug!("WS recv: {}", text);

                    if let Some(ack_id) = frames::event_ack_id(&text) {
                        let ack = frames::encode_ack(ack_id);
                        if let Err(e) = self.stream.send(Message::Text(ack)).await {
                            tracing::warn!("Failed to send event ack: {:#}", e);
                        }
                    }

                    return Ok(Some(text));
                }
                Some(Ok(Message::Ping(data))) => {
                    self.stream
                        .send(Message::Pong(data))
                        .await
                        .context("Failed to send pong")?;
                }
                Some(Ok(Message::Close(frame))) => {
                    tracing::info!("WebSocket closed: {:?}", frame);
                    return Ok(None);
                }
                Some(Ok(other)) => {
                    tracing::debug!("WS frame (ignored): {:?}", other);
                }
                Some(Err(e)) => {
                    return Err(e).context("WebSocket receive error");
                }
                None => {
                    return Ok(None);
                }
            }
        }
    }
}
