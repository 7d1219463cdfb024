//! WebSocket push channel

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use signage_model::{DisplaySlug, InboundMessage, OutboundMessage};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, trace};

use crate::error::{Result, StreamError};
use crate::transport::{join_url, PushConnection, PushConnector};

/// Connects to `{push_url}/displays/{slug}`
#[derive(Debug, Clone)]
pub struct WsConnector {
    push_url: String,
}

impl WsConnector {
    pub fn new(push_url: impl Into<String>) -> Result<Self> {
        let push_url = push_url.into();
        url::Url::parse(&push_url)?;
        Ok(Self { push_url })
    }

    pub fn endpoint(&self, slug: &DisplaySlug) -> Result<url::Url> {
        join_url(&self.push_url, &format!("displays/{}", slug))
    }
}

#[async_trait]
impl PushConnector for WsConnector {
    async fn connect(&self, slug: &DisplaySlug) -> Result<Box<dyn PushConnection>> {
        let url = self.endpoint(slug)?;
        debug!("Opening push channel {}", url);
        let (stream, _response) = tokio_tungstenite::connect_async(url.as_str()).await?;
        Ok(Box::new(WsConnection { stream }))
    }
}

struct WsConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl PushConnection for WsConnection {
    async fn recv(&mut self) -> Option<Result<InboundMessage>> {
        loop {
            let frame = match self.stream.next().await? {
                Ok(frame) => frame,
                Err(e) => return Some(Err(e.into())),
            };

            match frame {
                Message::Text(text) => {
                    return Some(InboundMessage::decode(&text).map_err(StreamError::from))
                }
                Message::Binary(bytes) => {
                    return Some(serde_json::from_slice(&bytes).map_err(StreamError::from))
                }
                Message::Close(reason) => {
                    debug!("Push channel closed by peer: {:?}", reason);
                    return None;
                }
                // tungstenite answers pings itself
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {
                    trace!("Control frame");
                }
            }
        }
    }

    async fn send(&mut self, message: &OutboundMessage) -> Result<()> {
        let text = message.encode()?;
        self.stream.send(Message::Text(text)).await?;
        Ok(())
    }

    async fn close(&mut self) {
        if let Err(e) = self.stream.close(None).await {
            debug!("Error closing push channel: {}", e);
        }
    }
}
