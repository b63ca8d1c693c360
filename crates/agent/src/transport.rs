// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Websocket transport: JSON text frames carrying `{action, data}`
//! envelopes in both directions.

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::COOKIE;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use stoker_protocol::{decode, encode, Message, ProtocolError};

use crate::config::AgentConfig;
use crate::state;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("invalid cookie header: {0}")]
    Cookie(#[from] tokio_tungstenite::tungstenite::http::header::InvalidHeaderValue),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// One live connection to the server.
pub struct Connection {
    sink: SplitSink<WsStream, WsMessage>,
    stream: SplitStream<WsStream>,
}

impl Connection {
    /// Connect to the agent websocket endpoint, presenting the registration
    /// cookie when one is known.
    pub async fn connect(config: &AgentConfig) -> Result<Self, TransportError> {
        let mut request = config.ws_url.as_str().into_client_request()?;
        if let Some(cookie) = state::get_state("cookie") {
            if !cookie.is_empty() {
                request.headers_mut().insert(COOKIE, HeaderValue::from_str(&cookie)?);
            }
        }
        let (ws, _) = tokio_tungstenite::connect_async(request).await?;
        tracing::info!(url = %config.ws_url, "websocket connected");
        let (sink, stream) = ws.split();
        Ok(Self { sink, stream })
    }

    pub async fn send(&mut self, message: &Message) -> Result<(), TransportError> {
        let text = encode(message)?;
        self.sink.send(WsMessage::Text(text)).await?;
        Ok(())
    }

    /// Next inbound envelope. `None` means the server closed the
    /// connection; control frames are handled by the library and skipped.
    pub async fn next(&mut self) -> Option<Result<Message, TransportError>> {
        loop {
            match self.stream.next().await {
                Some(Ok(WsMessage::Text(text))) => {
                    return Some(decode(&text).map_err(TransportError::from));
                }
                Some(Ok(WsMessage::Close(frame))) => {
                    tracing::info!(?frame, "server closed the websocket");
                    return None;
                }
                Some(Ok(_)) => continue, // ping/pong/binary
                Some(Err(e)) => return Some(Err(e.into())),
                None => return None,
            }
        }
    }
}

#[cfg(test)]
#[path = "transport_tests.rs"]
mod tests;
