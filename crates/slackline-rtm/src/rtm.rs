//! RTM event stream transport.
//!
//! `rtm.connect` hands out a single-use websocket URL; the platform then
//! pushes events over that socket as JSON text frames. Reads are
//! non-blocking drains: a poll takes whatever frames have already
//! arrived, possibly none, and the stream manager paces the polls.

use async_trait::async_trait;
use futures::{FutureExt, SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio_tungstenite::{
    connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream,
};
use tracing::debug;

use slackline_core::{event::Event, Error, Result};

/// Port for opening an event stream session.
#[async_trait]
pub trait StreamConnector: Send + Sync {
    async fn open(&self, url: &str) -> Result<Box<dyn StreamConnection>>;
}

/// One live event stream session.
#[async_trait]
pub trait StreamConnection: Send {
    /// Drain the frames that have already arrived. An empty batch means
    /// nothing was waiting; an error means the session is dead.
    async fn read_batch(&mut self) -> Result<Vec<Value>>;
}

/// The real connector over a websocket.
pub struct RtmConnector;

#[async_trait]
impl StreamConnector for RtmConnector {
    async fn open(&self, url: &str) -> Result<Box<dyn StreamConnection>> {
        let (ws, _response) = connect_async(url)
            .await
            .map_err(|e| Error::Transport(format!("stream connect: {e}")))?;
        Ok(Box::new(RtmConnection { ws }))
    }
}

struct RtmConnection {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl StreamConnection for RtmConnection {
    async fn read_batch(&mut self) -> Result<Vec<Value>> {
        let mut frames = Vec::new();

        loop {
            let ready = self.ws.next().now_or_never();
            match ready {
                // Nothing more is waiting right now.
                None => break,
                Some(None) => {
                    return Err(Error::Transport("event stream closed".to_string()));
                }
                Some(Some(Err(e))) => {
                    return Err(Error::Transport(format!("event stream read: {e}")));
                }
                Some(Some(Ok(Message::Text(text)))) => match serde_json::from_str(&text) {
                    Ok(frame) => frames.push(frame),
                    Err(e) => debug!(error = %e, "discarding undecodable frame"),
                },
                Some(Some(Ok(Message::Ping(payload)))) => {
                    self.ws
                        .send(Message::Pong(payload))
                        .await
                        .map_err(|e| Error::Transport(format!("event stream pong: {e}")))?;
                }
                Some(Some(Ok(Message::Close(_)))) => {
                    return Err(Error::Transport("event stream closed".to_string()));
                }
                Some(Some(Ok(_))) => {} // binary/pong frames carry no events
            }
        }

        Ok(frames)
    }
}

/// Turn a raw stream frame into a dispatchable event. Frames without a
/// `type` discriminator (send acks, presence pings) carry no event.
pub(crate) fn event_from_frame(frame: Value) -> Option<Event> {
    match frame.get("type").and_then(Value::as_str) {
        Some(kind) => Some(Event::new(kind.to_string(), frame)),
        None => {
            debug!(frame = %frame, "stream frame without a type");
            None
        }
    }
}
