//! The play socket.
//!
//! [`open`] connects to the server, waits for the login verdict and hands
//! back a [`Channel`]: an ordered stream of decoded [`ServerEvent`]s and a
//! fire-and-forget sender for [`ClientIntent`]s. Socket I/O runs on two
//! background tasks; the inbound stream ends when the server goes away.

use std::time::Duration;

use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{self, Message};
use uuid::Uuid;

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::types::{ClientIntent, ServerEvent};

const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);
const QUEUE_CAPACITY: usize = 64;

enum Outbound {
    Intent(ClientIntent),
    Close,
}

/// An open, logged-in connection to the game server.
pub struct Channel {
    id: Uuid,
    username: String,
    outbound: mpsc::Sender<Outbound>,
    events: mpsc::Receiver<ServerEvent>,
    reader: Option<JoinHandle<()>>,
    writer: Option<JoinHandle<()>>,
}

/// Connect as `username` and wait until the server accepts or rejects it.
pub async fn open(config: &ClientConfig, username: &str) -> Result<Channel, ClientError> {
    let url = config.play_url(username)?;
    tracing::info!("Connecting to {}", url);

    let (socket, _response) = tokio_tungstenite::connect_async(url.as_str()).await?;
    Channel::establish(socket, username).await
}

fn decode(text: &str) -> Result<ServerEvent, ClientError> {
    Ok(serde_json::from_str(text)?)
}

async fn await_ready<S>(stream: &mut S) -> Result<(), ClientError>
where
    S: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
{
    while let Some(message) = stream.next().await {
        let Message::Text(text) = message? else { continue };

        match decode(text.as_str()) {
            Ok(ServerEvent::Ready) => return Ok(()),
            Ok(ServerEvent::Rejected { reason }) => {
                return Err(ClientError::UsernameRejected(reason));
            }
            Ok(other) => tracing::debug!("Unexpected {} event before ready", other.kind()),
            Err(e) => tracing::warn!("{}", e),
        }
    }
    Err(ClientError::ClosedBeforeReady)
}

impl Channel {
    async fn establish<S>(socket: S, username: &str) -> Result<Self, ClientError>
    where
        S: Stream<Item = Result<Message, tungstenite::Error>>
            + Sink<Message, Error = tungstenite::Error>
            + Unpin
            + Send
            + 'static,
    {
        let (mut sink, mut stream) = socket.split();

        if let Err(e) = await_ready(&mut stream).await {
            let _ = sink.close().await;
            return Err(e);
        }

        let id = Uuid::new_v4();
        let (event_tx, event_rx) = mpsc::channel(QUEUE_CAPACITY);
        let (outbound_tx, outbound_rx) = mpsc::channel(QUEUE_CAPACITY);

        let reader = tokio::spawn(read_events(id, stream, event_tx));
        let writer = tokio::spawn(write_intents(id, sink, outbound_rx));

        tracing::info!("Channel {} ready for {}", id, username);

        Ok(Self {
            id,
            username: username.to_string(),
            outbound: outbound_tx,
            events: event_rx,
            reader: Some(reader),
            writer: Some(writer),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Queue an intent for the server. Success means queued, not delivered;
    /// there is no acknowledgement. Waits while the outbound queue is full.
    pub async fn send(&self, intent: ClientIntent) -> Result<(), ClientError> {
        self.outbound
            .send(Outbound::Intent(intent))
            .await
            .map_err(|_| ClientError::ChannelClosed)
    }

    /// Next inbound event, or `None` once the server has closed the socket.
    pub async fn recv(&mut self) -> Option<ServerEvent> {
        self.events.recv().await
    }

    /// Send a close frame and release the socket.
    pub async fn close(mut self) {
        let writer = self.writer.take();
        let closing = async {
            let _ = self.outbound.send(Outbound::Close).await;
            if let Some(writer) = writer {
                let _ = writer.await;
            }
        };
        if tokio::time::timeout(CLOSE_TIMEOUT, closing).await.is_err() {
            tracing::warn!("Channel {} did not close in time", self.id);
        }
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        tracing::info!("Channel {} closed", self.id);
    }
}

async fn read_events<S>(id: Uuid, mut stream: S, events: mpsc::Sender<ServerEvent>)
where
    S: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
{
    while let Some(message) = stream.next().await {
        let text = match message {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(frame)) => {
                tracing::info!("Channel {} closed by server: {:?}", id, frame);
                break;
            }
            Ok(_) => continue,
            Err(e) => {
                tracing::warn!("Channel {} error: {}", id, e);
                break;
            }
        };

        match decode(text.as_str()) {
            Ok(event) => {
                tracing::debug!("Channel {} received {}", id, event.kind());
                if events.send(event).await.is_err() {
                    break;
                }
            }
            Err(e) => tracing::warn!("Channel {} skipped frame: {}", id, e),
        }
    }
}

async fn write_intents<K>(id: Uuid, mut sink: K, mut outbound: mpsc::Receiver<Outbound>)
where
    K: Sink<Message, Error = tungstenite::Error> + Unpin,
{
    while let Some(next) = outbound.recv().await {
        let intent = match next {
            Outbound::Intent(intent) => intent,
            Outbound::Close => break,
        };

        let json = match serde_json::to_string(&intent) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!("Channel {} could not encode intent: {}", id, e);
                continue;
            }
        };

        tracing::debug!("Channel {} send {}", id, json);
        if let Err(e) = sink.send(Message::Text(json.into())).await {
            tracing::warn!("Channel {} send failed: {}", id, e);
            break;
        }
    }
    let _ = sink.close().await;
}

/// In-memory stand-in for the server side of a [`Channel`].
#[cfg(test)]
pub(crate) struct Peer {
    events: mpsc::Sender<ServerEvent>,
    outbound: mpsc::Receiver<Outbound>,
}

#[cfg(test)]
impl Peer {
    pub(crate) fn push(&self, event: ServerEvent) {
        self.events.try_send(event).unwrap();
    }

    /// Next intent sent by the client, or `None` once it closed the channel.
    pub(crate) async fn next_intent(&mut self) -> Option<ClientIntent> {
        match self.outbound.recv().await? {
            Outbound::Intent(intent) => Some(intent),
            Outbound::Close => None,
        }
    }

    pub(crate) fn try_intent(&mut self) -> Option<ClientIntent> {
        match self.outbound.try_recv().ok()? {
            Outbound::Intent(intent) => Some(intent),
            Outbound::Close => None,
        }
    }
}

#[cfg(test)]
impl Channel {
    pub(crate) fn loopback(username: &str) -> (Channel, Peer) {
        let (event_tx, event_rx) = mpsc::channel(QUEUE_CAPACITY);
        let (outbound_tx, outbound_rx) = mpsc::channel(QUEUE_CAPACITY);
        let channel = Channel {
            id: Uuid::new_v4(),
            username: username.to_string(),
            outbound: outbound_tx,
            events: event_rx,
            reader: None,
            writer: None,
        };
        let peer = Peer {
            events: event_tx,
            outbound: outbound_rx,
        };
        (channel, peer)
    }
}
