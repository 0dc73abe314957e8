//! Client connection task.
//!
//! Waits for a `Connect` request, opens the socket, then pumps lines in both
//! directions until the connection drops. Reconnecting is the host's call:
//! the client only reports `Connected` and `Disconnected`.

use super::codec::LineCodec;
use super::line::{self, Line};
use crate::events::{HostEvent, ProtocolEvent};
use crate::outbound::Outbound;
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::codec::Framed;
use tracing::{debug, info, warn};

/// Longest line accepted from the server.
const MAX_LINE_LENGTH: usize = 8192;

/// Pause before reporting a failed connection attempt.
const RETRY_DELAY: Duration = Duration::from_secs(10);

pub struct Client {
    events: mpsc::Sender<HostEvent>,
    outbound: mpsc::Receiver<Outbound>,
}

enum Session {
    /// The connection closed; wait for the next `Connect`.
    Closed,
    /// A `Connect` arrived while connected.
    Reconnect { network: String, port: u16 },
    /// The outbound queue closed; the bot is gone.
    Finished,
}

impl Client {
    pub fn new(events: mpsc::Sender<HostEvent>, outbound: mpsc::Receiver<Outbound>) -> Self {
        Self { events, outbound }
    }

    /// Run until the outbound queue closes.
    pub async fn run(mut self) {
        let mut pending: Option<(String, u16)> = None;

        loop {
            let (network, port) = match pending.take() {
                Some(target) => target,
                None => match self.outbound.recv().await {
                    Some(Outbound::Connect { network, port }) => (network, port),
                    Some(other) => {
                        debug!(request = ?other, "Not connected, dropping outbound request");
                        continue;
                    }
                    None => return,
                },
            };

            let stream = match TcpStream::connect((network.as_str(), port)).await {
                Ok(stream) => stream,
                Err(e) => {
                    warn!(network = %network, port, error = %e, "Connection failed");
                    tokio::time::sleep(RETRY_DELAY).await;
                    if !self.emit(ProtocolEvent::Disconnected).await {
                        return;
                    }
                    continue;
                }
            };
            info!(network = %network, port, "Connected");

            let framed = Framed::new(stream, LineCodec::with_max_len(MAX_LINE_LENGTH));
            if !self
                .emit(ProtocolEvent::Connected {
                    network: network.clone(),
                    port,
                })
                .await
            {
                return;
            }

            match self.session(framed).await {
                Session::Closed => {
                    info!(network = %network, "Connection closed");
                    if !self.emit(ProtocolEvent::Disconnected).await {
                        return;
                    }
                }
                Session::Reconnect { network, port } => {
                    if !self.emit(ProtocolEvent::Disconnected).await {
                        return;
                    }
                    pending = Some((network, port));
                }
                Session::Finished => return,
            }
        }
    }

    async fn session(&mut self, mut framed: Framed<TcpStream, LineCodec>) -> Session {
        loop {
            tokio::select! {
                incoming = framed.next() => match incoming {
                    Some(Ok(raw)) => {
                        let Some(event) = Line::parse(&raw).and_then(|l| l.to_event()) else {
                            continue;
                        };
                        if !self.emit(event).await {
                            return Session::Finished;
                        }
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "Read error");
                        return Session::Closed;
                    }
                    None => return Session::Closed,
                },
                request = self.outbound.recv() => match request {
                    Some(Outbound::Connect { network, port }) => {
                        return Session::Reconnect { network, port };
                    }
                    Some(request) => {
                        let Some(text) = line::encode(&request) else {
                            continue;
                        };
                        debug!(line = %text, "Sending");
                        if let Err(e) = framed.send(text).await {
                            warn!(error = %e, "Write error");
                            return Session::Closed;
                        }
                    }
                    None => return Session::Finished,
                },
            }
        }
    }

    /// Queue an event for the host; false once the host is gone.
    async fn emit(&self, event: ProtocolEvent) -> bool {
        self.events.send(HostEvent::from(event)).await.is_ok()
    }
}
