//! WebSocket connection lifecycle.
//!
//! `run_client` owns the socket: it connects, forwards outbound client
//! events from the command channel, decodes inbound server events onto the
//! event channel, and reconnects with exponential backoff when the
//! transport drops. Everything above it talks channels and never sees the
//! socket.

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::Duration;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{info, warn};

use events::{ClientEvent, ServerEvent, decode_server_event, encode_client_event};

pub const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
pub const MAX_BACKOFF: Duration = Duration::from_secs(10);

/// Next reconnect delay: doubled, capped.
#[must_use]
pub fn next_backoff(current: Duration) -> Duration {
    (current * 2).min(MAX_BACKOFF)
}

/// Why a connection attempt's session ended.
#[derive(Debug, PartialEq, Eq)]
enum SessionEnd {
    /// The transport dropped; reconnect.
    Disconnected,
    /// The caller hung up its channels; stop for good.
    Finished,
}

/// Drive the connection until the caller drops the command channel.
///
/// Reconnects forever with exponential backoff (1s doubling to 10s, reset
/// on a successful connect). Note that rejoining a room after a reconnect
/// is the caller's job: it sees the fresh `connected` event and replays
/// its `join-room`, which the server reconciles in place.
pub async fn run_client(
    url: &str,
    mut commands: mpsc::Receiver<ClientEvent>,
    events: mpsc::Sender<ServerEvent>,
) {
    let mut backoff = INITIAL_BACKOFF;

    loop {
        match connect_async(url).await {
            Ok((stream, _)) => {
                info!(url, "ws connected");
                backoff = INITIAL_BACKOFF;
                if run_session(stream, &mut commands, &events).await == SessionEnd::Finished {
                    return;
                }
                info!(url, "ws disconnected");
            }
            Err(e) => {
                warn!(url, error = %e, "ws connect failed");
            }
        }

        if events.is_closed() {
            return;
        }
        tokio::time::sleep(backoff).await;
        backoff = next_backoff(backoff);
    }
}

async fn run_session(
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    commands: &mut mpsc::Receiver<ClientEvent>,
    events: &mpsc::Sender<ServerEvent>,
) -> SessionEnd {
    let (mut write, mut read) = stream.split();

    loop {
        tokio::select! {
            msg = read.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    match decode_server_event(&text) {
                        Ok(event) => {
                            if events.send(event).await.is_err() {
                                return SessionEnd::Finished;
                            }
                        }
                        Err(e) => {
                            warn!(error = %e, "malformed server event dropped");
                        }
                    }
                }
                Some(Ok(Message::Close(_))) | None => return SessionEnd::Disconnected,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(error = %e, "ws read failed");
                    return SessionEnd::Disconnected;
                }
            },
            cmd = commands.recv() => match cmd {
                Some(event) => {
                    let json = encode_client_event(&event);
                    if write.send(Message::Text(json.into())).await.is_err() {
                        return SessionEnd::Disconnected;
                    }
                }
                None => return SessionEnd::Finished,
            },
        }
    }
}

#[cfg(test)]
#[path = "net_test.rs"]
mod tests;
