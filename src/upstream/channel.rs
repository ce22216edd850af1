use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

use crate::config::ChannelConfig;
use crate::error::{FeedError, Result};
use crate::feed::record::JobRecord;
use crate::upstream::stomp::Frame;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

const JOBS_SUBSCRIPTION: &str = "sub-0";
const STATUS_SUBSCRIPTION: &str = "sub-1";

/// Whether the push channel is currently subscribed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkState {
    #[default]
    Connecting,
    Live,
}

impl std::fmt::Display for LinkState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LinkState::Connecting => write!(f, "connecting"),
            LinkState::Live => write!(f, "live"),
        }
    }
}

/// Something the push channel delivered.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    Connected,
    Disconnected,
    /// Opaque scanner progress text.
    Status(String),
    Jobs(Vec<JobRecord>),
}

/// Maps a decoded STOMP frame to a channel event.
pub fn route_frame(frame: &Frame, config: &ChannelConfig) -> Option<ChannelEvent> {
    if frame.command != "MESSAGE" {
        return None;
    }
    let destination = frame.get("destination")?;
    if destination == config.status_topic {
        return Some(ChannelEvent::Status(frame.body.clone()));
    }
    if destination == config.jobs_topic {
        return match serde_json::from_str::<Vec<JobRecord>>(&frame.body) {
            Ok(jobs) => Some(ChannelEvent::Jobs(jobs)),
            Err(e) => {
                tracing::warn!(error = %e, "Dropping undecodable jobs message");
                None
            }
        };
    }
    tracing::debug!(destination, "Message for unexpected destination");
    None
}

/// Subscription to the aggregator's STOMP-over-WebSocket broker.
pub struct RealtimeChannel {
    config: ChannelConfig,
}

impl RealtimeChannel {
    pub fn new(config: ChannelConfig) -> Self {
        Self { config }
    }

    /// Keep a subscription open until `shutdown` fires, reconnecting after
    /// `reconnect_delay_ms` whenever the link drops.
    pub async fn run(self, tx: mpsc::Sender<ChannelEvent>, shutdown: CancellationToken) {
        let delay = Duration::from_millis(self.config.reconnect_delay_ms);

        loop {
            let outcome = tokio::select! {
                _ = shutdown.cancelled() => break,
                res = connect_async(self.config.url.as_str()) => res,
            };

            match outcome {
                Ok((socket, _)) => {
                    tracing::info!(url = %self.config.url, "Push channel socket open");
                    match self.session(socket, &tx, &shutdown).await {
                        Ok(()) => {}
                        Err(e) => tracing::warn!(error = %e, "Push channel session ended"),
                    }
                    if tx.send(ChannelEvent::Disconnected).await.is_err() {
                        return;
                    }
                }
                Err(e) => {
                    tracing::warn!(url = %self.config.url, error = %e, "Push channel connect failed");
                }
            }

            if shutdown.is_cancelled() {
                break;
            }
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        tracing::info!("Push channel stopped");
    }

    async fn session(
        &self,
        mut socket: Socket,
        tx: &mpsc::Sender<ChannelEvent>,
        shutdown: &CancellationToken,
    ) -> Result<()> {
        let host = host_of(&self.config.url);
        socket
            .send(Message::Text(Frame::connect(host).encode().into()))
            .await?;
        self.await_connected(&mut socket).await?;

        for (id, topic) in [
            (JOBS_SUBSCRIPTION, &self.config.jobs_topic),
            (STATUS_SUBSCRIPTION, &self.config.status_topic),
        ] {
            socket
                .send(Message::Text(Frame::subscribe(id, topic).encode().into()))
                .await?;
        }
        if tx.send(ChannelEvent::Connected).await.is_err() {
            return Ok(());
        }

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    let _ = socket.send(Message::Text(Frame::disconnect().encode().into())).await;
                    let _ = socket.close(None).await;
                    return Ok(());
                }
                msg = socket.next() => {
                    let text = match msg {
                        Some(Ok(Message::Text(text))) => text.as_str().to_string(),
                        Some(Ok(Message::Binary(data))) => String::from_utf8_lossy(&data).into_owned(),
                        Some(Ok(Message::Ping(payload))) => {
                            let _ = socket.send(Message::Pong(payload)).await;
                            continue;
                        }
                        Some(Ok(Message::Close(_))) | None => return Ok(()),
                        Some(Ok(_)) => continue,
                        Some(Err(e)) => return Err(e.into()),
                    };

                    let frame = match Frame::decode(&text) {
                        Ok(Some(frame)) => frame,
                        Ok(None) => continue,
                        Err(e) => {
                            tracing::warn!(error = %e, "Skipping malformed frame");
                            continue;
                        }
                    };
                    if frame.command == "ERROR" {
                        return Err(FeedError::Stomp(
                            frame.get("message").unwrap_or(frame.body.as_str()).to_string(),
                        ));
                    }
                    if let Some(event) = route_frame(&frame, &self.config) {
                        if tx.send(event).await.is_err() {
                            return Ok(());
                        }
                    }
                }
            }
        }
    }

    async fn await_connected(&self, socket: &mut Socket) -> Result<()> {
        while let Some(msg) = socket.next().await {
            let text = match msg? {
                Message::Text(text) => text.as_str().to_string(),
                Message::Binary(data) => String::from_utf8_lossy(&data).into_owned(),
                Message::Close(_) => break,
                _ => continue,
            };
            match Frame::decode(&text)? {
                Some(frame) if frame.command == "CONNECTED" => return Ok(()),
                Some(frame) if frame.command == "ERROR" => {
                    return Err(FeedError::Stomp(
                        frame.get("message").unwrap_or(frame.body.as_str()).to_string(),
                    ))
                }
                _ => continue,
            }
        }
        Err(FeedError::Stomp(
            "socket closed before CONNECTED".to_string(),
        ))
    }
}

/// `ws://host:port/path` -> `host:port`
fn host_of(url: &str) -> &str {
    let rest = url.split_once("://").map(|(_, r)| r).unwrap_or(url);
    rest.split('/').next().unwrap_or(rest)
}
